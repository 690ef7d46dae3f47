use crate::{
    name_object::{name_string, super_name, Target},
    namespace::AmlName,
    opcode::{self, ext_opcode, opcode},
    parser::{
        choice,
        comment_scope,
        extract,
        id,
        take,
        take_to_end_of_pkglength,
        take_u32,
        try_with_context,
        ParseResult,
        Parser,
        Propagate,
    },
    pkg_length::{pkg_length, PkgLength},
    term_object::{term_arg, term_list},
    value::{AmlType, AmlValue},
    AmlContext,
    AmlError,
    DebugVerbosity,
};
use alloc::format;
use core::mem;
use log::warn;

/// How many iterations a single `While` may run before we assume its predicate is malformed and
/// give up. Firmware loops poll hardware for bounded amounts of work; anything that trips this is
/// broken AML, not patience on our part.
pub const MAX_LOOP_ITERATIONS: usize = 100_000;

pub fn statement_opcode<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * StatementOpcode := DefBreak | DefBreakPoint | DefContinue | DefFatal | DefIfElse | DefLoad | DefNoop |
     *                    DefNotify | DefRelease | DefReset | DefReturn | DefSignal | DefSleep | DefStall | DefWhile
     */
    comment_scope(
        DebugVerbosity::AllScopes,
        "StatementOpcode",
        choice!(
            def_break(),
            def_breakpoint(),
            def_continue(),
            def_fatal(),
            def_if_else(),
            def_load(),
            def_noop(),
            def_notify(),
            def_release(),
            def_reset(),
            def_return(),
            def_signal(),
            def_sleep(),
            def_stall(),
            def_while()
        ),
    )
}

fn def_break<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefBreak := 0xa5
     */
    opcode(opcode::DEF_BREAK_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefBreak",
            id().map(|()| -> Result<(), Propagate> { Err(Propagate::Break) }),
        ))
        .discard_result()
}

fn def_breakpoint<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefBreakPoint := 0xcc
     * There is no debugger here, so this doesn't do anything.
     */
    opcode(opcode::DEF_BREAKPOINT_OP)
        .then(comment_scope(DebugVerbosity::AllScopes, "DefBreakPoint", id()))
        .discard_result()
}

fn def_continue<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefContinue := 0x9f
     */
    opcode(opcode::DEF_CONTINUE_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefContinue",
            id().map(|()| -> Result<(), Propagate> { Err(Propagate::Continue) }),
        ))
        .discard_result()
}

fn def_fatal<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefFatal := ExtOpPrefix 0x32 FatalType FatalCode FatalArg
     * FatalType := ByteData
     * FatalCode := DWordData
     * FatalArg := TermArg => Integer
     *
     * A `Fatal` is the AML author deliberately aborting: the host is told, and the whole current
     * evaluation fails - this is the one condition we never degrade through.
     */
    ext_opcode(opcode::EXT_DEF_FATAL_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefFatal",
            take().then(take_u32()).then(term_arg()).map_with_context(
                |((fatal_type, fatal_code), fatal_arg), context| -> (Result<(), Propagate>, &'c mut AmlContext) {
                    let fatal_arg = try_with_context!(context, fatal_arg.as_integer(context));
                    context.handler.handle_fatal_error(fatal_type, fatal_code, fatal_arg);
                    (Err(Propagate::Err(AmlError::FatalError)), context)
                },
            ),
        ))
        .discard_result()
}

fn def_if_else<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefIfElse := 0xa0 PkgLength Predicate TermList DefElse
     * Predicate := TermArg => Integer (0 = false, >0 = true)
     * DefElse := Nothing | <0xa1 PkgLength TermList>
     */
    opcode(opcode::DEF_IF_ELSE_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefIfElse",
            pkg_length()
                .then(term_arg())
                .feed(|(length, predicate_arg)| {
                    take_to_end_of_pkglength(length)
                        .map(move |then_branch| Ok((predicate_arg.as_bool()?, then_branch)))
                })
                .then(choice!(
                    opcode(opcode::DEF_ELSE_OP)
                        .then(comment_scope(
                            DebugVerbosity::AllScopes,
                            "DefElse",
                            pkg_length().feed(|length| take_to_end_of_pkglength(length))
                        ))
                        .map(|((), else_branch): ((), &[u8])| Ok(else_branch)),
                    |input, context| -> ParseResult<'a, 'c, &[u8]> {
                        /*
                         * This path parses an DefIfElse that doesn't have an else branch. We simply
                         * return an empty slice, so if the predicate is false, we don't execute
                         * anything.
                         */
                        Ok((input, context, &[]))
                    }
                ))
                .map_with_context(|((predicate, then_branch), else_branch), context| {
                    let branch = if predicate { then_branch } else { else_branch };

                    match term_list(PkgLength::from_raw_length(branch, branch.len() as u32))
                        .parse(branch, context)
                    {
                        Ok((_, context, result)) => (Ok(result), context),
                        Err((_, context, err)) => (Err(err), context),
                    }
                }),
        ))
        .discard_result()
}

fn def_load<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefLoad := ExtOpPrefix 0x20 NameString DDBHandleObject
     * DDBHandleObject := SuperName
     *
     * The named object holds an entire SSDT (as a buffer, or an op-region field covering one); we
     * parse its definition block into the shared namespace and hand a DDB handle back through the
     * target. The 36-byte table header at the front of the object is not AML and is skipped.
     */
    ext_opcode(opcode::EXT_DEF_LOAD_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefLoad",
            name_string().then(super_name()).map_with_context(|(name, target), context| {
                let object = match context.namespace.search(&name, &context.current_scope) {
                    Ok((_, handle)) => try_with_context!(context, context.namespace.get(handle)).clone(),
                    Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => {
                        context.record_degradation(&format!("load of unresolved name {}", name));
                        return (Ok(()), context);
                    }
                    Err(err) => return (Err(Propagate::Err(err)), context),
                };

                let bytes: alloc::vec::Vec<u8> = {
                    let data = try_with_context!(context, object.as_buffer(context));
                    let copied = data.lock().clone();
                    copied
                };
                const TABLE_HEADER_LENGTH: usize = 36;
                if bytes.len() < TABLE_HEADER_LENGTH {
                    warn!("Load of a table too short to contain a header ({} bytes)", bytes.len());
                    context.record_degradation("load of a truncated table");
                    return (Ok(()), context);
                }

                // Definition blocks name things relative to the root, whatever scope `Load` runs in
                let previous_scope = mem::replace(&mut context.current_scope, AmlName::root());
                let parse_result = context.parse_table(&bytes[TABLE_HEADER_LENGTH..]);
                context.current_scope = previous_scope;
                try_with_context!(context, parse_result);

                let ddb_handle = AmlValue::Integer(context.loaded_tables as u64);
                try_with_context!(context, context.store(target, ddb_handle));
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

fn def_noop<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefNoop := 0xa3
     */
    opcode(opcode::DEF_NOOP_OP).then(comment_scope(DebugVerbosity::AllScopes, "DefNoop", id())).discard_result()
}

fn def_notify<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefNotify := 0x86 NotifyObject NotifyValue
     * NotifyObject := SuperName => ThermalZone | Processor | Device
     * NotifyValue := TermArg => Integer
     *
     * Every observer the host has registered for the target node (directly, or through the
     * device's hardware id) is invoked with the notification value.
     */
    opcode(opcode::DEF_NOTIFY_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefNotify",
            super_name().then(term_arg()).map_with_context(|(target, value), context| {
                let value = try_with_context!(context, value.as_integer(context));

                match target {
                    Target::Name(ref path) => match context.namespace.search(path, &context.current_scope) {
                        Ok((resolved_path, _)) => context.notify(&resolved_path, value),
                        Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => {
                            context.record_degradation(&format!("notify on unresolved name {}", path));
                        }
                        Err(err) => return (Err(Propagate::Err(err)), context),
                    },
                    _ => context.record_degradation("notify target is not a named object"),
                }

                (Ok(()), context)
            }),
        ))
        .discard_result()
}

fn def_release<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefRelease := ExtOpPrefix 0x27 MutexObject
     * MutexObject := SuperName
     *
     * `Acquire` always succeeds immediately in this interpreter (entry into the interpreter is
     * serialized by the host, so there is nothing for AML-level mutexes to exclude), which leaves
     * `Release` with nothing to undo. We still resolve the target and complain if it isn't a
     * mutex.
     */
    ext_opcode(opcode::EXT_DEF_RELEASE_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefRelease",
            super_name().map_with_context(|target, context| {
                let mutex = try_with_context!(context, context.read_target(&target));
                if mutex.type_of() != AmlType::Mutex {
                    context.record_degradation("release of something that is not a mutex");
                }
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

fn def_reset<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefReset := ExtOpPrefix 0x26 EventObject
     * EventObject := SuperName
     */
    ext_opcode(opcode::EXT_DEF_RESET_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefReset",
            super_name().map_with_context(|target, context| {
                match event_handle(&target, context) {
                    Ok(Some(handle)) => {
                        if let Ok(AmlValue::Event { signal_count }) = context.namespace.get_mut(handle) {
                            *signal_count = 0;
                        }
                    }
                    Ok(None) => context.record_degradation("reset of something that is not an event"),
                    Err(err) => return (Err(Propagate::Err(err)), context),
                }
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

fn def_return<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefReturn := 0xa4 ArgObject
     * ArgObject := TermArg => DataRefObject
     */
    opcode(opcode::DEF_RETURN_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefReturn",
            term_arg().map(|return_arg| -> Result<(), Propagate> {
                /*
                 * To return a value, we want to halt execution of the method and propagate the
                 * return value all the way up to the start of the method invocation. To do this,
                 * we emit a special error that is intercepted during method invocation and turned
                 * into a valid result.
                 */
                Err(Propagate::Return(return_arg))
            }),
        ))
        .discard_result()
}

fn def_signal<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefSignal := ExtOpPrefix 0x24 EventObject
     * EventObject := SuperName
     *
     * Signals accumulate; each one can satisfy one later `Wait`.
     */
    ext_opcode(opcode::EXT_DEF_SIGNAL_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefSignal",
            super_name().map_with_context(|target, context| {
                match event_handle(&target, context) {
                    Ok(Some(handle)) => {
                        if let Ok(AmlValue::Event { signal_count }) = context.namespace.get_mut(handle) {
                            *signal_count += 1;
                        }
                    }
                    Ok(None) => context.record_degradation("signal of something that is not an event"),
                    Err(err) => return (Err(Propagate::Err(err)), context),
                }
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

fn def_sleep<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefSleep := ExtOpPrefix 0x22 MsecTime
     * MsecTime := TermArg => Integer
     */
    ext_opcode(opcode::EXT_DEF_SLEEP_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefSleep",
            term_arg().map_with_context(|milliseconds, context| {
                let milliseconds = try_with_context!(context, milliseconds.as_integer(context));
                context.handler.sleep(milliseconds);
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

fn def_stall<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefStall := ExtOpPrefix 0x21 UsecTime
     * UsecTime := TermArg => Integer
     */
    ext_opcode(opcode::EXT_DEF_STALL_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefStall",
            term_arg().map_with_context(|microseconds, context| {
                let microseconds = try_with_context!(context, microseconds.as_integer(context));
                context.handler.stall(microseconds);
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

fn def_while<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefWhile := 0xa2 PkgLength Predicate TermList
     * Predicate := TermArg => Integer (0 = false, >0 = true)
     *
     * Parsing this does something a little unusual - it 'extracts' the predicate when it's first parsed, which
     * allows us to reevaluate it to see if we should break out of the while yet. This is required, to make sure
     * we're observing changes to the context between the iterations of the loop.
     */
    opcode(opcode::DEF_WHILE_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefWhile",
            pkg_length()
                .then(extract(term_arg()))
                .feed(move |(length, (first_predicate, predicate_stream))| {
                    take_to_end_of_pkglength(length)
                        .map(move |body| Ok((first_predicate.clone(), predicate_stream, body)))
                })
                .map_with_context(|(first_predicate, predicate_stream, body), mut context| {
                    if !try_with_context!(context, first_predicate.as_bool()) {
                        return (Ok(()), context);
                    }

                    let mut iterations = 0;
                    loop {
                        if iterations >= MAX_LOOP_ITERATIONS {
                            return (Err(Propagate::Err(AmlError::LoopIterationLimit)), context);
                        }
                        iterations += 1;

                        match term_list(PkgLength::from_raw_length(body, body.len() as u32))
                            .parse(body, context)
                        {
                            Ok((_, new_context, _)) => {
                                context = new_context;
                            }
                            Err((_, new_context, Propagate::Break)) => {
                                context = new_context;
                                break;
                            }
                            Err((_, new_context, Propagate::Continue)) => {
                                // We don't need to do anything special here - the `Propagate::Continue` bubbles
                                // up, and then we can just move on to checking the predicate for the next
                                // iteration.
                                context = new_context;
                            }
                            Err((_, context, err)) => return (Err(err), context),
                        }

                        // Reevaluate the predicate to see if we should break out of the loop yet
                        let predicate =
                            match comment_scope(DebugVerbosity::AllScopes, "WhilePredicate", term_arg())
                                .parse(predicate_stream, context)
                            {
                                Ok((_, new_context, result)) => {
                                    context = new_context;
                                    try_with_context!(context, result.as_bool())
                                }
                                Err((_, context, err)) => return (Err(err), context),
                            };

                        if !predicate {
                            break;
                        }
                    }

                    (Ok(()), context)
                }),
        ))
        .discard_result()
}

/// Resolve a `SuperName` that should refer to an `Event`, returning its handle, or `None` if the
/// target resolves to something that isn't an event (or doesn't resolve at all).
pub(crate) fn event_handle(target: &Target, context: &mut AmlContext) -> Result<Option<crate::AmlHandle>, AmlError> {
    match target {
        Target::Name(path) => match context.namespace.search(path, &context.current_scope) {
            Ok((_, handle)) => match context.namespace.get(handle) {
                Ok(AmlValue::Event { .. }) => Ok(Some(handle)),
                Ok(_) => Ok(None),
                Err(err) => Err(err),
            },
            Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => Ok(None),
            Err(err) => Err(err),
        },
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::*, AmlName};
    use alloc::boxed::Box;

    #[test]
    fn test_if_executes_then_branch() {
        let mut context = make_test_context();

        // Name (RES, 0)  If (One) { Store (42, RES) }
        let stream = [
            &[0x08, b'R', b'E', b'S', b'_', 0x0a, 0][..],
            &[0xa0, 0x09, 0x01, 0x70, 0x0a, 42, b'R', b'E', b'S', b'_'][..],
        ]
        .concat();
        context.parse_table(&stream).unwrap();

        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\RES_").unwrap()).unwrap(),
            &AmlValue::Integer(42)
        ));
    }

    #[test]
    fn test_if_false_takes_else_branch() {
        let mut context = make_test_context();

        // Name (RES, 0)  If (Zero) { Store (1, RES) } Else { Store (2, RES) }
        let stream = [
            &[0x08, b'R', b'E', b'S', b'_', 0x0a, 0][..],
            &[0xa0, 0x09, 0x00, 0x70, 0x0a, 1, b'R', b'E', b'S', b'_'][..],
            &[0xa1, 0x08, 0x70, 0x0a, 2, b'R', b'E', b'S', b'_'][..],
        ]
        .concat();
        context.parse_table(&stream).unwrap();

        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\RES_").unwrap()).unwrap(),
            &AmlValue::Integer(2)
        ));
    }

    #[test]
    fn test_if_with_empty_then_body() {
        let mut context = make_test_context();
        // If (One) {} - a zero-length body executes no terms and parses cleanly
        context.parse_table(&[0xa0, 0x02, 0x01]).unwrap();
    }

    #[test]
    fn test_while_false_predicate_runs_zero_iterations() {
        let mut context = make_test_context();

        // Name (CNT, 0)  While (Zero) { Store (1, CNT) }
        let stream = [
            &[0x08, b'C', b'N', b'T', b'_', 0x0a, 0][..],
            &[0xa2, 0x09, 0x00, 0x70, 0x0a, 1, b'C', b'N', b'T', b'_'][..],
        ]
        .concat();
        context.parse_table(&stream).unwrap();

        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\CNT_").unwrap()).unwrap(),
            &AmlValue::Integer(0)
        ));
    }

    #[test]
    fn test_break_terminates_enclosing_while() {
        let mut context = make_test_context();

        /*
         * Name (CNT, 0)
         * While (One) {
         *     Increment (CNT)
         *     If (LEqual (CNT, 3)) { Break }
         * }
         *
         * `Break` inside the nested `If` must terminate the `While`, leaving CNT at exactly 3.
         */
        let stream = [
            &[0x08, b'C', b'N', b'T', b'_', 0x0a, 0][..],
            &[0xa2, 0x11, 0x01][..],                                   // While (One), body 15 bytes
            &[0x75, b'C', b'N', b'T', b'_'][..],                       // Increment (CNT)
            &[0xa0, 0x09, 0x93, b'C', b'N', b'T', b'_', 0x0a, 3][..],  // If (LEqual (CNT, 3))
            &[0xa5][..],                                               // Break
        ]
        .concat();
        context.parse_table(&stream).unwrap();

        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\CNT_").unwrap()).unwrap(),
            &AmlValue::Integer(3)
        ));
    }

    #[test]
    fn test_runaway_while_is_capped() {
        let mut context = make_test_context();
        // While (One) {} - never terminates on its own, so the loop guard must trip
        assert_eq!(context.parse_table(&[0xa2, 0x02, 0x01]), Err(AmlError::LoopIterationLimit));
    }

    #[test]
    fn test_signal_and_reset() {
        let mut context = make_test_context();

        // Event (EVT)  Signal (EVT)  Signal (EVT)
        let stream = [
            &[0x5b, 0x02, b'E', b'V', b'T', b'_'][..],
            &[0x5b, 0x24, b'E', b'V', b'T', b'_'][..],
            &[0x5b, 0x24, b'E', b'V', b'T', b'_'][..],
        ]
        .concat();
        context.parse_table(&stream).unwrap();
        assert!(matches!(
            context.namespace.get_by_path(&AmlName::from_str("\\EVT_").unwrap()),
            Ok(&AmlValue::Event { signal_count: 2 })
        ));

        // Reset (EVT)
        context.parse_table(&[0x5b, 0x26, b'E', b'V', b'T', b'_']).unwrap();
        assert!(matches!(
            context.namespace.get_by_path(&AmlName::from_str("\\EVT_").unwrap()),
            Ok(&AmlValue::Event { signal_count: 0 })
        ));
    }

    #[test]
    fn test_fatal_aborts_evaluation() {
        let mut context = make_test_context();
        // Fatal (0xf0, 0xdeadbeef, 1)
        let stream = [
            &[0x5b, 0x32, 0xf0][..],
            &0xdead_beefu32.to_le_bytes()[..],
            &[0x01][..],
        ]
        .concat();
        assert_eq!(context.parse_table(&stream), Err(AmlError::FatalError));
    }

    #[test]
    fn test_load_merges_a_definition_block() {
        let mut context = make_test_context();

        /*
         * Name (DDB, 0)
         * Name (TBL, Buffer (43) { <36-byte header> Name (NEWV, 7) })
         * Load (TBL, DDB)
         */
        let mut table = alloc::vec![0u8; 36];
        table.extend(&[0x08, b'N', b'E', b'W', b'V', 0x0a, 7]);

        let mut stream = alloc::vec::Vec::new();
        stream.extend(&[0x08, b'D', b'D', b'B', b'_', 0x0a, 0]);
        stream.extend(&[0x08, b'T', b'B', b'L', b'_']);
        stream.push(0x11);
        stream.extend(encode_pkg_length_including_self(2 + table.len() as u32));
        stream.extend(&[0x0a, table.len() as u8]);
        stream.extend(&table);
        stream.extend(&[0x5b, 0x20, b'T', b'B', b'L', b'_', b'D', b'D', b'B', b'_']);

        context.parse_table(&stream).unwrap();

        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\NEWV").unwrap()).unwrap(),
            &AmlValue::Integer(7)
        ));
        // The DDB handle is the index of the loaded definition block
        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\DDB_").unwrap()).unwrap(),
            &AmlValue::Integer(2)
        ));
    }

    #[test]
    fn test_notify_reaches_registered_handler() {
        use alloc::rc::Rc;
        use core::cell::Cell;

        let mut context = make_test_context();
        let device = AmlName::from_str("\\DEV_").unwrap();
        context.namespace.add_level(device.clone(), crate::namespace::LevelType::Device).unwrap();
        context.namespace.add_value(device.clone(), AmlValue::Device).unwrap();

        let notified = Rc::new(Cell::new(0u64));
        {
            let notified = notified.clone();
            context
                .register_notify_handler(device.clone(), Box::new(move |_, value| notified.set(value)))
                .unwrap();
        }

        // Notify (\DEV_, 0x80)
        context.parse_table(&[0x86, b'\\', b'D', b'E', b'V', b'_', 0x0a, 0x80]).unwrap();
        assert_eq!(notified.get(), 0x80);
    }
}
