use crate::{
    expression::{def_buffer, def_package, def_var_package, expression_opcode},
    misc::{arg_obj, local_obj},
    name_object::{name_seg, name_string},
    namespace::{AmlName, LevelType},
    opcode::{self, ext_opcode, opcode},
    opregion::{OpRegion, RegionSpace},
    parser::{
        choice,
        comment_scope,
        take,
        take_to_end_of_pkglength,
        take_u16,
        take_u32,
        try_with_context,
        ParseResult,
        Parser,
        Propagate,
    },
    pkg_length::{pkg_length, raw_pkg_length, PkgLength},
    statement::statement_opcode,
    value::{AmlValue, FieldFlags, FieldKind, MethodCode, MethodFlags},
    AmlContext,
    AmlError,
    DebugVerbosity,
};
use alloc::{format, string::String};
use core::str;

/// `TermList`s are usually found within explicit-length objects (so they have a `PkgLength`
/// elsewhere in the structure), so this takes a number of bytes to parse. A zero-length term list
/// parses no terms at all.
pub fn term_list<'a, 'c>(list_length: PkgLength) -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * TermList := Nothing | <TermObj TermList>
     */
    move |mut input: &'a [u8], mut context: &'c mut AmlContext| {
        while list_length.still_parsing(input) {
            let (new_input, new_context, _) = term_object().parse(input, context)?;
            input = new_input;
            context = new_context;
        }

        Ok((input, context, ()))
    }
}

pub fn term_object<'a, 'c>() -> impl Parser<'a, 'c, Option<AmlValue>>
where
    'c: 'a,
{
    /*
     * TermObj := NamespaceModifierObj | NamedObj | StatementOpcode | ExpressionOpcode
     */
    comment_scope(
        DebugVerbosity::AllScopes,
        "TermObj",
        choice!(
            namespace_modifier().map(|()| Ok(None)),
            named_obj().map(|()| Ok(None)),
            statement_opcode().map(|()| Ok(None)),
            expression_opcode().map(|value| Ok(Some(value)))
        ),
    )
}

pub fn namespace_modifier<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * NamespaceModifierObj := DefAlias | DefName | DefScope
     */
    choice!(def_alias(), def_name(), def_scope())
}

pub fn named_obj<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * NamedObj := DefBankField | DefCreateBitField | DefCreateByteField | DefCreateWordField | DefCreateDWordField |
     *             DefCreateQWordField | DefCreateField | DefDataRegion | DefExternal | DefOpRegion | DefPowerRes |
     *             DefProcessor | DefThermalZone | DefMethod | DefMutex | DefEvent
     *
     * XXX: DefMethod and DefMutex (at least) are not included in any rule in the AML grammar,
     * but are defined in the NamedObj section so we assume they're part of NamedObj
     */
    comment_scope(
        DebugVerbosity::AllScopes,
        "NamedObj",
        choice!(
            def_create_bit_field(),
            def_create_byte_field(),
            def_create_word_field(),
            def_create_dword_field(),
            def_create_qword_field(),
            def_create_field(),
            def_op_region(),
            def_field(),
            def_index_field(),
            def_bank_field(),
            def_method(),
            def_external(),
            def_device(),
            def_processor(),
            def_power_res(),
            def_thermal_zone(),
            def_mutex(),
            def_event()
        ),
    )
}

pub fn def_name<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefName := 0x08 NameString DataRefObject
     */
    opcode(opcode::DEF_NAME_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefName",
            name_string().then(data_ref_object()).map_with_context(|(name, data_ref_object), context| {
                try_with_context!(
                    context,
                    context.namespace.add_value_at_resolved_path(name, &context.current_scope, data_ref_object)
                );
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

pub fn def_alias<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefAlias := 0x06 NameString NameString
     *
     * The second name becomes another name for the object bound to the first: both names share
     * one handle, so a store through either is seen through the other. Aliasing a name that
     * doesn't resolve is lenient (the alias is simply not created), because tables sometimes
     * alias optional objects.
     */
    opcode(opcode::DEF_ALIAS_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefAlias",
            name_string().then(name_string()).map_with_context(|(target, alias), context| {
                match context.namespace.search(&target, &context.current_scope) {
                    Ok((_, handle)) => {
                        try_with_context!(
                            context,
                            context.namespace.add_alias_at_resolved_path(
                                alias,
                                &context.current_scope,
                                handle
                            )
                        );
                    }
                    Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => {
                        context.record_degradation(&format!("alias to unresolved name {}", target));
                    }
                    Err(err) => return (Err(Propagate::Err(err)), context),
                }
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

pub fn def_scope<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefScope := 0x10 PkgLength NameString TermList
     */
    opcode(opcode::DEF_SCOPE_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefScope",
            pkg_length()
                .then(name_string())
                .map_with_context(|(length, name), context| {
                    let previous_scope = context.current_scope.clone();
                    context.current_scope = try_with_context!(context, name.resolve(&context.current_scope));

                    context.comment(
                        DebugVerbosity::Scopes,
                        &(String::from("Scope name: ") + &context.current_scope.as_string()),
                    );

                    try_with_context!(
                        context,
                        context.namespace.add_level(context.current_scope.clone(), LevelType::Scope)
                    );

                    (Ok((length, previous_scope)), context)
                })
                .feed(|(pkg_length, previous_scope)| {
                    term_list(pkg_length).map(move |_| Ok(previous_scope.clone()))
                })
                .map_with_context(|previous_scope, context| {
                    context.current_scope = previous_scope;
                    (Ok(()), context)
                }),
        ))
        .discard_result()
}

pub fn def_create_bit_field<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefCreateBitField := 0x8d SourceBuf BitIndex NameString
     * SourceBuf := TermArg => Buffer
     * BitIndex := TermArg => Integer
     */
    opcode(opcode::DEF_CREATE_BIT_FIELD_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefCreateBitField",
            term_arg().then(term_arg()).then(name_string()).map_with_context(
                |((source, index), name), context| {
                    let source_data = try_with_context!(context, source.as_buffer(context));
                    let index = try_with_context!(context, index.as_integer(context));

                    try_with_context!(
                        context,
                        context.namespace.add_value_at_resolved_path(
                            name,
                            &context.current_scope,
                            AmlValue::BufferField { buffer_data: source_data, offset: index, length: 1 }
                        )
                    );

                    (Ok(()), context)
                },
            ),
        ))
        .discard_result()
}

pub fn def_create_byte_field<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefCreateByteField := 0x8c SourceBuf ByteIndex NameString
     * SourceBuf := TermArg => Buffer
     * ByteIndex := TermArg => Integer
     */
    opcode(opcode::DEF_CREATE_BYTE_FIELD_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefCreateByteField",
            term_arg().then(term_arg()).then(name_string()).map_with_context(
                |((source, index), name), context| {
                    let source_data = try_with_context!(context, source.as_buffer(context));
                    let index = try_with_context!(context, index.as_integer(context));

                    try_with_context!(
                        context,
                        context.namespace.add_value_at_resolved_path(
                            name,
                            &context.current_scope,
                            AmlValue::BufferField { buffer_data: source_data, offset: index * 8, length: 8 }
                        )
                    );

                    (Ok(()), context)
                },
            ),
        ))
        .discard_result()
}

pub fn def_create_word_field<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefCreateWordField := 0x8b SourceBuf ByteIndex NameString
     */
    opcode(opcode::DEF_CREATE_WORD_FIELD_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefCreateWordField",
            term_arg().then(term_arg()).then(name_string()).map_with_context(
                |((source, index), name), context| {
                    let source_data = try_with_context!(context, source.as_buffer(context));
                    let index = try_with_context!(context, index.as_integer(context));

                    try_with_context!(
                        context,
                        context.namespace.add_value_at_resolved_path(
                            name,
                            &context.current_scope,
                            AmlValue::BufferField { buffer_data: source_data, offset: index * 8, length: 16 }
                        )
                    );

                    (Ok(()), context)
                },
            ),
        ))
        .discard_result()
}

pub fn def_create_dword_field<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefCreateDWordField := 0x8a SourceBuf ByteIndex NameString
     */
    opcode(opcode::DEF_CREATE_DWORD_FIELD_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefCreateDWordField",
            term_arg().then(term_arg()).then(name_string()).map_with_context(
                |((source, index), name), context| {
                    let source_data = try_with_context!(context, source.as_buffer(context));
                    let index = try_with_context!(context, index.as_integer(context));

                    try_with_context!(
                        context,
                        context.namespace.add_value_at_resolved_path(
                            name,
                            &context.current_scope,
                            AmlValue::BufferField { buffer_data: source_data, offset: index * 8, length: 32 }
                        )
                    );

                    (Ok(()), context)
                },
            ),
        ))
        .discard_result()
}

pub fn def_create_qword_field<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefCreateQWordField := 0x8f SourceBuf ByteIndex NameString
     */
    opcode(opcode::DEF_CREATE_QWORD_FIELD_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefCreateQWordField",
            term_arg().then(term_arg()).then(name_string()).map_with_context(
                |((source, index), name), context| {
                    let source_data = try_with_context!(context, source.as_buffer(context));
                    let index = try_with_context!(context, index.as_integer(context));

                    try_with_context!(
                        context,
                        context.namespace.add_value_at_resolved_path(
                            name,
                            &context.current_scope,
                            AmlValue::BufferField { buffer_data: source_data, offset: index * 8, length: 64 }
                        )
                    );

                    (Ok(()), context)
                },
            ),
        ))
        .discard_result()
}

pub fn def_create_field<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefCreateField := ExtOpPrefix 0x13 SourceBuf BitIndex NumBits NameString
     * SourceBuf := TermArg => Buffer
     * BitIndex := TermArg => Integer
     * NumBits := TermArg => Integer
     */
    ext_opcode(opcode::EXT_DEF_CREATE_FIELD_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefCreateField",
            term_arg().then(term_arg()).then(term_arg()).then(name_string()).map_with_context(
                |(((source, index), num_bits), name), context| {
                    let source_data = try_with_context!(context, source.as_buffer(context));
                    let index = try_with_context!(context, index.as_integer(context));
                    let num_bits = try_with_context!(context, num_bits.as_integer(context));

                    try_with_context!(
                        context,
                        context.namespace.add_value_at_resolved_path(
                            name,
                            &context.current_scope,
                            AmlValue::BufferField { buffer_data: source_data, offset: index, length: num_bits }
                        )
                    );

                    (Ok(()), context)
                },
            ),
        ))
        .discard_result()
}

pub fn def_op_region<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefOpRegion := ExtOpPrefix 0x80 NameString RegionSpace RegionOffset RegionLen
     * RegionSpace := ByteData (where 0x00      = SystemMemory
     *                                0x01      = SystemIO
     *                                0x02      = PciConfig
     *                                0x03      = EmbeddedControl
     *                                0x04      = SMBus
     *                                0x05      = SystemCMOS
     *                                0x06      = PciBarTarget
     *                                0x07      = IPMI
     *                                0x08      = GeneralPurposeIO
     *                                0x09      = GenericSerialBus
     *                                0x80-0xff = OEM Defined)
     * ByteData := 0x00 - 0xff
     * RegionOffset := TermArg => Integer
     * RegionLen := TermArg => Integer
     */
    ext_opcode(opcode::EXT_DEF_OP_REGION_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefOpRegion",
            name_string().then(take()).then(term_arg()).then(term_arg()).map_with_context(
                |(((name, space), offset), length), context| {
                    let region = match space {
                        0x00 => RegionSpace::SystemMemory,
                        0x01 => RegionSpace::SystemIo,
                        0x02 => RegionSpace::PciConfig,
                        0x03 => RegionSpace::EmbeddedControl,
                        0x04 => RegionSpace::SMBus,
                        0x05 => RegionSpace::SystemCmos,
                        0x06 => RegionSpace::PciBarTarget,
                        0x07 => RegionSpace::IPMI,
                        0x08 => RegionSpace::GeneralPurposeIo,
                        0x09 => RegionSpace::GenericSerialBus,
                        space @ 0x80..=0xff => RegionSpace::OemDefined(space),
                        byte => return (Err(Propagate::Err(AmlError::InvalidRegionSpace(byte))), context),
                    };
                    let offset = try_with_context!(context, offset.as_integer(context));
                    let length = try_with_context!(context, length.as_integer(context));

                    /*
                     * For config-space-like regions, remember the device the region was declared
                     * under, so `_SEG`/`_BBN`/`_ADR` can be evaluated when the region is accessed.
                     */
                    let parent_device = match region {
                        RegionSpace::PciConfig | RegionSpace::IPMI | RegionSpace::GenericSerialBus => {
                            let resolved_path = try_with_context!(context, name.resolve(&context.current_scope));
                            Some(try_with_context!(context, resolved_path.parent()))
                        }
                        _ => None,
                    };

                    try_with_context!(
                        context,
                        context.namespace.add_value_at_resolved_path(
                            name,
                            &context.current_scope,
                            AmlValue::OpRegion(OpRegion::new(region, offset, length, parent_device))
                        )
                    );
                    (Ok(()), context)
                },
            ),
        ))
        .discard_result()
}

pub fn def_field<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefField = ExtOpPrefix 0x81 PkgLength NameString FieldFlags FieldList
     * FieldFlags := ByteData
     *
     * If the named op-region doesn't resolve, the whole field list is skipped (leniently), since
     * none of the field units it would declare could ever be accessed.
     */
    ext_opcode(opcode::EXT_DEF_FIELD_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefField",
            pkg_length().then(name_string()).then(take()).feed(|((list_length, region_name), flags)| {
                move |mut input: &'a [u8], mut context: &'c mut AmlContext| -> ParseResult<'a, 'c, ()> {
                    let region_handle =
                        match context.namespace.search(&region_name, &context.current_scope) {
                            Ok((_, handle)) => handle,
                            Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => {
                                context.record_degradation(&format!(
                                    "field list over unresolved region {}",
                                    region_name
                                ));
                                return take_to_end_of_pkglength(list_length)
                                    .discard_result()
                                    .parse(input, context);
                            }
                            Err(err) => return Err((input, context, Propagate::Err(err))),
                        };

                    /*
                     * FieldList := Nothing | <FieldElement FieldList>
                     */
                    let mut current_offset = 0;
                    let mut current_flags = FieldFlags::new(flags);
                    while list_length.still_parsing(input) {
                        let (new_input, new_context, (field_length, new_flags)) =
                            field_element(FieldKind::Normal { region: region_handle }, current_flags, current_offset)
                                .parse(input, context)?;
                        input = new_input;
                        context = new_context;
                        current_offset += field_length;
                        if let Some(new_flags) = new_flags {
                            current_flags = new_flags;
                        }
                    }

                    Ok((input, context, ()))
                }
            }),
        ))
        .discard_result()
}

pub fn def_index_field<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefIndexField := ExtOpPrefix 0x86 PkgLength NameString NameString FieldFlags FieldList
     *
     * The first name is the index field, the second the data field; the field units declared in
     * the list are reached by writing a byte offset through the former and transferring data
     * through the latter.
     */
    ext_opcode(opcode::EXT_DEF_INDEX_FIELD_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefIndexField",
            pkg_length().then(name_string()).then(name_string()).then(take()).feed(
                |(((list_length, index_name), data_name), flags)| {
                    move |mut input: &'a [u8], mut context: &'c mut AmlContext| -> ParseResult<'a, 'c, ()> {
                        let index_handle =
                            match context.namespace.search(&index_name, &context.current_scope) {
                                Ok((_, handle)) => handle,
                                Err(AmlError::ValueDoesNotExist(_))
                                | Err(AmlError::LevelDoesNotExist(_)) => {
                                    context.record_degradation(&format!(
                                        "index field over unresolved index register {}",
                                        index_name
                                    ));
                                    return take_to_end_of_pkglength(list_length)
                                        .discard_result()
                                        .parse(input, context);
                                }
                                Err(err) => return Err((input, context, Propagate::Err(err))),
                            };
                        let data_handle =
                            match context.namespace.search(&data_name, &context.current_scope) {
                                Ok((_, handle)) => handle,
                                Err(AmlError::ValueDoesNotExist(_))
                                | Err(AmlError::LevelDoesNotExist(_)) => {
                                    context.record_degradation(&format!(
                                        "index field over unresolved data register {}",
                                        data_name
                                    ));
                                    return take_to_end_of_pkglength(list_length)
                                        .discard_result()
                                        .parse(input, context);
                                }
                                Err(err) => return Err((input, context, Propagate::Err(err))),
                            };

                        let mut current_offset = 0;
                        let mut current_flags = FieldFlags::new(flags);
                        while list_length.still_parsing(input) {
                            let (new_input, new_context, (field_length, new_flags)) = field_element(
                                FieldKind::Index { index: index_handle, data: data_handle },
                                current_flags,
                                current_offset,
                            )
                            .parse(input, context)?;
                            input = new_input;
                            context = new_context;
                            current_offset += field_length;
                            if let Some(new_flags) = new_flags {
                                current_flags = new_flags;
                            }
                        }

                        Ok((input, context, ()))
                    }
                },
            ),
        ))
        .discard_result()
}

pub fn def_bank_field<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefBankField := ExtOpPrefix 0x87 PkgLength NameString NameString BankValue FieldFlags FieldList
     * BankValue := TermArg => Integer
     *
     * The first name is the op-region, the second the bank-selector field; accessing any declared
     * field unit first writes `BankValue` through the selector.
     */
    ext_opcode(opcode::EXT_DEF_BANK_FIELD_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefBankField",
            pkg_length().then(name_string()).then(name_string()).then(term_arg()).then(take()).feed(
                |((((list_length, region_name), bank_name), bank_value), flags)| {
                    move |mut input: &'a [u8], mut context: &'c mut AmlContext| -> ParseResult<'a, 'c, ()> {
                        let bank_value = match bank_value.as_integer(context) {
                            Ok(value) => value,
                            Err(err) => return Err((input, context, Propagate::Err(err))),
                        };

                        let region_handle =
                            match context.namespace.search(&region_name, &context.current_scope) {
                                Ok((_, handle)) => handle,
                                Err(AmlError::ValueDoesNotExist(_))
                                | Err(AmlError::LevelDoesNotExist(_)) => {
                                    context.record_degradation(&format!(
                                        "bank field over unresolved region {}",
                                        region_name
                                    ));
                                    return take_to_end_of_pkglength(list_length)
                                        .discard_result()
                                        .parse(input, context);
                                }
                                Err(err) => return Err((input, context, Propagate::Err(err))),
                            };
                        let bank_handle =
                            match context.namespace.search(&bank_name, &context.current_scope) {
                                Ok((_, handle)) => handle,
                                Err(AmlError::ValueDoesNotExist(_))
                                | Err(AmlError::LevelDoesNotExist(_)) => {
                                    context.record_degradation(&format!(
                                        "bank field over unresolved bank selector {}",
                                        bank_name
                                    ));
                                    return take_to_end_of_pkglength(list_length)
                                        .discard_result()
                                        .parse(input, context);
                                }
                                Err(err) => return Err((input, context, Propagate::Err(err))),
                            };

                        let mut current_offset = 0;
                        let mut current_flags = FieldFlags::new(flags);
                        while list_length.still_parsing(input) {
                            let (new_input, new_context, (field_length, new_flags)) = field_element(
                                FieldKind::Bank {
                                    region: region_handle,
                                    bank: bank_handle,
                                    bank_value,
                                },
                                current_flags,
                                current_offset,
                            )
                            .parse(input, context)?;
                            input = new_input;
                            context = new_context;
                            current_offset += field_length;
                            if let Some(new_flags) = new_flags {
                                current_flags = new_flags;
                            }
                        }

                        Ok((input, context, ()))
                    }
                },
            ),
        ))
        .discard_result()
}

/// Parses a `FieldElement`. Takes the current bit offset within the field list, and returns the
/// bit length of the element parsed, plus the new field flags if the element switched them (an
/// `AccessField` changes the access type for every element after it).
pub fn field_element<'a, 'c>(
    kind: FieldKind,
    flags: FieldFlags,
    current_offset: u64,
) -> impl Parser<'a, 'c, (u64, Option<FieldFlags>)>
where
    'c: 'a,
{
    /*
     * FieldElement := NamedField | ReservedField | AccessField | ExtendedAccessField |
     *                 ConnectField
     * NamedField := NameSeg PkgLength
     * ReservedField := 0x00 PkgLength
     * AccessField := 0x01 AccessType AccessAttrib
     * ConnectField := <0x02 NameString> | <0x02 BufferData>
     * ExtendedAccessField := 0x03 AccessType ExtendedAccessAttrib AccessLength
     *
     * AccessType := ByteData
     * AccessAttrib := ByteData
     *
     * The lengths here are encoded as PkgLengths, but are *bit* counts, and have nothing to do
     * with the stream; we only want the raw number.
     */

    /*
     * Reserved fields shouldn't actually be added to the namespace; they show gaps in the
     * operation region that aren't used for anything.
     */
    let reserved_field = opcode(opcode::RESERVED_FIELD)
        .then(raw_pkg_length())
        .map(|((), length)| Ok((length as u64, None)));

    let access_field = opcode(opcode::ACCESS_FIELD).then(take()).then(take()).map(
        move |(((), access_type), _access_attrib)| Ok((0, Some(flags.with_access_type(access_type)))),
    );

    let named_field = name_seg().then(raw_pkg_length()).map_with_context(move |(name_seg, length), context| {
        try_with_context!(
            context,
            context.namespace.add_value_at_resolved_path(
                AmlName::from_name_seg(name_seg),
                &context.current_scope,
                AmlValue::Field {
                    kind: kind.clone(),
                    flags,
                    offset: current_offset,
                    length: length as u64,
                },
            )
        );

        (Ok((length as u64, None)), context)
    });

    choice!(reserved_field, access_field, named_field)
}

pub fn def_method<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefMethod := 0x14 PkgLength NameString MethodFlags TermList
     * MethodFlags := ByteData (where bits 0-2: ArgCount (0 to 7)
     *                                bit 3: SerializeFlag (0 = Not Serialized, 1 = Serialized)
     *                                bits 4-7: SyncLevel (0x00 to 0x0f))
     *
     * The body is not executed here - we just remember its bytes, and parse them with fresh
     * arguments and locals each time the method is invoked.
     */
    opcode(opcode::DEF_METHOD_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefMethod",
            pkg_length()
                .then(name_string())
                .then(take())
                .feed(|((length, name), flags)| {
                    take_to_end_of_pkglength(length).map(move |code| Ok((name.clone(), flags, code)))
                })
                .map_with_context(|(name, flags, code), context| {
                    try_with_context!(
                        context,
                        context.namespace.add_value_at_resolved_path(
                            name,
                            &context.current_scope,
                            AmlValue::Method {
                                flags: MethodFlags::from(flags),
                                code: MethodCode::Aml(code.to_vec())
                            },
                        )
                    );
                    (Ok(()), context)
                }),
        ))
        .discard_result()
}

pub fn def_external<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefExternal = 0x15 NameString ObjectType ArgumentCount
     * ObjectType := ByteData
     * ArgumentCount := ByteData (0 to 7)
     *
     * These are declarations for the compiler's benefit; there's nothing for us to do with them.
     */
    opcode(opcode::DEF_EXTERNAL_OP)
        .then(comment_scope(DebugVerbosity::Scopes, "DefExternal", name_string().then(take()).then(take())))
        .discard_result()
}

pub fn def_device<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefDevice := ExtOpPrefix 0x82 PkgLength NameString TermList
     */
    ext_opcode(opcode::EXT_DEF_DEVICE_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefDevice",
            pkg_length()
                .then(name_string())
                .map_with_context(|(length, name), context| {
                    let resolved_name = try_with_context!(context, name.resolve(&context.current_scope));
                    try_with_context!(
                        context,
                        context.namespace.add_value(resolved_name.clone(), AmlValue::Device)
                    );
                    try_with_context!(
                        context,
                        context.namespace.add_level(resolved_name.clone(), LevelType::Device)
                    );

                    let previous_scope = context.current_scope.clone();
                    context.current_scope = resolved_name;

                    (Ok((length, previous_scope)), context)
                })
                .feed(|(length, previous_scope)| term_list(length).map(move |_| Ok(previous_scope.clone())))
                .map_with_context(|previous_scope, context| {
                    context.current_scope = previous_scope;
                    (Ok(()), context)
                }),
        ))
        .discard_result()
}

pub fn def_processor<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefProcessor := ExtOpPrefix 0x83 PkgLength NameString ProcID PblkAddress PblkLen TermList
     * ProcID := ByteData
     * PblkAddress := DWordData
     * PblkLen := ByteData
     */
    ext_opcode(opcode::EXT_DEF_PROCESSOR_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefProcessor",
            pkg_length()
                .then(name_string())
                .then(take())
                .then(take_u32())
                .then(take())
                .map_with_context(|((((pkg_length, name), proc_id), pblk_address), pblk_len), context| {
                    /*
                     * Legacy `Processor` objects contain data within themselves, and can also have sub-objects,
                     * so we add both a level for the sub-objects, and a value for the data.
                     */
                    let resolved_name = try_with_context!(context, name.resolve(&context.current_scope));
                    try_with_context!(
                        context,
                        context.namespace.add_level(resolved_name.clone(), LevelType::Processor)
                    );
                    try_with_context!(
                        context,
                        context.namespace.add_value(
                            resolved_name.clone(),
                            AmlValue::Processor { id: proc_id, pblk_address, pblk_len }
                        )
                    );
                    let previous_scope = context.current_scope.clone();
                    context.current_scope = resolved_name;

                    (Ok((previous_scope, pkg_length)), context)
                })
                .feed(move |(previous_scope, pkg_length)| {
                    term_list(pkg_length).map(move |_| Ok(previous_scope.clone()))
                })
                .map_with_context(|previous_scope, context| {
                    context.current_scope = previous_scope;
                    (Ok(()), context)
                }),
        ))
        .discard_result()
}

pub fn def_power_res<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefPowerRes := ExtOpPrefix 0x84 PkgLength NameString SystemLevel ResourceOrder TermList
     * SystemLevel := ByteData
     * ResourceOrder := WordData
     */
    ext_opcode(opcode::EXT_DEF_POWER_RES_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefPowerRes",
            pkg_length()
                .then(name_string())
                .then(take())
                .then(take_u16())
                .map_with_context(|(((pkg_length, name), system_level), resource_order), context| {
                    /*
                     * `PowerResource` objects contain data within themselves, and can also have sub-objects,
                     * so we add both a level for the sub-objects, and a value for the data.
                     */
                    let resolved_name = try_with_context!(context, name.resolve(&context.current_scope));
                    try_with_context!(
                        context,
                        context.namespace.add_level(resolved_name.clone(), LevelType::PowerResource)
                    );
                    try_with_context!(
                        context,
                        context.namespace.add_value(
                            resolved_name.clone(),
                            AmlValue::PowerResource { system_level, resource_order }
                        )
                    );
                    let previous_scope = context.current_scope.clone();
                    context.current_scope = resolved_name;

                    (Ok((previous_scope, pkg_length)), context)
                })
                .feed(move |(previous_scope, pkg_length)| {
                    term_list(pkg_length).map(move |_| Ok(previous_scope.clone()))
                })
                .map_with_context(|previous_scope, context| {
                    context.current_scope = previous_scope;
                    (Ok(()), context)
                }),
        ))
        .discard_result()
}

pub fn def_thermal_zone<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefThermalZone := ExtOpPrefix 0x85 PkgLength NameString TermList
     */
    ext_opcode(opcode::EXT_DEF_THERMAL_ZONE_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefThermalZone",
            pkg_length()
                .then(name_string())
                .map_with_context(|(pkg_length, name), context| {
                    let resolved_name = try_with_context!(context, name.resolve(&context.current_scope));
                    try_with_context!(
                        context,
                        context.namespace.add_value(resolved_name.clone(), AmlValue::ThermalZone)
                    );
                    try_with_context!(
                        context,
                        context.namespace.add_level(resolved_name.clone(), LevelType::ThermalZone)
                    );

                    let previous_scope = context.current_scope.clone();
                    context.current_scope = resolved_name;

                    (Ok((pkg_length, previous_scope)), context)
                })
                .feed(|(length, previous_scope)| term_list(length).map(move |_| Ok(previous_scope.clone())))
                .map_with_context(|previous_scope, context| {
                    context.current_scope = previous_scope;
                    (Ok(()), context)
                }),
        ))
        .discard_result()
}

pub fn def_mutex<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefMutex := ExtOpPrefix 0x01 NameString SyncFlags
     * SyncFlags := ByteData (where bits 0-3: SyncLevel
     *                              bits 4-7: Reserved)
     */
    ext_opcode(opcode::EXT_DEF_MUTEX_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefMutex",
            name_string().then(take()).map_with_context(|(name, sync_level), context| {
                try_with_context!(
                    context,
                    context.namespace.add_value_at_resolved_path(
                        name,
                        &context.current_scope,
                        AmlValue::Mutex { sync_level }
                    )
                );
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

pub fn def_event<'a, 'c>() -> impl Parser<'a, 'c, ()>
where
    'c: 'a,
{
    /*
     * DefEvent := ExtOpPrefix 0x02 NameString
     */
    ext_opcode(opcode::EXT_DEF_EVENT_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefEvent",
            name_string().map_with_context(|name, context| {
                try_with_context!(
                    context,
                    context.namespace.add_value_at_resolved_path(
                        name,
                        &context.current_scope,
                        AmlValue::Event { signal_count: 0 }
                    )
                );
                (Ok(()), context)
            }),
        ))
        .discard_result()
}

pub fn term_arg<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * TermArg := ExpressionOpcode | DataObject | ArgObj | LocalObj
     */
    comment_scope(
        DebugVerbosity::AllScopes,
        "TermArg",
        choice!(
            data_object(),
            arg_obj().map_with_context(|arg_num, context| {
                (Ok(try_with_context!(context, context.current_arg(arg_num)).clone()), context)
            }),
            local_obj().map_with_context(|local_num, context| {
                (Ok(try_with_context!(context, context.local(local_num)).clone()), context)
            }),
            expression_opcode()
        ),
    )
}

pub fn data_ref_object<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DataRefObject := DataObject | ObjectReference | DDBHandle
     */
    comment_scope(DebugVerbosity::AllScopes, "DataRefObject", choice!(data_object()))
}

pub fn data_object<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DataObject := DefPackage | DefVarPackage | ComputationalData
     *
     * The order of the parsers are important here, as DefPackage and DefVarPackage can be
     * accidently parsed as ComputationalDatas.
     */
    comment_scope(
        DebugVerbosity::AllScopes,
        "DataObject",
        choice!(def_package(), def_var_package(), computational_data()),
    )
}

pub fn computational_data<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * ComputationalData := ByteConst | WordConst | DWordConst | QWordConst | String |
     *                      ConstObj | RevisionOp | DefBuffer
     * ByteConst := 0x0a ByteData
     * WordConst := 0x0b WordData
     * DWordConst := 0x0c DWordData
     * QWordConst := 0x0e QWordData
     * String := 0x0d AsciiCharList NullChar
     * ConstObj := ZeroOp(0x00) | OneOp(0x01) | OnesOp(0xff)
     * RevisionOp := ExtOpPrefix(0x5b) 0x30
     */
    let const_parser = |input: &'a [u8], context: &'c mut AmlContext| {
        let string_parser = |input: &'a [u8], context| -> ParseResult<'a, 'c, AmlValue> {
            /*
             * Using `position` isn't very efficient here, but is probably fine because the
             * strings are usually quite short.
             */
            let nul_position = match input.iter().position(|&c| c == b'\0') {
                Some(position) => position,
                None => return Err((input, context, Propagate::Err(AmlError::UnterminatedStringConstant))),
            };

            let string = String::from(match str::from_utf8(&input[0..nul_position]) {
                Ok(string) => string,
                Err(_) => return Err((input, context, Propagate::Err(AmlError::InvalidStringConstant))),
            });

            Ok((&input[(nul_position + 1)..], context, AmlValue::String(string)))
        };

        let (new_input, context, op) = take().parse(input, context)?;
        match op {
            opcode::BYTE_CONST => {
                take().map(|value| Ok(AmlValue::Integer(value as u64))).parse(new_input, context)
            }
            opcode::WORD_CONST => {
                take_u16().map(|value| Ok(AmlValue::Integer(value as u64))).parse(new_input, context)
            }
            opcode::DWORD_CONST => {
                take_u32().map(|value| Ok(AmlValue::Integer(value as u64))).parse(new_input, context)
            }
            opcode::QWORD_CONST => {
                crate::parser::take_u64().map(|value| Ok(AmlValue::Integer(value))).parse(new_input, context)
            }
            opcode::STRING_PREFIX => string_parser.parse(new_input, context),
            opcode::ZERO_OP => Ok((new_input, context, AmlValue::zero())),
            opcode::ONE_OP => Ok((new_input, context, AmlValue::one())),
            opcode::ONES_OP => {
                let ones = context.ones();
                Ok((new_input, context, AmlValue::Integer(ones)))
            }

            _ => Err((input, context, Propagate::Err(AmlError::WrongParser))),
        }
    };

    comment_scope(
        DebugVerbosity::AllScopes,
        "ComputationalData",
        choice!(
            ext_opcode(opcode::EXT_REVISION_OP).map(|_| Ok(AmlValue::Integer(crate::AML_INTERPRETER_REVISION))),
            const_parser,
            def_buffer()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::*, value::FieldAccessType};

    #[test]
    fn test_computational_data() {
        let mut context = make_test_context();
        check_ok_value!(
            computational_data().parse(&[0x00, 0x34, 0x12], &mut context),
            AmlValue::Integer(0),
            &[0x34, 0x12]
        );
        check_ok_value!(
            computational_data().parse(&[0x01, 0x18, 0xf3], &mut context),
            AmlValue::Integer(1),
            &[0x18, 0xf3]
        );
        check_ok_value!(
            computational_data().parse(&[0xff, 0x98, 0xc3], &mut context),
            AmlValue::Integer(u64::MAX),
            &[0x98, 0xc3]
        );
        check_ok_value!(
            computational_data().parse(&[0x5b, 0x30], &mut context),
            AmlValue::Integer(crate::AML_INTERPRETER_REVISION),
            &[]
        );
        check_ok_value!(
            computational_data().parse(&[0x0a, 0xf3, 0x35], &mut context),
            AmlValue::Integer(0xf3),
            &[0x35]
        );
        check_ok_value!(
            computational_data().parse(&[0x0b, 0xf3, 0x35], &mut context),
            AmlValue::Integer(0x35f3),
            &[]
        );
        check_ok_value!(
            computational_data().parse(&[0x0c, 0xf3, 0x35, 0x12, 0x65, 0xff, 0x00], &mut context),
            AmlValue::Integer(0x651235f3),
            &[0xff, 0x00]
        );
        check_ok_value!(
            computational_data()
                .parse(&[0x0e, 0xf3, 0x35, 0x12, 0x65, 0xff, 0x00, 0x67, 0xde, 0x28], &mut context),
            AmlValue::Integer(0xde6700ff651235f3),
            &[0x28]
        );
        check_ok_value!(
            computational_data().parse(&[0x0d, b'A', b'B', b'C', b'D', b'\0', 0xff, 0xf5], &mut context),
            AmlValue::String(String::from("ABCD")),
            &[0xff, 0xf5]
        );
    }

    #[test]
    fn test_ones_respects_integer_width() {
        let mut context = make_test_context();
        context.set_table_revision(1);
        check_ok_value!(
            computational_data().parse(&[0xff], &mut context),
            AmlValue::Integer(0xffff_ffff),
            &[]
        );
    }

    #[test]
    fn test_def_name() {
        let mut context = make_test_context();

        // Name (FOO, 42)
        let stream = [0x08, b'F', b'O', b'O', b'_', 0x0a, 42];
        context.parse_table(&stream).unwrap();
        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\FOO_").unwrap()).unwrap(),
            &AmlValue::Integer(42)
        ));
    }

    #[test]
    fn test_def_alias() {
        let mut context = make_test_context();

        // Name (ORIG, 5) Alias (ORIG, ALIA)
        let stream = [
            &[0x08, b'O', b'R', b'I', b'G', 0x0a, 5][..],
            &[0x06, b'O', b'R', b'I', b'G', b'A', b'L', b'I', b'A'][..],
        ]
        .concat();
        context.parse_table(&stream).unwrap();

        assert_eq!(
            context.namespace.get_handle(&AmlName::from_str("\\ORIG").unwrap()).unwrap(),
            context.namespace.get_handle(&AmlName::from_str("\\ALIA").unwrap()).unwrap()
        );
    }

    #[test]
    fn test_def_scope_and_device() {
        let mut context = make_test_context();

        /*
         * Scope (_SB) { Device (PCI0) { Name (_HID, EisaId ("PNP0A03")) } }
         *
         * EisaId("PNP0A03") encodes as a DWordConst of 0x030ad041.
         */
        let device_body = [
            &[0x08, b'_', b'H', b'I', b'D', 0x0c][..],
            &0x030a_d041u32.to_le_bytes()[..],
        ]
        .concat();

        // Build the nested PkgLength-delimited structures from the inside out
        let mut device = alloc::vec![0x5b, 0x82];
        let device_payload_length = 4 + device_body.len() as u32; // NameSeg + body
        device.extend(encode_pkg_length_including_self(device_payload_length));
        device.extend(b"PCI0");
        device.extend(&device_body);

        let mut scope = alloc::vec![0x10];
        let scope_payload_length = 4 + device.len() as u32;
        scope.extend(encode_pkg_length_including_self(scope_payload_length));
        scope.extend(b"_SB_");
        scope.extend(&device);

        context.parse_table(&scope).unwrap();

        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\_SB_.PCI0").unwrap()).unwrap(),
            &AmlValue::Device
        ));
        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\_SB_.PCI0._HID").unwrap()).unwrap(),
            &AmlValue::Integer(0x030a_d041)
        ));
    }

    #[test]
    fn test_def_mutex_and_event() {
        let mut context = make_test_context();

        // Mutex (MTX, 3) Event (EVT)
        let stream = [
            &[0x5b, 0x01, b'M', b'T', b'X', b'_', 0x03][..],
            &[0x5b, 0x02, b'E', b'V', b'T', b'_'][..],
        ]
        .concat();
        context.parse_table(&stream).unwrap();

        assert!(matches!(
            context.namespace.get_by_path(&AmlName::from_str("\\MTX_").unwrap()),
            Ok(&AmlValue::Mutex { sync_level: 3 })
        ));
        assert!(matches!(
            context.namespace.get_by_path(&AmlName::from_str("\\EVT_").unwrap()),
            Ok(&AmlValue::Event { signal_count: 0 })
        ));
    }

    #[test]
    fn test_def_op_region_and_field() {
        let (mut context, _memory) = make_ram_context(16);

        /*
         * OperationRegion (GPRW, SystemMemory, 0, 16)
         * Field (GPRW, ByteAcc, NoLock, Preserve) { LOW , 8, HI , 8 }
         */
        let op_region = alloc::vec![0x5b, 0x80, b'G', b'P', b'R', b'W', 0x00, 0x0a, 0, 0x0a, 16];

        let field_list = [
            &[b'L', b'O', b'W', b'_', 8][..], // LOW, 8 bits
            &[b'H', b'I', b'_', b'_', 8][..], // HI, 8 bits
        ]
        .concat();
        let mut field = alloc::vec![0x5b, 0x81];
        field.extend(encode_pkg_length_including_self(4 + 1 + field_list.len() as u32));
        field.extend(b"GPRW");
        field.push(0x01); // ByteAcc, NoLock, Preserve
        field.extend(&field_list);

        context.parse_table(&[&op_region[..], &field[..]].concat()).unwrap();

        let low = context.namespace.get_by_path(&AmlName::from_str("\\LOW_").unwrap()).unwrap();
        match low {
            AmlValue::Field { kind: FieldKind::Normal { .. }, flags, offset, length } => {
                assert_eq!(*offset, 0);
                assert_eq!(*length, 8);
                assert_eq!(flags.access_type(), Ok(FieldAccessType::Byte));
            }
            other => panic!("LOW did not parse to a field: {:?}", other),
        }
        let hi = context.namespace.get_by_path(&AmlName::from_str("\\HI__").unwrap()).unwrap();
        match hi {
            AmlValue::Field { offset, length, .. } => {
                assert_eq!(*offset, 8);
                assert_eq!(*length, 8);
            }
            other => panic!("HI did not parse to a field: {:?}", other),
        }
    }

    #[test]
    fn test_field_over_unresolved_region_is_skipped() {
        let mut context = make_test_context();

        // Field (NOPE, ByteAcc, NoLock, Preserve) { FLD, 8 }
        let field_list = [b'F', b'L', b'D', b'_', 8];
        let mut field = alloc::vec![0x5b, 0x81];
        field.extend(encode_pkg_length_including_self(4 + 1 + field_list.len() as u32));
        field.extend(b"NOPE");
        field.push(0x01);
        field.extend(&field_list);

        context.parse_table(&field).unwrap();
        assert!(context.degradation_count() > 0);
        assert!(context.namespace.get_by_path(&AmlName::from_str("\\FLD_").unwrap()).is_err());
    }

    #[test]
    fn test_def_method_is_not_executed_at_declaration() {
        let mut context = make_test_context();

        // Method (MTH, 1) { Return (Arg0) } - the body must be stored, not run
        let body = [0xa4, 0x68];
        let mut method = alloc::vec![0x14];
        method.extend(encode_pkg_length_including_self(4 + 1 + body.len() as u32));
        method.extend(b"MTH_");
        method.push(0x01); // one argument
        method.extend(&body);

        context.parse_table(&method).unwrap();

        match context.namespace.get_by_path(&AmlName::from_str("\\MTH_").unwrap()).unwrap() {
            AmlValue::Method { flags, code: MethodCode::Aml(code) } => {
                assert_eq!(flags.arg_count(), 1);
                assert_eq!(*code, body.to_vec());
            }
            other => panic!("MTH did not parse to a method: {:?}", other),
        }
    }
}
