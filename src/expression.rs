use crate::{
    name_object::{name_string, super_name, target, Target},
    opcode::{self, ext_opcode, opcode},
    parser::{
        choice,
        comment_scope,
        n_of,
        take,
        take_to_end_of_pkglength,
        take_u16,
        try_with_context,
        Parser,
        Propagate,
    },
    pkg_length::pkg_length,
    statement::event_handle,
    term_object::{data_ref_object, term_arg},
    value::{AmlType, AmlValue, Args, ReferenceTarget},
    AmlContext,
    AmlError,
    AmlName,
    DebugVerbosity,
};
use alloc::{
    boxed::Box,
    format,
    string::{String, ToString},
    sync::Arc,
    vec,
    vec::Vec,
};
use core::{cmp::Ordering, mem};
use spinning_top::Spinlock;

pub fn expression_opcode<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * ExpressionOpcode := DefAquire | DefAdd | DefAnd | DefBuffer | DefConcat | DefConcatRes |
     *                     DefCondRefOf | DefCopyObject | DefDecrement | DefDerefOf | DefDivide |
     *                     DefFindSetLeftBit | DefFindSetRightBit | DefFromBCD | DefIncrement | DefIndex |
     *                     DefLAnd | DefLEqual | DefLGreater | DefLGreaterEqual | DefLLess | DefLLessEqual |
     *                     DefMid | DefLNot | DefLNotEqual | DefLoadTable | DefLOr | DefMatch | DefMod |
     *                     DefMultiply | DefNAnd | DefNOr | DefNot | DefObjectType | DefOr | DefPackage |
     *                     DefVarPackage | DefRefOf | DefShiftLeft | DefShiftRight | DefSizeOf | DefStore |
     *                     DefSubtract | DefTimer | DefToBCD | DefToBuffer | DefToDecimalString |
     *                     DefToHexString | DefToInteger | DefToString | DefWait | DefXOr | MethodInvocation
     */
    comment_scope(
        DebugVerbosity::AllScopes,
        "ExpressionOpcode",
        choice!(
            def_acquire(),
            def_add(),
            def_subtract(),
            def_multiply(),
            def_divide(),
            def_mod(),
            def_shift_left(),
            def_shift_right(),
            def_and(),
            def_or(),
            def_xor(),
            def_nand(),
            def_nor(),
            def_not(),
            def_find_set_left_bit(),
            def_find_set_right_bit(),
            def_increment(),
            def_decrement(),
            def_to_bcd(),
            def_from_bcd(),
            def_buffer(),
            def_package(),
            def_var_package(),
            def_concat(),
            def_concat_res(),
            def_l_and(),
            def_l_or(),
            def_l_greater_equal(),
            def_l_less_equal(),
            def_l_not_equal(),
            def_l_not(),
            def_l_equal(),
            def_l_greater(),
            def_l_less(),
            def_store(),
            def_ref_of(),
            def_cond_ref_of(),
            def_deref_of(),
            def_index(),
            def_size_of(),
            def_object_type(),
            def_match(),
            def_mid(),
            def_to_buffer(),
            def_to_integer(),
            def_to_string(),
            def_to_decimal_string(),
            def_to_hex_string(),
            def_wait(),
            method_invocation() // XXX: this must always appear last. See how we have to parse it to see why.
        ),
    )
}

/// The reference-creating expression opcodes (`RefOf`, `DerefOf`, `Index`). These can appear as
/// `SuperName`s (store destinations), so they're split out of `expression_opcode` for the name
/// parsers to use.
pub fn reference_type_opcode<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    comment_scope(
        DebugVerbosity::AllScopes,
        "ReferenceTypeOpcode",
        choice!(def_ref_of(), def_deref_of(), def_index()),
    )
}

/// Most of the arithmetic opcodes share one shape: two integer operands, a result masked to the
/// live integer width, and an optional store target.
fn binary_integer_op<'a, 'c>(
    op: u8,
    name: &'static str,
    f: fn(&mut AmlContext, u64, u64) -> Result<u64, AmlError>,
) -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    opcode(op)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            name,
            term_arg().then(term_arg()).then(target()).map_with_context(
                move |((left_arg, right_arg), target), context| {
                    let left = try_with_context!(context, left_arg.as_integer(context));
                    let right = try_with_context!(context, right_arg.as_integer(context));
                    let value = try_with_context!(context, f(context, left, right));
                    let result = AmlValue::Integer(value & context.ones());

                    try_with_context!(context, context.store(target, result.clone()));
                    (Ok(result), context)
                },
            ),
        ))
        .map(|((), result)| Ok(result))
}

/// `Not`, `FindSetLeftBit`, `FindSetRightBit`, `ToBCD`, and `FromBCD` share the unary version of
/// the same shape. `ext` selects between one-byte and `0x5b`-prefixed encodings.
fn unary_integer_op<'a, 'c>(
    op: u8,
    ext: bool,
    name: &'static str,
    f: fn(&mut AmlContext, u64) -> Result<u64, AmlError>,
) -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    let inner = move |input: &'a [u8], context: &'c mut AmlContext| {
        comment_scope(
            DebugVerbosity::AllScopes,
            name,
            term_arg().then(target()).map_with_context(move |(operand, target), context| {
                let operand = try_with_context!(context, operand.as_integer(context));
                let value = try_with_context!(context, f(context, operand));
                let result = AmlValue::Integer(value & context.ones());

                try_with_context!(context, context.store(target, result.clone()));
                (Ok(result), context)
            }),
        )
        .parse(input, context)
    };

    move |input: &'a [u8], context: &'c mut AmlContext| {
        let (input, context, ()) = if ext {
            ext_opcode(op).parse(input, context)?
        } else {
            opcode(op).parse(input, context)?
        };
        inner.parse(input, context)
    }
}

fn def_add<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefAdd := 0x72 Operand Operand Target
     * Operand := TermArg => Integer
     */
    binary_integer_op(opcode::DEF_ADD_OP, "DefAdd", |_, left, right| Ok(left.wrapping_add(right)))
}

fn def_subtract<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefSubtract := 0x74 Operand Operand Target
     */
    binary_integer_op(opcode::DEF_SUBTRACT_OP, "DefSubtract", |_, left, right| Ok(left.wrapping_sub(right)))
}

fn def_multiply<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefMultiply := 0x77 Operand Operand Target
     */
    binary_integer_op(opcode::DEF_MULTIPLY_OP, "DefMultiply", |_, left, right| Ok(left.wrapping_mul(right)))
}

fn def_mod<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefMod := 0x85 Dividend Divisor Target
     */
    binary_integer_op(opcode::DEF_MOD_OP, "DefMod", |_, left, right| {
        if right == 0 {
            return Err(AmlError::DivideByZero);
        }
        Ok(left % right)
    })
}

fn def_shift_left<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefShiftLeft := 0x79 Operand ShiftCount Target
     *
     * Shifting by the integer width or more produces zero, as it does in hardware.
     */
    binary_integer_op(opcode::DEF_SHIFT_LEFT_OP, "DefShiftLeft", |_, operand, shift_count| {
        Ok(if shift_count >= 64 { 0 } else { operand << shift_count })
    })
}

fn def_shift_right<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefShiftRight := 0x7a Operand ShiftCount Target
     */
    binary_integer_op(opcode::DEF_SHIFT_RIGHT_OP, "DefShiftRight", |_, operand, shift_count| {
        Ok(if shift_count >= 64 { 0 } else { operand >> shift_count })
    })
}

fn def_and<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefAnd := 0x7b Operand Operand Target
     */
    binary_integer_op(opcode::DEF_AND_OP, "DefAnd", |_, left, right| Ok(left & right))
}

fn def_or<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefOr := 0x7d Operand Operand Target
     */
    binary_integer_op(opcode::DEF_OR_OP, "DefOr", |_, left, right| Ok(left | right))
}

fn def_xor<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefXor := 0x7f Operand Operand Target
     */
    binary_integer_op(opcode::DEF_XOR_OP, "DefXor", |_, left, right| Ok(left ^ right))
}

fn def_nand<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefNAnd := 0x7c Operand Operand Target
     */
    binary_integer_op(opcode::DEF_NAND_OP, "DefNAnd", |_, left, right| Ok(!(left & right)))
}

fn def_nor<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefNOr := 0x7e Operand Operand Target
     */
    binary_integer_op(opcode::DEF_NOR_OP, "DefNOr", |_, left, right| Ok(!(left | right)))
}

fn def_not<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefNot := 0x80 Operand Target
     */
    unary_integer_op(opcode::DEF_NOT_OP, false, "DefNot", |_, operand| Ok(!operand))
}

fn def_find_set_left_bit<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefFindSetLeftBit := 0x81 Operand Target
     *
     * Produces the one-based position of the most significant set bit, or zero if no bit is set.
     */
    unary_integer_op(opcode::DEF_FIND_SET_LEFT_BIT_OP, false, "DefFindSetLeftBit", |_, operand| {
        Ok(64 - u64::from(operand.leading_zeros()))
    })
}

fn def_find_set_right_bit<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefFindSetRightBit := 0x82 Operand Target
     *
     * Produces the one-based position of the least significant set bit, or zero if no bit is set.
     */
    unary_integer_op(opcode::DEF_FIND_SET_RIGHT_BIT_OP, false, "DefFindSetRightBit", |_, operand| {
        Ok(if operand == 0 { 0 } else { u64::from(operand.trailing_zeros()) + 1 })
    })
}

fn def_to_bcd<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefToBCD := ExtOpPrefix 0x29 Operand Target
     */
    unary_integer_op(opcode::EXT_DEF_TO_BCD_OP, true, "DefToBCD", |_, mut operand| {
        let mut bcd = 0u64;
        let mut shift = 0;
        while operand > 0 {
            if shift >= 64 {
                return Err(AmlError::InvalidBcd(operand));
            }
            bcd |= (operand % 10) << shift;
            operand /= 10;
            shift += 4;
        }
        Ok(bcd)
    })
}

fn def_from_bcd<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefFromBCD := ExtOpPrefix 0x28 BCDValue Target
     */
    unary_integer_op(opcode::EXT_DEF_FROM_BCD_OP, true, "DefFromBCD", |_, operand| {
        let mut value = 0u64;
        for nibble_index in (0..16).rev() {
            let digit = (operand >> (nibble_index * 4)) & 0xf;
            if digit > 9 {
                return Err(AmlError::InvalidBcd(operand));
            }
            value = value * 10 + digit;
        }
        Ok(value)
    })
}

fn def_increment<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefIncrement := 0x75 SuperName
     */
    opcode(opcode::DEF_INCREMENT_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefIncrement",
            super_name().map_with_context(|addend, context| {
                let value = try_with_context!(context, context.read_target(&addend));
                let value = try_with_context!(context, value.as_integer(context));
                let new_value = AmlValue::Integer(value.wrapping_add(1) & context.ones());
                try_with_context!(context, context.store(addend, new_value.clone()));
                (Ok(new_value), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_decrement<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefDecrement := 0x76 SuperName
     */
    opcode(opcode::DEF_DECREMENT_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefDecrement",
            super_name().map_with_context(|minuend, context| {
                let value = try_with_context!(context, context.read_target(&minuend));
                let value = try_with_context!(context, value.as_integer(context));
                let new_value = AmlValue::Integer(value.wrapping_sub(1) & context.ones());
                try_with_context!(context, context.store(minuend, new_value.clone()));
                (Ok(new_value), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_divide<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefDivide := 0x78 Dividend Divisor Remainder Quotient
     * Remainder := Target
     * Quotient := Target
     *
     * The quotient is the expression's value; the remainder only escapes through its target.
     */
    opcode(opcode::DEF_DIVIDE_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefDivide",
            term_arg().then(term_arg()).then(target()).then(target()).map_with_context(
                |(((dividend, divisor), remainder_target), quotient_target), context| {
                    let dividend = try_with_context!(context, dividend.as_integer(context));
                    let divisor = try_with_context!(context, divisor.as_integer(context));
                    if divisor == 0 {
                        return (Err(Propagate::Err(AmlError::DivideByZero)), context);
                    }

                    let remainder = AmlValue::Integer(dividend % divisor);
                    let quotient = AmlValue::Integer(dividend / divisor);
                    try_with_context!(context, context.store(remainder_target, remainder));
                    try_with_context!(context, context.store(quotient_target, quotient.clone()));
                    (Ok(quotient), context)
                },
            ),
        ))
        .map(|((), result)| Ok(result))
}

pub fn def_buffer<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefBuffer := 0x11 PkgLength BufferSize ByteList
     * BufferSize := TermArg => Integer
     *
     * XXX: The spec says that zero-length buffers (e.g. the PkgLength is 0) are illegal, but
     * we've encountered them in QEMU-generated tables, so we return an empty buffer in these
     * cases.
     *
     * A buffer shorter than its declared size is zero-padded out to that size.
     */
    opcode(opcode::DEF_BUFFER_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefBuffer",
            pkg_length().then(term_arg()).feed(|(pkg_length, buffer_size)| {
                take_to_end_of_pkglength(pkg_length).map_with_context(move |bytes, context| {
                    let buffer_size = try_with_context!(context, buffer_size.as_integer(context)) as usize;

                    if buffer_size < bytes.len() {
                        return (Err(Propagate::Err(AmlError::MalformedBuffer)), context);
                    }

                    let mut buffer = vec![0; buffer_size];
                    buffer[0..bytes.len()].copy_from_slice(bytes);
                    (Ok(buffer), context)
                })
            }),
        ))
        .map(|((), buffer)| Ok(AmlValue::Buffer(Arc::new(Spinlock::new(buffer)))))
}

pub fn def_package<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefPackage := 0x12 PkgLength NumElements PackageElementList
     * NumElements := ByteData
     * PackageElementList := Nothing | <PackageElement PackageElementList>
     * PackageElement := DataRefObject | NameString
     *
     * A package declared with more elements than its initializer list provides is padded out with
     * uninitialized elements.
     */
    opcode(opcode::DEF_PACKAGE_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefPackage",
            pkg_length().then(take()).feed(|(pkg_length, num_elements)| {
                move |mut input, mut context| {
                    let mut package_contents = Vec::new();

                    while pkg_length.still_parsing(input) {
                        let (new_input, new_context, value) = package_element().parse(input, context)?;
                        input = new_input;
                        context = new_context;

                        package_contents.push(value);
                    }

                    if package_contents.len() > num_elements as usize {
                        return Err((input, context, Propagate::Err(AmlError::MalformedPackage)));
                    }
                    package_contents.resize(num_elements as usize, AmlValue::Uninitialized);

                    Ok((input, context, AmlValue::Package(Arc::new(Spinlock::new(package_contents)))))
                }
            }),
        ))
        .map(|((), package)| Ok(package))
}

pub fn def_var_package<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefVarPackage := 0x13 PkgLength VarNumElements PackageElementList
     * VarNumElements := TermArg => Integer
     *
     * Unlike `DefPackage`, the element count is computed at evaluation time, and may exceed 255.
     */
    opcode(opcode::DEF_VAR_PACKAGE_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefVarPackage",
            pkg_length().then(term_arg()).feed(|(pkg_length, num_elements)| {
                move |mut input, mut context: &'c mut AmlContext| {
                    let num_elements = match num_elements.as_integer(context) {
                        Ok(num_elements) => num_elements as usize,
                        Err(err) => return Err((input, context, Propagate::Err(err))),
                    };

                    let mut package_contents = Vec::new();
                    while pkg_length.still_parsing(input) {
                        let (new_input, new_context, value) = package_element().parse(input, context)?;
                        input = new_input;
                        context = new_context;

                        package_contents.push(value);
                    }

                    if package_contents.len() < num_elements {
                        package_contents.resize(num_elements, AmlValue::Uninitialized);
                    }

                    Ok((input, context, AmlValue::Package(Arc::new(Spinlock::new(package_contents)))))
                }
            }),
        ))
        .map(|((), package)| Ok(package))
}

pub fn package_element<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * Name elements are left unresolved: some of them refer to objects that don't exist until a
     * later table is loaded, and consumers (e.g. `Match`, or the OS inspecting a returned
     * package) see them as strings.
     */
    choice!(data_ref_object(), name_string().map(|string| Ok(AmlValue::String(string.as_string()))))
}

fn def_concat<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefConcat := 0x73 Data Data Target
     * Data := TermArg => ComputationalData
     *
     * The type of the first operand picks the behaviour: integers concatenate into a buffer of
     * their bytes, buffers append, strings append (with the second operand converted to a string
     * if needed).
     */
    opcode(opcode::DEF_CONCAT_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefConcat",
            term_arg().then(term_arg()).then(target()).map_with_context(|((left, right), target), context| {
                let result = match left {
                    AmlValue::Integer(left) => {
                        let right = try_with_context!(context, right.as_integer(context));

                        let mut buffer = Vec::with_capacity(mem::size_of::<u64>() * 2);
                        buffer.extend_from_slice(&left.to_le_bytes());
                        buffer.extend_from_slice(&right.to_le_bytes());

                        AmlValue::Buffer(Arc::new(Spinlock::new(buffer)))
                    }
                    AmlValue::Buffer(ref left_data) => {
                        let mut new: Vec<u8> = left_data.lock().clone();
                        let right = try_with_context!(context, right.as_buffer(context));
                        new.extend_from_slice(right.lock().as_slice());
                        AmlValue::Buffer(Arc::new(Spinlock::new(new)))
                    }
                    AmlValue::String(left) => {
                        let right = try_with_context!(context, right.as_string(context));
                        AmlValue::String(left + &right)
                    }
                    other => {
                        return (
                            Err(Propagate::Err(AmlError::IncompatibleValueConversion {
                                current: other.type_of(),
                                target: AmlType::Buffer,
                            })),
                            context,
                        )
                    }
                };

                try_with_context!(context, context.store(target, result.clone()));
                (Ok(result), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_concat_res<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefConcatRes := 0x84 BufData BufData Target
     * BufData := TermArg => Buffer
     *
     * `left` and `right` are buffers of resource descriptors. To concatenate them, we need to
     * strip off the end tags (2 bytes from each buffer), and then add our own end tag.
     */
    opcode(opcode::DEF_CONCAT_RES_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefConcatRes",
            term_arg().then(term_arg()).then(target()).map_with_context(|((left, right), target), context| {
                let left: Vec<u8> = {
                    let data = try_with_context!(context, left.as_buffer(context));
                    let copied = data.lock().clone();
                    copied
                };
                let right: Vec<u8> = {
                    let data = try_with_context!(context, right.as_buffer(context));
                    let copied = data.lock().clone();
                    copied
                };

                if left.len() == 1 || right.len() == 1 {
                    return (Err(Propagate::Err(AmlError::MalformedBuffer)), context);
                }

                /*
                 * XXX: either buffer may be empty (contains no tags), so the arithmetic has to be
                 * careful.
                 */
                let mut result =
                    Vec::with_capacity(left.len().saturating_sub(2) + right.len().saturating_sub(2) + 2);
                result.extend_from_slice(if left.is_empty() { &[] } else { &left[..(left.len() - 2)] });
                result.extend_from_slice(if right.is_empty() { &[] } else { &right[..(right.len() - 2)] });

                /*
                 * Construct a new end tag, including a new checksum:
                 *    | Bits        | Field             | Value                     |
                 *    |-------------|-------------------|---------------------------|
                 *    | 0-2         | Length - n bytes  | 1 (for checksum)          |
                 *    | 3-6         | Small item type   | 0x0f = end tag descriptor |
                 *    | 7           | 0 = small item    | 0                         |
                 */
                result.push(0b01111001);
                result.push(result.iter().fold(0u8, |checksum, byte| checksum.wrapping_add(*byte)).wrapping_neg());

                let result = AmlValue::Buffer(Arc::new(Spinlock::new(result)));
                try_with_context!(context, context.store(target, result.clone()));
                (Ok(result), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_l_and<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefLAnd := 0x90 Operand Operand
     * Operand := TermArg => Integer
     */
    opcode(opcode::DEF_L_AND_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefLAnd",
            term_arg().then(term_arg()).map_with_context(|(left_arg, right_arg), context| {
                let left = try_with_context!(context, left_arg.as_integer(context));
                let right = try_with_context!(context, right_arg.as_integer(context));
                (Ok(AmlValue::Boolean(left != 0 && right != 0)), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_l_or<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefLOr := 0x91 Operand Operand
     */
    opcode(opcode::DEF_L_OR_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefLOr",
            term_arg().then(term_arg()).map_with_context(|(left_arg, right_arg), context| {
                let left = try_with_context!(context, left_arg.as_integer(context));
                let right = try_with_context!(context, right_arg.as_integer(context));
                (Ok(AmlValue::Boolean(left != 0 || right != 0)), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_l_not<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefLNot := 0x92 Operand
     *
     * Must be tried after the two-byte `0x92`-prefixed comparisons, which would otherwise be
     * mis-parsed as an `LNot` of a comparison.
     */
    opcode(opcode::DEF_L_NOT_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefLNot",
            term_arg().map_with_context(|operand, context| {
                let operand = try_with_context!(context, operand.as_integer(context));
                (Ok(AmlValue::Boolean(operand == 0)), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_l_equal<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefLEqual := 0x93 Operand Operand
     */
    opcode(opcode::DEF_L_EQUAL_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefLEqual",
            term_arg().then(term_arg()).map_with_context(|(left_arg, right_arg), context| {
                let ord = try_with_context!(context, left_arg.cmp(right_arg, context));
                (Ok(AmlValue::Boolean(ord == Ordering::Equal)), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_l_greater<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefLGreater := 0x94 Operand Operand
     */
    opcode(opcode::DEF_L_GREATER_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefLGreater",
            term_arg().then(term_arg()).map_with_context(|(left_arg, right_arg), context| {
                let ord = try_with_context!(context, left_arg.cmp(right_arg, context));
                (Ok(AmlValue::Boolean(ord == Ordering::Greater)), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_l_less<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefLLess := 0x95 Operand Operand
     */
    opcode(opcode::DEF_L_LESS_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefLLess",
            term_arg().then(term_arg()).map_with_context(|(left_arg, right_arg), context| {
                let ord = try_with_context!(context, left_arg.cmp(right_arg, context));
                (Ok(AmlValue::Boolean(ord == Ordering::Less)), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_l_greater_equal<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefLGreaterEqual := LNotOp(0x92) LLessOp(0x95) Operand Operand
     */
    opcode(opcode::DEF_L_NOT_OP)
        .then(opcode(opcode::DEF_L_LESS_OP))
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefLGreaterEqual",
            term_arg().then(term_arg()).map_with_context(|(left_arg, right_arg), context| {
                let ord = try_with_context!(context, left_arg.cmp(right_arg, context));
                (Ok(AmlValue::Boolean(ord != Ordering::Less)), context)
            }),
        ))
        .map(|(((), ()), result)| Ok(result))
}

fn def_l_less_equal<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefLLessEqual := LNotOp(0x92) LGreaterOp(0x94) Operand Operand
     */
    opcode(opcode::DEF_L_NOT_OP)
        .then(opcode(opcode::DEF_L_GREATER_OP))
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefLLessEqual",
            term_arg().then(term_arg()).map_with_context(|(left_arg, right_arg), context| {
                let ord = try_with_context!(context, left_arg.cmp(right_arg, context));
                (Ok(AmlValue::Boolean(ord != Ordering::Greater)), context)
            }),
        ))
        .map(|(((), ()), result)| Ok(result))
}

fn def_l_not_equal<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefLNotEqual := LNotOp(0x92) LEqualOp(0x93) Operand Operand
     */
    opcode(opcode::DEF_L_NOT_OP)
        .then(opcode(opcode::DEF_L_EQUAL_OP))
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefLNotEqual",
            term_arg().then(term_arg()).map_with_context(|(left_arg, right_arg), context| {
                let ord = try_with_context!(context, left_arg.cmp(right_arg, context));
                (Ok(AmlValue::Boolean(ord != Ordering::Equal)), context)
            }),
        ))
        .map(|(((), ()), result)| Ok(result))
}

fn def_store<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefStore := 0x70 TermArg SuperName
     *
     * Implicit conversion is only applied when the destination target is a `Name` - not when we
     * are storing into a method local or argument (these stores are semantically identical to
     * CopyObject). We must also make sure to return a copy of the data that is in the destination
     * after the store (as opposed to the data we think we put into it), because some stores can
     * alter the data during the store.
     */
    opcode(opcode::DEF_STORE_OP)
        .then(comment_scope(DebugVerbosity::Scopes, "DefStore", term_arg().then(super_name())))
        .map_with_context(|((), (value, target)), context| {
            (Ok(try_with_context!(context, context.store(target, value))), context)
        })
}

fn def_ref_of<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefRefOf := 0x71 SuperName
     *
     * Creates a reference to the target *without* evaluating it.
     */
    opcode(opcode::DEF_REF_OF_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefRefOf",
            super_name().map_with_context(|target, context| {
                let reference = match target {
                    Target::Name(ref path) => {
                        match context.namespace.search(path, &context.current_scope) {
                            Ok((_, handle)) => AmlValue::ObjectReference {
                                index: None,
                                target: ReferenceTarget::Named(handle),
                            },
                            Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => {
                                context.record_degradation(&format!("RefOf unresolved name {}", path));
                                AmlValue::Uninitialized
                            }
                            Err(err) => return (Err(Propagate::Err(err)), context),
                        }
                    }
                    Target::Arg(arg_num) => {
                        AmlValue::ObjectReference { index: None, target: ReferenceTarget::Arg(arg_num) }
                    }
                    Target::Local(local_num) => {
                        AmlValue::ObjectReference { index: None, target: ReferenceTarget::Local(local_num) }
                    }
                    // RefOf(Index(...)) and friends are already references
                    Target::Reference(reference) => reference,
                    Target::Null | Target::Debug => {
                        return (Err(Propagate::Err(AmlError::InvalidTarget)), context)
                    }
                };
                (Ok(reference), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_cond_ref_of<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefCondRefOf := ExtOpPrefix 0x12 SuperName Target
     *
     * Produces whether the name exists, instead of faulting when it doesn't - AML uses this to
     * probe for optional objects, so an unresolved name here is *not* a degradation.
     */
    ext_opcode(opcode::EXT_DEF_COND_REF_OF_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefCondRefOf",
            super_name().then(target()).map_with_context(|(source, result_target), context| {
                let reference = match source {
                    Target::Name(ref path) => {
                        match context.namespace.search(path, &context.current_scope) {
                            Ok((_, handle)) => Some(AmlValue::ObjectReference {
                                index: None,
                                target: ReferenceTarget::Named(handle),
                            }),
                            Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => None,
                            Err(err) => return (Err(Propagate::Err(err)), context),
                        }
                    }
                    Target::Arg(arg_num) => {
                        Some(AmlValue::ObjectReference { index: None, target: ReferenceTarget::Arg(arg_num) })
                    }
                    Target::Local(local_num) => Some(AmlValue::ObjectReference {
                        index: None,
                        target: ReferenceTarget::Local(local_num),
                    }),
                    Target::Reference(reference) => Some(reference),
                    Target::Null | Target::Debug => None,
                };

                match reference {
                    Some(reference) => {
                        try_with_context!(context, context.store(result_target, reference));
                        (Ok(AmlValue::Boolean(true)), context)
                    }
                    None => (Ok(AmlValue::Boolean(false)), context),
                }
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_deref_of<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefDerefOf := 0x83 ObjReference
     * ObjReference := TermArg => ObjectReference | String
     *
     * A string operand is treated as a name path to resolve (the result of storing a name into
     * something, or a package element that named an object).
     */
    opcode(opcode::DEF_DEREF_OF_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefDerefOf",
            term_arg().map_with_context(|reference, context| {
                let value = match reference {
                    reference @ AmlValue::ObjectReference { .. } => {
                        try_with_context!(context, context.read_reference(reference))
                    }
                    AmlValue::String(name) => {
                        let path = try_with_context!(context, AmlName::from_str(&name));
                        match context.namespace.search(&path, &context.current_scope) {
                            Ok((_, handle)) => {
                                try_with_context!(context, context.namespace.get(handle)).clone()
                            }
                            Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => {
                                context.record_degradation(&format!("DerefOf unresolved name {}", name));
                                AmlValue::Uninitialized
                            }
                            Err(err) => return (Err(Propagate::Err(err)), context),
                        }
                    }
                    other => {
                        return (
                            Err(Propagate::Err(AmlError::TypeCannotBeDereferenced(other.type_of()))),
                            context,
                        )
                    }
                };
                (Ok(value), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_index<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefIndex := 0x88 BuffPkgStrObj IndexValue Target
     * BuffPkgStrObj := TermArg => Buffer | Package | String
     * IndexValue := TermArg => Integer
     *
     * The result is a *reference* to the element, not the element itself: buffers and packages
     * share their contents between every value that refers to them, so a later store through the
     * reference mutates the original object.
     */
    opcode(opcode::DEF_INDEX_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefIndex",
            term_arg().then(term_arg()).then(target()).map_with_context(
                |((source, index), result_target), context| {
                    let index = try_with_context!(context, index.as_integer(context));

                    let reference = match source {
                        source @ (AmlValue::Buffer(_) | AmlValue::Package(_) | AmlValue::String(_)) => {
                            AmlValue::ObjectReference {
                                index: Some(index),
                                target: ReferenceTarget::Value(Box::new(source)),
                            }
                        }
                        other => {
                            return (
                                Err(Propagate::Err(AmlError::TypeCannotBeIndexed(other.type_of()))),
                                context,
                            )
                        }
                    };

                    try_with_context!(context, context.store(result_target, reference.clone()));
                    (Ok(reference), context)
                },
            ),
        ))
        .map(|((), result)| Ok(result))
}

fn def_size_of<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefSizeOf := 0x87 SuperName
     *
     * The size of a buffer in bytes, a string in characters (excluding the terminator), or a
     * package in elements.
     */
    opcode(opcode::DEF_SIZE_OF_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefSizeOf",
            super_name().map_with_context(|target, context| {
                let value = try_with_context!(context, context.read_target(&target));
                let size = match value {
                    AmlValue::Buffer(data) => data.lock().len() as u64,
                    AmlValue::String(string) => string.len() as u64,
                    AmlValue::Package(elements) => elements.lock().len() as u64,
                    other => {
                        return (Err(Propagate::Err(AmlError::TypeCannotBeSized(other.type_of()))), context)
                    }
                };
                (Ok(AmlValue::Integer(size)), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_object_type<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefObjectType := 0x8e <SimpleName | DebugObj | RefOfOp | DerefOfOp | IndexOp>
     *
     * The numeric type codes are fixed by the spec (§19.6.102).
     */
    opcode(opcode::DEF_OBJECT_TYPE_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefObjectType",
            super_name().map_with_context(|target, context| {
                let code = match target {
                    Target::Debug => 16,
                    ref target => {
                        let value = try_with_context!(context, context.read_target(target));
                        object_type_code(value.type_of())
                    }
                };
                (Ok(AmlValue::Integer(code)), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn object_type_code(typ: AmlType) -> u64 {
    match typ {
        AmlType::Uninitialized => 0,
        AmlType::Integer => 1,
        AmlType::String => 2,
        AmlType::Buffer => 3,
        AmlType::Package => 4,
        AmlType::FieldUnit => 5,
        AmlType::Device => 6,
        AmlType::Event => 7,
        AmlType::Method => 8,
        AmlType::Mutex => 9,
        AmlType::OpRegion => 10,
        AmlType::PowerResource => 11,
        AmlType::Processor => 12,
        AmlType::ThermalZone => 13,
        AmlType::BufferField => 14,
        AmlType::DdbHandle => 15,
        AmlType::DebugObject => 16,
        AmlType::ObjReference => 1, // references are transparent to ObjectType
        AmlType::RawDataBuffer => 3,
    }
}

fn def_match<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefMatch := 0x89 SearchPkg MatchOpcode Operand MatchOpcode Operand StartIndex
     * SearchPkg := TermArg => Package
     * MatchOpcode := ByteData (0 = MTR, 1 = MEQ, 2 = MLE, 3 = MLT, 4 = MGE, 5 = MGT)
     * StartIndex := TermArg => Integer
     *
     * Scans the package from `StartIndex`, returning the index of the first element that
     * satisfies both relational predicates, or Ones if no element does. Uninitialized elements
     * never match.
     */
    opcode(opcode::DEF_MATCH_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefMatch",
            term_arg().then(take()).then(term_arg()).then(take()).then(term_arg()).then(term_arg()).map_with_context(
                |(((((search_pkg, op_1), operand_1), op_2), operand_2), start_index), context| {
                    let elements: Vec<AmlValue> = match search_pkg {
                        AmlValue::Package(ref elements) => elements.lock().clone(),
                        other => {
                            return (
                                Err(Propagate::Err(AmlError::IncompatibleValueConversion {
                                    current: other.type_of(),
                                    target: AmlType::Package,
                                })),
                                context,
                            )
                        }
                    };
                    let start_index = try_with_context!(context, start_index.as_integer(context)) as usize;

                    for (i, element) in elements.iter().enumerate().skip(start_index) {
                        let matches_1 =
                            try_with_context!(context, match_element(element, op_1, &operand_1, context));
                        if !matches_1 {
                            continue;
                        }
                        let matches_2 =
                            try_with_context!(context, match_element(element, op_2, &operand_2, context));
                        if matches_2 {
                            return (Ok(AmlValue::Integer(i as u64)), context);
                        }
                    }

                    let ones = context.ones();
                    (Ok(AmlValue::Integer(ones)), context)
                },
            ),
        ))
        .map(|((), result)| Ok(result))
}

fn match_element(
    element: &AmlValue,
    match_opcode: u8,
    operand: &AmlValue,
    context: &mut AmlContext,
) -> Result<bool, AmlError> {
    if match_opcode == opcode::MATCH_MTR {
        return Ok(true);
    }

    // Elements that can't be compared to the operand simply don't match
    let ordering = match element.cmp(operand.clone(), context) {
        Ok(ordering) => ordering,
        Err(AmlError::TypeCannotBeCompared(_)) => return Ok(false),
        Err(err) => return Err(err),
    };

    match match_opcode {
        opcode::MATCH_MEQ => Ok(ordering == Ordering::Equal),
        opcode::MATCH_MLE => Ok(ordering != Ordering::Greater),
        opcode::MATCH_MLT => Ok(ordering == Ordering::Less),
        opcode::MATCH_MGE => Ok(ordering != Ordering::Less),
        opcode::MATCH_MGT => Ok(ordering == Ordering::Greater),
        other => Err(AmlError::InvalidMatchOpcode(other)),
    }
}

fn def_mid<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefMid := 0x9e MidObj TermArg TermArg Target
     * MidObj := TermArg => Buffer | String
     */
    opcode(opcode::DEF_MID_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefMid",
            term_arg().then(term_arg()).then(term_arg()).then(target()).map_with_context(
                |(((source, index), length), target), context| {
                    let index = try_with_context!(context, index.as_integer(context)) as usize;
                    let length = try_with_context!(context, length.as_integer(context)) as usize;

                    let result = match source {
                        AmlValue::Buffer(ref data) => {
                            let data = data.lock();
                            let slice = if index >= data.len() {
                                &[]
                            } else if index + length >= data.len() {
                                &data[index..]
                            } else {
                                &data[index..(index + length)]
                            };
                            AmlValue::Buffer(Arc::new(Spinlock::new(slice.to_vec())))
                        }
                        /*
                         * XXX: The spec conflates characters and bytes, so we effectively ignore unicode and do
                         * this bytewise, to hopefully match other implementations.
                         */
                        AmlValue::String(ref string) => {
                            let result = if index >= string.len() {
                                String::new()
                            } else if index + length >= string.len() {
                                string[index..].to_string()
                            } else {
                                string[index..(index + length)].to_string()
                            };
                            AmlValue::String(result)
                        }
                        other => {
                            return (Err(Propagate::Err(AmlError::TypeCannotBeSliced(other.type_of()))), context)
                        }
                    };

                    try_with_context!(context, context.store(target, result.clone()));
                    (Ok(result), context)
                },
            ),
        ))
        .map(|((), result)| Ok(result))
}

fn def_to_buffer<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefToBuffer := 0x96 Operand Target
     */
    opcode(opcode::DEF_TO_BUFFER_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefToBuffer",
            term_arg().then(target()).map_with_context(|(operand, target), context| {
                let bytes: Vec<u8> = {
                    let data = try_with_context!(context, operand.as_buffer(context));
                    let copied = data.lock().clone();
                    copied
                };
                let result = AmlValue::Buffer(Arc::new(Spinlock::new(bytes)));
                try_with_context!(context, context.store(target, result.clone()));
                (Ok(result), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_to_integer<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefToInteger := 0x99 Operand Target
     *
     * Strings are parsed as decimal, or hexadecimal with a `0x` prefix - unlike the implicit
     * string conversion, which isn't defined at all.
     */
    opcode(opcode::DEF_TO_INTEGER_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefToInteger",
            term_arg().then(target()).map_with_context(|(operand, target), context| {
                let result = match operand {
                    AmlValue::String(ref string) => {
                        let parsed = if let Some(hex) = string.strip_prefix("0x") {
                            u64::from_str_radix(hex, 16)
                        } else {
                            string.parse::<u64>()
                        };
                        match parsed {
                            Ok(value) => AmlValue::Integer(value),
                            Err(_) => {
                                return (
                                    Err(Propagate::Err(AmlError::IncompatibleValueConversion {
                                        current: AmlType::String,
                                        target: AmlType::Integer,
                                    })),
                                    context,
                                )
                            }
                        }
                    }
                    ref operand => {
                        AmlValue::Integer(try_with_context!(context, operand.as_integer(context)))
                    }
                };
                try_with_context!(context, context.store(target, result.clone()));
                (Ok(result), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_to_string<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefToString := 0x9c TermArg LengthArg Target
     * TermArg := Buffer
     * LengthArg := TermArg => Integer
     *
     * Takes bytes from the buffer until a NUL, the requested length, or the end of the buffer,
     * whichever comes first. A length of Ones means "no limit".
     */
    opcode(opcode::DEF_TO_STRING_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefToString",
            term_arg().then(term_arg()).then(target()).map_with_context(
                |((source, length), target), context| {
                    let length = try_with_context!(context, length.as_integer(context)) as usize;
                    let bytes: Vec<u8> = {
                        let data = try_with_context!(context, source.as_buffer(context));
                        let copied = data.lock().clone();
                        copied
                    };

                    let taken: Vec<u8> = bytes
                        .into_iter()
                        .take(length)
                        .take_while(|&byte| byte != b'\0')
                        .collect();
                    let string = match String::from_utf8(taken) {
                        Ok(string) => string,
                        Err(_) => {
                            return (Err(Propagate::Err(AmlError::InvalidStringConstant)), context)
                        }
                    };

                    let result = AmlValue::String(string);
                    try_with_context!(context, context.store(target, result.clone()));
                    (Ok(result), context)
                },
            ),
        ))
        .map(|((), result)| Ok(result))
}

fn def_to_decimal_string<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefToDecimalString := 0x97 Operand Target
     */
    opcode(opcode::DEF_TO_DECIMAL_STRING_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefToDecimalString",
            term_arg().then(target()).map_with_context(|(operand, target), context| {
                let string = match operand {
                    AmlValue::Integer(value) => value.to_string(),
                    AmlValue::Buffer(ref data) => {
                        let data = data.lock();
                        let mut string = String::new();
                        for (i, byte) in data.iter().enumerate() {
                            if i > 0 {
                                string.push(',');
                            }
                            string += &byte.to_string();
                        }
                        string
                    }
                    AmlValue::String(string) => string,
                    ref operand => {
                        try_with_context!(context, operand.as_integer(context)).to_string()
                    }
                };
                let result = AmlValue::String(string);
                try_with_context!(context, context.store(target, result.clone()));
                (Ok(result), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_to_hex_string<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefToHexString := 0x98 Operand Target
     */
    opcode(opcode::DEF_TO_HEX_STRING_OP)
        .then(comment_scope(
            DebugVerbosity::AllScopes,
            "DefToHexString",
            term_arg().then(target()).map_with_context(|(operand, target), context| {
                let string = match operand {
                    AmlValue::Integer(value) => format!("0x{:X}", value),
                    AmlValue::Buffer(ref data) => {
                        let data = data.lock();
                        let mut string = String::new();
                        for (i, byte) in data.iter().enumerate() {
                            if i > 0 {
                                string.push(',');
                            }
                            string += &format!("0x{:02X}", byte);
                        }
                        string
                    }
                    AmlValue::String(string) => string,
                    ref operand => {
                        format!("0x{:X}", try_with_context!(context, operand.as_integer(context)))
                    }
                };
                let result = AmlValue::String(string);
                try_with_context!(context, context.store(target, result.clone()));
                (Ok(result), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_acquire<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefAcquire := ExtOpPrefix 0x23 MutexObject Timeout
     * MutexObject := SuperName
     * Timeout := WordData
     *
     * Entry into the interpreter is serialized by the host, so there's never anything for an
     * AML-level mutex to wait on: acquisition succeeds immediately (the result is "did not time
     * out"). This changes observable timing for AML that expects contention, which can't arise
     * here.
     */
    ext_opcode(opcode::EXT_DEF_ACQUIRE_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefAcquire",
            super_name().then(take_u16()).map_with_context(|(target, _timeout), context| {
                let mutex = try_with_context!(context, context.read_target(&target));
                if mutex.type_of() != AmlType::Mutex {
                    context.record_degradation("acquire of something that is not a mutex");
                }
                (Ok(AmlValue::Boolean(false)), context)
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn def_wait<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * DefWait := ExtOpPrefix 0x25 EventObject Operand
     * EventObject := SuperName
     * Operand := TermArg => Integer (timeout in milliseconds)
     *
     * Non-blocking: a pending signal is consumed and the wait "succeeds"; otherwise it reports a
     * timeout immediately, regardless of the requested timeout.
     */
    ext_opcode(opcode::EXT_DEF_WAIT_OP)
        .then(comment_scope(
            DebugVerbosity::Scopes,
            "DefWait",
            super_name().then(term_arg()).map_with_context(|(target, timeout), context| {
                let _timeout = try_with_context!(context, timeout.as_integer(context));

                match event_handle(&target, context) {
                    Ok(Some(handle)) => {
                        if let Ok(AmlValue::Event { signal_count }) = context.namespace.get_mut(handle) {
                            if *signal_count > 0 {
                                *signal_count -= 1;
                                return (Ok(AmlValue::Boolean(false)), context);
                            }
                        }
                        (Ok(AmlValue::Boolean(true)), context)
                    }
                    Ok(None) => {
                        context.record_degradation("wait on something that is not an event");
                        (Ok(AmlValue::Boolean(true)), context)
                    }
                    Err(err) => (Err(Propagate::Err(err)), context),
                }
            }),
        ))
        .map(|((), result)| Ok(result))
}

fn method_invocation<'a, 'c>() -> impl Parser<'a, 'c, AmlValue>
where
    'c: 'a,
{
    /*
     * MethodInvocation := NameString TermArgList
     *
     * MethodInvocation is the worst of the AML structures, because you're meant to figure out how much you're
     * meant to parse using the name of the method (by knowing from its definition how many arguments it
     * takes). However, the definition of a method can in theory appear after an invocation of that method, and
     * so parsing them properly can be very difficult.
     * NOTE: We don't support the case of the definition appearing after the invocation.
     *
     * A name that doesn't resolve at all yields an inert `Uninitialized` (recorded as a
     * degradation): plenty of firmware references objects that are only present on some variants
     * of the machine, and aborting the whole evaluation for those would be worse.
     */
    comment_scope(
        DebugVerbosity::Scopes,
        "MethodInvocation",
        name_string()
            .map_with_context(move |name, context| {
                match context.namespace.search(&name, &context.current_scope) {
                    Ok((full_path, handle)) => {
                        /*
                         * `None` if the path is not a method and so doesn't have arguments, or
                         * `Some(the number of arguments to parse)` if it's a method.
                         */
                        let num_args = if let AmlValue::Method { flags, .. } =
                            try_with_context!(context, context.namespace.get(handle))
                        {
                            Some(flags.arg_count())
                        } else {
                            None
                        };
                        (Ok((Some(full_path), num_args)), context)
                    }
                    Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => {
                        context.record_degradation(&format!("reference to unresolved name {}", name));
                        (Ok((None, None)), context)
                    }
                    Err(err) => (Err(Propagate::Err(err)), context),
                }
            })
            .feed(|(path, num_args)| {
                n_of(term_arg(), num_args.unwrap_or(0) as usize).map_with_context(move |arg_list, context| {
                    match path {
                        Some(ref path) => {
                            let args = try_with_context!(context, Args::from_list(arg_list));
                            let result = context.invoke_method(path, args);
                            (Ok(try_with_context!(context, result)), context)
                        }
                        None => (Ok(AmlValue::Uninitialized), context),
                    }
                })
            }),
    )
}
