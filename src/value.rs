use crate::{
    misc::{ArgNum, LocalNum},
    namespace::AmlHandle,
    opregion::OpRegion,
    AmlContext,
    AmlError,
};
use alloc::{
    format,
    rc::Rc,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use bit_field::BitField;
use byteorder::{ByteOrder, LittleEndian};
use core::{cmp, fmt};
use spinning_top::Spinlock;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldAccessType {
    Any,
    Byte,
    Word,
    DWord,
    QWord,
    Buffer,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldUpdateRule {
    Preserve,
    WriteAsOnes,
    WriteAsZeros,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FieldFlags(u8);

impl FieldFlags {
    pub fn new(value: u8) -> FieldFlags {
        FieldFlags(value)
    }

    pub fn access_type(&self) -> Result<FieldAccessType, AmlError> {
        match self.0.get_bits(0..4) {
            0 => Ok(FieldAccessType::Any),
            1 => Ok(FieldAccessType::Byte),
            2 => Ok(FieldAccessType::Word),
            3 => Ok(FieldAccessType::DWord),
            4 => Ok(FieldAccessType::QWord),
            5 => Ok(FieldAccessType::Buffer),
            _ => Err(AmlError::InvalidFieldFlags),
        }
    }

    /// `AccessField` elements in a field list switch the access type for the field units that
    /// follow them; this constructs the flags those later units should carry.
    pub fn with_access_type(self, access_type: u8) -> FieldFlags {
        let mut value = self.0;
        value.set_bits(0..4, access_type & 0x0f);
        FieldFlags(value)
    }

    pub fn lock_rule(&self) -> bool {
        self.0.get_bit(4)
    }

    pub fn field_update_rule(&self) -> Result<FieldUpdateRule, AmlError> {
        match self.0.get_bits(5..7) {
            0 => Ok(FieldUpdateRule::Preserve),
            1 => Ok(FieldUpdateRule::WriteAsOnes),
            2 => Ok(FieldUpdateRule::WriteAsZeros),
            _ => Err(AmlError::InvalidFieldFlags),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MethodFlags(u8);

impl MethodFlags {
    pub fn new(arg_count: u8, serialize: bool, sync_level: u8) -> MethodFlags {
        assert!(arg_count <= 7);
        assert!(sync_level <= 15);

        let mut value = 0;
        value.set_bits(0..3, arg_count);
        value.set_bit(3, serialize);
        value.set_bits(4..8, sync_level);
        MethodFlags(value)
    }

    pub fn from(value: u8) -> MethodFlags {
        MethodFlags(value)
    }

    pub fn arg_count(&self) -> u8 {
        self.0.get_bits(0..3)
    }

    pub fn serialize(&self) -> bool {
        self.0.get_bit(3)
    }

    pub fn sync_level(&self) -> u8 {
        self.0.get_bits(4..8)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AmlType {
    Uninitialized,
    Buffer,
    BufferField,
    /// Handle to a definition block. Returned by the `Load` operator.
    DdbHandle,
    DebugObject,
    Device,
    Event,
    FieldUnit,
    Integer,
    Method,
    Mutex,
    ObjReference,
    OpRegion,
    Package,
    PowerResource,
    Processor,
    RawDataBuffer,
    String,
    ThermalZone,
}

#[derive(Clone)]
pub enum MethodCode {
    Aml(Vec<u8>),
    Native(Rc<dyn Fn(&mut AmlContext) -> Result<AmlValue, AmlError>>),
}

impl fmt::Debug for MethodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodCode::Aml(ref code) => f.debug_struct("AML method").field("code", code).finish(),
            MethodCode::Native(_) => f.debug_struct("Native method").finish(),
        }
    }
}

/// How a `FieldUnit` reaches its backing storage. `Normal` fields read and write an `OpRegion`
/// directly; `Bank` fields first select a bank by writing a value into another field; `Index`
/// fields are accessed indirectly by writing a byte offset into an index field and transferring
/// data through a data field.
#[derive(Clone, Debug)]
pub enum FieldKind {
    Normal { region: AmlHandle },
    Bank { region: AmlHandle, bank: AmlHandle, bank_value: u64 },
    Index { index: AmlHandle, data: AmlHandle },
}

/// What an `ObjectReference` refers to: a named object (by handle, so the reference stays an
/// alias even if the name is rebound), an argument or local slot of the current invocation, or an
/// evaluated value (whose heap storage - a buffer or package - is shared with every other
/// reference to it).
#[derive(Clone, Debug)]
pub enum ReferenceTarget {
    Named(AmlHandle),
    Arg(ArgNum),
    Local(LocalNum),
    Value(alloc::boxed::Box<AmlValue>),
}

#[derive(Clone, Debug)]
pub enum AmlValue {
    Uninitialized,
    Boolean(bool),
    Integer(u64),
    String(String),
    /// Buffer contents are shared between every value that refers to the buffer (buffer fields,
    /// `Index` references), so a write through any of them is observed by all.
    Buffer(Arc<Spinlock<Vec<u8>>>),
    /// Package elements are shared the same way buffer contents are, so `Index` references into a
    /// package alias the original elements rather than copies of them.
    Package(Arc<Spinlock<Vec<AmlValue>>>),
    OpRegion(OpRegion),
    /// Describes a field unit within an operation region. `offset` and `length` are in **bits**.
    Field {
        kind: FieldKind,
        flags: FieldFlags,
        offset: u64,
        length: u64,
    },
    /// A bit-precise view over an in-memory buffer, created by the `CreateField` family of
    /// opcodes. `offset` and `length` are in **bits**.
    BufferField {
        buffer_data: Arc<Spinlock<Vec<u8>>>,
        offset: u64,
        length: u64,
    },
    Method {
        flags: MethodFlags,
        code: MethodCode,
    },
    Mutex {
        sync_level: u8,
    },
    Event {
        signal_count: u64,
    },
    Device,
    Processor {
        id: u8,
        pblk_address: u32,
        pblk_len: u8,
    },
    PowerResource {
        system_level: u8,
        resource_order: u16,
    },
    ThermalZone,
    /// Produced by `Index` (with `index: Some(element)`), and by `RefOf` and argument/local
    /// references (with `index: None`, a plain alias).
    ObjectReference {
        index: Option<u64>,
        target: ReferenceTarget,
    },
    DebugObject,
}

impl AmlValue {
    pub fn zero() -> AmlValue {
        AmlValue::Integer(0)
    }

    pub fn one() -> AmlValue {
        AmlValue::Integer(1)
    }

    pub fn native_method<F>(arg_count: u8, serialize: bool, sync_level: u8, f: F) -> AmlValue
    where
        F: Fn(&mut AmlContext) -> Result<AmlValue, AmlError> + 'static,
    {
        let flags = MethodFlags::new(arg_count, serialize, sync_level);
        AmlValue::Method { flags, code: MethodCode::Native(Rc::new(f)) }
    }

    pub fn type_of(&self) -> AmlType {
        match self {
            AmlValue::Uninitialized => AmlType::Uninitialized,
            AmlValue::Boolean(_) => AmlType::Integer,
            AmlValue::Integer(_) => AmlType::Integer,
            AmlValue::String(_) => AmlType::String,
            AmlValue::Buffer(_) => AmlType::Buffer,
            AmlValue::Package(_) => AmlType::Package,
            AmlValue::OpRegion { .. } => AmlType::OpRegion,
            AmlValue::Field { .. } => AmlType::FieldUnit,
            AmlValue::BufferField { .. } => AmlType::BufferField,
            AmlValue::Method { .. } => AmlType::Method,
            AmlValue::Mutex { .. } => AmlType::Mutex,
            AmlValue::Event { .. } => AmlType::Event,
            AmlValue::Device => AmlType::Device,
            AmlValue::Processor { .. } => AmlType::Processor,
            AmlValue::PowerResource { .. } => AmlType::PowerResource,
            AmlValue::ThermalZone => AmlType::ThermalZone,
            AmlValue::ObjectReference { .. } => AmlType::ObjReference,
            AmlValue::DebugObject => AmlType::DebugObject,
        }
    }

    pub fn as_bool(&self) -> Result<bool, AmlError> {
        match self {
            AmlValue::Boolean(value) => Ok(*value),
            AmlValue::Integer(value) => Ok(*value != 0),
            AmlValue::Uninitialized => Ok(false),
            _ => Err(AmlError::IncompatibleValueConversion {
                current: self.type_of(),
                target: AmlType::Integer,
            }),
        }
    }

    pub fn as_integer(&self, context: &mut AmlContext) -> Result<u64, AmlError> {
        match self {
            AmlValue::Integer(value) => Ok(*value),
            AmlValue::Boolean(value) => Ok(if *value { context.ones() } else { 0 }),

            /*
             * An uninitialized object coerces to zero, so evaluation degraded by an unresolved
             * reference keeps going with an inert value instead of failing outright.
             */
            AmlValue::Uninitialized => Ok(0),

            AmlValue::Buffer(ref bytes) => {
                /*
                 * "The first 8 bytes of the buffer are converted to an integer, taking the first
                 * byte as the least significant byte of the integer. A zero-length buffer is
                 * illegal." - §19.6.140
                 *
                 * XXX: Buffers with length `0` appear in real tables, so we return `0` for them.
                 */
                let bytes = bytes.lock();
                let max_bytes = context.integer_width() as usize / 8;
                let bytes = if bytes.len() > max_bytes { &bytes[0..max_bytes] } else { &bytes[..] };

                Ok(bytes.iter().rev().fold(0u64, |mut i, &popped| {
                    i <<= 8;
                    i += popped as u64;
                    i
                }) & context.ones())
            }

            /*
             * Read from a field. This can return either a `Buffer` or an `Integer`, so we make sure to call
             * `as_integer` on the result.
             */
            AmlValue::Field { .. } | AmlValue::BufferField { .. } => {
                context.read_field(self)?.as_integer(context)
            }

            _ => Err(AmlError::IncompatibleValueConversion {
                current: self.type_of(),
                target: AmlType::Integer,
            }),
        }
    }

    pub fn as_buffer(&self, context: &mut AmlContext) -> Result<Arc<Spinlock<Vec<u8>>>, AmlError> {
        match self {
            AmlValue::Buffer(ref bytes) => Ok(bytes.clone()),

            AmlValue::Integer(value) => {
                let mut bytes = [0u8; 8];
                LittleEndian::write_u64(&mut bytes, *value);
                let bytes = bytes[0..(context.integer_width() as usize / 8)].to_vec();
                Ok(Arc::new(Spinlock::new(bytes)))
            }

            // Per the spec, the string's NUL terminator is included in the buffer
            AmlValue::String(ref string) => {
                let mut bytes = string.as_bytes().to_vec();
                bytes.push(b'\0');
                Ok(Arc::new(Spinlock::new(bytes)))
            }

            AmlValue::Uninitialized => Ok(Arc::new(Spinlock::new(Vec::new()))),

            AmlValue::Field { .. } | AmlValue::BufferField { .. } => {
                context.read_field(self)?.as_buffer(context)
            }

            _ => Err(AmlError::IncompatibleValueConversion {
                current: self.type_of(),
                target: AmlType::Buffer,
            }),
        }
    }

    pub fn as_string(&self, context: &mut AmlContext) -> Result<String, AmlError> {
        match self {
            AmlValue::String(ref string) => Ok(string.clone()),

            // The implicit integer -> string conversion renders the value in decimal
            AmlValue::Integer(value) => Ok(value.to_string()),

            // Buffers convert byte-by-byte to "0xAA,0xBB,..."; this matches `ToHexString`
            AmlValue::Buffer(ref bytes) => {
                let bytes = bytes.lock();
                let mut string = String::new();
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        string.push(',');
                    }
                    string += &format!("0x{:02X}", byte);
                }
                Ok(string)
            }

            AmlValue::Uninitialized => Ok(String::new()),

            AmlValue::Field { .. } | AmlValue::BufferField { .. } => {
                context.read_field(self)?.as_string(context)
            }

            _ => Err(AmlError::IncompatibleValueConversion {
                current: self.type_of(),
                target: AmlType::String,
            }),
        }
    }

    /// Logically compare two `AmlValue`s, according to the rules that govern opcodes like `DefLEqual`, `DefLLess`,
    /// etc. The type of `self` dictates the type that `other` will be converted to, and the method by which the
    /// values will be compared:
    ///    - `Integer`s are simply compared by numeric comparison
    ///    - `String`s and `Buffer`s are compared lexicographically - `other` is compared byte-wise until a byte
    ///      is discovered that is either less or greater than the corresponding byte of `self`. If the bytes are
    ///      identical, the lengths are compared.
    pub fn cmp(&self, other: AmlValue, context: &mut AmlContext) -> Result<cmp::Ordering, AmlError> {
        let self_inner = match self.type_of() {
            AmlType::FieldUnit | AmlType::BufferField => context.read_field(self)?,
            _ => self.clone(),
        };

        match self_inner.type_of() {
            AmlType::Integer => Ok(self_inner.as_integer(context)?.cmp(&other.as_integer(context)?)),
            AmlType::String => Ok(self_inner.as_string(context)?.cmp(&other.as_string(context)?)),
            AmlType::Buffer => {
                /*
                 * Clone both sets of contents out before comparing, so comparing a buffer against
                 * itself doesn't deadlock on its own lock.
                 */
                let left: Vec<u8> = {
                    let data = self_inner.as_buffer(context)?;
                    let copied = data.lock().clone();
                    copied
                };
                let right: Vec<u8> = {
                    let data = other.as_buffer(context)?;
                    let copied = data.lock().clone();
                    copied
                };
                Ok(left.cmp(&right))
            }
            typ => Err(AmlError::TypeCannotBeCompared(typ)),
        }
    }
}

/// A control method can take up to 7 arguments, each of which can be an `AmlValue`.
#[derive(Clone, Debug, Default)]
pub struct Args {
    pub arg_0: Option<AmlValue>,
    pub arg_1: Option<AmlValue>,
    pub arg_2: Option<AmlValue>,
    pub arg_3: Option<AmlValue>,
    pub arg_4: Option<AmlValue>,
    pub arg_5: Option<AmlValue>,
    pub arg_6: Option<AmlValue>,
}

impl Args {
    pub const EMPTY: Args = Args {
        arg_0: None,
        arg_1: None,
        arg_2: None,
        arg_3: None,
        arg_4: None,
        arg_5: None,
        arg_6: None,
    };

    pub fn from_list(mut list: Vec<AmlValue>) -> Result<Args, AmlError> {
        if list.len() > 7 {
            return Err(AmlError::TooManyArgs);
        }

        list.reverse();
        Ok(Args {
            arg_0: list.pop(),
            arg_1: list.pop(),
            arg_2: list.pop(),
            arg_3: list.pop(),
            arg_4: list.pop(),
            arg_5: list.pop(),
            arg_6: list.pop(),
        })
    }

    /// Get an argument by its `ArgNum`. Produces `AmlError::InvalidArgAccess` if the argument
    /// number is out of range, or the argument was not passed.
    pub fn arg(&self, num: ArgNum) -> Result<&AmlValue, AmlError> {
        match num {
            0 => self.arg_0.as_ref().ok_or(AmlError::InvalidArgAccess(num)),
            1 => self.arg_1.as_ref().ok_or(AmlError::InvalidArgAccess(num)),
            2 => self.arg_2.as_ref().ok_or(AmlError::InvalidArgAccess(num)),
            3 => self.arg_3.as_ref().ok_or(AmlError::InvalidArgAccess(num)),
            4 => self.arg_4.as_ref().ok_or(AmlError::InvalidArgAccess(num)),
            5 => self.arg_5.as_ref().ok_or(AmlError::InvalidArgAccess(num)),
            6 => self.arg_6.as_ref().ok_or(AmlError::InvalidArgAccess(num)),
            _ => Err(AmlError::InvalidArgAccess(num)),
        }
    }

    /// Overwrite an argument slot. AML is allowed to store into arguments it was passed; the
    /// store behaves like `CopyObject` (no implicit conversion).
    pub fn store_arg(&mut self, num: ArgNum, value: AmlValue) -> Result<(), AmlError> {
        let slot = match num {
            0 => &mut self.arg_0,
            1 => &mut self.arg_1,
            2 => &mut self.arg_2,
            3 => &mut self.arg_3,
            4 => &mut self.arg_4,
            5 => &mut self.arg_5,
            6 => &mut self.arg_6,
            _ => return Err(AmlError::InvalidArgAccess(num)),
        };
        *slot = Some(value);
        Ok(())
    }

    /// The number of arguments passed - the length of the leading run of filled slots.
    pub fn count(&self) -> u8 {
        let slots = [&self.arg_0, &self.arg_1, &self.arg_2, &self.arg_3, &self.arg_4, &self.arg_5, &self.arg_6];
        slots.iter().take_while(|slot| slot.is_some()).count() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::*, AmlError};
    use alloc::vec;
    use core::cmp::Ordering;

    #[test]
    fn test_object_cmp() {
        let mut context = make_test_context();

        assert_eq!(
            AmlValue::Integer(76).cmp(AmlValue::Integer(89), &mut context),
            Ok(Ordering::Less)
        );
        assert_eq!(
            AmlValue::Integer(11).cmp(AmlValue::Integer(11), &mut context),
            Ok(Ordering::Equal)
        );
        assert_eq!(
            AmlValue::Integer(8362836690).cmp(AmlValue::Integer(1), &mut context),
            Ok(Ordering::Greater)
        );

        // Mixed integer/buffer compares coerce the buffer side to an integer
        let buffer = AmlValue::Buffer(Arc::new(Spinlock::new(vec![0x0a, 0x00])));
        assert_eq!(AmlValue::Integer(10).cmp(buffer, &mut context), Ok(Ordering::Equal));

        // Buffer comparison is bytewise, with a length tiebreak
        let ab = AmlValue::Buffer(Arc::new(Spinlock::new(vec![0x61, 0x62])));
        let abc = AmlValue::Buffer(Arc::new(Spinlock::new(vec![0x61, 0x62, 0x63])));
        assert_eq!(ab.cmp(abc, &mut context), Ok(Ordering::Less));

        let abc_again = AmlValue::Buffer(Arc::new(Spinlock::new(vec![0x61, 0x62, 0x63])));
        let abd = AmlValue::Buffer(Arc::new(Spinlock::new(vec![0x61, 0x62, 0x64])));
        assert_eq!(abc_again.cmp(abd, &mut context), Ok(Ordering::Less));

        // String comparison is lexicographic
        assert_eq!(
            AmlValue::String(String::from("abc")).cmp(AmlValue::String(String::from("abd")), &mut context),
            Ok(Ordering::Less)
        );

        assert_eq!(
            AmlValue::Mutex { sync_level: 0 }.cmp(AmlValue::Integer(4), &mut context),
            Err(AmlError::TypeCannotBeCompared(AmlType::Mutex))
        );
    }

    #[test]
    fn test_as_integer() {
        let mut context = make_test_context();

        assert_eq!(AmlValue::Integer(7).as_integer(&mut context), Ok(7));
        assert_eq!(AmlValue::Uninitialized.as_integer(&mut context), Ok(0));

        // Buffers are packed little-endian
        let buffer = AmlValue::Buffer(Arc::new(Spinlock::new(vec![0x34, 0x12])));
        assert_eq!(buffer.as_integer(&mut context), Ok(0x1234));

        // Buffers longer than the integer width are truncated
        let buffer = AmlValue::Buffer(Arc::new(Spinlock::new(vec![
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a,
        ])));
        assert_eq!(buffer.as_integer(&mut context), Ok(0x0807060504030201));
    }

    #[test]
    fn test_as_buffer_of_integer_respects_width() {
        let mut context = make_test_context();

        let buffer = AmlValue::Integer(0x1234).as_buffer(&mut context).unwrap();
        assert_eq!(*buffer.lock(), vec![0x34, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        context.set_table_revision(1);
        let buffer = AmlValue::Integer(0x1234).as_buffer(&mut context).unwrap();
        assert_eq!(*buffer.lock(), vec![0x34, 0x12, 0x00, 0x00]);
    }

    #[test]
    fn test_as_string() {
        let mut context = make_test_context();

        assert_eq!(AmlValue::Integer(42).as_string(&mut context), Ok(String::from("42")));
        let buffer = AmlValue::Buffer(Arc::new(Spinlock::new(vec![0x01, 0xab])));
        assert_eq!(buffer.as_string(&mut context), Ok(String::from("0x01,0xAB")));
    }

    #[test]
    fn test_args() {
        let args = Args::from_list(alloc::vec![AmlValue::Integer(1), AmlValue::Integer(2)]).unwrap();
        assert_eq!(args.count(), 2);
        assert!(crudely_cmp_values(args.arg(0).unwrap(), &AmlValue::Integer(1)));
        assert!(crudely_cmp_values(args.arg(1).unwrap(), &AmlValue::Integer(2)));
        assert_eq!(args.arg(2).unwrap_err(), AmlError::InvalidArgAccess(2));
        assert_eq!(args.arg(7).unwrap_err(), AmlError::InvalidArgAccess(7));

        assert_eq!(Args::EMPTY.count(), 0);
        assert!(Args::from_list(alloc::vec![AmlValue::Integer(0); 8]).is_err());
    }
}
