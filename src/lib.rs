//! `aml-engine` is a pure-Rust interpreter for AML (ACPI Machine Language), the bytecode format
//! that ACPI-compliant firmware uses to describe the configuration and power behaviour of a
//! platform. The table loader hands us the raw byte payload of the DSDT and any SSDTs, we parse
//! it into a namespace of named objects, and the OS can then evaluate objects and invoke control
//! methods out of that namespace.
//!
//! ### Using the library
//! Construct an [`AmlContext`] with a [`Handler`] that implements the hardware accesses AML may
//! perform, then feed each table's AML payload to [`AmlContext::parse_table`]. Named objects can
//! then be evaluated with [`AmlContext::evaluate`] or [`AmlContext::invoke_method`].
//!
//! The interpreter is strictly single-threaded: every entry point takes `&mut self`, so the
//! exclusion the ACPI specification requires around namespace mutation is enforced by the type
//! system. Hosts that want concurrent callers must wrap the context in their own lock.
//!
//! ### About the parser
//! AML is a *streaming* format: terms are evaluated as they are parsed, and no AST is ever
//! materialised. The parser is built from combinators over `(&[u8], &mut AmlContext)`, with
//! control flow (method returns, `Break`, `Continue`) and errors carried in the `Propagate`
//! type. Firmware tables are frequently slightly malformed, so lookups that fail in a value
//! context degrade to an inert value instead of aborting; such recoveries are counted and
//! surfaced through [`Evaluation::degraded`] so callers can tell a clean result from a
//! best-effort one.

#![no_std]

#[cfg(test)]
extern crate std;

extern crate alloc;

pub mod expression;
pub mod misc;
pub mod name_object;
pub mod namespace;
pub mod opcode;
pub mod opregion;
pub mod parser;
pub mod pkg_length;
pub mod statement;
pub mod term_object;
pub mod value;

#[cfg(test)]
mod test_utils;

pub use crate::{
    namespace::{AmlHandle, AmlName, Namespace},
    value::AmlValue,
};

use alloc::{
    boxed::Box,
    collections::BTreeMap,
    format,
    string::{String, ToString},
    vec::Vec,
};
use core::mem;
use log::{error, info, warn};
use misc::{ArgNum, LocalNum};
use name_object::Target;
use namespace::LevelType;
use parser::{Parser, Propagate};
use pkg_length::PkgLength;
use value::{AmlType, Args, ReferenceTarget};

/// The value returned by the `Revision` opcode.
pub const AML_INTERPRETER_REVISION: u64 = 0;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum DebugVerbosity {
    /// Print no debug information
    None,
    /// Print heads and tails when entering and leaving scopes of major objects, but not more minor ones.
    Scopes,
    /// Print heads and tails when entering and leaving scopes of all objects.
    AllScopes,
    /// Print heads and tails of all objects, and extra debug information as it's parsed.
    All,
}

struct MethodContext {
    /// AML local variables. Each of the 8 slots starts out `Uninitialized` for every invocation.
    locals: [AmlValue; 8],
    /// The arguments the current invocation was passed.
    args: Args,
}

impl MethodContext {
    fn new(args: Args) -> MethodContext {
        MethodContext { locals: core::array::from_fn(|_| AmlValue::Uninitialized), args }
    }
}

/// A callback invoked when AML executes `Notify` on a namespace node the host has subscribed to.
/// It receives the absolute path of the notified object and the notification value.
pub type NotifyHandler = Box<dyn Fn(&AmlName, u64)>;

/// The result of evaluating a named object. `degraded` is set if the interpreter had to paper
/// over a lenient-recovery condition (an unresolved name in a value context, a failed field
/// access, a store to a name that doesn't exist) somewhere during the evaluation - the value is
/// then best-effort rather than exact. `CondRefOf` probes never count as degradations.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub value: AmlValue,
    pub degraded: bool,
}

pub struct AmlContext {
    /// The `Handler` passed into the library by the user. This is stored as a boxed trait object
    /// simply to avoid having to add a generic type parameter to `AmlContext` (and so every
    /// parser).
    pub(crate) handler: Box<dyn Handler>,

    pub namespace: Namespace,
    method_context: Option<MethodContext>,

    /*
     * These track the state of the context while it's parsing an AML table.
     */
    pub(crate) current_scope: AmlName,
    pub(crate) scope_indent: usize,
    pub(crate) debug_verbosity: DebugVerbosity,

    /// The width, in bits, of an AML `Integer` for the tables currently loaded. Tables with a
    /// revision below 2 use 32-bit integers; everything else uses 64-bit ones.
    integer_bit_width: u32,
    /// Number of lenient recoveries performed since the context was created. See
    /// [`AmlContext::evaluate`].
    degradations: usize,
    /// Number of definition blocks fed to the interpreter, either by the host or by the `Load`
    /// opcode. Used to mint DDB handles.
    loaded_tables: usize,

    notify_handlers: BTreeMap<AmlName, Vec<NotifyHandler>>,
    pnp_notify_handlers: Vec<(String, NotifyHandler)>,
}

impl AmlContext {
    /// Creates a new `AmlContext` - this will be the central struct in your use of this library.
    /// Tables should always be loaded in the order DSDT, then each SSDT.
    pub fn new(handler: Box<dyn Handler>, debug_verbosity: DebugVerbosity) -> AmlContext {
        let mut context = AmlContext {
            handler,
            namespace: Namespace::new(),
            method_context: None,

            current_scope: AmlName::root(),
            scope_indent: 0,
            debug_verbosity,

            integer_bit_width: 64,
            degradations: 0,
            loaded_tables: 0,

            notify_handlers: BTreeMap::new(),
            pnp_notify_handlers: Vec::new(),
        };

        context.add_predefined_objects();
        context
    }

    /// Tables with a revision below 2 encode `Integer`s in 32 bits. The table loader should call
    /// this with the revision from the DSDT's header before parsing it; the width applies to all
    /// tables loaded into this context.
    pub fn set_table_revision(&mut self, revision: u8) {
        self.integer_bit_width = if revision < 2 { 32 } else { 64 };
    }

    pub(crate) fn integer_width(&self) -> u32 {
        self.integer_bit_width
    }

    /// The all-ones value at the current integer width - the value of the `Ones` opcode, and the
    /// mask applied to arithmetic results.
    pub(crate) fn ones(&self) -> u64 {
        match self.integer_bit_width {
            32 => u64::from(u32::MAX),
            _ => u64::MAX,
        }
    }

    /// Parse the contents of a definition block (the AML payload of a DSDT or SSDT, without the
    /// table header) and merge the objects it declares into the namespace. A zero-length stream
    /// is a no-op.
    pub fn parse_table(&mut self, stream: &[u8]) -> Result<(), AmlError> {
        if stream.is_empty() {
            return Ok(());
        }

        self.loaded_tables += 1;
        let table_length = PkgLength::from_raw_length(stream, stream.len() as u32);
        match term_object::term_list(table_length).parse(stream, self) {
            Ok(_) => Ok(()),
            Err((_, _, Propagate::Err(err))) => {
                error!("Failed to parse AML stream. Err = {:?}", err);
                Err(err)
            }
            Err((_, _, Propagate::Return(_))) => Err(AmlError::ReturnOutsideOfMethod),
            Err((_, _, Propagate::Break)) => Err(AmlError::BreakOutsideOfLoop),
            Err((_, _, Propagate::Continue)) => Err(AmlError::ContinueOutsideOfLoop),
        }
    }

    /// Evaluate the object at `path`: invoke it if it's a method (with the given arguments), or
    /// copy its value out if it isn't. On top of [`AmlContext::invoke_method`], this reports
    /// whether the evaluation was degraded by any lenient recovery, so callers can distinguish an
    /// exact result from a best-effort one.
    pub fn evaluate(&mut self, path: &AmlName, args: Args) -> Result<Evaluation, AmlError> {
        let degradations_before = self.degradations;
        let value = self.invoke_method(path, args)?;
        Ok(Evaluation { value, degraded: self.degradations > degradations_before })
    }

    /// Invoke a method referred to by its path in the namespace, with the given arguments. If the
    /// object at `path` is not a method, its value is simply returned (the arguments are ignored),
    /// matching the behaviour firmware expects of `evaluate`-style entry points.
    pub fn invoke_method(&mut self, path: &AmlName, args: Args) -> Result<AmlValue, AmlError> {
        use value::MethodCode;

        match self.namespace.get_by_path(path)?.clone() {
            AmlValue::Method { flags, code } => {
                /*
                 * A method runs with its own scope, arguments, and locals. Names it creates go
                 * into a level at the method's own path, which is torn down again when the
                 * invocation completes, so repeated and re-entrant calls don't leak namespace
                 * entries.
                 */
                if usize::from(args.count()) != usize::from(flags.arg_count()) {
                    return Err(AmlError::IncorrectMethodArgumentCount);
                }

                match code {
                    MethodCode::Aml(ref code) => {
                        let previous_scope = mem::replace(&mut self.current_scope, path.clone());
                        let previous_method_context =
                            mem::replace(&mut self.method_context, Some(MethodContext::new(args)));
                        self.namespace.add_level(path.clone(), LevelType::MethodLocals)?;

                        let result = self.parse_method_body(code);

                        /*
                         * Discard the method's transient child names. This can fail if the method
                         * didn't create any, which is fine.
                         */
                        let _ = self.namespace.remove_level(path.clone());
                        self.current_scope = previous_scope;
                        self.method_context = previous_method_context;
                        result
                    }
                    MethodCode::Native(ref method) => {
                        let previous_method_context =
                            mem::replace(&mut self.method_context, Some(MethodContext::new(args)));
                        let result = (method.clone())(self);
                        self.method_context = previous_method_context;
                        result
                    }
                }
            }

            /*
             * Fields don't have a value of their own - evaluating one reads it out of its
             * backing store.
             */
            value @ (AmlValue::Field { .. } | AmlValue::BufferField { .. }) => self.read_field(&value),

            /*
             * If the object isn't a method, we just return it. This allows `evaluate`-style
             * callers to not care whether they're invoking a method or reading an object.
             */
            value => Ok(value),
        }
    }

    fn parse_method_body(&mut self, code: &[u8]) -> Result<AmlValue, AmlError> {
        if code.is_empty() {
            // Empty method bodies are valid, and evaluate to nothing
            return Ok(AmlValue::Uninitialized);
        }

        let body_length = PkgLength::from_raw_length(code, code.len() as u32);
        match term_object::term_list(body_length).parse(code, self) {
            // If the method doesn't execute a `Return`, it evaluates to an uninitialized object
            Ok(_) => Ok(AmlValue::Uninitialized),
            Err((_, _, Propagate::Return(result))) => Ok(result),
            Err((_, _, Propagate::Break)) => Err(AmlError::BreakOutsideOfLoop),
            Err((_, _, Propagate::Continue)) => Err(AmlError::ContinueOutsideOfLoop),
            Err((_, _, Propagate::Err(err))) => {
                error!("Failed to execute control method. Err = {:?}", err);
                Err(err)
            }
        }
    }

    /// Subscribe to `Notify` events targeting the object at `path`.
    pub fn register_notify_handler(&mut self, path: AmlName, handler: NotifyHandler) -> Result<(), AmlError> {
        let path = path.normalize()?;
        self.notify_handlers.entry(path).or_insert_with(Vec::new).push(handler);
        Ok(())
    }

    /// Subscribe to `Notify` events targeting any device that identifies itself (through `_HID`)
    /// with the given PNP / EISA id, e.g. `"PNP0C0A"`.
    pub fn register_pnp_notify_handler(&mut self, pnp_id: &str, handler: NotifyHandler) {
        self.pnp_notify_handlers.push((pnp_id.to_string(), handler));
    }

    /// Dispatch a `Notify` to every registered observer of `path`. Called by the `Notify` opcode
    /// handler with an absolute, normalized path.
    pub(crate) fn notify(&mut self, path: &AmlName, value: u64) {
        if let Some(handlers) = self.notify_handlers.get(path) {
            for handler in handlers {
                handler(path, value);
            }
        }

        if !self.pnp_notify_handlers.is_empty() {
            if let Some(hid) = self.self_identification(path) {
                for (id, handler) in &self.pnp_notify_handlers {
                    if *id == hid {
                        handler(path, value);
                    }
                }
            }
        }
    }

    /// Read the `_HID` of the object at `path`, if it has one that can be read without invoking a
    /// method. Integer ids are decoded from their compressed EISA form.
    fn self_identification(&self, path: &AmlName) -> Option<String> {
        let hid_path = AmlName::from_str("_HID").ok()?.resolve(path).ok()?;
        match self.namespace.get_by_path(&hid_path).ok()? {
            AmlValue::String(id) => Some(id.clone()),
            AmlValue::Integer(id) => Some(eisa_id_to_string(*id)),
            _ => None,
        }
    }

    /// Record a lenient recovery: something went wrong that the interpreter papers over to keep
    /// the evaluation going (matching what firmware expects of AML interpreters in the wild), but
    /// that makes the result best-effort. Surfaced through [`Evaluation::degraded`].
    pub(crate) fn record_degradation(&mut self, what: &str) {
        self.degradations += 1;
        warn!("AML evaluation degraded: {}", what);
    }

    /// The total number of lenient recoveries performed by this context since it was created.
    pub fn degradation_count(&self) -> usize {
        self.degradations
    }

    pub(crate) fn current_arg(&self, arg: ArgNum) -> Result<&AmlValue, AmlError> {
        self.method_context.as_ref().ok_or(AmlError::NotExecutingControlMethod)?.args.arg(arg)
    }

    /// Get the current value of a local by its local number. Can only be executed from inside a control method.
    pub(crate) fn local(&self, local: LocalNum) -> Result<&AmlValue, AmlError> {
        if local > 7 {
            return Err(AmlError::InvalidLocalAccess(local));
        }
        let method_context = self.method_context.as_ref().ok_or(AmlError::NotExecutingControlMethod)?;
        Ok(&method_context.locals[local as usize])
    }

    /// Perform a store into a `Target`, according to the conversion rules in §19.3.5.8 of the
    /// ACPI specification: the type of the *existing destination object* decides how the stored
    /// value is converted. Returns a copy of the data that ended up in the destination, which can
    /// differ from `value` because of those conversions.
    pub(crate) fn store(&mut self, target: Target, value: AmlValue) -> Result<AmlValue, AmlError> {
        match target {
            // A null target makes the store a no-op; the value is still produced
            Target::Null => Ok(value),

            Target::Debug => {
                info!("AML Debug object <- {:?}", value);
                Ok(value)
            }

            Target::Name(ref path) => match self.namespace.search(path, &self.current_scope) {
                Ok((_, handle)) => self.store_by_handle(handle, value),
                Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => {
                    self.record_degradation(&format!("store to unresolved name {}", path));
                    Ok(value)
                }
                Err(err) => Err(err),
            },

            /*
             * Stores into arguments and locals are semantically `CopyObject`s - no implicit
             * conversion is applied.
             */
            Target::Arg(arg_num) => {
                let method_context =
                    self.method_context.as_mut().ok_or(AmlError::NotExecutingControlMethod)?;
                method_context.args.store_arg(arg_num, value.clone())?;
                Ok(value)
            }

            Target::Local(local_num) => {
                if local_num > 7 {
                    return Err(AmlError::InvalidLocalAccess(local_num));
                }
                let method_context =
                    self.method_context.as_mut().ok_or(AmlError::NotExecutingControlMethod)?;
                method_context.locals[local_num as usize] = value.clone();
                Ok(value)
            }

            Target::Reference(reference) => self.store_through_reference(reference, value),
        }
    }

    pub(crate) fn store_by_handle(&mut self, handle: AmlHandle, value: AmlValue) -> Result<AmlValue, AmlError> {
        let existing = self.namespace.get(handle)?.clone();
        match existing {
            AmlValue::Field { .. } | AmlValue::BufferField { .. } => {
                self.write_field(&existing, value)?;
                self.read_field(&existing)
            }

            AmlValue::Integer(_) => {
                let converted = AmlValue::Integer(value.as_integer(self)?);
                *self.namespace.get_mut(handle)? = converted.clone();
                Ok(converted)
            }

            AmlValue::String(_) => {
                let converted = AmlValue::String(value.as_string(self)?);
                *self.namespace.get_mut(handle)? = converted.clone();
                Ok(converted)
            }

            /*
             * Storing into a buffer replaces its contents in place, so references into it (buffer
             * fields, `Index` references) keep seeing the same storage.
             */
            AmlValue::Buffer(ref data) => {
                let new_contents = {
                    let source = value.as_buffer(self)?;
                    let copied = source.lock().clone();
                    copied
                };
                *data.lock() = new_contents;
                Ok(AmlValue::Buffer(data.clone()))
            }

            /*
             * Everything else (including an `Uninitialized` destination) takes the source value
             * and type outright.
             */
            _ => {
                *self.namespace.get_mut(handle)? = value.clone();
                Ok(value)
            }
        }
    }

    /// Store through an `ObjectReference`, first fully dereferencing chained references, then
    /// either writing through the target's handle/slot, or writing the indexed element of the
    /// referenced package or buffer.
    fn store_through_reference(&mut self, reference: AmlValue, value: AmlValue) -> Result<AmlValue, AmlError> {
        match reference {
            AmlValue::ObjectReference { index: None, target } => match target {
                ReferenceTarget::Named(handle) => self.store_by_handle(handle, value),
                ReferenceTarget::Arg(arg_num) => self.store(Target::Arg(arg_num), value),
                ReferenceTarget::Local(local_num) => self.store(Target::Local(local_num), value),
                ReferenceTarget::Value(inner) => {
                    if let AmlValue::ObjectReference { .. } = *inner {
                        self.store_through_reference(*inner, value)
                    } else {
                        Err(AmlError::TypeCannotBeStoredInto(inner.type_of()))
                    }
                }
            },

            AmlValue::ObjectReference { index: Some(index), target } => {
                let referenced = match target {
                    ReferenceTarget::Named(handle) => self.namespace.get(handle)?.clone(),
                    ReferenceTarget::Arg(arg_num) => self.current_arg(arg_num)?.clone(),
                    ReferenceTarget::Local(local_num) => self.local(local_num)?.clone(),
                    ReferenceTarget::Value(inner) => *inner,
                };

                match referenced {
                    AmlValue::Buffer(data) => {
                        let byte = value.as_integer(self)? as u8;
                        let mut data = data.lock();
                        let slot =
                            data.get_mut(index as usize).ok_or(AmlError::IndexOutOfBounds(index))?;
                        *slot = byte;
                        Ok(AmlValue::Integer(u64::from(byte)))
                    }
                    AmlValue::Package(elements) => {
                        let mut elements = elements.lock();
                        let slot = elements
                            .get_mut(index as usize)
                            .ok_or(AmlError::IndexOutOfBounds(index))?;
                        *slot = value.clone();
                        Ok(value)
                    }
                    other => Err(AmlError::TypeCannotBeIndexed(other.type_of())),
                }
            }

            other => Err(AmlError::TypeCannotBeStoredInto(other.type_of())),
        }
    }

    /// Read the object a `Target` refers to. Fields are *not* read through here - the caller gets
    /// the field object itself and decides whether a hardware access is wanted.
    pub(crate) fn read_target(&mut self, target: &Target) -> Result<AmlValue, AmlError> {
        match target {
            Target::Null | Target::Debug => Err(AmlError::InvalidTarget),
            Target::Name(path) => {
                let (_, handle) = self.namespace.search(path, &self.current_scope)?;
                Ok(self.namespace.get(handle)?.clone())
            }
            Target::Arg(arg_num) => Ok(self.current_arg(*arg_num)?.clone()),
            Target::Local(local_num) => Ok(self.local(*local_num)?.clone()),
            Target::Reference(reference) => self.read_reference(reference.clone()),
        }
    }

    /// Resolve one level of an `ObjectReference`: the referenced object itself for a plain alias,
    /// or the indexed element for an `Index` reference.
    pub(crate) fn read_reference(&mut self, reference: AmlValue) -> Result<AmlValue, AmlError> {
        match reference {
            AmlValue::ObjectReference { index: None, target } => match target {
                ReferenceTarget::Named(handle) => Ok(self.namespace.get(handle)?.clone()),
                ReferenceTarget::Arg(arg_num) => Ok(self.current_arg(arg_num)?.clone()),
                ReferenceTarget::Local(local_num) => Ok(self.local(local_num)?.clone()),
                ReferenceTarget::Value(inner) => Ok(*inner),
            },

            AmlValue::ObjectReference { index: Some(index), target } => {
                let referenced = match target {
                    ReferenceTarget::Named(handle) => self.namespace.get(handle)?.clone(),
                    ReferenceTarget::Arg(arg_num) => self.current_arg(arg_num)?.clone(),
                    ReferenceTarget::Local(local_num) => self.local(local_num)?.clone(),
                    ReferenceTarget::Value(inner) => *inner,
                };

                match referenced {
                    AmlValue::Buffer(data) => {
                        let data = data.lock();
                        let byte = data.get(index as usize).ok_or(AmlError::IndexOutOfBounds(index))?;
                        Ok(AmlValue::Integer(u64::from(*byte)))
                    }
                    AmlValue::Package(elements) => {
                        let elements = elements.lock();
                        elements.get(index as usize).cloned().ok_or(AmlError::IndexOutOfBounds(index))
                    }
                    AmlValue::String(string) => {
                        let byte =
                            string.as_bytes().get(index as usize).ok_or(AmlError::IndexOutOfBounds(index))?;
                        Ok(AmlValue::Integer(u64::from(*byte)))
                    }
                    other => Err(AmlError::TypeCannotBeIndexed(other.type_of())),
                }
            }

            other => Err(AmlError::TypeCannotBeDereferenced(other.type_of())),
        }
    }

    fn add_predefined_objects(&mut self) {
        /*
         * These are the objects the spec expects to exist under the root before any table is
         * loaded. `\_GL` is the global lock mutex AML synchronizes against; `\_OSI` is a method
         * firmware probes for host-supported features (we claim support for nothing).
         */
        self.namespace
            .add_value(AmlName::from_str("\\_GL").unwrap(), AmlValue::Mutex { sync_level: 0 })
            .unwrap();
        self.namespace
            .add_value(
                AmlName::from_str("\\_OS").unwrap(),
                AmlValue::String(String::from("Microsoft Windows NT")),
            )
            .unwrap();
        self.namespace.add_value(AmlName::from_str("\\_REV").unwrap(), AmlValue::Integer(2)).unwrap();
        self.namespace
            .add_value(
                AmlName::from_str("\\_OSI").unwrap(),
                AmlValue::native_method(1, false, 0, |_context| Ok(AmlValue::Integer(0))),
            )
            .unwrap();
    }
}

/// Decode a compressed 32-bit EISA id (e.g. the integer form of a `_HID`) into its 7-character
/// string form, such as `PNP0C0A`.
pub fn eisa_id_to_string(id: u64) -> String {
    let id = (id as u32).swap_bytes();
    let c1 = (((id >> 26) & 0x1f) as u8 + 0x40) as char;
    let c2 = (((id >> 21) & 0x1f) as u8 + 0x40) as char;
    let c3 = (((id >> 16) & 0x1f) as u8 + 0x40) as char;
    format!("{}{}{}{:04X}", c1, c2, c3, id & 0xffff)
}

/// The interpreter communicates with the underlying platform through a `Handler`: every read or
/// write a field access performs against system memory, an I/O port, PCI configuration space, or
/// embedded-controller space goes through exactly one of these methods. `Sleep`, `Stall`, and
/// `Fatal` are forwarded to the host as well.
pub trait Handler {
    fn read_u8(&self, address: usize) -> u8;
    fn read_u16(&self, address: usize) -> u16;
    fn read_u32(&self, address: usize) -> u32;
    fn read_u64(&self, address: usize) -> u64;

    fn write_u8(&mut self, address: usize, value: u8);
    fn write_u16(&mut self, address: usize, value: u16);
    fn write_u32(&mut self, address: usize, value: u32);
    fn write_u64(&mut self, address: usize, value: u64);

    fn read_io_u8(&self, port: u16) -> u8;
    fn read_io_u16(&self, port: u16) -> u16;
    fn read_io_u32(&self, port: u16) -> u32;

    fn write_io_u8(&mut self, port: u16, value: u8);
    fn write_io_u16(&mut self, port: u16, value: u16);
    fn write_io_u32(&mut self, port: u16, value: u32);

    fn read_pci_u8(&self, segment: u16, bus: u8, device: u8, function: u8, offset: u16) -> u8;
    fn read_pci_u16(&self, segment: u16, bus: u8, device: u8, function: u8, offset: u16) -> u16;
    fn read_pci_u32(&self, segment: u16, bus: u8, device: u8, function: u8, offset: u16) -> u32;

    fn write_pci_u8(&mut self, segment: u16, bus: u8, device: u8, function: u8, offset: u16, value: u8);
    fn write_pci_u16(&mut self, segment: u16, bus: u8, device: u8, function: u8, offset: u16, value: u16);
    fn write_pci_u32(&mut self, segment: u16, bus: u8, device: u8, function: u8, offset: u16, value: u32);

    fn read_ec_u8(&self, address: u64) -> u8 {
        let _ = address;
        0
    }
    fn write_ec_u8(&mut self, address: u64, value: u8) {
        let _ = (address, value);
    }

    /// Stall for at least the given number of **microseconds**. Should not relinquish the
    /// processor.
    fn stall(&self, microseconds: u64);
    /// Sleep for at least the given number of **milliseconds**. May relinquish the processor.
    fn sleep(&self, milliseconds: u64);

    fn handle_fatal_error(&self, fatal_type: u8, fatal_code: u32, fatal_arg: u64) {
        error!(
            "Fatal error while executing AML (encountered DefFatalOp). fatal_type = {:?}, fatal_code = {:?}, fatal_arg = {:?}",
            fatal_type, fatal_code, fatal_arg
        );
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum AmlError {
    /*
     * Errors produced parsing the AML stream.
     */
    UnexpectedEndOfStream,
    UnexpectedByte(u8),
    /// Produced when a parser possessed an invalid combination of capabilities
    WrongParser,
    InvalidPkgLength,
    InvalidFieldFlags,
    UnterminatedStringConstant,
    InvalidStringConstant,
    InvalidRegionSpace(u8),
    MalformedBuffer,
    MalformedPackage,
    InvalidMatchOpcode(u8),
    /// Emitted when a `While` loop runs for more iterations than the interpreter's guard allows,
    /// which usually means the table's predicate is malformed.
    LoopIterationLimit,
    ReturnOutsideOfMethod,
    BreakOutsideOfLoop,
    ContinueOutsideOfLoop,
    /// Produced by the `Fatal` opcode, or when the interpreter detects internal inconsistency.
    FatalError,

    /*
     * Errors produced manipulating AML names.
     */
    EmptyNamesAreInvalid,
    /// Produced when a name does not conform to the NameSeg format defined by the spec
    InvalidNameSeg,
    /// Produced when a path normalizes to an invalid path (e.g. `\^_FOO`)
    InvalidNormalizedName(AmlName),
    RootHasNoParent,

    /*
     * Errors produced working with the namespace.
     */
    /// Produced when a sub-level or value is added to a level that has not yet been added to the namespace. The
    /// `AmlName` is the name of the entire sub-level/value.
    LevelDoesNotExist(AmlName),
    ValueDoesNotExist(AmlName),
    TriedToRemoveRootNamespace,
    HandleDoesNotExist(AmlHandle),

    /*
     * Errors produced executing control methods.
     */
    /// Produced when AML tries to access an argument or local when no method is executing.
    NotExecutingControlMethod,
    /// Produced when a method accesses an argument it was not passed. The `ArgNum` is the argument number accessed.
    InvalidArgAccess(ArgNum),
    /// Produced when a method accesses a local that is out of range (locals are numbered 0..=7).
    InvalidLocalAccess(LocalNum),
    /// Produced when a method is invoked with the wrong number of arguments for its declaration.
    IncorrectMethodArgumentCount,
    TooManyArgs,

    /*
     * Errors produced parsing or evaluating values.
     */
    IncompatibleValueConversion {
        current: AmlType,
        target: AmlType,
    },
    TypeCannotBeCompared(AmlType),
    TypeCannotBeSliced(AmlType),
    TypeCannotBeIndexed(AmlType),
    TypeCannotBeDereferenced(AmlType),
    TypeCannotBeStoredInto(AmlType),
    TypeCannotBeSized(AmlType),
    IndexOutOfBounds(u64),
    InvalidTarget,
    DivideByZero,
    InvalidBcd(u64),

    /*
     * Errors produced by the field I/O engine.
     */
    FieldRegionIsNotOpRegion,
    FieldInvalidAddress,
    FieldInvalidAccessSize,
    UnsupportedAddressSpace,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::*, value::MethodFlags};
    use alloc::{rc::Rc, vec};
    use core::cell::Cell;

    #[test]
    fn test_eisa_id_decoding() {
        // "PNP0C0A" (the control-method battery device) in its compressed DWord form
        assert_eq!(eisa_id_to_string(0x0a0c_d041), "PNP0C0A");
        // "PNP0A03" (a PCI root bridge)
        assert_eq!(eisa_id_to_string(0x030a_d041), "PNP0A03");
    }

    #[test]
    fn test_predefined_objects() {
        let mut context = make_test_context();
        assert!(matches!(
            context.namespace.get_by_path(&AmlName::from_str("\\_GL").unwrap()),
            Ok(&AmlValue::Mutex { sync_level: 0 })
        ));
        assert!(matches!(
            context.namespace.get_by_path(&AmlName::from_str("\\_REV").unwrap()),
            Ok(&AmlValue::Integer(2))
        ));

        // `\_OSI` claims support for nothing
        let osi = AmlName::from_str("\\_OSI").unwrap();
        let result = context
            .invoke_method(&osi, Args::from_list(vec![AmlValue::String("Windows 2001".into())]).unwrap())
            .unwrap();
        assert!(crudely_cmp_values(&result, &AmlValue::Integer(0)));
    }

    #[test]
    fn test_integer_width() {
        let mut context = make_test_context();
        assert_eq!(context.ones(), u64::MAX);
        context.set_table_revision(1);
        assert_eq!(context.ones(), u64::from(u32::MAX));
        context.set_table_revision(2);
        assert_eq!(context.ones(), u64::MAX);
    }

    #[test]
    fn test_store_into_local_is_copy() {
        let mut context = make_test_context();

        // AML equivalent: Method (TEST, 0) { Name (FOO, 42) Store (FOO, Local3) Return (Local3) }
        let method = AmlName::from_str("\\TEST").unwrap();
        context
            .namespace
            .add_value(
                method.clone(),
                AmlValue::Method {
                    flags: MethodFlags::new(0, false, 0),
                    code: value::MethodCode::Aml(
                        [
                            &[0x08, b'F', b'O', b'O', b'_', 0x0a, 42][..],         // Name (FOO, 42)
                            &[0x70, b'F', b'O', b'O', b'_', 0x63][..],             // Store (FOO, Local3)
                            &[0xa4, 0x63][..],                                     // Return (Local3)
                        ]
                        .concat(),
                    ),
                },
            )
            .unwrap();

        let result = context.invoke_method(&method, Args::EMPTY).unwrap();
        assert!(crudely_cmp_values(&result, &AmlValue::Integer(42)));
    }

    #[test]
    fn test_method_transient_names_are_destroyed() {
        let mut context = make_test_context();

        let method = AmlName::from_str("\\TEST").unwrap();
        context
            .namespace
            .add_value(
                method.clone(),
                AmlValue::Method {
                    flags: MethodFlags::new(0, false, 0),
                    code: value::MethodCode::Aml(vec![0x08, b'T', b'M', b'P', b'_', 0x0a, 5]), // Name (TMP, 5)
                },
            )
            .unwrap();

        context.invoke_method(&method, Args::EMPTY).unwrap();
        // The method's transient `TMP` must not survive the invocation
        assert_eq!(
            context.namespace.get_by_path(&AmlName::from_str("\\TEST.TMP_").unwrap()).unwrap_err(),
            AmlError::LevelDoesNotExist(AmlName::from_str("\\TEST").unwrap())
        );

        // ...and invoking it a second time must not collide with a leftover
        context.invoke_method(&method, Args::EMPTY).unwrap();
    }

    #[test]
    fn test_notify_dispatch() {
        let mut context = make_test_context();
        let device = AmlName::from_str("\\_SB_.LID_").unwrap();
        context.namespace.add_level(AmlName::from_str("\\_SB_").unwrap(), LevelType::Scope).unwrap();
        context.namespace.add_level(device.clone(), LevelType::Device).unwrap();
        context.namespace.add_value(device.clone(), AmlValue::Device).unwrap();
        context
            .namespace
            .add_value(
                AmlName::from_str("\\_SB_.LID_._HID").unwrap(),
                AmlValue::String("PNP0C0D".into()),
            )
            .unwrap();

        let by_node = Rc::new(Cell::new(0u64));
        let by_pnp = Rc::new(Cell::new(0u64));
        {
            let by_node = by_node.clone();
            context
                .register_notify_handler(device.clone(), Box::new(move |_, value| by_node.set(value)))
                .unwrap();
        }
        {
            let by_pnp = by_pnp.clone();
            context.register_pnp_notify_handler("PNP0C0D", Box::new(move |_, value| by_pnp.set(value)));
        }

        context.notify(&device, 0x80);
        assert_eq!(by_node.get(), 0x80);
        assert_eq!(by_pnp.get(), 0x80);
    }

    #[test]
    fn test_method_add_and_return() {
        let mut context = make_test_context();

        /*
         * Method (TST, 0) {
         *     Name (X, 5)
         *     Add (X, 3, Local0)
         *     Return (Local0)
         * }
         */
        let body = [
            &[0x08, b'X', b'_', b'_', b'_', 0x0a, 5][..],          // Name (X, 5)
            &[0x72, b'X', b'_', b'_', b'_', 0x0a, 3, 0x60][..],    // Add (X, 3, Local0)
            &[0xa4, 0x60][..],                                     // Return (Local0)
        ]
        .concat();

        let mut method = vec![0x14];
        method.extend(encode_pkg_length_including_self(4 + 1 + body.len() as u32));
        method.extend(b"TST_");
        method.push(0x00);
        method.extend(&body);
        context.parse_table(&method).unwrap();

        let result = context.invoke_method(&AmlName::from_str("\\TST_").unwrap(), Args::EMPTY).unwrap();
        assert!(crudely_cmp_values(&result, &AmlValue::Integer(8)));
    }

    #[test]
    fn test_return_unwinds_nested_blocks() {
        let mut context = make_test_context();

        /*
         * Name (RES, 0)
         * Method (TST, 0) {
         *     If (One) { If (One) { Return (42) } }
         *     Store (7, RES)
         * }
         *
         * The `Return` from inside the nested `If`s must terminate the whole method: the `Store`
         * after the outer `If` never executes.
         */
        let body = [
            &[0xa0, 0x08, 0x01][..],                   // If (One), body 6 bytes
            &[0xa0, 0x05, 0x01, 0xa4, 0x0a, 42][..],   // If (One) { Return (42) }
            &[0x70, 0x0a, 7, b'R', b'E', b'S', b'_'][..], // Store (7, RES)
        ]
        .concat();

        let mut stream = alloc::vec::Vec::new();
        stream.extend(&[0x08, b'R', b'E', b'S', b'_', 0x0a, 0]); // Name (RES, 0)
        stream.push(0x14);
        stream.extend(encode_pkg_length_including_self(4 + 1 + body.len() as u32));
        stream.extend(b"TST_");
        stream.push(0x00);
        stream.extend(&body);
        context.parse_table(&stream).unwrap();

        let result = context.invoke_method(&AmlName::from_str("\\TST_").unwrap(), Args::EMPTY).unwrap();
        assert!(crudely_cmp_values(&result, &AmlValue::Integer(42)));
        assert!(crudely_cmp_values(
            context.namespace.get_by_path(&AmlName::from_str("\\RES_").unwrap()).unwrap(),
            &AmlValue::Integer(0)
        ));
    }

    #[test]
    fn test_field_io_end_to_end() {
        let (mut context, memory) = make_ram_context(16);

        /*
         * OperationRegion (GPRW, SystemMemory, 0, 16)
         * Field (GPRW, ByteAcc, NoLock, Preserve) {
         *     LOW, 8,
         *     HIB, 1,
         * }
         * Method (TST, 0) {
         *     Store (0xFF, LOW)
         *     Return (HIB)
         * }
         *
         * Writing all-ones to the 8-bit field must not disturb the 1-bit field that follows it.
         */
        let mut stream = alloc::vec::Vec::new();
        stream.extend(&[0x5b, 0x80, b'G', b'P', b'R', b'W', 0x00, 0x0a, 0, 0x0a, 16]);

        let field_list =
            [&[b'L', b'O', b'W', b'_', 8][..], &[b'H', b'I', b'B', b'_', 1][..]].concat();
        stream.extend(&[0x5b, 0x81]);
        stream.extend(encode_pkg_length_including_self(4 + 1 + field_list.len() as u32));
        stream.extend(b"GPRW");
        stream.push(0x01); // ByteAcc, NoLock, Preserve
        stream.extend(&field_list);

        let body = [
            &[0x70, 0x0a, 0xff, b'L', b'O', b'W', b'_'][..], // Store (0xFF, LOW)
            &[0xa4, b'H', b'I', b'B', b'_'][..],             // Return (HIB)
        ]
        .concat();
        stream.push(0x14);
        stream.extend(encode_pkg_length_including_self(4 + 1 + body.len() as u32));
        stream.extend(b"TST_");
        stream.push(0x00);
        stream.extend(&body);

        context.parse_table(&stream).unwrap();

        let result = context.invoke_method(&AmlName::from_str("\\TST_").unwrap(), Args::EMPTY).unwrap();
        assert!(crudely_cmp_values(&result, &AmlValue::Integer(0)));
        assert_eq!(memory.borrow()[0], 0xff);
        assert_eq!(memory.borrow()[1], 0x00);
    }

    #[test]
    fn test_method_arguments() {
        let mut context = make_test_context();

        // Method (TST, 2) { Return (Subtract (Arg0, Arg1)) }
        let body = [0xa4, 0x74, 0x68, 0x69, 0x00];
        let mut method = vec![0x14];
        method.extend(encode_pkg_length_including_self(4 + 1 + body.len() as u32));
        method.extend(b"TST_");
        method.push(0x02);
        method.extend(&body);
        context.parse_table(&method).unwrap();

        let args = Args::from_list(vec![AmlValue::Integer(10), AmlValue::Integer(4)]).unwrap();
        let result = context.invoke_method(&AmlName::from_str("\\TST_").unwrap(), args).unwrap();
        assert!(crudely_cmp_values(&result, &AmlValue::Integer(6)));

        // Invoking with the wrong number of arguments is an error
        assert_eq!(
            context.invoke_method(&AmlName::from_str("\\TST_").unwrap(), Args::EMPTY).unwrap_err(),
            AmlError::IncorrectMethodArgumentCount
        );
    }

    #[test]
    fn test_degraded_evaluation_is_distinguishable() {
        let mut context = make_test_context();

        // A method that stores to a name that doesn't exist: lenient, but degraded
        let method = AmlName::from_str("\\BAD_").unwrap();
        context
            .namespace
            .add_value(
                method.clone(),
                AmlValue::Method {
                    flags: MethodFlags::new(0, false, 0),
                    code: value::MethodCode::Aml(
                        [
                            &[0x70, 0x0a, 7, b'N', b'O', b'P', b'E'][..], // Store (7, NOPE)
                            &[0xa4, 0x0a, 7][..],                         // Return (7)
                        ]
                        .concat(),
                    ),
                },
            )
            .unwrap();

        let evaluation = context.evaluate(&method, Args::EMPTY).unwrap();
        assert!(evaluation.degraded);
        assert!(crudely_cmp_values(&evaluation.value, &AmlValue::Integer(7)));

        // A clean method is not marked degraded
        let clean = AmlName::from_str("\\GOOD").unwrap();
        context
            .namespace
            .add_value(
                clean.clone(),
                AmlValue::Method {
                    flags: MethodFlags::new(0, false, 0),
                    code: value::MethodCode::Aml(vec![0xa4, 0x01]), // Return (One)
                },
            )
            .unwrap();
        let evaluation = context.evaluate(&clean, Args::EMPTY).unwrap();
        assert!(!evaluation.degraded);
    }
}
