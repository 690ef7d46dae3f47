use crate::{AmlContext, AmlValue, DebugVerbosity, Handler};
use alloc::{boxed::Box, rc::Rc, vec::Vec};
use core::cell::RefCell;

struct TestHandler;

impl Handler for TestHandler {
    fn read_u8(&self, _address: usize) -> u8 {
        unimplemented!()
    }
    fn read_u16(&self, _address: usize) -> u16 {
        unimplemented!()
    }
    fn read_u32(&self, _address: usize) -> u32 {
        unimplemented!()
    }
    fn read_u64(&self, _address: usize) -> u64 {
        unimplemented!()
    }

    fn write_u8(&mut self, _address: usize, _value: u8) {
        unimplemented!()
    }
    fn write_u16(&mut self, _address: usize, _value: u16) {
        unimplemented!()
    }
    fn write_u32(&mut self, _address: usize, _value: u32) {
        unimplemented!()
    }
    fn write_u64(&mut self, _address: usize, _value: u64) {
        unimplemented!()
    }

    fn read_io_u8(&self, _port: u16) -> u8 {
        unimplemented!()
    }
    fn read_io_u16(&self, _port: u16) -> u16 {
        unimplemented!()
    }
    fn read_io_u32(&self, _port: u16) -> u32 {
        unimplemented!()
    }

    fn write_io_u8(&mut self, _port: u16, _value: u8) {
        unimplemented!()
    }
    fn write_io_u16(&mut self, _port: u16, _value: u16) {
        unimplemented!()
    }
    fn write_io_u32(&mut self, _port: u16, _value: u32) {
        unimplemented!()
    }

    fn read_pci_u8(&self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16) -> u8 {
        unimplemented!()
    }
    fn read_pci_u16(&self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16) -> u16 {
        unimplemented!()
    }
    fn read_pci_u32(&self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16) -> u32 {
        unimplemented!()
    }
    fn write_pci_u8(&mut self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16, _value: u8) {
        unimplemented!()
    }
    fn write_pci_u16(&mut self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16, _value: u16) {
        unimplemented!()
    }
    fn write_pci_u32(&mut self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16, _value: u32) {
        unimplemented!()
    }

    fn stall(&self, _microseconds: u64) {}
    fn sleep(&self, _milliseconds: u64) {}
}

pub(crate) fn make_test_context() -> AmlContext {
    AmlContext::new(Box::new(TestHandler), DebugVerbosity::None)
}

/// A `Handler` backed by a plain chunk of RAM, for testing field I/O against `SystemMemory`
/// op-regions. The memory is shared with the test through an `Rc`, so the test can inspect what
/// the "hardware" saw.
struct RamHandler {
    memory: Rc<RefCell<Vec<u8>>>,
}

impl RamHandler {
    fn read_bytes(&self, address: usize, width: usize) -> u64 {
        let memory = self.memory.borrow();
        let mut value = 0u64;
        for i in 0..width {
            value |= u64::from(memory[address + i]) << (8 * i);
        }
        value
    }

    fn write_bytes(&mut self, address: usize, width: usize, value: u64) {
        let mut memory = self.memory.borrow_mut();
        for i in 0..width {
            memory[address + i] = (value >> (8 * i)) as u8;
        }
    }
}

impl Handler for RamHandler {
    fn read_u8(&self, address: usize) -> u8 {
        self.read_bytes(address, 1) as u8
    }
    fn read_u16(&self, address: usize) -> u16 {
        self.read_bytes(address, 2) as u16
    }
    fn read_u32(&self, address: usize) -> u32 {
        self.read_bytes(address, 4) as u32
    }
    fn read_u64(&self, address: usize) -> u64 {
        self.read_bytes(address, 8)
    }

    fn write_u8(&mut self, address: usize, value: u8) {
        self.write_bytes(address, 1, value as u64)
    }
    fn write_u16(&mut self, address: usize, value: u16) {
        self.write_bytes(address, 2, value as u64)
    }
    fn write_u32(&mut self, address: usize, value: u32) {
        self.write_bytes(address, 4, value as u64)
    }
    fn write_u64(&mut self, address: usize, value: u64) {
        self.write_bytes(address, 8, value)
    }

    fn read_io_u8(&self, _port: u16) -> u8 {
        unimplemented!()
    }
    fn read_io_u16(&self, _port: u16) -> u16 {
        unimplemented!()
    }
    fn read_io_u32(&self, _port: u16) -> u32 {
        unimplemented!()
    }

    fn write_io_u8(&mut self, _port: u16, _value: u8) {
        unimplemented!()
    }
    fn write_io_u16(&mut self, _port: u16, _value: u16) {
        unimplemented!()
    }
    fn write_io_u32(&mut self, _port: u16, _value: u32) {
        unimplemented!()
    }

    fn read_pci_u8(&self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16) -> u8 {
        unimplemented!()
    }
    fn read_pci_u16(&self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16) -> u16 {
        unimplemented!()
    }
    fn read_pci_u32(&self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16) -> u32 {
        unimplemented!()
    }
    fn write_pci_u8(&mut self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16, _value: u8) {
        unimplemented!()
    }
    fn write_pci_u16(&mut self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16, _value: u16) {
        unimplemented!()
    }
    fn write_pci_u32(&mut self, _segment: u16, _bus: u8, _device: u8, _function: u8, _offset: u16, _value: u32) {
        unimplemented!()
    }

    fn stall(&self, _microseconds: u64) {}
    fn sleep(&self, _milliseconds: u64) {}
}

pub(crate) fn make_ram_context(size: usize) -> (AmlContext, Rc<RefCell<Vec<u8>>>) {
    let memory = Rc::new(RefCell::new(alloc::vec![0u8; size]));
    let context = AmlContext::new(Box::new(RamHandler { memory: memory.clone() }), DebugVerbosity::None);
    (context, memory)
}

/// Encode a raw length in the shortest of the four PkgLength forms. Only used to build test
/// fixtures - the interpreter itself never needs to emit AML.
pub(crate) fn encode_pkg_length(length: u32) -> Vec<u8> {
    assert!(length <= 0x0fff_ffff);

    if length <= 0x3f {
        return alloc::vec![length as u8];
    }

    let extra_bytes = if length <= 0xfff { 1 } else if length <= 0xf_ffff { 2 } else { 3 };
    let mut encoded = alloc::vec![((extra_bytes as u8) << 6) | (length & 0xf) as u8];
    for i in 0..extra_bytes {
        encoded.push((length >> (4 + 8 * i)) as u8);
    }
    encoded
}

/// Encode a PkgLength whose raw length covers `payload` bytes *plus the encoding itself*, which
/// is how the lengths of AML's explicit-length structures are defined.
pub(crate) fn encode_pkg_length_including_self(payload: u32) -> Vec<u8> {
    for size in 1..=4u32 {
        let encoded = encode_pkg_length(payload + size);
        if encoded.len() as u32 == size {
            return encoded;
        }
    }
    panic!("payload too large to encode in a PkgLength")
}

macro_rules! check_err {
    ($parse: expr, $error: pat, $remains: expr) => {
        match $parse {
            Ok((remains, _, result)) => panic!("Expected Err, got {:#?}. Remaining = {:#x?}", result, remains),
            Err((remains, _, $crate::parser::Propagate::Err($error))) if *remains == *$remains => (),
            Err((remains, _, $crate::parser::Propagate::Err($error))) => {
                panic!("Correct error, incorrect stream returned: {:#x?}", remains)
            }
            Err((_, _, err)) => panic!("Got wrong error: {:?}", err),
        }
    };
}
pub(crate) use check_err;

macro_rules! check_ok {
    ($parse: expr, $expected: expr, $remains: expr) => {
        match $parse {
            Ok((remains, _, ref result)) if remains == *$remains && result == &$expected => (),
            Ok((remains, _, ref result)) if result == &$expected => {
                panic!("Correct result, incorrect slice returned: {:x?}", remains)
            }
            Ok((_, _, ref result)) => panic!("Successfully parsed Ok, but it was wrong: {:#?}", result),
            Err((_, _, err)) => panic!("Expected Ok, got {:#?}", err),
        }
    };
}
pub(crate) use check_ok;

macro_rules! check_ok_value {
    ($parse: expr, $expected: expr, $remains: expr) => {
        match $parse {
            Ok((remains, _, ref result))
                if remains == *$remains && $crate::test_utils::crudely_cmp_values(result, &$expected) =>
            {
                ()
            }
            Ok((remains, _, ref result)) if $crate::test_utils::crudely_cmp_values(result, &$expected) => {
                panic!("Correct result, incorrect slice returned: {:x?}", remains)
            }
            Ok((_, _, ref result)) => panic!("Successfully parsed Ok, but it was wrong: {:#?}", result),
            Err((_, _, err)) => panic!("Expected Ok, got {:#?}", err),
        }
    };
}
pub(crate) use check_ok_value;

/// This is a bad (but good for testing) way of comparing `AmlValue`s, which tests that they're exactly the same if
/// it can, and gives up if it can't. It's useful in tests to be able to see if you're getting the `AmlValue` that
/// you're expecting.
///
/// NOTE: `AmlValue` deliberately doesn't implement `Eq` - in the real interpreter, you rarely want to directly
/// compare values, as you need to apply the AML value conversion rules to compare them correctly, so direct
/// comparison would be a footgun. This is therefore only useful for artificial testing scenarios.
pub(crate) fn crudely_cmp_values(a: &AmlValue, b: &AmlValue) -> bool {
    use crate::value::{FieldKind, MethodCode, ReferenceTarget};
    use alloc::sync::Arc;

    match a {
        AmlValue::Uninitialized => matches!(b, AmlValue::Uninitialized),
        AmlValue::Boolean(a) => match b {
            AmlValue::Boolean(b) => a == b,
            _ => false,
        },
        AmlValue::Integer(a) => match b {
            AmlValue::Integer(b) => a == b,
            _ => false,
        },
        AmlValue::String(ref a) => match b {
            AmlValue::String(ref b) => a == b,
            _ => false,
        },
        AmlValue::Buffer(a) => match b {
            AmlValue::Buffer(b) => Arc::ptr_eq(a, b) || *a.lock() == *b.lock(),
            _ => false,
        },
        AmlValue::Package(a) => match b {
            AmlValue::Package(b) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.lock();
                let b = b.lock();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| crudely_cmp_values(a, b))
            }
            _ => false,
        },
        AmlValue::OpRegion(a) => match b {
            AmlValue::OpRegion(b) => a == b,
            _ => false,
        },
        AmlValue::Field { kind, flags, offset, length } => match b {
            AmlValue::Field { kind: b_kind, flags: b_flags, offset: b_offset, length: b_length } => {
                let kinds_match = match (kind, b_kind) {
                    (FieldKind::Normal { region }, FieldKind::Normal { region: b_region }) => {
                        region == b_region
                    }
                    (
                        FieldKind::Bank { region, bank, bank_value },
                        FieldKind::Bank { region: b_region, bank: b_bank, bank_value: b_bank_value },
                    ) => region == b_region && bank == b_bank && bank_value == b_bank_value,
                    (
                        FieldKind::Index { index, data },
                        FieldKind::Index { index: b_index, data: b_data },
                    ) => index == b_index && data == b_data,
                    _ => false,
                };
                kinds_match && flags == b_flags && offset == b_offset && length == b_length
            }
            _ => false,
        },
        AmlValue::BufferField { buffer_data, offset, length } => match b {
            AmlValue::BufferField { buffer_data: b_buffer_data, offset: b_offset, length: b_length } => {
                Arc::ptr_eq(buffer_data, b_buffer_data) && offset == b_offset && length == b_length
            }
            _ => false,
        },
        AmlValue::Method { flags, code } => match b {
            AmlValue::Method { flags: b_flags, code: b_code } => {
                if flags != b_flags {
                    return false;
                }

                match (code, b_code) {
                    (MethodCode::Aml(a), MethodCode::Aml(b)) => a == b,
                    (MethodCode::Aml(_), MethodCode::Native(_)) => false,
                    (MethodCode::Native(_), MethodCode::Aml(_)) => false,
                    (MethodCode::Native(_), MethodCode::Native(_)) => panic!("Can't compare two native methods"),
                }
            }
            _ => false,
        },
        AmlValue::Mutex { sync_level } => match b {
            AmlValue::Mutex { sync_level: b_sync_level } => sync_level == b_sync_level,
            _ => false,
        },
        AmlValue::Event { signal_count } => match b {
            AmlValue::Event { signal_count: b_signal_count } => signal_count == b_signal_count,
            _ => false,
        },
        AmlValue::Device => matches!(b, AmlValue::Device),
        AmlValue::Processor { id, pblk_address, pblk_len } => match b {
            AmlValue::Processor { id: b_id, pblk_address: b_pblk_address, pblk_len: b_pblk_len } => {
                id == b_id && pblk_address == b_pblk_address && pblk_len == b_pblk_len
            }
            _ => false,
        },
        AmlValue::PowerResource { system_level, resource_order } => match b {
            AmlValue::PowerResource { system_level: b_system_level, resource_order: b_resource_order } => {
                system_level == b_system_level && resource_order == b_resource_order
            }
            _ => false,
        },
        AmlValue::ThermalZone => matches!(b, AmlValue::ThermalZone),
        AmlValue::ObjectReference { index, target } => match b {
            AmlValue::ObjectReference { index: b_index, target: b_target } => {
                let targets_match = match (target, b_target) {
                    (ReferenceTarget::Named(a), ReferenceTarget::Named(b)) => a == b,
                    (ReferenceTarget::Arg(a), ReferenceTarget::Arg(b)) => a == b,
                    (ReferenceTarget::Local(a), ReferenceTarget::Local(b)) => a == b,
                    (ReferenceTarget::Value(a), ReferenceTarget::Value(b)) => crudely_cmp_values(a, b),
                    _ => false,
                };
                index == b_index && targets_match
            }
            _ => false,
        },
        AmlValue::DebugObject => matches!(b, AmlValue::DebugObject),
    }
}
