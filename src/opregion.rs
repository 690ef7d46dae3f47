use crate::{
    namespace::AmlHandle,
    value::{AmlType, AmlValue, Args, FieldAccessType, FieldFlags, FieldKind, FieldUpdateRule},
    AmlContext,
    AmlError,
    AmlName,
};
use alloc::{format, sync::Arc, vec, vec::Vec};
use bit_field::BitField;
use bitvec::{order::Lsb0, view::BitView};
use core::convert::TryInto;
use log::warn;
use spinning_top::Spinlock;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegionSpace {
    SystemMemory,
    SystemIo,
    PciConfig,
    EmbeddedControl,
    SMBus,
    SystemCmos,
    PciBarTarget,
    IPMI,
    GeneralPurposeIo,
    GenericSerialBus,
    OemDefined(u8),
}

/// A declared hardware address range (the backing store of `Field` declarations). `base` and
/// `length` are in **bytes**. For PCI-config-like spaces, `parent_device` records the device the
/// region was declared under, so its `_SEG`/`_BBN`/`_ADR` can be evaluated when the region is
/// actually accessed - no device-tree walk is needed in the I/O path.
#[derive(Clone, PartialEq, Debug)]
pub struct OpRegion {
    pub region: RegionSpace,
    pub base: u64,
    pub length: u64,
    pub parent_device: Option<AmlName>,
}

impl OpRegion {
    pub fn new(region: RegionSpace, base: u64, length: u64, parent_device: Option<AmlName>) -> OpRegion {
        OpRegion { region, base, length, parent_device }
    }

    /// Perform a standard-size read from this op-region. `length` is the access width in bits and
    /// must be a supported power-of-2; `offset` is in bytes and must be aligned for that width.
    pub fn read(&self, offset: u64, length: u64, context: &mut AmlContext) -> Result<u64, AmlError> {
        if offset + length / 8 > self.length {
            warn!(
                "AML field access at byte offset {:#x} ({} bits) overruns its {:#x}-byte region",
                offset, length, self.length
            );
            return Err(AmlError::FieldInvalidAddress);
        }

        match self.region {
            RegionSpace::SystemMemory => {
                let address =
                    (self.base + offset).try_into().map_err(|_| AmlError::FieldInvalidAddress)?;
                match length {
                    8 => Ok(context.handler.read_u8(address) as u64),
                    16 => Ok(context.handler.read_u16(address) as u64),
                    32 => Ok(context.handler.read_u32(address) as u64),
                    64 => Ok(context.handler.read_u64(address)),
                    _ => Err(AmlError::FieldInvalidAccessSize),
                }
            }

            RegionSpace::SystemIo => {
                let port = (self.base + offset).try_into().map_err(|_| AmlError::FieldInvalidAddress)?;
                match length {
                    8 => Ok(context.handler.read_io_u8(port) as u64),
                    16 => Ok(context.handler.read_io_u16(port) as u64),
                    32 => Ok(context.handler.read_io_u32(port) as u64),
                    _ => Err(AmlError::FieldInvalidAccessSize),
                }
            }

            RegionSpace::PciConfig => {
                let (seg, bbn, device, function) = self.pci_address(context)?;
                let offset = (self.base + offset).try_into().map_err(|_| AmlError::FieldInvalidAddress)?;
                match length {
                    8 => Ok(context.handler.read_pci_u8(seg, bbn, device, function, offset) as u64),
                    16 => Ok(context.handler.read_pci_u16(seg, bbn, device, function, offset) as u64),
                    32 => Ok(context.handler.read_pci_u32(seg, bbn, device, function, offset) as u64),
                    _ => Err(AmlError::FieldInvalidAccessSize),
                }
            }

            RegionSpace::EmbeddedControl => match length {
                8 => Ok(context.handler.read_ec_u8(self.base + offset) as u64),
                _ => Err(AmlError::FieldInvalidAccessSize),
            },

            _ => Err(AmlError::UnsupportedAddressSpace),
        }
    }

    /// Perform a standard-size write to this op-region. `length` is the access width in bits and
    /// must be a supported power-of-2; `offset` is in bytes and must be aligned for that width.
    pub fn write(&self, offset: u64, length: u64, value: u64, context: &mut AmlContext) -> Result<(), AmlError> {
        if offset + length / 8 > self.length {
            warn!(
                "AML field access at byte offset {:#x} ({} bits) overruns its {:#x}-byte region",
                offset, length, self.length
            );
            return Err(AmlError::FieldInvalidAddress);
        }

        match self.region {
            RegionSpace::SystemMemory => {
                let address =
                    (self.base + offset).try_into().map_err(|_| AmlError::FieldInvalidAddress)?;
                match length {
                    8 => Ok(context.handler.write_u8(address, value as u8)),
                    16 => Ok(context.handler.write_u16(address, value as u16)),
                    32 => Ok(context.handler.write_u32(address, value as u32)),
                    64 => Ok(context.handler.write_u64(address, value)),
                    _ => Err(AmlError::FieldInvalidAccessSize),
                }
            }

            RegionSpace::SystemIo => {
                let port = (self.base + offset).try_into().map_err(|_| AmlError::FieldInvalidAddress)?;
                match length {
                    8 => Ok(context.handler.write_io_u8(port, value as u8)),
                    16 => Ok(context.handler.write_io_u16(port, value as u16)),
                    32 => Ok(context.handler.write_io_u32(port, value as u32)),
                    _ => Err(AmlError::FieldInvalidAccessSize),
                }
            }

            RegionSpace::PciConfig => {
                let (seg, bbn, device, function) = self.pci_address(context)?;
                let offset = (self.base + offset).try_into().map_err(|_| AmlError::FieldInvalidAddress)?;
                match length {
                    8 => Ok(context.handler.write_pci_u8(seg, bbn, device, function, offset, value as u8)),
                    16 => Ok(context.handler.write_pci_u16(seg, bbn, device, function, offset, value as u16)),
                    32 => Ok(context.handler.write_pci_u32(seg, bbn, device, function, offset, value as u32)),
                    _ => Err(AmlError::FieldInvalidAccessSize),
                }
            }

            RegionSpace::EmbeddedControl => match length {
                8 => Ok(context.handler.write_ec_u8(self.base + offset, value as u8)),
                _ => Err(AmlError::FieldInvalidAccessSize),
            },

            _ => Err(AmlError::UnsupportedAddressSpace),
        }
    }

    /// Work out the PCI address a `PciConfig` region decodes to. `_SEG` and `_BBN` are optional,
    /// with defaults that line up with legacy PCI implementations (a single segment group and a
    /// single root, respectively); `_ADR` is required.
    fn pci_address(&self, context: &mut AmlContext) -> Result<(u16, u8, u8, u8), AmlError> {
        let parent_device = self.parent_device.as_ref().ok_or(AmlError::FieldInvalidAddress)?;

        let seg = match context
            .invoke_method(&AmlName::from_str("_SEG").unwrap().resolve(parent_device)?, Args::EMPTY)
        {
            Ok(seg) => {
                seg.as_integer(context)?.try_into().map_err(|_| AmlError::FieldInvalidAddress)?
            }
            Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => 0,
            Err(err) => return Err(err),
        };
        let bbn = match context
            .invoke_method(&AmlName::from_str("_BBN").unwrap().resolve(parent_device)?, Args::EMPTY)
        {
            Ok(bbn) => {
                bbn.as_integer(context)?.try_into().map_err(|_| AmlError::FieldInvalidAddress)?
            }
            Err(AmlError::ValueDoesNotExist(_)) | Err(AmlError::LevelDoesNotExist(_)) => 0,
            Err(err) => return Err(err),
        };
        let adr = context
            .invoke_method(&AmlName::from_str("_ADR").unwrap().resolve(parent_device)?, Args::EMPTY)?
            .as_integer(context)?;

        let device = adr.get_bits(16..24) as u8;
        let function = adr.get_bits(0..8) as u8;
        Ok((seg, bbn, device, function))
    }
}

/// The access width, in bits, implied by a field's declared access type. `Any` allows the
/// interpreter to pick, and we pick bytes - the smallest unit, which disturbs the least state
/// around the field.
fn access_width_bits(access_type: FieldAccessType) -> u64 {
    match access_type {
        FieldAccessType::Any => 8,
        FieldAccessType::Byte => 8,
        FieldAccessType::Word => 16,
        FieldAccessType::DWord => 32,
        FieldAccessType::QWord => 64,
        FieldAccessType::Buffer => 8,
    }
}

fn width_ones(bits: u64) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

impl AmlContext {
    /// Read a field (op-region field, index field, bank field, or buffer field), producing an
    /// `Integer` if the field is narrower than the live integer width and a `Buffer` otherwise.
    /// Failed hardware accesses degrade to zero (recorded, see `Evaluation::degraded`) so one bad
    /// field access doesn't abort the evaluation around it.
    pub(crate) fn read_field(&mut self, field: &AmlValue) -> Result<AmlValue, AmlError> {
        match self.read_field_inner(field) {
            Ok(value) => Ok(value),
            Err(err @ (AmlError::FieldInvalidAddress | AmlError::UnsupportedAddressSpace)) => {
                self.record_degradation(&format!("field read failed: {:?}", err));
                Ok(AmlValue::Integer(0))
            }
            Err(err) => Err(err),
        }
    }

    /// Write a value (integer, buffer, or string) into a field. Failed hardware accesses degrade
    /// to a no-op, like `read_field`.
    pub(crate) fn write_field(&mut self, field: &AmlValue, value: AmlValue) -> Result<(), AmlError> {
        match self.write_field_inner(field, value) {
            Ok(()) => Ok(()),
            Err(err @ (AmlError::FieldInvalidAddress | AmlError::UnsupportedAddressSpace)) => {
                self.record_degradation(&format!("field write failed: {:?}", err));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn read_field_inner(&mut self, field: &AmlValue) -> Result<AmlValue, AmlError> {
        match field {
            AmlValue::BufferField { buffer_data, offset, length } => {
                self.read_buffer_field(buffer_data, *offset, *length)
            }

            AmlValue::Field { kind: FieldKind::Normal { region }, flags, offset, length } => {
                let region = self.opregion_for_handle(*region)?;
                self.read_region_field(&region, *flags, *offset, *length)
            }

            AmlValue::Field { kind: FieldKind::Bank { region, bank, bank_value }, flags, offset, length } => {
                let bank_field = self.namespace.get(*bank)?.clone();
                self.write_field(&bank_field, AmlValue::Integer(*bank_value))?;
                let region = self.opregion_for_handle(*region)?;
                self.read_region_field(&region, *flags, *offset, *length)
            }

            AmlValue::Field { kind: FieldKind::Index { index, data }, flags, offset, length } => {
                self.read_index_field(*index, *data, *flags, *offset, *length)
            }

            _ => Err(AmlError::IncompatibleValueConversion {
                current: field.type_of(),
                target: AmlType::FieldUnit,
            }),
        }
    }

    fn write_field_inner(&mut self, field: &AmlValue, value: AmlValue) -> Result<(), AmlError> {
        match field {
            AmlValue::BufferField { buffer_data, offset, length } => {
                self.write_buffer_field(buffer_data, *offset, *length, value)
            }

            AmlValue::Field { kind: FieldKind::Normal { region }, flags, offset, length } => {
                let region = self.opregion_for_handle(*region)?;
                self.write_region_field(&region, *flags, *offset, *length, value)
            }

            AmlValue::Field { kind: FieldKind::Bank { region, bank, bank_value }, flags, offset, length } => {
                let bank_field = self.namespace.get(*bank)?.clone();
                self.write_field(&bank_field, AmlValue::Integer(*bank_value))?;
                let region = self.opregion_for_handle(*region)?;
                self.write_region_field(&region, *flags, *offset, *length, value)
            }

            AmlValue::Field { kind: FieldKind::Index { index, data }, flags, offset, length } => {
                self.write_index_field(*index, *data, *flags, *offset, *length, value)
            }

            _ => Err(AmlError::IncompatibleValueConversion {
                current: field.type_of(),
                target: AmlType::FieldUnit,
            }),
        }
    }

    fn opregion_for_handle(&self, handle: AmlHandle) -> Result<OpRegion, AmlError> {
        match self.namespace.get(handle)? {
            AmlValue::OpRegion(region) => Ok(region.clone()),
            _ => Err(AmlError::FieldRegionIsNotOpRegion),
        }
    }

    /// Pack bits read out of a field into a result value: an `Integer` if the field is narrower
    /// than the live integer width, a `Buffer` otherwise.
    fn bits_to_value(&self, bytes: Vec<u8>, length: u64) -> AmlValue {
        if length < u64::from(self.integer_width()) {
            let mut value = 0u64;
            for (i, byte) in bytes.iter().enumerate().take(8) {
                value |= (*byte as u64) << (8 * i);
            }
            AmlValue::Integer(value & width_ones(length))
        } else {
            AmlValue::Buffer(Arc::new(Spinlock::new(bytes)))
        }
    }

    fn read_buffer_field(
        &mut self,
        buffer_data: &Arc<Spinlock<Vec<u8>>>,
        offset: u64,
        length: u64,
    ) -> Result<AmlValue, AmlError> {
        let offset = offset as usize;
        let length = length as usize;

        let mut result = vec![0u8; (length + 7) / 8];
        {
            let data = buffer_data.lock();
            if offset + length > data.len() * 8 {
                return Err(AmlError::FieldInvalidAddress);
            }

            if offset % 8 == 0 && length % 8 == 0 {
                // Byte-aligned fast path
                let byte_offset = offset / 8;
                result.copy_from_slice(&data[byte_offset..byte_offset + length / 8]);
            } else {
                let source_bits = data.view_bits::<Lsb0>();
                let result_bits = result.view_bits_mut::<Lsb0>();
                for i in 0..length {
                    result_bits.set(i, source_bits[offset + i]);
                }
            }
        }

        Ok(self.bits_to_value(result, length as u64))
    }

    fn write_buffer_field(
        &mut self,
        buffer_data: &Arc<Spinlock<Vec<u8>>>,
        offset: u64,
        length: u64,
        value: AmlValue,
    ) -> Result<(), AmlError> {
        let offset = offset as usize;
        let length = length as usize;

        /*
         * Copy the source bits out before locking the destination: the source may be the very
         * buffer we're writing into.
         */
        let mut source: Vec<u8> = {
            let source = value.as_buffer(self)?;
            let copied = source.lock().clone();
            copied
        };
        // Zero-extend or truncate the source to exactly the field's size
        source.resize((length + 7) / 8, 0);

        let mut data = buffer_data.lock();
        if offset + length > data.len() * 8 {
            return Err(AmlError::FieldInvalidAddress);
        }

        if offset % 8 == 0 && length % 8 == 0 {
            let byte_offset = offset / 8;
            data[byte_offset..byte_offset + length / 8].copy_from_slice(&source);
        } else {
            let source_bits = source.view_bits::<Lsb0>();
            let data_bits = data.view_bits_mut::<Lsb0>();
            for i in 0..length {
                data_bits.set(offset + i, source_bits[i]);
            }
        }

        Ok(())
    }

    /// Read an op-region field by splitting its bit range into access-width-aligned units,
    /// issuing one hardware transaction per unit, and extracting the requested bits.
    fn read_region_field(
        &mut self,
        region: &OpRegion,
        flags: FieldFlags,
        offset: u64,
        length: u64,
    ) -> Result<AmlValue, AmlError> {
        if length == 0 {
            return Ok(AmlValue::Integer(0));
        }

        let access_width = access_width_bits(flags.access_type()?);
        let mut result = vec![0u8; ((length + 7) / 8) as usize];
        let result_bits = result.view_bits_mut::<Lsb0>();

        let first_unit = offset / access_width;
        let last_unit = (offset + length - 1) / access_width;
        for unit in first_unit..=last_unit {
            let unit_offset_bits = unit * access_width;
            let unit_value = region.read(unit_offset_bits / 8, access_width, self)?;

            for bit in 0..access_width {
                let global_bit = unit_offset_bits + bit;
                if global_bit >= offset && global_bit < offset + length {
                    result_bits.set((global_bit - offset) as usize, unit_value.get_bit(bit as usize));
                }
            }
        }

        Ok(self.bits_to_value(result, length))
    }

    /// Write an op-region field. Units fully covered by the field are simply overwritten; partial
    /// units honour the field's update rule - `Preserve` reads the unit first so bits outside the
    /// field are undisturbed, `WriteAsOnes`/`WriteAsZeros` pre-fill them instead.
    fn write_region_field(
        &mut self,
        region: &OpRegion,
        flags: FieldFlags,
        offset: u64,
        length: u64,
        value: AmlValue,
    ) -> Result<(), AmlError> {
        if length == 0 {
            return Ok(());
        }

        let access_width = access_width_bits(flags.access_type()?);

        let mut source: Vec<u8> = {
            let source = value.as_buffer(self)?;
            let copied = source.lock().clone();
            copied
        };
        source.resize(((length + 7) / 8) as usize, 0);
        let source_bits = source.view_bits::<Lsb0>();

        let first_unit = offset / access_width;
        let last_unit = (offset + length - 1) / access_width;
        for unit in first_unit..=last_unit {
            let unit_offset_bits = unit * access_width;
            let fully_covered =
                unit_offset_bits >= offset && unit_offset_bits + access_width <= offset + length;

            let mut unit_value = if fully_covered {
                0
            } else {
                match flags.field_update_rule()? {
                    FieldUpdateRule::Preserve => region.read(unit_offset_bits / 8, access_width, self)?,
                    FieldUpdateRule::WriteAsOnes => width_ones(access_width),
                    FieldUpdateRule::WriteAsZeros => 0,
                }
            };

            for bit in 0..access_width {
                let global_bit = unit_offset_bits + bit;
                if global_bit >= offset && global_bit < offset + length {
                    unit_value.set_bit(bit as usize, source_bits[(global_bit - offset) as usize]);
                }
            }

            region.write(unit_offset_bits / 8, access_width, unit_value, self)?;
        }

        Ok(())
    }

    /// Read an index field: for each access-width chunk, write the chunk's byte offset into the
    /// index field, then read the data field - reusing the normal field machinery for both.
    fn read_index_field(
        &mut self,
        index: AmlHandle,
        data: AmlHandle,
        flags: FieldFlags,
        offset: u64,
        length: u64,
    ) -> Result<AmlValue, AmlError> {
        if length == 0 {
            return Ok(AmlValue::Integer(0));
        }

        let access_width = access_width_bits(flags.access_type()?);
        let mut result = vec![0u8; ((length + 7) / 8) as usize];
        let result_bits = result.view_bits_mut::<Lsb0>();

        let first_unit = offset / access_width;
        let last_unit = (offset + length - 1) / access_width;
        for unit in first_unit..=last_unit {
            let unit_offset_bits = unit * access_width;

            let index_field = self.namespace.get(index)?.clone();
            self.write_field(&index_field, AmlValue::Integer(unit_offset_bits / 8))?;
            let data_field = self.namespace.get(data)?.clone();
            let chunk = self.read_field(&data_field)?.as_integer(self)?;

            for bit in 0..access_width {
                let global_bit = unit_offset_bits + bit;
                if global_bit >= offset && global_bit < offset + length {
                    result_bits.set((global_bit - offset) as usize, chunk.get_bit(bit as usize));
                }
            }
        }

        Ok(self.bits_to_value(result, length))
    }

    fn write_index_field(
        &mut self,
        index: AmlHandle,
        data: AmlHandle,
        flags: FieldFlags,
        offset: u64,
        length: u64,
        value: AmlValue,
    ) -> Result<(), AmlError> {
        if length == 0 {
            return Ok(());
        }

        let access_width = access_width_bits(flags.access_type()?);

        let mut source: Vec<u8> = {
            let source = value.as_buffer(self)?;
            let copied = source.lock().clone();
            copied
        };
        source.resize(((length + 7) / 8) as usize, 0);
        let source_bits = source.view_bits::<Lsb0>();

        let first_unit = offset / access_width;
        let last_unit = (offset + length - 1) / access_width;
        for unit in first_unit..=last_unit {
            let unit_offset_bits = unit * access_width;
            let fully_covered =
                unit_offset_bits >= offset && unit_offset_bits + access_width <= offset + length;

            let index_field = self.namespace.get(index)?.clone();
            self.write_field(&index_field, AmlValue::Integer(unit_offset_bits / 8))?;

            let mut unit_value = if fully_covered {
                0
            } else {
                match flags.field_update_rule()? {
                    FieldUpdateRule::Preserve => {
                        let data_field = self.namespace.get(data)?.clone();
                        self.read_field(&data_field)?.as_integer(self)?
                    }
                    FieldUpdateRule::WriteAsOnes => width_ones(access_width),
                    FieldUpdateRule::WriteAsZeros => 0,
                }
            };

            for bit in 0..access_width {
                let global_bit = unit_offset_bits + bit;
                if global_bit >= offset && global_bit < offset + length {
                    unit_value.set_bit(bit as usize, source_bits[(global_bit - offset) as usize]);
                }
            }

            let data_field = self.namespace.get(data)?.clone();
            self.write_field(&data_field, AmlValue::Integer(unit_value))?;
        }

        Ok(())
    }
}
