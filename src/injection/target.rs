use super::record::TargetId;
use crate::config::{FaultConfig, InstTarget, RegTargetClass};
use std::fmt;

/// Direction of the host access that reached the injector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Register file class of a register target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Integer,
    FloatingPoint,
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterClass::Integer => f.write_str("int"),
            RegisterClass::FloatingPoint => f.write_str("fp"),
        }
    }
}

/// Kind of the instruction whose execution touched the target value,
/// as reported by the host model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstKind {
    Nop,
    Load,
    Store,
    Atomic,
    Integer,
    Floating,
    Vector,
    Control,
    Call,
    Return,
    Syscall,
}

fn inst_target_matches(target: InstTarget, kind: InstKind) -> bool {
    match target {
        InstTarget::All => true,
        InstTarget::Nop => kind == InstKind::Nop,
        InstTarget::Load => kind == InstKind::Load,
        InstTarget::Store => kind == InstKind::Store,
        InstTarget::Atomic => kind == InstKind::Atomic,
        InstTarget::Integer => kind == InstKind::Integer,
        InstTarget::Floating => kind == InstKind::Floating,
        InstTarget::Vector => kind == InstKind::Vector,
        InstTarget::Control => kind == InstKind::Control,
        InstTarget::Call => kind == InstKind::Call,
        InstTarget::Return => kind == InstKind::Return,
        InstTarget::Syscall => kind == InstKind::Syscall,
    }
}

fn reg_class_matches(filter: RegTargetClass, class: RegisterClass) -> bool {
    match filter {
        RegTargetClass::Both => true,
        RegTargetClass::Integer => class == RegisterClass::Integer,
        RegTargetClass::FloatingPoint => class == RegisterClass::FloatingPoint,
    }
}

/// Uniform access to a value under fault injection.
///
/// The engine sees a target only through this capability: raw bytes, an
/// identity for bookkeeping, and the target-specific configuration filters.
/// It holds no other reference into the host model.
pub trait FaultTarget {
    /// Copy the first `buffer.len()` bytes of the value into `buffer`.
    fn read_into(&self, buffer: &mut [u8]);

    /// Write `buffer` back over the same bytes.
    fn write(&mut self, buffer: &[u8]);

    fn identity(&self) -> TargetId;

    /// Target-specific filters. A non-matching access never reaches the
    /// probability draw, so filtered traffic leaves the injector's PRNG
    /// stream untouched.
    fn matches_filters(&self, config: &FaultConfig) -> bool;
}

/// Adapter for one register of the simulated CPU.
pub struct RegisterTarget<'a> {
    value: &'a mut u64,
    class: RegisterClass,
    index: u16,
    pc: u64,
    inst_kind: InstKind,
}

impl<'a> RegisterTarget<'a> {
    pub fn new(value: &'a mut u64, class: RegisterClass, index: u16) -> Self {
        Self {
            value,
            class,
            index,
            pc: 0,
            inst_kind: InstKind::Integer,
        }
    }

    /// Attach the execution context of this access (current PC and the kind
    /// of instruction touching the register) for filter evaluation.
    pub fn with_context(mut self, pc: u64, inst_kind: InstKind) -> Self {
        self.pc = pc;
        self.inst_kind = inst_kind;
        self
    }
}

impl FaultTarget for RegisterTarget<'_> {
    fn read_into(&self, buffer: &mut [u8]) {
        let bytes = self.value.to_le_bytes();
        let len = buffer.len().min(8);
        buffer[..len].copy_from_slice(&bytes[..len]);
        for byte in &mut buffer[len..] {
            *byte = 0;
        }
    }

    fn write(&mut self, buffer: &[u8]) {
        let mut bytes = self.value.to_le_bytes();
        let len = buffer.len().min(8);
        bytes[..len].copy_from_slice(&buffer[..len]);
        *self.value = u64::from_le_bytes(bytes);
    }

    fn identity(&self) -> TargetId {
        TargetId::Register {
            class: self.class,
            index: self.index,
        }
    }

    fn matches_filters(&self, config: &FaultConfig) -> bool {
        if !reg_class_matches(config.reg_target_class, self.class) {
            return false;
        }
        // A configured PC target is an alternative trigger, checked first
        if config.pc_target != 0 && config.pc_target == self.pc {
            return true;
        }
        inst_target_matches(config.inst_target, self.inst_kind)
    }
}

/// Adapter for a byte window inside a cache block.
pub struct CacheLineTarget<'a> {
    address: u64,
    offset: usize,
    data: &'a mut [u8],
}

impl<'a> CacheLineTarget<'a> {
    /// `address` is the block address, `offset` the byte offset of the
    /// corruption window within the block data.
    pub fn new(address: u64, offset: usize, data: &'a mut [u8]) -> Self {
        Self {
            address,
            offset,
            data,
        }
    }
}

impl FaultTarget for CacheLineTarget<'_> {
    fn read_into(&self, buffer: &mut [u8]) {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.data.get(self.offset + i).copied().unwrap_or(0);
        }
    }

    fn write(&mut self, buffer: &[u8]) {
        for (i, byte) in buffer.iter().enumerate() {
            if let Some(slot) = self.data.get_mut(self.offset + i) {
                *slot = *byte;
            }
        }
    }

    fn identity(&self) -> TargetId {
        TargetId::CacheBlock {
            address: self.address,
            offset: self.offset as u32,
        }
    }

    fn matches_filters(&self, config: &FaultConfig) -> bool {
        config.addr_in_range(self.address)
    }
}

/// Adapter for a word of main memory.
pub struct MemoryWordTarget<'a> {
    address: u64,
    data: &'a mut [u8],
}

impl<'a> MemoryWordTarget<'a> {
    pub fn new(address: u64, data: &'a mut [u8]) -> Self {
        Self { address, data }
    }
}

impl FaultTarget for MemoryWordTarget<'_> {
    fn read_into(&self, buffer: &mut [u8]) {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.data.get(i).copied().unwrap_or(0);
        }
    }

    fn write(&mut self, buffer: &[u8]) {
        for (i, byte) in buffer.iter().enumerate() {
            if let Some(slot) = self.data.get_mut(i) {
                *slot = *byte;
            }
        }
    }

    fn identity(&self) -> TargetId {
        TargetId::Memory {
            address: self.address,
        }
    }

    fn matches_filters(&self, config: &FaultConfig) -> bool {
        config.addr_in_range(self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_round_trips_partial_widths() {
        let mut value = 0x1122_3344_5566_7788u64;
        let target = RegisterTarget::new(&mut value, RegisterClass::Integer, 0);

        let mut buffer = [0u8; 2];
        target.read_into(&mut buffer);
        assert_eq!(buffer, [0x88, 0x77]);

        let mut target = RegisterTarget::new(&mut value, RegisterClass::Integer, 0);
        target.write(&[0xAA, 0xBB]);
        assert_eq!(value, 0x1122_3344_5566_BBAA);
    }

    #[test]
    fn register_class_filter() {
        let mut value = 0u64;
        let target = RegisterTarget::new(&mut value, RegisterClass::FloatingPoint, 5);

        let integer_only = FaultConfig {
            reg_target_class: RegTargetClass::Integer,
            ..Default::default()
        };
        assert!(!target.matches_filters(&integer_only));

        let both = FaultConfig::default();
        assert!(target.matches_filters(&both));
    }

    #[test]
    fn pc_target_overrides_instruction_filter() {
        let mut value = 0u64;
        let config = FaultConfig {
            inst_target: InstTarget::Load,
            pc_target: 0x8000,
            ..Default::default()
        };

        // Wrong instruction kind, matching PC: passes
        let target = RegisterTarget::new(&mut value, RegisterClass::Integer, 0)
            .with_context(0x8000, InstKind::Store);
        assert!(target.matches_filters(&config));

        // Wrong instruction kind, wrong PC: filtered
        let target = RegisterTarget::new(&mut value, RegisterClass::Integer, 0)
            .with_context(0x9000, InstKind::Store);
        assert!(!target.matches_filters(&config));

        // Matching instruction kind alone is enough
        let target = RegisterTarget::new(&mut value, RegisterClass::Integer, 0)
            .with_context(0x9000, InstKind::Load);
        assert!(target.matches_filters(&config));
    }

    #[test]
    fn cache_window_reads_and_writes_at_offset() {
        let mut data = [0u8; 8];
        data[5] = 0xEE;
        let mut target = CacheLineTarget::new(0x4000, 5, &mut data);

        let mut buffer = [0u8; 2];
        target.read_into(&mut buffer);
        assert_eq!(buffer, [0xEE, 0x00]);

        target.write(&[0x11, 0x22]);
        assert_eq!(data[5], 0x11);
        assert_eq!(data[6], 0x22);
    }

    #[test]
    fn out_of_bounds_windows_degrade_to_noops() {
        let mut data = [0xFFu8; 4];
        let mut target = CacheLineTarget::new(0, 3, &mut data);

        let mut buffer = [0u8; 2];
        target.read_into(&mut buffer);
        assert_eq!(buffer, [0xFF, 0x00]);

        target.write(&[0x00, 0x77]);
        assert_eq!(data, [0xFF, 0xFF, 0xFF, 0x00]);
    }

    #[test]
    fn address_range_filter_is_half_open() {
        let config = FaultConfig {
            addr_start: 0x1000,
            addr_end: 0x2000,
            ..Default::default()
        };
        let mut word = [0u8; 4];

        assert!(!MemoryWordTarget::new(0x0FFF, &mut word).matches_filters(&config));
        assert!(MemoryWordTarget::new(0x1000, &mut word).matches_filters(&config));
        assert!(MemoryWordTarget::new(0x1FFF, &mut word).matches_filters(&config));
        assert!(!MemoryWordTarget::new(0x2000, &mut word).matches_filters(&config));
        assert!(!MemoryWordTarget::new(0x3000, &mut word).matches_filters(&config));
    }

    #[test]
    fn zero_addr_end_leaves_the_range_open() {
        let config = FaultConfig {
            addr_start: 0x1000,
            ..Default::default()
        };
        let mut word = [0u8; 4];
        assert!(MemoryWordTarget::new(u64::MAX, &mut word).matches_filters(&config));
        assert!(!MemoryWordTarget::new(0x0, &mut word).matches_filters(&config));
    }
}
