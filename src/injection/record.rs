use super::faults::FaultModel;
use super::target::RegisterClass;
use itertools::Itertools;
use std::fmt;

/// Identity of the value a fault was injected into.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetId {
    Register { class: RegisterClass, index: u16 },
    /// A byte window inside a cache block, addressed by block address plus
    /// byte offset so permanent faults reapply to the same bits.
    CacheBlock { address: u64, offset: u32 },
    Memory { address: u64 },
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetId::Register { class, index } => write!(f, "reg:{}:{}", class, index),
            TargetId::CacheBlock { address, offset } => {
                write!(f, "cache:0x{:x}+{}", address, offset)
            }
            TargetId::Memory { address } => write!(f, "mem:0x{:x}", address),
        }
    }
}

/// One fault that fired. Immutable once recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct InjectionEvent {
    pub cycle: u64,
    pub target: TargetId,
    pub model: FaultModel,
    /// Value of the corruption unit before injection.
    pub original: Vec<u8>,
    /// Value written back through the adapter.
    pub corrupted: Vec<u8>,
    /// Bit positions picked for corruption, lowest first.
    pub selected_bits: Vec<u32>,
    /// Bit positions that actually changed value.
    pub changed_bits: Vec<u32>,
    pub permanent: bool,
}

impl InjectionEvent {
    /// Render the event as one parseable log line.
    pub fn log_line(&self) -> String {
        format!(
            "cycle={} target={} model={} selected={} changed={} before=0x{} after=0x{} permanent={}",
            self.cycle,
            self.target,
            self.model,
            format_bits(&self.selected_bits),
            format_bits(&self.changed_bits),
            format_bytes(&self.original),
            format_bytes(&self.corrupted),
            self.permanent,
        )
    }
}

fn format_bits(bits: &[u32]) -> String {
    if bits.is_empty() {
        "-".to_string()
    } else {
        bits.iter().join("|")
    }
}

/// Bytes rendered most significant first (the buffer is little-endian).
fn format_bytes(bytes: &[u8]) -> String {
    bytes.iter().rev().map(|byte| format!("{:02x}", byte)).collect()
}

/// A standing fault tracked for periodic reapplication.
#[derive(Clone, Debug, PartialEq)]
pub struct PermanentFaultRecord {
    pub target: TargetId,
    /// Bit mask fixed at install time; reapplication never redraws it.
    pub mask: u64,
    pub model: FaultModel,
    pub installed_cycle: u64,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_render_compactly() {
        let register = TargetId::Register {
            class: RegisterClass::Integer,
            index: 3,
        };
        assert_eq!(register.to_string(), "reg:int:3");

        let block = TargetId::CacheBlock {
            address: 0x4000,
            offset: 17,
        };
        assert_eq!(block.to_string(), "cache:0x4000+17");

        let word = TargetId::Memory { address: 0x1F00 };
        assert_eq!(word.to_string(), "mem:0x1f00");
    }

    #[test]
    fn log_line_carries_every_required_field() {
        let event = InjectionEvent {
            cycle: 42,
            target: TargetId::Memory { address: 0x1000 },
            model: FaultModel::StuckAtOne,
            original: vec![0x00],
            corrupted: vec![0x01],
            selected_bits: vec![0],
            changed_bits: vec![0],
            permanent: true,
        };
        assert_eq!(
            event.log_line(),
            "cycle=42 target=mem:0x1000 model=stuck_at_one selected=0 changed=0 \
             before=0x00 after=0x01 permanent=true"
        );
    }

    #[test]
    fn empty_bit_sets_render_as_dash() {
        let event = InjectionEvent {
            cycle: 7,
            target: TargetId::Memory { address: 0 },
            model: FaultModel::StuckAtZero,
            original: vec![0x00, 0x80],
            corrupted: vec![0x00, 0x80],
            selected_bits: vec![1, 2],
            changed_bits: vec![],
            permanent: true,
        };
        let line = event.log_line();
        assert!(line.contains("selected=1|2"));
        assert!(line.contains("changed=-"));
        assert!(line.contains("before=0x8000"));
    }
}
