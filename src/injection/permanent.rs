use super::corruptor;
use super::record::PermanentFaultRecord;
use super::target::FaultTarget;

/// Table of standing faults, reapplied on a periodic cadence until an
/// explicit reset. Records never age out on their own.
#[derive(Debug, Default)]
pub struct PermanentFaultTracker {
    records: Vec<PermanentFaultRecord>,
}

impl PermanentFaultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a standing fault.
    ///
    /// At most one record exists per (target, bit position): bits claimed by
    /// the new record are removed from older records on the same target, and
    /// records whose mask drains to zero drop out. Installing over an
    /// existing fault therefore overwrites instead of stacking.
    pub fn install(&mut self, record: PermanentFaultRecord) {
        for existing in self
            .records
            .iter_mut()
            .filter(|existing| existing.target == record.target)
        {
            existing.mask &= !record.mask;
        }
        self.records.retain(|existing| existing.mask != 0);
        self.records.push(record);
    }

    /// Reapply every active record whose identity matches `target`.
    /// The stored mask is fixed at install time and is never redrawn.
    pub fn reapply_to(&self, target: &mut dyn FaultTarget, corruption_size: usize) {
        let size = corruption_size.clamp(1, 8);
        let identity = target.identity();
        for record in self
            .records
            .iter()
            .filter(|record| record.active && record.target == identity)
        {
            let mut buffer = [0u8; 8];
            let buffer = &mut buffer[..size];
            target.read_into(buffer);
            let outcome = corruptor::apply_mask(buffer, record.mask, record.model);
            if !outcome.changed.is_empty() {
                target.write(buffer);
            }
        }
    }

    pub fn records(&self) -> &[PermanentFaultRecord] {
        &self.records
    }

    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|record| record.active).count()
    }

    /// Explicit reset: drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
