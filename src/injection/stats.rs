use super::faults::FaultModel;

/// Per-injector counters, the numbers a simulation's statistics dump wants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InjectionStats {
    /// Total injection events.
    pub faults_injected: u64,
    pub bit_flips: u64,
    pub stuck_at_zero: u64,
    pub stuck_at_one: u64,
    /// Events that installed a permanent fault record.
    pub permanent_faults: u64,
    /// Draws taken from the injector's PRNG stream. Useful to verify that
    /// filtered-out traffic leaves the stream untouched.
    pub rng_draws: u64,
}

impl InjectionStats {
    pub(crate) fn record(&mut self, model: FaultModel, permanent: bool) {
        self.faults_injected += 1;
        match model {
            FaultModel::BitFlip => self.bit_flips += 1,
            FaultModel::StuckAtZero => self.stuck_at_zero += 1,
            FaultModel::StuckAtOne => self.stuck_at_one += 1,
        }
        if permanent {
            self.permanent_faults += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_models_and_permanence() {
        let mut stats = InjectionStats::default();
        stats.record(FaultModel::BitFlip, false);
        stats.record(FaultModel::StuckAtOne, true);
        stats.record(FaultModel::StuckAtOne, true);
        stats.record(FaultModel::StuckAtZero, true);

        assert_eq!(stats.faults_injected, 4);
        assert_eq!(stats.bit_flips, 1);
        assert_eq!(stats.stuck_at_one, 2);
        assert_eq!(stats.stuck_at_zero, 1);
        assert_eq!(stats.permanent_faults, 3);
    }
}
