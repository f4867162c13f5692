use crate::config::{FaultConfig, FaultTypeConfig};
use rand::Rng;
use std::fmt;

/// Elementary fault models the corruption engine can apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultModel {
    /// Invert the selected bits (XOR with 1).
    BitFlip,
    /// Force the selected bits to 0.
    StuckAtZero,
    /// Force the selected bits to 1.
    StuckAtOne,
}

impl FaultModel {
    pub fn label(&self) -> &'static str {
        match self {
            FaultModel::BitFlip => "bit_flip",
            FaultModel::StuckAtZero => "stuck_at_zero",
            FaultModel::StuckAtOne => "stuck_at_one",
        }
    }

    /// Stuck-at faults model standing defects and are registered for
    /// periodic reapplication; a bit flip is a one-shot transient.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FaultModel::StuckAtZero | FaultModel::StuckAtOne)
    }
}

impl fmt::Display for FaultModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decides which elementary fault model applies to a single injection event.
///
/// For an explicit `faultType` the decision is fixed and consumes no
/// randomness. For `random` the three configured weights are normalized to
/// sum 1 (all zero falls back to uniform) and one categorical outcome is
/// drawn per event from the injector's stream.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    fixed: Option<FaultModel>,
    weights: [f64; 3],
}

const MODEL_ORDER: [FaultModel; 3] = [
    FaultModel::BitFlip,
    FaultModel::StuckAtZero,
    FaultModel::StuckAtOne,
];

impl ModelSelector {
    pub fn from_config(config: &FaultConfig) -> Self {
        let fixed = match config.fault_type {
            FaultTypeConfig::BitFlip => Some(FaultModel::BitFlip),
            FaultTypeConfig::StuckAtZero => Some(FaultModel::StuckAtZero),
            FaultTypeConfig::StuckAtOne => Some(FaultModel::StuckAtOne),
            FaultTypeConfig::Random => None,
        };

        let mut weights = [
            config.bit_flip_prob,
            config.stuck_at_zero_prob,
            config.stuck_at_one_prob,
        ];
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            weights = [1.0 / 3.0; 3];
        } else {
            for weight in &mut weights {
                *weight /= sum;
            }
        }

        Self { fixed, weights }
    }

    /// True when selection consumes a draw from the injector stream.
    pub fn is_random(&self) -> bool {
        self.fixed.is_none()
    }

    pub fn select(&self, rng: &mut impl Rng) -> FaultModel {
        if let Some(model) = self.fixed {
            return model;
        }
        let u: f64 = rng.gen();
        let mut acc = 0.0;
        for (model, weight) in MODEL_ORDER.iter().zip(self.weights) {
            acc += weight;
            if u < acc {
                return *model;
            }
        }
        // Rounding can leave u marginally above the accumulated sum
        MODEL_ORDER[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn selector_for(fault_type: FaultTypeConfig) -> ModelSelector {
        ModelSelector::from_config(&FaultConfig {
            fault_type,
            ..Default::default()
        })
    }

    #[test]
    fn explicit_fault_type_is_returned_unconditionally() {
        let selector = selector_for(FaultTypeConfig::StuckAtZero);
        assert!(!selector.is_random());

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(selector.select(&mut rng), FaultModel::StuckAtZero);
        }
    }

    #[test]
    fn weights_are_normalized_not_required_to_sum_to_one() {
        // 9 : 0.5 : 0.5 normalizes to 0.9 / 0.05 / 0.05
        let selector = ModelSelector::from_config(&FaultConfig {
            fault_type: FaultTypeConfig::Random,
            bit_flip_prob: 9.0,
            stuck_at_zero_prob: 0.5,
            stuck_at_one_prob: 0.5,
            ..Default::default()
        });
        assert!(selector.is_random());

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut flips = 0usize;
        for _ in 0..10_000 {
            if selector.select(&mut rng) == FaultModel::BitFlip {
                flips += 1;
            }
        }
        let rate = flips as f64 / 10_000.0;
        assert!((rate - 0.9).abs() < 0.03, "bit flip rate {}", rate);
    }

    #[test]
    fn all_zero_weights_fall_back_to_uniform() {
        let selector = ModelSelector::from_config(&FaultConfig {
            fault_type: FaultTypeConfig::Random,
            bit_flip_prob: 0.0,
            stuck_at_zero_prob: 0.0,
            stuck_at_one_prob: 0.0,
            ..Default::default()
        });

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut counts = [0usize; 3];
        for _ in 0..9_000 {
            match selector.select(&mut rng) {
                FaultModel::BitFlip => counts[0] += 1,
                FaultModel::StuckAtZero => counts[1] += 1,
                FaultModel::StuckAtOne => counts[2] += 1,
            }
        }
        for count in counts {
            let rate = count as f64 / 9_000.0;
            assert!((rate - 1.0 / 3.0).abs() < 0.05, "rate {}", rate);
        }
    }

    #[test]
    fn selection_is_deterministic_for_a_fixed_seed() {
        let selector = selector_for(FaultTypeConfig::Random);

        let mut first = ChaCha8Rng::seed_from_u64(99);
        let mut second = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..1000 {
            assert_eq!(selector.select(&mut first), selector.select(&mut second));
        }
    }

    #[test]
    fn permanence_policy_per_model() {
        assert!(!FaultModel::BitFlip.is_permanent());
        assert!(FaultModel::StuckAtZero.is_permanent());
        assert!(FaultModel::StuckAtOne.is_permanent());
    }

    #[test]
    fn labels_match_the_configuration_surface() {
        assert_eq!(FaultModel::BitFlip.label(), "bit_flip");
        assert_eq!(FaultModel::StuckAtZero.label(), "stuck_at_zero");
        assert_eq!(FaultModel::StuckAtOne.label(), "stuck_at_one");
    }
}
