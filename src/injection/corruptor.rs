use super::faults::FaultModel;
use rand::Rng;

/// Which bits an injection touched: the positions picked for corruption and
/// the positions whose value actually changed. For stuck faults the second
/// set can be smaller, since a bit already at the stuck value stays as is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorruptionOutcome {
    pub selected: Vec<u32>,
    pub changed: Vec<u32>,
}

/// Bit positions of all set bits in `mask`, lowest first.
pub fn mask_positions(mask: u64, width_bits: u32) -> Vec<u32> {
    (0..width_bits.min(64))
        .filter(|bit| mask >> bit & 1 == 1)
        .collect()
}

/// Generate a mask of `num_bits` distinct positions inside `width_bits`.
/// A negative count, or one at least as large as the width, targets every bit.
pub fn random_mask(rng: &mut impl Rng, width_bits: u32, num_bits: i32) -> u64 {
    let width = width_bits.min(64);
    if width == 0 {
        return 0;
    }
    let all = if width == 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    if num_bits < 0 || num_bits as u32 >= width {
        return all;
    }
    rand::seq::index::sample(rng, width as usize, num_bits as usize)
        .into_iter()
        .fold(0u64, |mask, bit| mask | 1u64 << bit)
}

/// Apply `model` to the buffer bits selected by `mask`. Bit `i` of the mask
/// addresses bit `i % 8` of buffer byte `i / 8`; mask bits beyond the buffer
/// are ignored.
pub fn apply_mask(buffer: &mut [u8], mask: u64, model: FaultModel) -> CorruptionOutcome {
    let width_bits = (buffer.len().min(8) * 8) as u32;
    let selected = mask_positions(mask, width_bits);
    let mut changed = Vec::new();

    for (index, byte) in buffer.iter_mut().take(8).enumerate() {
        let byte_mask = (mask >> (index * 8)) as u8;
        if byte_mask == 0 {
            continue;
        }
        let old = *byte;
        *byte = match model {
            FaultModel::BitFlip => old ^ byte_mask,
            FaultModel::StuckAtZero => old & !byte_mask,
            FaultModel::StuckAtOne => old | byte_mask,
        };

        let mut diff = old ^ *byte;
        while diff != 0 {
            changed.push(index as u32 * 8 + diff.trailing_zeros());
            diff &= diff - 1;
        }
    }

    CorruptionOutcome { selected, changed }
}
