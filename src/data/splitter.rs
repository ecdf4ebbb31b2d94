// ============================================================
// Layer 4 - Train/Validation Splitter
// ============================================================
// Shuffles sample indices with a seeded RNG and splits them
// into two sets:
//   - Training set:   used to update model weights
//   - Validation set: used to pick the checkpoint
//
// round(len * test_fraction) samples go to validation, the
// rest to training. Same input order + same fraction + same
// seed ⇒ identical split, run after run.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom over
// a StdRng seeded from the configured seed.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::error::{PipelineError, PipelineResult};

/// Shuffle and split `samples` into (train, validation).
///
/// # Arguments
/// * `samples`       - All available samples (left untouched)
/// * `test_fraction` - Proportion for validation, e.g. 0.2 = 20%
/// * `seed`          - RNG seed for the shuffle
///
/// # Errors
/// `InvalidFraction` when `test_fraction` is not inside (0, 1).
/// The check runs before any sample is read.
pub fn split_train_val<T: Clone>(
    samples:       &[T],
    test_fraction: f64,
    seed:          u64,
) -> PipelineResult<(Vec<T>, Vec<T>)> {
    // NaN fails both comparisons and is rejected too
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidFraction(test_fraction));
    }

    let total = samples.len();
    if total == 0 {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut indices: Vec<usize> = (0..total).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_val = ((total as f64) * test_fraction).round() as usize;
    let n_val = n_val.min(total);

    let (val_idx, train_idx) = indices.split_at(n_val);
    let pick = |idx: &[usize]| idx.iter().map(|&i| samples[i].clone()).collect::<Vec<T>>();

    let train = pick(train_idx);
    let val   = pick(val_idx);

    tracing::debug!(
        "Dataset split: {} training, {} validation (seed {})",
        train.len(),
        val.len(),
        seed,
    );

    Ok((train, val))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(&items, 0.2, 0).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_validation_size_is_rounded() {
        // 7 * 0.25 = 1.75 → 2
        let items: Vec<usize> = (0..7).collect();
        let (train, val)      = split_train_val(&items, 0.25, 0).unwrap();
        assert_eq!(val.len(),   2);
        assert_eq!(train.len(), 5);
    }

    #[test]
    fn test_subsets_are_disjoint_and_complete() {
        let items: Vec<usize> = (0..53).collect();
        let (train, val)      = split_train_val(&items, 0.3, 7).unwrap();
        assert_eq!(train.len() + val.len(), 53);

        let train_set: HashSet<usize> = train.iter().copied().collect();
        let val_set:   HashSet<usize> = val.iter().copied().collect();
        assert!(train_set.is_disjoint(&val_set));
        assert_eq!(train_set.union(&val_set).count(), 53);
    }

    #[test]
    fn test_same_seed_same_split() {
        let items: Vec<usize> = (0..200).collect();
        let first  = split_train_val(&items, 0.2, 42).unwrap();
        let second = split_train_val(&items, 0.2, 42).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_seed_changes_membership() {
        let items: Vec<usize> = (0..200).collect();
        let (_, a) = split_train_val(&items, 0.2, 1).unwrap();
        let (_, b) = split_train_val(&items, 0.2, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(&items, 0.2, 0).unwrap();
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_out_of_range_fraction_is_rejected() {
        let items: Vec<usize> = (0..10).collect();
        for bad in [0.0, 1.0, 1.5, -0.1, f64::NAN] {
            let err = split_train_val(&items, bad, 0).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidFraction(_)));
        }
        // nothing consumed
        assert_eq!(items.len(), 10);
    }
}
