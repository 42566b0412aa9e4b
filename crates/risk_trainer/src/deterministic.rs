//! Deterministic utilities for reproducible training
//!
//! Row ordering for the train/held-out split comes from a seeded integer
//! hash rather than an RNG stream, so the split depends only on
//! `(labels, seed)` and is identical across platforms and runs.

use tracing::debug;

use crate::errors::{Result, TrainerError};

/// Deterministic xxhash64-style mix of `data` under `seed`
pub fn xxhash64(data: &[u64], seed: u64) -> u64 {
    const PRIME1: u64 = 0x9E3779B185EBCA87;
    const PRIME2: u64 = 0xC2B2AE3D27D4EB4F;
    const PRIME3: u64 = 0x165667B19E3779F9;
    const PRIME5: u64 = 0x85EBCA77C2B2AE63;

    let mut h = seed.wrapping_add(PRIME5);

    for &val in data {
        h = h.wrapping_add(val.wrapping_mul(PRIME3));
        h = h.rotate_left(17).wrapping_mul(PRIME2);
    }

    h ^= h >> 33;
    h = h.wrapping_mul(PRIME1);
    h ^= h >> 29;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 32;

    h
}

/// Row indices of a train/held-out partition, each ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified split on binary `labels`.
///
/// Each class contributes `round(n_class * test_fraction)` rows to the
/// held-out side, clamped so both sides keep at least one row of every class.
/// Within a class, rows are ordered by `xxhash64([index], seed)` with the
/// index breaking ties.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Result<Split> {
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<(u64, usize)> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &y)| y == class)
            .map(|(i, _)| (xxhash64(&[i as u64], seed), i))
            .collect();
        let count = members.len();
        if count < 2 {
            return Err(TrainerError::InsufficientClassMembers {
                label: class,
                count,
            });
        }

        members.sort_unstable();
        let n_test = ((count as f64 * test_fraction).round() as usize).clamp(1, count - 1);
        debug!(class, count, n_test, "stratum");

        test.extend(members[..n_test].iter().map(|&(_, i)| i));
        train.extend(members[n_test..].iter().map(|&(_, i)| i));
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xxhash64_determinism() {
        let data = vec![1, 2, 3, 4, 5];
        assert_eq!(xxhash64(&data, 42), xxhash64(&data, 42));
        assert_ne!(xxhash64(&data, 42), xxhash64(&data, 43));
        assert_ne!(xxhash64(&[1], 42), xxhash64(&[2], 42));
    }

    #[test]
    fn test_split_is_stratified() -> anyhow::Result<()> {
        let labels: Vec<u8> = (0..100).map(|i| u8::from(i % 5 == 0)).collect();
        let split = stratified_split(&labels, 0.25, 7)?;

        assert_eq!(split.train.len() + split.test.len(), 100);
        let test_pos = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 5);
        assert_eq!(split.test.len(), 25);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_split_depends_on_seed_only() -> anyhow::Result<()> {
        let labels: Vec<u8> = (0..40).map(|i| u8::from(i % 2 == 0)).collect();
        assert_eq!(
            stratified_split(&labels, 0.25, 3)?,
            stratified_split(&labels, 0.25, 3)?
        );
        assert_ne!(
            stratified_split(&labels, 0.25, 3)?.test,
            stratified_split(&labels, 0.25, 4)?.test
        );
        Ok(())
    }

    #[test]
    fn test_tiny_classes() -> anyhow::Result<()> {
        let split = stratified_split(&[0, 0, 1, 1], 0.25, 1)?;
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 2);

        let err = stratified_split(&[0, 0, 0, 1], 0.25, 1).unwrap_err();
        assert!(matches!(
            err,
            TrainerError::InsufficientClassMembers { label: 1, count: 1 }
        ));
        Ok(())
    }
}
