//! Seeded train/test partitioning
//!
//! The partition is a pure function of (record count, holdout fraction,
//! seed), so the classification and regression tasks always hold out the
//! same rows.

use crate::{JudgeError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Absorbs float error in `n * fraction` before rounding up
const FRACTION_SLACK: f64 = 1e-9;

/// Record indices assigned to each side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Held-out indices in ascending order
    pub fn sorted_test(&self) -> Vec<usize> {
        let mut test = self.test.clone();
        test.sort_unstable();
        test
    }
}

/// Shuffle `0..n_records` with `seed`; the first `ceil(n * holdout_fraction)`
/// indices are held out, the rest train
pub fn split(n_records: usize, holdout_fraction: f64, seed: u64) -> Result<Partition> {
    let invalid = || JudgeError::InvalidPartition {
        records: n_records,
        holdout_fraction,
    };

    if !(holdout_fraction > 0.0 && holdout_fraction < 1.0) {
        return Err(invalid());
    }
    let n_test = (n_records as f64 * holdout_fraction - FRACTION_SLACK).ceil() as usize;
    if n_test == 0 || n_test >= n_records {
        return Err(invalid());
    }

    let mut indices: Vec<usize> = (0..n_records).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    let test = indices;

    log::info!(
        "Split {} records: train={}, test={} (seed {})",
        n_records,
        train.len(),
        test.len(),
        seed
    );

    Ok(Partition { train, test })
}
