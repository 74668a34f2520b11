//! Z-score standardization of handcrafted features

use crate::{JudgeError, Result};
use serde::{Deserialize, Serialize};

/// Relative spread under which a dimension counts as constant
const CONSTANT_TOLERANCE: f64 = 1e-12;

/// Per-dimension mean and population standard deviation, fit on training rows
///
/// A dimension that is constant in the fit data stores a standard deviation
/// of exactly zero and is transformed as `x - mean` (centered, not scaled),
/// so constant training columns map to 0.0 instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardization {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Standardization {
    /// Fit on `rows`, each of length `dim`
    pub fn fit(rows: &[Vec<f64>], dim: usize) -> Result<Self> {
        check_widths(rows, dim, "standardization fit")?;

        if rows.is_empty() {
            log::warn!("Standardization fit on zero rows; using identity parameters");
            return Ok(Standardization {
                mean: vec![0.0; dim],
                std: vec![0.0; dim],
            });
        }

        let n = rows.len() as f64;
        // Running mean stays within the range of the inputs
        let mut mean = vec![0.0; dim];
        for (k, row) in rows.iter().enumerate() {
            let count = (k + 1) as f64;
            for (m, x) in mean.iter_mut().zip(row) {
                let step = (x - *m) / count;
                if step.is_finite() {
                    *m += step;
                } else {
                    *m += x / count - *m / count;
                }
            }
        }

        // Deviations are scaled by the largest one before squaring
        let mut largest = vec![0.0f64; dim];
        for row in rows {
            for ((a, x), m) in largest.iter_mut().zip(row).zip(&mean) {
                *a = a.max((x - m).abs().min(f64::MAX));
            }
        }
        let mut scaled = vec![0.0; dim];
        for row in rows {
            for (((v, x), m), a) in scaled.iter_mut().zip(row).zip(&mean).zip(&largest) {
                if *a > 0.0 {
                    let d = ((x - m) / a).clamp(-1.0, 1.0);
                    *v += d * d;
                }
            }
        }

        let mut constant = 0;
        let std: Vec<f64> = scaled
            .iter()
            .zip(&largest)
            .zip(&mean)
            .map(|((v, a), m)| {
                let s = a * (v / n).sqrt();
                if s <= CONSTANT_TOLERANCE * m.abs().max(1.0) {
                    constant += 1;
                    0.0
                } else {
                    s
                }
            })
            .collect();

        if constant > 0 {
            log::warn!(
                "{} of {} numeric features are constant in training data; centering without scaling",
                constant,
                dim
            );
        }

        Ok(Standardization { mean, std })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Whether dimension `i` was constant at fit time
    pub fn is_constant(&self, i: usize) -> bool {
        self.std.get(i).is_some_and(|s| *s == 0.0)
    }

    /// Standardize `rows`; values that overflow are replaced with 0
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_widths(rows, self.dim(), "standardization transform")?;
        let mut replaced = 0;
        let out = rows
            .iter()
            .map(|row| {
                let mut z = self.transform_row(row);
                replaced += sanitize(&mut z);
                z
            })
            .collect();
        if replaced > 0 {
            log::warn!("Replaced {} overflowing standardized values with 0", replaced);
        }
        Ok(out)
    }

    fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s })
            .collect()
    }
}

fn check_widths(rows: &[Vec<f64>], dim: usize, context: &str) -> Result<()> {
    match rows.iter().find(|row| row.len() != dim) {
        Some(row) => Err(JudgeError::ShapeMismatch {
            context: context.to_string(),
            expected: dim,
            actual: row.len(),
        }),
        None => Ok(()),
    }
}

/// Replace NaN and infinite values with zero, returning how many were replaced
pub fn sanitize(row: &mut [f64]) -> usize {
    let mut replaced = 0;
    for x in row.iter_mut() {
        if !x.is_finite() {
            *x = 0.0;
            replaced += 1;
        }
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mean_unit_variance() {
        let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        let params = Standardization::fit(&rows, 2).unwrap();
        let scaled = params.transform(&rows).unwrap();

        for col in 0..2 {
            let mean: f64 = scaled.iter().map(|r| r[col]).sum::<f64>() / 3.0;
            let var: f64 = scaled.iter().map(|r| r[col] * r[col]).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_feature_is_centered() {
        let rows = vec![vec![7.0, 1.0], vec![7.0, 2.0], vec![7.0, 3.0]];
        let params = Standardization::fit(&rows, 2).unwrap();
        assert!(params.is_constant(0));
        assert!(!params.is_constant(1));

        let scaled = params.transform(&rows).unwrap();
        assert!(scaled.iter().all(|r| r[0] == 0.0));

        // Held-out values are shifted by the training mean, never divided by zero
        let held_out = params.transform(&[vec![9.5, 2.0]]).unwrap();
        assert_eq!(held_out[0][0], 2.5);
        assert!(held_out[0].iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_parameters_frozen_after_fit() {
        let train = vec![vec![0.0], vec![2.0]];
        let params = Standardization::fit(&train, 1).unwrap();
        let scaled = params.transform(&[vec![100.0]]).unwrap();
        assert_eq!(params.mean, vec![1.0]);
        assert_eq!(scaled[0][0], 99.0);
    }

    #[test]
    fn test_width_mismatch() {
        let params = Standardization::fit(&[vec![1.0, 2.0]], 2).unwrap();
        let err = params.transform(&[vec![1.0]]).unwrap_err();
        assert!(matches!(err, JudgeError::ShapeMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_extreme_values_stay_finite() {
        let rows = vec![vec![f64::MAX], vec![f64::MAX], vec![-f64::MAX]];
        let params = Standardization::fit(&rows, 1).unwrap();
        assert!(params.mean[0].is_finite());
        assert!(params.std[0].is_finite());
        assert!(!params.is_constant(0));

        let scaled = params.transform(&rows).unwrap();
        assert!(scaled.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_sanitize() {
        let mut row = vec![1.0, f64::NAN, f64::INFINITY, -2.0];
        assert_eq!(sanitize(&mut row), 2);
        assert_eq!(row, vec![1.0, 0.0, 0.0, -2.0]);
    }
}
