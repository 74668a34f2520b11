//! Split criteria for tree growing
//!
//! A criterion keeps running statistics over a set of samples so the split
//! search can sweep a sorted feature column in one pass.

/// Impurity bookkeeping for one node side
pub trait Criterion: Sync {
    type Stats: Clone;
    type Leaf: Clone + Send;

    fn empty(&self) -> Self::Stats;

    fn add(&self, stats: &mut Self::Stats, sample: usize);

    fn remove(&self, stats: &mut Self::Stats, sample: usize);

    /// Total impurity, i.e. sample count times per-sample impurity
    fn cost(&self, stats: &Self::Stats) -> f64;

    fn leaf(&self, stats: &Self::Stats) -> Self::Leaf;

    fn stats(&self, samples: &[usize]) -> Self::Stats {
        let mut stats = self.empty();
        for &s in samples {
            self.add(&mut stats, s);
        }
        stats
    }
}

/// Gini impurity over class indices
pub struct Gini<'a> {
    labels: &'a [usize],
    n_classes: usize,
}

impl<'a> Gini<'a> {
    pub fn new(labels: &'a [usize], n_classes: usize) -> Self {
        Gini { labels, n_classes }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassCounts {
    pub counts: Vec<usize>,
    pub total: usize,
}

impl ClassCounts {
    /// Most frequent class, lowest index on ties
    pub fn majority(&self) -> usize {
        let mut best = 0;
        for (class, &count) in self.counts.iter().enumerate() {
            if count > self.counts[best] {
                best = class;
            }
        }
        best
    }
}

impl Criterion for Gini<'_> {
    type Stats = ClassCounts;
    type Leaf = usize;

    fn empty(&self) -> ClassCounts {
        ClassCounts {
            counts: vec![0; self.n_classes],
            total: 0,
        }
    }

    fn add(&self, stats: &mut ClassCounts, sample: usize) {
        stats.counts[self.labels[sample]] += 1;
        stats.total += 1;
    }

    fn remove(&self, stats: &mut ClassCounts, sample: usize) {
        stats.counts[self.labels[sample]] -= 1;
        stats.total -= 1;
    }

    fn cost(&self, stats: &ClassCounts) -> f64 {
        if stats.total == 0 {
            return 0.0;
        }
        let sum_sq: f64 = stats.counts.iter().map(|&c| (c * c) as f64).sum();
        stats.total as f64 - sum_sq / stats.total as f64
    }

    fn leaf(&self, stats: &ClassCounts) -> usize {
        stats.majority()
    }
}

/// Relative size of `sum_sq - sum²/n` treated as zero
const CANCELLATION_TOLERANCE: f64 = 1e-10;

/// Sum of squared deviations from the mean
pub struct Variance<'a> {
    targets: &'a [f64],
}

impl<'a> Variance<'a> {
    pub fn new(targets: &'a [f64]) -> Self {
        Variance { targets }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub n: usize,
    pub sum: f64,
    pub sum_sq: f64,
}

impl Criterion for Variance<'_> {
    type Stats = Moments;
    type Leaf = f64;

    fn empty(&self) -> Moments {
        Moments::default()
    }

    fn add(&self, stats: &mut Moments, sample: usize) {
        let y = self.targets[sample];
        stats.n += 1;
        stats.sum += y;
        stats.sum_sq += y * y;
    }

    fn remove(&self, stats: &mut Moments, sample: usize) {
        let y = self.targets[sample];
        stats.n -= 1;
        stats.sum -= y;
        stats.sum_sq -= y * y;
    }

    fn cost(&self, stats: &Moments) -> f64 {
        if stats.n == 0 {
            return 0.0;
        }
        let cost = stats.sum_sq - stats.sum * stats.sum / stats.n as f64;
        // Cancellation leaves rounding noise on nodes with identical targets
        if cost <= CANCELLATION_TOLERANCE * stats.sum_sq.max(1.0) {
            0.0
        } else {
            cost
        }
    }

    fn leaf(&self, stats: &Moments) -> f64 {
        if stats.n == 0 {
            0.0
        } else {
            stats.sum / stats.n as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gini_cost() {
        let labels = [0, 0, 1, 1];
        let gini = Gini::new(&labels, 2);
        let stats = gini.stats(&[0, 1, 2, 3]);
        // 4 * (1 - 0.25 - 0.25)
        assert!((gini.cost(&stats) - 2.0).abs() < 1e-12);

        let pure = gini.stats(&[0, 1]);
        assert_eq!(gini.cost(&pure), 0.0);
    }

    #[test]
    fn test_majority_tie_takes_lowest_class() {
        let labels = [2, 1, 2, 1, 0];
        let gini = Gini::new(&labels, 3);
        assert_eq!(gini.leaf(&gini.stats(&[0, 1, 2, 3])), 1);
        assert_eq!(gini.leaf(&gini.stats(&[0, 2, 4])), 2);
    }

    #[test]
    fn test_variance_add_remove() {
        let targets = [1.0, 2.0, 3.0, 6.0];
        let variance = Variance::new(&targets);
        let mut stats = variance.stats(&[0, 1, 2, 3]);
        assert_eq!(variance.leaf(&stats), 3.0);
        // (4 + 1 + 0 + 9)
        assert!((variance.cost(&stats) - 14.0).abs() < 1e-9);

        variance.remove(&mut stats, 3);
        assert_eq!(variance.leaf(&stats), 2.0);
        assert!((variance.cost(&stats) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_targets_have_zero_cost() {
        for c in [7.7, 0.1, 1.0 / 3.0, 123.456, 1e6 + 0.1] {
            let targets = vec![c; 30];
            let variance = Variance::new(&targets);
            let indices: Vec<usize> = (0..30).collect();
            let mut stats = variance.stats(&indices);
            assert_eq!(variance.cost(&stats), 0.0, "target {}", c);

            for i in 0..17 {
                variance.remove(&mut stats, i);
            }
            assert_eq!(variance.cost(&stats), 0.0, "target {}", c);
        }
    }
}
