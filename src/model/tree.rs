//! CART decision tree over a fused feature matrix

use super::criterion::Criterion;
use crate::features::FeatureMatrix;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Minimum impurity decrease, relative to the parent, for a split to count
const MIN_RELATIVE_DECREASE: f64 = 1e-12;

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// Feature dimensions drawn per node
    pub max_features: usize,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node<L> {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: L,
        samples: usize,
    },
}

/// Nodes stored in an arena, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree<L> {
    nodes: Vec<Node<L>>,
}

struct Pending<S> {
    slot: usize,
    samples: Vec<usize>,
    stats: S,
    depth: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    cost: f64,
}

impl<L: Clone> DecisionTree<L> {
    /// Grow a tree on `samples` (row indices, duplicates allowed)
    pub fn grow<C>(
        features: &FeatureMatrix,
        criterion: &C,
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self
    where
        C: Criterion<Leaf = L>,
    {
        let root_stats = criterion.stats(&samples);
        let mut nodes = vec![Node::Leaf {
            value: criterion.leaf(&root_stats),
            samples: samples.len(),
        }];
        let mut stack = vec![Pending {
            slot: 0,
            samples,
            stats: root_stats,
            depth: 0,
        }];

        while let Some(node) = stack.pop() {
            let Some(split) = best_split(features, criterion, &node, params, rng) else {
                continue;
            };

            let (left, right): (Vec<usize>, Vec<usize>) = node
                .samples
                .iter()
                .copied()
                .partition(|&s| features.value(s, split.feature) <= split.threshold);
            let left_stats = criterion.stats(&left);
            let right_stats = criterion.stats(&right);

            let left_slot = nodes.len();
            nodes.push(Node::Leaf {
                value: criterion.leaf(&left_stats),
                samples: left.len(),
            });
            let right_slot = nodes.len();
            nodes.push(Node::Leaf {
                value: criterion.leaf(&right_stats),
                samples: right.len(),
            });
            nodes[node.slot] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: left_slot,
                right: right_slot,
            };

            stack.push(Pending {
                slot: right_slot,
                samples: right,
                stats: right_stats,
                depth: node.depth + 1,
            });
            stack.push(Pending {
                slot: left_slot,
                samples: left,
                stats: left_stats,
                depth: node.depth + 1,
            });
        }

        DecisionTree { nodes }
    }

    /// Leaf value reached by `row` of `features`
    pub fn predict(&self, features: &FeatureMatrix, row: usize) -> &L {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value, .. } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features.value(row, *feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// True when the root never split
    pub fn is_stump(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Node::Split { left, right, .. } = &self.nodes[index] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        deepest
    }

    /// Largest feature index referenced by a split
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

fn best_split<C: Criterion>(
    features: &FeatureMatrix,
    criterion: &C,
    node: &Pending<C::Stats>,
    params: &TreeParams,
    rng: &mut StdRng,
) -> Option<BestSplit> {
    let n = node.samples.len();
    let min_leaf = params.min_samples_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }
    if params.max_depth.is_some_and(|max| node.depth >= max) {
        return None;
    }
    let parent_cost = criterion.cost(&node.stats);
    if parent_cost <= 0.0 {
        return None;
    }

    let n_features = features.n_cols();
    let draw = params.max_features.min(n_features);
    if draw == 0 {
        return None;
    }

    let mut best: Option<BestSplit> = None;
    let mut column: Vec<(f64, usize)> = Vec::with_capacity(n);

    for feature in rand::seq::index::sample(rng, n_features, draw).iter() {
        column.clear();
        column.extend(node.samples.iter().map(|&s| (features.value(s, feature), s)));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));
        if column[0].0 == column[n - 1].0 {
            continue;
        }

        let mut left = criterion.empty();
        let mut right = node.stats.clone();
        for i in 0..n - 1 {
            let (value, sample) = column[i];
            criterion.add(&mut left, sample);
            criterion.remove(&mut right, sample);

            let next = column[i + 1].0;
            let n_left = i + 1;
            if value == next || n_left < min_leaf || n - n_left < min_leaf {
                continue;
            }

            let cost = criterion.cost(&left) + criterion.cost(&right);
            if best.as_ref().map_or(true, |b| cost < b.cost) {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    cost,
                });
            }
        }
    }

    best.filter(|b| b.cost < parent_cost - MIN_RELATIVE_DECREASE * parent_cost)
}
