//! CART regression tree with the squared-error criterion.

use ndarray::{ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

pub(crate) struct TreeSettings {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn (without replacement) at each split.
    pub max_features: usize,
}

/// Nodes are stored flat; index 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree on the rows listed in `samples` (duplicates allowed for
    /// bootstrap draws).
    pub(crate) fn grow<R: Rng>(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        samples: Vec<usize>,
        settings: &TreeSettings,
        rng: &mut R,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(x, y, samples, 0, settings, rng);
        tree
    }

    fn build<R: Rng>(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        samples: Vec<usize>,
        depth: usize,
        settings: &TreeSettings,
        rng: &mut R,
    ) -> usize {
        let idx = self.nodes.len();
        let value = mean_of(y, &samples);
        self.nodes.push(Node::Leaf { value });

        let depth_left = settings.max_depth.map_or(true, |d| depth < d);
        if !depth_left || samples.len() < settings.min_samples_split || is_pure(y, &samples) {
            return idx;
        }
        let Some((feature, threshold)) = best_split(x, y, &samples, settings, rng) else {
            return idx;
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            samples.into_iter().partition(|&s| x[[s, feature]] <= threshold);
        let left = self.build(x, y, left_rows, depth + 1, settings, rng);
        let right = self.build(x, y, right_rows, depth + 1, settings, rng);
        self.nodes[idx] = Node::Split { feature, threshold, left, right };
        idx
    }

    pub(crate) fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                Node::Leaf { value } => return value,
                Node::Split { feature, threshold, left, right } => {
                    i = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize { self.nodes.len() }
}

/// Running mean; stays finite for any finite inputs, unlike sum / n.
fn mean_of(y: ArrayView1<f64>, samples: &[usize]) -> f64 {
    samples.iter().enumerate().fold(0.0, |mean, (k, &s)| {
        let n = (k + 1) as f64;
        mean - mean / n + y[s] / n
    })
}

fn is_pure(y: ArrayView1<f64>, samples: &[usize]) -> bool {
    let first = match samples.first() {
        Some(&s) => y[s],
        None => return true,
    };
    samples.iter().all(|&s| y[s] == first)
}

/// Best (feature, threshold) by variance reduction, or `None` when no split
/// honours `min_samples_leaf` and improves on the parent.
fn best_split<R: Rng>(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    samples: &[usize],
    settings: &TreeSettings,
    rng: &mut R,
) -> Option<(usize, f64)> {
    let n = samples.len();
    let n_features = x.ncols();
    let candidates = rand::seq::index::sample(rng, n_features, settings.max_features.clamp(1, n_features));
    let total: f64 = samples.iter().map(|&s| y[s]).sum();
    // Maximizing sum_l^2/n_l + sum_r^2/n_r is equivalent to minimizing child SSE.
    let parent_score = total * total / n as f64;
    let min_leaf = settings.min_samples_leaf.max(1);

    let mut best: Option<(usize, f64, f64)> = None;
    let mut order = samples.to_vec();
    for feature in candidates.iter() {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
        let mut left_sum = 0.0;
        for i in 1..n {
            left_sum += y[order[i - 1]];
            if i < min_leaf || n - i < min_leaf {
                continue;
            }
            let (lo, hi) = (x[[order[i - 1], feature]], x[[order[i], feature]]);
            if lo >= hi {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / i as f64 + right_sum * right_sum / (n - i) as f64;
            if score > parent_score + 1e-12 && best.map_or(true, |(_, _, s)| score > s) {
                let mid = lo + (hi - lo) / 2.0;
                let threshold = if mid < hi { mid } else { lo };
                best = Some((feature, threshold, score));
            }
        }
    }
    best.map(|(feature, threshold, _)| (feature, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn settings(max_depth: Option<usize>) -> TreeSettings {
        TreeSettings { max_depth, min_samples_split: 2, min_samples_leaf: 1, max_features: 1 }
    }

    #[test]
    fn fully_grown_tree_memorizes_distinct_rows() {
        let x = array![[1.0], [2.0], [5.0], [7.0]];
        let y = array![1.0, 3.0, 8.0, -2.0];
        let mut rng = StdRng::seed_from_u64(7);
        let tree = RegressionTree::grow(x.view(), y.view(), (0..4).collect(), &settings(None), &mut rng);
        for (row, want) in x.rows().into_iter().zip(y.iter()) {
            assert_eq!(tree.predict_row(row), *want);
        }
    }

    #[test]
    fn depth_zero_is_a_single_mean_leaf() {
        let x = array![[1.0], [2.0]];
        let y = array![2.0, 4.0];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = RegressionTree::grow(x.view(), y.view(), vec![0, 1], &settings(Some(0)), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(array![10.0].view()), 3.0);
    }

    #[test]
    fn leaf_mean_of_huge_targets_is_finite() {
        let y = array![1.7e308, 1.7e308, 1.5e308];
        let mean = mean_of(y.view(), &[0, 1, 2]);
        assert!(mean.is_finite());
        assert!((mean - 1.6333333333333333e308).abs() < 1e295);
        assert_eq!(mean_of(y.view(), &[]), 0.0);
    }

    #[test]
    fn constant_feature_cannot_split() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 2.0];
        let mut rng = StdRng::seed_from_u64(3);
        let tree = RegressionTree::grow(x.view(), y.view(), vec![0, 1, 2], &settings(None), &mut rng);
        assert_eq!(tree.node_count(), 1);
    }
}
