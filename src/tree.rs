use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Split-search knobs shared by every tree-based candidate.
#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all of them.
    pub max_features: Option<usize>,
    /// L2 term added to the leaf-value denominator, so leaves shrink toward
    /// zero as they get small.
    pub leaf_l2: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 16,
            min_samples_leaf: 1,
            max_features: None,
            leaf_l2: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// CART regression tree: greedy variance-reduction splits, mean-valued
/// leaves.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    root: usize,
}

impl RegressionTree {
    pub fn fit(x: ArrayView2<f64>, y: &[f64], params: &TreeParams, rng: &mut StdRng) -> Self {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        Self::fit_on(x, y, indices, params, rng)
    }

    /// Fit on an explicit row subset, which is how bagging hands each tree
    /// its bootstrap sample.
    pub fn fit_on(
        x: ArrayView2<f64>,
        y: &[f64],
        indices: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = Vec::new();
        let root = build_node(x, y, indices, 0, params, rng, &mut nodes);
        Self { nodes, root }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut at = self.root;
        loop {
            match &self.nodes[at] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Vec<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}

fn build_node(
    x: ArrayView2<f64>,
    y: &[f64],
    indices: Vec<usize>,
    depth: usize,
    params: &TreeParams,
    rng: &mut StdRng,
    nodes: &mut Vec<Node>,
) -> usize {
    let value = leaf_value(y, &indices, params.leaf_l2);
    let pure = indices
        .windows(2)
        .all(|pair| y[pair[0]] == y[pair[1]]);
    let stop = depth >= params.max_depth
        || indices.len() < 2 * params.min_samples_leaf.max(1)
        || indices.len() < 2
        || pure;
    if stop {
        nodes.push(Node::Leaf { value });
        return nodes.len() - 1;
    }

    let Some((feature, threshold)) = best_split(x, y, &indices, params, rng) else {
        nodes.push(Node::Leaf { value });
        return nodes.len() - 1;
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| x[(i, feature)] <= threshold);
    let left = build_node(x, y, left_idx, depth + 1, params, rng, nodes);
    let right = build_node(x, y, right_idx, depth + 1, params, rng, nodes);
    nodes.push(Node::Split {
        feature,
        threshold,
        left,
        right,
    });
    nodes.len() - 1
}

fn leaf_value(y: &[f64], indices: &[usize], leaf_l2: f64) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let sum: f64 = indices.iter().map(|&i| y[i]).sum();
    sum / (indices.len() as f64 + leaf_l2)
}

/// Exhaustive scan over candidate features: sort rows by value, sweep the
/// boundary, keep the split maximizing the reduction in sum of squared
/// errors. Returns `None` when nothing separates the rows.
fn best_split(
    x: ArrayView2<f64>,
    y: &[f64],
    indices: &[usize],
    params: &TreeParams,
    rng: &mut StdRng,
) -> Option<(usize, f64)> {
    let n_features = x.ncols();
    let mut features: Vec<usize> = (0..n_features).collect();
    if let Some(m) = params.max_features
        && m < n_features
    {
        features.shuffle(rng);
        features.truncate(m.max(1));
    }

    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let n = indices.len() as f64;
    let min_leaf = params.min_samples_leaf.max(1);

    let mut best: Option<(usize, f64, f64)> = None;
    let mut sorted = indices.to_vec();
    for &feature in &features {
        sorted.sort_by(|&a, &b| {
            x[(a, feature)]
                .partial_cmp(&x[(b, feature)])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_sum = 0.0;
        for (pos, &i) in sorted.iter().enumerate().take(sorted.len() - 1) {
            left_sum += y[i];
            let left_n = (pos + 1) as f64;
            let right_n = n - left_n;
            if pos + 1 < min_leaf || sorted.len() - pos - 1 < min_leaf {
                continue;
            }
            let here = x[(i, feature)];
            let next = x[(sorted[pos + 1], feature)];
            if here == next {
                continue;
            }
            // Maximizing left_sum^2/left_n + right_sum^2/right_n is the same
            // as minimizing the post-split SSE.
            let right_sum = total_sum - left_sum;
            let gain = left_sum * left_sum / left_n + right_sum * right_sum / right_n;
            if best.map(|(_, _, g)| gain > g).unwrap_or(true) {
                best = Some((feature, (here + next) / 2.0, gain));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}
