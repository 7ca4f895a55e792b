use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::train::Regressor;
use crate::tree::{RegressionTree, TreeParams};

/// Bagged regression trees, averaged at predict time. Each tree sees a
/// seeded bootstrap sample of the training rows.
pub struct RandomForest {
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(seed: u64) -> Self {
        Self {
            n_trees: 100,
            max_depth: 16,
            seed,
            trees: Vec::new(),
        }
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]) {
        let n = x.nrows();
        let params = TreeParams {
            max_depth: self.max_depth,
            ..TreeParams::default()
        };
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.trees = (0..self.n_trees)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit_on(x, y, bootstrap, &params, &mut rng)
            })
            .collect();
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        let mut out = vec![0.0; x.nrows()];
        for tree in &self.trees {
            for (acc, pred) in out.iter_mut().zip(tree.predict(x)) {
                *acc += pred;
            }
        }
        let scale = 1.0 / self.trees.len().max(1) as f64;
        out.iter_mut().for_each(|v| *v *= scale);
        out
    }
}

/// Stage-wise boosting of shallow trees on the running residual.
pub struct GradientBoosting {
    pub n_stages: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub seed: u64,
    init: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn new(seed: u64) -> Self {
        Self {
            n_stages: 100,
            learning_rate: 0.1,
            max_depth: 3,
            seed,
            init: 0.0,
            trees: Vec::new(),
        }
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]) {
        let params = TreeParams {
            max_depth: self.max_depth,
            ..TreeParams::default()
        };
        let fit = boost(self.n_stages, self.learning_rate, &params, self.seed, x, y);
        self.init = fit.init;
        self.trees = fit.trees;
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        boosted_predict(self.init, self.learning_rate, &self.trees, x)
    }
}

/// Boosting with the regularization tricks of the extreme-gradient family:
/// L2-shrunk leaf weights and a feature subsample per split.
pub struct RegularizedBoosting {
    pub n_stages: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub lambda: f64,
    pub colsample: f64,
    pub seed: u64,
    init: f64,
    trees: Vec<RegressionTree>,
}

impl RegularizedBoosting {
    pub fn new(seed: u64) -> Self {
        Self {
            n_stages: 100,
            learning_rate: 0.3,
            max_depth: 6,
            lambda: 1.0,
            colsample: 0.8,
            seed,
            init: 0.0,
            trees: Vec::new(),
        }
    }
}

impl Regressor for RegularizedBoosting {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]) {
        let sampled = ((x.ncols() as f64 * self.colsample).round() as usize).max(1);
        let params = TreeParams {
            max_depth: self.max_depth,
            max_features: Some(sampled.min(x.ncols())),
            leaf_l2: self.lambda,
            ..TreeParams::default()
        };
        let fit = boost(self.n_stages, self.learning_rate, &params, self.seed, x, y);
        self.init = fit.init;
        self.trees = fit.trees;
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        boosted_predict(self.init, self.learning_rate, &self.trees, x)
    }
}

struct BoostFit {
    init: f64,
    trees: Vec<RegressionTree>,
}

fn boost(
    n_stages: usize,
    learning_rate: f64,
    params: &TreeParams,
    seed: u64,
    x: ArrayView2<'_, f64>,
    y: &[f64],
) -> BoostFit {
    let init = if y.is_empty() {
        0.0
    } else {
        y.iter().sum::<f64>() / y.len() as f64
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let mut residual: Vec<f64> = y.iter().map(|v| v - init).collect();
    let mut trees = Vec::with_capacity(n_stages);
    for _ in 0..n_stages {
        let tree = RegressionTree::fit(x, &residual, params, &mut rng);
        for (r, step) in residual.iter_mut().zip(tree.predict(x)) {
            *r -= learning_rate * step;
        }
        trees.push(tree);
    }
    BoostFit { init, trees }
}

fn boosted_predict(
    init: f64,
    learning_rate: f64,
    trees: &[RegressionTree],
    x: ArrayView2<'_, f64>,
) -> Vec<f64> {
    let mut out = vec![init; x.nrows()];
    for tree in trees {
        for (acc, step) in out.iter_mut().zip(tree.predict(x)) {
            *acc += learning_rate * step;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn linear_data(n: usize) -> (Array2<f64>, Vec<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i as f64) + (j as f64) * 0.5);
        let y = (0..n).map(|i| 3.0 * i as f64 + 1.0).collect();
        (x, y)
    }

    fn mse(pred: &[f64], actual: &[f64]) -> f64 {
        pred.iter()
            .zip(actual)
            .map(|(p, a)| (p - a) * (p - a))
            .sum::<f64>()
            / actual.len() as f64
    }

    #[test]
    fn forest_beats_the_mean_predictor() {
        let (x, y) = linear_data(40);
        let mut model = RandomForest::new(42);
        model.fit(x.view(), &y);
        let preds = model.predict(x.view());
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let mean_preds = vec![mean; y.len()];
        assert!(mse(&preds, &y) < mse(&mean_preds, &y) / 4.0);
    }

    #[test]
    fn forest_is_reproducible_for_a_seed() {
        let (x, y) = linear_data(30);
        let mut a = RandomForest::new(7);
        let mut b = RandomForest::new(7);
        a.fit(x.view(), &y);
        b.fit(x.view(), &y);
        assert_eq!(a.predict(x.view()), b.predict(x.view()));
    }

    #[test]
    fn boosting_drives_training_error_down() {
        let (x, y) = linear_data(40);
        let mut model = GradientBoosting::new(42);
        model.fit(x.view(), &y);
        let preds = model.predict(x.view());
        assert!(mse(&preds, &y) < 1.0);
    }

    #[test]
    fn regularized_variant_also_fits() {
        let (x, y) = linear_data(40);
        let mut model = RegularizedBoosting::new(42);
        model.fit(x.view(), &y);
        let preds = model.predict(x.view());
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let mean_preds = vec![mean; y.len()];
        assert!(mse(&preds, &y) < mse(&mean_preds, &y));
    }
}
