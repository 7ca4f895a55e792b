use anyhow::{Result, bail};
use ndarray::{ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::ensemble::{GradientBoosting, RandomForest, RegularizedBoosting};
use crate::mlp::MlpRegressor;

/// Uniform capability every candidate model exposes. Selection logic only
/// ever sees this trait, so adding a candidate means touching the list
/// below and nothing else.
pub trait Regressor {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]);
    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
    RegularizedBoosting,
    NeuralNetwork,
}

/// Fixed candidate set, in tie-breaking order.
pub const CANDIDATES: [ModelKind; 4] = [
    ModelKind::RandomForest,
    ModelKind::GradientBoosting,
    ModelKind::RegularizedBoosting,
    ModelKind::NeuralNetwork,
];

impl ModelKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::RegularizedBoosting => "regularized_boosting",
            ModelKind::NeuralNetwork => "neural_network",
        }
    }

    fn build(&self, seed: u64) -> Box<dyn Regressor> {
        match self {
            ModelKind::RandomForest => Box::new(RandomForest::new(seed)),
            ModelKind::GradientBoosting => Box::new(GradientBoosting::new(seed)),
            ModelKind::RegularizedBoosting => Box::new(RegularizedBoosting::new(seed)),
            ModelKind::NeuralNetwork => Box::new(MlpRegressor::new(seed)),
        }
    }
}

/// One candidate's held-out performance.
#[derive(Debug, Clone)]
pub struct ModelResult {
    pub kind: ModelKind,
    pub score: f64,
    pub predictions: Vec<f64>,
    pub actuals: Vec<f64>,
}

/// Every candidate's result in declared order, plus which one won.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub results: Vec<ModelResult>,
    best: usize,
}

impl TrainingOutcome {
    /// Wrap scored results, selecting the winner.
    pub fn from_results(results: Vec<ModelResult>) -> Self {
        let best = select_best(&results);
        Self { results, best }
    }

    pub fn best(&self) -> &ModelResult {
        &self.results[self.best]
    }
}

/// Fit and score every candidate on one shared held-out split.
pub fn train(x: ArrayView2<'_, f64>, y: &[f64], cfg: &PipelineConfig) -> Result<TrainingOutcome> {
    let n = x.nrows();
    if n != y.len() {
        bail!("feature matrix has {n} rows but target has {}", y.len());
    }
    if n < 2 {
        bail!("need at least 2 rows to draw a held-out split, got {n}");
    }

    let (train_idx, test_idx) = train_test_split(n, cfg.test_fraction, cfg.seed);
    let x_train = x.select(Axis(0), &train_idx);
    let x_test = x.select(Axis(0), &test_idx);
    let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
    let y_test: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();

    let mut results = Vec::with_capacity(CANDIDATES.len());
    for kind in CANDIDATES {
        let mut model = kind.build(cfg.seed);
        model.fit(x_train.view(), &y_train);
        let predictions = model.predict(x_test.view());
        let score = r2_score(&y_test, &predictions);
        results.push(ModelResult {
            kind,
            score,
            predictions,
            actuals: y_test.clone(),
        });
    }

    Ok(TrainingOutcome::from_results(results))
}

/// One seeded shuffle split. The same (n, fraction, seed) triple always
/// produces the same partition, which is what makes cross-candidate scores
/// comparable.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let test_len = ((n as f64) * test_fraction).round() as usize;
    let test_len = test_len.clamp(1, n - 1);
    let test = indices[..test_len].to_vec();
    let train = indices[test_len..].to_vec();
    (train, test)
}

/// Coefficient of determination on evaluation data. A constant target is
/// degenerate; score it 1 only for an exact fit, 0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|v| (v - mean) * (v - mean)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();
    if ss_tot <= f64::EPSILON {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// First strictly-highest score wins, so ties resolve to the earliest
/// candidate in declared order.
pub fn select_best(results: &[ModelResult]) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (idx, result) in results.iter().enumerate() {
        if result.score > best_score {
            best_score = result.score;
            best = idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn stub_result(kind: ModelKind, score: f64) -> ModelResult {
        ModelResult {
            kind,
            score,
            predictions: Vec::new(),
            actuals: Vec::new(),
        }
    }

    #[test]
    fn tied_scores_pick_the_first_occurrence() {
        let results = vec![
            stub_result(ModelKind::RandomForest, 0.5),
            stub_result(ModelKind::GradientBoosting, 0.7),
            stub_result(ModelKind::RegularizedBoosting, 0.7),
            stub_result(ModelKind::NeuralNetwork, 0.3),
        ];
        assert_eq!(select_best(&results), 1);
    }

    #[test]
    fn nan_scores_never_win() {
        let results = vec![
            stub_result(ModelKind::RandomForest, f64::NAN),
            stub_result(ModelKind::GradientBoosting, -2.0),
        ];
        assert_eq!(select_best(&results), 1);
    }

    #[test]
    fn split_is_deterministic_and_disjoint() {
        let (train_a, test_a) = train_test_split(50, 0.2, 42);
        let (train_b, test_b) = train_test_split(50, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(test_a.len(), 10);
        assert_eq!(train_a.len() + test_a.len(), 50);
        let mut all: Vec<usize> = train_a.iter().chain(&test_a).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn tiny_inputs_keep_both_partitions_non_empty() {
        let (train, test) = train_test_split(2, 0.2, 0);
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn r2_matches_known_values() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(&actual, &[1.0, 2.0, 3.0, 4.0]), 1.0);
        let mean_pred = [2.5; 4];
        assert!(r2_score(&actual, &mean_pred).abs() < 1e-12);
        assert_eq!(r2_score(&[3.0, 3.0], &[1.0, 5.0]), 0.0);
    }

    #[test]
    fn all_candidates_share_the_held_out_split() {
        let n = 40;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * 5 + j * 11) % 13) as f64);
        let y: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|r| r[0] * 2.0 + r[1] - r[2] * 0.5)
            .collect();
        let cfg = PipelineConfig::default();

        let outcome = train(x.view(), &y, &cfg).unwrap();
        assert_eq!(outcome.results.len(), CANDIDATES.len());
        let reference = &outcome.results[0].actuals;
        for result in &outcome.results {
            assert_eq!(&result.actuals, reference);
            assert_eq!(result.predictions.len(), reference.len());
        }

        let (_, test_idx) = train_test_split(n, cfg.test_fraction, cfg.seed);
        let expected: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();
        assert_eq!(reference, &expected);
    }

    #[test]
    fn training_twice_is_reproducible() {
        let n = 30;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * 3 + j * 7) % 11) as f64);
        let y: Vec<f64> = x.rows().into_iter().map(|r| r[0] + r[1]).collect();
        let cfg = PipelineConfig::default();

        let a = train(x.view(), &y, &cfg).unwrap();
        let b = train(x.view(), &y, &cfg).unwrap();
        for (ra, rb) in a.results.iter().zip(&b.results) {
            assert_eq!(ra.score, rb.score);
            assert_eq!(ra.predictions, rb.predictions);
        }
        assert_eq!(a.best().kind, b.best().kind);
    }
}
