use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::train::Regressor;

const EPS: f64 = 1e-9;

/// Small feed-forward regressor: two ReLU hidden layers, full-batch Adam,
/// bounded iteration count. Inputs and target are standardized internally
/// so the optimizer sees unit-scale data regardless of the stat ranges.
pub struct MlpRegressor {
    pub hidden: (usize, usize),
    pub max_iter: usize,
    pub learning_rate: f64,
    pub seed: u64,
    fitted: Option<Fitted>,
}

struct Fitted {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
    w3: Array1<f64>,
    b3: f64,
    x_mean: Array1<f64>,
    x_std: Array1<f64>,
    y_mean: f64,
    y_std: f64,
}

impl MlpRegressor {
    pub fn new(seed: u64) -> Self {
        Self {
            hidden: (100, 50),
            max_iter: 1000,
            learning_rate: 1e-3,
            seed,
            fitted: None,
        }
    }
}

impl Regressor for MlpRegressor {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]) {
        let n = x.nrows();
        let d = x.ncols();
        let (h1, h2) = self.hidden;

        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
        let x_std = column_std(x, &x_mean);
        let xs = standardize(x, &x_mean, &x_std);

        let y_mean = if n == 0 {
            0.0
        } else {
            y.iter().sum::<f64>() / n as f64
        };
        let y_std = (y.iter().map(|v| (v - y_mean) * (v - y_mean)).sum::<f64>() / n.max(1) as f64)
            .sqrt()
            .max(EPS);
        let yn = Array1::from_iter(y.iter().map(|v| (v - y_mean) / y_std));

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut w1 = glorot(d, h1, &mut rng);
        let mut b1 = Array1::zeros(h1);
        let mut w2 = glorot(h1, h2, &mut rng);
        let mut b2 = Array1::zeros(h2);
        let mut w3: Array1<f64> = glorot(h2, 1, &mut rng).column(0).to_owned();
        let mut b3 = 0.0f64;

        let mut adam_w1 = Adam2::new(d, h1);
        let mut adam_b1 = Adam1::new(h1);
        let mut adam_w2 = Adam2::new(h1, h2);
        let mut adam_b2 = Adam1::new(h2);
        let mut adam_w3 = Adam1::new(h2);
        let mut adam_b3 = AdamScalar::default();

        let mut best_loss = f64::INFINITY;
        let mut stale = 0usize;
        for step in 1..=self.max_iter {
            // Forward pass.
            let z1 = xs.dot(&w1) + &b1;
            let a1 = z1.mapv(relu);
            let z2 = a1.dot(&w2) + &b2;
            let a2 = z2.mapv(relu);
            let yhat = a2.dot(&w3) + b3;

            let err = &yhat - &yn;
            let loss = err.mapv(|e| e * e).sum() / (2.0 * n.max(1) as f64);
            if loss + 1e-6 < best_loss {
                best_loss = loss;
                stale = 0;
            } else {
                stale += 1;
                if stale >= 10 {
                    break;
                }
            }

            // Backward pass.
            let d_yhat = err.mapv(|e| e / n.max(1) as f64);
            let g_w3 = a2.t().dot(&d_yhat);
            let g_b3 = d_yhat.sum();
            let d_a2 = outer(&d_yhat, &w3);
            let d_z2 = &d_a2 * &z2.mapv(relu_grad);
            let g_w2 = a1.t().dot(&d_z2);
            let g_b2 = d_z2.sum_axis(Axis(0));
            let d_a1 = d_z2.dot(&w2.t());
            let d_z1 = &d_a1 * &z1.mapv(relu_grad);
            let g_w1 = xs.t().dot(&d_z1);
            let g_b1 = d_z1.sum_axis(Axis(0));

            let lr = self.learning_rate;
            adam_w1.step(&mut w1, &g_w1, lr, step);
            adam_b1.step(&mut b1, &g_b1, lr, step);
            adam_w2.step(&mut w2, &g_w2, lr, step);
            adam_b2.step(&mut b2, &g_b2, lr, step);
            adam_w3.step(&mut w3, &g_w3, lr, step);
            adam_b3.step(&mut b3, g_b3, lr, step);
        }

        self.fitted = Some(Fitted {
            w1,
            b1,
            w2,
            b2,
            w3,
            b3,
            x_mean,
            x_std,
            y_mean,
            y_std,
        });
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        let Some(f) = &self.fitted else {
            return vec![0.0; x.nrows()];
        };
        let xs = standardize(x, &f.x_mean, &f.x_std);
        let a1 = (xs.dot(&f.w1) + &f.b1).mapv(relu);
        let a2 = (a1.dot(&f.w2) + &f.b2).mapv(relu);
        let yhat = a2.dot(&f.w3) + f.b3;
        yhat.iter().map(|v| v * f.y_std + f.y_mean).collect()
    }
}

fn relu(v: f64) -> f64 {
    v.max(0.0)
}

fn relu_grad(v: f64) -> f64 {
    if v > 0.0 { 1.0 } else { 0.0 }
}

fn glorot(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit))
}

fn column_std(x: ArrayView2<'_, f64>, mean: &Array1<f64>) -> Array1<f64> {
    let n = x.nrows().max(1) as f64;
    let mut out = Array1::zeros(x.ncols());
    for (j, col) in x.columns().into_iter().enumerate() {
        let var = col.iter().map(|v| (v - mean[j]) * (v - mean[j])).sum::<f64>() / n;
        out[j] = var.sqrt().max(EPS);
    }
    out
}

fn standardize(x: ArrayView2<'_, f64>, mean: &Array1<f64>, std: &Array1<f64>) -> Array2<f64> {
    let mut out = x.to_owned();
    for mut row in out.rows_mut() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = (*v - mean[j]) / std[j];
        }
    }
    out
}

/// Column vector times row vector.
fn outer(col: &Array1<f64>, row: &Array1<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((col.len(), row.len()));
    for (i, c) in col.iter().enumerate() {
        for (j, r) in row.iter().enumerate() {
            out[(i, j)] = c * r;
        }
    }
    out
}

struct Adam2 {
    m: Array2<f64>,
    v: Array2<f64>,
}

impl Adam2 {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            m: Array2::zeros((rows, cols)),
            v: Array2::zeros((rows, cols)),
        }
    }

    fn step(&mut self, w: &mut Array2<f64>, g: &Array2<f64>, lr: f64, t: usize) {
        let (b1, b2) = (0.9, 0.999);
        self.m = &self.m * b1 + g * (1.0 - b1);
        self.v = &self.v * b2 + &g.mapv(|x| x * x) * (1.0 - b2);
        let m_hat = &self.m / (1.0 - b1.powi(t as i32));
        let v_hat = &self.v / (1.0 - b2.powi(t as i32));
        *w -= &(m_hat / (v_hat.mapv(f64::sqrt) + 1e-8) * lr);
    }
}

struct Adam1 {
    m: Array1<f64>,
    v: Array1<f64>,
}

impl Adam1 {
    fn new(len: usize) -> Self {
        Self {
            m: Array1::zeros(len),
            v: Array1::zeros(len),
        }
    }

    fn step(&mut self, w: &mut Array1<f64>, g: &Array1<f64>, lr: f64, t: usize) {
        let (b1, b2) = (0.9, 0.999);
        self.m = &self.m * b1 + g * (1.0 - b1);
        self.v = &self.v * b2 + &g.mapv(|x| x * x) * (1.0 - b2);
        let m_hat = &self.m / (1.0 - b1.powi(t as i32));
        let v_hat = &self.v / (1.0 - b2.powi(t as i32));
        *w -= &(m_hat / (v_hat.mapv(f64::sqrt) + 1e-8) * lr);
    }
}

#[derive(Default)]
struct AdamScalar {
    m: f64,
    v: f64,
}

impl AdamScalar {
    fn step(&mut self, w: &mut f64, g: f64, lr: f64, t: usize) {
        let (b1, b2) = (0.9, 0.999);
        self.m = self.m * b1 + g * (1.0 - b1);
        self.v = self.v * b2 + g * g * (1.0 - b2);
        let m_hat = self.m / (1.0 - b1.powi(t as i32));
        let v_hat = self.v / (1.0 - b2.powi(t as i32));
        *w -= lr * m_hat / (v_hat.sqrt() + 1e-8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn learns_a_noiseless_linear_map() {
        let n = 60;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * 7 + j * 13) % 17) as f64);
        let y: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|r| 2.0 * r[0] - 1.5 * r[1] + 0.5 * r[2] + 3.0)
            .collect();

        let mut model = MlpRegressor::new(42);
        model.fit(x.view(), &y);
        let preds = model.predict(x.view());

        let y_mean = y.iter().sum::<f64>() / y.len() as f64;
        let ss_tot: f64 = y.iter().map(|v| (v - y_mean) * (v - y_mean)).sum();
        let ss_res: f64 = preds
            .iter()
            .zip(&y)
            .map(|(p, a)| (p - a) * (p - a))
            .sum();
        assert!(ss_res < 0.2 * ss_tot, "mlp failed to fit: {ss_res} vs {ss_tot}");
    }

    #[test]
    fn seeded_runs_are_identical() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i + j) as f64);
        let y: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let mut a = MlpRegressor::new(5);
        let mut b = MlpRegressor::new(5);
        a.fit(x.view(), &y);
        b.fit(x.view(), &y);
        assert_eq!(a.predict(x.view()), b.predict(x.view()));
    }

    #[test]
    fn unfitted_model_predicts_zero() {
        let x = Array2::zeros((3, 2));
        let model = MlpRegressor::new(1);
        assert_eq!(model.predict(x.view()), vec![0.0; 3]);
    }
}
