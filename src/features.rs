use ndarray::{Array2, Axis};
use thiserror::Error;

use crate::gamelog::{GameLogRow, STAT_COLUMNS};

#[derive(Debug, Error)]
#[error("no game log rows to engineer")]
pub struct EmptyInput;

/// Game rows plus their trailing rolling-mean features. Row `i` of
/// `rolling` is aligned with `games[i]`; columns are named in `columns`.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub games: Vec<GameLogRow>,
    pub columns: Vec<String>,
    pub rolling: Array2<f64>,
}

/// Append trailing rolling means over the given windows for every numeric
/// stat, in the rows' existing chronological order. A row with fewer than
/// `window` predecessors averages over however many games exist, so every
/// surviving row gets a value. Rows carrying a non-finite stat are dropped
/// up front so they cannot poison their neighbors' windows.
pub fn engineer(rows: &[GameLogRow], windows: &[usize]) -> Result<FeatureTable, EmptyInput> {
    if rows.is_empty() || windows.is_empty() {
        return Err(EmptyInput);
    }

    let games: Vec<GameLogRow> = rows
        .iter()
        .filter(|row| row.stat_values().iter().all(|v| v.is_finite()))
        .cloned()
        .collect();
    if games.is_empty() {
        return Err(EmptyInput);
    }

    let n = games.len();
    let stats: Vec<[f64; 17]> = games.iter().map(GameLogRow::stat_values).collect();

    let mut columns = Vec::with_capacity(STAT_COLUMNS.len() * windows.len());
    for stat in STAT_COLUMNS {
        for w in windows {
            columns.push(format!("{stat}_roll_{w}"));
        }
    }

    let mut rolling = Array2::zeros((n, columns.len()));
    for (stat_idx, _) in STAT_COLUMNS.iter().enumerate() {
        // Prefix sums let each window share one pass over the stat.
        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0.0);
        for row in &stats {
            prefix.push(prefix.last().copied().unwrap_or(0.0) + row[stat_idx]);
        }
        for (w_idx, window) in windows.iter().enumerate() {
            let col = stat_idx * windows.len() + w_idx;
            for i in 0..n {
                let span = (*window).min(i + 1);
                rolling[(i, col)] = (prefix[i + 1] - prefix[i + 1 - span]) / span as f64;
            }
        }
    }

    Ok(FeatureTable {
        games,
        columns,
        rolling,
    })
}

impl FeatureTable {
    /// Model inputs: every rolling column except the target's own rollups.
    /// Points enter each candidate only through the other stats' windows,
    /// never through an average containing the row being predicted.
    pub fn model_matrix(&self) -> (Array2<f64>, Vec<String>) {
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.starts_with("pts_roll_"))
            .map(|(idx, _)| idx)
            .collect();
        let names = keep.iter().map(|&i| self.columns[i].clone()).collect();
        (self.rolling.select(Axis(1), &keep), names)
    }

    /// Regression target: points scored per game row.
    pub fn target(&self) -> Vec<f64> {
        self.games.iter().map(|g| g.pts).collect()
    }

    pub fn recent_games(&self, count: usize) -> &[GameLogRow] {
        &self.games[..count.min(self.games.len())]
    }
}
