use serde::Serialize;

use crate::features::FeatureTable;
use crate::train::TrainingOutcome;

/// Everything the presentation layer needs to render one analyzed player.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub recent_games: Vec<RecentGame>,
    pub season_stats: SeasonStats,
    pub impact: ImpactMetrics,
    pub best_model: &'static str,
    pub model_scores: Vec<ModelScore>,
    pub prediction_series: Vec<PredictionPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentGame {
    pub date: String,
    pub matchup: String,
    pub min: f64,
    pub pts: f64,
    pub ast: f64,
    pub reb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeasonStats {
    pub points_per_game: f64,
    pub assists_per_game: f64,
    pub rebounds_per_game: f64,
    pub field_goal_pct: f64,
    pub three_point_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactMetrics {
    /// Mean minutes, standing in for usage.
    pub usage_rate: f64,
    /// Makes over attempts, as a percentage.
    pub offensive_rating: f64,
    /// Mean steals plus mean blocks.
    pub defensive_impact: f64,
    /// Points per 48 minutes.
    pub efficiency: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelScore {
    pub model: &'static str,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionPoint {
    pub index: usize,
    pub actual: f64,
    pub predicted: f64,
}

/// Aggregate the engineered table and package the winning model's held-out
/// series for charting. Pure function of its inputs.
pub fn summarize(table: &FeatureTable, outcome: &TrainingOutcome) -> Report {
    let games = &table.games;
    let n = games.len() as f64;

    let recent_games = table
        .recent_games(5)
        .iter()
        .map(|g| RecentGame {
            date: g.game_date.clone(),
            matchup: g.matchup.clone(),
            min: g.min,
            pts: g.pts,
            ast: g.ast,
            reb: g.reb,
        })
        .collect();

    let sum = |f: fn(&crate::gamelog::GameLogRow) -> f64| games.iter().map(f).sum::<f64>();
    let mean = |f: fn(&crate::gamelog::GameLogRow) -> f64| ratio(sum(f), n);

    let season_stats = SeasonStats {
        points_per_game: mean(|g| g.pts),
        assists_per_game: mean(|g| g.ast),
        rebounds_per_game: mean(|g| g.reb),
        field_goal_pct: mean(|g| g.fg_pct) * 100.0,
        three_point_pct: mean(|g| g.fg3_pct) * 100.0,
    };

    let impact = ImpactMetrics {
        usage_rate: mean(|g| g.min),
        offensive_rating: ratio(sum(|g| g.fgm), sum(|g| g.fga)) * 100.0,
        defensive_impact: mean(|g| g.stl) + mean(|g| g.blk),
        efficiency: ratio(sum(|g| g.pts), sum(|g| g.min)) * 48.0,
    };

    let best = outcome.best();
    let prediction_series = best
        .actuals
        .iter()
        .zip(&best.predictions)
        .enumerate()
        .map(|(index, (actual, predicted))| PredictionPoint {
            index,
            actual: *actual,
            predicted: *predicted,
        })
        .collect();

    let model_scores = outcome
        .results
        .iter()
        .map(|r| ModelScore {
            model: r.kind.label(),
            score: r.score,
        })
        .collect();

    Report {
        recent_games,
        season_stats,
        impact,
        best_model: best.kind.label(),
        model_scores,
        prediction_series,
    }
}

/// Division that reports 0 instead of faulting on an empty denominator.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
