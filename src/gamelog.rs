use std::thread;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::stats_api::{StatsProvider, resolve_player};

/// Numeric per-game fields, in column order. `pts` is last and doubles as
/// the regression target.
pub const STAT_COLUMNS: [&str; 17] = [
    "min", "fgm", "fga", "fg_pct", "fg3m", "fg3a", "fg3_pct", "ftm", "fta", "ft_pct", "oreb",
    "dreb", "reb", "ast", "stl", "blk", "pts",
];

/// One played game for one player, as delivered by the game log endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameLogRow {
    pub game_date: String,
    pub matchup: String,
    pub min: f64,
    pub fgm: f64,
    pub fga: f64,
    pub fg_pct: f64,
    pub fg3m: f64,
    pub fg3a: f64,
    pub fg3_pct: f64,
    pub ftm: f64,
    pub fta: f64,
    pub ft_pct: f64,
    pub oreb: f64,
    pub dreb: f64,
    pub reb: f64,
    pub ast: f64,
    pub stl: f64,
    pub blk: f64,
    pub pts: f64,
}

impl GameLogRow {
    /// Values aligned with [`STAT_COLUMNS`].
    pub fn stat_values(&self) -> [f64; 17] {
        [
            self.min, self.fgm, self.fga, self.fg_pct, self.fg3m, self.fg3a, self.fg3_pct,
            self.ftm, self.fta, self.ft_pct, self.oreb, self.dreb, self.reb, self.ast, self.stl,
            self.blk, self.pts,
        ]
    }
}

/// Fetch one season's log, retrying transient failures up to the configured
/// bound with a fixed backoff between attempts. Non-transient failures are
/// returned immediately.
pub fn fetch_season_log(
    provider: &dyn StatsProvider,
    cfg: &PipelineConfig,
    player_id: u32,
    season: &str,
) -> Result<Vec<GameLogRow>, FetchError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match provider.season_log(player_id, season) {
            Ok(rows) => return Ok(rows),
            Err(err) if err.is_transient() && attempt < cfg.max_retries => {
                warn!("season {season} fetch attempt {attempt} failed: {err}, retrying");
                thread::sleep(cfg.retry_backoff);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Resolve a player by full name and concatenate their game logs across the
/// configured seasons, in season order. Seasons fail independently; the
/// player comes back as `None` only when the name does not resolve or every
/// season failed.
pub fn fetch_player_data(
    provider: &dyn StatsProvider,
    cfg: &PipelineConfig,
    player_name: &str,
) -> Result<Option<Vec<GameLogRow>>, FetchError> {
    let Some(player) = resolve_player(provider, cfg, player_name)? else {
        return Ok(None);
    };

    let mut combined = Vec::new();
    let mut failures = 0usize;
    for season in &cfg.seasons {
        match fetch_season_log(provider, cfg, player.id, season) {
            Ok(rows) => combined.extend(rows),
            Err(err) => {
                failures += 1;
                warn!(
                    "failed to fetch {player_name} season {season} after {} attempts: {err}",
                    cfg.max_retries
                );
            }
        }
    }

    if failures == cfg.seasons.len() {
        return Ok(None);
    }
    Ok(Some(combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_source::FakeSource;

    fn test_cfg() -> PipelineConfig {
        PipelineConfig {
            retry_backoff: std::time::Duration::ZERO,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn transient_failures_are_retried_to_success() {
        let cfg = test_cfg();
        let source = FakeSource::seeded(7);
        let id = source.player_id("Jayson Tatum").unwrap();
        source.push_failure(id, "2024-25", FetchError::Transient("timeout".into()));
        source.push_failure(id, "2024-25", FetchError::Transient("timeout".into()));

        let rows = fetch_season_log(&source, &cfg, id, "2024-25").unwrap();
        assert!(!rows.is_empty());
        assert_eq!(source.season_log_calls(), 3);
    }

    #[test]
    fn retry_bound_is_honored() {
        let cfg = test_cfg();
        let source = FakeSource::seeded(7);
        let id = source.player_id("Jayson Tatum").unwrap();
        for _ in 0..cfg.max_retries {
            source.push_failure(id, "2024-25", FetchError::Transient("timeout".into()));
        }

        let err = fetch_season_log(&source, &cfg, id, "2024-25").unwrap_err();
        assert!(err.is_transient());
        assert_eq!(source.season_log_calls(), cfg.max_retries);
    }

    #[test]
    fn upstream_failures_are_not_retried() {
        let cfg = test_cfg();
        let source = FakeSource::seeded(7);
        let id = source.player_id("Jayson Tatum").unwrap();
        source.push_failure(id, "2024-25", FetchError::Upstream("bad json".into()));

        assert!(fetch_season_log(&source, &cfg, id, "2024-25").is_err());
        assert_eq!(source.season_log_calls(), 1);
    }

    #[test]
    fn one_failed_season_keeps_the_other() {
        let cfg = test_cfg();
        let source = FakeSource::seeded(7);
        let id = source.player_id("Jayson Tatum").unwrap();
        // Exhaust retries for the current season only.
        for _ in 0..cfg.max_retries {
            source.push_failure(id, "2024-25", FetchError::Transient("timeout".into()));
        }

        let rows = fetch_player_data(&source, &cfg, "Jayson Tatum")
            .unwrap()
            .unwrap();
        let expected = source.season_len(id, "2023-24");
        assert_eq!(rows.len(), expected);
    }

    #[test]
    fn all_seasons_failing_yields_none() {
        let cfg = test_cfg();
        let source = FakeSource::seeded(7);
        let id = source.player_id("Jayson Tatum").unwrap();
        for season in &cfg.seasons {
            for _ in 0..cfg.max_retries {
                source.push_failure(id, season, FetchError::Transient("timeout".into()));
            }
        }

        assert!(
            fetch_player_data(&source, &cfg, "Jayson Tatum")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn unknown_player_yields_none() {
        let cfg = test_cfg();
        let source = FakeSource::seeded(7);
        assert!(
            fetch_player_data(&source, &cfg, "Nobody Atall")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn seasons_concatenate_in_requested_order() {
        let cfg = test_cfg();
        let source = FakeSource::seeded(7);
        let id = source.player_id("Jayson Tatum").unwrap();
        let rows = fetch_player_data(&source, &cfg, "Jayson Tatum")
            .unwrap()
            .unwrap();
        let current = source.season_len(id, "2024-25");
        let previous = source.season_len(id, "2023-24");
        assert_eq!(rows.len(), current + previous);

        let direct = fetch_season_log(&source, &cfg, id, "2024-25").unwrap();
        assert_eq!(rows[0].game_date, direct[0].game_date);
    }
}
