use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration as ChronoDuration, NaiveDate};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{SEASON_CURRENT, SEASON_PREVIOUS};
use crate::error::FetchError;
use crate::gamelog::GameLogRow;
use crate::stats_api::{PlayerIdentity, StatsProvider, resolve_team};

/// Offline stand-in for the live stats source: a small fixed roster with
/// seeded synthetic game logs, plus scriptable per-call failures so retry
/// and partial-failure paths can be exercised deterministically.
pub struct FakeSource {
    players: Vec<PlayerIdentity>,
    rosters: HashMap<u32, Vec<String>>,
    logs: HashMap<(u32, String), Vec<GameLogRow>>,
    failures: Mutex<HashMap<(u32, String), VecDeque<FetchError>>>,
    season_log_calls: AtomicUsize,
}

const ROSTER: [&str; 5] = [
    "Jayson Tatum",
    "Jaylen Brown",
    "Derrick White",
    "Kristaps Porzingis",
    "Payton Pritchard",
];

impl FakeSource {
    pub fn seeded(seed: u64) -> Self {
        let players: Vec<PlayerIdentity> = ROSTER
            .iter()
            .enumerate()
            .map(|(idx, name)| PlayerIdentity {
                id: 1000 + idx as u32,
                name: (*name).to_string(),
            })
            .collect();

        let team_id = resolve_team("BOS").map(|t| t.id).unwrap_or(1);
        let mut rosters = HashMap::new();
        rosters.insert(team_id, ROSTER.iter().map(|s| s.to_string()).collect());

        let mut logs = HashMap::new();
        for player in &players {
            for (season, games, season_end) in [
                (SEASON_CURRENT, 34usize, NaiveDate::from_ymd_opt(2025, 4, 11)),
                (SEASON_PREVIOUS, 41usize, NaiveDate::from_ymd_opt(2024, 4, 12)),
            ] {
                let Some(season_end) = season_end else { continue };
                logs.insert(
                    (player.id, season.to_string()),
                    synth_season(seed ^ u64::from(player.id), season_end, games),
                );
            }
        }

        Self {
            players,
            rosters,
            logs,
            failures: Mutex::new(HashMap::new()),
            season_log_calls: AtomicUsize::new(0),
        }
    }

    pub fn player_id(&self, name: &str) -> Option<u32> {
        self.players
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.id)
    }

    /// Queue a failure for the next `season_log` call on this (player,
    /// season); queued failures are consumed one per call.
    pub fn push_failure(&self, player_id: u32, season: &str, err: FetchError) {
        self.failures
            .lock()
            .expect("fake failure lock poisoned")
            .entry((player_id, season.to_string()))
            .or_default()
            .push_back(err);
    }

    pub fn season_log_calls(&self) -> u32 {
        self.season_log_calls.load(Ordering::SeqCst) as u32
    }

    pub fn season_len(&self, player_id: u32, season: &str) -> usize {
        self.logs
            .get(&(player_id, season.to_string()))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl StatsProvider for FakeSource {
    fn list_players(&self, _season: &str) -> Result<Vec<PlayerIdentity>, FetchError> {
        Ok(self.players.clone())
    }

    fn team_roster(&self, team_id: u32, _season: &str) -> Result<Vec<String>, FetchError> {
        self.rosters
            .get(&team_id)
            .cloned()
            .ok_or_else(|| FetchError::Upstream(format!("unknown team id {team_id}")))
    }

    fn season_log(&self, player_id: u32, season: &str) -> Result<Vec<GameLogRow>, FetchError> {
        self.season_log_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .failures
            .lock()
            .expect("fake failure lock poisoned")
            .get_mut(&(player_id, season.to_string()))
            .and_then(VecDeque::pop_front);
        if let Some(err) = scripted {
            return Err(err);
        }
        Ok(self
            .logs
            .get(&(player_id, season.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Internally consistent box scores, most recent first, two days apart.
fn synth_season(seed: u64, season_end: NaiveDate, games: usize) -> Vec<GameLogRow> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(games);
    for game in 0..games {
        let date = season_end - ChronoDuration::days(2 * game as i64);
        let min = rng.gen_range(26.0..40.0_f64).round();
        let fga = rng.gen_range(12..26) as f64;
        let fgm = (fga * rng.gen_range(0.35..0.58)).round();
        let fg3a = rng.gen_range(3..12) as f64;
        let fg3m = (fg3a * rng.gen_range(0.2..0.5)).round().min(fgm);
        let fta = rng.gen_range(0..9) as f64;
        let ftm = (fta * rng.gen_range(0.6..0.95)).round();
        let oreb = rng.gen_range(0..4) as f64;
        let dreb = rng.gen_range(2..10) as f64;
        let opponent = if game % 2 == 0 { "BOS vs. NYK" } else { "BOS @ MIA" };
        out.push(GameLogRow {
            game_date: date.format("%b %d, %Y").to_string().to_uppercase(),
            matchup: opponent.to_string(),
            min,
            fgm,
            fga,
            fg_pct: if fga > 0.0 { fgm / fga } else { 0.0 },
            fg3m,
            fg3a,
            fg3_pct: if fg3a > 0.0 { fg3m / fg3a } else { 0.0 },
            ftm,
            fta,
            ft_pct: if fta > 0.0 { ftm / fta } else { 0.0 },
            oreb,
            dreb,
            reb: oreb + dreb,
            ast: rng.gen_range(1..10) as f64,
            stl: rng.gen_range(0..4) as f64,
            blk: rng.gen_range(0..3) as f64,
            pts: 2.0 * (fgm - fg3m) + 3.0 * fg3m + ftm,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_sources_are_identical() {
        let a = FakeSource::seeded(3);
        let b = FakeSource::seeded(3);
        let id = a.player_id("Jaylen Brown").unwrap();
        let rows_a = a.season_log(id, SEASON_CURRENT).unwrap();
        let rows_b = b.season_log(id, SEASON_CURRENT).unwrap();
        assert_eq!(rows_a.len(), rows_b.len());
        assert_eq!(rows_a[0].pts, rows_b[0].pts);
        assert_eq!(rows_a[5].game_date, rows_b[5].game_date);
    }

    #[test]
    fn box_scores_are_consistent() {
        let source = FakeSource::seeded(9);
        let id = source.player_id("Derrick White").unwrap();
        for row in source.season_log(id, SEASON_PREVIOUS).unwrap() {
            assert_eq!(row.reb, row.oreb + row.dreb);
            assert_eq!(row.pts, 2.0 * (row.fgm - row.fg3m) + 3.0 * row.fg3m + row.ftm);
            assert!(row.fg3m <= row.fgm);
        }
    }

    #[test]
    fn roster_is_served_for_the_seeded_team() {
        let source = FakeSource::seeded(1);
        let team = resolve_team("BOS").unwrap();
        let roster = source.team_roster(team.id, SEASON_CURRENT).unwrap();
        assert_eq!(roster.len(), ROSTER.len());
        assert!(source.team_roster(42, SEASON_CURRENT).is_err());
    }
}
