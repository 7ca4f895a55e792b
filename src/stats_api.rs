use std::time::Duration;

use log::warn;
use reqwest::header::{ACCEPT, REFERER, USER_AGENT};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::gamelog::GameLogRow;
use crate::http_cache::fetch_cached;
use crate::http_client::http_client;

const STATS_BASE_URL: &str = "https://stats.nba.com/stats";

/// A player as listed in the league-wide index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Copy)]
pub struct TeamInfo {
    pub id: u32,
    pub abbreviation: &'static str,
    pub name: &'static str,
}

/// The league's 30 franchises. Ids are the upstream's stable team handles;
/// the set changes rarely enough that a static catalog beats a fetch.
pub const TEAMS: &[TeamInfo] = &[
    TeamInfo { id: 1_610_612_737, abbreviation: "ATL", name: "Atlanta Hawks" },
    TeamInfo { id: 1_610_612_738, abbreviation: "BOS", name: "Boston Celtics" },
    TeamInfo { id: 1_610_612_751, abbreviation: "BKN", name: "Brooklyn Nets" },
    TeamInfo { id: 1_610_612_766, abbreviation: "CHA", name: "Charlotte Hornets" },
    TeamInfo { id: 1_610_612_741, abbreviation: "CHI", name: "Chicago Bulls" },
    TeamInfo { id: 1_610_612_739, abbreviation: "CLE", name: "Cleveland Cavaliers" },
    TeamInfo { id: 1_610_612_742, abbreviation: "DAL", name: "Dallas Mavericks" },
    TeamInfo { id: 1_610_612_743, abbreviation: "DEN", name: "Denver Nuggets" },
    TeamInfo { id: 1_610_612_765, abbreviation: "DET", name: "Detroit Pistons" },
    TeamInfo { id: 1_610_612_744, abbreviation: "GSW", name: "Golden State Warriors" },
    TeamInfo { id: 1_610_612_745, abbreviation: "HOU", name: "Houston Rockets" },
    TeamInfo { id: 1_610_612_754, abbreviation: "IND", name: "Indiana Pacers" },
    TeamInfo { id: 1_610_612_746, abbreviation: "LAC", name: "Los Angeles Clippers" },
    TeamInfo { id: 1_610_612_747, abbreviation: "LAL", name: "Los Angeles Lakers" },
    TeamInfo { id: 1_610_612_763, abbreviation: "MEM", name: "Memphis Grizzlies" },
    TeamInfo { id: 1_610_612_748, abbreviation: "MIA", name: "Miami Heat" },
    TeamInfo { id: 1_610_612_749, abbreviation: "MIL", name: "Milwaukee Bucks" },
    TeamInfo { id: 1_610_612_750, abbreviation: "MIN", name: "Minnesota Timberwolves" },
    TeamInfo { id: 1_610_612_740, abbreviation: "NOP", name: "New Orleans Pelicans" },
    TeamInfo { id: 1_610_612_752, abbreviation: "NYK", name: "New York Knicks" },
    TeamInfo { id: 1_610_612_760, abbreviation: "OKC", name: "Oklahoma City Thunder" },
    TeamInfo { id: 1_610_612_753, abbreviation: "ORL", name: "Orlando Magic" },
    TeamInfo { id: 1_610_612_755, abbreviation: "PHI", name: "Philadelphia 76ers" },
    TeamInfo { id: 1_610_612_756, abbreviation: "PHX", name: "Phoenix Suns" },
    TeamInfo { id: 1_610_612_757, abbreviation: "POR", name: "Portland Trail Blazers" },
    TeamInfo { id: 1_610_612_758, abbreviation: "SAC", name: "Sacramento Kings" },
    TeamInfo { id: 1_610_612_759, abbreviation: "SAS", name: "San Antonio Spurs" },
    TeamInfo { id: 1_610_612_761, abbreviation: "TOR", name: "Toronto Raptors" },
    TeamInfo { id: 1_610_612_762, abbreviation: "UTA", name: "Utah Jazz" },
    TeamInfo { id: 1_610_612_764, abbreviation: "WAS", name: "Washington Wizards" },
];

/// Narrow seam over the upstream stats source. Everything the pipeline
/// needs from the network goes through here, so tests can swap in an
/// offline implementation.
pub trait StatsProvider: Sync {
    /// League-wide player index for a season.
    fn list_players(&self, season: &str) -> Result<Vec<PlayerIdentity>, FetchError>;
    /// Player names on a team's roster for a season.
    fn team_roster(&self, team_id: u32, season: &str) -> Result<Vec<String>, FetchError>;
    /// One attempt at a player's per-game log for a season.
    fn season_log(&self, player_id: u32, season: &str) -> Result<Vec<GameLogRow>, FetchError>;
}

pub fn resolve_team(abbreviation: &str) -> Option<&'static TeamInfo> {
    let want = abbreviation.trim().to_ascii_uppercase();
    TEAMS.iter().find(|team| team.abbreviation == want)
}

/// Exact full-name lookup against the player index. The first hit is
/// authoritative; a miss is a warning, not an error.
pub fn resolve_player(
    provider: &dyn StatsProvider,
    cfg: &PipelineConfig,
    full_name: &str,
) -> Result<Option<PlayerIdentity>, FetchError> {
    let season = cfg.seasons.first().map(String::as_str).unwrap_or_default();
    let players = provider.list_players(season)?;
    let want = full_name.trim();
    let found = players
        .into_iter()
        .find(|p| p.name.trim().eq_ignore_ascii_case(want));
    if found.is_none() {
        warn!("player '{want}' not found in the {season} index");
    }
    Ok(found)
}

/// Live client against stats.nba.com, with every payload going through the
/// TTL cache.
pub struct NbaStats {
    request_timeout: Duration,
    cache_ttl: Duration,
}

impl NbaStats {
    pub fn new(cfg: &PipelineConfig) -> Self {
        Self {
            request_timeout: cfg.request_timeout,
            cache_ttl: cfg.cache_ttl,
        }
    }

    fn fetch_json(&self, url: &str) -> Result<String, FetchError> {
        fetch_cached(url, self.cache_ttl, || {
            let client = http_client(self.request_timeout)
                .map_err(|err| FetchError::Upstream(err.to_string()))?;
            let resp = client
                .get(url)
                .header(USER_AGENT, "Mozilla/5.0")
                .header(REFERER, "https://www.nba.com/")
                .header(ACCEPT, "application/json")
                .header("x-nba-stats-origin", "stats")
                .send()
                .map_err(FetchError::from_reqwest)?;
            let status = resp.status();
            let body = resp.text().map_err(FetchError::from_reqwest)?;
            if !status.is_success() {
                return Err(FetchError::Upstream(format!("http {status}: {body}")));
            }
            Ok(body)
        })
    }
}

impl StatsProvider for NbaStats {
    fn list_players(&self, season: &str) -> Result<Vec<PlayerIdentity>, FetchError> {
        let url = format!(
            "{STATS_BASE_URL}/commonallplayers?LeagueID=00&Season={season}&IsOnlyCurrentSeason=1"
        );
        parse_player_index_json(&self.fetch_json(&url)?)
    }

    fn team_roster(&self, team_id: u32, season: &str) -> Result<Vec<String>, FetchError> {
        let url = format!("{STATS_BASE_URL}/commonteamroster?TeamID={team_id}&Season={season}");
        parse_roster_json(&self.fetch_json(&url)?)
    }

    fn season_log(&self, player_id: u32, season: &str) -> Result<Vec<GameLogRow>, FetchError> {
        let url = format!(
            "{STATS_BASE_URL}/playergamelog?PlayerID={player_id}&Season={season}&SeasonType=Regular+Season"
        );
        parse_game_log_json(&self.fetch_json(&url)?)
    }
}

/// Parse a `playergamelog` payload. Rows come back most-recent-first and
/// are kept in that order.
pub fn parse_game_log_json(raw: &str) -> Result<Vec<GameLogRow>, FetchError> {
    let (headers, rows) = result_set(raw, "PlayerGameLog")?;
    let col = |name: &str| header_index(&headers, name);
    let (Some(date), Some(matchup)) = (col("GAME_DATE"), col("MATCHUP")) else {
        return Err(FetchError::Upstream(
            "game log result set is missing GAME_DATE/MATCHUP".to_string(),
        ));
    };

    let numeric = [
        "MIN", "FGM", "FGA", "FG_PCT", "FG3M", "FG3A", "FG3_PCT", "FTM", "FTA", "FT_PCT", "OREB",
        "DREB", "REB", "AST", "STL", "BLK", "PTS",
    ];
    let mut numeric_idx = Vec::with_capacity(numeric.len());
    for name in numeric {
        let Some(idx) = col(name) else {
            return Err(FetchError::Upstream(format!(
                "game log result set is missing {name}"
            )));
        };
        numeric_idx.push(idx);
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut values = [0.0f64; 17];
        for (slot, idx) in numeric_idx.iter().enumerate() {
            values[slot] = row.get(*idx).and_then(as_f64_any).unwrap_or(0.0);
        }
        let [
            min,
            fgm,
            fga,
            fg_pct,
            fg3m,
            fg3a,
            fg3_pct,
            ftm,
            fta,
            ft_pct,
            oreb,
            dreb,
            reb,
            ast,
            stl,
            blk,
            pts,
        ] = values;
        out.push(GameLogRow {
            game_date: row
                .get(date)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            matchup: row
                .get(matchup)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            min,
            fgm,
            fga,
            fg_pct,
            fg3m,
            fg3a,
            fg3_pct,
            ftm,
            fta,
            ft_pct,
            oreb,
            dreb,
            reb,
            ast,
            stl,
            blk,
            pts,
        });
    }
    Ok(out)
}

/// Parse a `commonallplayers` payload into the player index.
pub fn parse_player_index_json(raw: &str) -> Result<Vec<PlayerIdentity>, FetchError> {
    let (headers, rows) = result_set(raw, "CommonAllPlayers")?;
    let (Some(id_idx), Some(name_idx)) = (
        header_index(&headers, "PERSON_ID"),
        header_index(&headers, "DISPLAY_FIRST_LAST"),
    ) else {
        return Err(FetchError::Upstream(
            "player index is missing PERSON_ID/DISPLAY_FIRST_LAST".to_string(),
        ));
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let Some(id) = row.get(id_idx).and_then(as_u32_any) else {
            continue;
        };
        let Some(name) = row.get(name_idx).and_then(|v| v.as_str()) else {
            continue;
        };
        if name.trim().is_empty() {
            continue;
        }
        out.push(PlayerIdentity {
            id,
            name: name.to_string(),
        });
    }
    Ok(out)
}

/// Parse a `commonteamroster` payload into player names, roster order.
pub fn parse_roster_json(raw: &str) -> Result<Vec<String>, FetchError> {
    let (headers, rows) = result_set(raw, "CommonTeamRoster")?;
    let Some(player_idx) = header_index(&headers, "PLAYER") else {
        return Err(FetchError::Upstream(
            "roster result set is missing PLAYER".to_string(),
        ));
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        if let Some(name) = row.get(player_idx).and_then(|v| v.as_str())
            && !name.trim().is_empty()
        {
            out.push(name.to_string());
        }
    }
    Ok(out)
}

/// Locate a named result set in the upstream's envelope and pull out its
/// headers and rows. Falls back to the first result set when the name is
/// absent.
fn result_set(raw: &str, name: &str) -> Result<(Vec<String>, Vec<Vec<Value>>), FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(FetchError::Upstream("empty stats response".to_string()));
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|err| FetchError::Upstream(format!("invalid stats json: {err}")))?;
    let sets = value
        .get("resultSets")
        .and_then(|v| v.as_array())
        .ok_or_else(|| FetchError::Upstream("missing resultSets".to_string()))?;

    let set = sets
        .iter()
        .find(|s| s.get("name").and_then(|n| n.as_str()) == Some(name))
        .or_else(|| sets.first())
        .ok_or_else(|| FetchError::Upstream(format!("result set {name} not found")))?;

    let headers = set
        .get("headers")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if headers.is_empty() {
        return Err(FetchError::Upstream(format!(
            "result set {name} has no headers"
        )));
    }

    let rows = set
        .get("rowSet")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|row| row.as_array().cloned())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Ok((headers, rows))
}

fn header_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}

fn as_u32_any(v: &Value) -> Option<u32> {
    if let Some(n) = v.as_u64() {
        return u32::try_from(n).ok();
    }
    v.as_str()?.trim().parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_catalog_resolves_exact_abbreviations() {
        let celtics = resolve_team("bos").unwrap();
        assert_eq!(celtics.name, "Boston Celtics");
        assert!(resolve_team("XXX").is_none());
        assert!(resolve_team("BO").is_none());
    }

    #[test]
    fn team_catalog_is_unique() {
        let mut abbrs: Vec<&str> = TEAMS.iter().map(|t| t.abbreviation).collect();
        abbrs.sort_unstable();
        abbrs.dedup();
        assert_eq!(abbrs.len(), TEAMS.len());
        assert_eq!(TEAMS.len(), 30);
    }

    #[test]
    fn empty_bodies_are_upstream_errors() {
        assert!(parse_game_log_json("").is_err());
        assert!(parse_game_log_json("null").is_err());
        assert!(parse_player_index_json("{}").is_err());
    }
}
