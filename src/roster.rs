use std::collections::HashMap;

use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::gamelog::{GameLogRow, fetch_player_data};
use crate::stats_api::StatsProvider;

/// Outcome of a roster-wide fetch: whatever succeeded, plus one warning per
/// player that produced nothing.
pub struct RosterFetch {
    pub players: HashMap<String, Vec<GameLogRow>>,
    pub warnings: Vec<String>,
}

/// Fan one game-log fetch per roster member out onto a bounded worker
/// pool. A single player failing (unresolvable name, all seasons failed,
/// fetch error) is reported and excluded; the batch itself never aborts.
pub fn fetch_all_players(
    provider: &dyn StatsProvider,
    cfg: &PipelineConfig,
    roster: &[String],
) -> RosterFetch {
    let results: Vec<(String, Option<Vec<GameLogRow>>, Option<String>)> =
        with_fetch_pool(cfg.pool_size, || {
            roster
                .par_iter()
                .map(|name| match fetch_player_data(provider, cfg, name) {
                    Ok(Some(rows)) if !rows.is_empty() => (name.clone(), Some(rows), None),
                    Ok(_) => (
                        name.clone(),
                        None,
                        Some(format!("no data available for player: {name}")),
                    ),
                    Err(err) => (name.clone(), None, Some(format!("{name} fetch failed: {err}"))),
                })
                .collect()
        });

    let mut players = HashMap::with_capacity(results.len());
    let mut warnings = Vec::new();
    for (name, rows, warning) in results {
        if let Some(rows) = rows {
            players.insert(name, rows);
        }
        if let Some(warning) = warning {
            warnings.push(warning);
        }
    }

    RosterFetch { players, warnings }
}

fn with_fetch_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}
