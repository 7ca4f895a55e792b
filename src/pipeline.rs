use anyhow::{Context, Result, bail};

use crate::config::PipelineConfig;
use crate::features::engineer;
use crate::gamelog::fetch_player_data;
use crate::report::{Report, summarize};
use crate::stats_api::StatsProvider;
use crate::train::train;

/// The one call the presentation layer makes: fetch a player's recent
/// seasons, engineer features, train and select a model, package the
/// report.
pub fn analyze_player(
    provider: &dyn StatsProvider,
    cfg: &PipelineConfig,
    player_name: &str,
) -> Result<Report> {
    let rows = fetch_player_data(provider, cfg, player_name)
        .with_context(|| format!("fetching game logs for {player_name}"))?;
    let Some(rows) = rows else {
        bail!("no game log data found for {player_name}");
    };

    let table = engineer(&rows, &cfg.rolling_windows)
        .with_context(|| format!("engineering features for {player_name}"))?;
    let (x, _) = table.model_matrix();
    let y = table.target();
    let outcome =
        train(x.view(), &y, cfg).with_context(|| format!("training models for {player_name}"))?;

    Ok(summarize(&table, &outcome))
}
