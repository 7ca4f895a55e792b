use std::env;

use anyhow::{Context, Result, bail};

use hoopcast::config::PipelineConfig;
use hoopcast::fake_source::FakeSource;
use hoopcast::pipeline::analyze_player;
use hoopcast::roster::fetch_all_players;
use hoopcast::stats_api::{NbaStats, StatsProvider, resolve_team};

// Thin demo runner: resolve a team, optionally analyze one player (or the
// whole roster), and print the structured result as JSON for whatever
// frontend wants to render it.
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cfg = PipelineConfig::from_env();
    let mut args = env::args().skip(1);
    let team_abbr = args.next().unwrap_or_else(|| "BOS".to_string());
    let player_name = args.collect::<Vec<_>>().join(" ");

    let provider: Box<dyn StatsProvider> = if use_fake_source() {
        Box::new(FakeSource::seeded(1))
    } else {
        Box::new(NbaStats::new(&cfg))
    };

    let Some(team) = resolve_team(&team_abbr) else {
        bail!("unknown team abbreviation '{team_abbr}'");
    };
    let season = cfg.seasons.first().map(String::as_str).unwrap_or_default();
    let roster = provider
        .team_roster(team.id, season)
        .with_context(|| format!("fetching roster for {}", team.name))?;
    if roster.is_empty() {
        bail!("no roster data available for {}", team.name);
    }

    if player_name.is_empty() {
        let batch = fetch_all_players(provider.as_ref(), &cfg, &roster);
        for warning in &batch.warnings {
            eprintln!("warning: {warning}");
        }
        let mut summary: Vec<(String, usize)> = batch
            .players
            .iter()
            .map(|(name, rows)| (name.clone(), rows.len()))
            .collect();
        summary.sort();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let report = analyze_player(provider.as_ref(), &cfg, &player_name)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn use_fake_source() -> bool {
    env::var("DATA_SOURCE")
        .map(|v| v.eq_ignore_ascii_case("fake"))
        .unwrap_or(false)
}
