use std::env;
use std::time::Duration;

pub const SEASON_CURRENT: &str = "2024-25";
pub const SEASON_PREVIOUS: &str = "2023-24";

/// Knobs consumed by the fetch/feature/training pipeline. Everything here
/// can be overridden from the environment; parse failures fall back to the
/// defaults below.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Seasons to query, in fetch order.
    pub seasons: Vec<String>,
    pub cache_ttl: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
    pub pool_size: usize,
    pub rolling_windows: Vec<usize>,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seasons: vec![SEASON_CURRENT.to_string(), SEASON_PREVIOUS.to_string()],
            cache_ttl: Duration::from_secs(3600),
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
            request_timeout: Duration::from_secs(60),
            pool_size: 10,
            rolling_windows: vec![3, 5, 10],
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            seasons: env::var("SEASONS")
                .ok()
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.seasons),
            cache_ttl: duration_env("CACHE_TTL_SECS", defaults.cache_ttl),
            max_retries: parsed_env("MAX_FETCH_RETRIES", defaults.max_retries).clamp(1, 10),
            retry_backoff: duration_env("FETCH_BACKOFF_SECS", defaults.retry_backoff),
            request_timeout: duration_env("REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            pool_size: parsed_env("FETCH_PARALLELISM", defaults.pool_size).clamp(2, 32),
            rolling_windows: env::var("ROLLING_WINDOWS")
                .ok()
                .map(|raw| {
                    raw.split(',')
                        .filter_map(|s| s.trim().parse::<usize>().ok())
                        .filter(|w| *w >= 1)
                        .collect::<Vec<_>>()
                })
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.rolling_windows),
            test_fraction: env::var("TEST_FRACTION")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(defaults.test_fraction)
                .clamp(0.05, 0.5),
            seed: parsed_env("MODEL_SEED", defaults.seed),
        }
    }
}

fn parsed_env<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    env::var(name)
        .ok()
        .and_then(|val| val.parse::<T>().ok())
        .unwrap_or(fallback)
}

fn duration_env(name: &str, fallback: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_knobs() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.seasons, vec![SEASON_CURRENT, SEASON_PREVIOUS]);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_backoff, Duration::from_secs(2));
        assert_eq!(cfg.pool_size, 10);
        assert_eq!(cfg.rolling_windows, vec![3, 5, 10]);
        assert_eq!(cfg.test_fraction, 0.2);
    }
}
