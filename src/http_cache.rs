use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "hoopcast";
const CACHE_FILE: &str = "stats_cache.json";

static CACHE: Mutex<Option<StatsCacheFile>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StatsCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    fetched_at: u64,
}

/// Serve `key` from the cache while the stored entry is younger than `ttl`,
/// otherwise run `fetch` and store its result. The upstream mutates at most
/// daily during a season, so repeated lookups within the TTL window must not
/// issue a new request.
pub fn fetch_cached<F>(key: &str, ttl: Duration, fetch: F) -> Result<String, FetchError>
where
    F: FnOnce() -> Result<String, FetchError>,
{
    let now = system_time_to_secs(SystemTime::now()).unwrap_or_default();
    let cached = {
        let mut guard = CACHE.lock().expect("stats cache lock poisoned");
        let cache = guard.get_or_insert_with(load_cache_file);
        cache.entries.get(key).cloned()
    };
    if let Some(entry) = cached
        && now.saturating_sub(entry.fetched_at) < ttl.as_secs()
    {
        return Ok(entry.body);
    }

    let body = fetch()?;
    refresh_cache_entry(
        key,
        CacheEntry {
            body: body.clone(),
            fetched_at: now,
        },
    );
    Ok(body)
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn refresh_cache_entry(key: &str, entry: CacheEntry) {
    let mut guard = CACHE.lock().expect("stats cache lock poisoned");
    let cache = guard.get_or_insert_with(load_cache_file);
    cache.version = CACHE_VERSION;
    cache.entries.insert(key.to_string(), entry);
    let _ = save_cache_file(cache);
}

fn load_cache_file() -> StatsCacheFile {
    let Some(path) = cache_path() else {
        return StatsCacheFile::default();
    };
    let raw = fs::read_to_string(path).ok();
    let Some(raw) = raw else {
        return StatsCacheFile::default();
    };
    let cache = serde_json::from_str::<StatsCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return StatsCacheFile::default();
    }
    cache
}

fn save_cache_file(cache: &StatsCacheFile) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir).ok();
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize stats cache")?;
    fs::write(&tmp, json).context("write stats cache")?;
    fs::rename(&tmp, &path).context("swap stats cache")?;
    Ok(())
}

fn cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Keys carry a timestamp so entries persisted by an earlier test run
    // can never satisfy this run's lookups.
    fn unique_key(tag: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!("test://cache/{tag}/{nanos}")
    }

    #[test]
    fn repeated_fetch_within_ttl_hits_cache() {
        let key = unique_key("idempotent");
        let ttl = Duration::from_secs(3600);
        let calls = AtomicUsize::new(0);

        let first = fetch_cached(&key, ttl, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("body".to_string())
        })
        .unwrap();
        let second = fetch_cached(&key, ttl, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("fresh".to_string())
        })
        .unwrap();

        assert_eq!(first, "body");
        assert_eq!(second, "body");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_ttl_always_refetches() {
        let key = unique_key("expired");
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            fetch_cached(&key, Duration::ZERO, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("body".to_string())
            })
            .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fetch_errors_are_not_cached() {
        let key = unique_key("error");
        let err = fetch_cached(&key, Duration::from_secs(60), || {
            Err(FetchError::Transient("boom".into()))
        });
        assert!(err.is_err());
        let ok = fetch_cached(&key, Duration::from_secs(60), || Ok("later".to_string()));
        assert_eq!(ok.unwrap(), "later");
    }
}
