//! Discovery tuning: result sizes, timeouts, backfill pacing and
//! recommendation windows.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ShelfmarkError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    /// Requests above this are clamped, not rejected.
    pub max_limit: usize,
    /// Budget for the whole semantic attempt; expiry falls back to keywords.
    pub query_timeout_ms: u64,
    /// How long a search waits for its best-effort backfill. A run still going
    /// after this keeps working in the background.
    pub backfill_wait_ms: u64,
    pub semantic_enabled: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 6,
            max_limit: 50,
            query_timeout_ms: 10_000,
            backfill_wait_ms: 2_000,
            semantic_enabled: true,
        }
    }
}

impl SearchConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn backfill_wait(&self) -> Duration {
        Duration::from_millis(self.backfill_wait_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    pub batch_size: usize,
    /// Minimum spacing between best-effort runs triggered by searches.
    pub min_interval_ms: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            min_interval_ms: 0,
        }
    }
}

impl BackfillConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub default_limit: usize,
    /// Most recent interactions used to derive preferences.
    pub history_window: usize,
    /// Reviews needed before a book qualifies as top rated.
    pub min_review_count: u32,
    pub similar_default_limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            history_window: 20,
            min_review_count: 3,
            similar_default_limit: 5,
        }
    }
}

/// All discovery settings.
///
/// Loaded from `{data_path}/discovery.toml` or the `SHELFMARK_DISCOVERY`
/// env var (JSON); missing sections and fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub search: SearchConfig,
    pub backfill: BackfillConfig,
    pub recommend: RecommendConfig,
}

impl DiscoveryConfig {
    /// Reject settings no request could satisfy.
    pub fn validate(&self) -> Result<(), ShelfmarkError> {
        if self.search.max_limit == 0 {
            return Err(ShelfmarkError::Config("search.max_limit must be positive".into()));
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(ShelfmarkError::Config(format!(
                "search.default_limit must be between 1 and {}",
                self.search.max_limit
            )));
        }
        if self.backfill.batch_size == 0 {
            return Err(ShelfmarkError::Config("backfill.batch_size must be positive".into()));
        }
        if self.recommend.default_limit == 0 || self.recommend.similar_default_limit == 0 {
            return Err(ShelfmarkError::Config(
                "recommendation limits must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Parse `path` as TOML. `Ok(None)` when the file does not exist.
pub(crate) fn read_toml_file<T>(path: &Path) -> Result<Option<T>, ShelfmarkError>
where
    T: DeserializeOwned,
{
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let value = toml::from_str(&contents)
        .map_err(|e| ShelfmarkError::Config(format!("{}: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(Some(value))
}

/// Load discovery config with priority:
/// 1. `{data_path}/discovery.toml` file
/// 2. `SHELFMARK_DISCOVERY` env var (JSON)
/// 3. Defaults
///
/// A present but unparsable source is an error.
pub fn load_discovery_config(data_path: &Path) -> Result<DiscoveryConfig, ShelfmarkError> {
    let from_file = read_toml_file::<DiscoveryConfig>(&data_path.join("discovery.toml"))?;
    let config = match from_file {
        Some(config) => config,
        None => match std::env::var("SHELFMARK_DISCOVERY") {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| ShelfmarkError::Config(format!("SHELFMARK_DISCOVERY: {}", e)))?,
            Err(_) => DiscoveryConfig::default(),
        },
    };

    config.validate()?;
    Ok(config)
}

/// Resolve the data directory:
/// explicit path (flag or `SHELFMARK_DATA_PATH`) → `./.shelfmark` if present → `~/.shelfmark`.
pub fn resolve_data_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    let local = PathBuf::from(".shelfmark");
    if local.is_dir() {
        return local;
    }
    dirs::home_dir()
        .map(|home| home.join(".shelfmark"))
        .unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.search.default_limit, 6);
        assert_eq!(config.search.max_limit, 50);
        assert_eq!(config.backfill.batch_size, 200);
        assert_eq!(config.recommend.history_window, 20);
        assert_eq!(config.recommend.min_review_count, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("discovery.toml"),
            "[search]\nmax_limit = 20\n\n[backfill]\nmin_interval_ms = 500\n",
        )
        .unwrap();

        let config = load_discovery_config(dir.path()).unwrap();
        assert_eq!(config.search.max_limit, 20);
        assert_eq!(config.search.default_limit, 6);
        assert_eq!(config.backfill.min_interval(), Duration::from_millis(500));
        assert_eq!(config.recommend, RecommendConfig::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("discovery.toml"), "[search]\nmax_limit = 0\n").unwrap();
        assert!(matches!(
            load_discovery_config(dir.path()),
            Err(ShelfmarkError::Config(_))
        ));
    }

    #[test]
    fn test_explicit_data_path_wins() {
        let path = PathBuf::from("/tmp/shelfmark-test");
        assert_eq!(resolve_data_path(Some(path.clone())), path);
    }
}
