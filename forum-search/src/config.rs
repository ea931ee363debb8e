use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::Deserialize;
use serde_with::serde_as;
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub search: SearchSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct SearchSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub max_results: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub concurrency_limit: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub results_per_page: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub search_timeout_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub archived_batch_size: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub progress_interval_ms: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub max_retries: u32,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub max_retry_wait_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub archive_retry_limit: u32,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub archive_retry_backoff_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub history_length: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub session_max_age_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub session_sweep_interval_secs: u64,
}

impl SearchSettings {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn max_retry_wait(&self) -> Duration {
        Duration::from_secs(self.max_retry_wait_secs)
    }

    pub fn archive_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.archive_retry_backoff_secs)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct CacheSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub ttl_secs: u64,
    /// Capacity of the general-purpose cache
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub max_items: usize,
    /// Capacity of the per-thread statistics cache
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub thread_cache_size: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub cleanup_interval_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub reconnect_cooldown_secs: u64,
    pub key_prefix: String,
    /// Shared second-level cache; local only when absent
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub redis_pool_size: u32,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_secs(self.reconnect_cooldown_secs)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct LoggingSettings {
    /// Default `tracing` filter directive, overridden by `RUST_LOG`
    pub level: String,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("unknown environment `{0}`")]
    UnknownEnvironment(String),
    #[error("failed to determine the config directory: {0}")]
    Directory(#[from] std::io::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Settings {
    /// Reject values the search and cache layers cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            ("search.max_results", self.search.max_results as u64),
            ("search.concurrency_limit", self.search.concurrency_limit as u64),
            ("search.results_per_page", self.search.results_per_page as u64),
            ("search.search_timeout_secs", self.search.search_timeout_secs),
            ("search.archived_batch_size", self.search.archived_batch_size as u64),
            (
                "search.session_sweep_interval_secs",
                self.search.session_sweep_interval_secs,
            ),
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("cache.max_items", self.cache.max_items as u64),
            ("cache.thread_cache_size", self.cache.thread_cache_size as u64),
            ("cache.cleanup_interval_secs", self.cache.cleanup_interval_secs),
            ("cache.redis_pool_size", u64::from(self.cache.redis_pool_size)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(SettingsError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if let Some(url) = &self.cache.redis_url {
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return Err(SettingsError::Invalid {
                    field: "cache.redis_url",
                    reason: format!("`{url}` is not a redis:// URL"),
                });
            }
        }

        Ok(())
    }
}

/// Read settings for the environment named by `APP_ENVIRONMENT`.
///
/// Looks in `FORUM_SEARCH_CONFIG_DIR`, falling back to `./config`.
pub fn read_config() -> Result<Settings, SettingsError> {
    let config_directory = match std::env::var("FORUM_SEARCH_CONFIG_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir()?.join("config"),
    };

    let environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| Environment::Default.to_string());
    let environment = Environment::from_str(&environment)
        .map_err(|_| SettingsError::UnknownEnvironment(environment))?;

    read_config_from(&config_directory, environment)
}

/// Layer `base.yaml`, `<environment>.yaml` and `FORUM_SEARCH__*` variables.
pub fn read_config_from(
    config_directory: &Path,
    environment: Environment,
) -> Result<Settings, SettingsError> {
    let environment_filename = format!("{}.yaml", environment);

    let settings = config::Config::builder()
        .add_source(config::File::from(config_directory.join("base.yaml")))
        .add_source(config::File::from(
            config_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("FORUM_SEARCH")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter)]
pub enum Environment {
    #[strum(ascii_case_insensitive, serialize = "default")]
    Default,
    #[strum(ascii_case_insensitive, serialize = "large_server")]
    LargeServer,
    #[strum(ascii_case_insensitive, serialize = "development")]
    Development,
    #[strum(ascii_case_insensitive, serialize = "production")]
    Production,
}
