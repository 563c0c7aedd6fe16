use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::{SearchError, SearchResult};

/// Runtime configuration for a [`SearchCoordinator`](crate::search::SearchCoordinator).
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations, later entries
/// overriding earlier ones:
/// 1. Global `$HOME/.config/keyscout/config.yaml`
/// 2. Local `.keyscout.yaml` in the current directory
/// 3. Custom config file specified via `--config` flag
///
/// # Configuration Format
///
/// ```yaml
/// # Pooled worker threads used to run searches (default: CPU cores)
/// thread_count: 4
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
///
/// # Result limit used when the caller does not pass one
/// max_results: 50
/// ```
///
/// The debounce delay is not configurable; see
/// [`DEBOUNCE_DELAY`](crate::search::DEBOUNCE_DELAY).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Number of pooled worker threads executing searches. A search
    /// dispatched while all of them are busy runs on a thread of its own.
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Default result limit
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_max_results() -> usize {
    50
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            log_level: default_log_level(),
            max_results: default_max_results(),
        }
    }
}

impl CoordinatorConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(SearchError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("keyscout/config.yaml")),
            Some(PathBuf::from(".keyscout.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that deserialize fine but cannot drive a coordinator
    pub fn validate(&self) -> SearchResult<()> {
        if self.max_results == 0 {
            return Err(SearchError::config_error("max_results must be at least 1"));
        }
        Ok(())
    }

    /// Merges CLI arguments with configuration file values.
    /// Only options the user actually passed take precedence.
    pub fn merge_with_cli(
        mut self,
        thread_count: Option<NonZeroUsize>,
        log_level: Option<String>,
        max_results: Option<usize>,
    ) -> Self {
        if let Some(threads) = thread_count {
            self.thread_count = threads;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
        if let Some(max) = max_results {
            self.max_results = max;
        }
        self
    }
}
