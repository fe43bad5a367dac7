//! Pipeline configuration stored in `crash_map.toml`.

use std::path::{Path, PathBuf};

use crash_map_source::crash_csv::CrashCsvLayout;
use serde::{Deserialize, Serialize};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "crash_map.toml";

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV_VAR: &str = "CRASH_MAP_CONFIG";

/// Errors that can occur while reading or writing the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Filesystem error.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Invalid TOML.
    #[error("Invalid config {path}: {source}")]
    Parse {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// The configuration could not be encoded.
    #[error("Failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Inputs, outputs and options for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw crash CSV export.
    pub crash_csv: PathBuf,
    /// Street centerline `GeoJSON` layer.
    pub centerlines: PathBuf,
    /// Intersection `GeoJSON` layer.
    pub intersections: PathBuf,
    /// Directory receiving CSV and JSON outputs.
    pub output_dir: PathBuf,
    /// `DuckDB` file the road table is loaded into.
    pub duckdb_path: PathBuf,
    /// Keep only segments in this municipality (matched case-insensitively
    /// against `munileft` / `muniright`).
    pub municipality: Option<String>,
    /// Only join same-named segments that also share a classification.
    pub split_on_classification: bool,
    /// Column layout of the crash CSV.
    pub crash_layout: CrashCsvLayout,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let data = crash_map_database::paths::data_dir();
        Self {
            crash_csv: data.join("crashes.csv"),
            centerlines: data.join("centerlines.geojson"),
            intersections: data.join("intersections.geojson"),
            output_dir: crash_map_database::paths::output_dir(),
            duckdb_path: crash_map_database::paths::roads_db_path(),
            municipality: None,
            split_on_classification: true,
            crash_layout: CrashCsvLayout::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolves the configuration file path: an explicit path wins, then
    /// [`CONFIG_ENV_VAR`], then [`DEFAULT_CONFIG_FILE`].
    #[must_use]
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(
            || {
                std::env::var_os(CONFIG_ENV_VAR)
                    .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
            },
            Path::to_path_buf,
        )
    }

    /// Loads the configuration at `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::warn!(
                "No config at {}, using defaults (run `setup` to create one)",
                path.display()
            );
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text is invalid.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Writes the configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if encoding or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Saved config to {}", path.display());
        Ok(())
    }
}
