use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{self, CONFIG_FILE, ENV_GEOCODER_URL, ENV_USER_AGENT};
use crate::error::ConfigError;

/// Run configuration. Every field has a default, so an absent `config.toml`
/// reproduces the stock run over the four listing exports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub cleaning: CleaningConfig,
    pub geocoding: GeocodingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub dir: PathBuf,
    /// Read in order; the first file carries the header row.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving one dataset per qualifying zone.
    pub dir: PathBuf,
    pub inventory: PathBuf,
    pub failure_report: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub region: String,
    pub min_zone_records: usize,
    pub partitions: PartitionCount,
    /// Worker threads; defaults to available parallelism minus one.
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub requests_per_min: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Abort the run on the first failed lookup instead of reporting it.
    pub fail_fast: bool,
}

/// Number of partitions the dataset is split into for cleaning.
///
/// Written as an integer or as `"auto"` in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPartitionCount")]
pub enum PartitionCount {
    Fixed(usize),
    Auto,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPartitionCount {
    Count(usize),
    Keyword(String),
}

impl TryFrom<RawPartitionCount> for PartitionCount {
    type Error = String;

    fn try_from(raw: RawPartitionCount) -> Result<Self, Self::Error> {
        match raw {
            RawPartitionCount::Count(0) => Err("partitions must be at least 1".to_string()),
            RawPartitionCount::Count(n) => Ok(PartitionCount::Fixed(n)),
            RawPartitionCount::Keyword(k) if k.eq_ignore_ascii_case("auto") => {
                Ok(PartitionCount::Auto)
            }
            RawPartitionCount::Keyword(k) => Err(format!(
                "partitions must be a positive integer or \"auto\", got \"{k}\""
            )),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::DEFAULT_INPUT_DIR),
            files: constants::default_input_files(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            inventory: PathBuf::from(constants::DEFAULT_INVENTORY_FILE),
            failure_report: PathBuf::from(constants::DEFAULT_FAILURE_REPORT_FILE),
        }
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            region: constants::DEFAULT_REGION.to_string(),
            min_zone_records: constants::DEFAULT_MIN_ZONE_RECORDS,
            partitions: PartitionCount::Fixed(constants::DEFAULT_PARTITIONS),
            workers: None,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: constants::DEFAULT_GEOCODER_URL.to_string(),
            user_agent: constants::DEFAULT_USER_AGENT.to_string(),
            timeout_secs: constants::DEFAULT_GEOCODER_TIMEOUT_SECS,
            requests_per_min: constants::DEFAULT_GEOCODER_REQUESTS_PER_MIN,
            max_retries: constants::DEFAULT_GEOCODER_MAX_RETRIES,
            retry_backoff_ms: constants::DEFAULT_GEOCODER_RETRY_BACKOFF_MS,
            fail_fast: false,
        }
    }
}

impl Config {
    /// Load the run configuration.
    ///
    /// With an explicit path the file must exist and relative paths resolve against
    /// its directory. Without one, `config.toml` next to the executable is used when
    /// present and relative paths resolve against the executable's directory.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (mut config, base_dir) = match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                let base = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                (config, base)
            }
            None => {
                let base = program_dir()?;
                let candidate = base.join(CONFIG_FILE);
                let config = if candidate.is_file() {
                    Self::from_file(&candidate)?
                } else {
                    Self::default()
                };
                (config, base)
            }
        };

        config.apply_env_overrides();
        config.resolve_paths(&base_dir);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_GEOCODER_URL) {
            if !url.trim().is_empty() {
                self.geocoding.endpoint = url;
            }
        }
        if let Ok(agent) = std::env::var(ENV_USER_AGENT) {
            if !agent.trim().is_empty() {
                self.geocoding.user_agent = agent;
            }
        }
    }

    /// Anchor every relative path at `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.input.dir,
            &mut self.output.dir,
            &mut self.output.inventory,
            &mut self.output.failure_report,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.files.is_empty() {
            return Err(ConfigError::Invalid("input.files must not be empty".into()));
        }
        if self.cleaning.min_zone_records == 0 {
            return Err(ConfigError::Invalid(
                "cleaning.min_zone_records must be at least 1".into(),
            ));
        }
        if self.cleaning.workers == Some(0) {
            return Err(ConfigError::Invalid("cleaning.workers must be at least 1".into()));
        }
        if self.geocoding.enabled && self.geocoding.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "geocoding.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Directory holding the running executable.
pub fn program_dir() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(ConfigError::ProgramDir)?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}
