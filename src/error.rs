use std::path::PathBuf;
use thiserror::Error;

/// Failure to coerce one raw field into its typed value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("invalid currency value '{0}'")]
    Currency(String),

    #[error("invalid count value '{0}'")]
    Count(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("row {row}, column '{column}': {source}")]
pub struct CleanError {
    pub row: usize,
    pub column: String,
    #[source]
    pub source: NormalizeError,
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no input files configured")]
    NoInputs,

    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} has no header row", .0.display())]
    EmptySchema(PathBuf),

    #[error("{} line {line}: expected {expected} columns, found {found}", file.display())]
    SchemaMismatch {
        file: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("required column '{0}' is missing from the input schema")]
    MissingColumn(String),
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("geocoding service unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("geocoding service rate limited the request")]
    RateLimited,

    #[error("geocoding service returned HTTP {0}")]
    Status(u16),

    #[error("failed to decode geocoding response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("geocoding response has no postcode")]
    MissingPostcode,

    #[error("invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: String, longitude: String },
}

impl GeocodeError {
    /// Network and throttling failures can succeed on a later attempt; the rest cannot.
    pub fn is_retryable(&self) -> bool {
        match self {
            GeocodeError::Unreachable(_) | GeocodeError::RateLimited => true,
            GeocodeError::Status(status) => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
#[error("geocoding failed for row {row}: {source}")]
pub struct EnrichError {
    pub row: usize,
    #[source]
    pub source: GeocodeError,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("partition cleaning failed: {0}")]
    Clean(#[from] CleanError),

    #[error("cleaning task did not complete: {0}")]
    Join(String),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize zone {zone}: {source}")]
    Json {
        zone: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write report {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cannot locate the program directory: {0}")]
    ProgramDir(#[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level failure of a run, one variant per stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("enrichment failed: {0}")]
    Enrichment(#[from] EnrichError),

    #[error("cleaning failed: {0}")]
    Worker(#[from] WorkerError),

    #[error("output failed: {0}")]
    Output(#[from] OutputError),
}

impl PipelineError {
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Config(_) => 2,
            PipelineError::Load(_) => 3,
            PipelineError::Enrichment(_) => 4,
            PipelineError::Worker(_) => 5,
            PipelineError::Output(_) => 6,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
