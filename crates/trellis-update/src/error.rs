use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Update service returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Failed to download update from {url}: HTTP {status}")]
    Download { url: String, status: u16 },

    #[error("Download from {0} declared no content length")]
    MissingLength(String),

    #[error("Downloaded {actual} bytes, expected {expected}")]
    IntegrityMismatch { expected: u64, actual: u64 },

    #[error("Archive entry '{0}' escapes the staging directory")]
    PathTraversal(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Supervisor script {script} failed: {message}")]
    Supervisor { script: String, message: String },

    #[error("Expected a single file in {0}")]
    AmbiguousSource(String),

    #[error("Update service is not configured")]
    NotConfigured,

    #[error("Config error: {0}")]
    Config(#[from] trellis_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for UpdateError {
    fn from(e: reqwest::Error) -> Self {
        UpdateError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UpdateError>;
