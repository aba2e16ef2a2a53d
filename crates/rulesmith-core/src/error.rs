use thiserror::Error;

#[derive(Error, Debug)]
pub enum RulesmithError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Failed to get rules: {0}")]
    Fetch(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, RulesmithError>;
