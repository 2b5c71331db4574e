use cascade_resolver::CascadeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HttpLookupError>;

#[derive(Error, Debug)]
pub enum HttpLookupError {
    #[error("Failed to build HTTP client: {0}")]
    ClientError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] CascadeError),
}
