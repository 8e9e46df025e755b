//! Error types for zwrot-core.

use thiserror::Error;

/// Failure to load the invoice collection.
///
/// Blocks the wizard: no step content is rendered while the store
/// holds a load error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The data file or URL could not be read.
    #[error("Nie udalo sie zaladowac danych: {0}")]
    Unavailable(String),

    /// The payload was read but is not a valid invoice list.
    #[error("Niepoprawny format danych: {0}")]
    Malformed(String),
}

/// Errors talking to the local helper process.
#[derive(Error, Debug)]
pub enum HelperError {
    /// Connection refused, timeout, or any other HTTP-level failure.
    #[error("helper transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The helper answered with a body that is not the expected JSON.
    #[error("unexpected helper response: {0}")]
    Decode(String),

    /// No answer within the wizard's request timeout.
    #[error("helper did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Invalid configuration value.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Unknown wizard step token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown wizard step: {0}")]
pub struct StepParseError(pub String);
