use thiserror::Error;

/// Failures surfaced at an operation boundary. Each leaves the previous
/// state authoritative.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("no melody found in input")]
    InputMissing,

    #[error("analysis service failed: {0}")]
    OracleFailure(String),

    #[error("corpus store failed: {0}")]
    StoreFailure(String),

    #[error("invalid file: {0}")]
    FormatError(String),

    #[error("invalid tempo: {0} bpm")]
    InvalidTempo(f64),
}

impl From<serde_json::Error> for MapError {
    fn from(e: serde_json::Error) -> Self {
        MapError::FormatError(e.to_string())
    }
}

impl From<midly::Error> for MapError {
    fn from(e: midly::Error) -> Self {
        MapError::FormatError(format!("MIDI: {}", e))
    }
}
