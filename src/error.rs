//! Error taxonomy for the fingerprinting core (spec §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MusicaError {
    /// Decoding failed for a single file during ingestion. Never aborts a
    /// batch — the ingestor logs and continues.
    #[error("failed to decode audio file {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// The persistence layer could not be opened or a query failed.
    /// Resource failures of this kind abort the containing session.
    #[error("fingerprint store unavailable: {0}")]
    Store(#[from] diesel::result::Error),

    #[error("failed to establish store connection: {0}")]
    StoreConnection(#[from] diesel::ConnectionError),

    #[error("failed to acquire store connection from pool: {0}")]
    StorePool(#[from] diesel::r2d2::PoolError),

    #[error("malformed binary audio frame: {0}")]
    ProtocolViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MusicaError {
    /// Human-readable message surfaced at JSON boundaries (WS `error`
    /// events, REST error bodies). Never includes a stack trace, per spec.
    pub fn status_message(&self) -> String {
        self.to_string()
    }
}

pub type MusicaResult<T> = Result<T, MusicaError>;
