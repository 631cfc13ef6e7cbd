use sled::transaction::TransactionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DinoError>;

#[derive(Error, Debug)]
pub enum DinoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("membership store error: {0}")]
    Store(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Only dotted-quad IPv4 addresses are swept.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The discovery service did not answer the way the request expected.
    #[error("discovery service answered HTTP {status}: {payload}")]
    Service { status: u16, payload: String },
}

impl From<TransactionError<DinoError>> for DinoError {
    fn from(e: TransactionError<DinoError>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => DinoError::Store(inner),
        }
    }
}
