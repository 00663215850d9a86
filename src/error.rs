//! Crate-wide error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TwinError {
    #[error("invalid argument in {component}: {detail}")]
    InvalidArgument { component: &'static str, detail: String },

    #[error("numeric error in {component}: {detail}")]
    NumericError { component: &'static str, detail: String },

    #[error("corrupt timeseries header: {0}")]
    CorruptHeader(String),

    #[error("truncated record header at byte offset {offset}")]
    TruncatedHeader { offset: usize },

    #[error("truncated payload for type={type_id} at byte offset {offset}: need {need}, have {have}")]
    TruncatedPayload {
        type_id: u16,
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("payload length mismatch for {name} (type={type_id}): got {got}, expected {expected}")]
    PayloadLengthMismatch {
        name: &'static str,
        type_id: u16,
        got: usize,
        expected: usize,
    },

    #[error("incompatible dataset: {0}")]
    IncompatibleDataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TwinError {
    pub fn invalid_argument(component: &'static str, detail: impl Into<String>) -> Self {
        TwinError::InvalidArgument {
            component,
            detail: detail.into(),
        }
    }

    pub fn numeric(component: &'static str, detail: impl Into<String>) -> Self {
        TwinError::NumericError {
            component,
            detail: detail.into(),
        }
    }
}
