use crate::connection::{SocketState, TransportError};
use shared::ShapeError;

#[derive(Debug, thiserror::Error)]
pub enum ToolkitError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("cannot move through an empty collection")]
    EmptyCollection,
    #[error("no id left after {last}")]
    IdExhausted { last: u64 },
    #[error("socket is not open (state: {state})")]
    NotConnected { state: SocketState },
    #[error("invalid socket endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("socket transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("failed to encode socket message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type ToolkitResult<T> = Result<T, ToolkitError>;
