//! Gateway error type and its HTTP mapping

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::io;

use crate::types::FileHash;

/// Errors surfaced by the retrieval pipeline, the track store and collaborators
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("the file {0} is being retrieved from the storage network, please try again later")]
    DuplicateRequest(FileHash),

    #[error("metadata unavailable for {fid}: {reason}")]
    MetadataUnavailable { fid: FileHash, reason: String },

    #[error("fragment {hash} unavailable: {reason}")]
    FragmentUnavailable { hash: FileHash, reason: String },

    #[error("reconstruction failed: {0}")]
    ReconstructionFailure(String),

    #[error("decrypt failed: {0}")]
    DecryptFailure(String),

    #[error("invalid key: expected {expected} characters, got {got}")]
    InvalidKey { expected: usize, got: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed record: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Wrap an IO error with the operation that produced it
    pub fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> GatewayError {
        let context = context.into();
        move |source| GatewayError::Io { context, source }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidKey { .. } => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) | GatewayError::MetadataUnavailable { .. } => StatusCode::NOT_FOUND,
            GatewayError::DuplicateRequest(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}
