//! server::error
//!
//! Client-visible outcome of a failed request.
//!
//! # Invariants
//!
//! - A response never carries detail: no body, no storage paths
//! - Every `Internal` outcome is logged with its context by the handler
//!   that produces it

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Outcome of a request that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Unconfigured coordinate, unparsable or missing version, or a tree id
    /// that does not match the requested version.
    #[error("not found")]
    NotFound,

    /// The store could not be read. Details are in the server log.
    #[error("internal error")]
    Internal,
}

impl RegistryError {
    pub fn status(self) -> StatusCode {
        match self {
            RegistryError::NotFound => StatusCode::NOT_FOUND,
            RegistryError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}
