//! Errors surfaced by a search call.
//!
//! Any failure aborts the whole call: there is no partial result. The
//! [`ErrorKind`] is the stable, serializable classification callers branch
//! on; the [`ErrorCode`] adds the operator-facing `E####` code and hint.

use std::time::Duration;

use runway_core::error::ErrorCode;
use runway_core::model::airport::InvalidAirport;
use runway_core::model::embedding::EmbeddingError;
use serde::Serialize;

use crate::semantic::EmbedError;

/// Stable classification of a failed search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmbeddingFailure,
    StoreFailure,
    Timeout,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmbeddingFailure => "embedding_failure",
            Self::StoreFailure => "store_failure",
            Self::Timeout => "timeout",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("catalog query failed: {message}")]
    Store { message: String, corrupt: bool },

    #[error("search exceeded its {} ms deadline", .budget.as_millis())]
    Timeout { budget: Duration },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Serializable form of a [`SearchError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl SearchError {
    /// Classify a store failure. A record that fails validation anywhere in
    /// the error chain marks the catalog as corrupt.
    #[must_use]
    pub fn store(err: &anyhow::Error) -> Self {
        let corrupt = err.chain().any(|cause| {
            cause.downcast_ref::<InvalidAirport>().is_some()
                || cause.downcast_ref::<EmbeddingError>().is_some()
        });
        Self::Store {
            message: format!("{err:#}"),
            corrupt,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Embedding(_) => ErrorKind::EmbeddingFailure,
            Self::Store { .. } => ErrorKind::StoreFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Embedding(_) => ErrorCode::EmbeddingFailed,
            Self::Store { corrupt: true, .. } => ErrorCode::CorruptCatalog,
            Self::Store { corrupt: false, .. } => ErrorCode::CatalogQueryFailed,
            Self::Timeout { .. } => ErrorCode::SearchTimeout,
            Self::InvalidInput(_) => ErrorCode::InvalidSearchSettings,
            Self::Internal(_) => ErrorCode::InternalUnexpected,
        }
    }

    #[must_use]
    pub fn report(&self) -> ErrorReport {
        let code = self.code();
        ErrorReport {
            kind: self.kind(),
            code: code.code(),
            message: self.to_string(),
            hint: code.hint(),
        }
    }
}

impl From<EmbedError> for SearchError {
    fn from(err: EmbedError) -> Self {
        Self::Embedding(err.to_string())
    }
}
