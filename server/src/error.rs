//! Error types for the FlagSearch front end.

use flagsearch_core::SearchError;
use thiserror::Error;

use crate::rpc::protocol::JsonRpcError;

/// Errors that can occur in the CLI or the stdio server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Short machine-readable name of a search error, sent as JSON-RPC error data.
pub fn error_kind(err: &SearchError) -> &'static str {
    match err {
        SearchError::Load(_) => "load",
        SearchError::Io { .. } => "io",
        SearchError::Csv { .. } => "csv",
        SearchError::Dimension { .. } => "dimension",
        SearchError::UnknownIdentity(_) => "unknown_identity",
        SearchError::UnknownTerritory { .. } => "unknown_territory",
        SearchError::InvalidMethod(_) => "invalid_method",
    }
}

impl From<SearchError> for JsonRpcError {
    fn from(err: SearchError) -> Self {
        let data = Some(serde_json::json!({ "kind": error_kind(&err) }));
        let mut rpc_error = if err.is_query_error() {
            JsonRpcError::invalid_params(err.to_string())
        } else {
            JsonRpcError::internal_error(err.to_string())
        };
        rpc_error.data = data;
        rpc_error
    }
}

/// Result type alias for front end operations.
pub type ServerResult<T> = Result<T, ServerError>;
