//! Engine-level error taxonomy. HTTP status mapping lives here as a pure
//! function so the HTTP crate never has to re-derive it from scratch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueyError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("invalid queue name: {0}")]
    InvalidQueueName(String),

    #[error("invalid message id: {0}")]
    InvalidMessageId(String),

    #[error("invalid application key")]
    InvalidApplicationKey,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("storage unavailable")]
    StorageUnavailable(#[source] anyhow::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

impl QueueyError {
    /// HTTP status for this error kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidParameter(_) => 400,
            Self::InvalidUpdate(_) => 400,
            Self::InvalidQueueName(_) => 404,
            Self::InvalidMessageId(_) => 400,
            Self::InvalidApplicationKey => 401,
            Self::AccessDenied(_) => 403,
            Self::StorageUnavailable(_) => 500,
            Self::NotFound(_) => 404,
        }
    }

    /// The `error_msg` envelope key for this kind, e.g. `InvalidParameter`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "InvalidParameter",
            Self::InvalidUpdate(_) => "InvalidUpdate",
            Self::InvalidQueueName(_) => "InvalidQueueName",
            Self::InvalidMessageId(_) => "InvalidMessageId",
            Self::InvalidApplicationKey => "InvalidApplicationKey",
            Self::AccessDenied(_) => "AccessDenied",
            Self::StorageUnavailable(_) => "StorageUnavailable",
            Self::NotFound(_) => "NotFound",
        }
    }

    /// Advisory client-facing message; `storage-unavailable` carries a
    /// retry hint since omitting `include_count` avoids the extra read.
    pub fn client_message(&self) -> String {
        match self {
            Self::StorageUnavailable(_) => {
                "Back-end storage unavailable. If this is a queue request \
                 that includes counts, try omitting include_count."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}
