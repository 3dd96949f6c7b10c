use thiserror::Error;

use crate::domain::FailureKind;

/// Failure of a single call against the remote poem service.
///
/// The detail strings are for logs; presentation only ever sees [`FailureKind::user_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("poem service unavailable during {op}: {detail}")]
    Unavailable { op: &'static str, detail: String },
    #[error("poem service rejected {op} with status {status}: {detail}")]
    Rejected {
        op: &'static str,
        status: u16,
        detail: String,
    },
}

impl ServiceError {
    pub fn unavailable(op: &'static str, detail: impl Into<String>) -> Self {
        Self::Unavailable {
            op,
            detail: detail.into(),
        }
    }

    pub fn rejected(op: &'static str, status: u16, detail: impl Into<String>) -> Self {
        Self::Rejected {
            op,
            status,
            detail: detail.into(),
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            ServiceError::Unavailable { op, .. } | ServiceError::Rejected { op, .. } => op,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ServiceError::Unavailable { .. } => FailureKind::Unavailable,
            ServiceError::Rejected { .. } => FailureKind::Rejected,
        }
    }
}
