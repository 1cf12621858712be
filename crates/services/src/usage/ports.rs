use async_trait::async_trait;
use std::fmt;

use crate::profile::UsageKind;
use crate::UserId;

/// Outcome of a usage increment: the kind that was charged and the new
/// authoritative count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageReceipt {
    pub kind: UsageKind,
    pub count: i64,
}

/// Errors that can occur during usage accounting
#[derive(Debug)]
pub enum UsageError {
    /// Database error
    DatabaseError(String),
    /// Internal error
    InternalError(String),
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for UsageError {}

impl From<anyhow::Error> for UsageError {
    fn from(err: anyhow::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

/// Service trait for usage accounting
#[async_trait]
pub trait UsageService: Send + Sync {
    /// Atomically charge one unit of `kind` against the user's profile,
    /// creating the profile row if it does not exist yet.
    async fn increment(
        &self,
        user_id: UserId,
        email: &str,
        kind: UsageKind,
    ) -> Result<UsageReceipt, UsageError>;
}
