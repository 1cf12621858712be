use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::{SessionId, UserId};

/// A registered user identity.
///
/// Rows are created lazily the first time an email logs in; the same email
/// always maps back to the same `UserId`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An authenticated session.
///
/// `email` is denormalized from the owning user row so request handling does
/// not need a second lookup; the backing store keeps only the user id and
/// joins the owning user on retrieval.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// The actual session token (only populated on creation, not on retrieval)
    pub token: Option<String>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: UserSession,
}

/// Generate a new opaque session token.
///
/// Format: `sess_` followed by a 32-character hex UUID (37 characters total).
pub fn generate_session_token() -> String {
    format!("sess_{}", Uuid::new_v4().to_string().replace("-", ""))
}

/// Hash a session token for storage. Only the hash is ever persisted.
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Repository trait for user identities
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by email, creating one if none exists.
    ///
    /// `email` must already be normalized (trimmed, lowercased). `name` is
    /// only applied when the row is first created.
    async fn get_or_create_user(&self, email: &str, name: Option<&str>)
        -> anyhow::Result<User>;

    /// Retrieve a user by id
    async fn get_user(&self, user_id: UserId) -> anyhow::Result<Option<User>>;
}

/// Repository trait for authentication session management
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a user session (returns the session with the unhashed token)
    async fn create_session(&self, user_id: UserId, email: &str) -> anyhow::Result<UserSession>;

    /// Retrieve a session by token hash
    async fn get_session_by_token_hash(
        &self,
        token_hash: String,
    ) -> anyhow::Result<Option<UserSession>>;

    /// Delete a session (logout)
    async fn delete_session(&self, session_id: SessionId) -> anyhow::Result<()>;
}

/// Errors that can occur during authentication operations
#[derive(Debug)]
pub enum AuthError {
    InvalidEmail(String),
    DatabaseError(String),
    InternalError(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidEmail(msg) => write!(f, "Invalid email: {}", msg),
            AuthError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AuthError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::InternalError(err.to_string())
    }
}

/// Service trait for authentication flows
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Log a user in by email, provisioning the identity on first sight.
    async fn login_with_email(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<LoginOutcome, AuthError>;

    /// Terminate a session.
    async fn logout(&self, session_id: SessionId) -> Result<(), AuthError>;
}
