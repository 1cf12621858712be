use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::ports::{
    AuthError, AuthService, LoginOutcome, SessionRepository, User, UserRepository,
};
use crate::types::SessionId;

/// Normalize a raw login email: trim surrounding whitespace and lowercase.
///
/// The normalized form is what gets persisted and what the billing provider
/// is queried with, so every code path must agree on it.
pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AuthError::InvalidEmail("email is required".to_string()));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    };
    if !valid || email.contains(char::is_whitespace) {
        return Err(AuthError::InvalidEmail(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(email)
}

/// Authentication service backed by user and session repositories.
pub struct AuthServiceImpl {
    user_repository: Arc<dyn UserRepository>,
    session_repository: Arc<dyn SessionRepository>,
}

impl AuthServiceImpl {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        session_repository: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            user_repository,
            session_repository,
        }
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn login_with_email(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email)?;

        let user = self
            .user_repository
            .get_or_create_user(&email, name)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let session = self
            .session_repository
            .create_session(user.id, &user.email)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        info!(user_id = %user.id, "user logged in");

        Ok(LoginOutcome { user, session })
    }

    async fn logout(&self, session_id: SessionId) -> Result<(), AuthError> {
        self.session_repository
            .delete_session(session_id)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        info!(session_id = %session_id, "session terminated");

        Ok(())
    }
}

/// Test helpers for authentication
pub mod test_helpers {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};
    use tokio::sync::RwLock;

    use super::*;
    use crate::auth::ports::{generate_session_token, hash_session_token, UserSession};
    use crate::types::UserId;

    /// In-memory user repository for tests.
    #[derive(Default)]
    pub struct InMemoryUserRepository {
        users: RwLock<HashMap<UserId, User>>,
    }

    impl InMemoryUserRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn get_or_create_user(
            &self,
            email: &str,
            name: Option<&str>,
        ) -> anyhow::Result<User> {
            let mut users = self.users.write().await;
            if let Some(existing) = users.values().find(|u| u.email == email) {
                return Ok(existing.clone());
            }
            let now = Utc::now();
            let user = User {
                id: UserId::new(),
                email: email.to_string(),
                name: name.map(|n| n.to_string()),
                created_at: now,
                updated_at: now,
            };
            users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn get_user(&self, user_id: UserId) -> anyhow::Result<Option<User>> {
            Ok(self.users.read().await.get(&user_id).cloned())
        }
    }

    struct StoredSession {
        session: UserSession,
        token_hash: String,
    }

    /// In-memory session repository for tests.
    ///
    /// Mirrors the persistent implementation: the plaintext token is returned
    /// exactly once at creation and only its hash is retained.
    pub struct InMemorySessionRepository {
        sessions: RwLock<HashMap<SessionId, StoredSession>>,
        ttl_days: i64,
    }

    impl InMemorySessionRepository {
        pub fn new() -> Self {
            Self {
                sessions: RwLock::new(HashMap::new()),
                ttl_days: 30,
            }
        }

        /// Force an existing session into the past, for expiry tests.
        pub async fn expire_session(&self, session_id: SessionId) {
            let mut sessions = self.sessions.write().await;
            if let Some(stored) = sessions.get_mut(&session_id) {
                stored.session.expires_at = Utc::now() - Duration::hours(1);
            }
        }
    }

    impl Default for InMemorySessionRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl SessionRepository for InMemorySessionRepository {
        async fn create_session(
            &self,
            user_id: UserId,
            email: &str,
        ) -> anyhow::Result<UserSession> {
            let token = generate_session_token();
            let now = Utc::now();
            let session = UserSession {
                session_id: SessionId::new(),
                user_id,
                email: email.to_string(),
                created_at: now,
                expires_at: now + Duration::days(self.ttl_days),
                token: Some(token.clone()),
            };
            let stored = StoredSession {
                session: UserSession {
                    token: None,
                    ..session.clone()
                },
                token_hash: hash_session_token(&token),
            };
            self.sessions
                .write()
                .await
                .insert(session.session_id, stored);
            Ok(session)
        }

        async fn get_session_by_token_hash(
            &self,
            token_hash: String,
        ) -> anyhow::Result<Option<UserSession>> {
            let sessions = self.sessions.read().await;
            Ok(sessions
                .values()
                .find(|s| s.token_hash == token_hash)
                .map(|s| s.session.clone()))
        }

        async fn delete_session(&self, session_id: SessionId) -> anyhow::Result<()> {
            self.sessions.write().await.remove(&session_id);
            Ok(())
        }
    }
}
