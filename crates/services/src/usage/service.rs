use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::ports::{UsageError, UsageReceipt, UsageService};
use crate::profile::{ProfileRepository, UsageKind};
use crate::UserId;

/// Usage accounting over the profile store. The increment itself happens as a
/// single statement at the data-store layer; this service only adds error
/// translation and logging.
pub struct UsageServiceImpl {
    profile_repository: Arc<dyn ProfileRepository>,
}

impl UsageServiceImpl {
    pub fn new(profile_repository: Arc<dyn ProfileRepository>) -> Self {
        Self { profile_repository }
    }
}

#[async_trait]
impl UsageService for UsageServiceImpl {
    async fn increment(
        &self,
        user_id: UserId,
        email: &str,
        kind: UsageKind,
    ) -> Result<UsageReceipt, UsageError> {
        let count = self
            .profile_repository
            .increment_usage(user_id, email, kind)
            .await
            .map_err(|e| UsageError::DatabaseError(e.to_string()))?;

        info!(
            "Usage incremented: user_id={} kind={} count={}",
            user_id, kind, count
        );

        Ok(UsageReceipt { kind, count })
    }
}
