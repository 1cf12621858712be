use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::ports::{
    GenerationBackend, GenerationError, GenerationInput, GenerationOutcome, GenerationService,
    ProposalGenerationRequest, RfqGenerationRequest,
};
use crate::entitlement::EntitlementService;
use crate::profile::UsageKind;
use crate::usage::UsageService;
use crate::UserId;

/// Minimum trimmed length of the merged document text for a proposal.
const MIN_PROPOSAL_INPUT_CHARS: usize = 100;

/// Orchestrates a generation: resolve entitlement, refuse when exhausted,
/// reserve a usage unit, then call the backend.
///
/// The reservation deliberately happens before the backend call, so
/// concurrent submissions cannot all pass the limit check on the same stale
/// count. A reservation spent on a failed generation is not refunded; the
/// service only schedules a re-resolution so displayed counts catch up.
pub struct GenerationServiceImpl {
    entitlement_service: Arc<dyn EntitlementService>,
    usage_service: Arc<dyn UsageService>,
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationServiceImpl {
    pub fn new(
        entitlement_service: Arc<dyn EntitlementService>,
        usage_service: Arc<dyn UsageService>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            entitlement_service,
            usage_service,
            backend,
        }
    }

    async fn run(
        &self,
        user_id: UserId,
        email: &str,
        input: GenerationInput,
    ) -> Result<GenerationOutcome, GenerationError> {
        let kind = input.kind;

        let snapshot = self.entitlement_service.resolve(user_id, email).await?;
        if !snapshot.has_capacity(kind) {
            info!(
                "Refusing {} generation for user_id={}: count {} has reached limit {:?}",
                kind,
                user_id,
                snapshot.count_for(kind),
                snapshot.limit_for(kind)
            );
            return Err(GenerationError::EntitlementExhausted {
                kind,
                count: snapshot.count_for(kind),
                limit: snapshot.limit_for(kind).unwrap_or(0),
            });
        }

        // Reserve the unit before the costly call
        let receipt = self
            .usage_service
            .increment(user_id, email, kind)
            .await
            .map_err(|e| GenerationError::ReservationFailed(e.to_string()))?;

        match self.backend.generate(&input).await {
            Ok(content) => {
                let (rfq_count, proposal_count) = match kind {
                    UsageKind::Rfq => (receipt.count, snapshot.proposal_count),
                    UsageKind::Proposal => (snapshot.rfq_count, receipt.count),
                };
                info!(
                    "{} generation succeeded for user_id={} ({} chars, count={})",
                    kind,
                    user_id,
                    content.len(),
                    receipt.count
                );
                Ok(GenerationOutcome {
                    content,
                    rfq_count,
                    proposal_count,
                })
            }
            Err(e) => {
                warn!(
                    "{} generation failed for user_id={} after the unit was reserved: {}",
                    kind, user_id, e
                );
                self.spawn_entitlement_resync(user_id, email);
                Err(GenerationError::BackendFailed(e.to_string()))
            }
        }
    }

    /// Fire-and-forget re-resolution after a failed generation. The spent
    /// reservation stays spent; this only refreshes the displayed state.
    fn spawn_entitlement_resync(&self, user_id: UserId, email: &str) {
        let entitlement_service = self.entitlement_service.clone();
        let email = email.to_string();
        tokio::spawn(async move {
            if let Err(e) = entitlement_service.resolve(user_id, &email).await {
                tracing::debug!(
                    "Post-failure entitlement resync failed for user_id={}: {}",
                    user_id,
                    e
                );
            }
        });
    }
}

#[async_trait]
impl GenerationService for GenerationServiceImpl {
    async fn generate_rfq(
        &self,
        user_id: UserId,
        email: &str,
        request: RfqGenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        if request.extracted_text.trim().is_empty() {
            return Err(GenerationError::InvalidInput(
                "Document text is required".to_string(),
            ));
        }

        self.run(
            user_id,
            email,
            GenerationInput {
                kind: UsageKind::Rfq,
                document_text: request.extracted_text,
                source_files: vec![request.file_name],
            },
        )
        .await
    }

    async fn generate_proposal(
        &self,
        user_id: UserId,
        email: &str,
        request: ProposalGenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        if request.merged_text.trim().chars().count() < MIN_PROPOSAL_INPUT_CHARS {
            return Err(GenerationError::InvalidInput(
                "Insufficient content from documents. Please ensure the files contain readable text."
                    .to_string(),
            ));
        }

        let source_files = [
            request.rfq_file_name.clone(),
            request.solicitation_file_name.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        self.run(
            user_id,
            email,
            GenerationInput {
                kind: UsageKind::Proposal,
                document_text: request.merged_text,
                source_files,
            },
        )
        .await
    }
}

/// Test helpers for generation
pub mod test_helpers {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// Scriptable generation backend for tests.
    pub struct MockGenerationBackend {
        failing: AtomicBool,
        calls: AtomicUsize,
        response: String,
    }

    impl MockGenerationBackend {
        pub fn new() -> Self {
            Self {
                failing: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                response: "Generated document content.".to_string(),
            }
        }

        pub fn with_response(response: &str) -> Self {
            Self {
                response: response.to_string(),
                ..Self::new()
            }
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Number of times the backend was invoked.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Default for MockGenerationBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl GenerationBackend for MockGenerationBackend {
        async fn generate(&self, _input: &GenerationInput) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("model overloaded");
            }
            Ok(self.response.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::{Duration, Utc};

    use super::test_helpers::MockGenerationBackend;
    use super::*;
    use crate::billing::ports::BillingSubscription;
    use crate::billing::service::test_helpers::MockBillingProvider;
    use crate::entitlement::service::test_helpers::InMemoryAppConfigRepository;
    use crate::entitlement::{EntitlementServiceImpl, PlanCatalog, PlanCatalogCache};
    use crate::profile::test_helpers::{FailingProfileRepository, InMemoryProfileRepository};
    use crate::profile::ProfileRepository;
    use crate::usage::UsageServiceImpl;

    struct Fixture {
        profiles: Arc<InMemoryProfileRepository>,
        billing: Arc<MockBillingProvider>,
        backend: Arc<MockGenerationBackend>,
        service: GenerationServiceImpl,
    }

    fn fixture() -> Fixture {
        let profiles = Arc::new(InMemoryProfileRepository::new());
        let billing = Arc::new(MockBillingProvider::new());
        let backend = Arc::new(MockGenerationBackend::new());
        let service = build_service(profiles.clone(), billing.clone(), backend.clone());
        Fixture {
            profiles,
            billing,
            backend,
            service,
        }
    }

    fn build_service(
        profiles: Arc<dyn ProfileRepository>,
        billing: Arc<MockBillingProvider>,
        backend: Arc<dyn GenerationBackend>,
    ) -> GenerationServiceImpl {
        let catalog = Arc::new(PlanCatalogCache::new(
            Arc::new(InMemoryAppConfigRepository::new()),
            PlanCatalog::default(),
        ));
        let entitlement = Arc::new(EntitlementServiceImpl::new(
            profiles.clone(),
            billing,
            catalog,
        ));
        let usage = Arc::new(UsageServiceImpl::new(profiles));
        GenerationServiceImpl::new(entitlement, usage, backend)
    }

    fn rfq_request(text: &str) -> RfqGenerationRequest {
        RfqGenerationRequest {
            extracted_text: text.to_string(),
            file_name: "solicitation.pdf".to_string(),
        }
    }

    fn proposal_request(text: &str) -> ProposalGenerationRequest {
        ProposalGenerationRequest {
            merged_text: text.to_string(),
            rfq_file_name: Some("rfq.pdf".to_string()),
            solicitation_file_name: Some("solicitation.pdf".to_string()),
        }
    }

    async fn subscribe_premium(billing: &MockBillingProvider, email: &str) {
        billing.add_customer(email, "cus_1").await;
        billing
            .add_subscription(
                "cus_1",
                BillingSubscription {
                    id: "sub_1".to_string(),
                    price_id: "price_x".to_string(),
                    unit_amount: Some(2900),
                    product_name: None,
                    current_period_end: Utc::now() + Duration::days(30),
                },
            )
            .await;
    }

    #[tokio::test]
    async fn test_rfq_generation_happy_path() {
        let f = fixture();
        let user_id = UserId::new();

        let outcome = f
            .service
            .generate_rfq(user_id, "buyer@example.com", rfq_request("Solicitation text"))
            .await
            .unwrap();

        assert_eq!(outcome.content, "Generated document content.");
        assert_eq!(outcome.rfq_count, 1);
        assert_eq!(outcome.proposal_count, 0);
        assert_eq!(f.backend.calls(), 1);

        let stored = f.profiles.stored(user_id).await.unwrap();
        assert_eq!(stored.rfq_count, 1);
    }

    #[tokio::test]
    async fn test_exhausted_free_user_is_refused_without_reservation() {
        let f = fixture();
        let user_id = UserId::new();

        // First request consumes the single free unit
        f.service
            .generate_rfq(user_id, "buyer@example.com", rfq_request("text"))
            .await
            .unwrap();

        // Second request is refused before any increment
        let err = f
            .service
            .generate_rfq(user_id, "buyer@example.com", rfq_request("text"))
            .await
            .unwrap_err();

        match err {
            GenerationError::EntitlementExhausted { kind, count, limit } => {
                assert_eq!(kind, UsageKind::Rfq);
                assert_eq!(count, 1);
                assert_eq!(limit, 1);
            }
            other => panic!("expected EntitlementExhausted, got {:?}", other),
        }
        assert_eq!(f.backend.calls(), 1);
        assert_eq!(f.profiles.stored(user_id).await.unwrap().rfq_count, 1);
    }

    /// Backend that records the stored count at the moment it runs.
    struct CountObservingBackend {
        profiles: Arc<InMemoryProfileRepository>,
        user_id: UserId,
        observed: AtomicI64,
    }

    #[async_trait]
    impl GenerationBackend for CountObservingBackend {
        async fn generate(&self, _input: &GenerationInput) -> anyhow::Result<String> {
            let count = self
                .profiles
                .stored(self.user_id)
                .await
                .map(|p| p.rfq_count)
                .unwrap_or(-1);
            self.observed.store(count, Ordering::SeqCst);
            Ok("ok".to_string())
        }
    }

    #[tokio::test]
    async fn test_reservation_happens_before_backend_call() {
        let profiles = Arc::new(InMemoryProfileRepository::new());
        let billing = Arc::new(MockBillingProvider::new());
        let user_id = UserId::new();
        let backend = Arc::new(CountObservingBackend {
            profiles: profiles.clone(),
            user_id,
            observed: AtomicI64::new(-1),
        });
        let service = build_service(profiles, billing, backend.clone());

        service
            .generate_rfq(user_id, "buyer@example.com", rfq_request("text"))
            .await
            .unwrap();

        assert_eq!(backend.observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_does_not_refund_reservation() {
        let f = fixture();
        let user_id = UserId::new();
        f.backend.set_failing(true);

        let err = f
            .service
            .generate_rfq(user_id, "buyer@example.com", rfq_request("text"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::BackendFailed(_)));
        // The unit stays consumed
        assert_eq!(f.profiles.stored(user_id).await.unwrap().rfq_count, 1);
    }

    #[tokio::test]
    async fn test_reservation_failure_aborts_before_backend() {
        let billing = Arc::new(MockBillingProvider::new());
        let backend = Arc::new(MockGenerationBackend::new());
        let service = build_service(
            Arc::new(FailingProfileRepository),
            billing,
            backend.clone(),
        );

        let err = service
            .generate_rfq(UserId::new(), "buyer@example.com", rfq_request("text"))
            .await
            .unwrap_err();

        // The profile store is down, so resolution itself already fails
        assert!(matches!(err, GenerationError::DatabaseError(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_rfq_rejects_empty_text() {
        let f = fixture();
        let user_id = UserId::new();

        let err = f
            .service
            .generate_rfq(user_id, "buyer@example.com", rfq_request("   "))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::InvalidInput(_)));
        assert_eq!(f.backend.calls(), 0);
        assert!(f.profiles.stored(user_id).await.is_none());
    }

    #[tokio::test]
    async fn test_proposal_rejects_short_input() {
        let f = fixture();

        let err = f
            .service
            .generate_proposal(
                UserId::new(),
                "buyer@example.com",
                proposal_request(&"x".repeat(99)),
            )
            .await
            .unwrap_err();

        match err {
            GenerationError::InvalidInput(msg) => assert_eq!(
                msg,
                "Insufficient content from documents. Please ensure the files contain readable text."
            ),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
        assert_eq!(f.backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_proposal_accepts_minimum_input() {
        let f = fixture();
        let user_id = UserId::new();

        let outcome = f
            .service
            .generate_proposal(
                user_id,
                "buyer@example.com",
                proposal_request(&"x".repeat(100)),
            )
            .await
            .unwrap();

        assert_eq!(outcome.proposal_count, 1);
        assert_eq!(outcome.rfq_count, 0);
    }

    #[tokio::test]
    async fn test_outcome_carries_both_counts() {
        let f = fixture();
        let user_id = UserId::new();
        subscribe_premium(&f.billing, "buyer@example.com").await;

        // Three RFQs, then a proposal
        for _ in 0..3 {
            f.service
                .generate_rfq(user_id, "buyer@example.com", rfq_request("text"))
                .await
                .unwrap();
        }
        let outcome = f
            .service
            .generate_proposal(
                user_id,
                "buyer@example.com",
                proposal_request(&"x".repeat(200)),
            )
            .await
            .unwrap();

        assert_eq!(outcome.rfq_count, 3);
        assert_eq!(outcome.proposal_count, 1);
    }

    #[tokio::test]
    async fn test_premium_user_passes_free_limit() {
        let f = fixture();
        let user_id = UserId::new();
        subscribe_premium(&f.billing, "buyer@example.com").await;

        for expected in 1..=5 {
            let outcome = f
                .service
                .generate_rfq(user_id, "buyer@example.com", rfq_request("text"))
                .await
                .unwrap();
            assert_eq!(outcome.rfq_count, expected);
        }
    }

    #[tokio::test]
    async fn test_billing_outage_blocks_generation() {
        let f = fixture();
        let user_id = UserId::new();
        f.billing.set_failing(true);

        let err = f
            .service
            .generate_rfq(user_id, "buyer@example.com", rfq_request("text"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::ProviderUnavailable(_)));
        assert_eq!(f.backend.calls(), 0);
        assert!(f.profiles.stored(user_id).await.is_none());
    }
}
