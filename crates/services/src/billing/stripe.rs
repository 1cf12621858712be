use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stripe::{
    CheckoutSessionMode, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionLineItemsPriceDataRecurring,
    CreateCheckoutSessionLineItemsPriceDataRecurringInterval, Currency, Customer, CustomerId,
    Expandable, ListCustomers, ListSubscriptions, RequestStrategy,
    Subscription as StripeSubscription, SubscriptionStatusFilter,
};
use tracing::info;

use super::ports::{
    BillingCustomer, BillingInterval, BillingProvider, BillingSubscription, CheckoutSession,
    CreateCheckoutParams,
};
use crate::UserId;

/// Generate idempotency key for checkout session creation
/// Format: SHA-256(user_id:plan:interval:amount:time_window)
/// Same key within the window, new key after, so a retried purchase
/// reuses the Stripe session instead of minting a second one.
fn generate_checkout_idempotency_key(
    user_id: &UserId,
    plan_name: &str,
    interval: BillingInterval,
    amount_cents: i64,
    window_secs: u64,
) -> String {
    use sha2::{Digest, Sha256};

    let time_window = chrono::Utc::now().timestamp() / window_secs.max(1) as i64;

    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{}:{}:{}:{}:{}",
            user_id.0, plan_name, interval, amount_cents, time_window
        )
        .as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}

fn recurring_interval(
    interval: BillingInterval,
) -> CreateCheckoutSessionLineItemsPriceDataRecurringInterval {
    match interval {
        BillingInterval::Monthly => CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Month,
        BillingInterval::Annual => CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Year,
    }
}

/// Payment provider backed by the Stripe API.
pub struct StripeBillingProvider {
    secret_key: String,
    idempotency_window_secs: u64,
}

impl StripeBillingProvider {
    pub fn new(secret_key: String, idempotency_window_secs: u64) -> Self {
        Self {
            secret_key,
            idempotency_window_secs,
        }
    }

    fn client(&self) -> Client {
        Client::new(&self.secret_key)
    }
}

#[async_trait]
impl BillingProvider for StripeBillingProvider {
    fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> anyhow::Result<Option<BillingCustomer>> {
        let client = self.client();

        let customers = Customer::list(
            &client,
            &ListCustomers {
                email: Some(email),
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .context("Failed to list Stripe customers")?;

        Ok(customers.data.into_iter().next().map(|customer| {
            BillingCustomer {
                id: customer.id.to_string(),
                email: customer.email,
            }
        }))
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> anyhow::Result<Vec<BillingSubscription>> {
        let client = self.client();

        let customer_id: CustomerId = customer_id
            .parse()
            .context("Invalid Stripe customer ID")?;

        let subscriptions = StripeSubscription::list(
            &client,
            &ListSubscriptions {
                customer: Some(customer_id),
                status: Some(SubscriptionStatusFilter::Active),
                limit: Some(10),
                expand: &["data.items.data.price.product"],
                ..Default::default()
            },
        )
        .await
        .context("Failed to list Stripe subscriptions")?;

        let mut result = Vec::with_capacity(subscriptions.data.len());
        for subscription in subscriptions.data {
            let price = subscription
                .items
                .data
                .first()
                .and_then(|item| item.price.clone())
                .with_context(|| {
                    format!("No price on Stripe subscription {}", subscription.id)
                })?;

            let product_name = price.product.as_ref().and_then(|product| match product {
                Expandable::Object(product) => product.name.clone(),
                Expandable::Id(_) => None,
            });

            let current_period_end: DateTime<Utc> =
                DateTime::from_timestamp(subscription.current_period_end, 0).with_context(
                    || {
                        format!(
                            "Invalid period end {} on Stripe subscription {}",
                            subscription.current_period_end, subscription.id
                        )
                    },
                )?;

            result.push(BillingSubscription {
                id: subscription.id.to_string(),
                price_id: price.id.to_string(),
                unit_amount: price.unit_amount,
                product_name,
                current_period_end,
            });
        }

        Ok(result)
    }

    async fn create_checkout_session(
        &self,
        params: CreateCheckoutParams,
    ) -> anyhow::Result<CheckoutSession> {
        let idempotency_key = generate_checkout_idempotency_key(
            &params.user_id,
            &params.plan_name,
            params.interval,
            params.amount_cents,
            self.idempotency_window_secs,
        );
        let client = self
            .client()
            .with_strategy(RequestStrategy::Idempotent(idempotency_key.clone()));

        let product_name = format!("RFQRocket {} Plan", params.plan_name);
        let description = match params.promo_code.as_deref() {
            Some(code) => format!(
                "Billed {}. Promo {} applied (-${:.2})",
                params.interval,
                code,
                params.discount_cents as f64 / 100.0
            ),
            None => format!("Billed {}", params.interval),
        };

        let mut metadata: HashMap<String, String> = HashMap::from([
            ("user_id".to_string(), params.user_id.0.to_string()),
            ("plan_name".to_string(), params.plan_name.clone()),
            ("interval".to_string(), params.interval.to_string()),
            (
                "original_amount".to_string(),
                params.original_amount_cents.to_string(),
            ),
            (
                "discount_amount".to_string(),
                params.discount_cents.to_string(),
            ),
        ]);
        if let Some(code) = &params.promo_code {
            metadata.insert("promo_code".to_string(), code.clone());
        }

        let mut create_params = CreateCheckoutSession::new();
        create_params.mode = Some(CheckoutSessionMode::Subscription);
        match &params.customer_id {
            Some(customer_id) => {
                create_params.customer = Some(
                    customer_id
                        .parse::<CustomerId>()
                        .context("Invalid Stripe customer ID")?,
                );
            }
            None => create_params.customer_email = Some(&params.customer_email),
        }
        create_params.success_url = Some(&params.success_url);
        create_params.cancel_url = Some(&params.cancel_url);
        create_params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(params.amount_cents),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: product_name,
                    description: Some(description),
                    ..Default::default()
                }),
                recurring: Some(CreateCheckoutSessionLineItemsPriceDataRecurring {
                    interval: recurring_interval(params.interval),
                    interval_count: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);
        create_params.metadata = Some(metadata);

        let session = stripe::CheckoutSession::create(&client, create_params)
            .await
            .context("Failed to create Stripe checkout session")?;

        let url = session
            .url
            .context("No checkout URL returned by Stripe")?;

        info!(
            "Stripe checkout session created: user_id={}, session_id={}, idempotency_key={}...",
            params.user_id,
            session.id,
            &idempotency_key.chars().take(16).collect::<String>()
        );

        Ok(CheckoutSession { url })
    }
}
