//! Integration tests for entitlement resolution: plan matching against the
//! catalog, free-tier fallbacks, and provider-outage handling.
//!
//! Run with: `cargo test -p api --test entitlements_tests`

mod common;

use chrono::{Duration, Utc};
use common::{create_test_app, create_test_app_with_config, dev_login, fetch_entitlements, TestServerConfig};
use serde_json::json;
use services::billing::service::test_helpers::MockBillingProvider;
use services::billing::BillingSubscription;
use services::entitlement::BILLING_PLANS_CONFIG_KEY;

fn subscription(price_id: &str, unit_amount: Option<i64>, product_name: Option<&str>) -> BillingSubscription {
    BillingSubscription {
        id: "sub_test".to_string(),
        price_id: price_id.to_string(),
        unit_amount,
        product_name: product_name.map(|n| n.to_string()),
        current_period_end: Utc::now() + Duration::days(30),
    }
}

#[tokio::test]
async fn test_unauthenticated_check_returns_free_tier() {
    let app = create_test_app().await;

    let response = app.server.get("/v1/entitlements").await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    assert_eq!(body["subscribed"], false);
    assert!(body["plan"].is_null());
    assert!(body["subscription_end"].is_null());
    assert_eq!(body["rfq_count"], 0);
    assert_eq!(body["proposal_count"], 0);
    assert_eq!(body["rfq_limit"], 1);
    assert_eq!(body["proposal_limit"], 1);
}

#[tokio::test]
async fn test_invalid_token_still_returns_free_tier() {
    let app = create_test_app().await;

    let response = app
        .server
        .get("/v1/entitlements")
        .add_header(
            http::HeaderName::from_static("authorization"),
            http::HeaderValue::from_static("Bearer not-a-real-token"),
        )
        .await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    assert_eq!(body["subscribed"], false);
    assert_eq!(body["rfq_limit"], 1);
}

#[tokio::test]
async fn test_user_without_subscription_gets_free_limits() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["subscribed"], false);
    assert!(body["plan"].is_null());
    assert_eq!(body["rfq_count"], 0);
    assert_eq!(body["proposal_count"], 0);
    assert_eq!(body["rfq_limit"], 1);
    assert_eq!(body["proposal_limit"], 1);
}

#[tokio::test]
async fn test_premium_subscription_resolved_by_amount() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    app.billing.add_customer("buyer@example.com", "cus_1").await;
    app.billing
        .add_subscription("cus_1", subscription("price_unconfigured", Some(2900), None))
        .await;

    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["subscribed"], true);
    assert_eq!(body["plan"], "Premium");
    assert!(body["subscription_end"].is_string());
    assert_eq!(body["rfq_limit"], 10);
    assert_eq!(body["proposal_limit"], 10);
}

#[tokio::test]
async fn test_professional_subscription_is_unlimited() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "pro@example.com").await;

    app.billing.add_customer("pro@example.com", "cus_2").await;
    app.billing
        .add_subscription("cus_2", subscription("price_unconfigured", Some(7900), None))
        .await;

    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["subscribed"], true);
    assert_eq!(body["plan"], "Professional");
    // Null limits mean unlimited, and must serialize explicitly as null
    assert!(body["rfq_limit"].is_null());
    assert!(body["proposal_limit"].is_null());
}

#[tokio::test]
async fn test_plan_resolved_by_price_id() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    // Catalog row with stable price IDs; the subscription carries no
    // amount or product name, so only the price ID can match.
    app.app_configs
        .set(
            BILLING_PLANS_CONFIG_KEY,
            json!({
                "plans": [{
                    "name": "Premium",
                    "monthly_price_cents": 2900,
                    "annual_price_cents": 29000,
                    "monthly_price_id": "price_premium_monthly",
                    "annual_price_id": "price_premium_annual",
                    "rfq_limit": 10,
                    "proposal_limit": 10
                }]
            }),
        )
        .await;

    app.billing.add_customer("buyer@example.com", "cus_1").await;
    app.billing
        .add_subscription("cus_1", subscription("price_premium_annual", None, None))
        .await;

    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["subscribed"], true);
    assert_eq!(body["plan"], "Premium");
    assert_eq!(body["rfq_limit"], 10);
}

#[tokio::test]
async fn test_plan_resolved_by_product_name_substring() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    // Neither the price ID nor the amount matches; the product display
    // name contains a catalog plan name, case-insensitively.
    app.billing.add_customer("buyer@example.com", "cus_1").await;
    app.billing
        .add_subscription(
            "cus_1",
            subscription("price_legacy", Some(555), Some("RFQRocket PREMIUM (legacy)")),
        )
        .await;

    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["subscribed"], true);
    assert_eq!(body["plan"], "Premium");
    assert_eq!(body["rfq_limit"], 10);
}

#[tokio::test]
async fn test_unrecognized_subscription_gets_free_limits() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    app.billing.add_customer("buyer@example.com", "cus_1").await;
    app.billing
        .add_subscription("cus_1", subscription("price_legacy", Some(555), Some("Enterprise")))
        .await;

    let body = fetch_entitlements(&app.server, &token).await;
    // Still subscribed, but no catalog plan matched
    assert_eq!(body["subscribed"], true);
    assert!(body["plan"].is_null());
    assert_eq!(body["rfq_limit"], 1);
    assert_eq!(body["proposal_limit"], 1);
}

#[tokio::test]
async fn test_repeated_checks_are_stable() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    app.billing.add_customer("buyer@example.com", "cus_1").await;
    app.billing
        .add_subscription("cus_1", subscription("price_unconfigured", Some(2900), None))
        .await;

    let first = fetch_entitlements(&app.server, &token).await;
    let second = fetch_entitlements(&app.server, &token).await;
    let third = fetch_entitlements(&app.server, &token).await;
    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[tokio::test]
async fn test_provider_outage_returns_502() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    app.billing.set_failing(true);

    let response = app
        .server
        .get("/v1/entitlements")
        .add_header(
            http::HeaderName::from_static("authorization"),
            http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), 502);

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "billing_unavailable");

    // Once the provider recovers the check succeeds again
    app.billing.set_failing(false);
    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["subscribed"], false);
}

#[tokio::test]
async fn test_unconfigured_provider_treated_as_unsubscribed() {
    let billing = MockBillingProvider::unconfigured();
    billing.add_customer("buyer@example.com", "cus_1").await;
    billing
        .add_subscription("cus_1", subscription("price_unconfigured", Some(2900), None))
        .await;

    let app = create_test_app_with_config(TestServerConfig {
        billing,
        ..Default::default()
    })
    .await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    // The provider is never queried; the seeded subscription is invisible
    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["subscribed"], false);
    assert!(body["plan"].is_null());
    assert_eq!(body["rfq_limit"], 1);
}

#[tokio::test]
async fn test_plan_change_reflected_with_counts_preserved() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    app.billing.add_customer("buyer@example.com", "cus_1").await;
    app.billing
        .add_subscription("cus_1", subscription("price_unconfigured", Some(2900), None))
        .await;

    // Burn some usage under Premium
    for _ in 0..2 {
        let response = app
            .server
            .post("/v1/usage/increments")
            .add_header(
                http::HeaderName::from_static("authorization"),
                http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
            )
            .json(&json!({"type": "rfq"}))
            .await;
        assert_eq!(response.status_code(), 200);
    }

    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["plan"], "Premium");
    assert_eq!(body["rfq_count"], 2);

    // Upgrade at the provider; the next check reflects the new plan while
    // the counters carry over untouched
    app.billing.clear_subscriptions("cus_1").await;
    app.billing
        .add_subscription("cus_1", subscription("price_unconfigured", Some(7900), None))
        .await;

    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["plan"], "Professional");
    assert_eq!(body["rfq_count"], 2);
    assert!(body["rfq_limit"].is_null());
}

#[tokio::test]
async fn test_catalog_override_from_app_config() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    app.app_configs
        .set(
            BILLING_PLANS_CONFIG_KEY,
            json!({
                "plans": [{
                    "name": "Starter",
                    "monthly_price_cents": 999,
                    "annual_price_cents": 9990,
                    "rfq_limit": 3,
                    "proposal_limit": 3
                }]
            }),
        )
        .await;

    app.billing.add_customer("buyer@example.com", "cus_1").await;
    app.billing
        .add_subscription("cus_1", subscription("price_starter", Some(999), None))
        .await;

    let body = fetch_entitlements(&app.server, &token).await;
    assert_eq!(body["plan"], "Starter");
    assert_eq!(body["rfq_limit"], 3);
    assert_eq!(body["proposal_limit"], 3);
}
