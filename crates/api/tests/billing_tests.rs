//! Integration tests for the billing endpoints: the public plan catalog and
//! checkout session creation.
//!
//! Run with: `cargo test -p api --test billing_tests`

mod common;

use axum_test::{TestResponse, TestServer};
use common::{create_test_app, create_test_app_with_config, dev_login, TestServerConfig};
use serde_json::json;
use services::billing::service::test_helpers::MockBillingProvider;
use services::billing::{DiscountType, PromoCode};
use services::entitlement::BILLING_PLANS_CONFIG_KEY;

async fn create_checkout(
    server: &TestServer,
    token: &str,
    origin: &str,
    body: &serde_json::Value,
) -> TestResponse {
    server
        .post("/v1/billing/checkout")
        .add_header(
            http::HeaderName::from_static("authorization"),
            http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .add_header(
            http::HeaderName::from_static("origin"),
            http::HeaderValue::from_str(origin).unwrap(),
        )
        .json(body)
        .await
}

#[tokio::test]
async fn test_get_plans_is_public() {
    let app = create_test_app().await;

    let response = app.server.get("/v1/billing/plans").await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    let plans = body["plans"].as_array().expect("plans should be an array");
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0]["name"], "Premium");
    assert_eq!(plans[0]["monthly_price_cents"], 2900);
    assert_eq!(plans[0]["annual_price_cents"], 29000);
    assert_eq!(plans[0]["rfq_limit"], 10);
    assert_eq!(plans[1]["name"], "Professional");
    assert_eq!(plans[1]["monthly_price_cents"], 7900);
    // Unlimited plans omit their limit fields entirely
    assert!(plans[1].get("rfq_limit").is_none());
    assert!(plans[1].get("proposal_limit").is_none());
}

#[tokio::test]
async fn test_get_plans_reflects_config_override() {
    let app = create_test_app().await;

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

    let response = app.server.get("/v1/billing/plans").await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    let plans = body["plans"].as_array().unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0]["name"], "Starter");
    assert_eq!(plans[0]["monthly_price_cents"], 999);
}

#[tokio::test]
async fn test_checkout_requires_auth() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/v1/billing/checkout")
        .json(&json!({"plan_name": "Premium"}))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_checkout_requires_origin_header() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    let response = app
        .server
        .post("/v1/billing/checkout")
        .add_header(
            http::HeaderName::from_static("authorization"),
            http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .json(&json!({"plan_name": "Premium"}))
        .await;
    assert_eq!(response.status_code(), 400);

    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Origin header is required");
}

#[tokio::test]
async fn test_checkout_rejects_invalid_origin() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    // Plain http is only trusted for local development hosts
    for origin in [
        "http://evil.com",
        "http://localhost.evil.com",
        "https://rfqrocket.com/pricing",
        "ftp://rfqrocket.com",
        "https://",
    ] {
        let response =
            create_checkout(&app.server, &token, origin, &json!({"plan_name": "Premium"})).await;
        assert_eq!(
            response.status_code(),
            400,
            "origin {origin:?} should be rejected"
        );
    }
    assert_eq!(app.billing.checkout_calls(), 0);
}

#[tokio::test]
async fn test_checkout_rejects_unknown_plan() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    let response = create_checkout(
        &app.server,
        &token,
        "https://rfqrocket.com",
        &json!({"plan_name": "Gold"}),
    )
    .await;
    assert_eq!(response.status_code(), 400);

    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Invalid plan: Gold");
}

#[tokio::test]
async fn test_checkout_unconfigured_provider_returns_503() {
    let app = create_test_app_with_config(TestServerConfig {
        billing: MockBillingProvider::unconfigured(),
        ..Default::default()
    })
    .await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    let response = create_checkout(
        &app.server,
        &token,
        "https://rfqrocket.com",
        &json!({"plan_name": "Premium"}),
    )
    .await;
    assert_eq!(response.status_code(), 503);

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "service_unavailable");
    assert_eq!(body["message"], "Payment provider is not configured");
}

#[tokio::test]
async fn test_checkout_provider_failure_returns_502() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    app.billing.set_failing(true);

    let response = create_checkout(
        &app.server,
        &token,
        "https://rfqrocket.com",
        &json!({"plan_name": "Premium"}),
    )
    .await;
    assert_eq!(response.status_code(), 502);

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "billing_unavailable");
}

#[tokio::test]
async fn test_checkout_monthly_premium() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    let response = create_checkout(
        &app.server,
        &token,
        "https://rfqrocket.com",
        &json!({"plan_name": "Premium"}),
    )
    .await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    assert_eq!(body["url"], "https://checkout.test/session/1");

    let params = app.billing.last_checkout().await.expect("checkout was made");
    assert_eq!(params.customer_email, "buyer@example.com");
    assert_eq!(params.plan_name, "Premium");
    assert_eq!(params.amount_cents, 2900);
    assert_eq!(params.original_amount_cents, 2900);
    assert_eq!(params.discount_cents, 0);
    assert_eq!(
        params.success_url,
        "https://rfqrocket.com/payment-success?session_id={CHECKOUT_SESSION_ID}"
    );
    assert_eq!(params.cancel_url, "https://rfqrocket.com/pricing");
}

#[tokio::test]
async fn test_checkout_annual_uses_annual_price() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    let response = create_checkout(
        &app.server,
        &token,
        "https://rfqrocket.com",
        &json!({"plan_name": "Premium", "is_annual": true}),
    )
    .await;
    assert_eq!(response.status_code(), 200);

    let params = app.billing.last_checkout().await.unwrap();
    assert_eq!(params.amount_cents, 29000);
}

#[tokio::test]
async fn test_checkout_localhost_origin_allowed() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    let response = create_checkout(
        &app.server,
        &token,
        "http://localhost:3000",
        &json!({"plan_name": "Premium"}),
    )
    .await;
    assert_eq!(response.status_code(), 200);

    let params = app.billing.last_checkout().await.unwrap();
    assert_eq!(
        params.success_url,
        "http://localhost:3000/payment-success?session_id={CHECKOUT_SESSION_ID}"
    );
}

#[tokio::test]
async fn test_checkout_applies_percentage_promo() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    app.promo_codes
        .insert(PromoCode {
            code: "SAVE20".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 20,
            active: true,
            expires_at: None,
        })
        .await;

    // Codes match case-insensitively
    let response = create_checkout(
        &app.server,
        &token,
        "https://rfqrocket.com",
        &json!({"plan_name": "Premium", "promo_code": "save20"}),
    )
    .await;
    assert_eq!(response.status_code(), 200);

    let params = app.billing.last_checkout().await.unwrap();
    assert_eq!(params.original_amount_cents, 2900);
    assert_eq!(params.discount_cents, 580);
    assert_eq!(params.amount_cents, 2320);
    // The canonical stored code is recorded, not the raw request casing
    assert_eq!(params.promo_code.as_deref(), Some("SAVE20"));
}

#[tokio::test]
async fn test_checkout_unknown_promo_charges_full_price() {
    let app = create_test_app().await;
    let token = dev_login(&app.server, "buyer@example.com").await;

    let response = create_checkout(
        &app.server,
        &token,
        "https://rfqrocket.com",
        &json!({"plan_name": "Premium", "promo_code": "NOSUCHCODE"}),
    )
    .await;
    assert_eq!(response.status_code(), 200);

    let params = app.billing.last_checkout().await.unwrap();
    assert_eq!(params.amount_cents, 2900);
    assert_eq!(params.discount_cents, 0);
}
