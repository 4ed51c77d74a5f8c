//! Stripe client tests against a mocked Stripe API.

use pay_core::{
    CheckoutCart, Currency, LineItem, PaymentError, PaymentStatus, PaymentStrategy, Price,
    ProductQuantity, SessionMetadata,
};
use pay_stripe::{StripeCheckoutStrategy, StripeConfig};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn strategy_for(server: &MockServer) -> StripeCheckoutStrategy {
    let config = StripeConfig::new("sk_test_123").with_api_base_url(server.uri());
    StripeCheckoutStrategy::new(config).unwrap()
}

fn cart(discount: Option<&str>) -> CheckoutCart {
    let mut cart = CheckoutCart::new(
        Currency::USD,
        SessionMetadata {
            user_id: "user-1".into(),
            coupon_code: discount.map(|_| "GIFTABC123".to_string()),
            product_quantities: vec![ProductQuantity {
                id: "p1".into(),
                quantity: 2,
            }],
        },
    );
    cart.add_item(LineItem {
        product_id: "p1".into(),
        name: "Socks".into(),
        unit_price: Price::from_cents(1000, Currency::USD),
        quantity: 2,
        image_url: None,
    });
    cart.discount = discount.map(String::from);
    cart
}

#[tokio::test]
async fn creates_checkout_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("Authorization", "Bearer sk_test_123"))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains("discounts%5B0%5D%5Bcoupon%5D=coupon_abc"))
        .and(body_string_contains("metadata%5BuserId%5D=user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_a1",
            "url": "https://checkout.stripe.com/c/pay/cs_test_a1",
            "expires_at": 1_900_000_000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = strategy_for(&server)
        .create_checkout(&cart(Some("coupon_abc")), "https://s", "https://c")
        .await
        .unwrap();

    assert_eq!(session.session_id, "cs_test_a1");
    assert_eq!(session.provider, "stripe");
    assert!(session.checkout_url.is_some());
    assert!(session.expires_at.is_some());
}

#[tokio::test]
async fn surfaces_stripe_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Invalid currency: xyz", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let err = strategy_for(&server)
        .create_checkout(&cart(None), "https://s", "https://c")
        .await
        .unwrap_err();

    match err {
        PaymentError::ProviderError { provider, message } => {
            assert_eq!(provider, "stripe");
            assert_eq!(message, "Invalid currency: xyz");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn retrieves_paid_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_test_paid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_paid",
            "object": "checkout.session",
            "payment_status": "paid",
            "amount_total": 25000,
            "currency": "usd",
            "metadata": {
                "userId": "user-1",
                "couponCode": "",
                "productQuantities": "[{\"id\":\"p1\",\"quantity\":2}]"
            }
        })))
        .mount(&server)
        .await;

    let session = strategy_for(&server)
        .retrieve_session("cs_test_paid")
        .await
        .unwrap();

    assert!(session.is_paid());
    assert_eq!(session.amount_total, 25000);
    assert_eq!(session.currency, Currency::USD);
    assert_eq!(session.metadata.user_id, "user-1");
    assert_eq!(session.metadata.coupon_code, None);
    assert_eq!(session.metadata.product_quantities.len(), 1);
}

#[tokio::test]
async fn retrieves_unpaid_session_with_null_amount() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_test_open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_open",
            "payment_status": "unpaid",
            "amount_total": null,
            "currency": "usd",
            "metadata": { "userId": "user-1" }
        })))
        .mount(&server)
        .await;

    let session = strategy_for(&server)
        .retrieve_session("cs_test_open")
        .await
        .unwrap();

    assert_eq!(session.payment_status, PaymentStatus::Unpaid);
    assert_eq!(session.amount_total, 0);
}

#[tokio::test]
async fn rejects_malformed_session_id_without_calling_stripe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = strategy_for(&server)
        .retrieve_session("../../v1/coupons")
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::InvalidInput(_)));
}

#[tokio::test]
async fn creates_once_coupon() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/coupons"))
        .and(body_string_contains("percent_off=10"))
        .and(body_string_contains("duration=once"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "Z4OV52SU",
            "percent_off": 10.0,
            "duration": "once"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = strategy_for(&server).create_coupon(10).await.unwrap();
    assert_eq!(id, "Z4OV52SU");
}

#[tokio::test]
async fn unreachable_api_is_network_error() {
    let config = StripeConfig::new("sk_test_123").with_api_base_url("http://127.0.0.1:1");
    let strategy = StripeCheckoutStrategy::new(config).unwrap();

    let err = strategy.create_coupon(10).await.unwrap_err();
    assert!(matches!(err, PaymentError::NetworkError(_)));
    assert!(err.is_retryable());
}
