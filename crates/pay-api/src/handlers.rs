//! # Request Handlers
//!
//! Axum request handlers for the checkout API.
//! All checkout and coupon handlers run behind `require_auth`.

use crate::auth::CurrentUser;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use pay_core::{Coupon, Order, PaymentError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create checkout session request
///
/// `products` is kept as raw JSON so that a missing or non-array value is
/// reported as an invalid cart instead of a body rejection.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub products: Value,
    #[serde(default, rename = "couponCode")]
    pub coupon_code: Option<String>,
}

/// Create checkout session response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    /// Provider session id
    pub id: String,
    /// Post-discount total in major units
    #[serde(rename = "totalAmount")]
    pub total_amount: f64,
    #[serde(rename = "checkoutUrl", skip_serializing_if = "Option::is_none", default)]
    pub checkout_url: Option<String>,
}

/// Checkout success callback request
#[derive(Debug, Deserialize)]
pub struct CheckoutSuccessRequest {
    #[serde(default, rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutSuccessResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "orderId")]
    pub order_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub count: usize,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

pub(crate) fn payment_error_to_response(err: PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    if code >= 500 {
        error!("Request failed: {}", err);
    }

    let mut response = ErrorResponse::new(err.to_string(), code);
    if let Some(reason) = err.reason() {
        response = response.with_reason(reason);
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "lightning-cart",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Price the cart and open a provider checkout session
#[instrument(skip(state, user, request), fields(user_id = %user.0.id))]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let quote = state
        .checkout
        .create_session(&user.0.id, &request.products, request.coupon_code.as_deref())
        .await
        .map_err(payment_error_to_response)?;

    info!(
        "Checkout session {} opened for {} ({})",
        quote.session_id,
        user.0.id,
        quote.total.display()
    );

    Ok(Json(CreateSessionResponse {
        id: quote.session_id,
        total_amount: quote.total.as_decimal(),
        checkout_url: quote.checkout_url,
    }))
}

/// Reconcile a paid session into an order
#[instrument(skip(state, user, request), fields(user_id = %user.0.id))]
pub async fn checkout_success(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CheckoutSuccessRequest>,
) -> Result<Json<CheckoutSuccessResponse>, (StatusCode, Json<ErrorResponse>)> {
    let result = state
        .reconciler
        .reconcile(&request.session_id)
        .await
        .map_err(payment_error_to_response)?;

    if let Some(ref coupon) = result.reward_coupon {
        info!("Reward coupon {} issued to {}", coupon.code, coupon.user_id);
    }

    Ok(Json(CheckoutSuccessResponse {
        success: true,
        message: result.message().to_string(),
        order_id: result.order.id.clone(),
    }))
}

/// The caller's active coupon, or `null`
pub async fn get_coupon(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Option<Coupon>>, (StatusCode, Json<ErrorResponse>)> {
    let coupon = state
        .coupons
        .active_coupon_for_user(&user.0.id)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(coupon))
}

/// All orders, newest first. Admin only.
pub async fn list_orders(
    State(state): State<AppState>,
) -> Result<Json<OrderListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut orders = state
        .orders
        .list_orders()
        .await
        .map_err(payment_error_to_response)?;
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let count = orders.len();
    Ok(Json(OrderListResponse { orders, count }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_carries_reason() {
        let (status, Json(body)) = payment_error_to_response(PaymentError::TokenExpired);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, 401);
        assert_eq!(body.reason.as_deref(), Some("token_expired"));
    }

    #[test]
    fn test_internal_error_has_no_reason() {
        let (status, Json(body)) =
            payment_error_to_response(PaymentError::Store("connection reset".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.reason.is_none());
    }

    #[test]
    fn test_create_session_request_defaults() {
        let request: CreateSessionRequest = serde_json::from_str("{}").unwrap();
        assert!(request.products.is_null());
        assert!(request.coupon_code.is_none());

        let request: CreateSessionRequest =
            serde_json::from_str(r#"{"products":[],"couponCode":"GIFTAB12CD"}"#).unwrap();
        assert_eq!(request.coupon_code.as_deref(), Some("GIFTAB12CD"));
    }
}
