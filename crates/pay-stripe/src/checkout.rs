//! # Stripe Checkout Sessions
//!
//! Implementation of the Stripe Checkout Sessions and Coupons APIs.
//! This is the payment flow for lightning-cart.

use crate::config::StripeConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pay_core::{
    CheckoutCart, CheckoutSession, Currency, PaymentError, PaymentResult, PaymentStatus,
    PaymentStrategy, ProviderSession, SessionMetadata,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe Checkout Session strategy
///
/// Uses Stripe's hosted checkout page for secure payments.
pub struct StripeCheckoutStrategy {
    config: StripeConfig,
    client: Client,
}

impl StripeCheckoutStrategy {
    /// Create a new Stripe checkout strategy
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                PaymentError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        let config = StripeConfig::from_env()?;
        Self::new(config)
    }

    /// Build form data for `POST /v1/checkout/sessions`
    fn session_form(
        cart: &CheckoutCart,
        success_url: &str,
        cancel_url: &str,
    ) -> PaymentResult<Vec<(String, String)>> {
        let mut form_params: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
        ];

        for (i, item) in cart.line_items.iter().enumerate() {
            form_params.push((
                format!("line_items[{}][price_data][currency]", i),
                item.unit_price.currency.as_str().to_string(),
            ));
            form_params.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_price.amount.to_string(),
            ));
            form_params.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            if let Some(ref image) = item.image_url {
                form_params.push((
                    format!("line_items[{}][price_data][product_data][images][0]", i),
                    image.clone(),
                ));
            }
            form_params.push((
                format!("line_items[{}][quantity]", i),
                item.quantity.to_string(),
            ));
        }

        if let Some(ref coupon_id) = cart.discount {
            form_params.push(("discounts[0][coupon]".to_string(), coupon_id.clone()));
        }

        let mut metadata: Vec<(String, String)> = cart.metadata.to_map()?.into_iter().collect();
        metadata.sort();
        for (key, value) in metadata {
            form_params.push((format!("metadata[{}]", key), value));
        }

        Ok(form_params)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
    }

    /// Send a request and decode a success body, mapping Stripe error payloads
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> PaymentResult<T> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(PaymentError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: error_response.error.message,
                });
            }

            return Err(PaymentError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

/// Stripe ids are `[A-Za-z0-9_]`; anything else must not reach the URL path.
fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= 255
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl PaymentStrategy for StripeCheckoutStrategy {
    #[instrument(skip(self, cart), fields(user_id = %cart.metadata.user_id))]
    async fn create_checkout(
        &self,
        cart: &CheckoutCart,
        success_url: &str,
        cancel_url: &str,
    ) -> PaymentResult<CheckoutSession> {
        if cart.is_empty() {
            return Err(PaymentError::InvalidInput("Cart has no items".to_string()));
        }

        let form_params = Self::session_form(cart, success_url, cancel_url)?;

        debug!(
            "Creating Stripe checkout session: {} items, discount={:?}",
            cart.line_items.len(),
            cart.discount
        );

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let session_response: StripeCheckoutSessionResponse =
            self.send(self.client.post(&url).form(&form_params)).await?;

        info!("Created Stripe checkout session: id={}", session_response.id);

        let expires_at = session_response
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0));

        Ok(CheckoutSession {
            session_id: session_response.id,
            provider: PROVIDER.to_string(),
            checkout_url: session_response.url,
            expires_at,
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> PaymentResult<ProviderSession> {
        if !is_valid_session_id(session_id) {
            return Err(PaymentError::InvalidInput(format!(
                "Malformed session id: {}",
                session_id
            )));
        }

        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url, session_id
        );
        let session: StripeSessionState = self.send(self.client.get(&url)).await?;

        debug!(
            "Retrieved Stripe session {}: payment_status={}, amount_total={:?}",
            session.id, session.payment_status, session.amount_total
        );

        let currency = session
            .currency
            .as_deref()
            .and_then(Currency::from_code)
            .unwrap_or_default();

        Ok(ProviderSession {
            payment_status: PaymentStatus::parse(&session.payment_status),
            amount_total: session.amount_total.unwrap_or_default(),
            currency,
            metadata: SessionMetadata::from_map(&session.metadata)?,
            session_id: session.id,
        })
    }

    #[instrument(skip(self))]
    async fn create_coupon(&self, percent_off: u32) -> PaymentResult<String> {
        let url = format!("{}/v1/coupons", self.config.api_base_url);
        let form_params = [
            ("percent_off", percent_off.to_string()),
            ("duration", "once".to_string()),
        ];

        let coupon: StripeCouponResponse =
            self.send(self.client.post(&url).form(&form_params)).await?;

        info!("Created Stripe coupon {} ({}% off)", coupon.id, percent_off);
        Ok(coupon.id)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeSessionState {
    id: String,
    payment_status: String,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeCouponResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}
