//! # Payment Strategy Trait
//!
//! Core Strategy pattern trait for payment providers.
//!
//! ## Design Pattern
//!
//! The checkout builder and the reconciler only talk to the provider through
//! this trait. The server injects the Stripe implementation; tests inject a
//! fake that records calls and serves canned sessions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentStrategy (trait)                  │
//! │  ├── create_checkout()                                      │
//! │  ├── retrieve_session()                                     │
//! │  ├── create_coupon()                                        │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                    ┌───────┴───────┐
//!                    │StripeCheckout │
//!                    │   Strategy    │
//!                    └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::order::{CheckoutCart, CheckoutSession, ProviderSession};
use async_trait::async_trait;
use std::sync::Arc;

/// Placeholder the provider substitutes with the real session id on redirect
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    /// Create a checkout session and return the provider's handle.
    ///
    /// # Arguments
    /// * `cart` - Priced line items, optional session discount, metadata
    /// * `success_url` - URL to redirect after successful payment
    /// * `cancel_url` - URL to redirect if customer cancels
    async fn create_checkout(
        &self,
        cart: &CheckoutCart,
        success_url: &str,
        cancel_url: &str,
    ) -> PaymentResult<CheckoutSession>;

    /// Fetch the authoritative state of a session.
    async fn retrieve_session(&self, session_id: &str) -> PaymentResult<ProviderSession>;

    /// Create a one-shot percent-off coupon and return its provider id.
    async fn create_coupon(&self, percent_off: u32) -> PaymentResult<String>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a boxed payment strategy (dynamic dispatch)
pub type BoxedPaymentStrategy = Arc<dyn PaymentStrategy>;

/// Configuration for redirect URLs used in checkout
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the storefront client (e.g., "https://shop.example.com")
    pub base_url: String,
    /// Success page path
    pub success_path: String,
    /// Cancel page path
    pub cancel_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            success_path: "/purchase-success".to_string(),
            cancel_path: "/purchase-cancel".to_string(),
        }
    }

    /// Success URL templated with the provider's session id placeholder
    pub fn success_url(&self) -> String {
        format!(
            "{}{}?session_id={}",
            self.base_url, self.success_path, SESSION_ID_PLACEHOLDER
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}{}", self.base_url, self.cancel_path)
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:5173")
    }
}
