//! # pay-stripe
//!
//! Stripe payment strategy for lightning-cart-rs.
//!
//! `StripeCheckoutStrategy` implements `pay_core::PaymentStrategy` over the
//! Stripe REST API:
//!
//! - `POST /v1/checkout/sessions` - hosted checkout with dynamic line items,
//!   a session-level discount and reconciliation metadata
//! - `GET /v1/checkout/sessions/{id}` - authoritative payment status and amount
//! - `POST /v1/coupons` - one-shot percent-off coupons mirroring local ones
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_stripe::StripeCheckoutStrategy;
//! use pay_core::PaymentStrategy;
//!
//! // Create strategy from environment
//! let strategy = StripeCheckoutStrategy::from_env()?;
//!
//! // Later, after the customer is redirected back:
//! let session = strategy.retrieve_session("cs_test_...").await?;
//! if session.is_paid() {
//!     // reconcile into an order
//! }
//! ```

pub mod checkout;
pub mod config;

// Re-exports
pub use checkout::StripeCheckoutStrategy;
pub use config::StripeConfig;
