//! # pay-core
//!
//! Core types and services for the lightning-cart checkout backend.
//!
//! This crate provides:
//! - `PaymentStrategy` trait for implementing payment providers
//! - `CouponManager` for per-user single-use discount coupons
//! - `CheckoutSessionBuilder` to price carts into provider sessions
//! - `PaymentReconciler` to turn paid sessions into orders exactly once
//! - Store traits (`OrderStore`, `CouponStore`, ...) and an in-memory `MemoryStore`
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{CheckoutSessionBuilder, CheckoutUrls, CouponManager, MemoryStore, PaymentReconciler};
//!
//! let store = MemoryStore::from_seed(seed).shared();
//! let coupons = CouponManager::new(store.clone());
//!
//! let builder = CheckoutSessionBuilder::new(strategy.clone(), coupons.clone(), CheckoutUrls::new(client_url));
//! let quote = builder.create_session(&user.id, &products, coupon_code).await?;
//!
//! // ... customer pays, provider redirects back with the session id ...
//!
//! let reconciler = PaymentReconciler::new(strategy, store.clone(), store.clone(), coupons);
//! let result = reconciler.reconcile(&quote.session_id).await?;
//! ```

pub mod checkout;
pub mod coupon;
pub mod error;
pub mod order;
pub mod product;
pub mod reconcile;
pub mod store;
pub mod strategy;
pub mod user;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports for convenience
pub use checkout::{parse_cart, CartItem, CheckoutQuote, CheckoutSessionBuilder};
pub use coupon::{apply_discount, Coupon, CouponManager};
pub use error::{PaymentError, PaymentResult};
pub use order::{
    CheckoutCart, CheckoutSession, LineItem, Order, OrderLine, PaymentStatus, ProductQuantity,
    ProviderSession, SessionMetadata,
};
pub use product::{Currency, Price, Product};
pub use reconcile::{PaymentReconciler, Reconciliation, REWARD_THRESHOLD_CENTS};
pub use store::{
    CouponStore, InsertOutcome, MemoryStore, OrderStore, ProductStore, SeedData, UserStore,
};
pub use strategy::{BoxedPaymentStrategy, CheckoutUrls, PaymentStrategy};
pub use user::{authorize, Role, User};
