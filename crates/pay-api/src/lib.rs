//! # pay-api
//!
//! HTTP API layer for lightning-cart-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Access-token authentication and the admin gate
//! - Checkout session and payment reconciliation endpoints
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/checkout/create-session` | Create checkout session |
//! | POST | `/checkout/success` | Reconcile a paid session |
//! | GET | `/coupons` | Caller's active coupon |
//! | GET | `/admin/orders` | List orders (admin) |

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{CurrentUser, TokenVerifier};
pub use routes::create_router;
pub use state::{AppConfig, AppState};
