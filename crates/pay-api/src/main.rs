//! # Lightning-Cart RS
//!
//! Checkout backend: Stripe sessions, single-use coupons and order reconciliation.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export ACCESS_TOKEN_SECRET=...
//! export CLIENT_URL=http://localhost:5173
//!
//! # Run the server
//! lightning-cart
//! ```

use pay_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Storefront: {}", state.config.client_url);

    let app = routes::create_router(state);

    info!("Lightning-Cart starting on http://{}", addr);

    if !is_prod {
        info!("Health: GET http://{}/health", addr);
        info!("Checkout: POST http://{}/checkout/create-session", addr);
        info!("Success: POST http://{}/checkout/success", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ⚡ Lightning-Cart RS ⚡
  ━━━━━━━━━━━━━━━━━━━━━━━
  Checkout backend
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
