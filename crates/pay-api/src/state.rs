//! # Application State
//!
//! Shared state for the Axum application.
//! Wires the store, payment strategy and checkout services together.

use crate::auth::TokenVerifier;
use anyhow::Context;
use pay_core::{
    BoxedPaymentStrategy, CheckoutSessionBuilder, CheckoutUrls, CouponManager, CouponStore,
    MemoryStore, OrderStore, PaymentReconciler, ProductStore, SeedData, UserStore,
};
use pay_stripe::StripeCheckoutStrategy;
use std::net::SocketAddr;
use std::sync::Arc;

const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Storefront origin; checkout redirects and CORS use it
    pub client_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// HS256 secret for access tokens
    pub access_token_secret: String,
    /// Seed file with products, users and coupons
    pub seed_path: Option<String>,
}

impl AppConfig {
    /// Load from environment variables.
    ///
    /// `ACCESS_TOKEN_SECRET` is required; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let access_token_secret = std::env::var("ACCESS_TOKEN_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .context("ACCESS_TOKEN_SECRET not set")?;

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            client_url: std::env::var("CLIENT_URL")
                .unwrap_or_else(|_| DEFAULT_CLIENT_URL.to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            access_token_secret,
            seed_path: std::env::var("SEED_PATH").ok().filter(|p| !p.is_empty()),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub verifier: TokenVerifier,
    pub checkout: CheckoutSessionBuilder,
    pub reconciler: PaymentReconciler,
    pub coupons: CouponManager,
    pub orders: Arc<dyn OrderStore>,
    pub config: AppConfig,
}

impl AppState {
    /// Create state from the environment with the Stripe strategy and a seeded memory store
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let seed = load_seed(config.seed_path.as_deref())?;
        let store = MemoryStore::from_seed(seed).shared();
        tracing::info!("Store seeded with {} products", store.product_count());

        let stripe_strategy = StripeCheckoutStrategy::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        Ok(Self::with_store(
            config,
            Arc::new(stripe_strategy) as BoxedPaymentStrategy,
            store,
        ))
    }

    /// Assemble state around any store implementing every persistence trait
    pub fn with_store<S>(config: AppConfig, strategy: BoxedPaymentStrategy, store: Arc<S>) -> Self
    where
        S: UserStore + ProductStore + OrderStore + CouponStore + 'static,
    {
        let coupons = CouponManager::new(store.clone() as Arc<dyn CouponStore>);
        let urls = CheckoutUrls::new(&config.client_url);

        Self {
            verifier: TokenVerifier::new(
                &config.access_token_secret,
                store.clone() as Arc<dyn UserStore>,
            ),
            checkout: CheckoutSessionBuilder::new(strategy.clone(), coupons.clone(), urls),
            reconciler: PaymentReconciler::new(
                strategy,
                store.clone() as Arc<dyn OrderStore>,
                store.clone() as Arc<dyn ProductStore>,
                coupons.clone(),
            ),
            coupons,
            orders: store as Arc<dyn OrderStore>,
            config,
        }
    }
}

/// Load seed data from `path`, or from the first `config/seed.toml` found
fn load_seed(path: Option<&str>) -> anyhow::Result<SeedData> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path))?;
        return parse_seed(path, &content);
    }

    let config_paths = [
        "config/seed.toml",
        "../config/seed.toml",
        "../../config/seed.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            return parse_seed(path, &content);
        }
    }

    tracing::warn!("No seed file found, starting with an empty store");
    Ok(SeedData::default())
}

fn parse_seed(path: &str, content: &str) -> anyhow::Result<SeedData> {
    let seed = SeedData::from_toml(content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
    tracing::info!(
        "Loaded {} products, {} users, {} coupons from {}",
        seed.products.len(),
        seed.users.len(),
        seed.coupons.len(),
        path
    );
    Ok(seed)
}
