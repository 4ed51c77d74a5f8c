//! # Checkout Session Builder
//!
//! Turns a client cart into a priced provider checkout session.
//!
//! Prices in the cart are major units; every amount is converted to minor
//! units before summing or discounting, and the provider receives the same
//! minor-unit line prices plus an equivalent percent-off coupon. Both sides
//! therefore land on the same discounted total.

use crate::coupon::{apply_discount, CouponManager};
use crate::error::{PaymentError, PaymentResult};
use crate::order::{CheckoutCart, LineItem, ProductQuantity, SessionMetadata};
use crate::product::{Currency, Price};
use crate::strategy::{BoxedPaymentStrategy, CheckoutUrls};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

/// One entry of the client cart
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    /// Unit price in major currency units
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Largest accepted unit price in major units (Stripe's `unit_amount` cap)
pub const MAX_UNIT_PRICE: f64 = 999_999.99;

/// Largest accepted quantity per line
pub const MAX_QUANTITY: u32 = 10_000;

/// Validate the raw `products` value of a create-session request.
///
/// Anything other than a non-empty array of well-formed items is `InvalidInput`.
pub fn parse_cart(products: &Value) -> PaymentResult<Vec<CartItem>> {
    let is_non_empty_array = products.as_array().map_or(false, |items| !items.is_empty());
    if !is_non_empty_array {
        return Err(PaymentError::InvalidInput(
            "Invalid or empty products array".to_string(),
        ));
    }

    let items: Vec<CartItem> = serde_json::from_value(products.clone())
        .map_err(|e| PaymentError::InvalidInput(format!("Invalid cart item: {}", e)))?;

    for item in &items {
        if item.quantity == 0 || item.quantity > MAX_QUANTITY {
            return Err(PaymentError::InvalidInput(format!(
                "Quantity must be between 1 and {} for product {}",
                MAX_QUANTITY, item.id
            )));
        }
        if !item.price.is_finite() || item.price < 0.0 || item.price > MAX_UNIT_PRICE {
            return Err(PaymentError::InvalidInput(format!(
                "Invalid price for product {}",
                item.id
            )));
        }
    }

    Ok(items)
}

/// Result of a successful create-session call
#[derive(Debug, Clone)]
pub struct CheckoutQuote {
    pub session_id: String,
    pub checkout_url: Option<String>,
    /// Locally computed, post-discount total
    pub total: Price,
}

/// Builds provider checkout sessions from client carts
#[derive(Clone)]
pub struct CheckoutSessionBuilder {
    strategy: BoxedPaymentStrategy,
    coupons: CouponManager,
    urls: CheckoutUrls,
    currency: Currency,
}

impl CheckoutSessionBuilder {
    pub fn new(strategy: BoxedPaymentStrategy, coupons: CouponManager, urls: CheckoutUrls) -> Self {
        Self {
            strategy,
            coupons,
            urls,
            currency: Currency::USD,
        }
    }

    /// Price the cart, resolve the coupon and open a provider session.
    ///
    /// Nothing is persisted locally; the order only exists after reconciliation.
    #[instrument(skip(self, products), fields(provider = self.strategy.provider_name()))]
    pub async fn create_session(
        &self,
        user_id: &str,
        products: &Value,
        coupon_code: Option<&str>,
    ) -> PaymentResult<CheckoutQuote> {
        let items = parse_cart(products)?;

        let metadata = SessionMetadata {
            user_id: user_id.to_string(),
            coupon_code: coupon_code.map(String::from),
            product_quantities: items
                .iter()
                .map(|item| ProductQuantity {
                    id: item.id.clone(),
                    quantity: item.quantity,
                })
                .collect(),
        };

        let mut cart = CheckoutCart::new(self.currency, metadata);
        for item in &items {
            cart.add_item(LineItem {
                product_id: item.id.clone(),
                name: item.name.clone(),
                unit_price: Price::new(item.price, self.currency),
                quantity: item.quantity,
                image_url: item.image.clone(),
            });
        }

        let mut total = cart.subtotal();

        if let Some(code) = coupon_code {
            if let Some(coupon) = self.coupons.find_active_coupon(code, user_id).await? {
                total.amount = apply_discount(total.amount, coupon.discount_percentage);
                let provider_coupon = self
                    .strategy
                    .create_coupon(coupon.discount_percentage)
                    .await?;
                cart.discount = Some(provider_coupon);
            }
        }

        let session = self
            .strategy
            .create_checkout(&cart, &self.urls.success_url(), &self.urls.cancel_url())
            .await?;

        info!(
            "Created checkout session {} for user {}: {} items, total={}, discounted={}",
            session.session_id,
            user_id,
            cart.item_count(),
            total.display(),
            cart.discount.is_some()
        );

        Ok(CheckoutQuote {
            session_id: session.session_id,
            checkout_url: session.checkout_url,
            total,
        })
    }
}
