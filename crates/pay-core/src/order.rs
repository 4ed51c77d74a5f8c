//! # Order Types
//!
//! Cart, checkout session and order types for lightning-cart.

use crate::error::{PaymentError, PaymentResult};
use crate::product::{Currency, Price, Product};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata key holding the purchasing user id
pub const META_USER_ID: &str = "userId";
/// Metadata key holding the raw coupon code ("" when none)
pub const META_COUPON_CODE: &str = "couponCode";
/// Metadata key holding the JSON snapshot of `[{id, quantity}]`
pub const META_PRODUCT_QUANTITIES: &str = "productQuantities";

/// A line item sent to the payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Product ID
    pub product_id: String,

    /// Product name (denormalized for display)
    pub name: String,

    /// Unit price
    pub unit_price: Price,

    /// Quantity
    pub quantity: u32,

    /// Optional image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl LineItem {
    /// Create a line item from a product
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            image_url: product.image_url.clone(),
        }
    }

    /// Calculate the total price for this line item
    pub fn total(&self) -> Price {
        Price {
            amount: self
                .unit_price
                .amount
                .saturating_mul(i64::from(self.quantity)),
            currency: self.unit_price.currency,
        }
    }
}

/// One `(productId, quantity)` pair captured when the session was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuantity {
    pub id: String,
    pub quantity: u32,
}

/// Metadata embedded in a provider checkout session.
///
/// This snapshot, not any later client input, is what reconciliation honors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    pub user_id: String,
    pub coupon_code: Option<String>,
    pub product_quantities: Vec<ProductQuantity>,
}

impl SessionMetadata {
    /// Encode into the flat string map providers accept
    pub fn to_map(&self) -> PaymentResult<HashMap<String, String>> {
        let mut map = HashMap::new();
        map.insert(META_USER_ID.to_string(), self.user_id.clone());
        map.insert(
            META_COUPON_CODE.to_string(),
            self.coupon_code.clone().unwrap_or_default(),
        );
        map.insert(
            META_PRODUCT_QUANTITIES.to_string(),
            serde_json::to_string(&self.product_quantities)?,
        );
        Ok(map)
    }

    /// Decode from a provider metadata map
    pub fn from_map(map: &HashMap<String, String>) -> PaymentResult<Self> {
        let user_id = map
            .get(META_USER_ID)
            .filter(|id| !id.is_empty())
            .cloned()
            .ok_or_else(|| {
                PaymentError::Serialization(format!("session metadata missing {}", META_USER_ID))
            })?;

        let coupon_code = map
            .get(META_COUPON_CODE)
            .filter(|code| !code.is_empty())
            .cloned();

        let product_quantities = match map.get(META_PRODUCT_QUANTITIES) {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => Vec::new(),
        };

        Ok(Self {
            user_id,
            coupon_code,
            product_quantities,
        })
    }
}

/// A priced cart ready to be sent to a provider
#[derive(Debug, Clone)]
pub struct CheckoutCart {
    /// Line items
    pub line_items: Vec<LineItem>,

    /// Currency (must be same for all items)
    pub currency: Currency,

    /// Provider coupon id applied at session level
    pub discount: Option<String>,

    /// Metadata snapshot for reconciliation
    pub metadata: SessionMetadata,
}

impl CheckoutCart {
    pub fn new(currency: Currency, metadata: SessionMetadata) -> Self {
        Self {
            line_items: Vec::new(),
            currency,
            discount: None,
            metadata,
        }
    }

    /// Add a line item
    pub fn add_item(&mut self, item: LineItem) {
        self.line_items.push(item);
    }

    /// Pre-discount total
    pub fn subtotal(&self) -> Price {
        let total_amount = self
            .line_items
            .iter()
            .fold(0i64, |sum, item| sum.saturating_add(item.total().amount));
        Price {
            amount: total_amount,
            currency: self.currency,
        }
    }

    /// Check if cart is empty
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// Get item count
    pub fn item_count(&self) -> u32 {
        self.line_items.iter().map(|i| i.quantity).sum()
    }
}

/// A checkout session created by a payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID
    pub session_id: String,

    /// Provider name (e.g., "stripe")
    pub provider: String,

    /// URL to redirect customer to for payment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,

    /// When the session expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(session_id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            provider: provider.into(),
            checkout_url: None,
            expires_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Payment status as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    /// Unknown statuses are treated as unpaid
    pub fn parse(status: &str) -> Self {
        match status {
            "paid" => PaymentStatus::Paid,
            "no_payment_required" => PaymentStatus::NoPaymentRequired,
            _ => PaymentStatus::Unpaid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::NoPaymentRequired => "no_payment_required",
        }
    }
}

/// Authoritative session state retrieved from the provider
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub session_id: String,
    pub payment_status: PaymentStatus,
    /// Amount actually charged, in smallest unit
    pub amount_total: i64,
    pub currency: Currency,
    pub metadata: SessionMetadata,
}

impl ProviderSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn amount_paid(&self) -> Price {
        Price::from_cents(self.amount_total, self.currency)
    }
}

/// A purchased product line, priced at purchase time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
    pub price: Price,
}

/// A persisted order. Created once per provider session, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub products: Vec<OrderLine>,
    pub total_amount: Price,
    /// Provider session id (idempotency key)
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order with generated ID
    pub fn new(
        user_id: impl Into<String>,
        products: Vec<OrderLine>,
        total_amount: Price,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            products,
            total_amount,
            session_id: session_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Get item count
    pub fn item_count(&self) -> u32 {
        self.products.iter().map(|p| p.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_total() {
        let product = Product::new("test", "Test", Price::new(10.0, Currency::USD));
        let item = LineItem::from_product(&product, 3);

        assert_eq!(item.total().amount, 3000); // $30.00 in cents
    }

    #[test]
    fn test_cart_subtotal() {
        let mut cart = CheckoutCart::new(Currency::USD, SessionMetadata::default());

        let product1 = Product::new("p1", "Product 1", Price::new(10.0, Currency::USD));
        let product2 = Product::new("p2", "Product 2", Price::new(25.0, Currency::USD));

        cart.add_item(LineItem::from_product(&product1, 2)); // $20
        cart.add_item(LineItem::from_product(&product2, 1)); // $25

        assert_eq!(cart.subtotal().amount, 4500); // $45.00
        assert_eq!(cart.item_count(), 3);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_subtotal_saturates_instead_of_wrapping() {
        let mut cart = CheckoutCart::new(Currency::USD, SessionMetadata::default());
        let product = Product::new("p1", "Yacht", Price::from_cents(i64::MAX, Currency::USD));

        cart.add_item(LineItem::from_product(&product, 2));
        cart.add_item(LineItem::from_product(&product, 1));

        assert_eq!(cart.line_items[0].total().amount, i64::MAX);
        assert_eq!(cart.subtotal().amount, i64::MAX);
    }

    #[test]
    fn test_metadata_map_keys() {
        let metadata = SessionMetadata {
            user_id: "user-1".into(),
            coupon_code: None,
            product_quantities: vec![ProductQuantity {
                id: "p1".into(),
                quantity: 2,
            }],
        };

        let map = metadata.to_map().unwrap();
        assert_eq!(map.get("userId").map(String::as_str), Some("user-1"));
        assert_eq!(map.get("couponCode").map(String::as_str), Some(""));
        assert_eq!(
            map.get("productQuantities").map(String::as_str),
            Some(r#"[{"id":"p1","quantity":2}]"#)
        );

        let decoded = SessionMetadata::from_map(&map).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn test_metadata_requires_user() {
        let mut map = HashMap::new();
        map.insert("couponCode".to_string(), "GIFTABC123".to_string());

        let err = SessionMetadata::from_map(&map).unwrap_err();
        assert!(matches!(err, PaymentError::Serialization(_)));
    }

    #[test]
    fn test_metadata_rejects_garbled_snapshot() {
        let mut map = HashMap::new();
        map.insert("userId".to_string(), "user-1".to_string());
        map.insert("productQuantities".to_string(), "not json".to_string());

        assert!(SessionMetadata::from_map(&map).is_err());
    }

    #[test]
    fn test_payment_status_parse() {
        assert_eq!(PaymentStatus::parse("paid"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::parse("unpaid"), PaymentStatus::Unpaid);
        assert_eq!(
            PaymentStatus::parse("no_payment_required"),
            PaymentStatus::NoPaymentRequired
        );
        assert_eq!(PaymentStatus::parse("something_new"), PaymentStatus::Unpaid);
    }

    #[test]
    fn test_order_new() {
        let order = Order::new(
            "user-1",
            vec![OrderLine {
                product_id: "p1".into(),
                quantity: 2,
                price: Price::new(10.0, Currency::USD),
            }],
            Price::from_cents(2000, Currency::USD),
            "cs_test_1",
        );

        assert_eq!(order.item_count(), 2);
        assert_eq!(order.total_amount.as_decimal(), 20.0);
        assert!(!order.id.is_empty());
    }
}
