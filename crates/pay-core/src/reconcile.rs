//! # Payment Reconciliation
//!
//! Converts a confirmed provider payment into exactly one local order.
//!
//! The session id arrives from a client redirect and is attacker-controlled.
//! Everything about the purchase (payer, coupon, products, amount) is
//! re-derived from the provider's copy of the session.
//!
//! ```text
//!  retrieve session ──► not paid ──────────────► PaymentIncomplete
//!        │
//!        ▼
//!  order for session? ──► yes ─────────────────► existing order (replay)
//!        │ no
//!        ▼
//!  deactivate coupon ─► rebuild lines ─► insert_if_absent
//!                                          │          │
//!                                      inserted    conflict ──► winner's order
//!                                          │
//!                         paid ≥ threshold ─► issue reward coupon
//! ```
//!
//! A failure between coupon deactivation and order insert leaves the coupon
//! spent without an order. Replaying the same session finishes the job, since
//! deactivation is idempotent and the insert is keyed by session id.

use crate::coupon::{Coupon, CouponManager};
use crate::error::{PaymentError, PaymentResult};
use crate::order::{Order, OrderLine, ProductQuantity};
use crate::store::{InsertOutcome, OrderStore, ProductStore};
use crate::strategy::BoxedPaymentStrategy;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Paid amount (minor units) at or above which the buyer earns a reward coupon
pub const REWARD_THRESHOLD_CENTS: i64 = 20_000;

/// Outcome of reconciling one session
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub order: Order,
    /// True when the order already existed (replayed callback or lost race)
    pub already_processed: bool,
    pub reward_coupon: Option<Coupon>,
}

impl Reconciliation {
    pub fn message(&self) -> &'static str {
        if self.already_processed {
            "Order already processed."
        } else {
            "Payment successful, order created, and coupon deactivated if used."
        }
    }
}

/// Reconciles provider sessions into orders
#[derive(Clone)]
pub struct PaymentReconciler {
    strategy: BoxedPaymentStrategy,
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    coupons: CouponManager,
    reward_threshold: i64,
}

impl PaymentReconciler {
    pub fn new(
        strategy: BoxedPaymentStrategy,
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductStore>,
        coupons: CouponManager,
    ) -> Self {
        Self {
            strategy,
            orders,
            products,
            coupons,
            reward_threshold: REWARD_THRESHOLD_CENTS,
        }
    }

    #[instrument(skip(self), fields(provider = self.strategy.provider_name()))]
    pub async fn reconcile(&self, session_id: &str) -> PaymentResult<Reconciliation> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(PaymentError::InvalidInput("sessionId is required".to_string()));
        }

        let session = self.strategy.retrieve_session(session_id).await?;
        if !session.is_paid() {
            warn!(
                "Session {} not paid (status={})",
                session_id,
                session.payment_status.as_str()
            );
            return Err(PaymentError::PaymentIncomplete {
                session_id: session_id.to_string(),
                status: session.payment_status.as_str().to_string(),
            });
        }

        if let Some(existing) = self.orders.find_by_session(session_id).await? {
            info!("Session {} already reconciled as order {}", session_id, existing.id);
            return Ok(Reconciliation {
                order: existing,
                already_processed: true,
                reward_coupon: None,
            });
        }

        let metadata = &session.metadata;
        if let Some(code) = metadata.coupon_code.as_deref() {
            self.coupons.deactivate(code, &metadata.user_id).await?;
        }

        let lines = self.order_lines(&metadata.product_quantities).await?;
        let order = Order::new(&metadata.user_id, lines, session.amount_paid(), session_id);

        let order = match self.orders.insert_if_absent(order).await? {
            InsertOutcome::Inserted(order) => order,
            InsertOutcome::Existing(winner) => {
                info!(
                    "Concurrent reconciliation of {} already stored order {}",
                    session_id, winner.id
                );
                return Ok(Reconciliation {
                    order: winner,
                    already_processed: true,
                    reward_coupon: None,
                });
            }
        };

        info!(
            "Created order {} for user {}: {} items, total={}",
            order.id,
            order.user_id,
            order.item_count(),
            order.total_amount.display()
        );

        let reward_coupon = if session.amount_total >= self.reward_threshold {
            Some(self.coupons.issue_reward(&metadata.user_id).await?)
        } else {
            None
        };

        Ok(Reconciliation {
            order,
            already_processed: false,
            reward_coupon,
        })
    }

    /// Lines from the session snapshot, priced from current product records.
    async fn order_lines(&self, snapshot: &[ProductQuantity]) -> PaymentResult<Vec<OrderLine>> {
        let ids: Vec<String> = snapshot.iter().map(|p| p.id.clone()).collect();
        let products = self.products.find_products(&ids).await?;

        let mut lines = Vec::with_capacity(snapshot.len());
        for entry in snapshot {
            match products.iter().find(|p| p.id == entry.id) {
                Some(product) => lines.push(OrderLine {
                    product_id: product.id.clone(),
                    quantity: entry.quantity,
                    price: product.price,
                }),
                None => warn!("Product {} from session snapshot no longer exists", entry.id),
            }
        }
        Ok(lines)
    }
}
