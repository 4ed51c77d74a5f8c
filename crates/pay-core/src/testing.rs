//! In-process `PaymentStrategy` for tests.
//!
//! Behaves like a provider that recomputes the session total from line items
//! and its own percent-off coupons. Sessions start unpaid; tests flip them
//! with [`FakeStrategy::mark_paid`].

use crate::coupon::apply_discount;
use crate::error::{PaymentError, PaymentResult};
use crate::order::{CheckoutCart, CheckoutSession, PaymentStatus, ProviderSession};
use crate::strategy::PaymentStrategy;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct FakeStrategy {
    carts: Mutex<Vec<CheckoutCart>>,
    urls: Mutex<Vec<(String, String)>>,
    sessions: Mutex<HashMap<String, ProviderSession>>,
    coupons: Mutex<HashMap<String, u32>>,
    retrievals: AtomicUsize,
    next_id: AtomicUsize,
    fail_retrieve: Mutex<bool>,
}

impl FakeStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn last_cart(&self) -> Option<CheckoutCart> {
        self.carts.lock().ok()?.last().cloned()
    }

    pub fn last_urls(&self) -> Option<(String, String)> {
        self.urls.lock().ok()?.last().cloned()
    }

    pub fn session(&self, session_id: &str) -> Option<ProviderSession> {
        self.sessions.lock().ok()?.get(session_id).cloned()
    }

    pub fn coupons_created(&self) -> usize {
        self.coupons.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }

    /// Register a session directly, bypassing `create_checkout`
    pub fn insert_session(&self, session: ProviderSession) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session.session_id.clone(), session);
        }
    }

    pub fn mark_paid(&self, session_id: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            if let Some(session) = sessions.get_mut(session_id) {
                session.payment_status = PaymentStatus::Paid;
            }
        }
    }

    /// Make every subsequent `retrieve_session` fail with a provider error
    pub fn fail_retrievals(&self) {
        if let Ok(mut flag) = self.fail_retrieve.lock() {
            *flag = true;
        }
    }
}

#[async_trait]
impl PaymentStrategy for FakeStrategy {
    async fn create_checkout(
        &self,
        cart: &CheckoutCart,
        success_url: &str,
        cancel_url: &str,
    ) -> PaymentResult<CheckoutSession> {
        let id = format!("cs_test_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        let percent_off = cart
            .discount
            .as_ref()
            .and_then(|coupon_id| self.coupons.lock().ok()?.get(coupon_id).copied());
        let subtotal = cart.subtotal().amount;
        let amount_total = match percent_off {
            Some(pct) => apply_discount(subtotal, pct),
            None => subtotal,
        };

        self.insert_session(ProviderSession {
            session_id: id.clone(),
            payment_status: PaymentStatus::Unpaid,
            amount_total,
            currency: cart.currency,
            metadata: cart.metadata.clone(),
        });

        let poisoned = || PaymentError::Internal("fake strategy lock poisoned".into());
        self.carts.lock().map_err(|_| poisoned())?.push(cart.clone());
        self.urls
            .lock()
            .map_err(|_| poisoned())?
            .push((success_url.to_string(), cancel_url.to_string()));

        let mut session = CheckoutSession::new(id.clone(), self.provider_name());
        session.checkout_url = Some(format!("https://checkout.test/{}", id));
        Ok(session)
    }

    async fn retrieve_session(&self, session_id: &str) -> PaymentResult<ProviderSession> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);

        if self.fail_retrieve.lock().map(|f| *f).unwrap_or(false) {
            return Err(PaymentError::ProviderError {
                provider: "fake".into(),
                message: "provider unavailable".into(),
            });
        }

        self.session(session_id)
            .ok_or_else(|| PaymentError::ProviderError {
                provider: "fake".into(),
                message: format!("No such checkout.session: '{}'", session_id),
            })
    }

    async fn create_coupon(&self, percent_off: u32) -> PaymentResult<String> {
        let mut coupons = self
            .coupons
            .lock()
            .map_err(|_| PaymentError::Internal("fake strategy lock poisoned".into()))?;
        let id = format!("coupon_test_{}", coupons.len() + 1);
        coupons.insert(id.clone(), percent_off);
        Ok(id)
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
