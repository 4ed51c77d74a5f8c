//! # Persistence Traits
//!
//! The checkout core reads users and products, and writes orders and coupons,
//! through these traits. `MemoryStore` implements all four on `DashMap` and is
//! what the server runs with; seed data is loaded from TOML.
//!
//! `OrderStore::insert_if_absent` is the enforcement point for the
//! one-order-per-session invariant. Implementations must make the check and
//! the insert a single atomic step.

use crate::coupon::Coupon;
use crate::error::{PaymentError, PaymentResult};
use crate::order::Order;
use crate::product::Product;
use crate::user::User;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> PaymentResult<Option<User>>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Products matching any of `ids`; unknown ids are silently skipped.
    async fn find_products(&self, ids: &[String]) -> PaymentResult<Vec<Product>>;
}

/// Result of an atomic insert keyed by provider session id
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Order),
    /// Another writer got there first; carries the stored order
    Existing(Order),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_session(&self, session_id: &str) -> PaymentResult<Option<Order>>;

    /// Insert unless an order for the same session id already exists.
    async fn insert_if_absent(&self, order: Order) -> PaymentResult<InsertOutcome>;

    async fn list_orders(&self) -> PaymentResult<Vec<Order>>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Coupon with matching code and owner that is still active
    async fn find_active(&self, code: &str, user_id: &str) -> PaymentResult<Option<Coupon>>;

    async fn find_active_for_user(&self, user_id: &str) -> PaymentResult<Option<Coupon>>;

    /// Mark inactive. Returns whether an active coupon was changed.
    async fn deactivate(&self, code: &str, user_id: &str) -> PaymentResult<bool>;

    /// Remove every coupon owned by `user_id`, returning how many were removed.
    async fn delete_for_user(&self, user_id: &str) -> PaymentResult<usize>;

    async fn insert_coupon(&self, coupon: Coupon) -> PaymentResult<()>;
}

/// Initial data for the in-memory store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
}

impl SeedData {
    /// Load seed data from TOML string
    pub fn from_toml(toml_str: &str) -> PaymentResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| PaymentError::Configuration(format!("invalid seed data: {}", e)))
    }
}

/// In-process store backed by concurrent maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    products: DashMap<String, Product>,
    /// Keyed by provider session id
    orders: DashMap<String, Order>,
    /// Keyed by (user id, code)
    coupons: DashMap<(String, String), Coupon>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let store = Self::new();
        for user in seed.users {
            store.put_user(user);
        }
        for product in seed.products {
            store.put_product(product);
        }
        for coupon in seed.coupons {
            store.put_coupon(coupon);
        }
        store
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn put_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn put_product(&self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn put_coupon(&self, coupon: Coupon) {
        self.coupons
            .insert((coupon.user_id.clone(), coupon.code.clone()), coupon);
    }

    pub fn remove_user(&self, user_id: &str) {
        self.users.remove(user_id);
    }

    /// Every coupon owned by a user, active or not
    pub fn coupons_for_user(&self, user_id: &str) -> Vec<Coupon> {
        self.coupons
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> PaymentResult<Option<User>> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn find_products(&self, ids: &[String]) -> PaymentResult<Vec<Product>> {
        let mut found: Vec<Product> = Vec::with_capacity(ids.len());
        for id in ids {
            if found.iter().any(|p| &p.id == id) {
                continue;
            }
            if let Some(product) = self.products.get(id) {
                found.push(product.value().clone());
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_by_session(&self, session_id: &str) -> PaymentResult<Option<Order>> {
        Ok(self.orders.get(session_id).map(|o| o.value().clone()))
    }

    async fn insert_if_absent(&self, order: Order) -> PaymentResult<InsertOutcome> {
        match self.orders.entry(order.session_id.clone()) {
            Entry::Occupied(existing) => Ok(InsertOutcome::Existing(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(InsertOutcome::Inserted(order))
            }
        }
    }

    async fn list_orders(&self) -> PaymentResult<Vec<Order>> {
        let mut orders: Vec<Order> = self.orders.iter().map(|o| o.value().clone()).collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn find_active(&self, code: &str, user_id: &str) -> PaymentResult<Option<Coupon>> {
        let key = (user_id.to_string(), code.to_string());
        Ok(self
            .coupons
            .get(&key)
            .filter(|c| c.is_active)
            .map(|c| c.value().clone()))
    }

    async fn find_active_for_user(&self, user_id: &str) -> PaymentResult<Option<Coupon>> {
        Ok(self
            .coupons
            .iter()
            .find(|entry| entry.key().0 == user_id && entry.value().is_active)
            .map(|entry| entry.value().clone()))
    }

    async fn deactivate(&self, code: &str, user_id: &str) -> PaymentResult<bool> {
        let key = (user_id.to_string(), code.to_string());
        match self.coupons.get_mut(&key) {
            Some(mut coupon) if coupon.is_active => {
                coupon.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_for_user(&self, user_id: &str) -> PaymentResult<usize> {
        let mut removed = 0;
        self.coupons.retain(|(owner, _), _| {
            let keep = owner != user_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn insert_coupon(&self, coupon: Coupon) -> PaymentResult<()> {
        self.put_coupon(coupon);
        Ok(())
    }
}
