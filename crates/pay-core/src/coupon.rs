//! # Coupons
//!
//! Per-user, single-use percentage discount codes.
//!
//! A coupon is looked up by the `(code, user_id)` pair, never by code alone.
//! Reward codes are random and not checked for global uniqueness: two users
//! may hold the same code without interfering with each other.

use crate::error::PaymentResult;
use crate::store::CouponStore;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Prefix of every reward coupon code
pub const REWARD_CODE_PREFIX: &str = "GIFT";
/// Random characters appended to the prefix
pub const REWARD_CODE_LEN: usize = 6;
/// Discount granted by a reward coupon
pub const REWARD_DISCOUNT_PERCENTAGE: u32 = 10;
/// Reward coupons expire this many days after issuance
pub const REWARD_VALIDITY_DAYS: i64 = 30;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A discount coupon owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    /// 0–100
    pub discount_percentage: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub user_id: String,
    pub expiration_date: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Coupon {
    /// Build a fresh reward coupon for `user_id` issued at `now`
    pub fn reward(user_id: impl Into<String>, code: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            code: code.into(),
            discount_percentage: REWARD_DISCOUNT_PERCENTAGE,
            is_active: true,
            user_id: user_id.into(),
            expiration_date: now + Duration::days(REWARD_VALIDITY_DAYS),
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date <= now
    }
}

/// Discount in minor units, rounded half up.
///
/// Percentages above 100 are clamped.
pub fn discount_amount(amount: i64, percentage: u32) -> i64 {
    let pct = i128::from(percentage.min(100));
    let discount = (i128::from(amount) * pct + 50).div_euclid(100);
    // |discount| <= |amount|, so the narrowing cannot fail
    i64::try_from(discount).unwrap_or(amount)
}

/// `amount - round(amount * percentage / 100)` in minor units
pub fn apply_discount(amount: i64, percentage: u32) -> i64 {
    amount - discount_amount(amount, percentage)
}

/// `GIFT` followed by random uppercase alphanumerics
pub fn generate_reward_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(REWARD_CODE_PREFIX.len() + REWARD_CODE_LEN);
    code.push_str(REWARD_CODE_PREFIX);
    for _ in 0..REWARD_CODE_LEN {
        let idx = rng.gen_range(0..CODE_CHARSET.len());
        code.push(char::from(CODE_CHARSET[idx]));
    }
    code
}

/// Coupon lookups, redemption and reward issuance over a `CouponStore`
#[derive(Clone)]
pub struct CouponManager {
    store: Arc<dyn CouponStore>,
}

impl CouponManager {
    pub fn new(store: Arc<dyn CouponStore>) -> Self {
        Self { store }
    }

    /// Active coupon matching both code and owner.
    ///
    /// Codes are matched after trimming. A miss is not an error; checkout
    /// proceeds at full price.
    #[instrument(skip(self))]
    pub async fn find_active_coupon(
        &self,
        code: &str,
        user_id: &str,
    ) -> PaymentResult<Option<Coupon>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        let coupon = self.store.find_active(code, user_id).await?;
        if coupon.is_none() {
            debug!("No active coupon {} for user {}", code, user_id);
        }
        Ok(coupon)
    }

    /// Mark a coupon as used. Absent or already inactive coupons are a no-op.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, code: &str, user_id: &str) -> PaymentResult<()> {
        let code = code.trim();
        if self.store.deactivate(code, user_id).await? {
            info!("Deactivated coupon {} for user {}", code, user_id);
        } else {
            debug!("Coupon {} for user {} already inactive or absent", code, user_id);
        }
        Ok(())
    }

    /// Replace whatever the user holds with a new reward coupon.
    #[instrument(skip(self))]
    pub async fn issue_reward(&self, user_id: &str) -> PaymentResult<Coupon> {
        let removed = self.store.delete_for_user(user_id).await?;
        let code = generate_reward_code(&mut rand::thread_rng());
        let coupon = Coupon::reward(user_id, code, Utc::now());

        self.store.insert_coupon(coupon.clone()).await?;

        info!(
            "Issued reward coupon {} ({}% off) to user {}, replaced {}",
            coupon.code, coupon.discount_percentage, user_id, removed
        );
        Ok(coupon)
    }

    pub async fn active_coupon_for_user(&self, user_id: &str) -> PaymentResult<Option<Coupon>> {
        self.store.find_active_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded_coupon(code: &str, user_id: &str, pct: u32) -> Coupon {
        Coupon {
            code: code.to_string(),
            discount_percentage: pct,
            is_active: true,
            user_id: user_id.to_string(),
            expiration_date: Utc::now() + Duration::days(10),
            created_at: Utc::now(),
        }
    }

    fn manager_with(store: &Arc<MemoryStore>) -> CouponManager {
        CouponManager::new(store.clone())
    }

    #[test]
    fn test_apply_discount_rounds_half_up() {
        assert_eq!(apply_discount(2000, 10), 1800);
        assert_eq!(apply_discount(1995, 10), 1795); // 199.5 -> 200
        assert_eq!(apply_discount(1994, 10), 1795); // 199.4 -> 199
        assert_eq!(apply_discount(999, 0), 999);
        assert_eq!(apply_discount(999, 100), 0);
        assert_eq!(apply_discount(999, 150), 0);
    }

    #[test]
    fn test_apply_discount_large_amounts() {
        assert_eq!(apply_discount(i64::MAX, 0), i64::MAX);
        assert_eq!(apply_discount(i64::MAX, 100), 0);
        assert!(apply_discount(i64::MAX, 10) > 0);
    }

    #[test]
    fn test_apply_discount_across_percentages() {
        let total = 12_345;
        for pct in 0..=100u32 {
            let expected = total - ((total as f64) * f64::from(pct) / 100.0).round() as i64;
            assert_eq!(apply_discount(total, pct), expected, "pct={}", pct);
        }
    }

    #[test]
    fn test_reward_code_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let code = generate_reward_code(&mut rng);

        assert_eq!(code.len(), 10);
        assert!(code.starts_with("GIFT"));
        assert!(code[4..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_find_requires_owner_and_active() {
        let store = MemoryStore::new().shared();
        store.put_coupon(seeded_coupon("SPRING20", "user-1", 20));
        let coupons = manager_with(&store);

        let found = coupons.find_active_coupon("SPRING20", "user-1").await.unwrap();
        assert_eq!(found.map(|c| c.discount_percentage), Some(20));

        assert!(coupons
            .find_active_coupon("SPRING20", "user-2")
            .await
            .unwrap()
            .is_none());
        assert!(coupons.find_active_coupon("", "user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deactivated_coupon_never_found() {
        let store = MemoryStore::new().shared();
        store.put_coupon(seeded_coupon("SPRING20", "user-1", 20));
        let coupons = manager_with(&store);

        coupons.deactivate("SPRING20", "user-1").await.unwrap();
        coupons.deactivate("SPRING20", "user-1").await.unwrap();
        coupons.deactivate("NOPE", "user-1").await.unwrap();

        assert!(coupons
            .find_active_coupon("SPRING20", "user-1")
            .await
            .unwrap()
            .is_none());
        assert!(coupons.active_coupon_for_user("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_padded_code_matches_and_deactivates() {
        let store = MemoryStore::new().shared();
        store.put_coupon(seeded_coupon("SPRING20", "user-1", 20));
        let coupons = manager_with(&store);

        assert!(coupons
            .find_active_coupon(" SPRING20 ", "user-1")
            .await
            .unwrap()
            .is_some());

        coupons.deactivate(" SPRING20 ", "user-1").await.unwrap();
        assert!(coupons.active_coupon_for_user("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_issue_reward_replaces_existing() {
        let store = MemoryStore::new().shared();
        store.put_coupon(seeded_coupon("OLD1", "user-1", 25));
        store.put_coupon(seeded_coupon("OTHER", "user-2", 25));
        let coupons = manager_with(&store);

        let before = Utc::now();
        let reward = coupons.issue_reward("user-1").await.unwrap();

        let owned = store.coupons_for_user("user-1");
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0], reward);
        assert_eq!(reward.discount_percentage, 10);
        assert!(reward.is_active);
        assert!(reward.code.starts_with("GIFT"));

        let validity = reward.expiration_date - before;
        assert!(validity >= Duration::days(30));
        assert!(validity < Duration::days(30) + Duration::minutes(1));

        assert_eq!(store.coupons_for_user("user-2").len(), 1);
    }

    #[test]
    fn test_coupon_expiry() {
        let now = Utc::now();
        let coupon = Coupon::reward("user-1", "GIFTAAAAAA", now);
        assert!(!coupon.is_expired_at(now));
        assert!(coupon.is_expired_at(now + Duration::days(30)));
    }
}
