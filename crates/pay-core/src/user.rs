//! # User Identity
//!
//! Users are owned by an external identity store; the checkout core only
//! reads them by id and checks their role.

use crate::error::{PaymentError, PaymentResult};
use serde::{Deserialize, Serialize};

/// Role claim carried by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::Customer
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

/// A resolved user identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: String::new(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Authorization predicate evaluated against a resolved identity.
///
/// Admins satisfy every requirement; customers only satisfy `Role::Customer`.
pub fn authorize(user: &User, required: Role) -> PaymentResult<()> {
    match (required, user.role) {
        (Role::Customer, _) | (Role::Admin, Role::Admin) => Ok(()),
        (Role::Admin, Role::Customer) => Err(PaymentError::Forbidden(format!(
            "{} role required",
            required.as_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_passes_every_role() {
        let admin = User::new("u-1", "Ada", Role::Admin);
        assert!(authorize(&admin, Role::Admin).is_ok());
        assert!(authorize(&admin, Role::Customer).is_ok());
    }

    #[test]
    fn test_customer_forbidden_from_admin() {
        let customer = User::new("u-2", "Bob", Role::Customer);
        assert!(authorize(&customer, Role::Customer).is_ok());

        let err = authorize(&customer, Role::Admin).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_role_defaults_to_customer() {
        let user: User = toml::from_str(
            r#"
            id = "u-3"
            name = "Cleo"
            "#,
        )
        .unwrap();
        assert_eq!(user.role, Role::Customer);
        assert!(!user.is_admin());
    }
}
