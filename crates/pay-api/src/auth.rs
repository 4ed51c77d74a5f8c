//! # Authentication
//!
//! Access-token verification and the request gates built on it.
//!
//! - `TokenVerifier` checks an HS256 access token and resolves its user.
//! - `require_auth` runs the verifier on every protected request and stores
//!   the resolved `CurrentUser` in request extensions.
//! - `require_admin` evaluates the admin predicate against that user. It does
//!   not authenticate on its own and must be layered inside `require_auth`;
//!   without a resolved user it answers 403.

use crate::handlers::{payment_error_to_response, ErrorResponse};
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use pay_core::{authorize, PaymentError, PaymentResult, Role, User, UserStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Verifies access tokens against a shared secret and resolves their user
#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
    users: Arc<dyn UserStore>,
}

impl TokenVerifier {
    pub fn new(secret: &str, users: Arc<dyn UserStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
            users,
        }
    }

    /// Check signature and expiry.
    ///
    /// Expiry maps to `TokenExpired`; every other failure is `Unauthenticated`.
    pub fn decode_claims(&self, token: Option<&str>) -> PaymentResult<Claims> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PaymentError::Unauthenticated("no access token provided".to_string()))?;

        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => PaymentError::TokenExpired,
                _ => {
                    debug!("Rejected access token: {}", e);
                    PaymentError::Unauthenticated("invalid access token".to_string())
                }
            })
    }

    /// Verify the token and load the user it names.
    ///
    /// A valid token for a user that no longer exists is rejected.
    pub async fn verify(&self, token: Option<&str>) -> PaymentResult<User> {
        let claims = self.decode_claims(token)?;
        self.users
            .find_user(&claims.user_id)
            .await?
            .ok_or_else(|| PaymentError::Unauthenticated("user not found".to_string()))
    }

    /// Sign an access token for `user_id` valid for `ttl`
    pub fn issue(&self, user_id: &str, ttl: Duration) -> PaymentResult<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| PaymentError::Internal(format!("failed to sign access token: {}", e)))
    }
}

/// Access token from the `accessToken` cookie, else a bearer header
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
    })
}

/// The authenticated user, inserted by `require_auth`
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or_else(|| {
            payment_error_to_response(PaymentError::Unauthenticated(
                "authentication required".to_string(),
            ))
        })
    }
}

/// Reject the request unless it carries a valid access token for a known user
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let token = access_token(request.headers());

    let user = state.verifier.verify(token.as_deref()).await.map_err(|e| {
        warn!("Auth gate rejected {}: {}", request.uri().path(), e);
        payment_error_to_response(e)
    })?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Reject the request unless the authenticated user is an admin
pub async fn require_admin(
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| {
            payment_error_to_response(PaymentError::Forbidden("Admin Only".to_string()))
        })?;

    if let Err(e) = authorize(&user.0, Role::Admin) {
        warn!("Admin gate rejected user {}", user.0.id);
        return Err(payment_error_to_response(e));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use pay_core::MemoryStore;

    fn verifier() -> (TokenVerifier, Arc<MemoryStore>) {
        let store = MemoryStore::new().shared();
        store.put_user(User::new("user-1", "Ada", Role::Customer));
        (TokenVerifier::new("test-secret", store.clone()), store)
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let (verifier, _store) = verifier();
        let token = verifier.issue("user-1", Duration::minutes(15)).unwrap();

        let user = verifier.verify(Some(&token)).await.unwrap();
        assert_eq!(user.id, "user-1");
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (verifier, _store) = verifier();

        assert!(matches!(
            verifier.verify(None).await,
            Err(PaymentError::Unauthenticated(_))
        ));
        assert!(matches!(
            verifier.verify(Some("  ")).await,
            Err(PaymentError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_distinct() {
        let (verifier, _store) = verifier();
        let token = verifier.issue("user-1", Duration::minutes(-5)).unwrap();

        assert!(matches!(
            verifier.verify(Some(&token)).await,
            Err(PaymentError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_foreign_signature_rejected() {
        let (verifier, store) = verifier();
        let other = TokenVerifier::new("another-secret", store);
        let token = other.issue("user-1", Duration::minutes(15)).unwrap();

        assert!(matches!(
            verifier.verify(Some(&token)).await,
            Err(PaymentError::Unauthenticated(_))
        ));
        assert!(matches!(
            verifier.verify(Some("not.a.jwt")).await,
            Err(PaymentError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_user_rejected() {
        let (verifier, store) = verifier();
        let token = verifier.issue("user-1", Duration::minutes(15)).unwrap();
        store.remove_user("user-1");

        assert!(matches!(
            verifier.verify(Some(&token)).await,
            Err(PaymentError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_access_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=abc.def.ghi; refreshToken=zzz"),
        );
        assert_eq!(access_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_access_token_cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(access_token(&headers).as_deref(), Some("from-header"));

        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=from-cookie"));
        assert_eq!(access_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_access_token_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("refreshToken=zzz"));
        assert!(access_token(&headers).is_none());
    }
}
