//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs with audience `authenticated` and issuer
//! `copyr.ai`. Handlers take [`CurrentUser`] when a token is required and
//! [`MaybeUser`] when anonymous access is allowed.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

pub const AUDIENCE: &str = "authenticated";
pub const ISSUER: &str = "copyr.ai";
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

fn default_role() -> String {
    "user".into()
}

impl Claims {
    pub fn new(user_id: &str, email: Option<&str>, role: &str) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            user_id: user_id.to_string(),
            email: email.map(str::to_string),
            role: role.to_string(),
            aud: AUDIENCE.into(),
            iss: ISSUER.into(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    /// Users may act on their own resources; admins on anyone's.
    pub fn authorize(&self, user_id: &str) -> Result<(), ApiError> {
        if self.is_admin() || self.user_id.eq_ignore_ascii_case(user_id) {
            Ok(())
        } else {
            Err(ApiError::Authorization("Access denied: insufficient permissions".into()))
        }
    }
}

/// Signs and verifies tokens with the configured secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[ISSUER]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, ApiError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                ApiError::Authentication("Invalid or expired token".into())
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim()).filter(|t| !t.is_empty())
}

/// Claims from the request's bearer token, if it carries a valid one.
pub fn claims_from_headers(state: &AppState, headers: &HeaderMap) -> Result<Option<Claims>, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    let Some(tokens) = state.tokens.as_ref() else {
        return Err(ApiError::Authentication("Authentication is not configured".into()));
    };
    tokens.verify(token).map(Some)
}

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

/// A caller that may be anonymous. Invalid tokens count as anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Claims>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        claims_from_headers(&state, &parts.headers)?
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Authentication("Authentication required".into()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(MaybeUser(claims_from_headers(&state, &parts.headers).ok().flatten()))
    }
}
