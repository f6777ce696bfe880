//! Caller identification.
//!
//! Identity is established once per request by an [`Authenticator`] and
//! handed to handlers as [`CurrentUser`]. Nothing below the HTTP layer ever
//! reads identity from client-controlled input.

use crate::config::{AuthConfig, AuthMode};
use crate::error::ApiError;
use crate::types::UserId;
use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Missing,
    #[error("Invalid credentials")]
    Invalid,
}

/// Resolves the caller of a request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<UserId, AuthError>;
}

/// `Authorization: Bearer <token>` looked up in a fixed token table.
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenAuthenticator {
    pub fn new<I, T, U>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (T, U)>,
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(token, user)| (token.into(), UserId::new(user)))
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let header = headers.get(AUTHORIZATION).ok_or(AuthError::Missing)?;
        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Invalid)?;

        self.tokens.get(token).cloned().ok_or(AuthError::Invalid)
    }
}

/// Trusts a header set by an authenticating gateway in front of the server.
pub struct TrustedHeaderAuthenticator {
    header: HeaderName,
}

impl TrustedHeaderAuthenticator {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

#[async_trait]
impl Authenticator for TrustedHeaderAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let value = headers.get(&self.header).ok_or(AuthError::Missing)?;
        let user = value.to_str().map_err(|_| AuthError::Invalid)?.trim();
        if user.is_empty() {
            return Err(AuthError::Invalid);
        }
        Ok(UserId::new(user))
    }
}

/// Build the authenticator selected by `auth.mode`.
pub fn from_config(config: &AuthConfig) -> Result<Arc<dyn Authenticator>> {
    match config.mode {
        AuthMode::Tokens => {
            if config.tokens.is_empty() {
                warn!("auth.mode is tokens but auth.tokens is empty; every request will be rejected");
            }
            Ok(Arc::new(StaticTokenAuthenticator::new(config.tokens.clone())))
        }
        AuthMode::Header => {
            let Ok(header) = HeaderName::try_from(config.user_header.trim()) else {
                bail!("auth.user_header is not a valid header name: {:?}", config.user_header);
            };
            Ok(Arc::new(TrustedHeaderAuthenticator::new(header)))
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<dyn Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Arc::<dyn Authenticator>::from_ref(state);
        match authenticator.authenticate(&parts.headers).await {
            Ok(user) => Ok(CurrentUser(user)),
            Err(err) => {
                warn!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    reason = %err,
                    "Rejected unauthenticated request"
                );
                Err(ApiError::unauthorized(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[tokio::test]
    async fn bearer_tokens_resolve_to_users() {
        let auth = StaticTokenAuthenticator::new([("secret-a", "alice")]);

        assert_eq!(
            auth.authenticate(&headers(&[("authorization", "Bearer secret-a")])).await,
            Ok(UserId::new("alice"))
        );
        assert_eq!(
            auth.authenticate(&headers(&[("authorization", "Bearer wrong")])).await,
            Err(AuthError::Invalid)
        );
        assert_eq!(
            auth.authenticate(&headers(&[("authorization", "Basic c2VjcmV0")])).await,
            Err(AuthError::Invalid)
        );
        assert_eq!(auth.authenticate(&HeaderMap::new()).await, Err(AuthError::Missing));
    }

    #[tokio::test]
    async fn trusted_header_reads_configured_header() {
        let auth = TrustedHeaderAuthenticator::new(HeaderName::from_static("x-user-id"));

        assert_eq!(
            auth.authenticate(&headers(&[("x-user-id", "bob")])).await,
            Ok(UserId::new("bob"))
        );
        assert_eq!(
            auth.authenticate(&headers(&[("x-user-id", "  ")])).await,
            Err(AuthError::Invalid)
        );
        assert_eq!(
            auth.authenticate(&headers(&[("authorization", "Bearer x")])).await,
            Err(AuthError::Missing)
        );
    }

    #[test]
    fn header_mode_rejects_invalid_header_names() {
        let config = AuthConfig {
            mode: AuthMode::Header,
            user_header: "not a header".to_string(),
            ..AuthConfig::default()
        };
        assert!(from_config(&config).is_err());
    }
}
