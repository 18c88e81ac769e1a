use std::collections::BTreeSet;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use common_auth::{bearer_from_headers, TokenService};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn, Span};

use crate::roles::Role;
use crate::SecurityError;

/// Authenticated identity attached to one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Resolves a verified token subject to the full principal.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn principal_for(&self, username: &str) -> Result<Option<Principal>, SecurityError>;
}

/// Turns request headers into an optional principal.
///
/// No `Authorization` header yields `None`. A malformed header, a token that
/// fails verification, or a subject that no longer resolves is `TokenInvalid`.
pub async fn resolve_principal(
    headers: &HeaderMap,
    tokens: &TokenService,
    lookup: &dyn IdentityLookup,
) -> Result<Option<Principal>, SecurityError> {
    let token = match bearer_from_headers(headers) {
        Ok(Some(token)) => token,
        Ok(None) => return Ok(None),
        Err(err) => {
            debug!(error = %err, "authorization header rejected");
            return Err(SecurityError::TokenInvalid);
        }
    };

    let claims = tokens.verify(&token).map_err(|_| SecurityError::TokenInvalid)?;
    match lookup.principal_for(&claims.subject).await? {
        Some(principal) => Ok(Some(principal)),
        None => {
            warn!("token subject does not resolve to an account");
            Err(SecurityError::TokenInvalid)
        }
    }
}

/// Extractor for the request principal; `None` for anonymous callers.
pub struct PrincipalCtx(pub Option<Principal>);

impl PrincipalCtx {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for PrincipalCtx
where
    Arc<TokenService>: FromRef<S>,
    Arc<dyn IdentityLookup>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenService>::from_ref(state);
        let lookup = Arc::<dyn IdentityLookup>::from_ref(state);

        let principal = resolve_principal(&parts.headers, &tokens, lookup.as_ref()).await?;
        if let Some(p) = principal.as_ref() {
            Span::current().record("principal_id", tracing::field::display(p.id));
        }
        Ok(PrincipalCtx(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use common_auth::JwtConfig;

    struct OneUser;

    #[async_trait]
    impl IdentityLookup for OneUser {
        async fn principal_for(&self, username: &str) -> Result<Option<Principal>, SecurityError> {
            Ok((username == "ana@example.com").then(|| Principal {
                id: 5,
                username: username.to_string(),
                roles: [Role::Customer].into_iter().collect(),
            }))
        }
    }

    fn tokens() -> TokenService {
        TokenService::new(JwtConfig::new("context-test-secret")).unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        headers
    }

    #[tokio::test]
    async fn no_header_is_anonymous() {
        let resolved = resolve_principal(&HeaderMap::new(), &tokens(), &OneUser).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn valid_token_resolves_principal() {
        let tokens = tokens();
        let issued = tokens.issue("ana@example.com").unwrap();
        let resolved = resolve_principal(&bearer(&issued.token), &tokens, &OneUser).await.unwrap();
        assert_eq!(resolved.map(|p| p.id), Some(5));
    }

    #[tokio::test]
    async fn unknown_subject_is_token_invalid() {
        let tokens = tokens();
        let issued = tokens.issue("ghost@example.com").unwrap();
        let err = resolve_principal(&bearer(&issued.token), &tokens, &OneUser).await.unwrap_err();
        assert!(matches!(err, SecurityError::TokenInvalid));
    }

    #[tokio::test]
    async fn garbage_token_is_token_invalid() {
        let err = resolve_principal(&bearer("nope"), &tokens(), &OneUser).await.unwrap_err();
        assert!(matches!(err, SecurityError::TokenInvalid));
    }

    #[tokio::test]
    async fn wrong_scheme_is_token_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let err = resolve_principal(&headers, &tokens(), &OneUser).await.unwrap_err();
        assert!(matches!(err, SecurityError::TokenInvalid));
    }
}
