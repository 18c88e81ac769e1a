use common_http_errors::ApiError;
use thiserror::Error;

use crate::roles::Role;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("not authenticated")]            NotAuthenticated,
    #[error("access denied")]                AccessDenied,
    #[error("missing required role {0}")]    MissingRole(Role),
    #[error("invalid authorization token")]  TokenInvalid,
    #[error("identity lookup failed: {0}")]  Lookup(String),
}

impl From<SecurityError> for ApiError {
    fn from(e: SecurityError) -> Self {
        match e {
            SecurityError::MissingRole(role) => ApiError::ForbiddenMissingRole { role: role.as_str(), trace_id: None },
            SecurityError::NotAuthenticated | SecurityError::AccessDenied => {
                ApiError::Forbidden { trace_id: None, message: Some(e.to_string()) }
            }
            SecurityError::TokenInvalid => ApiError::Unauthorized { code: "token_invalid", trace_id: None },
            SecurityError::Lookup(msg) => ApiError::internal(msg),
        }
    }
}
