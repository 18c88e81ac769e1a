use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    /// Expired, tampered and malformed tokens all collapse into this variant.
    #[error("token invalid")]
    TokenInvalid,
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
}
