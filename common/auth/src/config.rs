use std::fmt;

use chrono::Duration;
use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// HS512 digests are 64 bytes; shorter secrets still work but weaken the MAC.
const RECOMMENDED_SECRET_BYTES: usize = 64;
const DEFAULT_TTL_MILLIS: i64 = 86_400_000;
/// Longest accepted token lifetime.
const MAX_TTL_DAYS: i64 = 365;

/// Runtime configuration for token issuance and verification.
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret used for both signing and verification.
    pub secret: String,
    /// Lifetime of every issued token.
    pub ttl: Duration,
}

impl JwtConfig {
    /// Construct config with the default one day lifetime.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::milliseconds(DEFAULT_TTL_MILLIS),
        }
    }

    /// Adjust the token lifetime.
    pub fn with_ttl_millis(mut self, millis: i64) -> Self {
        self.ttl = Duration::milliseconds(millis);
        self
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.secret.is_empty() {
            return Err(AuthError::InvalidConfig("JWT secret must not be empty".into()));
        }
        if self.ttl < Duration::seconds(1) {
            return Err(AuthError::InvalidConfig(format!(
                "token ttl must be at least one second, got {}ms",
                self.ttl.num_milliseconds()
            )));
        }
        if self.ttl > Duration::days(MAX_TTL_DAYS) {
            return Err(AuthError::InvalidConfig(format!(
                "token ttl must not exceed {MAX_TTL_DAYS} days, got {}ms",
                self.ttl.num_milliseconds()
            )));
        }
        if self.secret.len() < RECOMMENDED_SECRET_BYTES {
            warn!(
                secret_len = self.secret.len(),
                recommended = RECOMMENDED_SECRET_BYTES,
                "JWT secret is shorter than the HS512 key size"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("ttl_ms", &self.ttl.num_milliseconds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_is_rejected() {
        let err = JwtConfig::new("").validate().expect_err("empty secret");
        assert!(matches!(err, AuthError::InvalidConfig(_)));
    }

    #[test]
    fn sub_second_ttl_is_rejected() {
        let err = JwtConfig::new("secret")
            .with_ttl_millis(999)
            .validate()
            .expect_err("ttl too short");
        assert!(matches!(err, AuthError::InvalidConfig(_)));
    }

    #[test]
    fn oversized_ttl_is_rejected() {
        let err = JwtConfig::new("secret")
            .with_ttl_millis(i64::MAX / 2)
            .validate()
            .expect_err("ttl too long");
        assert!(matches!(err, AuthError::InvalidConfig(_)));
        JwtConfig::new("secret")
            .with_ttl_millis(30 * 86_400_000)
            .validate()
            .expect("thirty days is fine");
    }

    #[test]
    fn short_secret_is_accepted() {
        JwtConfig::new("short").validate().expect("short secret only warns");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", JwtConfig::new("super-secret-value"));
        assert!(!rendered.contains("super-secret-value"));
    }
}
