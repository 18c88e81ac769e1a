use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

#[derive(Serialize)]
struct TokenClaims<'a> {
    sub: &'a str,
    iat: i64,
    exp: i64,
}

/// A freshly signed token together with the instant it stops being accepted.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies HS512 tokens signed with one shared secret.
///
/// Tokens are stateless: validity depends only on the signature and the
/// expiry claim, there is no revocation list.
#[derive(Clone)]
pub struct TokenService {
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        config.validate()?;

        let mut validation = Validation::new(Algorithm::HS512);
        // Expiry is compared against the caller supplied clock in `verify_at`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Ok(Self {
            ttl: config.ttl,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &str) -> AuthResult<IssuedToken> {
        self.issue_at(subject, Utc::now())
    }

    pub fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> AuthResult<IssuedToken> {
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::InvalidClaim("exp", format!("{now} + {}ms overflows", self.ttl.num_milliseconds())))?
            .timestamp();
        let claims = TokenClaims {
            sub: subject,
            iat: now.timestamp(),
            exp,
        };
        let token = encode(&Header::new(Algorithm::HS512), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", exp.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Checks the signature, then requires `now` to be strictly before the expiry.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        let data = decode::<Value>(token, &self.decoding_key, &self.validation).map_err(|err| {
            debug!(error = %err, "token rejected");
            AuthError::TokenInvalid
        })?;
        let claims = Claims::try_from(data.claims).map_err(|err| {
            debug!(error = %err, "token claims rejected");
            AuthError::TokenInvalid
        })?;
        if now >= claims.expires_at {
            debug!(expires_at = %claims.expires_at, "token expired");
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    pub fn username_of(&self, token: &str) -> Option<String> {
        self.verify(token).ok().map(|claims| claims.subject)
    }
}
