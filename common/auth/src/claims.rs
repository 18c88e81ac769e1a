use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Application-focused representation of verified token claims.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    /// Username (customer email) the token was issued for.
    pub subject: String,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        if value.sub.trim().is_empty() {
            return Err(AuthError::InvalidClaim("sub", value.sub));
        }

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            subject: value.sub,
            expires_at,
            issued_at,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr =
            serde_json::from_value(value).map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        Claims::try_from(repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_subject_and_timestamps() {
        let claims = Claims::try_from(json!({"sub": "ana@example.com", "exp": 1_700_000_600, "iat": 1_700_000_000}))
            .expect("claims");
        assert_eq!(claims.subject, "ana@example.com");
        assert_eq!(claims.expires_at.timestamp(), 1_700_000_600);
        assert_eq!(claims.issued_at.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn blank_subject_is_rejected() {
        let err = Claims::try_from(json!({"sub": "  ", "exp": 1})).expect_err("blank sub");
        assert!(matches!(err, AuthError::InvalidClaim("sub", _)));
    }

    #[test]
    fn missing_exp_is_malformed() {
        let err = Claims::try_from(json!({"sub": "a@b.c"})).expect_err("missing exp");
        assert!(matches!(err, AuthError::InvalidJson(_)));
    }
}
