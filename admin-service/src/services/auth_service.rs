use std::sync::Arc;

use common_auth::{IssuedToken, TokenService};
use common_observability::AdminMetrics;
use common_security::{require_principal, Principal};
use tracing::{info, warn};

use crate::dto::{normalize_email, Credentials};
use crate::error::{ServiceError, ServiceResult};
use crate::identity::verify_password_or_dummy;
use crate::store::CustomerRepository;

/// Password login and token refresh.
#[derive(Clone)]
pub struct AuthService {
    customers: Arc<dyn CustomerRepository>,
    tokens: Arc<TokenService>,
    metrics: Arc<AdminMetrics>,
}

impl AuthService {
    pub fn new(customers: Arc<dyn CustomerRepository>, tokens: Arc<TokenService>, metrics: Arc<AdminMetrics>) -> Self {
        Self { customers, tokens, metrics }
    }

    pub async fn login(&self, credentials: Credentials) -> ServiceResult<IssuedToken> {
        let email = normalize_email(&credentials.email);
        let customer = self.customers.find_by_email(&email).await?;
        let stored_hash = customer.as_ref().map(|c| c.password_hash.as_str());
        let valid = verify_password_or_dummy(&credentials.password, stored_hash);
        if !valid {
            self.metrics.login_failures.inc();
            warn!("login rejected");
            return Err(ServiceError::InvalidCredentials);
        }
        let issued = self.issue(&email)?;
        self.metrics.token_issued("login");
        info!(customer_id = ?customer.and_then(|c| c.id), "login succeeded");
        Ok(issued)
    }

    pub fn refresh(&self, principal: Option<&Principal>) -> ServiceResult<IssuedToken> {
        let caller = require_principal(principal)?;
        let issued = self.issue(&caller.username)?;
        self.metrics.token_issued("refresh");
        Ok(issued)
    }

    fn issue(&self, subject: &str) -> ServiceResult<IssuedToken> {
        self.tokens
            .issue(subject)
            .map_err(|err| ServiceError::Internal(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ensure_admin;
    use crate::store::MemoryStore;
    use common_auth::JwtConfig;

    async fn service() -> (AuthService, Arc<AdminMetrics>) {
        let store = Arc::new(MemoryStore::new());
        ensure_admin(store.as_ref(), "root@example.com", "root-pass").await.unwrap();
        let tokens = Arc::new(TokenService::new(JwtConfig::new("auth-service-secret")).unwrap());
        let metrics = Arc::new(AdminMetrics::new().unwrap());
        (AuthService::new(store, tokens, metrics.clone()), metrics)
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials { email: email.into(), password: password.into() }
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_fail_alike() {
        let (auth, metrics) = service().await;
        let unknown = auth.login(credentials("ghost@example.com", "root-pass")).await.unwrap_err();
        let wrong = auth.login(credentials("root@example.com", "nope")).await.unwrap_err();
        assert!(matches!(unknown, ServiceError::InvalidCredentials));
        assert!(matches!(wrong, ServiceError::InvalidCredentials));
        assert_eq!(metrics.login_failures.get(), 2);
    }

    #[tokio::test]
    async fn login_issues_a_token_for_the_email() {
        let (auth, _) = service().await;
        let issued = auth.login(credentials(" ROOT@example.com ", "root-pass")).await.unwrap();
        assert_eq!(auth.tokens.username_of(&issued.token).as_deref(), Some("root@example.com"));
    }
}
