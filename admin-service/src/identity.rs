use std::collections::BTreeSet;
use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use common_security::{IdentityLookup, Principal, Role, SecurityError};
use once_cell::sync::Lazy;
use rand_core::OsRng;
use tracing::info;

use crate::dto::normalize_email;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{Customer, CustomerKind};
use crate::store::CustomerRepository;

pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ServiceError::Internal(format!("failed to hash password: {err}")))
}

/// Constant-time PHC verification; an unparsable stored hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hash checked when the account does not exist, so both login failures cost one argon2 run.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("no-such-account").ok());

/// Verifies against the stored hash, or burns the same work on a fixed hash when there is none.
pub fn verify_password_or_dummy(password: &str, stored_hash: Option<&str>) -> bool {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            false
        }
    }
}

pub fn principal_of(customer: &Customer) -> Option<Principal> {
    Some(Principal {
        id: customer.id?,
        username: customer.email.clone(),
        roles: customer.roles.clone(),
    })
}

/// Resolves token subjects (emails) through the customer store.
pub struct StoreIdentityLookup {
    customers: Arc<dyn CustomerRepository>,
}

impl StoreIdentityLookup {
    pub fn new(customers: Arc<dyn CustomerRepository>) -> Self {
        Self { customers }
    }
}

#[async_trait]
impl IdentityLookup for StoreIdentityLookup {
    async fn principal_for(&self, username: &str) -> Result<Option<Principal>, SecurityError> {
        let customer = self
            .customers
            .find_by_email(username)
            .await
            .map_err(|err| SecurityError::Lookup(err.to_string()))?;
        Ok(customer.as_ref().and_then(principal_of))
    }
}

/// Makes sure an ADMIN account exists for `email`, creating or promoting it.
pub async fn ensure_admin(customers: &dyn CustomerRepository, email: &str, password: &str) -> ServiceResult<Customer> {
    let email = normalize_email(email);
    if let Some(mut existing) = customers.find_by_email(&email).await? {
        if existing.roles.contains(&Role::Admin) {
            return Ok(existing);
        }
        existing.roles.insert(Role::Admin);
        let saved = customers.save(existing).await?;
        info!(customer_id = ?saved.id, "promoted bootstrap account to ADMIN");
        return Ok(saved);
    }

    let admin = Customer {
        id: None,
        name: "Administrator".into(),
        email,
        document: String::new(),
        kind: CustomerKind::Individual,
        password_hash: hash_password(password)?,
        phones: BTreeSet::new(),
        addresses: Vec::new(),
        roles: [Role::Admin, Role::Customer].into_iter().collect(),
    };
    let saved = customers.save(admin).await?;
    info!(customer_id = ?saved.id, "created bootstrap ADMIN account");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret!", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret!", "plain-text"));
    }

    #[test]
    fn missing_account_still_runs_a_verification() {
        let dummy = DUMMY_HASH.as_deref().expect("dummy hash");
        assert!(PasswordHash::new(dummy).is_ok());
        assert!(!verify_password_or_dummy("no-such-account", None));
        let hash = hash_password("s3cret!").unwrap();
        assert!(verify_password_or_dummy("s3cret!", Some(&hash)));
        assert!(!verify_password_or_dummy("wrong", Some(&hash)));
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let store = MemoryStore::new();
        let first = ensure_admin(&store, "Root@Example.com", "pw").await.unwrap();
        let second = ensure_admin(&store, "root@example.com", "other").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.roles.contains(&Role::Admin));
        assert_eq!(second.email, "root@example.com");
    }

    #[tokio::test]
    async fn lookup_resolves_by_email() {
        let store = Arc::new(MemoryStore::new());
        let admin = ensure_admin(store.as_ref(), "root@example.com", "pw").await.unwrap();
        let lookup = StoreIdentityLookup::new(store);
        let principal = lookup.principal_for("root@example.com").await.unwrap().unwrap();
        assert_eq!(Some(principal.id), admin.id);
        assert!(principal.has_role(Role::Admin));
        assert!(lookup.principal_for("nobody@example.com").await.unwrap().is_none());
    }
}
