use std::sync::Arc;

use common_http_errors::FieldMessage;
use common_security::{
    require_authenticated, require_role_or_owner, require_role_or_username, Principal, Role, SecurityError,
};
use tracing::info;

use crate::dto::{normalize_email, CustomerUpdate, NewCustomer};
use crate::error::{ServiceError, ServiceResult};
use crate::identity::hash_password;
use crate::model::{Customer, EntityId, NoFilter};
use crate::query::{Page, PageRequest, SortDirection};
use crate::store::CustomerRepository;

#[derive(Clone)]
pub struct CustomerService {
    customers: Arc<dyn CustomerRepository>,
}

impl CustomerService {
    pub fn new(customers: Arc<dyn CustomerRepository>) -> Self {
        Self { customers }
    }

    /// Admin-or-owner, checked before the lookup so a denied caller learns nothing.
    pub async fn find(&self, principal: Option<&Principal>, id: EntityId) -> ServiceResult<Customer> {
        require_role_or_owner(principal, Role::Admin, id)?;
        self.fetch(id).await
    }

    async fn fetch(&self, id: EntityId) -> ServiceResult<Customer> {
        self.customers
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("customer", id))
    }

    pub async fn find_by_email(&self, principal: Option<&Principal>, email: &str) -> ServiceResult<Customer> {
        let email = normalize_email(email);
        require_role_or_username(principal, Role::Admin, &email)?;
        self.customers
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("customer", &email))
    }

    pub async fn find_all(&self, principal: Option<&Principal>) -> ServiceResult<Vec<Customer>> {
        require_authenticated(principal, Role::Admin)?;
        Ok(self.customers.find_all().await?)
    }

    pub async fn find_page(
        &self,
        principal: Option<&Principal>,
        page: i64,
        size: i64,
        order_by: &str,
        direction: SortDirection,
    ) -> ServiceResult<Page<Customer>> {
        require_authenticated(principal, Role::Admin)?;
        let request = PageRequest::for_entity::<Customer>(page, size, order_by, direction)?;
        Ok(self.customers.find_page(&NoFilter, &request).await?)
    }

    async fn email_taken(&self, email: &str, except: Option<EntityId>) -> ServiceResult<bool> {
        let existing = self.customers.find_by_email(email).await?;
        Ok(existing.is_some_and(|c| c.id != except))
    }

    /// Anonymous self-signup or ADMIN. Only ADMIN may grant ADMIN.
    pub async fn insert(&self, principal: Option<&Principal>, dto: NewCustomer) -> ServiceResult<Customer> {
        if let Some(p) = principal {
            if !p.has_role(Role::Admin) {
                return Err(SecurityError::AccessDenied.into());
            }
        }
        if dto.roles.contains(&Role::Admin) {
            require_authenticated(principal, Role::Admin)?;
        }

        let mut errors = dto.validate();
        let email = normalize_email(&dto.email);
        if errors.iter().all(|e| e.field != "email") && self.email_taken(&email, None).await? {
            errors.push(FieldMessage::new("email", "Email already registered"));
        }
        ServiceError::check_fields(errors)?;

        let mut roles = dto.roles.clone();
        roles.insert(Role::Customer);
        let customer = Customer {
            id: None,
            name: dto.name.trim().to_string(),
            email,
            document: dto.document.chars().filter(|c| c.is_ascii_digit()).collect(),
            kind: dto.kind,
            password_hash: hash_password(&dto.password)?,
            phones: dto.phone_set(),
            addresses: vec![dto.address()],
            roles,
        };
        let saved = match self.customers.save(customer).await.map_err(ServiceError::from) {
            Err(ServiceError::IntegrityViolation(_)) => {
                return Err(ServiceError::Validation(vec![FieldMessage::new("email", "Email already registered")]))
            }
            other => other?,
        };
        info!(customer_id = ?saved.id, "customer registered");
        Ok(saved)
    }

    /// Copies name and email onto the stored record.
    pub async fn update(&self, principal: Option<&Principal>, id: EntityId, dto: CustomerUpdate) -> ServiceResult<Customer> {
        require_role_or_owner(principal, Role::Admin, id)?;
        let mut existing = self.fetch(id).await?;

        let mut errors = dto.validate();
        let email = normalize_email(&dto.email);
        if errors.iter().all(|e| e.field != "email") && self.email_taken(&email, Some(id)).await? {
            errors.push(FieldMessage::new("email", "Email already registered"));
        }
        ServiceError::check_fields(errors)?;

        existing.name = dto.name.trim().to_string();
        existing.email = email;
        Ok(self.customers.save(existing).await?)
    }

    pub async fn delete(&self, principal: Option<&Principal>, id: EntityId) -> ServiceResult<()> {
        require_authenticated(principal, Role::Admin)?;
        self.fetch(id).await?;
        match self.customers.delete_by_id(id).await.map_err(ServiceError::from) {
            Err(ServiceError::IntegrityViolation(_)) => Err(ServiceError::IntegrityViolation(
                "Cannot delete a customer that has orders".into(),
            )),
            other => other,
        }
    }
}
