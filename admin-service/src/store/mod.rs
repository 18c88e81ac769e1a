//! Storage port and its implementations.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Category, Customer, Entity, EntityId, Order, Product};
use crate::query::{Page, PageRequest};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A foreign-key or uniqueness constraint refused the write.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            // 23503 foreign_key_violation, 23505 unique_violation
            if matches!(db.code().as_deref(), Some("23503") | Some("23505")) {
                return StoreError::IntegrityViolation(db.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<E>, StoreError>;
    /// Inserts when the id is unset, otherwise replaces the stored record.
    async fn save(&self, entity: E) -> Result<E, StoreError>;
    /// Fails with `IntegrityViolation` while other records reference `id`.
    async fn delete_by_id(&self, id: EntityId) -> Result<(), StoreError>;
    async fn find_all(&self) -> Result<Vec<E>, StoreError>;
    /// Missing ids are skipped.
    async fn find_all_by_id(&self, ids: &BTreeSet<EntityId>) -> Result<Vec<E>, StoreError>;
    async fn find_page(&self, filter: &E::Filter, page: &PageRequest) -> Result<Page<E>, StoreError>;
}

#[async_trait]
pub trait CustomerRepository: Repository<Customer> {
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError>;
}

/// The repositories one backend provides.
#[derive(Clone)]
pub struct Stores {
    pub categories: Arc<dyn Repository<Category>>,
    pub products: Arc<dyn Repository<Product>>,
    pub customers: Arc<dyn CustomerRepository>,
    pub orders: Arc<dyn Repository<Order>>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            categories: store.clone(),
            products: store.clone(),
            customers: store.clone(),
            orders: store,
        }
    }

    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            categories: store.clone(),
            products: store.clone(),
            customers: store.clone(),
            orders: store,
        }
    }
}
