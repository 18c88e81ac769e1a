use std::sync::Arc;

use common_security::{require_authenticated, Principal, Role};
use tracing::info;

use crate::dto::CategoryDto;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{Category, EntityId, NoFilter};
use crate::query::{Page, PageRequest, SortDirection};
use crate::store::Repository;

#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn Repository<Category>>,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn Repository<Category>>) -> Self {
        Self { categories }
    }

    pub async fn find(&self, id: EntityId) -> ServiceResult<Category> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("category", id))
    }

    pub async fn find_all(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.categories.find_all().await?)
    }

    pub async fn find_page(&self, page: i64, size: i64, order_by: &str, direction: SortDirection) -> ServiceResult<Page<Category>> {
        let request = PageRequest::for_entity::<Category>(page, size, order_by, direction)?;
        Ok(self.categories.find_page(&NoFilter, &request).await?)
    }

    pub async fn insert(&self, principal: Option<&Principal>, dto: CategoryDto) -> ServiceResult<Category> {
        require_authenticated(principal, Role::Admin)?;
        ServiceError::check_fields(dto.validate())?;
        let saved = self
            .categories
            .save(Category { id: None, name: dto.name.trim().to_string() })
            .await?;
        info!(category_id = ?saved.id, "category created");
        Ok(saved)
    }

    pub async fn update(&self, principal: Option<&Principal>, id: EntityId, dto: CategoryDto) -> ServiceResult<Category> {
        require_authenticated(principal, Role::Admin)?;
        let mut existing = self.find(id).await?;
        ServiceError::check_fields(dto.validate())?;
        existing.name = dto.name.trim().to_string();
        Ok(self.categories.save(existing).await?)
    }

    pub async fn delete(&self, principal: Option<&Principal>, id: EntityId) -> ServiceResult<()> {
        require_authenticated(principal, Role::Admin)?;
        self.find(id).await?;
        match self.categories.delete_by_id(id).await.map_err(ServiceError::from) {
            Err(ServiceError::IntegrityViolation(_)) => Err(ServiceError::IntegrityViolation(
                "Cannot delete a category that still has products".into(),
            )),
            other => other,
        }
    }
}
