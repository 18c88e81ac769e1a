use std::collections::BTreeSet;
use std::sync::Arc;

use common_security::{require_authenticated, Principal, Role};
use tracing::info;

use crate::dto::ProductDto;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{Category, EntityId, Product};
use crate::query::{FilteredPageQuery, Page, SearchFilter};
use crate::store::Repository;

#[derive(Clone)]
pub struct ProductService {
    products: Arc<dyn Repository<Product>>,
    categories: Arc<dyn Repository<Category>>,
    search: FilteredPageQuery,
}

impl ProductService {
    pub fn new(products: Arc<dyn Repository<Product>>, categories: Arc<dyn Repository<Category>>) -> Self {
        let search = FilteredPageQuery::new(products.clone(), categories.clone());
        Self { products, categories, search }
    }

    pub async fn find(&self, id: EntityId) -> ServiceResult<Product> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("product", id))
    }

    pub async fn search(&self, filter: SearchFilter) -> ServiceResult<Page<Product>> {
        self.search.execute(filter).await
    }

    /// Every referenced category must exist; unknown ids are rejected rather than dropped.
    async fn check_categories(&self, ids: &BTreeSet<EntityId>) -> ServiceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let found: BTreeSet<EntityId> = self
            .categories
            .find_all_by_id(ids)
            .await?
            .into_iter()
            .filter_map(|c| c.id)
            .collect();
        let missing: Vec<String> = ids.difference(&found).map(|id| id.to_string()).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::InvalidArgument(format!("unknown category ids: {}", missing.join(", "))))
        }
    }

    pub async fn insert(&self, principal: Option<&Principal>, dto: ProductDto) -> ServiceResult<Product> {
        require_authenticated(principal, Role::Admin)?;
        ServiceError::check_fields(dto.validate())?;
        self.check_categories(&dto.category_ids).await?;
        let saved = self
            .products
            .save(Product {
                id: None,
                name: dto.name.trim().to_string(),
                price: dto.price,
                category_ids: dto.category_ids,
            })
            .await?;
        info!(product_id = ?saved.id, "product created");
        Ok(saved)
    }

    pub async fn update(&self, principal: Option<&Principal>, id: EntityId, dto: ProductDto) -> ServiceResult<Product> {
        require_authenticated(principal, Role::Admin)?;
        let mut existing = self.find(id).await?;
        ServiceError::check_fields(dto.validate())?;
        self.check_categories(&dto.category_ids).await?;
        existing.name = dto.name.trim().to_string();
        existing.price = dto.price;
        existing.category_ids = dto.category_ids;
        Ok(self.products.save(existing).await?)
    }

    pub async fn delete(&self, principal: Option<&Principal>, id: EntityId) -> ServiceResult<()> {
        require_authenticated(principal, Role::Admin)?;
        self.find(id).await?;
        match self.products.delete_by_id(id).await.map_err(ServiceError::from) {
            Err(ServiceError::IntegrityViolation(_)) => Err(ServiceError::IntegrityViolation(
                "Cannot delete a product that appears in orders".into(),
            )),
            other => other,
        }
    }
}
