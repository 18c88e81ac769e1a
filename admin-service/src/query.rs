//! Page specifications, page results and the filtered product query.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::model::{Category, Entity, EntityId, Product, ProductFilter};
use crate::store::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(ServiceError::InvalidArgument(format!("unknown sort direction '{other}'"))),
        }
    }
}

/// Maps the legacy Portuguese sort keys onto field names.
fn canonical_sort_field(field: &str) -> &str {
    match field {
        "nome" => "name",
        "preco" => "price",
        "instante" => "instant",
        other => other,
    }
}

/// A validated, bounded, single-key sorted slice request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    size: i64,
    sort_field: &'static str,
    direction: SortDirection,
}

impl PageRequest {
    /// Rejects negative pages, non-positive sizes and sort keys `E` does not know.
    pub fn for_entity<E: Entity>(page: i64, size: i64, sort_field: &str, direction: SortDirection) -> ServiceResult<Self> {
        if page < 0 {
            return Err(ServiceError::InvalidArgument(format!("page must be >= 0, got {page}")));
        }
        if size <= 0 {
            return Err(ServiceError::InvalidArgument(format!("page size must be > 0, got {size}")));
        }
        if page.checked_mul(size).is_none() {
            return Err(ServiceError::InvalidArgument("page offset overflows".into()));
        }
        let wanted = canonical_sort_field(sort_field.trim());
        let sort_field = E::SORT_FIELDS
            .iter()
            .copied()
            .find(|f| *f == wanted)
            .ok_or_else(|| {
                ServiceError::InvalidArgument(format!("cannot sort {} by '{}'", E::KIND, sort_field))
            })?;
        Ok(Self { page, size, sort_field, direction })
    }

    pub fn page(&self) -> i64 {
        self.page
    }
    pub fn size(&self) -> i64 {
        self.size
    }
    pub fn offset(&self) -> i64 {
        self.page * self.size
    }
    pub fn sort_field(&self) -> &'static str {
        self.sort_field
    }
    pub fn direction(&self) -> SortDirection {
        self.direction
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_index: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, request: &PageRequest) -> Self {
        Self { items, total_count, page_index: request.page(), page_size: request.size() }
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size <= 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size as u64)
    }

    pub fn is_first(&self) -> bool {
        self.page_index == 0
    }

    pub fn is_last(&self) -> bool {
        (self.page_index as u64 + 1) >= self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_index: self.page_index,
            page_size: self.page_size,
        }
    }
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Page", 7)?;
        state.serialize_field("items", &self.items)?;
        state.serialize_field("total_count", &self.total_count)?;
        state.serialize_field("page_index", &self.page_index)?;
        state.serialize_field("page_size", &self.page_size)?;
        state.serialize_field("total_pages", &self.total_pages())?;
        state.serialize_field("first", &self.is_first())?;
        state.serialize_field("last", &self.is_last())?;
        state.end()
    }
}

/// Product search input, built per request and consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub name_substring: String,
    pub category_ids: BTreeSet<EntityId>,
    pub page: i64,
    pub page_size: i64,
    pub sort_field: String,
    pub direction: SortDirection,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            name_substring: String::new(),
            category_ids: BTreeSet::new(),
            page: 0,
            page_size: 24,
            sort_field: "name".into(),
            direction: SortDirection::Asc,
        }
    }
}

/// Composes name and category predicates into one page-scoped product fetch.
#[derive(Clone)]
pub struct FilteredPageQuery {
    products: Arc<dyn Repository<Product>>,
    categories: Arc<dyn Repository<Category>>,
}

impl FilteredPageQuery {
    pub fn new(products: Arc<dyn Repository<Product>>, categories: Arc<dyn Repository<Category>>) -> Self {
        Self { products, categories }
    }

    pub async fn execute(&self, filter: SearchFilter) -> ServiceResult<Page<Product>> {
        let page = PageRequest::for_entity::<Product>(
            filter.page,
            filter.page_size,
            &filter.sort_field,
            filter.direction,
        )?;

        // Unknown category ids are dropped; an all-unknown set matches nothing.
        let categories = if filter.category_ids.is_empty() {
            None
        } else {
            let found = self.categories.find_all_by_id(&filter.category_ids).await?;
            Some(found.iter().filter_map(|c| c.id).collect::<BTreeSet<_>>())
        };

        let predicate = ProductFilter {
            name_contains: filter.name_substring,
            categories,
        };
        debug!(name = %predicate.name_contains, categories = ?predicate.categories, page = page.page(), size = page.size(), "product search");
        Ok(self.products.find_page(&predicate, &page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Customer;

    #[test]
    fn rejects_bad_bounds_and_sort_keys() {
        assert!(PageRequest::for_entity::<Product>(-1, 10, "name", SortDirection::Asc).is_err());
        assert!(PageRequest::for_entity::<Product>(0, 0, "name", SortDirection::Asc).is_err());
        assert!(PageRequest::for_entity::<Product>(0, 10, "password", SortDirection::Asc).is_err());
        assert!(PageRequest::for_entity::<Customer>(0, 10, "price", SortDirection::Asc).is_err());
        assert!(PageRequest::for_entity::<Product>(i64::MAX, 2, "name", SortDirection::Asc).is_err());
    }

    #[test]
    fn accepts_legacy_sort_aliases() {
        let req = PageRequest::for_entity::<Product>(2, 10, "nome", SortDirection::Desc).unwrap();
        assert_eq!(req.sort_field(), "name");
        assert_eq!(req.offset(), 20);
        let req = PageRequest::for_entity::<Product>(0, 10, "preco", SortDirection::Asc).unwrap();
        assert_eq!(req.sort_field(), "price");
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn page_derives_navigation_fields() {
        let req = PageRequest::for_entity::<Product>(1, 10, "id", SortDirection::Asc).unwrap();
        let page: Page<u8> = Page::new(vec![1, 2, 3], 13, &req);
        assert_eq!(page.total_pages(), 2);
        assert!(!page.is_first());
        assert!(page.is_last());

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["total_pages"], 2);
        assert_eq!(json["last"], true);
    }

    #[test]
    fn empty_page_is_both_first_and_last() {
        let req = PageRequest::for_entity::<Product>(0, 10, "id", SortDirection::Asc).unwrap();
        let page: Page<u8> = Page::new(vec![], 0, &req);
        assert!(page.is_first() && page.is_last());
    }
}
