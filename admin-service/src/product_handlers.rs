use std::collections::BTreeSet;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use common_http_errors::{ApiError, ApiResult};
use common_security::PrincipalCtx;
use serde::Deserialize;
use tracing::debug;

use crate::app_state::AppState;
use crate::dto::ProductDto;
use crate::model::{EntityId, Product};
use crate::paging::{created, DEFAULT_LINES_PER_PAGE};
use crate::query::{Page, SearchFilter, SortDirection};

/// `/products` search parameters, named as the storefront sends them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSearchParams {
    pub nome: Option<String>,
    pub categorias: Option<String>,
    pub page: Option<i64>,
    pub lines_per_page: Option<i64>,
    pub order_by: Option<String>,
    pub direction: Option<String>,
}

/// Parses `"1,3, 4"` into ids; blanks are skipped.
pub fn parse_id_list(raw: &str) -> Result<BTreeSet<EntityId>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<EntityId>()
                .map_err(|_| ApiError::bad_request("invalid_argument", format!("'{s}' is not a category id")))
        })
        .collect()
}

impl ProductSearchParams {
    pub fn into_filter(self) -> ApiResult<SearchFilter> {
        let category_ids = match self.categorias.as_deref() {
            Some(raw) => parse_id_list(raw)?,
            None => BTreeSet::new(),
        };
        let direction = match self.direction.as_deref() {
            Some(raw) => raw.parse::<SortDirection>()?,
            None => SortDirection::Asc,
        };
        Ok(SearchFilter {
            name_substring: self.nome.unwrap_or_default(),
            category_ids,
            page: self.page.unwrap_or(0),
            page_size: self.lines_per_page.unwrap_or(DEFAULT_LINES_PER_PAGE),
            sort_field: self.order_by.unwrap_or_else(|| "name".into()),
            direction,
        })
    }
}

pub async fn search_products(
    State(state): State<AppState>,
    _ctx: PrincipalCtx,
    Query(params): Query<ProductSearchParams>,
) -> ApiResult<Json<Page<Product>>> {
    let filter = params.into_filter()?;
    let started = Instant::now();
    let page = state.products.search(filter).await?;
    state.metrics.product_searches.inc();
    state.metrics.search_duration_seconds.observe(started.elapsed().as_secs_f64());
    debug!(total = page.total_count, "product search served");
    Ok(Json(page))
}

pub async fn get_product(
    State(state): State<AppState>,
    _ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.products.find(id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Json(dto): Json<ProductDto>,
) -> ApiResult<(StatusCode, HeaderMap, Json<Product>)> {
    let product = state.products.insert(ctx.principal(), dto).await?;
    let location = format!("/products/{}", product.id.unwrap_or_default());
    Ok(created(location, product))
}

pub async fn update_product(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
    Json(dto): Json<ProductDto>,
) -> ApiResult<StatusCode> {
    state.products.update(ctx.principal(), id, dto).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_product(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    state.products.delete(ctx.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_ids() {
        let ids = parse_id_list("3, 1,,4 ").unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert!(parse_id_list("").unwrap().is_empty());
        assert!(parse_id_list("1,x").is_err());
    }

    #[test]
    fn missing_params_use_defaults() {
        let filter = ProductSearchParams::default().into_filter().unwrap();
        assert_eq!(filter, SearchFilter::default());
    }
}
