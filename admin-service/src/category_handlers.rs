use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use common_http_errors::ApiResult;
use common_security::PrincipalCtx;

use crate::app_state::AppState;
use crate::dto::CategoryDto;
use crate::model::{Category, EntityId};
use crate::paging::{created, PageParams};
use crate::query::{Page, SortDirection};

// Public reads still extract the principal so a bad bearer token is refused.
pub async fn list_categories(State(state): State<AppState>, _ctx: PrincipalCtx) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.categories.find_all().await?))
}

pub async fn page_categories(
    State(state): State<AppState>,
    _ctx: PrincipalCtx,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<Category>>> {
    let direction = params.direction(SortDirection::Asc)?;
    let page = state
        .categories
        .find_page(params.page(), params.size(), params.order_by("name"), direction)
        .await?;
    Ok(Json(page))
}

pub async fn get_category(
    State(state): State<AppState>,
    _ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Category>> {
    Ok(Json(state.categories.find(id).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Json(dto): Json<CategoryDto>,
) -> ApiResult<(StatusCode, HeaderMap, Json<Category>)> {
    let category = state.categories.insert(ctx.principal(), dto).await?;
    let location = format!("/categories/{}", category.id.unwrap_or_default());
    Ok(created(location, category))
}

pub async fn update_category(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
    Json(dto): Json<CategoryDto>,
) -> ApiResult<StatusCode> {
    state.categories.update(ctx.principal(), id, dto).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_category(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    state.categories.delete(ctx.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
