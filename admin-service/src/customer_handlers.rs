use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use common_http_errors::ApiResult;
use common_security::PrincipalCtx;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::dto::{CustomerUpdate, NewCustomer};
use crate::model::{Customer, EntityId};
use crate::paging::{created, PageParams};
use crate::query::{Page, SortDirection};

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub value: String,
}

pub async fn list_customers(State(state): State<AppState>, ctx: PrincipalCtx) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.customers.find_all(ctx.principal()).await?))
}

pub async fn page_customers(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<Customer>>> {
    let direction = params.direction(SortDirection::Asc)?;
    let page = state
        .customers
        .find_page(ctx.principal(), params.page(), params.size(), params.order_by("name"), direction)
        .await?;
    Ok(Json(page))
}

pub async fn get_customer(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.customers.find(ctx.principal(), id).await?))
}

pub async fn get_customer_by_email(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.customers.find_by_email(ctx.principal(), &query.value).await?))
}

pub async fn create_customer(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Json(dto): Json<NewCustomer>,
) -> ApiResult<(StatusCode, HeaderMap, Json<Customer>)> {
    let customer = state.customers.insert(ctx.principal(), dto).await?;
    let location = format!("/customers/{}", customer.id.unwrap_or_default());
    Ok(created(location, customer))
}

pub async fn update_customer(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
    Json(dto): Json<CustomerUpdate>,
) -> ApiResult<StatusCode> {
    state.customers.update(ctx.principal(), id, dto).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_customer(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    state.customers.delete(ctx.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
