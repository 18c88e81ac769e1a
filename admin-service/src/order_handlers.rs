use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use common_http_errors::ApiResult;
use common_security::PrincipalCtx;

use crate::app_state::AppState;
use crate::dto::NewOrder;
use crate::model::{EntityId, Order};
use crate::paging::{created, PageParams};
use crate::query::{Page, SortDirection};

pub async fn list_orders(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<Order>>> {
    let direction = params.direction(SortDirection::Desc)?;
    let page = state
        .orders
        .find_page(ctx.principal(), params.page(), params.size(), params.order_by("instant"), direction)
        .await?;
    Ok(Json(page))
}

pub async fn get_order(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders.find(ctx.principal(), id).await?))
}

pub async fn create_order(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
    Json(dto): Json<NewOrder>,
) -> ApiResult<(StatusCode, HeaderMap, Json<Order>)> {
    let order = state.orders.insert(ctx.principal(), dto).await?;
    let location = format!("/orders/{}", order.id.unwrap_or_default());
    Ok(created(location, order))
}
