use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use axum::Json;
use common_auth::IssuedToken;
use common_http_errors::{ApiError, ApiResult};
use common_security::PrincipalCtx;

use crate::app_state::AppState;
use crate::dto::Credentials;

fn token_response(issued: IssuedToken) -> ApiResult<(HeaderMap, Json<IssuedToken>)> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("Bearer {}", issued.token)).map_err(ApiError::internal)?;
    headers.insert(AUTHORIZATION, value);
    Ok((headers, Json(issued)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<(HeaderMap, Json<IssuedToken>)> {
    let issued = state.auth.login(credentials).await?;
    token_response(issued)
}

pub async fn refresh_token(
    State(state): State<AppState>,
    ctx: PrincipalCtx,
) -> ApiResult<(HeaderMap, Json<IssuedToken>)> {
    let issued = state.auth.refresh(ctx.principal())?;
    token_response(issued)
}
