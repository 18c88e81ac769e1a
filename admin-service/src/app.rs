use axum::extract::State;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION},
    HeaderValue, Method, StatusCode,
};
use axum::routing::{get, post};
use axum::{middleware, Router};
use common_http_errors::http_error_metrics_layer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::app_state::AppState;
use crate::auth_handlers::{login, refresh_token};
use crate::category_handlers::{
    create_category, delete_category, get_category, list_categories, page_categories, update_category,
};
use crate::customer_handlers::{
    create_customer, delete_customer, get_customer, get_customer_by_email, list_customers, page_customers,
    update_customer,
};
use crate::order_handlers::{create_order, get_order, list_orders};
use crate::product_handlers::{create_product, delete_product, get_product, search_products, update_product};

pub const SERVICE_NAME: &str = "admin-service";

pub async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(err) => {
            warn!(error = %err, "metrics encode failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {err}"))
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([AUTHORIZATION, LOCATION])
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/login", post(login))
        .route("/auth/refresh_token", post(refresh_token))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/page", get(page_categories))
        .route(
            "/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/products", get(search_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/page", get(page_customers))
        .route("/customers/email", get(get_customer_by_email))
        .route(
            "/customers/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/:id", get(get_order))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(middleware::from_fn(http_error_metrics_layer(SERVICE_NAME)))
}
