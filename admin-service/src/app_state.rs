use std::sync::Arc;

use axum::extract::FromRef;
use common_auth::TokenService;
use common_observability::AdminMetrics;
use common_security::IdentityLookup;

use crate::identity::StoreIdentityLookup;
use crate::services::{AuthService, CategoryService, CustomerService, OrderService, ProductService};
use crate::store::Stores;

/// Shared application state used by handlers.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub identity: Arc<dyn IdentityLookup>,
    pub metrics: Arc<AdminMetrics>,
    pub auth: AuthService,
    pub categories: CategoryService,
    pub products: ProductService,
    pub customers: CustomerService,
    pub orders: OrderService,
}

impl AppState {
    pub fn new(stores: Stores, tokens: Arc<TokenService>, metrics: Arc<AdminMetrics>) -> Self {
        let Stores { categories, products, customers, orders } = stores;
        Self {
            identity: Arc::new(StoreIdentityLookup::new(customers.clone())),
            auth: AuthService::new(customers.clone(), tokens.clone(), metrics.clone()),
            categories: CategoryService::new(categories.clone()),
            products: ProductService::new(products.clone(), categories),
            orders: OrderService::new(orders, customers.clone(), products),
            customers: CustomerService::new(customers),
            tokens,
            metrics,
        }
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl FromRef<AppState> for Arc<dyn IdentityLookup> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}
