pub mod app;
pub mod app_state;
pub mod auth_handlers;
pub mod category_handlers;
pub mod config;
pub mod customer_handlers;
pub mod dto;
pub mod error;
pub mod identity;
pub mod model;
pub mod order_handlers;
pub mod paging;
pub mod product_handlers;
pub mod query;
pub mod services;
pub mod store;

pub use app::build_router;
pub use app_state::AppState;
pub use config::{AdminBootstrap, AppConfig, StoreBackend};
pub use error::{ServiceError, ServiceResult};
pub use query::{FilteredPageQuery, Page, PageRequest, SearchFilter, SortDirection};
