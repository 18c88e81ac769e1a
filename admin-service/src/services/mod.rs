//! One access-controlled service per entity. Every operation takes the
//! caller explicitly as `Option<&Principal>`.

pub mod auth_service;
pub mod category_service;
pub mod customer_service;
pub mod order_service;
pub mod product_service;

pub use auth_service::AuthService;
pub use category_service::CategoryService;
pub use customer_service::CustomerService;
pub use order_service::OrderService;
pub use product_service::ProductService;
