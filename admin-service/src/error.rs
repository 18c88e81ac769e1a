use common_http_errors::{ApiError, FieldMessage};
use common_security::SecurityError;
use thiserror::Error;

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error(transparent)]
    Forbidden(#[from] SecurityError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("validation failed")]
    Validation(Vec<FieldMessage>),
    #[error("{0}")]
    IntegrityViolation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }

    /// `Ok` when there is nothing to report.
    pub fn check_fields(errors: Vec<FieldMessage>) -> ServiceResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::Validation(errors))
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IntegrityViolation(msg) => ServiceError::IntegrityViolation(msg),
            other => ServiceError::Store(other),
        }
    }
}

fn not_found_code(kind: &str) -> &'static str {
    match kind {
        "category" => "category_not_found",
        "product" => "product_not_found",
        "customer" => "customer_not_found",
        "order" => "order_not_found",
        _ => "not_found",
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { kind, id } => {
                ApiError::not_found(not_found_code(kind), format!("{kind} {id} not found"))
            }
            ServiceError::Forbidden(sec) => sec.into(),
            ServiceError::InvalidArgument(msg) => ApiError::bad_request("invalid_argument", msg),
            ServiceError::Validation(errors) => ApiError::Validation { trace_id: None, errors },
            ServiceError::IntegrityViolation(message) => ApiError::DataIntegrity { trace_id: None, message },
            ServiceError::InvalidCredentials => ApiError::Unauthorized { code: "invalid_credentials", trace_id: None },
            ServiceError::Internal(msg) => ApiError::internal(msg),
            ServiceError::Store(e) => ApiError::internal(e),
        }
    }
}
