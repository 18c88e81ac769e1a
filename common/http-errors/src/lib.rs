use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use uuid::Uuid;

/// Error codes beyond this many distinct values are reported under `overflow`.
const MAX_ERROR_CODES: usize = 40;
const OVERFLOW_CODE: &str = "overflow";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldMessage {
    pub field: String,
    pub message: String,
}

impl FieldMessage {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub missing_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")] pub errors: Vec<FieldMessage>,
}

#[derive(Debug)]
pub enum ApiError {
    ForbiddenMissingRole { role: &'static str, trace_id: Option<Uuid> },
    Forbidden { trace_id: Option<Uuid>, message: Option<String> },
    Unauthorized { code: &'static str, trace_id: Option<Uuid> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    DataIntegrity { trace_id: Option<Uuid>, message: String },
    Validation { trace_id: Option<Uuid>, errors: Vec<FieldMessage> },
    NotFound { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    /// Internal failures get a fresh trace id so the log line and the response can be matched.
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        let trace_id = Uuid::new_v4();
        tracing::error!(%trace_id, error = %e, "internal error");
        Self::Internal { trace_id: Some(trace_id), message: None }
    }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest { code, trace_id: None, message: Some(message.into()) }
    }
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound { code, trace_id: None, message: Some(message.into()) }
    }
}

fn body(code: &str) -> ErrorBody {
    ErrorBody { code: code.into(), missing_role: None, trace_id: None, message: None, errors: Vec::new() }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, error_code) = match self {
            ApiError::ForbiddenMissingRole { role, trace_id } => (
                StatusCode::FORBIDDEN,
                ErrorBody { missing_role: Some(role.into()), trace_id, ..body("missing_role") },
                "missing_role",
            ),
            ApiError::Forbidden { trace_id, message } => (
                StatusCode::FORBIDDEN,
                ErrorBody { trace_id, message, ..body("forbidden") },
                "forbidden",
            ),
            ApiError::Unauthorized { code, trace_id } => (
                StatusCode::UNAUTHORIZED,
                ErrorBody { trace_id, ..body(code) },
                code,
            ),
            ApiError::BadRequest { code, trace_id, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { trace_id, message, ..body(code) },
                code,
            ),
            ApiError::DataIntegrity { trace_id, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { trace_id, message: Some(message), ..body("data_integrity") },
                "data_integrity",
            ),
            ApiError::Validation { trace_id, errors } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody { trace_id, message: Some("Validation failed".into()), errors, ..body("validation_failed") },
                "validation_failed",
            ),
            ApiError::NotFound { code, trace_id, message } => (
                StatusCode::NOT_FOUND,
                ErrorBody { trace_id, message, ..body(code) },
                code,
            ),
            ApiError::Internal { trace_id, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { trace_id, message, ..body("internal_error") },
                "internal_error",
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
        &["service", "code", "status"],
    )
    .expect("http_errors_total");
    let _ = prometheus::default_registry().register(Box::new(c.clone()));
    c
});

static ERROR_CODES_DISTINCT: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("http_error_codes_distinct", "Distinct error codes tracked as metric labels")
        .expect("http_error_codes_distinct");
    let _ = prometheus::default_registry().register(Box::new(g.clone()));
    g
});

static ERROR_CODE_OVERFLOW_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("http_error_code_overflow_total", "Error responses whose code exceeded the label guard")
        .expect("http_error_code_overflow_total");
    let _ = prometheus::default_registry().register(Box::new(c.clone()));
    c
});

static SEEN_CODES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Returns the label to use for `code`, collapsing new codes into `overflow` once the guard is hit.
fn guarded_code_label(code: &str) -> String {
    let Ok(mut seen) = SEEN_CODES.lock() else {
        return OVERFLOW_CODE.to_string();
    };
    if seen.contains(code) {
        return code.to_string();
    }
    if seen.len() >= MAX_ERROR_CODES {
        ERROR_CODE_OVERFLOW_TOTAL.inc();
        return OVERFLOW_CODE.to_string();
    }
    seen.insert(code.to_string());
    ERROR_CODES_DISTINCT.set(seen.len() as i64);
    code.to_string()
}

pub fn record_error_response(service: &str, code: &str, status: StatusCode) {
    let label = guarded_code_label(code);
    HTTP_ERRORS_TOTAL
        .with_label_values(&[service, label.as_str(), status.as_str()])
        .inc();
}

pub fn distinct_error_codes() -> i64 {
    ERROR_CODES_DISTINCT.get()
}

pub fn overflowed_error_codes() -> u64 {
    ERROR_CODE_OVERFLOW_TOTAL.get()
}

type MiddlewareFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Middleware counting every response with status >= 400, labelled by `X-Error-Code`.
pub fn http_error_metrics_layer(
    service: &'static str,
) -> impl Fn(Request<Body>, Next) -> MiddlewareFuture + Clone + Send + Sync + 'static {
    move |req: Request<Body>, next: Next| {
        let fut: MiddlewareFuture = Box::pin(async move {
            let resp = next.run(req).await;
            let status = resp.status();
            if status.as_u16() >= 400 {
                let code = resp
                    .headers()
                    .get("X-Error-Code")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                record_error_response(service, code, status);
            }
            resp
        });
        fut
    }
}
