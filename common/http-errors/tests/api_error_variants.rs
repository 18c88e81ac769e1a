use common_http_errors::{ApiError, FieldMessage};
use axum::response::IntoResponse;
use axum::http::StatusCode;
use uuid::Uuid;

#[test]
fn forbidden_missing_role_variant() {
    let err = ApiError::ForbiddenMissingRole { role: "ADMIN", trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_role");
}

#[test]
fn forbidden_variant() {
    let err = ApiError::Forbidden { trace_id: None, message: Some("access denied".into()) };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "forbidden");
}

#[test]
fn unauthorized_variant() {
    let err = ApiError::Unauthorized { code: "token_invalid", trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "token_invalid");
}

#[test]
fn bad_request_variant() {
    let err = ApiError::BadRequest { code: "invalid_argument", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "invalid_argument");
}

#[test]
fn data_integrity_variant() {
    let err = ApiError::DataIntegrity { trace_id: None, message: "category has products".into() };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "data_integrity");
}

#[test]
fn validation_variant() {
    let err = ApiError::Validation { trace_id: None, errors: vec![FieldMessage::new("name", "required")] };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "validation_failed");
}

#[test]
fn not_found_variant() {
    let err = ApiError::not_found("customer_not_found", "customer 7 not found");
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "customer_not_found");
}

#[test]
fn internal_variant() {
    let trace = Some(Uuid::new_v4());
    let err = ApiError::Internal { trace_id: trace, message: Some("boom".into()) };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "internal_error");
}

#[test]
fn internal_helper_assigns_trace_id() {
    match ApiError::internal("db down") {
        ApiError::Internal { trace_id, message } => {
            assert!(trace_id.is_some());
            assert!(message.is_none(), "internal details must not reach the client");
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}
