//! Shared test helper macro for attaching a bearer token to a request.
//! Usage: bearer_request!(req, token=&issued.token);
#[macro_export]
macro_rules! bearer_request {
    ($req:expr, token=$token:expr) => {{
        let h = $req.headers_mut();
        h.insert(
            ::axum::http::header::AUTHORIZATION,
            ::axum::http::HeaderValue::from_str(&format!("Bearer {}", $token)).unwrap(),
        );
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn macro_compiles() {
        let mut req = ::axum::http::Request::builder().uri("/").body(::axum::body::Body::empty()).unwrap();
        bearer_request!(req, token = "abc.def.ghi");
        assert_eq!(req.headers().get("Authorization").unwrap(), "Bearer abc.def.ghi");
    }
}
