use axum::http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::error::ServiceResult;
use crate::query::SortDirection;

pub const DEFAULT_LINES_PER_PAGE: i64 = 24;

/// Query string shared by the `/…/page` listings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page: Option<i64>,
    pub lines_per_page: Option<i64>,
    pub order_by: Option<String>,
    pub direction: Option<String>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(0)
    }

    pub fn size(&self) -> i64 {
        self.lines_per_page.unwrap_or(DEFAULT_LINES_PER_PAGE)
    }

    pub fn order_by<'a>(&'a self, default: &'a str) -> &'a str {
        self.order_by.as_deref().unwrap_or(default)
    }

    pub fn direction(&self, default: SortDirection) -> ServiceResult<SortDirection> {
        match self.direction.as_deref() {
            Some(raw) => raw.parse(),
            None => Ok(default),
        }
    }
}

/// `201 Created` with a `Location` pointing at the new resource.
pub fn created<T>(location: String, body: T) -> (StatusCode, HeaderMap, Json<T>) {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(LOCATION, value);
    }
    (StatusCode::CREATED, headers, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_params() {
        let params = PageParams::default();
        assert_eq!(params.page(), 0);
        assert_eq!(params.size(), 24);
        assert_eq!(params.order_by("name"), "name");
        assert_eq!(params.direction(SortDirection::Desc).unwrap(), SortDirection::Desc);
    }

    #[test]
    fn bad_direction_is_rejected() {
        let params = PageParams { direction: Some("sideways".into()), ..PageParams::default() };
        assert!(params.direction(SortDirection::Asc).is_err());
    }

    #[test]
    fn created_sets_location() {
        let (status, headers, _) = created("/categories/7".into(), ());
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers.get(LOCATION).unwrap(), "/categories/7");
    }
}
