use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use super::errors::{ApiError, ApiResult};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Checks `X-API-Key` against the configured key. With no key configured
/// every presented key is rejected.
pub fn authenticate(headers: &HeaderMap, expected: Option<&str>) -> ApiResult<()> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingApiKey)?;

    let expected = expected.ok_or(ApiError::InvalidApiKey)?;
    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::InvalidApiKey)
    }
}
