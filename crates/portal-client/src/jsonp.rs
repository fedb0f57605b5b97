use crate::{PortalError, PortalResult, JSONP_CALLBACK};
use serde::de::DeserializeOwned;

/// Strip a `jQuery(...)` wrapper if present.
///
/// Bodies without the wrapper are returned unchanged (after trimming), so
/// plain JSON and JSONP parse identically.
pub fn strip_jsonp(body: &str) -> &str {
    let trimmed = body.trim();
    trimmed
        .strip_prefix(JSONP_CALLBACK)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(trimmed)
}

/// Decode a JSON or JSONP body into a typed response.
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> PortalResult<T> {
    serde_json::from_str(strip_jsonp(body)).map_err(PortalError::Decode)
}
