//! Status code based error suppression

use crate::client::ClientResult;

/// HTTP 404
pub const NOT_FOUND: u16 = 404;

/// Turn API errors carrying one of `codes` into success
///
/// Used to make deletes idempotent: deleting an object that is already gone
/// is not an error.
pub fn suppress_http_error_codes<T: Default>(
    result: ClientResult<T>,
    codes: &[u16],
) -> ClientResult<T> {
    match result {
        Err(e) if e.status_code().is_some_and(|code| codes.contains(&code)) => {
            log::debug!("Ignoring API error: {}", e);
            Ok(T::default())
        }
        other => other,
    }
}
