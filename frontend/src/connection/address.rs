//! Socket endpoint resolution. Pure functions, no I/O.

use crate::error::{ToolkitError, ToolkitResult};
use tokio_tungstenite::tungstenite::http::Uri;

pub const SECURE_SOCKET_SCHEME: &str = "wss://";
pub const INSECURE_SOCKET_SCHEME: &str = "ws://";

/// Socket scheme matching the scheme the page was served with.
/// Accepts both `https` and the browser-style `https:`.
pub fn socket_scheme(page_scheme: &str) -> &'static str {
    match page_scheme.trim().trim_end_matches(':').to_ascii_lowercase().as_str() {
        "https" | "wss" => SECURE_SOCKET_SCHEME,
        _ => INSECURE_SOCKET_SCHEME,
    }
}

/// Resolves `path` against `<socket scheme><host>` into an absolute endpoint.
///
/// - absolute `ws://`/`wss://` paths are used as they are
/// - `//host/path` keeps the socket scheme and switches host
/// - anything else is rooted at `/` on `host`
///
/// Dot segments are not collapsed.
pub fn resolve_endpoint(page_scheme: &str, host: &str, path: &str) -> ToolkitResult<Uri> {
    let scheme = socket_scheme(page_scheme);

    let endpoint = if path.starts_with(SECURE_SOCKET_SCHEME) || path.starts_with(INSECURE_SOCKET_SCHEME) {
        path.to_string()
    } else if path.contains("://") {
        return Err(ToolkitError::InvalidEndpoint {
            endpoint: path.to_string(),
            reason: "only ws:// and wss:// endpoints are supported".to_string(),
        });
    } else if let Some(rest) = path.strip_prefix("//") {
        format!("{scheme}{rest}")
    } else {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() || host.contains("://") {
            return Err(ToolkitError::InvalidEndpoint {
                endpoint: host.to_string(),
                reason: "host must be a bare `host[:port]`".to_string(),
            });
        }
        if path.starts_with('/') {
            format!("{scheme}{host}{path}")
        } else {
            format!("{scheme}{host}/{path}")
        }
    };

    endpoint
        .parse::<Uri>()
        .map_err(|error| ToolkitError::InvalidEndpoint {
            reason: error.to_string(),
            endpoint,
        })
}
