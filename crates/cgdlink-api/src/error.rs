use thiserror::Error;

/// Top-level error type for the `cgdlink-api` crate.
///
/// Covers every failure mode of a single request against the opener's
/// local API. `cgdlink-core` maps these into its own diagnostics and
/// decides what is worth retrying.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The `reqwest::Client` could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// The device answered with a non-2xx status.
    ///
    /// `body` holds at most the first 200 bytes of the response.
    #[error("Device returned HTTP {status}: {body}")]
    Protocol { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Truncate a response body for inclusion in an error message.
pub(crate) fn preview(body: &str) -> String {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(preview(&body).len(), 200);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = format!("{}é", "a".repeat(199));
        assert_eq!(preview(&body), "a".repeat(199));
    }
}
