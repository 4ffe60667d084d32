// ── Core error types ──
//
// User-facing errors from cgdlink-core. Consumers never see reqwest or
// serde errors directly; the `From<cgdlink_api::Error>` impl translates
// transport-layer failures into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Device request timed out")]
    Timeout,

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Device did not reach expected state after {command}")]
    NotSettled { command: String },

    #[error("Door state is unknown (raw value: {raw:?})")]
    UnknownDoorState { raw: Option<String> },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Device session already running")]
    AlreadyRunning,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<cgdlink_api::Error> for CoreError {
    fn from(err: cgdlink_api::Error) -> Self {
        match err {
            cgdlink_api::Error::Transport(ref e) => {
                // reqwest embeds the full URL (key included) in its Display output.
                let reason = match e.url() {
                    Some(url) => e.to_string().replace(url.as_str(), &redacted_url(url)),
                    None => e.to_string(),
                };
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e.url().map_or_else(|| "<unknown>".into(), redacted_url),
                        reason,
                    }
                } else {
                    CoreError::Api {
                        message: reason,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            cgdlink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            cgdlink_api::Error::ClientBuild(msg) => CoreError::Config { message: msg },
            cgdlink_api::Error::Protocol { status, body } => CoreError::Api {
                message: format!("HTTP {status}: {body}"),
                status: Some(status),
            },
            cgdlink_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("malformed status document: {message}"),
                status: None,
            },
        }
    }
}

/// Render a request URL without its query string, which carries the key.
fn redacted_url(url: &url::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
