// Device API HTTP client
//
// Wraps `reqwest::Client` with key-authenticated URL construction and
// status-document parsing. One request per call: retry policy belongs to
// the caller.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, preview};
use crate::models::{DeviceCommand, StatusDocument};
use crate::transport::TransportConfig;

/// Raw HTTP client for an opener's local API.
///
/// Every request is `GET {base}/api?key={key}&{cmd}={value}` and every
/// successful response body is a [`StatusDocument`].
#[derive(Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
    key: SecretString,
}

impl std::fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl DeviceClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the device root, e.g. `http://192.168.1.50`.
    pub fn new(base_url: Url, key: SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, key))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, key: SecretString) -> Self {
        Self {
            http,
            base_url,
            key,
        }
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build `{base}/api?key={key}&{command}={value}`.
    pub(crate) fn api_url(&self, command: &str, value: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/api"))?;
        url.query_pairs_mut()
            .append_pair("key", self.key.expose_secret())
            .append_pair(command, value);
        Ok(url)
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Issue a single `{command}={value}` request and parse the status
    /// document the device answers with.
    pub async fn fetch(&self, command: &str, value: &str) -> Result<StatusDocument, Error> {
        let url = self.api_url(command, value)?;
        debug!(base = %self.base_url, command, value, "GET /api");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Protocol {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(command, bytes = body.len(), "status body received");

        serde_json::from_str(&body).map_err(|e| {
            let preview = preview(&body);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }

    /// Send a typed command.
    pub async fn send(&self, command: DeviceCommand) -> Result<StatusDocument, Error> {
        let (cmd, value) = command.query_pair();
        self.fetch(cmd, value).await
    }

    /// Read the current status (`status=json`).
    pub async fn status(&self) -> Result<StatusDocument, Error> {
        self.send(DeviceCommand::Status).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> DeviceClient {
        DeviceClient::with_client(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            SecretString::from("s3cret&key".to_string()),
        )
    }

    #[test]
    fn api_url_encodes_key_and_command() {
        let url = client("http://10.0.0.5/").api_url("door", "open").unwrap();
        assert_eq!(url.path(), "/api");
        assert_eq!(url.query(), Some("key=s3cret%26key&door=open"));
    }

    #[test]
    fn debug_output_hides_key() {
        let rendered = format!("{:?}", client("http://10.0.0.5"));
        assert!(!rendered.contains("s3cret"));
    }
}
