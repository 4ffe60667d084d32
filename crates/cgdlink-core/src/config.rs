// ── Runtime device configuration ──
//
// These types describe *how* to talk to one opener and how aggressively to
// reconcile with it. They carry the pre-shared key but never touch disk.
// The host integration constructs a `DeviceConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Accepted band for the reconciliation interval.
pub const POLL_INTERVAL_RANGE: (Duration, Duration) =
    (Duration::from_secs(2), Duration::from_secs(5));

/// Configuration for a single device session.
///
/// Built by the host, passed to [`Device`](crate::Device).
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device root URL (e.g., `http://192.168.1.50`).
    pub url: Url,
    /// Pre-shared API key.
    pub key: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Reconciliation interval.
    pub poll_interval: Duration,
    /// Retries after the first failed attempt, for reads and commands alike.
    pub retries: u32,
    /// Wait before each post-command status check.
    pub settle_delay: Duration,
    /// How long reconciliation stays suspended after a command finishes.
    pub update_grace: Duration,
}

impl DeviceConfig {
    /// Config for a device on the local network, e.g. `"192.168.1.50"`.
    pub fn new(host: &str, key: SecretString) -> Result<Self, CoreError> {
        let url = Url::parse(&format!("http://{host}")).map_err(|e| CoreError::Config {
            message: format!("invalid device host '{host}': {e}"),
        })?;
        Ok(Self::with_url(url, key))
    }

    /// Config for an explicit base URL.
    pub fn with_url(url: Url, key: SecretString) -> Self {
        Self {
            url,
            key,
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(3),
            retries: 3,
            settle_delay: Duration::from_secs(2),
            update_grace: Duration::from_secs(1),
        }
    }

    /// Override the reconciliation interval without the band check.
    ///
    /// Intended for tests and simulators that need a faster ticker.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check the config before a session is built from it.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !matches!(self.url.scheme(), "http" | "https") || self.url.host().is_none() {
            return Err(CoreError::Config {
                message: format!("device URL must be http(s) with a host, got '{}'", self.url),
            });
        }
        if self.timeout.is_zero() {
            return Err(CoreError::Config {
                message: "request timeout must be non-zero".into(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::Config {
                message: "poll interval must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// Whether the poll interval lies in the recommended 2–5s band.
    pub fn poll_interval_in_band(&self) -> bool {
        let (lo, hi) = POLL_INTERVAL_RANGE;
        (lo..=hi).contains(&self.poll_interval)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::from("k".to_string())
    }

    #[test]
    fn defaults_are_in_band() {
        let cfg = DeviceConfig::new("192.168.1.50", key()).unwrap();
        assert_eq!(cfg.url.as_str(), "http://192.168.1.50/");
        assert_eq!(cfg.retries, 3);
        assert!(cfg.poll_interval_in_band());
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_zero_intervals() {
        let cfg = DeviceConfig::new("opener.local", key())
            .unwrap()
            .with_poll_interval(Duration::ZERO);
        assert!(matches!(cfg.validate(), Err(CoreError::Config { .. })));

        let mut cfg = DeviceConfig::new("opener.local", key()).unwrap();
        cfg.timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_http_urls() {
        let cfg = DeviceConfig::with_url(Url::parse("file:///tmp/x").unwrap(), key());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fast_ticker_is_out_of_band_but_valid() {
        let cfg = DeviceConfig::new("opener.local", key())
            .unwrap()
            .with_poll_interval(Duration::from_millis(50));
        assert!(!cfg.poll_interval_in_band());
        cfg.validate().unwrap();
    }
}
