//! Device-state reconciliation between `cgdlink-api` and a host integration.
//!
//! This crate keeps one cached view of a garage door opener consistent with
//! the physical device while exposing an immediately-updating view to the
//! host:
//!
//! - **[`Device`]** is the session facade. [`start()`](Device::start) primes
//!   the cache and spawns the periodic reconciliation ticker;
//!   [`stop()`](Device::stop) cancels it. Accessors map the cached strings to
//!   the numeric characteristic values a home-automation host expects.
//!
//! - **[`StatusCache`]** holds the last-known status document behind a
//!   `tokio::sync::watch` channel. Only `lamp`, `door` and `vacation` count
//!   for change detection; telemetry such as cycle counts never triggers a
//!   notification.
//!
//! - **Commands** ([`Device::set_target_door_state`],
//!   [`Device::set_lightbulb`], [`Device::set_vacation`]) write an optimistic
//!   value, send the request, then poll until the device reports the target.
//!   If every attempt fails the cache is restored from a snapshot.
//!
//! - **[`RetryExecutor`]** runs an operation a bounded number of times and
//!   reports retry, recovery and exhaustion through [`RetryHooks`].
//!
//! - **Domain model** ([`model`]) parses the device's free-form door strings
//!   into [`DoorState`] and its `on`/`off` flags into [`Toggle`].

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod retry;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::CommandOutcome;
pub use config::{DeviceConfig, POLL_INTERVAL_RANGE};
pub use device::Device;
pub use error::CoreError;
pub use model::{DoorState, Toggle};
pub use reconcile::ReconcileOutcome;
pub use retry::{LogHooks, RetryExecutor, RetryHooks};
pub use store::{ChangeSink, Snapshot, StatusCache};
pub use stream::{StatusStream, StatusWatchStream};

// Wire types used throughout the public API.
pub use cgdlink_api::{DeviceCommand, DoorAction, StatusDocument, StatusField};
