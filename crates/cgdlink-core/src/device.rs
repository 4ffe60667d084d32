// ── Device session ──
//
// Lifecycle and accessor surface for one opener: owns the HTTP client,
// the status cache and the reconciliation ticker, and routes the three
// state-changing commands through the command runner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cgdlink_api::{DeviceClient, StatusDocument, TransportConfig};

use crate::command::{CommandOutcome, CommandRunner};
use crate::config::DeviceConfig;
use crate::error::CoreError;
use crate::model::{DoorState, Toggle};
use crate::reconcile::{self, ReconcileOutcome, ReconciliationLoop};
use crate::retry::RetryExecutor;
use crate::store::{ChangeSink, Notifier, StatusCache};
use crate::stream::StatusStream;

/// The main entry point for host integrations.
///
/// Cheaply cloneable via `Arc<DeviceInner>`. Call [`start()`](Self::start)
/// to begin periodic reconciliation and [`stop()`](Self::stop) to end it.
#[derive(Clone)]
pub struct Device {
    pub(crate) inner: Arc<DeviceInner>,
}

pub(crate) struct DeviceInner {
    pub(crate) config: DeviceConfig,
    pub(crate) client: DeviceClient,
    pub(crate) cache: StatusCache,
    pub(crate) notifier: Notifier,
    pub(crate) retry: RetryExecutor,
    /// Raised while a command is in flight; reconciliation skips its cycle.
    pub(crate) updating: AtomicBool,
    /// Serializes commands on this device.
    pub(crate) command_lock: Mutex<()>,
    /// Bumped each time a command starts.
    pub(crate) command_epoch: AtomicU64,
    /// Held for a whole reconciliation cycle; one fetch at a time.
    pub(crate) reconcile_lock: Mutex<()>,
    pub(crate) last_refresh: watch::Sender<Option<DateTime<Utc>>>,
    running: Mutex<Option<RunningLoop>>,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl DeviceInner {
    pub(crate) fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }

    pub(crate) fn command_epoch(&self) -> u64 {
        self.command_epoch.load(Ordering::SeqCst)
    }
}

impl Device {
    /// Create a session from configuration. Does NOT contact the device --
    /// call [`start()`](Self::start) or [`reconcile_now()`](Self::reconcile_now).
    pub fn new(config: DeviceConfig) -> Result<Self, CoreError> {
        config.validate()?;
        if !config.poll_interval_in_band() {
            warn!(
                interval_ms = config.poll_interval.as_millis(),
                "poll interval outside the recommended 2-5s band"
            );
        }

        let transport = TransportConfig::default().with_timeout(config.timeout);
        let client = DeviceClient::new(config.url.clone(), config.key.clone(), &transport)?;
        let retry = RetryExecutor::new(config.retries);
        let (last_refresh, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(DeviceInner {
                config,
                client,
                cache: StatusCache::new(),
                notifier: Notifier::new(),
                retry,
                updating: AtomicBool::new(false),
                command_lock: Mutex::new(()),
                command_epoch: AtomicU64::new(0),
                reconcile_lock: Mutex::new(()),
                last_refresh,
                running: Mutex::new(None),
            }),
        })
    }

    /// Access the session configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Prime the cache with one reconciliation cycle, then spawn the
    /// periodic ticker.
    ///
    /// A failed first fetch is logged, not returned: the ticker keeps
    /// trying and the accessors report unknown until it succeeds.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut running = self.inner.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(CoreError::AlreadyRunning);
        }

        let outcome = self.reconcile_now().await;
        debug!(?outcome, "initial reconciliation");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(ReconciliationLoop::new(self.clone()).run(cancel.clone()));
        *running = Some(RunningLoop { cancel, handle });

        info!(device = %self.inner.config.url, "device session started");
        Ok(())
    }

    /// Cancel the ticker and wait for it to finish. Idempotent.
    ///
    /// A reconciliation fetch already in progress runs to completion first.
    pub async fn stop(&self) {
        let Some(running) = self.inner.running.lock().await.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!(error = %e, "reconciliation task ended abnormally");
        }
        info!(device = %self.inner.config.url, "device session stopped");
    }

    /// Whether the reconciliation ticker is running.
    pub async fn is_running(&self) -> bool {
        self.inner
            .running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Run one reconciliation cycle now, outside the ticker.
    ///
    /// Waits for a cycle already in progress to finish first.
    pub async fn reconcile_now(&self) -> ReconcileOutcome {
        reconcile::reconcile_once(&self.inner).await
    }

    /// Whether a command is currently in flight.
    pub fn is_updating(&self) -> bool {
        self.inner.is_updating()
    }

    // ── Observation ──────────────────────────────────────────────

    /// Register a sink called once per semantic status change.
    pub fn subscribe(&self, sink: Arc<dyn ChangeSink>) {
        self.inner.notifier.subscribe(sink);
    }

    /// Broadcast stream of semantically changed documents.
    pub fn events(&self) -> broadcast::Receiver<Arc<StatusDocument>> {
        self.inner.notifier.events()
    }

    /// Watch every cache write, including optimistic edits and reverts.
    pub fn watch_status(&self) -> StatusStream {
        StatusStream::new(self.inner.cache.subscribe())
    }

    /// The cached status document.
    pub fn status(&self) -> Option<Arc<StatusDocument>> {
        self.inner.cache.current()
    }

    /// When the last successful status fetch completed.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_refresh.borrow()
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Parsed door state, with an error when the state is unknown.
    pub fn door_state(&self) -> Result<DoorState, CoreError> {
        let raw = self.status().and_then(|s| s.door.clone());
        let state = DoorState::parse(raw.as_deref());
        if state.is_known() {
            Ok(state)
        } else {
            Err(CoreError::UnknownDoorState { raw })
        }
    }

    /// 0 open, 1 closed, 2 opening, 3 closing, 4 stopped, -1 unknown.
    pub fn current_door_state(&self) -> i8 {
        self.parsed_door().current_value()
    }

    /// 0 open, 1 closed, -1 unknown.
    pub fn target_door_state(&self) -> i8 {
        self.parsed_door().target_value()
    }

    /// 1 on, 0 off, -1 unknown.
    pub fn lightbulb(&self) -> i8 {
        let status = self.status();
        Toggle::characteristic(Toggle::parse(status.as_ref().and_then(|s| s.lamp.as_deref())))
    }

    /// 1 on, 0 off, -1 unknown.
    pub fn vacation(&self) -> i8 {
        let status = self.status();
        Toggle::characteristic(Toggle::parse(
            status.as_ref().and_then(|s| s.vacation.as_deref()),
        ))
    }

    fn parsed_door(&self) -> DoorState {
        let status = self.status();
        DoorState::parse(status.as_ref().and_then(|s| s.door.as_deref()))
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Move the door: 0 opens, 1 closes. Any other value is rejected.
    pub async fn set_target_door_state(&self, value: u8) -> Result<CommandOutcome, CoreError> {
        CommandRunner::new(&self.inner)
            .set_target_door_state(value)
            .await
    }

    /// Switch the opener's lamp.
    pub async fn set_lightbulb(&self, on: bool) -> Result<CommandOutcome, CoreError> {
        CommandRunner::new(&self.inner).set_lightbulb(on).await
    }

    /// Switch vacation mode (remote lockout).
    pub async fn set_vacation(&self, on: bool) -> Result<CommandOutcome, CoreError> {
        CommandRunner::new(&self.inner).set_vacation(on).await
    }
}
