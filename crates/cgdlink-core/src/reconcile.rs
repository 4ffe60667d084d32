// ── Periodic reconciliation ──
//
// Pulls the device status on a fixed interval and folds it into the cache.
// A cycle is skipped while a command is in flight, and a fetch that
// overlapped any part of a command is thrown away.

use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use cgdlink_api::StatusDocument;

use crate::device::{Device, DeviceInner};
use crate::error::CoreError;
use crate::retry::LogHooks;

/// What one reconciliation cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A command was in flight or ran during the fetch; nothing was stored.
    Skipped,
    /// The fetched status matched the cache.
    Unchanged,
    /// The cache was replaced and subscribers were notified.
    Changed,
    /// Every fetch attempt failed; the cache keeps its last-known-good value.
    Failed,
}

/// Fetch the status with retries, recording the refresh time on success.
pub(crate) async fn fetch_status(inner: &DeviceInner) -> Option<StatusDocument> {
    let client = &inner.client;
    let status = inner
        .retry
        .run(
            move || async move { client.status().await.map_err(CoreError::from) },
            &mut LogHooks {
                operation: "status",
            },
        )
        .await?;
    inner.last_refresh.send_replace(Some(Utc::now()));
    Some(status)
}

/// Fold a fetched document into the cache, notifying on semantic change.
pub(crate) fn apply_status(inner: &DeviceInner, status: StatusDocument) -> ReconcileOutcome {
    match inner.cache.reconcile(status) {
        Some(doc) => {
            debug!(
                door = doc.door.as_deref(),
                lamp = doc.lamp.as_deref(),
                vacation = doc.vacation.as_deref(),
                "device status changed"
            );
            inner.notifier.notify(&doc);
            ReconcileOutcome::Changed
        }
        None => ReconcileOutcome::Unchanged,
    }
}

/// One reconciliation cycle. Cycles never overlap.
pub(crate) async fn reconcile_once(inner: &DeviceInner) -> ReconcileOutcome {
    let _cycle = inner.reconcile_lock.lock().await;

    if inner.is_updating() {
        trace!("command in flight, skipping reconciliation");
        return ReconcileOutcome::Skipped;
    }
    let epoch = inner.command_epoch();

    let Some(status) = fetch_status(inner).await else {
        warn!(device = %inner.config.url, "status unavailable, keeping last known state");
        return ReconcileOutcome::Failed;
    };

    // Any command that started while the fetch was outstanding, even one
    // that has already finished, holds newer state than this read.
    if inner.is_updating() || inner.command_epoch() != epoch {
        debug!("command ran during fetch, discarding result");
        return ReconcileOutcome::Skipped;
    }

    apply_status(inner, status)
}

/// Background ticker driving [`reconcile_once`].
pub(crate) struct ReconciliationLoop {
    device: Device,
    period: Duration,
}

impl ReconciliationLoop {
    pub(crate) fn new(device: Device) -> Self {
        let period = device.config().poll_interval;
        Self { device, period }
    }

    pub(crate) async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await; // consume immediate first tick

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let outcome = reconcile_once(&self.device.inner).await;
                    trace!(?outcome, "reconciliation tick");
                }
            }
        }

        debug!("reconciliation loop stopped");
    }
}
