// ── Command transactions ──
//
// Each state-changing command runs as one optimistic transaction:
//
//   1. take the per-device command lock and raise the updating flag
//   2. write the expected interim value into the cache and notify
//   3. send the command, wait, poll until the device reports the target
//   4. on success commit the polled document; on exhaustion restore the
//      snapshot from step 2
//
// The updating flag stays raised for a short grace period after the
// transaction so the ticker does not read a stale transitional status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

use cgdlink_api::{DeviceCommand, DoorAction, StatusDocument, StatusField};

use crate::device::DeviceInner;
use crate::error::CoreError;
use crate::model::{DoorState, Toggle};
use crate::reconcile;
use crate::retry::RetryHooks;
use crate::store::{Notifier, Snapshot, StatusCache};

/// How a command ended.
#[derive(Debug)]
pub enum CommandOutcome {
    /// The device reached the requested state and the cache holds its report.
    Applied,
    /// The door was already in the requested terminal state; nothing was sent.
    AlreadyInState,
    /// Every attempt failed. The cache was restored to its pre-command
    /// contents and the last error is attached.
    Reverted(CoreError),
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied | Self::AlreadyInState)
    }
}

// ── Plans ────────────────────────────────────────────────────────────

/// The condition a polled status must meet for a command to count.
#[derive(Debug, Clone, Copy)]
enum Expectation {
    DoorOpen,
    DoorClosed,
    Field(StatusField, Toggle),
}

impl Expectation {
    fn reached(self, status: &StatusDocument) -> bool {
        match self {
            Self::DoorOpen => DoorState::parse(status.door.as_deref()).satisfies_open(),
            Self::DoorClosed => DoorState::parse(status.door.as_deref()).satisfies_close(),
            Self::Field(field, toggle) => status.field(field) == Some(toggle.as_str()),
        }
    }

    /// Whether sending the command would be pointless. Only the door's
    /// terminal states count; toggles are always sent.
    fn already_in_state(self, status: &StatusDocument) -> bool {
        let door = DoorState::parse(status.door.as_deref());
        match self {
            Self::DoorOpen => door == DoorState::Opened,
            Self::DoorClosed => door == DoorState::Closed,
            Self::Field(..) => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CommandPlan {
    command: DeviceCommand,
    field: StatusField,
    /// Optimistic value written before the device answers.
    pending: &'static str,
    expect: Expectation,
}

impl CommandPlan {
    fn door(action: DoorAction) -> Self {
        let (pending, expect) = match action {
            DoorAction::Open => ("Opening", Expectation::DoorOpen),
            DoorAction::Close => ("Closing", Expectation::DoorClosed),
        };
        Self {
            command: DeviceCommand::Door(action),
            field: StatusField::Door,
            pending,
            expect,
        }
    }

    fn lamp(on: bool) -> Self {
        let toggle = Toggle::from_bool(on);
        Self {
            command: DeviceCommand::Lamp(on),
            field: StatusField::Lamp,
            pending: toggle.as_str(),
            expect: Expectation::Field(StatusField::Lamp, toggle),
        }
    }

    fn vacation(on: bool) -> Self {
        let toggle = Toggle::from_bool(on);
        Self {
            command: DeviceCommand::Vacation(on),
            field: StatusField::Vacation,
            pending: toggle.as_str(),
            expect: Expectation::Field(StatusField::Vacation, toggle),
        }
    }
}

// ── Updating flag ────────────────────────────────────────────────────

/// Holds the command lock and keeps the updating flag raised until dropped.
pub(crate) struct UpdateGuard<'a> {
    flag: &'a AtomicBool,
    _serial: MutexGuard<'a, ()>,
}

impl<'a> UpdateGuard<'a> {
    pub(crate) async fn acquire(inner: &'a DeviceInner) -> Self {
        let serial = inner.command_lock.lock().await;
        inner.updating.store(true, Ordering::SeqCst);
        inner.command_epoch.fetch_add(1, Ordering::SeqCst);
        Self {
            flag: &inner.updating,
            _serial: serial,
        }
    }

    /// Keep reconciliation suspended for `grace`, then lower the flag.
    pub(crate) async fn release(self, grace: Duration) {
        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }
        drop(self);
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// ── Transaction ──────────────────────────────────────────────────────

/// Optimistic-edit bookkeeping for one command, driven by the retry hooks.
struct CommandTransaction<'a> {
    command: DeviceCommand,
    cache: &'a StatusCache,
    notifier: &'a Notifier,
    snapshot: Option<Snapshot>,
    /// Whether the optimistic write actually changed the field.
    changed: bool,
    failure: Option<CoreError>,
}

impl<'a> CommandTransaction<'a> {
    fn begin(inner: &'a DeviceInner, plan: &CommandPlan) -> Self {
        let snapshot = inner.cache.apply_optimistic(plan.field, plan.pending);
        let changed = snapshot
            .as_ref()
            .is_some_and(|s| s.document().field(plan.field) != Some(plan.pending));

        if changed {
            if let Some(doc) = inner.cache.current() {
                debug!(command = %plan.command, field = %plan.field, value = plan.pending, "optimistic update");
                inner.notifier.notify(&doc);
            }
        }

        Self {
            command: plan.command,
            cache: &inner.cache,
            notifier: &inner.notifier,
            snapshot,
            changed,
            failure: None,
        }
    }

    /// Store the status that satisfied the settle check.
    fn commit(&self, settled: StatusDocument) {
        if let Some(doc) = self.cache.reconcile(settled) {
            self.notifier.notify(&doc);
        }
    }
}

impl RetryHooks for CommandTransaction<'_> {
    fn on_retry(&mut self, error: &CoreError, remaining: u32) {
        warn!(command = %self.command, remaining, error = %error, "command attempt failed, retrying");
    }

    fn on_recovered(&mut self, remaining: u32) {
        info!(command = %self.command, remaining, "command recovered after retry");
    }

    fn on_exhausted(&mut self, error: CoreError) {
        warn!(command = %self.command, error = %error, "command failed, reverting optimistic state");
        if let Some(snapshot) = self.snapshot.take() {
            let restored = self.cache.revert(snapshot);
            if self.changed {
                self.notifier.notify(&restored);
            }
        }
        self.failure = Some(error);
    }
}

// ── Runner ───────────────────────────────────────────────────────────

/// Executes state-changing commands against one device.
pub(crate) struct CommandRunner<'a> {
    inner: &'a DeviceInner,
}

impl<'a> CommandRunner<'a> {
    pub(crate) fn new(inner: &'a DeviceInner) -> Self {
        Self { inner }
    }

    /// 0 opens the door, 1 closes it.
    pub(crate) async fn set_target_door_state(
        &self,
        value: u8,
    ) -> Result<CommandOutcome, CoreError> {
        let action = match value {
            0 => DoorAction::Open,
            1 => DoorAction::Close,
            other => {
                return Err(CoreError::ValidationFailed {
                    message: format!("target door state must be 0 or 1, got {other}"),
                });
            }
        };
        Ok(self.execute(CommandPlan::door(action)).await)
    }

    pub(crate) async fn set_lightbulb(&self, on: bool) -> Result<CommandOutcome, CoreError> {
        Ok(self.execute(CommandPlan::lamp(on)).await)
    }

    pub(crate) async fn set_vacation(&self, on: bool) -> Result<CommandOutcome, CoreError> {
        Ok(self.execute(CommandPlan::vacation(on)).await)
    }

    async fn execute(&self, plan: CommandPlan) -> CommandOutcome {
        let guard = UpdateGuard::acquire(self.inner).await;

        // Without a cached document there is nothing to edit optimistically
        // or to revert to; read one first.
        if self.inner.cache.current().is_none() {
            if let Some(status) = reconcile::fetch_status(self.inner).await {
                reconcile::apply_status(self.inner, status);
            }
        }

        let current = self.inner.cache.current();
        if current.is_some_and(|doc| plan.expect.already_in_state(&doc)) {
            debug!(command = %plan.command, "device already in requested state");
            return CommandOutcome::AlreadyInState;
        }

        let mut txn = CommandTransaction::begin(self.inner, &plan);
        let client = &self.inner.client;
        let settle_delay = self.inner.config.settle_delay;
        let expect = plan.expect;
        let command = plan.command;

        let settled = self
            .inner
            .retry
            .run_settled(
                move || async move { client.send(command).await.map_err(CoreError::from) },
                move |_ack| async move {
                    tokio::time::sleep(settle_delay).await;
                    let status = client.status().await.map_err(CoreError::from)?;
                    Ok::<_, CoreError>(expect.reached(&status).then_some(status))
                },
                move || CoreError::NotSettled {
                    command: command.to_string(),
                },
                &mut txn,
            )
            .await;

        let outcome = match settled {
            Some(status) => {
                txn.commit(status);
                info!(command = %command, "command applied");
                CommandOutcome::Applied
            }
            None => CommandOutcome::Reverted(txn.failure.take().unwrap_or_else(|| {
                CoreError::Internal(format!("{command} exhausted without an error"))
            })),
        };

        guard.release(self.inner.config.update_grace).await;
        outcome
    }
}
