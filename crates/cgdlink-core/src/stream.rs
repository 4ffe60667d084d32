// ── Reactive status stream ──
//
// Subscription handle over every write to the status cache, including
// optimistic edits and reverts.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use cgdlink_api::StatusDocument;

type Slot = Option<Arc<StatusDocument>>;

/// A subscription to the cached device status.
///
/// Provides both point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct StatusStream {
    current: Slot,
    receiver: watch::Receiver<Slot>,
}

impl StatusStream {
    pub(crate) fn new(receiver: watch::Receiver<Slot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The status captured at creation time or at the last `changed()`.
    pub fn current(&self) -> Option<&Arc<StatusDocument>> {
        self.current.as_ref()
    }

    /// The latest status (may have changed since creation).
    pub fn latest(&self) -> Slot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next write, returning the new status.
    /// Returns `None` if the device session has been dropped.
    pub async fn changed(&mut self) -> Option<Slot> {
        self.receiver.changed().await.ok()?;
        let status = self.receiver.borrow_and_update().clone();
        self.current.clone_from(&status);
        Some(status)
    }

    /// Convert into a `Stream` that yields the current value first.
    pub fn into_stream(self) -> StatusWatchStream {
        StatusWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct StatusWatchStream {
    inner: WatchStream<Slot>,
}

impl Stream for StatusWatchStream {
    type Item = Slot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::StatusCache;
    use cgdlink_api::StatusField;
    use futures_util::StreamExt;

    fn closed() -> StatusDocument {
        StatusDocument {
            door: Some("Closed".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn changed_tracks_cache_writes() {
        let cache = StatusCache::new();
        let mut stream = StatusStream::new(cache.subscribe());
        assert!(stream.current().is_none());

        cache.reconcile(closed());
        let status = stream.changed().await.unwrap().unwrap();
        assert_eq!(status.door.as_deref(), Some("Closed"));
        assert_eq!(stream.current().unwrap().door.as_deref(), Some("Closed"));

        cache.apply_optimistic(StatusField::Door, "Opening");
        assert_eq!(
            stream.latest().unwrap().door.as_deref(),
            Some("Opening")
        );
    }

    #[tokio::test]
    async fn into_stream_yields_current_value_first() {
        let cache = StatusCache::new();
        cache.reconcile(closed());

        let mut stream = StatusStream::new(cache.subscribe()).into_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.door.as_deref(), Some("Closed"));
    }
}
