// ── Change notification fan-out ──

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use cgdlink_api::StatusDocument;

const EVENT_CHANNEL_SIZE: usize = 64;

/// Receives the device status each time it changes semantically.
///
/// The document is borrowed for the duration of the call; sinks that need
/// it later should clone what they use.
pub trait ChangeSink: Send + Sync {
    fn on_change(&self, status: &StatusDocument);
}

impl<F> ChangeSink for F
where
    F: Fn(&StatusDocument) + Send + Sync,
{
    fn on_change(&self, status: &StatusDocument) {
        self(status);
    }
}

/// Registered sinks plus a broadcast channel for async consumers.
pub(crate) struct Notifier {
    sinks: RwLock<Vec<Arc<dyn ChangeSink>>>,
    events: broadcast::Sender<Arc<StatusDocument>>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            sinks: RwLock::new(Vec::new()),
            events,
        }
    }

    pub(crate) fn subscribe(&self, sink: Arc<dyn ChangeSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    pub(crate) fn events(&self) -> broadcast::Receiver<Arc<StatusDocument>> {
        self.events.subscribe()
    }

    /// Deliver one change to every sink and broadcast receiver.
    pub(crate) fn notify(&self, status: &Arc<StatusDocument>) {
        // Clone the list so a sink may subscribe another without deadlocking.
        let sinks = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for sink in &sinks {
            sink.on_change(status);
        }
        // No receivers is fine.
        let _ = self.events.send(Arc::clone(status));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_sink_sees_each_change() {
        let notifier = Notifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let hits = Arc::clone(&hits);
            notifier.subscribe(Arc::new(move |_: &StatusDocument| {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        let mut rx = notifier.events();

        let doc = Arc::new(StatusDocument {
            door: Some("Closed".into()),
            ..Default::default()
        });
        notifier.notify(&doc);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(rx.try_recv().unwrap().door.as_deref(), Some("Closed"));
    }

    #[test]
    fn notify_without_subscribers_is_harmless() {
        let notifier = Notifier::new();
        notifier.notify(&Arc::new(StatusDocument::default()));
    }
}
