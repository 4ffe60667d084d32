// ── Last-known device status ──
//
// Single-document cache with push-based observation via a `watch` channel.
// Every write (fetched, optimistic, reverted) is visible to watchers;
// change *notifications* are the caller's decision, driven by the
// semantic comparison here.

use std::sync::Arc;

use tokio::sync::watch;

use cgdlink_api::{StatusDocument, StatusField};

/// Copy of the cached document taken before an optimistic edit.
#[derive(Debug, Clone)]
pub struct Snapshot {
    document: Arc<StatusDocument>,
}

impl Snapshot {
    pub fn document(&self) -> &StatusDocument {
        &self.document
    }
}

/// Holds the one current [`StatusDocument`] for a device.
pub struct StatusCache {
    current: watch::Sender<Option<Arc<StatusDocument>>>,
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusCache {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// The current document (cheap `Arc` clone).
    pub fn current(&self) -> Option<Arc<StatusDocument>> {
        self.current.borrow().clone()
    }

    /// Subscribe to every write via a `watch::Receiver`.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<StatusDocument>>> {
        self.current.subscribe()
    }

    /// Semantic equality over `lamp`, `door` and `vacation` only.
    ///
    /// A missing document never equals a present one.
    pub fn equal(a: Option<&StatusDocument>, b: Option<&StatusDocument>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.same_state(b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Store `incoming` if it differs semantically from the cached document.
    ///
    /// Returns the new document when it replaced the old one, `None` when
    /// the cache was left untouched.
    pub fn reconcile(&self, incoming: StatusDocument) -> Option<Arc<StatusDocument>> {
        let mut replaced = None;
        self.current.send_if_modified(|current| {
            if Self::equal(current.as_deref(), Some(&incoming)) {
                return false;
            }
            let doc = Arc::new(incoming);
            *current = Some(Arc::clone(&doc));
            replaced = Some(doc);
            true
        });
        replaced
    }

    /// Overwrite one field of the cached document.
    ///
    /// Returns the pre-edit snapshot, or `None` without touching anything
    /// when there is no document yet or the field has never been reported.
    pub fn apply_optimistic(&self, field: StatusField, value: &str) -> Option<Snapshot> {
        let mut snapshot = None;
        self.current.send_if_modified(|current| {
            let Some(doc) = current.as_mut() else {
                return false;
            };
            if doc.field(field).is_none() {
                return false;
            }
            snapshot = Some(Snapshot {
                document: Arc::clone(doc),
            });
            *Arc::make_mut(doc).field_mut(field) = Some(value.to_owned());
            true
        });
        snapshot
    }

    /// Restore the document captured in `snapshot`.
    pub fn revert(&self, snapshot: Snapshot) -> Arc<StatusDocument> {
        let restored = snapshot.document;
        self.current.send_replace(Some(Arc::clone(&restored)));
        restored
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(door: &str, lamp: &str) -> StatusDocument {
        StatusDocument {
            door: Some(door.into()),
            lamp: Some(lamp.into()),
            vacation: Some("off".into()),
            cycles: Some(json!(10)),
            ..Default::default()
        }
    }

    #[test]
    fn equal_is_reflexive_and_ignores_telemetry() {
        let a = doc("Closed", "off");
        assert!(StatusCache::equal(Some(&a), Some(&a)));

        let mut b = a.clone();
        b.cycles = Some(json!(11));
        b.rssi = Some(json!(-70));
        assert!(StatusCache::equal(Some(&a), Some(&b)));
    }

    #[test]
    fn absent_versus_present_is_not_equal() {
        let a = doc("Closed", "off");
        let mut b = a.clone();
        b.vacation = None;
        assert!(!StatusCache::equal(Some(&a), Some(&b)));
        assert!(!StatusCache::equal(None, Some(&a)));
        assert!(StatusCache::equal(None, None));
    }

    #[test]
    fn reconcile_replaces_only_on_semantic_change() {
        let cache = StatusCache::new();

        assert!(cache.reconcile(doc("Closed", "off")).is_some());

        let mut noisy = doc("Closed", "off");
        noisy.cycles = Some(json!(99));
        assert!(cache.reconcile(noisy).is_none());
        // Telemetry-only updates leave the stored document as it was.
        assert_eq!(cache.current().unwrap().cycles, Some(json!(10)));

        let replaced = cache.reconcile(doc("Opening", "off")).unwrap();
        assert_eq!(replaced.door.as_deref(), Some("Opening"));
        assert_eq!(cache.current().unwrap().door.as_deref(), Some("Opening"));
    }

    #[test]
    fn optimistic_edit_and_revert() {
        let cache = StatusCache::new();
        cache.reconcile(doc("Closed", "off"));
        let before = cache.current().unwrap();

        let snapshot = cache.apply_optimistic(StatusField::Door, "Opening").unwrap();
        assert_eq!(snapshot.document(), &*before);
        assert_eq!(cache.current().unwrap().door.as_deref(), Some("Opening"));

        let restored = cache.revert(snapshot);
        assert_eq!(&*restored, &*before);
        assert_eq!(*cache.current().unwrap(), *before);
    }

    #[test]
    fn optimistic_edit_skips_unreported_fields() {
        let cache = StatusCache::new();
        assert!(cache.apply_optimistic(StatusField::Lamp, "on").is_none());

        let mut partial = doc("Closed", "off");
        partial.lamp = None;
        cache.reconcile(partial.clone());

        assert!(cache.apply_optimistic(StatusField::Lamp, "on").is_none());
        assert_eq!(*cache.current().unwrap(), partial);
    }

    #[test]
    fn watchers_see_optimistic_writes() {
        let cache = StatusCache::new();
        cache.reconcile(doc("Closed", "off"));
        let mut rx = cache.subscribe();
        rx.borrow_and_update();

        cache.apply_optimistic(StatusField::Lamp, "on");
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().as_ref().unwrap().lamp.as_deref(),
            Some("on")
        );
    }
}
