// ── Device status store ──
//
// The cached status document and the fan-out that tells subscribers
// when it changes.

mod cache;
mod notify;

pub use cache::{Snapshot, StatusCache};
pub use notify::ChangeSink;
pub(crate) use notify::Notifier;
