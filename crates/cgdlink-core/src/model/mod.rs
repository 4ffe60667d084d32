// ── Domain model ──
//
// Typed views over the raw strings in a `StatusDocument`.

pub mod door;
pub mod toggle;

pub use door::DoorState;
pub use toggle::Toggle;
