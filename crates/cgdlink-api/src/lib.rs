// cgdlink-api: Async Rust client for the local HTTP API of CGD garage door openers

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::DeviceClient;
pub use error::Error;
pub use models::{DeviceCommand, DoorAction, StatusDocument, StatusField};
pub use transport::TransportConfig;
