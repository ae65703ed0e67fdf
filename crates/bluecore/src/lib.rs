//! BlueCore - A Rust implementation of the Bluetooth HCI layer
//!
//! This library mediates between a higher-level Bluetooth host stack and a
//! Hardware Abstraction Layer (HAL) that owns the transport to a Bluetooth
//! controller. It serializes outbound HCI commands onto the controller's
//! single in-flight command channel, routes inbound events to registered
//! consumers, and moves ACL data through a bounded bidirectional queue.

pub mod error;
pub mod hal;
pub mod hci;

// Re-export common types for convenience
pub use error::HciError;
pub use hal::{HalCallbacks, HciHal, SocketHal};
pub use hci::{
    AclPacket, AclQueueUpEnd, CommandCompleteView, CommandStatusView, HciCommand, HciConfig,
    HciEvent, HciLayer, LeMetaEventView,
};
