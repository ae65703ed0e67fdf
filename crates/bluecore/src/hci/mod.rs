//! Bluetooth HCI (Host Controller Interface) layer
//!
//! This module owns the command/event dispatch engine: the credit machine
//! that serializes commands onto the controller's single in-flight channel,
//! the event demultiplexer with its LE meta-event second stage, and the
//! bounded ACL queue joining the upper stack to the HAL.

pub mod acl_queue;
pub mod catalog;
pub mod constants;
pub mod facade;
pub(crate) mod handler;
pub mod layer;
pub mod packet;

#[cfg(test)]
mod tests;

pub use acl_queue::AclQueueUpEnd;
pub use facade::{
    AclConnectionInterface, CommandInterface, LeAclConnectionInterface, LeAdvertisingInterface,
    LeScanningInterface, LeSecurityInterface, SecurityInterface,
};
pub use layer::{HciConfig, HciLayer};
pub use packet::{
    AclPacket, CommandCompleteView, CommandStatusView, HciCommand, HciCommandView, HciEvent,
    LeMetaEventView, ResetCompleteView,
};
