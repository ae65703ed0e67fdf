//! Hardware Abstraction Layer boundary
//!
//! The HCI layer talks to the controller exclusively through [`HciHal`], and
//! the HAL delivers inbound traffic through [`HalCallbacks`]. Frames on both
//! sides are raw byte vectors without the H4 packet-type indicator; transport
//! framing is the HAL implementation's concern.

mod socket;

pub use socket::SocketHal;

use std::sync::Arc;

/// Outbound transport surface. The send functions are called only from the
/// HCI layer's dispatcher thread.
pub trait HciHal: Send + Sync {
    /// Transmit an HCI command frame
    fn send_command(&self, packet: &[u8]);

    /// Transmit an ACL data frame
    fn send_acl(&self, packet: &[u8]);

    /// Transmit a SCO data frame
    fn send_sco(&self, packet: &[u8]);

    /// Subscribe the layer to inbound traffic
    fn register_callbacks(&self, callbacks: Arc<dyn HalCallbacks>);

    /// Unsubscribe; no callbacks are invoked after this returns
    fn unregister_callbacks(&self);
}

/// Inbound delivery, invoked on the HAL's own thread in arrival order
pub trait HalCallbacks: Send + Sync {
    fn event_received(&self, packet: Vec<u8>);

    fn acl_received(&self, packet: Vec<u8>);

    fn sco_received(&self, packet: Vec<u8>);
}
