//! Typed command submission surfaces
//!
//! Each facade is a thin projection of the command engine restricted to one
//! command family by its marker type. Facades hold no state of their own;
//! both operations post straight onto the layer's dispatcher.

use crate::hci::layer::CommandSender;
use crate::hci::packet::{CommandCompleteView, CommandStatusView, HciCommand};
use std::marker::PhantomData;

/// Marker for ACL connection management commands
pub struct AclConnectionCommands;
/// Marker for LE connection management commands
pub struct LeAclConnectionCommands;
/// Marker for classic security commands
pub struct SecurityCommands;
/// Marker for LE security commands
pub struct LeSecurityCommands;
/// Marker for LE advertising commands
pub struct LeAdvertisingCommands;
/// Marker for LE scanning commands
pub struct LeScanningCommands;

/// Command submission surface for one command family
pub struct CommandInterface<F> {
    sender: CommandSender,
    _family: PhantomData<F>,
}

impl<F> CommandInterface<F> {
    pub(crate) fn new(sender: CommandSender) -> Self {
        Self {
            sender,
            _family: PhantomData,
        }
    }

    /// Queue a command expecting a Command Complete response
    pub fn enqueue_command(
        &self,
        command: HciCommand,
        on_complete: impl FnOnce(CommandCompleteView) + Send + 'static,
    ) {
        self.sender.enqueue_command(command, on_complete);
    }

    /// Queue a command expecting a Command Status response
    pub fn enqueue_command_with_status(
        &self,
        command: HciCommand,
        on_status: impl FnOnce(CommandStatusView) + Send + 'static,
    ) {
        self.sender.enqueue_command_with_status(command, on_status);
    }
}

pub type AclConnectionInterface = CommandInterface<AclConnectionCommands>;
pub type LeAclConnectionInterface = CommandInterface<LeAclConnectionCommands>;
pub type SecurityInterface = CommandInterface<SecurityCommands>;
pub type LeSecurityInterface = CommandInterface<LeSecurityCommands>;
pub type LeAdvertisingInterface = CommandInterface<LeAdvertisingCommands>;
pub type LeScanningInterface = CommandInterface<LeScanningCommands>;
