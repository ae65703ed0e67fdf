//! Error types for the bluecore library
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Errors that can occur when working with the HCI transport and codec
#[derive(Error, Debug)]
pub enum HciError {
    #[error("Failed to open HCI socket: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("Failed to bind to HCI device: {0}")]
    BindError(std::io::Error),

    #[error("Failed to send HCI packet: {0}")]
    SendError(std::io::Error),

    #[error("Failed to receive HCI packet: {0}")]
    ReceiveError(std::io::Error),

    #[error("Invalid HCI packet format")]
    InvalidPacketFormat,

    #[error("Unexpected event code: {0:#04x}")]
    UnexpectedEventCode(u8),

    #[error("Unexpected command opcode: {0:#06x}")]
    UnexpectedOpcode(u16),

    #[error("ACL queue is full")]
    QueueFull,

    #[error("HCI layer is stopped")]
    Stopped,
}
