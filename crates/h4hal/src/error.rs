//! Error types for the h4hal library
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Errors that can occur when driving the H4 transport
#[derive(Error, Debug)]
pub enum HalError {
    #[error("Failed to establish controller connection: {0}")]
    ConnectError(#[from] std::io::Error),

    #[error("Failed to write packet to controller: {0}")]
    SendError(std::io::Error),

    #[error("Failed to read from controller: {0}")]
    ReceiveError(std::io::Error),

    #[error("Unknown H4 packet type byte: {0:#04x}")]
    UnknownPacketType(u8),

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Incoming packet callbacks must be registered before initialize")]
    CallbacksNotRegistered,

    #[error("Transport is already initialized")]
    AlreadyInitialized,
}
