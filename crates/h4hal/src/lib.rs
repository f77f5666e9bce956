//! h4hal - An H4 HCI transport for Bluetooth controller emulators
//!
//! This library moves HCI packets between an upper Bluetooth host stack and
//! a controller reachable over a TCP byte stream, such as a rootcanal-style
//! emulator. It frames outgoing packets per the H4 convention (a one-byte
//! type tag before each packet) and reassembles the incoming byte stream
//! into discrete Event, ACL and SCO packets regardless of how the stream is
//! chunked by the socket.

pub mod error;
pub mod hal;

// Re-export common types for convenience
pub use error::HalError;
pub use hal::{
    ConnectionState, H4Reassembler, HalCallbacks, HalConfig, HciHal, HciPacket, PacketKind, Status,
};
