//! H4 HCI transport layer
//!
//! This module provides the host side of an HCI transport: a connection to
//! a controller emulator over TCP, H4 framing for outgoing packets, and
//! reassembly of the incoming byte stream into complete HCI packets.

pub mod constants;
pub mod core;
pub mod packet;
pub mod reassembler;
pub mod transport;


pub use self::core::{
    ConnectionState, DisconnectCallback, HalCallbacks, HalConfig, HciHal, Status,
};
pub use packet::{HciPacket, PacketKind};
pub use reassembler::H4Reassembler;
