//! H4 wire protocol constants
//!
//! This module contains constants used by the H4 transport framing.

// H4 packet type bytes
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_ACL_PKT: u8 = 0x02;
pub const HCI_SCO_PKT: u8 = 0x03;
pub const HCI_EVENT_PKT: u8 = 0x04;

// Header sizes following the type byte
pub const COMMAND_HEADER_LEN: usize = 3; // opcode:2 + length:1
pub const ACL_HEADER_LEN: usize = 4; // handle:2 + length:2
pub const SCO_HEADER_LEN: usize = 3; // handle:2 + length:1
pub const EVENT_HEADER_LEN: usize = 2; // event code:1 + length:1

// Default controller emulator endpoint
pub const DEFAULT_ROOTCANAL_HOST: &str = "127.0.0.1";
pub const DEFAULT_ROOTCANAL_PORT: u16 = 6402;

// Bytes requested per read on the reader thread. Packet boundaries are
// reconstructed by the reassembler, so any chunk size is correct.
pub const READ_CHUNK_SIZE: usize = 2048;
