//! H4 packet kinds and framing geometry
//!
//! The framing geometry of all four packet kinds lives in one table so the
//! outgoing framer and the reassembler derive frame boundaries the same
//! way, rather than duplicating per-kind offset arithmetic.

use crate::hal::constants::*;
use byteorder::{ByteOrder, LittleEndian};

/// The four H4 packet kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Command,
    AclData,
    ScoData,
    Event,
}

/// Framing geometry for one packet kind: the header size following the
/// type byte and where the payload length field sits inside that header.
#[derive(Debug, Clone, Copy)]
pub struct FrameGeometry {
    pub header_len: usize,
    pub len_offset: usize,
    pub len_width: usize,
}

impl PacketKind {
    /// Map a wire type byte to its kind.
    ///
    /// Returns `None` for bytes outside the four known H4 type values.
    pub fn from_type_byte(byte: u8) -> Option<PacketKind> {
        match byte {
            HCI_COMMAND_PKT => Some(PacketKind::Command),
            HCI_ACL_PKT => Some(PacketKind::AclData),
            HCI_SCO_PKT => Some(PacketKind::ScoData),
            HCI_EVENT_PKT => Some(PacketKind::Event),
            _ => None,
        }
    }

    /// The wire type byte for this kind.
    pub fn type_byte(self) -> u8 {
        match self {
            PacketKind::Command => HCI_COMMAND_PKT,
            PacketKind::AclData => HCI_ACL_PKT,
            PacketKind::ScoData => HCI_SCO_PKT,
            PacketKind::Event => HCI_EVENT_PKT,
        }
    }

    /// Framing geometry for this kind.
    pub fn geometry(self) -> FrameGeometry {
        match self {
            PacketKind::Command => FrameGeometry {
                header_len: COMMAND_HEADER_LEN,
                len_offset: 2,
                len_width: 1,
            },
            PacketKind::AclData => FrameGeometry {
                header_len: ACL_HEADER_LEN,
                len_offset: 2,
                len_width: 2,
            },
            PacketKind::ScoData => FrameGeometry {
                header_len: SCO_HEADER_LEN,
                len_offset: 2,
                len_width: 1,
            },
            PacketKind::Event => FrameGeometry {
                header_len: EVENT_HEADER_LEN,
                len_offset: 1,
                len_width: 1,
            },
        }
    }

    /// Header size following the type byte.
    pub fn header_len(self) -> usize {
        self.geometry().header_len
    }

    /// Decode the payload length from a complete header.
    ///
    /// `header` must hold at least `header_len()` bytes. The type byte is
    /// validated before the geometry table is consulted, so no failure is
    /// possible here. Two-byte length fields are little-endian.
    pub fn decode_payload_len(self, header: &[u8]) -> usize {
        let geometry = self.geometry();
        match geometry.len_width {
            1 => header[geometry.len_offset] as usize,
            _ => LittleEndian::read_u16(&header[geometry.len_offset..]) as usize,
        }
    }
}

/// A complete HCI packet: header and payload, with the type byte stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciPacket {
    pub kind: PacketKind,
    pub data: Vec<u8>,
}

/// Build the wire frame for an outgoing packet.
///
/// The payload is passed through unmodified after the type byte; the
/// correctness of its self-described header length is the caller's
/// responsibility.
pub fn frame(kind: PacketKind, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(kind.type_byte());
    buf.extend_from_slice(payload);
    buf
}
