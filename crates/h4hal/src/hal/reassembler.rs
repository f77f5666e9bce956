//! Incoming byte stream reassembly
//!
//! A read from the controller socket may carry a fragment of a packet,
//! exactly one packet, or many packets back to back. The reassembler keeps
//! per-connection parse state across reads and emits complete packets in
//! arrival order, so the delivered packet sequence is independent of how
//! the stream happens to be chunked.

use crate::error::HalError;
use crate::hal::packet::{HciPacket, PacketKind};

/// Parse progress for the packet currently being assembled.
#[derive(Debug)]
enum ParseState {
    /// Waiting for a type byte.
    Idle,
    /// Type byte consumed, accumulating header bytes.
    Header { kind: PacketKind, partial: Vec<u8> },
    /// Header complete, accumulating payload bytes.
    Payload {
        kind: PacketKind,
        header: Vec<u8>,
        partial: Vec<u8>,
        payload_len: usize,
    },
}

/// Reassembles H4 frames from a raw byte stream.
///
/// One instance exists per connection and is exclusively owned by the
/// reader thread, so no locking is needed.
pub struct H4Reassembler {
    state: ParseState,
}

impl H4Reassembler {
    pub fn new() -> Self {
        H4Reassembler {
            state: ParseState::Idle,
        }
    }

    /// Feed newly-received bytes and collect every packet they complete.
    ///
    /// The chunk is processed strictly left to right; partial header or
    /// payload data is held until the next feed, and a single chunk may
    /// complete several packets. Packets are returned in arrival order.
    ///
    /// # Errors
    ///
    /// An unrecognized type byte means the stream can no longer be trusted
    /// to be frame-aligned. No resynchronization is attempted; the caller
    /// must tear the connection down.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<HciPacket>, HalError> {
        let mut packets = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            match &mut self.state {
                ParseState::Idle => {
                    let type_byte = bytes[pos];
                    pos += 1;
                    let kind = PacketKind::from_type_byte(type_byte)
                        .ok_or(HalError::UnknownPacketType(type_byte))?;
                    self.state = ParseState::Header {
                        kind,
                        partial: Vec::with_capacity(kind.header_len()),
                    };
                }
                ParseState::Header { kind, partial } => {
                    let needed = kind.header_len() - partial.len();
                    let take = needed.min(bytes.len() - pos);
                    partial.extend_from_slice(&bytes[pos..pos + take]);
                    pos += take;

                    if partial.len() == kind.header_len() {
                        let kind = *kind;
                        let header = std::mem::take(partial);
                        let payload_len = kind.decode_payload_len(&header);
                        if payload_len == 0 {
                            // Zero-length payload completes on header
                            // completion.
                            packets.push(HciPacket { kind, data: header });
                            self.state = ParseState::Idle;
                        } else {
                            self.state = ParseState::Payload {
                                kind,
                                header,
                                partial: Vec::with_capacity(payload_len),
                                payload_len,
                            };
                        }
                    }
                }
                ParseState::Payload {
                    kind,
                    header,
                    partial,
                    payload_len,
                } => {
                    let needed = *payload_len - partial.len();
                    let take = needed.min(bytes.len() - pos);
                    partial.extend_from_slice(&bytes[pos..pos + take]);
                    pos += take;

                    if partial.len() == *payload_len {
                        let kind = *kind;
                        let mut data = std::mem::take(header);
                        data.append(partial);
                        packets.push(HciPacket { kind, data });
                        self.state = ParseState::Idle;
                    }
                }
            }
        }

        Ok(packets)
    }

    /// Drop any partially-assembled packet.
    ///
    /// Used on disconnect; a partial packet is never delivered.
    pub fn reset(&mut self) {
        self.state = ParseState::Idle;
    }
}

impl Default for H4Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
