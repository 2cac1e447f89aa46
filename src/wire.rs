//! The fixed serialization shared by every host on the carrier: JSON
//! frames holding packets holding segments. Data bytes travel base64
//! encoded inside the segment payload, and every frame carries a CRC-32
//! tag computed over its embedded packet.
//!
//! In memory a segment is a sum type; on the wire it keeps the flat
//! `seq_num`/`is_ack`/`payload` shape, with a `fin: true` payload taking
//! precedence over the ack flag when decoding.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::addr::{Mac, VAddr, Vip};

/// Link-layer unit: addressed by MAC, protected by an integrity tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub src_mac: Mac,
    pub dst_mac: Mac,
    #[serde(rename = "data")]
    pub packet: Packet,
    pub crc: u32,
}

impl Frame {
    /// Builds a frame around `packet`, computing the integrity tag.
    pub fn new(src_mac: Mac, dst_mac: Mac, packet: Packet) -> Frame {
        let crc = integrity_tag(&packet);
        Frame {
            src_mac,
            dst_mac,
            packet,
            crc,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("frame serialization is infallible")
    }

    /// Decodes frame bytes, returning the frame together with the result
    /// of its integrity check. `None` if the bytes do not parse at all.
    pub fn decode(raw: &[u8]) -> Option<(Frame, bool)> {
        let frame: Frame = serde_json::from_slice(raw).ok()?;
        let valid = frame.crc == integrity_tag(&frame.packet);
        Some((frame, valid))
    }
}

fn integrity_tag(packet: &Packet) -> u32 {
    let bytes = serde_json::to_vec(packet).expect("packet serialization is infallible");
    crc32fast::hash(&bytes)
}

/// Reads just the addressing fields out of encoded frame bytes, without
/// validating the rest. Returns `(src_mac, dst_mac)`.
pub fn peek_header(raw: &[u8]) -> Option<(Mac, Mac)> {
    #[derive(Deserialize)]
    struct Header {
        src_mac: Mac,
        dst_mac: Mac,
    }
    let header: Header = serde_json::from_slice(raw).ok()?;
    Some((header.src_mac, header.dst_mac))
}

/// Network-layer unit. `ttl` starts at `network::DEFAULT_TTL` at the
/// origin and is decremented once per router hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub src_vip: Vip,
    pub dst_vip: Vip,
    pub ttl: u8,
    #[serde(rename = "data")]
    pub segment: Segment,
}

impl Packet {
    pub fn new(src_vip: Vip, dst_vip: Vip, ttl: u8, segment: Segment) -> Packet {
        Packet {
            src_vip,
            dst_vip,
            ttl,
            segment,
        }
    }
}

/// Transport-layer unit. Every variant carries the addressing triple the
/// receiving multiplexer demultiplexes on: source endpoint plus
/// destination port. `seq` is the alternating bit, 0 or 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireSegment", try_from = "WireSegment")]
pub enum Segment {
    Data {
        seq: u8,
        src: VAddr,
        dst_port: u16,
        data: Vec<u8>,
        /// True when another chunk of the same logical message follows.
        more: bool,
    },
    Ack {
        seq: u8,
        src: VAddr,
        dst_port: u16,
    },
    Fin {
        seq: u8,
        src: VAddr,
        dst_port: u16,
    },
}

impl Segment {
    pub fn seq(&self) -> u8 {
        match *self {
            Segment::Data { seq, .. } | Segment::Ack { seq, .. } | Segment::Fin { seq, .. } => seq,
        }
    }

    pub fn src(&self) -> &VAddr {
        match *self {
            Segment::Data { ref src, .. }
            | Segment::Ack { ref src, .. }
            | Segment::Fin { ref src, .. } => src,
        }
    }

    pub fn dst_port(&self) -> u16 {
        match *self {
            Segment::Data { dst_port, .. }
            | Segment::Ack { dst_port, .. }
            | Segment::Fin { dst_port, .. } => dst_port,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(*self, Segment::Ack { .. })
    }
}

/// Error produced when a decoded segment violates the wire contract.
#[derive(Debug)]
pub struct InvalidSegment(String);

impl fmt::Display for InvalidSegment {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Invalid segment: {}", self.0)
    }
}

#[derive(Serialize, Deserialize)]
struct WireSegment {
    seq_num: u8,
    is_ack: bool,
    payload: WirePayload,
}

#[derive(Serialize, Deserialize)]
struct WirePayload {
    src_ip: Vip,
    src_port: u16,
    dst_port: u16,
    data: String,
    more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fin: Option<bool>,
}

impl From<Segment> for WireSegment {
    fn from(segment: Segment) -> WireSegment {
        match segment {
            Segment::Data {
                seq,
                src,
                dst_port,
                data,
                more,
            } => WireSegment {
                seq_num: seq,
                is_ack: false,
                payload: WirePayload {
                    src_ip: src.vip,
                    src_port: src.port,
                    dst_port,
                    data: BASE64.encode(data),
                    more,
                    fin: None,
                },
            },
            Segment::Ack { seq, src, dst_port } => WireSegment {
                seq_num: seq,
                is_ack: true,
                payload: WirePayload {
                    src_ip: src.vip,
                    src_port: src.port,
                    dst_port,
                    data: String::new(),
                    more: false,
                    fin: None,
                },
            },
            Segment::Fin { seq, src, dst_port } => WireSegment {
                seq_num: seq,
                is_ack: false,
                payload: WirePayload {
                    src_ip: src.vip,
                    src_port: src.port,
                    dst_port,
                    data: String::new(),
                    more: false,
                    fin: Some(true),
                },
            },
        }
    }
}

impl TryFrom<WireSegment> for Segment {
    type Error = InvalidSegment;

    fn try_from(wire: WireSegment) -> Result<Segment, InvalidSegment> {
        if wire.seq_num > 1 {
            return Err(InvalidSegment(format!(
                "sequence number out of range: {}",
                wire.seq_num
            )));
        }
        let src = VAddr::new(wire.payload.src_ip, wire.payload.src_port);
        // A fin marker wins over the ack flag.
        if wire.payload.fin == Some(true) {
            return Ok(Segment::Fin {
                seq: wire.seq_num,
                src,
                dst_port: wire.payload.dst_port,
            });
        }
        if wire.is_ack {
            return Ok(Segment::Ack {
                seq: wire.seq_num,
                src,
                dst_port: wire.payload.dst_port,
            });
        }
        let data = BASE64
            .decode(wire.payload.data.as_bytes())
            .map_err(|e| InvalidSegment(format!("bad base64 data: {}", e)))?;
        Ok(Segment::Data {
            seq: wire.seq_num,
            src,
            dst_port: wire.payload.dst_port,
            data,
            more: wire.payload.more,
        })
    }
}
