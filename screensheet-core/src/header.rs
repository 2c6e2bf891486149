//! Fixed-size relay packet header.
//!
//! ```text
//! 0      4          8      10     12               16
//! ┌──────┬──────────┬──────┬──────┬────────────────┐
//! │ SSR0 │ checksum │ kind │ flags│ payload_length │
//! └──────┴──────────┴──────┴──────┴────────────────┘
//! ```
//!
//! All integers are little-endian. The checksum is the first four bytes
//! of the blake3 digest of the payload *as sent on the wire*, or zero
//! for an empty payload.

use crate::error::ShareError;
use crate::event::EventKind;
use crate::flags::PacketFlags;

/// Magic sequence at the start of every packet.
pub const MAGIC: [u8; 4] = *b"SSR0";

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Raw header bytes.
pub type HeaderBytes = [u8; HEADER_SIZE];

// ── PacketHeader ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub checksum: u32,
    pub kind: EventKind,
    pub flags: PacketFlags,
    pub payload_length: u32,
}

impl PacketHeader {
    pub fn new(kind: EventKind, flags: PacketFlags, payload: &[u8]) -> Self {
        Self {
            checksum: checksum(payload),
            kind,
            flags,
            payload_length: payload.len() as u32,
        }
    }

    pub fn to_bytes(&self) -> HeaderBytes {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&MAGIC);
        out[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        out[8..10].copy_from_slice(&(self.kind as u16).to_le_bytes());
        out[10..12].copy_from_slice(&self.flags.bits().to_le_bytes());
        out[12..16].copy_from_slice(&self.payload_length.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &HeaderBytes) -> Result<Self, ShareError> {
        if bytes[0..4] != MAGIC {
            return Err(ShareError::InvalidMagic);
        }

        let checksum = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let kind = EventKind::try_from(u16::from_le_bytes([bytes[8], bytes[9]]))?;
        let raw_flags = u16::from_le_bytes([bytes[10], bytes[11]]);
        let flags = PacketFlags::from_bits(raw_flags).ok_or(ShareError::UnknownVariant {
            type_name: "PacketFlags",
            value: raw_flags as u64,
        })?;
        let payload_length = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

        Ok(Self {
            checksum,
            kind,
            flags,
            payload_length,
        })
    }

    /// Whether `payload` matches the stored checksum.
    pub fn verify(&self, payload: &[u8]) -> bool {
        self.checksum == checksum(payload)
    }
}

/// Truncated blake3 checksum used in the header.
pub fn checksum(payload: &[u8]) -> u32 {
    if payload.is_empty() {
        return 0;
    }
    let digest = blake3::hash(payload);
    let b = digest.as_bytes();
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

// ── Tests ────────────────────────────────────────────────────────
