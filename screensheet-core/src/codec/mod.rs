//! `tokio_util` codec for relay packets.
//!
//! Frames are `HEADER_SIZE` bytes of [`PacketHeader`] followed by the
//! payload. Large payloads are zstd-compressed when that shrinks them;
//! the decoder restores the plain JSON before handing the packet out.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ShareError;
use crate::flags::PacketFlags;
use crate::header::{HEADER_SIZE, HeaderBytes, PacketHeader};
use crate::packet::{COMPRESS_THRESHOLD, MAX_PAYLOAD_SIZE, Packet};

const ZSTD_LEVEL: i32 = 1;

#[derive(Debug, Default, Clone, Copy)]
pub struct RelayCodec;

impl Decoder for RelayCodec {
    type Item = Packet;
    type Error = ShareError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, ShareError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut raw: HeaderBytes = [0; HEADER_SIZE];
        raw.copy_from_slice(&src[..HEADER_SIZE]);
        let header = PacketHeader::from_bytes(&raw)?;

        let len = header.payload_length as usize;
        if len > MAX_PAYLOAD_SIZE {
            return Err(ShareError::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if src.len() < HEADER_SIZE + len {
            src.reserve(HEADER_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let wire = src.split_to(len);
        if !header.verify(&wire) {
            return Err(ShareError::ChecksumMismatch);
        }

        let payload = if header.flags.contains(PacketFlags::COMPRESSED) {
            zstd::bulk::decompress(&wire, MAX_PAYLOAD_SIZE)
                .map_err(|e| ShareError::Compression(e.to_string()))?
        } else {
            wire.to_vec()
        };

        Packet::from_raw(header.kind, payload).map(Some)
    }
}

impl Encoder<Packet> for RelayCodec {
    type Error = ShareError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), ShareError> {
        let kind = item.kind();
        let plain = item.into_payload();

        let (flags, wire) = if plain.len() > COMPRESS_THRESHOLD {
            let packed = zstd::bulk::compress(&plain, ZSTD_LEVEL)
                .map_err(|e| ShareError::Compression(e.to_string()))?;
            if packed.len() < plain.len() {
                (PacketFlags::COMPRESSED, packed)
            } else {
                (PacketFlags::empty(), plain)
            }
        } else {
            (PacketFlags::empty(), plain)
        };

        let header = PacketHeader::new(kind, flags, &wire);
        dst.reserve(HEADER_SIZE + wire.len());
        dst.extend_from_slice(&header.to_bytes());
        dst.extend_from_slice(&wire);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
