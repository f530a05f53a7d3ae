//! Frame codec: `seq(4) | type(1) | length(2) | payload(length) | checksum(4)`, big-endian.
//!
//! Checksum is the sum of the header+payload bytes modulo 2^32. When a cipher
//! is configured the payload region is `nonce || ciphertext` and the checksum
//! covers that encrypted form, matching the framing this codec was ported from.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

use crate::interface_adapters::crypto::FrameCipher;

pub const HEADER_SIZE: usize = 4 + 1 + 2;
pub const CHECKSUM_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Game = 1,
    Chat = 2,
}

impl PacketType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(PacketType::Game),
            2 => Some(PacketType::Chat),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("short frame")]
    ShortFrame,
    #[error("length mismatch")]
    LengthMismatch,
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("decryption failure")]
    DecryptionFailure,
}

fn checksum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32))
}

/// Builds the wire bytes for one frame. `cipher` is `None` for plaintext framing.
pub fn build(seq: u32, packet_type: PacketType, payload: &[u8], cipher: Option<&FrameCipher>) -> Vec<u8> {
    let region = match cipher {
        Some(cipher) => cipher.seal(payload),
        None => payload.to_vec(),
    };

    let mut body = Vec::with_capacity(HEADER_SIZE + region.len());
    body.write_u32::<BigEndian>(seq).expect("write to Vec cannot fail");
    body.write_u8(packet_type as u8).expect("write to Vec cannot fail");
    body.write_u16::<BigEndian>(region.len() as u16)
        .expect("write to Vec cannot fail");
    body.write_all(&region).expect("write to Vec cannot fail");

    let sum = checksum(&body);
    let mut frame = body;
    frame
        .write_u32::<BigEndian>(sum)
        .expect("write to Vec cannot fail");
    frame
}

/// Parses one frame out of `buffer`. The packet type is returned as a raw u8;
/// an unrecognized value is not an error at this layer (it is handed to the
/// dispatcher, per the framing contract).
pub fn parse(buffer: &[u8], cipher: Option<&FrameCipher>) -> Result<(u32, u8, Vec<u8>), FrameError> {
    if buffer.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(FrameError::ShortFrame);
    }

    let mut cursor = Cursor::new(buffer);
    let seq = read_u32(&mut cursor)?;
    let packet_type = read_u8(&mut cursor)?;
    let length = read_u16(&mut cursor)? as usize;

    if buffer.len() != HEADER_SIZE + length + CHECKSUM_SIZE {
        return Err(FrameError::LengthMismatch);
    }

    let region = &buffer[HEADER_SIZE..HEADER_SIZE + length];
    let checksum_bytes = &buffer[HEADER_SIZE + length..];

    let expected = read_u32_slice(checksum_bytes)?;
    if checksum(&buffer[..HEADER_SIZE + length]) != expected {
        return Err(FrameError::ChecksumMismatch);
    }

    let payload = match cipher {
        Some(cipher) => cipher.open(region).ok_or(FrameError::DecryptionFailure)?,
        None => region.to_vec(),
    };

    Ok((seq, packet_type, payload))
}

pub fn packet_type_of(raw: u8) -> Option<PacketType> {
    PacketType::from_u8(raw)
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, FrameError> {
    cursor.read_u32::<BigEndian>().map_err(|_| FrameError::ShortFrame)
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, FrameError> {
    cursor.read_u8().map_err(|_| FrameError::ShortFrame)
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, FrameError> {
    cursor.read_u16::<BigEndian>().map_err(|_| FrameError::ShortFrame)
}

fn read_u32_slice(bytes: &[u8]) -> Result<u32, FrameError> {
    let mut cursor = Cursor::new(bytes);
    cursor.read_u32::<BigEndian>().map_err(|_| FrameError::ShortFrame)
}

/// Reads one length-prefixed frame from an async stream, returning the raw
/// frame bytes (header + payload + checksum) ready for `parse`.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;
    let length = u16::from_be_bytes([header[5], header[6]]) as usize;

    let mut rest = vec![0u8; length + CHECKSUM_SIZE];
    reader.read_exact(&mut rest).await?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + rest.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&rest);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let frame = build(7, PacketType::Game, b"USERNAME ada", None);
        let (seq, ty, payload) = parse(&frame, None).unwrap();
        assert_eq!(seq, 7);
        assert_eq!(ty, PacketType::Game as u8);
        assert_eq!(payload, b"USERNAME ada");
    }

    #[test]
    fn round_trips_encrypted() {
        let cipher = FrameCipher::new(&[9u8; 32]);
        let frame = build(1, PacketType::Chat, b"hello", Some(&cipher));
        let (seq, ty, payload) = parse(&frame, Some(&cipher)).unwrap();
        assert_eq!(seq, 1);
        assert_eq!(ty, PacketType::Chat as u8);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn rejects_short_frame() {
        assert_eq!(parse(&[1, 2, 3], None).unwrap_err(), FrameError::ShortFrame);
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut frame = build(0, PacketType::Game, b"FIRE A1", None);
        frame.truncate(frame.len() - 2);
        assert_eq!(parse(&frame, None).unwrap_err(), FrameError::LengthMismatch);
    }

    #[test]
    fn rejects_checksum_corruption() {
        let mut frame = build(0, PacketType::Game, b"FIRE A1", None);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert_eq!(parse(&frame, None).unwrap_err(), FrameError::ChecksumMismatch);
    }

    #[test]
    fn sequence_numbers_are_independent_of_payload() {
        let a = build(0, PacketType::Game, b"a", None);
        let b = build(1, PacketType::Game, b"a", None);
        let (seq_a, ..) = parse(&a, None).unwrap();
        let (seq_b, ..) = parse(&b, None).unwrap();
        assert!(seq_b > seq_a);
    }
}
