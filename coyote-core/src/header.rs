//! Fixed-size frame header.
//!
//! ```text
//! magic:           [u8; 4]  b"CYT1"
//! checksum:        u32      first 4 bytes of blake3(payload), 0 if empty
//! message_type:    u32
//! flags:           u32
//! command_id:      u64
//! request_id:      u64
//! status:          i32      device status, 0 on commands
//! payload_length:  u32
//! ```
//!
//! All integers are little-endian.

use crate::error::ProtocolError;
use crate::flags::ProtocolFlags;
use crate::message::{Command, MessageType};

pub const MAGIC: [u8; 4] = *b"CYT1";
pub const HEADER_SIZE: usize = 40;

pub type HeaderBytes = [u8; HEADER_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub checksum: u32,
    pub message_type: MessageType,
    pub flags: ProtocolFlags,
    pub command: Command,
    pub request_id: u64,
    pub status: i32,
    pub payload_length: u32,
}

impl PacketHeader {
    pub fn to_bytes(&self) -> HeaderBytes {
        let mut buf: HeaderBytes = [0; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        buf[8..12].copy_from_slice(&(self.message_type as u32).to_le_bytes());
        buf[12..16].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[16..24].copy_from_slice(&(self.command as u64).to_le_bytes());
        buf[24..32].copy_from_slice(&self.request_id.to_le_bytes());
        buf[32..36].copy_from_slice(&self.status.to_le_bytes());
        buf[36..40].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }

    /// Parse a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::InvalidPacketLength {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[0..4] != MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        let message_type = MessageType::try_from(read_u32(bytes, 8))?;
        let flags = ProtocolFlags::from_bits(read_u32(bytes, 12))
            .ok_or(ProtocolError::InvalidHeader("unknown flag bits"))?;
        let command = Command::try_from(read_u64(bytes, 16))?;
        let request_id = read_u64(bytes, 24);
        if request_id == 0 {
            return Err(ProtocolError::InvalidHeader("request id must be non-zero"));
        }

        Ok(Self {
            checksum: read_u32(bytes, 4),
            message_type,
            flags,
            command,
            request_id,
            status: read_u32(bytes, 32) as i32,
            payload_length: read_u32(bytes, 36),
        })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(b)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PacketHeader {
        PacketHeader {
            checksum: 0xDEAD_BEEF,
            message_type: MessageType::Response,
            flags: ProtocolFlags::IDEMPOTENT | ProtocolFlags::RETRY,
            command: Command::GetTimeCode,
            request_id: 42,
            status: -3,
            payload_length: 21,
        }
    }

    #[test]
    fn layout_is_little_endian() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..4], b"CYT1");
        assert_eq!(&bytes[4..8], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&bytes[16..24], &0x0301u64.to_le_bytes());
        assert_eq!(&bytes[32..36], &(-3i32).to_le_bytes());
        assert_eq!(PacketHeader::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            PacketHeader::from_bytes(&bytes),
            Err(ProtocolError::InvalidMagic)
        ));
    }

    #[test]
    fn rejects_zero_request_id() {
        let mut header = sample();
        header.request_id = 0;
        let bytes = header.to_bytes();
        assert!(matches!(
            PacketHeader::from_bytes(&bytes),
            Err(ProtocolError::InvalidHeader(_))
        ));
    }

    #[test]
    fn rejects_unknown_command_and_flags() {
        let mut bytes = sample().to_bytes();
        bytes[16..24].copy_from_slice(&0xFFFFu64.to_le_bytes());
        assert!(matches!(
            PacketHeader::from_bytes(&bytes),
            Err(ProtocolError::UnknownVariant { .. })
        ));

        let mut bytes = sample().to_bytes();
        bytes[12..16].copy_from_slice(&0x8000_0000u32.to_le_bytes());
        assert!(PacketHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn short_buffer_is_an_error() {
        assert!(PacketHeader::from_bytes(&[0u8; 10]).is_err());
    }
}
