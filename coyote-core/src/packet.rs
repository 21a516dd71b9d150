use std::fmt;

use crate::error::ProtocolError;
use crate::flags::ProtocolFlags;
use crate::header::{HEADER_SIZE, PacketHeader};
use crate::message::{Command, MessageType};

/// Maximum payload carried by a single frame.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Maximum number of bytes a single frame may occupy.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Compute the 32-bit payload checksum (first 4 bytes of BLAKE3).
///
/// `0` is reserved for empty payloads, so a non-empty payload never
/// checksums to it.
pub fn checksum(payload: &[u8]) -> u32 {
    if payload.is_empty() {
        return 0;
    }
    truncate(blake3::hash(payload).as_bytes())
}

fn truncate(hash: &[u8; 32]) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&hash[0..4]);
    u32::from_le_bytes(b).max(1)
}

/// A header plus its payload.
#[derive(Clone, PartialEq)]
pub struct Packet {
    header: PacketHeader,
    payload: Vec<u8>,
}

impl Packet {
    fn build(
        message_type: MessageType,
        request_id: u64,
        command: Command,
        flags: ProtocolFlags,
        status: i32,
        payload: Vec<u8>,
    ) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if request_id == 0 {
            return Err(ProtocolError::InvalidHeader("request id must be non-zero"));
        }

        let header = PacketHeader {
            checksum: checksum(&payload),
            message_type,
            flags,
            command,
            request_id,
            status,
            payload_length: payload.len() as u32,
        };
        Ok(Self { header, payload })
    }

    /// A client → device request.
    pub fn new_command(
        request_id: u64,
        command: Command,
        flags: ProtocolFlags,
        payload: Vec<u8>,
    ) -> Result<Self, ProtocolError> {
        Self::build(MessageType::Command, request_id, command, flags, 0, payload)
    }

    /// A device → client response carrying the device status.
    pub fn new_response(
        request_id: u64,
        command: Command,
        status: i32,
        payload: Vec<u8>,
    ) -> Result<Self, ProtocolError> {
        Self::build(
            MessageType::Response,
            request_id,
            command,
            ProtocolFlags::empty(),
            status,
            payload,
        )
    }

    /// Same response with additional flags set.
    pub fn with_flags(mut self, flags: ProtocolFlags) -> Self {
        self.header.flags |= flags;
        self
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    pub fn command(&self) -> Command {
        self.header.command
    }

    pub fn flags(&self) -> ProtocolFlags {
        self.header.flags
    }

    pub fn request_id(&self) -> u64 {
        self.header.request_id
    }

    pub fn status(&self) -> i32 {
        self.header.status
    }

    pub fn is_response(&self) -> bool {
        self.header.message_type == MessageType::Response
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        packet.extend_from_slice(&self.header.to_bytes());
        packet.extend_from_slice(&self.payload);
        packet
    }

    /// Parse exactly one frame. `bytes` must hold the header and the
    /// whole payload, nothing more.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let header = PacketHeader::from_bytes(bytes)?;
        let length = header.payload_length as usize;

        if length > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: length,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if bytes.len() != HEADER_SIZE + length {
            return Err(ProtocolError::InvalidPacketLength {
                expected: HEADER_SIZE + length,
                actual: bytes.len(),
            });
        }

        let packet = Self {
            header,
            payload: bytes[HEADER_SIZE..].to_vec(),
        };
        packet.validate()?;
        Ok(packet)
    }

    /// Verify the header checksum against the payload.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.header.checksum != checksum(&self.payload) {
            return Err(ProtocolError::ChecksumMismatch);
        }
        Ok(())
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("header", &self.header)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_payload_never_checksums_to_zero() {
        assert_eq!(truncate(&[0u8; 32]), 1);
        assert_eq!(checksum(&[]), 0);
        assert_ne!(checksum(b"x"), 0);
    }

    #[test]
    fn command_packet_roundtrip() {
        let pkt = Packet::new_command(
            9,
            Command::SeekTo,
            ProtocolFlags::empty(),
            vec![1, 2, 3, 4],
        )
        .unwrap();
        let bytes = pkt.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE + 4);

        let parsed = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, pkt);
        assert_eq!(parsed.status(), 0);
        assert!(!parsed.is_response());
    }

    #[test]
    fn empty_payload_has_zero_checksum() {
        let pkt = Packet::new_response(1, Command::Take, 0, Vec::new()).unwrap();
        assert_eq!(pkt.header().checksum, 0);
        assert!(pkt.validate().is_ok());
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let pkt = Packet::new_response(1, Command::GetDisks, 0, vec![7; 16]).unwrap();
        let mut bytes = pkt.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            Packet::from_bytes(&bytes),
            Err(ProtocolError::ChecksumMismatch)
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let pkt = Packet::new_response(1, Command::Take, 0, Vec::new()).unwrap();
        let mut bytes = pkt.to_bytes();
        bytes.push(0);
        assert!(matches!(
            Packet::from_bytes(&bytes),
            Err(ProtocolError::InvalidPacketLength { .. })
        ));
    }

    #[test]
    fn oversized_payload_rejected() {
        let result = Packet::new_command(
            1,
            Command::EjectDisk,
            ProtocolFlags::empty(),
            vec![0; MAX_PAYLOAD_SIZE + 1],
        );
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn response_keeps_status_and_flags() {
        let pkt = Packet::new_response(5, Command::Reboot, 3, Vec::new())
            .unwrap()
            .with_flags(ProtocolFlags::FINAL);
        let parsed = Packet::from_bytes(&pkt.to_bytes()).unwrap();
        assert_eq!(parsed.status(), 3);
        assert!(parsed.flags().contains(ProtocolFlags::FINAL));
    }
}
