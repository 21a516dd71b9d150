use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::header::{HEADER_SIZE, PacketHeader};
use crate::packet::{MAX_PAYLOAD_SIZE, Packet};

/// Length-delimited framing for [`Packet`]s over a byte stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoyoteCodec;

impl Decoder for CoyoteCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = PacketHeader::from_bytes(&src[..HEADER_SIZE])?;
        let length = header.payload_length as usize;
        if length > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: length,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if length > 0 && header.checksum == 0 {
            return Err(ProtocolError::InvalidHeader("checksum must be non-zero"));
        }

        let frame_len = HEADER_SIZE + length;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        let packet = Packet::from_bytes(&frame)?;
        Ok(Some(packet))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => {
                let actual = src.len();
                src.clear();
                Err(ProtocolError::InvalidPacketLength {
                    expected: HEADER_SIZE,
                    actual,
                })
            }
        }
    }
}

impl Encoder<Packet> for CoyoteCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(HEADER_SIZE + item.payload().len());
        dst.extend_from_slice(&item.to_bytes());
        Ok(())
    }
}
