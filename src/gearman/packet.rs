//! Wire codec for the Gearman binary protocol.
//!
//! A frame is a 12-byte header (`\0REQ` or `\0RES` magic, big-endian packet
//! type, big-endian payload size) followed by the payload. Multi-argument
//! payloads join their arguments with NUL bytes.
//!
//! Only the packet types exchanged by a submitting client are modeled here;
//! worker-side types are out of scope.

use crate::error::ProtocolError;

/// Bytes in a frame header: magic, packet type, payload size.
pub const HEADER_LEN: usize = 12;

/// Payloads larger than this are rejected as corrupt rather than allocated.
const MAX_PAYLOAD: u32 = 64 * 1024 * 1024;

const REQ_MAGIC: [u8; 4] = [0, b'R', b'E', b'Q'];
const RES_MAGIC: [u8; 4] = [0, b'R', b'E', b'S'];

/// Direction marker carried in a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketMagic {
    /// Client to server (`\0REQ`).
    Request,
    /// Server to client (`\0RES`).
    Response,
}

/// Packet types used by the submit/poll client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PacketType {
    SubmitJob = 7,
    JobCreated = 8,
    WorkStatus = 12,
    WorkComplete = 13,
    WorkFail = 14,
    EchoReq = 16,
    EchoRes = 17,
    WorkException = 25,
    WorkData = 28,
    WorkWarning = 29,
}

impl PacketType {
    fn from_wire(value: u32) -> Result<Self, ProtocolError> {
        Ok(match value {
            7 => Self::SubmitJob,
            8 => Self::JobCreated,
            12 => Self::WorkStatus,
            13 => Self::WorkComplete,
            14 => Self::WorkFail,
            16 => Self::EchoReq,
            17 => Self::EchoRes,
            25 => Self::WorkException,
            28 => Self::WorkData,
            29 => Self::WorkWarning,
            other => return Err(ProtocolError::UnknownPacketType(other)),
        })
    }
}

/// A single protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub magic: PacketMagic,
    pub ptype: PacketType,
    pub data: Vec<u8>,
}

impl Packet {
    /// Builds a request frame from NUL-joined arguments.
    pub fn request(ptype: PacketType, args: &[&[u8]]) -> Self {
        Self {
            magic: PacketMagic::Request,
            ptype,
            data: join_args(args),
        }
    }

    /// Builds a response frame from NUL-joined arguments.
    pub fn response(ptype: PacketType, args: &[&[u8]]) -> Self {
        Self {
            magic: PacketMagic::Response,
            ptype,
            data: join_args(args),
        }
    }

    /// Serializes the frame for the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len());
        out.extend_from_slice(match self.magic {
            PacketMagic::Request => &REQ_MAGIC,
            PacketMagic::Response => &RES_MAGIC,
        });
        out.extend_from_slice(&(self.ptype as u32).to_be_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Parses a frame header into its magic, type and payload size.
    pub fn parse_header(
        header: &[u8; HEADER_LEN],
    ) -> Result<(PacketMagic, PacketType, u32), ProtocolError> {
        let magic_bytes = [header[0], header[1], header[2], header[3]];
        let magic = if magic_bytes == REQ_MAGIC {
            PacketMagic::Request
        } else if magic_bytes == RES_MAGIC {
            PacketMagic::Response
        } else {
            return Err(ProtocolError::BadMagic(magic_bytes));
        };

        let raw_type = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let ptype = PacketType::from_wire(raw_type)?;

        let size = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
        if size > MAX_PAYLOAD {
            return Err(ProtocolError::OversizedPacket { size });
        }

        Ok((magic, ptype, size))
    }
}

fn join_args(args: &[&[u8]]) -> Vec<u8> {
    let mut data = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            data.push(0);
        }
        data.extend_from_slice(arg);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_job_frame_layout() {
        let packet = Packet::request(PacketType::SubmitJob, &[b"echo", b"u-1", b"{}"]);
        let bytes = packet.to_bytes();

        let mut expected = vec![0, b'R', b'E', b'Q'];
        expected.extend_from_slice(&7u32.to_be_bytes());
        expected.extend_from_slice(&10u32.to_be_bytes());
        expected.extend_from_slice(b"echo\0u-1\0{}");

        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_single_argument_has_no_separator() {
        let packet = Packet::response(PacketType::JobCreated, &[b"H:server:1"]);
        assert_eq!(packet.data, b"H:server:1");
    }

    #[test]
    fn test_header_round_trip() {
        let packet = Packet::response(PacketType::WorkComplete, &[b"H:server:1", b"true"]);
        let bytes = packet.to_bytes();

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[..HEADER_LEN]);
        let (magic, ptype, size) = Packet::parse_header(&header).expect("header should parse");

        assert_eq!(magic, PacketMagic::Response);
        assert_eq!(ptype, PacketType::WorkComplete);
        assert_eq!(size as usize, packet.data.len());
        assert_eq!(&bytes[HEADER_LEN..], packet.data.as_slice());
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(b"GEAR");
        header[4..8].copy_from_slice(&8u32.to_be_bytes());

        match Packet::parse_header(&header) {
            Err(ProtocolError::BadMagic(magic)) => assert_eq!(&magic, b"GEAR"),
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_packet_type_is_rejected() {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&[0, b'R', b'E', b'S']);
        header[4..8].copy_from_slice(&999u32.to_be_bytes());

        assert!(matches!(
            Packet::parse_header(&header),
            Err(ProtocolError::UnknownPacketType(999))
        ));
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&[0, b'R', b'E', b'S']);
        header[4..8].copy_from_slice(&13u32.to_be_bytes());
        header[8..].copy_from_slice(&u32::MAX.to_be_bytes());

        assert!(matches!(
            Packet::parse_header(&header),
            Err(ProtocolError::OversizedPacket { .. })
        ));
    }
}
