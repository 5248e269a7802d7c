//! NKT Interbus telegram framing.
//!
//! A telegram on the wire looks like
//!
//! ```text
//! SOT | dest | source | type | register | data ... | crc_hi | crc_lo | EOT
//! ```
//!
//! Every byte between `SOT` and `EOT` that collides with one of the three
//! framing bytes is sent as `SOE, byte + 0x40`. The CRC is CRC-16/XMODEM over
//! `dest ..= data`, most significant byte first.

use crc::{Crc, CRC_16_XMODEM};

pub const SOT: u8 = 0x0D;
pub const EOT: u8 = 0x0A;
pub const SOE: u8 = 0x5E;
const ESCAPE_OFFSET: u8 = 0x40;

/// Register every module answers with its device type.
pub const DEVICE_TYPE_REGISTER: u8 = 0x61;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramType {
    Nack,
    CrcError,
    Busy,
    Ack,
    Read,
    Write,
    WriteSet,
    WriteClear,
    Datagram,
    WriteToggle,
}

impl TelegramType {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Nack => 0,
            Self::CrcError => 1,
            Self::Busy => 2,
            Self::Ack => 3,
            Self::Read => 4,
            Self::Write => 5,
            Self::WriteSet => 6,
            Self::WriteClear => 7,
            Self::Datagram => 8,
            Self::WriteToggle => 9,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Nack,
            1 => Self::CrcError,
            2 => Self::Busy,
            3 => Self::Ack,
            4 => Self::Read,
            5 => Self::Write,
            6 => Self::WriteSet,
            7 => Self::WriteClear,
            8 => Self::Datagram,
            9 => Self::WriteToggle,
            _ => return None,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TelegramError {
    #[error("Telegram does not start with SOT")]
    MissingStart,

    #[error("Telegram does not end with EOT")]
    MissingEnd,

    #[error("Escape byte at end of telegram")]
    DanglingEscape,

    #[error("Telegram too short ({0} bytes after unescaping)")]
    TooShort(usize),

    #[error("CRC mismatch: received 0x{received:04X}, computed 0x{computed:04X}")]
    CrcMismatch { received: u16, computed: u16 },

    #[error("Unknown telegram type {0}")]
    UnknownType(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    pub dest: u8,
    pub source: u8,
    pub kind: TelegramType,
    pub register: u8,
    pub data: Vec<u8>,
}

impl Telegram {
    pub fn read(dest: u8, source: u8, register: u8) -> Self {
        Self {
            dest,
            source,
            kind: TelegramType::Read,
            register,
            data: Vec::new(),
        }
    }

    pub fn write(dest: u8, source: u8, register: u8, data: &[u8]) -> Self {
        Self {
            dest,
            source,
            kind: TelegramType::Write,
            register,
            data: data.to_vec(),
        }
    }

    fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(4 + self.data.len());
        body.extend_from_slice(&[self.dest, self.source, self.kind.as_byte(), self.register]);
        body.extend_from_slice(&self.data);
        body
    }

    /// Frame, checksum and escape the telegram.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = self.body();
        body.extend_from_slice(&CRC16.checksum(&body).to_be_bytes());

        let mut frame = Vec::with_capacity(body.len() * 2 + 2);
        frame.push(SOT);
        for byte in body {
            if matches!(byte, SOT | EOT | SOE) {
                frame.push(SOE);
                frame.push(byte + ESCAPE_OFFSET);
            } else {
                frame.push(byte);
            }
        }
        frame.push(EOT);
        frame
    }

    /// Parse one complete frame, `SOT` and `EOT` included.
    pub fn decode(frame: &[u8]) -> Result<Self, TelegramError> {
        let inner = frame
            .strip_prefix(&[SOT])
            .ok_or(TelegramError::MissingStart)?
            .strip_suffix(&[EOT])
            .ok_or(TelegramError::MissingEnd)?;

        let mut body = Vec::with_capacity(inner.len());
        let mut bytes = inner.iter();
        while let Some(&byte) = bytes.next() {
            if byte == SOE {
                let escaped = bytes.next().ok_or(TelegramError::DanglingEscape)?;
                body.push(escaped.wrapping_sub(ESCAPE_OFFSET));
            } else {
                body.push(byte);
            }
        }

        // dest, source, type, register and two CRC bytes at minimum
        if body.len() < 6 {
            return Err(TelegramError::TooShort(body.len()));
        }

        let (content, crc_bytes) = body.split_at(body.len() - 2);
        let received = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);
        let computed = CRC16.checksum(content);
        if received != computed {
            return Err(TelegramError::CrcMismatch { received, computed });
        }

        let kind =
            TelegramType::from_byte(content[2]).ok_or(TelegramError::UnknownType(content[2]))?;

        Ok(Self {
            dest: content[0],
            source: content[1],
            kind,
            register: content[3],
            data: content[4..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_layout() {
        let frame = Telegram::read(15, 0xA2, 0x37).encode();
        let body = [15, 0xA2, 4, 0x37];
        let crc = CRC16.checksum(&body).to_be_bytes();

        assert_eq!(frame[0], SOT);
        assert_eq!(&frame[1..5], &body);
        assert_eq!(*frame.last().unwrap(), EOT);
        // CRC bytes may themselves be escaped; decode is the authority
        assert_eq!(Telegram::decode(&frame).unwrap().register, 0x37);
        assert!(frame.len() >= 8);
        assert_eq!(CRC16.checksum(&[body.as_slice(), crc.as_slice()].concat()), 0);
    }

    #[test]
    fn test_framing_bytes_in_payload_are_escaped() {
        let telegram = Telegram::write(15, 0xA2, 0x30, &[SOT, EOT, SOE, 0x03]);
        let frame = telegram.encode();

        let inner = &frame[1..frame.len() - 1];
        assert!(!inner.contains(&SOT));
        assert!(!inner.contains(&EOT));
        assert!(inner.windows(2).any(|w| w == [SOE, SOT + 0x40]));
        assert!(inner.windows(2).any(|w| w == [SOE, EOT + 0x40]));
        assert!(inner.windows(2).any(|w| w == [SOE, SOE + 0x40]));

        assert_eq!(Telegram::decode(&frame).unwrap(), telegram);
    }

    #[test]
    fn test_datagram_reply_decodes() {
        let reply = Telegram {
            dest: 0xA2,
            source: 15,
            kind: TelegramType::Datagram,
            register: 0x37,
            data: vec![0xE8, 0x03],
        };
        let decoded = Telegram::decode(&reply.encode()).unwrap();
        assert_eq!(decoded.kind, TelegramType::Datagram);
        assert_eq!(decoded.data, vec![0xE8, 0x03]);
    }

    #[test]
    fn test_corrupted_frame_fails_crc() {
        let mut frame = Telegram::write(16, 0xA2, 0x90, &[0x20, 0xA1, 0x07, 0x00]).encode();
        frame[5] ^= 0x01;
        assert!(matches!(
            Telegram::decode(&frame),
            Err(TelegramError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_malformed_frames() {
        assert_eq!(Telegram::decode(&[0x00, EOT]), Err(TelegramError::MissingStart));
        assert_eq!(Telegram::decode(&[SOT, 0x01]), Err(TelegramError::MissingEnd));
        assert_eq!(Telegram::decode(&[SOT, 1, 2, SOE, EOT]), Err(TelegramError::DanglingEscape));
        assert_eq!(Telegram::decode(&[SOT, 1, 2, 3, EOT]), Err(TelegramError::TooShort(3)));
    }
}
