//! Thorlabs APT message header, as used by the KLD101 laser diode driver.
//!
//! Short messages are a 6-byte header carrying two parameter bytes:
//!
//! ```text
//! id_lo | id_hi | param1 | param2 | dest | source
//! ```
//!
//! Long messages replace the parameters with the data length and set bit 7
//! of the destination:
//!
//! ```text
//! id_lo | id_hi | len_lo | len_hi | (dest | 0x80) | source | data ...
//! ```

use crate::units::ValidationError;

pub const HEADER_LEN: usize = 6;
const LONG_FLAG: u8 = 0x80;

pub const MOD_IDENTIFY: u16 = 0x0223;
pub const LD_SET_CHANENABLESTATE: u16 = 0x0210;
pub const LD_SET_LASERDIODCURRENT: u16 = 0x0212;

pub const HOST: u8 = 0x01;
/// Generic USB hardware unit, e.g. a single K-Cube.
pub const GENERIC_USB: u8 = 0x50;

const CHANNEL_ENABLE: u8 = 0x01;
const CHANNEL_DISABLE: u8 = 0x02;

/// Diode current is sent in units of 0.01 mA.
const CURRENT_STEPS_PER_MILLIAMP: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AptBody {
    Short { param1: u8, param2: u8 },
    Long(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AptMessage {
    pub id: u16,
    pub dest: u8,
    pub source: u8,
    pub body: AptBody,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AptError {
    #[error("Incomplete APT message: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },

    #[error("APT data block of {0} bytes does not fit the length field")]
    DataTooLong(usize),
}

impl AptMessage {
    pub fn short(id: u16, param1: u8, param2: u8, dest: u8, source: u8) -> Self {
        Self {
            id,
            dest,
            source,
            body: AptBody::Short { param1, param2 },
        }
    }

    pub fn long(id: u16, data: Vec<u8>, dest: u8, source: u8) -> Self {
        Self {
            id,
            dest,
            source,
            body: AptBody::Long(data),
        }
    }

    /// Flash the front panel of the unit.
    pub fn identify(channel: u8, dest: u8) -> Self {
        Self::short(MOD_IDENTIFY, channel, 0x00, dest, HOST)
    }

    pub fn set_channel_enable(channel: u8, enable: bool, dest: u8) -> Self {
        let state = if enable { CHANNEL_ENABLE } else { CHANNEL_DISABLE };
        Self::short(LD_SET_CHANENABLESTATE, channel, state, dest, HOST)
    }

    pub fn set_laser_diode_current(milliamps: f64, dest: u8) -> Result<Self, ValidationError> {
        let max = f64::from(u16::MAX) / CURRENT_STEPS_PER_MILLIAMP;
        if !milliamps.is_finite() {
            return Err(ValidationError::NotFinite {
                quantity: "Laser diode current (mA)",
                value: milliamps,
            });
        }
        if !(0.0..=max).contains(&milliamps) {
            return Err(ValidationError::OutOfRange {
                quantity: "Laser diode current (mA)",
                value: milliamps,
                min: 0.0,
                max,
            });
        }
        let steps = (milliamps * CURRENT_STEPS_PER_MILLIAMP).round() as u16;
        Ok(Self::long(
            LD_SET_LASERDIODCURRENT,
            steps.to_le_bytes().to_vec(),
            dest,
            HOST,
        ))
    }

    pub fn encode(&self) -> Result<Vec<u8>, AptError> {
        let [id_lo, id_hi] = self.id.to_le_bytes();
        match &self.body {
            AptBody::Short { param1, param2 } => {
                Ok(vec![id_lo, id_hi, *param1, *param2, self.dest, self.source])
            }
            AptBody::Long(data) => {
                let len = u16::try_from(data.len()).map_err(|_| AptError::DataTooLong(data.len()))?;
                let [len_lo, len_hi] = len.to_le_bytes();
                let mut packet = Vec::with_capacity(HEADER_LEN + data.len());
                packet.extend_from_slice(&[
                    id_lo,
                    id_hi,
                    len_lo,
                    len_hi,
                    self.dest | LONG_FLAG,
                    self.source,
                ]);
                packet.extend_from_slice(data);
                Ok(packet)
            }
        }
    }

    /// Decode one message from the front of `buf`, returning it with the
    /// number of bytes it occupied.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), AptError> {
        let Some(header) = buf.get(..HEADER_LEN) else {
            return Err(AptError::Incomplete {
                needed: HEADER_LEN,
                available: buf.len(),
            });
        };
        let id = u16::from_le_bytes([header[0], header[1]]);
        let dest = header[4];
        let source = header[5];

        if dest & LONG_FLAG == 0 {
            let message = Self::short(id, header[2], header[3], dest, source);
            return Ok((message, HEADER_LEN));
        }

        let len = usize::from(u16::from_le_bytes([header[2], header[3]]));
        let needed = HEADER_LEN + len;
        let data = buf.get(HEADER_LEN..needed).ok_or(AptError::Incomplete {
            needed,
            available: buf.len(),
        })?;
        let message = Self::long(id, data.to_vec(), dest & !LONG_FLAG, source);
        Ok((message, needed))
    }
}
