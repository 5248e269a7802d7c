use std::fmt;

use crate::interbus::TelegramError;

/// Result codes reported for a single register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterResult {
    Success,
    ReadError,
    Failed,
    Busy,
    Nacked,
    CrcError,
    Timeout,
    ComError,
    TypeError,
    IndexError,
    PortClosed,
    RegisterNotFound,
    DeviceNotFound,
    PortNotFound,
    PortOpenError,
    ApplicationBusy,
    Unknown(u8),
}

impl RegisterResult {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::ReadError,
            2 => Self::Failed,
            3 => Self::Busy,
            4 => Self::Nacked,
            5 => Self::CrcError,
            6 => Self::Timeout,
            7 => Self::ComError,
            8 => Self::TypeError,
            9 => Self::IndexError,
            10 => Self::PortClosed,
            11 => Self::RegisterNotFound,
            12 => Self::DeviceNotFound,
            13 => Self::PortNotFound,
            14 => Self::PortOpenError,
            15 => Self::ApplicationBusy,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::ReadError => 1,
            Self::Failed => 2,
            Self::Busy => 3,
            Self::Nacked => 4,
            Self::CrcError => 5,
            Self::Timeout => 6,
            Self::ComError => 7,
            Self::TypeError => 8,
            Self::IndexError => 9,
            Self::PortClosed => 10,
            Self::RegisterNotFound => 11,
            Self::DeviceNotFound => 12,
            Self::PortNotFound => 13,
            Self::PortOpenError => 14,
            Self::ApplicationBusy => 15,
            Self::Unknown(code) => code,
        }
    }

    /// Map the code to an outcome. Anything but `Success` is a failure.
    pub fn check(self) -> Result<(), Self> {
        match self {
            Self::Success => Ok(()),
            failure => Err(failure),
        }
    }
}

impl fmt::Display for RegisterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::ReadError => "read error",
            Self::Failed => "failed",
            Self::Busy => "module busy",
            Self::Nacked => "request not acknowledged",
            Self::CrcError => "CRC error",
            Self::Timeout => "communication timeout",
            Self::ComError => "communication error",
            Self::TypeError => "unexpected reply type",
            Self::IndexError => "index error",
            Self::PortClosed => "port closed",
            Self::RegisterNotFound => "register not found",
            Self::DeviceNotFound => "device not found",
            Self::PortNotFound => "port not found",
            Self::PortOpenError => "port could not be opened",
            Self::ApplicationBusy => "application busy",
            Self::Unknown(_) => "unknown result",
        };
        write!(f, "{}:{}", self.code(), name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),

    #[error("Register 0x{register:02X} on module {module_address} via {port} failed: {result}")]
    Register {
        port: String,
        module_address: u8,
        register: u8,
        result: RegisterResult,
    },

    #[error("Register 0x{register:02X} returned {actual} bytes, expected at least {expected}")]
    ShortPayload {
        register: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Port {port} is not available")]
    PortNotFound { port: String },
}

impl TransportError {
    pub fn register_result(&self) -> Option<RegisterResult> {
        match self {
            Self::Register { result, .. } => Some(*result),
            _ => None,
        }
    }
}

/// Device types found on one port, indexed by module address. Zero means no device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTypeTable {
    types: Vec<u8>,
}

impl DeviceTypeTable {
    pub const SIZE: usize = 256;

    pub fn empty() -> Self {
        Self {
            types: vec![0; Self::SIZE],
        }
    }

    pub fn from_bytes(mut types: Vec<u8>) -> Self {
        types.resize(Self::SIZE, 0);
        Self { types }
    }

    pub fn set(&mut self, module_address: u8, device_type: u8) {
        self.types[usize::from(module_address)] = device_type;
    }

    pub fn get(&self, module_address: u8) -> u8 {
        self.types[usize::from(module_address)]
    }

    /// Addresses with a device present, paired with their type.
    pub fn present(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.types
            .iter()
            .enumerate()
            .filter(|(_, ty)| **ty != 0)
            .map(|(address, ty)| (address as u8, *ty))
    }
}

impl Default for DeviceTypeTable {
    fn default() -> Self {
        Self::empty()
    }
}

fn payload<const N: usize>(register: u8, data: &[u8]) -> Result<[u8; N], TransportError> {
    data.get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(TransportError::ShortPayload {
            register,
            expected: N,
            actual: data.len(),
        })
}

/// Register access on modules sharing a communication port.
///
/// Implementations must check the module's result code for every call and
/// turn anything but success into [`TransportError::Register`] before a
/// payload is handed back. Multi-byte values are little-endian.
pub trait RegisterTransport {
    /// Every port that could carry a module.
    fn available_ports(&mut self) -> Result<Vec<String>, TransportError>;

    /// Open the given ports. Ports that cannot be opened are skipped.
    fn open_ports(&mut self, ports: &[String]) -> Result<(), TransportError>;

    fn open_port_names(&self) -> Vec<String>;

    fn close_all_ports(&mut self) -> Result<(), TransportError>;

    fn device_types(&mut self, port: &str) -> Result<DeviceTypeTable, TransportError>;

    fn register_read(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
    ) -> Result<Vec<u8>, TransportError>;

    fn register_write(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TransportError>;

    fn read_u8(&mut self, port: &str, module_address: u8, register: u8) -> Result<u8, TransportError> {
        let data = self.register_read(port, module_address, register)?;
        Ok(u8::from_le_bytes(payload(register, &data)?))
    }

    fn read_u16(&mut self, port: &str, module_address: u8, register: u8) -> Result<u16, TransportError> {
        let data = self.register_read(port, module_address, register)?;
        Ok(u16::from_le_bytes(payload(register, &data)?))
    }

    fn read_s16(&mut self, port: &str, module_address: u8, register: u8) -> Result<i16, TransportError> {
        let data = self.register_read(port, module_address, register)?;
        Ok(i16::from_le_bytes(payload(register, &data)?))
    }

    fn read_u32(&mut self, port: &str, module_address: u8, register: u8) -> Result<u32, TransportError> {
        let data = self.register_read(port, module_address, register)?;
        Ok(u32::from_le_bytes(payload(register, &data)?))
    }

    fn write_u8(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
        value: u8,
    ) -> Result<(), TransportError> {
        self.register_write(port, module_address, register, &value.to_le_bytes())
    }

    fn write_u16(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
        value: u16,
    ) -> Result<(), TransportError> {
        self.register_write(port, module_address, register, &value.to_le_bytes())
    }

    fn write_u32(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
        value: u32,
    ) -> Result<(), TransportError> {
        self.register_write(port, module_address, register, &value.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes_round_trip_through_names() {
        for code in 0..=15 {
            assert_eq!(RegisterResult::from_code(code).code(), code);
        }
        assert_eq!(RegisterResult::from_code(42), RegisterResult::Unknown(42));
        assert_eq!(RegisterResult::Timeout.to_string(), "6:communication timeout");
    }

    #[test]
    fn test_only_success_passes_check() {
        assert!(RegisterResult::Success.check().is_ok());
        assert_eq!(RegisterResult::Busy.check(), Err(RegisterResult::Busy));
        assert_eq!(
            RegisterResult::Unknown(99).check(),
            Err(RegisterResult::Unknown(99))
        );
    }

    #[test]
    fn test_device_type_table_lookup() {
        let mut table = DeviceTypeTable::empty();
        table.set(15, 0x88);
        table.set(18, 0x67);

        assert_eq!(table.get(15), 0x88);
        assert_eq!(table.get(16), 0);
        assert_eq!(table.present().collect::<Vec<_>>(), vec![(15, 0x88), (18, 0x67)]);

        let short = DeviceTypeTable::from_bytes(vec![0, 0, 0x66]);
        assert_eq!(short.get(2), 0x66);
        assert_eq!(short.get(255), 0);
    }

    #[test]
    fn test_short_payload_is_rejected() {
        assert!(matches!(
            payload::<2>(0x37, &[0x01]),
            Err(TransportError::ShortPayload {
                register: 0x37,
                expected: 2,
                actual: 1
            })
        ));
        assert_eq!(payload::<2>(0x37, &[0xE8, 0x03, 0xFF]).ok(), Some([0xE8, 0x03]));
    }
}
