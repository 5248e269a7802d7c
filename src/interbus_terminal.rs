use serialport::SerialPort;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use crate::config::InterbusSettings;
use crate::interbus::{Telegram, TelegramType, DEVICE_TYPE_REGISTER, EOT, SOT};
use crate::register_transport::{DeviceTypeTable, RegisterResult, RegisterTransport, TransportError};

/// Polling granularity of a single serial read.
const READ_SLICE: Duration = Duration::from_millis(10);

/// Interbus master talking to NKT modules over serial ports.
pub struct InterbusTerminal {
    settings: InterbusSettings,
    open: BTreeMap<String, Box<dyn SerialPort>>,
}

impl InterbusTerminal {
    pub fn new(settings: InterbusSettings) -> Self {
        Self {
            settings,
            open: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &InterbusSettings {
        &self.settings
    }

    fn open_serial(&self, port: &str) -> Result<Box<dyn SerialPort>, TransportError> {
        let mut serial = serialport::new(port, self.settings.baud_rate)
            .timeout(READ_SLICE)
            .open()?;
        serial.clear(serialport::ClearBuffer::All)?;
        Ok(serial)
    }

    fn serial(&mut self, port: &str) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        if !self.open.contains_key(port) {
            log::debug!("Opening Interbus port {}", port);
            let serial = self.open_serial(port)?;
            self.open.insert(port.to_string(), serial);
        }
        self.open
            .get_mut(port)
            .ok_or_else(|| TransportError::PortNotFound {
                port: port.to_string(),
            })
    }

    /// Send one request and wait for the matching reply.
    #[tracing::instrument(level = "trace", skip(self, request), fields(dest = request.dest, register = request.register))]
    fn transaction(&mut self, port: &str, request: &Telegram) -> Result<Telegram, TransportError> {
        let timeout = self.settings.timeout();
        let host = self.settings.host_address;

        let serial = self.serial(port)?;
        serial.clear(serialport::ClearBuffer::Input)?;
        exchange(&mut **serial, port, request, host, timeout)
    }
}

/// Read bytes until a full `SOT .. EOT` frame arrived or the timeout expired.
fn read_frame<R: Read + ?Sized>(
    serial: &mut R,
    timeout: Duration,
) -> Result<Option<Vec<u8>>, TransportError> {
    let mut frame = Vec::new();
    let now = Instant::now();

    loop {
        let mut byte = [0u8; 1];
        match serial.read_exact(&mut byte) {
            Ok(()) => {
                if byte[0] == SOT {
                    // a new start discards any partial frame
                    frame.clear();
                    frame.push(SOT);
                } else if !frame.is_empty() {
                    frame.push(byte[0]);
                    if byte[0] == EOT {
                        return Ok(Some(frame));
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }

        if now.elapsed() >= timeout {
            return Ok(None);
        }
    }
}

/// Outcome of a well-formed reply to `request`.
fn reply_result(request: &Telegram, reply: &Telegram, host: u8) -> RegisterResult {
    if reply.source != request.dest || reply.dest != host || reply.register != request.register {
        log::debug!(
            "Reply from module {} for register 0x{:02X} does not match request",
            reply.source,
            reply.register
        );
        return RegisterResult::TypeError;
    }

    match (request.kind, reply.kind) {
        (TelegramType::Read, TelegramType::Datagram) | (TelegramType::Write, TelegramType::Ack) => {
            RegisterResult::Success
        }
        (_, TelegramType::Nack) => RegisterResult::Nacked,
        (_, TelegramType::CrcError) => RegisterResult::CrcError,
        (_, TelegramType::Busy) => RegisterResult::Busy,
        _ => RegisterResult::TypeError,
    }
}

/// Write `request` to `serial` and read back its reply.
fn exchange<P: Read + Write + ?Sized>(
    serial: &mut P,
    port: &str,
    request: &Telegram,
    host: u8,
    timeout: Duration,
) -> Result<Telegram, TransportError> {
    let fail = |result: RegisterResult| TransportError::Register {
        port: port.to_string(),
        module_address: request.dest,
        register: request.register,
        result,
    };

    let frame = request.encode();
    tracing::trace!(?frame, "interbus request");
    serial.write_all(&frame)?;
    serial.flush()?;

    let Some(reply) = read_frame(serial, timeout)? else {
        return Err(fail(RegisterResult::Timeout));
    };
    tracing::trace!(?reply, "interbus reply");

    let reply = match Telegram::decode(&reply) {
        Ok(reply) => reply,
        Err(e) => {
            log::debug!("Discarding malformed reply on {}: {}", port, e);
            return Err(fail(RegisterResult::CrcError));
        }
    };

    reply_result(request, &reply, host).check().map_err(fail)?;
    Ok(reply)
}

impl RegisterTransport for InterbusTerminal {
    fn available_ports(&mut self) -> Result<Vec<String>, TransportError> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|info| info.port_name)
            .collect())
    }

    fn open_ports(&mut self, ports: &[String]) -> Result<(), TransportError> {
        for port in ports {
            if self.open.contains_key(port) {
                continue;
            }
            match self.open_serial(port) {
                Ok(serial) => {
                    self.open.insert(port.clone(), serial);
                }
                Err(e) => log::debug!("Skipping port {}: {}", port, e),
            }
        }
        Ok(())
    }

    fn open_port_names(&self) -> Vec<String> {
        self.open.keys().cloned().collect()
    }

    fn close_all_ports(&mut self) -> Result<(), TransportError> {
        log::debug!("Closing {} Interbus port(s)", self.open.len());
        self.open.clear();
        Ok(())
    }

    fn device_types(&mut self, port: &str) -> Result<DeviceTypeTable, TransportError> {
        let mut table = DeviceTypeTable::empty();
        for address in self.settings.probe_addresses.clone() {
            match self.read_u8(port, address, DEVICE_TYPE_REGISTER) {
                Ok(device_type) => table.set(address, device_type),
                Err(TransportError::Register {
                    result: RegisterResult::Timeout | RegisterResult::Nacked,
                    ..
                }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(table)
    }

    fn register_read(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
    ) -> Result<Vec<u8>, TransportError> {
        let request = Telegram::read(module_address, self.settings.host_address, register);
        Ok(self.transaction(port, &request)?.data)
    }

    fn register_write(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let request = Telegram::write(module_address, self.settings.host_address, register, data);
        self.transaction(port, &request).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    const HOST: u8 = 0xA2;
    const TIMEOUT: Duration = Duration::from_millis(20);

    /// Serial port stand-in: replies are queued up front, writes are kept.
    #[derive(Default)]
    struct ScriptedPort {
        incoming: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl ScriptedPort {
        fn answering(bytes: &[u8]) -> Self {
            Self {
                incoming: bytes.iter().copied().collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.incoming.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
            }
            let n = buf.len().min(self.incoming.len());
            for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn reply_to(request: &Telegram, kind: TelegramType, data: &[u8]) -> Telegram {
        Telegram {
            dest: HOST,
            source: request.dest,
            kind,
            register: request.register,
            data: data.to_vec(),
        }
    }

    fn failed_with(result: Result<Telegram, TransportError>) -> Option<RegisterResult> {
        result.err().and_then(|e| e.register_result())
    }

    #[test]
    fn test_read_is_answered_by_datagram() {
        let request = Telegram::read(15, HOST, 0x30);
        let reply = reply_to(&request, TelegramType::Datagram, &[3]);
        let mut port = ScriptedPort::answering(&reply.encode());

        let answer = exchange(&mut port, "COM3", &request, HOST, TIMEOUT).unwrap();
        assert_eq!(answer.data, vec![3]);
        assert_eq!(port.written, request.encode());
    }

    #[test]
    fn test_write_is_answered_by_ack() {
        let request = Telegram::write(15, HOST, 0x37, &500u16.to_le_bytes());
        let reply = reply_to(&request, TelegramType::Ack, &[]);
        let mut port = ScriptedPort::answering(&reply.encode());
        assert!(exchange(&mut port, "COM3", &request, HOST, TIMEOUT).is_ok());
    }

    #[test]
    fn test_reply_kinds_map_to_results() {
        let read = Telegram::read(16, HOST, 0x90);
        let write = Telegram::write(16, HOST, 0x90, &[1, 2, 3, 4]);
        let cases = [
            (&read, TelegramType::Datagram, RegisterResult::Success),
            (&write, TelegramType::Ack, RegisterResult::Success),
            (&read, TelegramType::Nack, RegisterResult::Nacked),
            (&write, TelegramType::Nack, RegisterResult::Nacked),
            (&read, TelegramType::CrcError, RegisterResult::CrcError),
            (&read, TelegramType::Busy, RegisterResult::Busy),
            (&read, TelegramType::Ack, RegisterResult::TypeError),
            (&write, TelegramType::Datagram, RegisterResult::TypeError),
        ];
        for (request, kind, expected) in cases {
            let reply = reply_to(request, kind, &[]);
            assert_eq!(reply_result(request, &reply, HOST), expected, "{:?}", kind);
        }
    }

    #[test]
    fn test_reply_from_elsewhere_is_type_error() {
        let request = Telegram::read(15, HOST, 0x30);

        let mut other_module = reply_to(&request, TelegramType::Datagram, &[3]);
        other_module.source = 16;
        let mut other_register = reply_to(&request, TelegramType::Datagram, &[3]);
        other_register.register = 0x31;
        let mut other_host = reply_to(&request, TelegramType::Datagram, &[3]);
        other_host.dest = 0x42;

        for reply in [other_module, other_register, other_host] {
            assert_eq!(reply_result(&request, &reply, HOST), RegisterResult::TypeError);
        }
    }

    #[test]
    fn test_nack_surfaces_as_register_error() {
        let request = Telegram::read(18, HOST, 0x34);
        let reply = reply_to(&request, TelegramType::Nack, &[]);
        let mut port = ScriptedPort::answering(&reply.encode());
        assert_eq!(
            failed_with(exchange(&mut port, "COM5", &request, HOST, TIMEOUT)),
            Some(RegisterResult::Nacked)
        );
    }

    #[test]
    fn test_partial_frame_is_dropped_on_new_start() {
        let request = Telegram::read(15, HOST, 0x30);
        let reply = reply_to(&request, TelegramType::Datagram, &[0]);

        // leftovers of an earlier frame, then line noise, then the real reply
        let mut bytes = vec![SOT, HOST, 15, 0x08];
        bytes.extend(reply.encode());
        let mut noisy = vec![0x55, 0x01];
        noisy.extend(bytes);

        let mut port = ScriptedPort::answering(&noisy);
        let answer = exchange(&mut port, "COM3", &request, HOST, TIMEOUT).unwrap();
        assert_eq!(answer, reply);
    }

    #[test]
    fn test_silence_times_out() {
        let request = Telegram::read(15, HOST, 0x30);
        let mut port = ScriptedPort::default();
        assert_eq!(
            failed_with(exchange(&mut port, "COM3", &request, HOST, TIMEOUT)),
            Some(RegisterResult::Timeout)
        );

        // a frame that never ends is a timeout too
        let mut port = ScriptedPort::answering(&[SOT, HOST, 15]);
        assert_eq!(
            failed_with(exchange(&mut port, "COM3", &request, HOST, TIMEOUT)),
            Some(RegisterResult::Timeout)
        );
    }

    #[test]
    fn test_corrupted_reply_is_crc_error() {
        let request = Telegram::read(15, HOST, 0x30);
        let mut frame = reply_to(&request, TelegramType::Datagram, &[3]).encode();
        // SOT, dest, source, type, register, then the data byte
        assert_eq!(frame[5], 3);
        frame[5] = 4;

        let mut port = ScriptedPort::answering(&frame);
        assert_eq!(
            failed_with(exchange(&mut port, "COM3", &request, HOST, TIMEOUT)),
            Some(RegisterResult::CrcError)
        );
    }

    #[test]
    fn test_new_terminal_has_no_open_ports() {
        let terminal = InterbusTerminal::new(InterbusSettings::default());
        assert!(terminal.open_port_names().is_empty());
        assert_eq!(terminal.settings().host_address, 0xA2);
    }

    #[test]
    fn test_unopenable_ports_are_skipped() {
        let mut terminal = InterbusTerminal::new(InterbusSettings::default());
        terminal
            .open_ports(&["/dev/superk-does-not-exist".to_string()])
            .unwrap();
        assert!(terminal.open_port_names().is_empty());
        terminal.close_all_ports().unwrap();
    }

    #[test]
    fn test_register_read_on_missing_port_fails() {
        let mut terminal = InterbusTerminal::new(InterbusSettings::default());
        let result = terminal.read_u8("/dev/superk-does-not-exist", 15, 0x30);
        assert!(matches!(result, Err(TransportError::SerialPort(_))));
    }
}
