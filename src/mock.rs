//! In-memory NKT bus for tests and dry runs.
//!
//! ```
//! use superk_rs::mock::MockTransport;
//! use superk_rs::{Bus, Fianium};
//!
//! let bus = Bus::new(
//!     MockTransport::new()
//!         .with_module("COM3", 15, 0x88)
//!         .with_register("COM3", 15, 0x37, &500u16.to_le_bytes()),
//! );
//! let laser = Fianium::connect(&bus, None)?;
//! assert_eq!(laser.power_level()?, 50.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::interbus::DEVICE_TYPE_REGISTER;
use crate::register_transport::{DeviceTypeTable, RegisterResult, RegisterTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Read {
        port: String,
        module_address: u8,
        register: u8,
    },
    Write {
        port: String,
        module_address: u8,
        register: u8,
        data: Vec<u8>,
    },
}

#[derive(Debug, Default)]
struct MockModule {
    device_type: u8,
    registers: HashMap<u8, Vec<u8>>,
    failures: HashMap<u8, RegisterResult>,
}

#[derive(Debug, Default)]
struct MockPort {
    modules: BTreeMap<u8, MockModule>,
    dead: bool,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    ports: BTreeMap<String, MockPort>,
    open: BTreeSet<String>,
    calls: Vec<MockCall>,
    closes: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a module of `device_type` at `module_address` on `port`.
    pub fn with_module(mut self, port: &str, module_address: u8, device_type: u8) -> Self {
        self.ports
            .entry(port.to_string())
            .or_default()
            .modules
            .entry(module_address)
            .or_default()
            .device_type = device_type;
        self
    }

    pub fn with_register(mut self, port: &str, module_address: u8, register: u8, data: &[u8]) -> Self {
        self.module_mut(port, module_address)
            .registers
            .insert(register, data.to_vec());
        self
    }

    /// Make every access to one register fail with `result`.
    pub fn with_failure(
        mut self,
        port: &str,
        module_address: u8,
        register: u8,
        result: RegisterResult,
    ) -> Self {
        self.module_mut(port, module_address)
            .failures
            .insert(register, result);
        self
    }

    /// A port that opens but never answers.
    pub fn with_dead_port(mut self, port: &str) -> Self {
        self.ports.entry(port.to_string()).or_default().dead = true;
        self
    }

    fn module_mut(&mut self, port: &str, module_address: u8) -> &mut MockModule {
        self.ports
            .entry(port.to_string())
            .or_default()
            .modules
            .entry(module_address)
            .or_default()
    }

    pub fn set_register(&mut self, port: &str, module_address: u8, register: u8, data: &[u8]) {
        self.module_mut(port, module_address)
            .registers
            .insert(register, data.to_vec());
    }

    /// Current content of a register, including anything written to it.
    pub fn register(&self, port: &str, module_address: u8, register: u8) -> Option<&[u8]> {
        self.ports
            .get(port)?
            .modules
            .get(&module_address)?
            .registers
            .get(&register)
            .map(Vec::as_slice)
    }

    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    pub fn writes(&self) -> impl Iterator<Item = &MockCall> {
        self.calls
            .iter()
            .filter(|call| matches!(call, MockCall::Write { .. }))
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn close_count(&self) -> usize {
        self.closes
    }

    /// A laser, RF driver and Select on one port, in a plausible idle state.
    pub fn simulated_system(port: &str) -> Self {
        Self::new()
            .with_module(port, 15, 0x88)
            .with_register(port, 15, 0x30, &[0])
            .with_register(port, 15, 0x31, &0u16.to_le_bytes())
            .with_register(port, 15, 0x32, &[2, 0])
            .with_register(port, 15, 0x37, &0u16.to_le_bytes())
            .with_register(port, 15, 0x66, &0u16.to_le_bytes())
            .with_module(port, 16, 0x66)
            .with_register(port, 16, 0x30, &[0])
            .with_register(port, 16, 0x31, &[0b001])
            .with_register(port, 16, 0x34, &430_000u32.to_le_bytes())
            .with_register(port, 16, 0x35, &700_000u32.to_le_bytes())
            .with_register(port, 16, 0x38, &250i16.to_le_bytes())
            .with_register(port, 16, 0x75, &[1])
            .with_module(port, 18, 0x67)
            .with_register(port, 18, 0x34, &[0])
            .with_register(port, 18, 0x90, &430_000u32.to_le_bytes())
            .with_register(port, 18, 0x91, &700_000u32.to_le_bytes())
            .with_register(port, 18, 0xA0, &640_000u32.to_le_bytes())
            .with_register(port, 18, 0xA1, &1_100_000u32.to_le_bytes())
    }

    fn module(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
    ) -> Result<&mut MockModule, TransportError> {
        let fail = |result| TransportError::Register {
            port: port.to_string(),
            module_address,
            register,
            result,
        };
        let mock_port = self
            .ports
            .get_mut(port)
            .ok_or_else(|| fail(RegisterResult::PortNotFound))?;
        if mock_port.dead {
            return Err(fail(RegisterResult::Timeout));
        }
        let module = mock_port
            .modules
            .get_mut(&module_address)
            .ok_or_else(|| fail(RegisterResult::DeviceNotFound))?;
        if let Some(result) = module.failures.get(&register) {
            return Err(fail(*result));
        }
        Ok(module)
    }
}

impl RegisterTransport for MockTransport {
    fn available_ports(&mut self) -> Result<Vec<String>, TransportError> {
        Ok(self.ports.keys().cloned().collect())
    }

    fn open_ports(&mut self, ports: &[String]) -> Result<(), TransportError> {
        for port in ports {
            if self.ports.contains_key(port) {
                self.open.insert(port.clone());
            }
        }
        Ok(())
    }

    fn open_port_names(&self) -> Vec<String> {
        self.open.iter().cloned().collect()
    }

    fn close_all_ports(&mut self) -> Result<(), TransportError> {
        self.open.clear();
        self.closes += 1;
        Ok(())
    }

    fn device_types(&mut self, port: &str) -> Result<DeviceTypeTable, TransportError> {
        let fail = |result| TransportError::Register {
            port: port.to_string(),
            module_address: 0,
            register: DEVICE_TYPE_REGISTER,
            result,
        };
        let mock_port = self
            .ports
            .get(port)
            .ok_or_else(|| fail(RegisterResult::PortNotFound))?;
        if mock_port.dead {
            return Err(fail(RegisterResult::Timeout));
        }
        let mut table = DeviceTypeTable::empty();
        for (address, module) in &mock_port.modules {
            table.set(*address, module.device_type);
        }
        Ok(table)
    }

    fn register_read(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
    ) -> Result<Vec<u8>, TransportError> {
        self.calls.push(MockCall::Read {
            port: port.to_string(),
            module_address,
            register,
        });
        let module = self.module(port, module_address, register)?;
        module
            .registers
            .get(&register)
            .cloned()
            .ok_or_else(|| TransportError::Register {
                port: port.to_string(),
                module_address,
                register,
                result: RegisterResult::RegisterNotFound,
            })
    }

    fn register_write(
        &mut self,
        port: &str,
        module_address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.calls.push(MockCall::Write {
            port: port.to_string(),
            module_address,
            register,
            data: data.to_vec(),
        });
        let module = self.module(port, module_address, register)?;
        module.registers.insert(register, data.to_vec());
        Ok(())
    }
}
