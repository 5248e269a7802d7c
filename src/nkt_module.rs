use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::nkt_connector::ModuleSession;
use crate::register_transport::{RegisterTransport, TransportError};
use crate::units::ValidationError;

/// Shared handle to one transport.
///
/// All modules on a bus go through the same lock, so a request and its reply
/// are never interleaved with another module's traffic.
pub struct Bus<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RegisterTransport> Bus<T> {
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
        }
    }

    /// Exclusive access to the transport. A poisoned lock is recovered,
    /// since the transport holds no invariant a panicking caller could break.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("No {module} bound to a port. Connect the module or pass its port explicitly")]
    Unbound { module: &'static str },
}

/// Typed register access for one bound module.
pub struct RegisterModule<T> {
    bus: Bus<T>,
    session: ModuleSession,
}

impl<T: RegisterTransport> RegisterModule<T> {
    pub fn new(bus: Bus<T>, session: ModuleSession) -> Self {
        Self { bus, session }
    }

    pub fn session(&self) -> &ModuleSession {
        &self.session
    }

    pub fn bus(&self) -> &Bus<T> {
        &self.bus
    }

    fn access<R>(
        &self,
        register: u8,
        op: impl FnOnce(&mut T, &str, u8) -> Result<R, TransportError>,
    ) -> Result<R, ModuleError> {
        let port = self.session.port().ok_or(ModuleError::Unbound {
            module: self.session.class().name,
        })?;
        let address = self.session.module_address();
        let result = op(&mut *self.bus.lock(), port, address);
        if let Err(e) = &result {
            log::debug!(
                "{} register 0x{:02X} access failed: {}",
                self.session.class().name,
                register,
                e
            );
        }
        Ok(result?)
    }

    pub fn read_raw(&self, register: u8) -> Result<Vec<u8>, ModuleError> {
        self.access(register, |t, port, address| t.register_read(port, address, register))
    }

    pub fn read_u8(&self, register: u8) -> Result<u8, ModuleError> {
        self.access(register, |t, port, address| t.read_u8(port, address, register))
    }

    pub fn read_u16(&self, register: u8) -> Result<u16, ModuleError> {
        self.access(register, |t, port, address| t.read_u16(port, address, register))
    }

    pub fn read_s16(&self, register: u8) -> Result<i16, ModuleError> {
        self.access(register, |t, port, address| t.read_s16(port, address, register))
    }

    pub fn read_u32(&self, register: u8) -> Result<u32, ModuleError> {
        self.access(register, |t, port, address| t.read_u32(port, address, register))
    }

    pub fn write_u8(&self, register: u8, value: u8) -> Result<(), ModuleError> {
        self.access(register, |t, port, address| t.write_u8(port, address, register, value))
    }

    pub fn write_u16(&self, register: u8, value: u16) -> Result<(), ModuleError> {
        self.access(register, |t, port, address| {
            t.write_u16(port, address, register, value)
        })
    }

    pub fn write_u32(&self, register: u8, value: u32) -> Result<(), ModuleError> {
        self.access(register, |t, port, address| {
            t.write_u32(port, address, register, value)
        })
    }
}
