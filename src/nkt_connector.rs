use std::fmt;

use crate::nkt_module::Bus;
use crate::register_transport::{DeviceTypeTable, RegisterTransport};

/// A kind of NKT module: where it sits on the bus and what type byte it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleClass {
    pub name: &'static str,
    pub module_address: u8,
    pub device_type: u8,
}

impl ModuleClass {
    pub const FIANIUM: Self = Self::new("SuperK Fianium", 15, 0x88);
    pub const RF_DRIVER: Self = Self::new("RF driver", 16, 0x66);
    pub const SELECT: Self = Self::new("SuperK Select", 18, 0x67);

    pub const fn new(name: &'static str, module_address: u8, device_type: u8) -> Self {
        Self {
            name,
            module_address,
            device_type,
        }
    }

    pub fn matches(&self, table: &DeviceTypeTable) -> bool {
        table.get(self.module_address) == self.device_type
    }
}

impl fmt::Display for ModuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (type 0x{:02X} at address {})",
            self.name, self.device_type, self.module_address
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error(
        "Multiple {module} modules found: port 1 = {first}, port 2 = {second}. \
         Please specify the port explicitly to avoid the conflict"
    )]
    Ambiguous {
        module: &'static str,
        first: String,
        second: String,
    },
}

/// Where one module lives. Fixed for the lifetime of the facade using it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSession {
    class: ModuleClass,
    port: Option<String>,
}

impl ModuleSession {
    pub fn bound(class: ModuleClass, port: impl Into<String>) -> Self {
        Self {
            class,
            port: Some(port.into()),
        }
    }

    pub fn unbound(class: ModuleClass) -> Self {
        Self { class, port: None }
    }

    pub fn class(&self) -> &ModuleClass {
        &self.class
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn module_address(&self) -> u8 {
        self.class.module_address
    }

    pub fn device_type(&self) -> u8 {
        self.class.device_type
    }

    pub fn is_bound(&self) -> bool {
        self.port.is_some()
    }
}

/// Pick the single port whose device-type table holds `class` at its address.
pub fn match_device<I>(tables: I, class: &ModuleClass) -> Result<Option<String>, DiscoveryError>
where
    I: IntoIterator<Item = (String, DeviceTypeTable)>,
{
    let mut found: Option<String> = None;
    for (port, table) in tables {
        if !class.matches(&table) {
            continue;
        }
        if let Some(first) = found {
            return Err(DiscoveryError::Ambiguous {
                module: class.name,
                first,
                second: port,
            });
        }
        found = Some(port);
    }
    Ok(found)
}

/// Ports opened for a discovery scan. Dropping the scan closes them again.
pub struct PortScan<'a, T: RegisterTransport> {
    transport: &'a mut T,
}

impl<'a, T: RegisterTransport> PortScan<'a, T> {
    pub fn open(transport: &'a mut T) -> Self {
        let ports = match transport.available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                log::warn!("Could not enumerate ports: {}", e);
                Vec::new()
            }
        };
        if let Err(e) = transport.open_ports(&ports) {
            log::warn!("Could not open ports for discovery: {}", e);
        }
        Self { transport }
    }

    /// Device-type tables of every open port. Ports that fail to answer are skipped.
    pub fn tables(&mut self) -> impl Iterator<Item = (String, DeviceTypeTable)> + '_ {
        let transport = &mut *self.transport;
        let ports = transport.open_port_names();
        ports
            .into_iter()
            .filter_map(move |port| match transport.device_types(&port) {
                Ok(table) => Some((port, table)),
                Err(e) => {
                    log::warn!("Skipping port {} during discovery: {}", port, e);
                    None
                }
            })
    }
}

impl<T: RegisterTransport> Drop for PortScan<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.close_all_ports() {
            log::warn!("Failed to close ports after discovery: {}", e);
        }
    }
}

/// Scan every available port for `class`.
#[tracing::instrument(skip(transport), fields(module = class.name))]
pub fn discover<T: RegisterTransport>(
    transport: &mut T,
    class: &ModuleClass,
) -> Result<Option<String>, DiscoveryError> {
    let mut scan = PortScan::open(transport);
    let found = match_device(scan.tables(), class);
    drop(scan);
    found
}

pub struct NktConnector;

impl NktConnector {
    /// Bind a session for `class`, either to `port` or to whatever discovery finds.
    pub fn connect<T: RegisterTransport>(
        bus: &Bus<T>,
        class: ModuleClass,
        port: Option<&str>,
    ) -> Result<ModuleSession, DiscoveryError> {
        if let Some(port) = port {
            log::debug!("Using {} on port {}", class.name, port);
            return Ok(ModuleSession::bound(class, port));
        }

        log::debug!("Searching for connected {}", class.name);
        let found = discover(&mut *bus.lock(), &class)?;
        match found {
            Some(port) => {
                log::info!("Found {} on {}", class, port);
                Ok(ModuleSession::bound(class, port))
            }
            None => {
                log::warn!("No {} found", class.name);
                Ok(ModuleSession::unbound(class))
            }
        }
    }
}
