//! # SuperK RS
//!
//! A Rust library for controlling NKT Photonics SuperK systems over the
//! Interbus register protocol: the Fianium supercontinuum laser, the RF
//! driver and the SuperK Select acousto-optic tunable filter.
//!
//! Each module on the bus is reached through a typed facade that validates
//! every request before it touches the wire and decodes every register into
//! a domain type.
//!
//! ## Features
//!
//! - **Device discovery**: Finds each module by scanning ports for its device type
//! - **Shared bus**: All facades share one serialized transport
//! - **Unit conversions**: Percent, nanometres and seconds instead of raw register counts
//! - **Safety gating**: Emission changes are announced, invalid power forces the laser off
//! - **Simulation**: An in-memory bus for tests and dry runs
//! - **Type safety**: Strong typing and error handling throughout
//!
//! ## Examples
//!
//! ### Laser Connection and Basic Usage
//!
//! ```rust,no_run
//! use superk_rs::{Bus, Fianium, InterbusTerminal, LabConfig};
//!
//! let config = LabConfig::load()?;
//! let bus = Bus::new(InterbusTerminal::new(config.interbus.clone()));
//!
//! // Search every port for the laser
//! let laser = Fianium::connect(&bus, config.ports.fianium.as_deref())?;
//!
//! laser.set_power(50.0)?;
//! laser.set_emission(true)?;
//! println!("{}", laser.snapshot());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Tuning the Select
//!
//! ```rust
//! use superk_rs::mock::MockTransport;
//! use superk_rs::{Bus, RfDriver};
//!
//! let bus = Bus::new(MockTransport::new().with_module("COM4", 16, 0x66));
//! let rf = RfDriver::connect(&bus, None)?;
//!
//! rf.set_amplitude_channel(1, 100.0)?;
//! rf.set_wavelength_channel(1, 632.8)?;
//! assert_eq!(rf.wavelength_channel(1)?, 632.8);
//!
//! // Channels outside 1..=8 are rejected before any bus traffic
//! assert!(rf.set_wavelength_channel(9, 600.0).is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Decoding Status Registers
//!
//! ```rust
//! use superk_rs::fianium::{InterlockReason, InterlockStatus, SystemStatus};
//!
//! let interlock = InterlockStatus::decode(0, 2);
//! assert_eq!(interlock, InterlockStatus::Interlocked(InterlockReason::DoorSwitch));
//!
//! for message in SystemStatus(0b101).messages() {
//!     println!("{}", message);
//! }
//! ```

pub mod apt_packet;
pub mod config;
pub mod fianium;
pub mod interbus;
pub mod interbus_terminal;
#[cfg(test)]
mod log_capture;
pub mod mock;
pub mod nkt_connector;
pub mod nkt_module;
pub mod observed;
pub mod register_transport;
pub mod rf_driver;
pub mod select;
pub mod units;

// Re-export the main types for convenience
pub use register_transport::{DeviceTypeTable, RegisterResult, RegisterTransport, TransportError};

pub use interbus::{Telegram, TelegramError, TelegramType};

pub use interbus_terminal::InterbusTerminal;

pub use nkt_connector::{DiscoveryError, ModuleClass, ModuleSession, NktConnector};

pub use nkt_module::{Bus, ModuleError, RegisterModule};

pub use units::ValidationError;

pub use fianium::{EmissionState, Fianium, InterlockStatus, LaserSnapshot, SetupMode, SystemStatus};

pub use rf_driver::{Channel, RfDriver, RfPower, WavelengthRange};

pub use select::{Crystal, RfSwitch, Select};

pub use observed::{Observed, ObservedCache};

pub use apt_packet::{AptBody, AptError, AptMessage};

pub use config::{ConfigError, InterbusSettings, LabConfig, PortOverrides};
