//! RF driver for the SuperK Select (module address 16, type 0x66).

use std::fmt;

use crate::nkt_connector::{DiscoveryError, ModuleClass, ModuleSession, NktConnector};
use crate::nkt_module::{Bus, ModuleError, RegisterModule};
use crate::register_transport::{RegisterTransport, TransportError};
use crate::units::{self, ValidationError};

const RF_POWER: u8 = 0x30;
const SETUP_BITS: u8 = 0x31;
const MIN_WAVELENGTH: u8 = 0x34;
const MAX_WAVELENGTH: u8 = 0x35;
const CRYSTAL_TEMPERATURE: u8 = 0x38;
const CONNECTED_CRYSTAL: u8 = 0x75;
const WAVELENGTH_BASE: u8 = 0x90;
const AMPLITUDE_BASE: u8 = 0xB0;

/// One of the eight RF channels, numbered 1 to 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    pub const COUNT: u8 = 8;

    pub fn new(number: u8) -> Result<Self, ValidationError> {
        if (1..=Self::COUNT).contains(&number) {
            Ok(Self(number))
        } else {
            Err(ValidationError::InvalidChannel(number))
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (1..=Self::COUNT).map(Self)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn wavelength_register(self) -> u8 {
        WAVELENGTH_BASE + self.0 - 1
    }

    pub fn amplitude_register(self) -> u8 {
        AMPLITUDE_BASE + self.0 - 1
    }
}

impl TryFrom<u8> for Channel {
    type Error = ValidationError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::new(number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfPower {
    Off,
    On,
    Unknown(u8),
}

impl RfPower {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Off,
            1 => Self::On,
            other => {
                log::warn!("Unknown RF power state detected (code {})", other);
                Self::Unknown(other)
            }
        }
    }
}

impl fmt::Display for RfPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "RF driver is off"),
            Self::On => write!(f, "RF driver is on"),
            Self::Unknown(code) => write!(f, "RF driver state unknown ({})", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfSetupBits(pub u8);

impl RfSetupBits {
    /// Output compensated for filter temperature.
    pub fn temperature_compensation(self) -> bool {
        self.0 & 0b001 != 0
    }

    pub fn optimal_power_table(self) -> bool {
        self.0 & 0b010 != 0
    }

    /// Blanking level forced high without an input signal.
    pub fn blanking_level(self) -> bool {
        self.0 & 0b100 != 0
    }
}

/// Usable wavelength window of a crystal, in nanometres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavelengthRange {
    pub min_nm: f64,
    pub max_nm: f64,
}

impl WavelengthRange {
    pub fn contains(&self, nanometres: f64) -> bool {
        (self.min_nm..=self.max_nm).contains(&nanometres)
    }

    /// Whether a whole sweep from `from_nm` to `to_nm` fits the window.
    pub fn covers(&self, from_nm: f64, to_nm: f64) -> bool {
        self.contains(from_nm) && self.contains(to_nm)
    }
}

impl fmt::Display for WavelengthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} nm - {:.1} nm", self.min_nm, self.max_nm)
    }
}

pub struct RfDriver<T> {
    module: RegisterModule<T>,
}

impl<T: RegisterTransport> RfDriver<T> {
    pub fn connect(bus: &Bus<T>, port: Option<&str>) -> Result<Self, DiscoveryError> {
        let session = NktConnector::connect(bus, ModuleClass::RF_DRIVER, port)?;
        Ok(Self::from_session(bus.clone(), session))
    }

    pub fn from_session(bus: Bus<T>, session: ModuleSession) -> Self {
        Self {
            module: RegisterModule::new(bus, session),
        }
    }

    pub fn session(&self) -> &ModuleSession {
        self.module.session()
    }

    pub fn rf_power(&self) -> Result<RfPower, ModuleError> {
        Ok(RfPower::from_code(self.module.read_u8(RF_POWER)?))
    }

    pub fn set_rf_power(&self, on: bool) -> Result<(), ModuleError> {
        log::info!("RF driver {}", if on { "on" } else { "off" });
        self.module.write_u8(RF_POWER, u8::from(on))
    }

    pub fn setup_bits(&self) -> Result<RfSetupBits, ModuleError> {
        let reading = self.module.read_raw(SETUP_BITS)?;
        let bits = reading.first().copied().ok_or(TransportError::ShortPayload {
            register: SETUP_BITS,
            expected: 1,
            actual: 0,
        })?;
        Ok(RfSetupBits(bits))
    }

    pub fn min_wavelength(&self) -> Result<f64, ModuleError> {
        Ok(units::nanometres_from_picometres(self.module.read_u32(MIN_WAVELENGTH)?))
    }

    pub fn max_wavelength(&self) -> Result<f64, ModuleError> {
        Ok(units::nanometres_from_picometres(self.module.read_u32(MAX_WAVELENGTH)?))
    }

    /// Usable window of the crystal currently connected.
    pub fn crystal_range(&self) -> Result<WavelengthRange, ModuleError> {
        Ok(WavelengthRange {
            min_nm: self.min_wavelength()?,
            max_nm: self.max_wavelength()?,
        })
    }

    /// Crystal temperature in degrees Celsius.
    pub fn crystal_temperature(&self) -> Result<f64, ModuleError> {
        Ok(units::celsius_from_decidegrees(self.module.read_s16(CRYSTAL_TEMPERATURE)?))
    }

    /// Index of the connected crystal, `None` if no crystal is connected.
    ///
    /// Crystals are numbered across Select modules in bus-address order, two
    /// per module.
    pub fn connected_crystal(&self) -> Result<Option<u8>, ModuleError> {
        let index = self.module.read_u8(CONNECTED_CRYSTAL)?;
        Ok((index != 0).then_some(index))
    }

    pub fn wavelength_channel(&self, channel: u8) -> Result<f64, ModuleError> {
        let channel = Channel::new(channel)?;
        Ok(units::nanometres_from_picometres(
            self.module.read_u32(channel.wavelength_register())?,
        ))
    }

    pub fn set_wavelength_channel(&self, channel: u8, nanometres: f64) -> Result<(), ModuleError> {
        let channel = Channel::new(channel)?;
        let raw = units::picometres_from_nanometres(nanometres)?;
        log::debug!("Setting wavelength for channel {} to {} nm", channel.number(), nanometres);
        self.module.write_u32(channel.wavelength_register(), raw)
    }

    /// Channel amplitude in percent.
    pub fn amplitude_channel(&self, channel: u8) -> Result<f64, ModuleError> {
        let channel = Channel::new(channel)?;
        Ok(units::percent_from_permille(
            self.module.read_u16(channel.amplitude_register())?,
        ))
    }

    pub fn set_amplitude_channel(&self, channel: u8, percent: f64) -> Result<(), ModuleError> {
        let channel = Channel::new(channel)?;
        let raw = units::permille_from_percent("Amplitude (%)", percent)?;
        log::debug!("Setting amplitude for channel {} to {} %", channel.number(), percent);
        self.module.write_u16(channel.amplitude_register(), raw)
    }
}
