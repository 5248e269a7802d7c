//! SuperK Select acousto-optic tunable filter (module address 18, type 0x67).

use std::fmt;

use crate::nkt_connector::{DiscoveryError, ModuleClass, ModuleSession, NktConnector};
use crate::nkt_module::{Bus, ModuleError, RegisterModule};
use crate::register_transport::RegisterTransport;
use crate::rf_driver::{RfDriver, WavelengthRange};
use crate::units;

const RF_SWITCH: u8 = 0x34;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crystal {
    First,
    Second,
}

impl Crystal {
    fn range_registers(self) -> (u8, u8) {
        match self {
            Self::First => (0x90, 0x91),
            Self::Second => (0xA0, 0xA1),
        }
    }
}

/// Routing of the two RF connections to the crystals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfSwitch {
    Normal,
    Swapped,
    Unknown(u8),
}

impl RfSwitch {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Normal,
            1 => Self::Swapped,
            other => {
                log::warn!("Unknown RF switch setting detected (code {})", other);
                Self::Unknown(other)
            }
        }
    }
}

impl fmt::Display for RfSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal operation"),
            Self::Swapped => write!(f, "Swapped crystal connections"),
            Self::Unknown(code) => write!(f, "Unknown switch setting ({})", code),
        }
    }
}

pub struct Select<T> {
    module: RegisterModule<T>,
}

impl<T: RegisterTransport> Select<T> {
    pub fn connect(bus: &Bus<T>, port: Option<&str>) -> Result<Self, DiscoveryError> {
        let session = NktConnector::connect(bus, ModuleClass::SELECT, port)?;
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

    /// Usable wavelength window of one of the two crystals.
    pub fn crystal_range(&self, crystal: Crystal) -> Result<WavelengthRange, ModuleError> {
        let (min, max) = crystal.range_registers();
        Ok(WavelengthRange {
            min_nm: units::nanometres_from_picometres(self.module.read_u32(min)?),
            max_nm: units::nanometres_from_picometres(self.module.read_u32(max)?),
        })
    }

    pub fn rf_switch(&self) -> Result<RfSwitch, ModuleError> {
        Ok(RfSwitch::from_code(self.module.read_u8(RF_SWITCH)?))
    }

    /// Route the RF connections. The RF driver should be off while switching.
    pub fn set_rf_switch(&self, swapped: bool) -> Result<(), ModuleError> {
        log::info!("RF driver must be off while the RF switch changes");
        if swapped {
            log::info!("Switching RF connection");
        } else {
            log::info!("Setting to normal operation");
        }
        self.module.write_u8(RF_SWITCH, u8::from(swapped))
    }

    /// Route the RF driver to a crystal whose window covers `from_nm ..= to_nm`.
    ///
    /// The RF driver is turned off first and stays off. Normal routing is tried
    /// before the swapped one. When neither crystal covers the range the switch
    /// is put back to normal and `None` is returned.
    pub fn route_for_range(
        &self,
        rf: &RfDriver<T>,
        from_nm: f64,
        to_nm: f64,
    ) -> Result<Option<WavelengthRange>, ModuleError> {
        rf.set_rf_power(false)?;
        self.set_rf_switch(false)?;

        let range = rf.crystal_range()?;
        if range.covers(from_nm, to_nm) {
            log::info!("{} nm - {} nm is within the current crystal ({})", from_nm, to_nm, range);
            return Ok(Some(range));
        }

        log::info!("{} nm - {} nm is outside {}. Switching crystals", from_nm, to_nm, range);
        self.set_rf_switch(true)?;
        let range = rf.crystal_range()?;
        if range.covers(from_nm, to_nm) {
            return Ok(Some(range));
        }

        log::warn!("{} nm - {} nm is outside both crystals", from_nm, to_nm);
        self.set_rf_switch(false)?;
        Ok(None)
    }
}
