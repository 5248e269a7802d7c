//! SuperK Fianium supercontinuum laser (module address 15, type 0x88).
//!
//! Every getter reads the module; nothing is cached here. Wrap values in
//! [`crate::observed::Observed`] where a last-known reading is wanted.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use crate::nkt_connector::{DiscoveryError, ModuleClass, ModuleSession, NktConnector};
use crate::nkt_module::{Bus, ModuleError, RegisterModule};
use crate::register_transport::{RegisterTransport, TransportError};
use crate::units::{self, ValidationError};

const EMISSION: u8 = 0x30;
const SETUP: u8 = 0x31;
const INTERLOCK: u8 = 0x32;
const PULSE_PICKER_RATIO: u8 = 0x34;
const WATCHDOG_INTERVAL: u8 = 0x36;
const POWER_LEVEL: u8 = 0x37;
const NIM_DELAY: u8 = 0x39;
const SYSTEM_STATUS: u8 = 0x66;

const EMISSION_ON: u8 = 3;
const EMISSION_OFF: u8 = 0;

pub const SAFETY_WARNING: &str = "Ensure laser safety goggles are on";

/// Hook that shows the safety warning to whoever is operating the laser.
pub type SafetyNotice = Box<dyn Fn(&str) + Send + Sync>;

fn write_safety_notice(out: &mut impl Write, message: &str) -> std::io::Result<()> {
    writeln!(out, "WARNING: {}", message)?;
    out.flush()
}

/// Shown on stderr regardless of how logging is set up, and logged as well.
fn default_safety_notice(message: &str) {
    log::warn!("{}", message);
    if let Err(e) = write_safety_notice(&mut std::io::stderr().lock(), message) {
        log::error!("Could not show safety warning on stderr: {}", e);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionState {
    Off,
    On,
    /// A code the firmware reported that has no documented meaning.
    Unknown(u8),
}

impl EmissionState {
    pub fn from_code(code: u8) -> Self {
        match code {
            EMISSION_ON => Self::On,
            EMISSION_OFF => Self::Off,
            other => {
                log::warn!("Unknown emission state detected (code {})", other);
                Self::Unknown(other)
            }
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl fmt::Display for EmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::On => write!(f, "on"),
            Self::Unknown(code) => write!(f, "unknown ({})", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupMode {
    InternalPowerControl,
    /// Power lock
    ExternalFeedback,
    Unknown(u16),
}

impl SetupMode {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::InternalPowerControl,
            4 => Self::ExternalFeedback,
            other => {
                log::warn!("Unknown setup mode detected (code {})", other);
                Self::Unknown(other)
            }
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::InternalPowerControl => 0,
            Self::ExternalFeedback => 4,
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for SetupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InternalPowerControl => write!(f, "Internal power control mode"),
            Self::ExternalFeedback => write!(f, "External feedback mode (Power Lock)"),
            Self::Unknown(code) => write!(f, "Unknown setup mode ({})", code),
        }
    }
}

/// Where the interlock circuit is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockReason {
    CircuitOpen,
    FrontPanelKeySwitch,
    DoorSwitch,
    ExternalModule,
    Application,
    InternalModule,
    PowerFailure,
    DisabledByLightSource,
    CircuitFailure,
    Unknown(u8),
}

impl InterlockReason {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::CircuitOpen,
            1 => Self::FrontPanelKeySwitch,
            2 => Self::DoorSwitch,
            3 => Self::ExternalModule,
            4 => Self::Application,
            5 => Self::InternalModule,
            6 => Self::PowerFailure,
            7 => Self::DisabledByLightSource,
            255 => Self::CircuitFailure,
            other => Self::Unknown(other),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::CircuitOpen => "Interlock off (interlock circuit open)",
            Self::FrontPanelKeySwitch => "Front panel interlock/key switch off",
            Self::DoorSwitch => "Door switch open",
            Self::ExternalModule => "External module interlock",
            Self::Application => "Application interlock",
            Self::InternalModule => "Internal module interlock",
            Self::PowerFailure => "Interlock power failure",
            Self::DisabledByLightSource => "Interlock disabled by light source",
            Self::CircuitFailure => "Interlock circuit failure",
            Self::Unknown(_) => "Unknown interlock reason",
        }
    }
}

impl fmt::Display for InterlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockStatus {
    Interlocked(InterlockReason),
    WaitingForReset,
    Ok,
    Unknown { low: u8, high: u8 },
}

impl InterlockStatus {
    /// Decode the two interlock bytes. The reason byte only means something
    /// while the circuit is open.
    pub fn decode(low: u8, high: u8) -> Self {
        match low {
            0 => Self::Interlocked(InterlockReason::from_code(high)),
            1 => Self::WaitingForReset,
            2 => Self::Ok,
            _ => {
                log::warn!("Unknown interlock state detected ({}, {})", low, high);
                Self::Unknown { low, high }
            }
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for InterlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interlocked(reason) => write!(f, "Interlocked: {}", reason),
            Self::WaitingForReset => write!(f, "Waiting for interlock reset"),
            Self::Ok => write!(f, "Interlock is OK"),
            Self::Unknown { low, high } => write!(f, "Unknown interlock state ({}, {})", low, high),
        }
    }
}

const STATUS_MESSAGES: [&str; 16] = [
    "Emission on",
    "Interlock relays off",
    "Interlock supply voltage low (possible short circuit)",
    "Interlock loop open",
    "Output Control signal low",
    "Supply voltage low",
    "Internal temperature out of range",
    "Clock battery low voltage",
    "Date/time not set",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "CRC error on startup (possible module address conflict)",
    "Log error code present",
    "System error code present",
];

/// The 16-bit system status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemStatus(pub u16);

impl SystemStatus {
    pub fn is_set(self, bit: u8) -> bool {
        bit < 16 && self.0 & (1 << bit) != 0
    }

    /// One message per set bit, lowest bit first.
    pub fn messages(self) -> impl Iterator<Item = &'static str> {
        (0..16u8)
            .filter(move |bit| self.is_set(*bit))
            .map(|bit| STATUS_MESSAGES[usize::from(bit)])
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018b}", self.0)?;
        for message in self.messages() {
            write!(f, "\n  {}", message)?;
        }
        Ok(())
    }
}

/// Best-effort reading of the main laser settings. Fields that could not be
/// read are `None`; the failure has already been logged.
#[derive(Debug, Clone, PartialEq)]
pub struct LaserSnapshot {
    pub emission: Option<EmissionState>,
    pub setup: Option<SetupMode>,
    pub interlock: Option<InterlockStatus>,
    pub power_percent: Option<f64>,
}

impl fmt::Display for LaserSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field<T: fmt::Display>(value: Option<&T>) -> String {
            value.map_or_else(|| "unavailable".to_string(), ToString::to_string)
        }
        writeln!(f, "Emission state = {}", field(self.emission.as_ref()))?;
        writeln!(f, "Setup status = {}", field(self.setup.as_ref()))?;
        writeln!(f, "Interlock status = {}", field(self.interlock.as_ref()))?;
        write!(f, "Power level = {} %", field(self.power_percent.as_ref()))
    }
}

fn best_effort<T>(what: &str, result: Result<T, ModuleError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Could not read {}: {}", what, e);
            None
        }
    }
}

pub struct Fianium<T> {
    module: RegisterModule<T>,
    safety_notice: SafetyNotice,
}

impl<T: RegisterTransport> Fianium<T> {
    /// Connect to the laser on `port`, or search every port when `None`.
    ///
    /// Fails if more than one laser is found. If none is found the laser is
    /// returned unbound and every register access reports
    /// [`ModuleError::Unbound`].
    pub fn connect(bus: &Bus<T>, port: Option<&str>) -> Result<Self, DiscoveryError> {
        let session = NktConnector::connect(bus, ModuleClass::FIANIUM, port)?;
        Ok(Self::from_session(bus.clone(), session))
    }

    pub fn from_session(bus: Bus<T>, session: ModuleSession) -> Self {
        Self {
            module: RegisterModule::new(bus, session),
            safety_notice: Box::new(default_safety_notice),
        }
    }

    /// Replace how the safety warning is shown before emission is turned on.
    #[must_use]
    pub fn with_safety_notice(mut self, notice: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.safety_notice = Box::new(notice);
        self
    }

    pub fn session(&self) -> &ModuleSession {
        self.module.session()
    }

    pub fn emission_state(&self) -> Result<EmissionState, ModuleError> {
        Ok(EmissionState::from_code(self.module.read_u8(EMISSION)?))
    }

    /// Turn emission on or off. Turning it on always shows the safety warning first.
    pub fn set_emission(&self, on: bool) -> Result<(), ModuleError> {
        if on {
            (self.safety_notice)(SAFETY_WARNING);
            self.module.write_u8(EMISSION, EMISSION_ON)
        } else {
            log::info!("Laser off");
            self.module.write_u8(EMISSION, EMISSION_OFF)
        }
    }

    pub fn setup_status(&self) -> Result<SetupMode, ModuleError> {
        Ok(SetupMode::from_code(self.module.read_u16(SETUP)?))
    }

    pub fn set_mode(&self, mode: SetupMode) -> Result<(), ModuleError> {
        if let SetupMode::Unknown(code) = mode {
            return Err(ValidationError::OutOfRange {
                quantity: "Setup mode",
                value: f64::from(code),
                min: 0.0,
                max: 4.0,
            }
            .into());
        }
        self.module.write_u16(SETUP, mode.code())?;
        log::info!("Mode set to: {}", mode);
        Ok(())
    }

    pub fn interlock_status(&self) -> Result<InterlockStatus, ModuleError> {
        let reading = self.module.read_raw(INTERLOCK)?;
        match reading.as_slice() {
            [low, high, ..] => Ok(InterlockStatus::decode(*low, *high)),
            _ => Err(TransportError::ShortPayload {
                register: INTERLOCK,
                expected: 2,
                actual: reading.len(),
            }
            .into()),
        }
    }

    /// Pulse picker divide ratio. The module answers with one byte for ratios
    /// below 256 and two bytes otherwise.
    pub fn pulse_picker_ratio(&self) -> Result<u16, ModuleError> {
        let reading = self.module.read_raw(PULSE_PICKER_RATIO)?;
        match reading.as_slice() {
            [low] => Ok(u16::from(*low)),
            [low, high, ..] => Ok(u16::from_le_bytes([*low, *high])),
            [] => Err(TransportError::ShortPayload {
                register: PULSE_PICKER_RATIO,
                expected: 1,
                actual: 0,
            }
            .into()),
        }
    }

    pub fn set_pulse_picker_ratio(&self, ratio: u16) -> Result<(), ModuleError> {
        self.module.write_u16(PULSE_PICKER_RATIO, ratio)
    }

    /// Communication loss tolerated before emission shuts off. `None` when disabled.
    pub fn watchdog_interval(&self) -> Result<Option<Duration>, ModuleError> {
        let seconds = self.module.read_u8(WATCHDOG_INTERVAL)?;
        Ok((seconds != 0).then(|| Duration::from_secs(u64::from(seconds))))
    }

    /// Whole seconds up to 255; `None` disables the watchdog.
    pub fn set_watchdog_interval(&self, interval: Option<Duration>) -> Result<(), ModuleError> {
        let seconds = interval.map_or(0, |d| d.as_secs());
        let whole = interval.map_or(true, |d| d.subsec_nanos() == 0);
        if seconds > u64::from(u8::MAX) || !whole {
            return Err(ValidationError::OutOfRange {
                quantity: "Watchdog interval (whole s)",
                value: interval.map_or(0.0, |d| d.as_secs_f64()),
                min: 0.0,
                max: f64::from(u8::MAX),
            }
            .into());
        }
        self.module.write_u8(WATCHDOG_INTERVAL, seconds as u8)
    }

    /// Power setpoint in percent, 0.1 % resolution.
    pub fn power_level(&self) -> Result<f64, ModuleError> {
        Ok(units::percent_from_permille(self.module.read_u16(POWER_LEVEL)?))
    }

    /// Set the power setpoint in percent (0 to 100).
    ///
    /// An out-of-range value turns emission off and the setpoint to zero
    /// before the validation error is returned.
    pub fn set_power(&self, percent: f64) -> Result<(), ModuleError> {
        match units::permille_from_percent("Power (%)", percent) {
            Ok(raw) => self.module.write_u16(POWER_LEVEL, raw),
            Err(e) => {
                log::warn!("{}. Setting output to 0", e);
                if let Err(off) = self.set_emission(false) {
                    log::error!("Could not turn emission off: {}", off);
                }
                if let Err(zero) = self.module.write_u16(POWER_LEVEL, 0) {
                    log::error!("Could not set power to 0: {}", zero);
                }
                Err(e.into())
            }
        }
    }

    /// NIM trigger delay in seconds.
    pub fn nim_delay(&self) -> Result<f64, ModuleError> {
        Ok(units::seconds_from_nim_steps(self.module.read_u16(NIM_DELAY)?))
    }

    /// Set the NIM trigger delay, 0 to 9.207 ns in 9 ps steps.
    pub fn set_nim_delay(&self, seconds: f64) -> Result<(), ModuleError> {
        let steps = units::nim_steps_from_seconds(seconds)?;
        self.module.write_u16(NIM_DELAY, steps)
    }

    pub fn system_status(&self) -> Result<SystemStatus, ModuleError> {
        let status = SystemStatus(self.module.read_u16(SYSTEM_STATUS)?);
        for message in status.messages() {
            log::debug!("Fianium status: {}", message);
        }
        Ok(status)
    }

    /// Read emission, setup, interlock and power, carrying on past failures.
    pub fn snapshot(&self) -> LaserSnapshot {
        LaserSnapshot {
            emission: best_effort("emission state", self.emission_state()),
            setup: best_effort("setup status", self.setup_status()),
            interlock: best_effort("interlock status", self.interlock_status()),
            power_percent: best_effort("power level", self.power_level()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_capture;
    use crate::mock::{MockCall, MockTransport};
    use crate::register_transport::RegisterResult;
    use log::Level;
    use std::sync::{Arc, Mutex};

    fn laser_with(mock: MockTransport) -> (Bus<MockTransport>, Fianium<MockTransport>) {
        let bus = Bus::new(mock.with_module("COM3", 15, 0x88));
        let laser = Fianium::connect(&bus, None).unwrap();
        (bus, laser)
    }

    #[test]
    fn test_connect_finds_laser() {
        let (_, laser) = laser_with(MockTransport::new().with_module("COM4", 18, 0x67));
        assert_eq!(laser.session().port(), Some("COM3"));
        assert_eq!(laser.session().module_address(), 15);
    }

    #[test]
    fn test_emission_state_decoding() {
        assert_eq!(EmissionState::from_code(3), EmissionState::On);
        assert_eq!(EmissionState::from_code(0), EmissionState::Off);
        assert_eq!(EmissionState::from_code(1), EmissionState::Unknown(1));

        let (bus, laser) = laser_with(MockTransport::new());
        bus.lock().set_register("COM3", 15, 0x30, &[7]);
        assert_eq!(laser.emission_state().unwrap(), EmissionState::Unknown(7));
    }

    #[test]
    fn test_unknown_emission_state_logs_warning() {
        let logs = log_capture::capture();
        assert_eq!(EmissionState::from_code(5), EmissionState::Unknown(5));
        assert!(logs.contains(Level::Warn, "Unknown emission state detected (code 5)"));
        assert_eq!(EmissionState::from_code(3), EmissionState::On);
        assert!(!logs.contains(Level::Warn, "(code 3)"));
    }

    #[test]
    fn test_safety_notice_text_is_written_out() {
        let mut shown = Vec::new();
        write_safety_notice(&mut shown, SAFETY_WARNING).unwrap();
        assert_eq!(
            String::from_utf8(shown).unwrap(),
            "WARNING: Ensure laser safety goggles are on\n"
        );
    }

    #[test]
    fn test_default_safety_notice_runs_on_emission_on() {
        let (bus, laser) = laser_with(MockTransport::new());
        let logs = log_capture::capture();

        laser.set_emission(true).unwrap();
        assert!(logs.contains(Level::Warn, SAFETY_WARNING));
        assert_eq!(bus.lock().register("COM3", 15, 0x30), Some(&[3u8][..]));
    }

    #[test]
    fn test_safety_notice_precedes_emission_on() {
        let (bus, laser) = laser_with(MockTransport::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe_bus = bus.clone();
        let record = Arc::clone(&seen);
        let laser = laser.with_safety_notice(move |message| {
            let writes = probe_bus.lock().writes().count();
            record.lock().unwrap().push((message.to_string(), writes));
        });

        laser.set_emission(true).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(SAFETY_WARNING.to_string(), 0)]
        );
        assert_eq!(bus.lock().register("COM3", 15, 0x30), Some(&[3u8][..]));

        laser.set_emission(false).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(bus.lock().register("COM3", 15, 0x30), Some(&[0u8][..]));
    }

    #[test]
    fn test_power_round_trip() {
        let (_, laser) = laser_with(MockTransport::new());
        for percent in [0.0, 0.1, 12.5, 50.0, 99.9, 100.0] {
            laser.set_power(percent).unwrap();
            assert!((laser.power_level().unwrap() - percent).abs() < 0.05);
        }
    }

    #[test]
    fn test_out_of_range_power_forces_safe_state() {
        let (bus, laser) = laser_with(MockTransport::new());
        laser.set_power(80.0).unwrap();
        bus.lock().set_register("COM3", 15, 0x30, &[3]);
        bus.lock().clear_calls();

        let err = laser.set_power(120.0).unwrap_err();
        assert!(matches!(err, ModuleError::Validation(ValidationError::OutOfRange { .. })));

        let transport = bus.lock();
        assert_eq!(transport.register("COM3", 15, 0x30), Some(&[0u8][..]));
        assert_eq!(transport.register("COM3", 15, 0x37), Some(&[0u8, 0][..]));
        // nothing but the fallback writes went out
        let writes: Vec<_> = transport.writes().cloned().collect();
        assert_eq!(
            writes,
            vec![
                MockCall::Write {
                    port: "COM3".into(),
                    module_address: 15,
                    register: 0x30,
                    data: vec![0]
                },
                MockCall::Write {
                    port: "COM3".into(),
                    module_address: 15,
                    register: 0x37,
                    data: vec![0, 0]
                },
            ]
        );
    }

    #[test]
    fn test_interlock_decoding() {
        assert_eq!(
            InterlockStatus::decode(0, 2),
            InterlockStatus::Interlocked(InterlockReason::DoorSwitch)
        );
        assert_eq!(InterlockReason::DoorSwitch.to_string(), "Door switch open");
        assert_eq!(InterlockStatus::decode(1, 5), InterlockStatus::WaitingForReset);
        assert_eq!(InterlockStatus::decode(1, 5).to_string(), "Waiting for interlock reset");
        assert_eq!(InterlockStatus::decode(2, 0), InterlockStatus::Ok);
        assert_eq!(InterlockStatus::decode(2, 0).to_string(), "Interlock is OK");
        assert_eq!(
            InterlockStatus::decode(0, 255),
            InterlockStatus::Interlocked(InterlockReason::CircuitFailure)
        );
        assert_eq!(
            InterlockStatus::decode(9, 0),
            InterlockStatus::Unknown { low: 9, high: 0 }
        );

        let (bus, laser) = laser_with(MockTransport::new());
        bus.lock().set_register("COM3", 15, 0x32, &[0, 1]);
        assert_eq!(
            laser.interlock_status().unwrap().to_string(),
            "Interlocked: Front panel interlock/key switch off"
        );
    }

    #[test]
    fn test_nim_delay() {
        let (bus, laser) = laser_with(MockTransport::new());
        laser.set_nim_delay(9.207e-9).unwrap();
        assert_eq!(bus.lock().register("COM3", 15, 0x39), Some(&1023u16.to_le_bytes()[..]));
        assert!((laser.nim_delay().unwrap() - 9.207e-9).abs() < 1e-15);

        bus.lock().clear_calls();
        assert!(laser.set_nim_delay(1e-8).is_err());
        assert!(laser.set_nim_delay(-1e-12).is_err());
        assert!(bus.lock().calls().is_empty());
    }

    #[test]
    fn test_pulse_picker_ratio_width_follows_value() {
        let (bus, laser) = laser_with(MockTransport::new());
        bus.lock().set_register("COM3", 15, 0x34, &[200]);
        assert_eq!(laser.pulse_picker_ratio().unwrap(), 200);
        bus.lock().set_register("COM3", 15, 0x34, &[0x2C, 0x01]);
        assert_eq!(laser.pulse_picker_ratio().unwrap(), 300);
    }

    #[test]
    fn test_watchdog_interval() {
        let (bus, laser) = laser_with(MockTransport::new());
        laser.set_watchdog_interval(Some(Duration::from_secs(30))).unwrap();
        assert_eq!(laser.watchdog_interval().unwrap(), Some(Duration::from_secs(30)));
        laser.set_watchdog_interval(None).unwrap();
        assert_eq!(laser.watchdog_interval().unwrap(), None);

        bus.lock().clear_calls();
        assert!(laser.set_watchdog_interval(Some(Duration::from_secs(300))).is_err());
        assert!(laser.set_watchdog_interval(Some(Duration::from_millis(1500))).is_err());
        assert!(bus.lock().calls().is_empty());
    }

    #[test]
    fn test_setup_mode() {
        let (bus, laser) = laser_with(MockTransport::new());
        laser.set_mode(SetupMode::ExternalFeedback).unwrap();
        assert_eq!(laser.setup_status().unwrap(), SetupMode::ExternalFeedback);
        assert!(laser.set_mode(SetupMode::Unknown(2)).is_err());
        bus.lock().set_register("COM3", 15, 0x31, &[2, 0]);
        assert_eq!(laser.setup_status().unwrap(), SetupMode::Unknown(2));
    }

    #[test]
    fn test_system_status_messages() {
        let status = SystemStatus(0b1000_0000_0000_1001);
        assert_eq!(
            status.messages().collect::<Vec<_>>(),
            vec!["Emission on", "Interlock loop open", "System error code present"]
        );
        assert!(!status.is_set(1));
        assert_eq!(SystemStatus(0).messages().count(), 0);
    }

    #[test]
    fn test_snapshot_continues_past_failures() {
        let (bus, laser) = laser_with(
            MockTransport::new().with_failure("COM3", 15, 0x31, RegisterResult::Busy),
        );
        {
            let mut transport = bus.lock();
            transport.set_register("COM3", 15, 0x30, &[3]);
            transport.set_register("COM3", 15, 0x32, &[2, 0]);
            transport.set_register("COM3", 15, 0x37, &450u16.to_le_bytes());
        }

        let snapshot = laser.snapshot();
        assert_eq!(snapshot.emission, Some(EmissionState::On));
        assert_eq!(snapshot.setup, None);
        assert_eq!(snapshot.interlock, Some(InterlockStatus::Ok));
        assert_eq!(snapshot.power_percent, Some(45.0));
        assert!(snapshot.to_string().contains("Setup status = unavailable"));
    }

    #[test]
    fn test_unbound_laser_reports_unbound() {
        let bus = Bus::new(MockTransport::new());
        let laser = Fianium::connect(&bus, None).unwrap();
        assert!(!laser.session().is_bound());
        assert!(matches!(laser.power_level(), Err(ModuleError::Unbound { .. })));
        assert!(matches!(
            laser.set_power(150.0),
            Err(ModuleError::Validation(_))
        ));
    }

    #[test]
    fn test_short_interlock_reply_is_an_error() {
        let (bus, laser) = laser_with(MockTransport::new());
        bus.lock().set_register("COM3", 15, 0x32, &[0]);
        assert!(matches!(
            laser.interlock_status(),
            Err(ModuleError::Transport(TransportError::ShortPayload { .. }))
        ));
    }
}
