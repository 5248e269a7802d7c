//! Fixed-point register encodings and their client-side range checks.
//!
//! Every `*_from_*` encoder validates before producing a raw value, so an
//! out-of-range request never reaches the transport.

/// Power and amplitude registers count in tenths of a percent.
pub const PERMILLE_PER_PERCENT: f64 = 10.0;

/// Wavelength registers count in picometres.
pub const PICOMETRES_PER_NANOMETRE: f64 = 1000.0;

/// Average NIM trigger delay step.
pub const NIM_DELAY_STEP_SECONDS: f64 = 9e-12;

pub const NIM_DELAY_MAX_STEPS: u16 = 1023;

/// 1023 steps of 9 ps.
pub const NIM_DELAY_MAX_SECONDS: f64 = 9.207e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{quantity} must be between {min} and {max}, got {value}")]
    OutOfRange {
        quantity: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{quantity} must be a finite number, got {value}")]
    NotFinite { quantity: &'static str, value: f64 },

    #[error("Invalid channel number {0}. Must be between 1 and 8")]
    InvalidChannel(u8),
}

fn check_range(quantity: &'static str, value: f64, min: f64, max: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { quantity, value });
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            quantity,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

pub fn percent_from_permille(raw: u16) -> f64 {
    f64::from(raw) / PERMILLE_PER_PERCENT
}

/// Percent (0 to 100) to the nearest tenth of a percent.
pub fn permille_from_percent(quantity: &'static str, percent: f64) -> Result<u16, ValidationError> {
    let percent = check_range(quantity, percent, 0.0, 100.0)?;
    Ok((percent * PERMILLE_PER_PERCENT).round() as u16)
}

pub fn nanometres_from_picometres(raw: u32) -> f64 {
    f64::from(raw) / PICOMETRES_PER_NANOMETRE
}

pub fn picometres_from_nanometres(nanometres: f64) -> Result<u32, ValidationError> {
    let max = f64::from(u32::MAX) / PICOMETRES_PER_NANOMETRE;
    let nanometres = check_range("Wavelength (nm)", nanometres, 0.0, max)?;
    if nanometres == 0.0 {
        return Err(ValidationError::OutOfRange {
            quantity: "Wavelength (nm)",
            value: nanometres,
            min: f64::MIN_POSITIVE,
            max,
        });
    }
    Ok((nanometres * PICOMETRES_PER_NANOMETRE).round() as u32)
}

pub fn seconds_from_nim_steps(raw: u16) -> f64 {
    f64::from(raw) * NIM_DELAY_STEP_SECONDS
}

pub fn nim_steps_from_seconds(seconds: f64) -> Result<u16, ValidationError> {
    let seconds = check_range("NIM delay (s)", seconds, 0.0, NIM_DELAY_MAX_SECONDS)?;
    let steps = (seconds / NIM_DELAY_STEP_SECONDS).round() as u16;
    Ok(steps.min(NIM_DELAY_MAX_STEPS))
}

pub fn celsius_from_decidegrees(raw: i16) -> f64 {
    f64::from(raw) / 10.0
}
