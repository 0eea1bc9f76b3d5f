//! This module defines range-checked types for bus addresses and operation
//! parameters, plus the fixed-point value types used by decoded readings.
//!
//! Every set operation takes these types instead of raw integers, so a value
//! that would be rejected by the remote unit can't reach the bus.

use snafu::{ensure, OptionExt, Snafu};

use core::convert::{TryFrom, TryInto};
use core::fmt;
use core::ops::Deref;

/// Error type for this module
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The value isn't a valid 7-bit bus address.
    #[snafu(display("Invalid bus address"))]
    InvalidAddress,
    /// Only heating circuits 1 and 2 exist.
    #[snafu(display("Invalid heating circuit"))]
    InvalidCircuit,
    /// The mode value isn't one of the enumerated modes of the operation.
    #[snafu(display("Invalid mode"))]
    InvalidMode,
    /// The temperature is above the maximum accepted by the remote unit.
    #[snafu(display("Invalid temperature"))]
    InvalidTemperature,
    /// Only the two timezone settings 0 and 1 exist.
    #[snafu(display("Invalid timezone"))]
    InvalidTimezone,
    /// The answer timeout must be 1..=100 units of 100 ms.
    #[snafu(display("Invalid answer timeout"))]
    InvalidTimeout,
    /// The operation code isn't part of the command table.
    #[snafu(display("Unknown command code {}", code))]
    UnknownCommand { code: u8 },
    /// A parameter required by the operation wasn't supplied.
    #[snafu(display("Missing parameter '{}'", name))]
    MissingParameter { name: &'static str },
}

const fn invalid_address() -> InvalidAddressSnafu {
    InvalidAddressSnafu
}

const fn invalid_mode() -> InvalidModeSnafu {
    InvalidModeSnafu
}

const fn invalid_temperature() -> InvalidTemperatureSnafu {
    InvalidTemperatureSnafu
}

/// Wall-clock seconds supplied by the network-time collaborator.
pub type Timestamp = u32;

/// BusAddress is a range-checked 7-bit address of a bus participant.
///
/// The top bit of the destination byte is the read flag, so it is never
/// part of the address itself.
///
/// ## Example
/// ```
/// use ems_proto::BusAddress;
/// let boiler = BusAddress::new(0x08).unwrap();
/// assert!(BusAddress::new(0x88).is_err());
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct BusAddress(u8);

/// Create a new [`BusAddress`], panics if it is out of range.
pub const fn addr(a: u8) -> BusAddress {
    if a <= 0x7F {
        return BusAddress(a);
    }
    panic!("Invalid bus address.")
}

impl BusAddress {
    /// The gateway's own address, used by third-party service devices.
    pub const GATEWAY: Self = addr(0x0B);
    /// The boiler's burner control unit.
    pub const BOILER: Self = addr(0x08);
    /// The room controller / thermostat handling the heating circuits.
    pub const THERMOSTAT: Self = addr(0x10);

    /// Create a new address, checking that the address is in \[0, 0x7F\].
    /// # Errors
    /// Returns [`Error::InvalidAddress`] if `address` is out of range.
    pub fn new(address: impl TryInto<u8>) -> Result<Self, Error> {
        let address = address.try_into().ok().with_context(invalid_address)?;
        ensure!(address <= 0x7F, invalid_address());
        Ok(Self(address))
    }
}

impl Deref for BusAddress {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// One of the two heating circuits handled by the thermostat.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum Circuit {
    One,
    Two,
}

impl TryFrom<u8> for Circuit {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Circuit::One),
            2 => Ok(Circuit::Two),
            _ => InvalidCircuitSnafu.fail(),
        }
    }
}

/// Working mode of a heating circuit.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(u8)]
pub enum WorkingMode {
    Night = 0,
    Day = 1,
    Auto = 2,
}

impl TryFrom<u8> for WorkingMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WorkingMode::Night),
            1 => Ok(WorkingMode::Day),
            2 => Ok(WorkingMode::Auto),
            _ => invalid_mode().fail(),
        }
    }
}

/// Which of the three circuit set-points a temperature write targets.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(u8)]
pub enum TemperatureSlot {
    Night = 0,
    Day = 1,
    Holiday = 2,
}

impl TryFrom<u8> for TemperatureSlot {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TemperatureSlot::Night),
            1 => Ok(TemperatureSlot::Day),
            2 => Ok(TemperatureSlot::Holiday),
            _ => invalid_mode().fail(),
        }
    }
}

/// Warm-water working mode, set on the thermostat.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(u8)]
pub enum WarmWaterMode {
    Off = 0,
    On = 1,
    Auto = 2,
}

impl TryFrom<u8> for WarmWaterMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WarmWaterMode::Off),
            1 => Ok(WarmWaterMode::On),
            2 => Ok(WarmWaterMode::Auto),
            _ => invalid_mode().fail(),
        }
    }
}

/// Timezone setting handed to the network module on reconfiguration.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(u8)]
pub enum Timezone {
    Standard = 0,
    DaylightSaving = 1,
}

impl TryFrom<u8> for Timezone {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Timezone::Standard),
            1 => Ok(Timezone::DaylightSaving),
            _ => InvalidTimezoneSnafu.fail(),
        }
    }
}

/// Circuit set-point in half-degree units, range-checked to \[0, 80\] (40 °C).
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct CircuitTemperature(u8);

impl CircuitTemperature {
    pub const MAX: u8 = 40 * 2;

    /// # Errors
    /// Returns [`Error::InvalidTemperature`] if `half_degrees` is above 80.
    pub fn new(half_degrees: impl TryInto<u8>) -> Result<Self, Error> {
        let raw = half_degrees
            .try_into()
            .ok()
            .with_context(invalid_temperature)?;
        ensure!(raw <= Self::MAX, invalid_temperature());
        Ok(Self(raw))
    }

    /// The raw value put on the bus.
    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn as_halves(self) -> Halves {
        Halves(self.0)
    }
}

/// Warm-water set-point in whole degrees, range-checked to \[0, 80\].
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct WarmWaterTemperature(u8);

impl WarmWaterTemperature {
    pub const MAX: u8 = 80;

    /// # Errors
    /// Returns [`Error::InvalidTemperature`] if `degrees` is above 80.
    pub fn new(degrees: impl TryInto<u8>) -> Result<Self, Error> {
        let raw = degrees.try_into().ok().with_context(invalid_temperature)?;
        ensure!(raw <= Self::MAX, invalid_temperature());
        Ok(Self(raw))
    }

    pub const fn degrees(self) -> u8 {
        self.0
    }
}

/// Answer timeout in units of 100 ms, range-checked to \[1, 100\].
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct AnswerTimeout(u8);

impl AnswerTimeout {
    /// # Errors
    /// Returns [`Error::InvalidTimeout`] if `tenths` is zero or above 100.
    pub fn new(tenths: impl TryInto<u8>) -> Result<Self, Error> {
        let tenths = tenths.try_into().ok().context(InvalidTimeoutSnafu)?;
        ensure!((1..=100).contains(&tenths), InvalidTimeoutSnafu);
        Ok(Self(tenths))
    }

    /// The configured value in units of 100 ms.
    pub const fn tenths(self) -> u8 {
        self.0
    }

    pub const fn as_millis(self) -> u32 {
        self.0 as u32 * 100
    }
}

impl Default for AnswerTimeout {
    fn default() -> Self {
        Self(5)
    }
}

/// A bus value scaled by 1/10, e.g. temperatures and flame current.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
pub struct Tenths(pub i32);

impl Tenths {
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / 10.0
    }
}

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

/// A bus value scaled by 1/2, used for half-degree set-points.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
pub struct Halves(pub u8);

impl Halves {
    pub fn to_f32(self) -> f32 {
        f32::from(self.0) / 2.0
    }
}

impl fmt::Display for Halves {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = if self.0 % 2 == 0 { '0' } else { '5' };
        write!(f, "{}.{}", self.0 / 2, tail)
    }
}

#[cfg(test)]
mod address_tests {
    use super::BusAddress;

    #[test]
    fn test_valid_addresses() {
        for n in 0..=0x7F {
            let a = BusAddress::new(n).unwrap();
            assert_eq!(*a, n);
        }
    }

    #[test]
    fn test_address() {
        assert_eq!(*BusAddress::GATEWAY, 0x0B);
        assert!(BusAddress::new(0x80).is_err());
        assert!(BusAddress::new(-1).is_err());
        assert!(BusAddress::new(300).is_err());
    }
}


#[cfg(test)]
mod fixed_point_tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Tenths(523).to_string(), "52.3");
        assert_eq!(Tenths(-5).to_string(), "-0.5");
        assert_eq!(Tenths(-123).to_string(), "-12.3");
        assert_eq!(Halves(70).to_string(), "35.0");
        assert_eq!(Halves(41).to_string(), "20.5");
    }

    #[test]
    fn test_scaling() {
        assert_eq!(Halves(70).to_f32(), 35.0);
        assert_eq!(Tenths(15).to_f32(), 1.5);
        assert_eq!(CircuitTemperature::new(43).unwrap().as_halves(), Halves(43));
    }
}
