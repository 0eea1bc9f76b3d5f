//! The fixed catalog of messages the gateway reads and writes.
//!
//! Each readable record is described by a [`MessageDescriptor`], which knows
//! where the record lives (unit, message type, offset, length) and how to
//! decode its payload into a typed reading. Payload indexes count from the
//! first byte after the 4-byte reply header, and they are specific to each
//! message type, mirroring the record layouts of the remote units.
//!
//! Writes are described by [`WriteDescriptor`]s. A write targets a byte
//! offset inside the remote record; the [`Confirmation`] that verifies it is
//! a separate read, which may use another offset or even another message type.

use core::convert::TryFrom;

use crate::frame::Datagram;
use crate::nom_parser::fields::Fields;
use crate::types::{
    BusAddress, Circuit, CircuitTemperature, Halves, TemperatureSlot, Tenths, WarmWaterMode,
    WarmWaterTemperature, WorkingMode,
};

/// Describes one readable record and how to decode it.
pub struct MessageDescriptor<R> {
    pub name: &'static str,
    pub unit: BusAddress,
    pub message_type: u8,
    pub offset: u8,
    pub length: u8,
    pub decode: fn(&[u8]) -> Option<R>,
}

impl<R> MessageDescriptor<R> {
    /// The read request for this record.
    pub fn request(&self, source: BusAddress) -> Datagram {
        Datagram::read(source, self.unit, self.message_type, self.offset, self.length)
    }
}

/// Boiler monitor, fast-changing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoilerMonitorFast {
    pub selected_flow_temperature: u8,
    pub flow_temperature: Tenths,
    pub selected_burner_power: u8,
    pub burner_power: u8,
    pub burner_active: bool,
    pub fan_active: bool,
    pub ignition_active: bool,
    pub heating_pump_active: bool,
    pub warm_water_heating_active: bool,
    pub warm_water_circulation_active: bool,
    pub return_temperature: Tenths,
    /// Flame ionisation current in µA.
    pub flame_current: Tenths,
    /// System pressure in bar.
    pub system_pressure: Tenths,
    /// Two-character display code, e.g. `-H` while heating.
    pub service_code: [u8; 2],
    pub error_code: u16,
}

impl BoilerMonitorFast {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let f = Fields::new(payload);
        Some(Self {
            selected_flow_temperature: f.byte(0)?,
            flow_temperature: f.tenths(1)?,
            selected_burner_power: f.byte(3)?,
            burner_power: f.byte(4)?,
            burner_active: f.flag(7, 0)?,
            fan_active: f.flag(7, 2)?,
            ignition_active: f.flag(7, 3)?,
            heating_pump_active: f.flag(7, 5)?,
            warm_water_heating_active: f.flag(7, 6)?,
            warm_water_circulation_active: f.flag(7, 7)?,
            return_temperature: f.tenths(13)?,
            flame_current: f.unsigned_tenths(15)?,
            system_pressure: f.byte_tenths(17)?,
            service_code: f.pair(18)?,
            error_code: f.word(20)?,
        })
    }

    /// The service code as text, if it is printable ASCII.
    pub fn service_code_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.service_code)
            .ok()
            .filter(|s| s.bytes().all(|c| c.is_ascii_graphic()))
    }
}

/// Boiler monitor, slow-changing values and operating counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoilerMonitorSlow {
    pub outdoor_temperature: Tenths,
    pub boiler_temperature: Tenths,
    pub exhaust_temperature: Tenths,
    pub pump_modulation: u8,
    pub burner_starts: u32,
    pub burner_minutes: u32,
    pub burner_hours: u32,
    pub heating_minutes: u32,
}

impl BoilerMonitorSlow {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let f = Fields::new(payload);
        Some(Self {
            outdoor_temperature: f.tenths(0)?,
            boiler_temperature: f.tenths(2)?,
            exhaust_temperature: f.tenths(4)?,
            pump_modulation: f.byte(9)?,
            burner_starts: f.counter(10)?,
            burner_minutes: f.counter(13)?,
            burner_hours: f.counter(16)?,
            heating_minutes: f.counter(19)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmWaterMonitor {
    pub set_point: u8,
    pub temperature: Tenths,
    pub one_time_charge: bool,
    pub disinfecting: bool,
    pub charging: bool,
    pub temperature_reached: bool,
    pub heating_active: bool,
    pub circulation_active: bool,
    pub minutes: u32,
    pub starts: u32,
}

impl WarmWaterMonitor {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let f = Fields::new(payload);
        Some(Self {
            set_point: f.byte(0)?,
            temperature: f.tenths(1)?,
            one_time_charge: f.flag(5, 1)?,
            disinfecting: f.flag(5, 2)?,
            charging: f.flag(5, 3)?,
            temperature_reached: f.flag(5, 5)?,
            heating_active: f.flag(7, 0)?,
            circulation_active: f.flag(7, 2)?,
            minutes: f.counter(10)?,
            starts: f.counter(13)?,
        })
    }
}

/// Warm-water operation settings held by the thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmWaterOperation {
    pub mode: WarmWaterMode,
}

impl WarmWaterOperation {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let f = Fields::new(payload);
        Some(Self {
            mode: WarmWaterMode::try_from(f.byte(2)?).ok()?,
        })
    }
}

/// Working mode and set-points of a heating circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatingCircuitParameters {
    pub night_temperature: Halves,
    pub day_temperature: Halves,
    pub holiday_temperature: Halves,
    pub working_mode: WorkingMode,
}

impl HeatingCircuitParameters {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let f = Fields::new(payload);
        Some(Self {
            night_temperature: f.halves(1)?,
            day_temperature: f.halves(2)?,
            holiday_temperature: f.halves(3)?,
            working_mode: WorkingMode::try_from(f.byte(7)?).ok()?,
        })
    }

    pub fn temperature(&self, slot: TemperatureSlot) -> Halves {
        match slot {
            TemperatureSlot::Night => self.night_temperature,
            TemperatureSlot::Day => self.day_temperature,
            TemperatureSlot::Holiday => self.holiday_temperature,
        }
    }
}

/// Live status of a heating circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatingCircuitMonitor {
    pub holiday_mode: bool,
    pub auto_mode: bool,
    pub summer_mode: bool,
    pub day_mode: bool,
    pub room_set_point: Halves,
    pub room_temperature: Tenths,
    pub flow_set_point: u8,
}

impl HeatingCircuitMonitor {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let f = Fields::new(payload);
        Some(Self {
            holiday_mode: f.flag(0, 0)?,
            auto_mode: f.flag(0, 2)?,
            summer_mode: f.flag(1, 0)?,
            day_mode: f.flag(1, 1)?,
            room_set_point: f.halves(2)?,
            room_temperature: f.tenths(3)?,
            flow_set_point: f.byte(14)?,
        })
    }
}

/// Date and time kept by the thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// 0 = Monday
    pub weekday: u8,
    pub daylight_saving: bool,
}

impl ControllerTime {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let f = Fields::new(payload);
        Some(Self {
            year: 2000 + u16::from(f.byte(0)?),
            month: f.byte(1)?,
            hour: f.byte(2)?,
            day: f.byte(3)?,
            minute: f.byte(4)?,
            second: f.byte(5)?,
            weekday: f.byte(6)?,
            daylight_saving: f.flag(7, 0)?,
        })
    }
}

pub const BOILER_MONITOR_FAST: MessageDescriptor<BoilerMonitorFast> = MessageDescriptor {
    name: "boiler monitor fast",
    unit: BusAddress::BOILER,
    message_type: 0x18,
    offset: 0,
    length: 22,
    decode: BoilerMonitorFast::decode,
};

pub const BOILER_MONITOR_SLOW: MessageDescriptor<BoilerMonitorSlow> = MessageDescriptor {
    name: "boiler monitor slow",
    unit: BusAddress::BOILER,
    message_type: 0x19,
    offset: 0,
    length: 22,
    decode: BoilerMonitorSlow::decode,
};

pub const WARM_WATER_MONITOR: MessageDescriptor<WarmWaterMonitor> = MessageDescriptor {
    name: "warm-water monitor",
    unit: BusAddress::BOILER,
    message_type: 0x34,
    offset: 0,
    length: 16,
    decode: WarmWaterMonitor::decode,
};

pub const WARM_WATER_OPERATION: MessageDescriptor<WarmWaterOperation> = MessageDescriptor {
    name: "warm-water operation",
    unit: BusAddress::THERMOSTAT,
    message_type: 0x37,
    offset: 0,
    length: 3,
    decode: WarmWaterOperation::decode,
};

pub const CIRCUIT_1_PARAMETERS: MessageDescriptor<HeatingCircuitParameters> = MessageDescriptor {
    name: "circuit 1 parameters",
    unit: BusAddress::THERMOSTAT,
    message_type: CIRCUIT_1_PARAMETERS_TYPE,
    offset: 0,
    length: 8,
    decode: HeatingCircuitParameters::decode,
};

pub const CIRCUIT_1_MONITOR: MessageDescriptor<HeatingCircuitMonitor> = MessageDescriptor {
    name: "circuit 1 monitor",
    unit: BusAddress::THERMOSTAT,
    message_type: 0x3E,
    offset: 0,
    length: 15,
    decode: HeatingCircuitMonitor::decode,
};

pub const CIRCUIT_2_PARAMETERS: MessageDescriptor<HeatingCircuitParameters> = MessageDescriptor {
    name: "circuit 2 parameters",
    unit: BusAddress::THERMOSTAT,
    message_type: CIRCUIT_2_PARAMETERS_TYPE,
    offset: 0,
    length: 8,
    decode: HeatingCircuitParameters::decode,
};

pub const CIRCUIT_2_MONITOR: MessageDescriptor<HeatingCircuitMonitor> = MessageDescriptor {
    name: "circuit 2 monitor",
    unit: BusAddress::THERMOSTAT,
    message_type: 0x48,
    offset: 0,
    length: 15,
    decode: HeatingCircuitMonitor::decode,
};

pub const CONTROLLER_TIME: MessageDescriptor<ControllerTime> = MessageDescriptor {
    name: "controller time",
    unit: BusAddress::THERMOSTAT,
    message_type: 0x06,
    offset: 0,
    length: 8,
    decode: ControllerTime::decode,
};

/// The descriptors read for a heating circuit: parameters, then monitor.
pub fn circuit_descriptors(
    circuit: Circuit,
) -> (
    &'static MessageDescriptor<HeatingCircuitParameters>,
    &'static MessageDescriptor<HeatingCircuitMonitor>,
) {
    match circuit {
        Circuit::One => (&CIRCUIT_1_PARAMETERS, &CIRCUIT_1_MONITOR),
        Circuit::Two => (&CIRCUIT_2_PARAMETERS, &CIRCUIT_2_MONITOR),
    }
}

/// How a confirmation read checks the written value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Compare the byte at a payload index.
    Byte { index: usize },
    /// Compare a single bit of the byte at a payload index.
    Flag { index: usize, bit: u8 },
}

/// The read that verifies a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub unit: BusAddress,
    pub message_type: u8,
    pub offset: u8,
    pub length: u8,
    pub check: Check,
}

impl Confirmation {
    pub fn request(&self, source: BusAddress) -> Datagram {
        Datagram::read(source, self.unit, self.message_type, self.offset, self.length)
    }
}

/// Describes one writable byte and the read that confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteDescriptor {
    pub name: &'static str,
    pub unit: BusAddress,
    pub message_type: u8,
    pub offset: u8,
    pub confirm: Confirmation,
}

/// The value a confirmation read must see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Byte(u8),
    Flag(bool),
}

/// A fully encoded write: descriptor, byte to write and expected read-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    pub descriptor: WriteDescriptor,
    pub value: u8,
    pub expected: Expected,
}

impl WriteRequest {
    fn byte(descriptor: WriteDescriptor, value: u8) -> Self {
        Self {
            descriptor,
            value,
            expected: Expected::Byte(value),
        }
    }

    pub fn datagram(&self, source: BusAddress) -> Datagram {
        let d = &self.descriptor;
        Datagram::write(source, d.unit, d.message_type, d.offset, self.value)
    }

    /// Check the payload of a confirmation reply against the written value.
    /// Returns `None` if the payload doesn't reach the checked field.
    pub fn confirms(&self, payload: &[u8]) -> Option<bool> {
        let f = Fields::new(payload);
        let seen = match self.descriptor.confirm.check {
            Check::Byte { index } => Expected::Byte(f.byte(index)?),
            Check::Flag { index, bit } => Expected::Flag(f.flag(index, bit)?),
        };
        Some(seen == self.expected)
    }
}

const CIRCUIT_1_PARAMETERS_TYPE: u8 = 0x3D;
const CIRCUIT_2_PARAMETERS_TYPE: u8 = 0x47;

const fn circuit_parameters_type(circuit: Circuit) -> u8 {
    match circuit {
        Circuit::One => CIRCUIT_1_PARAMETERS_TYPE,
        Circuit::Two => CIRCUIT_2_PARAMETERS_TYPE,
    }
}

const fn circuit_write(name: &'static str, circuit: Circuit, offset: u8) -> WriteDescriptor {
    let message_type = circuit_parameters_type(circuit);
    WriteDescriptor {
        name,
        unit: BusAddress::THERMOSTAT,
        message_type,
        offset,
        confirm: Confirmation {
            unit: BusAddress::THERMOSTAT,
            message_type,
            offset: 0,
            length: 8,
            check: Check::Byte {
                index: offset as usize,
            },
        },
    }
}

const CIRCUIT_MODE_OFFSET: u8 = 7;

const fn temperature_offset(slot: TemperatureSlot) -> u8 {
    match slot {
        TemperatureSlot::Night => 1,
        TemperatureSlot::Day => 2,
        TemperatureSlot::Holiday => 3,
    }
}

pub const WARM_WATER_TEMPERATURE: WriteDescriptor = WriteDescriptor {
    name: "warm-water temperature",
    unit: BusAddress::BOILER,
    message_type: 0x33,
    offset: 2,
    confirm: Confirmation {
        unit: BusAddress::BOILER,
        message_type: 0x33,
        offset: 2,
        length: 1,
        check: Check::Byte { index: 0 },
    },
};

pub const WARM_WATER_MODE: WriteDescriptor = WriteDescriptor {
    name: "warm-water mode",
    unit: BusAddress::THERMOSTAT,
    message_type: 0x37,
    offset: 2,
    confirm: Confirmation {
        unit: BusAddress::THERMOSTAT,
        message_type: 0x37,
        offset: 0,
        length: 3,
        check: Check::Byte { index: 2 },
    },
};

/// Written to the boiler flags record, confirmed through the warm-water monitor.
pub const ONE_TIME_CHARGE: WriteDescriptor = WriteDescriptor {
    name: "warm-water one-time charge",
    unit: BusAddress::BOILER,
    message_type: 0x35,
    offset: 0,
    confirm: Confirmation {
        unit: BusAddress::BOILER,
        message_type: 0x34,
        offset: 0,
        length: 6,
        check: Check::Flag { index: 5, bit: 1 },
    },
};

const ONE_TIME_CHARGE_START: u8 = 0x23;
const ONE_TIME_CHARGE_STOP: u8 = 0x03;

pub fn circuit_mode(circuit: Circuit, mode: WorkingMode) -> WriteRequest {
    WriteRequest::byte(
        circuit_write("circuit working mode", circuit, CIRCUIT_MODE_OFFSET),
        mode as u8,
    )
}

pub fn circuit_temperature(
    circuit: Circuit,
    slot: TemperatureSlot,
    temperature: CircuitTemperature,
) -> WriteRequest {
    WriteRequest::byte(
        circuit_write("circuit temperature", circuit, temperature_offset(slot)),
        temperature.raw(),
    )
}

pub fn warm_water_temperature(temperature: WarmWaterTemperature) -> WriteRequest {
    WriteRequest::byte(WARM_WATER_TEMPERATURE, temperature.degrees())
}

pub fn warm_water_mode(mode: WarmWaterMode) -> WriteRequest {
    WriteRequest::byte(WARM_WATER_MODE, mode as u8)
}

pub fn one_time_charge(start: bool) -> WriteRequest {
    WriteRequest {
        descriptor: ONE_TIME_CHARGE,
        value: if start {
            ONE_TIME_CHARGE_START
        } else {
            ONE_TIME_CHARGE_STOP
        },
        expected: Expected::Flag(start),
    }
}
