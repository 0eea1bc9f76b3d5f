//! Numeric command surface.
//!
//! A [`Request`] carries an operation code and optional numeric parameters.
//! It is validated into a typed [`Command`] before anything touches the bus,
//! and every outcome is reported as a [`Response`]: a payload and timestamp
//! on success, neither on failure.

use core::convert::TryFrom;

use log::{debug, warn};
use snafu::OptionExt;

use crate::catalog::ControllerTime;
use crate::error::Error;
use crate::orchestrator::{BurnerReport, HeatingCircuitReport, Orchestrator, WarmWaterReport};
use crate::stats::Statistics;
use crate::transport::{BusLink, Clock};
use crate::types::{
    self, AnswerTimeout, Circuit, CircuitTemperature, Halves, InvalidModeSnafu,
    MissingParameterSnafu, TemperatureSlot, Timestamp, Timezone, UnknownCommandSnafu,
    WarmWaterMode, WarmWaterTemperature, WorkingMode,
};

/// An operation code plus the raw parameters that came with it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub code: u8,
    pub circuit: Option<u8>,
    pub mode: Option<u8>,
    pub temp: Option<u8>,
    pub timezone: Option<u8>,
    pub value: Option<u8>,
}

impl Request {
    pub const fn new(code: u8) -> Self {
        Self {
            code,
            circuit: None,
            mode: None,
            temp: None,
            timezone: None,
            value: None,
        }
    }

    pub const fn circuit(mut self, circuit: u8) -> Self {
        self.circuit = Some(circuit);
        self
    }

    pub const fn mode(mut self, mode: u8) -> Self {
        self.mode = Some(mode);
        self
    }

    pub const fn temp(mut self, temp: u8) -> Self {
        self.temp = Some(temp);
        self
    }

    pub const fn timezone(mut self, timezone: u8) -> Self {
        self.timezone = Some(timezone);
        self
    }

    pub const fn value(mut self, value: u8) -> Self {
        self.value = Some(value);
        self
    }
}

/// A validated operation with typed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ReadBurnerMonitor,
    ReadWarmWaterMonitor,
    ReadHeatingCircuit(Circuit),
    ReadClock,
    SetCircuitMode(Circuit, WorkingMode),
    SetCircuitTemperature(Circuit, TemperatureSlot, CircuitTemperature),
    SetWarmWaterTemperature(WarmWaterTemperature),
    SetWarmWaterMode(WarmWaterMode),
    SetOneTimeCharge(bool),
    Reboot,
    ReconfigureNetwork(Timezone),
    ReadStatistics { full: bool },
    ResetStatistics,
    SetAnswerTimeout(AnswerTimeout),
}

impl Command {
    /// The operation code this command is requested with.
    pub const fn code(&self) -> u8 {
        match self {
            Command::ReadBurnerMonitor => 1,
            Command::ReadWarmWaterMonitor => 2,
            Command::ReadHeatingCircuit(Circuit::One) => 3,
            Command::ReadHeatingCircuit(Circuit::Two) => 4,
            Command::ReadClock => 9,
            Command::SetCircuitMode(..) => 10,
            Command::SetCircuitTemperature(..) => 11,
            Command::SetWarmWaterTemperature(_) => 12,
            Command::SetWarmWaterMode(_) => 13,
            Command::SetOneTimeCharge(_) => 14,
            Command::Reboot => 20,
            Command::ReconfigureNetwork(_) => 21,
            Command::ReadStatistics { full: false } => 22,
            Command::ReadStatistics { full: true } => 23,
            Command::ResetStatistics => 24,
            Command::SetAnswerTimeout(_) => 25,
        }
    }
}

fn required(value: Option<u8>, name: &'static str) -> Result<u8, types::Error> {
    value.context(MissingParameterSnafu { name })
}

impl TryFrom<&Request> for Command {
    type Error = types::Error;

    fn try_from(request: &Request) -> Result<Self, Self::Error> {
        let circuit = || -> Result<Circuit, types::Error> {
            Circuit::try_from(required(request.circuit, "circuit")?)
        };
        let mode = || required(request.mode, "mode");
        let temp = || required(request.temp, "temp");

        let command = match request.code {
            1 => Command::ReadBurnerMonitor,
            2 => Command::ReadWarmWaterMonitor,
            3 => Command::ReadHeatingCircuit(Circuit::One),
            4 => Command::ReadHeatingCircuit(Circuit::Two),
            9 => Command::ReadClock,
            10 => Command::SetCircuitMode(circuit()?, WorkingMode::try_from(mode()?)?),
            11 => Command::SetCircuitTemperature(
                circuit()?,
                TemperatureSlot::try_from(mode()?)?,
                CircuitTemperature::new(temp()?)?,
            ),
            12 => Command::SetWarmWaterTemperature(WarmWaterTemperature::new(temp()?)?),
            13 => Command::SetWarmWaterMode(WarmWaterMode::try_from(mode()?)?),
            14 => Command::SetOneTimeCharge(match mode()? {
                0 => false,
                1 => true,
                _ => return InvalidModeSnafu.fail(),
            }),
            20 => Command::Reboot,
            21 => Command::ReconfigureNetwork(Timezone::try_from(required(
                request.timezone,
                "timezone",
            )?)?),
            22 => Command::ReadStatistics { full: false },
            23 => Command::ReadStatistics { full: true },
            24 => Command::ResetStatistics,
            25 => Command::SetAnswerTimeout(AnswerTimeout::new(required(request.value, "value")?)?),
            code => return UnknownCommandSnafu { code }.fail(),
        };
        Ok(command)
    }
}

/// Link quality and lifecycle figures reported by the network module.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NetworkDiagnostics {
    /// Received signal strength in dBm.
    pub signal_strength: i8,
    pub reconnects: u32,
    pub uptime_s: u32,
}

/// The wireless bridge the gateway reports through.
pub trait NetworkModule {
    /// Current network time, used to stamp successful responses.
    fn timestamp(&mut self) -> Timestamp;
    /// Request a gateway reboot. Returns false if the module refused.
    fn reboot(&mut self) -> bool;
    fn reconfigure(&mut self, timezone: Timezone) -> bool;
    fn diagnostics(&mut self) -> NetworkDiagnostics;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Burner(BurnerReport),
    WarmWater(WarmWaterReport),
    HeatingCircuit(HeatingCircuitReport),
    Clock(ControllerTime),
    WorkingMode(Circuit, WorkingMode),
    CircuitTemperature(Circuit, TemperatureSlot, Halves),
    WarmWaterTemperature(WarmWaterTemperature),
    WarmWaterMode(WarmWaterMode),
    OneTimeCharge(bool),
    Done,
    Statistics(Statistics, Option<NetworkDiagnostics>),
    StatisticsReset(Timestamp),
    AnswerTimeout(AnswerTimeout),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response {
    pub code: u8,
    pub payload: Option<Payload>,
    /// Set on success only.
    pub timestamp: Option<Timestamp>,
}

impl Response {
    pub const fn failure(code: u8) -> Self {
        Self {
            code,
            payload: None,
            timestamp: None,
        }
    }

    pub const fn is_success(&self) -> bool {
        self.payload.is_some()
    }
}

/// Routes commands to the bus engine or the network module.
pub struct Dispatcher<L, C, N> {
    orchestrator: Orchestrator<L, C>,
    network: N,
}

impl<L: BusLink, C: Clock, N: NetworkModule> Dispatcher<L, C, N> {
    pub fn new(orchestrator: Orchestrator<L, C>, network: N) -> Self {
        Self {
            orchestrator,
            network,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator<L, C> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<L, C> {
        &mut self.orchestrator
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn into_inner(self) -> (Orchestrator<L, C>, N) {
        (self.orchestrator, self.network)
    }

    /// Validate and execute a request. Rejected parameters are counted but
    /// never reach the bus.
    pub fn handle(&mut self, request: &Request) -> Response {
        match Command::try_from(request) {
            Ok(command) => self.execute(command),
            Err(err) => {
                warn!("request {} rejected: {}", request.code, err);
                self.orchestrator
                    .statistics_mut()
                    .record_failure(&Error::from(err));
                Response::failure(request.code)
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> Response {
        let code = command.code();
        debug!("executing {:?}", command);
        let payload = match self.payload(command) {
            Some(payload) => payload,
            None => return Response::failure(code),
        };
        Response {
            code,
            payload: Some(payload),
            timestamp: Some(self.network.timestamp()),
        }
    }

    fn payload(&mut self, command: Command) -> Option<Payload> {
        let engine = &mut self.orchestrator;
        let payload = match command {
            Command::ReadBurnerMonitor => Payload::Burner(engine.read_burner_monitor().ok()?),
            Command::ReadWarmWaterMonitor => {
                Payload::WarmWater(engine.read_warm_water_monitor().ok()?)
            }
            Command::ReadHeatingCircuit(circuit) => {
                Payload::HeatingCircuit(engine.read_heating_circuit(circuit).ok()?)
            }
            Command::ReadClock => Payload::Clock(engine.read_clock().ok()?),
            Command::SetCircuitMode(circuit, mode) => {
                Payload::WorkingMode(circuit, engine.set_circuit_mode(circuit, mode).ok()?)
            }
            Command::SetCircuitTemperature(circuit, slot, temperature) => {
                let confirmed = engine
                    .set_circuit_temperature(circuit, slot, temperature)
                    .ok()?;
                Payload::CircuitTemperature(circuit, slot, confirmed)
            }
            Command::SetWarmWaterTemperature(temperature) => Payload::WarmWaterTemperature(
                engine.set_warm_water_temperature(temperature).ok()?,
            ),
            Command::SetWarmWaterMode(mode) => {
                Payload::WarmWaterMode(engine.set_warm_water_mode(mode).ok()?)
            }
            Command::SetOneTimeCharge(start) => {
                Payload::OneTimeCharge(engine.set_one_time_charge(start).ok()?)
            }
            Command::Reboot => {
                if !self.network.reboot() {
                    warn!("network module refused to reboot");
                    return None;
                }
                Payload::Done
            }
            Command::ReconfigureNetwork(timezone) => {
                if !self.network.reconfigure(timezone) {
                    warn!("network module refused reconfiguration to {:?}", timezone);
                    return None;
                }
                Payload::Done
            }
            Command::ReadStatistics { full } => {
                let diagnostics = if full {
                    Some(self.network.diagnostics())
                } else {
                    None
                };
                Payload::Statistics(*engine.statistics(), diagnostics)
            }
            Command::ResetStatistics => {
                let now = self.network.timestamp();
                engine.statistics_mut().reset(now);
                Payload::StatisticsReset(now)
            }
            Command::SetAnswerTimeout(timeout) => {
                Payload::AnswerTimeout(engine.set_answer_timeout(timeout))
            }
        };
        Some(payload)
    }
}
