//! Bus operations composed from one or more exchanges.
//!
//! An exchange is: wait for our poll, transmit the datagram, wait up to the
//! answer timeout for the reply, validate it, check its message type and
//! decode the payload. Read operations chain exchanges and stop at the first
//! failure. Write operations write one byte, then read it back; a rejected
//! write or a read-back mismatch restarts the sequence from the write, up to
//! [`Config::max_write_attempts`] writes in total. Every other failure ends
//! the operation at once.

use log::{debug, info, warn};
use snafu::{ensure, OptionExt};

use crate::buffer::FrameBuffer;
use crate::catalog::{
    self, BoilerMonitorFast, BoilerMonitorSlow, ControllerTime, HeatingCircuitMonitor,
    HeatingCircuitParameters, MessageDescriptor, WarmWaterMonitor, WarmWaterOperation,
    WriteRequest,
};
use crate::error::{
    Error, MalformedPayloadSnafu, MessageTypeMismatchSnafu, VerifyMismatchSnafu,
    WriteNotAcknowledgedSnafu,
};
use crate::frame::{Datagram, ACK};
use crate::nom_parser::reply;
use crate::stats::Statistics;
use crate::transport::{BusLink, BusTransport, Clock, TransportState};
use crate::types::{
    AnswerTimeout, BusAddress, Circuit, CircuitTemperature, Halves, TemperatureSlot,
    WarmWaterMode, WarmWaterTemperature, WorkingMode,
};

/// Engine settings, fixed at construction except for the answer timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Our own bus address; polls for it grant the turn to transmit.
    pub address: BusAddress,
    /// Maximum wait for the reply to one exchange.
    pub answer_timeout: AnswerTimeout,
    /// Maximum wait for our poll before each exchange.
    pub poll_timeout_ms: u32,
    /// Total write transmissions allowed in one write-and-verify operation.
    pub max_write_attempts: u8,
    pub inter_byte_delay_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: BusAddress::GATEWAY,
            answer_timeout: AnswerTimeout::default(),
            poll_timeout_ms: 2000,
            max_write_attempts: 3,
            inter_byte_delay_us: 1100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnerReport {
    pub fast: BoilerMonitorFast,
    pub slow: BoilerMonitorSlow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmWaterReport {
    pub monitor: WarmWaterMonitor,
    pub operation: WarmWaterOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatingCircuitReport {
    pub circuit: Circuit,
    pub parameters: HeatingCircuitParameters,
    pub monitor: HeatingCircuitMonitor,
}

/// Runs operations against the bus. One operation at a time; every call
/// blocks until it completes or its deadlines pass.
pub struct Orchestrator<L, C> {
    transport: BusTransport<L, C>,
    config: Config,
    stats: Statistics,
}

impl<L: BusLink, C: Clock> Orchestrator<L, C> {
    pub fn new(link: L, clock: C, config: Config) -> Self {
        Self {
            transport: BusTransport::new(link, clock, config.address, config.inter_byte_delay_us),
            config,
            stats: Statistics::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_answer_timeout(&mut self, timeout: AnswerTimeout) -> AnswerTimeout {
        info!(
            "answer timeout {} ms -> {} ms",
            self.config.answer_timeout.as_millis(),
            timeout.as_millis()
        );
        self.config.answer_timeout = timeout;
        timeout
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn statistics_mut(&mut self) -> &mut Statistics {
        &mut self.stats
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Give back the link and clock.
    pub fn into_inner(self) -> (L, C) {
        self.transport.into_inner()
    }

    pub fn read_burner_monitor(&mut self) -> Result<BurnerReport, Error> {
        self.operation("read burner monitor", |this| {
            let fast = this.read(&catalog::BOILER_MONITOR_FAST)?;
            let slow = this.read(&catalog::BOILER_MONITOR_SLOW)?;
            Ok(BurnerReport { fast, slow })
        })
    }

    pub fn read_warm_water_monitor(&mut self) -> Result<WarmWaterReport, Error> {
        self.operation("read warm-water monitor", |this| {
            let monitor = this.read(&catalog::WARM_WATER_MONITOR)?;
            let operation = this.read(&catalog::WARM_WATER_OPERATION)?;
            Ok(WarmWaterReport { monitor, operation })
        })
    }

    pub fn read_heating_circuit(&mut self, circuit: Circuit) -> Result<HeatingCircuitReport, Error> {
        self.operation("read heating circuit", |this| {
            let (parameters, monitor) = catalog::circuit_descriptors(circuit);
            let parameters = this.read(parameters)?;
            let monitor = this.read(monitor)?;
            Ok(HeatingCircuitReport {
                circuit,
                parameters,
                monitor,
            })
        })
    }

    pub fn read_clock(&mut self) -> Result<ControllerTime, Error> {
        self.operation("read controller clock", |this| {
            this.read(&catalog::CONTROLLER_TIME)
        })
    }

    pub fn set_circuit_mode(
        &mut self,
        circuit: Circuit,
        mode: WorkingMode,
    ) -> Result<WorkingMode, Error> {
        self.operation("set circuit mode", |this| {
            this.write_and_verify(&catalog::circuit_mode(circuit, mode))?;
            Ok(mode)
        })
    }

    pub fn set_circuit_temperature(
        &mut self,
        circuit: Circuit,
        slot: TemperatureSlot,
        temperature: CircuitTemperature,
    ) -> Result<Halves, Error> {
        self.operation("set circuit temperature", |this| {
            this.write_and_verify(&catalog::circuit_temperature(circuit, slot, temperature))?;
            Ok(temperature.as_halves())
        })
    }

    pub fn set_warm_water_temperature(
        &mut self,
        temperature: WarmWaterTemperature,
    ) -> Result<WarmWaterTemperature, Error> {
        self.operation("set warm-water temperature", |this| {
            this.write_and_verify(&catalog::warm_water_temperature(temperature))?;
            Ok(temperature)
        })
    }

    pub fn set_warm_water_mode(&mut self, mode: WarmWaterMode) -> Result<WarmWaterMode, Error> {
        self.operation("set warm-water mode", |this| {
            this.write_and_verify(&catalog::warm_water_mode(mode))?;
            Ok(mode)
        })
    }

    /// Start (`true`) or stop a one-time warm-water charge.
    pub fn set_one_time_charge(&mut self, start: bool) -> Result<bool, Error> {
        self.operation("set one-time charge", |this| {
            this.write_and_verify(&catalog::one_time_charge(start))?;
            Ok(start)
        })
    }

    fn operation<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        debug!("{}", name);
        let result = op(self);
        match &result {
            Ok(_) => self.stats.record_success(),
            Err(err) => {
                warn!("{} failed: {}", name, err);
                self.stats.record_failure(err);
            }
        }
        result
    }

    fn read<R>(&mut self, descriptor: &MessageDescriptor<R>) -> Result<R, Error> {
        debug!("reading {}", descriptor.name);
        let request = descriptor.request(self.config.address);
        self.exchange(&request, descriptor.decode)
    }

    fn write_and_verify(&mut self, request: &WriteRequest) -> Result<(), Error> {
        let mut attempts_left = self.config.max_write_attempts.max(1);
        loop {
            attempts_left -= 1;
            let result = self.write(request).and_then(|()| self.confirm(request));
            match result {
                Err(err) if err.is_retryable() && attempts_left > 0 => {
                    warn!(
                        "{}: {}, {} attempt(s) left",
                        request.descriptor.name, err, attempts_left
                    );
                    self.stats.record_retry(&err);
                }
                result => return result,
            }
        }
    }

    fn write(&mut self, request: &WriteRequest) -> Result<(), Error> {
        debug!(
            "writing {} = 0x{:02X}",
            request.descriptor.name, request.value
        );
        self.send(&request.datagram(self.config.address))?;

        let deadline = self.transport.deadline(self.config.answer_timeout.as_millis());
        let mut buf = FrameBuffer::new();
        if !self.transport.wait_for_reply(deadline)? || self.transport.receive(&mut buf, deadline)? == 0
        {
            return Err(Error::ReplyTimeout);
        }
        match buf.first() {
            Some(ACK) => Ok(()),
            other => WriteNotAcknowledgedSnafu {
                reply: other.unwrap_or_default(),
            }
            .fail(),
        }
    }

    fn confirm(&mut self, request: &WriteRequest) -> Result<(), Error> {
        let confirm = request.descriptor.confirm;
        let datagram = confirm.request(self.config.address);
        let confirmed = self.exchange(&datagram, |payload| request.confirms(payload))?;
        ensure!(
            confirmed,
            VerifyMismatchSnafu {
                message_type: confirm.message_type
            }
        );
        Ok(())
    }

    /// Wait for our turn and put the datagram on the bus.
    fn send(&mut self, datagram: &Datagram) -> Result<(), Error> {
        let deadline = self.transport.deadline(self.config.poll_timeout_ms);
        self.transport.await_turn(deadline)?;
        self.transport.transmit(datagram)
    }

    /// One read exchange; `decode` maps the reply payload to the result.
    fn exchange<T>(
        &mut self,
        request: &Datagram,
        decode: impl FnOnce(&[u8]) -> Option<T>,
    ) -> Result<T, Error> {
        self.send(request)?;
        let deadline = self.transport.deadline(self.config.answer_timeout.as_millis());
        let frame = self.transport.receive_reply(deadline)?;

        let message_type = request.message_type();
        let (_, (header, payload)) = reply::split_frame(frame.as_ref())
            .ok()
            .context(MalformedPayloadSnafu { message_type })?;
        ensure!(
            header.message_type == message_type,
            MessageTypeMismatchSnafu {
                requested: message_type,
                received: header.message_type,
            }
        );
        decode(payload).context(MalformedPayloadSnafu { message_type })
    }
}
