#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ems_proto::frame;
use ems_proto::transport::{BusLink, Clock, RxByte};
use ems_proto::{Config, NetworkDiagnostics, NetworkModule, Orchestrator, Timezone};

pub const GATEWAY: u8 = 0x0B;
pub const BOILER: u8 = 0x08;
pub const THERMOSTAT: u8 = 0x10;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scripted bus: bytes the gateway will receive, frames it sent, and a
/// millisecond counter that advances by one on every read of the clock.
pub struct SimBus {
    rx: VecDeque<RxByte>,
    tx: Vec<u8>,
    pub sent: Vec<Vec<u8>>,
    pub now_ms: u32,
    pub delayed_us: u64,
    do_link_error: bool,
}

impl SimBus {
    pub fn new() -> Rc<RefCell<SimBus>> {
        Self::starting_at(0)
    }

    pub fn starting_at(now_ms: u32) -> Rc<RefCell<SimBus>> {
        Rc::new(RefCell::new(SimBus {
            rx: VecDeque::new(),
            tx: Vec::new(),
            sent: Vec::new(),
            now_ms,
            delayed_us: 0,
            do_link_error: false,
        }))
    }

    pub fn trigger_link_error(&mut self) {
        self.do_link_error = true;
    }

    pub fn idle(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            self.rx.push_back(RxByte::data(0x00));
        }
        self
    }

    /// The bus master polling `address`.
    pub fn poll(&mut self, address: u8) -> &mut Self {
        self.rx.push_back(RxByte::data(address | 0x80));
        self.rx.push_back(RxByte::boundary());
        self
    }

    /// Raw bytes, ended with a break.
    pub fn frame(&mut self, bytes: &[u8]) -> &mut Self {
        self.rx.extend(bytes.iter().map(|&b| RxByte::data(b)));
        self.rx.push_back(RxByte::boundary());
        self
    }

    /// A reply with a correct checksum.
    pub fn reply(&mut self, source: u8, message_type: u8, offset: u8, payload: &[u8]) -> &mut Self {
        let bytes = reply_bytes(source, message_type, offset, payload);
        self.frame(&bytes)
    }

    pub fn ack(&mut self) -> &mut Self {
        self.frame(&[frame::ACK])
    }

    pub fn nak(&mut self) -> &mut Self {
        self.frame(&[frame::NAK])
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Number of frames the gateway put on the bus with the given destination
    /// and message type, reads and writes alike.
    pub fn sent_to(&self, unit: u8, message_type: u8) -> usize {
        self.sent
            .iter()
            .filter(|f| f[1] & 0x7F == unit && f[2] == message_type)
            .count()
    }

    pub fn writes(&self) -> usize {
        self.sent.iter().filter(|f| f[1] & 0x80 == 0).count()
    }
}

/// Header, payload and checksum of a reply addressed to the gateway.
pub fn reply_bytes(source: u8, message_type: u8, offset: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![source, GATEWAY, message_type, offset];
    bytes.extend_from_slice(payload);
    // checksum and end-of-frame slots
    bytes.extend_from_slice(&[0, 0]);
    let crc = frame::checksum(&bytes);
    bytes.pop();
    bytes.pop();
    bytes.push(crc);
    bytes
}

pub struct SimLink(Rc<RefCell<SimBus>>);

impl BusLink for SimLink {
    type Error = &'static str;

    fn available(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.borrow().rx.is_empty())
    }

    fn read_byte(&mut self) -> Result<Option<RxByte>, Self::Error> {
        let mut bus = self.0.borrow_mut();
        if bus.do_link_error {
            bus.do_link_error = false;
            return Err("read error");
        }
        Ok(bus.rx.pop_front())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.0.borrow_mut().tx.push(byte);
        Ok(())
    }

    fn send_break(&mut self) -> Result<(), Self::Error> {
        let mut bus = self.0.borrow_mut();
        let frame = std::mem::take(&mut bus.tx);
        bus.sent.push(frame);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub struct SimClock(Rc<RefCell<SimBus>>);

impl Clock for SimClock {
    fn now_ms(&mut self) -> u32 {
        let mut bus = self.0.borrow_mut();
        let now = bus.now_ms;
        bus.now_ms = now.wrapping_add(1);
        now
    }

    fn delay_us(&mut self, micros: u32) {
        self.0.borrow_mut().delayed_us += u64::from(micros);
    }
}

pub fn sim_orchestrator(bus: &Rc<RefCell<SimBus>>, config: Config) -> Orchestrator<SimLink, SimClock> {
    Orchestrator::new(SimLink(Rc::clone(bus)), SimClock(Rc::clone(bus)), config)
}

/// Network module double with a fixed clock and scripted answers.
#[derive(Debug, Default)]
pub struct FakeNetwork {
    pub now: u32,
    pub refuse: bool,
    pub reboots: usize,
    pub timezone: Option<Timezone>,
}

impl FakeNetwork {
    pub fn at(now: u32) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }
}

impl NetworkModule for FakeNetwork {
    fn timestamp(&mut self) -> u32 {
        self.now
    }

    fn reboot(&mut self) -> bool {
        if self.refuse {
            return false;
        }
        self.reboots += 1;
        true
    }

    fn reconfigure(&mut self, timezone: Timezone) -> bool {
        if self.refuse {
            return false;
        }
        self.timezone = Some(timezone);
        true
    }

    fn diagnostics(&mut self) -> NetworkDiagnostics {
        NetworkDiagnostics {
            signal_strength: -67,
            reconnects: 2,
            uptime_s: 3600,
        }
    }
}

pub const FAST_PAYLOAD: [u8; 22] = [
    0x2D, 0x02, 0x0B, 0x64, 0x3C, 0x00, 0x00, 0b0010_1101, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x9A, 0x00, 0x2F, 0x0F, b'-', b'H', 0x00, 0x00,
];

pub const SLOW_PAYLOAD: [u8; 22] = [
    0xFF, 0x9C, 0x01, 0xF4, 0x00, 0xC8, 0x00, 0x00, 0x00, 0x32, 0x01, 0x02, 0x03, 0x00, 0x10,
    0x00, 0x00, 0x00, 0x2A, 0x0A, 0x00, 0x01,
];
