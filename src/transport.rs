//! Bus access: waiting for our poll, paced transmission and reply capture.
//!
//! The bus is half-duplex and multidrop. The bus master polls every
//! participant in turn, and a participant may only transmit right after its
//! own poll. Frames end with a break condition, which the UART reports as a
//! framing error on a zero byte; [`BusLink`] implementations surface that as
//! [`RxByte::boundary`].
//!
//! All waits are bounded by a [`Deadline`] on a wrapping millisecond counter.

use core::fmt::Debug;

use log::{debug, trace, warn};

use crate::buffer::FrameBuffer;
use crate::error::Error;
use crate::frame::{self, Datagram};
use crate::types::BusAddress;

/// Received between frames while the bus is idle, skipped while scanning.
pub const IDLE_FILLER: u8 = 0x00;
/// Poll byte followed by the end-of-frame byte.
pub const POLL_FRAME_LEN: usize = 2;

const ADDRESS_MASK: u8 = 0x7F;

/// One byte received from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxByte {
    pub value: u8,
    /// The byte was received with a framing error, i.e. it is the break
    /// that terminates a frame.
    pub boundary: bool,
}

impl RxByte {
    pub const fn data(value: u8) -> Self {
        Self {
            value,
            boundary: false,
        }
    }

    pub const fn boundary() -> Self {
        Self {
            value: 0,
            boundary: true,
        }
    }
}

/// Byte-oriented access to the bus UART.
pub trait BusLink {
    type Error: Debug;

    /// True if at least one byte can be read without waiting.
    fn available(&mut self) -> Result<bool, Self::Error>;
    /// Read one byte if one is available, never blocks.
    fn read_byte(&mut self) -> Result<Option<RxByte>, Self::Error>;
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
    /// Generate the break condition that ends a frame.
    fn send_break(&mut self) -> Result<(), Self::Error>;
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Monotonic millisecond counter, allowed to wrap around.
pub trait Clock {
    fn now_ms(&mut self) -> u32;
    fn delay_us(&mut self, micros: u32);
}

/// An absolute point in time on a wrapping millisecond counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: u32,
    span: u32,
}

impl Deadline {
    pub const fn new(now: u32, span_ms: u32) -> Self {
        Self {
            start: now,
            span: span_ms,
        }
    }

    /// Compares elapsed time, so counter wraparound between `new` and
    /// `expired` is fine.
    pub const fn expired(&self, now: u32) -> bool {
        now.wrapping_sub(self.start) >= self.span
    }

    pub const fn elapsed(&self, now: u32) -> u32 {
        now.wrapping_sub(self.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    WaitingForPoll,
    Transmitting,
    AwaitingReply,
    Validated,
    TimedOut,
}

fn link_error<E: Debug>(err: E) -> Error {
    warn!("bus link error: {:?}", err);
    Error::Link
}

/// Owns the serial link and clock; all bus traffic goes through here.
pub struct BusTransport<L, C> {
    link: L,
    clock: C,
    address: BusAddress,
    inter_byte_delay_us: u32,
    state: TransportState,
}

impl<L: BusLink, C: Clock> BusTransport<L, C> {
    pub fn new(link: L, clock: C, address: BusAddress, inter_byte_delay_us: u32) -> Self {
        Self {
            link,
            clock,
            address,
            inter_byte_delay_us,
            state: TransportState::WaitingForPoll,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// A deadline `span_ms` from now.
    pub fn deadline(&mut self, span_ms: u32) -> Deadline {
        Deadline::new(self.clock.now_ms(), span_ms)
    }

    pub fn into_inner(self) -> (L, C) {
        (self.link, self.clock)
    }

    /// Scan the bus until the master polls our address.
    ///
    /// The deadline is checked before every byte, so a poll still queued in
    /// the receiver after the deadline never grants the turn.
    pub fn await_turn(&mut self, deadline: Deadline) -> Result<(), Error> {
        self.state = TransportState::WaitingForPoll;
        loop {
            let mut buf = FrameBuffer::new();
            let ended_on_boundary = self.capture(&mut buf, POLL_FRAME_LEN, deadline)?;
            match buf.first() {
                Some(poll)
                    if ended_on_boundary
                        && buf.len() == POLL_FRAME_LEN
                        && poll & ADDRESS_MASK == *self.address =>
                {
                    trace!("polled: {:02X?}", buf.as_ref());
                    return Ok(());
                }
                Some(_) => {
                    trace!("skipped: {:02X?}", buf.as_ref());
                    // resynchronise on the end of a longer frame
                    if !ended_on_boundary {
                        self.skip_to_boundary(deadline)?;
                    }
                }
                // capture only comes back empty once the deadline has passed
                None => break,
            }
        }
        self.state = TransportState::TimedOut;
        debug!("no poll for {} before deadline", self.address);
        Err(Error::PollTimeout)
    }

    /// Write the datagram with inter-byte pacing, then end the frame.
    pub fn transmit(&mut self, datagram: &Datagram) -> Result<(), Error> {
        self.state = TransportState::Transmitting;
        trace!("tx: {:02X?}", datagram.as_bytes());
        for &byte in datagram.as_bytes() {
            self.link.write_byte(byte).map_err(link_error)?;
            self.clock.delay_us(self.inter_byte_delay_us);
        }
        self.link.send_break().map_err(link_error)?;
        self.link.flush().map_err(link_error)?;
        self.state = TransportState::AwaitingReply;
        Ok(())
    }

    /// Busy-wait until bytes are available or the deadline passes.
    /// Returns false on timeout.
    pub fn wait_for_reply(&mut self, deadline: Deadline) -> Result<bool, Error> {
        loop {
            if self.link.available().map_err(link_error)? {
                return Ok(true);
            }
            if deadline.expired(self.clock.now_ms()) {
                return Ok(false);
            }
        }
    }

    /// Capture one frame into `buf`. Returns the number of bytes captured,
    /// 0 if nothing arrived before the deadline.
    pub fn receive(&mut self, buf: &mut FrameBuffer, deadline: Deadline) -> Result<usize, Error> {
        buf.clear();
        self.capture(buf, frame::MAX_FRAME_LEN, deadline)?;
        if buf.is_empty() {
            self.state = TransportState::TimedOut;
        }
        trace!("rx: {:02X?}", buf.as_ref());
        Ok(buf.len())
    }

    /// Wait for, capture and validate a reply frame.
    pub fn receive_reply(&mut self, deadline: Deadline) -> Result<FrameBuffer, Error> {
        let mut buf = FrameBuffer::new();
        if !self.wait_for_reply(deadline)? || self.receive(&mut buf, deadline)? == 0 {
            self.state = TransportState::TimedOut;
            return Err(Error::ReplyTimeout);
        }
        frame::validate(buf.as_ref())?;
        self.state = TransportState::Validated;
        Ok(buf)
    }

    /// Collect bytes into `buf`, skipping idle fillers before the first byte.
    /// Stops after a boundary byte (which is kept), when `limit` bytes are
    /// captured, or at the deadline, which is checked before every read.
    /// Returns true if it stopped on a boundary.
    fn capture(
        &mut self,
        buf: &mut FrameBuffer,
        limit: usize,
        deadline: Deadline,
    ) -> Result<bool, Error> {
        while !deadline.expired(self.clock.now_ms()) {
            match self.link.read_byte().map_err(link_error)? {
                Some(rx) if buf.is_empty() && rx.value == IDLE_FILLER => {}
                Some(rx) => {
                    buf.push(rx.value);
                    if rx.boundary {
                        return Ok(true);
                    }
                    if buf.len() >= limit || buf.is_full() {
                        return Ok(false);
                    }
                }
                None => {}
            }
        }
        Ok(false)
    }

    fn skip_to_boundary(&mut self, deadline: Deadline) -> Result<(), Error> {
        while !deadline.expired(self.clock.now_ms()) {
            if let Some(RxByte { boundary: true, .. }) =
                self.link.read_byte().map_err(link_error)?
            {
                return Ok(());
            }
        }
        Ok(())
    }
}
