//! Gateway side of a two-wire heating-controller bus.
//!
//! The bus master polls each participant in turn. After its own poll the
//! gateway may send one datagram, either a read request for a block of a
//! message type or a one-byte write, and the addressed unit answers before
//! the next poll. [`Orchestrator`] composes these exchanges into read
//! operations returning decoded readings, and write-and-verify operations
//! that read back what they wrote. [`Dispatcher`] sits on top and maps
//! numeric operation codes to those operations.
//!
//! The crate does no I/O itself. Supply a [`BusLink`](transport::BusLink)
//! for the UART and a [`Clock`](transport::Clock) for time.
#![cfg_attr(not(feature = "std"), no_std)]

mod buffer;
pub mod catalog;
pub mod dispatch;
mod error;
pub mod frame;
mod nom_parser;
pub mod orchestrator;
mod stats;
pub mod transport;
pub mod types;

pub use buffer::FrameBuffer;
pub use dispatch::{Command, Dispatcher, NetworkDiagnostics, NetworkModule, Payload, Request, Response};
pub use error::Error;
pub use orchestrator::{Config, Orchestrator};
pub use stats::Statistics;
pub use types::{
    AnswerTimeout, BusAddress, Circuit, CircuitTemperature, Halves, TemperatureSlot, Tenths,
    Timestamp, Timezone, WarmWaterMode, WarmWaterTemperature, WorkingMode,
};
