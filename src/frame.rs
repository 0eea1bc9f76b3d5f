//! Frame checksum and the fixed layout of outgoing datagrams.
//!
//! Outgoing datagram, 7 slots:
//!
//! | 0      | 1           | 2            | 3      | 4              | 5        | 6            |
//! |--------|-------------|--------------|--------|----------------|----------|--------------|
//! | source | destination | message type | offset | length / value | checksum | end of frame |
//!
//! The end-of-frame slot is never written as data; the transport signals it
//! with a break. Received frames end with the captured break byte too, so
//! the checksum always sits at `len - 2` and covers everything before it.

use snafu::ensure;

use crate::error::{ChecksumInvalidSnafu, Error, FrameTooShortSnafu};
use crate::types::BusAddress;

/// Length of every outgoing datagram, including the end-of-frame slot.
pub const DATAGRAM_LEN: usize = 7;
/// Longest frame captured by the receiver, end-of-frame byte included.
pub const MAX_FRAME_LEN: usize = 32;
/// A reply shorter than this can't carry header and checksum.
pub const MIN_FRAME_LEN: usize = 5;

/// Set on the destination byte of read requests.
pub const READ_FLAG: u8 = 0x80;
/// Single-byte reply to an accepted write.
pub const ACK: u8 = 0x01;
/// Single-byte reply to a rejected write. The engine never matches it
/// explicitly: any reply byte other than [`ACK`] counts as a rejection.
pub const NAK: u8 = 0x04;

const CHECKSUM_FEEDBACK: u8 = 0x0C;

/// Compute the checksum of `frame`, skipping its last two bytes (checksum
/// and end-of-frame).
pub fn checksum(frame: &[u8]) -> u8 {
    let end = frame.len().saturating_sub(2);
    frame[..end].iter().fold(0, |crc: u8, &byte| {
        let crc = if crc & 0x80 != 0 {
            ((crc ^ CHECKSUM_FEEDBACK) << 1) | 0x01
        } else {
            crc << 1
        };
        crc ^ byte
    })
}

/// True if the byte at `len - 2` matches the checksum of the preceding bytes.
pub fn is_valid(frame: &[u8]) -> bool {
    match frame.len() {
        0 | 1 => false,
        len => frame[len - 2] == checksum(frame),
    }
}

/// Check a captured reply for minimum length and checksum.
pub fn validate(frame: &[u8]) -> Result<(), Error> {
    ensure!(
        frame.len() >= MIN_FRAME_LEN,
        FrameTooShortSnafu { len: frame.len() }
    );
    let actual = frame[frame.len() - 2];
    let expected = checksum(frame);
    ensure!(expected == actual, ChecksumInvalidSnafu { expected, actual });
    Ok(())
}

/// One outgoing frame. Built fresh for every exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram([u8; DATAGRAM_LEN]);

impl Datagram {
    /// A read request for `length` bytes of `message_type`, starting at `offset`.
    pub fn read(
        source: BusAddress,
        unit: BusAddress,
        message_type: u8,
        offset: u8,
        length: u8,
    ) -> Self {
        Self::seal([*source, *unit | READ_FLAG, message_type, offset, length, 0, 0])
    }

    /// A write of a single `value` at `offset` into the record of `message_type`.
    /// Writes address the unit without the read flag.
    pub fn write(
        source: BusAddress,
        unit: BusAddress,
        message_type: u8,
        offset: u8,
        value: u8,
    ) -> Self {
        Self::seal([*source, *unit, message_type, offset, value, 0, 0])
    }

    fn seal(mut bytes: [u8; DATAGRAM_LEN]) -> Self {
        bytes[DATAGRAM_LEN - 2] = checksum(&bytes);
        Self(bytes)
    }

    /// The bytes written to the bus; the end-of-frame slot is left out.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..DATAGRAM_LEN - 1]
    }

    pub const fn is_read(&self) -> bool {
        self.0[1] & READ_FLAG != 0
    }

    pub const fn destination(&self) -> u8 {
        self.0[1] & !READ_FLAG
    }

    pub const fn message_type(&self) -> u8 {
        self.0[2]
    }

    pub const fn offset(&self) -> u8 {
        self.0[3]
    }

    /// Requested length for reads, written value for writes.
    pub const fn data(&self) -> u8 {
        self.0[4]
    }

    pub const fn checksum(&self) -> u8 {
        self.0[DATAGRAM_LEN - 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_vectors() {
        assert_eq!(checksum(&[0xFF, 0x80, 0x01, 0x00, 0x00]), 0xCF);
        assert_eq!(checksum(&[0x10, 0x0B, 0x06, 0x00, 0x00, 0x00]), 0xA0);
        // only the trailing two bytes are excluded
        assert_eq!(
            checksum(&[0xFF, 0x80, 0x01, 0xAA, 0x55]),
            checksum(&[0xFF, 0x80, 0x01, 0x00, 0x00])
        );
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x12, 0x34]), 0);
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let frame = [0x08, 0x0B, 0x18, 0x00, 0x2D, 0x02, 0x0F, 0x00, 0x00];
        assert_eq!(checksum(&frame), checksum(&frame));
    }

    #[test]
    fn test_is_valid() {
        let mut frame = [0xFF, 0x80, 0x01, 0xCF, 0x00];
        assert!(is_valid(&frame));
        frame[3] = 0xCE;
        assert!(!is_valid(&frame));
        frame[3] = 0xCF;
        frame[4] = 0x42; // the end-of-frame byte isn't covered
        assert!(is_valid(&frame));
        assert!(!is_valid(&[0x00]));
        assert!(!is_valid(&[]));
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate(&[0xFF, 0x80, 0x01, 0xCF, 0x00]), Ok(()));
        assert_eq!(
            validate(&[0xFF, 0x80, 0x01, 0xCE, 0x00]),
            Err(Error::ChecksumInvalid {
                expected: 0xCF,
                actual: 0xCE
            })
        );
        assert_eq!(
            validate(&[ACK, 0x00]),
            Err(Error::FrameTooShort { len: 2 })
        );
    }

    #[test]
    fn test_read_datagram() {
        let dg = Datagram::read(BusAddress::GATEWAY, BusAddress::BOILER, 0x18, 0, 22);
        assert_eq!(dg.as_bytes(), &[0x0B, 0x88, 0x18, 0x00, 0x16, 0xE2]);
        assert!(dg.is_read());
        assert_eq!(dg.destination(), 0x08);
        assert_eq!(dg.checksum(), 0xE2);
    }

    #[test]
    fn test_write_datagram() {
        let dg = Datagram::write(BusAddress::GATEWAY, BusAddress::THERMOSTAT, 0x3D, 7, 2);
        assert_eq!(dg.as_bytes(), &[0x0B, 0x10, 0x3D, 0x07, 0x02, 0xC8]);
        assert!(!dg.is_read());
        assert_eq!(dg.offset(), 7);
        assert_eq!(dg.data(), 2);
    }
}
