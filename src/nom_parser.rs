use nom::bytes::complete::take;
use nom::combinator::map;
use nom::number::complete::{be_i16, be_u16, be_u24, u8 as byte};
use nom::sequence::{preceded, tuple};
use nom::IResult;

use crate::types::{Halves, Tenths};

type Buf = [u8];

pub(crate) mod reply {
    use super::*;

    const HEADER_LEN: usize = 4;
    // checksum + end-of-frame byte
    const TRAILER_LEN: usize = 2;

    #[derive(PartialEq, Eq, Copy, Clone, Debug)]
    pub(crate) struct Header {
        pub source: u8,
        pub destination: u8,
        pub message_type: u8,
        pub offset: u8,
    }

    pub(crate) fn header(buf: &Buf) -> IResult<&Buf, Header> {
        map(
            tuple((byte, byte, byte, byte)),
            |(source, destination, message_type, offset)| Header {
                source,
                destination,
                message_type,
                offset,
            },
        )(buf)
    }

    /// Split a captured frame into its header and payload, dropping the trailer.
    pub(crate) fn split_frame(frame: &Buf) -> IResult<&Buf, (Header, &Buf)> {
        let payload_len = frame.len().saturating_sub(HEADER_LEN + TRAILER_LEN);
        let (buf, header) = header(frame)?;
        let (buf, payload) = take(payload_len)(buf)?;
        Ok((buf, (header, payload)))
    }

}

pub(crate) mod fields {
    use super::*;

    /// Typed access to payload bytes at fixed indexes.
    ///
    /// Every accessor returns `None` if the payload is too short for the field.
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct Fields<'a> {
        payload: &'a Buf,
    }

    impl<'a> Fields<'a> {
        pub(crate) fn new(payload: &'a Buf) -> Self {
            Self { payload }
        }

        pub(crate) fn byte(&self, index: usize) -> Option<u8> {
            self.at(index, byte)
        }

        pub(crate) fn word(&self, index: usize) -> Option<u16> {
            self.at(index, be_u16)
        }

        /// Signed 16-bit big-endian value, scaled by 1/10.
        pub(crate) fn tenths(&self, index: usize) -> Option<Tenths> {
            self.at(index, map(be_i16, |raw| Tenths(raw.into())))
        }

        /// Unsigned 16-bit big-endian value, scaled by 1/10.
        pub(crate) fn unsigned_tenths(&self, index: usize) -> Option<Tenths> {
            self.at(index, map(be_u16, |raw| Tenths(raw.into())))
        }

        /// Single byte scaled by 1/10.
        pub(crate) fn byte_tenths(&self, index: usize) -> Option<Tenths> {
            self.at(index, map(byte, |raw| Tenths(raw.into())))
        }

        pub(crate) fn halves(&self, index: usize) -> Option<Halves> {
            self.at(index, map(byte, Halves))
        }

        pub(crate) fn flag(&self, index: usize, bit: u8) -> Option<bool> {
            debug_assert!(bit < 8);
            self.at(index, map(byte, move |raw| (raw & (1 << bit)) != 0))
        }

        /// 24-bit counter, most significant byte first.
        pub(crate) fn counter(&self, index: usize) -> Option<u32> {
            self.at(index, be_u24)
        }

        pub(crate) fn pair(&self, index: usize) -> Option<[u8; 2]> {
            self.at(index, map(tuple((byte, byte)), |(a, b)| [a, b]))
        }

        fn at<O, P>(&self, index: usize, parser: P) -> Option<O>
        where
            P: FnMut(&'a Buf) -> IResult<&'a Buf, O>,
        {
            preceded(take(index), parser)(self.payload)
                .ok()
                .map(|(_, out)| out)
        }
    }

}
