use snafu::Snafu;

use crate::types;

/// Failure causes of a bus operation.
///
/// The dispatcher reports all of them as the same failure marker, but they
/// are kept apart here and counted separately in [`Statistics`](crate::Statistics).
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// Rejected before any bus activity.
    #[snafu(display("Parameter out of range: {}", source))]
    ParameterOutOfRange { source: types::Error },
    /// No poll for our address arrived before the deadline.
    #[snafu(display("Timed out waiting for our poll address"))]
    PollTimeout,
    /// Nothing was received before the answer timeout.
    #[snafu(display("No reply before the answer timeout"))]
    ReplyTimeout,
    /// The reply can't hold a header and checksum.
    #[snafu(display("Reply too short: {} byte(s)", len))]
    FrameTooShort { len: usize },
    #[snafu(display(
        "Invalid checksum: expected = 0x{:02X}, actual = 0x{:02X}",
        expected,
        actual
    ))]
    ChecksumInvalid { expected: u8, actual: u8 },
    /// The reply belongs to a different message than the one requested.
    #[snafu(display(
        "Message type mismatch: requested 0x{:02X}, received 0x{:02X}",
        requested,
        received
    ))]
    MessageTypeMismatch { requested: u8, received: u8 },
    /// The payload doesn't fit the catalog layout of its message type.
    #[snafu(display("Malformed payload for message type 0x{:02X}", message_type))]
    MalformedPayload { message_type: u8 },
    #[snafu(display("Write not acknowledged, reply 0x{:02X}", reply))]
    WriteNotAcknowledged { reply: u8 },
    /// The read-back value still differs after the last write attempt.
    #[snafu(display("Read-back of message type 0x{:02X} doesn't match", message_type))]
    VerifyMismatch { message_type: u8 },
    /// The underlying serial link reported an error.
    #[snafu(display("Bus link failure"))]
    Link,
}

impl Error {
    /// Write-and-verify sequences are restarted only for these causes.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::VerifyMismatch { .. } | Error::WriteNotAcknowledged { .. }
        )
    }
}

impl From<types::Error> for Error {
    fn from(source: types::Error) -> Self {
        Error::ParameterOutOfRange { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(Error::VerifyMismatch { message_type: 0x3D }.is_retryable());
        assert!(Error::WriteNotAcknowledged { reply: 0x04 }.is_retryable());
        assert!(!Error::ReplyTimeout.is_retryable());
        assert!(!Error::MessageTypeMismatch {
            requested: 0x18,
            received: 0x19
        }
        .is_retryable());
        assert!(!Error::ChecksumInvalid {
            expected: 1,
            actual: 2
        }
        .is_retryable());
    }

    #[test]
    fn test_from_type_error() {
        assert_eq!(
            Error::from(types::Error::InvalidTemperature),
            Error::ParameterOutOfRange {
                source: types::Error::InvalidTemperature
            }
        );
    }
}
