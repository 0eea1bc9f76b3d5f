//! Operation and failure counters, reported by the statistics commands.

use crate::error::Error;
use crate::types::Timestamp;

/// Counters since the last reset.
///
/// `failed` counts operations; the per-cause counters count every failed
/// exchange, including write attempts that were retried.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    /// When the counters were last reset, if ever.
    pub since: Option<Timestamp>,
    pub operations: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub rejected_parameters: u32,
    pub poll_timeouts: u32,
    pub reply_timeouts: u32,
    pub short_frames: u32,
    pub checksum_errors: u32,
    pub type_mismatches: u32,
    pub malformed_payloads: u32,
    pub write_nacks: u32,
    pub verify_mismatches: u32,
    pub link_errors: u32,
    pub write_retries: u32,
}

impl Statistics {
    pub fn record_success(&mut self) {
        self.operations = self.operations.wrapping_add(1);
        self.succeeded = self.succeeded.wrapping_add(1);
    }

    pub fn record_failure(&mut self, err: &Error) {
        self.operations = self.operations.wrapping_add(1);
        self.failed = self.failed.wrapping_add(1);
        self.record_cause(err);
    }

    /// A write-and-verify attempt failed with `err` and is about to be repeated.
    pub fn record_retry(&mut self, err: &Error) {
        self.write_retries = self.write_retries.wrapping_add(1);
        self.record_cause(err);
    }

    fn record_cause(&mut self, err: &Error) {
        let counter = match err {
            Error::ParameterOutOfRange { .. } => &mut self.rejected_parameters,
            Error::PollTimeout => &mut self.poll_timeouts,
            Error::ReplyTimeout => &mut self.reply_timeouts,
            Error::FrameTooShort { .. } => &mut self.short_frames,
            Error::ChecksumInvalid { .. } => &mut self.checksum_errors,
            Error::MessageTypeMismatch { .. } => &mut self.type_mismatches,
            Error::MalformedPayload { .. } => &mut self.malformed_payloads,
            Error::WriteNotAcknowledged { .. } => &mut self.write_nacks,
            Error::VerifyMismatch { .. } => &mut self.verify_mismatches,
            Error::Link => &mut self.link_errors,
        };
        *counter = counter.wrapping_add(1);
    }

    /// Clear all counters and remember when.
    pub fn reset(&mut self, now: Timestamp) {
        *self = Statistics {
            since: Some(now),
            ..Statistics::default()
        };
    }
}
