//! Splitting message bodies into transport-sized parts.
//!
//! Lengths are counted in Unicode scalar values, not bytes, and chunks never
//! split a character.

use rand::{rng, Rng};
use serde::Serialize;

use crate::{ConcatenationHeader, SmsError};

/// Longest body that still fits a single SMS.
pub const SINGLE_SMS_MAX_LEN: usize = 160;
/// Part length once seven septets are spent on the concatenation header.
pub const CONCAT_SMS_MAX_LEN: usize = 153;
/// Longest alphanumeric originator a carrier accepts.
pub const ORIGINATOR_MAX_LEN: usize = 11;
/// `total_parts` is a single byte.
pub const MAX_PARTS: usize = u8::MAX as usize;
/// Longest body [`segment`] accepts.
pub const MAX_BODY_LEN: usize = MAX_PARTS * CONCAT_SMS_MAX_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePart {
    pub header: ConcatenationHeader,
    pub text: String,
}

impl MessagePart {
    /// Encoded header to attach when sending, `None` for single-part messages.
    pub fn udh(&self) -> Option<String> {
        (self.header.total_parts > 1).then(|| self.header.encode())
    }
}

/// A message body split into ordered parts sharing one reference number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentedMessage {
    pub reference: u8,
    pub parts: Vec<MessagePart>,
}

impl SegmentedMessage {
    pub fn is_concatenated(&self) -> bool {
        self.parts.len() > 1
    }

    pub fn total_parts(&self) -> usize {
        self.parts.len()
    }
}

/// Split `body` into parts under a freshly drawn reference number.
///
/// The reference is random and independent across calls. Two in-flight
/// multi-part messages to the same handset can collide; reassembly then
/// depends on the handset.
pub fn segment(body: &str) -> Result<SegmentedMessage, SmsError> {
    let reference: u8 = rng().random();
    segment_with_reference(body, reference)
}

/// Deterministic variant of [`segment`].
///
/// # Errors
///
/// Returns [`SmsError::Invalid`] when the body needs more than [`MAX_PARTS`] parts.
pub fn segment_with_reference(body: &str, reference: u8) -> Result<SegmentedMessage, SmsError> {
    let len = body.chars().count();

    if len <= SINGLE_SMS_MAX_LEN {
        return Ok(SegmentedMessage {
            reference,
            parts: vec![MessagePart {
                header: ConcatenationHeader::new(reference, 1, 1),
                text: body.to_string(),
            }],
        });
    }

    let total = len.div_ceil(CONCAT_SMS_MAX_LEN);
    let total_parts = u8::try_from(total).map_err(|_| {
        SmsError::Invalid(format!(
            "message of {len} characters needs {total} parts, at most {MAX_PARTS} allowed"
        ))
    })?;

    let chars: Vec<char> = body.chars().collect();
    let parts = chars
        .chunks(CONCAT_SMS_MAX_LEN)
        .zip(1..=total_parts)
        .map(|(chunk, sequence)| MessagePart {
            header: ConcatenationHeader::new(reference, total_parts, sequence),
            text: chunk.iter().collect(),
        })
        .collect();

    Ok(SegmentedMessage { reference, parts })
}
