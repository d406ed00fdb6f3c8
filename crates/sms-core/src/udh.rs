//! Concatenated-SMS user data header.
//!
//! Every part of a concatenated message carries a five byte information
//! element: `[0x00, 0x03, reference, total, sequence]`. `0x00` is the IEI for
//! "concatenated short message, 8-bit reference" and `0x03` its data length.
//! On the wire the gateway expects a hex string prefixed with the header
//! length byte `06`.

use std::fmt;

use serde::{Deserialize, Serialize};

const IEI_CONCAT_8BIT: u8 = 0x00;
const IEI_CONCAT_8BIT_LEN: u8 = 0x03;
const HEADER_LENGTH: u8 = 0x06;

/// Position of one part within a concatenated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConcatenationHeader {
    /// Shared by all parts of one message; lets the handset group them.
    pub reference: u8,
    pub total_parts: u8,
    /// 1-based, never greater than `total_parts`.
    pub sequence: u8,
}

impl ConcatenationHeader {
    pub fn new(reference: u8, total_parts: u8, sequence: u8) -> Self {
        debug_assert!(total_parts >= 1);
        debug_assert!((1..=total_parts).contains(&sequence));
        Self {
            reference,
            total_parts,
            sequence,
        }
    }

    /// The raw information element.
    pub fn to_bytes(&self) -> [u8; 5] {
        [
            IEI_CONCAT_8BIT,
            IEI_CONCAT_8BIT_LEN,
            self.reference,
            self.total_parts,
            self.sequence,
        ]
    }

    /// Lowercase hex of the length byte followed by the element, 12 chars.
    pub fn encode(&self) -> String {
        hex::encode([
            HEADER_LENGTH,
            IEI_CONCAT_8BIT,
            IEI_CONCAT_8BIT_LEN,
            self.reference,
            self.total_parts,
            self.sequence,
        ])
    }
}

impl fmt::Display for ConcatenationHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
