//! # SMS Core
//!
//! Core traits and types for the smsproxy SMS gateway proxy.
//!
//! This crate provides the fundamental building blocks for SMS dispatch:
//! - [`Carrier`] trait for the remote gateway that transmits one part at a time
//! - [`SmsService`] trait for the inbound side (submit a message, query balance)
//! - [`segment`] for splitting long text into concatenated parts
//! - [`ConcatenationHeader`] for the user data header attached to each part
//! - Common types for messages, outcomes, responses and errors
//!
//! ## Example
//!
//! ```rust
//! use sms_core::segment_with_reference;
//!
//! let long = "x".repeat(161);
//! let message = segment_with_reference(&long, 7).unwrap();
//! assert_eq!(message.parts.len(), 2);
//! assert_eq!(message.parts[0].udh().as_deref(), Some("060003070201"));
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub mod segment;
pub mod udh;

pub use segment::{
    segment, segment_with_reference, MessagePart, SegmentedMessage, CONCAT_SMS_MAX_LEN,
    MAX_BODY_LEN, MAX_PARTS, ORIGINATOR_MAX_LEN, SINGLE_SMS_MAX_LEN,
};
pub use udh::ConcatenationHeader;

/// Errors that can occur during SMS operations
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// HTTP communication error
    #[error("http error: {0}")]
    Http(String),
    /// Authentication/authorization error
    #[error("authentication error: {0}")]
    Auth(String),
    /// Invalid request parameters
    #[error("invalid request: {0}")]
    Invalid(String),
    /// SMS carrier returned an error
    #[error("provider error: {0}")]
    Provider(String),
    /// The dispatcher has stopped and no longer accepts messages
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// Unexpected error occurred
    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// Error types for the inbound HTTP surface
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// The request body is not a decodable message payload
    #[error("decode failed: {0}")]
    Decode(String),
    /// A field failed validation; carries the wire error code
    #[error("validation failed: {0}")]
    Validation(&'static str),
    #[error("SMS processing error: {0}")]
    Sms(#[from] SmsError),
}

/// HTTP status code for web responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    InternalServerError = 500,
    BadGateway = 502,
    ServiceUnavailable = 503,
}

impl HttpStatus {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// A text message accepted for delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Sender identity shown on the handset (at most [`ORIGINATOR_MAX_LEN`] chars).
    pub originator: String,
    pub recipient: String,
    pub body: String,
}

impl Message {
    pub fn new<S: Into<String>>(originator: S, recipient: S, body: S) -> Self {
        Self {
            originator: originator.into(),
            recipient: recipient.into(),
            body: body.into(),
        }
    }
}

/// Aggregated result of dispatching every part of one message.
///
/// Serializes as `{"Status":"Success","TotalSentParts":n}` or `{"Status":"Failed"}`.
/// A `Failed` outcome does not say which parts were lost.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "Status")]
pub enum DispatchOutcome {
    Success {
        #[serde(rename = "TotalSentParts")]
        parts_sent: usize,
    },
    Failed,
}

impl DispatchOutcome {
    /// Fold per-part results: success only if every one of `total` parts was sent.
    pub fn from_parts(total: usize, sent: usize) -> Self {
        if total > 0 && sent == total {
            Self::Success { parts_sent: sent }
        } else {
            Self::Failed
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn parts_sent(&self) -> Option<usize> {
        match self {
            Self::Success { parts_sent } => Some(*parts_sent),
            Self::Failed => None,
        }
    }
}

/// One transport unit handed to a [`Carrier`].
#[derive(Debug, Clone, Serialize)]
pub struct SendRequest<'a> {
    pub to: &'a str,
    pub from: &'a str,
    pub text: &'a str,
    /// Encoded concatenation header; present only for multi-part messages.
    pub udh: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendResponse {
    pub id: String,
    /// Name of the carrier that produced the response, e.g. "messagebird".
    pub provider: &'static str,
    pub created_at: Option<OffsetDateTime>,
    /// Raw carrier payload for debugging / audit.
    pub raw: serde_json::Value,
}

/// Carrier account balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub payment: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: f64,
}

/// Generic response that can be converted to any framework's response type
#[derive(Debug, Clone)]
pub struct WebResponse {
    pub status: HttpStatus,
    pub body: String,
    pub content_type: String,
}

impl WebResponse {
    pub fn success<T: Serialize>(payload: &T) -> Self {
        Self {
            status: HttpStatus::Ok,
            body: serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string()),
            content_type: "application/json".to_string(),
        }
    }

    /// Error body in the `{"Error":"CODE"}` shape clients of the proxy expect.
    pub fn error(status: HttpStatus, code: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "Error": code }).to_string(),
            content_type: "application/json".to_string(),
        }
    }
}

/// The remote gateway that transmits a single SMS part.
#[async_trait]
pub trait Carrier: Send + Sync {
    /// Send one part. `req.udh` is set only when the part belongs to a concatenated message.
    async fn send_part(&self, req: SendRequest<'_>) -> Result<SendResponse, SmsError>;

    /// Ask the carrier for the account balance.
    async fn balance(&self) -> Result<Balance, SmsError>;
}

/// Inbound side of the proxy: what the HTTP layer talks to.
#[async_trait]
pub trait SmsService: Send + Sync {
    /// Submit a message and wait for its aggregated outcome.
    async fn submit(&self, message: Message) -> Result<DispatchOutcome, SmsError>;

    async fn balance(&self) -> Result<Balance, SmsError>;
}

/// Utility to create a pseudo id if a carrier doesn't return one.
pub fn fallback_id() -> String {
    Uuid::new_v4().to_string()
}
