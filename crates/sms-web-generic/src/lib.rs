use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use sms_core::{
    HttpStatus, Message, SmsError, SmsService, WebError, WebResponse, MAX_BODY_LEN,
    ORIGINATOR_MAX_LEN,
};
use tracing::{debug, warn};

pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
pub const MISSING_ARG_RECIPIENT: &str = "MISSING_ARG_RECIPIENT";
pub const INVALID_ARG_RECIPIENT: &str = "INVALID_ARG_RECIPIENT";
pub const MISSING_ARG_ORIGINATOR: &str = "MISSING_ARG_ORIGINATOR";
pub const INVALID_ARG_ORIGINATOR: &str = "INVALID_ARG_ORIGINATOR";
pub const MISSING_ARG_MESSAGE: &str = "MISSING_ARG_MESSAGE";
pub const INVALID_ARG_MESSAGE: &str = "INVALID_ARG_MESSAGE";
pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
pub const CARRIER_ERROR: &str = "CARRIER_ERROR";

/// Inbound payload, e.g.
/// `{"recipient":31612345678,"originator":"MessageBird","message":"This is a test message."}`.
/// The recipient may be a JSON number or a numeric string.
#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    recipient: Option<Value>,
    #[serde(default)]
    originator: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Decode and validate a submission body. Checks run in a fixed order so
/// clients always see the first problem.
pub fn parse_message(body: &[u8]) -> Result<Message, WebError> {
    let payload: MessagePayload =
        serde_json::from_slice(body).map_err(|e| WebError::Decode(e.to_string()))?;

    let recipient = match payload.recipient {
        None | Some(Value::Null) => return Err(WebError::Validation(MISSING_ARG_RECIPIENT)),
        Some(Value::String(s)) if s.is_empty() => {
            return Err(WebError::Validation(MISSING_ARG_RECIPIENT))
        }
        Some(Value::String(s)) => match s.parse::<i64>() {
            Ok(_) => s,
            Err(_) => return Err(WebError::Validation(INVALID_ARG_RECIPIENT)),
        },
        Some(Value::Number(n)) => match n.as_i64() {
            Some(n) => n.to_string(),
            None => return Err(WebError::Validation(INVALID_ARG_RECIPIENT)),
        },
        Some(_) => return Err(WebError::Validation(INVALID_ARG_RECIPIENT)),
    };

    let originator = payload.originator.unwrap_or_default();
    if originator.is_empty() {
        return Err(WebError::Validation(MISSING_ARG_ORIGINATOR));
    }
    if originator.chars().count() > ORIGINATOR_MAX_LEN {
        return Err(WebError::Validation(INVALID_ARG_ORIGINATOR));
    }

    let message = payload.message.unwrap_or_default();
    if message.is_empty() {
        return Err(WebError::Validation(MISSING_ARG_MESSAGE));
    }
    if message.chars().count() > MAX_BODY_LEN {
        return Err(WebError::Validation(INVALID_ARG_MESSAGE));
    }

    Ok(Message {
        originator,
        recipient,
        body: message,
    })
}

/// Framework-agnostic processor that handles message submission and balance queries
#[derive(Clone)]
pub struct MessageProcessor {
    service: Arc<dyn SmsService>,
}

impl MessageProcessor {
    pub fn new(service: Arc<dyn SmsService>) -> Self {
        Self { service }
    }

    /// Validate the body, submit it and wait for the aggregated outcome.
    pub async fn process_message(&self, body: &[u8]) -> WebResponse {
        match self.process_message_internal(body).await {
            Ok(outcome) => WebResponse::success(&outcome),
            Err(e) => self.error_to_response(e),
        }
    }

    async fn process_message_internal(
        &self,
        body: &[u8],
    ) -> Result<sms_core::DispatchOutcome, WebError> {
        let message = parse_message(body)?;
        debug!(
            recipient = %message.recipient,
            chars = message.body.chars().count(),
            "submitting message"
        );
        Ok(self.service.submit(message).await?)
    }

    pub async fn process_balance(&self) -> WebResponse {
        match self.service.balance().await {
            Ok(balance) => WebResponse::success(&balance),
            Err(SmsError::Unavailable(_)) => {
                WebResponse::error(HttpStatus::ServiceUnavailable, SERVICE_UNAVAILABLE)
            }
            Err(e) => {
                warn!(error = %e, "balance query failed");
                WebResponse::error(HttpStatus::BadGateway, CARRIER_ERROR)
            }
        }
    }

    fn error_to_response(&self, error: WebError) -> WebResponse {
        match error {
            WebError::Decode(msg) => {
                warn!(error = %msg, "undecodable message payload");
                WebResponse::error(HttpStatus::InternalServerError, INTERNAL_ERROR)
            }
            WebError::Validation(code) => WebResponse::error(HttpStatus::BadRequest, code),
            WebError::Sms(SmsError::Unavailable(_)) => {
                WebResponse::error(HttpStatus::ServiceUnavailable, SERVICE_UNAVAILABLE)
            }
            WebError::Sms(SmsError::Invalid(_)) => {
                WebResponse::error(HttpStatus::BadRequest, INVALID_ARG_MESSAGE)
            }
            WebError::Sms(e) => {
                warn!(error = %e, "message submission failed");
                WebResponse::error(HttpStatus::InternalServerError, INTERNAL_ERROR)
            }
        }
    }
}

/// Helper trait for framework adapters to convert responses
pub trait ResponseConverter {
    type ResponseType;

    fn from_web_response(response: WebResponse) -> Self::ResponseType;
}
