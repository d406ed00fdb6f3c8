//! # MessageBird carrier
//!
//! [`Carrier`] implementation backed by the MessageBird REST API.
//!
//! Parts of a concatenated message are sent as `binary` messages with the
//! encoded concatenation header in `typeDetails.udh`; single-part messages go
//! out as plain `sms`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{Balance, Carrier, SendRequest, SendResponse, SmsError};
use tracing::debug;

const PROVIDER: &str = "messagebird";

/// MessageBird REST client.
#[derive(Clone, Debug)]
pub struct MessageBirdClient {
    /// Access key sent as `Authorization: AccessKey <key>`.
    pub access_key: String,
    /// API base URL; override for testing/mocking.
    pub base_url: String,
    http: reqwest::Client,
}

impl MessageBirdClient {
    pub fn new<S: Into<String>>(access_key: S) -> Self {
        Self::with_base_url(access_key, "https://rest.messagebird.com".to_string())
    }

    pub fn with_base_url<S: Into<String>>(access_key: S, base_url: String) -> Self {
        Self {
            access_key: access_key.into(),
            base_url,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn auth_header(&self) -> String {
        format!("AccessKey {}", self.access_key)
    }
}

#[derive(Debug, Serialize)]
struct TypeDetails<'a> {
    udh: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageBirdSendRequest<'a> {
    originator: &'a str,
    recipients: [&'a str; 1],
    body: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    type_details: Option<TypeDetails<'a>>,
}

impl<'a> From<&SendRequest<'a>> for MessageBirdSendRequest<'a> {
    fn from(req: &SendRequest<'a>) -> Self {
        Self {
            originator: req.from,
            recipients: [req.to],
            body: req.text,
            kind: req.udh.map(|_| "binary"),
            type_details: req.udh.map(|udh| TypeDetails { udh }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    code: i64,
    description: String,
}

/// Turn a non-success response into an [`SmsError`], keeping the carrier's own descriptions.
fn error_from_response(status: reqwest::StatusCode, body: &str) -> SmsError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .filter(|b| !b.errors.is_empty())
        .map(|b| {
            b.errors
                .iter()
                .map(|e| format!("{} (code {})", e.description, e.code))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_else(|| body.to_string());

    if status == reqwest::StatusCode::UNAUTHORIZED {
        SmsError::Auth(detail)
    } else {
        SmsError::Provider(format!("HTTP {}: {}", status, detail))
    }
}

#[async_trait]
impl Carrier for MessageBirdClient {
    async fn send_part(&self, req: SendRequest<'_>) -> Result<SendResponse, SmsError> {
        let payload = MessageBirdSendRequest::from(&req);
        let res = self
            .http
            .post(self.url("messages"))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&payload)
            .send()
            .await
            .map_err(|e| SmsError::Http(e.to_string()))?;

        let status = res.status();
        let raw_text = res
            .text()
            .await
            .map_err(|e| SmsError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_response(status, &raw_text));
        }

        let raw_json: serde_json::Value = serde_json::from_str(&raw_text)
            .unwrap_or_else(|_| serde_json::json!({ "raw": raw_text }));

        let id = raw_json
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(sms_core::fallback_id);

        let created_at = raw_json
            .get("createdDatetime")
            .and_then(|v| v.as_str())
            .and_then(|s| {
                time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
                    .ok()
            });

        debug!(id = %id, to = req.to, udh = ?req.udh, "carrier accepted part");

        Ok(SendResponse {
            id,
            provider: PROVIDER,
            created_at,
            raw: raw_json,
        })
    }

    async fn balance(&self) -> Result<Balance, SmsError> {
        let res = self
            .http
            .get(self.url("balance"))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| SmsError::Http(e.to_string()))?;

        let status = res.status();
        let raw_text = res
            .text()
            .await
            .map_err(|e| SmsError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_response(status, &raw_text));
        }

        serde_json::from_str(&raw_text)
            .map_err(|e| SmsError::Unexpected(format!("balance decode: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorded {
        bodies: Arc<Mutex<Vec<Value>>>,
        auth: Arc<Mutex<Vec<String>>>,
    }

    async fn fake_messages(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        rec.auth.lock().unwrap().push(auth.clone());
        rec.bodies.lock().unwrap().push(body);

        if auth != "AccessKey test_key" {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "errors": [{
                    "code": 2,
                    "description": "Request not allowed (incorrect access_key)",
                    "parameter": "access_key"
                }]})),
            );
        }
        (
            StatusCode::CREATED,
            Json(json!({
                "id": "e8077d803532c0b5937c639b60216938",
                "createdDatetime": "2016-05-03T14:26:57+00:00"
            })),
        )
    }

    async fn fake_balance() -> Json<Value> {
        Json(json!({ "payment": "prepaid", "type": "credits", "amount": 9.2 }))
    }

    async fn spawn_gateway() -> (String, Recorded) {
        let rec = Recorded::default();
        let app = Router::new()
            .route("/messages", post(fake_messages))
            .route("/balance", get(fake_balance))
            .with_state(rec.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), rec)
    }

    #[test]
    fn single_part_payload_has_no_udh() {
        let req = SendRequest {
            to: "31612345678",
            from: "MessageBird",
            text: "hi",
            udh: None,
        };
        let j = serde_json::to_value(MessageBirdSendRequest::from(&req)).unwrap();
        assert_eq!(
            j,
            json!({ "originator": "MessageBird", "recipients": ["31612345678"], "body": "hi" })
        );
    }

    #[test]
    fn concatenated_payload_is_binary_with_udh() {
        let req = SendRequest {
            to: "31612345678",
            from: "MessageBird",
            text: "part",
            udh: Some("060003c40201"),
        };
        let j = serde_json::to_value(MessageBirdSendRequest::from(&req)).unwrap();
        assert_eq!(j["type"], "binary");
        assert_eq!(j["typeDetails"]["udh"], "060003c40201");
    }

    #[test]
    fn error_body_descriptions_are_kept() {
        let body = r#"{"errors":[{"code":9,"description":"no (correct) recipients found","parameter":"recipients"}]}"#;
        match error_from_response(reqwest::StatusCode::UNPROCESSABLE_ENTITY, body) {
            SmsError::Provider(msg) => {
                assert!(msg.contains("422"));
                assert!(msg.contains("no (correct) recipients found (code 9)"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn sends_part_to_gateway() {
        let (base, rec) = spawn_gateway().await;
        let client = MessageBirdClient::with_base_url("test_key", base);

        let res = client
            .send_part(SendRequest {
                to: "31612345678",
                from: "MessageBird",
                text: "hello",
                udh: Some("060003010201"),
            })
            .await
            .unwrap();

        assert_eq!(res.id, "e8077d803532c0b5937c639b60216938");
        assert_eq!(res.provider, "messagebird");
        assert!(res.created_at.is_some());

        let bodies = rec.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["recipients"][0], "31612345678");
        assert_eq!(bodies[0]["typeDetails"]["udh"], "060003010201");
    }

    #[tokio::test]
    async fn rejected_access_key_is_auth_error() {
        let (base, _rec) = spawn_gateway().await;
        let client = MessageBirdClient::with_base_url("wrong", base);

        let err = client
            .send_part(SendRequest {
                to: "31612345678",
                from: "MessageBird",
                text: "hello",
                udh: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::Auth(ref m) if m.contains("incorrect access_key")));
    }

    #[tokio::test]
    async fn reads_balance() {
        let (base, _rec) = spawn_gateway().await;
        let client = MessageBirdClient::with_base_url("test_key", base);

        let balance = client.balance().await.unwrap();
        assert_eq!(balance.payment, "prepaid");
        assert_eq!(balance.kind, "credits");
        assert_eq!(balance.amount, 9.2);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_http_error() {
        let client = MessageBirdClient::with_base_url("test_key", "http://127.0.0.1:1".to_string());
        assert!(matches!(client.balance().await, Err(SmsError::Http(_))));
    }
}
