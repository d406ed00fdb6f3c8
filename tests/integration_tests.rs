use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::future;
use sms_core::*;
use sms_web_axum::{router, AppState};
use smsproxy::config::DispatchConfig;
use smsproxy::dispatch::Dispatcher;
use smsproxy::rate_limiter::{RateLimiter, Unlimited};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// Gateway stand-in that records every part and rejects recipients in `reject`.
#[derive(Default)]
struct FakeCarrier {
    parts: Mutex<Vec<(String, String, Option<String>)>>,
    reject: Vec<&'static str>,
}

#[async_trait]
impl Carrier for FakeCarrier {
    async fn send_part(&self, req: SendRequest<'_>) -> Result<SendResponse, SmsError> {
        self.parts.lock().unwrap().push((
            req.to.to_string(),
            req.text.to_string(),
            req.udh.map(str::to_string),
        ));
        if self.reject.iter().any(|r| *r == req.to) {
            return Err(SmsError::Provider("HTTP 422: no (correct) recipients found".into()));
        }
        Ok(SendResponse {
            id: fallback_id(),
            provider: "fake",
            created_at: None,
            raw: serde_json::json!({}),
        })
    }

    async fn balance(&self) -> Result<Balance, SmsError> {
        Ok(Balance {
            payment: "postpaid".into(),
            kind: "euros".into(),
            amount: 42.0,
        })
    }
}

fn post(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/messages")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn app_with(carrier: Arc<FakeCarrier>) -> (Router, Dispatcher, tokio::task::JoinHandle<()>) {
    let (dispatcher, worker) =
        Dispatcher::spawn(carrier, Arc::new(Unlimited), &DispatchConfig::default());
    let app = router(AppState::new(Arc::new(dispatcher.clone())));
    (app, dispatcher, worker)
}

#[tokio::test]
async fn test_long_message_end_to_end() {
    let carrier = Arc::new(FakeCarrier::default());
    let (app, _dispatcher, _worker) = app_with(carrier.clone());

    let text = "0123456789".repeat(35);
    let (status, body) = call(
        &app,
        post(serde_json::json!({
            "recipient": 31612345678u64,
            "originator": "MessageBird",
            "message": text,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"Status":"Success","TotalSentParts":3}"#);

    let mut parts = carrier.parts.lock().unwrap().clone();
    parts.sort_by(|a, b| a.2.cmp(&b.2));
    let rejoined: String = parts.iter().map(|p| p.1.as_str()).collect();
    assert_eq!(rejoined, text);
    assert!(parts.iter().all(|p| p.0 == "31612345678"));
    assert!(parts.iter().all(|p| p.2.as_deref().is_some_and(|u| u.len() == 12)));
}

#[tokio::test]
async fn test_rejected_recipient_reports_failed() {
    let carrier = Arc::new(FakeCarrier {
        reject: vec!["31600000000"],
        ..FakeCarrier::default()
    });
    let (app, _dispatcher, _worker) = app_with(carrier);

    let (status, body) = call(
        &app,
        post(serde_json::json!({
            "recipient": "31600000000",
            "originator": "MessageBird",
            "message": "hello",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"Status":"Failed"}"#);
}

#[tokio::test]
async fn test_concurrent_requests_do_not_mix_outcomes() {
    let carrier = Arc::new(FakeCarrier {
        reject: vec!["31600000000"],
        ..FakeCarrier::default()
    });
    let (app, _dispatcher, _worker) = app_with(carrier.clone());

    let requests = (0..30).map(|i| {
        let app = app.clone();
        async move {
            let recipient = if i % 3 == 0 { "31600000000" } else { "31612345678" };
            let message = "m".repeat(100 + i * 10);
            let response = call(
                &app,
                post(serde_json::json!({
                    "recipient": recipient,
                    "originator": "MessageBird",
                    "message": message,
                })),
            )
            .await;
            (i, response)
        }
    });

    for (i, (status, body)) in future::join_all(requests).await {
        assert_eq!(status, StatusCode::OK);
        let outcome: DispatchOutcome = serde_json::from_str(&body).unwrap();
        if i % 3 == 0 {
            assert_eq!(outcome, DispatchOutcome::Failed, "request {i}");
        } else {
            let expected = segment(&"m".repeat(100 + i * 10)).unwrap().total_parts();
            assert_eq!(
                outcome,
                DispatchOutcome::Success {
                    parts_sent: expected
                },
                "request {i}"
            );
        }
    }
}

#[tokio::test]
async fn test_invalid_payload_never_reaches_carrier() {
    let carrier = Arc::new(FakeCarrier::default());
    let (app, _dispatcher, _worker) = app_with(carrier.clone());

    let (status, body) = call(
        &app,
        post(serde_json::json!({
            "recipient": "31612345678",
            "originator": "MessageBird",
            "message": "z".repeat(MAX_BODY_LEN + 1),
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"Error":"INVALID_ARG_MESSAGE"}"#);
    assert!(carrier.parts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_stopped_dispatcher_returns_503() {
    let carrier = Arc::new(FakeCarrier::default());
    let (app, dispatcher, worker) = app_with(carrier);

    dispatcher.stop();
    worker.await.unwrap();

    let (status, body) = call(
        &app,
        post(serde_json::json!({
            "recipient": "31612345678",
            "originator": "MessageBird",
            "message": "too late",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, r#"{"Error":"SERVICE_UNAVAILABLE"}"#);
}

#[tokio::test]
async fn test_balance_endpoint() {
    let carrier = Arc::new(FakeCarrier::default());
    let (app, _dispatcher, _worker) = app_with(carrier);

    let (status, body) = call(
        &app,
        Request::builder()
            .uri("/balance")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let balance: Balance = serde_json::from_str(&body).unwrap();
    assert_eq!(balance.amount, 42.0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_spans_requests() {
    let carrier = Arc::new(FakeCarrier::default());
    let limiter = Arc::new(RateLimiter::with_rate(1, 1, Duration::from_secs(1)));
    let (dispatcher, _worker) =
        Dispatcher::spawn(carrier.clone(), limiter, &DispatchConfig::default());

    let start = tokio::time::Instant::now();
    let submissions = (0..3).map(|_| {
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .submit(Message::new(
                    "MessageBird".to_string(),
                    "31612345678".to_string(),
                    "k".repeat(306),
                ))
                .await
        }
    });
    let outcomes = future::join_all(submissions).await;

    assert!(outcomes.into_iter().all(|o| o.unwrap().is_success()));
    assert_eq!(carrier.parts.lock().unwrap().len(), 6);
    // Six parts, one token per second: at least five intervals.
    assert!(start.elapsed() >= Duration::from_secs(5));
}
