//! Dispatch queue and worker.
//!
//! Callers hand a [`Message`] to a [`Dispatcher`], which enqueues it on a
//! bounded channel together with a private oneshot slot and waits for the
//! outcome. A single [`DispatchWorker`] drains the channel in FIFO order. For
//! each message it:
//!
//! 1. segments the body into parts,
//! 2. takes one rate-limit token per part from the shared [`TokenSource`],
//! 3. spawns the carrier call for that part and moves on to the next token
//!    without waiting for the call,
//! 4. joins every part task and folds the results into one [`DispatchOutcome`].
//!
//! The token source is shared across all requests, so total throughput
//! towards the carrier is capped by it regardless of how many callers are
//! waiting.
//!
//! Stopping cancels a [`CancellationToken`]. The worker finishes the message
//! it is sending and writes its outcome, then closes the queue and returns.
//! Callers still queued receive [`SmsError::Unavailable`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use sms_core::{
    segment, Balance, Carrier, DispatchOutcome, Message, MessagePart, SendRequest, SmsError,
    SmsService,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::rate_limiter::TokenSource;

/// A message plus the single-assignment slot its outcome is written to.
#[derive(Debug)]
struct DispatchRequest {
    message: Message,
    outcome: oneshot::Sender<DispatchOutcome>,
}

fn unavailable() -> SmsError {
    SmsError::Unavailable("dispatcher stopped".into())
}

/// Cheap, clonable handle to the dispatch worker.
#[derive(Clone)]
pub struct Dispatcher {
    queue: mpsc::Sender<DispatchRequest>,
    shutdown: CancellationToken,
    carrier: Arc<dyn Carrier>,
}

impl Dispatcher {
    /// Start a worker on the current tokio runtime.
    ///
    /// The returned handle completes once the worker has stopped.
    pub fn spawn(
        carrier: Arc<dyn Carrier>,
        limiter: Arc<dyn TokenSource>,
        config: &DispatchConfig,
    ) -> (Self, JoinHandle<()>) {
        let (queue, requests) = mpsc::channel(config.queue_capacity.max(1));
        let shutdown = CancellationToken::new();

        let worker = DispatchWorker {
            requests,
            carrier: Arc::clone(&carrier),
            limiter,
            shutdown: shutdown.clone(),
            state: WorkerState::Running,
            processed: 0,
        };
        let handle = tokio::spawn(worker.run());

        (
            Self {
                queue,
                shutdown,
                carrier,
            },
            handle,
        )
    }

    /// Enqueue `message` and wait for its outcome.
    ///
    /// Waits while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`SmsError::Unavailable`] once the dispatcher has been stopped,
    /// including when it stops while this message is still queued.
    pub async fn submit(&self, message: Message) -> Result<DispatchOutcome, SmsError> {
        if self.shutdown.is_cancelled() {
            return Err(unavailable());
        }

        let (outcome, slot) = oneshot::channel();
        let request = DispatchRequest { message, outcome };

        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(unavailable()),
            sent = self.queue.send(request) => sent.map_err(|_| unavailable())?,
        }

        slot.await.map_err(|_| unavailable())
    }

    /// Ask the carrier for the account balance. Bypasses the queue and the rate limiter.
    pub async fn balance(&self) -> Result<Balance, SmsError> {
        self.carrier.balance().await
    }

    /// Signal the worker to stop. Idempotent.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled() || self.queue.is_closed()
    }
}

#[async_trait]
impl SmsService for Dispatcher {
    async fn submit(&self, message: Message) -> Result<DispatchOutcome, SmsError> {
        Dispatcher::submit(self, message).await
    }

    async fn balance(&self) -> Result<Balance, SmsError> {
        Dispatcher::balance(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Running,
    Stopped,
}

/// Sole consumer of the dispatch queue.
struct DispatchWorker {
    requests: mpsc::Receiver<DispatchRequest>,
    carrier: Arc<dyn Carrier>,
    limiter: Arc<dyn TokenSource>,
    shutdown: CancellationToken,
    state: WorkerState,
    processed: u64,
}

impl DispatchWorker {
    async fn run(mut self) {
        info!("dispatch worker started");

        while self.state == WorkerState::Running {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => None,
                request = self.requests.recv() => request,
            };

            match next {
                Some(request) => self.handle(request).await,
                None => self.stop(),
            }
        }

        info!(processed = self.processed, "dispatch worker stopped");
    }

    /// Runs one request to completion. Stop is only observed between requests.
    async fn handle(&mut self, request: DispatchRequest) {
        self.processed += 1;
        let id = self.processed;
        let DispatchRequest { message, outcome } = request;

        let result = dispatch_message(id, &self.carrier, self.limiter.as_ref(), message).await;
        info!(request = id, outcome = ?result, "message dispatched");
        // The caller may have given up waiting; nothing to do then.
        let _ = outcome.send(result);
    }

    fn stop(&mut self) {
        if self.state == WorkerState::Stopped {
            return;
        }
        self.state = WorkerState::Stopped;
        self.requests.close();

        let mut abandoned = 0usize;
        while self.requests.try_recv().is_ok() {
            abandoned += 1;
        }
        info!(abandoned, "terminating dispatch worker");
    }
}

/// Segment `message`, send every part under the rate limit and fold the results.
async fn dispatch_message(
    id: u64,
    carrier: &Arc<dyn Carrier>,
    limiter: &dyn TokenSource,
    message: Message,
) -> DispatchOutcome {
    let segmented = match segment(&message.body) {
        Ok(segmented) => segmented,
        Err(e) => {
            warn!(request = id, error = %e, "cannot segment message");
            return DispatchOutcome::Failed;
        }
    };

    let total = segmented.total_parts();
    debug!(
        request = id,
        parts = total,
        reference = segmented.reference,
        "message segmented"
    );

    let message = Arc::new(message);
    let mut sends = Vec::with_capacity(total);
    for part in segmented.parts {
        limiter.acquire().await;

        let carrier = Arc::clone(carrier);
        let message = Arc::clone(&message);
        sends.push(tokio::spawn(async move {
            send_part(id, carrier.as_ref(), &message, &part).await
        }));
    }

    let sent = join_all(sends)
        .await
        .into_iter()
        .fold(0usize, |sent, joined| match joined {
            Ok(true) => sent + 1,
            Ok(false) => sent,
            Err(e) => {
                warn!(request = id, error = %e, "part send task failed");
                sent
            }
        });

    DispatchOutcome::from_parts(total, sent)
}

async fn send_part(id: u64, carrier: &dyn Carrier, message: &Message, part: &MessagePart) -> bool {
    let udh = part.udh();
    let request = SendRequest {
        to: &message.recipient,
        from: &message.originator,
        text: &part.text,
        udh: udh.as_deref(),
    };

    match carrier.send_part(request).await {
        Ok(response) => {
            debug!(
                request = id,
                sequence = part.header.sequence,
                carrier_id = %response.id,
                "part sent"
            );
            true
        }
        Err(e) => {
            warn!(
                request = id,
                sequence = part.header.sequence,
                total = part.header.total_parts,
                error = %e,
                "part send failed"
            );
            false
        }
    }
}
