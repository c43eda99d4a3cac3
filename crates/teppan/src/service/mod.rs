//! # Completion Service
//!
//! A queue in front of a single [`BatchDecoder`] that lets many async callers
//! share one model.
//!
//! ## Overview
//!
//! The model and tokenizer move into a background task owned by the service.
//! Callers [`submit`](CompletionService::submit) a [`CompletionRequest`] and
//! await the returned [`Completion`]. The task takes requests in submission
//! order and decodes each one as its own batch, so a request's results never
//! depend on what else is queued.
//!
//! ## Shutdown
//!
//! Dropping the service stops the task after the request it is decoding.
//! Requests still queued at that point resolve to
//! [`DecodeError::ServiceClosed`](crate::error::DecodeError::ServiceClosed).
//!
//! # Example
//!
//! ```ignore
//! let service = CompletionService::new(model, tokenizer, GenerationLimits::default())?;
//! let request = CompletionRequest::new(["the capital of france is"]).with_seed(7);
//! let results = service.submit(request).await.await?;
//! println!("{}", results[0].generated_text);
//! ```

mod completion;
mod queue_item;
mod request;
mod worker;

pub use completion::Completion;
pub use request::CompletionRequest;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, info};
use crate::autoregressive::{BatchDecoder, GenerationLimits};
use crate::backend::{CausalModel, Tokenizer};
use crate::error::Result;
use queue_item::QueueItem;
use worker::WorkerHandle;

type WaitingRequests = Arc<Mutex<VecDeque<QueueItem>>>;

/// Idle wait between checks of the queue when no notification arrives.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Serializes completion requests from many callers onto one model.
///
/// Construction needs a Tokio runtime; dropping does not. A service dropped
/// outside a runtime leaves its task to exit the next time that runtime runs.
pub struct CompletionService {
    waiting_requests: WaitingRequests,
    limits: GenerationLimits,
    handle: WorkerHandle,
}

impl CompletionService {
    /// Move `model` and `tokenizer` into a new background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfig`](crate::error::DecodeError::InvalidConfig) for invalid `limits`.
    pub fn new<M, T>(model: M, tokenizer: T, limits: GenerationLimits) -> Result<Self>
    where
        M: CausalModel + 'static,
        T: Tokenizer + 'static,
    {
        let decoder = BatchDecoder::new(model, tokenizer, limits)?;
        let waiting_requests: WaitingRequests = Default::default();

        let handle = WorkerHandle::spawn({
            let waiting_requests = waiting_requests.clone();
            move |running, notifier| {
                tokio::spawn(serve(decoder, running, notifier, waiting_requests))
            }
        });

        Ok(Self {
            waiting_requests,
            limits,
            handle,
        })
    }

    pub fn limits(&self) -> GenerationLimits {
        self.limits
    }

    /// Number of requests queued and not yet picked up by the worker.
    pub async fn pending(&self) -> usize {
        self.waiting_requests.lock().await.len()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Queue `request` behind everything submitted before it.
    pub async fn submit(&self, request: CompletionRequest) -> Completion {
        let (tx, rx) = oneshot::channel();
        let item = QueueItem::new(request, tx);
        let id = item.id();
        {
            let mut waiting = self.waiting_requests.lock().await;
            debug!(%id, prompts = item.request().prompts.len(), queued = waiting.len(), "request submitted");
            waiting.push_back(item);
        }
        self.handle.notify();
        Completion::new(id, rx)
    }
}

async fn serve<M, T>(
    mut decoder: BatchDecoder<M, T>,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
    waiting_requests: WaitingRequests,
)
where
    M: CausalModel,
    T: Tokenizer,
{
    info!("completion worker started");
    while running.load(Ordering::SeqCst) {
        let next = waiting_requests.lock().await.pop_front();
        let Some(item) = next else {
            let _ = tokio::time::timeout(IDLE_POLL, notifier.notified()).await;
            continue;
        };

        let request = item.request();
        let mut rng = StdRng::seed_from_u64(request.seed);
        let reply = decoder.complete(
            &request.prompts,
            &request.config,
            &request.options,
            &mut rng,
            &request.cancel,
        ).await;

        let id = item.id();
        match &reply {
            Ok(results) => debug!(%id, results = results.len(), "request finished"),
            Err(err) => debug!(%id, %err, "request failed"),
        }
        if !item.respond(reply) {
            debug!(%id, "requester went away before the reply");
        }
    }
    info!("completion worker stopped");
}
