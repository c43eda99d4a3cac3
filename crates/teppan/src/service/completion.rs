use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use uuid::Uuid;
use crate::autoregressive::GenerationResult;
use crate::error::{DecodeError, Result};

pub(crate) type Reply = Result<Vec<GenerationResult>>;

/// A pending response from a [`CompletionService`](super::CompletionService).
///
/// Resolves to the request's results in prompt order, or to the error that
/// aborted it. If the service shuts down before answering, the future
/// resolves to [`DecodeError::ServiceClosed`].
#[derive(Debug)]
pub struct Completion {
    id: Uuid,
    receiver: oneshot::Receiver<Reply>,
}

impl Completion {
    pub(crate) fn new(id: Uuid, receiver: oneshot::Receiver<Reply>) -> Self {
        Self { id, receiver }
    }

    /// Identifier assigned to the request at submission.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Future for Completion {
    type Output = Reply;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|reply| reply.unwrap_or(Err(DecodeError::ServiceClosed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_to_the_reply() {
        let (tx, rx) = oneshot::channel();
        let completion = Completion::new(Uuid::new_v4(), rx);
        tx.send(Ok(vec![])).unwrap();
        assert_eq!(completion.await, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_dropped_sender_means_service_closed() {
        let (tx, rx) = oneshot::channel::<Reply>();
        let completion = Completion::new(Uuid::new_v4(), rx);
        drop(tx);
        assert_eq!(completion.await, Err(DecodeError::ServiceClosed));
    }
}
