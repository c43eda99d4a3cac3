use tokio::sync::oneshot::Sender;
use uuid::Uuid;
use super::completion::Reply;
use super::request::CompletionRequest;

/// A submitted request waiting for the worker, paired with its reply channel.
pub(crate) struct QueueItem {
    id: Uuid,
    request: CompletionRequest,
    sender: Sender<Reply>,
}

impl QueueItem {
    pub(crate) fn new(request: CompletionRequest, sender: Sender<Reply>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            sender,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn request(&self) -> &CompletionRequest {
        &self.request
    }

    /// Deliver the reply. The requester may have stopped listening; that is not an error.
    pub(crate) fn respond(self, reply: Reply) -> bool {
        self.sender.send(reply).is_ok()
    }
}
