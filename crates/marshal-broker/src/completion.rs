use marshal_core::{CompletionHandler, TaskResult, TaskSpec};
use tokio::sync::mpsc;

/// Registered with the Governor under this sidecar's name. `on_complete` is
/// synchronous (it runs inline in the Governor loop), so it only hands the
/// finished task off to the sidecar's own async publisher via an unbounded
/// channel — matching §4.4's "split the composite id, publish to replyTo"
/// callback, deferred off the Governor's single-threaded loop.
pub struct SidecarCompletionHandler {
    tx: mpsc::UnboundedSender<(TaskResult, TaskSpec)>,
}

impl SidecarCompletionHandler {
    /// Builds a handler/receiver pair: the handler goes to
    /// `Governor::attach_sidecar`, the receiver goes to the
    /// [`crate::BrokerSidecar`] that will actually publish the replies.
    pub fn new_pair() -> (Self, mpsc::UnboundedReceiver<(TaskResult, TaskSpec)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CompletionHandler for SidecarCompletionHandler {
    fn on_complete(&self, result: &TaskResult, original: &TaskSpec) {
        let _ = self.tx.send((result.clone(), original.clone()));
    }
}
