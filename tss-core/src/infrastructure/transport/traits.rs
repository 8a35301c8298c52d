use super::messages::{MessageType, WrappedMessage};
use crate::foundation::{PeerId, Result, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A wrapped message together with the transport-authenticated sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub peer_id: PeerId,
    pub message: WrappedMessage,
}

pub type MailboxSender = mpsc::Sender<InboundMessage>;

/// Receiving end of a session's subscriptions.
pub struct Mailbox {
    rx: mpsc::Receiver<InboundMessage>,
}

impl Mailbox {
    pub fn channel(capacity: usize) -> (MailboxSender, Mailbox) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Mailbox { rx })
    }

    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InboundMessage> {
        self.rx.try_recv().ok()
    }
}

/// The peer-to-peer layer the orchestration runs on.
#[async_trait]
pub trait Communication: Send + Sync {
    fn local_peer_id(&self) -> Result<PeerId>;

    /// Best-effort delivery to every peer in `peers`; each write is bounded by the transport deadline.
    async fn broadcast(&self, peers: &[PeerId], message: WrappedMessage) -> Result<()>;

    /// Routes messages of `message_type` for `session_id` into `mailbox`. Replaces any previous route.
    fn subscribe(&self, message_type: MessageType, session_id: SessionId, mailbox: MailboxSender);

    fn unsubscribe(&self, message_type: MessageType, session_id: &SessionId);

    /// Known addresses of connected peers, persisted as bootstrap hints after keygen.
    fn export_peer_addresses(&self) -> HashMap<PeerId, Vec<String>> {
        HashMap::new()
    }
}

/// Routes a set of message types into one mailbox and unsubscribes them on drop.
pub struct Subscription {
    communication: Arc<dyn Communication>,
    message_types: Vec<MessageType>,
    session_id: SessionId,
}

impl Subscription {
    pub fn open(
        communication: Arc<dyn Communication>,
        message_types: &[MessageType],
        session_id: SessionId,
        capacity: usize,
    ) -> (Subscription, Mailbox) {
        let (tx, mailbox) = Mailbox::channel(capacity);
        for message_type in message_types {
            communication.subscribe(*message_type, session_id, tx.clone());
        }
        (Subscription { communication, message_types: message_types.to_vec(), session_id }, mailbox)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for message_type in &self.message_types {
            self.communication.unsubscribe(*message_type, &self.session_id);
        }
    }
}
