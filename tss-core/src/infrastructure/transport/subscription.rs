use super::messages::{MessageType, WrappedMessage};
use super::traits::{InboundMessage, MailboxSender};
use crate::foundation::{PeerId, SessionId};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;

/// Per-node routing table from `(message type, session)` to a mailbox.
///
/// Registration is a map update under a lock; delivery is a non-blocking queue push.
#[derive(Default)]
pub struct SubscriptionRegistry {
    routes: Mutex<HashMap<(MessageType, SessionId), MailboxSender>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, message_type: MessageType, session_id: SessionId, mailbox: MailboxSender) {
        if self.routes.lock().insert((message_type, session_id), mailbox).is_some() {
            debug!("subscription replaced message_type={} session_id={}", message_type, session_id.short());
        }
    }

    pub fn unregister(&self, message_type: MessageType, session_id: &SessionId) {
        self.routes.lock().remove(&(message_type, *session_id));
    }

    /// Pushes a message into the matching mailbox. Returns `false` when it was dropped.
    pub fn dispatch(&self, peer_id: PeerId, message: WrappedMessage) -> bool {
        let key = (message.message_type, message.session_id);
        let Some(mailbox) = self.routes.lock().get(&key).cloned() else {
            debug!(
                "no subscriber for message message_type={} session_id={} from={}",
                message.message_type,
                message.session_id.short(),
                peer_id
            );
            return false;
        };
        match mailbox.try_send(InboundMessage { peer_id, message }) {
            Ok(()) => true,
            Err(TrySendError::Full(inbound)) => {
                warn!(
                    "mailbox full, message dropped message_type={} session_id={} from={}",
                    inbound.message.message_type,
                    inbound.message.session_id.short(),
                    inbound.peer_id
                );
                false
            }
            Err(TrySendError::Closed(inbound)) => {
                debug!("mailbox closed message_type={} from={}", inbound.message.message_type, inbound.peer_id);
                self.routes.lock().remove(&key);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.routes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.lock().is_empty()
    }
}
