//! In-process transport used by tests and local simulations.

use super::encoding::{decode_wrapped, encode_wrapped};
use super::messages::{MessageType, WrappedMessage};
use super::subscription::SubscriptionRegistry;
use super::traits::{Communication, MailboxSender};
use crate::foundation::{PeerId, Result, SessionId, TssError, MAX_PAYLOAD_BYTES};
use async_trait::async_trait;
use log::trace;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type DropRule = Box<dyn Fn(&PeerId, &PeerId, &WrappedMessage) -> bool + Send + Sync>;

/// Shared medium connecting every [`MockCommunication`] created on it.
pub struct MockHub {
    nodes: RwLock<HashMap<PeerId, Arc<SubscriptionRegistry>>>,
    offline: RwLock<HashSet<PeerId>>,
    drop_rule: RwLock<Option<DropRule>>,
    max_payload: usize,
}

impl MockHub {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_BYTES)
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self { nodes: RwLock::new(HashMap::new()), offline: RwLock::new(HashSet::new()), drop_rule: RwLock::new(None), max_payload }
    }

    /// An offline node neither sends nor receives.
    pub fn set_offline(&self, peer_id: &PeerId, offline: bool) {
        let mut guard = self.offline.write();
        if offline {
            guard.insert(peer_id.clone());
        } else {
            guard.remove(peer_id);
        }
    }

    /// Drops every delivery for which `rule(from, to, message)` returns true.
    pub fn set_drop_rule(&self, rule: impl Fn(&PeerId, &PeerId, &WrappedMessage) -> bool + Send + Sync + 'static) {
        *self.drop_rule.write() = Some(Box::new(rule));
    }

    pub fn clear_drop_rule(&self) {
        *self.drop_rule.write() = None;
    }

    fn attach(&self, peer_id: PeerId, registry: Arc<SubscriptionRegistry>) {
        self.nodes.write().insert(peer_id, registry);
    }

    fn deliver(&self, from: &PeerId, to: &PeerId, bytes: &[u8]) -> Result<()> {
        {
            let offline = self.offline.read();
            if offline.contains(from) || offline.contains(to) {
                trace!("mock hub drop offline from={} to={}", from, to);
                return Ok(());
            }
        }
        let message = decode_wrapped(bytes)?;
        if let Some(rule) = self.drop_rule.read().as_ref() {
            if rule(from, to, &message) {
                trace!("mock hub drop by rule from={} to={} message_type={}", from, to, message.message_type);
                return Ok(());
            }
        }
        let registry = self.nodes.read().get(to).cloned();
        match registry {
            Some(registry) => {
                registry.dispatch(from.clone(), message);
                Ok(())
            }
            None => Err(TssError::PeerNotFound(to.to_string())),
        }
    }
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockCommunication {
    hub: Arc<MockHub>,
    peer_id: PeerId,
    registry: Arc<SubscriptionRegistry>,
}

impl MockCommunication {
    pub fn new(hub: Arc<MockHub>, peer_id: PeerId) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        hub.attach(peer_id.clone(), registry.clone());
        Self { hub, peer_id, registry }
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }
}

#[async_trait]
impl Communication for MockCommunication {
    fn local_peer_id(&self) -> Result<PeerId> {
        Ok(self.peer_id.clone())
    }

    async fn broadcast(&self, peers: &[PeerId], message: WrappedMessage) -> Result<()> {
        let bytes = encode_wrapped(&message)?;
        if bytes.len() > self.hub.max_payload {
            return Err(TssError::MessageTooLarge { size: bytes.len(), max: self.hub.max_payload });
        }
        let deliveries = peers.iter().filter(|peer| **peer != self.peer_id).map(|peer| {
            let bytes = &bytes;
            async move {
                tokio::task::yield_now().await;
                if let Err(err) = self.hub.deliver(&self.peer_id, peer, bytes) {
                    trace!("mock delivery failed to={} error={}", peer, err);
                }
            }
        });
        futures_util::future::join_all(deliveries).await;
        Ok(())
    }

    fn subscribe(&self, message_type: MessageType, session_id: SessionId, mailbox: MailboxSender) {
        self.registry.register(message_type, session_id, mailbox);
    }

    fn unsubscribe(&self, message_type: MessageType, session_id: &SessionId) {
        self.registry.unregister(message_type, session_id);
    }

    fn export_peer_addresses(&self) -> HashMap<PeerId, Vec<String>> {
        self.hub
            .nodes
            .read()
            .keys()
            .filter(|peer| **peer != self.peer_id)
            .map(|peer| (peer.clone(), vec![format!("/memory/{}", peer)]))
            .collect()
    }
}
