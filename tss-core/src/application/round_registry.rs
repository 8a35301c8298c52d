use crate::domain::{RoundKey, WireMessage};
use crate::foundation::PartyId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Last wire message seen per round key, owned by a single session.
///
/// Entries are never evicted; the registry lives as long as the session.
#[derive(Debug, Default)]
pub struct RoundRegistry {
    messages: RwLock<HashMap<RoundKey, WireMessage>>,
}

impl RoundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RoundKey) -> Option<WireMessage> {
        self.messages.read().get(key).cloned()
    }

    /// Stores `message` under `key`, overwriting any earlier entry.
    pub fn set(&self, key: RoundKey, message: WireMessage) {
        self.messages.write().insert(key, message);
    }

    pub fn contains(&self, key: &RoundKey) -> bool {
        self.messages.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Declared senders of every cached message for `round_tag`.
    pub fn senders_for_round(&self, round_tag: &str) -> Vec<PartyId> {
        let mut senders: Vec<PartyId> = self
            .messages
            .read()
            .iter()
            .filter(|(key, _)| key.round_tag() == round_tag)
            .map(|(_, message)| message.routing.from.clone())
            .collect();
        senders.sort();
        senders.dedup();
        senders
    }
}
