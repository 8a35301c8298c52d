use crate::domain::{RoundKey, WireMessage};
use crate::foundation::{MessageHash, PartyId, Result, TssError};
use std::collections::HashMap;

/// A broadcast waiting for enough peers to confirm they saw the same payload.
#[derive(Clone, Debug, Default)]
pub struct LocalCacheItem {
    message: Option<WireMessage>,
    hash: Option<MessageHash>,
    confirms: HashMap<PartyId, MessageHash>,
}

impl LocalCacheItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&self) -> Option<&WireMessage> {
        self.message.as_ref()
    }

    /// Stores the local copy and counts it as the local party's confirmation.
    pub fn set_message(&mut self, local: &PartyId, message: WireMessage) {
        let hash = message.payload_hash();
        self.confirms.insert(local.clone(), hash);
        self.hash = Some(hash);
        self.message = Some(message);
    }

    pub fn update_confirm(&mut self, party: PartyId, hash: MessageHash) {
        self.confirms.insert(party, hash);
    }

    pub fn total_confirm(&self) -> usize {
        self.confirms.len()
    }

    /// Most reported hash; ties go to the smaller hash so every node picks the same one.
    pub fn highest_freq(&self) -> Option<(MessageHash, usize)> {
        let mut counts: HashMap<MessageHash, usize> = HashMap::new();
        for hash in self.confirms.values() {
            *counts.entry(*hash).or_default() += 1;
        }
        counts.into_iter().max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }

    pub fn parties_with_hash(&self, hash: &MessageHash) -> Vec<PartyId> {
        let mut parties: Vec<PartyId> =
            self.confirms.iter().filter(|(_, seen)| seen.ct_eq(hash)).map(|(party, _)| party.clone()).collect();
        parties.sort();
        parties
    }

    /// Decides whether the cached copy can be applied.
    ///
    /// `threshold` confirmations must exist and the majority hash must be reported at
    /// least `threshold` times and equal the local copy's hash.
    pub fn hash_check(&self, key: &RoundKey, threshold: usize) -> Result<()> {
        let threshold = threshold.max(1);
        let have = self.total_confirm();
        if have < threshold {
            return Err(TssError::NotEnoughPeers { have, need: threshold });
        }
        let Some((majority, freq)) = self.highest_freq() else {
            return Err(TssError::NotEnoughPeers { have, need: threshold });
        };
        let Some(local) = self.hash else {
            return Err(TssError::NotMajority { key: key.to_string() });
        };
        if freq < threshold {
            return Err(TssError::NotMajority { key: key.to_string() });
        }
        if !majority.ct_eq(&local) {
            return Err(TssError::HashInconsistency { key: key.to_string() });
        }
        Ok(())
    }
}
