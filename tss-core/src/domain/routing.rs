use crate::foundation::{Hash32, MessageHash, PartyId, Result, SessionId, TssError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a round message and who it is meant for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRouting {
    pub from: PartyId,
    /// `None` together with `is_broadcast` means every current peer.
    pub to: Option<Vec<PartyId>>,
    pub is_broadcast: bool,
}

impl MessageRouting {
    pub fn broadcast(from: PartyId) -> Self {
        Self { from, to: None, is_broadcast: true }
    }

    pub fn unicast(from: PartyId, to: PartyId) -> Self {
        Self { from, to: Some(vec![to]), is_broadcast: false }
    }

    pub fn validate(&self) -> Result<()> {
        if self.from.is_empty() {
            return Err(TssError::InvalidWireMessage("routing has no sender".to_string()));
        }
        if !self.is_broadcast && self.to.as_ref().map_or(true, |to| to.is_empty()) {
            return Err(TssError::InvalidWireMessage(format!("unicast from {} has no recipient", self.from)));
        }
        Ok(())
    }
}

/// Key of one cached round message: the sender plus the round tag.
///
/// A registry is owned by a single session, so the session id is implicit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundKey(String);

impl RoundKey {
    pub fn new(from: &PartyId, round_tag: &str) -> Self {
        Self(format!("{}-{}", from, round_tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The round tag part of the key.
    pub fn round_tag(&self) -> &str {
        self.0.rsplit_once('-').map(|(_, tag)| tag).unwrap_or(&self.0)
    }

    /// The party that produced the keyed message.
    pub fn owner(&self) -> PartyId {
        PartyId::from(self.0.rsplit_once('-').map(|(owner, _)| owner).unwrap_or_default())
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoundKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One engine payload in flight between two parties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub routing: MessageRouting,
    pub round_tag: String,
    pub payload: Vec<u8>,
    /// ed25519 signature of the sender over [`WireMessage::signing_digest`].
    pub signature: Vec<u8>,
}

impl WireMessage {
    pub fn cache_key(&self) -> RoundKey {
        RoundKey::new(&self.routing.from, &self.round_tag)
    }

    pub fn payload_hash(&self) -> MessageHash {
        MessageHash::of(&self.payload)
    }

    pub fn signing_digest(&self, session_id: &SessionId) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.payload);
        hasher.update(session_id.as_hash());
        *hasher.finalize().as_bytes()
    }
}
