use crate::foundation::util::encoding::parse_hex_32bytes;
use crate::foundation::{PartyId, PeerId, Result, TssError, PEER_ID_DOMAIN};
use ed25519_dalek::VerifyingKey;
use std::collections::{BTreeMap, HashMap};

/// One protocol participant. The party id doubles as the engine handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Party {
    pub id: PartyId,
    pub pubkey: String,
    pub peer_id: PeerId,
}

pub fn verifying_key_from_hex(pubkey: &str) -> Result<VerifyingKey> {
    let bytes = parse_hex_32bytes(pubkey)
        .map_err(|err| TssError::InvalidPublicKey { input: pubkey.to_string(), reason: err.to_string() })?;
    VerifyingKey::from_bytes(&bytes).map_err(|err| TssError::InvalidPublicKey { input: pubkey.to_string(), reason: err.to_string() })
}

/// Derives the transport identity of a node from its ed25519 public key.
pub fn peer_id_from_pubkey(pubkey: &str) -> Result<PeerId> {
    let key = verifying_key_from_hex(pubkey)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(PEER_ID_DOMAIN);
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    Ok(PeerId::new(format!("tss-{}", hex::encode(&digest.as_bytes()[..20]))))
}

pub fn peer_ids_from_pubkeys(pubkeys: &[String]) -> Result<Vec<PeerId>> {
    pubkeys.iter().map(|key| peer_id_from_pubkey(key)).collect()
}

/// Signing threshold for `n` parties: `ceil(2n/3) - 1`.
pub fn threshold_for(n: usize) -> Result<usize> {
    if n == 0 {
        return Err(TssError::InvalidRequest("threshold requires at least one party".to_string()));
    }
    Ok((2 * n).div_ceil(3) - 1)
}

/// Party map of one session. Built once at session start and never mutated.
#[derive(Clone, Debug)]
pub struct PartyInfo {
    parties: BTreeMap<PartyId, Party>,
    by_peer: HashMap<PeerId, PartyId>,
    local: PartyId,
}

impl PartyInfo {
    pub fn from_keys(pubkeys: &[String], local_pubkey: &str) -> Result<Self> {
        let mut parties = BTreeMap::new();
        let mut by_peer = HashMap::new();
        for pubkey in pubkeys {
            let pubkey = pubkey.trim();
            let peer_id = peer_id_from_pubkey(pubkey)?;
            let id = PartyId::from(pubkey);
            by_peer.insert(peer_id.clone(), id.clone());
            parties.insert(id.clone(), Party { id, pubkey: pubkey.to_string(), peer_id });
        }
        let local = PartyId::from(local_pubkey.trim());
        if !parties.contains_key(&local) {
            return Err(TssError::LocalIdentity(format!("local party {} is not in the party list", local_pubkey)));
        }
        Ok(Self { parties, by_peer, local })
    }

    pub fn local_party(&self) -> &Party {
        // Presence checked in `from_keys`.
        &self.parties[&self.local]
    }

    pub fn local_id(&self) -> &PartyId {
        &self.local
    }

    pub fn party(&self, id: &PartyId) -> Option<&Party> {
        self.parties.get(id)
    }

    pub fn party_by_peer(&self, peer_id: &PeerId) -> Option<&Party> {
        self.by_peer.get(peer_id).and_then(|id| self.parties.get(id))
    }

    pub fn peer_of(&self, id: &PartyId) -> Option<&PeerId> {
        self.parties.get(id).map(|party| &party.peer_id)
    }

    /// Parties ordered by public key.
    pub fn parties(&self) -> impl Iterator<Item = &Party> {
        self.parties.values()
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    pub fn threshold(&self) -> Result<usize> {
        threshold_for(self.parties.len())
    }

    pub fn remote_parties(&self) -> impl Iterator<Item = &Party> {
        self.parties.values().filter(|party| party.id != self.local)
    }

    pub fn remote_peers(&self) -> Vec<PeerId> {
        self.remote_parties().map(|party| party.peer_id.clone()).collect()
    }

    pub fn pubkeys_of(&self, ids: &[PartyId]) -> Result<Vec<String>> {
        ids.iter()
            .map(|id| self.parties.get(id).map(|party| party.pubkey.clone()).ok_or_else(|| TssError::PartyNotFound(id.to_string())))
            .collect()
    }
}
