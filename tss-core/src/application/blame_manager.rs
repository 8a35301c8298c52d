//! Fault attribution for a failed or stalled session.

use crate::application::round_registry::RoundRegistry;
use crate::domain::blame::{Blame, BlameNode};
use crate::domain::round::{check_unicast, round_count, Algorithm, Operation, RoundInfo, RoundMessage};
use crate::domain::{PartyInfo, RoundKey, WireMessage};
use crate::foundation::{PartyId, PeerId, Result, TssError};
use log::debug;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Per-session blame state: accepted shares, unicast senders and the accumulated record.
pub struct BlameManager {
    party_info: Arc<PartyInfo>,
    registry: Arc<RoundRegistry>,
    accepted_shares: RwLock<BTreeMap<RoundInfo, BTreeSet<PartyId>>>,
    last_unicast_peer: RwLock<HashMap<String, Vec<PeerId>>>,
    last_produced: RwLock<Option<RoundMessage>>,
    blame: RwLock<Blame>,
}

impl BlameManager {
    pub fn new(party_info: Arc<PartyInfo>, registry: Arc<RoundRegistry>) -> Self {
        Self {
            party_info,
            registry,
            accepted_shares: RwLock::new(BTreeMap::new()),
            last_unicast_peer: RwLock::new(HashMap::new()),
            last_produced: RwLock::new(None),
            blame: RwLock::new(Blame::default()),
        }
    }

    pub fn party_info(&self) -> &Arc<PartyInfo> {
        &self.party_info
    }

    pub fn registry(&self) -> &Arc<RoundRegistry> {
        &self.registry
    }

    /// Snapshot of the accumulated blame record.
    pub fn blame(&self) -> Blame {
        self.blame.read().clone()
    }

    pub fn set_blame(&self, reason: &str, nodes: Vec<BlameNode>, is_unicast: bool) {
        self.blame.write().set_blame(reason, nodes, is_unicast);
    }

    pub fn add_blame_nodes(&self, nodes: Vec<BlameNode>) {
        self.blame.write().add_blame_nodes(nodes);
    }

    pub fn set_last_produced(&self, round: RoundMessage) {
        *self.last_produced.write() = Some(round);
    }

    pub fn last_produced(&self) -> Option<RoundMessage> {
        *self.last_produced.read()
    }

    /// Whether `from` already contributed a share to `round`.
    pub fn check_msg_duplication(&self, round: &RoundInfo, from: &PartyId) -> bool {
        self.accepted_shares.read().get(round).is_some_and(|senders| senders.contains(from))
    }

    /// Records a contribution; returns `false` if the pair was already present.
    pub fn update_accept_share(&self, round: RoundInfo, from: PartyId) -> bool {
        self.accepted_shares.write().entry(round).or_default().insert(from)
    }

    pub fn accepted_shares(&self, round: &RoundInfo) -> BTreeSet<PartyId> {
        self.accepted_shares.read().get(round).cloned().unwrap_or_default()
    }

    pub fn set_last_unicast_peer(&self, round_tag: &str, peer_id: PeerId) {
        let mut guard = self.last_unicast_peer.write();
        let peers = guard.entry(round_tag.to_string()).or_default();
        if !peers.contains(&peer_id) {
            peers.push(peer_id);
        }
    }

    fn node_for(&self, id: &PartyId) -> Result<BlameNode> {
        let party = self.party_info.party(id).ok_or_else(|| TssError::PartyNotFound(id.to_string()))?;
        Ok(BlameNode::new(party.pubkey.clone()))
    }

    /// Blame for an invalid share: the declared sender and nobody else.
    pub fn tss_wrong_share_blame(&self, message: &WireMessage) -> Result<String> {
        let party = self
            .party_info
            .party(&message.routing.from)
            .ok_or_else(|| TssError::PartyNotFound(message.routing.from.to_string()))?;
        Ok(party.pubkey.clone())
    }

    /// Remote parties that did not contribute to the latest round of `algorithm`/`operation` with any accepted share.
    ///
    /// Returns the nodes sorted by public key and whether that round is unicast. Earlier rounds are
    /// ignored once a later one has shares: every party that reached the later round finished the earlier ones.
    pub fn tss_missing_share_blame(&self, algorithm: Algorithm, operation: Operation) -> Result<(Vec<BlameNode>, bool)> {
        let sequence = RoundMessage::sequence(algorithm, operation);
        let shares = self.accepted_shares.read();
        let latest = (0..round_count(algorithm, operation) as u32).rev().find_map(|index| {
            sequence
                .iter()
                .filter(|message| message.index() == index)
                .find_map(|message| shares.get_key_value(&message.round_info()).filter(|(_, contributors)| !contributors.is_empty()))
        });
        let Some((round, contributors)) = latest else {
            return Ok((Vec::new(), false));
        };

        let is_unicast = check_unicast(algorithm, operation, round.index);
        let missing: Vec<&PartyId> =
            self.party_info.remote_parties().map(|party| &party.id).filter(|id| !contributors.contains(*id)).collect();
        debug!(
            "missing share blame round={} index={} contributors={} missing={} is_unicast={}",
            round.round_msg,
            round.index,
            contributors.len(),
            missing.len(),
            is_unicast
        );
        let mut nodes = missing.into_iter().map(|id| self.node_for(id)).collect::<Result<Vec<_>>>()?;
        nodes.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));
        Ok((nodes, is_unicast))
    }

    /// Remote parties with no cached message for `round_tag`.
    ///
    /// Nothing is blamed while no message of that round has been cached at all.
    pub fn get_broadcast_blame(&self, round_tag: &str) -> Result<Vec<BlameNode>> {
        let senders: HashSet<PartyId> = self.registry.senders_for_round(round_tag).into_iter().collect();
        if senders.is_empty() {
            return Ok(Vec::new());
        }
        self.party_info.remote_parties().filter(|party| !senders.contains(&party.id)).map(|party| self.node_for(&party.id)).collect()
    }

    /// Remote parties whose unicast for `round_tag` never arrived.
    pub fn get_unicast_blame(&self, round_tag: &str) -> Result<Vec<BlameNode>> {
        let guard = self.last_unicast_peer.read();
        if guard.is_empty() {
            return Ok(Vec::new());
        }
        let peers = guard.get(round_tag).ok_or_else(|| TssError::UnicastPeersNotFound { message_type: round_tag.to_string() })?;
        self.party_info
            .remote_parties()
            .filter(|party| !peers.contains(&party.peer_id))
            .map(|party| self.node_for(&party.id))
            .collect()
    }

    /// Attaches a cached payload and signature to `pubkey` when the registry holds one for `round_tag`.
    pub fn node_with_evidence(&self, pubkey: &str, round_tag: &str) -> BlameNode {
        let key = RoundKey::new(&PartyId::from(pubkey), round_tag);
        match self.registry.get(&key) {
            Some(message) => BlameNode::with_evidence(pubkey, message.payload, message.signature),
            None => BlameNode::new(pubkey),
        }
    }
}
