//! Blame record returned to callers when a session fails.

use crate::domain::party::peer_id_from_pubkey;
use crate::foundation::{PeerId, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const HASH_CHECK_FAIL: &str = "hash check failed";
pub const TSS_TIMEOUT: &str = "Tss timeout";
pub const TSS_SYNC_FAIL: &str = "signers fail to sync before keygen/keysign";
pub const TSS_BROKEN_MSG: &str = "tss share verification failed";
pub const INTERNAL_ERROR: &str = "fail to start the join party";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameNode {
    pub pubkey: String,
    /// Offending payload, when one was cached.
    #[serde(default)]
    pub blame_data: Vec<u8>,
    #[serde(default)]
    pub blame_signature: Vec<u8>,
}

impl BlameNode {
    pub fn new(pubkey: impl Into<String>) -> Self {
        Self { pubkey: pubkey.into(), blame_data: Vec::new(), blame_signature: Vec::new() }
    }

    pub fn with_evidence(pubkey: impl Into<String>, blame_data: Vec<u8>, blame_signature: Vec<u8>) -> Self {
        Self { pubkey: pubkey.into(), blame_data, blame_signature }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blame {
    pub fail_reason: String,
    pub is_unicast: bool,
    pub blame_nodes: Vec<BlameNode>,
}

impl Blame {
    pub fn new(reason: &str, nodes: Vec<BlameNode>) -> Self {
        let mut blame = Self { fail_reason: reason.to_string(), is_unicast: false, blame_nodes: Vec::new() };
        blame.add_blame_nodes(nodes);
        blame
    }

    pub fn is_empty(&self) -> bool {
        self.fail_reason.is_empty() && self.blame_nodes.is_empty()
    }

    /// Records a cause. The first reason and unicast flag stick; nodes always accumulate.
    pub fn set_blame(&mut self, reason: &str, nodes: Vec<BlameNode>, is_unicast: bool) {
        if self.fail_reason.is_empty() {
            self.fail_reason = reason.to_string();
            self.is_unicast = is_unicast;
        }
        self.add_blame_nodes(nodes);
    }

    /// Appends nodes not already blamed, keeping the list ordered by public key.
    pub fn add_blame_nodes(&mut self, nodes: impl IntoIterator<Item = BlameNode>) {
        let mut known: HashSet<String> = self.blame_nodes.iter().map(|node| node.pubkey.clone()).collect();
        for node in nodes {
            if known.insert(node.pubkey.clone()) {
                self.blame_nodes.push(node);
            }
        }
        self.blame_nodes.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));
    }

    pub fn blamed_pubkeys(&self) -> Vec<&str> {
        self.blame_nodes.iter().map(|node| node.pubkey.as_str()).collect()
    }
}

impl fmt::Display for Blame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reason={} is_unicast={} nodes=[{}]", self.fail_reason, self.is_unicast, self.blamed_pubkeys().join(","))
    }
}

/// Blames every key whose peer did not show up during join-party.
pub fn node_sync_blame(keys: &[String], online_peers: &[PeerId]) -> Result<Blame> {
    let online: HashSet<&PeerId> = online_peers.iter().collect();
    let mut nodes = Vec::new();
    for key in keys {
        let peer_id = peer_id_from_pubkey(key)?;
        if !online.contains(&peer_id) {
            nodes.push(BlameNode::new(key.clone()));
        }
    }
    Ok(Blame::new(TSS_SYNC_FAIL, nodes))
}
