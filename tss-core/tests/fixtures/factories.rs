#![allow(dead_code)]

use crate::fixtures::{
    FAST_JOIN_PARTY_TIMEOUT_SECS, FAST_RETRY_INTERVAL_MS, FAST_SESSION_TIMEOUT_SECS, TEST_BLOCK_HEIGHT, TEST_POOL_PUB_KEY,
    TEST_VERSION,
};
use ed25519_dalek::SigningKey;
use std::sync::Arc;
use tss_core::application::engine::scripted::{ScriptedBehavior, ScriptedEngineFactory};
use tss_core::application::TssServer;
use tss_core::domain::party::peer_id_from_pubkey;
use tss_core::domain::{Algorithm, KeygenRequest, KeysignRequest, MessageRouting, PartyInfo, RegroupRequest, WireMessage};
use tss_core::foundation::util::encoding::encode_base64;
use tss_core::foundation::{PartyId, PeerId};
use tss_core::infrastructure::config::TssConfig;
use tss_core::infrastructure::storage::{KeygenLocalState, MemoryStateManager, StateManager};
use tss_core::infrastructure::transport::mock::{MockCommunication, MockHub};

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn pubkey(seed: u8) -> String {
    hex::encode(signing_key(seed).verifying_key().as_bytes())
}

pub fn party_id(seed: u8) -> PartyId {
    PartyId::from(pubkey(seed).as_str())
}

pub fn peer_id(seed: u8) -> PeerId {
    peer_id_from_pubkey(&pubkey(seed)).expect("peer id")
}

pub fn sorted_pubkeys(seeds: &[u8]) -> Vec<String> {
    let mut keys: Vec<String> = seeds.iter().map(|seed| pubkey(*seed)).collect();
    keys.sort();
    keys
}

pub fn sorted_peer_ids(seeds: &[u8]) -> Vec<PeerId> {
    let mut peers: Vec<PeerId> = seeds.iter().map(|seed| peer_id(*seed)).collect();
    peers.sort();
    peers
}

pub fn party_info(seeds: &[u8], local: u8) -> Arc<PartyInfo> {
    Arc::new(PartyInfo::from_keys(&sorted_pubkeys(seeds), &pubkey(local)).expect("party info"))
}

pub fn broadcast_message(from: u8, round_tag: &str, payload: &[u8]) -> WireMessage {
    WireMessage {
        routing: MessageRouting::broadcast(party_id(from)),
        round_tag: round_tag.to_string(),
        payload: payload.to_vec(),
        signature: vec![0xaa; 64],
    }
}

/// Timeouts short enough for multi-node tests on the mock hub.
pub fn fast_config() -> TssConfig {
    let mut config = TssConfig::default();
    config.party.join_party_timeout_secs = FAST_JOIN_PARTY_TIMEOUT_SECS;
    config.party.join_party_retry_interval_ms = FAST_RETRY_INTERVAL_MS;
    config.session.keygen_timeout_secs = FAST_SESSION_TIMEOUT_SECS;
    config.session.keysign_timeout_secs = FAST_SESSION_TIMEOUT_SECS;
    config.session.regroup_timeout_secs = FAST_SESSION_TIMEOUT_SECS;
    config.transport.message_timeout_secs = 1;
    config.transport.publish_retry_delay_ms = 10;
    config
}

pub struct TestNode {
    pub seed: u8,
    pub pubkey: String,
    pub peer_id: PeerId,
    pub communication: Arc<MockCommunication>,
    pub state: Arc<MemoryStateManager>,
    pub server: Arc<TssServer>,
}

pub fn build_node(hub: &Arc<MockHub>, seed: u8, config: &TssConfig, behavior: ScriptedBehavior) -> TestNode {
    let communication = Arc::new(MockCommunication::new(hub.clone(), peer_id(seed)));
    let state = Arc::new(MemoryStateManager::new());
    let server = TssServer::new(
        config.clone(),
        communication.clone(),
        state.clone(),
        Arc::new(ScriptedEngineFactory::with_behavior(behavior)),
        signing_key(seed),
    )
    .expect("server");
    TestNode { seed, pubkey: pubkey(seed), peer_id: peer_id(seed), communication, state, server: Arc::new(server) }
}

pub fn build_nodes(hub: &Arc<MockHub>, seeds: &[u8], config: &TssConfig) -> Vec<TestNode> {
    seeds.iter().map(|seed| build_node(hub, *seed, config, ScriptedBehavior::default())).collect()
}

/// Stores a key share for `pool_pub_key` as if keygen over `participants` had already run.
pub fn seed_local_state(node: &TestNode, participants: &[u8], algo: Algorithm) {
    let state = KeygenLocalState {
        pub_key: TEST_POOL_PUB_KEY.to_string(),
        local_data: vec![node.seed; 16],
        participant_keys: sorted_pubkeys(participants),
        local_party_key: node.pubkey.clone(),
    };
    node.state.save_local_state(&state, algo).expect("seed local state");
}

pub fn keygen_request(seeds: &[u8], algo: Algorithm) -> KeygenRequest {
    KeygenRequest { keys: sorted_pubkeys(seeds), block_height: TEST_BLOCK_HEIGHT, version: TEST_VERSION.to_string(), algo }
}

pub fn keysign_request(signers: &[u8], messages: &[&[u8]], algo: Algorithm) -> KeysignRequest {
    KeysignRequest {
        pool_pub_key: TEST_POOL_PUB_KEY.to_string(),
        messages: messages.iter().map(|message| encode_base64(message)).collect(),
        signer_pub_keys: sorted_pubkeys(signers),
        block_height: TEST_BLOCK_HEIGHT,
        version: TEST_VERSION.to_string(),
        algo,
    }
}

pub fn regroup_request(old: &[u8], new: &[u8], algo: Algorithm) -> RegroupRequest {
    RegroupRequest {
        pool_pub_key: TEST_POOL_PUB_KEY.to_string(),
        old_party_keys: sorted_pubkeys(old),
        new_party_keys: sorted_pubkeys(new),
        block_height: TEST_BLOCK_HEIGHT,
        version: TEST_VERSION.to_string(),
        algo,
    }
}
