use crate::fixtures::{build_node, build_nodes, fast_config, keygen_request, peer_id, pubkey, TestNode};
use std::sync::Arc;
use tss_core::application::engine::scripted::ScriptedBehavior;
use tss_core::domain::blame::{TSS_BROKEN_MSG, TSS_SYNC_FAIL};
use tss_core::domain::{Algorithm, KeygenResponse, RoundMessage, Status, WireMessage};
use tss_core::infrastructure::storage::StateManager;
use tss_core::infrastructure::transport::mock::MockHub;
use tss_core::infrastructure::transport::MessageType;

async fn run_keygen(nodes: &[TestNode], seeds: &[u8], algo: Algorithm) -> Vec<KeygenResponse> {
    let handles: Vec<_> = nodes
        .iter()
        .map(|node| {
            let server = node.server.clone();
            let request = keygen_request(seeds, algo);
            tokio::spawn(async move { server.keygen(&request).await })
        })
        .collect();
    let mut responses = Vec::new();
    for handle in handles {
        responses.push(handle.await.expect("keygen task").expect("keygen"));
    }
    responses
}

#[tokio::test]
async fn test_keygen_when_all_parties_honest_then_same_key_persisted_everywhere() {
    let hub = Arc::new(MockHub::new());
    let seeds = [1u8, 2, 3, 4];
    let nodes = build_nodes(&hub, &seeds, &fast_config());

    let responses = run_keygen(&nodes, &seeds, Algorithm::Ecdsa).await;
    let pub_key = responses[0].pub_key.clone();
    assert!(!pub_key.is_empty());
    for (node, response) in nodes.iter().zip(&responses) {
        assert_eq!(response.status, Status::Success, "node {} blame {}", node.seed, response.blame);
        assert_eq!(response.pub_key, pub_key);
        let state = node.state.get_local_state(&pub_key, Algorithm::Ecdsa).expect("state saved");
        assert_eq!(state.local_party_key, node.pubkey);
        assert_eq!(state.participant_keys, keygen_request(&seeds, Algorithm::Ecdsa).party_keys());
        assert_eq!(node.state.retrieve_p2p_addresses().expect("address book").len(), seeds.len() - 1);
        assert_eq!(node.communication.subscription_count(), 0);
    }
}

#[tokio::test]
async fn test_keygen_when_broadcast_dropped_for_one_peer_then_recovered_from_others() {
    let hub = Arc::new(MockHub::new());
    let seeds = [1u8, 2, 3, 4];
    let nodes = build_nodes(&hub, &seeds, &fast_config());
    let (owner, victim) = (peer_id(1), peer_id(4));
    hub.set_drop_rule(move |from, to, message| {
        *from == owner
            && *to == victim
            && message.message_type == MessageType::KeyGenMsg
            && message.decode_body::<WireMessage>().is_ok_and(|wire| wire.round_tag == RoundMessage::EddsaKeygen1.tag())
    });

    let responses = run_keygen(&nodes, &seeds, Algorithm::Eddsa).await;
    for response in &responses {
        assert_eq!(response.status, Status::Success, "blame {}", response.blame);
        assert_eq!(response.pub_key, responses[0].pub_key);
    }
}

#[tokio::test]
async fn test_keygen_when_party_sends_corrupt_share_then_honest_nodes_blame_it() {
    let hub = Arc::new(MockHub::new());
    let config = fast_config();
    let corrupt = ScriptedBehavior { corrupt_round: Some(RoundMessage::EcdsaKeygen1), ..Default::default() };
    let nodes: Vec<TestNode> = [1u8, 2, 3, 4]
        .into_iter()
        .map(|seed| build_node(&hub, seed, &config, if seed == 3 { corrupt.clone() } else { ScriptedBehavior::default() }))
        .collect();

    let handles: Vec<_> = nodes
        .iter()
        .map(|node| {
            let server = node.server.clone();
            let request = keygen_request(&[1, 2, 3, 4], Algorithm::Ecdsa);
            tokio::spawn(async move { server.keygen(&request).await })
        })
        .collect();

    for (node, handle) in nodes.iter().zip(handles) {
        let response = handle.await.expect("keygen task").expect("keygen");
        assert_eq!(response.status, Status::Fail);
        if node.seed == 3 {
            continue;
        }
        assert_eq!(response.blame.fail_reason, TSS_BROKEN_MSG);
        assert!(!response.blame.is_unicast);
        assert_eq!(response.blame.blamed_pubkeys(), vec![pubkey(3).as_str()]);
        assert!(!response.blame.blame_nodes[0].blame_data.is_empty());
    }
}

#[tokio::test]
async fn test_keygen_when_party_offline_then_sync_blame_names_it() {
    let hub = Arc::new(MockHub::new());
    let nodes = build_nodes(&hub, &[1, 2, 3], &fast_config());
    hub.set_offline(&peer_id(3), true);

    let handles: Vec<_> = nodes[..2]
        .iter()
        .map(|node| {
            let server = node.server.clone();
            let request = keygen_request(&[1, 2, 3], Algorithm::Ecdsa);
            tokio::spawn(async move { server.keygen(&request).await })
        })
        .collect();
    for handle in handles {
        let response = handle.await.expect("keygen task").expect("keygen");
        assert_eq!(response.status, Status::Fail);
        assert_eq!(response.blame.fail_reason, TSS_SYNC_FAIL);
        assert_eq!(response.blame.blamed_pubkeys(), vec![pubkey(3).as_str()]);
    }
}

#[tokio::test]
async fn test_keygen_when_local_key_not_in_request_then_structural_error() {
    let hub = Arc::new(MockHub::new());
    let nodes = build_nodes(&hub, &[1], &fast_config());
    let err = nodes[0].server.keygen(&keygen_request(&[2, 3], Algorithm::Ecdsa)).await.expect_err("outsider");
    assert!(matches!(err, tss_core::TssError::LocalIdentity(_)));
}
