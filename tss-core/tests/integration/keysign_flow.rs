use crate::fixtures::{
    build_node, build_nodes, fast_config, keysign_request, pubkey, seed_local_state, TestNode, TEST_MESSAGE_A, TEST_MESSAGE_B,
};
use std::sync::Arc;
use tss_core::application::engine::scripted::ScriptedBehavior;
use tss_core::domain::blame::TSS_TIMEOUT;
use tss_core::domain::{Algorithm, KeysignResponse, Status};
use tss_core::foundation::util::encoding::encode_base64;
use tss_core::infrastructure::transport::mock::MockHub;
use tss_core::TssError;

const SEEDS: [u8; 4] = [1, 2, 3, 4];

async fn run_keysign(nodes: &[TestNode], signers: &[u8], algo: Algorithm) -> Vec<KeysignResponse> {
    let handles: Vec<_> = nodes
        .iter()
        .map(|node| {
            let server = node.server.clone();
            let request = keysign_request(signers, &[TEST_MESSAGE_B, TEST_MESSAGE_A, TEST_MESSAGE_A], algo);
            tokio::spawn(async move { server.keysign(&request).await })
        })
        .collect();
    let mut responses = Vec::new();
    for handle in handles {
        responses.push(handle.await.expect("keysign task").expect("keysign"));
    }
    responses
}

#[tokio::test]
async fn test_keysign_when_all_signers_honest_then_signatures_cover_deduped_messages() {
    let hub = Arc::new(MockHub::new());
    let nodes = build_nodes(&hub, &SEEDS, &fast_config());
    for node in &nodes {
        seed_local_state(node, &SEEDS, Algorithm::Eddsa);
    }

    let responses = run_keysign(&nodes, &SEEDS, Algorithm::Eddsa).await;
    let mut expected = vec![TEST_MESSAGE_A.to_vec(), TEST_MESSAGE_B.to_vec()];
    expected.sort();
    for response in &responses {
        assert_eq!(response.status, Status::Success, "blame {}", response.blame);
        assert_eq!(response.signatures, responses[0].signatures);
        let signed: Vec<String> = response.signatures.iter().map(|signature| signature.msg.clone()).collect();
        assert_eq!(signed, expected.iter().map(|message| encode_base64(message)).collect::<Vec<_>>());
        assert!(response.signatures.iter().all(|signature| !signature.signature.is_empty()));
    }
}

#[tokio::test]
async fn test_keysign_when_party_stops_after_round_five_then_live_parties_blame_only_it() {
    let hub = Arc::new(MockHub::new());
    let config = fast_config();
    let halted = ScriptedBehavior { halt_after_index: Some(5), ..Default::default() };
    let nodes: Vec<TestNode> = SEEDS
        .into_iter()
        .map(|seed| build_node(&hub, seed, &config, if seed == 4 { halted.clone() } else { ScriptedBehavior::default() }))
        .collect();
    for node in &nodes {
        seed_local_state(node, &SEEDS, Algorithm::Ecdsa);
    }

    let responses = run_keysign(&nodes, &SEEDS, Algorithm::Ecdsa).await;
    for (node, response) in nodes.iter().zip(&responses) {
        assert_eq!(response.status, Status::Fail);
        assert!(response.signatures.is_empty());
        if node.seed == 4 {
            continue;
        }
        assert_eq!(response.blame.fail_reason, TSS_TIMEOUT);
        assert!(!response.blame.is_unicast);
        assert_eq!(response.blame.blamed_pubkeys(), vec![pubkey(4).as_str()]);
    }
}

#[tokio::test]
async fn test_keysign_when_local_node_not_signer_then_not_a_signer() {
    let hub = Arc::new(MockHub::new());
    let nodes = build_nodes(&hub, &[4], &fast_config());
    seed_local_state(&nodes[0], &SEEDS, Algorithm::Ecdsa);

    let request = keysign_request(&[1, 2, 3], &[TEST_MESSAGE_A], Algorithm::Ecdsa);
    let err = nodes[0].server.keysign(&request).await.expect_err("not signer");
    assert!(matches!(err, TssError::NotASigner));
}

#[tokio::test]
async fn test_keysign_when_signers_below_threshold_then_invalid_request() {
    let hub = Arc::new(MockHub::new());
    let nodes = build_nodes(&hub, &[1], &fast_config());
    seed_local_state(&nodes[0], &SEEDS, Algorithm::Ecdsa);

    let err = nodes[0].server.keysign(&keysign_request(&[1, 2], &[TEST_MESSAGE_A], Algorithm::Ecdsa)).await.expect_err("too few");
    assert!(matches!(err, TssError::InvalidRequest(_)));

    let err = nodes[0].server.keysign(&keysign_request(&[1, 2, 9], &[TEST_MESSAGE_A], Algorithm::Ecdsa)).await.expect_err("outsider");
    assert!(matches!(err, TssError::InvalidRequest(message) if message.contains("did not take part")));
}

#[tokio::test]
async fn test_keysign_when_no_local_state_then_storage_error() {
    let hub = Arc::new(MockHub::new());
    let nodes = build_nodes(&hub, &[1], &fast_config());
    let err = nodes[0].server.keysign(&keysign_request(&SEEDS, &[TEST_MESSAGE_A], Algorithm::Eddsa)).await.expect_err("no state");
    assert!(matches!(err, TssError::StorageError { .. }));
}
