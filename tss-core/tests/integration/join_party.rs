use crate::fixtures::{fast_config, peer_id, sorted_peer_ids, sorted_pubkeys, FAST_JOIN_PARTY_TIMEOUT_SECS};
use std::sync::Arc;
use std::time::Duration;
use tss_core::application::server::join_party_blame;
use tss_core::application::PartyCoordinator;
use tss_core::domain::blame::TSS_SYNC_FAIL;
use tss_core::foundation::{SessionId, StopSignal};
use tss_core::infrastructure::transport::mock::{MockCommunication, MockHub};
use tss_core::TssError;

fn coordinator(hub: &Arc<MockHub>, seed: u8) -> PartyCoordinator {
    let config = fast_config();
    PartyCoordinator::new(Arc::new(MockCommunication::new(hub.clone(), peer_id(seed))), config.party, config.transport)
}

#[tokio::test]
async fn test_join_party_when_all_online_then_every_node_agrees() {
    let hub = Arc::new(MockHub::new());
    let session = SessionId::new([21; 32]);
    let expected = sorted_peer_ids(&[1, 2, 3, 4]);

    let handles: Vec<_> = [1u8, 2, 3, 4]
        .into_iter()
        .map(|seed| {
            let coordinator = coordinator(&hub, seed);
            let expected = expected.clone();
            tokio::spawn(async move { coordinator.join_party_with_retry(session, &expected, &StopSignal::new()).await })
        })
        .collect();

    let mut leaders = Vec::new();
    for handle in handles {
        let outcome = handle.await.expect("join task").expect("join party");
        assert_eq!(outcome.online_peers, expected);
        leaders.push(outcome.leader.expect("leader"));
    }
    leaders.dedup();
    assert_eq!(leaders.len(), 1);
    assert!(expected.contains(&leaders[0]));
}

#[tokio::test]
async fn test_join_party_when_half_join_after_deadline_then_early_nodes_keep_partial_subset() {
    let hub = Arc::new(MockHub::new());
    let session = SessionId::new([22; 32]);
    let expected = sorted_peer_ids(&[1, 2, 3, 4]);
    let spawn_join = |seed: u8, stop: StopSignal| {
        let coordinator = coordinator(&hub, seed);
        let expected = expected.clone();
        tokio::spawn(async move { coordinator.join_party_with_retry(session, &expected, &stop).await })
    };

    let early: Vec<_> = [1u8, 2].into_iter().map(|seed| spawn_join(seed, StopSignal::new())).collect();
    tokio::time::sleep(Duration::from_secs(FAST_JOIN_PARTY_TIMEOUT_SECS) + Duration::from_millis(750)).await;

    let late_stop = StopSignal::new();
    let late: Vec<_> = [3u8, 4].into_iter().map(|seed| spawn_join(seed, late_stop.clone())).collect();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let live = sorted_peer_ids(&[1, 2]);
    for handle in early {
        let failure = handle.await.expect("join task").expect_err("partial join must fail");
        assert!(matches!(failure.error, TssError::JoinPartyTimeout { expected: 4, .. }));
        assert_eq!(failure.outcome.online_peers, live);

        let blame = join_party_blame(&sorted_pubkeys(&[1, 2, 3, 4]), &failure).expect("blame");
        assert_eq!(blame.fail_reason, TSS_SYNC_FAIL);
        let mut blamed: Vec<String> = blame.blame_nodes.iter().map(|node| node.pubkey.clone()).collect();
        blamed.sort();
        assert_eq!(blamed, sorted_pubkeys(&[3, 4]));
    }

    assert!(late_stop.raise());
    for handle in late {
        assert!(handle.await.expect("join task").is_err());
    }
}

#[tokio::test]
async fn test_join_party_when_stopped_then_cancelled() {
    let hub = Arc::new(MockHub::new());
    let session = SessionId::new([23; 32]);
    let expected = sorted_peer_ids(&[1, 2, 3]);
    let stop = StopSignal::new();

    let coordinator = coordinator(&hub, 1);
    let task_stop = stop.clone();
    let handle = tokio::spawn(async move { coordinator.join_party_with_retry(session, &expected, &task_stop).await });
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(stop.raise());

    let failure = handle.await.expect("join task").expect_err("cancelled");
    assert!(matches!(failure.error, TssError::SessionCancelled));
    assert_eq!(failure.outcome.online_peers, vec![peer_id(1)]);
}

#[tokio::test]
async fn test_join_party_when_local_not_expected_then_structural_failure() {
    let hub = Arc::new(MockHub::new());
    let coordinator = coordinator(&hub, 5);
    let failure = coordinator
        .join_party_with_retry(SessionId::new([24; 32]), &sorted_peer_ids(&[1, 2]), &StopSignal::new())
        .await
        .expect_err("outsider");
    assert!(matches!(failure.error, TssError::LocalIdentity(_)));
    assert!(failure.outcome.leader.is_none());
}
