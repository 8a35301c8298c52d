use crate::fixtures::{broadcast_message, party_id, party_info, peer_id, pubkey, sorted_pubkeys};
use std::sync::Arc;
use tss_core::application::{BlameManager, RoundRegistry};
use tss_core::domain::blame::{TSS_BROKEN_MSG, TSS_TIMEOUT};
use tss_core::domain::{check_unicast, Algorithm, BlameNode, Operation, RoundMessage};
use tss_core::foundation::PartyId;
use tss_core::TssError;

const SEEDS: [u8; 4] = [1, 2, 3, 4];

fn manager() -> BlameManager {
    BlameManager::new(party_info(&SEEDS, 1), Arc::new(RoundRegistry::new()))
}

fn blamed(nodes: &[BlameNode]) -> Vec<String> {
    nodes.iter().map(|node| node.pubkey.clone()).collect()
}

#[test]
fn test_missing_share_blame_when_round_incomplete_then_blames_absentees() {
    let manager = manager();
    let unicast = RoundMessage::EcdsaKeysign1Unicast.round_info();
    let broadcast = RoundMessage::EcdsaKeysign1.round_info();
    for seed in [2, 3, 4] {
        manager.update_accept_share(unicast.clone(), party_id(seed));
    }
    manager.update_accept_share(broadcast.clone(), party_id(2));
    manager.update_accept_share(broadcast, party_id(3));

    let (nodes, is_unicast) = manager.tss_missing_share_blame(Algorithm::Ecdsa, Operation::Keysign).expect("blame");
    assert_eq!(blamed(&nodes), vec![pubkey(4)]);
    assert_eq!(is_unicast, check_unicast(Algorithm::Ecdsa, Operation::Keysign, RoundMessage::EcdsaKeysign1.index()));
}

#[test]
fn test_missing_share_blame_when_later_round_started_then_blames_its_absentees() {
    let manager = manager();
    manager.update_accept_share(RoundMessage::EcdsaKeygen1.round_info(), party_id(2));
    manager.update_accept_share(RoundMessage::EcdsaKeygen1.round_info(), party_id(3));
    manager.update_accept_share(RoundMessage::EcdsaKeygen2Unicast.round_info(), party_id(2));

    let (nodes, is_unicast) = manager.tss_missing_share_blame(Algorithm::Ecdsa, Operation::Keygen).expect("blame");
    assert_eq!(blamed(&nodes), sorted_pubkeys(&[3, 4]));
    assert!(is_unicast);
}

#[test]
fn test_missing_share_blame_when_earlier_round_complete_then_latest_round_still_blamed() {
    let manager = manager();
    for seed in [2, 3, 4] {
        manager.update_accept_share(RoundMessage::EcdsaKeygen1.round_info(), party_id(seed));
    }
    manager.update_accept_share(RoundMessage::EcdsaKeygen2Unicast.round_info(), party_id(2));

    let (nodes, is_unicast) = manager.tss_missing_share_blame(Algorithm::Ecdsa, Operation::Keygen).expect("blame");
    assert_eq!(blamed(&nodes), sorted_pubkeys(&[3, 4]));
    assert_eq!(is_unicast, check_unicast(Algorithm::Ecdsa, Operation::Keygen, RoundMessage::EcdsaKeygen2Unicast.index()));
}

#[test]
fn test_missing_share_blame_when_only_first_round_seen_then_blames_first_round_absentees() {
    let manager = manager();
    manager.update_accept_share(RoundMessage::EddsaRegroup1.round_info(), party_id(4));

    let (nodes, is_unicast) = manager.tss_missing_share_blame(Algorithm::Eddsa, Operation::Regroup).expect("blame");
    assert_eq!(blamed(&nodes), sorted_pubkeys(&[2, 3]));
    assert!(!is_unicast);
}

#[test]
fn test_missing_share_blame_when_every_round_complete_then_empty() {
    let manager = manager();
    for seed in [2, 3, 4] {
        manager.update_accept_share(RoundMessage::EddsaKeygen1.round_info(), party_id(seed));
    }
    let (nodes, is_unicast) = manager.tss_missing_share_blame(Algorithm::Eddsa, Operation::Keygen).expect("blame");
    assert!(nodes.is_empty());
    assert!(!is_unicast);

    // Shares of another protocol are not considered.
    manager.update_accept_share(RoundMessage::EcdsaKeygen1.round_info(), party_id(2));
    let (nodes, _) = manager.tss_missing_share_blame(Algorithm::Eddsa, Operation::Keygen).expect("blame");
    assert!(nodes.is_empty());
}

#[test]
fn test_accept_share_when_pair_repeats_then_reported_duplicate() {
    let manager = manager();
    let round = RoundMessage::EcdsaKeygen2.round_info();
    assert!(!manager.check_msg_duplication(&round, &party_id(2)));
    assert!(manager.update_accept_share(round.clone(), party_id(2)));
    assert!(manager.check_msg_duplication(&round, &party_id(2)));
    assert!(!manager.update_accept_share(round.clone(), party_id(2)));
    assert_eq!(manager.accepted_shares(&round).len(), 1);
}

#[test]
fn test_wrong_share_blame_when_sender_known_then_names_only_sender() {
    let manager = manager();
    let message = broadcast_message(3, "KGRound1Message", b"bad");
    assert_eq!(manager.tss_wrong_share_blame(&message).expect("blame"), pubkey(3));

    let stranger = broadcast_message(9, "KGRound1Message", b"bad");
    assert!(matches!(manager.tss_wrong_share_blame(&stranger), Err(TssError::PartyNotFound(_))));
}

#[test]
fn test_unicast_blame_when_nothing_recorded_then_empty() {
    let manager = manager();
    assert!(manager.get_unicast_blame("SignRound2Message").expect("blame").is_empty());
}

#[test]
fn test_unicast_blame_when_tag_unknown_then_not_found() {
    let manager = manager();
    manager.set_last_unicast_peer("SignRound1Message1", peer_id(2));
    let err = manager.get_unicast_blame("SignRound2Message").expect_err("unknown tag");
    assert!(matches!(err, TssError::UnicastPeersNotFound { message_type } if message_type == "SignRound2Message"));
}

#[test]
fn test_unicast_blame_when_peer_silent_then_blames_it() {
    let manager = manager();
    manager.set_last_unicast_peer("SignRound2Message", peer_id(2));
    manager.set_last_unicast_peer("SignRound2Message", peer_id(4));
    manager.set_last_unicast_peer("SignRound2Message", peer_id(2));
    assert_eq!(blamed(&manager.get_unicast_blame("SignRound2Message").expect("blame")), vec![pubkey(3)]);
}

#[test]
fn test_broadcast_blame_when_round_uncached_then_empty() {
    let manager = manager();
    assert!(manager.get_broadcast_blame("SignRound6Message").expect("blame").is_empty());
}

#[test]
fn test_broadcast_blame_when_some_senders_cached_then_blames_the_rest() {
    let manager = manager();
    for seed in [1, 2] {
        let message = broadcast_message(seed, "SignRound6Message", &[seed]);
        manager.registry().set(message.cache_key(), message);
    }
    let mut expected = vec![pubkey(3), pubkey(4)];
    expected.sort();
    assert_eq!(blamed(&manager.get_broadcast_blame("SignRound6Message").expect("blame")), expected);
}

#[test]
fn test_node_with_evidence_when_message_cached_then_attaches_payload() {
    let manager = manager();
    let message = broadcast_message(2, "SignRound3Message", b"payload");
    manager.registry().set(message.cache_key(), message.clone());

    let node = manager.node_with_evidence(&pubkey(2), "SignRound3Message");
    assert_eq!(node.blame_data, message.payload);
    assert_eq!(node.blame_signature, message.signature);
    assert!(manager.node_with_evidence(&pubkey(3), "SignRound3Message").blame_data.is_empty());
}

#[test]
fn test_set_blame_when_reason_already_set_then_first_reason_sticks() {
    let manager = manager();
    manager.set_blame(TSS_BROKEN_MSG, vec![BlameNode::new(pubkey(2))], true);
    manager.set_blame(TSS_TIMEOUT, vec![BlameNode::new(pubkey(3)), BlameNode::new(pubkey(2))], false);

    let blame = manager.blame();
    assert_eq!(blame.fail_reason, TSS_BROKEN_MSG);
    assert!(blame.is_unicast);
    assert_eq!(blame.blame_nodes.len(), 2);
}

#[test]
fn test_check_unicast_when_called_repeatedly_then_answer_is_stable() {
    for algorithm in [Algorithm::Ecdsa, Algorithm::Eddsa] {
        for operation in [Operation::Keygen, Operation::Keysign, Operation::Regroup] {
            for index in 0..12 {
                assert_eq!(check_unicast(algorithm, operation, index), check_unicast(algorithm, operation, index));
            }
        }
    }
    assert!(check_unicast(Algorithm::Ecdsa, Operation::Keygen, 1));
    assert!(!check_unicast(Algorithm::Ecdsa, Operation::Keygen, 3));
    assert!(check_unicast(Algorithm::Eddsa, Operation::Keysign, 3));
}

#[test]
fn test_party_ids_when_built_from_keys_then_ordered_by_pubkey() {
    let info = party_info(&SEEDS, 2);
    let ids: Vec<PartyId> = info.parties().map(|party| party.id.clone()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    assert_eq!(info.remote_peers().len(), 3);
    assert!(!info.remote_peers().contains(&peer_id(2)));
}
