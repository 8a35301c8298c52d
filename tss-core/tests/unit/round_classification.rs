use tss_core::domain::round::{previous_unicast, round_count, Routing};
use tss_core::domain::{Algorithm, Operation, RoundInfo, RoundMessage};
use tss_core::TssError;

#[test]
fn test_classify_when_tag_known_then_index_and_routing_match_engine() {
    let info = RoundInfo::classify("SignRound2Message").expect("classify");
    assert_eq!(info.index, 2);
    let message = RoundMessage::from_tag("SignRound2Message").expect("classify");
    assert_eq!(message.routing(), Routing::PointToPoint);
    assert_eq!(RoundMessage::from_tag("EDDSAKGRound2Message1").expect("classify").routing(), Routing::PointToPoint);
    assert_eq!(RoundMessage::from_tag("DGRound4Message").expect("classify").operation(), Operation::Regroup);
}

#[test]
fn test_classify_when_tag_unknown_then_unknown_round() {
    assert!(matches!(RoundInfo::classify("SignRound10Message"), Err(TssError::UnknownRound(_))));
    assert!(matches!(RoundMessage::from_tag(""), Err(TssError::UnknownRound(_))));
}

#[test]
fn test_previous_unicast_when_regroup_past_share_round_then_returns_share_round() {
    assert_eq!(previous_unicast(RoundMessage::EcdsaRegroup4), Some(RoundMessage::EcdsaRegroup3Share));
    assert_eq!(previous_unicast(RoundMessage::EddsaRegroup3Decommit), Some(RoundMessage::EddsaRegroup3Share));
    assert_eq!(previous_unicast(RoundMessage::EcdsaRegroup2Ack), None);
    assert_eq!(previous_unicast(RoundMessage::EddsaKeygen2), Some(RoundMessage::EddsaKeygen2Unicast));
}

#[test]
fn test_round_info_when_sorted_then_follows_engine_index() {
    let mut infos: Vec<RoundInfo> =
        RoundMessage::sequence(Algorithm::Ecdsa, Operation::Keysign).iter().rev().map(|message| message.round_info()).collect();
    infos.sort();
    let indices: Vec<u32> = infos.iter().map(|info| info.index).collect();
    assert_eq!(indices, (0..=9).collect::<Vec<u32>>());
    assert_eq!(round_count(Algorithm::Eddsa, Operation::Keysign), 3);
    assert_eq!(round_count(Algorithm::Ecdsa, Operation::Keysign), 10);
    assert_eq!(round_count(Algorithm::Eddsa, Operation::Regroup), 6);
}
