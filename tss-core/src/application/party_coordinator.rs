//! Join-party: agree on the live peer set and a leader before a session starts.

use crate::foundation::{PeerId, Result, SessionId, StopSignal, TssError, LEADER_SCORE_DOMAIN, MAILBOX_CAPACITY};
use crate::infrastructure::config::{PartyConfig, TransportConfig};
use crate::infrastructure::transport::{
    broadcast_with_retry, Communication, InboundMessage, JoinPartyMessage, MessageType, Subscription, WrappedMessage,
};
use log::{debug, info, trace, warn};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartyState {
    Idle,
    Announcing,
    CollectingResponses,
    LeaderAggregating,
    Following,
    Done,
    TimedOut,
}

impl fmt::Display for PartyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const VALID_TRANSITIONS: &[(PartyState, PartyState)] = &[
    (PartyState::Idle, PartyState::Announcing),
    (PartyState::Announcing, PartyState::CollectingResponses),
    (PartyState::CollectingResponses, PartyState::LeaderAggregating),
    (PartyState::CollectingResponses, PartyState::Following),
    (PartyState::CollectingResponses, PartyState::TimedOut),
    (PartyState::LeaderAggregating, PartyState::Done),
    (PartyState::LeaderAggregating, PartyState::TimedOut),
    (PartyState::Following, PartyState::Done),
    (PartyState::Following, PartyState::TimedOut),
];

impl PartyState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PartyState::Done | PartyState::TimedOut)
    }
}

/// Tracks one join-party run and rejects transitions outside the table.
#[derive(Debug)]
pub struct PartyStateMachine {
    session_id: SessionId,
    state: PartyState,
}

impl PartyStateMachine {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id, state: PartyState::Idle }
    }

    pub fn state(&self) -> PartyState {
        self.state
    }

    pub fn advance(&mut self, to: PartyState) -> Result<()> {
        if !VALID_TRANSITIONS.contains(&(self.state, to)) {
            return Err(TssError::InvalidStateTransition { from: self.state.to_string(), to: to.to_string() });
        }
        debug!("join party state session_id={} from={} to={}", self.session_id.short(), self.state, to);
        self.state = to;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinPartyOutcome {
    /// Sorted peer ids observed online, including the local peer.
    pub online_peers: Vec<PeerId>,
    /// `None` when the run failed before any peer exchange.
    pub leader: Option<PeerId>,
}

/// A failed join-party still reports what it saw so the caller can blame the rest.
#[derive(Debug)]
pub struct JoinPartyFailure {
    pub outcome: JoinPartyOutcome,
    pub error: TssError,
}

impl JoinPartyFailure {
    fn structural(error: TssError) -> Self {
        Self { outcome: JoinPartyOutcome::default(), error }
    }
}

/// Deterministic leader: the expected peer with the lowest salted blake3 score.
pub fn elect_leader(salt: &str, session_id: &SessionId, peers: &[PeerId]) -> Option<PeerId> {
    peers
        .iter()
        .map(|peer| {
            let mut hasher = blake3::Hasher::new();
            hasher.update(LEADER_SCORE_DOMAIN);
            hasher.update(salt.as_bytes());
            hasher.update(session_id.as_hash());
            hasher.update(peer.as_str().as_bytes());
            (*hasher.finalize().as_bytes(), peer)
        })
        .min()
        .map(|(_, peer)| peer.clone())
}

pub struct PartyCoordinator {
    communication: Arc<dyn Communication>,
    party: PartyConfig,
    transport: TransportConfig,
}

impl PartyCoordinator {
    pub fn new(communication: Arc<dyn Communication>, party: PartyConfig, transport: TransportConfig) -> Self {
        Self { communication, party, transport }
    }

    pub async fn join_party_with_retry(
        &self,
        session_id: SessionId,
        expected: &[PeerId],
        stop: &StopSignal,
    ) -> std::result::Result<JoinPartyOutcome, JoinPartyFailure> {
        let local = self.communication.local_peer_id().map_err(JoinPartyFailure::structural)?;
        let expected: BTreeSet<PeerId> = expected.iter().cloned().collect();
        if !expected.contains(&local) {
            return Err(JoinPartyFailure::structural(TssError::LocalIdentity(format!(
                "local peer {} is not among the {} expected peers",
                local,
                expected.len()
            ))));
        }
        let expected_list: Vec<PeerId> = expected.iter().cloned().collect();
        let leader = elect_leader(&self.party.leader_salt, &session_id, &expected_list)
            .ok_or_else(|| JoinPartyFailure::structural(TssError::LocalIdentity("empty expected peer set".to_string())))?;
        let remote: Vec<PeerId> = expected_list.iter().filter(|peer| **peer != local).cloned().collect();
        let is_leader = leader == local;

        let (_subscription, mut mailbox) =
            Subscription::open(self.communication.clone(), &[MessageType::JoinParty], session_id, MAILBOX_CAPACITY);
        let mut machine = PartyStateMachine::new(session_id);
        let mut observed: BTreeSet<PeerId> = BTreeSet::from([local.clone()]);
        let failure = |observed: &BTreeSet<PeerId>, error: TssError| JoinPartyFailure {
            outcome: JoinPartyOutcome { online_peers: observed.iter().cloned().collect(), leader: Some(leader.clone()) },
            error,
        };

        info!(
            "join party start session_id={} expected={} leader={} is_leader={}",
            session_id.short(),
            expected.len(),
            leader,
            is_leader
        );
        let deadline = Instant::now() + self.party.join_party_timeout();
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        let mut ticker = tokio::time::interval(self.party.retry_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        machine.advance(PartyState::Announcing).map_err(|err| failure(&observed, err))?;
        ticker.tick().await;
        self.announce(session_id, &local, &remote).await;
        machine.advance(PartyState::CollectingResponses).map_err(|err| failure(&observed, err))?;

        loop {
            if is_leader && observed == expected {
                machine.advance(PartyState::LeaderAggregating).map_err(|err| failure(&observed, err))?;
                self.send_roster(session_id, &local, &observed, &remote, true).await;
                machine.advance(PartyState::Done).map_err(|err| failure(&observed, err))?;
                info!("join party complete as leader session_id={} online={}", session_id.short(), observed.len());
                return Ok(JoinPartyOutcome { online_peers: observed.into_iter().collect(), leader: Some(leader.clone()) });
            }

            tokio::select! {
                _ = stop.raised() => {
                    warn!("join party cancelled session_id={} observed={}", session_id.short(), observed.len());
                    return Err(failure(&observed, TssError::SessionCancelled));
                }
                _ = &mut sleep => {
                    let timeout = TssError::JoinPartyTimeout { online: observed.len(), expected: expected.len() };
                    if is_leader {
                        machine.advance(PartyState::LeaderAggregating).map_err(|err| failure(&observed, err))?;
                        self.send_roster(session_id, &local, &observed, &remote, false).await;
                    }
                    machine.advance(PartyState::TimedOut).map_err(|err| failure(&observed, err))?;
                    warn!(
                        "join party timed out session_id={} online={} expected={} is_leader={}",
                        session_id.short(),
                        observed.len(),
                        expected.len(),
                        is_leader
                    );
                    return Err(failure(&observed, timeout));
                }
                _ = ticker.tick() => {
                    self.announce(session_id, &local, &remote).await;
                }
                inbound = mailbox.recv() => {
                    let Some(inbound) = inbound else {
                        return Err(failure(&observed, TssError::transport("join_party", "mailbox closed")));
                    };
                    let Some(roster) = handle_inbound(&inbound, &expected, &leader, &mut observed) else { continue };
                    if is_leader {
                        continue;
                    }
                    machine.advance(PartyState::Following).map_err(|err| failure(&observed, err))?;
                    let adopted: BTreeSet<PeerId> = roster.peers.into_iter().filter(|peer| expected.contains(peer)).collect();
                    let outcome = JoinPartyOutcome { online_peers: adopted.iter().cloned().collect(), leader: Some(leader.clone()) };
                    if roster.complete {
                        machine.advance(PartyState::Done).map_err(|err| failure(&adopted, err))?;
                        info!("join party complete as follower session_id={} online={}", session_id.short(), adopted.len());
                        return Ok(outcome);
                    }
                    machine.advance(PartyState::TimedOut).map_err(|err| failure(&adopted, err))?;
                    warn!("join party adopted incomplete roster session_id={} online={}", session_id.short(), adopted.len());
                    return Err(JoinPartyFailure {
                        outcome,
                        error: TssError::JoinPartyTimeout { online: adopted.len(), expected: expected.len() },
                    });
                }
            }
        }
    }

    async fn announce(&self, session_id: SessionId, local: &PeerId, remote: &[PeerId]) {
        let body = JoinPartyMessage::Announce { peer_id: local.clone() };
        let message = match WrappedMessage::new(MessageType::JoinParty, session_id, &body) {
            Ok(message) => message,
            Err(err) => {
                warn!("join party announce encode failed session_id={} error={}", session_id.short(), err);
                return;
            }
        };
        match tokio::time::timeout(self.transport.message_timeout(), self.communication.broadcast(remote, message)).await {
            Ok(Ok(())) => trace!("join party announce sent session_id={} peers={}", session_id.short(), remote.len()),
            Ok(Err(err)) => debug!("join party announce failed session_id={} error={}", session_id.short(), err),
            Err(_) => debug!("join party announce timed out session_id={}", session_id.short()),
        }
    }

    async fn send_roster(
        &self,
        session_id: SessionId,
        local: &PeerId,
        observed: &BTreeSet<PeerId>,
        remote: &[PeerId],
        complete: bool,
    ) {
        let body = JoinPartyMessage::Roster { leader: local.clone(), peers: observed.iter().cloned().collect(), complete };
        let result = match WrappedMessage::new(MessageType::JoinParty, session_id, &body) {
            Ok(message) => broadcast_with_retry(self.communication.as_ref(), remote, message, &self.transport).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            warn!("join party roster broadcast failed session_id={} complete={} error={}", session_id.short(), complete, err);
        }
    }
}

struct Roster {
    peers: Vec<PeerId>,
    complete: bool,
}

/// Folds an announcement into `observed`; returns the roster when the elected leader sent one.
fn handle_inbound(
    inbound: &InboundMessage,
    expected: &BTreeSet<PeerId>,
    leader: &PeerId,
    observed: &mut BTreeSet<PeerId>,
) -> Option<Roster> {
    let sender = &inbound.peer_id;
    if !expected.contains(sender) {
        trace!("join party ignoring unexpected peer peer_id={}", sender);
        return None;
    }
    let body = match inbound.message.decode_body::<JoinPartyMessage>() {
        Ok(body) => body,
        Err(err) => {
            warn!("join party undecodable message peer_id={} error={}", sender, err);
            return None;
        }
    };
    match body {
        JoinPartyMessage::Announce { peer_id } => {
            if peer_id != *sender {
                warn!("join party announce identity mismatch sender={} claimed={}", sender, peer_id);
                return None;
            }
            if observed.insert(peer_id) {
                debug!("join party peer online peer_id={} observed={}", sender, observed.len());
            }
            None
        }
        JoinPartyMessage::Roster { leader: claimed, peers, complete } => {
            if claimed != *leader || sender != leader {
                warn!("join party roster from non-leader sender={} claimed={} leader={}", sender, claimed, leader);
                return None;
            }
            Some(Roster { peers, complete })
        }
    }
}
