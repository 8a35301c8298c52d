//! Deterministic stand-in for the cryptographic engine.
//!
//! Every party emits one message per round (one per peer on point-to-point rounds)
//! and advances once it holds the current round's message from every other party.
//! Payloads are a blake3 digest of the session, round and endpoints, so a receiver
//! can tell a tampered share from a genuine one.

use super::{ComputationEngine, EngineContext, EngineError, EngineEvent, EngineFactory, EngineMessage, EngineOutcome};
use crate::domain::round::Routing;
use crate::domain::{MessageRouting, Operation, RoundMessage, Signature, WireMessage};
use crate::foundation::util::encoding::encode_base64;
use crate::foundation::{PartyId, Result, SessionId, TssError};
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// Misbehaviour injected into one node's engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptedBehavior {
    /// Stop producing output after the round with this index.
    pub halt_after_index: Option<u32>,
    /// Emit a tampered payload for this round.
    pub corrupt_round: Option<RoundMessage>,
}

#[derive(Clone, Debug, Default)]
pub struct ScriptedEngineFactory {
    behavior: ScriptedBehavior,
}

impl ScriptedEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: ScriptedBehavior) -> Self {
        Self { behavior }
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn create(&self, context: EngineContext) -> Result<Box<dyn ComputationEngine>> {
        Ok(Box::new(ScriptedEngine::new(context, self.behavior.clone())?))
    }
}

pub struct ScriptedEngine {
    context: EngineContext,
    behavior: ScriptedBehavior,
    rounds: Vec<RoundMessage>,
    current: usize,
    received: HashMap<&'static str, BTreeSet<PartyId>>,
    halted: bool,
    finished: bool,
}

pub fn scripted_payload(session_id: &SessionId, round_tag: &str, from: &PartyId, to: Option<&PartyId>) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(session_id.as_hash());
    hasher.update(round_tag.as_bytes());
    hasher.update(from.as_str().as_bytes());
    if let Some(to) = to {
        hasher.update(to.as_str().as_bytes());
    }
    hasher.finalize().as_bytes().to_vec()
}

impl ScriptedEngine {
    pub fn new(context: EngineContext, behavior: ScriptedBehavior) -> Result<Self> {
        let rounds = RoundMessage::sequence(context.algorithm, context.operation);
        if rounds.is_empty() {
            return Err(TssError::UnknownRound(format!("{} {}", context.algorithm, context.operation)));
        }
        if context.operation == Operation::Keysign && context.messages.is_empty() {
            return Err(TssError::InvalidRequest("keysign engine needs messages".to_string()));
        }
        Ok(Self { context, behavior, rounds, current: 0, received: HashMap::new(), halted: false, finished: false })
    }

    fn local(&self) -> &PartyId {
        self.context.party_info.local_id()
    }

    fn emit(&mut self, round: RoundMessage) -> Vec<EngineEvent> {
        if self.behavior.halt_after_index.is_some_and(|last| round.index() > last) {
            debug!("scripted engine halted round={} local={}", round, self.local());
            self.halted = true;
            return Vec::new();
        }
        let local = self.local().clone();
        let corrupt = self.behavior.corrupt_round == Some(round);
        let payload_for = |to: Option<&PartyId>| {
            let mut payload = scripted_payload(&self.context.session_id, round.tag(), &local, to);
            if corrupt {
                payload[0] ^= 0xff;
            }
            payload
        };
        match round.routing() {
            Routing::Broadcast => vec![EngineEvent::Message(EngineMessage {
                routing: MessageRouting::broadcast(local.clone()),
                round_tag: round.tag().to_string(),
                payload: payload_for(None),
            })],
            Routing::PointToPoint => self
                .context
                .party_info
                .remote_parties()
                .map(|party| {
                    EngineEvent::Message(EngineMessage {
                        routing: MessageRouting::unicast(local.clone(), party.id.clone()),
                        round_tag: round.tag().to_string(),
                        payload: payload_for(Some(&party.id)),
                    })
                })
                .collect(),
        }
    }

    fn round_complete(&self, round: RoundMessage) -> bool {
        let received = self.received.get(round.tag());
        self.context.party_info.remote_parties().all(|party| received.is_some_and(|senders| senders.contains(&party.id)))
    }

    fn outcome(&self) -> std::result::Result<EngineOutcome, EngineError> {
        let context = &self.context;
        let mut hasher = blake3::Hasher::new();
        hasher.update(context.algorithm.as_str().as_bytes());
        for party in context.party_info.parties() {
            hasher.update(party.pubkey.as_bytes());
        }
        let local_data = scripted_payload(&context.session_id, "local-data", self.local(), None);
        match context.operation {
            Operation::Keygen => {
                hasher.update(context.session_id.as_hash());
                Ok(EngineOutcome::KeyGenerated { pub_key: hex::encode(hasher.finalize().as_bytes()), local_data })
            }
            Operation::Keysign => {
                let pool = context.pool_pub_key.clone().ok_or_else(|| EngineError::new("keysign without pool key"))?;
                let signatures = context
                    .messages
                    .iter()
                    .map(|message| {
                        let r = blake3::keyed_hash(&[1; 32], &[pool.as_bytes(), message.as_slice()].concat());
                        let s = blake3::keyed_hash(&[2; 32], &[pool.as_bytes(), message.as_slice()].concat());
                        Signature {
                            msg: encode_base64(message),
                            r: hex::encode(r.as_bytes()),
                            s: hex::encode(s.as_bytes()),
                            recovery_id: "0".to_string(),
                            signature: encode_base64(&[r.as_bytes().as_slice(), s.as_bytes().as_slice()].concat()),
                        }
                    })
                    .collect();
                Ok(EngineOutcome::Signed { signatures })
            }
            Operation::Regroup => {
                let pub_key = context.pool_pub_key.clone().ok_or_else(|| EngineError::new("regroup without pool key"))?;
                Ok(EngineOutcome::Regrouped { pub_key, local_data })
            }
        }
    }

    fn advance(&mut self) -> std::result::Result<Vec<EngineEvent>, EngineError> {
        let mut events = Vec::new();
        while !self.halted && self.current < self.rounds.len() && self.round_complete(self.rounds[self.current]) {
            self.current += 1;
            match self.rounds.get(self.current).copied() {
                Some(next) => events.extend(self.emit(next)),
                None => {
                    self.finished = true;
                    events.push(EngineEvent::Finished(self.outcome()?));
                }
            }
        }
        Ok(events)
    }
}

impl ComputationEngine for ScriptedEngine {
    fn start(&mut self) -> std::result::Result<Vec<EngineEvent>, EngineError> {
        let first = self.rounds[0];
        let mut events = self.emit(first);
        events.extend(self.advance()?);
        Ok(events)
    }

    fn update(&mut self, message: &WireMessage) -> std::result::Result<Vec<EngineEvent>, EngineError> {
        if self.finished || self.halted {
            return Ok(Vec::new());
        }
        let from = message.routing.from.clone();
        let Some(round) = self.rounds.iter().copied().find(|round| round.tag() == message.round_tag) else {
            return Err(EngineError::with_culprits(format!("unexpected round {}", message.round_tag), vec![from]));
        };
        let to = (round.routing() == Routing::PointToPoint).then(|| self.local().clone());
        let expected = scripted_payload(&self.context.session_id, round.tag(), &from, to.as_ref());
        if message.payload != expected {
            return Err(EngineError::with_culprits(format!("share verification failed round={}", round), vec![from]));
        }
        self.received.entry(round.tag()).or_default().insert(from);
        self.advance()
    }
}
