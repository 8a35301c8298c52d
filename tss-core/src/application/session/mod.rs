//! One protocol session: pumps round messages between the network and the computation engine.
//!
//! Inbound handling runs on the caller's task; outbound delivery runs on a relay task fed
//! through a queue, so a slow peer never blocks protocol state. Both stop on the session's
//! [`StopSignal`].

mod cache;
mod signer;

pub use cache::LocalCacheItem;
pub use signer::MessageSigner;

use crate::application::blame_manager::BlameManager;
use crate::application::engine::{ComputationEngine, EngineError, EngineEvent, EngineMessage, EngineOutcome};
use crate::application::round_registry::RoundRegistry;
use crate::domain::blame::{HASH_CHECK_FAIL, TSS_BROKEN_MSG, TSS_TIMEOUT};
use crate::domain::round::{previous_unicast, Routing};
use crate::domain::{check_unicast, Algorithm, Blame, BlameNode, Operation, PartyInfo, RoundKey, RoundMessage, WireMessage};
use crate::foundation::{MessageHash, PartyId, PeerId, Result, SessionId, StopSignal, TssError, MAILBOX_CAPACITY};
use crate::infrastructure::config::TransportConfig;
use crate::infrastructure::transport::{
    broadcast_with_retry, BroadcastConfirm, Communication, InboundMessage, Mailbox, MessageType, TaskDone, TssControl,
    WrappedMessage,
};
use log::{debug, error, info, trace, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const fn round_message_type(operation: Operation) -> MessageType {
    match operation {
        Operation::Keygen => MessageType::KeyGenMsg,
        Operation::Keysign => MessageType::KeySignMsg,
        Operation::Regroup => MessageType::RegroupMsg,
    }
}

pub const fn verification_message_type(operation: Operation) -> MessageType {
    match operation {
        Operation::Regroup => MessageType::RegroupVerMsg,
        Operation::Keygen | Operation::Keysign => MessageType::VerificationMsg,
    }
}

/// Message types a session of `operation` subscribes to.
pub const fn session_message_types(operation: Operation) -> [MessageType; 4] {
    [round_message_type(operation), verification_message_type(operation), MessageType::ControlMsg, MessageType::TaskDone]
}

#[derive(Clone, Debug)]
pub struct SessionParams {
    pub session_id: SessionId,
    pub algorithm: Algorithm,
    pub operation: Operation,
    pub timeout: Duration,
    pub transport: TransportConfig,
}

/// Why a session ended without a result, and who is to blame.
#[derive(Debug)]
pub struct SessionFailure {
    pub error: TssError,
    pub blame: Blame,
}

struct Outbound {
    peers: Vec<PeerId>,
    message: WrappedMessage,
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn is_fatal(err: &TssError) -> bool {
    matches!(err, TssError::EngineFailure { .. } | TssError::HashInconsistency { .. } | TssError::UnknownRound(_))
}

pub struct TssSession {
    params: SessionParams,
    party_info: Arc<PartyInfo>,
    registry: Arc<RoundRegistry>,
    blame: Arc<BlameManager>,
    communication: Arc<dyn Communication>,
    signer: MessageSigner,
    stop: StopSignal,
    threshold: usize,
    cache: HashMap<RoundKey, LocalCacheItem>,
    requested: HashSet<(RoundKey, MessageHash)>,
    finished_peers: HashSet<PeerId>,
    finished: bool,
    outbound: mpsc::Sender<Outbound>,
    relay_rx: Option<mpsc::Receiver<Outbound>>,
}

impl TssSession {
    pub fn new(
        params: SessionParams,
        party_info: Arc<PartyInfo>,
        communication: Arc<dyn Communication>,
        signer: MessageSigner,
        stop: StopSignal,
    ) -> Result<Self> {
        let local_key = signer.public_key_hex();
        if party_info.local_party().pubkey != local_key {
            return Err(TssError::LocalIdentity(format!("signing key {} does not match local party", local_key)));
        }
        let threshold = party_info.threshold()?;
        let registry = Arc::new(RoundRegistry::new());
        let blame = Arc::new(BlameManager::new(party_info.clone(), registry.clone()));
        let (outbound, relay_rx) = mpsc::channel(MAILBOX_CAPACITY);
        Ok(Self {
            params,
            party_info,
            registry,
            blame,
            communication,
            signer,
            stop,
            threshold,
            cache: HashMap::new(),
            requested: HashSet::new(),
            finished_peers: HashSet::new(),
            finished: false,
            outbound,
            relay_rx: Some(relay_rx),
        })
    }

    pub fn blame_manager(&self) -> Arc<BlameManager> {
        self.blame.clone()
    }

    /// Runs the session to completion, failure or deadline.
    pub async fn run(
        mut self,
        mut engine: Box<dyn ComputationEngine>,
        mailbox: &mut Mailbox,
    ) -> std::result::Result<EngineOutcome, SessionFailure> {
        let session_id = self.params.session_id;
        let Some(relay_rx) = self.relay_rx.take() else {
            let error = TssError::Message("session relay already taken".to_string());
            return Err(SessionFailure { error, blame: Blame::default() });
        };
        let mut relay = AbortOnDrop(tokio::spawn(relay_loop(
            self.communication.clone(),
            relay_rx,
            self.params.transport.clone(),
            self.stop.clone(),
            session_id,
        )));
        info!(
            "session start session_id={} algorithm={} operation={} parties={} threshold={} timeout_secs={}",
            session_id.short(),
            self.params.algorithm,
            self.params.operation,
            self.party_info.len(),
            self.threshold,
            self.params.timeout.as_secs()
        );

        let deadline = Instant::now() + self.params.timeout;
        let result = match self.drive(engine.as_mut(), mailbox, deadline).await {
            Ok(outcome) => {
                self.finish(engine.as_mut(), mailbox, deadline).await;
                info!("session complete session_id={}", session_id.short());
                Ok(outcome)
            }
            Err(error) => {
                let blame = self.blame.blame();
                warn!("session failed session_id={} error={} blame={}", session_id.short(), error, blame);
                Err(SessionFailure { error, blame })
            }
        };

        let flush = self.params.transport.message_timeout();
        let stop = self.stop.clone();
        drop(self);
        if tokio::time::timeout(flush, &mut relay.0).await.is_err() {
            debug!("session relay flush timed out session_id={}", session_id.short());
        }
        stop.raise();
        result
    }

    async fn drive(
        &mut self,
        engine: &mut dyn ComputationEngine,
        mailbox: &mut Mailbox,
        deadline: Instant,
    ) -> Result<EngineOutcome> {
        if self.stop.is_raised() {
            return Err(TssError::SessionCancelled);
        }
        let events = match engine.start() {
            Ok(events) => events,
            Err(err) => return Err(self.engine_failure(err, None)),
        };
        if let Some(outcome) = self.process_events(events).await? {
            return Ok(outcome);
        }

        let stop = self.stop.clone();
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = stop.raised() => return Err(TssError::SessionCancelled),
                _ = &mut sleep => return Err(self.on_timeout()),
                inbound = mailbox.recv() => {
                    let Some(inbound) = inbound else {
                        return Err(TssError::transport("session", "mailbox closed"));
                    };
                    match self.handle_inbound(engine, inbound).await {
                        Ok(Some(outcome)) => return Ok(outcome),
                        Ok(None) => {}
                        Err(err) if is_fatal(&err) => return Err(err),
                        Err(err) => self.log_dropped(&err),
                    }
                }
            }
        }
    }

    /// Announces completion and keeps serving recovery requests until every peer is done.
    async fn finish(&mut self, engine: &mut dyn ComputationEngine, mailbox: &mut Mailbox, deadline: Instant) {
        self.finished = true;
        let peers = self.party_info.remote_peers();
        let sent = match WrappedMessage::new(MessageType::TaskDone, self.params.session_id, &TaskDone { task_done: true }) {
            Ok(message) => self.enqueue(peers.clone(), message).await,
            Err(err) => Err(err),
        };
        if let Err(err) = sent {
            warn!("session task done broadcast failed session_id={} error={}", self.params.session_id.short(), err);
        }

        let stop = self.stop.clone();
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        while self.finished_peers.len() < peers.len() {
            tokio::select! {
                _ = stop.raised() => break,
                _ = &mut sleep => {
                    info!(
                        "session deadline reached before all peers finished session_id={} finished={} peers={}",
                        self.params.session_id.short(),
                        self.finished_peers.len(),
                        peers.len()
                    );
                    break;
                }
                inbound = mailbox.recv() => {
                    let Some(inbound) = inbound else { break };
                    if let Err(err) = self.handle_inbound(engine, inbound).await {
                        self.log_dropped(&err);
                    }
                }
            }
        }
    }

    fn log_dropped(&self, err: &TssError) {
        if err.is_non_fatal() {
            warn!("session non-fatal condition session_id={} error={}", self.params.session_id.short(), err);
        } else {
            warn!("session dropped inbound message session_id={} error={}", self.params.session_id.short(), err);
        }
    }

    async fn handle_inbound(&mut self, engine: &mut dyn ComputationEngine, inbound: InboundMessage) -> Result<Option<EngineOutcome>> {
        let InboundMessage { peer_id, message } = inbound;
        if message.session_id != self.params.session_id {
            return Err(TssError::InvalidWireMessage(format!("foreign session {}", message.session_id.short())));
        }
        let operation = self.params.operation;
        match message.message_type {
            kind if kind == round_message_type(operation) => {
                if self.finished {
                    return Ok(None);
                }
                let wire: WireMessage = message.decode_body()?;
                self.process_wire(engine, &peer_id, wire).await
            }
            kind if kind == verification_message_type(operation) => {
                if self.finished {
                    return Ok(None);
                }
                let confirm: BroadcastConfirm = message.decode_body()?;
                self.process_confirm(engine, &peer_id, confirm).await
            }
            MessageType::ControlMsg => {
                let control: TssControl = message.decode_body()?;
                self.process_control(engine, &peer_id, control).await
            }
            MessageType::TaskDone => {
                let _: TaskDone = message.decode_body()?;
                self.process_task_done(&peer_id)?;
                Ok(None)
            }
            other => {
                trace!("session ignoring message type={} from={}", other, peer_id);
                Ok(None)
            }
        }
    }

    async fn process_wire(
        &mut self,
        engine: &mut dyn ComputationEngine,
        sender: &PeerId,
        wire: WireMessage,
    ) -> Result<Option<EngineOutcome>> {
        wire.routing.validate()?;
        let owner =
            self.party_info.party(&wire.routing.from).cloned().ok_or_else(|| TssError::PartyNotFound(wire.routing.from.to_string()))?;
        if owner.peer_id != *sender {
            return Err(TssError::InvalidWireMessage(format!("message of {} relayed by {}", owner.peer_id, sender)));
        }
        if owner.id == *self.party_info.local_id() {
            return Ok(None);
        }
        MessageSigner::verify(&wire, &self.params.session_id, &owner.pubkey)?;

        if !wire.routing.is_broadcast {
            let local = self.party_info.local_id();
            if !wire.routing.to.as_ref().is_some_and(|to| to.contains(local)) {
                let details = format!("unicast {} from {} not addressed to us", wire.round_tag, owner.peer_id);
                return Err(TssError::InvalidWireMessage(details));
            }
            self.blame.set_last_unicast_peer(&wire.round_tag, sender.clone());
            return self.apply_share(engine, wire).await;
        }

        let key = wire.cache_key();
        if self.registry.contains(&key) {
            debug!("session duplicate broadcast ignored key={}", key);
            return Ok(None);
        }
        let hash = wire.payload_hash();
        self.cache.entry(key.clone()).or_default().set_message(self.party_info.local_id(), wire);
        let peers: Vec<PeerId> = self.party_info.remote_peers().into_iter().filter(|peer| peer != sender).collect();
        let confirm = WrappedMessage::new(
            verification_message_type(self.params.operation),
            self.params.session_id,
            &BroadcastConfirm { key: key.clone(), hash },
        )?;
        self.enqueue(peers, confirm).await?;
        self.try_apply(engine, &key).await
    }

    async fn process_confirm(
        &mut self,
        engine: &mut dyn ComputationEngine,
        sender: &PeerId,
        confirm: BroadcastConfirm,
    ) -> Result<Option<EngineOutcome>> {
        let party = self
            .party_info
            .party_by_peer(sender)
            .map(|party| party.id.clone())
            .ok_or_else(|| TssError::PeerNotFound(sender.to_string()))?;
        let key = confirm.key;
        let owner = key.owner();
        if party == owner {
            return Err(TssError::InvalidWireMessage(format!("owner {} confirmed its own broadcast {}", sender, key)));
        }
        if self.party_info.party(&owner).is_none() || RoundMessage::from_tag(key.round_tag()).is_err() {
            return Err(TssError::InvalidWireMessage(format!("confirmation for unknown key {}", key)));
        }
        if self.registry.contains(&key) {
            return Ok(None);
        }
        trace!("session confirm key={} from={} hash={}", key, sender, confirm.hash.short());
        self.cache.entry(key.clone()).or_default().update_confirm(party, confirm.hash);
        self.try_apply(engine, &key).await
    }

    async fn process_control(
        &mut self,
        engine: &mut dyn ComputationEngine,
        sender: &PeerId,
        control: TssControl,
    ) -> Result<Option<EngineOutcome>> {
        let Some(message) = control.msg else {
            let pending = self
                .cache
                .get(&control.req_key)
                .and_then(|item| item.message())
                .filter(|message| message.payload_hash().ct_eq(&control.req_hash))
                .cloned();
            let Some(cached) = self.registry.get(&control.req_key).or(pending) else {
                debug!("session recovery request for uncached share key={} from={}", control.req_key, sender);
                return Ok(None);
            };
            debug!("session answering recovery request key={} to={}", control.req_key, sender);
            let reply = TssControl { msg: Some(cached), ..control };
            let reply = WrappedMessage::new(MessageType::ControlMsg, self.params.session_id, &reply)?;
            self.enqueue(vec![sender.clone()], reply).await?;
            return Ok(None);
        };

        let key = control.req_key;
        if self.finished || self.registry.contains(&key) || !self.requested.contains(&(key.clone(), control.req_hash)) {
            trace!("session unsolicited recovery response key={} from={}", key, sender);
            return Ok(None);
        }
        if message.cache_key() != key || !message.payload_hash().ct_eq(&control.req_hash) {
            return Err(TssError::InvalidWireMessage(format!("recovery response for {} does not match the request", key)));
        }
        let owner =
            self.party_info.party(&message.routing.from).ok_or_else(|| TssError::PartyNotFound(message.routing.from.to_string()))?;
        MessageSigner::verify(&message, &self.params.session_id, &owner.pubkey)?;
        info!("session recovered share key={} via={}", key, sender);
        self.cache.entry(key.clone()).or_default().set_message(self.party_info.local_id(), message);
        self.try_apply(engine, &key).await
    }

    fn process_task_done(&mut self, sender: &PeerId) -> Result<()> {
        if self.party_info.party_by_peer(sender).is_none() {
            return Err(TssError::PeerNotFound(sender.to_string()));
        }
        if !self.finished_peers.insert(sender.clone()) {
            return Err(TssError::DuplicatedNotification { peer_id: sender.clone() });
        }
        debug!(
            "session peer finished session_id={} peer_id={} finished={}",
            self.params.session_id.short(),
            sender,
            self.finished_peers.len()
        );
        Ok(())
    }

    async fn try_apply(&mut self, engine: &mut dyn ComputationEngine, key: &RoundKey) -> Result<Option<EngineOutcome>> {
        let Some(item) = self.cache.get(key) else {
            return Ok(None);
        };
        let check = item.hash_check(key, self.threshold);
        let message = item.message().cloned();
        let majority = item.highest_freq().map(|(hash, _)| (hash, item.parties_with_hash(&hash)));

        match check {
            Ok(()) => {
                self.cache.remove(key);
                let Some(message) = message else {
                    return Ok(None);
                };
                self.registry.set(key.clone(), message.clone());
                self.apply_share(engine, message).await
            }
            Err(TssError::NotEnoughPeers { .. }) => Ok(None),
            Err(TssError::NotMajority { .. }) => {
                if message.is_none() {
                    if let Some((hash, holders)) = majority {
                        self.request_share(key, hash, holders).await?;
                    }
                }
                Ok(None)
            }
            Err(err @ TssError::HashInconsistency { .. }) => {
                if let Some(message) = message {
                    let pubkey = self.blame.tss_wrong_share_blame(&message)?;
                    error!("session hash check failed key={} owner={}", key, pubkey);
                    let node = BlameNode::with_evidence(pubkey, message.payload, message.signature);
                    self.blame.set_blame(HASH_CHECK_FAIL, vec![node], false);
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn request_share(&mut self, key: &RoundKey, hash: MessageHash, holders: Vec<PartyId>) -> Result<()> {
        if !self.requested.insert((key.clone(), hash)) {
            return Ok(());
        }
        let local = self.party_info.local_id();
        let peers: Vec<PeerId> =
            holders.iter().filter(|party| *party != local).filter_map(|party| self.party_info.peer_of(party).cloned()).collect();
        info!("session requesting missing share key={} hash={} peers={}", key, hash.short(), peers.len());
        let control = TssControl {
            req_hash: hash,
            req_key: key.clone(),
            request_type: round_message_type(self.params.operation),
            msg: None,
        };
        let message = WrappedMessage::new(MessageType::ControlMsg, self.params.session_id, &control)?;
        self.enqueue(peers, message).await
    }

    async fn apply_share(&mut self, engine: &mut dyn ComputationEngine, message: WireMessage) -> Result<Option<EngineOutcome>> {
        let from = message.routing.from.clone();
        let round = match RoundMessage::from_tag(&message.round_tag) {
            Ok(round) if round.algorithm() == self.params.algorithm && round.operation() == self.params.operation => round,
            _ => {
                let pubkey = self.blame.tss_wrong_share_blame(&message)?;
                warn!("session share with unknown round tag={} from={}", message.round_tag, pubkey);
                let tag = message.round_tag.clone();
                let node = BlameNode::with_evidence(pubkey, message.payload, message.signature);
                self.blame.set_blame(TSS_BROKEN_MSG, vec![node], false);
                return Err(TssError::UnknownRound(tag));
            }
        };
        if (round.routing() == Routing::Broadcast) != message.routing.is_broadcast {
            return Err(TssError::InvalidWireMessage(format!("routing of {} from {} contradicts its round", round, from)));
        }
        let info = round.round_info();
        if self.blame.check_msg_duplication(&info, &from) {
            debug!("session duplicate share skipped round={} from={}", round, from);
            return Ok(None);
        }
        if !message.routing.is_broadcast {
            self.registry.set(message.cache_key(), message.clone());
        }
        match engine.update(&message) {
            Ok(events) => {
                self.blame.update_accept_share(info, from);
                self.process_events(events).await
            }
            Err(err) => Err(self.engine_failure(err, Some(round))),
        }
    }

    async fn process_events(&mut self, events: Vec<EngineEvent>) -> Result<Option<EngineOutcome>> {
        let mut outcome = None;
        for event in events {
            match event {
                EngineEvent::Message(message) => self.send_out(message).await?,
                EngineEvent::Finished(done) => outcome = Some(done),
            }
        }
        Ok(outcome)
    }

    async fn send_out(&mut self, message: EngineMessage) -> Result<()> {
        let round = RoundMessage::from_tag(&message.round_tag)?;
        let mut wire =
            WireMessage { routing: message.routing, round_tag: message.round_tag, payload: message.payload, signature: Vec::new() };
        self.signer.sign(&mut wire, &self.params.session_id);
        self.blame.set_last_produced(round);

        let peers = match round.routing() {
            Routing::Broadcast => {
                self.registry.set(wire.cache_key(), wire.clone());
                self.party_info.remote_peers()
            }
            Routing::PointToPoint => {
                let local = self.party_info.local_id();
                wire.routing
                    .to
                    .iter()
                    .flatten()
                    .filter(|id| *id != local)
                    .map(|id| self.party_info.peer_of(id).cloned().ok_or_else(|| TssError::PartyNotFound(id.to_string())))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        trace!("session outbound round={} peers={} bytes={}", round, peers.len(), wire.payload.len());
        let wrapped = WrappedMessage::new(round_message_type(self.params.operation), self.params.session_id, &wire)?;
        self.enqueue(peers, wrapped).await
    }

    async fn enqueue(&self, peers: Vec<PeerId>, message: WrappedMessage) -> Result<()> {
        if peers.is_empty() {
            return Ok(());
        }
        self.outbound.send(Outbound { peers, message }).await.map_err(|_| TssError::transport("relay", "relay task stopped"))
    }

    fn engine_failure(&self, err: EngineError, round: Option<RoundMessage>) -> TssError {
        let tag = round.map(|round| round.tag()).unwrap_or_default();
        let nodes: Vec<BlameNode> = err
            .culprits
            .iter()
            .filter_map(|id| self.party_info.party(id))
            .map(|party| self.blame.node_with_evidence(&party.pubkey, tag))
            .collect();
        let is_unicast = round.is_some_and(|round| check_unicast(self.params.algorithm, self.params.operation, round.index()));
        error!(
            "session engine failure session_id={} round={} culprits={} reason={}",
            self.params.session_id.short(),
            tag,
            nodes.len(),
            err.reason
        );
        self.blame.set_blame(TSS_BROKEN_MSG, nodes, is_unicast);
        TssError::EngineFailure { culprits: err.culprits.iter().map(|id| id.to_string()).collect(), details: err.reason }
    }

    /// Attributes a stalled session: unicast senders first, then broadcast senders, then missing shares.
    fn on_timeout(&self) -> TssError {
        let session_id = self.params.session_id;
        let error = TssError::SessionTimeout { session_id: session_id.to_string(), elapsed_secs: self.params.timeout.as_secs() };
        let Some(last) = self.blame.last_produced() else {
            warn!("session timed out before producing anything session_id={}", session_id.short());
            return error;
        };

        if let Some(unicast) = previous_unicast(last) {
            match self.blame.get_unicast_blame(unicast.tag()) {
                Ok(nodes) if !nodes.is_empty() && nodes.len() <= self.threshold => {
                    self.blame.set_blame(TSS_TIMEOUT, nodes, true);
                }
                Ok(_) => {}
                Err(err) => debug!("session unicast blame skipped round={} error={}", unicast, err),
            }
        }

        match self.blame.get_broadcast_blame(last.tag()) {
            Ok(nodes) => self.blame.add_blame_nodes(nodes),
            Err(err) => warn!("session broadcast blame failed round={} error={}", last, err),
        }

        if self.blame.blame().blame_nodes.is_empty() {
            match self.blame.tss_missing_share_blame(self.params.algorithm, self.params.operation) {
                Ok((nodes, is_unicast)) if !nodes.is_empty() && nodes.len() <= self.threshold => {
                    self.blame.set_blame(TSS_TIMEOUT, nodes, is_unicast);
                }
                Ok(_) => {}
                Err(err) => warn!("session missing share blame failed error={}", err),
            }
        }

        self.blame.set_blame(TSS_TIMEOUT, Vec::new(), false);
        warn!("session timed out session_id={} last_produced={} blame={}", session_id.short(), last, self.blame.blame());
        error
    }
}

async fn relay_loop(
    communication: Arc<dyn Communication>,
    mut rx: mpsc::Receiver<Outbound>,
    transport: TransportConfig,
    stop: StopSignal,
    session_id: SessionId,
) {
    loop {
        let outbound = tokio::select! {
            _ = stop.raised() => break,
            outbound = rx.recv() => match outbound {
                Some(outbound) => outbound,
                None => break,
            },
        };
        let count = outbound.peers.len();
        if let Err(err) = broadcast_with_retry(communication.as_ref(), &outbound.peers, outbound.message, &transport).await {
            warn!("session relay failed session_id={} peers={} error={}", session_id.short(), count, err);
        }
    }
    trace!("session relay stopped session_id={}", session_id.short());
}
