//! Entry point for keygen, keysign and regroup requests.

use crate::application::engine::{EngineContext, EngineFactory, EngineOutcome};
use crate::application::party_coordinator::{JoinPartyFailure, PartyCoordinator};
use crate::application::session::{session_message_types, MessageSigner, SessionParams, TssSession};
use crate::domain::blame::{node_sync_blame, INTERNAL_ERROR};
use crate::domain::party::{peer_id_from_pubkey, threshold_for};
use crate::domain::{
    Algorithm, Blame, KeygenRequest, KeygenResponse, KeysignRequest, KeysignResponse, Operation, PartyInfo, RegroupRequest,
    RegroupResponse, SignatureNotifier, Status,
};
use crate::foundation::{PeerId, Result, SessionId, StopSignal, TssError, MAILBOX_CAPACITY};
use crate::infrastructure::config::TssConfig;
use crate::infrastructure::storage::{KeygenLocalState, StateManager};
use crate::infrastructure::transport::{Communication, Subscription};
use ed25519_dalek::SigningKey;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

enum Completion {
    Done(EngineOutcome),
    Failed(Blame),
}

fn unexpected_outcome(operation: Operation, outcome: &EngineOutcome) -> TssError {
    let kind = match outcome {
        EngineOutcome::KeyGenerated { .. } => "key generated",
        EngineOutcome::Signed { .. } => "signed",
        EngineOutcome::Regrouped { .. } => "regrouped",
    };
    TssError::Message(format!("{} session finished with a {} outcome", operation, kind))
}

/// Blame for a join-party that did not gather every expected peer.
pub fn join_party_blame(keys: &[String], failure: &JoinPartyFailure) -> Result<Blame> {
    if failure.outcome.leader.is_none() && failure.outcome.online_peers.is_empty() {
        return Ok(Blame::new(INTERNAL_ERROR, Vec::new()));
    }
    node_sync_blame(keys, &failure.outcome.online_peers)
}

pub struct TssServer {
    config: TssConfig,
    communication: Arc<dyn Communication>,
    state_manager: Arc<dyn StateManager>,
    engines: Arc<dyn EngineFactory>,
    signing_key: SigningKey,
    local_pubkey: String,
    coordinator: PartyCoordinator,
    shutdown: StopSignal,
    keygen_lock: Mutex<()>,
    keysign_lock: Mutex<()>,
    regroup_lock: Mutex<()>,
}

impl TssServer {
    pub fn new(
        config: TssConfig,
        communication: Arc<dyn Communication>,
        state_manager: Arc<dyn StateManager>,
        engines: Arc<dyn EngineFactory>,
        signing_key: SigningKey,
    ) -> Result<Self> {
        let local_pubkey = hex::encode(signing_key.verifying_key().as_bytes());
        let derived = peer_id_from_pubkey(&local_pubkey)?;
        let transport_peer = communication.local_peer_id()?;
        if derived != transport_peer {
            return Err(TssError::LocalIdentity(format!("node key maps to {} but transport runs as {}", derived, transport_peer)));
        }
        let coordinator = PartyCoordinator::new(communication.clone(), config.party.clone(), config.transport.clone());
        info!("tss server ready pubkey={} peer_id={}", local_pubkey, transport_peer);
        Ok(Self {
            config,
            communication,
            state_manager,
            engines,
            signing_key,
            local_pubkey,
            coordinator,
            shutdown: StopSignal::new(),
            keygen_lock: Mutex::new(()),
            keysign_lock: Mutex::new(()),
            regroup_lock: Mutex::new(()),
        })
    }

    pub fn local_pubkey(&self) -> &str {
        &self.local_pubkey
    }

    /// Cancels running and future operations.
    pub fn shutdown(&self) {
        if self.shutdown.raise() {
            info!("tss server shutting down pubkey={}", self.local_pubkey);
        }
    }

    pub async fn keygen(&self, request: &KeygenRequest) -> Result<KeygenResponse> {
        request.validate()?;
        let _guard = self.keygen_lock.lock().await;
        let keys = request.party_keys();
        let session_id = request.session_id();
        info!(
            "keygen request session_id={} algo={} parties={} block_height={}",
            session_id.short(),
            request.algo,
            keys.len(),
            request.block_height
        );

        let completion = self.run_operation(Operation::Keygen, request.algo, session_id, &keys, |context| context).await?;
        match completion {
            Completion::Done(EngineOutcome::KeyGenerated { pub_key, local_data }) => {
                let state = KeygenLocalState {
                    pub_key: pub_key.clone(),
                    local_data,
                    participant_keys: keys,
                    local_party_key: self.local_pubkey.clone(),
                };
                self.state_manager.save_local_state(&state, request.algo)?;
                if let Err(err) = self.state_manager.save_address_book(&self.communication.export_peer_addresses()) {
                    warn!("keygen address book not saved session_id={} error={}", session_id.short(), err);
                }
                info!("keygen success session_id={} pub_key={}", session_id.short(), pub_key);
                Ok(KeygenResponse { pub_key, status: Status::Success, blame: Blame::default() })
            }
            Completion::Done(other) => Err(unexpected_outcome(Operation::Keygen, &other)),
            Completion::Failed(blame) => Ok(KeygenResponse { status: Status::Fail, blame, ..Default::default() }),
        }
    }

    pub async fn keysign(&self, request: &KeysignRequest) -> Result<KeysignResponse> {
        request.validate()?;
        let _guard = self.keysign_lock.lock().await;
        let pool_pub_key = request.pool_pub_key.trim().to_string();
        let state = self.state_manager.get_local_state(&pool_pub_key, request.algo)?;
        let signers = request.signer_keys();
        if let Some(outsider) = signers.iter().find(|key| !state.participant_keys.contains(key)) {
            return Err(TssError::InvalidRequest(format!("signer {} did not take part in keygen", outsider)));
        }
        let threshold = threshold_for(state.participant_keys.len())?;
        if signers.len() < threshold + 1 {
            return Err(TssError::InvalidRequest(format!("{} signers cannot meet threshold {}", signers.len(), threshold)));
        }
        if !signers.contains(&self.local_pubkey) {
            return Err(TssError::NotASigner);
        }

        let messages = request.decoded_messages()?;
        let session_id = request.session_id();
        let notifier = SignatureNotifier::new(session_id.to_string(), messages.clone(), pool_pub_key.clone(), request.algo)?;
        info!(
            "keysign request session_id={} algo={} signers={} messages={} pool_pub_key={}",
            session_id.short(),
            request.algo,
            signers.len(),
            messages.len(),
            pool_pub_key
        );

        let prepare = |mut context: EngineContext| {
            context.local_state = Some(state);
            context.pool_pub_key = Some(pool_pub_key.clone());
            context.messages = messages;
            context
        };
        let completion = self.run_operation(Operation::Keysign, request.algo, session_id, &signers, prepare).await?;
        match completion {
            Completion::Done(EngineOutcome::Signed { signatures }) => {
                if !notifier.process_signatures(&signatures)? {
                    return Err(TssError::Message(format!("keysign {} returned an empty signature", session_id.short())));
                }
                info!("keysign success session_id={} signatures={}", session_id.short(), signatures.len());
                Ok(KeysignResponse { signatures, status: Status::Success, blame: Blame::default() })
            }
            Completion::Done(other) => Err(unexpected_outcome(Operation::Keysign, &other)),
            Completion::Failed(blame) => Ok(KeysignResponse { status: Status::Fail, blame, ..Default::default() }),
        }
    }

    pub async fn regroup(&self, request: &RegroupRequest) -> Result<RegroupResponse> {
        request.validate()?;
        let _guard = self.regroup_lock.lock().await;
        let pool_pub_key = request.pool_pub_key.trim().to_string();
        let old_keys = request.old_keys();
        let new_keys = request.new_keys();
        let all_keys = request.all_keys();
        let is_old = old_keys.contains(&self.local_pubkey);
        let is_new = new_keys.contains(&self.local_pubkey);
        let local_state = if is_old { Some(self.state_manager.get_local_state(&pool_pub_key, request.algo)?) } else { None };
        let session_id = request.session_id();
        info!(
            "regroup request session_id={} algo={} old={} new={} is_old={} is_new={}",
            session_id.short(),
            request.algo,
            old_keys.len(),
            new_keys.len(),
            is_old,
            is_new
        );

        let prepare = |mut context: EngineContext| {
            context.local_state = local_state;
            context.pool_pub_key = Some(pool_pub_key.clone());
            context.old_party_keys = old_keys;
            context.new_party_keys = new_keys.clone();
            context
        };
        let completion = self.run_operation(Operation::Regroup, request.algo, session_id, &all_keys, prepare).await?;
        match completion {
            Completion::Done(EngineOutcome::Regrouped { pub_key, local_data }) => {
                if is_new {
                    let state = KeygenLocalState {
                        pub_key: pub_key.clone(),
                        local_data,
                        participant_keys: new_keys,
                        local_party_key: self.local_pubkey.clone(),
                    };
                    self.state_manager.save_local_state(&state, request.algo)?;
                }
                info!("regroup success session_id={} new_pub_key={}", session_id.short(), pub_key);
                Ok(RegroupResponse { new_pub_key: pub_key, status: Status::Success, blame: Blame::default() })
            }
            Completion::Done(other) => Err(unexpected_outcome(Operation::Regroup, &other)),
            Completion::Failed(blame) => Ok(RegroupResponse { status: Status::Fail, blame, ..Default::default() }),
        }
    }

    async fn run_operation(
        &self,
        operation: Operation,
        algorithm: Algorithm,
        session_id: SessionId,
        keys: &[String],
        prepare: impl FnOnce(EngineContext) -> EngineContext,
    ) -> Result<Completion> {
        let party_info = Arc::new(PartyInfo::from_keys(keys, &self.local_pubkey)?);
        let transport_peer = self.communication.local_peer_id()?;
        if party_info.local_party().peer_id != transport_peer {
            return Err(TssError::LocalIdentity(format!("transport peer {} is not the local party", transport_peer)));
        }

        let (subscription, mut mailbox) =
            Subscription::open(self.communication.clone(), &session_message_types(operation), session_id, MAILBOX_CAPACITY);

        let expected: Vec<PeerId> = party_info.parties().map(|party| party.peer_id.clone()).collect();
        let joined = match self.coordinator.join_party_with_retry(session_id, &expected, &self.shutdown).await {
            Ok(joined) => joined,
            Err(failure) => {
                let blame = join_party_blame(keys, &failure)?;
                warn!(
                    "join party failed session_id={} operation={} error={} blame={}",
                    session_id.short(),
                    operation,
                    failure.error,
                    blame
                );
                return Ok(Completion::Failed(blame));
            }
        };
        info!(
            "join party complete session_id={} operation={} online={} leader={}",
            session_id.short(),
            operation,
            joined.online_peers.len(),
            joined.leader.as_ref().map(|leader| leader.to_string()).unwrap_or_default()
        );

        let mut context = EngineContext::new(algorithm, operation, session_id, party_info.clone());
        context.pre_param_timeout = self.config.session.pre_param_timeout();
        let engine = self.engines.create(prepare(context))?;

        let params = SessionParams {
            session_id,
            algorithm,
            operation,
            timeout: self.config.session.timeout_for(operation),
            transport: self.config.transport.clone(),
        };
        let stop = StopSignal::new();
        let signer = MessageSigner::new(self.signing_key.clone());
        let session = TssSession::new(params, party_info, self.communication.clone(), signer, stop.clone())?;

        let result = tokio::select! {
            result = session.run(engine, &mut mailbox) => result,
            _ = self.shutdown.raised() => {
                stop.raise();
                warn!("session aborted by shutdown session_id={}", session_id.short());
                return Err(TssError::SessionCancelled);
            }
        };
        drop(subscription);

        match result {
            Ok(outcome) => Ok(Completion::Done(outcome)),
            Err(failure) => {
                error!("session failed session_id={} operation={} error={}", session_id.short(), operation, failure.error);
                Ok(Completion::Failed(failure.blame))
            }
        }
    }
}
