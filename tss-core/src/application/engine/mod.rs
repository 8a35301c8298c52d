//! Boundary to the cryptographic computation engine.
//!
//! The engine owns the round math and sees only opaque payloads. The session
//! router signs, routes and verifies everything it emits or consumes.

#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

use crate::domain::{Algorithm, MessageRouting, Operation, PartyInfo, Signature, WireMessage};
use crate::foundation::{PartyId, Result, SessionId};
use crate::infrastructure::storage::KeygenLocalState;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A round output the engine wants delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineMessage {
    pub routing: MessageRouting,
    pub round_tag: String,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineOutcome {
    KeyGenerated { pub_key: String, local_data: Vec<u8> },
    Signed { signatures: Vec<Signature> },
    Regrouped { pub_key: String, local_data: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    Message(EngineMessage),
    Finished(EngineOutcome),
}

/// A terminal round error, naming the parties whose input caused it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineError {
    pub culprits: Vec<PartyId>,
    pub reason: String,
}

impl EngineError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { culprits: Vec::new(), reason: reason.into() }
    }

    pub fn with_culprits(reason: impl Into<String>, culprits: Vec<PartyId>) -> Self {
        Self { culprits, reason: reason.into() }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} culprits={}", self.reason, self.culprits.len())
    }
}

impl std::error::Error for EngineError {}

pub trait ComputationEngine: Send {
    /// Produces the first round's output.
    fn start(&mut self) -> std::result::Result<Vec<EngineEvent>, EngineError>;

    /// Feeds one verified inbound message and returns whatever it unlocks.
    fn update(&mut self, message: &WireMessage) -> std::result::Result<Vec<EngineEvent>, EngineError>;
}

/// Everything an engine needs to join one session.
#[derive(Clone, Debug)]
pub struct EngineContext {
    pub algorithm: Algorithm,
    pub operation: Operation,
    pub session_id: SessionId,
    pub party_info: Arc<PartyInfo>,
    /// Present for keysign and for old committee members during regroup.
    pub local_state: Option<KeygenLocalState>,
    /// Pool key being used (keysign) or carried over (regroup).
    pub pool_pub_key: Option<String>,
    /// Messages to sign, deduplicated and sorted.
    pub messages: Vec<Vec<u8>>,
    pub old_party_keys: Vec<String>,
    pub new_party_keys: Vec<String>,
    pub pre_param_timeout: Duration,
}

impl EngineContext {
    pub fn new(algorithm: Algorithm, operation: Operation, session_id: SessionId, party_info: Arc<PartyInfo>) -> Self {
        Self {
            algorithm,
            operation,
            session_id,
            party_info,
            local_state: None,
            pool_pub_key: None,
            messages: Vec::new(),
            old_party_keys: Vec::new(),
            new_party_keys: Vec::new(),
            pre_param_timeout: Duration::from_secs(crate::foundation::PRE_PARAM_TIMEOUT_SECS),
        }
    }
}

pub trait EngineFactory: Send + Sync {
    fn create(&self, context: EngineContext) -> Result<Box<dyn ComputationEngine>>;
}
