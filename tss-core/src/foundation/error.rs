use crate::foundation::PeerId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    JoinPartyTimeout,
    LocalIdentity,
    PartyNotFound,
    PeerNotFound,
    UnknownRound,
    InvalidWireMessage,
    UnicastPeersNotFound,
    NotEnoughPeers,
    NotMajority,
    HashInconsistency,
    EngineFailure,
    SessionTimeout,
    SessionCancelled,
    DuplicatedNotification,
    MessageTooLarge,
    InvalidPublicKey,
    SignatureVerificationFailed,
    InvalidRequest,
    NotASigner,
    InvalidStateTransition,
    StorageError,
    SerializationError,
    TransportError,
    ConfigError,
    EncodingError,
    Message,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum TssError {
    // === Party formation ===
    #[error("join party timed out: {online} of {expected} peers online")]
    JoinPartyTimeout { online: usize, expected: usize },

    #[error("cannot resolve local identity: {0}")]
    LocalIdentity(String),

    #[error("party not found: {0}")]
    PartyNotFound(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    // === Protocol ===
    #[error("unknown round tag: {0}")]
    UnknownRound(String),

    #[error("invalid wire message: {0}")]
    InvalidWireMessage(String),

    #[error("no unicast peers recorded for message type {message_type}")]
    UnicastPeersNotFound { message_type: String },

    #[error("not enough peers confirmed the broadcast: have={have} need={need}")]
    NotEnoughPeers { have: usize, need: usize },

    #[error("no hash reached majority for key {key}")]
    NotMajority { key: String },

    #[error("broadcast hash inconsistent for key {key}")]
    HashInconsistency { key: String },

    #[error("computation engine failed: {details} (culprits: {culprits:?})")]
    EngineFailure { culprits: Vec<String>, details: String },

    #[error("session {session_id} timed out after {elapsed_secs}s")]
    SessionTimeout { session_id: String, elapsed_secs: u64 },

    #[error("session cancelled")]
    SessionCancelled,

    /// Non-fatal: a peer sent task-done more than once for the same session.
    #[error("duplicated notification from peer {peer_id} ignored")]
    DuplicatedNotification { peer_id: PeerId },

    #[error("message too large: {size} exceeds max {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("invalid public key: input={input} reason={reason}")]
    InvalidPublicKey { input: String, reason: String },

    #[error("message signature verification failed from party {party}")]
    SignatureVerificationFailed { party: String },

    // === Requests ===
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("local node is not a signer of this request")]
    NotASigner,

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // === Infrastructure ===
    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("transport error during {operation}: {details}")]
    TransportError { operation: String, details: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, TssError>;

impl TssError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TssError::JoinPartyTimeout { .. } => ErrorCode::JoinPartyTimeout,
            TssError::LocalIdentity(_) => ErrorCode::LocalIdentity,
            TssError::PartyNotFound(_) => ErrorCode::PartyNotFound,
            TssError::PeerNotFound(_) => ErrorCode::PeerNotFound,
            TssError::UnknownRound(_) => ErrorCode::UnknownRound,
            TssError::InvalidWireMessage(_) => ErrorCode::InvalidWireMessage,
            TssError::UnicastPeersNotFound { .. } => ErrorCode::UnicastPeersNotFound,
            TssError::NotEnoughPeers { .. } => ErrorCode::NotEnoughPeers,
            TssError::NotMajority { .. } => ErrorCode::NotMajority,
            TssError::HashInconsistency { .. } => ErrorCode::HashInconsistency,
            TssError::EngineFailure { .. } => ErrorCode::EngineFailure,
            TssError::SessionTimeout { .. } => ErrorCode::SessionTimeout,
            TssError::SessionCancelled => ErrorCode::SessionCancelled,
            TssError::DuplicatedNotification { .. } => ErrorCode::DuplicatedNotification,
            TssError::MessageTooLarge { .. } => ErrorCode::MessageTooLarge,
            TssError::InvalidPublicKey { .. } => ErrorCode::InvalidPublicKey,
            TssError::SignatureVerificationFailed { .. } => ErrorCode::SignatureVerificationFailed,
            TssError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            TssError::NotASigner => ErrorCode::NotASigner,
            TssError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            TssError::StorageError { .. } => ErrorCode::StorageError,
            TssError::SerializationError { .. } => ErrorCode::SerializationError,
            TssError::TransportError { .. } => ErrorCode::TransportError,
            TssError::ConfigError(_) => ErrorCode::ConfigError,
            TssError::EncodingError(_) => ErrorCode::EncodingError,
            TssError::Message(_) => ErrorCode::Message,
        }
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext { code: self.code(), message: self.to_string() }
    }

    /// Conditions that are reported but never end a session.
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, TssError::DuplicatedNotification { .. } | TssError::NotEnoughPeers { .. })
    }

    pub fn transport(operation: impl Into<String>, details: impl Into<String>) -> Self {
        TssError::TransportError { operation: operation.into(), details: details.into() }
    }
}

impl From<hex::FromHexError> for TssError {
    fn from(err: hex::FromHexError) -> Self {
        TssError::EncodingError(format!("hex decode error: {}", err))
    }
}

impl From<base64::DecodeError> for TssError {
    fn from(err: base64::DecodeError) -> Self {
        TssError::EncodingError(format!("base64 decode error: {}", err))
    }
}

impl From<toml::de::Error> for TssError {
    fn from(err: toml::de::Error) -> Self {
        TssError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<figment::Error> for TssError {
    fn from(err: figment::Error) -> Self {
        TssError::ConfigError(format!("config extraction failed: {}", err))
    }
}

impl From<bincode::Error> for TssError {
    fn from(err: bincode::Error) -> Self {
        TssError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for TssError {
    fn from(err: serde_json::Error) -> Self {
        TssError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

// Wrap `std::io::Error` at the call site with `storage_err!` so the operation is kept.

#[macro_export]
macro_rules! storage_err {
    ($op:expr, $err:expr) => {
        $crate::foundation::TssError::StorageError { operation: $op.into(), details: $err.to_string() }
    };
}

#[macro_export]
macro_rules! serde_err {
    ($format:expr, $err:expr) => {
        $crate::foundation::TssError::SerializationError { format: $format.into(), details: $err.to_string() }
    };
}
