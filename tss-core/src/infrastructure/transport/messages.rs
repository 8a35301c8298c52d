use crate::domain::{RoundKey, WireMessage};
use crate::foundation::{MessageHash, PeerId, Result, SessionId};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    KeyGenMsg,
    KeySignMsg,
    VerificationMsg,
    ControlMsg,
    TaskDone,
    RegroupMsg,
    RegroupVerMsg,
    JoinParty,
}

impl MessageType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::KeyGenMsg => "keygen",
            Self::KeySignMsg => "keysign",
            Self::VerificationMsg => "verification",
            Self::ControlMsg => "control",
            Self::TaskDone => "task_done",
            Self::RegroupMsg => "regroup",
            Self::RegroupVerMsg => "regroup_verification",
            Self::JoinParty => "join_party",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outer envelope every transport carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedMessage {
    pub message_type: MessageType,
    pub session_id: SessionId,
    pub payload: Vec<u8>,
}

fn body_options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

impl WrappedMessage {
    pub fn new<T: Serialize>(message_type: MessageType, session_id: SessionId, body: &T) -> Result<Self> {
        let payload = body_options().serialize(body).map_err(|err| crate::serde_err!("bincode", err))?;
        Ok(Self { message_type, session_id, payload })
    }

    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T> {
        body_options().deserialize(&self.payload).map_err(|err| crate::serde_err!("bincode", err))
    }
}

/// Body of `KeyGenMsg`, `KeySignMsg` and `RegroupMsg`.
pub type RoundMessageBody = WireMessage;

/// Body of `VerificationMsg` / `RegroupVerMsg`: the hash a peer saw for a broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastConfirm {
    pub key: RoundKey,
    pub hash: MessageHash,
}

/// Body of `ControlMsg`. A request carries no message; the reply carries the cached one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TssControl {
    pub req_hash: MessageHash,
    pub req_key: RoundKey,
    pub request_type: MessageType,
    pub msg: Option<WireMessage>,
}

/// Body of `TaskDone`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDone {
    pub task_done: bool,
}

/// Body of `JoinParty`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinPartyMessage {
    Announce { peer_id: PeerId },
    Roster { leader: PeerId, peers: Vec<PeerId>, complete: bool },
}
