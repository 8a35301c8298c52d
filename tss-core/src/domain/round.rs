//! Protocol round classification.
//!
//! Every payload the computation engine emits is tagged with its message type
//! name. This module is the single table that maps that tag to the algorithm,
//! operation, round index and wire routing of the message.

use crate::foundation::{Result, TssError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Ecdsa,
    Eddsa,
}

impl Algorithm {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ecdsa => "ecdsa",
            Self::Eddsa => "eddsa",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TssError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ecdsa" | "secp256k1" => Ok(Self::Ecdsa),
            "eddsa" | "ed25519" => Ok(Self::Eddsa),
            other => Err(TssError::InvalidRequest(format!("unsupported algorithm: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Keygen,
    Keysign,
    Regroup,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Keygen => "keygen",
            Self::Keysign => "keysign",
            Self::Regroup => "regroup",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the engine addresses a message on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routing {
    Broadcast,
    PointToPoint,
}

/// Every round message the supported engines produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoundMessage {
    EcdsaKeygen1,
    EcdsaKeygen2Unicast,
    EcdsaKeygen2,
    EcdsaKeygen3,
    EcdsaKeysign1Unicast,
    EcdsaKeysign1,
    EcdsaKeysign2Unicast,
    EcdsaKeysign3,
    EcdsaKeysign4,
    EcdsaKeysign5,
    EcdsaKeysign6,
    EcdsaKeysign7,
    EcdsaKeysign8,
    EcdsaKeysign9,
    EcdsaRegroup1,
    EcdsaRegroup2Paillier,
    EcdsaRegroup2Ack,
    EcdsaRegroup3Share,
    EcdsaRegroup3Decommit,
    EcdsaRegroup4,
    EddsaKeygen1,
    EddsaKeygen2Unicast,
    EddsaKeygen2,
    EddsaKeysign1,
    EddsaKeysign2,
    EddsaKeysign3,
    EddsaRegroup1,
    EddsaRegroup2,
    EddsaRegroup3Share,
    EddsaRegroup3Decommit,
    EddsaRegroup4,
}

struct RoundRow {
    message: RoundMessage,
    tag: &'static str,
    algorithm: Algorithm,
    operation: Operation,
    index: u32,
    routing: Routing,
}

const fn row(
    message: RoundMessage,
    tag: &'static str,
    algorithm: Algorithm,
    operation: Operation,
    index: u32,
    routing: Routing,
) -> RoundRow {
    RoundRow { message, tag, algorithm, operation, index, routing }
}

use Algorithm::{Ecdsa, Eddsa};
use Operation::{Keygen, Keysign, Regroup};
use Routing::{Broadcast, PointToPoint};

// Ordered by (algorithm, operation, index). Resharing indices are engine-defined and
// EDDSA resharing starts at 1.
const ROUND_TABLE: &[RoundRow] = &[
    row(RoundMessage::EcdsaKeygen1, "KGRound1Message", Ecdsa, Keygen, 0, Broadcast),
    row(RoundMessage::EcdsaKeygen2Unicast, "KGRound2Message1", Ecdsa, Keygen, 1, PointToPoint),
    row(RoundMessage::EcdsaKeygen2, "KGRound2Message2", Ecdsa, Keygen, 2, Broadcast),
    row(RoundMessage::EcdsaKeygen3, "KGRound3Message", Ecdsa, Keygen, 3, Broadcast),
    row(RoundMessage::EcdsaKeysign1Unicast, "SignRound1Message1", Ecdsa, Keysign, 0, PointToPoint),
    row(RoundMessage::EcdsaKeysign1, "SignRound1Message2", Ecdsa, Keysign, 1, Broadcast),
    row(RoundMessage::EcdsaKeysign2Unicast, "SignRound2Message", Ecdsa, Keysign, 2, PointToPoint),
    row(RoundMessage::EcdsaKeysign3, "SignRound3Message", Ecdsa, Keysign, 3, Broadcast),
    row(RoundMessage::EcdsaKeysign4, "SignRound4Message", Ecdsa, Keysign, 4, Broadcast),
    row(RoundMessage::EcdsaKeysign5, "SignRound5Message", Ecdsa, Keysign, 5, Broadcast),
    row(RoundMessage::EcdsaKeysign6, "SignRound6Message", Ecdsa, Keysign, 6, Broadcast),
    row(RoundMessage::EcdsaKeysign7, "SignRound7Message", Ecdsa, Keysign, 7, Broadcast),
    row(RoundMessage::EcdsaKeysign8, "SignRound8Message", Ecdsa, Keysign, 8, Broadcast),
    row(RoundMessage::EcdsaKeysign9, "SignRound9Message", Ecdsa, Keysign, 9, Broadcast),
    row(RoundMessage::EcdsaRegroup1, "DGRound1Message", Ecdsa, Regroup, 0, Broadcast),
    row(RoundMessage::EcdsaRegroup2Paillier, "DGRound2Message1", Ecdsa, Regroup, 1, Broadcast),
    row(RoundMessage::EcdsaRegroup2Ack, "DGRound2Message2", Ecdsa, Regroup, 2, Broadcast),
    row(RoundMessage::EcdsaRegroup3Share, "DGRound3Message1", Ecdsa, Regroup, 3, PointToPoint),
    row(RoundMessage::EcdsaRegroup3Decommit, "DGRound3Message2", Ecdsa, Regroup, 4, Broadcast),
    row(RoundMessage::EcdsaRegroup4, "DGRound4Message", Ecdsa, Regroup, 5, Broadcast),
    row(RoundMessage::EddsaKeygen1, "EDDSAKGRound1Message", Eddsa, Keygen, 0, Broadcast),
    row(RoundMessage::EddsaKeygen2Unicast, "EDDSAKGRound2Message1", Eddsa, Keygen, 1, PointToPoint),
    row(RoundMessage::EddsaKeygen2, "EDDSAKGRound2Message2", Eddsa, Keygen, 2, Broadcast),
    row(RoundMessage::EddsaKeysign1, "EDDSASignRound1Message", Eddsa, Keysign, 0, Broadcast),
    row(RoundMessage::EddsaKeysign2, "EDDSASignRound2Message", Eddsa, Keysign, 1, Broadcast),
    row(RoundMessage::EddsaKeysign3, "EDDSASignRound3Message", Eddsa, Keysign, 2, Broadcast),
    row(RoundMessage::EddsaRegroup1, "EDDSADGRound1Message", Eddsa, Regroup, 1, Broadcast),
    row(RoundMessage::EddsaRegroup2, "EDDSADGRound2Message", Eddsa, Regroup, 2, Broadcast),
    row(RoundMessage::EddsaRegroup3Share, "EDDSADGRound3Message1", Eddsa, Regroup, 3, PointToPoint),
    row(RoundMessage::EddsaRegroup3Decommit, "EDDSADGRound3Message2", Eddsa, Regroup, 4, Broadcast),
    row(RoundMessage::EddsaRegroup4, "EDDSADGRound4Message", Eddsa, Regroup, 5, Broadcast),
];

impl RoundMessage {
    fn row(&self) -> &'static RoundRow {
        // Every variant has exactly one row; the table test pins this.
        ROUND_TABLE.iter().find(|row| row.message == *self).unwrap_or(&ROUND_TABLE[0])
    }

    /// Classifies an engine message tag. Unknown tags are a protocol error.
    pub fn from_tag(tag: &str) -> Result<Self> {
        ROUND_TABLE.iter().find(|row| row.tag == tag).map(|row| row.message).ok_or_else(|| TssError::UnknownRound(tag.to_string()))
    }

    pub fn tag(&self) -> &'static str {
        self.row().tag
    }

    pub fn algorithm(&self) -> Algorithm {
        self.row().algorithm
    }

    pub fn operation(&self) -> Operation {
        self.row().operation
    }

    pub fn index(&self) -> u32 {
        self.row().index
    }

    pub fn routing(&self) -> Routing {
        self.row().routing
    }

    pub fn round_info(&self) -> RoundInfo {
        RoundInfo { index: self.index(), round_msg: self.tag().to_string() }
    }

    /// All rounds of one protocol run in index order.
    pub fn sequence(algorithm: Algorithm, operation: Operation) -> Vec<RoundMessage> {
        ROUND_TABLE.iter().filter(|row| row.algorithm == algorithm && row.operation == operation).map(|row| row.message).collect()
    }
}

impl fmt::Display for RoundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Classification of one wire payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundInfo {
    pub index: u32,
    pub round_msg: String,
}

impl RoundInfo {
    pub fn classify(tag: &str) -> Result<Self> {
        RoundMessage::from_tag(tag).map(|message| message.round_info())
    }
}

/// Number of round indices one protocol run spans, counting from index zero.
pub fn round_count(algorithm: Algorithm, operation: Operation) -> usize {
    ROUND_TABLE
        .iter()
        .filter(|row| row.algorithm == algorithm && row.operation == operation)
        .map(|row| row.index as usize + 1)
        .max()
        .unwrap_or(0)
}

/// Whether a share failure detected at `index` implicates a unicast round.
///
/// An invalid share of one round usually only surfaces while processing the next,
/// so the indices here are offset from the raw routing of each message.
pub fn check_unicast(algorithm: Algorithm, operation: Operation, index: u32) -> bool {
    match (algorithm, operation) {
        (Eddsa, Keygen) => index == 1,
        (Eddsa, Regroup) => index == 3,
        (Eddsa, Keysign) => index > 2,
        (Ecdsa, Keygen) => index == 1 || index == 2,
        (Ecdsa, Regroup) => index == 3,
        (Ecdsa, Keysign) => index < 5,
    }
}

/// Latest point-to-point round at or before `current` in the same protocol run.
pub fn previous_unicast(current: RoundMessage) -> Option<RoundMessage> {
    RoundMessage::sequence(current.algorithm(), current.operation())
        .into_iter()
        .filter(|message| message.index() <= current.index() && message.routing() == Routing::PointToPoint)
        .last()
}
