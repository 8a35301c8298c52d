//! Caller-facing requests and responses for the three operations.

use crate::domain::blame::Blame;
use crate::domain::round::{Algorithm, Operation};
use crate::foundation::util::encoding::decode_base64;
use crate::foundation::{Result, SessionId, TssError, SESSION_ID_DOMAIN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    NotApplicable,
    Success,
    Fail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenRequest {
    pub keys: Vec<String>,
    pub block_height: i64,
    pub version: String,
    pub algo: Algorithm,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenResponse {
    pub pub_key: String,
    pub status: Status,
    pub blame: Blame,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysignRequest {
    pub pool_pub_key: String,
    /// Base64 encoded messages to sign.
    pub messages: Vec<String>,
    pub signer_pub_keys: Vec<String>,
    pub block_height: i64,
    pub version: String,
    pub algo: Algorithm,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub msg: String,
    pub r: String,
    pub s: String,
    pub recovery_id: String,
    pub signature: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysignResponse {
    pub signatures: Vec<Signature>,
    pub status: Status,
    pub blame: Blame,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegroupRequest {
    pub pool_pub_key: String,
    pub old_party_keys: Vec<String>,
    pub new_party_keys: Vec<String>,
    pub block_height: i64,
    pub version: String,
    pub algo: Algorithm,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegroupResponse {
    pub new_pub_key: String,
    pub status: Status,
    pub blame: Blame,
}

fn sorted_unique(keys: &[String]) -> Vec<String> {
    keys.iter().map(|key| key.trim().to_string()).filter(|key| !key.is_empty()).collect::<BTreeSet<_>>().into_iter().collect()
}

fn derive_session_id(operation: Operation, algo: Algorithm, block_height: i64, parts: &[&[String]]) -> SessionId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(SESSION_ID_DOMAIN);
    hasher.update(operation.as_str().as_bytes());
    hasher.update(algo.as_str().as_bytes());
    hasher.update(&block_height.to_le_bytes());
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        for item in part.iter() {
            hasher.update(&(item.len() as u64).to_le_bytes());
            hasher.update(item.as_bytes());
        }
    }
    SessionId::from(*hasher.finalize().as_bytes())
}

impl KeygenRequest {
    pub fn validate(&self) -> Result<()> {
        if sorted_unique(&self.keys).len() < 2 {
            return Err(TssError::InvalidRequest("keygen needs at least two distinct keys".to_string()));
        }
        Ok(())
    }

    pub fn party_keys(&self) -> Vec<String> {
        sorted_unique(&self.keys)
    }

    pub fn session_id(&self) -> SessionId {
        derive_session_id(Operation::Keygen, self.algo, self.block_height, &[&self.party_keys()])
    }
}

impl KeysignRequest {
    pub fn validate(&self) -> Result<()> {
        if self.pool_pub_key.trim().is_empty() {
            return Err(TssError::InvalidRequest("empty pool pub key".to_string()));
        }
        if self.messages.is_empty() {
            return Err(TssError::InvalidRequest("no messages to sign".to_string()));
        }
        if self.signer_pub_keys.is_empty() {
            return Err(TssError::InvalidRequest("no signers".to_string()));
        }
        self.decoded_messages().map(|_| ())
    }

    /// Deduplicated messages in byte order.
    pub fn decoded_messages(&self) -> Result<Vec<Vec<u8>>> {
        let mut decoded = BTreeSet::new();
        for message in &self.messages {
            decoded.insert(decode_base64(message)?);
        }
        Ok(decoded.into_iter().collect())
    }

    pub fn signer_keys(&self) -> Vec<String> {
        sorted_unique(&self.signer_pub_keys)
    }

    pub fn session_id(&self) -> SessionId {
        let mut messages = sorted_unique(&self.messages);
        messages.push(self.pool_pub_key.trim().to_string());
        derive_session_id(Operation::Keysign, self.algo, self.block_height, &[&messages, &self.signer_keys()])
    }
}

impl RegroupRequest {
    pub fn validate(&self) -> Result<()> {
        if self.old_party_keys.is_empty() || self.new_party_keys.is_empty() {
            return Err(TssError::InvalidRequest("regroup needs both old and new parties".to_string()));
        }
        if self.pool_pub_key.trim().is_empty() {
            return Err(TssError::InvalidRequest("empty pool pub key".to_string()));
        }
        Ok(())
    }

    pub fn old_keys(&self) -> Vec<String> {
        sorted_unique(&self.old_party_keys)
    }

    pub fn new_keys(&self) -> Vec<String> {
        sorted_unique(&self.new_party_keys)
    }

    /// Union of old and new committees.
    pub fn all_keys(&self) -> Vec<String> {
        let mut all = self.old_party_keys.clone();
        all.extend(self.new_party_keys.iter().cloned());
        sorted_unique(&all)
    }

    pub fn session_id(&self) -> SessionId {
        let pool = vec![self.pool_pub_key.trim().to_string()];
        derive_session_id(Operation::Regroup, self.algo, self.block_height, &[&pool, &self.old_keys(), &self.new_keys()])
    }
}
