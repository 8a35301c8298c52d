use crate::domain::Algorithm;
use crate::foundation::{PeerId, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key share material persisted after a successful keygen or regroup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenLocalState {
    pub pub_key: String,
    /// Opaque engine share, base64 in the JSON file.
    #[serde(with = "crate::foundation::util::encoding::serde_base64")]
    pub local_data: Vec<u8>,
    pub participant_keys: Vec<String>,
    pub local_party_key: String,
}

pub trait StateManager: Send + Sync {
    fn save_local_state(&self, state: &KeygenLocalState, algo: Algorithm) -> Result<()>;
    fn get_local_state(&self, pub_key: &str, algo: Algorithm) -> Result<KeygenLocalState>;
    fn save_address_book(&self, addresses: &HashMap<PeerId, Vec<String>>) -> Result<()>;
    fn retrieve_p2p_addresses(&self) -> Result<Vec<String>>;
}
