use super::traits::{KeygenLocalState, StateManager};
use crate::domain::Algorithm;
use crate::foundation::{PeerId, Result, TssError};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryStateManager {
    states: RwLock<HashMap<(Algorithm, String), KeygenLocalState>>,
    addresses: RwLock<Vec<String>>,
}

impl MemoryStateManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateManager for MemoryStateManager {
    fn save_local_state(&self, state: &KeygenLocalState, algo: Algorithm) -> Result<()> {
        if state.pub_key.is_empty() {
            return Err(TssError::InvalidRequest("empty pub key".to_string()));
        }
        self.states.write().insert((algo, state.pub_key.clone()), state.clone());
        Ok(())
    }

    fn get_local_state(&self, pub_key: &str, algo: Algorithm) -> Result<KeygenLocalState> {
        self.states
            .read()
            .get(&(algo, pub_key.to_string()))
            .cloned()
            .ok_or_else(|| crate::storage_err!("get_local_state", format!("no local state for {pub_key} ({algo})")))
    }

    fn save_address_book(&self, addresses: &HashMap<PeerId, Vec<String>>) -> Result<()> {
        let mut flat: Vec<String> =
            addresses.iter().flat_map(|(peer, addrs)| addrs.iter().map(move |addr| format!("{}/p2p/{}", addr, peer))).collect();
        flat.sort();
        *self.addresses.write() = flat;
        Ok(())
    }

    fn retrieve_p2p_addresses(&self) -> Result<Vec<String>> {
        Ok(self.addresses.read().clone())
    }
}
