use super::traits::{KeygenLocalState, StateManager};
use crate::domain::Algorithm;
use crate::foundation::{PeerId, Result, TssError};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const ADDRESS_BOOK_FILE: &str = "address_book.seed";
const LOOPBACK_MARKER: &str = "127.0.0.1";

/// Keeps each key share in its own JSON file under one folder.
pub struct FileStateManager {
    folder: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStateManager {
    pub fn new(folder: impl AsRef<Path>) -> Result<Self> {
        let folder = folder.as_ref().to_path_buf();
        fs::create_dir_all(&folder).map_err(|err| crate::storage_err!("create state folder", err))?;
        info!("file state manager ready folder={}", folder.display());
        Ok(Self { folder, write_lock: Mutex::new(()) })
    }

    fn state_path(&self, pub_key: &str, algo: Algorithm) -> Result<PathBuf> {
        let pub_key = pub_key.trim();
        if pub_key.is_empty() {
            return Err(TssError::InvalidRequest("empty pub key".to_string()));
        }
        if !pub_key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TssError::InvalidRequest(format!("pub key is not a plain identifier: {pub_key}")));
        }
        Ok(self.folder.join(format!("localstate-{}-{}.json", algo, pub_key)))
    }
}

impl StateManager for FileStateManager {
    fn save_local_state(&self, state: &KeygenLocalState, algo: Algorithm) -> Result<()> {
        let path = self.state_path(&state.pub_key, algo)?;
        let bytes = serde_json::to_vec_pretty(state)?;
        let _guard = self.write_lock.lock();
        fs::write(&path, bytes).map_err(|err| crate::storage_err!("write local state", err))?;
        debug!("local state saved pub_key={} algo={} path={}", state.pub_key, algo, path.display());
        Ok(())
    }

    fn get_local_state(&self, pub_key: &str, algo: Algorithm) -> Result<KeygenLocalState> {
        let path = self.state_path(pub_key, algo)?;
        let bytes = fs::read(&path).map_err(|err| crate::storage_err!(format!("read local state {}", path.display()), err))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save_address_book(&self, addresses: &HashMap<PeerId, Vec<String>>) -> Result<()> {
        let mut peers: Vec<_> = addresses.iter().collect();
        peers.sort_by(|a, b| a.0.cmp(b.0));
        let mut lines = Vec::new();
        for (peer_id, addrs) in peers {
            for addr in addrs.iter().filter(|addr| !addr.contains(LOOPBACK_MARKER)) {
                lines.push(format!("{}/p2p/{}", addr, peer_id));
            }
        }
        let _guard = self.write_lock.lock();
        fs::write(self.folder.join(ADDRESS_BOOK_FILE), lines.join("\n"))
            .map_err(|err| crate::storage_err!("write address book", err))?;
        debug!("address book saved entries={}", lines.len());
        Ok(())
    }

    fn retrieve_p2p_addresses(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(self.folder.join(ADDRESS_BOOK_FILE))
            .map_err(|err| crate::storage_err!("read address book", err))?;
        Ok(content.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect())
    }
}
