use crate::fixtures::{fast_config, keygen_request, peer_id, signing_key, sorted_pubkeys};
use std::sync::Arc;
use tss_core::application::engine::scripted::ScriptedEngineFactory;
use tss_core::application::TssServer;
use tss_core::domain::{Algorithm, Status};
use tss_core::infrastructure::storage::{FileStateManager, StateManager};
use tss_core::infrastructure::transport::mock::{MockCommunication, MockHub};
use tss_core::TssError;

const SEEDS: [u8; 2] = [1, 2];

fn file_server(hub: &Arc<MockHub>, seed: u8, folder: &std::path::Path) -> Arc<TssServer> {
    let communication = Arc::new(MockCommunication::new(hub.clone(), peer_id(seed)));
    let state = Arc::new(FileStateManager::new(folder).expect("state folder"));
    let server = TssServer::new(fast_config(), communication, state, Arc::new(ScriptedEngineFactory::new()), signing_key(seed))
        .expect("server");
    Arc::new(server)
}

#[tokio::test]
async fn test_keygen_when_file_backed_then_share_survives_reopen() {
    let hub = Arc::new(MockHub::new());
    let dirs: Vec<_> = SEEDS.iter().map(|_| tempfile::tempdir().expect("temp dir")).collect();
    let servers: Vec<_> = SEEDS.iter().zip(&dirs).map(|(seed, dir)| file_server(&hub, *seed, dir.path())).collect();

    let handles: Vec<_> = servers
        .iter()
        .map(|server| {
            let server = server.clone();
            tokio::spawn(async move { server.keygen(&keygen_request(&SEEDS, Algorithm::Eddsa)).await })
        })
        .collect();
    let mut pub_keys = Vec::new();
    for handle in handles {
        let response = handle.await.expect("keygen task").expect("keygen");
        assert_eq!(response.status, Status::Success, "blame {}", response.blame);
        pub_keys.push(response.pub_key);
    }
    assert_eq!(pub_keys[0], pub_keys[1]);

    let reopened = FileStateManager::new(dirs[0].path()).expect("reopen");
    let state = reopened.get_local_state(&pub_keys[0], Algorithm::Eddsa).expect("persisted share");
    assert_eq!(state.participant_keys, sorted_pubkeys(&SEEDS));
    assert_eq!(state.local_party_key, servers[0].local_pubkey());
    assert!(matches!(reopened.get_local_state(&pub_keys[0], Algorithm::Ecdsa), Err(TssError::StorageError { .. })));

    let addresses = reopened.retrieve_p2p_addresses().expect("address book");
    assert_eq!(addresses, vec![format!("/memory/{}/p2p/{}", peer_id(2), peer_id(2))]);
}

#[tokio::test]
async fn test_state_lookup_when_pubkey_is_a_path_then_invalid_request() {
    let dir = tempfile::tempdir().expect("temp dir");
    let manager = FileStateManager::new(dir.path()).expect("manager");

    assert!(matches!(manager.get_local_state("../../secret", Algorithm::Ecdsa), Err(TssError::InvalidRequest(_))));
    assert!(matches!(manager.get_local_state("   ", Algorithm::Ecdsa), Err(TssError::InvalidRequest(_))));
}
