mod config_loading;
mod join_party;
mod keygen_flow;
mod keysign_flow;
mod storage_persistence;
