//! Application layer: join-party, session routing, blame attribution and the request server.

pub mod blame_manager;
pub mod engine;
pub mod party_coordinator;
pub mod round_registry;
pub mod server;
pub mod session;

pub use blame_manager::BlameManager;
pub use engine::{ComputationEngine, EngineContext, EngineError, EngineEvent, EngineFactory, EngineMessage, EngineOutcome};
pub use party_coordinator::{elect_leader, JoinPartyFailure, JoinPartyOutcome, PartyCoordinator, PartyState, PartyStateMachine};
pub use round_registry::RoundRegistry;
pub use server::TssServer;
pub use session::{SessionFailure, SessionParams, TssSession};
