pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStateManager;
pub use memory::MemoryStateManager;
pub use traits::{KeygenLocalState, StateManager};
