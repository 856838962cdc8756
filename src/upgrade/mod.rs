pub mod gate;
pub mod store;

pub use gate::UpgradePromptGate;
pub use store::{MemoryHistoryStore, PromptHistoryStore};
