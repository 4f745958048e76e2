pub mod cleanup;
pub mod eviction;
pub mod manager;
pub mod memory;
pub mod storage;
pub mod types;

pub use cleanup::{Cleanup, CleanupResult, CleanupTask};
pub use eviction::{EvictionPolicy, ExpiredFirst};
pub use manager::{SessionManager, SessionStats};
pub use memory::InMemoryStorage;
pub use storage::{Lookup, SessionStorage, StorageStats};
pub use types::{FunctionCall, Message, Role, Session, SessionInfo, SessionLimits, ToolCall};
