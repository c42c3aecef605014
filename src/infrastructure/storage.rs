use crate::infrastructure::{CompletionRepository, HabitRepository};
use anyhow::Result;

/// Combined storage interface for habits and their completions
pub trait HabitStore: HabitRepository + CompletionRepository + Send + Sync {
    /// Initialize the storage backend (create tables, apply migrations)
    fn initialize(&self) -> Result<()>;

    /// Get storage backend information
    fn backend_info(&self) -> &str;

    /// Perform maintenance operations (vacuum, analyze)
    fn maintenance(&self) -> Result<()>;
}
