use crate::domain::{CompletionId, DateKey, HabitId};
use anyhow::Result;
use log::warn;
use std::fmt;

/// A write the store has acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEvent {
    HabitCreated { habit_id: HabitId },
    HabitUpdated { habit_id: HabitId },
    HabitDeleted { habit_id: HabitId },
    CompletionAdded { habit_id: HabitId, date: DateKey },
    CompletionRemoved { completion_id: CompletionId },
    DayCleared { habit_id: HabitId, date: DateKey },
    NoteChanged { completion_id: CompletionId },
}

impl fmt::Display for MutationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HabitCreated { habit_id } => write!(f, "habit {habit_id} created"),
            Self::HabitUpdated { habit_id } => write!(f, "habit {habit_id} updated"),
            Self::HabitDeleted { habit_id } => write!(f, "habit {habit_id} deleted"),
            Self::CompletionAdded { habit_id, date } => {
                write!(f, "habit {habit_id} completed on {date}")
            }
            Self::CompletionRemoved { completion_id } => {
                write!(f, "completion {completion_id} removed")
            }
            Self::DayCleared { habit_id, date } => {
                write!(f, "habit {habit_id} cleared on {date}")
            }
            Self::NoteChanged { completion_id } => {
                write!(f, "note of completion {completion_id} changed")
            }
        }
    }
}

/// Trait for plugins that respond to acknowledged writes
pub trait MutationHook: Send + Sync {
    /// Called after the store has accepted a write
    fn on_mutation(&self, event: &MutationEvent) -> Result<()>;

    /// Human-readable name for this hook
    fn name(&self) -> &str;
}

/// Registry for managing mutation hooks
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn MutationHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register<H>(&mut self, hook: H)
    where
        H: MutationHook + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    /// Runs every hook; a failing hook is logged and the rest still run.
    pub fn notify(&self, event: &MutationEvent) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_mutation(event) {
                warn!("hook '{}' failed on {}: {:#}", hook.name(), event, e);
            }
        }
    }

    pub fn list_hooks(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }
}
