use crate::domain::{
    Completion, CompletionId, DateKey, Habit, HabitChanges, HabitId, HabitWithCompletions, NewHabit,
    Note, OwnerId,
};
use crate::infrastructure::{DuckDbStorage, HookRegistry, MutationEvent, storage::HabitStore};
use anyhow::Result;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

/// Result of a store call that may not have reached a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loadable<T> {
    NotReady,
    Ready(T),
}

impl<T> Loadable<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::NotReady => None,
        }
    }
}

impl<T: Default> Loadable<T> {
    pub fn unwrap_or_default(self) -> T {
        self.ready().unwrap_or_default()
    }
}

/// Handle to the habit store, created at startup and disposed at shutdown.
///
/// A client without a backend is valid: reads report [`Loadable::NotReady`]
/// and writes are skipped. Every acknowledged write is announced to the
/// registered hooks.
pub struct StoreClient {
    backend: Option<Arc<dyn HabitStore>>,
    hooks: HookRegistry,
}

impl StoreClient {
    pub fn disconnected() -> Self {
        Self {
            backend: None,
            hooks: HookRegistry::new(),
        }
    }

    /// Opens (or creates) the DuckDB database at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let storage = DuckDbStorage::new(db_path)?;
        Ok(Self::from_store(Arc::new(storage)))
    }

    /// Wraps an already initialized store.
    pub fn from_store(store: Arc<dyn HabitStore>) -> Self {
        debug!("store client connected to {}", store.backend_info());
        Self {
            backend: Some(store),
            hooks: HookRegistry::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_info(&self) -> Option<&str> {
        self.backend.as_deref().map(|store| store.backend_info())
    }

    /// Releases the backend. Later calls behave as on a disconnected client.
    pub fn dispose(&mut self) {
        if let Some(store) = self.backend.take() {
            info!("store client disposed ({})", store.backend_info());
        }
    }

    pub fn maintenance(&self) -> Result<Loadable<()>> {
        self.read(|store| store.maintenance())
    }

    fn read<T>(&self, f: impl FnOnce(&dyn HabitStore) -> Result<T>) -> Result<Loadable<T>> {
        match self.backend.as_deref() {
            Some(store) => f(store).map(Loadable::Ready),
            None => Ok(Loadable::NotReady),
        }
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&dyn HabitStore) -> Result<T>,
        event: impl FnOnce(&T) -> Option<MutationEvent>,
    ) -> Result<Loadable<T>> {
        let Some(store) = self.backend.as_deref() else {
            debug!("store not ready, write skipped");
            return Ok(Loadable::NotReady);
        };
        let outcome = f(store)?;
        if let Some(event) = event(&outcome) {
            self.hooks.notify(&event);
        }
        Ok(Loadable::Ready(outcome))
    }

    pub fn habits(&self, owner: &OwnerId) -> Result<Loadable<Vec<Habit>>> {
        self.read(|store| store.list_habits(owner))
    }

    pub fn habit(&self, id: &HabitId) -> Result<Loadable<Option<Habit>>> {
        self.read(|store| store.find_habit(id))
    }

    pub fn habits_with_completions(&self, owner: &OwnerId) -> Result<Loadable<Vec<HabitWithCompletions>>> {
        self.read(|store| store.list_habits_with_completions(owner))
    }

    pub fn completions(&self, habit_id: &HabitId) -> Result<Loadable<Vec<Completion>>> {
        self.read(|store| store.list_completions(habit_id))
    }

    pub fn create_habit(&self, new: &NewHabit) -> Result<Loadable<Habit>> {
        self.write(
            |store| store.insert_habit(new),
            |habit| {
                Some(MutationEvent::HabitCreated {
                    habit_id: habit.id.clone(),
                })
            },
        )
    }

    pub fn update_habit(&self, id: &HabitId, changes: &HabitChanges) -> Result<Loadable<bool>> {
        self.write(
            |store| store.update_habit(id, changes),
            |&updated| updated.then(|| MutationEvent::HabitUpdated { habit_id: id.clone() }),
        )
    }

    pub fn delete_habit(&self, id: &HabitId) -> Result<Loadable<bool>> {
        self.write(
            |store| store.delete_habit(id),
            |&deleted| deleted.then(|| MutationEvent::HabitDeleted { habit_id: id.clone() }),
        )
    }

    /// `Ready(None)` means the day was already complete.
    pub fn insert_completion(&self, habit_id: &HabitId, date: DateKey) -> Result<Loadable<Option<Completion>>> {
        self.write(
            |store| store.insert_completion(habit_id, date),
            |inserted| {
                inserted.as_ref().map(|_| MutationEvent::CompletionAdded {
                    habit_id: habit_id.clone(),
                    date,
                })
            },
        )
    }

    pub fn update_note(&self, id: &CompletionId, note: Option<&Note>) -> Result<Loadable<bool>> {
        self.write(
            |store| store.update_note(id, note),
            |&updated| updated.then(|| MutationEvent::NoteChanged { completion_id: id.clone() }),
        )
    }

    pub fn delete_completion(&self, id: &CompletionId) -> Result<Loadable<bool>> {
        self.write(
            |store| store.delete_completion(id),
            |&deleted| deleted.then(|| MutationEvent::CompletionRemoved { completion_id: id.clone() }),
        )
    }

    /// Removes every completion of the habit on `date`; `Ready(0)` means none existed.
    pub fn clear_day(&self, habit_id: &HabitId, date: DateKey) -> Result<Loadable<usize>> {
        self.write(
            |store| store.delete_completions_on(habit_id, date),
            |&deleted| {
                (deleted > 0).then(|| MutationEvent::DayCleared {
                    habit_id: habit_id.clone(),
                    date,
                })
            },
        )
    }
}

impl Drop for StoreClient {
    fn drop(&mut self) {
        self.dispose();
    }
}
