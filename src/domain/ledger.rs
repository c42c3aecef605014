use crate::domain::{
    Completion, CompletionId, DateKey, HabitId, LedgerError, Note, Streaks, compute_streaks,
};
use crate::infrastructure::{Loadable, StoreClient};
use anyhow::Result;
use log::{debug, warn};
use std::collections::BTreeMap;

/// A toggle that has been shown to the user but not yet acknowledged by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingChange {
    Add(DateKey),
    Remove(DateKey),
}

impl PendingChange {
    pub fn date(&self) -> DateKey {
        match self {
            Self::Add(date) | Self::Remove(date) => *date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(CompletionId),
    /// The store already had a completion for that day.
    AlreadyComplete,
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Completed,
    Cleared,
    NotReady,
}

/// Completions of one habit: the set last confirmed by the store plus at
/// most one pending change layered on top.
///
/// Every acknowledged write is followed by a fresh read, so the confirmed
/// set never holds anything the store has not returned.
pub struct CompletionLedger<'a> {
    store: &'a StoreClient,
    habit_id: HabitId,
    confirmed: BTreeMap<DateKey, Completion>,
    ready: bool,
    pending: Option<PendingChange>,
}

impl<'a> CompletionLedger<'a> {
    pub fn new(store: &'a StoreClient, habit_id: HabitId) -> Self {
        Self {
            store,
            habit_id,
            confirmed: BTreeMap::new(),
            ready: false,
            pending: None,
        }
    }

    pub fn load(store: &'a StoreClient, habit_id: HabitId) -> Result<Self> {
        let mut ledger = Self::new(store, habit_id);
        ledger.refresh()?;
        Ok(ledger)
    }

    pub fn habit_id(&self) -> &HabitId {
        &self.habit_id
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Re-reads the habit's completions. Returns whether the store answered.
    pub fn refresh(&mut self) -> Result<bool> {
        match self.store.completions(&self.habit_id)? {
            Loadable::Ready(completions) => {
                self.confirmed.clear();
                for completion in completions {
                    let date = completion.date;
                    if self.confirmed.insert(date, completion).is_some() {
                        warn!("habit {} has more than one completion on {}", self.habit_id, date);
                    }
                }
                self.ready = true;
            }
            Loadable::NotReady => {
                self.confirmed.clear();
                self.ready = false;
            }
        }
        Ok(self.ready)
    }

    /// Confirmed completions, oldest day first.
    pub fn list_completions(&self) -> impl Iterator<Item = &Completion> {
        self.confirmed.values()
    }

    /// Completed days as currently shown, pending change included.
    pub fn date_keys(&self) -> Vec<DateKey> {
        let mut days: Vec<DateKey> = self.confirmed.keys().copied().collect();
        match &self.pending {
            Some(PendingChange::Add(date)) if !self.confirmed.contains_key(date) => {
                days.push(*date);
                days.sort_unstable();
            }
            Some(PendingChange::Remove(date)) => days.retain(|d| d != date),
            _ => {}
        }
        days
    }

    pub fn has_completion(&self, date: DateKey) -> bool {
        match &self.pending {
            Some(PendingChange::Add(pending)) if *pending == date => true,
            Some(PendingChange::Remove(pending)) if *pending == date => false,
            _ => self.confirmed.contains_key(&date),
        }
    }

    /// Id of the confirmed completion on `date`.
    pub fn find_completion(&self, date: DateKey) -> Option<&CompletionId> {
        self.confirmed.get(&date).map(|completion| &completion.id)
    }

    pub fn completion_on(&self, date: DateKey) -> Option<&Completion> {
        self.confirmed.get(&date)
    }

    pub fn pending(&self) -> Option<&PendingChange> {
        self.pending.as_ref()
    }

    fn ensure_idle(&self) -> Result<(), LedgerError> {
        match &self.pending {
            Some(change) => Err(LedgerError::MutationInFlight(change.date().to_string())),
            None => Ok(()),
        }
    }

    pub fn add_completion(&mut self, date: DateKey) -> Result<AddOutcome> {
        self.ensure_idle()?;
        let outcome = match self.store.insert_completion(&self.habit_id, date)? {
            Loadable::NotReady => return Ok(AddOutcome::NotReady),
            Loadable::Ready(Some(completion)) => AddOutcome::Added(completion.id),
            Loadable::Ready(None) => AddOutcome::AlreadyComplete,
        };
        self.refresh()?;
        Ok(outcome)
    }

    /// Returns `false` when the store had no such completion or was not ready.
    pub fn remove_completion(&mut self, id: &CompletionId) -> Result<bool> {
        self.ensure_idle()?;
        let Loadable::Ready(removed) = self.store.delete_completion(id)? else {
            return Ok(false);
        };
        self.refresh()?;
        Ok(removed)
    }

    /// Removes every completion on `date`. Returns how many the store deleted.
    pub fn clear_day(&mut self, date: DateKey) -> Result<usize> {
        self.ensure_idle()?;
        let Loadable::Ready(cleared) = self.store.clear_day(&self.habit_id, date)? else {
            return Ok(0);
        };
        self.refresh()?;
        Ok(cleared)
    }

    /// Records a toggle of `date` without touching the store.
    pub fn stage_toggle(&mut self, date: DateKey) -> Result<PendingChange, LedgerError> {
        self.ensure_idle()?;
        let change = if self.confirmed.contains_key(&date) {
            PendingChange::Remove(date)
        } else {
            PendingChange::Add(date)
        };
        debug!("staged {:?} for habit {}", change, self.habit_id);
        self.pending = Some(change.clone());
        Ok(change)
    }

    /// Sends the staged change to the store and reconciles with what it holds.
    ///
    /// The overlay is dropped whether or not the write succeeds.
    pub fn commit(&mut self) -> Result<ToggleOutcome> {
        let change = self.pending.clone().ok_or(LedgerError::NothingStaged)?;
        let result = self.apply(&change);
        self.pending = None;
        let outcome = result?;
        self.refresh()?;
        Ok(outcome)
    }

    pub fn discard_pending(&mut self) -> Option<PendingChange> {
        self.pending.take()
    }

    fn apply(&self, change: &PendingChange) -> Result<ToggleOutcome> {
        // Conflicts mean another device got there first; the day ends up in
        // the requested state either way.
        let outcome = match change {
            PendingChange::Add(date) => match self.store.insert_completion(&self.habit_id, *date)? {
                Loadable::NotReady => ToggleOutcome::NotReady,
                Loadable::Ready(_) => ToggleOutcome::Completed,
            },
            PendingChange::Remove(date) => match self.store.clear_day(&self.habit_id, *date)? {
                Loadable::NotReady => ToggleOutcome::NotReady,
                Loadable::Ready(_) => ToggleOutcome::Cleared,
            },
        };
        Ok(outcome)
    }

    pub fn toggle(&mut self, date: DateKey) -> Result<ToggleOutcome> {
        self.stage_toggle(date)?;
        self.commit()
    }

    /// Attaches, replaces or clears the note of the completion on `date`.
    pub fn set_note(&mut self, date: DateKey, note: Option<Note>) -> Result<bool> {
        self.ensure_idle()?;
        let Some(completion) = self.confirmed.get(&date) else {
            return Ok(false);
        };
        let updated = self
            .store
            .update_note(&completion.id, note.as_ref())?
            .ready()
            .unwrap_or(false);
        if updated {
            self.refresh()?;
        }
        Ok(updated)
    }

    pub fn streaks(&self, as_of: DateKey) -> Streaks {
        compute_streaks(&self.date_keys(), as_of)
    }
}
