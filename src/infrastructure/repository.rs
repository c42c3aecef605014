use crate::domain::{
    Completion, CompletionId, DateKey, Habit, HabitChanges, HabitId, HabitWithCompletions, NewHabit, Note,
    OwnerId,
};
use anyhow::Result;

pub trait HabitRepository {
    fn insert_habit(&self, habit: &NewHabit) -> Result<Habit>;

    /// Returns `false` when no habit has that id.
    fn update_habit(&self, id: &HabitId, changes: &HabitChanges) -> Result<bool>;

    /// Deletes the habit and every completion recorded for it.
    fn delete_habit(&self, id: &HabitId) -> Result<bool>;

    fn find_habit(&self, id: &HabitId) -> Result<Option<Habit>>;

    fn list_habits(&self, owner: &OwnerId) -> Result<Vec<Habit>>;

    fn list_habits_with_completions(&self, owner: &OwnerId) -> Result<Vec<HabitWithCompletions>>;
}

pub trait CompletionRepository {
    fn list_completions(&self, habit_id: &HabitId) -> Result<Vec<Completion>>;

    /// Returns `None` when the habit already has a completion on `date`.
    fn insert_completion(&self, habit_id: &HabitId, date: DateKey) -> Result<Option<Completion>>;

    fn update_note(&self, id: &CompletionId, note: Option<&Note>) -> Result<bool>;

    fn delete_completion(&self, id: &CompletionId) -> Result<bool>;

    /// Deletes every completion of the habit that falls on `date`. Returns how
    /// many were removed.
    fn delete_completions_on(&self, habit_id: &HabitId, date: DateKey) -> Result<usize>;
}
