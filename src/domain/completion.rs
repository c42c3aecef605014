use crate::domain::habit::bounded_text;
use crate::domain::{DateKey, HabitId, ValidationError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CompletionId(pub String);

impl CompletionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompletionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Note(String);

impl Note {
    pub const MIN_CHARS: usize = 2;
    pub const MAX_CHARS: usize = 160;

    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        bounded_text("note", raw, Self::MIN_CHARS, Self::MAX_CHARS).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One habit marked done on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub id: CompletionId,
    pub habit_id: HabitId,
    pub date: DateKey,
    pub note: Option<Note>,
}

impl Completion {
    pub fn new(habit_id: HabitId, date: DateKey) -> Self {
        Self {
            id: CompletionId::generate(),
            habit_id,
            date,
            note: None,
        }
    }
}
