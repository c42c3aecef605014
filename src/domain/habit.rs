use crate::domain::{Completion, DateKey, ValidationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HabitId(pub String);

impl HabitId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of the user a habit belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Checks the trimmed length of user-supplied text in characters.
pub(crate) fn bounded_text(
    field: &'static str,
    raw: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(ValidationError::Blank { field });
    }
    if len < min {
        return Err(ValidationError::TooShort { field, min });
    }
    if len > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HabitName(String);

impl HabitName {
    pub const MIN_CHARS: usize = 2;
    pub const MAX_CHARS: usize = 25;

    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        bounded_text("name", raw, Self::MIN_CHARS, Self::MAX_CHARS).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HabitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Description(String);

impl Description {
    pub const MAX_CHARS: usize = 50;

    /// Blank input means "no description".
    pub fn new(raw: &str) -> Result<Option<Self>, ValidationError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        bounded_text("description", raw, 1, Self::MAX_CHARS).map(|text| Some(Self(text)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Habit {
    pub id: HabitId,
    pub owner: OwnerId,
    pub name: HabitName,
    pub description: Option<Description>,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    /// Calendar day the habit was created on, from the UTC fields of `created_at`.
    pub fn created_on(&self) -> DateKey {
        DateKey::from_instant(self.created_at)
    }
}

/// A habit that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewHabit {
    pub owner: OwnerId,
    pub name: HabitName,
    pub description: Option<Description>,
    pub created_at: DateTime<Utc>,
}

impl NewHabit {
    pub fn new(owner: OwnerId, name: HabitName, description: Option<Description>) -> Self {
        Self {
            owner,
            name,
            description,
            created_at: Utc::now(),
        }
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn into_habit(self, id: HabitId) -> Habit {
        Habit {
            id,
            owner: self.owner,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

/// Partial update of a habit. `description: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct HabitChanges {
    pub name: Option<HabitName>,
    pub description: Option<Option<Description>>,
}

impl HabitChanges {
    pub fn rename(name: HabitName) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    pub fn describe(description: Option<Description>) -> Self {
        Self {
            description: Some(description),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// A habit together with its completions, as returned by the joined query.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitWithCompletions {
    pub habit: Habit,
    pub completions: Vec<Completion>,
}

impl HabitWithCompletions {
    pub fn date_keys(&self) -> Vec<DateKey> {
        self.completions.iter().map(|c| c.date).collect()
    }
}
