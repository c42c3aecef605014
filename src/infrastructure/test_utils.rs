/// Test utilities for DuckDB-based tests
///
/// Each `TestStorage` owns a fresh DuckDB file inside a temporary directory
/// that is removed when the harness is dropped, so tests never share state.
///
/// ```rust,ignore
/// let test_storage = TestStorage::new();
/// let habit = test_storage.create_habit("alice", "Read")?;
/// test_storage.mark(&habit, &["2024-03-01", "2024-03-02"])?;
/// let client = test_storage.client();
/// ```
#[cfg(test)]
pub mod test_harness {
    use crate::domain::{Completion, DateKey, Habit, HabitName, NewHabit, OwnerId};
    use crate::infrastructure::{CompletionRepository, DuckDbStorage, HabitRepository, StoreClient};
    use anyhow::{Context, Result};
    use chrono::{DateTime, Utc};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    pub struct TestStorage {
        storage: Arc<DuckDbStorage>,
        temp_dir: TempDir,
    }

    impl TestStorage {
        pub fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp directory");
            let db_path = temp_dir.path().join("test.db");

            let storage =
                DuckDbStorage::new(&db_path).expect("Failed to initialize test DuckDB storage");

            Self {
                storage: Arc::new(storage),
                temp_dir,
            }
        }

        pub fn storage(&self) -> &DuckDbStorage {
            &self.storage
        }

        /// A ready client over this harness's database.
        pub fn client(&self) -> StoreClient {
            StoreClient::from_store(self.storage.clone())
        }

        pub fn dir(&self) -> PathBuf {
            self.temp_dir.path().to_path_buf()
        }

        pub fn create_habit(&self, owner: &str, name: &str) -> Result<Habit> {
            let new = NewHabit::new(OwnerId::new(owner), HabitName::new(name)?, None);
            self.storage.insert_habit(&new)
        }

        pub fn create_habit_at(&self, owner: &str, name: &str, created_at: &str) -> Result<Habit> {
            let created_at = DateTime::parse_from_rfc3339(created_at)?.with_timezone(&Utc);
            let new = NewHabit::new(OwnerId::new(owner), HabitName::new(name)?, None).created_at(created_at);
            self.storage.insert_habit(&new)
        }

        /// Marks each `YYYY-MM-DD` day complete for `habit`.
        pub fn mark(&self, habit: &Habit, days: &[&str]) -> Result<Vec<Completion>> {
            let mut completions = Vec::new();
            for day in days {
                let date = DateKey::parse(day)?;
                let completion = self
                    .storage
                    .insert_completion(&habit.id, date)?
                    .with_context(|| format!("{day} was already complete"))?;
                completions.push(completion);
            }
            Ok(completions)
        }

        /// Writes a tracking row verbatim, the way another client might have.
        pub fn insert_raw_tracking(&self, habit: &Habit, id: &str, completed_on_date: &str) -> Result<()> {
            self.storage.conn()?.execute(
                "INSERT INTO habit_trackings (id, habit_id, completed_on_date, note) VALUES (?, ?, ?, NULL)",
                duckdb::params![id, habit.id.as_str(), completed_on_date],
            )?;
            Ok(())
        }
    }

    /// Run a test with fresh test storage
    pub fn with_test_storage<F, R>(test_fn: F) -> R
    where
        F: FnOnce(&TestStorage) -> R,
    {
        let test_storage = TestStorage::new();
        test_fn(&test_storage)
    }
}

#[cfg(test)]
mod tests {
    use super::test_harness::*;
    use crate::infrastructure::{CompletionRepository, HabitRepository};

    #[test]
    fn test_harness_basic_functionality() {
        let test_storage = TestStorage::new();
        assert!(test_storage.storage().list_habits(&"alice".into()).unwrap().is_empty());

        let habit = test_storage.create_habit("alice", "Read").unwrap();
        test_storage.mark(&habit, &["2024-03-01", "2024-03-02"]).unwrap();

        let loaded = test_storage.storage().list_completions(&habit.id).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_harness_with_function() {
        with_test_storage(|test_storage| {
            let habit = test_storage
                .create_habit_at("alice", "Read", "2024-01-15T08:00:00.000Z")
                .unwrap();
            assert_eq!(habit.created_on().to_calendar_string(), "2024-01-15");
        });
    }

    #[test]
    fn test_harness_isolation() {
        let test_storage1 = TestStorage::new();
        let test_storage2 = TestStorage::new();

        test_storage1.create_habit("alice", "Read").unwrap();

        assert!(test_storage2.storage().list_habits(&"alice".into()).unwrap().is_empty());
    }
}
