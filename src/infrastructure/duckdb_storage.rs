use crate::domain::{
    Completion, CompletionId, DateKey, Description, Habit, HabitChanges, HabitId, HabitName,
    HabitWithCompletions, NewHabit, Note, OwnerId,
};
use crate::infrastructure::storage::HabitStore;
use crate::infrastructure::{CompletionRepository, HabitRepository};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::types::Type;
use duckdb::{Connection, OptionalExt, Row, params};
use log::{debug, info};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const MIGRATIONS: &[(i32, &str, &str)] = &[
    (
        1,
        "001_create_habits",
        include_str!("../../migrations/001_create_habits.sql"),
    ),
    (
        2,
        "002_create_habit_trackings",
        include_str!("../../migrations/002_create_habit_trackings.sql"),
    ),
];

const HABIT_COLUMNS: &str = "h.id, h.name, h.description, h.user_id, h.created_at";
const TRACKING_COLUMNS: &str = "t.id, t.habit_id, t.completed_on_date, t.note";

pub struct DuckDbStorage {
    conn: Mutex<Connection>,
}

// Mark DuckDbStorage as Send + Sync since the connection is only reached through the Mutex
unsafe impl Send for DuckDbStorage {}
unsafe impl Sync for DuckDbStorage {}

impl DuckDbStorage {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open DuckDB database at {}", db_path.display()))?;

        let storage = Self { conn: Mutex::new(conn) };
        storage.initialize()?;
        info!("opened habit store at {}", db_path.display());
        Ok(storage)
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("DuckDB connection lock poisoned"))
    }
}

fn conversion_failure<E>(column: usize, err: E) -> duckdb::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    duckdb::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

/// Reads the five habit columns starting at `offset`.
fn habit_from_row(row: &Row<'_>, offset: usize) -> duckdb::Result<Habit> {
    let id: String = row.get(offset)?;
    let name: String = row.get(offset + 1)?;
    let description: Option<String> = row.get(offset + 2)?;
    let owner: String = row.get(offset + 3)?;
    let created_at: String = row.get(offset + 4)?;

    let name = HabitName::new(&name).map_err(|e| conversion_failure(offset + 1, e))?;
    let description = match description {
        Some(text) => Description::new(&text).map_err(|e| conversion_failure(offset + 2, e))?,
        None => None,
    };
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| conversion_failure(offset + 4, e))?
        .with_timezone(&Utc);

    Ok(Habit {
        id: HabitId(id),
        owner: OwnerId(owner),
        name,
        description,
        created_at,
    })
}

/// Ids of the habit's tracking rows on `date`, whichever spelling of the
/// day each row was written with.
fn tracking_ids_on(conn: &Connection, habit_id: &HabitId, date: DateKey) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT id, completed_on_date FROM habit_trackings WHERE habit_id = ?")
        .context("Failed to prepare tracking lookup")?;
    let rows = stmt.query_map(params![habit_id.as_str()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut ids = Vec::new();
    for row in rows {
        let (id, completed_on) = row.context("Failed to read tracking row")?;
        let day = DateKey::parse(&completed_on)
            .with_context(|| format!("tracking {id} has a malformed date '{completed_on}'"))?;
        if day == date {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Reads the four tracking columns starting at `offset`.
fn completion_from_row(row: &Row<'_>, offset: usize) -> duckdb::Result<Completion> {
    let id: String = row.get(offset)?;
    let habit_id: String = row.get(offset + 1)?;
    let completed_on: String = row.get(offset + 2)?;
    let note: Option<String> = row.get(offset + 3)?;

    let date = DateKey::parse(&completed_on).map_err(|e| conversion_failure(offset + 2, e))?;
    // An empty note is how some clients spell "no note".
    let note = match note.filter(|text| !text.trim().is_empty()) {
        Some(text) => Some(Note::new(&text).map_err(|e| conversion_failure(offset + 3, e))?),
        None => None,
    };

    Ok(Completion {
        id: CompletionId(id),
        habit_id: HabitId(habit_id),
        date,
        note,
    })
}

impl HabitStore for DuckDbStorage {
    fn initialize(&self) -> Result<()> {
        self.setup_migration_system()?;
        self.run_migrations()?;
        Ok(())
    }

    fn backend_info(&self) -> &str {
        "DuckDB habit store v1"
    }

    fn maintenance(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch("VACUUM; ANALYZE;")
            .context("Failed to perform maintenance operations")?;
        Ok(())
    }
}

impl HabitRepository for DuckDbStorage {
    fn insert_habit(&self, new: &NewHabit) -> Result<Habit> {
        let conn = self.conn()?;
        let habit = new.clone().into_habit(HabitId::generate());

        conn.execute(
            "INSERT INTO habits (id, name, description, user_id, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                habit.id.as_str(),
                habit.name.as_str(),
                habit.description.as_ref().map(|d| d.as_str()),
                habit.owner.as_str(),
                habit.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ],
        )
        .context("Failed to insert habit")?;

        debug!("inserted habit {} ({})", habit.id, habit.name);
        Ok(habit)
    }

    fn update_habit(&self, id: &HabitId, changes: &HabitChanges) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin habit update")?;

        let exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM habits WHERE id = ?",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Ok(false);
        }

        if let Some(name) = &changes.name {
            tx.execute(
                "UPDATE habits SET name = ? WHERE id = ?",
                params![name.as_str(), id.as_str()],
            )
            .context("Failed to rename habit")?;
        }

        if let Some(description) = &changes.description {
            tx.execute(
                "UPDATE habits SET description = ? WHERE id = ?",
                params![description.as_ref().map(|d| d.as_str()), id.as_str()],
            )
            .context("Failed to update habit description")?;
        }

        tx.commit().context("Failed to commit habit update")?;
        Ok(true)
    }

    fn delete_habit(&self, id: &HabitId) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin habit delete")?;

        let trackings = tx
            .execute("DELETE FROM habit_trackings WHERE habit_id = ?", params![id.as_str()])
            .context("Failed to delete habit trackings")?;
        let habits = tx
            .execute("DELETE FROM habits WHERE id = ?", params![id.as_str()])
            .context("Failed to delete habit")?;

        tx.commit().context("Failed to commit habit delete")?;
        debug!("deleted habit {id} and {trackings} tracking(s)");
        Ok(habits > 0)
    }

    fn find_habit(&self, id: &HabitId) -> Result<Option<Habit>> {
        let conn = self.conn()?;
        let habit = conn
            .query_row(
                &format!("SELECT {HABIT_COLUMNS} FROM habits h WHERE h.id = ?"),
                params![id.as_str()],
                |row| habit_from_row(row, 0),
            )
            .optional()
            .context("Failed to load habit")?;
        Ok(habit)
    }

    fn list_habits(&self, owner: &OwnerId) -> Result<Vec<Habit>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {HABIT_COLUMNS} FROM habits h WHERE h.user_id = ? ORDER BY h.created_at, h.id"
            ))
            .context("Failed to prepare habit query")?;

        let rows = stmt.query_map(params![owner.as_str()], |row| habit_from_row(row, 0))?;

        let mut habits = Vec::new();
        for habit in rows {
            habits.push(habit.context("Failed to read habit row")?);
        }
        Ok(habits)
    }

    fn list_habits_with_completions(&self, owner: &OwnerId) -> Result<Vec<HabitWithCompletions>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {HABIT_COLUMNS}, {TRACKING_COLUMNS}
                 FROM habits h
                 LEFT JOIN habit_trackings t ON t.habit_id = h.id
                 WHERE h.user_id = ?
                 ORDER BY h.created_at, h.id, t.completed_on_date"
            ))
            .context("Failed to prepare joined habit query")?;

        let rows = stmt.query_map(params![owner.as_str()], |row| {
            let habit = habit_from_row(row, 0)?;
            let tracking_id: Option<String> = row.get(5)?;
            let completion = match tracking_id {
                Some(_) => Some(completion_from_row(row, 5)?),
                None => None,
            };
            Ok((habit, completion))
        })?;

        let mut habits: Vec<HabitWithCompletions> = Vec::new();
        for row in rows {
            let (habit, completion) = row.context("Failed to read joined habit row")?;
            let same_habit = habits.last().is_some_and(|last| last.habit.id == habit.id);
            if !same_habit {
                habits.push(HabitWithCompletions {
                    habit,
                    completions: Vec::new(),
                });
            }
            if let (Some(completion), Some(last)) = (completion, habits.last_mut()) {
                last.completions.push(completion);
            }
        }
        Ok(habits)
    }
}

impl CompletionRepository for DuckDbStorage {
    fn list_completions(&self, habit_id: &HabitId) -> Result<Vec<Completion>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TRACKING_COLUMNS} FROM habit_trackings t WHERE t.habit_id = ? ORDER BY t.completed_on_date"
            ))
            .context("Failed to prepare tracking query")?;

        let rows = stmt.query_map(params![habit_id.as_str()], |row| completion_from_row(row, 0))?;

        let mut completions = Vec::new();
        for completion in rows {
            completions.push(completion.context("Failed to read tracking row")?);
        }
        Ok(completions)
    }

    fn insert_completion(&self, habit_id: &HabitId, date: DateKey) -> Result<Option<Completion>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin tracking insert")?;

        let habit_exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM habits WHERE id = ?",
            params![habit_id.as_str()],
            |row| row.get(0),
        )?;
        if habit_exists == 0 {
            bail!("habit {habit_id} does not exist");
        }

        // The unique index only sees the stored text, so check by day too.
        if !tracking_ids_on(&tx, habit_id, date)?.is_empty() {
            debug!("habit {habit_id} already complete on {date}");
            return Ok(None);
        }

        let completion = Completion::new(habit_id.clone(), date);
        let inserted = tx
            .execute(
                "INSERT INTO habit_trackings (id, habit_id, completed_on_date, note)
                 VALUES (?, ?, ?, NULL)
                 ON CONFLICT (habit_id, completed_on_date) DO NOTHING",
                params![
                    completion.id.as_str(),
                    habit_id.as_str(),
                    date.to_utc_instant()
                ],
            )
            .context("Failed to insert tracking")?;

        tx.commit().context("Failed to commit tracking insert")?;

        if inserted == 0 {
            debug!("habit {habit_id} already complete on {date}");
            return Ok(None);
        }
        Ok(Some(completion))
    }

    fn update_note(&self, id: &CompletionId, note: Option<&Note>) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE habit_trackings SET note = ? WHERE id = ?",
                params![note.map(|n| n.as_str()), id.as_str()],
            )
            .context("Failed to update tracking note")?;
        Ok(updated > 0)
    }

    fn delete_completion(&self, id: &CompletionId) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM habit_trackings WHERE id = ?", params![id.as_str()])
            .context("Failed to delete tracking")?;
        Ok(deleted > 0)
    }

    fn delete_completions_on(&self, habit_id: &HabitId, date: DateKey) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin tracking delete")?;

        let mut deleted = 0;
        for id in tracking_ids_on(&tx, habit_id, date)? {
            deleted += tx
                .execute("DELETE FROM habit_trackings WHERE id = ?", params![id])
                .context("Failed to delete tracking")?;
        }

        tx.commit().context("Failed to commit tracking delete")?;
        Ok(deleted)
    }
}

impl DuckDbStorage {
    fn setup_migration_system(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        )
        .context("Failed to create migrations table")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        let applied = self.get_applied_migrations()?;

        for &(version, name, sql_content) in MIGRATIONS {
            if !applied.contains(&version) {
                self.apply_migration(version, name, sql_content)
                    .with_context(|| format!("Failed to apply migration {}: {}", version, name))?;
            }
        }

        Ok(())
    }

    fn get_applied_migrations(&self) -> Result<HashSet<i32>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT version FROM migrations ORDER BY version")
            .context("Failed to prepare migration query")?;

        let rows = stmt.query_map([], |row| row.get::<_, i32>(0))?;

        let mut applied = HashSet::new();
        for version in rows {
            applied.insert(version?);
        }

        Ok(applied)
    }

    fn apply_migration(&self, version: i32, name: &str, sql_content: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute_batch(sql_content)
            .with_context(|| format!("Failed to execute migration SQL for {}", name))?;

        tx.execute(
            "INSERT INTO migrations (version, name) VALUES (?, ?)",
            params![version, name],
        )
        .with_context(|| format!("Failed to record migration {} as applied", name))?;

        tx.commit()?;
        info!("applied migration {name}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{DateKey, HabitChanges, HabitName, Note};
    use crate::infrastructure::test_utils::test_harness::TestStorage;
    use super::MIGRATIONS;
    use crate::infrastructure::{CompletionRepository, HabitRepository, HabitStore};

    fn day(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    #[test]
    fn migrations_are_applied_once() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        storage.initialize().unwrap();
        storage.initialize().unwrap();
        assert_eq!(storage.get_applied_migrations().unwrap().len(), MIGRATIONS.len());
    }

    #[test]
    fn habits_are_scoped_to_their_owner() {
        let test_storage = TestStorage::new();
        test_storage.create_habit("alice", "Read").unwrap();
        test_storage.create_habit("alice", "Run").unwrap();
        test_storage.create_habit("bob", "Swim").unwrap();

        let alice = test_storage.storage().list_habits(&"alice".into()).unwrap();
        let names: Vec<_> = alice.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Read", "Run"]);
    }

    #[test]
    fn created_at_survives_round_trip() {
        let test_storage = TestStorage::new();
        let habit = test_storage.create_habit("alice", "Read").unwrap();
        let loaded = test_storage.storage().find_habit(&habit.id).unwrap().unwrap();
        assert_eq!(loaded.created_on(), habit.created_on());
        assert_eq!(loaded.created_at.timestamp_millis(), habit.created_at.timestamp_millis());
    }

    #[test]
    fn duplicate_day_is_a_conflict_not_an_error() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        let habit = test_storage.create_habit("alice", "Read").unwrap();

        let first = storage.insert_completion(&habit.id, day("2024-03-10")).unwrap();
        let second = storage.insert_completion(&habit.id, day("2024-03-10")).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(storage.list_completions(&habit.id).unwrap().len(), 1);
    }

    #[test]
    fn completion_for_unknown_habit_is_rejected() {
        let test_storage = TestStorage::new();
        let result = test_storage
            .storage()
            .insert_completion(&crate::domain::HabitId("missing".into()), day("2024-03-10"));
        assert!(result.is_err());
    }

    #[test]
    fn stored_date_is_utc_midnight() {
        let test_storage = TestStorage::new();
        let habit = test_storage.create_habit("alice", "Read").unwrap();
        test_storage
            .storage()
            .insert_completion(&habit.id, day("2024-03-10"))
            .unwrap();

        let raw: String = test_storage
            .storage()
            .conn()
            .unwrap()
            .query_row("SELECT completed_on_date FROM habit_trackings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(raw, "2024-03-10T00:00:00.000Z");
    }

    #[test]
    fn deleting_a_habit_cascades_to_trackings() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        let habit = test_storage.create_habit("alice", "Read").unwrap();
        let other = test_storage.create_habit("alice", "Run").unwrap();
        test_storage.mark(&habit, &["2024-03-01", "2024-03-02"]).unwrap();
        test_storage.mark(&other, &["2024-03-01"]).unwrap();

        assert!(storage.delete_habit(&habit.id).unwrap());
        assert!(storage.find_habit(&habit.id).unwrap().is_none());
        assert!(storage.list_completions(&habit.id).unwrap().is_empty());
        assert_eq!(storage.list_completions(&other.id).unwrap().len(), 1);
        assert!(!storage.delete_habit(&habit.id).unwrap());
    }

    #[test]
    fn update_renames_and_clears_description() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        let habit = test_storage.create_habit("alice", "Read").unwrap();

        let changes = HabitChanges {
            name: Some(HabitName::new("Read books").unwrap()),
            description: Some(None),
        };
        assert!(storage.update_habit(&habit.id, &changes).unwrap());

        let loaded = storage.find_habit(&habit.id).unwrap().unwrap();
        assert_eq!(loaded.name.as_str(), "Read books");
        assert_eq!(loaded.description, None);

        assert!(!storage
            .update_habit(&crate::domain::HabitId("missing".into()), &changes)
            .unwrap());
    }

    #[test]
    fn notes_can_be_set_and_cleared() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        let habit = test_storage.create_habit("alice", "Read").unwrap();
        let completion = storage
            .insert_completion(&habit.id, day("2024-03-10"))
            .unwrap()
            .unwrap();

        let note = Note::new("Finished chapter 3").unwrap();
        assert!(storage.update_note(&completion.id, Some(&note)).unwrap());
        assert_eq!(storage.list_completions(&habit.id).unwrap()[0].note, Some(note));

        assert!(storage.update_note(&completion.id, None).unwrap());
        assert_eq!(storage.list_completions(&habit.id).unwrap()[0].note, None);
    }

    #[test]
    fn joined_query_groups_trackings_under_habits() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        let read = test_storage.create_habit("alice", "Read").unwrap();
        let run = test_storage.create_habit("alice", "Run").unwrap();
        test_storage.mark(&read, &["2024-03-02", "2024-03-01"]).unwrap();

        let joined = storage.list_habits_with_completions(&"alice".into()).unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].habit.id, read.id);
        assert_eq!(joined[0].date_keys(), vec![day("2024-03-01"), day("2024-03-02")]);
        assert_eq!(joined[1].habit.id, run.id);
        assert!(joined[1].completions.is_empty());
    }

    #[test]
    fn rows_written_by_other_clients_are_normalized() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        let habit = test_storage.create_habit("alice", "Read").unwrap();

        storage
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO habit_trackings VALUES ('legacy', ?, '2024-03-10 00:00:00.000Z', '')",
                duckdb::params![habit.id.as_str()],
            )
            .unwrap();

        let completions = storage.list_completions(&habit.id).unwrap();
        assert_eq!(completions[0].date, day("2024-03-10"));
        assert_eq!(completions[0].note, None);
    }

    #[test]
    fn other_spellings_of_a_day_block_a_second_insert() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        let habit = test_storage.create_habit("alice", "Read").unwrap();
        test_storage
            .insert_raw_tracking(&habit, "legacy", "2024-03-10 00:00:00.000Z")
            .unwrap();

        assert_eq!(storage.insert_completion(&habit.id, day("2024-03-10")).unwrap(), None);
        assert_eq!(storage.list_completions(&habit.id).unwrap().len(), 1);
    }

    #[test]
    fn clearing_a_day_removes_every_spelling() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        let habit = test_storage.create_habit("alice", "Read").unwrap();
        test_storage
            .insert_raw_tracking(&habit, "legacy-space", "2024-03-10 00:00:00.000Z")
            .unwrap();
        test_storage
            .insert_raw_tracking(&habit, "legacy-short", "2024-03-10T00:00:00Z")
            .unwrap();
        test_storage.mark(&habit, &["2024-03-11"]).unwrap();

        assert_eq!(storage.delete_completions_on(&habit.id, day("2024-03-10")).unwrap(), 2);
        let left = storage.list_completions(&habit.id).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].date, day("2024-03-11"));
        assert_eq!(storage.delete_completions_on(&habit.id, day("2024-03-10")).unwrap(), 0);
    }

    #[test]
    fn malformed_rows_fail_loudly() {
        let test_storage = TestStorage::new();
        let storage = test_storage.storage();
        let habit = test_storage.create_habit("alice", "Read").unwrap();

        storage
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO habit_trackings VALUES ('bad', ?, 'someday', NULL)",
                duckdb::params![habit.id.as_str()],
            )
            .unwrap();

        assert!(storage.list_completions(&habit.id).is_err());
    }
}
