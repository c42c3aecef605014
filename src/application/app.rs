use crate::application::Config;
use crate::domain::{
    AddOutcome, CompletionLedger, DateKey, DateRange, Description, Habit, HabitChanges, HabitName,
    HabitStats, HabitWithCompletions, NewHabit, Note, Streaks, ToggleOutcome, compute_monthly_stats,
    compute_streaks,
};
use crate::infrastructure::{ActivityLogHook, HookRegistry, Loadable, StoreClient};
use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};
use serde::Serialize;

/// Days shown on the day board, ending today.
pub const BOARD_DAYS: u32 = 3;

/// Streaks and completion rates of one habit as of a given day.
#[derive(Debug, Clone, Serialize)]
pub struct HabitReport {
    pub habit: Habit,
    /// First day counted by the overall rate.
    pub since: DateKey,
    pub as_of: DateKey,
    pub streaks: Streaks,
    pub stats: HabitStats,
}

impl HabitReport {
    /// `created_at` is a UTC instant while completions and `as_of` are the
    /// user's calendar days, so the first counted day is pulled back to the
    /// earliest completion or `as_of` when the UTC day runs ahead of them.
    pub fn build(habit: Habit, dates: &[DateKey], months_back: u32, as_of: DateKey) -> Self {
        let since = dates
            .iter()
            .copied()
            .chain([as_of])
            .fold(habit.created_on(), DateKey::min);
        let streaks = compute_streaks(dates, as_of);
        let stats = compute_monthly_stats(dates, since, months_back, as_of);
        Self {
            habit,
            since,
            as_of,
            streaks,
            stats,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoardRow {
    pub habit: Habit,
    /// One flag per board day, same order as [`DayBoard::days`].
    pub done: Vec<bool>,
    pub streaks: Streaks,
}

/// Every habit checked against the most recent days.
#[derive(Debug, Clone)]
pub struct DayBoard {
    pub days: Vec<DateKey>,
    pub rows: Vec<BoardRow>,
}

pub struct HabitApp {
    client: StoreClient,
    config: Config,
}

fn require<T>(loadable: Loadable<T>) -> Result<T> {
    loadable
        .ready()
        .ok_or_else(|| anyhow!("habit store is not ready"))
}

impl HabitApp {
    pub fn new() -> Result<Self> {
        Self::open(Config::from_env())
    }

    /// Opens the database named by `config` with the activity log attached.
    pub fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

        let mut hooks = HookRegistry::new();
        hooks.register(ActivityLogHook::new(config.activity_log.clone()));

        let client = StoreClient::open(&config.db_path)?.with_hooks(hooks);
        info!(
            "habits of '{}' loaded from {} ({})",
            config.owner.as_str(),
            config.db_path.display(),
            client.backend_info().unwrap_or("no backend")
        );

        Ok(Self { client, config })
    }

    pub fn with_client(client: StoreClient, config: Config) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &StoreClient {
        &self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn create_habit(&self, name: &str, description: Option<&str>) -> Result<Habit> {
        let name = HabitName::new(name)?;
        let description = match description {
            Some(raw) => Description::new(raw)?,
            None => None,
        };
        let new = NewHabit::new(self.config.owner.clone(), name, description);
        require(self.client.create_habit(&new)?)
    }

    pub fn habits(&self) -> Result<Vec<Habit>> {
        require(self.client.habits(&self.config.owner)?)
    }

    /// Finds a habit by exact id, or else by case-insensitive name.
    pub fn resolve_habit(&self, key: &str) -> Result<Habit> {
        let habits = self.habits()?;
        if let Some(habit) = habits.iter().find(|h| h.id.as_str() == key) {
            return Ok(habit.clone());
        }

        let wanted = key.trim().to_lowercase();
        let mut matches: Vec<Habit> = habits
            .into_iter()
            .filter(|h| h.name.as_str().to_lowercase() == wanted)
            .collect();
        match matches.len() {
            0 => bail!("no habit named '{key}'"),
            1 => Ok(matches.remove(0)),
            n => bail!("'{key}' matches {n} habits, use its id instead"),
        }
    }

    fn apply_changes(&self, habit: Habit, changes: &HabitChanges) -> Result<Habit> {
        if changes.is_empty() {
            return Ok(habit);
        }
        if !require(self.client.update_habit(&habit.id, changes)?)? {
            bail!("habit '{}' no longer exists", habit.name);
        }
        require(self.client.habit(&habit.id)?)?
            .with_context(|| format!("habit '{}' vanished after update", habit.name))
    }

    pub fn rename_habit(&self, key: &str, new_name: &str) -> Result<Habit> {
        let habit = self.resolve_habit(key)?;
        let changes = HabitChanges::rename(HabitName::new(new_name)?);
        self.apply_changes(habit, &changes)
    }

    /// Replaces the description; blank input clears it.
    pub fn describe_habit(&self, key: &str, description: &str) -> Result<Habit> {
        let habit = self.resolve_habit(key)?;
        let changes = HabitChanges::describe(Description::new(description)?);
        self.apply_changes(habit, &changes)
    }

    /// Deletes the habit and all of its completions.
    pub fn delete_habit(&self, key: &str) -> Result<Habit> {
        let habit = self.resolve_habit(key)?;
        if !require(self.client.delete_habit(&habit.id)?)? {
            bail!("habit '{}' no longer exists", habit.name);
        }
        Ok(habit)
    }

    pub fn mark(&self, key: &str, date: DateKey) -> Result<(Habit, AddOutcome)> {
        let habit = self.resolve_habit(key)?;
        let mut ledger = CompletionLedger::load(&self.client, habit.id.clone())?;
        let outcome = ledger.add_completion(date)?;
        Ok((habit, outcome))
    }

    /// Returns whether a completion was removed.
    pub fn unmark(&self, key: &str, date: DateKey) -> Result<(Habit, bool)> {
        let habit = self.resolve_habit(key)?;
        let mut ledger = CompletionLedger::load(&self.client, habit.id.clone())?;
        let removed = ledger.clear_day(date)? > 0;
        Ok((habit, removed))
    }

    pub fn toggle(&self, key: &str, date: DateKey) -> Result<(Habit, ToggleOutcome)> {
        let habit = self.resolve_habit(key)?;
        let mut ledger = CompletionLedger::load(&self.client, habit.id.clone())?;
        let outcome = ledger.toggle(date)?;
        Ok((habit, outcome))
    }

    /// Sets or clears the note on a completed day. Returns `false` when the
    /// day is not complete.
    pub fn set_note(&self, key: &str, date: DateKey, note: Option<&str>) -> Result<bool> {
        let habit = self.resolve_habit(key)?;
        let note = note.map(Note::new).transpose()?;
        let mut ledger = CompletionLedger::load(&self.client, habit.id)?;
        ledger.set_note(date, note)
    }

    pub fn habit_report(&self, habit: &Habit, months_back: u32, today: DateKey) -> Result<HabitReport> {
        let completions = require(self.client.completions(&habit.id)?)?;
        let dates: Vec<DateKey> = completions.iter().map(|c| c.date).collect();
        Ok(HabitReport::build(habit.clone(), &dates, months_back, today))
    }

    /// Reports for every habit of the configured owner, in creation order.
    pub fn reports(&self, months_back: u32, today: DateKey) -> Result<Vec<HabitReport>> {
        let habits = require(self.client.habits_with_completions(&self.config.owner)?)?;
        Ok(habits
            .into_iter()
            .map(|entry| {
                let dates = entry.date_keys();
                HabitReport::build(entry.habit, &dates, months_back, today)
            })
            .collect())
    }

    pub fn day_board(&self, today: DateKey) -> Result<DayBoard> {
        let days: Vec<DateKey> = DateRange::trailing(today, BOARD_DAYS).days().collect();
        let habits = require(self.client.habits_with_completions(&self.config.owner)?)?;
        debug!("day board for {} with {} habits", today, habits.len());

        let rows = habits
            .into_iter()
            .map(|HabitWithCompletions { habit, completions }| {
                let dates: Vec<DateKey> = completions.iter().map(|c| c.date).collect();
                BoardRow {
                    done: days.iter().map(|day| dates.contains(day)).collect(),
                    streaks: compute_streaks(&dates, today),
                    habit,
                }
            })
            .collect();

        Ok(DayBoard { days, rows })
    }

    /// Vacuums and re-analyzes the database.
    pub fn compact(&self) -> Result<()> {
        require(self.client.maintenance()?)
    }

    pub fn shutdown(&mut self) {
        self.client.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OwnerId;
    use crate::infrastructure::test_utils::test_harness::TestStorage;

    fn day(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    fn app_for(test_storage: &TestStorage, owner: &str) -> HabitApp {
        let config = Config::in_dir(test_storage.dir(), OwnerId::new(owner), 6, None);
        HabitApp::with_client(test_storage.client(), config)
    }

    #[test]
    fn create_validates_and_lists_only_own_habits() {
        let test_storage = TestStorage::new();
        let alice = app_for(&test_storage, "alice");
        let bob = app_for(&test_storage, "bob");

        alice.create_habit("Read", Some("  ")).unwrap();
        bob.create_habit("Run", Some("5k loop")).unwrap();
        assert!(alice.create_habit("R", None).is_err());

        let habits = alice.habits().unwrap();
        assert_eq!(habits.len(), 1);
        assert_eq!(habits[0].name.as_str(), "Read");
        assert_eq!(habits[0].description, None);
    }

    #[test]
    fn resolve_by_id_or_name() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        let habit = app.create_habit("Meditate", None).unwrap();

        assert_eq!(app.resolve_habit(habit.id.as_str()).unwrap().id, habit.id);
        assert_eq!(app.resolve_habit("meditate").unwrap().id, habit.id);
        assert!(app.resolve_habit("walk").is_err());
    }

    #[test]
    fn ambiguous_names_need_an_id() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        app.create_habit("Read", None).unwrap();
        app.create_habit("read", None).unwrap();

        let err = app.resolve_habit("READ").unwrap_err();
        assert!(err.to_string().contains("2 habits"));
    }

    #[test]
    fn rename_describe_and_delete() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        app.create_habit("Read", None).unwrap();

        let renamed = app.rename_habit("read", "Read more").unwrap();
        assert_eq!(renamed.name.as_str(), "Read more");

        let described = app.describe_habit("Read more", "20 pages").unwrap();
        assert_eq!(described.description.unwrap().as_str(), "20 pages");
        let cleared = app.describe_habit("Read more", "").unwrap();
        assert_eq!(cleared.description, None);

        app.mark("Read more", day("2024-03-10")).unwrap();
        let deleted = app.delete_habit("Read more").unwrap();
        assert!(app.habits().unwrap().is_empty());
        assert!(app.client().completions(&deleted.id).unwrap().unwrap_or_default().is_empty());
    }

    #[test]
    fn mark_unmark_and_toggle() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        app.create_habit("Read", None).unwrap();

        let (_, first) = app.mark("Read", day("2024-03-10")).unwrap();
        let (_, again) = app.mark("Read", day("2024-03-10")).unwrap();
        assert!(matches!(first, AddOutcome::Added(_)));
        assert_eq!(again, AddOutcome::AlreadyComplete);

        assert!(app.unmark("Read", day("2024-03-10")).unwrap().1);
        assert!(!app.unmark("Read", day("2024-03-10")).unwrap().1);

        assert_eq!(app.toggle("Read", day("2024-03-11")).unwrap().1, ToggleOutcome::Completed);
        assert_eq!(app.toggle("Read", day("2024-03-11")).unwrap().1, ToggleOutcome::Cleared);
    }

    #[test]
    fn notes_need_a_completed_day() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        app.create_habit("Read", None).unwrap();

        assert!(!app.set_note("Read", day("2024-03-10"), Some("20 pages")).unwrap());
        app.mark("Read", day("2024-03-10")).unwrap();
        assert!(app.set_note("Read", day("2024-03-10"), Some("20 pages")).unwrap());
        assert!(app.set_note("Read", day("2024-03-10"), Some("x")).is_err());
    }

    #[test]
    fn report_combines_streaks_and_stats() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        let habit = test_storage
            .create_habit_at("alice", "Read", "2024-03-01T08:00:00Z")
            .unwrap();
        test_storage
            .mark(&habit, &["2024-03-01", "2024-03-02", "2024-03-04", "2024-03-05"])
            .unwrap();

        let report = app.habit_report(&habit, 2, day("2024-03-05")).unwrap();
        assert_eq!(report.streaks, Streaks { current: 2, longest: 2 });
        assert_eq!(report.stats.overall.total_days, 5);
        assert_eq!(report.stats.overall.completed_days, 4);
        assert_eq!(report.stats.overall.rate, 80);
        assert_eq!(report.stats.per_month.len(), 2);
        assert_eq!(report.stats.per_month[1].label, "Mar");

        let all = app.reports(2, day("2024-03-05")).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].streaks, report.streaks);
    }

    #[test]
    fn evening_habit_west_of_utc_counts_its_first_day() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        // 20:00 in UTC-5 is already the 16th in UTC.
        let habit = test_storage
            .create_habit_at("alice", "Read", "2024-01-15T20:00:00-05:00")
            .unwrap();
        test_storage.mark(&habit, &["2024-01-15"]).unwrap();

        let report = app.habit_report(&habit, 1, day("2024-01-15")).unwrap();
        assert_eq!(report.since, day("2024-01-15"));
        assert_eq!(report.stats.overall.total_days, 1);
        assert_eq!(report.stats.overall.completed_days, 1);
        assert_eq!(report.stats.overall.rate, 100);
    }

    #[test]
    fn creation_day_stands_when_nothing_precedes_it() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        let habit = test_storage
            .create_habit_at("alice", "Read", "2024-03-01T08:00:00Z")
            .unwrap();
        test_storage.mark(&habit, &["2024-03-03"]).unwrap();

        let report = app.habit_report(&habit, 1, day("2024-03-04")).unwrap();
        assert_eq!(report.since, day("2024-03-01"));
        assert_eq!(report.stats.overall.total_days, 4);
    }

    #[test]
    fn unmark_clears_every_record_of_the_day() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        let habit = test_storage.create_habit("alice", "Read").unwrap();
        test_storage
            .insert_raw_tracking(&habit, "legacy", "2024-03-10 00:00:00.000Z")
            .unwrap();

        let (_, again) = app.mark("Read", day("2024-03-10")).unwrap();
        assert_eq!(again, AddOutcome::AlreadyComplete);
        assert!(app.unmark("Read", day("2024-03-10")).unwrap().1);
        assert!(app.client().completions(&habit.id).unwrap().unwrap_or_default().is_empty());
    }

    #[test]
    fn board_covers_the_last_three_days() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        let habit = test_storage.create_habit("alice", "Read").unwrap();
        test_storage.mark(&habit, &["2024-03-08", "2024-03-10"]).unwrap();

        let board = app.day_board(day("2024-03-10")).unwrap();
        assert_eq!(
            board.days,
            vec![day("2024-03-08"), day("2024-03-09"), day("2024-03-10")]
        );
        assert_eq!(board.rows.len(), 1);
        assert_eq!(board.rows[0].done, vec![true, false, true]);
        assert_eq!(board.rows[0].streaks.current, 1);
    }

    #[test]
    fn compact_keeps_data() {
        let test_storage = TestStorage::new();
        let app = app_for(&test_storage, "alice");
        app.create_habit("Read", None).unwrap();

        app.compact().unwrap();
        assert_eq!(app.habits().unwrap().len(), 1);
    }

    #[test]
    fn shut_down_app_reports_not_ready() {
        let test_storage = TestStorage::new();
        let mut app = app_for(&test_storage, "alice");
        app.shutdown();

        let err = app.habits().unwrap_err();
        assert!(err.to_string().contains("not ready"));
    }
}
