use crate::application::{CalendarView, HabitApp, TextRenderer, Theme};
use crate::domain::{AddOutcome, DateKey};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;

#[derive(Parser)]
#[command(name = "habitual")]
#[command(about = "A terminal habit tracker with streaks and monthly stats")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Create a habit
    Add {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List your habits
    List,
    /// Rename a habit (by id or name)
    Rename { habit: String, new_name: String },
    /// Replace a habit's description; an empty string clears it
    Describe { habit: String, description: String },
    /// Delete a habit and all of its completions
    Delete { habit: String },
    /// Mark a day complete
    Done {
        habit: String,
        /// Day to mark (YYYY-MM-DD or ISO-8601, defaults to today)
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Clear a completed day
    Undo {
        habit: String,
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Attach a note to a completed day; omit the text to clear it
    Note {
        habit: String,
        text: Option<String>,
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Show streaks and monthly completion rates
    Stats {
        /// Only this habit (by id or name)
        habit: Option<String>,
        /// Number of calendar months to break down
        #[arg(short, long)]
        months: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Show every habit against the last three days
    Day {
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Reclaim space in the habit database
    Compact,
    /// Open the interactive calendar for a habit
    Calendar {
        habit: String,
        #[arg(short, long)]
        date: Option<String>,
    },
}

/// Reads a date argument; absent means today.
pub fn parse_date_arg(date: Option<&str>) -> Result<DateKey> {
    match date {
        Some(raw) => DateKey::parse(raw).with_context(|| format!("Invalid date '{raw}'")),
        None => Ok(DateKey::today()),
    }
}

impl Cli {
    pub fn run() -> Result<()> {
        let cli = Self::parse();
        let mut app = HabitApp::new()?;
        let result = Self::execute(cli.command, &app, &mut std::io::stdout());
        app.shutdown();
        result
    }

    pub fn execute(command: Option<Commands>, app: &HabitApp, out: &mut impl Write) -> Result<()> {
        let renderer = TextRenderer::new();

        match command {
            Some(Commands::Add { name, description }) => {
                let habit = app.create_habit(&name, description.as_deref())?;
                writeln!(out, "Created '{}' [{}]", habit.name, habit.id)?;
            }
            Some(Commands::List) => {
                write!(out, "{}", renderer.render_habits(&app.habits()?))?;
            }
            Some(Commands::Rename { habit, new_name }) => {
                let habit = app.rename_habit(&habit, &new_name)?;
                writeln!(out, "Renamed to '{}'", habit.name)?;
            }
            Some(Commands::Describe { habit, description }) => {
                let habit = app.describe_habit(&habit, &description)?;
                match &habit.description {
                    Some(description) => writeln!(out, "'{}': {}", habit.name, description.as_str())?,
                    None => writeln!(out, "'{}' has no description", habit.name)?,
                }
            }
            Some(Commands::Delete { habit }) => {
                let habit = app.delete_habit(&habit)?;
                writeln!(out, "Deleted '{}'", habit.name)?;
            }
            Some(Commands::Done { habit, date }) => {
                let date = parse_date_arg(date.as_deref())?;
                let (habit, outcome) = app.mark(&habit, date)?;
                match outcome {
                    AddOutcome::Added(_) => writeln!(out, "'{}' done on {}", habit.name, date)?,
                    AddOutcome::AlreadyComplete => {
                        writeln!(out, "'{}' was already done on {}", habit.name, date)?
                    }
                    AddOutcome::NotReady => writeln!(out, "Store not ready, nothing saved")?,
                }
            }
            Some(Commands::Undo { habit, date }) => {
                let date = parse_date_arg(date.as_deref())?;
                let (habit, removed) = app.unmark(&habit, date)?;
                if removed {
                    writeln!(out, "'{}' cleared on {}", habit.name, date)?;
                } else {
                    writeln!(out, "'{}' was not done on {}", habit.name, date)?;
                }
            }
            Some(Commands::Note { habit, text, date }) => {
                let date = parse_date_arg(date.as_deref())?;
                if app.set_note(&habit, date, text.as_deref())? {
                    writeln!(out, "Note saved for {date}")?;
                } else {
                    writeln!(out, "Nothing to annotate: '{habit}' is not done on {date}")?;
                }
            }
            Some(Commands::Stats { habit, months, json }) => {
                let months = months.unwrap_or(app.config().months_back);
                let today = DateKey::today();
                let reports = match habit {
                    Some(key) => {
                        let habit = app.resolve_habit(&key)?;
                        vec![app.habit_report(&habit, months, today)?]
                    }
                    None => app.reports(months, today)?,
                };
                if json {
                    writeln!(out, "{}", renderer.render_reports_json(&reports)?)?;
                } else {
                    write!(out, "{}", renderer.render_reports(&reports))?;
                }
            }
            Some(Commands::Day { date }) => {
                let today = parse_date_arg(date.as_deref())?;
                write!(out, "{}", renderer.render_board(&app.day_board(today)?, today))?;
            }
            Some(Commands::Compact) => {
                app.compact()?;
                writeln!(out, "Database compacted")?;
            }
            Some(Commands::Calendar { habit, date }) => {
                let selected = parse_date_arg(date.as_deref())?;
                let habit = app.resolve_habit(&habit)?;
                let theme = app
                    .config()
                    .theme
                    .as_deref()
                    .map(Theme::by_name)
                    .unwrap_or_default();
                let mut view = CalendarView::new(app.client(), habit, selected, theme)?;
                view.run()?;
            }
            None => {
                let today = DateKey::today();
                write!(out, "{}", renderer.render_board(&app.day_board(today)?, today))?;
            }
        }

        Ok(())
    }
}
