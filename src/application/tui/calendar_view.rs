use super::theme::Theme;
use crate::domain::{CompletionLedger, DateKey, DateRange, Habit, Streaks, ToggleOutcome};
use crate::infrastructure::StoreClient;
use anyhow::{Context, Result, bail};
use chrono::{Datelike, Months, Weekday};
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, poll};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::tty::IsTty;
use log::warn;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};
use std::collections::HashSet;
use std::io::{Stdout, stdout};

const WEEKS_SHOWN: i64 = 5;

/// Sunday on or before `date`.
pub fn week_start(date: DateKey) -> DateKey {
    let back = date.as_naive().weekday().num_days_from_sunday();
    date.add_days(-i64::from(back))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Toggle,
    Quit,
}

/// Cursor and focus of the calendar, independent of the terminal.
#[derive(Debug, Clone)]
pub struct CalendarState {
    pub selected: DateKey,
    pub today: DateKey,
    pub focus_week: DateKey,
    pub show_help: bool,
}

impl CalendarState {
    pub fn new(selected: DateKey, today: DateKey) -> Self {
        Self {
            selected,
            today,
            focus_week: week_start(selected),
            show_help: false,
        }
    }

    fn select(&mut self, date: DateKey) {
        self.selected = date;
        self.focus_week = week_start(date);
    }

    fn shift_months(&mut self, forward: bool) {
        let date = self.selected.as_naive();
        let shifted = if forward {
            date.checked_add_months(Months::new(1))
        } else {
            date.checked_sub_months(Months::new(1))
        };
        if let Some(shifted) = shifted {
            self.select(DateKey::from_naive(shifted));
        }
    }

    /// First day of each visible week; the focused week is in the middle.
    pub fn visible_weeks(&self) -> Vec<DateKey> {
        let half = WEEKS_SHOWN / 2;
        (-half..=half)
            .map(|offset| self.focus_week.add_days(offset * 7))
            .collect()
    }

    pub fn visible_range(&self) -> DateRange {
        let weeks = self.visible_weeks();
        let start = weeks.first().copied().unwrap_or(self.focus_week);
        let end = weeks.last().copied().unwrap_or(self.focus_week).add_days(6);
        DateRange::new(start, end)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => return KeyOutcome::Quit,
            (KeyCode::Char('c'), KeyModifiers::CONTROL)
            | (KeyCode::Char('d'), KeyModifiers::CONTROL) => return KeyOutcome::Quit,

            (KeyCode::Char(' '), _) | (KeyCode::Enter, _) => return KeyOutcome::Toggle,

            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => self.select(self.selected.pred()),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => self.select(self.selected.succ()),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => self.select(self.selected.add_days(-7)),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => self.select(self.selected.add_days(7)),
            (KeyCode::PageUp, _) => self.shift_months(false),
            (KeyCode::PageDown, _) => self.shift_months(true),
            (KeyCode::Char('t'), _) => self.select(self.today),
            (KeyCode::Char('?'), _) => self.show_help = !self.show_help,
            _ => {}
        }
        KeyOutcome::Continue
    }
}

/// What the ledger shows for the visible weeks at draw time.
#[derive(Debug, Clone, Default)]
pub struct CalendarSnapshot {
    pub habit_name: String,
    pub done: HashSet<DateKey>,
    pub pending: Option<DateKey>,
    pub streaks: Streaks,
    pub status: Option<String>,
}

fn centered(available: Rect, width: u16, height: u16) -> Rect {
    let width = available.width.min(width);
    let height = available.height.min(height);
    Rect {
        x: available.x + (available.width - width) / 2,
        y: available.y + (available.height - height) / 2,
        width,
        height,
    }
}

fn day_style(date: DateKey, in_focus: bool, state: &CalendarState, snapshot: &CalendarSnapshot, theme: &Theme) -> Style {
    let colors = &theme.colors;
    let weekend = matches!(date.as_naive().weekday(), Weekday::Sat | Weekday::Sun);

    let mut style = if snapshot.pending == Some(date) {
        Style::default().fg(colors.pending).add_modifier(Modifier::ITALIC)
    } else if snapshot.done.contains(&date) {
        Style::default().fg(colors.done)
    } else if date == state.today {
        Style::default().fg(colors.today).add_modifier(Modifier::BOLD)
    } else if weekend {
        Style::default().fg(colors.weekend)
    } else if in_focus {
        Style::default().fg(colors.focused)
    } else {
        Style::default().fg(colors.dimmed)
    };

    if date == state.selected {
        style = style.bg(colors.selected_bg);
    }
    style
}

fn week_row(week: DateKey, in_focus: bool, state: &CalendarState, snapshot: &CalendarSnapshot, theme: &Theme) -> Row<'static> {
    let cells: Vec<Cell> = (0..7)
        .map(|offset| {
            let date = week.add_days(offset);
            let day_text = if date.day() == 1 {
                format!("{} 1", date.as_naive().format("%b"))
            } else {
                date.day().to_string()
            };
            let mark = if snapshot.done.contains(&date) { "•" } else { " " };
            Cell::from(format!("{day_text}{mark}"))
                .style(day_style(date, in_focus, state, snapshot, theme))
        })
        .collect();

    let row = Row::new(cells).height(2);
    if in_focus {
        row.style(Style::default().bg(theme.colors.focused_week_bg))
    } else {
        row
    }
}

fn calendar_table(state: &CalendarState, snapshot: &CalendarSnapshot, theme: &Theme) -> Table<'static> {
    let header_style = Style::default().fg(theme.colors.header);
    let weekend_style = Style::default().fg(theme.colors.weekend);
    let header = Row::new(vec![
        Cell::from("Sun").style(weekend_style),
        Cell::from("Mon").style(header_style),
        Cell::from("Tue").style(header_style),
        Cell::from("Wed").style(header_style),
        Cell::from("Thu").style(header_style),
        Cell::from("Fri").style(header_style),
        Cell::from("Sat").style(weekend_style),
    ]);

    let rows: Vec<Row> = state
        .visible_weeks()
        .into_iter()
        .map(|week| week_row(week, week == state.focus_week, state, snapshot, theme))
        .collect();

    Table::new(rows, [Constraint::Ratio(1, 7); 7])
        .header(header)
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(theme.colors.dimmed))
                .title(format!(
                    "{} · {}",
                    snapshot.habit_name,
                    state.selected.as_naive().format("%B %Y")
                ))
                .title_style(header_style.add_modifier(Modifier::BOLD))
                .title_alignment(Alignment::Center),
        )
        .column_spacing(1)
}

fn footer(state: &CalendarState, snapshot: &CalendarSnapshot, theme: &Theme) -> Paragraph<'static> {
    let colors = &theme.colors;
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{}", state.selected.as_naive().format("%A, %B %d, %Y")),
                Style::default().fg(colors.focused),
            ),
            Span::styled(
                if snapshot.done.contains(&state.selected) { "  done" } else { "" },
                Style::default().fg(colors.done),
            ),
        ]),
        Line::from(Span::styled(
            format!(
                "Streak: {} current, {} longest",
                snapshot.streaks.current, snapshot.streaks.longest
            ),
            Style::default().fg(colors.focused),
        )),
    ];

    if let Some(status) = &snapshot.status {
        lines.push(Line::from(Span::styled(
            status.clone(),
            Style::default().fg(colors.error_text),
        )));
    }

    if state.show_help {
        lines.push(Line::from(Span::styled(
            "↑↓/jk=Week • ←→/hl=Day • PgUp/PgDn=Month • t=Today • Space/Enter=Toggle • q=Quit",
            Style::default().fg(colors.help_text),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "?=Help",
            Style::default().fg(colors.help_text),
        )));
    }

    Paragraph::new(lines).alignment(Alignment::Center)
}

/// Draws the whole calendar screen for one habit.
pub fn draw_calendar(frame: &mut Frame, state: &CalendarState, snapshot: &CalendarSnapshot, theme: &Theme) {
    const CALENDAR_HEIGHT: u16 = 14; // 5 weeks * 2 rows + header + title + border
    const FOOTER_HEIGHT: u16 = 5;
    const WIDTH: u16 = 72;

    let area = centered(frame.area(), WIDTH, CALENDAR_HEIGHT + FOOTER_HEIGHT);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(CALENDAR_HEIGHT),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(area);

    frame.render_widget(calendar_table(state, snapshot, theme), chunks[0]);
    frame.render_widget(footer(state, snapshot, theme), chunks[1]);
}

/// Interactive month calendar for a single habit.
pub struct CalendarView<'a> {
    state: CalendarState,
    ledger: CompletionLedger<'a>,
    habit: Habit,
    terminal: Terminal<CrosstermBackend<Stdout>>,
    theme: Theme,
    status: Option<String>,
    should_exit: bool,
}

impl<'a> CalendarView<'a> {
    pub fn new(client: &'a StoreClient, habit: Habit, selected: DateKey, theme: Theme) -> Result<Self> {
        if !IsTty::is_tty(&stdout()) {
            bail!("Not running in a TTY, cannot initialize terminal interface");
        }

        let ledger = CompletionLedger::load(client, habit.id.clone())?;

        enable_raw_mode().context("Failed to enable raw mode")?;
        if let Err(e) = stdout().execute(EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e).context("Failed to enter alternate screen");
        }
        let terminal = match Terminal::new(CrosstermBackend::new(stdout())) {
            Ok(terminal) => terminal,
            Err(e) => {
                let _ = disable_raw_mode();
                let _ = stdout().execute(LeaveAlternateScreen);
                return Err(e).context("Failed to create terminal");
            }
        };

        let status = (!ledger.is_ready()).then(|| "Store not ready, changes are disabled".to_string());

        Ok(Self {
            state: CalendarState::new(selected, DateKey::today()),
            ledger,
            habit,
            terminal,
            theme,
            status,
            should_exit: false,
        })
    }

    fn snapshot(&self) -> CalendarSnapshot {
        let range = self.state.visible_range();
        CalendarSnapshot {
            habit_name: self.habit.name.to_string(),
            done: self
                .ledger
                .date_keys()
                .into_iter()
                .filter(|date| range.contains(*date))
                .collect(),
            pending: self.ledger.pending().map(|change| change.date()),
            streaks: self.ledger.streaks(self.state.today),
            status: self.status.clone(),
        }
    }

    fn draw(&mut self) -> Result<()> {
        let snapshot = self.snapshot();
        let (state, theme) = (&self.state, &self.theme);
        self.terminal
            .draw(|frame| draw_calendar(frame, state, &snapshot, theme))?;
        Ok(())
    }

    /// Shows the toggle straight away, then waits for the store.
    fn toggle_selected(&mut self) -> Result<()> {
        let date = self.state.selected;
        if date > self.state.today {
            self.status = Some("Future days cannot be completed".to_string());
            return Ok(());
        }
        if let Err(e) = self.ledger.stage_toggle(date) {
            self.status = Some(e.to_string());
            return Ok(());
        }

        self.status = None;
        self.draw()?;

        self.status = match self.ledger.commit() {
            Ok(ToggleOutcome::Completed) => Some(format!("{date} marked done")),
            Ok(ToggleOutcome::Cleared) => Some(format!("{date} cleared")),
            Ok(ToggleOutcome::NotReady) => Some("Store not ready, change discarded".to_string()),
            Err(e) => {
                warn!("toggle of {} for {} failed: {:#}", date, self.habit.id, e);
                Some(format!("Could not save {date}: {e}"))
            }
        };
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        while !self.should_exit {
            self.draw()?;

            if !poll(std::time::Duration::from_millis(100))? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match self.state.handle_key(key) {
                KeyOutcome::Quit => self.should_exit = true,
                KeyOutcome::Toggle => self.toggle_selected()?,
                KeyOutcome::Continue => {}
            }
        }

        self.cleanup()
    }

    fn cleanup(&mut self) -> Result<()> {
        disable_raw_mode()?;
        self.terminal.backend_mut().execute(LeaveAlternateScreen)?;
        Ok(())
    }
}

impl Drop for CalendarView<'_> {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
