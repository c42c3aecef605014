use crate::application::{DayBoard, HabitReport};
use crate::domain::{DateKey, Habit};
use anyhow::Result;

pub struct TextRenderer;

impl TextRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render_habits(&self, habits: &[Habit]) -> String {
        if habits.is_empty() {
            return "No habits yet. Add one with `habitual add <name>`.\n".to_string();
        }

        let mut out = String::new();
        for habit in habits {
            let description = habit
                .description
                .as_ref()
                .map(|description| format!(" - {}", description.as_str()))
                .unwrap_or_default();
            out.push_str(&format!(
                "• {}{}  [{}] since {}\n",
                habit.name,
                description,
                habit.id,
                habit.created_on()
            ));
        }
        out
    }

    pub fn day_label(day: DateKey, today: DateKey) -> String {
        match day.days_until(today) {
            0 => "Today".to_string(),
            1 => "Yesterday".to_string(),
            _ => day.as_naive().format("%a %d").to_string(),
        }
    }

    pub fn render_board(&self, board: &DayBoard, today: DateKey) -> String {
        let name_width = board
            .rows
            .iter()
            .map(|row| row.habit.name.as_str().chars().count())
            .max()
            .unwrap_or(0)
            .max(5);

        let mut out = format!("{:name_width$}", "Habit");
        for day in &board.days {
            out.push_str(&format!("  {:>9}", Self::day_label(*day, today)));
        }
        out.push_str("  Streak\n");

        for row in &board.rows {
            out.push_str(&format!("{:name_width$}", row.habit.name.as_str()));
            for done in &row.done {
                out.push_str(&format!("  {:>9}", if *done { "X" } else { "·" }));
            }
            out.push_str(&format!("  {}\n", row.streaks.current));
        }

        if board.rows.is_empty() {
            out.push_str("(no habits)\n");
        }
        out
    }

    pub fn render_report(&self, report: &HabitReport) -> String {
        let mut lines = vec![format!("=== {} ===", report.habit.name)];
        if let Some(description) = &report.habit.description {
            lines.push(description.as_str().to_string());
        }

        lines.push(format!(
            "Streak: {} current, {} longest",
            report.streaks.current, report.streaks.longest
        ));

        let overall = &report.stats.overall;
        lines.push(format!(
            "Overall: {}/{} days ({}%) since {}",
            overall.completed_days, overall.total_days, overall.rate, report.since
        ));

        lines.extend(report.stats.per_month.iter().map(|month| {
            format!(
                "  {} {}  {:>2}/{:<2} {:>3}%  {}",
                month.label,
                month.year,
                month.completed_days,
                month.total_days_in_window,
                month.rate,
                bar(month.rate)
            )
        }));

        lines.push(String::new());
        lines.join("\n")
    }

    pub fn render_reports(&self, reports: &[HabitReport]) -> String {
        if reports.is_empty() {
            return "No habits yet.\n".to_string();
        }
        reports
            .iter()
            .map(|report| self.render_report(report))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_reports_json(&self, reports: &[HabitReport]) -> Result<String> {
        Ok(serde_json::to_string_pretty(reports)?)
    }
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Ten-cell bar for a percentage.
fn bar(rate: u32) -> String {
    let filled = (rate.min(100) / 10) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}
