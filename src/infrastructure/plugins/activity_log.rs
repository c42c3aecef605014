use crate::infrastructure::{MutationEvent, MutationHook};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Appends one line per acknowledged write to a plain-text activity log.
pub struct ActivityLogHook {
    log_path: PathBuf,
}

impl ActivityLogHook {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }
}

impl MutationHook for ActivityLogHook {
    fn on_mutation(&self, event: &MutationEvent) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open {}", self.log_path.display()))?;

        writeln!(
            file,
            "[{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            event
        )?;

        Ok(())
    }

    fn name(&self) -> &str {
        "Activity Log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HabitId;
    use tempfile::TempDir;

    #[test]
    fn appends_a_line_per_event() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("logs").join("activity.log");
        let hook = ActivityLogHook::new(log_path.clone());

        for id in ["h1", "h2"] {
            hook.on_mutation(&MutationEvent::HabitCreated {
                habit_id: HabitId(id.into()),
            })
            .unwrap();
        }

        let content = std::fs::read_to_string(log_path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("habit h1 created"));
        assert!(lines[1].ends_with("habit h2 created"));
    }
}
