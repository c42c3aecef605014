use crate::domain::{DEFAULT_MONTHS_BACK, OwnerId};
use log::warn;
use std::path::PathBuf;

pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub activity_log: PathBuf,
    pub owner: OwnerId,
    pub months_back: u32,
    pub theme: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("HABITS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("habitual")
            });

        let owner = std::env::var("HABITS_USER")
            .or_else(|_| std::env::var("USER"))
            .ok()
            .filter(|user| !user.trim().is_empty())
            .unwrap_or_else(|| "local".to_string());

        let months_back = match std::env::var("HABITS_MONTHS") {
            Ok(raw) => parse_months(&raw).unwrap_or_else(|| {
                warn!("ignoring HABITS_MONTHS={raw:?}, using {DEFAULT_MONTHS_BACK}");
                DEFAULT_MONTHS_BACK
            }),
            Err(_) => DEFAULT_MONTHS_BACK,
        };

        let theme = std::env::var("HABITS_THEME").ok();

        Self::in_dir(data_dir, OwnerId::new(owner), months_back, theme)
    }

    pub fn in_dir(
        data_dir: PathBuf,
        owner: OwnerId,
        months_back: u32,
        theme: Option<String>,
    ) -> Self {
        Self {
            db_path: data_dir.join("habits.db"),
            activity_log: data_dir.join("activity.log"),
            data_dir,
            owner,
            months_back,
            theme,
        }
    }
}

fn parse_months(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|&months| months > 0)
}
