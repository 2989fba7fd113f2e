use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{AppError, Result};
use crate::models::Show;

const APP_DIR: &str = "talkshow-tracker";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Minimum similarity (0..=1) for a fuzzy guest-name match to be accepted.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    #[serde(default = "default_extractor_timeout")]
    pub extractor_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_shows")]
    pub max_concurrent_shows: usize,

    #[serde(default = "default_max_browser_sessions")]
    pub max_browser_sessions: usize,

    #[serde(default = "default_schedule_interval")]
    pub schedule_interval_minutes: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_shows")]
    pub shows: Vec<Show>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("talkshows.db").to_string_lossy().to_string()
}

fn default_fuzzy_threshold() -> f64 {
    0.88
}

fn default_extractor_timeout() -> u64 {
    60
}

fn default_max_concurrent_shows() -> usize {
    4
}

fn default_max_browser_sessions() -> usize {
    2
}

fn default_schedule_interval() -> u32 {
    360
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string()
}

fn default_shows() -> Vec<Show> {
    vec![
        Show::new(
            "lanz",
            "Markus Lanz",
            "https://www.zdf.de/talk/markus-lanz-114?page={page}",
        )
        .with_max_pages(2),
        Show::new(
            "hart-aber-fair",
            "Hart aber fair",
            "https://www1.wdr.de/daserste/hartaberfair/sendungen/index.html",
        ),
        Show::new(
            "phoenix-runde",
            "Phoenix Runde",
            "https://www.phoenix.de/sendungen/gespraeche/phoenix-runde.html",
        ),
        Show::new(
            "maischberger",
            "maischberger",
            "https://www.daserste.de/information/talk/maischberger/sendung/index.html",
        ),
        Show::new(
            "illner",
            "Maybrit Illner",
            "https://www.zdf.de/politik/maybrit-illner",
        ),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            fuzzy_threshold: default_fuzzy_threshold(),
            extractor_timeout_secs: default_extractor_timeout(),
            max_concurrent_shows: default_max_concurrent_shows(),
            max_browser_sessions: default_max_browser_sessions(),
            schedule_interval_minutes: default_schedule_interval(),
            user_agent: default_user_agent(),
            shows: default_shows(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fuzzy_threshold > 0.0 && self.fuzzy_threshold <= 1.0) {
            return Err(AppError::Config(format!(
                "fuzzy_threshold must be in (0, 1], got {}",
                self.fuzzy_threshold
            )));
        }
        if self.extractor_timeout_secs == 0 {
            return Err(AppError::Config(
                "extractor_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_concurrent_shows == 0 || self.max_browser_sessions == 0 {
            return Err(AppError::Config(
                "concurrency limits must be positive".to_string(),
            ));
        }
        if self.schedule_interval_minutes == 0 {
            return Err(AppError::Config(
                "schedule_interval_minutes must be positive".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for show in &self.shows {
            if !ids.insert(show.id.as_str()) {
                return Err(AppError::Config(format!("duplicate show id {}", show.id)));
            }
            for url in show.listing_urls() {
                Url::parse(&url).map_err(|e| {
                    AppError::Config(format!(
                        "invalid listing url for {}: {} ({})",
                        show.id, url, e
                    ))
                })?;
            }
        }
        Ok(())
    }

    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_secs(self.extractor_timeout_secs)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.schedule_interval_minutes) * 60)
    }
}
