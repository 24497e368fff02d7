//! Configuration management with layered hierarchy

use chrono::Duration;
use serde::Deserialize;
use std::path::PathBuf;

use crate::core::Project;
use crate::engine::schedule::Cadence;

const DEFAULT_WINDOW_DAYS: u32 = 30;

/// HACCP configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default author for new records
    pub author: Option<String>,

    /// Default output format
    pub default_format: Option<String>,

    /// Trailing window for out-of-spec counts
    pub out_of_spec_window_days: Option<u32>,

    /// Verification cadence proposed for new CCPs
    pub default_verification_cadence: Option<Cadence>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let mut config = Config::default();

        // 1. Global user config (~/.config/haccp/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            config.merge_file(&global_path);
        }

        // 2. Project config (.haccp/config.yaml)
        if let Ok(project) = Project::discover() {
            config.merge_file(&project.config_dir().join("config.yaml"));
        }

        // 3. Environment variables
        config.merge_env();

        config
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "haccp")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn merge_file(&mut self, path: &std::path::Path) {
        if !path.exists() {
            return;
        }
        let Ok(contents) = std::fs::read_to_string(path) else {
            return;
        };
        match serde_yml::from_str::<Config>(&contents) {
            Ok(other) => self.merge(other),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config"),
        }
    }

    fn merge_env(&mut self) {
        if let Ok(author) = std::env::var("HACCP_AUTHOR") {
            if !author.trim().is_empty() {
                self.author = Some(author);
            }
        }
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.out_of_spec_window_days.is_some() {
            self.out_of_spec_window_days = other.out_of_spec_window_days;
        }
        if other.default_verification_cadence.is_some() {
            self.default_verification_cadence = other.default_verification_cadence;
        }
    }

    /// Get the author name, falling back to git config or username
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }

        if let Ok(output) = std::process::Command::new("git")
            .args(["config", "user.name"])
            .output()
        {
            if output.status.success() {
                let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Trailing window for the dashboard's out-of-spec count
    pub fn out_of_spec_window(&self) -> Duration {
        Duration::days(i64::from(
            self.out_of_spec_window_days.unwrap_or(DEFAULT_WINDOW_DAYS),
        ))
    }

    /// Cadence used when a new CCP does not name one
    pub fn verification_cadence(&self) -> Cadence {
        self.default_verification_cadence.unwrap_or_default()
    }
}
