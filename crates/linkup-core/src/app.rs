use anyhow::{Context, Result};
use chrono::Weekday;
use chrono_tz::Tz;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::Config;

/// Main application state and lifecycle manager.
///
/// Holds the validated configuration and the settings derived from it that
/// the rest of the application needs (viewer, time zone, grid shape).
pub struct App {
    config: Arc<Config>,
    time_zone: Tz,
    week_start: Weekday,
}

impl App {
    /// Create a new application instance from the on-disk configuration
    pub fn new() -> Result<Self> {
        let (config, _) = Config::load_validated()?;
        Self::with_config(config)
    }

    /// Create an application instance from an already-loaded configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let time_zone = config.calendar.time_zone()?;
        let week_start = config.calendar.week_start()?;

        tracing::info!(
            "Application configured (time zone: {}, week starts {})",
            time_zone,
            week_start
        );

        Ok(Self {
            config: Arc::new(config),
            time_zone,
            week_start,
        })
    }

    /// Prepare the filesystem for the data store
    pub fn initialize(&self) -> Result<()> {
        let db_path = self.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        tracing::info!("Application initialized successfully");
        Ok(())
    }

    pub fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down application");
        Ok(())
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The signed-in user.
    pub fn viewer_id(&self) -> Result<&str, ConfigError> {
        self.config
            .viewer
            .user_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingSetting("viewer.user_id".to_string()))
    }

    pub fn viewer_email(&self) -> Option<&str> {
        self.config.viewer.email.as_deref()
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    /// Hours shown as rows in the day grid
    pub fn day_hours(&self) -> RangeInclusive<u32> {
        self.config.calendar.day_start_hour..=self.config.calendar.day_end_hour
    }

    pub fn database_path(&self) -> PathBuf {
        self.config.database_path()
    }
}
