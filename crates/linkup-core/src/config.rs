use anyhow::{Context, Result};
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable that overrides `viewer.user_id`.
pub const USER_ID_ENV: &str = "LINKUP_USER_ID";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Local data store settings
    #[serde(default)]
    pub data: DataConfig,

    /// Who is looking at the calendars
    #[serde(default)]
    pub viewer: ViewerConfig,

    /// Calendar grid preferences
    #[serde(default)]
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// SQLite database file. Relative paths resolve against `config_dir`.
    pub database_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            database_path: "linkup.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Id of the signed-in user. Can be set via `LINKUP_USER_ID`.
    pub user_id: Option<String>,

    /// Email of the signed-in user, used to name a freshly created profile.
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// IANA time zone name used to bucket events into days and hours
    pub time_zone: String,

    /// First day of the week in month grids ("sunday", "monday", ...)
    pub week_start: String,

    /// First hourly row of the day grid
    pub day_start_hour: u32,

    /// Last hourly row of the day grid (inclusive)
    pub day_end_hour: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            week_start: "sunday".to_string(),
            day_start_hour: 7,
            day_end_hour: 22,
        }
    }
}

impl CalendarConfig {
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.time_zone.parse::<Tz>().map_err(|_| {
            ConfigError::Invalid(format!("unknown time zone: {}", self.time_zone))
        })
    }

    pub fn week_start(&self) -> Result<Weekday, ConfigError> {
        self.week_start.parse::<Weekday>().map_err(|_| {
            ConfigError::Invalid(format!("unknown weekday: {}", self.week_start))
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkup");

        Self {
            config_dir,
            data: DataConfig::default(),
            viewer: ViewerConfig {
                user_id: std::env::var(USER_ID_ENV).ok(),
                email: None,
            },
            calendar: CalendarConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default config to {}", path.display());
            config
        };

        if let Ok(user_id) = std::env::var(USER_ID_ENV) {
            if !user_id.trim().is_empty() {
                config.viewer.user_id = Some(user_id);
            }
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.data.database_path.trim().is_empty() {
            result.add_error("data.database_path", "Database path cannot be empty");
        }

        match self.viewer.user_id.as_deref() {
            None => result.add_warning(
                "viewer.user_id",
                format!("No viewer configured (set {})", USER_ID_ENV),
            ),
            Some(id) if id.trim().is_empty() => {
                result.add_error("viewer.user_id", "User id cannot be blank")
            }
            Some(_) => {}
        }

        if let Err(e) = self.calendar.time_zone() {
            result.add_error("calendar.time_zone", e.to_string());
        }

        if let Err(e) = self.calendar.week_start() {
            result.add_error("calendar.week_start", e.to_string());
        }

        if self.calendar.day_end_hour > 23 {
            result.add_error("calendar.day_end_hour", "Hour must be between 0 and 23");
        }
        if self.calendar.day_start_hour > self.calendar.day_end_hour {
            result.add_error(
                "calendar.day_start_hour",
                "Day grid must start at or before its last hour",
            );
        }

        result
    }

    /// Resolved path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        let configured = PathBuf::from(&self.data.database_path);
        if configured.is_absolute() {
            configured
        } else {
            self.config_dir.join(configured)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("linkup");

        Ok(config_dir.join("config.toml"))
    }
}
