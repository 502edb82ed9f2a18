//! Application settings loaded from `config.toml`.
//!
//! Every field has a built-in default, so a missing file or a partial file is fine.
//! `HISABKITAB_CONFIG` points at an alternate file and `DATABASE_URL` overrides the
//! database location from either source.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const DEFAULT_DATABASE_URL: &str = "sqlite://data/hisabkitab.sqlite?mode=rwc";

/// Top-level settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// SeaORM connection string
    pub database_url: String,
    /// Symbol prefixed to formatted amounts
    pub currency_symbol: String,
    /// Categories seeded for every user at startup
    pub default_categories: Vec<DefaultCategory>,
    /// Dashboard tuning
    pub dashboard: DashboardConfig,
}

/// A category shared by all users
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DefaultCategory {
    /// Display name, also the join key on expenses
    pub name: String,
    /// `#rrggbb` color
    pub color: String,
}

/// Dashboard settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DashboardConfig {
    /// How many expenses the recent list shows
    pub recent_limit: usize,
    /// How many months the spending trend covers
    pub trend_months: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            currency_symbol: "₹".to_string(),
            default_categories: builtin_default_categories(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            recent_limit: 5,
            trend_months: 6,
        }
    }
}

/// The twelve categories every installation starts with.
#[must_use]
pub fn builtin_default_categories() -> Vec<DefaultCategory> {
    [
        ("Food & Dining", "#ef4444"),
        ("Groceries", "#f97316"),
        ("Transportation", "#f59e0b"),
        ("Shopping", "#eab308"),
        ("Entertainment", "#84cc16"),
        ("Bills & Utilities", "#22c55e"),
        ("Healthcare", "#10b981"),
        ("Education", "#14b8a6"),
        ("Travel", "#06b6d4"),
        ("Personal Care", "#0ea5e9"),
        ("Fitness", "#3b82f6"),
        ("Gifts", "#6366f1"),
    ]
    .into_iter()
    .map(|(name, color)| DefaultCategory {
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}

/// Parses settings from TOML text.
///
/// # Errors
/// Returns `Error::Config` if the TOML is malformed or has wrongly typed fields.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config: {e}"),
    })
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns `Error::Config` if the file cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading configuration");

    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;
    parse_config(&contents)
}

/// Loads settings the way the binary does.
///
/// Reads `HISABKITAB_CONFIG` (or `./config.toml`), falls back to built-in defaults when
/// that file does not exist, then applies the `DATABASE_URL` override.
///
/// # Errors
/// Returns `Error::Config` if a settings file exists but is invalid.
pub fn load_app_config() -> Result<AppConfig> {
    let path = std::env::var("HISABKITAB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    let mut config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        info!(path, "No config file found, using built-in defaults");
        AppConfig::default()
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }
    config.validate()?;

    Ok(config)
}

impl AppConfig {
    /// Rejects settings the rest of the crate cannot work with.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config {
                message: "database_url must not be empty".to_string(),
            });
        }
        if self.dashboard.trend_months == 0 {
            return Err(Error::Config {
                message: "dashboard.trend_months must be at least 1".to_string(),
            });
        }
        if let Some(bad) = self
            .default_categories
            .iter()
            .find(|c| c.name.trim().is_empty())
        {
            return Err(Error::Config {
                message: format!("default category with color {} has no name", bad.color),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r##"
            database_url = "sqlite::memory:"
            currency_symbol = "$"

            [[default_categories]]
            name = "Rent"
            color = "#123456"

            [[default_categories]]
            name = "Coffee"
            color = "#abcdef"

            [dashboard]
            recent_limit = 10
            trend_months = 12
        "##;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.currency_symbol, "$");
        assert_eq!(config.default_categories.len(), 2);
        assert_eq!(config.default_categories[1].name, "Coffee");
        assert_eq!(config.dashboard.recent_limit, 10);
        assert_eq!(config.dashboard.trend_months, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = parse_config("currency_symbol = \"€\"").unwrap();

        assert_eq!(config.currency_symbol, "€");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.default_categories, builtin_default_categories());
        assert_eq!(config.dashboard, DashboardConfig::default());
    }

    #[test]
    fn test_builtin_defaults() {
        let defaults = builtin_default_categories();
        assert_eq!(defaults.len(), 12);
        assert!(defaults.iter().any(|c| c.name == "Travel"));
        assert!(defaults.iter().all(|c| c.color.len() == 7));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            parse_config("dashboard = 3"),
            Err(Error::Config { .. })
        ));

        let config = parse_config("[dashboard]\ntrend_months = 0").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
