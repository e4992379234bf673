//! Raidcall configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RaidcallError, Result};
use crate::event::RoleSlot;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidcallConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// IANA zone used to resolve wall-clock input.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Process-wide reminder lead in minutes.
    #[serde(default = "default_reminder_minutes")]
    pub reminder_minutes: u32,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Global gate for creating external calendar entries.
    #[serde(default)]
    pub enable_external_events: bool,
    #[serde(default = "default_roles")]
    pub default_roles: Vec<RoleConfig>,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

fn default_data_dir() -> String { "~/.raidcall/data".into() }
fn default_timezone() -> String { "UTC".into() }
fn default_reminder_minutes() -> u32 { 15 }
fn default_tick_interval() -> u64 { 60 }

fn default_roles() -> Vec<RoleConfig> {
    vec![
        RoleConfig { name: "Tank".into(), emoji: "🛡️".into(), limit: 2 },
        RoleConfig { name: "DPS".into(), emoji: "⚔️".into(), limit: 6 },
        RoleConfig { name: "Healer".into(), emoji: "💚".into(), limit: 2 },
    ]
}

impl Default for RaidcallConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            timezone: default_timezone(),
            reminder_minutes: default_reminder_minutes(),
            tick_interval_secs: default_tick_interval(),
            enable_external_events: false,
            default_roles: default_roles(),
            dispatch: DispatchConfig::default(),
        }
    }
}

/// A role applied to events created without a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub limit: u32,
}

impl From<&RoleConfig> for RoleSlot {
    fn from(role: &RoleConfig) -> Self {
        RoleSlot {
            name: role.name.clone(),
            emoji: role.emoji.clone(),
            limit: role.limit,
            classes: Vec::new(),
        }
    }
}

/// Where scheduler intents are delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// POST intents here as JSON. None = log only.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl RaidcallConfig {
    /// Load config from the default path (~/.raidcall/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RaidcallError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RaidcallError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply `RAIDCALL_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("RAIDCALL_DATA_DIR").filter(|v| !v.is_empty()) {
            self.data_dir = dir;
        }
        if let Some(tz) = lookup("RAIDCALL_TIMEZONE").filter(|v| !v.is_empty()) {
            self.timezone = tz;
        }
        if let Some(raw) = lookup("RAIDCALL_REMINDER_MINUTES") {
            match raw.trim().parse() {
                Ok(minutes) => self.reminder_minutes = minutes,
                Err(e) => tracing::warn!("⚠️ Ignoring RAIDCALL_REMINDER_MINUTES={raw}: {e}"),
            }
        }
        if let Some(raw) = lookup("RAIDCALL_DEFAULT_ROLES") {
            match serde_json::from_str::<Vec<RoleConfig>>(&raw) {
                Ok(roles) => self.default_roles = roles,
                Err(e) => tracing::warn!("⚠️ Ignoring malformed RAIDCALL_DEFAULT_ROLES: {e}"),
            }
        }
        if let Some(url) = lookup("RAIDCALL_WEBHOOK_URL").filter(|v| !v.is_empty()) {
            self.dispatch.webhook_url = Some(url);
        }
    }

    /// Resolve the configured timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse()
            .map_err(|_| RaidcallError::Config(format!("Unknown timezone: {}", self.timezone)))
    }

    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }

    pub fn events_dir(&self) -> PathBuf {
        self.data_path().join("events")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.data_path().join("templates")
    }

    /// Default roles as event role slots.
    pub fn default_role_slots(&self) -> Vec<RoleSlot> {
        self.default_roles.iter().map(RoleSlot::from).collect()
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Raidcall home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".raidcall")
    }
}
