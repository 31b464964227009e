use crate::domain::models::TextProcessingOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "GlassesTextSync";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "glasses_text_sync".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Connection timing knobs.
///
/// The grace delays give the vendor stack time to settle after a teardown.
/// They were tuned empirically; adjust per vendor stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTimings {
    #[serde(default = "default_grace_ms")]
    pub grace_delay_ms: u64,
    #[serde(default = "default_linked_grace_ms")]
    pub linked_grace_delay_ms: u64,
    #[serde(default = "default_reconnect_grace_ms")]
    pub reconnect_grace_delay_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_linked_timeout_ms")]
    pub linked_timeout_ms: u64,
}

impl Default for ConnectionTimings {
    fn default() -> Self {
        Self {
            grace_delay_ms: default_grace_ms(),
            linked_grace_delay_ms: default_linked_grace_ms(),
            reconnect_grace_delay_ms: default_reconnect_grace_ms(),
            timeout_ms: default_timeout_ms(),
            linked_timeout_ms: default_linked_timeout_ms(),
        }
    }
}

impl ConnectionTimings {
    pub fn grace_delay(&self, system_linked: bool) -> Duration {
        Duration::from_millis(if system_linked {
            self.linked_grace_delay_ms
        } else {
            self.grace_delay_ms
        })
    }

    pub fn timeout(&self, system_linked: bool) -> Duration {
        Duration::from_millis(if system_linked {
            self.linked_timeout_ms
        } else {
            self.timeout_ms
        })
    }

    pub fn reconnect_grace_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_grace_delay_ms)
    }
}

fn default_grace_ms() -> u64 {
    300
}
fn default_linked_grace_ms() -> u64 {
    1500
}
fn default_reconnect_grace_ms() -> u64 {
    300
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_linked_timeout_ms() -> u64 {
    20_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    /// How long an open request may stay unconfirmed before it is reissued.
    #[serde(default = "default_open_confirm_ms")]
    pub open_confirm_timeout_ms: u64,
    /// Peer closures this soon after a local open are treated as transient.
    #[serde(default = "default_external_close_grace_ms")]
    pub external_close_grace_ms: u64,
    #[serde(default = "default_text_size")]
    pub text_size_sp: f32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_text_length: default_max_text_length(),
            open_confirm_timeout_ms: default_open_confirm_ms(),
            external_close_grace_ms: default_external_close_grace_ms(),
            text_size_sp: default_text_size(),
        }
    }
}

fn default_max_text_length() -> usize {
    1000
}
fn default_open_confirm_ms() -> u64 {
    3000
}
fn default_external_close_grace_ms() -> u64 {
    2000
}
fn default_text_size() -> f32 {
    16.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub display_enabled: bool,

    #[serde(default)]
    pub processing: TextProcessingOptions,

    #[serde(default)]
    pub display: DisplaySettings,

    #[serde(default)]
    pub connection: ConnectionTimings,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::config_dir()?.join("settings.json");
        Ok(Self::load(settings_path))
    }

    /// Load from an explicit path, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    /// Directory holding settings and the session record.
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push(APP_DIR);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn set_display_enabled(&mut self, enabled: bool) -> anyhow::Result<()> {
        self.settings.display_enabled = enabled;
        self.save()
    }

    pub fn update_processing(&mut self, options: TextProcessingOptions) -> anyhow::Result<()> {
        self.settings.processing = options;
        self.save()
    }

    pub fn update_text_size(&mut self, sp: f32) -> anyhow::Result<()> {
        self.settings.display.text_size_sp = sp;
        self.save()
    }
}
