//! Configuration loading and management
//!
//! The configuration aggregate holds three sections:
//! - `smart_devices`: ordered device records (first match wins on lookup)
//! - `settings`: timeouts, language, log level, screenshot folder, wake word
//! - `application_shortcuts`: spoken application name -> executable invocation

mod device;
mod io;
mod manager;
mod settings;

pub use device::SmartDevice;
pub use io::ConfigFormat;
pub use manager::ConfigManager;
pub use settings::{LogLevel, Settings};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/devices.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Smart devices in declaration order
    #[serde(default)]
    pub smart_devices: Vec<SmartDevice>,

    /// General settings
    #[serde(default)]
    pub settings: Settings,

    /// Application shortcuts (keys are lowercase)
    #[serde(default)]
    pub application_shortcuts: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            smart_devices: Vec::new(),
            settings: Settings::default(),
            application_shortcuts: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Create the configuration written on first run
    pub fn with_defaults() -> Self {
        let smart_devices = vec![
            SmartDevice {
                name: "Smart Plug 1".to_string(),
                device_id: "your_device_id_here".to_string(),
                ip_address: "192.168.1.100".to_string(),
                local_key: "your_local_key_here".to_string(),
                device_type: "outlet".to_string(),
            },
            SmartDevice {
                name: "Smart Lamp".to_string(),
                device_id: "another_device_id_here".to_string(),
                ip_address: "192.168.1.101".to_string(),
                local_key: "another_local_key_here".to_string(),
                device_type: "light".to_string(),
            },
        ];

        let application_shortcuts = [
            ("vs code", "code"),
            ("visual studio code", "code"),
            ("notepad", "notepad.exe"),
            ("calculator", "calc.exe"),
            ("paint", "mspaint.exe"),
            ("chrome", "chrome.exe"),
            ("firefox", "firefox.exe"),
            ("edge", "msedge.exe"),
        ]
        .into_iter()
        .map(|(name, exe)| (name.to_string(), exe.to_string()))
        .collect();

        Self {
            smart_devices,
            settings: Settings::default(),
            application_shortcuts,
        }
    }

    /// Validate every device record and the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        for device in &self.smart_devices {
            device.validate()?;
        }
        self.settings.validate()
    }

    /// Lowercase all shortcut keys. On collisions the entry that sorts last wins.
    pub(crate) fn normalize(&mut self) {
        if self
            .application_shortcuts
            .keys()
            .all(|k| *k == k.to_lowercase())
        {
            return;
        }
        let shortcuts = std::mem::take(&mut self.application_shortcuts);
        for (name, command) in shortcuts {
            self.application_shortcuts.insert(name.to_lowercase(), command);
        }
    }

    /// First device whose name matches (case-insensitive), in declaration order
    pub fn get_device_by_name(&self, name: &str) -> Option<&SmartDevice> {
        self.smart_devices.iter().find(|d| d.is_named(name))
    }

    /// Case-insensitive application shortcut lookup
    pub fn get_application_command(&self, name: &str) -> Option<&str> {
        self.application_shortcuts
            .get(&name.to_lowercase())
            .map(|s| s.as_str())
    }

    /// Insert or replace a shortcut (last write wins)
    pub fn set_application_shortcut(&mut self, name: &str, command: impl Into<String>) {
        self.application_shortcuts
            .insert(name.to_lowercase(), command.into());
    }

    /// Remove a shortcut, returning its previous command if it existed
    pub fn remove_application_shortcut(&mut self, name: &str) -> Option<String> {
        self.application_shortcuts.remove(&name.to_lowercase())
    }
}
