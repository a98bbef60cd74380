//! Application launcher commands

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info};

use super::{Command, CommandContext, contains_any};
use crate::config::ConfigManager;
use crate::error::CommandError;
use crate::platform::AppLauncher;

const PATTERNS: &[&str] = &["jalankan aplikasi *"];

static APP_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"jalankan aplikasi (.+)").expect("valid regex"));

/// Built-in applications, consulted after the configured shortcuts
const DEFAULT_APPS: &[(&str, &str)] = &[
    ("notepad", "notepad.exe"),
    ("calculator", "calc.exe"),
    ("paint", "mspaint.exe"),
    ("task manager", "taskmgr.exe"),
    ("control panel", "control.exe"),
    ("command prompt", "cmd.exe"),
    ("powershell", "powershell.exe"),
    ("registry editor", "regedit.exe"),
    ("system information", "msinfo32.exe"),
    ("device manager", "devmgmt.msc"),
    ("disk management", "diskmgmt.msc"),
    ("event viewer", "eventvwr.msc"),
    ("services", "services.msc"),
];

/// Common spoken variations of well-known application names
const NAME_VARIATIONS: &[(&str, &str)] = &[
    ("vs code", "code"),
    ("visual studio code", "code"),
    ("vscode", "code"),
    ("chrome", "chrome.exe"),
    ("google chrome", "chrome.exe"),
    ("firefox", "firefox.exe"),
    ("mozilla firefox", "firefox.exe"),
    ("edge", "msedge.exe"),
    ("microsoft edge", "msedge.exe"),
    ("word", "winword.exe"),
    ("microsoft word", "winword.exe"),
    ("excel", "excel.exe"),
    ("microsoft excel", "excel.exe"),
    ("powerpoint", "powerpnt.exe"),
    ("microsoft powerpoint", "powerpnt.exe"),
    ("outlook", "outlook.exe"),
    ("microsoft outlook", "outlook.exe"),
    ("teams", "teams.exe"),
    ("microsoft teams", "teams.exe"),
    ("skype", "skype.exe"),
    ("discord", "discord.exe"),
    ("spotify", "spotify.exe"),
    ("steam", "steam.exe"),
    ("vlc", "vlc.exe"),
    ("media player", "vlc.exe"),
    ("photoshop", "photoshop.exe"),
    ("adobe photoshop", "photoshop.exe"),
    ("illustrator", "illustrator.exe"),
    ("adobe illustrator", "illustrator.exe"),
];

fn lookup(table: &[(&str, &str)], name: &str) -> Option<String> {
    table
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, executable)| executable.to_string())
}

pub struct ApplicationCommand {
    config: Arc<ConfigManager>,
    launcher: Arc<dyn AppLauncher>,
}

impl ApplicationCommand {
    pub fn new(config: Arc<ConfigManager>, launcher: Arc<dyn AppLauncher>) -> Self {
        Self { config, launcher }
    }

    /// Resolve a spoken application name to an executable invocation.
    ///
    /// Order: configured shortcuts, built-in apps, name variations, then
    /// `<name><EXE_SUFFIX>`.
    pub fn resolve_executable(&self, app_name: &str) -> Result<String, CommandError> {
        let name = app_name.trim().to_lowercase();

        if let Some(executable) = self.config.get_application_command(&name)? {
            return Ok(executable);
        }

        Ok(lookup(DEFAULT_APPS, &name)
            .or_else(|| lookup(NAME_VARIATIONS, &name))
            .unwrap_or_else(|| format!("{}{}", name, std::env::consts::EXE_SUFFIX)))
    }

    /// Add or replace a persisted application shortcut
    pub fn add_application_shortcut(&self, name: &str, executable: &str) -> Result<(), CommandError> {
        self.config
            .add_application_shortcut(name, executable)
            .map_err(|e| {
                error!("Failed to add application shortcut: {}", e);
                CommandError::ApplicationLaunch(format!("Failed to add application shortcut: {}", e))
            })
    }

    /// Remove a persisted application shortcut. Unknown names are an error.
    pub fn remove_application_shortcut(&self, name: &str) -> Result<(), CommandError> {
        match self.config.remove_application_shortcut(name) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CommandError::ApplicationLaunch(format!(
                "Application shortcut not found: {}",
                name
            ))),
            Err(e) => {
                error!("Failed to remove application shortcut: {}", e);
                Err(CommandError::ApplicationLaunch(format!(
                    "Failed to remove application shortcut: {}",
                    e
                )))
            }
        }
    }

    /// Configured shortcuts merged with the built-in apps (built-ins win)
    pub fn list_application_shortcuts(&self) -> Result<BTreeMap<String, String>, CommandError> {
        let mut shortcuts = self
            .config
            .with_config(|config| config.application_shortcuts.clone())?;
        shortcuts.extend(
            DEFAULT_APPS
                .iter()
                .map(|(name, executable)| (name.to_string(), executable.to_string())),
        );
        Ok(shortcuts)
    }

    async fn launch_application(&self, app_name: &str) -> Result<String, CommandError> {
        let executable = self.resolve_executable(app_name)?;
        info!("Launching application: {}", executable);

        self.launcher.launch(&executable).await.map_err(|e| match e {
            CommandError::ApplicationLaunch(_) => e,
            other => CommandError::ApplicationLaunch(format!(
                "Failed to launch application '{}': {}",
                app_name, other
            )),
        })?;

        Ok(format!("Launched application: {}", app_name))
    }
}

#[async_trait]
impl Command for ApplicationCommand {
    fn name(&self) -> &str {
        "ApplicationCommand"
    }

    fn patterns(&self) -> Vec<String> {
        PATTERNS.iter().map(|p| p.to_string()).collect()
    }

    fn description(&self) -> &str {
        "Launch desktop applications by name"
    }

    fn can_handle(&self, command: &str) -> bool {
        contains_any(command, &["jalankan aplikasi"])
    }

    async fn execute(
        &self,
        command: &str,
        _context: Option<&CommandContext>,
    ) -> Result<String, CommandError> {
        let command = command.to_lowercase();
        let app_name = APP_NAME
            .captures(&command)
            .map(|c| c[1].trim().to_string())
            .ok_or_else(|| {
                CommandError::ApplicationLaunch(
                    "Could not extract application name from command".to_string(),
                )
            })?;
        if app_name.is_empty() {
            return Err(CommandError::ApplicationLaunch(
                "No application name provided".to_string(),
            ));
        }

        self.launch_application(&app_name).await
    }
}
