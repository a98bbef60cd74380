//! Wiring: configuration, platform backends, handlers, and the assistant

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::assistant::VoiceAssistant;
use crate::commands::{
    ApplicationCommand, BrowserCommand, CommandRegistry, ShutdownTimer, SmartDeviceCommand,
    SystemControlCommand, UtilityCommand,
};
use crate::config::ConfigManager;
use crate::error::{AssistantError, ConfigError};
use crate::platform::{
    AppLauncher, Browser, DeviceController, PowerControl, ScreenCapture, ShellLauncher,
    SystemBrowser, SystemPower, SystemScreenCapture, TuyaController,
};
use crate::speech::{SpeechRecognizer, WhisperRecognizer, default_model_path};

/// Side-effect executors handed to the command handlers
#[derive(Clone)]
pub struct Backends {
    pub browser: Arc<dyn Browser>,
    pub launcher: Arc<dyn AppLauncher>,
    pub power: Arc<dyn PowerControl>,
    pub screen: Arc<dyn ScreenCapture>,
    /// `None` disables the smart device handler
    pub devices: Option<Arc<dyn DeviceController>>,
}

impl Backends {
    /// The host's own tools
    pub fn system() -> Self {
        Self {
            browser: Arc::new(SystemBrowser),
            launcher: Arc::new(ShellLauncher::default()),
            power: Arc::new(SystemPower),
            screen: Arc::new(SystemScreenCapture),
            devices: Some(Arc::new(TuyaController::default())),
        }
    }

    pub fn with_devices(mut self, devices: Arc<dyn DeviceController>) -> Self {
        self.devices = Some(devices);
        self
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self::system()
    }
}

pub struct AssistantFactory {
    config: Arc<ConfigManager>,
    backends: Backends,
    /// Shared by every registry this factory builds
    shutdown_timer: Arc<ShutdownTimer>,
}

impl AssistantFactory {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        let backends = Backends::system();
        Self {
            config: Arc::new(ConfigManager::new(config_path)),
            shutdown_timer: Arc::new(ShutdownTimer::new(backends.power.clone())),
            backends,
        }
    }

    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.shutdown_timer = Arc::new(ShutdownTimer::new(backends.power.clone()));
        self.backends = backends;
        self
    }

    /// Deferred shutdown scheduled by "timer N menit matikan komputer"
    pub fn shutdown_timer(&self) -> &Arc<ShutdownTimer> {
        &self.shutdown_timer
    }

    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Registry with every handler registered in priority order.
    ///
    /// The order is part of the dispatch contract: system control, browser,
    /// application launcher, smart device, utility.
    pub fn command_registry(&self) -> Result<CommandRegistry, ConfigError> {
        let wake_word = self.config.settings()?.wake_word;
        let mut registry = CommandRegistry::new(&wake_word)?;

        let backends = &self.backends;
        registry.register(Arc::new(SystemControlCommand::with_timer(
            backends.power.clone(),
            self.shutdown_timer.clone(),
        )));
        registry.register(Arc::new(BrowserCommand::new(backends.browser.clone())));
        registry.register(Arc::new(ApplicationCommand::new(
            self.config.clone(),
            backends.launcher.clone(),
        )));
        registry.register(Arc::new(SmartDeviceCommand::new(
            self.config.clone(),
            backends.devices.clone(),
        )));
        registry.register(Arc::new(UtilityCommand::new(
            self.config.clone(),
            backends.screen.clone(),
        )));

        info!(
            "Command registry created with {} handlers (wake word '{}')",
            registry.len(),
            registry.wake_word()
        );
        Ok(registry)
    }

    /// Microphone recognizer using the default whisper model location
    pub fn whisper_recognizer(&self) -> WhisperRecognizer {
        WhisperRecognizer::new(self.config.clone(), default_model_path())
    }

    pub fn create_assistant(
        &self,
        speech: Arc<dyn SpeechRecognizer>,
    ) -> Result<VoiceAssistant, AssistantError> {
        let registry = self.command_registry().inspect_err(|e| {
            error!("Failed to create command registry: {}", e);
        })?;
        let assistant = VoiceAssistant::new(self.config.clone(), speech, registry);
        info!("Voice Assistant created successfully");
        Ok(assistant)
    }

    /// Load (bootstrapping if missing) and validate the configuration
    pub fn validate_configuration(&self) -> Result<(), ConfigError> {
        self.config.validate().inspect_err(|e| {
            error!("Configuration validation failed: {}", e);
        })
    }
}
