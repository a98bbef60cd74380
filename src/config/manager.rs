//! Configuration manager - the single owner of the configuration aggregate

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use super::{Config, LogLevel, Settings, SmartDevice};
use crate::error::ConfigError;

/// Lazily loads, caches, validates, and persists the configuration.
///
/// Shared between handlers as `Arc<ConfigManager>`. All mutation goes through
/// methods that hold the write lock for the whole mutate-and-save sequence,
/// so concurrent command tasks cannot interleave partial updates.
pub struct ConfigManager {
    path: PathBuf,
    config: RwLock<Option<Config>>,
}

impl ConfigManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: RwLock::new(None),
        }
    }

    /// Create a manager that already holds a configuration (nothing is read from disk)
    pub fn from_config(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config: RwLock::new(Some(config)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.read().is_some()
    }

    /// Load configuration from the file, replacing any cached copy.
    ///
    /// If the file does not exist, the default configuration is created and
    /// written to disk.
    pub fn load(&self) -> Result<(), ConfigError> {
        let mut guard = self.write();
        *guard = Some(self.read_or_bootstrap()?);
        Ok(())
    }

    /// Save the current configuration to the file
    pub fn save(&self) -> Result<(), ConfigError> {
        let guard = self.read();
        let config = guard.as_ref().ok_or(ConfigError::NotLoaded)?;
        config.save_to_file(&self.path)?;
        debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }

    /// Re-run every field invariant against the loaded configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.with_config(|config| config.validate())?
    }

    /// Clone of the current configuration
    pub fn snapshot(&self) -> Result<Config, ConfigError> {
        self.with_config(Config::clone)
    }

    pub fn settings(&self) -> Result<Settings, ConfigError> {
        self.with_config(|config| config.settings.clone())
    }

    pub fn devices(&self) -> Result<Vec<SmartDevice>, ConfigError> {
        self.with_config(|config| config.smart_devices.clone())
    }

    pub fn get_device_by_name(&self, name: &str) -> Result<Option<SmartDevice>, ConfigError> {
        self.with_config(|config| config.get_device_by_name(name).cloned())
    }

    pub fn get_application_command(&self, name: &str) -> Result<Option<String>, ConfigError> {
        self.with_config(|config| config.get_application_command(name).map(str::to_string))
    }

    /// Add or replace an application shortcut and persist it
    pub fn add_application_shortcut(&self, name: &str, command: &str) -> Result<(), ConfigError> {
        self.update(|config| config.set_application_shortcut(name, command))?;
        info!("Added application shortcut: {} -> {}", name, command);
        Ok(())
    }

    /// Remove an application shortcut and persist the change.
    ///
    /// Returns `false` (and writes nothing) if the shortcut did not exist.
    pub fn remove_application_shortcut(&self, name: &str) -> Result<bool, ConfigError> {
        let mut guard = self.loaded_write()?;
        let Some(config) = guard.as_mut() else {
            return Err(ConfigError::NotLoaded);
        };
        if config.remove_application_shortcut(name).is_none() {
            return Ok(false);
        }
        config.save_to_file(&self.path)?;
        info!("Removed application shortcut: {}", name);
        Ok(true)
    }

    /// Change the persisted log level
    pub fn set_log_level(&self, level: LogLevel) -> Result<(), ConfigError> {
        self.update(|config| config.settings.log_level = level)
    }

    /// Apply a mutation and save while holding the write lock.
    ///
    /// If saving fails the in-memory change is rolled back.
    pub fn update<R>(&self, f: impl FnOnce(&mut Config) -> R) -> Result<R, ConfigError> {
        let mut guard = self.loaded_write()?;
        let Some(config) = guard.as_mut() else {
            return Err(ConfigError::NotLoaded);
        };

        let previous = config.clone();
        let result = f(config);
        if let Err(e) = config.validate().and_then(|_| config.save_to_file(&self.path)) {
            *config = previous;
            return Err(e);
        }
        Ok(result)
    }

    /// Run `f` against the configuration, loading it first if needed
    pub fn with_config<R>(&self, f: impl FnOnce(&Config) -> R) -> Result<R, ConfigError> {
        {
            let guard = self.read();
            if let Some(config) = guard.as_ref() {
                return Ok(f(config));
            }
        }

        let guard = self.loaded_write()?;
        match guard.as_ref() {
            Some(config) => Ok(f(config)),
            None => Err(ConfigError::NotLoaded),
        }
    }

    /// Write guard with the configuration guaranteed to be loaded
    fn loaded_write(&self) -> Result<RwLockWriteGuard<'_, Option<Config>>, ConfigError> {
        let mut guard = self.write();
        // Another task may have loaded it while we waited for the lock
        if guard.is_none() {
            *guard = Some(self.read_or_bootstrap()?);
        }
        Ok(guard)
    }

    fn read_or_bootstrap(&self) -> Result<Config, ConfigError> {
        if self.path.exists() {
            let config = Config::from_file(&self.path)?;
            info!("Loaded configuration from {}", self.path.display());
            Ok(config)
        } else {
            let config = Config::with_defaults();
            config.save_to_file(&self.path)?;
            info!(
                "Configuration file not found, created default at {}",
                self.path.display()
            );
            Ok(config)
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Config>> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Config>> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }
}
