//! Side-effect executors used by the command handlers
//!
//! Handlers decide *what* to do; the traits here decide *how* it happens on
//! the host. Each trait has a system implementation that shells out to the
//! platform's own tools, and tests substitute recording fakes.

mod browser;
mod launcher;
mod power;
mod screen;
mod tuya;

pub use browser::SystemBrowser;
pub use launcher::ShellLauncher;
pub use power::SystemPower;
pub use screen::SystemScreenCapture;
pub use tuya::TuyaController;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::SmartDevice;
use crate::error::CommandError;

/// Opens URLs in the user's default browser
#[async_trait]
pub trait Browser: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), CommandError>;
}

/// Starts desktop applications from an executable invocation string
#[async_trait]
pub trait AppLauncher: Send + Sync {
    async fn launch(&self, executable: &str) -> Result<(), CommandError>;
}

/// Machine power and session control
#[async_trait]
pub trait PowerControl: Send + Sync {
    /// Shut the machine down immediately
    async fn shutdown(&self) -> Result<(), CommandError>;

    /// Ask user applications to terminate, returning how many were signalled
    async fn close_user_applications(&self) -> Result<usize, CommandError>;
}

/// Writes a full-screen capture to a PNG file
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self, path: &Path) -> Result<(), CommandError>;
}

/// Local-network smart device protocol
#[async_trait]
pub trait DeviceController: Send + Sync {
    async fn set_power(&self, device: &SmartDevice, on: bool) -> Result<(), CommandError>;

    /// Raw device status as reported by the device
    async fn status(&self, device: &SmartDevice) -> Result<serde_json::Value, CommandError>;

    /// Listen for device announcements on the local network for `scan`
    async fn discover(&self, _scan: Duration) -> Result<Vec<DiscoveredDevice>, CommandError> {
        Err(CommandError::DeviceConnection(
            "device discovery is not supported by this backend".to_string(),
        ))
    }
}

/// A device that announced itself on the local network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub device_id: String,
    pub ip_address: String,
    pub product_key: String,
    pub version: String,
}
