//! Smart device commands

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use super::{Command, CommandContext, contains_any};
use crate::config::{ConfigManager, SmartDevice};
use crate::error::CommandError;
use crate::platform::{DeviceController, DiscoveredDevice};

const TURN_ON: &[&str] = &["nyalakan lampu", "hidupkan lampu"];
const TURN_OFF: &[&str] = &["matikan lampu", "tutup lampu"];

/// Configured device as shown in listings (the local key is omitted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub device_id: String,
    pub ip_address: String,
    pub device_type: String,
}

impl From<&SmartDevice> for DeviceInfo {
    fn from(device: &SmartDevice) -> Self {
        Self {
            name: device.name.clone(),
            device_id: device.device_id.clone(),
            ip_address: device.ip_address.clone(),
            device_type: device.device_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub device_name: String,
    pub device_id: String,
    pub status: serde_json::Value,
}

/// Turns configured smart devices on and off.
///
/// Without a [`DeviceController`] the handler stays registered but declines
/// every command, so lamp phrases fall through to later handlers.
pub struct SmartDeviceCommand {
    config: Arc<ConfigManager>,
    controller: Option<Arc<dyn DeviceController>>,
}

impl SmartDeviceCommand {
    pub fn new(config: Arc<ConfigManager>, controller: Option<Arc<dyn DeviceController>>) -> Self {
        if controller.is_none() {
            warn!("No smart device backend available. Smart device features disabled.");
        }
        Self { config, controller }
    }

    pub fn is_enabled(&self) -> bool {
        self.controller.is_some()
    }

    fn controller(&self) -> Result<&Arc<dyn DeviceController>, CommandError> {
        self.controller.as_ref().ok_or_else(|| {
            CommandError::DeviceConnection("No smart device backend available".to_string())
        })
    }

    /// Named device, or the first configured one when `name` is `None`
    fn device(&self, name: Option<&str>) -> Result<SmartDevice, CommandError> {
        let device = match name {
            Some(name) => self.config.get_device_by_name(name)?,
            None => self.config.devices()?.into_iter().next(),
        };
        device.ok_or_else(|| {
            CommandError::DeviceConnection(
                "No smart devices configured or device not found".to_string(),
            )
        })
    }

    async fn control_device(&self, on: bool, name: Option<&str>) -> Result<String, CommandError> {
        let controller = self.controller()?;
        let device = self.device(name)?;

        controller
            .set_power(&device, on)
            .await
            .map_err(|e| CommandError::DeviceConnection(format!("Failed to control device: {}", e)))?;

        let state = if on { "ON" } else { "OFF" };
        info!("Turned {} device: {}", state, device.name);
        Ok(format!("Turned {} {}", state, device.name))
    }

    /// Query the raw status of a device
    pub async fn device_status(&self, name: Option<&str>) -> Result<DeviceStatus, CommandError> {
        let controller = self.controller()?;
        let device = self.device(name)?;

        let status = controller.status(&device).await.map_err(|e| {
            CommandError::DeviceConnection(format!("Failed to get device status: {}", e))
        })?;
        info!("Retrieved status for device: {}", device.name);

        Ok(DeviceStatus {
            device_name: device.name,
            device_id: device.device_id,
            status,
        })
    }

    /// Whether the device answers a status query
    pub async fn test_device_connection(&self, name: Option<&str>) -> bool {
        match self.device_status(name).await {
            Ok(status) => !status.status.is_null(),
            Err(e) => {
                error!("Device connection test failed: {}", e);
                false
            }
        }
    }

    pub fn list_configured_devices(&self) -> Result<Vec<DeviceInfo>, CommandError> {
        Ok(self.config.devices()?.iter().map(DeviceInfo::from).collect())
    }

    /// Scan the local network for devices that are not configured yet
    pub async fn discover_devices(
        &self,
        scan: Duration,
    ) -> Result<Vec<DiscoveredDevice>, CommandError> {
        let found = self.controller()?.discover(scan).await?;
        let configured = self.config.devices()?;
        for device in &found {
            if !configured.iter().any(|c| c.device_id == device.device_id) {
                info!(
                    "Found unconfigured device {} at {}",
                    device.device_id, device.ip_address
                );
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl Command for SmartDeviceCommand {
    fn name(&self) -> &str {
        "SmartDeviceCommand"
    }

    fn patterns(&self) -> Vec<String> {
        TURN_ON
            .iter()
            .chain(TURN_OFF)
            .map(|p| p.to_string())
            .collect()
    }

    fn description(&self) -> &str {
        "Control smart devices: turn lights on/off"
    }

    fn can_handle(&self, command: &str) -> bool {
        self.is_enabled() && (contains_any(command, TURN_ON) || contains_any(command, TURN_OFF))
    }

    async fn execute(
        &self,
        command: &str,
        _context: Option<&CommandContext>,
    ) -> Result<String, CommandError> {
        let result = if contains_any(command, TURN_ON) {
            self.control_device(true, None).await
        } else if contains_any(command, TURN_OFF) {
            self.control_device(false, None).await
        } else {
            Err(CommandError::DeviceConnection(format!(
                "Unknown smart device command: {}",
                command
            )))
        };

        result.inspect_err(|e| error!("Error executing smart device command '{}': {}", command, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingController {
        calls: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl DeviceController for RecordingController {
        async fn set_power(&self, device: &SmartDevice, on: bool) -> Result<(), CommandError> {
            self.calls.lock().unwrap().push((device.name.clone(), on));
            Ok(())
        }

        async fn status(&self, _device: &SmartDevice) -> Result<serde_json::Value, CommandError> {
            Ok(serde_json::json!({ "dps": { "1": true } }))
        }

        async fn discover(&self, _scan: Duration) -> Result<Vec<DiscoveredDevice>, CommandError> {
            Ok(vec![DiscoveredDevice {
                device_id: "bf77".to_string(),
                ip_address: "192.168.1.77".to_string(),
                product_key: "key77".to_string(),
                version: "3.3".to_string(),
            }])
        }
    }

    fn manager(config: Config) -> Arc<ConfigManager> {
        Arc::new(ConfigManager::from_config("unused.toml", config))
    }

    fn enabled() -> (Arc<RecordingController>, SmartDeviceCommand) {
        let controller = Arc::new(RecordingController::default());
        let command =
            SmartDeviceCommand::new(manager(Config::with_defaults()), Some(controller.clone()));
        (controller, command)
    }

    #[tokio::test]
    async fn test_turn_first_device_on_and_off() {
        let (controller, command) = enabled();
        assert!(command.can_handle("nyalakan lampu"));

        let on = command.execute("nyalakan lampu", None).await.unwrap();
        let off = command.execute("tutup lampu", None).await.unwrap();
        assert_eq!(on, "Turned ON Smart Plug 1");
        assert_eq!(off, "Turned OFF Smart Plug 1");
        assert_eq!(
            controller.calls.lock().unwrap().as_slice(),
            [
                ("Smart Plug 1".to_string(), true),
                ("Smart Plug 1".to_string(), false)
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_without_backend() {
        let command = SmartDeviceCommand::new(manager(Config::with_defaults()), None);
        assert!(!command.can_handle("nyalakan lampu"));

        let err = command.execute("nyalakan lampu", None).await.unwrap_err();
        assert!(matches!(err, CommandError::DeviceConnection(_)));
        assert!(!command.test_device_connection(None).await);
    }

    #[tokio::test]
    async fn test_no_devices_configured() {
        let controller = Arc::new(RecordingController::default());
        let command = SmartDeviceCommand::new(manager(Config::default()), Some(controller));

        let err = command.execute("matikan lampu", None).await.unwrap_err();
        assert!(err.to_string().contains("No smart devices configured"));
    }

    #[tokio::test]
    async fn test_status_by_name() {
        let (_, command) = enabled();
        let status = command.device_status(Some("smart lamp")).await.unwrap();
        assert_eq!(status.device_name, "Smart Lamp");
        assert_eq!(status.status["dps"]["1"], true);
        assert!(command.test_device_connection(Some("Smart Lamp")).await);
        assert!(!command.test_device_connection(Some("toaster")).await);
    }

    #[test]
    fn test_list_configured_devices() {
        let (_, command) = enabled();
        let devices = command.list_configured_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].device_type, "light");
    }

    #[tokio::test]
    async fn test_discover_devices() {
        let (_, command) = enabled();
        let found = command
            .discover_devices(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ip_address, "192.168.1.77");

        let disabled = SmartDeviceCommand::new(manager(Config::with_defaults()), None);
        assert!(disabled.discover_devices(Duration::ZERO).await.is_err());
    }
}
