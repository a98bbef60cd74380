//! Smart device records

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A smart device reachable on the local network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartDevice {
    /// Display name, also the (case-insensitive) lookup key
    pub name: String,
    pub device_id: String,
    pub ip_address: String,
    pub local_key: String,
    /// Device type tag (e.g. "outlet", "light")
    #[serde(default = "default_device_type")]
    pub device_type: String,
}

fn default_device_type() -> String {
    "outlet".to_string()
}

impl SmartDevice {
    /// Create a validated device record
    pub fn new(
        name: impl Into<String>,
        device_id: impl Into<String>,
        ip_address: impl Into<String>,
        local_key: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let device = Self {
            name: name.into(),
            device_id: device_id.into(),
            ip_address: ip_address.into(),
            local_key: local_key.into(),
            device_type: device_type.into(),
        };
        device.validate()?;
        Ok(device)
    }

    /// All identity fields must be non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("name", &self.name),
            ("device_id", &self.device_id),
            ("ip_address", &self.ip_address),
            ("local_key", &self.local_key),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "all device fields are required (missing {} for device '{}')",
                    field, self.name
                )));
            }
        }
        Ok(())
    }

    /// Case-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}
