//! Recording device descriptions.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A device that records sensor data (a phone, a watch).
///
/// Values are plain data copied out of the host; they carry no live handle.
/// `product_type` is the stable part used in checkpoint keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Device {
    /// Model name, e.g. "iPhone".
    pub model: String,
    /// User-visible device name.
    pub name: String,
    /// Operating system name.
    pub system_name: String,
    /// Operating system version.
    pub system_version: String,
    /// Hardware product type, e.g. "Watch6,1".
    pub product_type: String,
}

impl Device {
    /// Create a builder for constructing a `Device`.
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{} ({})", self.model, self.product_type)
        } else {
            write!(f, "{} ({})", self.name, self.product_type)
        }
    }
}

/// Builder for constructing a [`Device`].
#[derive(Debug, Default, Clone)]
#[must_use]
pub struct DeviceBuilder {
    device: Device,
}

impl DeviceBuilder {
    /// Set the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.device.model = model.into();
        self
    }

    /// Set the device name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.device.name = name.into();
        self
    }

    /// Set the operating system name.
    pub fn system_name(mut self, system_name: impl Into<String>) -> Self {
        self.device.system_name = system_name.into();
        self
    }

    /// Set the operating system version.
    pub fn system_version(mut self, system_version: impl Into<String>) -> Self {
        self.device.system_version = system_version.into();
        self
    }

    /// Set the hardware product type.
    pub fn product_type(mut self, product_type: impl Into<String>) -> Self {
        self.device.product_type = product_type.into();
        self
    }

    /// Build the device.
    #[must_use]
    pub fn build(self) -> Device {
        self.device
    }
}
