//! Compute device selection and GPU availability probing.

use std::{fmt, path::Path, str::FromStr};

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    #[serde(rename = "cuda")]
    Gpu,
}

impl Device {
    pub fn id(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Gpu => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown device '{0}'. Expected 'cpu' or 'gpu'")]
pub struct UnknownDevice(pub String);

impl FromStr for Device {
    type Err = UnknownDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "gpu" | "cuda" => Ok(Device::Gpu),
            _ => Err(UnknownDevice(s.to_string())),
        }
    }
}

/// Reports whether a GPU can be used in the current runtime environment.
pub trait DeviceProbe: Send + Sync {
    fn gpu_available(&self) -> bool;
}

/// Probes the host for an NVIDIA driver.
///
/// A GPU counts as available when the driver exposes
/// `/proc/driver/nvidia/version` and `CUDA_VISIBLE_DEVICES` does not hide
/// every device.
#[derive(Debug, Clone, Default)]
pub struct SystemProbe;

impl DeviceProbe for SystemProbe {
    fn gpu_available(&self) -> bool {
        if let Ok(visible) = std::env::var("CUDA_VISIBLE_DEVICES") {
            let visible = visible.trim();
            if visible.is_empty() || visible == "-1" {
                return false;
            }
        }
        Path::new("/proc/driver/nvidia/version").exists()
    }
}

/// Probe with a fixed answer, for hosts configured out of band and for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub bool);

impl DeviceProbe for FixedProbe {
    fn gpu_available(&self) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceResolution {
    pub device: Device,
    pub fallback: bool,
}

/// Downgrade a GPU request to CPU when no GPU is present.
pub fn resolve_device(requested: Device, probe: &dyn DeviceProbe) -> DeviceResolution {
    if requested == Device::Gpu && !probe.gpu_available() {
        warn!("GPU requested but not available, falling back to CPU");
        return DeviceResolution {
            device: Device::Cpu,
            fallback: true,
        };
    }
    DeviceResolution {
        device: requested,
        fallback: false,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub emoji: &'static str,
    pub description: &'static str,
}

/// Devices a client may pick from. CPU is always listed first.
pub fn available_devices(probe: &dyn DeviceProbe) -> Vec<DeviceInfo> {
    let mut devices = vec![DeviceInfo {
        id: Device::Cpu.id(),
        name: "CPU",
        emoji: "💻",
        description: "Central Processing Unit (slower but always available)",
    }];
    if probe.gpu_available() {
        devices.push(DeviceInfo {
            id: Device::Gpu.id(),
            name: "GPU",
            emoji: "🖥️",
            description: "Graphics Processing Unit (faster processing)",
        });
    }
    devices
}
