//! Explicit compute device selection.
//!
//! Device placement is a construction parameter threaded through every
//! component rather than ambient global state. [`DevicePreference::Auto`]
//! picks CUDA > Metal > CPU depending on the enabled cargo features.

use bloomnet_core::{BloomNetError, Result};
use candle_core::Device;

/// Which compute device to place model weights and tensors on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePreference {
    /// Best available: CUDA, then Metal, then CPU.
    #[default]
    Auto,
    /// Host CPU.
    Cpu,
    /// CUDA device with the given ordinal.
    Cuda(usize),
    /// Metal device with the given ordinal.
    Metal(usize),
}

impl DevicePreference {
    /// Resolve the preference to a concrete device.
    ///
    /// `Auto` falls back silently; an explicit `Cuda`/`Metal` request that
    /// cannot be satisfied is a configuration error.
    pub fn resolve(&self) -> Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda(ordinal) => Device::new_cuda(*ordinal).map_err(|e| {
                BloomNetError::Config(format!("CUDA device {ordinal} unavailable: {e}"))
            }),
            Self::Metal(ordinal) => Device::new_metal(*ordinal).map_err(|e| {
                BloomNetError::Config(format!("Metal device {ordinal} unavailable: {e}"))
            }),
            Self::Auto => Ok(Self::best_available()),
        }
    }

    fn best_available() -> Device {
        #[cfg(feature = "cuda")]
        {
            if let Ok(device) = Device::new_cuda(0) {
                tracing::info!("Using CUDA device 0");
                return device;
            }
            tracing::warn!("CUDA feature enabled but no GPU available, falling back");
        }

        #[cfg(feature = "metal")]
        {
            if let Ok(device) = Device::new_metal(0) {
                tracing::info!("Using Metal device 0");
                return device;
            }
            tracing::warn!("Metal feature enabled but no device available, falling back");
        }

        Device::Cpu
    }
}

impl std::fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            Self::Metal(ordinal) => write!(f, "metal:{ordinal}"),
        }
    }
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let (kind, ordinal) = match lower.split_once(':') {
            Some((kind, ord)) => {
                let ordinal: usize = ord
                    .parse()
                    .map_err(|_| format!("invalid device ordinal: {ord}"))?;
                (kind.to_string(), ordinal)
            }
            None => (lower, 0),
        };
        match kind.as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda(ordinal)),
            "metal" => Ok(Self::Metal(ordinal)),
            _ => Err(format!("unknown device: {s} (expected auto|cpu|cuda|metal)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
