// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Hardware device selection for ONNX Runtime.
use std::fmt;
use std::str::FromStr;

/// Hardware device for inference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Device {
    /// CPU execution provider (always available).
    #[default]
    Cpu,
    /// CUDA for NVIDIA GPUs, with device index.
    Cuda(usize),
    /// `TensorRT` on NVIDIA GPUs, with device index.
    TensorRt(usize),
    /// Apple `CoreML`.
    CoreMl,
    /// `DirectML` on Windows, with device index.
    DirectMl(usize),
}

impl Device {
    /// Name of the Cargo feature that enables this device's execution provider.
    #[must_use]
    pub const fn feature(&self) -> Option<&'static str> {
        match self {
            Self::Cpu => None,
            Self::Cuda(_) => Some("cuda"),
            Self::TensorRt(_) => Some("tensorrt"),
            Self::CoreMl => Some("coreml"),
            Self::DirectMl(_) => Some("directml"),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
            Self::TensorRt(i) => write!(f, "tensorrt:{i}"),
            Self::CoreMl => write!(f, "coreml"),
            Self::DirectMl(i) => write!(f, "directml:{i}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        match s.as_str() {
            "cpu" => return Ok(Self::Cpu),
            "coreml" | "mps" => return Ok(Self::CoreMl),
            _ => {}
        }

        if let Some(rest) = s.strip_prefix("cuda") {
            Ok(Self::Cuda(parse_device_index(rest)?))
        } else if let Some(rest) = s.strip_prefix("tensorrt") {
            Ok(Self::TensorRt(parse_device_index(rest)?))
        } else if let Some(rest) = s.strip_prefix("directml") {
            Ok(Self::DirectMl(parse_device_index(rest)?))
        } else {
            Err(format!("Unknown device: {s}"))
        }
    }
}

/// Parse the optional ":N" suffix of a device string.
fn parse_device_index(s: &str) -> Result<usize, String> {
    if s.is_empty() {
        return Ok(0);
    }
    s.strip_prefix(':')
        .and_then(|index_str| index_str.parse::<usize>().ok())
        .ok_or_else(|| format!("Invalid device index: '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!(Device::from_str("cpu").unwrap(), Device::Cpu);
        assert_eq!(Device::from_str("cuda").unwrap(), Device::Cuda(0));
        assert_eq!(Device::from_str("cuda:1").unwrap(), Device::Cuda(1));
        assert_eq!(Device::from_str("TensorRT:2").unwrap(), Device::TensorRt(2));
        assert_eq!(Device::from_str("mps").unwrap(), Device::CoreMl);
        assert_eq!(Device::from_str("directml").unwrap(), Device::DirectMl(0));
    }

    #[test]
    fn test_parse_device_rejects_garbage() {
        assert!(Device::from_str("tpu").is_err());
        assert!(Device::from_str("cuda:x").is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let device = Device::DirectMl(3);
        assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
    }
}
