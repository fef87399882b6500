// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference configuration.
//!
//! This module defines the [`InferenceConfig`] struct, which controls how a
//! classifier session is created and how many predictions it reports.

use crate::device::Device;

/// Configuration for orientation inference.
///
/// Uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use docori_inference::InferenceConfig;
///
/// let config = InferenceConfig::new()
///     .with_topk(2)
///     .with_threads(2);
/// ```
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Number of predictions reported per image.
    /// If `None`, the value from the model metadata is used (1 by default).
    pub topk: Option<usize>,
    /// Number of intra-op threads for ONNX Runtime.
    /// Setting this to `0` allows ONNX Runtime to choose.
    pub num_threads: usize,
    /// Execution device. `None` means CPU.
    pub device: Option<Device>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            topk: None,
            num_threads: 0,
            device: None,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many of the highest-scoring classes each result reports.
    #[must_use]
    pub const fn with_topk(mut self, topk: usize) -> Self {
        self.topk = Some(topk);
        self
    }

    /// Set the number of threads for inference.
    ///
    /// # Arguments
    ///
    /// * `threads` - The number of intra-op threads. Set to `0` for auto-configuration.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Set the execution device.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = InferenceConfig::default();
        assert_eq!(config.topk, None);
        assert_eq!(config.num_threads, 0);
        assert!(config.device.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = InferenceConfig::new()
            .with_topk(3)
            .with_threads(4)
            .with_device(Device::Cuda(1));

        assert_eq!(config.topk, Some(3));
        assert_eq!(config.num_threads, 4);
        assert_eq!(config.device, Some(Device::Cuda(1)));
    }
}
