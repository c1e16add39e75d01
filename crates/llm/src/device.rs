//! Compute device selection for in-process inference.

use candle_core::Device;

/// Pick the best available device: CUDA or Metal when compiled in, else CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            tracing::info!("Using CUDA device 0");
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            tracing::info!("Using Metal device 0");
            return device;
        }
    }

    tracing::info!("Using CPU device");
    Device::Cpu
}
