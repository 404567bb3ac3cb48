// Initialization errors
//
// Every variant is fatal: the bootstrap sequence aborts on the first one and
// whatever was already created is torn down by the resource graph.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Could not load the Vulkan loader: {0}")]
    LoaderUnavailable(#[from] ash::LoadingError),

    #[error("Validation layer {0} was requested but is not available")]
    UnsupportedValidationLayer(String),

    #[error("Failed to create Vulkan instance: {0}")]
    InstanceCreationFailed(vk::Result),

    #[error("Failed to set up the validation message hook: {0}")]
    DebugHookCreationFailed(vk::Result),

    #[error("Failed to create window surface: {0}")]
    SurfaceCreationFailed(vk::Result),

    #[error("Driver query failed: {0}")]
    DriverQueryFailed(vk::Result),

    #[error("No Vulkan-capable hardware found")]
    NoDevicesFound,

    #[error("No device satisfies the queue, extension and surface requirements")]
    NoSuitableDevice,

    #[error("Failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("Failed to create swapchain: {0}")]
    SwapchainCreationFailed(vk::Result),

    #[error("Failed to create swapchain image view: {0}")]
    ImageViewCreationFailed(vk::Result),

    #[error("Unable to read shader file {path:?}: {source}")]
    ShaderFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Shader file {path:?} is not valid SPIR-V: {source}")]
    InvalidShaderBytecode {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create shader module: {0}")]
    ShaderModuleCreationFailed(vk::Result),

    #[error("Failed to create pipeline layout: {0}")]
    PipelineLayoutCreationFailed(vk::Result),
}

pub type InitResult<T> = Result<T, InitError>;
