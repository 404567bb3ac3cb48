// Backend module - Vulkan bootstrap
//
// Leaf modules hold the decisions (which device, which queues, which surface
// format) and are testable without a driver. `context` strings them together
// against a real one.

pub mod context;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod queue;
pub mod resources;
pub mod shader;
pub mod surface;
pub mod swapchain;

#[cfg(test)]
mod fixtures;

pub use context::{ContextSettings, GraphicsContext};
pub use error::{InitError, InitResult};
pub use surface::PresentationTarget;
