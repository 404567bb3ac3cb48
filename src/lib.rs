//! Vulkan bootstrap: instance, device, swapchain and pipeline layout for a
//! single window, with every handle owned by one resource graph.

pub mod backend;
pub mod config;
pub mod window;
