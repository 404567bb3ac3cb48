// Surface negotiation
//
// Turns what a device reports about a surface into the concrete swapchain
// parameters to request. Every rule has a deterministic fallback, so
// negotiation only fails when the device reports no formats at all.

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::CStr;

use super::error::InitResult;

/// The (format, color space) pair requested whenever the surface allows it.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Low-latency triple buffering, used when available.
pub const PREFERRED_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;

/// Every conforming driver supports it.
pub const FALLBACK_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// A window the context can present to.
///
/// Implemented for `winit::window::Window`; event polling stays with the
/// windowing library.
pub trait PresentationTarget {
    /// Instance extensions the window system needs for presentation
    fn required_instance_extensions(&self) -> InitResult<Vec<&'static CStr>>;

    /// # Safety
    /// `instance` must have been created with the extensions returned by
    /// [`required_instance_extensions`](Self::required_instance_extensions),
    /// and the surface must be destroyed before the window.
    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> VkResult<vk::SurfaceKHR>;

    /// Current drawable size in pixels
    fn inner_extent(&self) -> vk::Extent2D;
}

/// Snapshot of a device's support for one surface.
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// A swapchain can be built when at least one format and one present
    /// mode are reported.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// The resolved swapchain parameters.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceConfiguration {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

/// Resolve every swapchain parameter from a support snapshot.
///
/// Returns `None` only when no surface format is reported.
pub fn negotiate(support: &SwapchainSupport, window: vk::Extent2D) -> Option<SurfaceConfiguration> {
    let format = choose_surface_format(&support.formats, PREFERRED_SURFACE_FORMAT)?;
    let configuration = SurfaceConfiguration {
        format,
        present_mode: choose_present_mode(&support.present_modes),
        extent: choose_extent(&support.capabilities, window),
        image_count: choose_image_count(&support.capabilities),
    };

    log::info!(
        "Negotiated surface: {:?}/{:?}, {:?}, {}x{}, {} images",
        configuration.format.format,
        configuration.format.color_space,
        configuration.present_mode,
        configuration.extent.width,
        configuration.extent.height,
        configuration.image_count
    );

    Some(configuration)
}

/// A single `UNDEFINED` entry means the surface takes anything, so the
/// preferred pair is used. Otherwise the preferred pair if listed, else the
/// first listed format.
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    if let [only] = available {
        if only.format == vk::Format::UNDEFINED {
            return Some(preferred);
        }
    }

    available
        .iter()
        .find(|candidate| {
            candidate.format == preferred.format && candidate.color_space == preferred.color_space
        })
        .or_else(|| available.first())
        .copied()
}

pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    available
        .iter()
        .copied()
        .find(|&mode| mode == PREFERRED_PRESENT_MODE)
        .unwrap_or(FALLBACK_PRESENT_MODE)
}

/// A current extent of `u32::MAX` means the surface follows the swapchain,
/// so the window size is clamped into the supported range. Any other value
/// is authoritative.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: window.width.min(max.width).max(min.width),
        height: window.height.min(max.height).max(min.height),
    }
}

/// One image more than the minimum, capped by the maximum when the surface
/// has one (a maximum of zero means unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let requested = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 && requested > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        requested
    }
}
