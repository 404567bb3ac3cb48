// Capability probing
//
// Read-only queries against the driver: instance layers, device extensions,
// queue families, presentation support and the surface support snapshot.
// Selection logic only ever talks to `DeviceQuery`, so it can be exercised
// against in-memory fixtures.

use ash::extensions::khr;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::{c_char, CStr};

use super::error::{InitError, InitResult};
use super::surface::SwapchainSupport;

/// Per-device queries the selector, queue resolver and negotiator rely on.
pub trait DeviceQuery {
    /// Human readable device name, for logging only
    fn device_name(&self, device: vk::PhysicalDevice) -> String;

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;

    fn supports_present(
        &self,
        device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> InitResult<bool>;

    fn device_extensions(&self, device: vk::PhysicalDevice) -> InitResult<BTreeSet<String>>;

    fn swapchain_support(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> InitResult<SwapchainSupport>;
}

/// `DeviceQuery` backed by a live instance and its surface function table.
pub struct AshQuery<'a> {
    instance: &'a ash::Instance,
    surface_loader: &'a khr::Surface,
}

impl<'a> AshQuery<'a> {
    pub fn new(instance: &'a ash::Instance, surface_loader: &'a khr::Surface) -> Self {
        Self {
            instance,
            surface_loader,
        }
    }
}

impl DeviceQuery for AshQuery<'_> {
    fn device_name(&self, device: vk::PhysicalDevice) -> String {
        let properties = unsafe { self.instance.get_physical_device_properties(device) };
        fixed_name(&properties.device_name)
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(device)
        }
    }

    fn supports_present(
        &self,
        device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> InitResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(device, family_index, surface)
        }
        .map_err(InitError::DriverQueryFailed)
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> InitResult<BTreeSet<String>> {
        list_device_extensions(self.instance, device)
    }

    fn swapchain_support(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> InitResult<SwapchainSupport> {
        let (capabilities, formats, present_modes) = unsafe {
            (
                self.surface_loader
                    .get_physical_device_surface_capabilities(device, surface),
                self.surface_loader
                    .get_physical_device_surface_formats(device, surface),
                self.surface_loader
                    .get_physical_device_surface_present_modes(device, surface),
            )
        };

        Ok(SwapchainSupport {
            capabilities: capabilities.map_err(InitError::DriverQueryFailed)?,
            formats: formats.map_err(InitError::DriverQueryFailed)?,
            present_modes: present_modes.map_err(InitError::DriverQueryFailed)?,
        })
    }
}

/// Names of every instance layer the loader knows about.
pub fn list_instance_layers(entry: &ash::Entry) -> InitResult<BTreeSet<String>> {
    let layers = entry
        .enumerate_instance_layer_properties()
        .map_err(InitError::DriverQueryFailed)?;
    Ok(layers
        .iter()
        .map(|layer| fixed_name(&layer.layer_name))
        .collect())
}

/// Names of every extension a physical device advertises.
pub fn list_device_extensions(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> InitResult<BTreeSet<String>> {
    let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
        .map_err(InitError::DriverQueryFailed)?;
    Ok(extensions
        .iter()
        .map(|extension| fixed_name(&extension.extension_name))
        .collect())
}

/// Fails with the first requested layer that is not available.
pub fn check_validation_layers(
    available: &BTreeSet<String>,
    requested: &[String],
) -> InitResult<()> {
    match requested.iter().find(|layer| !available.contains(*layer)) {
        Some(missing) => Err(InitError::UnsupportedValidationLayer(missing.clone())),
        None => Ok(()),
    }
}

/// Required names absent from `available`, in the order they were required.
pub fn missing_extensions(available: &BTreeSet<String>, required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !available.contains(*name))
        .cloned()
        .collect()
}

// Vulkan reports names as nul-terminated fixed-size arrays
fn fixed_name(raw: &[c_char]) -> String {
    unsafe { CStr::from_ptr(raw.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}
