// Device selection and logical device creation
//
// Selection is first-fit: devices are checked in the order the driver
// enumerates them and the first one that can do everything we need wins.
// There is no scoring, a discrete GPU listed after an adequate integrated
// one is never picked.

use ash::extensions::khr;
use ash::vk;
use std::ffi::{CStr, CString};

use super::error::{InitError, InitResult};
use super::probe::{missing_extensions, DeviceQuery};
use super::queue::{self, QueueFamilyIndices};
use super::surface::SwapchainSupport;

static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// What a physical device must offer to be picked.
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    pub extensions: Vec<String>,
    /// Surface to present to; `None` for headless use
    pub surface: Option<vk::SurfaceKHR>,
}

impl DeviceRequirements {
    /// Swapchain support plus presentation to `surface`.
    pub fn presenting_to(surface: vk::SurfaceKHR) -> Self {
        Self {
            extensions: vec![khr::Swapchain::name().to_string_lossy().into_owned()],
            surface: Some(surface),
        }
    }
}

/// The device that passed selection, with what was learned probing it.
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub name: String,
    pub queue_families: QueueFamilyIndices,
    pub swapchain_support: Option<SwapchainSupport>,
}

/// Queues fetched from the logical device. Not owned: they live exactly as
/// long as the device does.
#[derive(Debug, Clone, Copy, Default)]
pub struct Queues {
    pub graphics: vk::Queue,
    pub present: vk::Queue,
}

/// Pick the first device satisfying `requirements`.
pub fn select_device<Q: DeviceQuery + ?Sized>(
    query: &Q,
    devices: &[vk::PhysicalDevice],
    requirements: &DeviceRequirements,
) -> InitResult<SelectedDevice> {
    if devices.is_empty() {
        return Err(InitError::NoDevicesFound);
    }

    for &device in devices {
        if let Some(selected) = check_device(query, device, requirements)? {
            log::info!("Selected GPU: {}", selected.name);
            return Ok(selected);
        }
    }

    Err(InitError::NoSuitableDevice)
}

fn check_device<Q: DeviceQuery + ?Sized>(
    query: &Q,
    device: vk::PhysicalDevice,
    requirements: &DeviceRequirements,
) -> InitResult<Option<SelectedDevice>> {
    let name = query.device_name(device);

    let queue_families = queue::resolve(query, device, requirements.surface)?;
    if !queue_families.is_complete() {
        log::debug!("Rejecting {}: missing queue families {:?}", name, queue_families);
        return Ok(None);
    }

    let missing = missing_extensions(&query.device_extensions(device)?, &requirements.extensions);
    if !missing.is_empty() {
        log::debug!("Rejecting {}: missing extensions {:?}", name, missing);
        return Ok(None);
    }

    // Only asked once the swapchain extension is known to exist
    let swapchain_support = match requirements.surface {
        Some(surface) => {
            let support = query.swapchain_support(device, surface)?;
            if !support.is_adequate() {
                log::debug!(
                    "Rejecting {}: {} surface formats, {} present modes",
                    name,
                    support.formats.len(),
                    support.present_modes.len()
                );
                return Ok(None);
            }
            Some(support)
        }
        None => None,
    };

    Ok(Some(SelectedDevice {
        physical_device: device,
        name,
        queue_families,
        swapchain_support,
    }))
}

/// One create info per distinct family, each with a single queue.
pub fn queue_create_infos(indices: &QueueFamilyIndices) -> Vec<vk::DeviceQueueCreateInfo> {
    indices
        .unique_families()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&QUEUE_PRIORITIES)
                .build()
        })
        .collect()
}

/// Create the logical device on `selected`.
///
/// `layers` is only non-empty when validation is on; older loaders still
/// look at device layers.
pub fn create_logical_device(
    instance: &ash::Instance,
    selected: &SelectedDevice,
    extensions: &[CString],
    layers: &[CString],
) -> InitResult<ash::Device> {
    let queue_infos = queue_create_infos(&selected.queue_families);
    let extension_names: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();
    let layer_names: Vec<_> = layers.iter().map(|name| name.as_ptr()).collect();
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(selected.physical_device, &create_info, None) }
        .map_err(InitError::DeviceCreationFailed)?;

    log::info!(
        "Created logical device with {} queue famil{}",
        queue_infos.len(),
        if queue_infos.len() == 1 { "y" } else { "ies" }
    );

    Ok(device)
}

/// Fetch queue 0 of the graphics and present families.
pub fn fetch_queues(device: &ash::Device, indices: &QueueFamilyIndices) -> Queues {
    let graphics = indices
        .graphics
        .map(|family| unsafe { device.get_device_queue(family, 0) })
        .unwrap_or_default();
    let present = indices
        .present
        .map(|family| unsafe { device.get_device_queue(family, 0) })
        .unwrap_or_default();
    Queues { graphics, present }
}

/// Extension names as the driver wants them.
pub fn extension_cstrings(names: &[String]) -> Vec<CString> {
    names
        .iter()
        .filter_map(|name| CString::new(name.as_str()).ok())
        .collect()
}

/// Comma separated list, for logging.
pub fn describe_extensions(names: &[CString]) -> String {
    names
        .iter()
        .map(|name| name.as_c_str())
        .map(CStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(", ")
}
