// In-memory stand-ins for the driver, shared by the unit tests.

use ash::vk;
use ash::vk::Handle;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use super::error::InitResult;
use super::probe::DeviceQuery;
use super::resources::{Destroyer, Resource};
use super::surface::SwapchainSupport;

/// One fake physical device.
#[derive(Clone, Default)]
pub struct FakeDevice {
    pub name: &'static str,
    pub families: Vec<vk::QueueFamilyProperties>,
    pub present_families: Vec<u32>,
    pub extensions: Vec<&'static str>,
    pub support: SwapchainSupport,
}

/// In-memory driver; records which present queries were issued.
#[derive(Default)]
pub struct FakeDriver {
    pub devices: HashMap<u64, FakeDevice>,
    pub present_queries: RefCell<Vec<(u64, u32)>>,
    pub support_queries: RefCell<Vec<u64>>,
}

impl FakeDriver {
    pub fn with(devices: Vec<FakeDevice>) -> (Self, Vec<vk::PhysicalDevice>) {
        let mut driver = Self::default();
        let mut handles = Vec::new();
        for (i, device) in devices.into_iter().enumerate() {
            let raw = 0x100 + i as u64;
            driver.devices.insert(raw, device);
            handles.push(vk::PhysicalDevice::from_raw(raw));
        }
        (driver, handles)
    }

    fn get(&self, device: vk::PhysicalDevice) -> &FakeDevice {
        &self.devices[&device.as_raw()]
    }
}

impl DeviceQuery for FakeDriver {
    fn device_name(&self, device: vk::PhysicalDevice) -> String {
        self.get(device).name.to_string()
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.get(device).families.clone()
    }

    fn supports_present(
        &self,
        device: vk::PhysicalDevice,
        family_index: u32,
        _surface: vk::SurfaceKHR,
    ) -> InitResult<bool> {
        self.present_queries
            .borrow_mut()
            .push((device.as_raw(), family_index));
        Ok(self.get(device).present_families.contains(&family_index))
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> InitResult<BTreeSet<String>> {
        Ok(self
            .get(device)
            .extensions
            .iter()
            .map(|name| name.to_string())
            .collect())
    }

    fn swapchain_support(
        &self,
        device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> InitResult<SwapchainSupport> {
        self.support_queries.borrow_mut().push(device.as_raw());
        Ok(self.get(device).support.clone())
    }
}

pub fn family(flags: vk::QueueFlags, queue_count: u32) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count,
        ..Default::default()
    }
}

pub fn surface() -> vk::SurfaceKHR {
    vk::SurfaceKHR::from_raw(0xabc)
}

/// Destroyer that records every call instead of talking to a driver.
#[derive(Default)]
pub struct RecordingDestroyer {
    pub trace: Vec<Resource>,
    pub counts: HashMap<u64, usize>,
}

impl Destroyer for RecordingDestroyer {
    fn destroy(&mut self, resource: Resource) {
        self.trace.push(resource);
        *self.counts.entry(resource.raw()).or_default() += 1;
    }
}
