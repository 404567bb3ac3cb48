// winit windows as presentation targets

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::CStr;
use winit::window::Window;

use crate::backend::{InitError, InitResult, PresentationTarget};

impl PresentationTarget for Window {
    fn required_instance_extensions(&self) -> InitResult<Vec<&'static CStr>> {
        let names = ash_window::enumerate_required_extensions(self.raw_display_handle())
            .map_err(InitError::InstanceCreationFailed)?;

        // SAFETY: ash-window hands out pointers to static nul-terminated names
        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect())
    }

    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> VkResult<vk::SurfaceKHR> {
        ash_window::create_surface(
            entry,
            instance,
            self.raw_display_handle(),
            self.raw_window_handle(),
            None,
        )
    }

    fn inner_extent(&self) -> vk::Extent2D {
        let size = self.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}
