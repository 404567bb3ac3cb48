// Swapchain - Window presentation
//
// Create infos for the chain of presentable images and the views into
// them. The handles themselves are owned by the resource graph.

use ash::extensions::khr;
use ash::vk;

use super::error::{InitError, InitResult};
use super::queue::QueueFamilyIndices;
use super::surface::SurfaceConfiguration;

/// How swapchain images are shared between the graphics and present
/// families. Separate families share concurrently so no ownership
/// transfers are needed.
pub fn sharing(indices: &QueueFamilyIndices) -> (vk::SharingMode, Vec<u32>) {
    match (indices.graphics, indices.present) {
        (Some(graphics), Some(present)) if graphics != present => {
            (vk::SharingMode::CONCURRENT, vec![graphics, present])
        }
        _ => (vk::SharingMode::EXCLUSIVE, Vec::new()),
    }
}

pub fn create_swapchain(
    loader: &khr::Swapchain,
    surface: vk::SurfaceKHR,
    config: &SurfaceConfiguration,
    capabilities: &vk::SurfaceCapabilitiesKHR,
    indices: &QueueFamilyIndices,
) -> InitResult<vk::SwapchainKHR> {
    let (sharing_mode, family_indices) = sharing(indices);

    let create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(config.image_count)
        .image_format(config.format.format)
        .image_color_space(config.format.color_space)
        .image_extent(config.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(sharing_mode)
        .queue_family_indices(&family_indices)
        .pre_transform(capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(config.present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    log::info!(
        "Creating swapchain: {}x{}, {:?} sharing",
        config.extent.width,
        config.extent.height,
        sharing_mode
    );

    unsafe { loader.create_swapchain(&create_info, None) }
        .map_err(InitError::SwapchainCreationFailed)
}

/// The driver may create more images than requested, so always ask.
pub fn swapchain_images(
    loader: &khr::Swapchain,
    swapchain: vk::SwapchainKHR,
) -> InitResult<Vec<vk::Image>> {
    let images = unsafe { loader.get_swapchain_images(swapchain) }
        .map_err(InitError::DriverQueryFailed)?;
    log::info!("Swapchain holds {} images", images.len());
    Ok(images)
}

pub fn image_view_create_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo {
    vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build()
}

pub fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> InitResult<vk::ImageView> {
    let create_info = image_view_create_info(image, format);
    unsafe { device.create_image_view(&create_info, None) }
        .map_err(InitError::ImageViewCreationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::queue::QueueRoles;
    use ash::vk::Handle;

    fn indices(graphics: u32, present: u32) -> QueueFamilyIndices {
        let mut indices = QueueFamilyIndices::new(QueueRoles::GRAPHICS_AND_PRESENT);
        indices.graphics = Some(graphics);
        indices.present = Some(present);
        indices
    }

    #[test]
    fn shared_family_is_exclusive() {
        let (mode, families) = sharing(&indices(0, 0));

        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(families.is_empty());
    }

    #[test]
    fn split_families_share_concurrently() {
        let (mode, families) = sharing(&indices(0, 3));

        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(families, vec![0, 3]);
    }

    #[test]
    fn headless_indices_are_exclusive() {
        let mut headless = QueueFamilyIndices::new(QueueRoles::GRAPHICS);
        headless.graphics = Some(1);

        assert_eq!(sharing(&headless).0, vk::SharingMode::EXCLUSIVE);
    }

    #[test]
    fn image_views_cover_one_color_level() {
        let image = vk::Image::from_raw(42);
        let info = image_view_create_info(image, vk::Format::B8G8R8A8_UNORM);

        assert_eq!(info.image, image);
        assert_eq!(info.view_type, vk::ImageViewType::TYPE_2D);
        assert_eq!(info.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(info.components.r, vk::ComponentSwizzle::IDENTITY);
        assert_eq!(info.components.a, vk::ComponentSwizzle::IDENTITY);
        assert_eq!(info.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(info.subresource_range.level_count, 1);
        assert_eq!(info.subresource_range.layer_count, 1);
    }
}
