// Graphics context - the whole bootstrap sequence
//
// Responsibilities:
// - Instance creation with optional validation layers and message hook
// - Surface creation through the windowing collaborator
// - Physical device selection and logical device + queue creation
// - Swapchain negotiation, swapchain and image view creation
// - Shader modules and pipeline layout
//
// Every handle goes into the resource graph as soon as it exists, so a
// failure at any step tears down exactly what was created before it.

use ash::extensions::{ext, khr};
use ash::vk;
use std::ffi::{CStr, CString};
use std::path::PathBuf;

use super::device::{self, DeviceRequirements, Queues};
use super::error::{InitError, InitResult};
use super::pipeline::{self, PipelineDescription};
use super::probe::{self, AshQuery, DeviceQuery};
use super::queue::{QueueFamilyIndices, QueueRoles};
use super::resources::{Destroyer, Resource, ResourceGraph, ResourceId};
use super::shader;
use super::surface::{self, PresentationTarget, SurfaceConfiguration};
use super::swapchain;

/// Everything the bootstrap sequence needs to know up front.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub app_name: String,
    pub engine_name: String,
    /// Load validation layers and install the diagnostic hook
    pub enable_validation: bool,
    pub validation_layers: Vec<String>,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl ContextSettings {
    fn enabled_layers(&self) -> Vec<String> {
        if self.enable_validation {
            self.validation_layers.clone()
        } else {
            Vec::new()
        }
    }
}

/// Slots reserved before anything is created
struct Slots {
    instance: ResourceId,
    debug_messenger: ResourceId,
    surface: ResourceId,
    device: ResourceId,
    swapchain: ResourceId,
    image_views: Vec<ResourceId>,
    vertex_shader: ResourceId,
    fragment_shader: ResourceId,
    pipeline_layout: ResourceId,
}

impl Slots {
    fn reserve(graph: &mut ResourceGraph) -> Self {
        let instance = graph.reserve("instance", None);
        let debug_messenger = graph.reserve("debug messenger", Some(instance));
        let surface = graph.reserve("surface", Some(instance));
        let device = graph.reserve("logical device", Some(instance));
        let swapchain = graph.reserve("swapchain", Some(device));
        let vertex_shader = graph.reserve("vertex shader", Some(device));
        let fragment_shader = graph.reserve("fragment shader", Some(device));
        let pipeline_layout = graph.reserve("pipeline layout", Some(device));
        Self {
            instance,
            debug_messenger,
            surface,
            device,
            swapchain,
            image_views: Vec::new(),
            vertex_shader,
            fragment_shader,
            pipeline_layout,
        }
    }
}

/// Owns the ash function tables and issues the destroy calls the resource
/// graph asks for.
#[derive(Default)]
pub struct VulkanDispatch {
    instance: Option<ash::Instance>,
    surface: Option<khr::Surface>,
    debug_utils: Option<ext::DebugUtils>,
    device: Option<ash::Device>,
    swapchain: Option<khr::Swapchain>,
}

impl VulkanDispatch {
    fn attach_instance(&mut self, entry: &ash::Entry, instance: &ash::Instance, validation: bool) {
        self.surface = Some(khr::Surface::new(entry, instance));
        if validation {
            self.debug_utils = Some(ext::DebugUtils::new(entry, instance));
        }
        self.instance = Some(instance.clone());
    }

    fn attach_device(&mut self, instance: &ash::Instance, device: &ash::Device) {
        self.swapchain = Some(khr::Swapchain::new(instance, device));
        self.device = Some(device.clone());
    }

    fn wait_idle(&self) {
        if let Some(device) = &self.device {
            if let Err(e) = unsafe { device.device_wait_idle() } {
                log::warn!("vkDeviceWaitIdle failed before teardown: {}", e);
            }
        }
    }
}

impl Destroyer for VulkanDispatch {
    fn destroy(&mut self, resource: Resource) {
        // SAFETY: the graph only hands out live handles, children first
        unsafe {
            match resource {
                Resource::Instance(_) => {
                    self.surface = None;
                    self.debug_utils = None;
                    if let Some(instance) = self.instance.take() {
                        instance.destroy_instance(None);
                    }
                }
                Resource::DebugMessenger(messenger) => match &self.debug_utils {
                    Some(debug_utils) => debug_utils.destroy_debug_utils_messenger(messenger, None),
                    None => missing_table(resource),
                },
                Resource::Surface(surface) => match &self.surface {
                    Some(loader) => loader.destroy_surface(surface, None),
                    None => missing_table(resource),
                },
                Resource::Device(_) => {
                    self.swapchain = None;
                    if let Some(device) = self.device.take() {
                        device.destroy_device(None);
                    }
                }
                Resource::Swapchain(swapchain) => match &self.swapchain {
                    Some(loader) => loader.destroy_swapchain(swapchain, None),
                    None => missing_table(resource),
                },
                Resource::ImageView(view) => match &self.device {
                    Some(device) => device.destroy_image_view(view, None),
                    None => missing_table(resource),
                },
                Resource::ShaderModule(module) => match &self.device {
                    Some(device) => device.destroy_shader_module(module, None),
                    None => missing_table(resource),
                },
                Resource::PipelineLayout(layout) => match &self.device {
                    Some(device) => device.destroy_pipeline_layout(layout, None),
                    None => missing_table(resource),
                },
            }
        }
    }
}

// Names reported in vk::ApplicationInfo cannot carry interior NULs
fn application_cstring(name: &str) -> InitResult<CString> {
    CString::new(name).map_err(|e| {
        log::error!("Application name {:?} contains a NUL byte at {}", name, e.nul_position());
        InitError::InstanceCreationFailed(vk::Result::ERROR_INITIALIZATION_FAILED)
    })
}

fn missing_table(resource: Resource) {
    log::error!("No function table left to destroy {:?}, leaking it", resource);
}

/// A fully bootstrapped Vulkan context: device, swapchain, image views and
/// pipeline layout, torn down in reverse creation order on drop.
pub struct GraphicsContext {
    graph: ResourceGraph,
    dispatch: VulkanDispatch,
    slots: Slots,

    pub physical_device: vk::PhysicalDevice,
    pub device_name: String,
    pub queue_families: QueueFamilyIndices,
    pub queues: Queues,
    pub surface_config: Option<SurfaceConfiguration>,
    pub swapchain_images: Vec<vk::Image>,
    pub pipeline: Option<PipelineDescription>,

    // Loader library; must outlive every handle above
    entry: ash::Entry,
}

impl GraphicsContext {
    /// Run the bootstrap sequence against `target`.
    pub fn new(target: &dyn PresentationTarget, settings: &ContextSettings) -> InitResult<Self> {
        log::info!("Creating Vulkan context: {}", settings.app_name);

        // SAFETY: loads the system Vulkan library; nothing else touches it
        let entry = unsafe { ash::Entry::load() }?;

        let mut graph = ResourceGraph::new();
        let slots = Slots::reserve(&mut graph);
        let mut context = Self {
            graph,
            dispatch: VulkanDispatch::default(),
            slots,
            physical_device: vk::PhysicalDevice::null(),
            device_name: String::new(),
            queue_families: QueueFamilyIndices::new(QueueRoles::GRAPHICS_AND_PRESENT),
            queues: Queues::default(),
            surface_config: None,
            swapchain_images: Vec::new(),
            pipeline: None,
            entry,
        };

        // On error `context` drops here and releases whatever was created
        context.initialize(target, settings)?;

        log::info!("Vulkan context ready ({} live handles)", context.graph.live_count());
        Ok(context)
    }

    fn initialize(
        &mut self,
        target: &dyn PresentationTarget,
        settings: &ContextSettings,
    ) -> InitResult<()> {
        let layers = settings.enabled_layers();
        if settings.enable_validation {
            let available = probe::list_instance_layers(&self.entry)?;
            probe::check_validation_layers(&available, &layers)?;
            log::info!("Validation layers enabled: {:?}", layers);
        }
        let layers = device::extension_cstrings(&layers);

        // Step 1: instance
        let instance = self.create_instance(target, settings, &layers)?;
        self.dispatch.attach_instance(&self.entry, &instance, settings.enable_validation);

        // Step 2: diagnostic hook
        if settings.enable_validation {
            self.create_debug_messenger()?;
        }

        // Step 3: surface
        let entry = &self.entry;
        let surface = self.graph.acquire(self.slots.surface, &mut self.dispatch, || {
            // SAFETY: the instance was created with the target's extensions
            unsafe { target.create_surface(entry, &instance) }
                .map_err(InitError::SurfaceCreationFailed)
        })?;

        // Step 4: physical device
        let surface_loader = khr::Surface::new(&self.entry, &instance);
        let query = AshQuery::new(&instance, &surface_loader);
        let devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(InitError::DriverQueryFailed)?;
        log::info!("Found {} physical device(s)", devices.len());
        let requirements = DeviceRequirements::presenting_to(surface);
        let selected = device::select_device(&query, &devices, &requirements)?;
        let properties =
            unsafe { instance.get_physical_device_properties(selected.physical_device) };
        let api_version = properties.api_version;
        log::info!(
            "Device API version {}.{}.{}",
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version),
            vk::api_version_patch(api_version)
        );

        self.physical_device = selected.physical_device;
        self.device_name = selected.name.clone();
        self.queue_families = selected.queue_families;

        // Step 5: logical device and queues
        let extensions = device::extension_cstrings(&requirements.extensions);
        log::info!("Device extensions: {}", device::describe_extensions(&extensions));
        let device = self.graph.acquire(self.slots.device, &mut self.dispatch, || {
            device::create_logical_device(&instance, &selected, &extensions, &layers)
        })?;
        self.dispatch.attach_device(&instance, &device);
        self.queues = device::fetch_queues(&device, &self.queue_families);

        // Step 6: swapchain, negotiated against a fresh support snapshot
        let support = query.swapchain_support(selected.physical_device, surface)?;
        let config = surface::negotiate(&support, target.inner_extent())
            .ok_or(InitError::SwapchainCreationFailed(vk::Result::ERROR_FORMAT_NOT_SUPPORTED))?;
        let swapchain_loader = khr::Swapchain::new(&instance, &device);
        let queue_families = self.queue_families;
        let swapchain = self.graph.acquire(self.slots.swapchain, &mut self.dispatch, || {
            swapchain::create_swapchain(
                &swapchain_loader,
                surface,
                &config,
                &support.capabilities,
                &queue_families,
            )
        })?;
        self.surface_config = Some(config);
        self.swapchain_images = swapchain::swapchain_images(&swapchain_loader, swapchain)?;

        // Step 7: image views
        for (i, &image) in self.swapchain_images.iter().enumerate() {
            let (id, _) = self.graph.insert(
                format!("image view {}", i),
                Some(self.slots.swapchain),
                &mut self.dispatch,
                || swapchain::create_image_view(&device, image, config.format.format),
            )?;
            self.slots.image_views.push(id);
        }

        // Step 8: shaders and pipeline layout
        let vertex_code = shader::load_spirv(&settings.vertex_shader)?;
        let fragment_code = shader::load_spirv(&settings.fragment_shader)?;
        let vertex = self.graph.acquire(self.slots.vertex_shader, &mut self.dispatch, || {
            shader::create_shader_module(&device, &vertex_code)
        })?;
        let fragment = self.graph.acquire(self.slots.fragment_shader, &mut self.dispatch, || {
            shader::create_shader_module(&device, &fragment_code)
        })?;

        let description = PipelineDescription::new(config.extent, vertex, fragment);
        self.graph.acquire(self.slots.pipeline_layout, &mut self.dispatch, || {
            pipeline::build_pipeline_layout(&device, &description)
        })?;
        self.pipeline = Some(description);

        Ok(())
    }

    fn create_instance(
        &mut self,
        target: &dyn PresentationTarget,
        settings: &ContextSettings,
        layers: &[CString],
    ) -> InitResult<ash::Instance> {
        let app_name = application_cstring(&settings.app_name)?;
        let engine_name = application_cstring(&settings.engine_name)?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions: Vec<&CStr> = target.required_instance_extensions()?;
        if settings.enable_validation {
            extensions.push(ext::DebugUtils::name());
        }
        log::info!("Instance extensions: {:?}", extensions);

        let extension_names: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();
        let layer_names: Vec<_> = layers.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names);

        let entry = &self.entry;
        self.graph.acquire(self.slots.instance, &mut self.dispatch, || {
            unsafe { entry.create_instance(&create_info, None) }
                .map_err(InitError::InstanceCreationFailed)
        })
    }

    fn create_debug_messenger(&mut self) -> InitResult<()> {
        let Some(debug_utils) = self.dispatch.debug_utils.clone() else {
            return Ok(());
        };

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        self.graph.acquire(self.slots.debug_messenger, &mut self.dispatch, || {
            unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
                .map_err(InitError::DebugHookCreationFailed)
        })?;
        Ok(())
    }

    pub fn device(&self) -> Option<&ash::Device> {
        self.dispatch.device.as_ref()
    }

    pub fn swapchain(&self) -> Option<vk::SwapchainKHR> {
        self.graph.handle(self.slots.swapchain)
    }

    pub fn image_views(&self) -> Vec<vk::ImageView> {
        self.slots
            .image_views
            .iter()
            .filter_map(|&id| self.graph.handle(id))
            .collect()
    }

    pub fn pipeline_layout(&self) -> Option<vk::PipelineLayout> {
        self.graph.handle(self.slots.pipeline_layout)
    }

    pub fn live_handles(&self) -> usize {
        self.graph.live_count()
    }

    /// Destroy every handle, newest first. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.graph.live_count() == 0 {
            return;
        }
        log::info!("Destroying Vulkan context...");
        self.dispatch.wait_idle();
        self.graph.teardown(&mut self.dispatch);
        self.surface_config = None;
        self.swapchain_images.clear();
        self.pipeline = None;
        log::info!("Vulkan context destroyed");
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

// Diagnostic sink for validation layer messages
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan {:?}] {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan {:?}] {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!("[Vulkan {:?}] {}", message_type, message);
        }
        _ => {
            log::debug!("[Vulkan {:?}] {}", message_type, message);
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enable_validation: bool) -> ContextSettings {
        ContextSettings {
            app_name: "test".into(),
            engine_name: "none".into(),
            enable_validation,
            validation_layers: vec!["VK_LAYER_KHRONOS_validation".into()],
            vertex_shader: "vert.spv".into(),
            fragment_shader: "frag.spv".into(),
        }
    }

    #[test]
    fn layers_follow_the_validation_switch() {
        assert_eq!(settings(true).enabled_layers(), vec!["VK_LAYER_KHRONOS_validation"]);
        assert!(settings(false).enabled_layers().is_empty());
    }

    #[test]
    fn slots_form_the_ownership_tree() {
        let mut graph = ResourceGraph::new();
        let slots = Slots::reserve(&mut graph);

        assert_eq!(graph.parent(slots.instance), None);
        assert_eq!(graph.parent(slots.debug_messenger), Some(slots.instance));
        assert_eq!(graph.parent(slots.surface), Some(slots.instance));
        assert_eq!(graph.parent(slots.device), Some(slots.instance));
        assert_eq!(graph.parent(slots.swapchain), Some(slots.device));
        assert_eq!(graph.parent(slots.pipeline_layout), Some(slots.device));
        assert_eq!(graph.parent(slots.vertex_shader), Some(slots.device));
        assert_eq!(graph.live_count(), 0);
    }

    #[test]
    fn application_names_reject_interior_nul() {
        assert_eq!(application_cstring("Hello Triangle").unwrap().as_bytes(), b"Hello Triangle");
        assert!(matches!(
            application_cstring("bad\0name"),
            Err(InitError::InstanceCreationFailed(vk::Result::ERROR_INITIALIZATION_FAILED))
        ));
    }

    #[test]
    fn dispatch_without_tables_does_not_panic() {
        use ash::vk::Handle;

        let mut dispatch = VulkanDispatch::default();
        dispatch.destroy(Resource::ImageView(vk::ImageView::from_raw(1)));
        dispatch.destroy(Resource::Surface(vk::SurfaceKHR::from_raw(2)));
        dispatch.destroy(Resource::Device(vk::Device::from_raw(3)));
        dispatch.destroy(Resource::Instance(vk::Instance::from_raw(4)));
    }
}
