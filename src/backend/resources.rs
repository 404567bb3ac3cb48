// Resource lifetime graph
//
// Every Vulkan object the context creates lives in one table. A node knows
// the index of the node it depends on, never a reference to it, and the
// graph decides when to destroy what:
//
//   instance
//   ├── debug messenger
//   ├── surface
//   └── logical device
//       ├── swapchain
//       │   └── image views
//       ├── shader modules
//       └── pipeline layout
//
// Children are always destroyed before their parent, siblings in reverse
// creation order. The actual destroy calls are dispatched through
// `Destroyer`, whose Vulkan implementation owns the ash function tables.

use ash::vk;
use ash::vk::Handle;
use std::cmp::Reverse;
use std::fmt;

/// A raw handle owned by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Instance(vk::Instance),
    DebugMessenger(vk::DebugUtilsMessengerEXT),
    Surface(vk::SurfaceKHR),
    Device(vk::Device),
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    ShaderModule(vk::ShaderModule),
    PipelineLayout(vk::PipelineLayout),
}

impl Resource {
    pub fn raw(&self) -> u64 {
        match *self {
            Resource::Instance(h) => h.as_raw(),
            Resource::DebugMessenger(h) => h.as_raw(),
            Resource::Surface(h) => h.as_raw(),
            Resource::Device(h) => h.as_raw(),
            Resource::Swapchain(h) => h.as_raw(),
            Resource::ImageView(h) => h.as_raw(),
            Resource::ShaderModule(h) => h.as_raw(),
            Resource::PipelineLayout(h) => h.as_raw(),
        }
    }
}

/// Something whose creation produces a graph-owned handle.
pub trait Tracked {
    fn resource(&self) -> Resource;
}

macro_rules! tracked_handle {
    ($($handle:ty => $variant:ident),* $(,)?) => {$(
        impl Tracked for $handle {
            fn resource(&self) -> Resource {
                Resource::$variant(*self)
            }
        }

        impl TryFrom<Resource> for $handle {
            type Error = Resource;

            fn try_from(resource: Resource) -> Result<Self, Resource> {
                match resource {
                    Resource::$variant(handle) => Ok(handle),
                    other => Err(other),
                }
            }
        }
    )*};
}

tracked_handle! {
    vk::Instance => Instance,
    vk::DebugUtilsMessengerEXT => DebugMessenger,
    vk::SurfaceKHR => Surface,
    vk::Device => Device,
    vk::SwapchainKHR => Swapchain,
    vk::ImageView => ImageView,
    vk::ShaderModule => ShaderModule,
    vk::PipelineLayout => PipelineLayout,
}

// Dispatchable handles come back wrapped in their function tables
impl Tracked for ash::Instance {
    fn resource(&self) -> Resource {
        Resource::Instance(self.handle())
    }
}

impl Tracked for ash::Device {
    fn resource(&self) -> Resource {
        Resource::Device(self.handle())
    }
}

/// Issues the driver call that destroys one handle.
pub trait Destroyer {
    fn destroy(&mut self, resource: Resource);
}

/// Index of a slot in a [`ResourceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(usize);

struct Node {
    label: String,
    parent: Option<ResourceId>,
    children: Vec<ResourceId>,
    handle: Option<Resource>,
    // Creation sequence number of the live handle
    created: u64,
}

#[derive(Default)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    next_seq: u64,
}

impl fmt::Debug for ResourceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGraph")
            .field("slots", &self.nodes.len())
            .field("live", &self.live_count())
            .finish()
    }
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty slot under `parent`.
    pub fn reserve(&mut self, label: impl Into<String>, parent: Option<ResourceId>) -> ResourceId {
        let id = ResourceId(self.nodes.len());
        self.nodes.push(Node {
            label: label.into(),
            parent,
            children: Vec::new(),
            handle: None,
            created: 0,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Fill slot `id` with the result of `create`.
    ///
    /// A handle already held in the slot is destroyed (with everything that
    /// depends on it) before `create` runs. If `create` fails the slot stays
    /// empty.
    pub fn acquire<T, E, D>(
        &mut self,
        id: ResourceId,
        destroyer: &mut D,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        T: Tracked,
        D: Destroyer + ?Sized,
    {
        if self.nodes[id.0].handle.is_some() {
            log::debug!("Re-acquiring {}, releasing previous handle", self.nodes[id.0].label);
            self.destroy(id, destroyer);
        }

        if let Some(parent) = self.nodes[id.0].parent {
            debug_assert!(
                self.is_live(parent),
                "{} created under a dead {}",
                self.nodes[id.0].label,
                self.nodes[parent.0].label
            );
        }

        let created = create()?;
        let node = &mut self.nodes[id.0];
        node.handle = Some(created.resource());
        node.created = self.next_seq;
        self.next_seq += 1;
        log::trace!("Created {} ({:#x})", node.label, created.resource().raw());

        Ok(created)
    }

    /// [`reserve`](Self::reserve) followed by [`acquire`](Self::acquire).
    pub fn insert<T, E, D>(
        &mut self,
        label: impl Into<String>,
        parent: Option<ResourceId>,
        destroyer: &mut D,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<(ResourceId, T), E>
    where
        T: Tracked,
        D: Destroyer + ?Sized,
    {
        let id = self.reserve(label, parent);
        let created = self.acquire(id, destroyer, create)?;
        Ok((id, created))
    }

    pub fn get(&self, id: ResourceId) -> Option<Resource> {
        self.nodes[id.0].handle
    }

    /// Typed view of a live slot.
    pub fn handle<T: TryFrom<Resource>>(&self, id: ResourceId) -> Option<T> {
        self.get(id).and_then(|resource| T::try_from(resource).ok())
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.nodes[id.0].handle.is_some()
    }

    pub fn parent(&self, id: ResourceId) -> Option<ResourceId> {
        self.nodes[id.0].parent
    }

    pub fn label(&self, id: ResourceId) -> &str {
        &self.nodes[id.0].label
    }

    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.handle.is_some()).count()
    }

    /// Destroy `id` and everything below it, children first. Destroying an
    /// empty slot does nothing.
    pub fn destroy<D: Destroyer + ?Sized>(&mut self, id: ResourceId, destroyer: &mut D) {
        let mut children: Vec<ResourceId> = self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|&child| self.is_live(child))
            .collect();
        children.sort_by_key(|&child| Reverse(self.nodes[child.0].created));
        for child in children {
            self.destroy(child, destroyer);
        }

        let node = &mut self.nodes[id.0];
        if let Some(resource) = node.handle.take() {
            log::trace!("Destroying {} ({:#x})", node.label, resource.raw());
            destroyer.destroy(resource);
        }
    }

    /// Destroy every live handle, newest first.
    pub fn teardown<D: Destroyer + ?Sized>(&mut self, destroyer: &mut D) {
        let mut live: Vec<ResourceId> = (0..self.nodes.len())
            .map(ResourceId)
            .filter(|&id| self.is_live(id))
            .collect();
        if live.is_empty() {
            return;
        }

        log::debug!("Tearing down {} resources", live.len());
        live.sort_by_key(|&id| Reverse(self.nodes[id.0].created));
        for id in live {
            self.destroy(id, destroyer);
        }
    }
}
