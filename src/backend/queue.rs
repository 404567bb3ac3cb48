// Queue family resolution
//
// Maps the graphics and present roles onto queue family indices. Families
// are scanned in the order the device reports them and the first family
// satisfying a role keeps it; nothing is scored.

use ash::vk;
use std::collections::BTreeSet;

use super::error::InitResult;
use super::probe::DeviceQuery;

/// Which queue roles the current configuration needs. Graphics is always
/// required; present only when rendering to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRoles {
    pub present: bool,
}

impl QueueRoles {
    pub const GRAPHICS: Self = Self { present: false };
    pub const GRAPHICS_AND_PRESENT: Self = Self { present: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    roles: QueueRoles,
}

impl QueueFamilyIndices {
    pub fn new(roles: QueueRoles) -> Self {
        Self {
            graphics: None,
            present: None,
            roles,
        }
    }

    pub fn roles(&self) -> QueueRoles {
        self.roles
    }

    /// True once every required role has a family.
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && (!self.roles.present || self.present.is_some())
    }

    /// Distinct families to create queues on, ascending.
    pub fn unique_families(&self) -> Vec<u32> {
        self.graphics
            .into_iter()
            .chain(self.present)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// True when presentation happens on a different family than rendering.
    pub fn is_split(&self) -> bool {
        matches!((self.graphics, self.present), (Some(g), Some(p)) if g != p)
    }
}

/// Resolve queue roles on `device`. The present role is only looked for
/// when a surface is given.
pub fn resolve<Q: DeviceQuery + ?Sized>(
    query: &Q,
    device: vk::PhysicalDevice,
    surface: Option<vk::SurfaceKHR>,
) -> InitResult<QueueFamilyIndices> {
    let roles = QueueRoles {
        present: surface.is_some(),
    };
    let mut indices = QueueFamilyIndices::new(roles);

    for (index, family) in query.queue_families(device).iter().enumerate() {
        let index = index as u32;
        let has_queues = family.queue_count > 0;

        if indices.graphics.is_none()
            && has_queues
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics = Some(index);
        }

        if let Some(surface) = surface {
            if indices.present.is_none()
                && has_queues
                && query.supports_present(device, index, surface)?
            {
                indices.present = Some(index);
            }
        }

        if indices.is_complete() {
            break;
        }
    }

    log::debug!(
        "Queue families for {:?}: graphics={:?} present={:?}",
        device,
        indices.graphics,
        indices.present
    );

    Ok(indices)
}
