use std::{ops::Deref, rc::Rc};

use ash::{
    vk::{DeviceCreateInfo, DeviceQueueCreateInfo, Handle, PhysicalDeviceFeatures, Queue},
    Device,
};
use tracing::debug;

use crate::{
    config::required_device_extensions,
    error::{InitError, Result},
    instance::InstanceGuard,
    ledger::{ResourceKind, ResourceLedger},
    physical_device::{QueueFamilies, SelectedDevice},
};

static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Graphics and present queues. They belong to the device and may be the same queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueHandles {
    pub graphics: Queue,
    pub present: Queue,
}

/// RAII for logical device
pub struct LogicalDeviceGuard {
    device: Device,
    queue_families: QueueFamilies,
    queues: QueueHandles,
    // need to keep a reference to the instance to ensure we get
    // dropped before it does
    instance: Rc<InstanceGuard>,
}

impl LogicalDeviceGuard {
    pub fn try_new(instance: &Rc<InstanceGuard>, selected: &SelectedDevice) -> Result<Rc<Self>> {
        let queue_families = selected.queue_families;
        let device_queue_create_infos = queue_create_infos(&queue_families);

        let device_extension_name_ptrs = required_device_extensions()
            .iter()
            .map(|extension_name| extension_name.as_ptr())
            .collect::<Vec<_>>();
        debug!("Device extensions: {:?}", required_device_extensions());

        let device_features = PhysicalDeviceFeatures::default();
        let device_create_info = DeviceCreateInfo::builder()
            .queue_create_infos(&device_queue_create_infos)
            .enabled_extension_names(&device_extension_name_ptrs)
            .enabled_features(&device_features);
        let device = unsafe {
            instance.create_device(selected.physical_device, &device_create_info, None)
        }
        .map_err(InitError::failed("create logical device"))?;
        instance
            .ledger()
            .created(ResourceKind::Device, device.handle().as_raw());

        let queues = unsafe {
            QueueHandles {
                graphics: device.get_device_queue(queue_families.graphics, 0),
                present: device.get_device_queue(queue_families.present, 0),
            }
        };

        Ok(Rc::new(Self {
            device,
            queue_families,
            queues,
            instance: Rc::clone(instance),
        }))
    }

    pub fn queue_families(&self) -> &QueueFamilies {
        &self.queue_families
    }

    pub fn queues(&self) -> QueueHandles {
        self.queues
    }

    pub fn instance(&self) -> &InstanceGuard {
        &self.instance
    }

    pub fn ledger(&self) -> &ResourceLedger {
        self.instance.ledger()
    }
}

impl Deref for LogicalDeviceGuard {
    type Target = Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl Drop for LogicalDeviceGuard {
    fn drop(&mut self) {
        self.instance
            .ledger()
            .released(ResourceKind::Device, self.device.handle().as_raw());
        unsafe { self.device.destroy_device(None) }
    }
}

/// One create info per distinct family, each asking for a single queue
fn queue_create_infos(queue_families: &QueueFamilies) -> Vec<DeviceQueueCreateInfo> {
    queue_families
        .unique()
        .into_iter()
        .map(|queue_family_index| {
            DeviceQueueCreateInfo::builder()
                .queue_family_index(queue_family_index)
                .queue_priorities(&QUEUE_PRIORITIES)
                .build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_family_gets_one_queue() {
        let create_infos = queue_create_infos(&QueueFamilies {
            graphics: 1,
            present: 1,
        });
        assert_eq!(create_infos.len(), 1);
        assert_eq!(create_infos[0].queue_family_index, 1);
        assert_eq!(create_infos[0].queue_count, 1);
    }

    #[test]
    fn split_families_get_one_queue_each() {
        let create_infos = queue_create_infos(&QueueFamilies {
            graphics: 0,
            present: 2,
        });
        let indices = create_infos
            .iter()
            .map(|create_info| create_info.queue_family_index)
            .collect::<Vec<_>>();
        assert_eq!(indices, vec![0, 2]);
        assert!(create_infos.iter().all(|create_info| create_info.queue_count == 1));
    }

    #[test]
    fn queue_priority_is_one() {
        let create_infos = queue_create_infos(&QueueFamilies {
            graphics: 3,
            present: 3,
        });
        let priorities = unsafe {
            std::slice::from_raw_parts(
                create_infos[0].p_queue_priorities,
                create_infos[0].queue_count as usize,
            )
        };
        assert_eq!(priorities, &[1.0]);
    }
}
