use std::{
    collections::{BTreeSet, HashSet},
    ffi::CStr,
    fmt,
};

use ash::vk::{PhysicalDevice, QueueFamilyProperties, QueueFlags};
use tracing::{debug, info};

use crate::{
    config::required_device_extensions,
    error::{InitError, Result},
    instance::InstanceGuard,
    surface::SurfaceGuard,
    swapchain::SwapchainSupportDetails,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// family capable of runing graphics related commands
    pub graphics_family: Option<u32>,
    /// family capable of displaying results on the screen
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Picks the first family with graphics support and, separately, the first
    /// one that can present. `supports_present` is asked in index order and
    /// not called again once a present family is found.
    pub fn find<F>(properties: &[QueueFamilyProperties], mut supports_present: F) -> Result<Self>
    where
        F: FnMut(u32) -> Result<bool>,
    {
        let graphics_family = properties
            .iter()
            .position(|family| family.queue_flags.contains(QueueFlags::GRAPHICS))
            .map(|index| index as u32);

        let mut present_family = None;
        for index in 0..properties.len() as u32 {
            if supports_present(index)? {
                present_family = Some(index);
                break;
            }
        }

        Ok(Self {
            graphics_family,
            present_family,
        })
    }

    pub fn resolve(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics_family?,
            present: self.present_family?,
        })
    }
}

/// Queue families of a device that passed selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices in ascending order, one queue gets created per entry
    pub fn unique(&self) -> Vec<u32> {
        BTreeSet::from([self.graphics, self.present])
            .into_iter()
            .collect()
    }
}

/// Why a device was passed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NoGraphicsQueue,
    NoPresentQueue,
    MissingExtension(String),
    InadequateSwapchain,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoGraphicsQueue => write!(f, "no queue family supports graphics"),
            Rejection::NoPresentQueue => {
                write!(f, "no queue family can present to the surface")
            }
            Rejection::MissingExtension(name) => write!(f, "extension {} not supported", name),
            Rejection::InadequateSwapchain => {
                write!(f, "surface reports no formats or no present modes")
            }
        }
    }
}

/// What a physical device offers, gathered once so it can be judged without
/// going back to the driver.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub physical_device: PhysicalDevice,
    pub name: String,
    pub queue_families: QueueFamilyIndices,
    pub extensions: HashSet<String>,
    pub swapchain_support: SwapchainSupportDetails,
}

impl DeviceCandidate {
    pub fn probe(
        instance: &InstanceGuard,
        surface: &SurfaceGuard,
        physical_device: PhysicalDevice,
    ) -> Result<Self> {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let queue_family_properties =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let queue_families = QueueFamilyIndices::find(&queue_family_properties, |index| {
            surface.get_physical_device_surface_support(physical_device, index)
        })?;

        let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .map_err(InitError::failed("enumerate device extensions"))?
            .iter()
            .map(|extension| {
                unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        let swapchain_support = SwapchainSupportDetails::query(surface, physical_device)?;

        Ok(Self {
            physical_device,
            name,
            queue_families,
            extensions,
            swapchain_support,
        })
    }

    /// Runs the suitability checks in order and reports the first one that fails
    pub fn evaluate(&self, required_extensions: &[&CStr]) -> Result<QueueFamilies, Rejection> {
        let graphics = self
            .queue_families
            .graphics_family
            .ok_or(Rejection::NoGraphicsQueue)?;
        let present = self
            .queue_families
            .present_family
            .ok_or(Rejection::NoPresentQueue)?;
        if let Some(missing) = required_extensions
            .iter()
            .map(|extension| extension.to_string_lossy())
            .find(|extension| !self.extensions.contains(&**extension))
        {
            return Err(Rejection::MissingExtension(missing.into_owned()));
        }
        if !self.swapchain_support.is_adequate() {
            return Err(Rejection::InadequateSwapchain);
        }
        Ok(QueueFamilies { graphics, present })
    }
}

/// The device everything else gets built on
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub physical_device: PhysicalDevice,
    pub name: String,
    pub queue_families: QueueFamilies,
    pub swapchain_support: SwapchainSupportDetails,
}

/// Takes the first candidate that passes, in the order given. Candidates are
/// pulled one at a time, so nothing past the winner is ever probed.
pub fn pick_first_suitable<I>(
    candidates: I,
    required_extensions: &[&CStr],
) -> Result<SelectedDevice>
where
    I: IntoIterator<Item = Result<DeviceCandidate>>,
{
    let mut probed = 0;
    for candidate in candidates {
        let candidate = candidate?;
        probed += 1;
        match candidate.evaluate(required_extensions) {
            Ok(queue_families) => {
                info!("Selected GPU: {}", candidate.name);
                debug!("Queue families: {:?}", queue_families);
                return Ok(SelectedDevice {
                    physical_device: candidate.physical_device,
                    name: candidate.name,
                    queue_families,
                    swapchain_support: candidate.swapchain_support,
                });
            }
            Err(rejection) => debug!("Skipping GPU {}: {}", candidate.name, rejection),
        }
    }

    if probed == 0 {
        Err(InitError::NoSuitableDevice(
            "failed to find GPUs with Vulkan support".to_owned(),
        ))
    } else {
        Err(InitError::NoSuitableDevice(
            "failed to find a suitable GPU".to_owned(),
        ))
    }
}

pub fn pick_physical_device(
    instance: &InstanceGuard,
    surface: &SurfaceGuard,
) -> Result<SelectedDevice> {
    let physical_devices = unsafe { instance.enumerate_physical_devices() }
        .map_err(InitError::failed("enumerate physical devices"))?;
    debug!("Found {} physical device(s)", physical_devices.len());
    pick_first_suitable(
        physical_devices
            .into_iter()
            .map(|physical_device| DeviceCandidate::probe(instance, surface, physical_device)),
        &required_device_extensions(),
    )
}
