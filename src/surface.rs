use std::{ops::Deref, rc::Rc};

use ash::{
    extensions::khr::Surface,
    vk::{
        Handle, PhysicalDevice, PresentModeKHR, SurfaceCapabilitiesKHR, SurfaceFormatKHR,
        SurfaceKHR,
    },
};

use crate::{
    error::{InitError, Result},
    instance::InstanceGuard,
    ledger::ResourceKind,
    window::WindowSystem,
};

/// RAII for Surface
pub struct SurfaceGuard {
    surface: Surface,
    surface_ptr: SurfaceKHR,
    // need to keep a reference to instance to ensure we get dropped before it
    instance: Rc<InstanceGuard>,
}

impl SurfaceGuard {
    pub fn try_new(instance: &Rc<InstanceGuard>, window: &WindowSystem) -> Result<Rc<Self>> {
        let surface_ptr = window.create_surface(instance.handle())?;
        instance
            .ledger()
            .created(ResourceKind::Surface, surface_ptr.as_raw());
        let surface = Surface::new(instance.entry(), instance);
        Ok(Rc::new(Self {
            surface,
            surface_ptr,
            instance: Rc::clone(instance),
        }))
    }

    pub fn get_capabilities(&self, device: PhysicalDevice) -> Result<SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface
                .get_physical_device_surface_capabilities(device, self.surface_ptr)
        }
        .map_err(InitError::failed("query surface capabilities"))
    }

    pub fn get_surface_formats(&self, device: PhysicalDevice) -> Result<Vec<SurfaceFormatKHR>> {
        unsafe {
            self.surface
                .get_physical_device_surface_formats(device, self.surface_ptr)
        }
        .map_err(InitError::failed("query surface formats"))
    }

    pub fn get_presentation_modes(&self, device: PhysicalDevice) -> Result<Vec<PresentModeKHR>> {
        unsafe {
            self.surface
                .get_physical_device_surface_present_modes(device, self.surface_ptr)
        }
        .map_err(InitError::failed("query surface present modes"))
    }

    pub fn get_physical_device_surface_support(
        &self,
        device: PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool> {
        unsafe {
            self.surface.get_physical_device_surface_support(
                device,
                queue_family_index,
                self.surface_ptr,
            )
        }
        .map_err(InitError::failed("query surface support"))
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        self.instance
            .ledger()
            .released(ResourceKind::Surface, self.surface_ptr.as_raw());
        unsafe { self.surface.destroy_surface(self.surface_ptr, None) }
    }
}

impl Deref for SurfaceGuard {
    type Target = SurfaceKHR;

    fn deref(&self) -> &Self::Target {
        &self.surface_ptr
    }
}
