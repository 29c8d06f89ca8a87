use std::{ops::Deref, rc::Rc};

use ash::vk::{
    ComponentMapping, ComponentSwizzle, Handle, Image, ImageAspectFlags,
    ImageSubresourceRange, ImageView, ImageViewCreateInfo, ImageViewType,
};

use crate::{
    error::{InitError, Result},
    guard_list::GuardList,
    ledger::ResourceKind,
    logical_device::LogicalDeviceGuard,
    swapchain::SwapchainGuard,
};

pub struct ImageViewGuard {
    view: ImageView,
    logical_device: Rc<LogicalDeviceGuard>,
    // the swapchain owns the image being viewed
    _swapchain: Rc<SwapchainGuard>,
}

impl ImageViewGuard {
    pub fn try_new(
        image: Image,
        swapchain: &Rc<SwapchainGuard>,
        logical_device: &Rc<LogicalDeviceGuard>,
    ) -> Result<Rc<Self>> {
        let image_view_create_info = ImageViewCreateInfo::builder()
            .image(image)
            .view_type(ImageViewType::TYPE_2D)
            .format(swapchain.surface_format().format)
            .components(ComponentMapping {
                r: ComponentSwizzle::IDENTITY,
                g: ComponentSwizzle::IDENTITY,
                b: ComponentSwizzle::IDENTITY,
                a: ComponentSwizzle::IDENTITY,
            })
            // color target, no mipmapping, single layer
            .subresource_range(
                ImageSubresourceRange::builder()
                    .aspect_mask(ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1)
                    .build(),
            );
        let view = unsafe { logical_device.create_image_view(&image_view_create_info, None) }
            .map_err(InitError::failed("create image view"))?;
        logical_device
            .ledger()
            .created(ResourceKind::ImageView, view.as_raw());
        Ok(Rc::new(Self {
            view,
            logical_device: Rc::clone(logical_device),
            _swapchain: Rc::clone(swapchain),
        }))
    }

    /// One view per swapchain image, in image order
    pub fn for_swapchain(
        swapchain: &Rc<SwapchainGuard>,
        logical_device: &Rc<LogicalDeviceGuard>,
    ) -> Result<GuardList<Rc<Self>>> {
        swapchain
            .images()
            .iter()
            .map(|image| Self::try_new(*image, swapchain, logical_device))
            .collect()
    }
}

impl Drop for ImageViewGuard {
    fn drop(&mut self) {
        self.logical_device
            .ledger()
            .released(ResourceKind::ImageView, self.view.as_raw());
        unsafe { self.logical_device.destroy_image_view(self.view, None) }
    }
}

impl Deref for ImageViewGuard {
    type Target = ImageView;

    fn deref(&self) -> &Self::Target {
        &self.view
    }
}
