use std::{ops::Deref, rc::Rc};

use ash::vk::{Extent2D, Framebuffer, FramebufferCreateInfo, Handle};
use tracing::debug;

use crate::{
    error::{InitError, Result},
    guard_list::GuardList,
    image_view::ImageViewGuard,
    ledger::ResourceKind,
    logical_device::LogicalDeviceGuard,
    render_pass::RenderPassGuard,
};

pub struct FramebufferGuard {
    framebuffer: Framebuffer,
    logical_device: Rc<LogicalDeviceGuard>,
    _render_pass: Rc<RenderPassGuard>,
    // the attachment has to outlive the framebuffer reading it
    _image_view: Rc<ImageViewGuard>,
}

impl FramebufferGuard {
    pub const LAYERS: u32 = 1;

    pub fn try_new(
        image_view: &Rc<ImageViewGuard>,
        render_pass: &Rc<RenderPassGuard>,
        extent: Extent2D,
        logical_device: &Rc<LogicalDeviceGuard>,
    ) -> Result<Self> {
        // the render pass has exactly one color attachment and nothing else
        let attachments = [***image_view];
        let framebuffer_create_info = FramebufferCreateInfo::builder()
            .render_pass(***render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(Self::LAYERS);
        let framebuffer =
            unsafe { logical_device.create_framebuffer(&framebuffer_create_info, None) }
                .map_err(InitError::failed("create framebuffer"))?;
        logical_device
            .ledger()
            .created(ResourceKind::Framebuffer, framebuffer.as_raw());

        Ok(Self {
            framebuffer,
            logical_device: Rc::clone(logical_device),
            _render_pass: Rc::clone(render_pass),
            _image_view: Rc::clone(image_view),
        })
    }

    /// One framebuffer per image view, in the same order
    pub fn for_image_views(
        image_views: &[Rc<ImageViewGuard>],
        render_pass: &Rc<RenderPassGuard>,
        extent: Extent2D,
        logical_device: &Rc<LogicalDeviceGuard>,
    ) -> Result<GuardList<Self>> {
        let framebuffers = image_views
            .iter()
            .map(|image_view| Self::try_new(image_view, render_pass, extent, logical_device))
            .collect::<Result<GuardList<_>>>()?;
        debug!("Created {} framebuffers", framebuffers.len());
        Ok(framebuffers)
    }
}

impl Drop for FramebufferGuard {
    fn drop(&mut self) {
        self.logical_device
            .ledger()
            .released(ResourceKind::Framebuffer, self.framebuffer.as_raw());
        unsafe {
            self.logical_device
                .destroy_framebuffer(self.framebuffer, None)
        }
    }
}

impl Deref for FramebufferGuard {
    type Target = Framebuffer;

    fn deref(&self) -> &Self::Target {
        &self.framebuffer
    }
}
