use std::{ops::Deref, rc::Rc};

use ash::vk::{
    AttachmentDescription, AttachmentLoadOp, AttachmentReference, AttachmentStoreOp, Format,
    Handle, ImageLayout, PipelineBindPoint, RenderPass, RenderPassCreateInfo, SampleCountFlags,
    SubpassDescription,
};
use tracing::debug;

use crate::{
    error::{InitError, Result},
    ledger::ResourceKind,
    logical_device::LogicalDeviceGuard,
};

pub struct RenderPassGuard {
    render_pass: RenderPass,
    logical_device: Rc<LogicalDeviceGuard>,
}

impl RenderPassGuard {
    /// The only subpass, which the pipeline is built against
    pub const SUBPASS: u32 = 0;

    pub fn try_new(logical_device: &Rc<LogicalDeviceGuard>, format: Format) -> Result<Rc<Self>> {
        let attachment_descriptions = [color_attachment(format)];

        let color_attachment_refs = [AttachmentReference::builder()
            .attachment(0)
            .layout(ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build()];

        let subpass_descriptions = [SubpassDescription::builder()
            .pipeline_bind_point(PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs)
            .build()];

        let render_pass_create_info = RenderPassCreateInfo::builder()
            .attachments(&attachment_descriptions)
            .subpasses(&subpass_descriptions);

        let render_pass =
            unsafe { logical_device.create_render_pass(&render_pass_create_info, None) }
                .map_err(InitError::failed("create render pass"))?;
        logical_device
            .ledger()
            .created(ResourceKind::RenderPass, render_pass.as_raw());
        debug!("Render pass created for {:?}", format);

        Ok(Rc::new(Self {
            render_pass,
            logical_device: Rc::clone(logical_device),
        }))
    }
}

fn color_attachment(format: Format) -> AttachmentDescription {
    AttachmentDescription::builder()
        // ensure attachment format matches that of swapchain
        .format(format)
        // not using multisampling, so stick to 1 sample
        .samples(SampleCountFlags::TYPE_1)
        // clear the data in the attachment before rendering
        .load_op(AttachmentLoadOp::CLEAR)
        // store the results in memory for later use after rendering
        .store_op(AttachmentStoreOp::STORE)
        // not using stencils
        .stencil_load_op(AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(AttachmentStoreOp::DONT_CARE)
        // dont care about layout of previous image, because we're clearing it
        // anyway
        .initial_layout(ImageLayout::UNDEFINED)
        // transition to a layout suitable for presentation
        .final_layout(ImageLayout::PRESENT_SRC_KHR)
        .build()
}

impl Drop for RenderPassGuard {
    fn drop(&mut self) {
        self.logical_device
            .ledger()
            .released(ResourceKind::RenderPass, self.render_pass.as_raw());
        unsafe {
            self.logical_device
                .destroy_render_pass(self.render_pass, None)
        }
    }
}

impl Deref for RenderPassGuard {
    type Target = RenderPass;

    fn deref(&self) -> &Self::Target {
        &self.render_pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_attachment_clears_and_presents() {
        let attachment = color_attachment(Format::B8G8R8A8_SRGB);
        assert_eq!(attachment.format, Format::B8G8R8A8_SRGB);
        assert_eq!(attachment.samples, SampleCountFlags::TYPE_1);
        assert_eq!(attachment.load_op, AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, AttachmentStoreOp::STORE);
        assert_eq!(attachment.stencil_load_op, AttachmentLoadOp::DONT_CARE);
        assert_eq!(attachment.stencil_store_op, AttachmentStoreOp::DONT_CARE);
        assert_eq!(attachment.initial_layout, ImageLayout::UNDEFINED);
        assert_eq!(attachment.final_layout, ImageLayout::PRESENT_SRC_KHR);
    }
}
