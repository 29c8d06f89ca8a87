use std::rc::Rc;

use ash::vk::{
    ClearColorValue, ClearValue, CommandBuffer, CommandBufferAllocateInfo, CommandBufferBeginInfo,
    CommandBufferLevel, CommandPool, CommandPoolCreateInfo, Extent2D, Framebuffer, Handle, Offset2D,
    PipelineBindPoint, Rect2D, RenderPassBeginInfo, SubpassContents,
};
use tracing::debug;

use crate::{
    error::{InitError, Result},
    framebuffer::FramebufferGuard,
    ledger::ResourceKind,
    logical_device::LogicalDeviceGuard,
    pipeline::GraphicsPipelineGuard,
    render_pass::RenderPassGuard,
};

/// Draw call baked into every command buffer
pub const VERTEX_COUNT: u32 = 3;
pub const INSTANCE_COUNT: u32 = 1;

/// RAII for the command pool. Its buffers are freed along with it.
pub struct CommandPoolGuard {
    command_buffers: Vec<CommandBuffer>,
    command_pool: CommandPool,
    logical_device: Rc<LogicalDeviceGuard>,
}

impl CommandPoolGuard {
    pub fn try_new(logical_device: &Rc<LogicalDeviceGuard>) -> Result<Self> {
        debug!("Creating command pool...");

        // buffers are recorded once and never reset, so no flags
        let command_pool_create_info = CommandPoolCreateInfo::builder()
            .queue_family_index(logical_device.queue_families().graphics);
        let command_pool =
            unsafe { logical_device.create_command_pool(&command_pool_create_info, None) }
                .map_err(InitError::failed("create command pool"))?;
        logical_device
            .ledger()
            .created(ResourceKind::CommandPool, command_pool.as_raw());

        Ok(Self {
            command_buffers: Vec::new(),
            command_pool,
            logical_device: Rc::clone(logical_device),
        })
    }

    /// Allocates one primary buffer per framebuffer and records the triangle
    /// draw into each of them.
    pub fn record_draw_commands(
        &mut self,
        framebuffers: &[FramebufferGuard],
        render_pass: &RenderPassGuard,
        graphics_pipeline: &GraphicsPipelineGuard,
        extent: Extent2D,
    ) -> Result<()> {
        let command_buffer_count = u32::try_from(framebuffers.len())
            .map_err(InitError::failed("allocate command buffers"))?;
        let command_buffer_allocate_info = CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(CommandBufferLevel::PRIMARY)
            .command_buffer_count(command_buffer_count);
        self.command_buffers = unsafe {
            self.logical_device
                .allocate_command_buffers(&command_buffer_allocate_info)
        }
        .map_err(InitError::failed("allocate command buffers"))?;

        for (command_buffer, framebuffer) in self.command_buffers.iter().zip(framebuffers) {
            self.record_command_buffer(
                *command_buffer,
                **framebuffer,
                render_pass,
                graphics_pipeline,
                extent,
            )?;
        }
        debug!("Recorded {} command buffers", self.command_buffers.len());
        Ok(())
    }

    fn record_command_buffer(
        &self,
        command_buffer: CommandBuffer,
        framebuffer: Framebuffer,
        render_pass: &RenderPassGuard,
        graphics_pipeline: &GraphicsPipelineGuard,
        extent: Extent2D,
    ) -> Result<()> {
        let command_buffer_begin_info = CommandBufferBeginInfo::builder();
        unsafe {
            self.logical_device
                .begin_command_buffer(command_buffer, &command_buffer_begin_info)
        }
        .map_err(InitError::failed("begin recording command buffer"))?;

        let clear_values = [clear_color()];
        let render_pass_begin_info = RenderPassBeginInfo::builder()
            .render_pass(**render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area(extent))
            .clear_values(&clear_values);
        unsafe {
            self.logical_device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin_info,
                SubpassContents::INLINE,
            );
            self.logical_device.cmd_bind_pipeline(
                command_buffer,
                PipelineBindPoint::GRAPHICS,
                **graphics_pipeline,
            );
            self.logical_device
                .cmd_draw(command_buffer, VERTEX_COUNT, INSTANCE_COUNT, 0, 0);
            self.logical_device.cmd_end_render_pass(command_buffer);
            self.logical_device.end_command_buffer(command_buffer)
        }
        .map_err(InitError::failed("record command buffer"))
    }

    pub fn command_buffers(&self) -> &[CommandBuffer] {
        &self.command_buffers
    }
}

impl Drop for CommandPoolGuard {
    fn drop(&mut self) {
        self.logical_device
            .ledger()
            .released(ResourceKind::CommandPool, self.command_pool.as_raw());
        // destroying the pool frees every buffer allocated from it
        unsafe {
            self.logical_device
                .destroy_command_pool(self.command_pool, None)
        }
    }
}

fn render_area(extent: Extent2D) -> Rect2D {
    Rect2D::builder()
        .offset(Offset2D::default())
        .extent(extent)
        .build()
}

/// Opaque black
#[inline]
const fn clear_color() -> ClearValue {
    ClearValue {
        color: ClearColorValue {
            float32: [0.0, 0.0, 0.0, 1.0],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_to_opaque_black() {
        let color = unsafe { clear_color().color.float32 };
        assert_eq!(color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn render_area_is_the_whole_extent() {
        let extent = Extent2D {
            width: 1280,
            height: 720,
        };
        let area = render_area(extent);
        assert_eq!(area.offset, Offset2D { x: 0, y: 0 });
        assert_eq!(area.extent, extent);
    }
}
