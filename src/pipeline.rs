use std::{ffi::CString, ops::Deref, path::Path, rc::Rc};

use ash::vk::{
    ColorComponentFlags, CullModeFlags, Extent2D, FrontFace, GraphicsPipelineCreateInfo, Handle,
    Offset2D, Pipeline, PipelineCache, PipelineColorBlendAttachmentState,
    PipelineColorBlendStateCreateInfo, PipelineInputAssemblyStateCreateInfo, PipelineLayout,
    PipelineLayoutCreateInfo, PipelineMultisampleStateCreateInfo,
    PipelineRasterizationStateCreateInfo, PipelineShaderStageCreateInfo,
    PipelineVertexInputStateCreateInfo, PipelineViewportStateCreateInfo, PolygonMode,
    PrimitiveTopology, Rect2D, SampleCountFlags, ShaderStageFlags, Viewport,
};
use tracing::debug;

use crate::{
    config::SHADER_ENTRY_POINT,
    error::{InitError, Result},
    ledger::ResourceKind,
    logical_device::LogicalDeviceGuard,
    render_pass::RenderPassGuard,
    shader::ShaderModuleGuard,
};

/// RAII for an empty pipeline layout, no descriptor sets or push constants
pub struct PipelineLayoutGuard {
    pipeline_layout: PipelineLayout,
    logical_device: Rc<LogicalDeviceGuard>,
}

impl PipelineLayoutGuard {
    pub fn try_new(logical_device: &Rc<LogicalDeviceGuard>) -> Result<Rc<Self>> {
        let pipeline_layout_info = PipelineLayoutCreateInfo::builder();
        let pipeline_layout =
            unsafe { logical_device.create_pipeline_layout(&pipeline_layout_info, None) }
                .map_err(InitError::failed("create pipeline layout"))?;
        logical_device
            .ledger()
            .created(ResourceKind::PipelineLayout, pipeline_layout.as_raw());
        Ok(Rc::new(Self {
            pipeline_layout,
            logical_device: Rc::clone(logical_device),
        }))
    }
}

impl Drop for PipelineLayoutGuard {
    fn drop(&mut self) {
        self.logical_device
            .ledger()
            .released(ResourceKind::PipelineLayout, self.pipeline_layout.as_raw());
        unsafe {
            self.logical_device
                .destroy_pipeline_layout(self.pipeline_layout, None)
        }
    }
}

impl Deref for PipelineLayoutGuard {
    type Target = PipelineLayout;

    fn deref(&self) -> &Self::Target {
        &self.pipeline_layout
    }
}

/// Where the SPIR-V for each stage lives
#[derive(Debug, Clone, Copy)]
pub struct ShaderPaths<'a> {
    pub vertex: &'a Path,
    pub fragment: &'a Path,
}

/// RAII for the graphics pipeline. Keeps the layout and render pass it was
/// built against alive until it is gone.
pub struct GraphicsPipelineGuard {
    pipeline: Pipeline,
    logical_device: Rc<LogicalDeviceGuard>,
    _pipeline_layout: Rc<PipelineLayoutGuard>,
    _render_pass: Rc<RenderPassGuard>,
}

impl GraphicsPipelineGuard {
    pub fn try_new(
        logical_device: &Rc<LogicalDeviceGuard>,
        render_pass: &Rc<RenderPassGuard>,
        pipeline_layout: &Rc<PipelineLayoutGuard>,
        extent: Extent2D,
        shader_paths: ShaderPaths,
    ) -> Result<Self> {
        debug!("Creating graphics pipeline...");

        // configure shader modules from the compiled .glsl output; both are
        // destroyed when this function returns
        let vertex_shader_module = ShaderModuleGuard::try_new(shader_paths.vertex, logical_device)?;
        let fragment_shader_module =
            ShaderModuleGuard::try_new(shader_paths.fragment, logical_device)?;
        let entry_point_name = CString::new(SHADER_ENTRY_POINT)
            .map_err(InitError::failed("create graphics pipeline"))?;
        let shader_stages = [
            PipelineShaderStageCreateInfo::builder()
                .stage(ShaderStageFlags::VERTEX)
                .module(*vertex_shader_module)
                .name(&entry_point_name)
                .build(),
            PipelineShaderStageCreateInfo::builder()
                .stage(ShaderStageFlags::FRAGMENT)
                .module(*fragment_shader_module)
                .name(&entry_point_name)
                .build(),
        ];

        // vertices are baked into the vertex shader, so there is no input to describe
        let vertex_input_state = PipelineVertexInputStateCreateInfo::builder();

        // how to process vertecies
        let input_assembly_state = PipelineInputAssemblyStateCreateInfo::builder()
            .topology(PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // viewport and clipping (scissoring) settings
        let viewports = [viewport(extent)];
        let scissors = [scissor(extent)];
        let pipeline_viewport_state = PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let pipeline_rasterization_state = rasterization_state();

        // multisampling settings
        let multisampling_state = PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(SampleCountFlags::TYPE_1);

        // color blending to mix colors from previous fragment shader output and new
        // disabling this just takes the new output and passes it thru unchanged
        let color_blend_attachment_states = [color_blend_attachment()];
        let color_blend_state = PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachment_states);

        let pipeline_create_infos = [GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&pipeline_viewport_state)
            .rasterization_state(&pipeline_rasterization_state)
            .multisample_state(&multisampling_state)
            .color_blend_state(&color_blend_state)
            .layout(***pipeline_layout)
            .render_pass(***render_pass)
            .subpass(RenderPassGuard::SUBPASS)
            .build()];

        let pipelines = unsafe {
            logical_device.create_graphics_pipelines(
                PipelineCache::null(),
                &pipeline_create_infos,
                None,
            )
        }
        .map_err(|(_, err)| InitError::failed("create graphics pipeline")(err))?;
        let pipeline = pipelines.into_iter().next().ok_or_else(|| {
            InitError::failed("create graphics pipeline")("no pipeline returned")
        })?;
        logical_device
            .ledger()
            .created(ResourceKind::Pipeline, pipeline.as_raw());

        debug!("Graphics pipeline created");

        Ok(Self {
            pipeline,
            logical_device: Rc::clone(logical_device),
            _pipeline_layout: Rc::clone(pipeline_layout),
            _render_pass: Rc::clone(render_pass),
        })
    }
}

impl Drop for GraphicsPipelineGuard {
    fn drop(&mut self) {
        self.logical_device
            .ledger()
            .released(ResourceKind::Pipeline, self.pipeline.as_raw());
        unsafe { self.logical_device.destroy_pipeline(self.pipeline, None) }
    }
}

impl Deref for GraphicsPipelineGuard {
    type Target = Pipeline;

    fn deref(&self) -> &Self::Target {
        &self.pipeline
    }
}

/// Covers the whole swap extent, depth 0 to 1
fn viewport(extent: Extent2D) -> Viewport {
    Viewport::builder()
        .x(0.0)
        .y(0.0)
        .width(extent.width as f32)
        .height(extent.height as f32)
        .min_depth(0.0)
        .max_depth(1.0)
        .build()
}

fn scissor(extent: Extent2D) -> Rect2D {
    Rect2D::builder()
        .offset(Offset2D { x: 0, y: 0 })
        .extent(extent)
        .build()
}

fn rasterization_state() -> PipelineRasterizationStateCreateInfo {
    PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(CullModeFlags::BACK)
        .front_face(FrontFace::CLOCKWISE)
        .depth_bias_enable(false)
        .build()
}

fn color_blend_attachment() -> PipelineColorBlendAttachmentState {
    PipelineColorBlendAttachmentState::builder()
        .color_write_mask(ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build()
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;

    #[test]
    fn viewport_and_scissor_cover_the_extent() {
        let extent = Extent2D {
            width: 800,
            height: 600,
        };
        let viewport = viewport(extent);
        assert_eq!((viewport.x, viewport.y), (0.0, 0.0));
        assert_eq!((viewport.width, viewport.height), (800.0, 600.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));

        let scissor = scissor(extent);
        assert_eq!(scissor.offset, Offset2D { x: 0, y: 0 });
        assert_eq!(scissor.extent, extent);
    }

    #[test]
    fn rasterizer_fills_and_culls_back_faces() {
        let state = rasterization_state();
        assert_eq!(state.polygon_mode, PolygonMode::FILL);
        assert_eq!(state.cull_mode, CullModeFlags::BACK);
        assert_eq!(state.front_face, FrontFace::CLOCKWISE);
        assert_eq!(state.line_width, 1.0);
        assert_eq!(state.depth_clamp_enable, vk::FALSE);
        assert_eq!(state.depth_bias_enable, vk::FALSE);
        assert_eq!(state.rasterizer_discard_enable, vk::FALSE);
    }

    #[test]
    fn blending_off_all_channels_written() {
        let attachment = color_blend_attachment();
        assert_eq!(attachment.blend_enable, vk::FALSE);
        assert_eq!(attachment.color_write_mask, ColorComponentFlags::RGBA);
    }
}
