use std::{path::Path, rc::Rc};

use ash::Entry;
use tracing::{debug, info};

use crate::{
    command_pool::CommandPoolGuard,
    config::{
        ENABLE_VALIDATIONS, FRAGMENT_SHADER_PATH, VERTEX_SHADER_PATH, WINDOW_HEIGHT, WINDOW_TITLE,
        WINDOW_WIDTH,
    },
    debug_utils::DebugMessengerGuard,
    error::{InitError, Result},
    framebuffer::FramebufferGuard,
    guard_list::GuardList,
    image_view::ImageViewGuard,
    instance::InstanceGuard,
    ledger::ResourceLedger,
    logical_device::LogicalDeviceGuard,
    physical_device::pick_physical_device,
    pipeline::{GraphicsPipelineGuard, PipelineLayoutGuard, ShaderPaths},
    render_pass::RenderPassGuard,
    surface::SurfaceGuard,
    swapchain::SwapchainGuard,
    window::WindowSystem,
};

/// Everything needed to put the triangle on screen.
///
/// Fields are declared in the reverse of the order they are created in, so
/// dropping the app releases them newest first.
pub struct App {
    /// Pool holding one pre-recorded command buffer per framebuffer
    command_pool: CommandPoolGuard,
    /// One framebuffer per image view
    framebuffers: GuardList<FramebufferGuard>,
    graphics_pipeline: GraphicsPipelineGuard,
    _pipeline_layout: Rc<PipelineLayoutGuard>,
    _render_pass: Rc<RenderPassGuard>,
    /// One view per swapchain image
    image_views: GuardList<Rc<ImageViewGuard>>,
    swapchain: Rc<SwapchainGuard>,
    /// The logical device for interfacing with the
    /// physical hardware
    logical_device: Rc<LogicalDeviceGuard>,
    _surface: Rc<SurfaceGuard>,
    /// Only present when validations are enabled
    _debug_messenger: Option<DebugMessengerGuard>,
    /// The instance for interacting with Vulkan core
    _instance: Rc<InstanceGuard>,
    /// The actual window presented to the user.
    /// Has to outlive every Vulkan object, so it goes last
    window: WindowSystem,
}

impl App {
    /// Builds every stage in dependency order. If one fails, whatever was
    /// already built is released in reverse before the error is returned.
    pub fn new(ledger: &Rc<ResourceLedger>) -> Result<Self> {
        let window = WindowSystem::try_new(WINDOW_WIDTH, WINDOW_HEIGHT, WINDOW_TITLE, ledger)?;

        let instance = InstanceGuard::try_new(
            Entry::linked(),
            window.required_instance_extensions()?,
            ENABLE_VALIDATIONS,
            ledger,
        )?;
        let debug_messenger = if instance.validations_enabled() {
            Some(DebugMessengerGuard::try_new(&instance)?)
        } else {
            None
        };
        let surface = SurfaceGuard::try_new(&instance, &window)?;

        let selected = pick_physical_device(&instance, &surface)?;
        let logical_device = LogicalDeviceGuard::try_new(&instance, &selected)?;
        let queues = logical_device.queues();
        debug!(
            "Graphics queue {:?}, present queue {:?}, shared: {}",
            queues.graphics,
            queues.present,
            queues.graphics == queues.present
        );

        let swapchain = SwapchainGuard::try_new(
            &logical_device,
            &surface,
            &selected.swapchain_support,
            window.framebuffer_size(),
        )?;
        let extent = swapchain.extent();
        let image_views = ImageViewGuard::for_swapchain(&swapchain, &logical_device)?;

        let render_pass =
            RenderPassGuard::try_new(&logical_device, swapchain.surface_format().format)?;
        let pipeline_layout = PipelineLayoutGuard::try_new(&logical_device)?;
        let graphics_pipeline = GraphicsPipelineGuard::try_new(
            &logical_device,
            &render_pass,
            &pipeline_layout,
            extent,
            ShaderPaths {
                vertex: Path::new(VERTEX_SHADER_PATH),
                fragment: Path::new(FRAGMENT_SHADER_PATH),
            },
        )?;

        let framebuffers =
            FramebufferGuard::for_image_views(&image_views, &render_pass, extent, &logical_device)?;
        let mut command_pool = CommandPoolGuard::try_new(&logical_device)?;
        command_pool.record_draw_commands(&framebuffers, &render_pass, &graphics_pipeline, extent)?;

        debug_assert_eq!(image_views.len(), swapchain.images().len());
        debug_assert_eq!(framebuffers.len(), image_views.len());
        debug_assert_eq!(command_pool.command_buffers().len(), framebuffers.len());
        info!(
            "Initialized on {} with {} swapchain images, {} live objects",
            selected.name,
            swapchain.images().len(),
            ledger.live_count()
        );

        Ok(Self {
            command_pool,
            framebuffers,
            graphics_pipeline,
            _pipeline_layout: pipeline_layout,
            _render_pass: render_pass,
            image_views,
            swapchain,
            logical_device,
            _surface: surface,
            _debug_messenger: debug_messenger,
            _instance: instance,
            window,
        })
    }

    /// Polls window events until the window is asked to close, then waits for
    /// the device to go idle. The recorded command buffers are never
    /// submitted, so nothing is presented.
    pub fn run(mut self) -> Result<()> {
        info!("Entering main loop");
        while !self.window.should_close() {
            self.window.poll_events();
        }
        debug!(
            "Main loop exited, {} command buffers for pipeline {:?} left unsubmitted",
            self.command_pool.command_buffers().len(),
            *self.graphics_pipeline
        );
        debug!(
            "Swapchain {:?} ran at {:?} in {:?}",
            self.swapchain.handle(),
            self.swapchain.extent(),
            self.swapchain.present_mode()
        );

        unsafe { self.logical_device.device_wait_idle() }
            .map_err(InitError::failed("wait for the device to go idle"))?;
        info!(
            "Shutting down, releasing {} framebuffers and {} image views",
            self.framebuffers.len(),
            self.image_views.len()
        );
        Ok(())
    }
}
