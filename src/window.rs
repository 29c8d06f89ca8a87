use std::{mem::MaybeUninit, ptr, rc::Rc};

use ash::vk::{self, Handle, SurfaceKHR};
use glfw::{
    fail_on_errors, Action, ClientApiHint, Context, Glfw, GlfwReceiver, Key, PWindow, WindowEvent,
    WindowHint, WindowMode,
};
use tracing::{debug, trace};

use crate::{
    error::{InitError, Result},
    ledger::{ResourceKind, ResourceLedger},
};

/// Owns the GLFW context and the single window the app draws into.
/// Dropping it destroys the window and then terminates GLFW.
pub struct WindowSystem {
    ledger: Rc<ResourceLedger>,
    // field order matters: the window has to go before glfw is terminated
    window: PWindow,
    receiver: GlfwReceiver<(f64, WindowEvent)>,
    glfw: Glfw,
}

impl WindowSystem {
    pub fn try_new(
        width: u32,
        height: u32,
        title: &str,
        ledger: &Rc<ResourceLedger>,
    ) -> Result<Self> {
        let mut glfw =
            glfw::init(fail_on_errors!()).map_err(InitError::failed("initialize GLFW"))?;
        if !glfw.vulkan_supported() {
            return Err(InitError::UnsupportedFeature(
                "Vulkan presentation".to_owned(),
            ));
        }

        // no OpenGL context, and no resizing since the swapchain is never rebuilt
        glfw.window_hint(WindowHint::ClientApi(ClientApiHint::NoApi));
        glfw.window_hint(WindowHint::Resizable(false));

        let (mut window, receiver) = glfw
            .create_window(width, height, title, WindowMode::Windowed)
            .ok_or_else(|| InitError::failed("create window")("GLFW returned no window"))?;
        window.set_key_polling(true);
        window.set_close_polling(true);

        ledger.created(ResourceKind::Window, window.window_ptr() as u64);
        debug!("Window created: {}x{} \"{}\"", width, height, title);

        Ok(Self {
            ledger: Rc::clone(ledger),
            window,
            receiver,
            glfw,
        })
    }

    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Processes pending events without blocking
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.receiver) {
            trace!("{:?}", event);
            if let WindowEvent::Key(Key::Escape, _, Action::Press, _) = event {
                self.window.set_should_close(true);
            }
        }
    }

    /// Size of the drawable area in pixels
    pub fn framebuffer_size(&self) -> (i32, i32) {
        self.window.get_framebuffer_size()
    }

    /// Instance extensions needed to present to this window's surface type
    pub fn required_instance_extensions(&self) -> Result<Vec<String>> {
        self.glfw.get_required_instance_extensions().ok_or_else(|| {
            InitError::UnsupportedFeature("window surface instance extensions".to_owned())
        })
    }

    /// Creates a raw surface for this window. The caller owns the result and
    /// has to destroy it before the instance.
    pub fn create_surface(&self, instance: vk::Instance) -> Result<SurfaceKHR> {
        let mut surface = MaybeUninit::<SurfaceKHR>::uninit();
        self.window
            .create_window_surface(instance, ptr::null(), surface.as_mut_ptr())
            .result()
            .map_err(InitError::failed("create window surface"))?;
        let surface = unsafe { surface.assume_init() };
        trace!("Window surface {:#x} created", surface.as_raw());
        Ok(surface)
    }
}

impl Drop for WindowSystem {
    fn drop(&mut self) {
        self.ledger
            .released(ResourceKind::Window, self.window.window_ptr() as u64);
    }
}
