use std::ffi::CStr;

use ash::{extensions::khr::Swapchain, vk::API_VERSION_1_0};

pub const WINDOW_WIDTH: u32 = 800;
pub const WINDOW_HEIGHT: u32 = 600;
pub const WINDOW_TITLE: &str = "Vulkan";

pub const API_VERSION: u32 = API_VERSION_1_0;
pub const ENGINE_NAME: &str = "No Engine";

pub const VERTEX_SHADER_PATH: &str = "target/shaders/vert.spv";
pub const FRAGMENT_SHADER_PATH: &str = "target/shaders/frag.spv";
pub const SHADER_ENTRY_POINT: &str = "main";

pub const VALIDATION_LAYERS: &[&str] = &["VK_LAYER_KHRONOS_validation"];

#[cfg(feature = "enable_validations")]
pub const ENABLE_VALIDATIONS: bool = true;
#[cfg(not(feature = "enable_validations"))]
pub const ENABLE_VALIDATIONS: bool = false;

/// Device extensions every candidate GPU has to support
pub fn required_device_extensions() -> [&'static CStr; 1] {
    [Swapchain::name()]
}
