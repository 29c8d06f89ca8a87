use std::ffi::{c_void, CStr};

use anyhow::Result;
use ash::vk::{
    self, Bool32, DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
    DebugUtilsMessengerCallbackDataEXT,
};
use log::LevelFilter;
use simple_logger::{set_up_color_terminal, SimpleLogger};
use tracing::{event, Level};

/// Sets up console logging. The level defaults to INFO and can be overridden
/// with `RUST_LOG`.
pub fn init() -> Result<()> {
    set_up_color_terminal();
    let logger = SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env();
    logger.init()?;
    Ok(())
}

/// Forwards validation layer messages to the logger at a matching level
pub unsafe extern "system" fn vulkan_debug_utils_callback(
    message_severity: DebugUtilsMessageSeverityFlagsEXT,
    message_type: DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();
    let ty = format!("{:?}", message_type).to_lowercase();

    match message_severity {
        DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            event!(Level::TRACE, message = %message, ty = ty)
        }
        DebugUtilsMessageSeverityFlagsEXT::INFO => {
            event!(Level::INFO, message = %message, ty = ty)
        }
        DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            event!(Level::WARN, message = %message, ty = ty)
        }
        _ => event!(Level::ERROR, message = %message, ty = ty),
    }
    // dont skip driver
    vk::FALSE
}
