use std::rc::Rc;

use ash::{
    extensions::ext::DebugUtils,
    vk::{
        DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
        DebugUtilsMessengerCreateInfoEXT, DebugUtilsMessengerCreateInfoEXTBuilder,
        DebugUtilsMessengerEXT, Handle,
    },
};
use tracing::debug;

use crate::{
    error::{InitError, Result},
    instance::InstanceGuard,
    ledger::ResourceKind,
    logging::vulkan_debug_utils_callback,
};

pub fn get_debug_utils_create_info<'a>() -> DebugUtilsMessengerCreateInfoEXTBuilder<'a> {
    DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            DebugUtilsMessageSeverityFlagsEXT::ERROR
                | DebugUtilsMessageSeverityFlagsEXT::WARNING
                | DebugUtilsMessageSeverityFlagsEXT::INFO
                | DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
        )
        .message_type(
            DebugUtilsMessageTypeFlagsEXT::GENERAL
                | DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                | DebugUtilsMessageTypeFlagsEXT::VALIDATION,
        )
        .pfn_user_callback(Some(vulkan_debug_utils_callback))
}

/// RAII for the debug messenger that routes validation output into the log
pub struct DebugMessengerGuard {
    debug_utils: DebugUtils,
    messenger: DebugUtilsMessengerEXT,
    // need to keep a reference to instance to ensure we get dropped before instance does
    instance: Rc<InstanceGuard>,
}

impl DebugMessengerGuard {
    pub fn try_new(instance: &Rc<InstanceGuard>) -> Result<Self> {
        let create_info = get_debug_utils_create_info();
        let debug_utils = DebugUtils::new(instance.entry(), instance);
        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(InitError::failed("create debug messenger"))?;
        instance
            .ledger()
            .created(ResourceKind::DebugMessenger, messenger.as_raw());
        debug!("Debug messenger registered");
        Ok(Self {
            debug_utils,
            messenger,
            instance: Rc::clone(instance),
        })
    }
}

impl Drop for DebugMessengerGuard {
    fn drop(&mut self) {
        self.instance
            .ledger()
            .released(ResourceKind::DebugMessenger, self.messenger.as_raw());
        unsafe {
            self.debug_utils
                .destroy_debug_utils_messenger(self.messenger, None)
        }
    }
}
