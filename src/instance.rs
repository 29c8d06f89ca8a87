use std::{
    ffi::{CStr, CString},
    ops::Deref,
    rc::Rc,
};

use ash::{
    extensions::ext::DebugUtils,
    vk::{self, make_api_version, ApplicationInfo, Handle, InstanceCreateInfo, LayerProperties},
    Entry, Instance,
};
use tracing::debug;

use crate::{
    config::{API_VERSION, ENGINE_NAME, VALIDATION_LAYERS},
    debug_utils::get_debug_utils_create_info,
    error::{InitError, Result},
    ledger::{ResourceKind, ResourceLedger},
};

/// RAII for Instance. Also keeps the loader entry and the resource ledger,
/// which every object created further down the chain reaches through here.
pub struct InstanceGuard {
    instance: Instance,
    entry: Entry,
    validations_enabled: bool,
    ledger: Rc<ResourceLedger>,
}

impl InstanceGuard {
    /// Creates the instance with the given window system extensions. When
    /// `enable_validations` is set the validation layers have to be present on
    /// the host, and the debug utils extension is added on top.
    pub fn try_new(
        entry: Entry,
        window_extensions: Vec<String>,
        enable_validations: bool,
        ledger: &Rc<ResourceLedger>,
    ) -> Result<Rc<Self>> {
        if enable_validations {
            let available_layers = entry
                .enumerate_instance_layer_properties()
                .map_err(InitError::failed("enumerate instance layers"))?;
            if !layers_supported(&available_layers, VALIDATION_LAYERS) {
                return Err(InitError::UnsupportedFeature(format!(
                    "validation layers {:?}",
                    VALIDATION_LAYERS
                )));
            }
        }

        let appname =
            CString::new(env!("CARGO_PKG_NAME")).map_err(InitError::failed("create instance"))?;
        let engine_name =
            CString::new(ENGINE_NAME).map_err(InitError::failed("create instance"))?;
        let application_info = ApplicationInfo::builder()
            .application_name(&appname)
            .application_version(package_version())
            .engine_name(&engine_name)
            .engine_version(make_api_version(0, 1, 0, 0))
            .api_version(API_VERSION);

        let extension_names = required_extensions(window_extensions, enable_validations)
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(InitError::failed("create instance"))?;
        debug!("Instance extensions: {:?}", extension_names);
        let extension_name_pointers = extension_names
            .iter()
            .map(|extension_name| extension_name.as_ptr())
            .collect::<Vec<_>>();

        let layer_names = requested_layers(enable_validations)
            .iter()
            .map(|layer_name| CString::new(*layer_name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(InitError::failed("create instance"))?;
        debug!("Instance layers: {:?}", layer_names);
        let layer_name_pointers = layer_names
            .iter()
            .map(|layer_name| layer_name.as_ptr())
            .collect::<Vec<_>>();

        // chained in so messages from instance creation itself are caught too
        let mut debug_create_info = get_debug_utils_create_info();
        let mut instance_create_info = InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_extension_names(&extension_name_pointers)
            .enabled_layer_names(&layer_name_pointers);
        if enable_validations {
            instance_create_info = instance_create_info.push_next(&mut debug_create_info);
        }

        let instance = unsafe { entry.create_instance(&instance_create_info, None) }
            .map_err(InitError::failed("create instance"))?;
        ledger.created(ResourceKind::Instance, instance.handle().as_raw());

        Ok(Rc::new(Self {
            instance,
            entry,
            validations_enabled: enable_validations,
            ledger: Rc::clone(ledger),
        }))
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn handle(&self) -> vk::Instance {
        self.instance.handle()
    }

    pub fn validations_enabled(&self) -> bool {
        self.validations_enabled
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.ledger
            .released(ResourceKind::Instance, self.instance.handle().as_raw());
        unsafe { self.instance.destroy_instance(None) }
    }
}

impl Deref for InstanceGuard {
    type Target = Instance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

fn package_version() -> u32 {
    let part = |value: &str| value.parse::<u32>().unwrap_or(0);
    make_api_version(
        0,
        part(env!("CARGO_PKG_VERSION_MAJOR")),
        part(env!("CARGO_PKG_VERSION_MINOR")),
        part(env!("CARGO_PKG_VERSION_PATCH")),
    )
}

/// The window system's extensions, plus debug utils when validating
fn required_extensions(window_extensions: Vec<String>, enable_validations: bool) -> Vec<String> {
    let mut extension_names = window_extensions;
    if enable_validations {
        extension_names.push(DebugUtils::name().to_string_lossy().into_owned());
    }
    extension_names
}

fn requested_layers(enable_validations: bool) -> &'static [&'static str] {
    if enable_validations {
        VALIDATION_LAYERS
    } else {
        &[]
    }
}

/// True if every requested layer shows up in the available list
fn layers_supported(available: &[LayerProperties], requested: &[&str]) -> bool {
    let available_names = available
        .iter()
        .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) }.to_string_lossy())
        .collect::<Vec<_>>();
    requested
        .iter()
        .all(|requested| available_names.iter().any(|name| name == requested))
}

#[cfg(test)]
mod tests {
    use std::os::raw::c_char;

    use super::*;

    fn layer(name: &str) -> LayerProperties {
        let mut properties = LayerProperties::default();
        for (dst, src) in properties.layer_name.iter_mut().zip(name.bytes()) {
            *dst = src as c_char;
        }
        properties
    }

    #[test]
    fn validation_layer_found() {
        let available = [
            layer("VK_LAYER_LUNARG_api_dump"),
            layer("VK_LAYER_KHRONOS_validation"),
        ];
        assert!(layers_supported(&available, VALIDATION_LAYERS));
    }

    #[test]
    fn validation_layer_missing() {
        let available = [layer("VK_LAYER_LUNARG_api_dump")];
        assert!(!layers_supported(&available, VALIDATION_LAYERS));
        assert!(!layers_supported(&[], VALIDATION_LAYERS));
    }

    #[test]
    fn layer_names_must_match_exactly() {
        let available = [layer("VK_LAYER_KHRONOS_validation_extra")];
        assert!(!layers_supported(&available, VALIDATION_LAYERS));
    }

    #[test]
    fn debug_utils_only_added_when_validating() {
        let window_extensions = vec![
            "VK_KHR_surface".to_owned(),
            "VK_KHR_xcb_surface".to_owned(),
        ];
        assert_eq!(
            required_extensions(window_extensions.clone(), false),
            window_extensions
        );

        let with_validations = required_extensions(window_extensions, true);
        assert_eq!(with_validations.len(), 3);
        assert_eq!(with_validations[2], "VK_EXT_debug_utils");
    }

    #[test]
    fn no_layers_without_validations() {
        assert!(requested_layers(false).is_empty());
        assert_eq!(requested_layers(true), VALIDATION_LAYERS);
    }
}
