use std::{fs, io::Cursor, ops::Deref, path::Path, rc::Rc};

use ash::{
    util::read_spv,
    vk::{Handle, ShaderModule, ShaderModuleCreateInfo},
};
use tracing::debug;

use crate::{
    error::{InitError, Result},
    ledger::ResourceKind,
    logical_device::LogicalDeviceGuard,
};

const SPIRV_MAGIC_NUMBER: u32 = 0x0723_0203;

/// Reads a SPIR-V blob into words. The file has to exist, hold a whole number
/// of 32 bit words and start with the SPIR-V magic number. Blobs written in the
/// opposite byte order are swapped into host order.
pub fn read_shader_code(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| InitError::ResourceNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded {} ({} bytes)", path.display(), bytes.len());
    let code = read_spv(&mut Cursor::new(bytes)).map_err(InitError::failed("load shader code"))?;
    match code.first() {
        Some(&SPIRV_MAGIC_NUMBER) => Ok(code),
        Some(_) => Err(InitError::failed("load shader code")(format!(
            "{} does not start with the SPIR-V magic number",
            path.display()
        ))),
        None => Err(InitError::failed("load shader code")(format!(
            "{} is empty",
            path.display()
        ))),
    }
}

/// Only lives until the pipeline that uses it has been built
pub struct ShaderModuleGuard {
    shader_module: ShaderModule,
    logical_device: Rc<LogicalDeviceGuard>,
}

impl ShaderModuleGuard {
    pub fn try_new(
        path: impl AsRef<Path>,
        logical_device: &Rc<LogicalDeviceGuard>,
    ) -> Result<Self> {
        let code = read_shader_code(path)?;
        let create_info = ShaderModuleCreateInfo::builder().code(&code);
        let shader_module = unsafe { logical_device.create_shader_module(&create_info, None) }
            .map_err(InitError::failed("create shader module"))?;
        logical_device
            .ledger()
            .created(ResourceKind::ShaderModule, shader_module.as_raw());
        Ok(Self {
            shader_module,
            logical_device: Rc::clone(logical_device),
        })
    }
}

impl Drop for ShaderModuleGuard {
    fn drop(&mut self) {
        self.logical_device
            .ledger()
            .released(ResourceKind::ShaderModule, self.shader_module.as_raw());
        unsafe {
            self.logical_device
                .destroy_shader_module(self.shader_module, None)
        }
    }
}

impl Deref for ShaderModuleGuard {
    type Target = ShaderModule;

    fn deref(&self) -> &Self::Target {
        &self.shader_module
    }
}

#[cfg(test)]
mod tests {
    use std::{env, path::PathBuf, process};

    use super::*;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let file_name = format!("{}-{}-{}", env!("CARGO_PKG_NAME"), process::id(), name);
        let path = env::temp_dir().join(file_name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_whole_words() {
        // SPIR-V magic number followed by one more word
        let mut contents = SPIRV_MAGIC_NUMBER.to_ne_bytes().to_vec();
        contents.extend_from_slice(&7u32.to_ne_bytes());
        let path = temp_file("words.spv", &contents);

        let code = read_shader_code(&path).unwrap();
        assert_eq!(code, vec![SPIRV_MAGIC_NUMBER, 7]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_resource_not_found() {
        let path = env::temp_dir().join("definitely-not-a-shader.spv");
        let err = read_shader_code(&path).unwrap_err();
        match err {
            InitError::ResourceNotFound { path: missing, .. } => assert_eq!(missing, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let path = temp_file("truncated.spv", &[0x03, 0x02, 0x23, 0x07, 0x01]);
        let err = read_shader_code(&path).unwrap_err();
        assert!(matches!(err, InitError::Initialization { .. }));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn empty_blob_is_rejected() {
        let path = temp_file("empty.spv", &[]);
        let err = read_shader_code(&path).unwrap_err();
        assert!(matches!(err, InitError::Initialization { .. }));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn opposite_byte_order_is_swapped() {
        let mut contents = SPIRV_MAGIC_NUMBER.swap_bytes().to_ne_bytes().to_vec();
        contents.extend_from_slice(&7u32.swap_bytes().to_ne_bytes());
        let path = temp_file("swapped.spv", &contents);

        let code = read_shader_code(&path).unwrap();
        assert_eq!(code, vec![SPIRV_MAGIC_NUMBER, 7]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_magic_number_is_rejected() {
        let mut contents = 0xdead_beefu32.to_ne_bytes().to_vec();
        contents.extend_from_slice(&7u32.to_ne_bytes());
        let path = temp_file("garbage.spv", &contents);
        let err = read_shader_code(&path).unwrap_err();
        assert!(matches!(err, InitError::Initialization { .. }));
        fs::remove_file(path).unwrap();
    }
}
