use std::{io, path::PathBuf};

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = InitError> = std::result::Result<T, E>;

/// Everything that can abort startup. None of these are recoverable; they
/// bubble up to `main` and end the process.
#[derive(Debug, Error)]
pub enum InitError {
    /// A required object could not be created
    #[error("failed to {action}")]
    Initialization {
        action: &'static str,
        #[source]
        source: BoxError,
    },
    /// A requested layer, extension or platform capability is missing
    #[error("{0} requested, but not available")]
    UnsupportedFeature(String),
    #[error("{0}")]
    NoSuitableDevice(String),
    /// A shader blob could not be read from disk
    #[error("failed to read {}", path.display())]
    ResourceNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InitError {
    /// Returns a closure for `map_err` that tags an error with the step that
    /// failed, e.g. `InitError::failed("create render pass")`.
    pub fn failed<E>(action: &'static str) -> impl FnOnce(E) -> Self
    where
        E: Into<BoxError>,
    {
        move |source| Self::Initialization {
            action,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;

    #[test]
    fn failed_keeps_the_vulkan_result_as_source() {
        let err =
            InitError::failed("create render pass")(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        assert_eq!(err.to_string(), "failed to create render pass");
        let source = std::error::Error::source(&err).expect("source should be kept");
        assert_eq!(
            source.to_string(),
            vk::Result::ERROR_OUT_OF_HOST_MEMORY.to_string()
        );
    }

    #[test]
    fn resource_not_found_names_the_path() {
        let err = InitError::ResourceNotFound {
            path: PathBuf::from("target/shaders/vert.spv"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.to_string(), "failed to read target/shaders/vert.spv");
    }

    #[test]
    fn unsupported_feature_message() {
        let err = InitError::UnsupportedFeature("validation layers".to_owned());
        assert_eq!(
            err.to_string(),
            "validation layers requested, but not available"
        );
    }
}
