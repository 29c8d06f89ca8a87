pub mod app;
pub mod command_pool;
pub mod config;
pub mod debug_utils;
pub mod error;
pub mod framebuffer;
pub mod guard_list;
pub mod image_view;
pub mod instance;
pub mod ledger;
pub mod logging;
pub mod logical_device;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod window;

pub use app::App;
pub use error::{InitError, Result};
pub use ledger::{LedgerViolation, ResourceKind, ResourceLedger};
