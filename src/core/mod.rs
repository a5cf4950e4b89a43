// Public modules
pub mod config;
pub mod context;
pub mod deploy;
pub mod django;
pub mod error;
pub mod render;
pub mod secret;
pub mod ssh;

// Re-export common types for convenience
pub use config::{DeploySettings, FrameworkKind, InitSystem, Options, WebProxy};
pub use context::{DeployContext, DeployRequest};
pub use deploy::{DeployHelper, Framework, Generic};
pub use django::Django;
pub use error::{Error, ErrorCode, Result};
