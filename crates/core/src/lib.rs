//! Shared foundations for the skillhost workspace: the wiring-level error
//! type, tool configuration resolution, and the logging bootstrap.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    CacheKey, Capability, EnvSource, InstallationContext, ProcessEnv, SkillsToolConfig, StaticSecrets,
    ToolConfigResolver, normalize_sequence, split_legacy,
};
pub use error::{ConfigError, Error, Result};
