//! Skill discovery and the skill capability facade.
//!
//! Skills are directories holding a `SKILL.md` file with YAML frontmatter.
//! A [SkillDiscovery] implementation turns a [DiscoveryRequest] into a
//! [Toolset], and a [SkillAdapter] answers list/load/read/run requests
//! against one toolset.

mod adapter;
mod loader;
mod parser;
mod runner;
mod toolset;
mod types;

pub use adapter::{DEFAULT_SCRIPT_TIMEOUT, SkillAdapter};
pub use loader::{DiscoveryRequest, FilesystemDiscovery, SkillDiscovery};
pub use parser::{SKILL_FILE, parse_skill};
pub use runner::render_args;
pub use toolset::{Toolset, ToolsetBuilder};
pub use types::{
    ResourceLoader, ResourceSource, Result, RunContext, ScriptArgs, ScriptRunner, ScriptSource, ScriptType, Skill,
    SkillError, SkillResource, SkillScript,
};
