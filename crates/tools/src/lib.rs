//! Caller-facing skill tools: the toolset cache, the four boundary
//! operations, and the registry that exposes them by name.

mod cache;
mod registry;
mod tool_functions;

pub use cache::ToolsetCache;
pub use registry::{
    ListSkillsTool, LoadSkillTool, ReadSkillResourceTool, RunSkillScriptTool, SkillCapabilityTool, SkillToolRegistry,
};
pub use tool_functions::{SkillTools, ToolOutcome};
