//! Static registry binding capability names to their implementations.
//!
//! Built once per configuration at start-up. Excluded capabilities are never
//! registered, so a caller can only see and invoke what the configuration
//! allows.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use skillhost_core::{Capability, Error, Result, SkillsToolConfig};
use skillhost_skills::{RunContext, ScriptArgs};

use crate::tool_functions::{SkillTools, ToolOutcome};

/// A skill capability exposed to an external caller.
#[async_trait]
pub trait SkillCapabilityTool: Send + Sync + fmt::Debug {
    fn capability(&self) -> Capability;

    /// Returns the canonical tool name of this capability
    fn name(&self) -> &'static str {
        self.capability().tool_name()
    }

    fn description(&self) -> &'static str;

    /// JSON schema of the accepted arguments
    fn parameters(&self) -> Value;

    /// Run the capability with caller-supplied JSON arguments. Malformed
    /// arguments are a runtime failure, not a wiring error.
    async fn invoke(&self, config: &SkillsToolConfig, args: &Value, ctx: &RunContext) -> Result<ToolOutcome<String>>;
}

fn required_str<'a>(args: &'a Value, key: &str) -> std::result::Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Error: missing required argument '{key}'"))
}

fn script_args(args: &Value) -> std::result::Result<Option<ScriptArgs>, String> {
    match args.get("args") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err("Error: argument 'args' must be an object".to_string()),
    }
}

fn name_schema(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

#[derive(Debug, Clone)]
pub struct ListSkillsTool(SkillTools);

#[async_trait]
impl SkillCapabilityTool for ListSkillsTool {
    fn capability(&self) -> Capability {
        Capability::ListSkills
    }

    fn description(&self) -> &'static str {
        "List all available skills with their descriptions."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, config: &SkillsToolConfig, _args: &Value, _ctx: &RunContext) -> Result<ToolOutcome<String>> {
        let outcome = self.0.list_skills(config).await?;
        Ok(match outcome {
            ToolOutcome::Success(listing) => match serde_json::to_string_pretty(&listing) {
                Ok(text) => ToolOutcome::Success(text),
                Err(e) => ToolOutcome::Failure(format!("Error: Failed to list skills: {e}")),
            },
            ToolOutcome::Failure(message) => ToolOutcome::Failure(message),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoadSkillTool(SkillTools);

#[async_trait]
impl SkillCapabilityTool for LoadSkillTool {
    fn capability(&self) -> Capability {
        Capability::LoadSkill
    }

    fn description(&self) -> &'static str {
        "Load the full instructions of a skill, including its resources and scripts."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "skill_name": name_schema("Exact name from the available skills list"),
            },
            "required": ["skill_name"],
        })
    }

    async fn invoke(&self, config: &SkillsToolConfig, args: &Value, _ctx: &RunContext) -> Result<ToolOutcome<String>> {
        let skill_name = match required_str(args, "skill_name") {
            Ok(name) => name,
            Err(message) => return Ok(ToolOutcome::Failure(message)),
        };
        self.0.load_skill(config, skill_name).await
    }
}

#[derive(Debug, Clone)]
pub struct ReadSkillResourceTool(SkillTools);

#[async_trait]
impl SkillCapabilityTool for ReadSkillResourceTool {
    fn capability(&self) -> Capability {
        Capability::ReadSkillResource
    }

    fn description(&self) -> &'static str {
        "Read a skill resource file or invoke a callable resource."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "skill_name": name_schema("Name of the skill containing the resource"),
                "resource_name": name_schema("Exact name of the resource as listed in the skill"),
                "args": { "type": "object", "description": "Arguments for callable resources" },
            },
            "required": ["skill_name", "resource_name"],
        })
    }

    async fn invoke(&self, config: &SkillsToolConfig, args: &Value, ctx: &RunContext) -> Result<ToolOutcome<String>> {
        let parsed = required_str(args, "skill_name")
            .and_then(|skill| Ok((skill, required_str(args, "resource_name")?, script_args(args)?)));
        let (skill_name, resource_name, extra) = match parsed {
            Ok(parsed) => parsed,
            Err(message) => return Ok(ToolOutcome::Failure(message)),
        };
        self.0.read_skill_resource(config, skill_name, resource_name, extra.as_ref(), ctx).await
    }
}

#[derive(Debug, Clone)]
pub struct RunSkillScriptTool(SkillTools);

#[async_trait]
impl SkillCapabilityTool for RunSkillScriptTool {
    fn capability(&self) -> Capability {
        Capability::RunSkillScript
    }

    fn description(&self) -> &'static str {
        "Execute a skill script with optional arguments."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "skill_name": name_schema("Name of the skill containing the script"),
                "script_name": name_schema("Exact name of the script as listed in the skill"),
                "args": { "type": "object", "description": "Arguments passed to the script as --key value" },
            },
            "required": ["skill_name", "script_name"],
        })
    }

    async fn invoke(&self, config: &SkillsToolConfig, args: &Value, ctx: &RunContext) -> Result<ToolOutcome<String>> {
        let parsed = required_str(args, "skill_name")
            .and_then(|skill| Ok((skill, required_str(args, "script_name")?, script_args(args)?)));
        let (skill_name, script_name, extra) = match parsed {
            Ok(parsed) => parsed,
            Err(message) => return Ok(ToolOutcome::Failure(message)),
        };
        self.0.run_skill_script(config, skill_name, script_name, extra.as_ref(), ctx).await
    }
}

/// Capabilities available under one configuration.
#[derive(Debug, Clone)]
pub struct SkillToolRegistry {
    config: SkillsToolConfig,
    tools: BTreeMap<Capability, Arc<dyn SkillCapabilityTool>>,
}

impl SkillToolRegistry {
    /// Register every capability the configuration does not exclude.
    pub fn for_config(tools: &SkillTools, config: SkillsToolConfig) -> Self {
        let mut registered: BTreeMap<Capability, Arc<dyn SkillCapabilityTool>> = BTreeMap::new();
        for capability in config.enabled_capabilities() {
            let tool: Arc<dyn SkillCapabilityTool> = match capability {
                Capability::ListSkills => Arc::new(ListSkillsTool(tools.clone())),
                Capability::LoadSkill => Arc::new(LoadSkillTool(tools.clone())),
                Capability::ReadSkillResource => Arc::new(ReadSkillResourceTool(tools.clone())),
                Capability::RunSkillScript => Arc::new(RunSkillScriptTool(tools.clone())),
            };
            registered.insert(capability, tool);
        }
        tracing::debug!(tools = registered.len(), excluded = config.exclude.len(), "registered skill tools");
        Self { config, tools: registered }
    }

    pub fn config(&self) -> &SkillsToolConfig {
        &self.config
    }

    /// Look up a tool by short capability name or canonical tool name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn SkillCapabilityTool>> {
        let capability: Capability = name.parse().ok()?;
        self.tools.get(&capability).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Canonical names of the registered tools.
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.values().map(|t| t.name()).collect()
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Invoke a registered tool. Unknown or excluded names are wiring errors.
    pub async fn invoke(&self, name: &str, args: &Value, ctx: &RunContext) -> Result<ToolOutcome<String>> {
        let tool = self.get(name).ok_or_else(|| Error::Unregistered(name.to_string()))?;
        tool.invoke(&self.config, args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ToolsetCache;

    fn registry(exclude: Vec<Capability>) -> SkillToolRegistry {
        let tools = SkillTools::new(Arc::new(ToolsetCache::default()));
        SkillToolRegistry::for_config(&tools, SkillsToolConfig::new(Vec::new()).with_exclude(exclude))
    }

    #[test]
    fn test_registers_all_capabilities() {
        let registry = registry(Vec::new());
        assert_eq!(registry.count(), 4);
        assert_eq!(
            registry.names(),
            vec![
                "skillhost.tools.list_skills",
                "skillhost.tools.load_skill",
                "skillhost.tools.read_skill_resource",
                "skillhost.tools.run_skill_script",
            ]
        );
        assert!(registry.has("load_skill"));
        assert!(registry.has("skillhost.tools.load_skill"));
        assert!(!registry.has("delete_skill"));
    }

    #[test]
    fn test_excluded_capabilities_are_omitted() {
        let registry = registry(vec![Capability::RunSkillScript]);
        assert_eq!(registry.count(), 3);
        assert!(!registry.has("run_skill_script"));
    }

    #[test]
    fn test_parameter_schemas() {
        let registry = registry(Vec::new());
        let schema = registry.get("run_skill_script").unwrap().parameters();
        assert_eq!(schema["required"], json!(["skill_name", "script_name"]));
        assert_eq!(registry.get("list_skills").unwrap().parameters()["properties"], json!({}));
    }

    #[tokio::test]
    async fn test_invoke_unregistered_is_wiring_error() {
        let registry = registry(vec![Capability::RunSkillScript]);
        let err = registry
            .invoke("run_skill_script", &json!({}), &RunContext::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unregistered(name) if name == "run_skill_script"));
    }

    #[tokio::test]
    async fn test_invoke_list_on_empty_config() {
        let registry = registry(Vec::new());
        let outcome = registry.invoke("list_skills", &json!({}), &RunContext::empty()).await.unwrap();
        assert_eq!(outcome, ToolOutcome::Success("{}".to_string()));
    }

    #[tokio::test]
    async fn test_invoke_with_missing_argument_is_runtime_failure() {
        let registry = registry(Vec::new());
        let outcome = registry.invoke("load_skill", &json!({}), &RunContext::empty()).await.unwrap();
        assert_eq!(outcome.failure(), Some("Error: missing required argument 'skill_name'"));

        let outcome = registry
            .invoke("run_skill_script", &json!({"skill_name": "calc", "script_name": "x", "args": [1]}), &RunContext::empty())
            .await
            .unwrap();
        assert!(outcome.failure().unwrap().starts_with("Error"));
    }
}
