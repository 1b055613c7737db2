//! Facade over one [Toolset] implementing the four skill capabilities.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use skillhost_core::config::DEFAULT_SCRIPT_TIMEOUT_SECS;

use crate::toolset::Toolset;
use crate::types::{Result, RunContext, ScriptArgs, Skill, SkillError};

pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_SCRIPT_TIMEOUT_SECS);

/// Read-only view of a toolset with not-found errors that list valid names.
#[derive(Debug, Clone)]
pub struct SkillAdapter {
    toolset: Arc<Toolset>,
    script_timeout: Duration,
}

impl SkillAdapter {
    pub fn new(toolset: Arc<Toolset>) -> Self {
        Self { toolset, script_timeout: DEFAULT_SCRIPT_TIMEOUT }
    }

    pub fn with_script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout = timeout;
        self
    }

    pub fn toolset(&self) -> &Arc<Toolset> {
        &self.toolset
    }

    /// Name to description for every skill, sorted by name.
    pub fn list(&self) -> BTreeMap<String, String> {
        self.toolset.skills().map(|s| (s.name.clone(), s.description.clone())).collect()
    }

    /// Render the full document for one skill.
    pub fn load(&self, name: &str) -> Result<String> {
        let skill = self.skill(name)?;
        Ok(render_skill(skill))
    }

    pub async fn read_resource(
        &self, skill_name: &str, resource_name: &str, args: Option<&ScriptArgs>, ctx: &RunContext,
    ) -> Result<String> {
        let skill = self.skill(skill_name)?;
        let resource = skill.resource(resource_name).ok_or_else(|| SkillError::ResourceNotFound {
            skill: skill.name.clone(),
            resource: resource_name.to_string(),
            available: sorted(skill.resource_names()),
        })?;

        resource.load(args, ctx).await
    }

    /// Run a script, bounded by the adapter's timeout. A file script that
    /// overruns is killed.
    pub async fn run_script(
        &self, skill_name: &str, script_name: &str, args: Option<&ScriptArgs>, ctx: &RunContext,
    ) -> Result<String> {
        let skill = self.skill(skill_name)?;
        let script = skill.script(script_name).ok_or_else(|| SkillError::ScriptNotFound {
            skill: skill.name.clone(),
            script: script_name.to_string(),
            available: sorted(skill.script_names()),
        })?;

        tracing::debug!(skill = %skill.name, script = %script.name, timeout_secs = self.script_timeout.as_secs(), "running skill script");
        match tokio::time::timeout(self.script_timeout, script.run(args, ctx, skill.root.as_deref())).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(skill = %skill.name, script = %script.name, "skill script timed out");
                Err(SkillError::Timeout { script: script.name.clone(), after: self.script_timeout })
            }
        }
    }

    fn skill(&self, name: &str) -> Result<&Skill> {
        self.toolset
            .get(name)
            .ok_or_else(|| SkillError::SkillNotFound { name: name.to_string(), available: self.toolset.names() })
    }
}

fn sorted(names: Vec<&str>) -> Vec<String> {
    let mut names: Vec<String> = names.into_iter().map(str::to_string).collect();
    names.sort();
    names
}

fn render_skill(skill: &Skill) -> String {
    let mut doc = String::from("<skill>\n");
    let _ = writeln!(doc, "<name>{}</name>", skill.name);
    let _ = writeln!(doc, "<description>{}</description>", skill.description);
    let _ = writeln!(doc, "<uri>{}</uri>", skill.uri.as_deref().unwrap_or("N/A"));

    doc.push_str("<resources>\n");
    if skill.resources.is_empty() {
        doc.push_str("<!-- No resources -->\n");
    }
    for resource in &skill.resources {
        let _ = writeln!(doc, "<resource name=\"{}\" />", resource.name);
    }
    doc.push_str("</resources>\n");

    doc.push_str("<scripts>\n");
    if skill.scripts.is_empty() {
        doc.push_str("<!-- No scripts -->\n");
    }
    for script in &skill.scripts {
        let _ = writeln!(doc, "<script name=\"{}\" />", script.name);
    }
    doc.push_str("</scripts>\n");

    let _ = writeln!(doc, "<instructions>\n{}\n</instructions>", skill.content);
    doc.push_str("</skill>");
    doc
}
