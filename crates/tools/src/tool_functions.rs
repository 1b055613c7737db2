//! Caller-facing skill operations.
//!
//! Every operation has two outcome channels. Wiring problems (a capability
//! invoked although the configuration excludes it) come back as `Err` and
//! must halt the caller. Everything that goes wrong after that point, from
//! a misspelled skill name to a crashing script, comes back as
//! [ToolOutcome::Failure] carrying a message that starts with `Error`.

use std::collections::BTreeMap;
use std::sync::Arc;

use skillhost_core::{Capability, ConfigError, Result, SkillsToolConfig};
use skillhost_skills::{RunContext, ScriptArgs, SkillAdapter, SkillError};

use crate::cache::ToolsetCache;

/// Result of a boundary operation that got past configuration checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome<T> {
    Success(T),
    /// Human-readable description of what went wrong
    Failure(String),
}

impl<T> ToolOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(message) => Some(message),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ToolOutcome<U> {
        match self {
            Self::Success(value) => ToolOutcome::Success(f(value)),
            Self::Failure(message) => ToolOutcome::Failure(message),
        }
    }
}

impl ToolOutcome<String> {
    /// Collapse into the single string a text-only caller sees.
    pub fn into_text(self) -> String {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }
}

/// The four skill operations over a shared [ToolsetCache].
#[derive(Debug, Clone)]
pub struct SkillTools {
    cache: Arc<ToolsetCache>,
}

impl SkillTools {
    pub fn new(cache: Arc<ToolsetCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ToolsetCache> {
        &self.cache
    }

    /// Skill names mapped to descriptions.
    pub async fn list_skills(&self, config: &SkillsToolConfig) -> Result<ToolOutcome<BTreeMap<String, String>>> {
        ensure_enabled(config, Capability::ListSkills)?;
        Ok(match self.adapter(config).await {
            Ok(adapter) => ToolOutcome::Success(adapter.list()),
            Err(e) => fail(&e, || "Error: Failed to list skills".to_string()),
        })
    }

    /// Full instructions for one skill.
    pub async fn load_skill(&self, config: &SkillsToolConfig, skill_name: &str) -> Result<ToolOutcome<String>> {
        ensure_enabled(config, Capability::LoadSkill)?;
        let result = match self.adapter(config).await {
            Ok(adapter) => adapter.load(skill_name),
            Err(e) => Err(e),
        };
        Ok(settle(result, || format!("Error loading skill '{skill_name}'")))
    }

    pub async fn read_skill_resource(
        &self, config: &SkillsToolConfig, skill_name: &str, resource_name: &str, args: Option<&ScriptArgs>,
        ctx: &RunContext,
    ) -> Result<ToolOutcome<String>> {
        ensure_enabled(config, Capability::ReadSkillResource)?;
        let result = match self.adapter(config).await {
            Ok(adapter) => adapter.read_resource(skill_name, resource_name, args, ctx).await,
            Err(e) => Err(e),
        };
        Ok(settle(result, || format!("Error reading resource '{resource_name}' from '{skill_name}'")))
    }

    pub async fn run_skill_script(
        &self, config: &SkillsToolConfig, skill_name: &str, script_name: &str, args: Option<&ScriptArgs>,
        ctx: &RunContext,
    ) -> Result<ToolOutcome<String>> {
        ensure_enabled(config, Capability::RunSkillScript)?;
        let result = match self.adapter(config).await {
            Ok(adapter) => adapter.run_script(skill_name, script_name, args, ctx).await,
            Err(e) => Err(e),
        };
        Ok(settle(result, || format!("Error running script '{script_name}' from '{skill_name}'")))
    }

    async fn adapter(&self, config: &SkillsToolConfig) -> skillhost_skills::Result<SkillAdapter> {
        let toolset = self.cache.get_or_create(config).await?;
        Ok(SkillAdapter::new(toolset).with_script_timeout(config.script_timeout))
    }
}

fn ensure_enabled(config: &SkillsToolConfig, capability: Capability) -> Result<()> {
    if config.is_enabled(capability) {
        return Ok(());
    }
    Err(ConfigError::invalid("exclude", format!("capability '{capability}' is excluded by this configuration")).into())
}

fn settle(result: skillhost_skills::Result<String>, context: impl FnOnce() -> String) -> ToolOutcome<String> {
    match result {
        Ok(text) => ToolOutcome::Success(text),
        Err(e) => fail(&e, context),
    }
}

/// Describe a runtime failure. Lookup misses name the valid alternatives;
/// anything else is prefixed with the operation's context.
fn fail<T>(err: &SkillError, context: impl FnOnce() -> String) -> ToolOutcome<T> {
    let message = match err {
        SkillError::SkillNotFound { name, available } => {
            let available = if available.is_empty() { "none".to_string() } else { available.join(", ") };
            format!("Error: Skill '{name}' not found. Available skills: {available}")
        }
        e if e.is_not_found() => format!("Error: {e}"),
        e => format!("{}: {e}", context()),
    };

    if err.is_not_found() {
        tracing::debug!(error = %err, "skill lookup failed");
    } else {
        tracing::warn!(error = %err, "skill operation failed");
    }
    ToolOutcome::Failure(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_outcome_accessors() {
        let ok: ToolOutcome<String> = ToolOutcome::Success("done".into());
        assert!(ok.is_success());
        assert_eq!(ok.failure(), None);
        assert_eq!(ok.clone().map(|s| s.len()), ToolOutcome::Success(4));
        assert_eq!(ok.into_text(), "done");

        let failed: ToolOutcome<String> = ToolOutcome::Failure("Error: nope".into());
        assert!(failed.is_failure());
        assert_eq!(failed.failure(), Some("Error: nope"));
        assert_eq!(failed.success(), None);
    }

    #[test]
    fn test_fail_messages() {
        let err = SkillError::SkillNotFound { name: "missing".into(), available: vec![] };
        assert_eq!(
            fail::<()>(&err, String::new).failure(),
            Some("Error: Skill 'missing' not found. Available skills: none")
        );

        let err = SkillError::ScriptNotFound {
            skill: "calc".into(),
            script: "scripts/nope.sh".into(),
            available: vec!["scripts/run.py".into()],
        };
        assert_eq!(
            fail::<()>(&err, String::new).failure(),
            Some(r#"Error: Script 'scripts/nope.sh' not found in skill 'calc'. Available: ["scripts/run.py"]"#)
        );

        let err = SkillError::Timeout { script: "scripts/slow.sh".into(), after: Duration::from_secs(30) };
        let outcome = fail::<()>(&err, || "Error running script 'scripts/slow.sh' from 'calc'".to_string());
        assert_eq!(
            outcome.failure(),
            Some("Error running script 'scripts/slow.sh' from 'calc': Script 'scripts/slow.sh' timed out after 30s")
        );
    }

    #[tokio::test]
    async fn test_excluded_capability_is_wiring_error() {
        let tools = SkillTools::new(Arc::new(ToolsetCache::default()));
        let config = SkillsToolConfig::new(Vec::new()).with_exclude([Capability::RunSkillScript]);

        let err = tools
            .run_skill_script(&config, "calc", "scripts/run.py", None, &RunContext::empty())
            .await
            .unwrap_err();
        match err {
            skillhost_core::Error::Config(e) => assert_eq!(e.field(), "exclude"),
            other => panic!("unexpected error: {other}"),
        }

        let listing = tools.list_skills(&config).await.unwrap();
        assert_eq!(listing, ToolOutcome::Success(BTreeMap::new()));
    }
}
