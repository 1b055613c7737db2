//! Core types for the Skills system.
//!
//! A [Skill] is a named bundle of instructions plus optional resources and
//! scripts. Resources and scripts come in two kinds: static ones backed by
//! text or a file on disk, and invocable ones backed by host code.

use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

use crate::runner;

/// Arguments forwarded to invocable resources and scripts.
pub type ScriptArgs = serde_json::Map<String, Value>;

/// Opaque execution context supplied by the host and forwarded unmodified
/// into invocable resources and scripts.
#[derive(Clone, Default)]
pub struct RunContext(Option<Arc<dyn Any + Send + Sync>>);

impl RunContext {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_empty() { "RunContext(empty)" } else { "RunContext(..)" })
    }
}

/// Host-provided content for an invocable resource.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load(&self, args: Option<&ScriptArgs>, ctx: &RunContext) -> Result<String>;
}

/// Host-provided behaviour for an invocable script.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, args: Option<&ScriptArgs>, ctx: &RunContext) -> Result<String>;
}

#[derive(Clone)]
pub enum ResourceSource {
    /// Text returned as-is
    Inline(String),
    /// File read on each access
    File(PathBuf),
    /// Computed on demand
    Callable(Arc<dyn ResourceLoader>),
}

impl fmt::Debug for ResourceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(text) => write!(f, "Inline({} bytes)", text.len()),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// Reference content belonging to a skill.
#[derive(Debug, Clone)]
pub struct SkillResource {
    /// Unique within the owning skill, e.g. `resources/formulas.md`
    pub name: String,
    pub source: ResourceSource,
}

impl SkillResource {
    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { name: name.into(), source: ResourceSource::Inline(content.into()) }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), source: ResourceSource::File(path.into()) }
    }

    pub fn callable(name: impl Into<String>, loader: Arc<dyn ResourceLoader>) -> Self {
        Self { name: name.into(), source: ResourceSource::Callable(loader) }
    }

    pub fn is_invocable(&self) -> bool {
        matches!(self.source, ResourceSource::Callable(_))
    }

    /// Produce the resource content. Static resources ignore `args` and `ctx`.
    pub async fn load(&self, args: Option<&ScriptArgs>, ctx: &RunContext) -> Result<String> {
        match &self.source {
            ResourceSource::Inline(text) => Ok(text.clone()),
            ResourceSource::File(path) => Ok(tokio::fs::read_to_string(path).await?),
            ResourceSource::Callable(loader) => {
                let loader = Arc::clone(loader);
                let (args, ctx) = (args.cloned(), ctx.clone());
                isolate(async move { loader.load(args.as_ref(), &ctx).await }).await
            }
        }
    }
}

/// The type of script based on file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    Bash,
    JavaScript,
    Python,
    Lua,
    Unknown,
}

impl ScriptType {
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| match ext.to_lowercase().as_str() {
                "sh" => ScriptType::Bash,
                "js" => ScriptType::JavaScript,
                "py" => ScriptType::Python,
                "lua" => ScriptType::Lua,
                _ => ScriptType::Unknown,
            })
            .unwrap_or(ScriptType::Unknown)
    }

    /// Interpreter used to launch a script of this type.
    pub fn interpreter(&self) -> Option<&'static str> {
        match self {
            ScriptType::Bash => Some("bash"),
            ScriptType::JavaScript => Some("node"),
            ScriptType::Python => Some("python3"),
            ScriptType::Lua => Some("lua"),
            ScriptType::Unknown => None,
        }
    }
}

#[derive(Clone)]
pub enum ScriptSource {
    /// Executed as a subprocess
    File { path: PathBuf, script_type: ScriptType },
    /// Executed in-process by host code
    Callable(Arc<dyn ScriptRunner>),
}

impl fmt::Debug for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path, script_type } => f
                .debug_struct("File")
                .field("path", path)
                .field("script_type", script_type)
                .finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// An executable action belonging to a skill.
#[derive(Debug, Clone)]
pub struct SkillScript {
    /// Unique within the owning skill, e.g. `scripts/run.py`
    pub name: String,
    pub source: ScriptSource,
}

impl SkillScript {
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let script_type = ScriptType::from_path(&path);
        Self { name: name.into(), source: ScriptSource::File { path, script_type } }
    }

    pub fn callable(name: impl Into<String>, runner: Arc<dyn ScriptRunner>) -> Self {
        Self { name: name.into(), source: ScriptSource::Callable(runner) }
    }

    pub fn is_invocable(&self) -> bool {
        matches!(self.source, ScriptSource::Callable(_))
    }

    /// Execute the script. File scripts run with `working_dir` as their
    /// current directory when given.
    pub async fn run(&self, args: Option<&ScriptArgs>, ctx: &RunContext, working_dir: Option<&Path>) -> Result<String> {
        match &self.source {
            ScriptSource::File { path, script_type } => runner::run_script_file(path, *script_type, args, working_dir).await,
            ScriptSource::Callable(runner) => {
                let runner = Arc::clone(runner);
                let (args, ctx) = (args.cloned(), ctx.clone());
                isolate(async move { runner.run(args.as_ref(), &ctx).await }).await
            }
        }
    }
}

/// Aborts the wrapped task when dropped, so an enclosing timeout also stops
/// the host code it was waiting on.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run host-provided code on its own task so a panic surfaces as
/// [SkillError::ExecutionFailed] instead of unwinding into the caller.
async fn isolate<F>(fut: F) -> Result<String>
where
    F: Future<Output = Result<String>> + Send + 'static,
{
    let handle = tokio::spawn(fut);
    let _abort = AbortOnDrop(handle.abort_handle());
    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!(panic = %message, "invocable skill code panicked");
            Err(SkillError::ExecutionFailed(format!("panicked: {message}")))
        }
        Err(e) => Err(SkillError::ExecutionFailed(format!("task cancelled: {e}"))),
    }
}

/// A discovered skill, owned by its toolset.
#[derive(Debug, Clone)]
pub struct Skill {
    /// Unique key within a toolset
    pub name: String,

    pub description: String,

    /// Where the skill came from (its directory for discovered skills)
    pub uri: Option<String>,

    /// Skill directory, used as the working directory for file scripts
    pub root: Option<PathBuf>,

    /// Instructional markdown body
    pub content: String,

    pub version: Option<String>,

    pub tags: Vec<String>,

    pub resources: Vec<SkillResource>,

    pub scripts: Vec<SkillScript>,
}

impl Skill {
    pub fn new(name: impl Into<String>, description: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            uri: None,
            root: None,
            content: content.into(),
            version: None,
            tags: Vec::new(),
            resources: Vec::new(),
            scripts: Vec::new(),
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_resource(mut self, resource: SkillResource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_script(mut self, script: SkillScript) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn resource(&self, name: &str) -> Option<&SkillResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn script(&self, name: &str) -> Option<&SkillScript> {
        self.scripts.iter().find(|s| s.name == name)
    }

    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn script_names(&self) -> Vec<&str> {
        self.scripts.iter().map(|s| s.name.as_str()).collect()
    }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() { "none".to_string() } else { names.join(", ") }
}

/// Errors that can occur when working with skills.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("Skill '{name}' not found. Available: {}", join_or_none(.available))]
    SkillNotFound { name: String, available: Vec<String> },

    #[error("Resource '{resource}' not found in skill '{skill}'. Available: {available:?}")]
    ResourceNotFound { skill: String, resource: String, available: Vec<String> },

    #[error("Script '{script}' not found in skill '{skill}'. Available: {available:?}")]
    ScriptNotFound { skill: String, script: String, available: Vec<String> },

    #[error("Invalid SKILL.md frontmatter: {0}")]
    InvalidFrontmatter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Script execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Script '{script}' timed out after {}s", .after.as_secs())]
    Timeout { script: String, after: Duration },
}

impl SkillError {
    /// Whether this is one of the lookup failures a caller can fix by
    /// correcting a name.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SkillNotFound { .. } | Self::ResourceNotFound { .. } | Self::ScriptNotFound { .. }
        )
    }
}

/// Result type for skill operations.
pub type Result<T> = std::result::Result<T, SkillError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ResourceLoader for Echo {
        async fn load(&self, args: Option<&ScriptArgs>, ctx: &RunContext) -> Result<String> {
            let topic = args.and_then(|a| a.get("topic")).and_then(Value::as_str).unwrap_or("none");
            let user = ctx.downcast_ref::<String>().cloned().unwrap_or_default();
            Ok(format!("{topic}:{user}"))
        }
    }

    #[test]
    fn test_script_type_from_path() {
        assert_eq!(ScriptType::from_path(Path::new("scripts/run.py")), ScriptType::Python);
        assert_eq!(ScriptType::from_path(Path::new("run.SH")), ScriptType::Bash);
        assert_eq!(ScriptType::from_path(Path::new("index.js")), ScriptType::JavaScript);
        assert_eq!(ScriptType::from_path(Path::new("notes.md")), ScriptType::Unknown);
        assert_eq!(ScriptType::Unknown.interpreter(), None);
    }

    #[test]
    fn test_skill_lookup_helpers() {
        let skill = Skill::new("calc", "Calculator", "Add numbers")
            .with_resource(SkillResource::inline("resources/formulas.md", "a + b"))
            .with_script(SkillScript::file("scripts/run.py", "/tmp/run.py"));

        assert_eq!(skill.resource_names(), vec!["resources/formulas.md"]);
        assert_eq!(skill.script_names(), vec!["scripts/run.py"]);
        assert!(skill.resource("resources/formulas.md").is_some());
        assert!(skill.resource("formulas.md").is_none());
        assert!(skill.script("scripts/run.py").is_some());
    }

    #[test]
    fn test_not_found_display() {
        let err = SkillError::SkillNotFound { name: "missing".into(), available: vec!["calc".into(), "greet".into()] };
        assert_eq!(err.to_string(), "Skill 'missing' not found. Available: calc, greet");
        assert!(err.is_not_found());

        let err = SkillError::SkillNotFound { name: "missing".into(), available: vec![] };
        assert!(err.to_string().ends_with("Available: none"));

        let err = SkillError::ResourceNotFound {
            skill: "calc".into(),
            resource: "resources/missing.md".into(),
            available: vec!["resources/formulas.md".into()],
        };
        assert_eq!(
            err.to_string(),
            r#"Resource 'resources/missing.md' not found in skill 'calc'. Available: ["resources/formulas.md"]"#
        );

        let err = SkillError::Timeout { script: "scripts/slow.sh".into(), after: Duration::from_secs(2) };
        assert_eq!(err.to_string(), "Script 'scripts/slow.sh' timed out after 2s");
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_inline_resource_ignores_args() {
        let resource = SkillResource::inline("notes.md", "static text");
        let mut args = ScriptArgs::new();
        args.insert("topic".into(), Value::from("ignored"));
        assert_eq!(resource.load(Some(&args), &RunContext::empty()).await.unwrap(), "static text");
        assert!(!resource.is_invocable());
    }

    #[tokio::test]
    async fn test_callable_resource_receives_args_and_context() {
        let resource = SkillResource::callable("live", Arc::new(Echo));
        let mut args = ScriptArgs::new();
        args.insert("topic".into(), Value::from("rust"));
        let ctx = RunContext::new("alice".to_string());

        assert!(resource.is_invocable());
        assert_eq!(resource.load(Some(&args), &ctx).await.unwrap(), "rust:alice");
        assert_eq!(resource.load(None, &RunContext::empty()).await.unwrap(), "none:");
    }

    #[tokio::test]
    async fn test_file_resource_missing_is_io_error() {
        let resource = SkillResource::file("gone.md", "/definitely/not/here.md");
        let err = resource.load(None, &RunContext::empty()).await.unwrap_err();
        assert!(matches!(err, SkillError::Io(_)));
    }

    struct Exploding;

    #[async_trait]
    impl ScriptRunner for Exploding {
        async fn run(&self, _args: Option<&ScriptArgs>, _ctx: &RunContext) -> Result<String> {
            panic!("callable exploded");
        }
    }

    #[async_trait]
    impl ResourceLoader for Exploding {
        async fn load(&self, _args: Option<&ScriptArgs>, _ctx: &RunContext) -> Result<String> {
            panic!("loader exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_callables_become_execution_failures() {
        let script = SkillScript::callable("scripts/boom", Arc::new(Exploding));
        let err = script.run(None, &RunContext::empty(), None).await.unwrap_err();
        match err {
            SkillError::ExecutionFailed(message) => assert!(message.contains("callable exploded")),
            other => panic!("unexpected error: {other}"),
        }

        let resource = SkillResource::callable("boom.md", Arc::new(Exploding));
        let err = resource.load(None, &RunContext::empty()).await.unwrap_err();
        assert!(err.to_string().contains("loader exploded"));
    }

    #[test]
    fn test_run_context_downcast() {
        let ctx = RunContext::new(42u32);
        assert_eq!(ctx.downcast_ref::<u32>(), Some(&42));
        assert!(ctx.downcast_ref::<String>().is_none());
        assert!(RunContext::empty().is_empty());
        assert_eq!(format!("{:?}", RunContext::empty()), "RunContext(empty)");
    }
}
