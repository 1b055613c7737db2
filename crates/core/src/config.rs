//! Tool configuration for the skills capabilities.
//!
//! Raw configuration arrives as a loosely typed map (parsed from a room's YAML
//! or TOML file) and is normalized here into a [SkillsToolConfig]: absolute
//! directories, coerced scalars, and a hashable [CacheKey] projection.
//!
//! ```yaml
//! tools:
//!   - tool_name: skillhost.tools.list_skills
//!     directories:
//!       - ./skills
//!       - ../shared/skills
//!     max_depth: 2
//!
//!   # legacy comma-joined form
//!   - tool_name: skillhost.tools.load_skill
//!     directories: ./skills,../shared/skills
//! ```
//!
//! Keys missing from the map fall back to `SKILLHOST_SKILLS_*` environment
//! variables. Relative directories resolve against the configuration file's
//! parent directory, never against the process working directory.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, Error, Result};

/// Prefix shared by every environment fallback.
pub const ENV_PREFIX: &str = "SKILLHOST_SKILLS_";

pub const DEFAULT_VALIDATE: bool = true;
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_SCRIPT_TIMEOUT_SECS: u64 = 30;

/// The four externally visible skills capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ListSkills,
    LoadSkill,
    ReadSkillResource,
    RunSkillScript,
}

impl Capability {
    pub const VALUES: &[Capability] = &[
        Capability::ListSkills,
        Capability::LoadSkill,
        Capability::ReadSkillResource,
        Capability::RunSkillScript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ListSkills => "list_skills",
            Capability::LoadSkill => "load_skill",
            Capability::ReadSkillResource => "read_skill_resource",
            Capability::RunSkillScript => "run_skill_script",
        }
    }

    /// Canonical tool name a room file uses to register this capability.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Capability::ListSkills => "skillhost.tools.list_skills",
            Capability::LoadSkill => "skillhost.tools.load_skill",
            Capability::ReadSkillResource => "skillhost.tools.read_skill_resource",
            Capability::RunSkillScript => "skillhost.tools.run_skill_script",
        }
    }

    /// Look up a capability by its canonical tool name.
    pub fn from_tool_name(tool_name: &str) -> Option<Self> {
        Self::VALUES.iter().copied().find(|c| c.tool_name() == tool_name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::VALUES
            .iter()
            .copied()
            .find(|c| c.as_str() == s || c.tool_name() == s)
            .ok_or_else(|| ConfigError::invalid("exclude", format!("unknown capability '{s}'")))
    }
}

/// Host installation context: resolves `secret:NAME` tokens.
///
/// Treated as opaque by everything except the resolver.
pub trait InstallationContext: Send + Sync + fmt::Debug {
    fn resolve_secret(&self, name: &str) -> Option<String>;
}

/// Installation context backed by a fixed map, useful for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets(pub HashMap<String, String>);

impl InstallationContext for StaticSecrets {
    fn resolve_secret(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

/// Source of environment fallbacks.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Hashable projection of a [SkillsToolConfig]: exactly the fields that
/// decide which skills are discovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub directories: Vec<PathBuf>,
    pub validate: bool,
    pub max_depth: usize,
    pub exclude: BTreeSet<Capability>,
}

/// Canonical configuration for the skills capabilities.
#[derive(Debug, Clone)]
pub struct SkillsToolConfig {
    /// Registered tool name (informational, not part of the cache key)
    pub tool_name: String,

    /// Absolute skill directories, in search order
    pub directories: Vec<PathBuf>,

    /// Enables structural validation during discovery
    pub validate: bool,

    /// Bound on recursive directory traversal
    pub max_depth: usize,

    /// Capabilities suppressed from registration
    pub exclude: BTreeSet<Capability>,

    /// Upper bound on a single script run
    pub script_timeout: Duration,

    /// Location the configuration was read from
    pub origin: Option<PathBuf>,

    installation: Option<Arc<dyn InstallationContext>>,
}

impl SkillsToolConfig {
    /// Create a configuration over already-absolute directories with defaults.
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            tool_name: String::new(),
            directories,
            validate: DEFAULT_VALIDATE,
            max_depth: DEFAULT_MAX_DEPTH,
            exclude: BTreeSet::new(),
            script_timeout: Duration::from_secs(DEFAULT_SCRIPT_TIMEOUT_SECS),
            origin: None,
            installation: None,
        }
    }

    /// Create a configuration registered under a capability's canonical tool name.
    pub fn for_capability(capability: Capability, directories: Vec<PathBuf>) -> Self {
        Self::new(directories).with_tool_name(capability.tool_name())
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = Capability>) -> Self {
        self.exclude = exclude.into_iter().collect();
        self
    }

    pub fn with_script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout = timeout;
        self
    }

    pub fn with_installation(mut self, installation: Arc<dyn InstallationContext>) -> Self {
        self.installation = Some(installation);
        self
    }

    pub fn installation(&self) -> Option<&Arc<dyn InstallationContext>> {
        self.installation.as_ref()
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            directories: self.directories.clone(),
            validate: self.validate,
            max_depth: self.max_depth,
            exclude: self.exclude.clone(),
        }
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        !self.exclude.contains(&capability)
    }

    /// Capabilities left after exclusions, in canonical order.
    pub fn enabled_capabilities(&self) -> Vec<Capability> {
        Capability::VALUES.iter().copied().filter(|c| self.is_enabled(*c)).collect()
    }
}

/// Normalize a list-or-legacy-string value into an ordered list of trimmed,
/// non-empty entries. `null` normalizes to an empty list.
pub fn normalize_sequence(field: &'static str, value: &Value) -> std::result::Result<Vec<String>, ConfigError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(split_legacy(s)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let Value::String(s) = item else {
                    return Err(ConfigError::invalid(field, format!("expected string entries, found {item}")));
                };
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            Ok(out)
        }
        other => Err(ConfigError::invalid(field, format!("expected a list or comma-separated string, found {other}"))),
    }
}

/// Split a comma-joined string, trimming whitespace and dropping empty segments.
pub fn split_legacy(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|p| !p.is_empty()).map(String::from).collect()
}

fn coerce_bool(field: &'static str, value: &Value) -> std::result::Result<bool, ConfigError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(ConfigError::invalid(field, format!("expected a boolean, found '{s}'"))),
        },
        other => Err(ConfigError::invalid(field, format!("expected a boolean, found {other}"))),
    }
}

fn coerce_u64(field: &'static str, value: &Value) -> std::result::Result<u64, ConfigError> {
    let reason = "must be a non-negative integer";
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(|| ConfigError::invalid(field, reason)),
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| ConfigError::invalid(field, reason)),
        _ => Err(ConfigError::invalid(field, reason)),
    }
}

/// Lexically normalize an absolute path: drops `.` and folds `..`.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Turns raw configuration maps into [SkillsToolConfig] values.
pub struct ToolConfigResolver {
    env: Box<dyn EnvSource>,
    installation: Option<Arc<dyn InstallationContext>>,
}

impl fmt::Debug for ToolConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolConfigResolver")
            .field("installation", &self.installation)
            .finish_non_exhaustive()
    }
}

impl Default for ToolConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolConfigResolver {
    /// Create a resolver that falls back to the process environment.
    pub fn new() -> Self {
        Self { env: Box::new(ProcessEnv), installation: None }
    }

    /// Replace the environment fallback source.
    pub fn with_env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn with_installation(mut self, installation: Arc<dyn InstallationContext>) -> Self {
        self.installation = Some(installation);
        self
    }

    fn env_value(&self, suffix: &str) -> Option<Value> {
        self.env.var(&format!("{ENV_PREFIX}{suffix}")).map(Value::String)
    }

    /// Look up a key (or its alias), falling back to the environment.
    fn lookup(&self, raw: &Map<String, Value>, keys: &[&str], env_suffix: &str) -> Option<Value> {
        keys.iter()
            .find_map(|k| raw.get(*k).cloned())
            .or_else(|| self.env_value(env_suffix))
    }

    /// Resolve a raw configuration map. Relative directories resolve against
    /// `origin`'s parent directory; `origin` must be absolute for that.
    pub fn resolve(&self, raw: &Map<String, Value>, origin: Option<&Path>) -> Result<SkillsToolConfig> {
        let tool_name = match raw.get("tool_name") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(ConfigError::invalid("tool_name", format!("expected a string, found {other}")).into());
            }
        };

        let exclude = match self.lookup(raw, &["exclude", "exclude_tools"], "EXCLUDE_TOOLS") {
            Some(value) => normalize_sequence("exclude", &value)?
                .iter()
                .map(|name| name.parse::<Capability>())
                .collect::<std::result::Result<BTreeSet<_>, _>>()?,
            None => BTreeSet::new(),
        };

        let raw_dirs = self
            .lookup(raw, &["directories"], "DIRECTORIES")
            .ok_or_else(|| ConfigError::missing("directories"))?;
        let entries = normalize_sequence("directories", &raw_dirs)?;
        let directories = entries
            .iter()
            .map(|entry| self.resolve_directory(entry, origin))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if directories.is_empty() && exclude.len() < Capability::VALUES.len() {
            return Err(ConfigError::invalid("directories", "must list at least one directory").into());
        }

        let validate = match self.lookup(raw, &["validate_skills", "validate"], "VALIDATE") {
            Some(value) => coerce_bool("validate", &value)?,
            None => DEFAULT_VALIDATE,
        };

        let max_depth = match self.lookup(raw, &["max_depth"], "MAX_DEPTH") {
            Some(value) => usize::try_from(coerce_u64("max_depth", &value)?)
                .map_err(|_| ConfigError::invalid("max_depth", "out of range"))?,
            None => DEFAULT_MAX_DEPTH,
        };

        let script_timeout = match self.lookup(raw, &["script_timeout_secs"], "SCRIPT_TIMEOUT") {
            Some(value) => match coerce_u64("script_timeout_secs", &value)? {
                0 => return Err(ConfigError::invalid("script_timeout_secs", "must be a positive integer").into()),
                secs => Duration::from_secs(secs),
            },
            None => Duration::from_secs(DEFAULT_SCRIPT_TIMEOUT_SECS),
        };

        tracing::debug!(
            tool_name = %tool_name,
            directories = directories.len(),
            validate,
            max_depth,
            excluded = exclude.len(),
            "resolved skills tool configuration"
        );

        Ok(SkillsToolConfig {
            tool_name,
            directories,
            validate,
            max_depth,
            exclude,
            script_timeout,
            origin: origin.map(Path::to_path_buf),
            installation: self.installation.clone(),
        })
    }

    fn resolve_directory(&self, entry: &str, origin: Option<&Path>) -> std::result::Result<PathBuf, ConfigError> {
        let field = "directories";
        let entry = match entry.strip_prefix("secret:") {
            Some(name) => self
                .installation
                .as_ref()
                .and_then(|ctx| ctx.resolve_secret(name))
                .ok_or_else(|| ConfigError::UnresolvedSecret { field, name: name.to_string() })?,
            None => entry.to_string(),
        };

        let path = if entry == "~" || entry.starts_with("~/") {
            let home = dirs::home_dir().ok_or_else(|| ConfigError::invalid(field, "home directory is unknown"))?;
            home.join(entry.trim_start_matches('~').trim_start_matches('/'))
        } else {
            PathBuf::from(&entry)
        };

        if path.is_absolute() {
            return Ok(normalize_path(&path));
        }

        let base = origin
            .filter(|o| o.is_absolute())
            .and_then(Path::parent)
            .ok_or_else(|| ConfigError::UnresolvedPath { field, path: path.clone() })?;
        Ok(normalize_path(&base.join(path)))
    }

    /// Read a single tool configuration mapping from a YAML or TOML file.
    pub fn resolve_file(&self, path: &Path) -> Result<SkillsToolConfig> {
        let value = read_config_file(path)?;
        let Value::Object(raw) = value else {
            return Err(Error::Parse(format!("{} does not contain a mapping", path.display())));
        };
        self.resolve(&raw, Some(path))
    }

    /// Read every skills tool entry from a room file's `tools` list.
    ///
    /// Entries whose `tool_name` is not a skills capability belong to other
    /// tool families and are ignored.
    pub fn resolve_room_file(&self, path: &Path) -> Result<Vec<(Capability, SkillsToolConfig)>> {
        let value = read_config_file(path)?;
        let tools = match value.get("tools") {
            Some(Value::Array(tools)) => tools.clone(),
            Some(_) => return Err(Error::Parse(format!("'tools' in {} must be a list", path.display()))),
            None => Vec::new(),
        };

        let mut configs = Vec::new();
        for entry in tools {
            let Value::Object(raw) = entry else { continue };
            let Some(capability) = raw
                .get("tool_name")
                .and_then(Value::as_str)
                .and_then(Capability::from_tool_name)
            else {
                continue;
            };
            configs.push((capability, self.resolve(&raw, Some(path))?));
        }
        Ok(configs)
    }
}

fn read_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
    match extension.as_str() {
        "toml" => toml::from_str(&content).map_err(|e| Error::Parse(format!("TOML parse error: {e}"))),
        _ => serde_yml::from_str(&content).map_err(|e| Error::Parse(format!("YAML parse error: {e}"))),
    }
}
