use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for skillhost-core
pub type Result<T> = std::result::Result<T, Error>;

/// Wiring-level errors for the skillhost workspace.
///
/// Anything surfaced through this type is a setup failure: the host must
/// halt the operation rather than hand a string back to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading a configuration file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or missing configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Parse/serialization errors for configuration files
    #[error("parse error: {0}")]
    Parse(String),

    /// A capability was invoked that is not wired for this configuration
    #[error("capability not registered: {0}")]
    Unregistered(String),
}

/// Configuration-specific errors. Every variant names the offending field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required field absent from both the map and the environment
    #[error("missing required field '{field}'")]
    Missing { field: &'static str },

    /// Value present but of the wrong shape
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    /// A `secret:NAME` token that the installation context could not resolve
    #[error("unresolvable secret '{name}' in '{field}'")]
    UnresolvedSecret { field: &'static str, name: String },

    /// A relative path with no absolute origin to resolve it against
    #[error("cannot resolve relative path '{}' in '{field}': no absolute origin", .path.display())]
    UnresolvedPath { field: &'static str, path: PathBuf },
}

impl ConfigError {
    pub fn missing(field: &'static str) -> Self {
        Self::Missing { field }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }

    /// Get the name of the field this error refers to
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field } => *field,
            Self::Invalid { field, .. } => *field,
            Self::UnresolvedSecret { field, .. } => *field,
            Self::UnresolvedPath { field, .. } => *field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let io_err: Error = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));
        assert_eq!(io_err.to_string(), "I/O error: file not found");

        let parse_err = Error::Parse("invalid YAML".to_string());
        assert_eq!(parse_err.to_string(), "parse error: invalid YAML");

        let unregistered = Error::Unregistered("run_skill_script".to_string());
        assert_eq!(unregistered.to_string(), "capability not registered: run_skill_script");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::missing("directories");
        assert_eq!(err.to_string(), "missing required field 'directories'");

        let err = ConfigError::invalid("max_depth", "must be a non-negative integer");
        assert_eq!(
            err.to_string(),
            "invalid value for 'max_depth': must be a non-negative integer"
        );

        let err = ConfigError::UnresolvedSecret { field: "directories", name: "SKILLS_ROOT".to_string() };
        assert_eq!(err.to_string(), "unresolvable secret 'SKILLS_ROOT' in 'directories'");

        let err = ConfigError::UnresolvedPath { field: "directories", path: PathBuf::from("./skills") };
        assert!(err.to_string().contains("./skills"));
    }

    #[test]
    fn test_config_error_field() {
        assert_eq!(ConfigError::missing("directories").field(), "directories");
        assert_eq!(ConfigError::invalid("exclude", "unknown").field(), "exclude");
        assert_eq!(
            ConfigError::UnresolvedSecret { field: "directories", name: "X".into() }.field(),
            "directories"
        );
    }

    #[test]
    fn test_error_from_config_error() {
        let error: Error = ConfigError::missing("directories").into();
        assert_eq!(
            error.to_string(),
            "configuration error: missing required field 'directories'"
        );
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: Error = io_err.into();
        assert_eq!(error.to_string(), "I/O error: denied");
    }
}
