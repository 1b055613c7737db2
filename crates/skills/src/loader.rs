//! Skill discovery from skill directories.
//!
//! Any directory holding a `SKILL.md` is a skill. Directories are searched in
//! order and the first skill to claim a name keeps it.

use crate::parser::{SKILL_FILE, parse_skill};
use crate::toolset::Toolset;
use crate::types::Result;
use skillhost_core::CacheKey;
use skillhost_core::logging::sanitize_path;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a discovery pass needs to know; the discovery-relevant slice of a
/// tool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub directories: Vec<PathBuf>,
    pub validate: bool,
    /// Levels below each directory that may contain skills; 0 means only
    /// direct children.
    pub max_depth: usize,
}

impl From<&CacheKey> for DiscoveryRequest {
    fn from(key: &CacheKey) -> Self {
        Self { directories: key.directories.clone(), validate: key.validate, max_depth: key.max_depth }
    }
}

/// Builds a [Toolset] from a discovery request.
///
/// Implementations are called from a blocking thread and may do synchronous I/O.
pub trait SkillDiscovery: Send + Sync {
    fn discover(&self, request: &DiscoveryRequest) -> Result<Toolset>;
}

/// Walks skill directories on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemDiscovery;

impl FilesystemDiscovery {
    pub fn new() -> Self {
        Self
    }

    /// Skill directories under `dir`, in file-name order.
    fn skill_dirs(dir: &Path, max_depth: usize) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth.saturating_add(2))
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_str().is_some_and(|n| n.starts_with('.')))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry during skill discovery");
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && e.file_name() == SKILL_FILE)
            .filter_map(|e| e.path().parent().map(Path::to_path_buf))
            .collect()
    }
}

impl SkillDiscovery for FilesystemDiscovery {
    fn discover(&self, request: &DiscoveryRequest) -> Result<Toolset> {
        let mut builder = Toolset::builder();

        for dir in &request.directories {
            if !dir.is_dir() {
                tracing::warn!(directory = %sanitize_path(dir), "skill directory does not exist, skipping");
                continue;
            }

            for skill_dir in Self::skill_dirs(dir, request.max_depth) {
                let skill = match parse_skill(&skill_dir, request.validate) {
                    Ok(skill) => skill,
                    Err(e) => {
                        tracing::warn!(path = %sanitize_path(&skill_dir), error = %e, "skipping invalid skill");
                        continue;
                    }
                };

                if request.validate
                    && let Some(dir_name) = skill_dir.file_name().and_then(|n| n.to_str())
                    && dir_name != skill.name
                {
                    tracing::warn!(skill = %skill.name, directory = dir_name, "skill name does not match its directory");
                }

                let name = skill.name.clone();
                if !builder.insert(skill) {
                    tracing::warn!(skill = %name, path = %sanitize_path(&skill_dir), "duplicate skill name, keeping the first");
                }
            }
        }

        tracing::debug!(skills = builder.len(), directories = request.directories.len(), "skill discovery finished");
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_skill(dir: &Path, name: &str, description: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(SKILL_FILE),
            format!("---\nname: {name}\ndescription: {description}\n---\n\n# {name}\n"),
        )
        .unwrap();
    }

    fn request(directories: Vec<PathBuf>, max_depth: usize) -> DiscoveryRequest {
        DiscoveryRequest { directories, validate: true, max_depth }
    }

    #[test]
    fn test_discover_direct_children() {
        let temp = TempDir::new().unwrap();
        write_skill(&temp.path().join("calc"), "calc", "Calculator");
        write_skill(&temp.path().join("greet"), "greet", "Say hello");

        let toolset = FilesystemDiscovery.discover(&request(vec![temp.path().to_path_buf()], 3)).unwrap();
        assert_eq!(toolset.names(), vec!["calc", "greet"]);
    }

    #[test]
    fn test_max_depth_bounds_traversal() {
        let temp = TempDir::new().unwrap();
        write_skill(&temp.path().join("top"), "top", "Top level");
        write_skill(&temp.path().join("group").join("nested"), "nested", "One level down");

        let shallow = FilesystemDiscovery.discover(&request(vec![temp.path().to_path_buf()], 0)).unwrap();
        assert_eq!(shallow.names(), vec!["top"]);

        let deep = FilesystemDiscovery.discover(&request(vec![temp.path().to_path_buf()], 1)).unwrap();
        assert_eq!(deep.names(), vec!["nested", "top"]);
    }

    #[test]
    fn test_first_directory_wins_on_duplicates() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_skill(&first.path().join("calc"), "calc", "From first");
        write_skill(&second.path().join("calc"), "calc", "From second");

        let toolset = FilesystemDiscovery
            .discover(&request(vec![first.path().to_path_buf(), second.path().to_path_buf()], 3))
            .unwrap();
        assert_eq!(toolset.get("calc").unwrap().description, "From first");
    }

    #[test]
    fn test_missing_directory_and_invalid_skills_are_skipped() {
        let temp = TempDir::new().unwrap();
        write_skill(&temp.path().join("calc"), "calc", "Calculator");
        let broken = temp.path().join("broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(SKILL_FILE), "no frontmatter").unwrap();

        let toolset = FilesystemDiscovery
            .discover(&request(vec![temp.path().join("absent"), temp.path().to_path_buf()], 3))
            .unwrap();
        assert_eq!(toolset.names(), vec!["calc"]);
    }

    #[test]
    fn test_validate_flag_controls_strictness() {
        let temp = TempDir::new().unwrap();
        write_skill(&temp.path().join("Loose"), "Loose Skill", "Mixed case name");

        let strict = FilesystemDiscovery.discover(&request(vec![temp.path().to_path_buf()], 3)).unwrap();
        assert!(strict.is_empty());

        let lenient = FilesystemDiscovery
            .discover(&DiscoveryRequest { directories: vec![temp.path().to_path_buf()], validate: false, max_depth: 3 })
            .unwrap();
        assert_eq!(lenient.names(), vec!["Loose Skill"]);
    }

    #[test]
    fn test_empty_directories_yield_empty_toolset() {
        let toolset = FilesystemDiscovery.discover(&request(Vec::new(), 3)).unwrap();
        assert!(toolset.is_empty());
    }
}
