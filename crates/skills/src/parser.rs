//! Parser for SKILL.md files with YAML frontmatter.
//!
//! SKILL.md format:
//! ```markdown
//! ---
//! name: calc
//! description: Evaluate arithmetic expressions
//! version: 1.0.0
//! tags: [math]
//! ---
//!
//! # Calculator
//!
//! Run `scripts/run.py --expression "..."`.
//! ```
//!
//! Files next to SKILL.md are classified as scripts (anything under
//! `scripts/`, or a root-level file with a runnable extension) or resources
//! (everything else). Names are `/`-separated paths relative to the skill.

use crate::types::{Result, ScriptType, Skill, SkillError, SkillResource, SkillScript};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

pub const SKILL_FILE: &str = "SKILL.md";
const MAX_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 1024;

/// Parse a skill directory. With `validate`, metadata must satisfy the
/// naming and description rules; without it only a name is required.
pub fn parse_skill(skill_dir: &Path, validate: bool) -> Result<Skill> {
    let skill_md = skill_dir.join(SKILL_FILE);
    let content = fs::read_to_string(&skill_md)?;
    let (frontmatter, body) = extract_frontmatter(&content)?;
    if validate {
        validate_frontmatter(&frontmatter)?;
    } else if frontmatter.name.trim().is_empty() {
        return Err(SkillError::InvalidFrontmatter("name is required".to_string()));
    }

    let (resources, scripts) = discover_files(skill_dir)?;

    Ok(Skill {
        name: frontmatter.name,
        description: frontmatter.description,
        uri: Some(skill_dir.display().to_string()),
        root: Some(skill_dir.to_path_buf()),
        content: body,
        version: frontmatter.version,
        tags: frontmatter.tags.unwrap_or_default(),
        resources,
        scripts,
    })
}

/// Extract YAML frontmatter and body from markdown content.
fn extract_frontmatter(content: &str) -> Result<(Frontmatter, String)> {
    let content = content.trim_start_matches('\u{feff}');
    let Some(rest) = content.strip_prefix("---") else {
        return Err(SkillError::InvalidFrontmatter("SKILL.md must start with ---".to_string()));
    };

    let frontmatter_end = rest
        .find("\n---")
        .ok_or_else(|| SkillError::InvalidFrontmatter("Closing --- not found".to_string()))?;

    let frontmatter_str = &rest[..frontmatter_end];
    let body = &rest[frontmatter_end + 4..];

    let frontmatter: Frontmatter = serde_yml::from_str(frontmatter_str)
        .map_err(|e| SkillError::InvalidFrontmatter(format!("YAML parse error: {e}")))?;

    Ok((frontmatter, body.trim().to_string()))
}

fn validate_frontmatter(frontmatter: &Frontmatter) -> Result<()> {
    if frontmatter.name.is_empty() {
        return Err(SkillError::InvalidFrontmatter("name is required".to_string()));
    }

    if frontmatter.name.len() > MAX_NAME_LEN {
        return Err(SkillError::InvalidFrontmatter(format!(
            "name must be <= {MAX_NAME_LEN} characters"
        )));
    }

    if !frontmatter
        .name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(SkillError::InvalidFrontmatter(
            "name must be lowercase with hyphens/underscores only".to_string(),
        ));
    }

    if frontmatter.description.trim().is_empty() {
        return Err(SkillError::InvalidFrontmatter("description is required".to_string()));
    }

    if frontmatter.description.len() > MAX_DESCRIPTION_LEN {
        return Err(SkillError::InvalidFrontmatter(format!(
            "description must be <= {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    Ok(())
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name == "__pycache__"
}

/// A subdirectory with its own SKILL.md is a separate skill.
fn is_nested_skill(path: &Path) -> bool {
    path.is_dir() && path.join(SKILL_FILE).is_file()
}

/// Classify the files of a skill directory into resources and scripts.
fn discover_files(skill_dir: &Path) -> Result<(Vec<SkillResource>, Vec<SkillScript>)> {
    let mut resources = Vec::new();
    let mut scripts = Vec::new();

    let walker = WalkDir::new(skill_dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !(e.file_name().to_str().is_some_and(is_hidden) || is_nested_skill(e.path()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| SkillError::Discovery(format!("{}: {e}", skill_dir.display())))?;
        if !entry.file_type().is_file() || entry.file_name() == SKILL_FILE {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(skill_dir) else { continue };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let in_scripts_dir = name.starts_with("scripts/");
        let runnable_at_root = entry.depth() == 1 && ScriptType::from_path(path) != ScriptType::Unknown;
        if in_scripts_dir || runnable_at_root {
            scripts.push(SkillScript::file(name, path));
        } else {
            resources.push(SkillResource::file(name, path));
        }
    }

    resources.sort_by(|a, b| a.name.cmp(&b.name));
    scripts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((resources, scripts))
}

/// YAML frontmatter structure.
#[derive(Debug, serde::Deserialize)]
struct Frontmatter {
    #[serde(default)]
    name: String,

    #[serde(default)]
    description: String,

    #[serde(default)]
    version: Option<String>,

    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResourceSource, ScriptSource};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_extract_frontmatter_valid() {
        let content = r#"---
name: test-skill
description: A test skill
version: 1.0.0
---

# Test Skill

This is the body.
"#;

        let (meta, body) = extract_frontmatter(content).unwrap();
        assert_eq!(meta.name, "test-skill");
        assert_eq!(meta.description, "A test skill");
        assert_eq!(meta.version.as_deref(), Some("1.0.0"));
        assert_eq!(body, "# Test Skill\n\nThis is the body.");
    }

    #[test]
    fn test_body_may_contain_rules() {
        let content = "---\nname: a\ndescription: b\n---\nintro\n\n---\n\nmore\n";
        let (_, body) = extract_frontmatter(content).unwrap();
        assert_eq!(body, "intro\n\n---\n\nmore");
    }

    #[test]
    fn test_extract_frontmatter_missing_delimiters() {
        assert!(extract_frontmatter("# No frontmatter").is_err());
        assert!(extract_frontmatter("---\nname: a\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_metadata() {
        for content in [
            "---\ndescription: A test skill\n---\n",
            "---\nname: test-skill\n---\n",
            "---\nname: TestSkill\ndescription: A test skill\n---\n",
        ] {
            let (meta, _) = extract_frontmatter(content).unwrap();
            assert!(validate_frontmatter(&meta).is_err(), "accepted: {content}");
        }

        let long = format!("---\nname: ok\ndescription: {}\n---\n", "x".repeat(1025));
        let (meta, _) = extract_frontmatter(&long).unwrap();
        assert!(validate_frontmatter(&meta).is_err());
    }

    fn write_skill(dir: &Path, frontmatter: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(SKILL_FILE), format!("---\n{frontmatter}\n---\n\n# Body\n")).unwrap();
    }

    #[test]
    fn test_parse_skill_classifies_files() {
        let temp = TempDir::new().unwrap();
        let skill_dir = temp.path().join("calc");
        write_skill(&skill_dir, "name: calc\ndescription: Calculator\ntags: [math]");
        fs::create_dir_all(skill_dir.join("resources")).unwrap();
        fs::create_dir_all(skill_dir.join("scripts")).unwrap();
        fs::create_dir_all(skill_dir.join(".git")).unwrap();
        fs::write(skill_dir.join("resources/formulas.md"), "a^2 + b^2").unwrap();
        fs::write(skill_dir.join("scripts/run.py"), "print(1)").unwrap();
        fs::write(skill_dir.join("helper.sh"), "echo hi").unwrap();
        fs::write(skill_dir.join("README.txt"), "readme").unwrap();
        fs::write(skill_dir.join(".git/config"), "hidden").unwrap();

        let skill = parse_skill(&skill_dir, true).unwrap();
        assert_eq!(skill.name, "calc");
        assert_eq!(skill.tags, vec!["math"]);
        assert_eq!(skill.content, "# Body");
        assert_eq!(skill.resource_names(), vec!["README.txt", "resources/formulas.md"]);
        assert_eq!(skill.script_names(), vec!["helper.sh", "scripts/run.py"]);
        assert!(matches!(skill.resources[1].source, ResourceSource::File(_)));
        assert!(matches!(
            skill.scripts[1].source,
            ScriptSource::File { script_type: ScriptType::Python, .. }
        ));
        assert_eq!(skill.uri.as_deref(), Some(skill_dir.display().to_string().as_str()));
    }

    #[test]
    fn test_nested_skill_files_stay_with_nested_skill() {
        let temp = TempDir::new().unwrap();
        let group = temp.path().join("group");
        write_skill(&group, "name: group\ndescription: Outer skill");
        fs::write(group.join("notes.md"), "outer notes").unwrap();
        let nested = group.join("nested");
        write_skill(&nested, "name: nested\ndescription: Inner skill");
        fs::write(nested.join("inner.md"), "inner notes").unwrap();
        fs::write(nested.join("run.sh"), "echo inner").unwrap();

        let outer = parse_skill(&group, true).unwrap();
        assert_eq!(outer.resource_names(), vec!["notes.md"]);
        assert!(outer.scripts.is_empty());

        let inner = parse_skill(&nested, true).unwrap();
        assert_eq!(inner.resource_names(), vec!["inner.md"]);
        assert_eq!(inner.script_names(), vec!["run.sh"]);
    }

    #[test]
    fn test_parse_without_validation_is_lenient() {
        let temp = TempDir::new().unwrap();
        let skill_dir = temp.path().join("Loose");
        write_skill(&skill_dir, "name: Loose Skill");

        assert!(parse_skill(&skill_dir, true).is_err());
        let skill = parse_skill(&skill_dir, false).unwrap();
        assert_eq!(skill.name, "Loose Skill");
        assert_eq!(skill.description, "");

        let nameless = temp.path().join("nameless");
        write_skill(&nameless, "description: no name");
        assert!(parse_skill(&nameless, false).is_err());
    }
}
