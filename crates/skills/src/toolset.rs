//! The collection of skills discovered under one configuration.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::types::Skill;

/// Skills keyed by unique name. Immutable once built; share it behind an
/// `Arc` rather than cloning.
#[derive(Debug, Default)]
pub struct Toolset {
    skills: BTreeMap<String, Skill>,
}

impl Toolset {
    pub fn builder() -> ToolsetBuilder {
        ToolsetBuilder::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    /// Skill names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.skills.keys().cloned().collect()
    }

    pub fn skills(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

/// Accumulates skills before freezing them into a [Toolset].
#[derive(Debug, Default)]
pub struct ToolsetBuilder {
    skills: BTreeMap<String, Skill>,
}

impl ToolsetBuilder {
    /// Add a skill unless one with the same name is already present.
    /// Returns whether the skill was inserted.
    pub fn insert(&mut self, skill: Skill) -> bool {
        match self.skills.entry(skill.name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(skill);
                true
            }
        }
    }

    pub fn skill(mut self, skill: Skill) -> Self {
        self.insert(skill);
        self
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn build(self) -> Toolset {
        Toolset { skills: self.skills }
    }
}
