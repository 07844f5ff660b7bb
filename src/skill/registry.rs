//! Skill registry

use crate::skill::Skill;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Skills available to pipeline steps, keyed by id
#[derive(Default, Clone)]
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill, replacing any skill with the same id
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        let id = skill.id().to_string();
        if self.skills.insert(id.clone(), skill).is_some() {
            warn!("Skill '{}' registered twice; keeping the latest", id);
        }
    }

    /// Builder-style registration
    pub fn with_skill(mut self, skill: Arc<dyn Skill>) -> Self {
        self.register(skill);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.skills.contains_key(id)
    }

    /// Registered skill ids, sorted
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.skills.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.list())
            .finish()
    }
}
