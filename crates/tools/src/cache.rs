//! Process-wide cache of discovered toolsets.
//!
//! Keyed by [CacheKey], so configurations that resolve to the same
//! directories and discovery options share one [Toolset] regardless of
//! which tool registration produced them.
//!
//! Lookups of a populated key take only a read guard on the map. First
//! construction of any key goes through a single coarse lock: two different
//! keys being built at the same time are serialized. That is fine for the
//! handful of configurations a host usually carries and is the place to
//! start if many distinct configurations ever show up.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use skillhost_core::logging::sanitize_path;
use skillhost_core::{CacheKey, SkillsToolConfig};
use skillhost_skills::{DiscoveryRequest, FilesystemDiscovery, SkillDiscovery, SkillError, Toolset};
use tokio::sync::Mutex;

/// Lazily built toolsets, at most one construction per key.
pub struct ToolsetCache {
    discovery: Arc<dyn SkillDiscovery>,
    entries: Arc<RwLock<HashMap<CacheKey, Arc<Toolset>>>>,
    build_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for ToolsetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsetCache").field("entries", &self.len()).finish()
    }
}

impl Default for ToolsetCache {
    fn default() -> Self {
        Self::new(Arc::new(FilesystemDiscovery::new()))
    }
}

impl ToolsetCache {
    pub fn new(discovery: Arc<dyn SkillDiscovery>) -> Self {
        Self {
            discovery,
            entries: Arc::new(RwLock::new(HashMap::new())),
            build_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Return the toolset for `config`, discovering it on first use.
    ///
    /// The build runs on its own task holding the construction lock, so a
    /// caller that gives up mid-build does not release the lock early or
    /// throw the result away. Failed discoveries are not stored; the next
    /// call retries.
    pub async fn get_or_create(&self, config: &SkillsToolConfig) -> Result<Arc<Toolset>, SkillError> {
        let key = config.cache_key();
        if let Some(toolset) = self.lookup(&key) {
            tracing::trace!(skills = toolset.len(), "skill toolset cache hit");
            return Ok(toolset);
        }

        let guard = Arc::clone(&self.build_lock).lock_owned().await;
        if let Some(toolset) = self.lookup(&key) {
            return Ok(toolset);
        }

        let directories: Vec<String> = key.directories.iter().map(|d| sanitize_path(d)).collect();
        tracing::debug!(?directories, max_depth = key.max_depth, "discovering skills");

        let discovery = Arc::clone(&self.discovery);
        let entries = Arc::clone(&self.entries);
        let build = tokio::spawn(async move {
            let _guard = guard;
            let request = DiscoveryRequest::from(&key);
            let toolset = tokio::task::spawn_blocking(move || discovery.discover(&request))
                .await
                .map_err(|e| SkillError::Discovery(format!("discovery task failed: {e}")))??;

            let toolset = Arc::new(toolset);
            tracing::info!(skills = toolset.len(), "cached skill toolset");
            entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, Arc::clone(&toolset));
            Ok::<_, SkillError>(toolset)
        });

        build
            .await
            .map_err(|e| SkillError::Discovery(format!("discovery task failed: {e}")))?
    }

    /// Drop every cached toolset. The next lookup of any key rescans.
    pub async fn clear(&self) {
        let _guard = self.build_lock.lock().await;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(evicted = entries.len(), "clearing skill toolset cache");
        entries.clear();
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<Toolset>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }
}
