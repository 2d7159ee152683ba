//! Shared animated-model resources.
//!
//! Models are handed out as `Arc`s. Entities keep their model alive; the cache
//! entry is only a lookup shortcut, so unloading never invalidates a model an
//! entity still holds.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::animation::AnimatedModel;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("resource not found: {key}")]
    ResourceNotFound { key: String },
}

/// Produces models for opaque resource keys.
pub trait ModelLoader: Send + Sync {
    fn load(&self, key: &str) -> Result<AnimatedModel, AssetError>;
}

/// Loader backed by models registered up front.
#[derive(Debug, Default, Clone)]
pub struct InMemoryModelLoader {
    models: HashMap<String, AnimatedModel>,
}

impl InMemoryModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, model: AnimatedModel) {
        self.models.insert(key.into(), model);
    }
}

impl ModelLoader for InMemoryModelLoader {
    fn load(&self, key: &str) -> Result<AnimatedModel, AssetError> {
        self.models
            .get(key)
            .cloned()
            .ok_or_else(|| AssetError::ResourceNotFound {
                key: key.to_string(),
            })
    }
}

pub struct AssetCache<L: ModelLoader> {
    loader: L,
    models: HashMap<String, Arc<AnimatedModel>>,
}

impl<L: ModelLoader> AssetCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            models: HashMap::new(),
        }
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    pub fn get_or_load(&mut self, key: &str) -> Result<Arc<AnimatedModel>, AssetError> {
        if let Some(model) = self.models.get(key) {
            return Ok(Arc::clone(model));
        }
        let model = match self.loader.load(key) {
            Ok(model) => Arc::new(model),
            Err(error) => {
                warn!(key, error = %error, "asset_load_failed");
                return Err(error);
            }
        };
        debug!(key, bones = model.bone_count(), clips = model.clips.len(), "asset_loaded");
        self.models.insert(key.to_string(), Arc::clone(&model));
        Ok(model)
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.models.contains_key(key)
    }

    pub fn loaded_count(&self) -> usize {
        self.models.len()
    }

    /// Evicts the cache entry. Entities already holding the model keep it.
    pub fn unload(&mut self, key: &str) -> bool {
        self.models.remove(key).is_some()
    }

    /// Evicts every model no entity references any more.
    pub fn purge_unused(&mut self) -> usize {
        let before = self.models.len();
        self.models.retain(|_, model| Arc::strong_count(model) > 1);
        let purged = before - self.models.len();
        if purged > 0 {
            debug!(purged, "assets_purged");
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_model() -> AssetCache<InMemoryModelLoader> {
        let mut loader = InMemoryModelLoader::new();
        loader.register("hoplite", AnimatedModel::new("hoplite", None, Vec::new()));
        AssetCache::new(loader)
    }

    #[test]
    fn repeated_loads_share_one_model() {
        let mut cache = cache_with_model();
        let first = cache.get_or_load("hoplite").expect("first");
        let second = cache.get_or_load("hoplite").expect("second");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.loaded_count(), 1);
    }

    #[test]
    fn missing_model_reports_resource_not_found() {
        let mut cache = cache_with_model();
        assert_eq!(
            cache.get_or_load("trireme").map(|_| ()),
            Err(AssetError::ResourceNotFound {
                key: "trireme".to_string()
            })
        );
        assert!(!cache.is_loaded("trireme"));
    }

    #[test]
    fn purge_keeps_models_still_held() {
        let mut cache = cache_with_model();
        let held = cache.get_or_load("hoplite").expect("load");
        assert_eq!(cache.purge_unused(), 0);

        drop(held);
        assert_eq!(cache.purge_unused(), 1);
        assert!(!cache.is_loaded("hoplite"));
    }

    #[test]
    fn unload_leaves_holders_valid() {
        let mut cache = cache_with_model();
        let held = cache.get_or_load("hoplite").expect("load");
        assert!(cache.unload("hoplite"));
        assert_eq!(held.name, "hoplite");
    }
}
