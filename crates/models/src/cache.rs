use crate::gpu::{GpuBackend, GpuError, GpuModel, TextureHandle};
use rigview_common::MAX_TRACKED_DEVICES;
use rigview_runtime::{LoadError, LoadPolicy, ModelLoader, TextureId, block_on_load};

/// Key into the render-model cache. Copyable; many device slots may hold the
/// same key when devices share a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelKey(usize);

/// One loaded render model: name plus GPU-resident resources. Created once
/// per unique name, never mutated, retained for the cache lifetime.
#[derive(Debug, Clone)]
pub struct RenderModelEntry {
    name: String,
    mesh: GpuModel,
    texture: TextureHandle,
}

impl RenderModelEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> GpuModel {
        self.mesh
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn vertex_count(&self) -> u32 {
        self.mesh.vertex_count
    }
}

/// Errors from [`RenderModelCache::find_or_load`].
///
/// Every variant except [`CacheError::CapacityExhausted`] is contained at
/// the device-assignment boundary: the device renders nothing this session
/// and the frame loop continues. Capacity exhaustion means the fixed-table
/// sizing assumption was violated and the caller must treat it as
/// unrecoverable.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("render model name is empty")]
    EmptyName,
    #[error("unable to load render model {name}: {source}")]
    ModelLoad { name: String, source: LoadError },
    #[error("unable to load texture {texture} for render model {name}: {source}")]
    TextureLoad {
        name: String,
        texture: TextureId,
        source: LoadError,
    },
    #[error("unable to create gpu resources for render model {name}: {source}")]
    Gpu { name: String, source: GpuError },
    #[error("render model cache is full ({capacity} entries), cannot admit {name}")]
    CapacityExhausted { name: String, capacity: usize },
}

impl CacheError {
    /// True for errors the caller must not swallow.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CacheError::CapacityExhausted { .. })
    }
}

/// Fixed-capacity cache of loaded render models, keyed by name.
///
/// Lookup is a case-insensitive linear scan; at a capacity of 16 a map buys
/// nothing and the scan preserves first-free-slot insertion order. Each
/// unique name is loaded at most once per process.
pub struct RenderModelCache {
    entries: Vec<RenderModelEntry>,
    capacity: usize,
    policy: LoadPolicy,
}

impl RenderModelCache {
    pub fn new(policy: LoadPolicy) -> Self {
        Self::with_capacity(MAX_TRACKED_DEVICES, policy)
    }

    pub fn with_capacity(capacity: usize, policy: LoadPolicy) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Case-insensitive lookup without loading.
    pub fn find(&self, name: &str) -> Option<ModelKey> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
            .map(ModelKey)
    }

    pub fn get(&self, key: ModelKey) -> Option<&RenderModelEntry> {
        self.entries.get(key.0)
    }

    /// Return the cached entry for `name`, loading it first if needed.
    ///
    /// On a miss this blocks on the runtime's async model and texture loads
    /// (poll + sleep under the cache's [`LoadPolicy`]), builds GPU resources
    /// and admits the entry. Load failures are logged and returned; they do
    /// not poison the cache, so a later activation event retries from
    /// scratch.
    pub fn find_or_load(
        &mut self,
        name: &str,
        loader: &mut dyn ModelLoader,
        gpu: &mut dyn GpuBackend,
    ) -> Result<ModelKey, CacheError> {
        if name.is_empty() {
            return Err(CacheError::EmptyName);
        }
        if let Some(key) = self.find(name) {
            tracing::debug!(model = name, "render model cache hit");
            return Ok(key);
        }

        // Refuse before starting the blocking load: a full table would only
        // orphan the uploaded GPU resources, which have no release path.
        if self.entries.len() >= self.capacity {
            return Err(CacheError::CapacityExhausted {
                name: name.to_owned(),
                capacity: self.capacity,
            });
        }

        let model = block_on_load(self.policy, || loader.load_model(name)).map_err(|source| {
            tracing::warn!(model = name, error = %source, "unable to load render model");
            CacheError::ModelLoad {
                name: name.to_owned(),
                source,
            }
        })?;

        let texture_id = model.diffuse_texture_id;
        let texture =
            block_on_load(self.policy, || loader.load_texture(texture_id)).map_err(|source| {
                tracing::warn!(
                    model = name,
                    texture = texture_id.0,
                    error = %source,
                    "unable to load render model texture"
                );
                // `model` is dropped here; nothing partial is retained.
                CacheError::TextureLoad {
                    name: name.to_owned(),
                    texture: texture_id,
                    source,
                }
            })?;

        let mesh = gpu
            .upload_model(&model)
            .map_err(|source| CacheError::Gpu {
                name: name.to_owned(),
                source,
            })?;
        let texture = gpu
            .upload_texture(&texture)
            .map_err(|source| CacheError::Gpu {
                name: name.to_owned(),
                source,
            })?;

        tracing::debug!(
            model = name,
            vertices = mesh.vertex_count,
            "render model loaded"
        );
        self.entries.push(RenderModelEntry {
            name: name.to_owned(),
            mesh,
            texture,
        });
        Ok(ModelKey(self.entries.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessGpu;
    use rigview_runtime::stub::{StubLoader, sample_model};
    use rigview_runtime::{LoadFailure, LoadPoll, ModelData, TextureData};
    use std::time::Duration;

    fn fast_policy() -> LoadPolicy {
        LoadPolicy {
            interval: Duration::from_micros(10),
            timeout: Some(Duration::from_millis(100)),
        }
    }

    fn cache() -> RenderModelCache {
        RenderModelCache::new(fast_policy())
    }

    #[test]
    fn load_then_hit() {
        let mut loader = StubLoader::with_latency(3);
        loader.insert_model("vive_controller", sample_model(TextureId(1)));
        let mut gpu = HeadlessGpu::new();
        let mut cache = cache();

        let key = cache
            .find_or_load("vive_controller", &mut loader, &mut gpu)
            .unwrap();
        assert_eq!(cache.get(key).unwrap().name(), "vive_controller");
        assert_eq!(cache.len(), 1);

        let again = cache
            .find_or_load("vive_controller", &mut loader, &mut gpu)
            .unwrap();
        assert_eq!(key, again);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lookup_is_case_insensitive_and_loads_at_most_once() {
        let mut loader = StubLoader::new();
        loader.insert_model("Vive_Controller", sample_model(TextureId(1)));
        let mut gpu = HeadlessGpu::new();
        let mut cache = cache();

        let a = cache
            .find_or_load("Vive_Controller", &mut loader, &mut gpu)
            .unwrap();
        let b = cache
            .find_or_load("vive_controller", &mut loader, &mut gpu)
            .unwrap();
        let c = cache
            .find_or_load("VIVE_CONTROLLER", &mut loader, &mut gpu)
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(loader.model_loads_started.len(), 1);
        assert_eq!(gpu.models_uploaded, 1);
    }

    #[test]
    fn model_failure_is_returned_and_not_cached() {
        let mut loader = StubLoader::new();
        loader.fail_model("broken", LoadFailure::Corrupt);
        let mut gpu = HeadlessGpu::new();
        let mut cache = cache();

        let err = cache
            .find_or_load("broken", &mut loader, &mut gpu)
            .unwrap_err();
        assert!(matches!(err, CacheError::ModelLoad { .. }));
        assert!(!err.is_fatal());
        assert!(cache.is_empty());
        assert_eq!(gpu.models_uploaded, 0);
    }

    #[test]
    fn texture_failure_drops_model_payload() {
        let mut loader = StubLoader::new();
        loader.insert_model("wand", sample_model(TextureId(9)));
        loader.fail_texture(TextureId(9), LoadFailure::NotFound);
        let mut gpu = HeadlessGpu::new();
        let mut cache = cache();

        let err = cache.find_or_load("wand", &mut loader, &mut gpu).unwrap_err();
        assert!(matches!(err, CacheError::TextureLoad { .. }));
        assert!(cache.is_empty());
        // Nothing reached the GPU.
        assert_eq!(gpu.models_uploaded, 0);
        assert_eq!(gpu.textures_uploaded, 0);
    }

    #[test]
    fn stuck_load_times_out() {
        struct NeverReady;
        impl ModelLoader for NeverReady {
            fn load_model(&mut self, _name: &str) -> LoadPoll<ModelData> {
                LoadPoll::Pending
            }
            fn load_texture(&mut self, _texture: TextureId) -> LoadPoll<TextureData> {
                LoadPoll::Pending
            }
        }

        let mut cache = RenderModelCache::new(LoadPolicy {
            interval: Duration::from_micros(10),
            timeout: Some(Duration::from_millis(2)),
        });
        let err = cache
            .find_or_load("hung", &mut NeverReady, &mut HeadlessGpu::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CacheError::ModelLoad {
                source: LoadError::TimedOut { .. },
                ..
            }
        ));
    }

    #[test]
    fn capacity_holds_exactly_max_entries() {
        let mut loader = StubLoader::new();
        for i in 0..MAX_TRACKED_DEVICES {
            loader.insert_model(&format!("model_{i}"), sample_model(TextureId(i as i32)));
        }
        let mut gpu = HeadlessGpu::new();
        let mut cache = cache();

        for i in 0..MAX_TRACKED_DEVICES {
            cache
                .find_or_load(&format!("model_{i}"), &mut loader, &mut gpu)
                .unwrap();
        }
        assert_eq!(cache.len(), MAX_TRACKED_DEVICES);
    }

    #[test]
    fn exceeding_capacity_is_fatal() {
        let mut loader = StubLoader::new();
        for i in 0..=MAX_TRACKED_DEVICES {
            loader.insert_model(&format!("model_{i}"), sample_model(TextureId(i as i32)));
        }
        let mut gpu = HeadlessGpu::new();
        let mut cache = cache();

        for i in 0..MAX_TRACKED_DEVICES {
            cache
                .find_or_load(&format!("model_{i}"), &mut loader, &mut gpu)
                .unwrap();
        }
        let loads_before = loader.model_loads_started.len();
        let err = cache
            .find_or_load(
                &format!("model_{MAX_TRACKED_DEVICES}"),
                &mut loader,
                &mut gpu,
            )
            .unwrap_err();
        assert!(matches!(err, CacheError::CapacityExhausted { .. }));
        assert!(err.is_fatal());
        assert_eq!(cache.len(), MAX_TRACKED_DEVICES);
        // The full table refuses before loading or uploading anything, so no
        // GPU resources are orphaned.
        assert_eq!(loader.model_loads_started.len(), loads_before);
        assert_eq!(gpu.models_uploaded, MAX_TRACKED_DEVICES);
        assert_eq!(gpu.textures_uploaded, MAX_TRACKED_DEVICES);
    }

    #[test]
    fn full_cache_still_serves_hits() {
        let mut loader = StubLoader::new();
        loader.insert_model("only", sample_model(TextureId(1)));
        let mut gpu = HeadlessGpu::new();
        let mut cache = RenderModelCache::with_capacity(1, fast_policy());

        let key = cache.find_or_load("only", &mut loader, &mut gpu).unwrap();
        // Hits bypass the capacity refusal; only new admissions are blocked.
        assert_eq!(cache.find_or_load("ONLY", &mut loader, &mut gpu).unwrap(), key);
        assert!(matches!(
            cache.find_or_load("other", &mut loader, &mut gpu),
            Err(CacheError::CapacityExhausted { .. })
        ));
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut cache = cache();
        let err = cache
            .find_or_load("", &mut StubLoader::new(), &mut HeadlessGpu::new())
            .unwrap_err();
        assert!(matches!(err, CacheError::EmptyName));
    }
}
