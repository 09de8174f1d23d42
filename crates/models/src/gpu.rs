use rigview_runtime::{ModelData, TextureData};
use serde::{Deserialize, Serialize};

/// Opaque handle to a GPU buffer owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferHandle(pub u32);

/// Opaque handle to a GPU texture owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureHandle(pub u32);

/// GPU-resident mesh built from a render-model payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuModel {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    /// Number of indices to draw (three per triangle).
    pub vertex_count: u32,
}

/// Errors from GPU resource creation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GpuError {
    #[error("gpu upload failed: {0}")]
    Upload(String),
}

/// Upload seam between the cache and whatever graphics backend renders the
/// models. The cache only keeps the returned handles; resource lifetime is
/// the backend's concern.
pub trait GpuBackend {
    fn upload_model(&mut self, model: &ModelData) -> Result<GpuModel, GpuError>;

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureHandle, GpuError>;
}

/// Headless backend: allocates handles without a GPU. Used by tests and the
/// demo app.
#[derive(Debug, Default)]
pub struct HeadlessGpu {
    next_handle: u32,
    pub models_uploaded: usize,
    pub textures_uploaded: usize,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl GpuBackend for HeadlessGpu {
    fn upload_model(&mut self, model: &ModelData) -> Result<GpuModel, GpuError> {
        if model.indices.len() % 3 != 0 {
            return Err(GpuError::Upload(format!(
                "index count {} is not a whole number of triangles",
                model.indices.len()
            )));
        }
        self.models_uploaded += 1;
        Ok(GpuModel {
            vertex_buffer: BufferHandle(self.next()),
            index_buffer: BufferHandle(self.next()),
            vertex_count: model.indices.len() as u32,
        })
    }

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureHandle, GpuError> {
        let expected = texture.width as usize * texture.height as usize * 4;
        if texture.rgba.len() != expected {
            return Err(GpuError::Upload(format!(
                "texture payload is {} bytes, expected {expected}",
                texture.rgba.len()
            )));
        }
        self.textures_uploaded += 1;
        Ok(TextureHandle(self.next()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigview_runtime::TextureId;
    use rigview_runtime::stub::sample_model;

    #[test]
    fn headless_handles_are_distinct() {
        let mut gpu = HeadlessGpu::new();
        let model = sample_model(TextureId(1));
        let a = gpu.upload_model(&model).unwrap();
        let b = gpu.upload_model(&model).unwrap();
        assert_ne!(a.vertex_buffer, b.vertex_buffer);
        assert_ne!(a.index_buffer, b.index_buffer);
        assert_eq!(a.vertex_count, 3);
        assert_eq!(gpu.models_uploaded, 2);
    }

    #[test]
    fn truncated_texture_is_rejected() {
        let mut gpu = HeadlessGpu::new();
        let bad = TextureData {
            width: 2,
            height: 2,
            rgba: vec![0; 3],
        };
        assert!(gpu.upload_texture(&bad).is_err());
    }
}
