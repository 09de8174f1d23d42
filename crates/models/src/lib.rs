//! Render-model bookkeeping for tracked devices.
//!
//! Two pieces, deliberately separate:
//! - [`RenderModelCache`] maps a model name to GPU-resident resources,
//!   loading each unique name at most once via the runtime's async loader.
//! - [`DeviceModels`] is the fixed-size per-device slot table: which cache
//!   entry represents each device, and whether it is render-eligible.
//!
//! Load failures are contained here; only cache-capacity exhaustion is
//! unrecoverable (see [`CacheError::is_fatal`]).

pub mod cache;
pub mod gpu;
pub mod slots;

pub use cache::{CacheError, ModelKey, RenderModelCache, RenderModelEntry};
pub use gpu::{BufferHandle, GpuBackend, GpuError, GpuModel, HeadlessGpu, TextureHandle};
pub use slots::DeviceModels;
