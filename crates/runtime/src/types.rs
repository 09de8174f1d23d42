use rigview_common::{DeviceIndex, RawPoseMatrix};
use serde::{Deserialize, Serialize};

/// Runtime identifier of a diffuse texture referenced by a model payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub i32);

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One vertex of a render-model mesh as delivered by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// Raw render-model payload returned by a successful model load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    pub vertices: Vec<ModelVertex>,
    /// Triangle list, three indices per triangle.
    pub indices: Vec<u16>,
    pub diffuse_texture_id: TextureId,
}

impl ModelData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Raw RGBA texture payload returned by a successful texture load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureData {
    pub width: u16,
    pub height: u16,
    pub rgba: Vec<u8>,
}

/// Per-device pose as filled in by the compositor each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DevicePose {
    pub valid: bool,
    pub device_to_tracking: RawPoseMatrix,
}

impl Default for DevicePose {
    fn default() -> Self {
        Self {
            valid: false,
            device_to_tracking: RawPoseMatrix::IDENTITY,
        }
    }
}

impl DevicePose {
    pub fn valid(device_to_tracking: RawPoseMatrix) -> Self {
        Self {
            valid: true,
            device_to_tracking,
        }
    }
}

/// String properties the tracking core queries per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceProperty {
    /// Name of the render model representing the device's appearance.
    RenderModelName,
    /// Name of the tracking system driving the device (diagnostics only).
    TrackingSystemName,
}

/// Errors from per-device property queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    #[error("device {device} is not known to the runtime")]
    UnknownDevice { device: DeviceIndex },
    #[error("device {device} has no value for {property:?}")]
    NotSet {
        device: DeviceIndex,
        property: DeviceProperty,
    },
}

/// Controller input snapshot; only button state matters to the tracking core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Bitmask of currently held buttons.
    pub buttons_pressed: u64,
}

impl ControllerState {
    pub fn any_button_held(self) -> bool {
        self.buttons_pressed != 0
    }
}

/// Device lifecycle events polled from the runtime each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// Device connected; its render model should be set up.
    Activated(DeviceIndex),
    Deactivated(DeviceIndex),
    Updated(DeviceIndex),
}
