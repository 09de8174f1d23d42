use crate::poll::LoadPoll;
use crate::types::{
    ControllerState, DeviceEvent, DeviceProperty, DevicePose, ModelData, PropertyError,
    TextureData, TextureId,
};
use rigview_common::{DeviceClass, DeviceIndex, Eye, MAX_TRACKED_DEVICES, RawPoseMatrix};

/// Query surface of the VR system: device metadata and eye geometry.
///
/// Eye geometry is queried once at setup; everything else may be called every
/// frame. Matrices cross this boundary in the runtime's row-major layouts and
/// are converted by the caller.
pub trait TrackingSystem {
    fn device_property(
        &self,
        device: DeviceIndex,
        property: DeviceProperty,
    ) -> Result<String, PropertyError>;

    fn device_class(&self, device: DeviceIndex) -> DeviceClass;

    fn is_device_connected(&self, device: DeviceIndex) -> bool;

    /// Row-major projection matrix for one eye.
    fn projection_matrix(&self, eye: Eye, near_clip: f32, far_clip: f32) -> [[f32; 4]; 4];

    /// Row-major 3x4 offset from the head pose to one eye's viewpoint.
    fn eye_to_head_transform(&self, eye: Eye) -> RawPoseMatrix;

    /// Drain one pending device lifecycle event, if any.
    fn poll_event(&mut self) -> Option<DeviceEvent>;

    /// Current input state for a device, or `None` if it has no controller role.
    fn controller_state(&self, device: DeviceIndex) -> Option<ControllerState>;
}

/// Asynchronous render-model asset loader. Both calls are poll-based: the
/// caller retries while [`LoadPoll::Pending`] is reported.
pub trait ModelLoader {
    fn load_model(&mut self, name: &str) -> LoadPoll<ModelData>;

    fn load_texture(&mut self, texture: TextureId) -> LoadPoll<TextureData>;
}

/// External compositor: blocks until the next frame's poses are available and
/// fills one pose per device slot.
pub trait Compositor {
    fn wait_get_poses(&mut self, poses: &mut [DevicePose; MAX_TRACKED_DEVICES]);
}
