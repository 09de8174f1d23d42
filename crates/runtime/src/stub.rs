//! Scripted in-memory runtime for tests and the demo app.
//!
//! Implements the three collaborator traits with configurable behavior:
//! devices connect with a class and model name, loads resolve after a
//! scripted number of pending polls (or fail), and the compositor replays
//! whatever poses the caller set. No real headset required.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::poll::{LoadFailure, LoadPoll};
use crate::traits::{Compositor, ModelLoader, TrackingSystem};
use crate::types::{
    ControllerState, DeviceEvent, DeviceProperty, DevicePose, ModelData, ModelVertex,
    PropertyError, TextureData, TextureId,
};
use rigview_common::{DeviceClass, DeviceIndex, Eye, MAX_TRACKED_DEVICES, RawPoseMatrix};

/// One scripted device known to the stub system.
#[derive(Debug, Clone)]
struct StubDevice {
    class: DeviceClass,
    model_name: Option<String>,
    tracking_system: String,
    buttons_pressed: u64,
}

/// Scripted [`TrackingSystem`].
#[derive(Debug, Default)]
pub struct StubSystem {
    devices: BTreeMap<u32, StubDevice>,
    events: VecDeque<DeviceEvent>,
    /// Horizontal eye separation used for the eye-to-head transforms.
    pub ipd: f32,
}

impl StubSystem {
    pub fn new() -> Self {
        Self {
            ipd: 0.064,
            ..Self::default()
        }
    }

    /// Connect a device with the given class and render-model name.
    pub fn connect(&mut self, device: DeviceIndex, class: DeviceClass, model_name: &str) {
        self.devices.insert(
            device.0,
            StubDevice {
                class,
                model_name: Some(model_name.to_owned()),
                tracking_system: "stub".to_owned(),
                buttons_pressed: 0,
            },
        );
    }

    /// Connect a device that reports no render-model name.
    pub fn connect_without_model(&mut self, device: DeviceIndex, class: DeviceClass) {
        self.connect(device, class, "");
        if let Some(d) = self.devices.get_mut(&device.0) {
            d.model_name = None;
        }
    }

    pub fn set_buttons(&mut self, device: DeviceIndex, buttons_pressed: u64) {
        if let Some(d) = self.devices.get_mut(&device.0) {
            d.buttons_pressed = buttons_pressed;
        }
    }

    pub fn push_event(&mut self, event: DeviceEvent) {
        self.events.push_back(event);
    }
}

impl TrackingSystem for StubSystem {
    fn device_property(
        &self,
        device: DeviceIndex,
        property: DeviceProperty,
    ) -> Result<String, PropertyError> {
        let d = self
            .devices
            .get(&device.0)
            .ok_or(PropertyError::UnknownDevice { device })?;
        match property {
            DeviceProperty::RenderModelName => {
                d.model_name
                    .clone()
                    .ok_or(PropertyError::NotSet { device, property })
            }
            DeviceProperty::TrackingSystemName => Ok(d.tracking_system.clone()),
        }
    }

    fn device_class(&self, device: DeviceIndex) -> DeviceClass {
        self.devices
            .get(&device.0)
            .map(|d| d.class)
            .unwrap_or(DeviceClass::Invalid)
    }

    fn is_device_connected(&self, device: DeviceIndex) -> bool {
        self.devices.contains_key(&device.0)
    }

    fn projection_matrix(&self, _eye: Eye, near_clip: f32, far_clip: f32) -> [[f32; 4]; 4] {
        // Symmetric 90-degree frustum, row-major as a real runtime delivers it.
        let n = near_clip;
        let f = far_clip;
        [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, (f + n) / (n - f), 2.0 * f * n / (n - f)],
            [0.0, 0.0, -1.0, 0.0],
        ]
    }

    fn eye_to_head_transform(&self, eye: Eye) -> RawPoseMatrix {
        let half = self.ipd / 2.0;
        let x = match eye {
            Eye::Left => -half,
            Eye::Right => half,
        };
        RawPoseMatrix::from_translation(x, 0.0, 0.0)
    }

    fn poll_event(&mut self) -> Option<DeviceEvent> {
        self.events.pop_front()
    }

    fn controller_state(&self, device: DeviceIndex) -> Option<ControllerState> {
        let d = self.devices.get(&device.0)?;
        (d.class == DeviceClass::Controller).then_some(ControllerState {
            buttons_pressed: d.buttons_pressed,
        })
    }
}

/// Scripted [`ModelLoader`] with per-asset pending latency and failure
/// injection. Records which loads were started so tests can assert the
/// at-most-once property of the cache.
#[derive(Debug, Default)]
pub struct StubLoader {
    models: HashMap<String, Result<ModelData, LoadFailure>>,
    textures: HashMap<i32, Result<TextureData, LoadFailure>>,
    /// Number of `Pending` polls each load reports before resolving.
    pub latency_polls: u32,
    in_flight: HashMap<String, u32>,
    /// Model names whose load was started, in request order.
    pub model_loads_started: Vec<String>,
    /// Texture ids whose load was started, in request order.
    pub texture_loads_started: Vec<TextureId>,
}

impl StubLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency_polls: u32) -> Self {
        Self {
            latency_polls,
            ..Self::default()
        }
    }

    /// Script a model and its diffuse texture in one step.
    pub fn insert_model(&mut self, name: &str, model: ModelData) {
        let texture = model.diffuse_texture_id;
        self.models.insert(name.to_ascii_lowercase(), Ok(model));
        self.textures.entry(texture.0).or_insert_with(|| {
            Ok(TextureData {
                width: 2,
                height: 2,
                rgba: vec![0xff; 16],
            })
        });
    }

    pub fn fail_model(&mut self, name: &str, failure: LoadFailure) {
        self.models.insert(name.to_ascii_lowercase(), Err(failure));
    }

    pub fn fail_texture(&mut self, texture: TextureId, failure: LoadFailure) {
        self.textures.insert(texture.0, Err(failure));
    }

    /// Counts down the scripted latency for one in-flight load. Returns true
    /// once the load should resolve.
    fn advance(&mut self, key: &str) -> bool {
        let remaining = self
            .in_flight
            .entry(key.to_owned())
            .or_insert(self.latency_polls);
        if *remaining == 0 {
            self.in_flight.remove(key);
            true
        } else {
            *remaining -= 1;
            false
        }
    }
}

impl ModelLoader for StubLoader {
    fn load_model(&mut self, name: &str) -> LoadPoll<ModelData> {
        let key = format!("model:{}", name.to_ascii_lowercase());
        if !self.in_flight.contains_key(&key) {
            self.model_loads_started.push(name.to_owned());
        }
        if !self.advance(&key) {
            return LoadPoll::Pending;
        }
        match self.models.get(&name.to_ascii_lowercase()) {
            Some(Ok(model)) => LoadPoll::Ready(model.clone()),
            Some(Err(failure)) => LoadPoll::Failed(*failure),
            None => LoadPoll::Failed(LoadFailure::NotFound),
        }
    }

    fn load_texture(&mut self, texture: TextureId) -> LoadPoll<TextureData> {
        let key = format!("texture:{}", texture.0);
        if !self.in_flight.contains_key(&key) {
            self.texture_loads_started.push(texture);
        }
        if !self.advance(&key) {
            return LoadPoll::Pending;
        }
        match self.textures.get(&texture.0) {
            Some(Ok(data)) => LoadPoll::Ready(data.clone()),
            Some(Err(failure)) => LoadPoll::Failed(*failure),
            None => LoadPoll::Failed(LoadFailure::NotFound),
        }
    }
}

/// Scripted [`Compositor`]: replays the poses set by the caller and counts
/// frames.
#[derive(Debug)]
pub struct StubCompositor {
    pub poses: [DevicePose; MAX_TRACKED_DEVICES],
    pub frames_waited: u64,
}

impl Default for StubCompositor {
    fn default() -> Self {
        Self {
            poses: [DevicePose::default(); MAX_TRACKED_DEVICES],
            frames_waited: 0,
        }
    }
}

impl StubCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pose(&mut self, device: DeviceIndex, pose: DevicePose) {
        if device.in_bounds() {
            self.poses[device.as_usize()] = pose;
        }
    }
}

impl Compositor for StubCompositor {
    fn wait_get_poses(&mut self, poses: &mut [DevicePose; MAX_TRACKED_DEVICES]) {
        *poses = self.poses;
        self.frames_waited += 1;
    }
}

/// A minimal one-triangle model payload for tests and demos.
pub fn sample_model(texture: TextureId) -> ModelData {
    ModelData {
        vertices: vec![
            ModelVertex {
                position: [0.0, 0.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coord: [0.0, 0.0],
            },
            ModelVertex {
                position: [1.0, 0.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coord: [1.0, 0.0],
            },
            ModelVertex {
                position: [0.0, 1.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coord: [0.0, 1.0],
            },
        ],
        indices: vec![0, 1, 2],
        diffuse_texture_id: texture,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_resolves_after_scripted_latency() {
        let mut loader = StubLoader::with_latency(2);
        loader.insert_model("gizmo", sample_model(TextureId(1)));

        assert_eq!(loader.load_model("gizmo"), LoadPoll::Pending);
        assert_eq!(loader.load_model("gizmo"), LoadPoll::Pending);
        assert!(matches!(loader.load_model("gizmo"), LoadPoll::Ready(_)));
        // One load started despite three polls.
        assert_eq!(loader.model_loads_started.len(), 1);
    }

    #[test]
    fn unknown_model_fails_not_found() {
        let mut loader = StubLoader::new();
        assert_eq!(
            loader.load_model("missing"),
            LoadPoll::Failed(LoadFailure::NotFound)
        );
    }

    #[test]
    fn system_reports_scripted_devices() {
        let mut system = StubSystem::new();
        system.connect(DeviceIndex(3), DeviceClass::Controller, "wand");

        assert!(system.is_device_connected(DeviceIndex(3)));
        assert_eq!(system.device_class(DeviceIndex(3)), DeviceClass::Controller);
        assert_eq!(
            system
                .device_property(DeviceIndex(3), DeviceProperty::RenderModelName)
                .unwrap(),
            "wand"
        );
        assert_eq!(system.device_class(DeviceIndex(9)), DeviceClass::Invalid);
    }

    #[test]
    fn compositor_replays_poses() {
        let mut compositor = StubCompositor::new();
        compositor.set_pose(
            DeviceIndex(0),
            DevicePose::valid(RawPoseMatrix::IDENTITY),
        );

        let mut out = [DevicePose::default(); MAX_TRACKED_DEVICES];
        compositor.wait_get_poses(&mut out);
        assert!(out[0].valid);
        assert!(!out[1].valid);
        assert_eq!(compositor.frames_waited, 1);
    }

    #[test]
    fn eye_offsets_are_mirrored() {
        let system = StubSystem::new();
        let left = system.eye_to_head_transform(Eye::Left);
        let right = system.eye_to_head_transform(Eye::Right);
        assert_eq!(left.0[0][3], -right.0[0][3]);
    }
}
