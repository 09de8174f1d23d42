use glam::Mat4;
use rigview_common::{
    DeviceClass, DeviceIndex, Eye, HMD_DEVICE_INDEX, MAX_TRACKED_DEVICES, mat4_from_row_major,
    try_invert,
};
use rigview_runtime::{Compositor, DevicePose, TrackingSystem};
use serde::Serialize;

/// Errors from pose composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoseError {
    /// The HMD reported a singular device-to-tracking transform. Propagating
    /// it would feed a garbage matrix into every eye.
    #[error("head pose transform is singular")]
    SingularHeadPose,
    #[error("eye-to-head transform for {0:?} eye is singular")]
    SingularEyeTransform(Eye),
}

/// Setup-time eye geometry: per-eye projection and inverted eye-to-head
/// offset, plus their cached product. Only the head pose changes per frame.
#[derive(Debug, Clone, Copy)]
pub struct EyeMatrices {
    projection: [Mat4; 2],
    eye_to_head_inv: [Mat4; 2],
    /// projection x inverted eye-to-head, per eye.
    combined: [Mat4; 2],
}

fn eye_index(eye: Eye) -> usize {
    match eye {
        Eye::Left => 0,
        Eye::Right => 1,
    }
}

impl EyeMatrices {
    /// Query both eyes' geometry from the system once.
    pub fn from_system(
        system: &dyn TrackingSystem,
        near_clip: f32,
        far_clip: f32,
    ) -> Result<Self, PoseError> {
        let mut projection = [Mat4::IDENTITY; 2];
        let mut eye_to_head_inv = [Mat4::IDENTITY; 2];
        let mut combined = [Mat4::IDENTITY; 2];
        for eye in [Eye::Left, Eye::Right] {
            let i = eye_index(eye);
            projection[i] = mat4_from_row_major(&system.projection_matrix(eye, near_clip, far_clip));
            let eye_to_head = system.eye_to_head_transform(eye).to_mat4();
            eye_to_head_inv[i] =
                try_invert(eye_to_head).map_err(|_| PoseError::SingularEyeTransform(eye))?;
            combined[i] = projection[i] * eye_to_head_inv[i];
        }
        Ok(Self {
            projection,
            eye_to_head_inv,
            combined,
        })
    }

    pub fn projection(&self, eye: Eye) -> Mat4 {
        self.projection[eye_index(eye)]
    }

    pub fn eye_to_head_inv(&self, eye: Eye) -> Mat4 {
        self.eye_to_head_inv[eye_index(eye)]
    }

    /// The cached projection x inverted eye-to-head product.
    pub fn combined(&self, eye: Eye) -> Mat4 {
        self.combined[eye_index(eye)]
    }
}

/// One-line pose diagnostic, emitted when the counts change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    pub valid_poses: usize,
    pub controllers: usize,
    /// One class tag per valid pose, in device-index order.
    pub pose_classes: String,
}

impl std::fmt::Display for FrameReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PoseCount:{}({}) Controllers:{}",
            self.valid_poses, self.pose_classes, self.controllers
        )
    }
}

/// Per-frame pose state for all tracked devices plus the composed stereo
/// matrices the renderer consumes.
pub struct PoseComposer {
    eyes: EyeMatrices,
    poses: [DevicePose; MAX_TRACKED_DEVICES],
    transforms: [Mat4; MAX_TRACKED_DEVICES],
    /// Class tag per device, assigned the first time the device is seen with
    /// a valid pose and immutable thereafter.
    class_tags: [Option<char>; MAX_TRACKED_DEVICES],
    valid_pose_count: usize,
    controller_count: usize,
    pose_classes: String,
    /// Inverted HMD device-to-tracking transform; identity until the HMD
    /// reports its first valid pose.
    head_pose: Mat4,
    last_counts: Option<(usize, usize)>,
}

impl PoseComposer {
    pub fn new(eyes: EyeMatrices) -> Self {
        Self {
            eyes,
            poses: [DevicePose::default(); MAX_TRACKED_DEVICES],
            transforms: [Mat4::IDENTITY; MAX_TRACKED_DEVICES],
            class_tags: [None; MAX_TRACKED_DEVICES],
            valid_pose_count: 0,
            controller_count: 0,
            pose_classes: String::new(),
            head_pose: Mat4::IDENTITY,
            last_counts: None,
        }
    }

    /// Refresh all device poses from the compositor. Called exactly once per
    /// frame, before rendering.
    ///
    /// Valid poses are converted to the canonical `Mat4` layout and counted;
    /// invalid poses keep their previous transform and are skipped
    /// downstream. If the HMD pose is valid its inverse becomes the head
    /// pose for this frame's view-projection matrices.
    pub fn refresh_poses(
        &mut self,
        compositor: &mut dyn Compositor,
        system: &dyn TrackingSystem,
    ) -> Result<(), PoseError> {
        compositor.wait_get_poses(&mut self.poses);

        self.valid_pose_count = 0;
        self.controller_count = 0;
        self.pose_classes.clear();
        for i in 0..MAX_TRACKED_DEVICES {
            if !self.poses[i].valid {
                continue;
            }
            self.valid_pose_count += 1;
            self.transforms[i] = self.poses[i].device_to_tracking.to_mat4();
            let tag = *self.class_tags[i]
                .get_or_insert_with(|| system.device_class(DeviceIndex(i as u32)).tag());
            self.pose_classes.push(tag);
            if tag == DeviceClass::Controller.tag() {
                self.controller_count += 1;
            }
        }

        if self.poses[HMD_DEVICE_INDEX.as_usize()].valid {
            self.head_pose = try_invert(self.transforms[HMD_DEVICE_INDEX.as_usize()])
                .map_err(|_| PoseError::SingularHeadPose)?;
        }

        tracing::trace!(
            valid = self.valid_pose_count,
            classes = %self.pose_classes,
            "poses refreshed"
        );
        Ok(())
    }

    pub fn pose_valid(&self, device: DeviceIndex) -> bool {
        device.in_bounds() && self.poses[device.as_usize()].valid
    }

    /// The device's current device-to-tracking transform, if its pose is
    /// valid this frame.
    pub fn device_transform(&self, device: DeviceIndex) -> Option<Mat4> {
        self.pose_valid(device)
            .then(|| self.transforms[device.as_usize()])
    }

    pub fn class_tag(&self, device: DeviceIndex) -> Option<char> {
        if !device.in_bounds() {
            return None;
        }
        self.class_tags[device.as_usize()]
    }

    pub fn valid_pose_count(&self) -> usize {
        self.valid_pose_count
    }

    pub fn controller_count(&self) -> usize {
        self.controller_count
    }

    /// Concatenated class tags of this frame's valid poses.
    pub fn pose_classes(&self) -> &str {
        &self.pose_classes
    }

    /// Inverted HMD transform used to build the view-projection matrices.
    pub fn head_pose(&self) -> Mat4 {
        self.head_pose
    }

    /// Per-eye view-projection: (eye projection) x (inverted eye-to-head) x
    /// (inverted head pose). The first two factors are cached at setup.
    pub fn view_projection(&self, eye: Eye) -> Mat4 {
        self.eyes.combined(eye) * self.head_pose
    }

    /// Change-detected diagnostic: `Some` when the valid-pose or controller
    /// count differs from the last report (including the first frame).
    pub fn frame_report(&mut self) -> Option<FrameReport> {
        let counts = (self.valid_pose_count, self.controller_count);
        if self.last_counts == Some(counts) {
            return None;
        }
        self.last_counts = Some(counts);
        Some(FrameReport {
            valid_poses: self.valid_pose_count,
            controllers: self.controller_count,
            pose_classes: self.pose_classes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use rigview_common::RawPoseMatrix;
    use rigview_runtime::stub::{StubCompositor, StubSystem};

    fn composer_with(system: &StubSystem) -> PoseComposer {
        PoseComposer::new(EyeMatrices::from_system(system, 0.1, 30.0).unwrap())
    }

    #[test]
    fn eye_projection_is_transposed_from_row_major() {
        let system = StubSystem::new();
        let eyes = EyeMatrices::from_system(&system, 0.1, 30.0).unwrap();
        let proj = eyes.projection(Eye::Left);
        // Row-major [3][2] = -1 must land in the z column's w component.
        assert_eq!(proj.z_axis.w, -1.0);
        assert_eq!(proj.w_axis.z, 2.0 * 30.0 * 0.1 / (0.1 - 30.0));
    }

    #[test]
    fn eye_offset_is_inverted_once_at_setup() {
        let system = StubSystem::new();
        let eyes = EyeMatrices::from_system(&system, 0.1, 30.0).unwrap();
        let half = system.ipd / 2.0;
        // Left eye sits at -x from the head; its inverse translates by +x.
        let inv = eyes.eye_to_head_inv(Eye::Left);
        assert!((inv.w_axis.x - half).abs() < 1e-6);
        assert_eq!(
            eyes.combined(Eye::Left),
            eyes.projection(Eye::Left) * eyes.eye_to_head_inv(Eye::Left)
        );
    }

    #[test]
    fn controller_on_slot_three_composes_identity() {
        let mut system = StubSystem::new();
        system.connect(DeviceIndex(3), DeviceClass::Controller, "wand");
        let mut compositor = StubCompositor::new();
        let mut composer = composer_with(&system);

        // Frame 1: slot 3 has no pose yet.
        composer.refresh_poses(&mut compositor, &system).unwrap();
        let before = composer.valid_pose_count();
        assert!(!composer.pose_valid(DeviceIndex(3)));

        // Frame 2: slot 3 reports a valid identity pose.
        compositor.set_pose(DeviceIndex(3), DevicePose::valid(RawPoseMatrix::IDENTITY));
        composer.refresh_poses(&mut compositor, &system).unwrap();

        assert_eq!(composer.device_transform(DeviceIndex(3)), Some(Mat4::IDENTITY));
        assert_eq!(composer.class_tag(DeviceIndex(3)), Some('C'));
        assert_eq!(composer.valid_pose_count(), before + 1);
        assert_eq!(composer.controller_count(), 1);
    }

    #[test]
    fn class_tag_is_assigned_once() {
        let mut system = StubSystem::new();
        system.connect(DeviceIndex(5), DeviceClass::GenericTracker, "puck");
        let mut compositor = StubCompositor::new();
        compositor.set_pose(DeviceIndex(5), DevicePose::valid(RawPoseMatrix::IDENTITY));
        let mut composer = composer_with(&system);

        composer.refresh_poses(&mut compositor, &system).unwrap();
        assert_eq!(composer.class_tag(DeviceIndex(5)), Some('G'));

        // Even if the runtime reclassifies the device, the tag sticks.
        system.connect(DeviceIndex(5), DeviceClass::Controller, "puck");
        composer.refresh_poses(&mut compositor, &system).unwrap();
        assert_eq!(composer.class_tag(DeviceIndex(5)), Some('G'));
    }

    #[test]
    fn pose_classes_concatenate_in_device_order() {
        let mut system = StubSystem::new();
        system.connect(DeviceIndex(0), DeviceClass::Hmd, "headset");
        system.connect(DeviceIndex(3), DeviceClass::Controller, "wand");
        system.connect(DeviceIndex(7), DeviceClass::TrackingReference, "base");
        let mut compositor = StubCompositor::new();
        for i in [0, 3, 7] {
            compositor.set_pose(DeviceIndex(i), DevicePose::valid(RawPoseMatrix::IDENTITY));
        }
        let mut composer = composer_with(&system);

        composer.refresh_poses(&mut compositor, &system).unwrap();
        assert_eq!(composer.pose_classes(), "HCT");
        assert_eq!(composer.valid_pose_count(), 3);
    }

    #[test]
    fn head_pose_is_inverted_hmd_transform() {
        let mut system = StubSystem::new();
        system.connect(DeviceIndex(0), DeviceClass::Hmd, "headset");
        let mut compositor = StubCompositor::new();
        compositor.set_pose(
            HMD_DEVICE_INDEX,
            DevicePose::valid(RawPoseMatrix::from_translation(1.0, 2.0, 3.0)),
        );
        let mut composer = composer_with(&system);

        composer.refresh_poses(&mut compositor, &system).unwrap();
        assert_eq!(
            composer.head_pose().w_axis,
            Vec4::new(-1.0, -2.0, -3.0, 1.0)
        );

        // The view-projection folds the head pose in behind the cached eye
        // product.
        let vp = composer.view_projection(Eye::Right);
        let expected = composer.eyes.combined(Eye::Right)
            * Mat4::from_translation(Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(vp, expected);
    }

    #[test]
    fn singular_head_pose_fails_loudly() {
        let mut system = StubSystem::new();
        system.connect(DeviceIndex(0), DeviceClass::Hmd, "headset");
        let mut compositor = StubCompositor::new();
        compositor.set_pose(
            HMD_DEVICE_INDEX,
            DevicePose::valid(RawPoseMatrix([[0.0; 4]; 3])),
        );
        let mut composer = composer_with(&system);

        assert_eq!(
            composer.refresh_poses(&mut compositor, &system),
            Err(PoseError::SingularHeadPose)
        );
    }

    #[test]
    fn invalid_hmd_pose_keeps_previous_head_pose() {
        let mut system = StubSystem::new();
        system.connect(DeviceIndex(0), DeviceClass::Hmd, "headset");
        let mut compositor = StubCompositor::new();
        compositor.set_pose(
            HMD_DEVICE_INDEX,
            DevicePose::valid(RawPoseMatrix::from_translation(5.0, 0.0, 0.0)),
        );
        let mut composer = composer_with(&system);
        composer.refresh_poses(&mut compositor, &system).unwrap();
        let head = composer.head_pose();

        compositor.set_pose(HMD_DEVICE_INDEX, DevicePose::default());
        composer.refresh_poses(&mut compositor, &system).unwrap();
        assert_eq!(composer.head_pose(), head);
        assert!(!composer.pose_valid(HMD_DEVICE_INDEX));
    }

    #[test]
    fn frame_report_fires_only_on_count_changes() {
        let mut system = StubSystem::new();
        system.connect(DeviceIndex(0), DeviceClass::Hmd, "headset");
        let mut compositor = StubCompositor::new();
        compositor.set_pose(DeviceIndex(0), DevicePose::valid(RawPoseMatrix::IDENTITY));
        let mut composer = composer_with(&system);

        composer.refresh_poses(&mut compositor, &system).unwrap();
        let first = composer.frame_report().unwrap();
        assert_eq!(first.to_string(), "PoseCount:1(H) Controllers:0");

        composer.refresh_poses(&mut compositor, &system).unwrap();
        assert!(composer.frame_report().is_none());

        system.connect(DeviceIndex(3), DeviceClass::Controller, "wand");
        compositor.set_pose(DeviceIndex(3), DevicePose::valid(RawPoseMatrix::IDENTITY));
        composer.refresh_poses(&mut compositor, &system).unwrap();
        let report = composer.frame_report().unwrap();
        assert_eq!(report.valid_poses, 2);
        assert_eq!(report.controllers, 1);
        assert_eq!(report.pose_classes, "HC");
    }
}
