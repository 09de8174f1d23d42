//! Shared types for the rigview tracking core.
//!
//! # Invariants
//! - `DeviceIndex` is the device identity; slot tables are indexed by it directly.
//! - All transforms flowing through the system are column-major `glam::Mat4`.

pub mod convert;
pub mod types;

pub use convert::{MatrixError, RawPoseMatrix, mat4_from_row_major, try_invert};
pub use types::{DeviceClass, DeviceIndex, Eye, HMD_DEVICE_INDEX, MAX_TRACKED_DEVICES};
