//! Per-frame pose bookkeeping and stereo view-projection composition.
//!
//! [`EyeMatrices`] is queried once at setup; [`PoseComposer::refresh_poses`]
//! runs exactly once per frame before rendering. The rendering layer reads
//! the composed per-device transforms and per-eye view-projection matrices.

pub mod composer;

pub use composer::{EyeMatrices, FrameReport, PoseComposer, PoseError};
