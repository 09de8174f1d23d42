use glam::{Mat4, Vec4};
use serde::{Deserialize, Serialize};

/// Row-major 3x4 rigid transform as delivered by the tracking runtime.
///
/// `0[row][col]`: the upper-left 3x3 is rotation, the last column is
/// translation. Everything downstream works in column-major `Mat4`, so this
/// type exists only at the runtime boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoseMatrix(pub [[f32; 4]; 3]);

impl RawPoseMatrix {
    pub const IDENTITY: Self = Self([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ]);

    /// Identity rotation with the given translation.
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self([
            [1.0, 0.0, 0.0, x],
            [0.0, 1.0, 0.0, y],
            [0.0, 0.0, 1.0, z],
        ])
    }

    /// Canonical `Mat4` form: the 3x4 transposed into column-major with the
    /// last row fixed to `[0, 0, 0, 1]`.
    pub fn to_mat4(self) -> Mat4 {
        let m = self.0;
        Mat4::from_cols(
            Vec4::new(m[0][0], m[1][0], m[2][0], 0.0),
            Vec4::new(m[0][1], m[1][1], m[2][1], 0.0),
            Vec4::new(m[0][2], m[1][2], m[2][2], 0.0),
            Vec4::new(m[0][3], m[1][3], m[2][3], 1.0),
        )
    }
}

impl Default for RawPoseMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Convert a row-major 4x4 (runtime projection format) to column-major `Mat4`.
pub fn mat4_from_row_major(m: &[[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(m).transpose()
}

/// Errors from matrix operations at the tracking boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MatrixError {
    #[error("matrix is singular and cannot be inverted")]
    Singular,
}

/// Invert a transform, failing loudly on a singular or non-finite input
/// instead of propagating a garbage matrix.
pub fn try_invert(m: Mat4) -> Result<Mat4, MatrixError> {
    let det = m.determinant();
    if det == 0.0 || !det.is_finite() {
        return Err(MatrixError::Singular);
    }
    Ok(m.inverse())
}
