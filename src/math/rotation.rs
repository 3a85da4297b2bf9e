//! 欧拉角旋转
//!
//! 约定与 URDF `rpy` 一致：先绕固定 X 轴 roll，再绕固定 Y 轴 pitch，
//! 最后绕固定 Z 轴 yaw，即 R = Rz(yaw) * Ry(pitch) * Rx(roll)。

use glam::{DMat3, DQuat, DVec3};

/// 旋转方向约定
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winding {
    /// R * v：把子坐标系中的向量表达到父坐标系
    Clockwise,
    /// Rᵀ * v：把父坐标系中的向量重新表达到旋转后的子坐标系
    CounterClockwise,
}

/// rpy 对应的旋转矩阵
#[inline]
pub fn rotation_matrix_rpy(roll: f64, pitch: f64, yaw: f64) -> DMat3 {
    DMat3::from_rotation_z(yaw) * DMat3::from_rotation_y(pitch) * DMat3::from_rotation_x(roll)
}

/// 按欧拉角旋转三维向量
///
/// 纯函数；NaN/无穷输入原样传播为 NaN，不做钳制。
pub fn rotate_vector_3d(v: DVec3, roll: f64, pitch: f64, yaw: f64, winding: Winding) -> DVec3 {
    let r = rotation_matrix_rpy(roll, pitch, yaw);
    match winding {
        Winding::Clockwise => r * v,
        Winding::CounterClockwise => r.transpose() * v,
    }
}

/// rpy 转四元数
#[inline]
pub fn quat_from_rpy(rpy: DVec3) -> DQuat {
    DQuat::from_rotation_z(rpy.z) * DQuat::from_rotation_y(rpy.y) * DQuat::from_rotation_x(rpy.x)
}
