//! 数学工具
//!
//! 欧拉角旋转与位姿组合，全部使用 f64（URDF 数值需要往返精度）。

mod rotation;

pub use rotation::{quat_from_rpy, rotate_vector_3d, rotation_matrix_rpy, Winding};

use glam::{DQuat, DVec3};

/// 位姿（位置 + 朝向）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: DVec3,
    pub orientation: DQuat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
        }
    }
}

impl Pose {
    #[inline]
    pub fn new(position: DVec3, orientation: DQuat) -> Self {
        Self { position, orientation }
    }

    /// 组合位姿：self * other（other 表达在 self 的坐标系中）
    #[inline]
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            position: self.position + self.orientation * other.position,
            orientation: (self.orientation * other.orientation).normalize(),
        }
    }
}

/// 逐分量乘法后归一化，零向量返回 None
#[inline]
pub fn scale_direction(direction: DVec3, scale: DVec3) -> Option<DVec3> {
    (direction * scale).try_normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_compose_pose() {
        let a = Pose::new(DVec3::new(1.0, 0.0, 0.0), DQuat::from_rotation_z(FRAC_PI_2));
        let b = Pose::new(DVec3::new(1.0, 0.0, 0.0), DQuat::IDENTITY);
        let c = a.compose(&b);
        assert!((c.position - DVec3::new(1.0, 1.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_scale_direction_zero() {
        assert!(scale_direction(DVec3::X, DVec3::new(0.0, 1.0, 1.0)).is_none());
        let d = scale_direction(DVec3::new(1.0, 1.0, 0.0), DVec3::new(2.0, 2.0, 1.0)).unwrap();
        assert!((d.length() - 1.0).abs() < 1e-12);
    }
}
