//! 运动学树 - URDF 连杆/关节层次结构
//!
//! 核心设计思想：
//! - Link: 单个连杆，持有 visual / collision 几何与惯性
//! - Joint: 父连杆到子连杆的有向边，带局部原点与运动轴
//! - KinematicTree: 以 base_link 为根的树
//! - BoundingBoxRescaler: 把缩放向量沿树逐级旋转传播

mod joint;
mod link;
mod rescale;
mod tree;
mod urdf_reader;
mod urdf_writer;

pub use joint::{Joint, JointDynamics, JointKind, JointLimit};
pub use link::{Geometry, Inertial, Link, LinkGeometry, MeshRef};
pub use rescale::{BoundingBoxRescaler, BranchPolicy, RescaleReport, ScaleRequest};
pub use tree::KinematicTree;

pub(crate) use urdf_reader::{attributes as element_attributes, parse_vec3};

use glam::{DQuat, DVec3};

use crate::math::{quat_from_rpy, Pose};

/// 根连杆名称
pub const ROOT_LINK: &str = "base_link";

// ============================================================================
// 公共类型定义
// ============================================================================

/// 局部原点（相对父坐标系）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Origin {
    /// 平移
    pub xyz: DVec3,
    /// 欧拉角 (roll, pitch, yaw)，None 表示单位旋转
    pub rpy: Option<DVec3>,
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            xyz: DVec3::ZERO,
            rpy: None,
        }
    }
}

impl Origin {
    #[inline]
    pub fn new(xyz: DVec3) -> Self {
        Self { xyz, rpy: None }
    }

    #[inline]
    pub fn with_rpy(xyz: DVec3, rpy: DVec3) -> Self {
        Self { xyz, rpy: Some(rpy) }
    }

    /// 旋转部分
    #[inline]
    pub fn rotation(&self) -> DQuat {
        self.rpy.map(quat_from_rpy).unwrap_or(DQuat::IDENTITY)
    }

    /// 转换为位姿
    #[inline]
    pub fn to_pose(&self) -> Pose {
        Pose::new(self.xyz, self.rotation())
    }
}

/// 材质
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub name: String,
    pub rgba: Option<[f64; 4]>,
    pub texture: Option<String>,
}
