//! 物理引擎能力接口
//!
//! 物体层只通过 `PhysicsEngine` 调用引擎，引擎实例由调用方显式传入，
//! 不存在全局引擎上下文。
//!
//! 提供两种实现：
//! - HeadlessEngine: 只做记录，不做动力学（空跑/测试）
//! - RapierEngine: 基于 rapier3d 的刚体实现

mod headless;
mod rapier;

pub use headless::{EngineCall, HeadlessEngine};
pub use rapier::RapierEngine;

use std::fmt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use glam::{DQuat, DVec3};
use thiserror::Error;

use crate::config::get_config;
use crate::math::Pose;

// ============================================================================
// 句柄
// ============================================================================

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }
    };
}

define_handle!(
    /// 刚体/软体句柄
    BodyHandle,
    "body"
);
define_handle!(
    /// 碰撞/可视形状句柄
    ShapeHandle,
    "shape"
);
define_handle!(
    /// 约束句柄
    ConstraintHandle,
    "constraint"
);

// ============================================================================
// 错误
// ============================================================================

/// 引擎调用错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u32 },

    #[error("Operation not supported by this engine: {0}")]
    Unsupported(&'static str),

    #[error("Engine backend error: {0}")]
    Backend(String),

    #[error("Failed to load mesh '{path}': {reason}")]
    MeshLoad { path: String, reason: String },
}

impl EngineError {
    pub(crate) fn body(handle: BodyHandle) -> Self {
        Self::InvalidHandle { kind: "body", id: handle.0 }
    }

    pub(crate) fn shape(handle: ShapeHandle) -> Self {
        Self::InvalidHandle { kind: "shape", id: handle.0 }
    }

    pub(crate) fn constraint(handle: ConstraintHandle) -> Self {
        Self::InvalidHandle { kind: "constraint", id: handle.0 }
    }

    pub(crate) fn mesh_load(path: &Path, reason: impl fmt::Display) -> Self {
        Self::MeshLoad {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

// ============================================================================
// 标志位
// ============================================================================

bitflags! {
    /// 形状创建标志
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct GeomFlags: u32 {
        /// 网格按凹三角网格处理（不取凸包）
        const FORCE_CONCAVE_TRIMESH = 1 << 0;
    }
}

bitflags! {
    /// 运动学树加载标志
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LoadFlags: u32 {
        /// 使用 MTL 中的材质颜色
        const USE_MATERIAL_COLORS_FROM_MTL = 1 << 0;
        /// 同一树内连杆之间产生碰撞
        const USE_SELF_COLLISION = 1 << 1;
    }
}

// ============================================================================
// 描述结构
// ============================================================================

/// 形状种类
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Sphere,
    Box,
    Cylinder,
    Capsule,
    Mesh,
}

/// 形状描述
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeDesc {
    Sphere { radius: f64 },
    Box { half_extents: DVec3 },
    Cylinder { radius: f64, length: f64 },
    Capsule { radius: f64, length: f64 },
    Mesh {
        path: PathBuf,
        scale: DVec3,
        flags: GeomFlags,
    },
}

impl ShapeDesc {
    /// 按原始比例的网格
    pub fn mesh(path: impl Into<PathBuf>) -> Self {
        Self::Mesh {
            path: path.into(),
            scale: DVec3::ONE,
            flags: GeomFlags::empty(),
        }
    }

    /// 统一比例缩放的网格
    pub fn scaled_mesh(path: impl Into<PathBuf>, scale: f64) -> Self {
        Self::Mesh {
            path: path.into(),
            scale: DVec3::splat(scale),
            flags: GeomFlags::empty(),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Sphere { .. } => ShapeKind::Sphere,
            Self::Box { .. } => ShapeKind::Box,
            Self::Cylinder { .. } => ShapeKind::Cylinder,
            Self::Capsule { .. } => ShapeKind::Capsule,
            Self::Mesh { .. } => ShapeKind::Mesh,
        }
    }
}

/// 可视形状附加参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualDesc {
    pub rgba: [f32; 4],
    /// 可视形状相对刚体的偏移
    pub frame_offset: DVec3,
}

impl Default for VisualDesc {
    fn default() -> Self {
        Self {
            rgba: [1.0, 1.0, 1.0, 1.0],
            frame_offset: DVec3::ZERO,
        }
    }
}

/// 刚体创建参数
///
/// 质量为 0 表示静态刚体。碰撞形状与可视形状都可以缺省。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyDesc {
    pub mass: f64,
    pub collision: Option<ShapeHandle>,
    pub visual: Option<ShapeHandle>,
    pub position: DVec3,
    pub orientation: DQuat,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            mass: 0.0,
            collision: None,
            visual: None,
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
        }
    }
}

/// 软体参数（默认值与常见软体加载接口一致，负数表示由引擎决定）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeformableParams {
    pub scale: f64,
    pub position: DVec3,
    pub orientation: DQuat,
    pub mass: f64,
    pub collision_margin: f64,
    pub use_mass_spring: bool,
    pub use_bending_springs: bool,
    pub use_neo_hookean: bool,
    pub spring_elastic_stiffness: f64,
    pub spring_damping_stiffness: f64,
    pub spring_bending_stiffness: f64,
    pub neo_hookean_mu: f64,
    pub neo_hookean_lambda: f64,
    pub neo_hookean_damping: f64,
    pub friction_coeff: f64,
    pub use_face_contact: bool,
    pub use_self_collision: bool,
    /// 有符号距离场体素尺寸
    pub sparse_sdf_voxel_size: f64,
}

impl Default for DeformableParams {
    fn default() -> Self {
        Self {
            scale: -1.0,
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            mass: -1.0,
            collision_margin: -1.0,
            use_mass_spring: false,
            use_bending_springs: false,
            use_neo_hookean: false,
            spring_elastic_stiffness: 1.0,
            spring_damping_stiffness: 0.1,
            spring_bending_stiffness: 0.1,
            neo_hookean_mu: 1.0,
            neo_hookean_lambda: 1.0,
            neo_hookean_damping: 0.1,
            friction_coeff: 0.0,
            use_face_contact: false,
            use_self_collision: false,
            sparse_sdf_voxel_size: get_config().sparse_sdf_voxel_size,
        }
    }
}

/// 软体锚点目标
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorTarget {
    /// 固定在世界坐标
    World,
    /// 固定到另一个物体（link 为 None 表示基座）
    Body { body: BodyHandle, link: Option<usize> },
}

// ============================================================================
// 能力接口
// ============================================================================

/// 物理引擎能力接口
///
/// 所有调用同步完成，失败立即返回，不做重试。
pub trait PhysicsEngine {
    fn create_collision_shape(&mut self, shape: &ShapeDesc) -> EngineResult<ShapeHandle>;

    fn create_visual_shape(&mut self, shape: &ShapeDesc, visual: &VisualDesc) -> EngineResult<ShapeHandle>;

    fn create_body(&mut self, desc: &BodyDesc) -> EngineResult<BodyHandle>;

    /// 加载运动学树描述文件
    fn load_tree_description(&mut self, path: &Path, global_scale: f64, flags: LoadFlags) -> EngineResult<BodyHandle>;

    fn load_deformable(&mut self, path: &Path, params: &DeformableParams) -> EngineResult<BodyHandle>;

    /// 把软体节点钉到目标上
    fn create_anchor(
        &mut self,
        body: BodyHandle,
        node_index: i32,
        target: AnchorTarget,
        local_position: DVec3,
    ) -> EngineResult<()>;

    /// 把物体固定到世界坐标下的目标位姿
    fn create_fixed_constraint(
        &mut self,
        body: BodyHandle,
        position: DVec3,
        orientation: DQuat,
    ) -> EngineResult<ConstraintHandle>;

    /// 移动约束目标
    fn update_constraint(
        &mut self,
        constraint: ConstraintHandle,
        position: DVec3,
        orientation: DQuat,
    ) -> EngineResult<()>;

    fn get_pose(&self, body: BodyHandle) -> EngineResult<Pose>;

    fn set_pose(&mut self, body: BodyHandle, position: DVec3, orientation: DQuat) -> EngineResult<()>;

    /// 基座质量
    fn get_mass(&self, body: BodyHandle) -> EngineResult<f64>;

    fn change_visual_color(&mut self, body: BodyHandle, rgba: [f32; 4]) -> EngineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_kind() {
        assert_eq!(ShapeDesc::mesh("a.obj").kind(), ShapeKind::Mesh);
        assert_eq!(ShapeDesc::Sphere { radius: 1.0 }.kind(), ShapeKind::Sphere);
        match ShapeDesc::scaled_mesh("a.obj", 2.0) {
            ShapeDesc::Mesh { scale, flags, .. } => {
                assert_eq!(scale, DVec3::splat(2.0));
                assert!(flags.is_empty());
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(BodyHandle(3).to_string(), "body#3");
        assert_eq!(ConstraintHandle(0).to_string(), "constraint#0");
    }
}
