//! 连杆节点
//!
//! Link 持有若干 visual / collision 几何和可选的惯性描述。
//! 缩放器会原地修改网格的 scale 与各原点的 xyz。

use std::path::PathBuf;

use glam::DVec3;

use super::{Material, Origin};

// ============================================================================
// 几何
// ============================================================================

/// 网格引用
#[derive(Clone, Debug, PartialEq)]
pub struct MeshRef {
    /// 几何资源路径（解析后为绝对路径）
    pub file_path: PathBuf,
    /// 逐轴缩放，None 等价于 (1, 1, 1)
    pub scale: Option<DVec3>,
}

impl MeshRef {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            scale: None,
        }
    }

    /// 生效的缩放
    #[inline]
    pub fn effective_scale(&self) -> DVec3 {
        self.scale.unwrap_or(DVec3::ONE)
    }

    /// 叠加缩放：已有缩放逐分量相乘，没有则直接设置
    #[inline]
    pub fn apply_scale(&mut self, scale: DVec3) {
        self.scale = Some(match self.scale {
            Some(current) => current * scale,
            None => scale,
        });
    }
}

/// 几何形状
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Mesh(MeshRef),
    Box { size: DVec3 },
    Cylinder { radius: f64, length: f64 },
    Sphere { radius: f64 },
}

impl Geometry {
    #[inline]
    pub fn as_mesh(&self) -> Option<&MeshRef> {
        match self {
            Geometry::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    #[inline]
    pub fn as_mesh_mut(&mut self) -> Option<&mut MeshRef> {
        match self {
            Geometry::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// visual 或 collision 元素
#[derive(Clone, Debug, PartialEq)]
pub struct LinkGeometry {
    pub name: Option<String>,
    pub origin: Origin,
    pub geometry: Geometry,
    /// 仅 visual 使用
    pub material: Option<Material>,
}

impl LinkGeometry {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            name: None,
            origin: Origin::default(),
            geometry,
            material: None,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }
}

/// 惯性描述
#[derive(Clone, Debug, PartialEq)]
pub struct Inertial {
    pub origin: Origin,
    pub mass: f64,
    /// ixx, ixy, ixz, iyy, iyz, izz
    pub inertia: [f64; 6],
}

impl Default for Inertial {
    fn default() -> Self {
        Self {
            origin: Origin::default(),
            mass: 0.0,
            inertia: [0.0; 6],
        }
    }
}

// ============================================================================
// 连杆
// ============================================================================

/// 连杆
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Link {
    /// 唯一名称
    pub name: String,
    pub visuals: Vec<LinkGeometry>,
    pub collisions: Vec<LinkGeometry>,
    pub inertial: Option<Inertial>,
}

impl Link {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_visual(mut self, visual: LinkGeometry) -> Self {
        self.visuals.push(visual);
        self
    }

    pub fn with_collision(mut self, collision: LinkGeometry) -> Self {
        self.collisions.push(collision);
        self
    }

    /// 所有 visual + collision 元素（文档顺序：先 visual 后 collision）
    pub fn geometries(&self) -> impl Iterator<Item = &LinkGeometry> {
        self.visuals.iter().chain(self.collisions.iter())
    }

    pub fn geometries_mut(&mut self) -> impl Iterator<Item = &mut LinkGeometry> {
        self.visuals.iter_mut().chain(self.collisions.iter_mut())
    }

    /// 网格引用
    pub fn meshes(&self) -> impl Iterator<Item = &MeshRef> {
        self.geometries().filter_map(|g| g.geometry.as_mesh())
    }

    pub fn meshes_mut(&mut self) -> impl Iterator<Item = &mut MeshRef> {
        self.geometries_mut().filter_map(|g| g.geometry.as_mesh_mut())
    }

    /// 连杆内部所有原点（visual / collision / inertial）
    pub fn origins_mut(&mut self) -> impl Iterator<Item = &mut Origin> {
        let inertial = self.inertial.as_mut().map(|i| &mut i.origin);
        self.visuals
            .iter_mut()
            .chain(self.collisions.iter_mut())
            .map(|g| &mut g.origin)
            .chain(inertial)
    }

    /// 对连杆内容应用缩放：网格 scale 与全部局部原点平移
    pub fn apply_scale(&mut self, scale: DVec3) {
        for mesh in self.meshes_mut() {
            mesh.apply_scale(scale);
        }
        for origin in self.origins_mut() {
            origin.xyz *= scale;
        }
    }
}
