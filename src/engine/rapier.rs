//! rapier3d 实现
//!
//! 只负责创建：形状、刚体、约束，以及按零位形展开的运动学树。
//! 不做步进。软体与软体锚点不受支持。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{DQuat, DVec3};
use rapier3d::na::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;

use super::{
    AnchorTarget, BodyDesc, BodyHandle, ConstraintHandle, DeformableParams, EngineError, EngineResult,
    GeomFlags, LoadFlags, PhysicsEngine, ShapeDesc, ShapeHandle, VisualDesc,
};
use crate::kinematics::{Geometry, JointKind, KinematicTree, Origin, ROOT_LINK};
use crate::math::Pose;

/// 对外句柄对应的 rapier 数据
struct BodyEntry {
    /// 基座刚体
    root: RigidBodyHandle,
    /// 运动学树的其余连杆
    links: Vec<RigidBodyHandle>,
    mass: f64,
    rgba: Option<[f32; 4]>,
}

/// 固定约束：运动学锚点刚体 + 固定关节
struct ConstraintEntry {
    anchor: RigidBodyHandle,
    joint: ImpulseJointHandle,
}

/// rapier3d 物理引擎
pub struct RapierEngine {
    pub rigid_bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub impulse_joints: ImpulseJointSet,
    collision_shapes: Vec<SharedShape>,
    visual_shapes: Vec<VisualDesc>,
    bodies: Vec<BodyEntry>,
    constraints: Vec<ConstraintEntry>,
}

impl Default for RapierEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierEngine {
    pub fn new() -> Self {
        log::info!("[Rapier] 物理世界创建");
        Self {
            rigid_bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            collision_shapes: Vec::new(),
            visual_shapes: Vec::new(),
            bodies: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// 对外句柄对应的全部 rapier 刚体（基座在前）
    pub fn rigid_body_handles(&self, body: BodyHandle) -> EngineResult<Vec<RigidBodyHandle>> {
        let entry = self.entry(body)?;
        let mut handles = Vec::with_capacity(entry.links.len() + 1);
        handles.push(entry.root);
        handles.extend(entry.links.iter().copied());
        Ok(handles)
    }

    pub fn visual_color(&self, body: BodyHandle) -> Option<[f32; 4]> {
        self.bodies.get(body.0 as usize).and_then(|e| e.rgba)
    }

    fn entry(&self, body: BodyHandle) -> EngineResult<&BodyEntry> {
        self.bodies.get(body.0 as usize).ok_or(EngineError::body(body))
    }

    fn root_body(&self, body: BodyHandle) -> EngineResult<&RigidBody> {
        let root = self.entry(body)?.root;
        self.rigid_bodies.get(root).ok_or(EngineError::body(body))
    }

    fn register(&mut self, entry: BodyEntry) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(entry);
        handle
    }

    /// 按零位形把整棵树展开成刚体 + 关节
    fn instantiate_tree(&mut self, tree: &KinematicTree, base_dir: &Path, global_scale: f64) -> EngineResult<BodyEntry> {
        let mut placed: HashMap<&str, (RigidBodyHandle, Isometry3<Real>)> = HashMap::new();
        let mut links = Vec::new();

        let root_handle = self.spawn_link(tree, ROOT_LINK, Isometry3::identity(), base_dir, global_scale)?;
        placed.insert(ROOT_LINK, (root_handle, Isometry3::identity()));

        let mut stack = vec![ROOT_LINK];
        while let Some(parent_name) = stack.pop() {
            let (parent_handle, parent_pose) = placed[parent_name];
            for joint in tree.joints_with_parent(parent_name) {
                let joint_frame = to_isometry_scaled(&joint.origin, global_scale);
                let child_pose = parent_pose * joint_frame;
                let child_handle =
                    self.spawn_link(tree, &joint.child_link, child_pose, base_dir, global_scale)?;

                // 自由轴为局部 X：两侧坐标系都转到关节轴方向
                let axis_frame = Isometry3::from_parts(
                    Translation3::identity(),
                    rotation_from_x(joint.axis.unwrap_or(DVec3::X)),
                );
                let builder = match joint.kind {
                    JointKind::Fixed => Some(GenericJointBuilder::new(JointAxesMask::LOCKED_FIXED_AXES)),
                    JointKind::Revolute | JointKind::Continuous => {
                        Some(GenericJointBuilder::new(JointAxesMask::LOCKED_REVOLUTE_AXES))
                    }
                    JointKind::Prismatic => Some(GenericJointBuilder::new(JointAxesMask::LOCKED_PRISMATIC_AXES)),
                    JointKind::Floating | JointKind::Planar => {
                        log::warn!(
                            "[Rapier] 关节 '{}' 类型 {} 不创建约束",
                            joint.name,
                            joint.kind.as_str()
                        );
                        None
                    }
                };

                if let Some(mut builder) = builder {
                    builder = builder.local_frame1(joint_frame * axis_frame).local_frame2(axis_frame);
                    if let Some(limit) = joint.limit {
                        match joint.kind {
                            JointKind::Revolute => {
                                builder = builder.limits(JointAxis::AngX, [limit.lower as Real, limit.upper as Real])
                            }
                            // 平移限位是长度，与原点一起按整体缩放
                            JointKind::Prismatic => {
                                let range = [
                                    (limit.lower * global_scale) as Real,
                                    (limit.upper * global_scale) as Real,
                                ];
                                builder = builder.limits(JointAxis::LinX, range)
                            }
                            _ => {}
                        }
                    }
                    self.impulse_joints
                        .insert(parent_handle, child_handle, builder.build(), true);
                }

                placed.insert(joint.child_link.as_str(), (child_handle, child_pose));
                links.push(child_handle);
                stack.push(joint.child_link.as_str());
            }
        }

        let mass = tree
            .root_link()
            .and_then(|link| link.inertial.as_ref())
            .map(|inertial| inertial.mass)
            .unwrap_or(0.0);

        Ok(BodyEntry {
            root: root_handle,
            links,
            mass,
            rgba: None,
        })
    }

    fn spawn_link(
        &mut self,
        tree: &KinematicTree,
        link_name: &str,
        pose: Isometry3<Real>,
        base_dir: &Path,
        global_scale: f64,
    ) -> EngineResult<RigidBodyHandle> {
        let link = tree
            .link(link_name)
            .ok_or_else(|| EngineError::Backend(format!("unknown link '{}'", link_name)))?;
        let mass = link.inertial.as_ref().map(|i| i.mass).unwrap_or(0.0);

        // 先建全部碰撞形状，失败时不留下半个刚体
        let mut colliders = Vec::with_capacity(link.collisions.len());
        for collision in &link.collisions {
            let shape = link_geometry_shape(&collision.geometry, base_dir, global_scale)?;
            let offset = to_isometry_scaled(&collision.origin, global_scale);
            colliders.push(ColliderBuilder::new(shape).position(offset).density(0.0).build());
        }

        let builder = if mass > 0.0 {
            RigidBodyBuilder::dynamic().additional_mass(mass as Real)
        } else {
            RigidBodyBuilder::fixed()
        };
        let handle = self.rigid_bodies.insert(builder.position(pose).build());
        for collider in colliders {
            self.colliders
                .insert_with_parent(collider, handle, &mut self.rigid_bodies);
        }
        Ok(handle)
    }
}

impl PhysicsEngine for RapierEngine {
    fn create_collision_shape(&mut self, shape: &ShapeDesc) -> EngineResult<ShapeHandle> {
        let shared = build_shape(shape)?;
        let handle = ShapeHandle(self.collision_shapes.len() as u32);
        self.collision_shapes.push(shared);
        Ok(handle)
    }

    fn create_visual_shape(&mut self, _shape: &ShapeDesc, visual: &VisualDesc) -> EngineResult<ShapeHandle> {
        // 无渲染：只保留颜色
        let handle = ShapeHandle(self.visual_shapes.len() as u32);
        self.visual_shapes.push(*visual);
        Ok(handle)
    }

    fn create_body(&mut self, desc: &BodyDesc) -> EngineResult<BodyHandle> {
        let shape = match desc.collision {
            Some(h) => Some(
                self.collision_shapes
                    .get(h.0 as usize)
                    .cloned()
                    .ok_or(EngineError::shape(h))?,
            ),
            None => None,
        };
        let rgba = match desc.visual {
            Some(h) => Some(self.visual_shapes.get(h.0 as usize).ok_or(EngineError::shape(h))?.rgba),
            None => None,
        };

        let mass = desc.mass.max(0.0) as Real;
        let builder = if mass > 0.0 {
            RigidBodyBuilder::dynamic()
        } else {
            RigidBodyBuilder::fixed()
        };
        let builder = builder.position(to_isometry(desc.position, desc.orientation));
        let root = match shape {
            Some(shape) => {
                let root = self.rigid_bodies.insert(builder.build());
                let collider = ColliderBuilder::new(shape).mass(mass).build();
                self.colliders
                    .insert_with_parent(collider, root, &mut self.rigid_bodies);
                root
            }
            None => self.rigid_bodies.insert(builder.additional_mass(mass).build()),
        };

        Ok(self.register(BodyEntry {
            root,
            links: Vec::new(),
            mass: desc.mass,
            rgba,
        }))
    }

    fn load_tree_description(&mut self, path: &Path, global_scale: f64, flags: LoadFlags) -> EngineResult<BodyHandle> {
        let tree = KinematicTree::from_file(path).map_err(|e| EngineError::Backend(e.to_string()))?;
        tree.validate().map_err(|e| EngineError::Backend(e.to_string()))?;
        if flags.contains(LoadFlags::USE_SELF_COLLISION) {
            log::debug!("[Rapier] 忽略自碰撞标志: {}", path.display());
        }

        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let entry = self.instantiate_tree(&tree, &base_dir, global_scale)?;
        log::info!(
            "[Rapier] 运动学树 '{}' 加载完成: {} 连杆, {} 关节",
            tree.name,
            entry.links.len() + 1,
            tree.joints.len()
        );
        Ok(self.register(entry))
    }

    fn load_deformable(&mut self, _path: &Path, _params: &DeformableParams) -> EngineResult<BodyHandle> {
        Err(EngineError::Unsupported("deformable bodies"))
    }

    fn create_anchor(
        &mut self,
        _body: BodyHandle,
        _node_index: i32,
        _target: AnchorTarget,
        _local_position: DVec3,
    ) -> EngineResult<()> {
        Err(EngineError::Unsupported("soft body anchors"))
    }

    fn create_fixed_constraint(
        &mut self,
        body: BodyHandle,
        position: DVec3,
        orientation: DQuat,
    ) -> EngineResult<ConstraintHandle> {
        let root = self.entry(body)?.root;
        let anchor = self.rigid_bodies.insert(
            RigidBodyBuilder::kinematic_position_based()
                .position(to_isometry(position, orientation))
                .build(),
        );
        let joint = GenericJointBuilder::new(JointAxesMask::LOCKED_FIXED_AXES).build();
        let joint = self.impulse_joints.insert(anchor, root, joint, true);

        let handle = ConstraintHandle(self.constraints.len() as u32);
        self.constraints.push(ConstraintEntry { anchor, joint });
        Ok(handle)
    }

    fn update_constraint(
        &mut self,
        constraint: ConstraintHandle,
        position: DVec3,
        orientation: DQuat,
    ) -> EngineResult<()> {
        let entry = self
            .constraints
            .get(constraint.0 as usize)
            .ok_or(EngineError::constraint(constraint))?;
        if self.impulse_joints.get(entry.joint).is_none() {
            return Err(EngineError::constraint(constraint));
        }
        let anchor = self
            .rigid_bodies
            .get_mut(entry.anchor)
            .ok_or(EngineError::constraint(constraint))?;
        anchor.set_next_kinematic_position(to_isometry(position, orientation));
        Ok(())
    }

    fn get_pose(&self, body: BodyHandle) -> EngineResult<Pose> {
        Ok(from_isometry(self.root_body(body)?.position()))
    }

    fn set_pose(&mut self, body: BodyHandle, position: DVec3, orientation: DQuat) -> EngineResult<()> {
        let root = self.entry(body)?.root;
        let rb = self.rigid_bodies.get_mut(root).ok_or(EngineError::body(body))?;
        rb.set_position(to_isometry(position, orientation), true);
        Ok(())
    }

    fn get_mass(&self, body: BodyHandle) -> EngineResult<f64> {
        Ok(self.entry(body)?.mass)
    }

    fn change_visual_color(&mut self, body: BodyHandle, rgba: [f32; 4]) -> EngineResult<()> {
        let entry = self.bodies.get_mut(body.0 as usize).ok_or(EngineError::body(body))?;
        entry.rgba = Some(rgba);
        Ok(())
    }
}

// ============================================================================
// 形状与坐标转换
// ============================================================================

fn build_shape(desc: &ShapeDesc) -> EngineResult<SharedShape> {
    let shape = match desc {
        ShapeDesc::Sphere { radius } => SharedShape::ball(*radius as Real),
        ShapeDesc::Box { half_extents } => SharedShape::cuboid(
            half_extents.x as Real,
            half_extents.y as Real,
            half_extents.z as Real,
        ),
        ShapeDesc::Cylinder { radius, length } => {
            SharedShape::cylinder((*length * 0.5) as Real, *radius as Real)
        }
        ShapeDesc::Capsule { radius, length } => {
            SharedShape::capsule_y((*length * 0.5) as Real, *radius as Real)
        }
        ShapeDesc::Mesh { path, scale, flags } => mesh_shape(path, *scale, *flags)?,
    };
    Ok(shape)
}

/// OBJ 网格：默认取凸包，强制凹形时做凸分解
fn mesh_shape(path: &Path, scale: DVec3, flags: GeomFlags) -> EngineResult<SharedShape> {
    let (vertices, indices) = load_obj(path, scale)?;
    if flags.contains(GeomFlags::FORCE_CONCAVE_TRIMESH) {
        if indices.is_empty() {
            return Err(EngineError::mesh_load(path, "concave mesh has no faces"));
        }
        return Ok(SharedShape::convex_decomposition(&vertices, &indices));
    }
    SharedShape::convex_hull(&vertices).ok_or_else(|| EngineError::mesh_load(path, "degenerate convex hull"))
}

fn load_obj(path: &Path, scale: DVec3) -> EngineResult<(Vec<Point3<Real>>, Vec<[u32; 3]>)> {
    let (models, _materials) =
        tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|e| EngineError::mesh_load(path, e))?;

    let s = Vector3::new(scale.x as Real, scale.y as Real, scale.z as Real);
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for model in &models {
        let base = vertices.len() as u32;
        vertices.extend(
            model
                .mesh
                .positions
                .chunks_exact(3)
                .map(|p| Point3::new(p[0] * s.x, p[1] * s.y, p[2] * s.z)),
        );
        indices.extend(
            model
                .mesh
                .indices
                .chunks_exact(3)
                .map(|t| [base + t[0], base + t[1], base + t[2]]),
        );
    }

    if vertices.is_empty() {
        return Err(EngineError::mesh_load(path, "no vertices"));
    }
    log::debug!(
        "[Rapier] 网格 {}: {} 顶点, {} 三角形",
        path.display(),
        vertices.len(),
        indices.len()
    );
    Ok((vertices, indices))
}

fn link_geometry_shape(geometry: &Geometry, base_dir: &Path, global_scale: f64) -> EngineResult<SharedShape> {
    let desc = match geometry {
        Geometry::Mesh(mesh) => {
            let path: PathBuf = if mesh.file_path.is_absolute() {
                mesh.file_path.clone()
            } else {
                base_dir.join(&mesh.file_path)
            };
            ShapeDesc::Mesh {
                path,
                scale: mesh.effective_scale() * global_scale,
                flags: GeomFlags::empty(),
            }
        }
        Geometry::Box { size } => ShapeDesc::Box {
            half_extents: *size * 0.5 * global_scale,
        },
        Geometry::Cylinder { radius, length } => ShapeDesc::Cylinder {
            radius: radius * global_scale,
            length: length * global_scale,
        },
        Geometry::Sphere { radius } => ShapeDesc::Sphere {
            radius: radius * global_scale,
        },
    };
    build_shape(&desc)
}

fn to_isometry(position: DVec3, orientation: DQuat) -> Isometry3<Real> {
    let q = orientation.normalize();
    Isometry3::from_parts(
        Translation3::new(position.x as Real, position.y as Real, position.z as Real),
        UnitQuaternion::new_normalize(Quaternion::new(q.w as Real, q.x as Real, q.y as Real, q.z as Real)),
    )
}

fn to_isometry_scaled(origin: &Origin, global_scale: f64) -> Isometry3<Real> {
    to_isometry(origin.xyz * global_scale, origin.rotation())
}

fn from_isometry(iso: &Isometry3<Real>) -> Pose {
    let t = iso.translation.vector;
    let q = iso.rotation.into_inner().coords;
    Pose::new(
        DVec3::new(t.x as f64, t.y as f64, t.z as f64),
        DQuat::from_xyzw(q.x as f64, q.y as f64, q.z as f64, q.w as f64),
    )
}

/// 把局部 X 轴转到给定方向的旋转
fn rotation_from_x(axis: DVec3) -> UnitQuaternion<Real> {
    let target = Vector3::new(axis.x as Real, axis.y as Real, axis.z as Real);
    UnitQuaternion::rotation_between(&Vector3::x(), &target).unwrap_or_else(|| {
        // 反向平行：绕 Z 转半圈
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::PI)
    })
}
