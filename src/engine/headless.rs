//! 无动力学的记录型引擎
//!
//! 只维护句柄、位姿、质量与颜色，并按顺序记录每一次调用。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{DQuat, DVec3};

use super::{
    AnchorTarget, BodyDesc, BodyHandle, ConstraintHandle, DeformableParams, EngineError, EngineResult,
    LoadFlags, PhysicsEngine, ShapeDesc, ShapeHandle, ShapeKind, VisualDesc,
};
use crate::kinematics::KinematicTree;
use crate::math::Pose;

/// 记录的一次引擎调用
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    CreateCollisionShape(ShapeKind),
    CreateVisualShape(ShapeKind),
    CreateBody { mass: f64 },
    LoadTree { path: PathBuf, global_scale: f64, flags: LoadFlags },
    LoadDeformable { path: PathBuf, params: DeformableParams },
    CreateAnchor { body: BodyHandle, node_index: i32, target: AnchorTarget },
    CreateFixedConstraint { body: BodyHandle },
    UpdateConstraint { constraint: ConstraintHandle },
    SetPose { body: BodyHandle },
    ChangeVisualColor { body: BodyHandle, rgba: [f32; 4] },
}

impl EngineCall {
    /// 是否为创建类调用
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            Self::CreateCollisionShape(_)
                | Self::CreateVisualShape(_)
                | Self::CreateBody { .. }
                | Self::LoadTree { .. }
                | Self::LoadDeformable { .. }
                | Self::CreateFixedConstraint { .. }
        )
    }
}

#[derive(Clone, Debug)]
struct BodyRecord {
    pose: Pose,
    mass: f64,
    rgba: Option<[f32; 4]>,
}

/// 记录型引擎
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    /// 调用日志（按顺序）
    pub calls: Vec<EngineCall>,
    shapes: Vec<ShapeKind>,
    bodies: Vec<BodyRecord>,
    /// 约束：(物体, 目标位姿)
    constraints: Vec<(BodyHandle, Pose)>,
    anchors: HashMap<BodyHandle, Vec<(i32, AnchorTarget, DVec3)>>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建类调用次数
    pub fn creation_calls(&self) -> usize {
        self.calls.iter().filter(|c| c.is_creation()).count()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// 约束当前的目标位姿
    pub fn constraint_target(&self, constraint: ConstraintHandle) -> Option<Pose> {
        self.constraints.get(constraint.0 as usize).map(|(_, pose)| *pose)
    }

    pub fn visual_color(&self, body: BodyHandle) -> Option<[f32; 4]> {
        self.bodies.get(body.0 as usize).and_then(|b| b.rgba)
    }

    pub fn anchors(&self, body: BodyHandle) -> &[(i32, AnchorTarget, DVec3)] {
        self.anchors.get(&body).map(Vec::as_slice).unwrap_or(&[])
    }

    fn push_body(&mut self, pose: Pose, mass: f64, rgba: Option<[f32; 4]>) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(BodyRecord { pose, mass, rgba });
        handle
    }

    fn push_shape(&mut self, kind: ShapeKind) -> ShapeHandle {
        let handle = ShapeHandle(self.shapes.len() as u32);
        self.shapes.push(kind);
        handle
    }

    fn body(&self, handle: BodyHandle) -> EngineResult<&BodyRecord> {
        self.bodies.get(handle.0 as usize).ok_or(EngineError::body(handle))
    }

    fn body_mut(&mut self, handle: BodyHandle) -> EngineResult<&mut BodyRecord> {
        self.bodies.get_mut(handle.0 as usize).ok_or(EngineError::body(handle))
    }

    fn check_shape(&self, handle: Option<ShapeHandle>) -> EngineResult<()> {
        match handle {
            Some(h) if h.0 as usize >= self.shapes.len() => Err(EngineError::shape(h)),
            _ => Ok(()),
        }
    }
}

impl PhysicsEngine for HeadlessEngine {
    fn create_collision_shape(&mut self, shape: &ShapeDesc) -> EngineResult<ShapeHandle> {
        self.calls.push(EngineCall::CreateCollisionShape(shape.kind()));
        Ok(self.push_shape(shape.kind()))
    }

    fn create_visual_shape(&mut self, shape: &ShapeDesc, _visual: &VisualDesc) -> EngineResult<ShapeHandle> {
        self.calls.push(EngineCall::CreateVisualShape(shape.kind()));
        Ok(self.push_shape(shape.kind()))
    }

    fn create_body(&mut self, desc: &BodyDesc) -> EngineResult<BodyHandle> {
        self.check_shape(desc.collision)?;
        self.check_shape(desc.visual)?;
        self.calls.push(EngineCall::CreateBody { mass: desc.mass });
        Ok(self.push_body(Pose::new(desc.position, desc.orientation), desc.mass, None))
    }

    fn load_tree_description(&mut self, path: &Path, global_scale: f64, flags: LoadFlags) -> EngineResult<BodyHandle> {
        let tree = KinematicTree::from_file(path).map_err(|e| EngineError::Backend(e.to_string()))?;
        self.calls.push(EngineCall::LoadTree {
            path: path.to_path_buf(),
            global_scale,
            flags,
        });
        let mass = tree
            .root_link()
            .and_then(|link| link.inertial.as_ref())
            .map(|inertial| inertial.mass)
            .unwrap_or(0.0);
        Ok(self.push_body(Pose::default(), mass, None))
    }

    fn load_deformable(&mut self, path: &Path, params: &DeformableParams) -> EngineResult<BodyHandle> {
        self.calls.push(EngineCall::LoadDeformable {
            path: path.to_path_buf(),
            params: *params,
        });
        let pose = Pose::new(params.position, params.orientation);
        Ok(self.push_body(pose, params.mass.max(0.0), None))
    }

    fn create_anchor(
        &mut self,
        body: BodyHandle,
        node_index: i32,
        target: AnchorTarget,
        local_position: DVec3,
    ) -> EngineResult<()> {
        self.body(body)?;
        if let AnchorTarget::Body { body: other, .. } = target {
            self.body(other)?;
        }
        self.calls.push(EngineCall::CreateAnchor { body, node_index, target });
        self.anchors
            .entry(body)
            .or_default()
            .push((node_index, target, local_position));
        Ok(())
    }

    fn create_fixed_constraint(
        &mut self,
        body: BodyHandle,
        position: DVec3,
        orientation: DQuat,
    ) -> EngineResult<ConstraintHandle> {
        self.body(body)?;
        self.calls.push(EngineCall::CreateFixedConstraint { body });
        let handle = ConstraintHandle(self.constraints.len() as u32);
        self.constraints.push((body, Pose::new(position, orientation)));
        Ok(handle)
    }

    fn update_constraint(
        &mut self,
        constraint: ConstraintHandle,
        position: DVec3,
        orientation: DQuat,
    ) -> EngineResult<()> {
        let (_, target) = self
            .constraints
            .get_mut(constraint.0 as usize)
            .ok_or(EngineError::constraint(constraint))?;
        *target = Pose::new(position, orientation);
        self.calls.push(EngineCall::UpdateConstraint { constraint });
        Ok(())
    }

    fn get_pose(&self, body: BodyHandle) -> EngineResult<Pose> {
        Ok(self.body(body)?.pose)
    }

    fn set_pose(&mut self, body: BodyHandle, position: DVec3, orientation: DQuat) -> EngineResult<()> {
        self.body_mut(body)?.pose = Pose::new(position, orientation);
        self.calls.push(EngineCall::SetPose { body });
        Ok(())
    }

    fn get_mass(&self, body: BodyHandle) -> EngineResult<f64> {
        Ok(self.body(body)?.mass)
    }

    fn change_visual_color(&mut self, body: BodyHandle, rgba: [f32; 4]) -> EngineResult<()> {
        self.body_mut(body)?.rgba = Some(rgba);
        self.calls.push(EngineCall::ChangeVisualColor { body, rgba });
        Ok(())
    }
}
