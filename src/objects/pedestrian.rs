//! 约束固定的行人
//!
//! 刚体通过固定约束挂在目标位姿上。移动时改约束目标，
//! 由约束求解把刚体带过去，而不是直接写刚体位姿。

use std::path::PathBuf;

use glam::{DQuat, DVec3};

use super::{ObjectState, SimObject};
use crate::assets::AssetResolver;
use crate::config::get_config;
use crate::engine::{BodyDesc, BodyHandle, ConstraintHandle, PhysicsEngine, ShapeDesc, VisualDesc};
use crate::{Result, SimError};

/// 行人网格朝向（面向 +X）
pub fn pedestrian_facing() -> DQuat {
    DQuat::from_xyzw(-0.5, -0.5, -0.5, 0.5)
}

#[derive(Clone, Debug)]
pub struct ConstrainedPedestrian {
    state: ObjectState,
    pub visual_mesh: PathBuf,
    pub collision_mesh: PathBuf,
    pub position: DVec3,
    pub mass: f64,
    constraint: Option<ConstraintHandle>,
}

impl ConstrainedPedestrian {
    pub fn new(visual_mesh: impl Into<PathBuf>, collision_mesh: impl Into<PathBuf>, position: DVec3) -> Self {
        Self {
            state: ObjectState::default(),
            visual_mesh: visual_mesh.into(),
            collision_mesh: collision_mesh.into(),
            position,
            mass: get_config().pedestrian_mass,
            constraint: None,
        }
    }

    /// 按姿态名（standing / walking ...）取资源
    pub fn with_style<R: AssetResolver + ?Sized>(resolver: &R, style: &str, position: DVec3) -> Self {
        let (visual, collision) = resolver.pedestrian_meshes(style);
        Self::new(visual, collision, position)
    }

    pub fn constraint(&self) -> Option<ConstraintHandle> {
        self.constraint
    }

    /// 移动约束目标
    pub fn reset_position_orientation(
        &self,
        engine: &mut dyn PhysicsEngine,
        position: DVec3,
        orientation: DQuat,
    ) -> Result<()> {
        let constraint = self.constraint.ok_or(SimError::NotLoaded)?;
        engine.update_constraint(constraint, position, orientation)?;
        Ok(())
    }
}

impl SimObject for ConstrainedPedestrian {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
        let collision = engine.create_collision_shape(&ShapeDesc::mesh(&self.collision_mesh))?;
        let visual = engine.create_visual_shape(&ShapeDesc::mesh(&self.visual_mesh), &VisualDesc::default())?;
        let body = engine.create_body(&BodyDesc {
            mass: self.mass,
            collision: Some(collision),
            visual: Some(visual),
            ..Default::default()
        })?;

        let facing = pedestrian_facing();
        engine.set_pose(body, self.position, facing)?;
        self.constraint = Some(engine.create_fixed_constraint(body, self.position, facing)?);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, HeadlessEngine};

    #[test]
    fn test_constraint_created_on_load() {
        let mut engine = HeadlessEngine::new();
        let mut person = ConstrainedPedestrian::new("p.obj", "p_vhacd.obj", DVec3::new(1.0, 0.0, 0.0));
        assert!(matches!(
            person.reset_position_orientation(&mut engine, DVec3::ZERO, DQuat::IDENTITY),
            Err(SimError::NotLoaded)
        ));

        let body = person.load(&mut engine).unwrap();
        let constraint = person.constraint().unwrap();
        assert_eq!(engine.get_mass(body).unwrap(), 60.0);
        assert_eq!(engine.get_pose(body).unwrap().orientation, pedestrian_facing());
        assert_eq!(engine.constraint_target(constraint).unwrap().position, DVec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_reset_moves_constraint_not_body() {
        let mut engine = HeadlessEngine::new();
        let mut person = ConstrainedPedestrian::new("p.obj", "p_vhacd.obj", DVec3::ZERO);
        let body = person.load(&mut engine).unwrap();
        let set_poses = engine
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::SetPose { .. }))
            .count();

        person
            .reset_position_orientation(&mut engine, DVec3::new(3.0, 4.0, 0.0), DQuat::IDENTITY)
            .unwrap();

        let constraint = person.constraint().unwrap();
        assert_eq!(engine.constraint_target(constraint).unwrap().position, DVec3::new(3.0, 4.0, 0.0));
        assert_eq!(engine.get_pose(body).unwrap().position, DVec3::ZERO);
        let after = engine
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::SetPose { .. }))
            .count();
        assert_eq!(set_poses, after);
    }
}
