//! 轴对齐盒子

use glam::{DQuat, DVec3};

use super::{ObjectState, SimObject};
use crate::config::get_config;
use crate::engine::{BodyDesc, BodyHandle, PhysicsEngine, ShapeDesc, VisualDesc};
use crate::Result;

#[derive(Clone, Debug)]
pub struct PrimitiveBox {
    state: ObjectState,
    pub position: DVec3,
    pub half_extents: DVec3,
    /// 只显示，不参与碰撞（静态）
    pub visual_only: bool,
    pub mass: f64,
    pub rgba: [f32; 4],
}

impl Default for PrimitiveBox {
    fn default() -> Self {
        Self::new(DVec3::new(1.0, 2.0, 3.0), DVec3::new(1.0, 2.0, 3.0))
    }
}

impl PrimitiveBox {
    pub fn new(position: DVec3, half_extents: DVec3) -> Self {
        Self {
            state: ObjectState::default(),
            position,
            half_extents,
            visual_only: false,
            mass: get_config().box_mass,
            rgba: [1.0, 1.0, 1.0, 1.0],
        }
    }

    pub fn visual_only(mut self) -> Self {
        self.visual_only = true;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_color(mut self, rgba: [f32; 4]) -> Self {
        self.rgba = rgba;
        self
    }
}

impl SimObject for PrimitiveBox {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
        let shape = ShapeDesc::Box {
            half_extents: self.half_extents,
        };
        let visual = engine.create_visual_shape(
            &shape,
            &VisualDesc {
                rgba: self.rgba,
                ..Default::default()
            },
        )?;

        let desc = if self.visual_only {
            BodyDesc {
                visual: Some(visual),
                ..Default::default()
            }
        } else {
            let collision = engine.create_collision_shape(&shape)?;
            BodyDesc {
                mass: self.mass,
                collision: Some(collision),
                visual: Some(visual),
                ..Default::default()
            }
        };

        let body = engine.create_body(&desc)?;
        engine.set_pose(body, self.position, DQuat::IDENTITY)?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, HeadlessEngine, ShapeKind};

    #[test]
    fn test_box_is_placed_after_creation() {
        let mut engine = HeadlessEngine::new();
        let mut cube = PrimitiveBox::new(DVec3::new(0.0, 0.0, 2.0), DVec3::splat(0.5)).with_mass(5.0);
        let body = cube.load(&mut engine).unwrap();

        assert_eq!(engine.get_pose(body).unwrap().position, DVec3::new(0.0, 0.0, 2.0));
        assert_eq!(engine.get_mass(body).unwrap(), 5.0);
        assert_eq!(engine.calls.last(), Some(&EngineCall::SetPose { body }));
    }

    #[test]
    fn test_visual_only_box() {
        let mut engine = HeadlessEngine::new();
        let mut ghost = PrimitiveBox::default().visual_only();
        let body = ghost.load(&mut engine).unwrap();

        assert!(!engine
            .calls
            .contains(&EngineCall::CreateCollisionShape(ShapeKind::Box)));
        assert_eq!(engine.get_mass(body).unwrap(), 0.0);
    }
}
