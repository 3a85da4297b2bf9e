//! 可视标记（无碰撞）

use glam::{DQuat, DVec3};

use super::{ObjectState, SimObject};
use crate::engine::{BodyDesc, BodyHandle, PhysicsEngine, ShapeDesc, VisualDesc};
use crate::Result;

/// 标记形状
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerShape {
    Sphere { radius: f64 },
    Box { half_extents: DVec3 },
    Cylinder { radius: f64, length: f64 },
    Capsule { radius: f64, length: f64 },
}

impl MarkerShape {
    fn to_shape_desc(self) -> ShapeDesc {
        match self {
            Self::Sphere { radius } => ShapeDesc::Sphere { radius },
            Self::Box { half_extents } => ShapeDesc::Box { half_extents },
            Self::Cylinder { radius, length } => ShapeDesc::Cylinder { radius, length },
            Self::Capsule { radius, length } => ShapeDesc::Capsule { radius, length },
        }
    }
}

#[derive(Clone, Debug)]
pub struct VisualMarker {
    state: ObjectState,
    pub shape: MarkerShape,
    pub rgba: [f32; 4],
    /// 可视形状相对刚体原点的偏移
    pub initial_offset: DVec3,
}

impl Default for VisualMarker {
    fn default() -> Self {
        Self::new(MarkerShape::Sphere { radius: 1.0 }, [1.0, 0.0, 0.0, 0.5])
    }
}

impl VisualMarker {
    pub fn new(shape: MarkerShape, rgba: [f32; 4]) -> Self {
        Self {
            state: ObjectState::default(),
            shape,
            rgba,
            initial_offset: DVec3::ZERO,
        }
    }

    pub fn with_offset(mut self, offset: DVec3) -> Self {
        self.initial_offset = offset;
        self
    }

    /// 加载后改颜色
    pub fn set_color(&mut self, engine: &mut dyn PhysicsEngine, rgba: [f32; 4]) -> Result<()> {
        engine.change_visual_color(self.body_handle()?, rgba)?;
        self.rgba = rgba;
        Ok(())
    }
}

impl SimObject for VisualMarker {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
        let visual = engine.create_visual_shape(
            &self.shape.to_shape_desc(),
            &VisualDesc {
                rgba: self.rgba,
                frame_offset: self.initial_offset,
            },
        )?;
        let body = engine.create_body(&BodyDesc {
            mass: 0.0,
            collision: None,
            visual: Some(visual),
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
        })?;
        Ok(body)
    }
}
