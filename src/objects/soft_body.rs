//! 软体

use std::path::PathBuf;

use glam::DVec3;

use super::{ObjectState, SimObject};
use crate::engine::{AnchorTarget, BodyHandle, DeformableParams, PhysicsEngine};
use crate::Result;

#[derive(Clone, Debug)]
pub struct SoftBody {
    state: ObjectState,
    pub mesh: PathBuf,
    pub params: DeformableParams,
}

impl SoftBody {
    pub fn new(mesh: impl Into<PathBuf>, params: DeformableParams) -> Self {
        Self {
            state: ObjectState::default(),
            mesh: mesh.into(),
            params,
        }
    }

    /// 把网格节点钉到另一个物体或世界坐标（node_index 为 -1 时由引擎决定）
    pub fn add_anchor(
        &self,
        engine: &mut dyn PhysicsEngine,
        node_index: i32,
        target: AnchorTarget,
        local_position: DVec3,
    ) -> Result<()> {
        engine.create_anchor(self.body_handle()?, node_index, target, local_position)?;
        Ok(())
    }
}

impl SimObject for SoftBody {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
        Ok(engine.load_deformable(&self.mesh, &self.params)?)
    }
}
