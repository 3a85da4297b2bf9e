//! 已放置物体
//!
//! 每个物体只有两个状态：Unloaded -> Loaded（单向）。
//! 重复 load 直接返回已有句柄，不再调用引擎。
//! 位姿读写全部转发给引擎，物体自身只保存构造参数与句柄。

mod articulated;
mod marker;
mod mesh_body;
mod pedestrian;
mod primitive;
mod soft_body;

pub use articulated::{ArticulatedBody, TreeSource};
pub use marker::{MarkerShape, VisualMarker};
pub use mesh_body::{ScannedMeshBody, SimpleMeshBody};
pub use pedestrian::ConstrainedPedestrian;
pub use primitive::PrimitiveBox;
pub use soft_body::SoftBody;

use glam::{DQuat, DVec3};

use crate::engine::{BodyHandle, PhysicsEngine};
use crate::{Result, SimError};

/// 加载状态
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectState {
    body: Option<BodyHandle>,
}

impl ObjectState {
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.body.is_some()
    }

    #[inline]
    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }
}

/// 物体公共能力
///
/// 实现者只需提供 `spawn`（向引擎发出创建调用），其余方法由默认实现完成。
pub trait SimObject {
    fn state(&self) -> &ObjectState;

    fn state_mut(&mut self) -> &mut ObjectState;

    /// 变体相关的创建逻辑，只会被 `load` 调用一次
    fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle>;

    /// 加载到引擎（幂等）
    fn load(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
        if let Some(handle) = self.state().body {
            return Ok(handle);
        }
        // spawn 失败时保持 Unloaded
        let handle = self.spawn(engine)?;
        self.state_mut().body = Some(handle);
        log::debug!("[Object] 加载完成: {}", handle);
        Ok(handle)
    }

    fn is_loaded(&self) -> bool {
        self.state().is_loaded()
    }

    fn body_handle(&self) -> Result<BodyHandle> {
        self.state().body.ok_or(SimError::NotLoaded)
    }

    fn get_position(&self, engine: &dyn PhysicsEngine) -> Result<DVec3> {
        Ok(engine.get_pose(self.body_handle()?)?.position)
    }

    fn get_orientation(&self, engine: &dyn PhysicsEngine) -> Result<DQuat> {
        Ok(engine.get_pose(self.body_handle()?)?.orientation)
    }

    /// 只改位置，保留当前朝向
    fn set_position(&self, engine: &mut dyn PhysicsEngine, position: DVec3) -> Result<()> {
        let body = self.body_handle()?;
        let current = engine.get_pose(body)?;
        engine.set_pose(body, position, current.orientation)?;
        Ok(())
    }

    /// 只改朝向，保留当前位置
    fn set_orientation(&self, engine: &mut dyn PhysicsEngine, orientation: DQuat) -> Result<()> {
        let body = self.body_handle()?;
        let current = engine.get_pose(body)?;
        engine.set_pose(body, current.position, orientation)?;
        Ok(())
    }

    fn set_position_orientation(
        &self,
        engine: &mut dyn PhysicsEngine,
        position: DVec3,
        orientation: DQuat,
    ) -> Result<()> {
        engine.set_pose(self.body_handle()?, position, orientation)?;
        Ok(())
    }
}

/// 所有物体变体
#[derive(Clone, Debug)]
pub enum PlacedObject {
    SimpleMesh(SimpleMeshBody),
    ScannedMesh(ScannedMeshBody),
    Articulated(ArticulatedBody),
    Soft(SoftBody),
    Marker(VisualMarker),
    Box(PrimitiveBox),
    Pedestrian(ConstrainedPedestrian),
}

macro_rules! dispatch {
    ($self:ident, $obj:ident => $body:expr) => {
        match $self {
            PlacedObject::SimpleMesh($obj) => $body,
            PlacedObject::ScannedMesh($obj) => $body,
            PlacedObject::Articulated($obj) => $body,
            PlacedObject::Soft($obj) => $body,
            PlacedObject::Marker($obj) => $body,
            PlacedObject::Box($obj) => $body,
            PlacedObject::Pedestrian($obj) => $body,
        }
    };
}

impl SimObject for PlacedObject {
    fn state(&self) -> &ObjectState {
        dispatch!(self, obj => obj.state())
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        dispatch!(self, obj => obj.state_mut())
    }

    fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
        dispatch!(self, obj => obj.spawn(engine))
    }
}

impl PlacedObject {
    /// 变体名称（日志用）
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SimpleMesh(_) => "simple_mesh",
            Self::ScannedMesh(_) => "scanned_mesh",
            Self::Articulated(_) => "articulated",
            Self::Soft(_) => "soft",
            Self::Marker(_) => "marker",
            Self::Box(_) => "box",
            Self::Pedestrian(_) => "pedestrian",
        }
    }

    pub fn as_articulated(&self) -> Option<&ArticulatedBody> {
        match self {
            Self::Articulated(body) => Some(body),
            _ => None,
        }
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for PlacedObject {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_variant!(
    SimpleMesh(SimpleMeshBody),
    ScannedMesh(ScannedMeshBody),
    Articulated(ArticulatedBody),
    Soft(SoftBody),
    Marker(VisualMarker),
    Box(PrimitiveBox),
    Pedestrian(ConstrainedPedestrian),
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, HeadlessEngine};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_load_twice_returns_same_handle() {
        let mut engine = HeadlessEngine::new();
        let mut object: PlacedObject = VisualMarker::default().into();

        let first = object.load(&mut engine).unwrap();
        let calls = engine.creation_calls();
        let second = object.load(&mut engine).unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.creation_calls(), calls);
        assert_eq!(engine.body_count(), 1);
    }

    #[test]
    fn test_pose_before_load_fails() {
        let mut engine = HeadlessEngine::new();
        let object: PlacedObject = PrimitiveBox::default().into();

        assert!(matches!(object.get_position(&engine), Err(SimError::NotLoaded)));
        assert!(matches!(object.get_orientation(&engine), Err(SimError::NotLoaded)));
        assert!(matches!(
            object.set_position(&mut engine, DVec3::ONE),
            Err(SimError::NotLoaded)
        ));
        assert!(matches!(
            object.set_orientation(&mut engine, DQuat::IDENTITY),
            Err(SimError::NotLoaded)
        ));
        assert!(matches!(
            object.set_position_orientation(&mut engine, DVec3::ONE, DQuat::IDENTITY),
            Err(SimError::NotLoaded)
        ));
        assert!(engine.calls.is_empty());
    }

    #[test]
    fn test_partial_pose_updates() {
        let mut engine = HeadlessEngine::new();
        let mut object: PlacedObject = PrimitiveBox::default().into();
        object.load(&mut engine).unwrap();

        let turned = DQuat::from_rotation_z(FRAC_PI_2);
        object.set_orientation(&mut engine, turned).unwrap();
        object.set_position(&mut engine, DVec3::new(4.0, 5.0, 6.0)).unwrap();

        assert_eq!(object.get_position(&engine).unwrap(), DVec3::new(4.0, 5.0, 6.0));
        assert_eq!(object.get_orientation(&engine).unwrap(), turned);
    }

    /// 第一次 spawn 失败，之后成功
    struct Flaky {
        state: ObjectState,
        fail: bool,
    }

    impl SimObject for Flaky {
        fn state(&self) -> &ObjectState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut ObjectState {
            &mut self.state
        }

        fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
            if self.fail {
                self.fail = false;
                return Err(EngineError::Backend("out of memory".into()).into());
            }
            Ok(engine.create_body(&Default::default())?)
        }
    }

    #[test]
    fn test_failed_spawn_stays_unloaded() {
        let mut engine = HeadlessEngine::new();
        let mut object = Flaky {
            state: ObjectState::default(),
            fail: true,
        };
        assert!(matches!(object.load(&mut engine), Err(SimError::EngineCall(_))));
        assert!(!object.is_loaded());
        assert!(object.load(&mut engine).is_ok());
        assert!(object.is_loaded());
    }
}
