//! 单网格刚体

use std::path::PathBuf;

use glam::{DQuat, DVec3};

use super::{ObjectState, SimObject};
use crate::assets::AssetResolver;
use crate::config::get_config;
use crate::engine::{BodyDesc, BodyHandle, GeomFlags, PhysicsEngine, ShapeDesc, VisualDesc};
use crate::math::{quat_from_rpy, Pose};
use crate::Result;

/// YCB 物体出生位置
pub const YCB_SPAWN_POSITION: DVec3 = DVec3::new(0.2, 0.2, 1.5);

/// 可视 + 碰撞网格各一份，固定缩放与质量
#[derive(Clone, Debug)]
pub struct SimpleMeshBody {
    state: ObjectState,
    pub visual_mesh: PathBuf,
    pub collision_mesh: PathBuf,
    pub scale: f64,
    pub mass: f64,
    pub position: DVec3,
    /// 碰撞网格的创建标志
    pub collision_flags: GeomFlags,
}

impl SimpleMeshBody {
    pub fn new(visual_mesh: impl Into<PathBuf>, collision_mesh: impl Into<PathBuf>, scale: f64, mass: f64) -> Self {
        Self {
            state: ObjectState::default(),
            visual_mesh: visual_mesh.into(),
            collision_mesh: collision_mesh.into(),
            scale,
            mass,
            position: DVec3::ZERO,
            collision_flags: GeomFlags::empty(),
        }
    }

    /// 静态场景网格：质量为 0，碰撞按凹网格处理
    pub fn static_concave(mut self) -> Self {
        self.mass = 0.0;
        self.collision_flags |= GeomFlags::FORCE_CONCAVE_TRIMESH;
        self
    }

    /// YCB 数据集物体
    pub fn ycb<R: AssetResolver + ?Sized>(resolver: &R, name: &str, scale: f64) -> Self {
        let (visual, collision) = resolver.ycb_meshes(name);
        let mut body = Self::new(visual, collision, scale, get_config().ycb_mass);
        body.position = YCB_SPAWN_POSITION;
        body
    }
}

impl SimObject for SimpleMeshBody {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
        let collision = engine.create_collision_shape(&ShapeDesc::Mesh {
            path: self.collision_mesh.clone(),
            scale: DVec3::splat(self.scale),
            flags: self.collision_flags,
        })?;
        let visual = engine.create_visual_shape(
            &ShapeDesc::scaled_mesh(&self.visual_mesh, self.scale),
            &VisualDesc::default(),
        )?;
        let body = engine.create_body(&BodyDesc {
            mass: self.mass,
            collision: Some(collision),
            visual: Some(visual),
            position: self.position,
            orientation: DQuat::IDENTITY,
        })?;
        Ok(body)
    }
}

/// 扫描网格的模型朝向修正（绕 X 轴 90°：模型 Y 向上 -> 世界 Z 向上）
pub fn scanned_mesh_correction() -> Pose {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    Pose::new(DVec3::ZERO, DQuat::from_xyzw(h, 0.0, 0.0, h))
}

/// 只有碰撞网格的扫描物体（ShapeNet）
#[derive(Clone, Debug)]
pub struct ScannedMeshBody {
    state: ObjectState,
    pub mesh: PathBuf,
    pub scale: f64,
    pub mass: f64,
    /// 已组合朝向修正后的位姿
    pub pose: Pose,
}

impl ScannedMeshBody {
    /// `euler` 为 (roll, pitch, yaw)，构造时与朝向修正组合一次
    pub fn shapenet(mesh: impl Into<PathBuf>, scale: f64, position: DVec3, euler: DVec3) -> Self {
        let placement = Pose::new(position, quat_from_rpy(euler));
        Self {
            state: ObjectState::default(),
            mesh: mesh.into(),
            scale,
            mass: get_config().scanned_mass,
            pose: placement.compose(&scanned_mesh_correction()),
        }
    }
}

impl SimObject for ScannedMeshBody {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
        let collision = engine.create_collision_shape(&ShapeDesc::scaled_mesh(&self.mesh, self.scale))?;
        let body = engine.create_body(&BodyDesc {
            mass: self.mass,
            collision: Some(collision),
            visual: None,
            position: self.pose.position,
            orientation: self.pose.orientation,
        })?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLibrary;
    use crate::engine::{EngineCall, HeadlessEngine, ShapeKind};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_ycb_spawn() {
        let library = AssetLibrary::new("/assets", "/dataset");
        let mut body = SimpleMeshBody::ycb(&library, "003_cracker_box", 1.0);
        assert!(body.collision_mesh.ends_with("textured_simple_vhacd.obj"));

        let mut engine = HeadlessEngine::new();
        let handle = body.load(&mut engine).unwrap();
        assert_eq!(
            engine.calls,
            vec![
                EngineCall::CreateCollisionShape(ShapeKind::Mesh),
                EngineCall::CreateVisualShape(ShapeKind::Mesh),
                EngineCall::CreateBody { mass: 0.1 },
            ]
        );
        assert_eq!(engine.get_pose(handle).unwrap().position, YCB_SPAWN_POSITION);
    }

    #[test]
    fn test_shapenet_pose_correction() {
        // 无额外旋转时，位姿就是朝向修正本身
        let body = ScannedMeshBody::shapenet("m.obj", 1.0, DVec3::new(1.0, 2.0, 3.0), DVec3::ZERO);
        assert_eq!(body.pose.position, DVec3::new(1.0, 2.0, 3.0));
        let up = body.pose.orientation * DVec3::Y;
        assert!((up - DVec3::Z).length() < 1e-12);

        // 先修正再偏航
        let body = ScannedMeshBody::shapenet("m.obj", 1.0, DVec3::ZERO, DVec3::new(0.0, 0.0, FRAC_PI_2));
        let up = body.pose.orientation * DVec3::Y;
        assert!((up - DVec3::Z).length() < 1e-12);
        let forward = body.pose.orientation * DVec3::X;
        assert!((forward - DVec3::Y).length() < 1e-12);
    }

    #[test]
    fn test_shapenet_has_no_visual() {
        let mut body = ScannedMeshBody::shapenet("m.obj", 0.5, DVec3::ZERO, DVec3::ZERO);
        let mut engine = HeadlessEngine::new();
        let handle = body.load(&mut engine).unwrap();
        assert_eq!(engine.creation_calls(), 2);
        assert_eq!(engine.get_mass(handle).unwrap(), 3.0);
    }
}
