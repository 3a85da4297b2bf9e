//! 仿真物体模型
//!
//! 把家具、行人、标记、盒子、扫描网格等物体放入物理仿真，并在实例化前
//! 按目标包围盒重新缩放 URDF 运动学树。
//!
//! 模块划分：
//! - math: 欧拉角旋转工具
//! - kinematics: 运动学树模型、URDF 读写、包围盒缩放
//! - engine: 物理引擎能力接口（Headless / Rapier 实现）
//! - assets: 资源路径解析与包围盒元数据
//! - objects: 已放置物体（各变体 + 统一状态机）
//! - factory: 从构造参数创建物体

pub mod assets;
pub mod config;
pub mod engine;
pub mod factory;
pub mod kinematics;
pub mod math;
pub mod objects;

pub use assets::{AssetLibrary, AssetResolver, ModelSelection, ResolvedModel};
pub use config::{get_config, reset_config, set_config, ObjectConfig};
pub use engine::{BodyHandle, ConstraintHandle, EngineError, PhysicsEngine, ShapeHandle};
pub use factory::{ObjectFactory, ObjectSpec};
pub use kinematics::{BoundingBoxRescaler, BranchPolicy, KinematicTree, RescaleReport, ScaleRequest};
pub use objects::{PlacedObject, SimObject};

use thiserror::Error;

/// 统一错误类型
#[derive(Debug, Error)]
pub enum SimError {
    /// 运动学树引用不一致，或原始包围盒存在零分量
    #[error("Malformed kinematic tree: {0}")]
    MalformedTree(String),

    /// 关节轴缩放后长度为零，无法归一化
    #[error("Degenerate motion axis on joint '{joint}'")]
    DegenerateAxis { joint: String },

    /// 物体尚未加载
    #[error("Object is not loaded")]
    NotLoaded,

    /// 类别/模型解析失败
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// 物理引擎调用失败（不做进一步解释）
    #[error("Physics engine call failed: {0}")]
    EngineCall(#[from] EngineError),

    #[error("URDF parse error: {0}")]
    UrdfParse(String),

    #[error("URDF write error: {0}")]
    UrdfWrite(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Bounding box metadata error: {0}")]
    BoundingBox(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
