//! 物体构造配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 物理引擎本身不放在全局里，只有这些构造参数是进程级的。

use std::path::PathBuf;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::kinematics::BranchPolicy;

/// 物体构造配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct ObjectConfig {
    // ========== 资源路径 ==========
    /// 通用资源根目录（ycb / rbo / person_meshes 等）
    pub assets_path: PathBuf,
    /// 交互物体数据集根目录（objects/ 与 scenes/）
    pub dataset_path: PathBuf,
    /// 重写后的 URDF 输出目录
    pub scratch_dir: PathBuf,

    // ========== 包围盒缩放 ==========
    /// 原始包围盒分量的最小允许值（绝对值）
    pub bbox_epsilon: f64,
    /// 多个子关节时的缩放传播策略
    pub branch_policy: BranchPolicy,

    // ========== 默认质量 ==========
    /// YCB 物体质量，默认 0.1
    pub ycb_mass: f64,
    /// ShapeNet 扫描物体质量，默认 3.0
    pub scanned_mass: f64,
    /// 行人质量，默认 60.0
    pub pedestrian_mass: f64,
    /// 盒子默认质量，默认 1000.0
    pub box_mass: f64,

    // ========== 软体 ==========
    /// 稀疏 SDF 体素大小，默认 0.1
    pub sparse_sdf_voxel_size: f64,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            assets_path: PathBuf::from("assets"),
            dataset_path: PathBuf::from("dataset"),
            scratch_dir: std::env::temp_dir().join("sim_objects"),

            // 小于此值视为零，除法会失真
            bbox_epsilon: 1e-9,
            branch_policy: BranchPolicy::FirstChild,

            ycb_mass: 0.1,
            scanned_mass: 3.0,
            pedestrian_mass: 60.0,
            box_mass: 1000.0,

            sparse_sdf_voxel_size: 0.1,

            debug_log: false,
        }
    }
}

/// 全局配置实例
static OBJECT_CONFIG: Lazy<RwLock<ObjectConfig>> = Lazy::new(|| {
    RwLock::new(ObjectConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> ObjectConfig {
    OBJECT_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置
pub fn set_config(config: ObjectConfig) {
    *OBJECT_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *OBJECT_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = ObjectConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ObjectConfig::default();
        assert_eq!(config.branch_policy, BranchPolicy::FirstChild);
        assert!((config.pedestrian_mass - 60.0).abs() < 1e-12);
        assert!(config.bbox_epsilon > 0.0);
    }
}
