//! 包围盒缩放 - 沿运动学树传播逐轴缩放
//!
//! 网格、原点、关节轴都表达在各自父坐标系里。父子坐标系之间有旋转时，
//! 父坐标系下有意义的缩放向量在子坐标系下并不是同一个向量，所以每经过
//! 一个带 rpy 的关节都要把缩放向量旋转到子坐标系（取绝对值）再继续。
//!
//! 遍历使用显式工作栈 (连杆, 入射缩放)，而不是递归。

use std::collections::HashSet;

use glam::DVec3;

use super::{KinematicTree, ROOT_LINK};
use crate::config::ObjectConfig;
use crate::math::{rotate_vector_3d, scale_direction, Winding};
use crate::{Result, SimError};

// ============================================================================
// 缩放请求
// ============================================================================

/// 缩放请求（每次构造时创建，用完即弃）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleRequest {
    /// 目标包围盒
    pub target_bbox: DVec3,
    /// 原始（未缩放）包围盒，来自外部元数据
    pub original_bbox: DVec3,
}

impl ScaleRequest {
    pub fn new(target_bbox: DVec3, original_bbox: DVec3) -> Self {
        Self {
            target_bbox,
            original_bbox,
        }
    }

    /// 根连杆坐标系下的基础缩放：target / original
    ///
    /// 原始包围盒任一分量绝对值小于 `epsilon` 时返回 MalformedTree。
    pub fn base_scale(&self, epsilon: f64) -> Result<DVec3> {
        let degenerate = self
            .original_bbox
            .to_array()
            .iter()
            .any(|c| c.abs() < epsilon);
        if degenerate {
            return Err(SimError::MalformedTree(format!(
                "original bounding box {:?} has a zero component",
                self.original_bbox
            )));
        }
        Ok(self.target_bbox / self.original_bbox)
    }

    /// 反向请求（用于还原）
    pub fn inverse(&self) -> Self {
        Self::new(self.original_bbox, self.target_bbox)
    }
}

// ============================================================================
// 传播策略
// ============================================================================

/// 一个连杆有多个子关节时的传播策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BranchPolicy {
    /// 所有子关节的原点/轴都按当前缩放处理，但只沿第一个子关节继续向下
    #[default]
    FirstChild,
    /// 每个分支各自旋转缩放向量并独立向下传播
    EveryChild,
}

/// 缩放结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RescaleReport {
    /// 根坐标系下的基础缩放
    pub base_scale: DVec3,
    /// 每个被访问连杆实际使用的缩放（访问顺序）
    pub link_scales: Vec<(String, DVec3)>,
    /// FirstChild 策略下未被访问的子连杆
    pub skipped_links: Vec<String>,
}

impl RescaleReport {
    /// 指定连杆使用的缩放
    pub fn scale_of(&self, link_name: &str) -> Option<DVec3> {
        self.link_scales
            .iter()
            .find(|(name, _)| name == link_name)
            .map(|(_, scale)| *scale)
    }
}

// ============================================================================
// 缩放器
// ============================================================================

/// 包围盒缩放器
#[derive(Clone, Copy, Debug)]
pub struct BoundingBoxRescaler {
    pub policy: BranchPolicy,
    /// 原始包围盒分量的最小允许值
    pub epsilon: f64,
}

impl Default for BoundingBoxRescaler {
    fn default() -> Self {
        Self {
            policy: BranchPolicy::FirstChild,
            epsilon: 1e-9,
        }
    }
}

impl BoundingBoxRescaler {
    pub fn new(policy: BranchPolicy, epsilon: f64) -> Self {
        Self { policy, epsilon }
    }

    pub fn from_config(config: &ObjectConfig) -> Self {
        Self::new(config.branch_policy, config.bbox_epsilon)
    }

    /// 按请求缩放整棵树
    ///
    /// 在副本上计算，全部成功后才写回；失败时原树保持不变。
    pub fn rescale(&self, tree: &mut KinematicTree, request: &ScaleRequest) -> Result<RescaleReport> {
        let base_scale = request.base_scale(self.epsilon)?;
        tree.validate()?;

        let mut work = tree.clone();
        let report = self.propagate(&mut work, base_scale)?;
        *tree = work;

        log::debug!(
            "[Rescale] '{}' 基础缩放 {:?}，访问 {} 个连杆，跳过 {} 个",
            tree.name,
            base_scale,
            report.link_scales.len(),
            report.skipped_links.len()
        );
        Ok(report)
    }

    fn propagate(&self, tree: &mut KinematicTree, base_scale: DVec3) -> Result<RescaleReport> {
        let mut report = RescaleReport {
            base_scale,
            ..Default::default()
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<(String, DVec3)> = vec![(ROOT_LINK.to_string(), base_scale)];

        while let Some((link_name, scale)) = stack.pop() {
            if !visited.insert(link_name.clone()) {
                return Err(SimError::MalformedTree(format!(
                    "link '{}' reached twice while rescaling",
                    link_name
                )));
            }

            // 连杆自身：网格 scale 与全部局部原点
            let link = tree.link_mut(&link_name).ok_or_else(|| {
                SimError::MalformedTree(format!("unknown link '{}'", link_name))
            })?;
            link.apply_scale(scale);
            report.link_scales.push((link_name.clone(), scale));

            // 子关节：没有则该分支结束
            let joint_indices = tree.joint_indices_with_parent(&link_name);
            if joint_indices.is_empty() {
                continue;
            }

            let mut next_frames: Vec<(String, DVec3)> = Vec::with_capacity(joint_indices.len());
            for idx in joint_indices {
                let joint = &mut tree.joints[idx];

                // 关节原点位于父坐标系，按当前缩放
                joint.origin.xyz *= scale;

                // 旋转到子坐标系
                let child_scale = match joint.origin.rpy {
                    Some(rpy) => {
                        rotate_vector_3d(scale, rpy.x, rpy.y, rpy.z, Winding::CounterClockwise).abs()
                    }
                    None => scale,
                };

                // 轴是方向：缩放后重新归一化
                if let Some(axis) = joint.axis {
                    let scaled = scale_direction(axis, child_scale).ok_or_else(|| {
                        SimError::DegenerateAxis {
                            joint: joint.name.clone(),
                        }
                    })?;
                    joint.axis = Some(scaled);
                }

                next_frames.push((joint.child_link.clone(), child_scale));
            }

            match self.policy {
                BranchPolicy::FirstChild => {
                    let mut frames = next_frames.into_iter();
                    if let Some(first) = frames.next() {
                        stack.push(first);
                    }
                    for (skipped, _) in frames {
                        log::warn!(
                            "[Rescale] 连杆 '{}' 有多个子关节，'{}' 分支不继续传播",
                            link_name,
                            skipped
                        );
                        report.skipped_links.push(skipped);
                    }
                }
                BranchPolicy::EveryChild => {
                    // 逆序入栈，保证按文档顺序深度优先
                    stack.extend(next_frames.into_iter().rev());
                }
            }
        }

        Ok(report)
    }
}
