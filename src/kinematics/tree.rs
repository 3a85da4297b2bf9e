//! 运动学树
//!
//! 以 `base_link` 为根；除根以外每个连杆恰好由一个关节引入。

use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::{Joint, Link, Material, MeshRef, ROOT_LINK};
use crate::{Result, SimError};

/// 运动学树
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KinematicTree {
    /// robot 名称
    pub name: String,
    /// 连杆（文档顺序，名称唯一）
    pub links: Vec<Link>,
    /// 关节（文档顺序）
    pub joints: Vec<Joint>,
    /// 顶层材质定义
    pub materials: Vec<Material>,
}

impl KinematicTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    pub fn with_joint(mut self, joint: Joint) -> Self {
        self.joints.push(joint);
        self
    }

    // ========================================
    // 查询
    // ========================================

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    pub fn link_mut(&mut self, name: &str) -> Option<&mut Link> {
        self.links.iter_mut().find(|l| l.name == name)
    }

    pub fn joint(&self, name: &str) -> Option<&Joint> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// 根连杆
    pub fn root_link(&self) -> Option<&Link> {
        self.link(ROOT_LINK)
    }

    /// 父连杆为 `link_name` 的关节（文档顺序）
    pub fn joints_with_parent(&self, link_name: &str) -> Vec<&Joint> {
        self.joints
            .iter()
            .filter(|j| j.parent_link == link_name)
            .collect()
    }

    /// 同上，返回关节下标
    pub fn joint_indices_with_parent(&self, link_name: &str) -> Vec<usize> {
        self.joints
            .iter()
            .enumerate()
            .filter(|(_, j)| j.parent_link == link_name)
            .map(|(i, _)| i)
            .collect()
    }

    /// 全部网格引用
    pub fn meshes(&self) -> impl Iterator<Item = &MeshRef> {
        self.links.iter().flat_map(|l| l.meshes())
    }

    // ========================================
    // 修改
    // ========================================

    /// 把所有网格路径锚定到 `base_dir`
    pub fn resolve_mesh_paths(&mut self, base_dir: &Path) {
        for link in &mut self.links {
            for mesh in link.meshes_mut() {
                mesh.file_path = base_dir.join(&mesh.file_path);
            }
        }
    }

    // ========================================
    // 校验
    // ========================================

    /// 校验树结构
    ///
    /// - 连杆名唯一
    /// - 关节引用的连杆都存在
    /// - base_link 存在且没有父关节
    /// - 每个连杆至多一个父关节，且都能从 base_link 到达
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::with_capacity(self.links.len());
        for link in &self.links {
            if !names.insert(link.name.as_str()) {
                return Err(SimError::MalformedTree(format!(
                    "duplicate link '{}'",
                    link.name
                )));
            }
        }

        if !names.contains(ROOT_LINK) {
            return Err(SimError::MalformedTree(format!(
                "missing root link '{}'",
                ROOT_LINK
            )));
        }

        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for joint in &self.joints {
            for referenced in [&joint.parent_link, &joint.child_link] {
                if !names.contains(referenced.as_str()) {
                    return Err(SimError::MalformedTree(format!(
                        "joint '{}' references unknown link '{}'",
                        joint.name, referenced
                    )));
                }
            }
            if joint.child_link == ROOT_LINK {
                return Err(SimError::MalformedTree(format!(
                    "joint '{}' has the root link as its child",
                    joint.name
                )));
            }
            if parent_of
                .insert(joint.child_link.as_str(), joint.name.as_str())
                .is_some()
            {
                return Err(SimError::MalformedTree(format!(
                    "link '{}' has more than one parent joint",
                    joint.child_link
                )));
            }
        }

        // 从根出发的可达性
        let mut reached: HashSet<&str> = HashSet::with_capacity(self.links.len());
        let mut stack = vec![ROOT_LINK];
        while let Some(current) = stack.pop() {
            if !reached.insert(current) {
                continue;
            }
            for joint in self.joints.iter().filter(|j| j.parent_link == current) {
                stack.push(joint.child_link.as_str());
            }
        }
        if let Some(orphan) = self.links.iter().find(|l| !reached.contains(l.name.as_str())) {
            return Err(SimError::MalformedTree(format!(
                "link '{}' is not reachable from '{}'",
                orphan.name, ROOT_LINK
            )));
        }

        Ok(())
    }
}
