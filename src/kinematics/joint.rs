//! 关节 - 父连杆到子连杆的有向边

use glam::DVec3;

use super::Origin;

/// 关节类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JointKind {
    Fixed,
    Revolute,
    Continuous,
    Prismatic,
    Floating,
    Planar,
}

impl JointKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fixed" => Some(Self::Fixed),
            "revolute" => Some(Self::Revolute),
            "continuous" => Some(Self::Continuous),
            "prismatic" => Some(Self::Prismatic),
            "floating" => Some(Self::Floating),
            "planar" => Some(Self::Planar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Revolute => "revolute",
            Self::Continuous => "continuous",
            Self::Prismatic => "prismatic",
            Self::Floating => "floating",
            Self::Planar => "planar",
        }
    }

    /// 是否需要运动轴
    #[inline]
    pub fn has_axis(&self) -> bool {
        !matches!(self, Self::Fixed | Self::Floating)
    }
}

/// 关节限位
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JointLimit {
    pub lower: f64,
    pub upper: f64,
    pub effort: f64,
    pub velocity: f64,
}

/// 关节动力学参数
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JointDynamics {
    pub damping: f64,
    pub friction: f64,
}

/// 关节
#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
    pub name: String,
    pub kind: JointKind,
    /// 父连杆名称
    pub parent_link: String,
    /// 子连杆名称
    pub child_link: String,
    /// 局部原点，平移表达在父连杆坐标系中
    pub origin: Origin,
    /// 运动轴（单位向量，表达在关节坐标系中）
    pub axis: Option<DVec3>,
    pub limit: Option<JointLimit>,
    pub dynamics: Option<JointDynamics>,
}

impl Joint {
    pub fn new(
        name: impl Into<String>,
        kind: JointKind,
        parent_link: impl Into<String>,
        child_link: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parent_link: parent_link.into(),
            child_link: child_link.into(),
            origin: Origin::default(),
            axis: None,
            limit: None,
            dynamics: None,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_axis(mut self, axis: DVec3) -> Self {
        self.axis = Some(axis);
        self
    }
}
