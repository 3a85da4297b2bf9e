//! URDF 读取器
//!
//! 基于 quick-xml 事件流解析 robot / link / joint / material 元素，
//! 未识别的元素（transmission、gazebo 等）直接忽略。

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use glam::{DVec3, DVec4};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{
    Geometry, Inertial, Joint, JointDynamics, JointKind, JointLimit, KinematicTree, Link,
    LinkGeometry, Material, MeshRef, Origin,
};
use crate::{Result, SimError};

pub(crate) type Attributes = HashMap<String, String>;

impl KinematicTree {
    /// 从文件路径加载 URDF
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path)?;
        log::debug!("[URDF] 解析 {}", path.display());
        Self::from_urdf_str(&xml)
    }

    /// 从 XML 字符串加载 URDF
    pub fn from_urdf_str(xml: &str) -> Result<Self> {
        let mut parser = UrdfParser::default();
        parser.parse(xml)?;
        Ok(parser.tree)
    }
}

// ============================================================================
// 解析状态
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
enum GeometrySlot {
    Visual,
    Collision,
}

/// 尚未闭合的 visual / collision
#[derive(Debug)]
struct PendingGeometry {
    slot: GeometrySlot,
    name: Option<String>,
    origin: Origin,
    geometry: Option<Geometry>,
    material: Option<Material>,
}

#[derive(Default)]
struct UrdfParser {
    tree: KinematicTree,
    /// 已打开元素的标签栈
    path: Vec<String>,
    link: Option<Link>,
    geometry: Option<PendingGeometry>,
    inertial: Option<Inertial>,
    joint: Option<Joint>,
    material: Option<Material>,
}

impl UrdfParser {
    fn parse(&mut self, xml: &str) -> Result<()> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag = tag_name(&e);
                    self.open(&tag, &e)?;
                    self.path.push(tag);
                }
                Ok(Event::Empty(e)) => {
                    let tag = tag_name(&e);
                    self.open(&tag, &e)?;
                    self.close(&tag)?;
                }
                Ok(Event::End(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    self.path.pop();
                    self.close(&tag)?;
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(SimError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        if self.tree.links.is_empty() {
            return Err(SimError::UrdfParse("document contains no links".to_string()));
        }
        Ok(())
    }

    fn parent(&self) -> Option<&str> {
        self.path.last().map(|s| s.as_str())
    }

    fn open(&mut self, tag: &str, e: &BytesStart) -> Result<()> {
        let parent = self.parent().map(str::to_owned);
        let attrs = attributes(e)?;

        match (tag, parent.as_deref()) {
            ("robot", None) => {
                self.tree.name = attrs.get("name").cloned().unwrap_or_default();
            }
            ("link", Some("robot")) => {
                self.link = Some(Link::new(required(&attrs, tag, "name")?));
            }
            ("visual", Some("link")) | ("collision", Some("link")) => {
                let slot = if tag == "visual" {
                    GeometrySlot::Visual
                } else {
                    GeometrySlot::Collision
                };
                self.geometry = Some(PendingGeometry {
                    slot,
                    name: attrs.get("name").cloned(),
                    origin: Origin::default(),
                    geometry: None,
                    material: None,
                });
            }
            ("inertial", Some("link")) => {
                self.inertial = Some(Inertial::default());
            }
            ("origin", Some(owner)) => {
                let origin = parse_origin(&attrs)?;
                match owner {
                    "visual" | "collision" => {
                        if let Some(pending) = self.geometry.as_mut() {
                            pending.origin = origin;
                        }
                    }
                    "inertial" => {
                        if let Some(inertial) = self.inertial.as_mut() {
                            inertial.origin = origin;
                        }
                    }
                    "joint" => {
                        if let Some(joint) = self.joint.as_mut() {
                            joint.origin = origin;
                        }
                    }
                    _ => {}
                }
            }
            ("mesh", Some("geometry")) => {
                let mut mesh = MeshRef::new(required(&attrs, tag, "filename")?);
                if let Some(scale) = attrs.get("scale") {
                    mesh.scale = Some(parse_vec3(scale)?);
                }
                self.set_geometry(Geometry::Mesh(mesh));
            }
            ("box", Some("geometry")) => {
                let size = parse_vec3(&required(&attrs, tag, "size")?)?;
                self.set_geometry(Geometry::Box { size });
            }
            ("cylinder", Some("geometry")) => {
                let radius = parse_f64(&required(&attrs, tag, "radius")?)?;
                let length = parse_f64(&required(&attrs, tag, "length")?)?;
                self.set_geometry(Geometry::Cylinder { radius, length });
            }
            ("sphere", Some("geometry")) => {
                let radius = parse_f64(&required(&attrs, tag, "radius")?)?;
                self.set_geometry(Geometry::Sphere { radius });
            }
            ("material", Some("robot")) | ("material", Some("visual")) => {
                self.material = Some(Material {
                    name: attrs.get("name").cloned().unwrap_or_default(),
                    ..Default::default()
                });
            }
            ("color", Some("material")) => {
                let rgba = parse_vec4(&required(&attrs, tag, "rgba")?)?;
                if let Some(material) = self.material.as_mut() {
                    material.rgba = Some(rgba.to_array());
                }
            }
            ("texture", Some("material")) => {
                if let Some(material) = self.material.as_mut() {
                    material.texture = attrs.get("filename").cloned();
                }
            }
            ("mass", Some("inertial")) => {
                let mass = parse_f64(&required(&attrs, tag, "value")?)?;
                if let Some(inertial) = self.inertial.as_mut() {
                    inertial.mass = mass;
                }
            }
            ("inertia", Some("inertial")) => {
                let mut inertia = [0.0; 6];
                for (slot, key) in inertia
                    .iter_mut()
                    .zip(["ixx", "ixy", "ixz", "iyy", "iyz", "izz"])
                {
                    *slot = optional_f64(&attrs, key)?;
                }
                if let Some(inertial) = self.inertial.as_mut() {
                    inertial.inertia = inertia;
                }
            }
            ("joint", Some("robot")) => {
                let name = required(&attrs, tag, "name")?;
                let kind_str = required(&attrs, tag, "type")?;
                let kind = JointKind::parse(&kind_str).ok_or_else(|| {
                    SimError::UrdfParse(format!("joint '{}' has unknown type '{}'", name, kind_str))
                })?;
                self.joint = Some(Joint::new(name, kind, String::new(), String::new()));
            }
            ("parent", Some("joint")) => {
                let link = required(&attrs, tag, "link")?;
                if let Some(joint) = self.joint.as_mut() {
                    joint.parent_link = link;
                }
            }
            ("child", Some("joint")) => {
                let link = required(&attrs, tag, "link")?;
                if let Some(joint) = self.joint.as_mut() {
                    joint.child_link = link;
                }
            }
            ("axis", Some("joint")) => {
                let axis = parse_vec3(&required(&attrs, tag, "xyz")?)?;
                if let Some(joint) = self.joint.as_mut() {
                    joint.axis = Some(axis);
                }
            }
            ("limit", Some("joint")) => {
                let limit = JointLimit {
                    lower: optional_f64(&attrs, "lower")?,
                    upper: optional_f64(&attrs, "upper")?,
                    effort: optional_f64(&attrs, "effort")?,
                    velocity: optional_f64(&attrs, "velocity")?,
                };
                if let Some(joint) = self.joint.as_mut() {
                    joint.limit = Some(limit);
                }
            }
            ("dynamics", Some("joint")) => {
                let dynamics = JointDynamics {
                    damping: optional_f64(&attrs, "damping")?,
                    friction: optional_f64(&attrs, "friction")?,
                };
                if let Some(joint) = self.joint.as_mut() {
                    joint.dynamics = Some(dynamics);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, tag: &str) -> Result<()> {
        let parent = self.parent().map(str::to_owned);

        match (tag, parent.as_deref()) {
            ("link", Some("robot")) => {
                if let Some(link) = self.link.take() {
                    self.tree.links.push(link);
                }
            }
            ("visual", Some("link")) | ("collision", Some("link")) => {
                if let Some(pending) = self.geometry.take() {
                    let link = self.link.as_mut().ok_or_else(|| {
                        SimError::UrdfParse(format!("<{}> outside of a link", tag))
                    })?;
                    let geometry = pending.geometry.ok_or_else(|| {
                        SimError::UrdfParse(format!(
                            "<{}> in link '{}' has no geometry",
                            tag, link.name
                        ))
                    })?;
                    let element = LinkGeometry {
                        name: pending.name,
                        origin: pending.origin,
                        geometry,
                        material: pending.material,
                    };
                    match pending.slot {
                        GeometrySlot::Visual => link.visuals.push(element),
                        GeometrySlot::Collision => link.collisions.push(element),
                    }
                }
            }
            ("inertial", Some("link")) => {
                if let (Some(link), Some(inertial)) = (self.link.as_mut(), self.inertial.take()) {
                    link.inertial = Some(inertial);
                }
            }
            ("material", Some("robot")) => {
                if let Some(material) = self.material.take() {
                    self.tree.materials.push(material);
                }
            }
            ("material", Some("visual")) => {
                if let (Some(pending), Some(material)) =
                    (self.geometry.as_mut(), self.material.take())
                {
                    pending.material = Some(material);
                }
            }
            ("joint", Some("robot")) => {
                if let Some(joint) = self.joint.take() {
                    if joint.parent_link.is_empty() || joint.child_link.is_empty() {
                        return Err(SimError::UrdfParse(format!(
                            "joint '{}' is missing its parent or child link",
                            joint.name
                        )));
                    }
                    self.tree.joints.push(joint);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn set_geometry(&mut self, geometry: Geometry) {
        if let Some(pending) = self.geometry.as_mut() {
            pending.geometry = Some(geometry);
        }
    }
}

// ============================================================================
// 属性解析
// ============================================================================

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

pub(crate) fn attributes(e: &BytesStart) -> Result<Attributes> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| SimError::UrdfParse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let raw = String::from_utf8_lossy(&attr.value).to_string();
        let value = quick_xml::escape::unescape(&raw)
            .map_err(|e| SimError::UrdfParse(e.to_string()))?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn required(attrs: &Attributes, tag: &str, key: &str) -> Result<String> {
    attrs.get(key).cloned().ok_or_else(|| {
        SimError::UrdfParse(format!("<{}> is missing attribute '{}'", tag, key))
    })
}

fn parse_f64(value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| SimError::UrdfParse(format!("invalid number '{}'", value)))
}

fn optional_f64(attrs: &Attributes, key: &str) -> Result<f64> {
    attrs.get(key).map(|v| parse_f64(v)).unwrap_or(Ok(0.0))
}

fn parse_components<const N: usize>(value: &str) -> Result<[f64; N]> {
    let parts = value
        .split_whitespace()
        .map(parse_f64)
        .collect::<Result<Vec<f64>>>()?;
    parts.try_into().map_err(|_| {
        SimError::UrdfParse(format!("expected {} components in '{}'", N, value))
    })
}

pub(crate) fn parse_vec3(value: &str) -> Result<DVec3> {
    parse_components::<3>(value).map(DVec3::from_array)
}

fn parse_vec4(value: &str) -> Result<DVec4> {
    parse_components::<4>(value).map(DVec4::from_array)
}

fn parse_origin(attrs: &Attributes) -> Result<Origin> {
    let xyz = match attrs.get("xyz") {
        Some(v) => parse_vec3(v)?,
        None => DVec3::ZERO,
    };
    let rpy = attrs.get("rpy").map(|v| parse_vec3(v)).transpose()?;
    Ok(Origin { xyz, rpy })
}
