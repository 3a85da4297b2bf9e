//! URDF 写出
//!
//! 缩放后的树需要重新写成 URDF 文件交给引擎加载。
//! 数值使用 f64 的最短往返表示，读回后与内存中的值完全一致。

use std::fs;
use std::path::Path;

use glam::DVec3;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use super::{Geometry, Inertial, Joint, KinematicTree, Link, LinkGeometry, Material, Origin};
use crate::{Result, SimError};

type XmlWriter = Writer<Vec<u8>>;

impl KinematicTree {
    /// 序列化为 URDF 字符串
    pub fn to_urdf_string(&self) -> Result<String> {
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
        emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut robot = BytesStart::new("robot");
        robot.push_attribute(("name", self.name.as_str()));
        emit(&mut w, Event::Start(robot))?;

        for material in &self.materials {
            write_material(&mut w, material)?;
        }
        for link in &self.links {
            write_link(&mut w, link)?;
        }
        for joint in &self.joints {
            write_joint(&mut w, joint)?;
        }

        emit(&mut w, Event::End(BytesEnd::new("robot")))?;
        String::from_utf8(w.into_inner()).map_err(|e| SimError::UrdfWrite(e.to_string()))
    }

    /// 写入文件
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.to_urdf_string()?)?;
        log::debug!("[URDF] 写出 {}", path.display());
        Ok(())
    }
}

fn emit(w: &mut XmlWriter, event: Event) -> Result<()> {
    w.write_event(event)
        .map_err(|e| SimError::UrdfWrite(e.to_string()))
}

fn fmt_vec3(v: DVec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

fn empty(w: &mut XmlWriter, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut e = BytesStart::new(tag);
    for &(k, v) in attrs {
        e.push_attribute((k, v));
    }
    emit(w, Event::Empty(e))
}

fn start(w: &mut XmlWriter, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut e = BytesStart::new(tag);
    for &(k, v) in attrs {
        e.push_attribute((k, v));
    }
    emit(w, Event::Start(e))
}

fn end(w: &mut XmlWriter, tag: &str) -> Result<()> {
    emit(w, Event::End(BytesEnd::new(tag)))
}

fn write_origin(w: &mut XmlWriter, origin: &Origin) -> Result<()> {
    let xyz = fmt_vec3(origin.xyz);
    match origin.rpy {
        Some(rpy) => {
            let rpy = fmt_vec3(rpy);
            empty(w, "origin", &[("xyz", xyz.as_str()), ("rpy", rpy.as_str())])
        }
        None => empty(w, "origin", &[("xyz", xyz.as_str())]),
    }
}

fn write_material(w: &mut XmlWriter, material: &Material) -> Result<()> {
    if material.rgba.is_none() && material.texture.is_none() {
        return empty(w, "material", &[("name", material.name.as_str())]);
    }
    start(w, "material", &[("name", material.name.as_str())])?;
    if let Some(rgba) = material.rgba {
        let rgba = format!("{} {} {} {}", rgba[0], rgba[1], rgba[2], rgba[3]);
        empty(w, "color", &[("rgba", rgba.as_str())])?;
    }
    if let Some(texture) = &material.texture {
        empty(w, "texture", &[("filename", texture.as_str())])?;
    }
    end(w, "material")
}

fn write_geometry(w: &mut XmlWriter, tag: &str, element: &LinkGeometry) -> Result<()> {
    match &element.name {
        Some(name) => start(w, tag, &[("name", name.as_str())])?,
        None => start(w, tag, &[])?,
    }
    write_origin(w, &element.origin)?;

    start(w, "geometry", &[])?;
    match &element.geometry {
        Geometry::Mesh(mesh) => {
            let filename = mesh.file_path.display().to_string();
            match mesh.scale {
                Some(scale) => {
                    let scale = fmt_vec3(scale);
                    empty(w, "mesh", &[("filename", filename.as_str()), ("scale", scale.as_str())])?;
                }
                None => empty(w, "mesh", &[("filename", filename.as_str())])?,
            }
        }
        Geometry::Box { size } => empty(w, "box", &[("size", fmt_vec3(*size).as_str())])?,
        Geometry::Cylinder { radius, length } => empty(
            w,
            "cylinder",
            &[("radius", radius.to_string().as_str()), ("length", length.to_string().as_str())],
        )?,
        Geometry::Sphere { radius } => empty(w, "sphere", &[("radius", radius.to_string().as_str())])?,
    }
    end(w, "geometry")?;

    if let Some(material) = &element.material {
        write_material(w, material)?;
    }
    end(w, tag)
}

fn write_inertial(w: &mut XmlWriter, inertial: &Inertial) -> Result<()> {
    start(w, "inertial", &[])?;
    write_origin(w, &inertial.origin)?;
    empty(w, "mass", &[("value", inertial.mass.to_string().as_str())])?;
    let values: Vec<String> = inertial.inertia.iter().map(|v| v.to_string()).collect();
    let keys = ["ixx", "ixy", "ixz", "iyy", "iyz", "izz"];
    let attrs: Vec<(&str, &str)> = keys
        .iter()
        .zip(values.iter())
        .map(|(k, v)| (*k, v.as_str()))
        .collect();
    empty(w, "inertia", &attrs)?;
    end(w, "inertial")
}

fn write_link(w: &mut XmlWriter, link: &Link) -> Result<()> {
    start(w, "link", &[("name", link.name.as_str())])?;
    if let Some(inertial) = &link.inertial {
        write_inertial(w, inertial)?;
    }
    for visual in &link.visuals {
        write_geometry(w, "visual", visual)?;
    }
    for collision in &link.collisions {
        write_geometry(w, "collision", collision)?;
    }
    end(w, "link")
}

fn write_joint(w: &mut XmlWriter, joint: &Joint) -> Result<()> {
    start(w, "joint", &[("name", joint.name.as_str()), ("type", joint.kind.as_str())])?;
    write_origin(w, &joint.origin)?;
    empty(w, "parent", &[("link", joint.parent_link.as_str())])?;
    empty(w, "child", &[("link", joint.child_link.as_str())])?;
    if let Some(axis) = joint.axis {
        empty(w, "axis", &[("xyz", fmt_vec3(axis).as_str())])?;
    }
    if let Some(limit) = joint.limit {
        empty(
            w,
            "limit",
            &[
                ("lower", limit.lower.to_string().as_str()),
                ("upper", limit.upper.to_string().as_str()),
                ("effort", limit.effort.to_string().as_str()),
                ("velocity", limit.velocity.to_string().as_str()),
            ],
        )?;
    }
    if let Some(dynamics) = joint.dynamics {
        empty(
            w,
            "dynamics",
            &[
                ("damping", dynamics.damping.to_string().as_str()),
                ("friction", dynamics.friction.to_string().as_str()),
            ],
        )?;
    }
    end(w, "joint")
}
