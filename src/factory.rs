//! 物体工厂
//!
//! 把构造参数翻译成物体。资源解析、树解析、网格路径锚定、包围盒缩放
//! 全部在 `build` 中完成，任何一步失败都不会触碰引擎。

use std::collections::HashMap;
use std::path::PathBuf;

use glam::DVec3;
use quick_xml::events::Event;
use quick_xml::Reader;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::assets::{AssetResolver, ModelSelection};
use crate::config::{get_config, ObjectConfig};
use crate::engine::{DeformableParams, PhysicsEngine};
use crate::kinematics::{
    element_attributes, parse_vec3, BoundingBoxRescaler, KinematicTree, RescaleReport, ScaleRequest,
};
use crate::objects::{
    ArticulatedBody, ConstrainedPedestrian, MarkerShape, PlacedObject, PrimitiveBox, ScannedMeshBody,
    SimObject, SimpleMeshBody, SoftBody, VisualMarker,
};
use crate::{Result, SimError};

/// 物体构造参数
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectSpec {
    Ycb {
        name: String,
        scale: f64,
    },
    ShapeNet {
        path: PathBuf,
        scale: f64,
        position: DVec3,
        /// (roll, pitch, yaw)
        euler: DVec3,
    },
    Pedestrian {
        style: String,
        position: DVec3,
    },
    Marker {
        shape: MarkerShape,
        rgba: [f32; 4],
        initial_offset: DVec3,
    },
    Box {
        position: DVec3,
        half_extents: DVec3,
        visual_only: bool,
        /// None 使用配置中的默认质量
        mass: Option<f64>,
        rgba: [f32; 4],
    },
    /// 数据集中的铰接物体，可选目标包围盒
    Interactive {
        category: String,
        model: ModelSelection,
        bounding_box: Option<DVec3>,
    },
    UrdfFile {
        path: PathBuf,
        scale: f64,
    },
    Rbo {
        name: String,
        scale: f64,
    },
    Soft {
        path: PathBuf,
        params: DeformableParams,
    },
}

impl ObjectSpec {
    /// 场景元素属性：category、model（可为 random）、可选 bounding_box="x y z"
    pub fn from_scene_attributes(attrs: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            attrs
                .get(key)
                .ok_or_else(|| SimError::UrdfParse(format!("scene object is missing attribute '{}'", key)))
        };
        let category = get("category")?.clone();
        let model = ModelSelection::parse(get("model")?);
        let bounding_box = attrs.get("bounding_box").map(|v| parse_vec3(v)).transpose()?;

        Ok(Self::Interactive {
            category,
            model,
            bounding_box,
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Ycb { .. } => "ycb",
            Self::ShapeNet { .. } => "shapenet",
            Self::Pedestrian { .. } => "pedestrian",
            Self::Marker { .. } => "marker",
            Self::Box { .. } => "box",
            Self::Interactive { .. } => "interactive",
            Self::UrdfFile { .. } => "urdf",
            Self::Rbo { .. } => "rbo",
            Self::Soft { .. } => "soft",
        }
    }
}

/// 从场景 XML 中取出所有带 category 的 link 元素
pub fn scene_specs_from_xml(xml: &str) -> Result<Vec<ObjectSpec>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut specs = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"link" => {
                let attrs = element_attributes(&e)?;
                if attrs.contains_key("category") {
                    specs.push(ObjectSpec::from_scene_attributes(&attrs)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(specs)
}

/// 物体工厂
pub struct ObjectFactory<R: AssetResolver> {
    resolver: R,
    rng: StdRng,
    config: ObjectConfig,
}

impl<R: AssetResolver> ObjectFactory<R> {
    /// 使用当前全局配置的快照
    pub fn new(resolver: R, seed: u64) -> Self {
        Self::with_config(resolver, seed, get_config())
    }

    pub fn with_config(resolver: R, seed: u64, config: ObjectConfig) -> Self {
        Self {
            resolver,
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn config(&self) -> &ObjectConfig {
        &self.config
    }

    /// 构造物体（不调用引擎）
    pub fn build(&mut self, spec: &ObjectSpec) -> Result<PlacedObject> {
        let object: PlacedObject = match spec {
            ObjectSpec::Ycb { name, scale } => {
                let mut body = SimpleMeshBody::ycb(&self.resolver, name, *scale);
                body.mass = self.config.ycb_mass;
                body.into()
            }
            ObjectSpec::ShapeNet {
                path,
                scale,
                position,
                euler,
            } => {
                let mut body = ScannedMeshBody::shapenet(path.clone(), *scale, *position, *euler);
                body.mass = self.config.scanned_mass;
                body.into()
            }
            ObjectSpec::Pedestrian { style, position } => {
                let mut body = ConstrainedPedestrian::with_style(&self.resolver, style, *position);
                body.mass = self.config.pedestrian_mass;
                body.into()
            }
            ObjectSpec::Marker {
                shape,
                rgba,
                initial_offset,
            } => VisualMarker::new(*shape, *rgba).with_offset(*initial_offset).into(),
            ObjectSpec::Box {
                position,
                half_extents,
                visual_only,
                mass,
                rgba,
            } => {
                let mut body = PrimitiveBox::new(*position, *half_extents)
                    .with_mass(mass.unwrap_or(self.config.box_mass))
                    .with_color(*rgba);
                body.visual_only = *visual_only;
                body.into()
            }
            ObjectSpec::Interactive {
                category,
                model,
                bounding_box,
            } => self.build_interactive(category, model, *bounding_box)?.0.into(),
            ObjectSpec::UrdfFile { path, scale } => ArticulatedBody::from_file(path.clone(), *scale).into(),
            ObjectSpec::Rbo { name, scale } => ArticulatedBody::rbo(&self.resolver, name, *scale).into(),
            ObjectSpec::Soft { path, params } => SoftBody::new(path.clone(), *params).into(),
        };

        if self.config.debug_log {
            log::debug!("[Object] 构造 {} -> {}", spec.kind_name(), object.kind_name());
        }
        Ok(object)
    }

    /// 构造并加载
    pub fn spawn(&mut self, spec: &ObjectSpec, engine: &mut dyn PhysicsEngine) -> Result<PlacedObject> {
        let mut object = self.build(spec)?;
        object.load(engine)?;
        Ok(object)
    }

    /// 解析数据集物体，需要时按目标包围盒缩放
    pub fn build_interactive(
        &mut self,
        category: &str,
        model: &ModelSelection,
        bounding_box: Option<DVec3>,
    ) -> Result<(ArticulatedBody, Option<RescaleReport>)> {
        let resolved = self.resolver.resolve_model(category, model, &mut self.rng)?;

        // 先检查包围盒，再做任何树操作
        let request = match bounding_box {
            Some(target) => {
                let request = ScaleRequest::new(target, resolved.original_bbox()?);
                request.base_scale(self.config.bbox_epsilon)?;
                Some(request)
            }
            None => None,
        };

        log::info!("[Object] 加载 {}", resolved.description.display());
        let mut tree = KinematicTree::from_file(&resolved.description)?;
        tree.resolve_mesh_paths(&resolved.model_dir);

        let report = match &request {
            Some(request) => {
                Some(BoundingBoxRescaler::from_config(&self.config).rescale(&mut tree, request)?)
            }
            None => None,
        };

        Ok((ArticulatedBody::from_tree(tree, self.config.scratch_dir.clone()), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLibrary;
    use crate::engine::HeadlessEngine;

    #[test]
    fn test_scene_specs() {
        let xml = r#"
            <robot name="scene">
                <link name="floor"/>
                <link name="c0" category="chair" model="random"/>
                <link name="t0" category="table" model="t7" bounding_box="1.2 0.8 0.75">
                    <inertial/>
                </link>
            </robot>
        "#;
        let specs = scene_specs_from_xml(xml).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(
            specs[0],
            ObjectSpec::Interactive {
                category: "chair".into(),
                model: ModelSelection::Random,
                bounding_box: None,
            }
        );
        assert_eq!(
            specs[1],
            ObjectSpec::Interactive {
                category: "table".into(),
                model: ModelSelection::Named("t7".into()),
                bounding_box: Some(DVec3::new(1.2, 0.8, 0.75)),
            }
        );
    }

    #[test]
    fn test_scene_spec_errors() {
        assert!(matches!(
            scene_specs_from_xml(r#"<robot><link category="chair"/></robot>"#),
            Err(SimError::UrdfParse(_))
        ));
        assert!(scene_specs_from_xml(r#"<robot><link category="c" model="m" bounding_box="1 2"/></robot>"#).is_err());
    }

    #[test]
    fn test_primitive_specs_use_config_masses() {
        let config = ObjectConfig {
            box_mass: 7.0,
            pedestrian_mass: 80.0,
            ..ObjectConfig::default()
        };
        let mut factory = ObjectFactory::with_config(AssetLibrary::new("/a", "/d"), 0, config);
        let mut engine = HeadlessEngine::new();

        let cube = factory
            .spawn(
                &ObjectSpec::Box {
                    position: DVec3::ZERO,
                    half_extents: DVec3::ONE,
                    visual_only: false,
                    mass: None,
                    rgba: [1.0; 4],
                },
                &mut engine,
            )
            .unwrap();
        assert_eq!(engine.get_mass(cube.body_handle().unwrap()).unwrap(), 7.0);

        let person = factory
            .spawn(
                &ObjectSpec::Pedestrian {
                    style: "standing".into(),
                    position: DVec3::X,
                },
                &mut engine,
            )
            .unwrap();
        assert_eq!(engine.get_mass(person.body_handle().unwrap()).unwrap(), 80.0);
    }
}
