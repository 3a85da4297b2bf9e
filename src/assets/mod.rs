//! 资源路径解析
//!
//! 目录约定：
//! - 交互物体: `<dataset>/objects/<category>/<model>/<model>.urdf`
//! - 建筑: `<dataset>/scenes/<model>/<model>_building.urdf`
//! - 包围盒元数据: `<model_dir>/misc/bbox.json`，格式 `{"min": [..], "max": [..]}`
//! - YCB / RBO / 行人网格位于 `<assets>/models/` 下的固定位置

use std::fs;
use std::path::{Path, PathBuf};

use glam::DVec3;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::Deserialize;

use crate::config::ObjectConfig;
use crate::{Result, SimError};

/// 建筑类别（走 scenes 目录）
pub const BUILDING_CATEGORY: &str = "building";

/// 模型选择
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSelection {
    Named(String),
    /// 从类别目录中随机挑选
    Random,
}

impl ModelSelection {
    /// "random" 视为随机选择
    pub fn parse(model: &str) -> Self {
        if model == "random" {
            Self::Random
        } else {
            Self::Named(model.to_string())
        }
    }
}

/// 解析后的模型位置
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedModel {
    pub category: String,
    pub model: String,
    /// 模型目录（网格相对路径以此为基准）
    pub model_dir: PathBuf,
    /// 运动学树描述文件
    pub description: PathBuf,
    /// 包围盒元数据文件
    pub bbox_file: PathBuf,
}

impl ResolvedModel {
    /// 读取原始包围盒尺寸（max - min）
    pub fn original_bbox(&self) -> Result<DVec3> {
        BoundingBoxFile::read(&self.bbox_file).map(|b| b.extent())
    }
}

/// bbox.json
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct BoundingBoxFile {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBoxFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            SimError::AssetNotFound(format!("bounding box file {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn extent(&self) -> DVec3 {
        DVec3::from_array(self.max) - DVec3::from_array(self.min)
    }
}

/// 资源解析接口
pub trait AssetResolver {
    /// 解析类别 + 模型
    fn resolve_model(
        &self,
        category: &str,
        selection: &ModelSelection,
        rng: &mut dyn RngCore,
    ) -> Result<ResolvedModel>;

    /// YCB 物体的 (可视网格, 碰撞网格)
    fn ycb_meshes(&self, name: &str) -> (PathBuf, PathBuf);

    /// RBO 铰接物体的描述文件
    fn rbo_description(&self, name: &str) -> PathBuf;

    /// 行人的 (可视网格, 碰撞网格)
    fn pedestrian_meshes(&self, style: &str) -> (PathBuf, PathBuf);
}

/// 从候选中按随机数挑选（候选需已排序，保证同种子同结果）
pub fn choose_model<'a>(candidates: &'a [String], rng: &mut dyn RngCore) -> Option<&'a String> {
    candidates.choose(rng)
}

/// 文件系统资源库
#[derive(Clone, Debug)]
pub struct AssetLibrary {
    pub assets_path: PathBuf,
    pub dataset_path: PathBuf,
}

impl AssetLibrary {
    pub fn new(assets_path: impl Into<PathBuf>, dataset_path: impl Into<PathBuf>) -> Self {
        Self {
            assets_path: assets_path.into(),
            dataset_path: dataset_path.into(),
        }
    }

    pub fn from_config(config: &ObjectConfig) -> Self {
        Self::new(&config.assets_path, &config.dataset_path)
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.dataset_path.join("objects").join(category)
    }

    pub fn model_dir(&self, category: &str, model: &str) -> PathBuf {
        self.category_dir(category).join(model)
    }

    pub fn scene_dir(&self, model: &str) -> PathBuf {
        self.dataset_path.join("scenes").join(model)
    }

    /// 类别下的模型目录名（字典序）
    pub fn list_models(&self, category: &str) -> Result<Vec<String>> {
        let dir = self.category_dir(category);
        let entries = fs::read_dir(&dir).map_err(|e| {
            SimError::AssetNotFound(format!("category '{}' at {}: {}", category, dir.display(), e))
        })?;

        let mut models = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                models.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        models.sort();
        Ok(models)
    }
}

impl AssetResolver for AssetLibrary {
    fn resolve_model(
        &self,
        category: &str,
        selection: &ModelSelection,
        rng: &mut dyn RngCore,
    ) -> Result<ResolvedModel> {
        let (model, model_dir, description) = if category == BUILDING_CATEGORY {
            let model = match selection {
                ModelSelection::Named(name) => name.clone(),
                ModelSelection::Random => {
                    return Err(SimError::AssetNotFound(
                        "random selection is not available for buildings".into(),
                    ))
                }
            };
            let dir = self.scene_dir(&model);
            let description = dir.join(format!("{}_building.urdf", model));
            (model, dir, description)
        } else {
            let model = match selection {
                ModelSelection::Named(name) => name.clone(),
                ModelSelection::Random => {
                    let models = self.list_models(category)?;
                    choose_model(&models, rng).cloned().ok_or_else(|| {
                        SimError::AssetNotFound(format!("category '{}' has no models", category))
                    })?
                }
            };
            let dir = self.model_dir(category, &model);
            let description = dir.join(format!("{}.urdf", model));
            (model, dir, description)
        };

        if !description.is_file() {
            return Err(SimError::AssetNotFound(format!(
                "{} '{}' has no description at {}",
                category,
                model,
                description.display()
            )));
        }
        let model_dir = model_dir.canonicalize()?;
        let description = model_dir.join(description.file_name().unwrap_or_default());

        log::info!("[Asset] {} / {} -> {}", category, model, description.display());
        Ok(ResolvedModel {
            category: category.to_string(),
            bbox_file: model_dir.join("misc").join("bbox.json"),
            model,
            model_dir,
            description,
        })
    }

    fn ycb_meshes(&self, name: &str) -> (PathBuf, PathBuf) {
        let dir = self.assets_path.join("models").join("ycb").join(name);
        (dir.join("textured_simple.obj"), dir.join("textured_simple_vhacd.obj"))
    }

    fn rbo_description(&self, name: &str) -> PathBuf {
        self.assets_path
            .join("models")
            .join("rbo")
            .join(name)
            .join("configuration")
            .join(format!("{}.urdf", name))
    }

    fn pedestrian_meshes(&self, style: &str) -> (PathBuf, PathBuf) {
        let dir = self
            .assets_path
            .join("models")
            .join("person_meshes")
            .join(format!("person_{}", style))
            .join("meshes");
        (dir.join("person.obj"), dir.join("person_vhacd.obj"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn add_model(root: &Path, category: &str, model: &str, bbox: Option<&str>) {
        let dir = root.join("objects").join(category).join(model);
        fs::create_dir_all(dir.join("misc")).unwrap();
        fs::write(dir.join(format!("{}.urdf", model)), "<robot name=\"x\"/>").unwrap();
        if let Some(bbox) = bbox {
            fs::write(dir.join("misc").join("bbox.json"), bbox).unwrap();
        }
    }

    #[test]
    fn test_named_model_and_bbox() {
        let dir = tempfile::tempdir().unwrap();
        add_model(dir.path(), "chair", "c1", Some(r#"{"min": [-0.5, -0.25, 0.0], "max": [0.5, 0.25, 1.0]}"#));
        let library = AssetLibrary::new("assets", dir.path());
        let mut rng = StdRng::seed_from_u64(0);

        let resolved = library
            .resolve_model("chair", &ModelSelection::parse("c1"), &mut rng)
            .unwrap();
        assert_eq!(resolved.model, "c1");
        assert!(resolved.description.ends_with("c1/c1.urdf"));
        assert!(resolved.model_dir.is_absolute());
        assert_eq!(resolved.original_bbox().unwrap(), DVec3::new(1.0, 0.5, 1.0));
    }

    #[test]
    fn test_random_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        for model in ["a", "b", "c", "d"] {
            add_model(dir.path(), "table", model, None);
        }
        let library = AssetLibrary::new("assets", dir.path());

        let pick = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            library
                .resolve_model("table", &ModelSelection::Random, &mut rng)
                .unwrap()
                .model
        };
        assert_eq!(pick(7), pick(7));
        assert!(["a", "b", "c", "d"].contains(&pick(3).as_str()));
    }

    #[test]
    fn test_missing_assets() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("objects").join("empty")).unwrap();
        let library = AssetLibrary::new("assets", dir.path());
        let mut rng = StdRng::seed_from_u64(0);

        let empty = library.resolve_model("empty", &ModelSelection::Random, &mut rng);
        assert!(matches!(empty, Err(SimError::AssetNotFound(_))));
        let unknown = library.resolve_model("sofa", &ModelSelection::Random, &mut rng);
        assert!(matches!(unknown, Err(SimError::AssetNotFound(_))));
        let named = library.resolve_model("empty", &ModelSelection::parse("x"), &mut rng);
        assert!(matches!(named, Err(SimError::AssetNotFound(_))));
    }

    #[test]
    fn test_building_layout() {
        let dir = tempfile::tempdir().unwrap();
        let scene = dir.path().join("scenes").join("Rs");
        fs::create_dir_all(&scene).unwrap();
        fs::write(scene.join("Rs_building.urdf"), "<robot name=\"Rs\"/>").unwrap();
        let library = AssetLibrary::new("assets", dir.path());
        let mut rng = StdRng::seed_from_u64(0);

        let resolved = library
            .resolve_model(BUILDING_CATEGORY, &ModelSelection::parse("Rs"), &mut rng)
            .unwrap();
        assert!(resolved.description.ends_with("Rs/Rs_building.urdf"));
    }

    #[test]
    fn test_fixed_asset_paths() {
        let library = AssetLibrary::new("/assets", "/dataset");
        let (visual, collision) = library.ycb_meshes("002_master_chef_can");
        assert_eq!(visual, Path::new("/assets/models/ycb/002_master_chef_can/textured_simple.obj"));
        assert!(collision.ends_with("textured_simple_vhacd.obj"));
        assert_eq!(
            library.rbo_description("book"),
            Path::new("/assets/models/rbo/book/configuration/book.urdf")
        );
        let (_, collision) = library.pedestrian_meshes("standing");
        assert!(collision.ends_with("person_standing/meshes/person_vhacd.obj"));
    }
}
