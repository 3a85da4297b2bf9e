//! 铰接物体（运动学树）
//!
//! 内存中的树在加载时写到临时目录，再交给引擎按文件加载。
//! 质量不在构造参数里，加载后从引擎读回。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use super::{ObjectState, SimObject};
use crate::assets::AssetResolver;
use crate::engine::{BodyHandle, LoadFlags, PhysicsEngine};
use crate::kinematics::KinematicTree;
use crate::Result;

/// 树的来源
#[derive(Clone, Debug)]
pub enum TreeSource {
    /// 已解析（可能已缩放）的树
    Tree(KinematicTree),
    /// 直接加载的描述文件
    File(PathBuf),
}

#[derive(Clone, Debug)]
pub struct ArticulatedBody {
    state: ObjectState,
    pub source: TreeSource,
    /// 引擎侧的整体缩放
    pub global_scale: f64,
    /// 内存树的输出目录
    pub scratch_dir: PathBuf,
    mass: Option<f64>,
    loaded_from: Option<PathBuf>,
}

impl ArticulatedBody {
    pub fn from_tree(tree: KinematicTree, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            state: ObjectState::default(),
            source: TreeSource::Tree(tree),
            global_scale: 1.0,
            scratch_dir: scratch_dir.into(),
            mass: None,
            loaded_from: None,
        }
    }

    pub fn from_file(path: impl Into<PathBuf>, global_scale: f64) -> Self {
        Self {
            state: ObjectState::default(),
            source: TreeSource::File(path.into()),
            global_scale,
            scratch_dir: PathBuf::new(),
            mass: None,
            loaded_from: None,
        }
    }

    /// RBO 数据集物体
    pub fn rbo<R: AssetResolver + ?Sized>(resolver: &R, name: &str, global_scale: f64) -> Self {
        Self::from_file(resolver.rbo_description(name), global_scale)
    }

    pub fn tree(&self) -> Option<&KinematicTree> {
        match &self.source {
            TreeSource::Tree(tree) => Some(tree),
            TreeSource::File(_) => None,
        }
    }

    /// 基座质量（加载后可用）
    pub fn mass(&self) -> Option<f64> {
        self.mass
    }

    /// 实际交给引擎的文件
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    /// 把内存树写成文件，文件名带内容哈希，不同缩放结果互不覆盖
    fn materialize(&self, tree: &KinematicTree) -> Result<PathBuf> {
        let urdf = tree.to_urdf_string()?;
        let mut hasher = DefaultHasher::new();
        urdf.hash(&mut hasher);
        let path = self
            .scratch_dir
            .join(format!("{}_{:016x}.urdf", file_stem(&tree.name), hasher.finish()));
        debug_assert!(path.starts_with(&self.scratch_dir));

        std::fs::create_dir_all(&self.scratch_dir)?;
        std::fs::write(&path, urdf)?;
        log::debug!("[Object] 运动学树写出: {}", path.display());
        Ok(path)
    }
}

/// 树名来自资源文件，只保留字母数字、`-` 与 `_`，结果始终是单个路径分量
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "tree".to_string()
    } else {
        stem
    }
}

impl SimObject for ArticulatedBody {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn spawn(&mut self, engine: &mut dyn PhysicsEngine) -> Result<BodyHandle> {
        let path = match &self.source {
            TreeSource::Tree(tree) => self.materialize(tree)?,
            TreeSource::File(path) => path.clone(),
        };

        let body = engine.load_tree_description(&path, self.global_scale, LoadFlags::USE_MATERIAL_COLORS_FROM_MTL)?;
        let mass = engine.get_mass(body)?;
        log::info!("[Object] 铰接物体 {} 加载完成，基座质量 {}", path.display(), mass);

        self.mass = Some(mass);
        self.loaded_from = Some(path);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, HeadlessEngine};
    use crate::kinematics::{Inertial, Link, Origin};

    fn tree() -> KinematicTree {
        KinematicTree::new("crate").with_link(Link {
            inertial: Some(Inertial {
                origin: Origin::default(),
                mass: 12.5,
                inertia: [1.0, 0.0, 0.0, 1.0, 0.0, 1.0],
            }),
            ..Link::new("base_link")
        })
    }

    #[test]
    fn test_tree_is_written_and_mass_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = ArticulatedBody::from_tree(tree(), dir.path());
        assert_eq!(body.mass(), None);

        let mut engine = HeadlessEngine::new();
        body.load(&mut engine).unwrap();

        assert_eq!(body.mass(), Some(12.5));
        let path = body.loaded_from().unwrap().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert_eq!(KinematicTree::from_file(&path).unwrap(), tree());
        assert!(matches!(
            &engine.calls[0],
            EngineCall::LoadTree { flags, global_scale, .. }
                if flags.contains(LoadFlags::USE_MATERIAL_COLORS_FROM_MTL) && *global_scale == 1.0
        ));
    }

    #[test]
    fn test_tree_name_cannot_leave_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");

        for name in ["../escaped", "/etc/passwd", "a/../../b", "..", ""] {
            let mut escaping = tree();
            escaping.name = name.to_string();
            let mut body = ArticulatedBody::from_tree(escaping, &scratch);
            body.load(&mut HeadlessEngine::new()).unwrap();

            let path = body.loaded_from().unwrap();
            assert_eq!(path.parent(), Some(scratch.as_path()), "{}", name);
            assert!(path.canonicalize().unwrap().starts_with(scratch.canonicalize().unwrap()));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("cabinet_01"), "cabinet_01");
        assert_eq!(file_stem("../x"), "___x");
        assert_eq!(file_stem("."), "tree");
        assert_eq!(file_stem(""), "tree");
    }

    #[test]
    fn test_file_source_passes_global_scale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.urdf");
        tree().write_to(&path).unwrap();

        let mut body = ArticulatedBody::from_file(&path, 0.5);
        let mut engine = HeadlessEngine::new();
        body.load(&mut engine).unwrap();
        assert_eq!(
            engine.calls[0],
            EngineCall::LoadTree {
                path: path.clone(),
                global_scale: 0.5,
                flags: LoadFlags::USE_MATERIAL_COLORS_FROM_MTL,
            }
        );
        assert!(body.tree().is_none());
    }

    #[test]
    fn test_missing_file_stays_unloaded() {
        let mut body = ArticulatedBody::from_file("/nonexistent/x.urdf", 1.0);
        let mut engine = HeadlessEngine::new();
        assert!(body.load(&mut engine).is_err());
        assert!(!body.is_loaded());
    }
}
