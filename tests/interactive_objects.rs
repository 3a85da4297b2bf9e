//! 数据集铰接物体：解析 -> 缩放 -> 写出 -> 引擎加载

use std::fs;
use std::path::Path;

use glam::DVec3;
use sim_objects::assets::{AssetLibrary, ModelSelection};
use sim_objects::engine::{EngineCall, HeadlessEngine};
use sim_objects::factory::scene_specs_from_xml;
use sim_objects::{BranchPolicy, KinematicTree, ObjectConfig, ObjectFactory, ObjectSpec, SimError, SimObject};

const EPS: f64 = 1e-9;

const CABINET: &str = r#"<?xml version="1.0"?>
<robot name="cabinet">
  <link name="base_link">
    <inertial>
      <origin xyz="0 0 0.5"/>
      <mass value="8"/>
      <inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/>
    </inertial>
    <visual>
      <origin xyz="0 0 0.5"/>
      <geometry><mesh filename="shape/visual/body.obj"/></geometry>
    </visual>
    <collision>
      <origin xyz="0 0 0.5"/>
      <geometry><mesh filename="shape/collision/body.obj" scale="1 1 2"/></geometry>
    </collision>
  </link>
  <link name="door">
    <visual>
      <origin xyz="0.25 0 0"/>
      <geometry><mesh filename="shape/visual/door.obj"/></geometry>
    </visual>
  </link>
  <joint name="door_hinge" type="revolute">
    <origin xyz="0.5 0.2 0.5" rpy="0 0 1.5707963267948966"/>
    <parent link="base_link"/>
    <child link="door"/>
    <axis xyz="1 1 0"/>
    <limit lower="0" upper="1.57" effort="10" velocity="1"/>
  </joint>
</robot>
"#;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn add_model(dataset: &Path, category: &str, model: &str, urdf: &str, bbox: &str) {
    let dir = dataset.join("objects").join(category).join(model);
    fs::create_dir_all(dir.join("misc")).unwrap();
    fs::write(dir.join(format!("{}.urdf", model)), urdf).unwrap();
    fs::write(dir.join("misc").join("bbox.json"), bbox).unwrap();
}

fn factory(dataset: &Path, scratch: &Path, policy: BranchPolicy) -> ObjectFactory<AssetLibrary> {
    let config = ObjectConfig {
        dataset_path: dataset.to_path_buf(),
        scratch_dir: scratch.to_path_buf(),
        branch_policy: policy,
        ..ObjectConfig::default()
    };
    ObjectFactory::with_config(AssetLibrary::from_config(&config), 42, config)
}

fn close(a: DVec3, b: DVec3) -> bool {
    (a - b).abs().max_element() < EPS
}

#[test]
fn rescaled_cabinet_is_loaded_from_rewritten_file() {
    init_logger();
    let dataset = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    add_model(
        dataset.path(),
        "cabinet",
        "c1",
        CABINET,
        r#"{"min": [-0.5, -0.5, 0.0], "max": [0.5, 0.5, 1.0]}"#,
    );

    let mut factory = factory(dataset.path(), scratch.path(), BranchPolicy::FirstChild);
    let mut engine = HeadlessEngine::new();
    let spec = ObjectSpec::Interactive {
        category: "cabinet".into(),
        model: ModelSelection::Named("c1".into()),
        bounding_box: Some(DVec3::new(2.0, 1.0, 0.5)),
    };
    let object = factory.spawn(&spec, &mut engine).unwrap();

    let body = object.as_articulated().unwrap();
    assert_eq!(body.mass(), Some(8.0));
    let loaded = body.loaded_from().unwrap();
    assert!(loaded.starts_with(scratch.path()));
    assert!(matches!(&engine.calls[0], EngineCall::LoadTree { path, .. } if path == loaded));

    let tree = KinematicTree::from_file(loaded).unwrap();
    let base = tree.link("base_link").unwrap();

    // 根连杆：基础缩放 (2, 1, 0.5)
    let visual = base.visuals[0].geometry.as_mesh().unwrap();
    assert_eq!(visual.scale, Some(DVec3::new(2.0, 1.0, 0.5)));
    assert!(visual.file_path.is_absolute());
    assert!(visual.file_path.ends_with("c1/shape/visual/body.obj"));
    let collision = base.collisions[0].geometry.as_mesh().unwrap();
    assert!(close(collision.effective_scale(), DVec3::new(2.0, 1.0, 1.0)));
    assert!(close(base.visuals[0].origin.xyz, DVec3::new(0.0, 0.0, 0.25)));
    assert!(close(base.inertial.as_ref().unwrap().origin.xyz, DVec3::new(0.0, 0.0, 0.25)));

    // 关节原点用父缩放；门在子坐标系里 x / y 交换
    let hinge = tree.joint("door_hinge").unwrap();
    assert!(close(hinge.origin.xyz, DVec3::new(1.0, 0.2, 0.25)));
    let door = tree.link("door").unwrap();
    let door_mesh = door.visuals[0].geometry.as_mesh().unwrap();
    assert!(close(door_mesh.effective_scale(), DVec3::new(1.0, 2.0, 0.5)));
    assert!(close(door.visuals[0].origin.xyz, DVec3::new(0.25, 0.0, 0.0)));

    let axis = hinge.axis.unwrap();
    assert!((axis.length() - 1.0).abs() < EPS);
    assert!(close(axis, DVec3::new(1.0, 2.0, 0.0).normalize()));

    // 关节限位不缩放
    assert_eq!(hinge.limit.unwrap().upper, 1.57);
}

#[test]
fn zero_bounding_box_fails_before_engine_call() {
    let dataset = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    add_model(
        dataset.path(),
        "cabinet",
        "flat",
        CABINET,
        r#"{"min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}"#,
    );

    let mut factory = factory(dataset.path(), scratch.path(), BranchPolicy::FirstChild);
    let mut engine = HeadlessEngine::new();
    let spec = ObjectSpec::Interactive {
        category: "cabinet".into(),
        model: ModelSelection::Named("flat".into()),
        bounding_box: Some(DVec3::ONE),
    };

    let result = factory.spawn(&spec, &mut engine);
    assert!(matches!(result, Err(SimError::MalformedTree(_))));
    assert!(engine.calls.is_empty());
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn degenerate_axis_aborts_construction() {
    let dataset = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let slider = CABINET.replace(r#"<axis xyz="1 1 0"/>"#, r#"<axis xyz="0 0 1"/>"#);
    add_model(
        dataset.path(),
        "cabinet",
        "slider",
        &slider,
        r#"{"min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0]}"#,
    );

    let mut factory = factory(dataset.path(), scratch.path(), BranchPolicy::FirstChild);
    let mut engine = HeadlessEngine::new();
    let spec = ObjectSpec::Interactive {
        category: "cabinet".into(),
        model: ModelSelection::Named("slider".into()),
        bounding_box: Some(DVec3::new(1.0, 1.0, 0.0)),
    };
    let result = factory.spawn(&spec, &mut engine);
    assert!(matches!(result, Err(SimError::DegenerateAxis { ref joint }) if joint == "door_hinge"));
    assert!(engine.calls.is_empty());
}

#[test]
fn unscaled_model_keeps_authored_values() {
    let dataset = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    add_model(dataset.path(), "cabinet", "c1", CABINET, r#"{"min": [0, 0, 0], "max": [1, 1, 1]}"#);

    let mut factory = factory(dataset.path(), scratch.path(), BranchPolicy::FirstChild);
    let (body, report) = factory
        .build_interactive("cabinet", &ModelSelection::Named("c1".into()), None)
        .unwrap();
    assert!(report.is_none());

    let tree = body.tree().unwrap();
    assert_eq!(tree.link("door").unwrap().meshes().next().unwrap().scale, None);
    assert_eq!(tree.joint("door_hinge").unwrap().axis, Some(DVec3::new(1.0, 1.0, 0.0)));
}

#[test]
fn random_model_selection_is_reproducible() {
    let dataset = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    for model in ["a", "b", "c", "d", "e"] {
        let urdf = CABINET.replace("name=\"cabinet\"", &format!("name=\"{}\"", model));
        add_model(dataset.path(), "cabinet", model, &urdf, r#"{"min": [0, 0, 0], "max": [1, 1, 1]}"#);
    }

    let pick = || {
        let mut factory = factory(dataset.path(), scratch.path(), BranchPolicy::FirstChild);
        (0..4)
            .map(|_| {
                let (body, _) = factory
                    .build_interactive("cabinet", &ModelSelection::Random, None)
                    .unwrap();
                body.tree().unwrap().name.clone()
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(pick(), pick());
}

#[test]
fn scene_file_drives_construction() {
    let dataset = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    add_model(dataset.path(), "cabinet", "c1", CABINET, r#"{"min": [0, 0, 0], "max": [1, 1, 1]}"#);

    let scene = r#"
        <robot name="scene">
            <link name="world"/>
            <link name="obj_0" category="cabinet" model="c1" bounding_box="0.5 0.5 0.5"/>
            <link name="obj_1" category="cabinet" model="random"/>
        </robot>
    "#;
    let specs = scene_specs_from_xml(scene).unwrap();
    let mut factory = factory(dataset.path(), scratch.path(), BranchPolicy::EveryChild);
    let mut engine = HeadlessEngine::new();

    let objects = specs
        .iter()
        .map(|spec| factory.spawn(spec, &mut engine))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(objects.len(), 2);
    assert!(objects.iter().all(|o| o.is_loaded()));
    assert_eq!(engine.body_count(), 2);
}
