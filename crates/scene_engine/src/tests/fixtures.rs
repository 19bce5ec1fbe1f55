//! Shared scene builders for the scenario tests

use crate::core::config::PipelineConfig;
use crate::foundation::math::Vec3;
use crate::render::{RenderAction, RenderList, TransformCache};
use crate::scene::{
    Aabb, BufferContents, Camera, Database, Effect, Entity, EvaluateScene, Geometry,
    InstanceGeometry, Material, Node, NodeInstance, Pass, PrimitiveSet, PrimitiveType, RenderItem,
    RuntimeSemantic, SourceBuffer, Technique, TransformOp, UniformDecl, ValueType, VertexInput,
    VisualScene, POSITION,
};

/// Database holding a unit cube geometry, a flat effect and material, and a
/// camera entity, but no nodes
pub(crate) fn assets() -> Database {
    let mut db = Database::default();
    add_assets(&mut db);
    db
}

/// Add the cube, effect, material and camera to `db`
pub(crate) fn add_assets(db: &mut Database) {
    let corners: Vec<f32> = [
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ]
    .into_iter()
    .flatten()
    .collect();
    let positions = db.add::<SourceBuffer>("cube-positions").unwrap();
    db.edit::<SourceBuffer>(positions)
        .unwrap()
        .set_contents(BufferContents::Float(corners));
    let indices = db.add::<SourceBuffer>("cube-indices").unwrap();
    db.edit::<SourceBuffer>(indices).unwrap().set_contents(BufferContents::UInt(vec![
        0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4, 0, 4, 7, 7, 3, 0, 1, 5, 6, 6, 2, 1, 3, 2, 6, 6, 7, 3, 0, 1,
        5, 5, 4, 0,
    ]));

    let cube = db.add::<Geometry>("cube").unwrap();
    {
        let mut geometry = db.edit::<Geometry>(cube).unwrap();
        geometry.add_input(VertexInput::new(POSITION, "cube-positions", 3));
        geometry.add_primitive_set(
            PrimitiveSet::new(PrimitiveType::Triangles, 36)
                .with_material_symbol("surface")
                .with_indices("cube-indices", 0),
        );
    }
    let bounds = db.refresh_bounding_box(cube).unwrap();
    assert_eq!(
        bounds,
        Some(Aabb::from_center_extents(Vec3::zeros(), Vec3::new(0.5, 0.5, 0.5)))
    );

    let effect = db.add::<Effect>("flat").unwrap();
    db.edit::<Effect>(effect).unwrap().add_technique(
        Technique::new("default").with_pass(
            Pass::new("main")
                .with_attribute("a_position", POSITION)
                .with_uniform(
                    UniformDecl::new("u_mvp", ValueType::Mat4).with_semantic(RuntimeSemantic::ClipFromObject),
                ),
        ),
    );
    let material = db.add::<Material>("grey").unwrap();
    db.edit::<Material>(material).unwrap().set_effect("flat");

    db.add::<Camera>("lens").unwrap();
}

/// Add a node drawing the cube (when `draws`) with the given layers and children
pub(crate) fn add_node(db: &mut Database, id: &str, layers: &[&str], children: &[&str], draws: bool) {
    let handle = db.add::<Node>(id).unwrap();
    let mut node = db.edit::<Node>(handle).unwrap();
    for layer in layers {
        node.add_layer(*layer);
    }
    for child in children {
        node.add_child(*child);
    }
    if draws {
        node.add_instance(NodeInstance::Geometry(
            InstanceGeometry::new("cube").with_binding("surface", "grey"),
        ));
    }
}

/// Add a node carrying the camera, looking from `eye` at `target`
pub(crate) fn add_camera_node(db: &mut Database, id: &str, eye: Vec3, target: Vec3) {
    let handle = db.add::<Node>(id).unwrap();
    let mut node = db.edit::<Node>(handle).unwrap();
    node.add_transform(TransformOp::LookAt { eye, target, up: Vec3::y() });
    node.add_instance(NodeInstance::camera("lens"));
}

/// Add a visual scene with one evaluation holding `item`
pub(crate) fn add_scene(db: &mut Database, id: &str, roots: &[&str], item: RenderItem) {
    let handle = db.add::<VisualScene>(id).unwrap();
    let mut scene = db.edit::<VisualScene>(handle).unwrap();
    for root in roots {
        scene.add_root(*root);
    }
    scene.add_evaluation(EvaluateScene::new("main").with_render(item));
}

/// Build `scene` and update the cache once
pub(crate) fn build(db: &Database, scene: &str) -> (RenderList, TransformCache) {
    let config = PipelineConfig::default();
    let mut cache = TransformCache::new(config.cache.clone());
    let mut list = RenderList::new(&config);
    list.build(db, &mut cache, scene).unwrap();
    cache.update(db, 640, 480);
    (list, cache)
}

/// Ids of the nodes whose geometry is drawn, in draw order
pub(crate) fn drawn_nodes(list: &RenderList, cache: &TransformCache, db: &Database) -> Vec<String> {
    let mut local = None;
    let mut drawn = Vec::new();
    for action in list {
        match action {
            RenderAction::SetLocalCoordSys(id) => local = Some(*id),
            action if action.is_draw() => {
                let node = local
                    .and_then(|id| cache.local(id))
                    .and_then(|entry| entry.path().last())
                    .and_then(|handle| db.get::<Node>(handle))
                    .map(|node| node.id().to_string())
                    .unwrap();
                drawn.push(node);
            }
            _ => {}
        }
    }
    drawn
}
