//! Scene dump tool
//!
//! Builds a small turntable scene, compiles it into a render list and steps a
//! few frames, logging the action sequence and the runtime values a backend
//! would upload. Pass a `.toml` or `.ron` pipeline config as the first
//! argument to override the defaults.

use scene_engine::foundation::logging;
use scene_engine::prelude::*;
use scene_engine::render::UniformBinding;
use scene_engine::scene::{
    BufferContents, EvaluateScene, FramebufferClear, InstanceGeometry, LightKind, NodeInstance,
    ParamValue, Pass, PixelOps, PrimitiveSet, PrimitiveType, Projection, RenderItem,
    ShaderStage, Technique, TransformOp, UniformDecl, VertexInput, NORMAL, POSITION,
};
use thiserror::Error;

const SCENE: &str = "turntable";
const FRAMES: u32 = 4;

#[derive(Error, Debug)]
enum DumpError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("scene error: {0}")]
    Database(#[from] DatabaseError),
    #[error("render list error: {0}")]
    RenderList(#[from] RenderListError),
}

fn main() {
    if let Err(e) = run() {
        // No-op when the configured logger is already installed
        logging::init();
        log::error!("scene_dump failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), DumpError> {
    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::load_from_file(&path)?,
        None => PipelineConfig::default(),
    };
    logging::init_with_level(&config.logging);
    config.validate()?;
    log::info!("Using pipeline config: {:?}", config);

    let mut database = Database::default();
    populate(&mut database)?;

    let mut cache = TransformCache::new(config.cache.clone());
    let mut list = RenderList::new(&config);

    for frame in 0..FRAMES {
        let angle = 30.0 * frame as f32;
        database
            .edit_by_id::<Node>("turntable")?
            .set_transform(0, TransformOp::Rotate { axis: Vec3::y(), angle });

        let rebuilt = list.build(&database, &mut cache, SCENE)?;
        cache.update(&database, 1280, 720);

        log::info!(
            "Frame {}: {:?}, {} actions, {} visible draws, {} recomputed so far",
            frame,
            list.last_outcome(),
            list.len(),
            list.visible_draws(&cache),
            cache.stats().total_computed()
        );
        if rebuilt {
            for issue in list.diagnostics() {
                log::warn!("  {}", issue);
            }
            for (index, action) in list.iter().enumerate() {
                log::info!("  [{:2}] {}", index, action);
            }
        }
        dump_uniforms(&list, &database, &cache);
    }
    Ok(())
}

fn dump_uniforms(list: &RenderList, database: &Database, cache: &TransformCache) {
    let bindings = list.iter().filter_map(|action| match action {
        RenderAction::SetUniforms(uniforms) => Some(uniforms),
        _ => None,
    });
    for binding in bindings.flatten() {
        log_uniform(binding, database, cache);
    }
}

fn log_uniform(binding: &UniformBinding, database: &Database, cache: &TransformCache) {
    match binding.fetch(database, cache) {
        Some(value) => log::debug!(
            "  {} {} = {:?} ({} bytes)",
            binding.value_type,
            binding.symbol,
            value,
            value.to_bytes().len()
        ),
        None => log::warn!("  {} has no value yet", binding.symbol),
    }
}

/// A lit cube on a turntable, a directional light and a camera
fn populate(db: &mut Database) -> Result<(), DatabaseError> {
    let positions: Vec<f32> = [
        [-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0],
        [-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0],
    ]
    .into_iter()
    .flatten()
    .collect();
    let normals: Vec<f32> = positions.iter().map(|p| p / 3.0_f32.sqrt()).collect();
    let indices = vec![
        0, 1, 2, 2, 3, 0, 5, 4, 7, 7, 6, 5, 4, 0, 3, 3, 7, 4, 1, 5, 6, 6, 2, 1, 3, 2, 6, 6, 7, 3, 4, 5,
        1, 1, 0, 4,
    ];

    let buffer = db.add::<SourceBuffer>("cube-positions")?;
    db.edit::<SourceBuffer>(buffer)?.set_contents(BufferContents::Float(positions));
    let buffer = db.add::<SourceBuffer>("cube-normals")?;
    db.edit::<SourceBuffer>(buffer)?.set_contents(BufferContents::Float(normals));
    let buffer = db.add::<SourceBuffer>("cube-indices")?;
    db.edit::<SourceBuffer>(buffer)?.set_contents(BufferContents::UInt(indices));

    let cube = db.add::<Geometry>("cube")?;
    {
        let mut geometry = db.edit::<Geometry>(cube)?;
        geometry.add_input(VertexInput::new(POSITION, "cube-positions", 3));
        geometry.add_input(VertexInput::new(NORMAL, "cube-normals", 3));
        geometry.add_primitive_set(
            PrimitiveSet::new(PrimitiveType::Triangles, 36)
                .with_material_symbol("surface")
                .with_indices("cube-indices", 0),
        );
    }
    db.refresh_bounding_box(cube)?;

    let effect = db.add::<Effect>("lambert")?;
    {
        let mut effect = db.edit::<Effect>(effect)?;
        effect.set_param("diffuse", ParamValue::Value(Value::Vec3(Vec3::new(0.8, 0.7, 0.5))));
        effect.add_technique(
            Technique::new("default").with_pass(
                Pass::new("main")
                    .with_shader(ShaderStage::Vertex, "// lambert.vert")
                    .with_shader(ShaderStage::Fragment, "// lambert.frag")
                    .with_attribute("a_position", POSITION)
                    .with_attribute("a_normal", NORMAL)
                    .with_uniform(
                        UniformDecl::new("u_mvp", ValueType::Mat4)
                            .with_semantic(RuntimeSemantic::ClipFromObject),
                    )
                    .with_uniform(
                        UniformDecl::new("u_normal_matrix", ValueType::Mat3)
                            .with_semantic(RuntimeSemantic::NormalMatrix),
                    )
                    .with_uniform(
                        UniformDecl::new("u_light_dir", ValueType::Vec3)
                            .with_semantic(RuntimeSemantic::LightDirectionEye(0)),
                    )
                    .with_uniform(UniformDecl::new("u_diffuse", ValueType::Vec3).with_param("diffuse"))
                    .with_pixel_ops(PixelOps::DEPTH_TEST | PixelOps::DEPTH_WRITE),
            ),
        );
    }
    let material = db.add::<Material>("brass")?;
    db.edit::<Material>(material)?.set_effect("lambert");

    let camera = db.add::<Camera>("lens")?;
    db.edit::<Camera>(camera)?.set_projection(Projection::perspective_yfov(45.0));
    let light = db.add::<Light>("sun")?;
    {
        let mut light = db.edit::<Light>(light)?;
        light.set_kind(LightKind::Directional);
        light.set_color(Vec3::new(1.0, 0.95, 0.9));
    }

    let node = db.add::<Node>("eye")?;
    {
        let mut node = db.edit::<Node>(node)?;
        node.add_transform(TransformOp::LookAt {
            eye: Vec3::new(4.0, 3.0, 6.0),
            target: Vec3::zeros(),
            up: Vec3::y(),
        });
        node.add_instance(NodeInstance::camera("lens"));
    }
    let node = db.add::<Node>("sun-node")?;
    {
        let mut node = db.edit::<Node>(node)?;
        node.add_transform(TransformOp::Rotate { axis: Vec3::x(), angle: -45.0 });
        node.add_instance(NodeInstance::light("sun"));
    }
    let node = db.add::<Node>("turntable")?;
    {
        let mut node = db.edit::<Node>(node)?;
        node.add_transform(TransformOp::Rotate { axis: Vec3::y(), angle: 0.0 });
        node.add_instance(NodeInstance::Geometry(
            InstanceGeometry::new("cube").with_binding("surface", "brass"),
        ));
    }
    let node = db.add::<Node>("world")?;
    {
        let mut node = db.edit::<Node>(node)?;
        node.add_child("eye");
        node.add_child("sun-node");
        node.add_child("turntable");
    }

    let scene = db.add::<VisualScene>(SCENE)?;
    {
        let mut scene = db.edit::<VisualScene>(scene)?;
        scene.add_root("world");
        scene.add_evaluation(
            EvaluateScene::new("beauty").with_render(
                RenderItem::new("eye")
                    .with_light("sun-node")
                    .with_clear(FramebufferClear::color_and_depth([0.1, 0.1, 0.12, 1.0], 1.0)),
            ),
        );
    }
    log::info!(
        "Populated database: {} nodes, {} geometries, {} effects",
        db.nodes().len(),
        db.geometries().len(),
        db.effects().len()
    );
    Ok(())
}
