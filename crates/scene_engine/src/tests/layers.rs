//! Layer filtering during render-list traversal

use super::fixtures::{add_assets, add_camera_node, add_node, add_scene, build, drawn_nodes};
use crate::foundation::math::Vec3;
use crate::scene::{Database, EvaluateScene, RenderItem, VisualScene};

/// `A(bg) -> B`, `C(fg) -> D(bg)`, every node drawing a cube
fn layered(filter: &[&str]) -> Database {
    let mut db = Database::default();
    add_assets(&mut db);
    add_node(&mut db, "A", &["bg"], &["B"], true);
    add_node(&mut db, "B", &[], &[], true);
    add_node(&mut db, "C", &["fg"], &["D"], true);
    add_node(&mut db, "D", &["bg"], &[], true);
    add_camera_node(&mut db, "eye", Vec3::new(0.0, 0.0, 5.0), Vec3::zeros());

    let item = filter
        .iter()
        .fold(RenderItem::new("eye"), |item, layer| item.with_layer(*layer));
    add_scene(&mut db, "layers", &["eye", "A", "C"], item);
    db
}

#[test]
fn test_background_filter() {
    let db = layered(&["bg"]);
    let (list, cache) = build(&db, "layers");
    assert_eq!(drawn_nodes(&list, &cache, &db), vec!["A", "B"]);
}

#[test]
fn test_matched_ancestor_pulls_in_subtree() {
    let db = layered(&["fg"]);
    let (list, cache) = build(&db, "layers");
    assert_eq!(drawn_nodes(&list, &cache, &db), vec!["C", "D"]);
}

#[test]
fn test_empty_filter_draws_everything() {
    let db = layered(&[]);
    let (list, cache) = build(&db, "layers");
    assert_eq!(drawn_nodes(&list, &cache, &db), vec!["A", "B", "C", "D"]);
}

#[test]
fn test_untagged_node_passes_no_match_down() {
    let mut db = layered(&["fg"]);
    add_node(&mut db, "E", &[], &["F"], true);
    add_node(&mut db, "F", &["bg"], &[], true);
    db.edit_by_id::<VisualScene>("layers").unwrap().add_root("E");

    let (list, cache) = build(&db, "layers");
    assert_eq!(drawn_nodes(&list, &cache, &db), vec!["C", "D", "E"]);
}

#[test]
fn test_filter_change_rebuilds() {
    let mut db = layered(&["bg"]);
    let (mut list, mut cache) = build(&db, "layers");

    {
        let mut scene = db.edit_by_id::<VisualScene>("layers").unwrap();
        scene.clear_evaluations();
        scene.add_evaluation(
            EvaluateScene::new("main").with_render(RenderItem::new("eye").with_layer("fg")),
        );
    }
    assert_eq!(list.build(&db, &mut cache, "layers"), Ok(true));
    cache.update(&db, 640, 480);
    assert_eq!(drawn_nodes(&list, &cache, &db), vec!["C", "D"]);
}
