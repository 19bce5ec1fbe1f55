//! Library bookkeeping seen through the database

use std::sync::Arc;

use crate::foundation::stamp::{Clock, SequenceClock, Stamp};
use crate::scene::{Database, DatabaseError, Entity, EntityKind, Geometry, Image, Node};

#[test]
fn test_removal_swaps_last_into_vacated_slot() {
    let mut db = Database::default();
    let a = db.add::<Image>("a").unwrap();
    db.add::<Image>("b").unwrap();
    let c = db.add::<Image>("c").unwrap();
    assert_eq!(db.images().index_of(a.key()), Some(0));
    assert_eq!(db.images().index_of(c.key()), Some(2));

    let removed = db.remove_by_id::<Image>("a").unwrap();
    assert_eq!(removed.id(), "a");

    let images = db.images();
    assert_eq!(images.len(), 2);
    assert_eq!(images.get_at(0).map(Image::id), Some("c"));
    assert_eq!(images.index_of(c.key()), Some(0));
    assert_eq!(images.get_at(1).map(Image::id), Some("b"));
    assert!(images.get_by_id("a").is_none());
    assert!(images.get_at(2).is_none());
    assert!(db.get::<Image>(a).is_none());
    assert_eq!(db.get::<Image>(c).map(Image::id), Some("c"));
}

#[test]
fn test_removing_last_needs_no_swap() {
    let mut db = Database::default();
    db.add::<Node>("a").unwrap();
    let b = db.add::<Node>("b").unwrap();
    db.remove::<Node>(b).unwrap();

    assert_eq!(db.nodes().len(), 1);
    assert_eq!(db.nodes().get_at(0).map(Node::id), Some("a"));
    assert_eq!(
        db.remove::<Node>(b).unwrap_err(),
        DatabaseError::StaleHandle { kind: EntityKind::Node }
    );
}

#[test]
fn test_id_is_reusable_after_removal() {
    let mut db = Database::default();
    let first = db.add::<Geometry>("mesh").unwrap();
    db.remove::<Geometry>(first).unwrap();
    let second = db.add::<Geometry>("mesh").unwrap();

    assert_ne!(first, second);
    assert!(db.get::<Geometry>(first).is_none());
    assert_eq!(db.lookup::<Geometry>("mesh").map(|(handle, _)| handle), Some(second));
}

#[test]
fn test_stamps_follow_call_order_across_libraries() {
    let clock = Arc::new(SequenceClock::new());
    let mut db = Database::new(clock.clone());

    let mut seen = Vec::new();
    for id in ["n0", "n1", "n2"] {
        let node = db.add::<Node>(id).unwrap();
        seen.push(db.versions_of::<Node>(node).unwrap().structure_changed());
        let image = db.add::<Image>(id).unwrap();
        db.edit::<Image>(image).unwrap().set_size(4, 4);
        seen.push(db.versions_of::<Image>(image).unwrap().value_changed());
    }
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(seen.iter().all(|stamp| stamp.is_valid()));
    assert_eq!(db.versions().value_changed().value() + 1, clock.peek());
    assert!(Stamp::INVALID < seen[0]);
    assert!(clock.next() > seen[seen.len() - 1].value());
}

#[test]
fn test_value_edit_leaves_structure_alone() {
    let mut db = Database::default();
    let image = db.add::<Image>("tex").unwrap();
    let library_structure = db.images().versions().structure_changed();
    let database_structure = db.versions().structure_changed();

    db.edit::<Image>(image).unwrap().touch_value();

    assert_eq!(db.images().versions().structure_changed(), library_structure);
    assert_eq!(db.versions().structure_changed(), database_structure);
    assert!(db.versions().value_changed() > database_structure);
    assert_eq!(db.images().versions().value_changed(), db.versions().value_changed());
}
