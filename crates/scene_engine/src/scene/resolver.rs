//! Reference resolution and node path search
//!
//! The resolver turns ids embedded in nodes and scenes into handles. Misses
//! are reported to a [`Diagnostics`] sink and returned as `None`; they never
//! abort resolution. Every lookup is also recorded as a [`Dependency`], which
//! lets a render list decide later whether resolving again could produce a
//! different answer.

use std::collections::{HashMap, HashSet};

use crate::foundation::collections::{GeometryKey, Handle, NodeKey};
use crate::foundation::diagnostics::{Diagnostics, Issue};
use crate::foundation::stamp::Stamp;

use super::camera::Camera;
use super::database::Database;
use super::effect::Effect;
use super::geometry::Geometry;
use super::image::Image;
use super::library::{Entity, EntityKind};
use super::light::Light;
use super::material::Material;
use super::node::{Instance, InstanceGeometry, Node, ResolvedTarget};
use super::source_buffer::SourceBuffer;
use super::visual_scene::VisualScene;

/// Default limit on node path length
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Chain of nodes from a scene root down to a target node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<Handle<NodeKey>>);

impl NodePath {
    /// Path of the given nodes, root first
    pub fn new(nodes: Vec<Handle<NodeKey>>) -> Self {
        Self(nodes)
    }

    /// Nodes, root first
    pub fn nodes(&self) -> &[Handle<NodeKey>] {
        &self.0
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no nodes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Root node
    pub fn first(&self) -> Option<Handle<NodeKey>> {
        self.0.first().copied()
    }

    /// Target node
    pub fn last(&self) -> Option<Handle<NodeKey>> {
        self.0.last().copied()
    }

    /// Whether a node is on the path
    pub fn contains(&self, node: Handle<NodeKey>) -> bool {
        self.0.contains(&node)
    }

    /// Copy of this path extended by one node
    pub fn child(&self, node: Handle<NodeKey>) -> Self {
        let mut nodes = Vec::with_capacity(self.0.len() + 1);
        nodes.extend_from_slice(&self.0);
        nodes.push(node);
        Self(nodes)
    }
}

/// Identity and structure stamp of what an id resolved to
type Probe = Option<(u64, Stamp)>;

/// One recorded lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    kind: EntityKind,
    id: String,
    seen: Probe,
}

impl Dependency {
    /// Library that was searched
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Id that was looked up
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the id resolved
    pub fn was_found(&self) -> bool {
        self.seen.is_some()
    }

    /// Whether looking the id up now would give a different entity, or the
    /// same entity with a newer structure
    pub fn changed(&self, database: &Database) -> bool {
        probe(database, self.kind, &self.id) != self.seen
    }
}

fn probe(database: &Database, kind: EntityKind, id: &str) -> Probe {
    match kind {
        EntityKind::SourceBuffer => probe_entity::<SourceBuffer>(database, id),
        EntityKind::Image => probe_entity::<Image>(database, id),
        EntityKind::Geometry => probe_entity::<Geometry>(database, id),
        EntityKind::Camera => probe_entity::<Camera>(database, id),
        EntityKind::Light => probe_entity::<Light>(database, id),
        EntityKind::Effect => probe_entity::<Effect>(database, id),
        EntityKind::Material => probe_entity::<Material>(database, id),
        EntityKind::Node => probe_entity::<Node>(database, id),
        EntityKind::VisualScene => probe_entity::<VisualScene>(database, id),
    }
}

fn probe_entity<T: Entity>(database: &Database, id: &str) -> Probe {
    database
        .lookup::<T>(id)
        .map(|(handle, entity)| (handle.identity(), entity.versions().structure_changed()))
}

/// Frame of the explicit depth-first search stack
struct Frame<'a> {
    node: Handle<NodeKey>,
    edges: Vec<&'a str>,
    next: usize,
    // Some edge below this frame was skipped for being on the path or too deep
    pruned: bool,
}

/// Resolves ids against a database chain
pub struct Resolver<'a> {
    database: &'a Database,
    diagnostics: &'a mut Diagnostics,
    max_depth: usize,
    dependencies: Vec<Dependency>,
    recorded: HashMap<(EntityKind, String), usize>,
    memo_hits: usize,
}

impl<'a> Resolver<'a> {
    /// Create a resolver reporting into `diagnostics`
    pub fn new(database: &'a Database, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            database,
            diagnostics,
            max_depth: DEFAULT_MAX_DEPTH,
            dependencies: Vec::new(),
            recorded: HashMap::new(),
            memo_hits: 0,
        }
    }

    /// Limit node paths to `max_depth` nodes
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        assert!(max_depth > 0, "node path depth limit must be at least 1");
        self.max_depth = max_depth;
        self
    }

    /// Node path depth limit
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Database being resolved against
    pub fn database(&self) -> &'a Database {
        self.database
    }

    /// Report a problem found by the caller
    pub fn report(&mut self, issue: Issue) {
        self.diagnostics.report(issue);
    }

    /// Lookups recorded so far, in first-lookup order
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Finish and hand back the recorded lookups
    pub fn into_dependencies(self) -> Vec<Dependency> {
        self.dependencies
    }

    /// Instance resolutions answered from an instance's memo
    pub fn memo_hits(&self) -> usize {
        self.memo_hits
    }

    /// Find an entity by id, reporting a miss once per id
    pub fn lookup<T: Entity>(&mut self, id: &str) -> Option<(Handle<T::Key>, &'a T)> {
        let found = self.database.lookup::<T>(id);
        let seen = found.map(|(handle, entity)| (handle.identity(), entity.versions().structure_changed()));
        let first_time = self.record(T::KIND, id, seen);
        if found.is_none() && first_time {
            self.diagnostics.report(Issue::UnresolvedReference {
                kind: T::KIND.name(),
                id: id.to_string(),
            });
        }
        found
    }

    /// Resolve a camera, light or node instance
    pub fn resolve_instance<T: Entity>(&mut self, instance: &Instance<T::Key>) -> Option<(Handle<T::Key>, &'a T)> {
        self.resolve_memo::<T>(instance.url(), instance.resolved())
    }

    /// Resolve a geometry instance
    pub fn resolve_geometry(&mut self, instance: &InstanceGeometry) -> Option<(Handle<GeometryKey>, &'a Geometry)> {
        self.resolve_memo::<Geometry>(instance.url(), instance.resolved())
    }

    fn resolve_memo<T: Entity>(&mut self, url: &str, memo: &ResolvedTarget<T::Key>) -> Option<(Handle<T::Key>, &'a T)> {
        let library_structure = self.database.library_versions::<T>().structure_changed();
        if let Some(handle) = memo.get(library_structure) {
            if let Some(entity) = self.database.get::<T>(handle) {
                self.memo_hits += 1;
                self.record(T::KIND, url, Some((handle.identity(), entity.versions().structure_changed())));
                return Some((handle, entity));
            }
        }

        let found = self.lookup::<T>(url);
        match found {
            Some((handle, _)) => memo.set(handle, library_structure),
            None => memo.clear(),
        }
        found
    }

    fn record(&mut self, kind: EntityKind, id: &str, seen: Probe) -> bool {
        if self.recorded.contains_key(&(kind, id.to_string())) {
            return false;
        }
        self.recorded.insert((kind, id.to_string()), self.dependencies.len());
        self.dependencies.push(Dependency { kind, id: id.to_string(), seen });
        true
    }

    /// Depth-first search for a path from `root` to `target`
    ///
    /// Follows child edges, then node-instance edges, in declaration order.
    /// A node already on the current path is never entered again, so
    /// instancing cycles terminate; paths are at most `max_depth` nodes long.
    pub fn find_node_path(&mut self, root: Handle<NodeKey>, target: Handle<NodeKey>) -> Option<NodePath> {
        let root_node = self.database.get::<Node>(root)?;
        if root == target {
            return Some(NodePath(vec![root]));
        }

        let mut stack = vec![Frame {
            node: root,
            edges: root_node.node_edges().collect(),
            next: 0,
            pruned: false,
        }];
        let mut on_path = HashSet::from([root]);
        // Nodes whose whole subtree was searched without pruning
        let mut exhausted: HashSet<Handle<NodeKey>> = HashSet::new();

        while let Some(frame) = stack.last_mut() {
            let Some(&edge) = frame.edges.get(frame.next) else {
                let done = stack.pop();
                if let Some(done) = done {
                    on_path.remove(&done.node);
                    if done.pruned {
                        if let Some(parent) = stack.last_mut() {
                            parent.pruned = true;
                        }
                    } else {
                        exhausted.insert(done.node);
                    }
                }
                continue;
            };
            frame.next += 1;

            let Some((child, node)) = self.lookup::<Node>(edge) else {
                continue;
            };
            if child == target {
                let mut nodes: Vec<_> = stack.iter().map(|frame| frame.node).collect();
                nodes.push(child);
                return Some(NodePath(nodes));
            }
            if exhausted.contains(&child) {
                continue;
            }
            if on_path.contains(&child) || stack.len() + 1 >= self.max_depth {
                log::trace!("Not descending into node '{}' while searching for a path", edge);
                if let Some(frame) = stack.last_mut() {
                    frame.pruned = true;
                }
                continue;
            }

            on_path.insert(child);
            stack.push(Frame {
                node: child,
                edges: node.node_edges().collect(),
                next: 0,
                pruned: false,
            });
        }
        None
    }

    /// Search every root of a visual scene for a path to `target`
    ///
    /// Reports [`Issue::NodePathNotFound`] when no root leads there.
    pub fn find_node_path_in_scene(&mut self, scene: &VisualScene, target: Handle<NodeKey>) -> Option<NodePath> {
        for root_id in scene.roots() {
            let Some((root, _)) = self.lookup::<Node>(root_id) else {
                continue;
            };
            if let Some(path) = self.find_node_path(root, target) {
                return Some(path);
            }
        }

        let target = self
            .database
            .get::<Node>(target)
            .map_or_else(|| "<stale node>".to_string(), |node| node.id().to_string());
        self.diagnostics.report(Issue::NodePathNotFound {
            scene: scene.id().to_string(),
            target,
        });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeInstance;

    fn graph(edges: &[(&str, &[&str])]) -> Database {
        let mut db = Database::default();
        for (id, _) in edges {
            db.add::<Node>(id).unwrap();
        }
        for (id, children) in edges {
            let mut node = db.edit_by_id::<Node>(id).unwrap();
            for child in *children {
                node.add_child(*child);
            }
        }
        db
    }

    fn handle(db: &Database, id: &str) -> Handle<NodeKey> {
        db.lookup::<Node>(id).unwrap().0
    }

    fn ids(db: &Database, path: &NodePath) -> Vec<String> {
        path.nodes()
            .iter()
            .map(|&node| db.get::<Node>(node).unwrap().id().to_string())
            .collect()
    }

    #[test]
    fn test_path_to_depth_three() {
        let db = graph(&[("r", &["a", "x"]), ("a", &["b"]), ("b", &["t"]), ("x", &[]), ("t", &[])]);
        let mut diagnostics = Diagnostics::new();
        let mut resolver = Resolver::new(&db, &mut diagnostics);

        let path = resolver.find_node_path(handle(&db, "r"), handle(&db, "t")).unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(ids(&db, &path), vec!["r", "a", "b", "t"]);
        assert_eq!(path.first(), Some(handle(&db, "r")));
        assert_eq!(path.last(), Some(handle(&db, "t")));
    }

    #[test]
    fn test_root_is_its_own_path() {
        let db = graph(&[("r", &[])]);
        let mut diagnostics = Diagnostics::new();
        let mut resolver = Resolver::new(&db, &mut diagnostics);
        let r = handle(&db, "r");
        assert_eq!(resolver.find_node_path(r, r), Some(NodePath::new(vec![r])));
    }

    #[test]
    fn test_unreachable_target() {
        let db = graph(&[("r", &["a"]), ("a", &[]), ("t", &[])]);
        let mut diagnostics = Diagnostics::new();
        let mut resolver = Resolver::new(&db, &mut diagnostics);
        assert_eq!(resolver.find_node_path(handle(&db, "r"), handle(&db, "t")), None);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_instancing_cycle_terminates() {
        let mut db = graph(&[("r", &["a"]), ("a", &["b"]), ("b", &[]), ("t", &[])]);
        // b instances a (cycle), a instances itself, and b finally instances t
        db.edit_by_id::<Node>("b").unwrap().add_instance(NodeInstance::node("a"));
        db.edit_by_id::<Node>("a").unwrap().add_instance(NodeInstance::node("a"));
        let mut diagnostics = Diagnostics::new();

        {
            let mut resolver = Resolver::new(&db, &mut diagnostics);
            assert_eq!(resolver.find_node_path(handle(&db, "r"), handle(&db, "t")), None);
        }

        db.edit_by_id::<Node>("b").unwrap().add_instance(NodeInstance::node("t"));
        let mut resolver = Resolver::new(&db, &mut diagnostics);
        let path = resolver.find_node_path(handle(&db, "r"), handle(&db, "t")).unwrap();
        assert_eq!(ids(&db, &path), vec!["r", "a", "b", "t"]);
    }

    #[test]
    fn test_depth_limit() {
        let db = graph(&[("r", &["a"]), ("a", &["b"]), ("b", &["t"]), ("t", &[])]);
        let mut diagnostics = Diagnostics::new();

        let mut resolver = Resolver::new(&db, &mut diagnostics).with_max_depth(3);
        assert_eq!(resolver.find_node_path(handle(&db, "r"), handle(&db, "t")), None);

        let mut resolver = Resolver::new(&db, &mut diagnostics).with_max_depth(4);
        assert!(resolver.find_node_path(handle(&db, "r"), handle(&db, "t")).is_some());
    }

    #[test]
    fn test_missing_child_reported_once() {
        let db = graph(&[("r", &["ghost", "a"]), ("a", &["ghost"]), ("t", &[])]);
        let mut diagnostics = Diagnostics::new();
        let mut resolver = Resolver::new(&db, &mut diagnostics);

        assert_eq!(resolver.find_node_path(handle(&db, "r"), handle(&db, "t")), None);
        let dependencies = resolver.into_dependencies();
        assert!(dependencies.iter().any(|dependency| dependency.id() == "ghost" && !dependency.was_found()));
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            &diagnostics.issues()[0],
            Issue::UnresolvedReference { kind: "node", id } if id == "ghost"
        ));
    }

    #[test]
    fn test_dependency_detects_structure_change() {
        let mut db = graph(&[("r", &[])]);
        let dependencies = {
            let mut diagnostics = Diagnostics::new();
            let mut resolver = Resolver::new(&db, &mut diagnostics);
            resolver.lookup::<Node>("r");
            resolver.lookup::<Camera>("later");
            resolver.into_dependencies()
        };
        assert!(dependencies.iter().all(|dependency| !dependency.changed(&db)));

        db.add::<Camera>("later").unwrap();
        assert!(!dependencies[0].changed(&db));
        assert!(dependencies[1].changed(&db));

        db.edit_by_id::<Node>("r").unwrap().add_child("x");
        assert!(dependencies[0].changed(&db));
    }

    #[test]
    fn test_instance_memo() {
        let mut db = graph(&[("r", &[]), ("shared", &[])]);
        db.edit_by_id::<Node>("r").unwrap().add_instance(NodeInstance::node("shared"));
        let mut diagnostics = Diagnostics::new();

        let mut resolver = Resolver::new(&db, &mut diagnostics);
        let root = db.lookup::<Node>("r").unwrap().1;
        let instance = root.instance_nodes().next().unwrap();
        let (first, _) = resolver.resolve_instance::<Node>(instance).unwrap();
        let (second, _) = resolver.resolve_instance::<Node>(instance).unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.memo_hits(), 1);
        assert!(instance.resolved().is_set());
    }
}
