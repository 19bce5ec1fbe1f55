//! Structured diagnostics for data-driven failures
//!
//! Dangling references, missing vertex inputs and uniform type mismatches are
//! problems in the scene data, not in the program. They are collected here
//! (and logged) while processing carries on with the affected item dropped.

use thiserror::Error;

/// A single recoverable problem found while resolving or building
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Issue {
    /// A symbolic reference did not match any entity in the database chain
    #[error("unresolved {kind} reference '{id}'")]
    UnresolvedReference {
        /// Library that was searched
        kind: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// No node path connects a scene root to a node the scene refers to
    #[error("no node path from visual scene '{scene}' to node '{target}'")]
    NodePathNotFound {
        /// Visual scene whose roots were searched
        scene: String,
        /// Target node id
        target: String,
    },

    /// A node that should carry an instance of some kind does not
    #[error("node '{node}' does not instance a {kind}")]
    MissingInstance {
        /// Node id
        node: String,
        /// Instance kind that was expected
        kind: &'static str,
    },

    /// A primitive set's material symbol has no binding on its instance
    #[error("no material bound to symbol '{symbol}' on geometry '{geometry}'")]
    UnboundMaterialSymbol {
        /// Geometry id
        geometry: String,
        /// Material symbol of the primitive set
        symbol: String,
    },

    /// A material's effect has no usable technique
    #[error("effect '{effect}' has no technique matching '{hint}'")]
    MissingTechnique {
        /// Effect id
        effect: String,
        /// Technique hint (empty when none was given)
        hint: String,
    },

    /// A pass attribute asks for a vertex semantic the geometry lacks
    #[error("geometry '{geometry}' has no '{semantic}' input for attribute '{symbol}'")]
    MissingVertexInput {
        /// Geometry id
        geometry: String,
        /// Shader attribute symbol
        symbol: String,
        /// Requested vertex semantic
        semantic: String,
    },

    /// A uniform's resolved value type differs from the declared shader type
    #[error("uniform '{symbol}' declared as {expected} but resolved to {found}")]
    TypeMismatch {
        /// Uniform symbol
        symbol: String,
        /// Type declared by the shader
        expected: String,
        /// Type of the resolved value
        found: String,
    },

    /// A uniform had no literal, no resolvable parameter and no runtime semantic
    #[error("uniform '{symbol}' has no resolvable source")]
    UnresolvedUniform {
        /// Uniform symbol
        symbol: String,
    },

    /// A node was instanced from inside its own subtree
    #[error("node instancing cycle through '{node}' skipped")]
    InstancingCycle {
        /// Node that closed the cycle
        node: String,
    },

    /// Traversal stopped because the node path exceeded the depth limit
    #[error("node path through '{node}' exceeds the maximum depth of {max_depth}")]
    PathTooDeep {
        /// Node at which traversal stopped
        node: String,
        /// Configured limit
        max_depth: usize,
    },

    /// A pass declares more samplers than there are texture units
    #[error("sampler '{symbol}' in pass '{pass}' dropped, only {limit} texture units")]
    SamplerUnitsExhausted {
        /// Pass sid
        pass: String,
        /// Dropped sampler symbol
        symbol: String,
        /// Configured unit count
        limit: u32,
    },

    /// Entity data is malformed (wrong buffer length, wrong element type, ...)
    #[error("invalid data in {kind} '{id}': {reason}")]
    InvalidData {
        /// Entity kind
        kind: &'static str,
        /// Entity id
        id: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Ordered collection of issues found during one resolve/build pass
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    issues: Vec<Issue>,
}

impl Diagnostics {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue and log it as a warning
    pub fn report(&mut self, issue: Issue) {
        log::warn!("{issue}");
        self.issues.push(issue);
    }

    /// All issues in the order they were reported
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Number of recorded issues
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Iterate over recorded issues
    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.issues.iter()
    }

    /// Drop all recorded issues
    pub fn clear(&mut self) {
        self.issues.clear();
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.iter()
    }
}
