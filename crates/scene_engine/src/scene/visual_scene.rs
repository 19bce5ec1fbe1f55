//! Visual scenes and their evaluation recipes

use crate::foundation::collections::VisualSceneKey;
use crate::foundation::stamp::Versioned;

use super::library::{impl_entity, Edit, EntityKind};

/// Framebuffer clear performed before a render item draws
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FramebufferClear {
    /// Clear color, if the color buffer is cleared
    pub color: Option<[f32; 4]>,
    /// Clear depth, if the depth buffer is cleared
    pub depth: Option<f32>,
}

impl FramebufferClear {
    /// Clear both color and depth
    pub fn color_and_depth(color: [f32; 4], depth: f32) -> Self {
        Self { color: Some(color), depth: Some(depth) }
    }
}

/// One rendering of the scene from one camera
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderItem {
    /// Id of the node instancing the camera
    pub camera_node: String,
    /// Layer filter; empty means every layer
    pub layers: Vec<String>,
    /// Ids of nodes instancing the lights, in light index order
    pub lights: Vec<String>,
    /// Material used for every primitive set instead of the bound one
    pub material_override: Option<String>,
    /// Clear performed before drawing
    pub clear: Option<FramebufferClear>,
}

impl RenderItem {
    /// Render everything through the camera on `camera_node`
    pub fn new(camera_node: impl Into<String>) -> Self {
        Self {
            camera_node: camera_node.into(),
            ..Self::default()
        }
    }

    /// Restrict to a layer
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layers.push(layer.into());
        self
    }

    /// Bind the next light index to the light on `node`
    pub fn with_light(mut self, node: impl Into<String>) -> Self {
        self.lights.push(node.into());
        self
    }

    /// Override every material
    pub fn with_material_override(mut self, material: impl Into<String>) -> Self {
        self.material_override = Some(material.into());
        self
    }

    /// Clear before drawing
    pub fn with_clear(mut self, clear: FramebufferClear) -> Self {
        self.clear = Some(clear);
        self
    }
}

/// A named, switchable sequence of render items
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateScene {
    /// Scoped id
    pub sid: String,
    /// Disabled evaluations are skipped when building
    pub enabled: bool,
    /// Render items in order
    pub renders: Vec<RenderItem>,
}

impl EvaluateScene {
    /// Enabled evaluation without render items
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            enabled: true,
            renders: Vec::new(),
        }
    }

    /// Append a render item
    pub fn with_render(mut self, render: RenderItem) -> Self {
        self.renders.push(render);
        self
    }
}

/// A visual scene
#[derive(Debug)]
pub struct VisualScene {
    id: String,
    versions: Versioned,
    roots: Vec<String>,
    evaluations: Vec<EvaluateScene>,
}

impl VisualScene {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            versions: Versioned::default(),
            roots: Vec::new(),
            evaluations: Vec::new(),
        }
    }

    /// Root node ids
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Evaluation recipes
    pub fn evaluations(&self) -> &[EvaluateScene] {
        &self.evaluations
    }
}

impl_entity!(VisualScene, VisualSceneKey, EntityKind::VisualScene, visual_scenes);

impl Edit<'_, VisualScene> {
    /// Append a root node id
    pub fn add_root(&mut self, node: impl Into<String>) {
        self.entity_mut().roots.push(node.into());
        self.touch_structure();
    }

    /// Remove a root node id
    pub fn remove_root(&mut self, node: &str) -> bool {
        let roots = &mut self.entity_mut().roots;
        let Some(index) = roots.iter().position(|id| id == node) else {
            return false;
        };
        roots.remove(index);
        self.touch_structure();
        true
    }

    /// Append an evaluation
    pub fn add_evaluation(&mut self, evaluation: EvaluateScene) {
        self.entity_mut().evaluations.push(evaluation);
        self.touch_structure();
    }

    /// Enable or disable an evaluation
    pub fn set_evaluation_enabled(&mut self, sid: &str, enabled: bool) -> bool {
        let Some(evaluation) = self
            .entity_mut()
            .evaluations
            .iter_mut()
            .find(|evaluation| evaluation.sid == sid)
        else {
            return false;
        };
        if evaluation.enabled == enabled {
            return true;
        }
        evaluation.enabled = enabled;
        self.touch_structure();
        true
    }

    /// Drop every evaluation
    pub fn clear_evaluations(&mut self) {
        self.entity_mut().evaluations.clear();
        self.touch_structure();
    }
}
