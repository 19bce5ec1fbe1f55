//! Light sources

use crate::foundation::collections::LightKey;
use crate::foundation::math::Vec3;
use crate::foundation::stamp::Versioned;

use super::library::{impl_entity, Edit, EntityKind};

/// Light type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightKind {
    /// Constant light from everywhere
    Ambient,
    /// Parallel light shining down the node's -Z axis
    #[default]
    Directional,
    /// Omnidirectional light at the node's origin
    Point,
    /// Cone of light down the node's -Z axis
    Spot,
}

/// Distance attenuation `1 / (constant + linear * d + quadratic * d^2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    /// Constant term
    pub constant: f32,
    /// Linear term
    pub linear: f32,
    /// Quadratic term
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self { constant: 1.0, linear: 0.0, quadratic: 0.0 }
    }
}

/// A light
#[derive(Debug)]
pub struct Light {
    id: String,
    versions: Versioned,
    kind: LightKind,
    color: Vec3,
    attenuation: Attenuation,
    falloff_angle: f32,
    falloff_exponent: f32,
}

impl Light {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            versions: Versioned::default(),
            kind: LightKind::default(),
            color: Vec3::new(1.0, 1.0, 1.0),
            attenuation: Attenuation::default(),
            falloff_angle: 180.0,
            falloff_exponent: 0.0,
        }
    }

    /// Light type
    pub fn kind(&self) -> LightKind {
        self.kind
    }

    /// Linear RGB color
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Distance attenuation (point and spot lights)
    pub fn attenuation(&self) -> Attenuation {
        self.attenuation
    }

    /// Spot cone angle in degrees
    pub fn falloff_angle(&self) -> f32 {
        self.falloff_angle
    }

    /// Spot cone falloff exponent
    pub fn falloff_exponent(&self) -> f32 {
        self.falloff_exponent
    }
}

impl_entity!(Light, LightKey, EntityKind::Light, lights);

impl Edit<'_, Light> {
    /// Change the light type
    pub fn set_kind(&mut self, kind: LightKind) {
        if self.kind == kind {
            return;
        }
        self.entity_mut().kind = kind;
        self.touch_structure();
    }

    /// Change the color
    pub fn set_color(&mut self, color: Vec3) {
        self.entity_mut().color = color;
        self.touch_value();
    }

    /// Change the attenuation
    pub fn set_attenuation(&mut self, attenuation: Attenuation) {
        self.entity_mut().attenuation = attenuation;
        self.touch_value();
    }

    /// Change the spot cone
    pub fn set_falloff(&mut self, angle: f32, exponent: f32) {
        let light = self.entity_mut();
        light.falloff_angle = angle;
        light.falloff_exponent = exponent;
        self.touch_value();
    }
}
