//! Materials: an effect plus parameter overrides

use crate::foundation::collections::MaterialKey;
use crate::foundation::stamp::Versioned;

use super::library::{impl_entity, Edit, EntityKind};
use super::value::Value;

/// A material
#[derive(Debug)]
pub struct Material {
    id: String,
    versions: Versioned,
    effect: String,
    technique_hint: Option<String>,
    set_params: Vec<(String, Value)>,
}

impl Material {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            versions: Versioned::default(),
            effect: String::new(),
            technique_hint: None,
            set_params: Vec::new(),
        }
    }

    /// Id of the instanced effect
    pub fn effect(&self) -> &str {
        &self.effect
    }

    /// Preferred technique sid
    pub fn technique_hint(&self) -> Option<&str> {
        self.technique_hint.as_deref()
    }

    /// Parameter overrides in declaration order
    pub fn set_params(&self) -> &[(String, Value)] {
        &self.set_params
    }

    /// Override for one effect parameter
    pub fn param(&self, sid: &str) -> Option<&Value> {
        self.set_params
            .iter()
            .find(|(name, _)| name == sid)
            .map(|(_, value)| value)
    }
}

impl_entity!(Material, MaterialKey, EntityKind::Material, materials);

impl Edit<'_, Material> {
    /// Instance a different effect
    pub fn set_effect(&mut self, effect: impl Into<String>) {
        self.entity_mut().effect = effect.into();
        self.touch_structure();
    }

    /// Prefer a technique
    pub fn set_technique_hint(&mut self, hint: Option<String>) {
        self.entity_mut().technique_hint = hint;
        self.touch_structure();
    }

    /// Override a parameter
    ///
    /// Overwriting an override with a value of the same type is a value
    /// change; anything else is structural.
    pub fn set_param(&mut self, sid: impl Into<String>, value: Value) {
        let sid = sid.into();
        let params = &mut self.entity_mut().set_params;
        let structural = match params.iter_mut().find(|(name, _)| *name == sid) {
            Some((_, existing)) => {
                let retyped = existing.value_type() != value.value_type();
                *existing = value;
                retyped
            }
            None => {
                params.push((sid, value));
                true
            }
        };
        if structural {
            self.touch_structure();
        } else {
            self.touch_value();
        }
    }

    /// Drop an override
    pub fn remove_param(&mut self, sid: &str) -> bool {
        let params = &mut self.entity_mut().set_params;
        let before = params.len();
        params.retain(|(name, _)| name != sid);
        let removed = params.len() != before;
        if removed {
            self.touch_structure();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Database;

    #[test]
    fn test_param_override_roundtrip() {
        let mut db = Database::default();
        let handle = db.add::<Material>("red").unwrap();
        {
            let mut material = db.edit::<Material>(handle).unwrap();
            material.set_effect("phong-fx");
            material.set_technique_hint(Some("phong".to_string()));
            material.set_param("shininess", Value::Float(12.0));
        }
        let structure = db.versions().structure_changed();
        db.edit::<Material>(handle).unwrap().set_param("shininess", Value::Float(30.0));
        assert_eq!(db.versions().structure_changed(), structure);

        let material = db.get::<Material>(handle).unwrap();
        assert_eq!(material.effect(), "phong-fx");
        assert_eq!(material.technique_hint(), Some("phong"));
        assert_eq!(material.param("shininess"), Some(&Value::Float(30.0)));
        assert_eq!(material.param("missing"), None);
    }
}
