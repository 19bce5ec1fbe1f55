//! Runtime semantics
//!
//! Values a shader may ask for that are not stored anywhere in the database
//! but derived per frame from the camera, the lights and the node path of the
//! object being drawn. Effects name them by string; the transform cache
//! computes them.

use std::fmt;
use std::str::FromStr;

use super::value::ValueType;

/// A value supplied by the renderer rather than stored as data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeSemantic {
    /// Object space to world space (model matrix)
    WorldFromObject,
    /// World space to object space
    ObjectFromWorld,
    /// World space to eye space (view matrix)
    EyeFromWorld,
    /// Eye space to world space
    WorldFromEye,
    /// Eye space to clip space (projection matrix)
    ClipFromEye,
    /// Clip space to eye space
    EyeFromClip,
    /// Object space to eye space (modelview matrix)
    EyeFromObject,
    /// Eye space to object space
    ObjectFromEye,
    /// Object space to clip space (modelview-projection matrix)
    ClipFromObject,
    /// Clip space to object space
    ObjectFromClip,
    /// World space to clip space
    ClipFromWorld,
    /// Inverse-transpose of the modelview's upper 3x3
    NormalMatrix,
    /// Viewport width and height in pixels
    FramebufferSize,
    /// Position of light `i` in eye space (w = 0 for directional lights)
    LightPositionEye(u8),
    /// Direction light `i` shines in, in eye space
    LightDirectionEye(u8),
    /// Color of light `i`
    LightColor(u8),
    /// Object space to the eye space of light `i`
    LightEyeFromObject(u8),
}

impl RuntimeSemantic {
    /// Type of the value this semantic produces
    pub fn value_type(self) -> ValueType {
        match self {
            Self::WorldFromObject
            | Self::ObjectFromWorld
            | Self::EyeFromWorld
            | Self::WorldFromEye
            | Self::ClipFromEye
            | Self::EyeFromClip
            | Self::EyeFromObject
            | Self::ObjectFromEye
            | Self::ClipFromObject
            | Self::ObjectFromClip
            | Self::ClipFromWorld
            | Self::LightEyeFromObject(_) => ValueType::Mat4,
            Self::NormalMatrix => ValueType::Mat3,
            Self::FramebufferSize => ValueType::Vec2,
            Self::LightPositionEye(_) => ValueType::Vec4,
            Self::LightDirectionEye(_) | Self::LightColor(_) => ValueType::Vec3,
        }
    }

    /// Whether the value depends on the object being drawn
    pub fn depends_on_object(self) -> bool {
        matches!(
            self,
            Self::WorldFromObject
                | Self::ObjectFromWorld
                | Self::EyeFromObject
                | Self::ObjectFromEye
                | Self::ClipFromObject
                | Self::ObjectFromClip
                | Self::NormalMatrix
                | Self::LightEyeFromObject(_)
        )
    }
}

impl fmt::Display for RuntimeSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorldFromObject => f.write_str("WORLD_FROM_OBJECT"),
            Self::ObjectFromWorld => f.write_str("OBJECT_FROM_WORLD"),
            Self::EyeFromWorld => f.write_str("EYE_FROM_WORLD"),
            Self::WorldFromEye => f.write_str("WORLD_FROM_EYE"),
            Self::ClipFromEye => f.write_str("CLIP_FROM_EYE"),
            Self::EyeFromClip => f.write_str("EYE_FROM_CLIP"),
            Self::EyeFromObject => f.write_str("EYE_FROM_OBJECT"),
            Self::ObjectFromEye => f.write_str("OBJECT_FROM_EYE"),
            Self::ClipFromObject => f.write_str("CLIP_FROM_OBJECT"),
            Self::ObjectFromClip => f.write_str("OBJECT_FROM_CLIP"),
            Self::ClipFromWorld => f.write_str("CLIP_FROM_WORLD"),
            Self::NormalMatrix => f.write_str("NORMAL_MATRIX"),
            Self::FramebufferSize => f.write_str("FRAMEBUFFER_SIZE"),
            Self::LightPositionEye(i) => write!(f, "LIGHT{i}_POSITION_EYE"),
            Self::LightDirectionEye(i) => write!(f, "LIGHT{i}_DIRECTION_EYE"),
            Self::LightColor(i) => write!(f, "LIGHT{i}_COLOR"),
            Self::LightEyeFromObject(i) => write!(f, "LIGHT{i}_EYE_FROM_OBJECT"),
        }
    }
}

/// Error returned when a semantic name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown runtime semantic '{0}'")]
pub struct UnknownSemantic(pub String);

impl FromStr for RuntimeSemantic {
    type Err = UnknownSemantic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("RUNTIME_").unwrap_or(s);
        let fixed = match name {
            "WORLD_FROM_OBJECT" | "MODEL_MATRIX" => Some(Self::WorldFromObject),
            "OBJECT_FROM_WORLD" => Some(Self::ObjectFromWorld),
            "EYE_FROM_WORLD" | "VIEW_MATRIX" => Some(Self::EyeFromWorld),
            "WORLD_FROM_EYE" => Some(Self::WorldFromEye),
            "CLIP_FROM_EYE" | "PROJECTION_MATRIX" => Some(Self::ClipFromEye),
            "EYE_FROM_CLIP" => Some(Self::EyeFromClip),
            "EYE_FROM_OBJECT" | "MODELVIEW_MATRIX" => Some(Self::EyeFromObject),
            "OBJECT_FROM_EYE" => Some(Self::ObjectFromEye),
            "CLIP_FROM_OBJECT" | "MODELVIEW_PROJECTION_MATRIX" => Some(Self::ClipFromObject),
            "OBJECT_FROM_CLIP" => Some(Self::ObjectFromClip),
            "CLIP_FROM_WORLD" => Some(Self::ClipFromWorld),
            "NORMAL_MATRIX" => Some(Self::NormalMatrix),
            "FRAMEBUFFER_SIZE" => Some(Self::FramebufferSize),
            _ => None,
        };
        if let Some(semantic) = fixed {
            return Ok(semantic);
        }

        // LIGHT<i>_<suffix>
        let unknown = || UnknownSemantic(s.to_string());
        let rest = name.strip_prefix("LIGHT").ok_or_else(unknown)?;
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let index: u8 = rest[..digits].parse().map_err(|_| unknown())?;
        match &rest[digits..] {
            "_POSITION_EYE" => Ok(Self::LightPositionEye(index)),
            "_DIRECTION_EYE" => Ok(Self::LightDirectionEye(index)),
            "_COLOR" => Ok(Self::LightColor(index)),
            "_EYE_FROM_OBJECT" => Ok(Self::LightEyeFromObject(index)),
            _ => Err(unknown()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parses_back() {
        let all = [
            RuntimeSemantic::WorldFromObject,
            RuntimeSemantic::ClipFromObject,
            RuntimeSemantic::NormalMatrix,
            RuntimeSemantic::FramebufferSize,
            RuntimeSemantic::LightPositionEye(0),
            RuntimeSemantic::LightColor(12),
            RuntimeSemantic::LightEyeFromObject(3),
        ];
        for semantic in all {
            assert_eq!(semantic.to_string().parse::<RuntimeSemantic>(), Ok(semantic));
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("RUNTIME_MODELVIEW_PROJECTION_MATRIX".parse::<RuntimeSemantic>(), Ok(RuntimeSemantic::ClipFromObject));
        assert_eq!("PROJECTION_MATRIX".parse::<RuntimeSemantic>(), Ok(RuntimeSemantic::ClipFromEye));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("LIGHT_COLOR".parse::<RuntimeSemantic>().is_err());
        assert!("LIGHT999_COLOR".parse::<RuntimeSemantic>().is_err());
        assert!("LIGHT1_SHADOW".parse::<RuntimeSemantic>().is_err());
        assert!("FOO".parse::<RuntimeSemantic>().is_err());
    }

    #[test]
    fn test_value_types() {
        assert_eq!(RuntimeSemantic::NormalMatrix.value_type(), ValueType::Mat3);
        assert_eq!(RuntimeSemantic::LightColor(0).value_type(), ValueType::Vec3);
        assert!(RuntimeSemantic::ClipFromObject.depends_on_object());
        assert!(!RuntimeSemantic::ClipFromEye.depends_on_object());
    }
}
