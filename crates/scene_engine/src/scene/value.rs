//! Typed parameter values
//!
//! The closed set of values a uniform, an effect parameter or a runtime
//! semantic can carry.

use std::fmt;
use std::str::FromStr;

use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Declared type of a shader uniform or parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int,
    /// Single float
    Float,
    /// Two floats
    Vec2,
    /// Three floats
    Vec3,
    /// Four floats
    Vec4,
    /// 3x3 float matrix
    Mat3,
    /// 4x4 float matrix
    Mat4,
}

impl ValueType {
    /// GLSL spelling of this type
    pub fn glsl_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// Error returned when a type name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value type '{0}'")]
pub struct UnknownValueType(pub String);

impl FromStr for ValueType {
    type Err = UnknownValueType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // COLLADA spells these float3, float4x4, ...; GLSL spells them vec3, mat4
        match s {
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "vec2" | "float2" => Ok(Self::Vec2),
            "vec3" | "float3" => Ok(Self::Vec3),
            "vec4" | "float4" => Ok(Self::Vec4),
            "mat3" | "float3x3" => Ok(Self::Mat3),
            "mat4" | "float4x4" => Ok(Self::Mat4),
            other => Err(UnknownValueType(other.to_string())),
        }
    }
}

/// A concrete value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int(i32),
    /// Single float
    Float(f32),
    /// Two floats
    Vec2(Vec2),
    /// Three floats
    Vec3(Vec3),
    /// Four floats
    Vec4(Vec4),
    /// 3x3 float matrix (column-major)
    Mat3(Mat3),
    /// 4x4 float matrix (column-major)
    Mat4(Mat4),
}

impl Value {
    /// Type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Vec2(_) => ValueType::Vec2,
            Self::Vec3(_) => ValueType::Vec3,
            Self::Vec4(_) => ValueType::Vec4,
            Self::Mat3(_) => ValueType::Mat3,
            Self::Mat4(_) => ValueType::Mat4,
        }
    }

    /// Zero / identity value of a type
    pub fn default_for(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Bool => Self::Bool(false),
            ValueType::Int => Self::Int(0),
            ValueType::Float => Self::Float(0.0),
            ValueType::Vec2 => Self::Vec2(Vec2::zeros()),
            ValueType::Vec3 => Self::Vec3(Vec3::zeros()),
            ValueType::Vec4 => Self::Vec4(Vec4::zeros()),
            ValueType::Mat3 => Self::Mat3(Mat3::identity()),
            ValueType::Mat4 => Self::Mat4(Mat4::identity()),
        }
    }

    /// Boolean payload, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// 4x4 matrix payload, if this is one
    pub fn as_mat4(&self) -> Option<&Mat4> {
        match self {
            Self::Mat4(value) => Some(value),
            _ => None,
        }
    }

    /// Native-endian bytes laid out the way a std140-free uniform upload expects
    ///
    /// Booleans are widened to a 32-bit integer; matrices are column-major.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bool(value) => bytemuck::bytes_of(&i32::from(*value)).to_vec(),
            Self::Int(value) => bytemuck::bytes_of(value).to_vec(),
            Self::Float(value) => bytemuck::bytes_of(value).to_vec(),
            Self::Vec2(value) => bytemuck::cast_slice::<f32, u8>(value.as_slice()).to_vec(),
            Self::Vec3(value) => bytemuck::cast_slice::<f32, u8>(value.as_slice()).to_vec(),
            Self::Vec4(value) => bytemuck::cast_slice::<f32, u8>(value.as_slice()).to_vec(),
            Self::Mat3(value) => bytemuck::cast_slice::<f32, u8>(value.as_slice()).to_vec(),
            Self::Mat4(value) => bytemuck::cast_slice::<f32, u8>(value.as_slice()).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_parse() {
        assert_eq!("float4x4".parse::<ValueType>(), Ok(ValueType::Mat4));
        assert_eq!("vec3".parse::<ValueType>(), Ok(ValueType::Vec3));
        assert!("double".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_default_matches_type() {
        for value_type in [
            ValueType::Bool, ValueType::Int, ValueType::Float, ValueType::Vec2,
            ValueType::Vec3, ValueType::Vec4, ValueType::Mat3, ValueType::Mat4,
        ] {
            assert_eq!(Value::default_for(value_type).value_type(), value_type);
        }
    }

    #[test]
    fn test_byte_sizes() {
        assert_eq!(Value::Bool(true).to_bytes(), 1i32.to_ne_bytes().to_vec());
        assert_eq!(Value::Vec3(Vec3::new(1.0, 2.0, 3.0)).to_bytes().len(), 12);
        assert_eq!(Value::Mat4(Mat4::identity()).to_bytes().len(), 64);
    }

    #[test]
    fn test_matrix_bytes_are_column_major() {
        let matrix = Mat4::new_translation(&Vec3::new(5.0, 6.0, 7.0));
        let bytes = Value::Mat4(matrix).to_bytes();
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        assert_eq!(&floats[12..15], &[5.0, 6.0, 7.0]);
    }
}
