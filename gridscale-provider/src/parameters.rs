//! Typed values of PaaS service parameters
//!
//! Parameters are configured as `{param, value, type}` blocks where `value`
//! is always a string and `type` names the primitive the API expects. The
//! API returns plain JSON values, which are turned back into the same
//! string/type pair on read.

use std::fmt;
use std::str::FromStr;

use serde_json::{Number, Value as Json};
use thiserror::Error;

/// Primitive type tags accepted in parameter blocks
pub const SUPPORTED_PRIM_TYPES: &[&str] = &["bool", "float", "int", "string"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Float,
    Int,
    String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error(
        "{0} is not a valid primitive type. Valid primitive types are: {types}",
        types = SUPPORTED_PRIM_TYPES.join(",")
    )]
    UnknownType(String),

    #[error("type mismatch: '{value}' is not a valid {expected}")]
    TypeMismatch { value: String, expected: ParamType },

    #[error("unsupported parameter value {0}")]
    UnsupportedValue(Json),
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Bool => "bool",
            ParamType::Float => "float",
            ParamType::Int => "int",
            ParamType::String => "string",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(ParamType::Bool),
            "float" => Ok(ParamType::Float),
            "int" => Ok(ParamType::Int),
            "string" => Ok(ParamType::String),
            other => Err(ParameterError::UnknownType(other.to_string())),
        }
    }
}

/// Type tag of a value returned by the API
///
/// Numbers without a fractional part are `int`.
pub fn type_of(value: &Json) -> Result<ParamType, ParameterError> {
    match value {
        Json::Bool(_) => Ok(ParamType::Bool),
        Json::Number(n) if n.is_i64() || n.is_u64() => Ok(ParamType::Int),
        Json::Number(_) => Ok(ParamType::Float),
        Json::String(_) => Ok(ParamType::String),
        other => Err(ParameterError::UnsupportedValue(other.clone())),
    }
}

/// String form of an API value of the given type
pub fn value_to_string(param_type: ParamType, value: &Json) -> Result<String, ParameterError> {
    let s = match (param_type, value) {
        (ParamType::Bool, Json::Bool(b)) => b.to_string(),
        (ParamType::Int, Json::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        (ParamType::Float, Json::Number(n)) => match n.as_f64() {
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        (ParamType::String, Json::String(s)) => s.clone(),
        (expected, other) => {
            return Err(ParameterError::TypeMismatch {
                value: other.to_string(),
                expected,
            });
        }
    };
    Ok(s)
}

/// Parse a configured string into a JSON value of the given type
pub fn string_to_value(param_type: ParamType, s: &str) -> Result<Json, ParameterError> {
    let mismatch = || ParameterError::TypeMismatch {
        value: s.to_string(),
        expected: param_type,
    };
    match param_type {
        ParamType::Bool => s.parse::<bool>().map(Json::Bool).map_err(|_| mismatch()),
        ParamType::Int => s
            .parse::<i64>()
            .map(|n| Json::Number(n.into()))
            .map_err(|_| mismatch()),
        ParamType::Float => s
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Json::Number)
            .ok_or_else(mismatch),
        ParamType::String => Ok(Json::String(s.to_string())),
    }
}
