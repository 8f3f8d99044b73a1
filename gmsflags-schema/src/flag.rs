use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error as ThisError;

/// Declared type of a Phenotype flag.
///
/// A flag row stores its value in exactly one of the typed value columns; the
/// column that is non-NULL is the flag's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    Bool,
    Int,
    Float,
    String,
    Extension,
}

impl FlagType {
    pub const ALL: [FlagType; 5] = [
        FlagType::Bool,
        FlagType::Int,
        FlagType::Float,
        FlagType::String,
        FlagType::Extension,
    ];

    /// Value column holding flags of this type in `Flags` and `FlagOverrides`.
    pub fn column(self) -> &'static str {
        match self {
            FlagType::Bool => "boolVal",
            FlagType::Int => "intVal",
            FlagType::Float => "floatVal",
            FlagType::String => "stringVal",
            FlagType::Extension => "extensionVal",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlagType::Bool => "bool",
            FlagType::Int => "int",
            FlagType::Float => "float",
            FlagType::String => "string",
            FlagType::Extension => "extension",
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagType {
    type Err = ParseFlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(FlagType::Bool),
            "int" | "integer" | "long" => Ok(FlagType::Int),
            "float" | "double" => Ok(FlagType::Float),
            "string" | "str" => Ok(FlagType::String),
            "extension" | "ext" => Ok(FlagType::Extension),
            other => Err(ParseFlagError::UnknownType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ParseFlagError {
    #[error("unknown flag type `{0}`")]
    UnknownType(String),

    #[error("`{value}` is not a valid {flag_type} value")]
    InvalidValue { flag_type: FlagType, value: String },
}

/// A typed flag value as stored in one of the phenotype value columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Serialized protobuf extension, base64 on the wire.
    Extension(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl FlagValue {
    pub fn flag_type(&self) -> FlagType {
        match self {
            FlagValue::Bool(_) => FlagType::Bool,
            FlagValue::Int(_) => FlagType::Int,
            FlagValue::Float(_) => FlagType::Float,
            FlagValue::String(_) => FlagType::String,
            FlagValue::Extension(_) => FlagType::Extension,
        }
    }

    /// Parses user input for a flag of the given type.
    ///
    /// Booleans accept `true`/`false` as well as the `1`/`0` form the
    /// database uses. Extensions are expected as base64.
    pub fn parse(flag_type: FlagType, raw: &str) -> Result<Self, ParseFlagError> {
        let invalid = || ParseFlagError::InvalidValue {
            flag_type,
            value: raw.to_string(),
        };
        let trimmed = raw.trim();
        match flag_type {
            FlagType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Ok(FlagValue::Bool(true)),
                "false" | "0" | "off" => Ok(FlagValue::Bool(false)),
                _ => Err(invalid()),
            },
            FlagType::Int => trimmed.parse().map(FlagValue::Int).map_err(|_| invalid()),
            FlagType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FlagValue::Float)
                .ok_or_else(invalid),
            FlagType::String => Ok(FlagValue::String(raw.to_string())),
            FlagType::Extension => STANDARD
                .decode(trimmed)
                .map(FlagValue::Extension)
                .map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(v) => write!(f, "{v}"),
            FlagValue::Int(v) => write!(f, "{v}"),
            FlagValue::Float(v) => write!(f, "{v}"),
            FlagValue::String(v) => f.write_str(v),
            FlagValue::Extension(v) => f.write_str(&STANDARD.encode(v)),
        }
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bool_accepts_database_and_human_forms() {
        assert_eq!(
            FlagValue::parse(FlagType::Bool, "1").unwrap(),
            FlagValue::Bool(true)
        );
        assert_eq!(
            FlagValue::parse(FlagType::Bool, " False ").unwrap(),
            FlagValue::Bool(false)
        );
        assert!(FlagValue::parse(FlagType::Bool, "yes please").is_err());
    }

    #[test]
    fn float_rejects_non_finite() {
        assert!(FlagValue::parse(FlagType::Float, "NaN").is_err());
        assert_eq!(
            FlagValue::parse(FlagType::Float, "0.25").unwrap(),
            FlagValue::Float(0.25)
        );
    }

    #[test]
    fn string_keeps_surrounding_whitespace() {
        assert_eq!(
            FlagValue::parse(FlagType::String, "  padded ").unwrap(),
            FlagValue::String("  padded ".to_string())
        );
    }

    #[test]
    fn extension_is_base64_on_the_wire() {
        let value = FlagValue::Extension(vec![0x08, 0x96, 0x01]);
        let encoded = serde_json::to_value(&value).unwrap();
        assert_eq!(encoded, json!({ "type": "extension", "value": "CJYB" }));

        let decoded: FlagValue = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn flag_type_aliases() {
        assert_eq!("Boolean".parse::<FlagType>().unwrap(), FlagType::Bool);
        assert_eq!("long".parse::<FlagType>().unwrap(), FlagType::Int);
        assert_eq!(
            "blob".parse::<FlagType>(),
            Err(ParseFlagError::UnknownType("blob".to_string()))
        );
        assert_eq!(FlagType::Extension.column(), "extensionVal");
    }
}
