use indexmap::IndexMap;

use proteus_api::converter::{ConverterId, Outcome, TypeConverter};
use proteus_api::error::ConverterError;
use proteus_api::mapping::MappingConfiguration;
use proteus_api::types;
use proteus_api::value::Value;

/// `ArrayConverter` option: how strings are split, `csv` (default) or `json`.
pub const STRING_FORMAT: &str = "string_format";
/// `ArrayConverter` option: separator of the `csv` string format.
pub const STRING_DELIMITER: &str = "string_delimiter";

// ═══════════════════════════════════════════════════════════════
//  ArrayConverter
// ═══════════════════════════════════════════════════════════════

/// Untyped collections: arrays pass through, strings are split.
pub struct ArrayConverter;

impl ArrayConverter {
    pub const ID: ConverterId = ConverterId::new("array");
}

impl TypeConverter for ArrayConverter {
    fn id(&self) -> ConverterId {
        Self::ID
    }

    fn supported_source_types(&self) -> &[&'static str] {
        &[types::ARRAY, types::STRING]
    }

    fn supported_target_type(&self) -> &str {
        types::ARRAY
    }

    fn priority(&self) -> i32 {
        1
    }

    fn convert_from(
        &self,
        source: &Value,
        _target_type: &str,
        _children: IndexMap<String, Value>,
        config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError> {
        let s = match source {
            Value::List(_) | Value::Map(_) => return Ok(source.clone().into()),
            Value::String(s) => s,
            other => return Err(ConverterError::source(format!("cannot convert {} to array", other.type_name()))),
        };
        if s.is_empty() {
            return Ok(Value::List(Vec::new()).into());
        }

        let options = config.converter_options(Self::ID.name);
        match options.and_then(|o| o.get_str(STRING_FORMAT)).unwrap_or("csv") {
            "csv" => {
                let delimiter = options.and_then(|o| o.get_str(STRING_DELIMITER)).unwrap_or(",");
                Ok(Value::List(s.split(delimiter).map(Value::from).collect()).into())
            }
            "json" => {
                let json: serde_json::Value = serde_json::from_str(s)?;
                match Value::from(json) {
                    v @ (Value::List(_) | Value::Map(_)) => Ok(v.into()),
                    other => Err(ConverterError::source(format!(
                        "json string decodes to {}, not an array",
                        other.type_name()
                    ))),
                }
            }
            other => Err(ConverterError::configuration(format!("unknown string format '{other}'"))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  TypedArrayConverter
// ═══════════════════════════════════════════════════════════════

/// Collections with an element type (`array<integer>`): every element is
/// converted to it. Lists stay lists and maps keep their keys.
pub struct TypedArrayConverter;

impl TypedArrayConverter {
    pub const ID: ConverterId = ConverterId::new("typed_array");
}

impl TypeConverter for TypedArrayConverter {
    fn id(&self) -> ConverterId {
        Self::ID
    }

    fn supported_source_types(&self) -> &[&'static str] {
        &[types::ARRAY]
    }

    fn supported_target_type(&self) -> &str {
        types::ARRAY
    }

    fn priority(&self) -> i32 {
        2
    }

    fn can_convert_from(&self, _source: &Value, target_type: &str) -> bool {
        types::element_type(target_type).is_some()
    }

    fn child_properties(&self, source: &Value) -> IndexMap<String, Value> {
        source.entries()
    }

    fn child_property_type(
        &self,
        target_type: &str,
        property: &str,
        _config: &MappingConfiguration,
    ) -> Result<String, ConverterError> {
        types::element_type(target_type)
            .map(str::to_string)
            .ok_or_else(|| ConverterError::target(format!("'{target_type}' has no element type for '{property}'")))
    }

    fn convert_from(
        &self,
        source: &Value,
        _target_type: &str,
        children: IndexMap<String, Value>,
        _config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError> {
        let converted = match source {
            Value::List(_) => Value::List(children.into_values().collect()),
            _ => Value::Map(children),
        };
        Ok(converted.into())
    }
}
