//! Type-name handling for source tags and target types.
//!
//! Target types are strings: a simple type (`string`, `integer`, ...), a
//! class or interface name, or a collection with an element type
//! (`array<Point>`).

use crate::error::ConverterError;

pub const STRING: &str = "string";
pub const INTEGER: &str = "integer";
pub const FLOAT: &str = "float";
pub const BOOLEAN: &str = "boolean";
pub const ARRAY: &str = "array";
pub const NULL: &str = "null";
/// Generic top type of every class, last entry of an object's source type set.
pub const OBJECT: &str = "object";

const SIMPLE_TYPES: &[&str] = &[ARRAY, STRING, FLOAT, INTEGER, BOOLEAN, NULL];
const COLLECTION_TYPES: &[&str] = &[ARRAY];

/// A target type split into its base and optional element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    pub base: String,
    pub element_type: Option<String>,
}

/// Split `array<Point>` into `array` and `Point`.
pub fn parse_type(type_name: &str) -> Result<ParsedType, ConverterError> {
    let type_name = type_name.trim();
    match type_name.find('<') {
        None => {
            if type_name.is_empty() || type_name.contains('>') {
                return Err(ConverterError::data_type(format!(
                    "invalid type name '{type_name}'"
                )));
            }
            Ok(ParsedType { base: type_name.to_string(), element_type: None })
        }
        Some(open) => {
            let base = &type_name[..open];
            let element = type_name[open + 1..].strip_suffix('>');
            match element {
                Some(element) if !base.is_empty() && !element.trim().is_empty() => {
                    let element = element.trim();
                    if element.contains(['<', '>']) {
                        parse_type(element)?;
                    }
                    Ok(ParsedType { base: base.to_string(), element_type: Some(element.to_string()) })
                }
                _ => Err(ConverterError::data_type(format!(
                    "invalid type name '{type_name}'"
                ))),
            }
        }
    }
}

/// Canonical spelling: `int → integer`, `bool → boolean`, `double → float`,
/// `str → string`. Applied to the element type too.
pub fn normalize_type(type_name: &str) -> String {
    let type_name = type_name.trim().trim_start_matches('\\');
    match type_name.find('<') {
        Some(open) if type_name.ends_with('>') => {
            let base = normalize_simple(&type_name[..open]);
            let element = normalize_type(&type_name[open + 1..type_name.len() - 1]);
            format!("{base}<{element}>")
        }
        _ => normalize_simple(type_name).to_string(),
    }
}

fn normalize_simple(type_name: &str) -> &str {
    match type_name {
        "int" => INTEGER,
        "bool" => BOOLEAN,
        "double" => FLOAT,
        "str" => STRING,
        other => other,
    }
}

/// Strip the element decoration: `array<Point>` → `array`.
pub fn truncate_element_type(type_name: &str) -> &str {
    match type_name.find('<') {
        Some(open) => &type_name[..open],
        None => type_name,
    }
}

/// Element type of a collection target, if declared.
pub fn element_type(type_name: &str) -> Option<&str> {
    let open = type_name.find('<')?;
    type_name[open + 1..].strip_suffix('>').map(str::trim)
}

pub fn is_simple_type(type_name: &str) -> bool {
    SIMPLE_TYPES.contains(&type_name)
}

pub fn is_collection_type(type_name: &str) -> bool {
    COLLECTION_TYPES.contains(&truncate_element_type(type_name))
}
