use std::fmt;

use indexmap::IndexMap;

use crate::error::ConverterError;
use crate::mapping::MappingConfiguration;
use crate::value::Value;

/// Stable identity of a converter, also the key of its option bag.
///
/// `parents` lists the converters this one specialises. Options set for a
/// converter are stored under every name of its lineage, so a specialised
/// converter can read options addressed to its parent and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConverterId {
    pub name: &'static str,
    pub parents: &'static [&'static str],
}

impl ConverterId {
    pub const fn new(name: &'static str) -> Self {
        Self { name, parents: &[] }
    }

    pub const fn with_parents(name: &'static str, parents: &'static [&'static str]) -> Self {
        Self { name, parents }
    }

    /// Own name followed by every parent name.
    pub fn lineage(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.name).chain(self.parents.iter().copied())
    }
}

impl fmt::Display for ConverterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// User-correctable conversion failure, e.g. "not a number" or
/// "target not found". Collected per property path, never aborts siblings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SoftError {
    pub code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
}

impl SoftError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }
}

impl fmt::Display for SoftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Result of one conversion step: a value, or a soft error that makes the
/// parent omit this subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Value),
    Error(SoftError),
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Value(v) => Some(v),
            Outcome::Error(_) => None,
        }
    }
}

impl From<Value> for Outcome {
    fn from(v: Value) -> Self {
        Outcome::Value(v)
    }
}

impl From<SoftError> for Outcome {
    fn from(e: SoftError) -> Self {
        Outcome::Error(e)
    }
}

/// Type converter plugin.
///
/// Solves one task: turn values of its source types into its target type.
/// Converters are stateless singletons held by the registry and shared
/// across concurrent conversions; everything call-specific arrives as
/// arguments.
///
/// Hard faults are returned as `Err`; soft, per-value failures as
/// `Ok(Outcome::Error)`.
pub trait TypeConverter: Send + Sync {
    fn id(&self) -> ConverterId;

    /// Simple source tags (`string`, `array`, ...) this converter accepts.
    fn supported_source_types(&self) -> &[&'static str];

    /// Target type, a simple type or a class/interface name.
    fn supported_target_type(&self) -> &str;

    /// Higher wins. Negative priorities are never selected automatically.
    fn priority(&self) -> i32;

    /// Refine the requested target type from the payload (e.g. a type
    /// discriminator).
    fn target_type_for_source(
        &self,
        _source: &Value,
        target_type: &str,
        _config: &MappingConfiguration,
    ) -> Result<String, ConverterError> {
        Ok(target_type.to_string())
    }

    /// Final runtime gate, asked only of otherwise eligible converters.
    fn can_convert_from(&self, _source: &Value, _target_type: &str) -> bool {
        true
    }

    /// Sub-values that must be converted before `convert_from`, in order.
    fn child_properties(&self, _source: &Value) -> IndexMap<String, Value> {
        IndexMap::new()
    }

    /// Expected target type of a child property.
    fn child_property_type(
        &self,
        target_type: &str,
        property: &str,
        _config: &MappingConfiguration,
    ) -> Result<String, ConverterError> {
        Err(ConverterError::logic(format!(
            "converter '{}' has no child property '{property}' for target '{target_type}'",
            self.id()
        )))
    }

    /// Build the target value from the source and its converted children.
    fn convert_from(
        &self,
        source: &Value,
        target_type: &str,
        children: IndexMap<String, Value>,
        config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError>;
}

impl fmt::Debug for dyn TypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeConverter")
            .field("id", &self.id().name)
            .field("target", &self.supported_target_type())
            .field("priority", &self.priority())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lineage_starts_with_own_name() {
        const ID: ConverterId = ConverterId::with_parents("entity", &["object"]);
        assert_eq!(ID.lineage().collect::<Vec<_>>(), vec!["entity", "object"]);
        assert_eq!(ID.to_string(), "entity");
    }

    #[test]
    fn outcome_conversions() {
        assert!(Outcome::from(SoftError::new(1, "bad")).is_error());
        assert_eq!(Outcome::from(Value::Integer(1)).into_value(), Some(Value::Integer(1)));
    }
}
