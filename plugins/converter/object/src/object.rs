use std::sync::Arc;

use indexmap::IndexMap;

use proteus_api::converter::{ConverterId, Outcome, TypeConverter};
use proteus_api::error::ConverterError;
use proteus_api::hierarchy::{ClassKind, TypeSystem};
use proteus_api::mapping::MappingConfiguration;
use proteus_api::types;
use proteus_api::value::{Record, Value};

use crate::TYPE_KEY;

/// Option on a property's sub-configuration: type to convert that property to,
/// overriding the declared one.
pub const TARGET_TYPE: &str = "target_type";
/// Option: honour a `__type` key in the source.
pub const OVERRIDE_TARGET_TYPE_ALLOWED: &str = "override_target_type_allowed";

// ═══════════════════════════════════════════════════════════════
//  ObjectConverter
// ═══════════════════════════════════════════════════════════════

/// Builds plain records from maps of their properties.
pub struct ObjectConverter {
    types: Arc<TypeSystem>,
}

impl ObjectConverter {
    pub const ID: ConverterId = ConverterId::new("object");

    pub fn new(types: Arc<TypeSystem>) -> Self {
        Self { types }
    }
}

impl TypeConverter for ObjectConverter {
    fn id(&self) -> ConverterId {
        Self::ID
    }

    fn supported_source_types(&self) -> &[&'static str] {
        &[types::ARRAY]
    }

    fn supported_target_type(&self) -> &str {
        types::OBJECT
    }

    fn priority(&self) -> i32 {
        0
    }

    fn can_convert_from(&self, _source: &Value, target_type: &str) -> bool {
        let class = types::normalize_type(target_type);
        self.types.class(&class).is_some_and(|c| c.kind == ClassKind::Plain)
    }

    fn target_type_for_source(
        &self,
        source: &Value,
        target_type: &str,
        config: &MappingConfiguration,
    ) -> Result<String, ConverterError> {
        discriminated_type(&self.types, source, target_type, config)
    }

    fn child_properties(&self, source: &Value) -> IndexMap<String, Value> {
        let mut children = source.entries();
        children.shift_remove(TYPE_KEY);
        children
    }

    fn child_property_type(
        &self,
        target_type: &str,
        property: &str,
        config: &MappingConfiguration,
    ) -> Result<String, ConverterError> {
        if let Some(configured) = configured_child_type(config, Self::ID, property) {
            return Ok(configured);
        }
        let class = types::normalize_type(target_type);
        self.types
            .property(&class, property)
            .map(|p| p.type_name.clone())
            .ok_or_else(|| {
                ConverterError::target(format!("property '{property}' is not declared on target class '{class}'"))
            })
    }

    fn convert_from(
        &self,
        _source: &Value,
        target_type: &str,
        children: IndexMap<String, Value>,
        _config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError> {
        let class = types::normalize_type(target_type);
        let record = build_record(&self.types, &class, children)?;
        tracing::trace!(class = %class, fields = record.fields.len(), "built record");
        Ok(Value::object(record).into())
    }
}

/// Target type named by a `__type` key, if the configuration allows it and
/// it is a subtype of the requested one.
pub(crate) fn discriminated_type(
    types: &TypeSystem,
    source: &Value,
    target_type: &str,
    config: &MappingConfiguration,
) -> Result<String, ConverterError> {
    let Some(discriminator) = source.as_map().and_then(|m| m.get(TYPE_KEY)) else {
        return Ok(target_type.to_string());
    };
    let Some(requested) = discriminator.as_str() else {
        return Err(ConverterError::source(format!("'{TYPE_KEY}' must be a string")));
    };

    let allowed = config
        .converter_options(ObjectConverter::ID.name)
        .and_then(|o| o.get_bool(OVERRIDE_TARGET_TYPE_ALLOWED));
    if allowed != Some(true) {
        return Err(ConverterError::configuration(format!(
            "override of target type not allowed; set '{OVERRIDE_TARGET_TYPE_ALLOWED}' to true"
        )));
    }

    let requested = types::normalize_type(requested);
    let original = types::normalize_type(target_type);
    if requested != original && !types.is_a(&requested, &original) {
        return Err(ConverterError::data_type(format!(
            "the given type '{requested}' is not a subtype of '{original}'"
        )));
    }
    Ok(requested)
}

/// `target_type` option from the sub-configuration of `property`.
pub(crate) fn configured_child_type(
    config: &MappingConfiguration,
    converter: ConverterId,
    property: &str,
) -> Option<String> {
    config
        .configuration_for(property)
        .converter_options(converter.name)
        .and_then(|o| o.get_str(TARGET_TYPE))
        .map(str::to_string)
}

/// Record of `class` from converted properties. Every required property must
/// be present and every given property declared.
pub(crate) fn build_record(
    types: &TypeSystem,
    class: &str,
    children: IndexMap<String, Value>,
) -> Result<Record, ConverterError> {
    if types.class(class).is_none() {
        return Err(ConverterError::target(format!("unknown target class '{class}'")));
    }
    for (name, def) in types.properties(class) {
        if def.required && !children.contains_key(name) {
            return Err(ConverterError::target(format!(
                "missing required property '{name}' for object of type '{class}'"
            )));
        }
    }

    let mut record = Record::new(class);
    for (name, value) in children {
        set_field(types, &mut record, name, value)?;
    }
    Ok(record)
}

pub(crate) fn set_field(
    types: &TypeSystem,
    record: &mut Record,
    name: String,
    value: Value,
) -> Result<(), ConverterError> {
    if types.property(&record.class, &name).is_none() {
        return Err(ConverterError::target(format!(
            "property '{name}' could not be set in target object of type '{}'",
            record.class
        )));
    }
    record.fields.insert(name, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use proteus_api::hierarchy::{ClassDef, InterfaceDef, PropertyDef};

    use super::*;
    use proteus_api::error::ErrorKind;

    fn shapes() -> Arc<TypeSystem> {
        Arc::new(
            TypeSystem::from_defs(
                Vec::<InterfaceDef>::new(),
                [
                    ClassDef::new("Point")
                        .property("x", PropertyDef::required("integer"))
                        .property("y", PropertyDef::required("integer")),
                    ClassDef::new("Point3").extends("Point").property("z", PropertyDef::new("integer")),
                    ClassDef::new("Line").property("points", PropertyDef::new("array<Point>")),
                    ClassDef::new("User").kind(ClassKind::Entity),
                ],
            )
            .unwrap(),
        )
    }

    fn children(pairs: &[(&str, i64)]) -> IndexMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), Value::Integer(*v))).collect()
    }

    #[test]
    fn only_plain_classes() {
        let converter = ObjectConverter::new(shapes());
        let map = Value::Map(IndexMap::new());
        assert!(converter.can_convert_from(&map, "Point"));
        assert!(!converter.can_convert_from(&map, "User"));
        assert!(!converter.can_convert_from(&map, "Nope"));
    }

    #[test]
    fn builds_record_from_children() {
        let converter = ObjectConverter::new(shapes());
        let config = MappingConfiguration::new();
        let out = converter
            .convert_from(&Value::Null, "Point3", children(&[("x", 1), ("y", 2), ("z", 3)]), &config)
            .unwrap();
        let Outcome::Value(Value::Object(record)) = out else {
            panic!("expected record");
        };
        assert_eq!(record.class, "Point3");
        assert_eq!(record.get("z"), Some(&Value::Integer(3)));
    }

    #[test]
    fn missing_required_and_undeclared_properties_fail() {
        let converter = ObjectConverter::new(shapes());
        let config = MappingConfiguration::new();
        let err = converter.convert_from(&Value::Null, "Point", children(&[("x", 1)]), &config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Target);
        let err = converter
            .convert_from(&Value::Null, "Point", children(&[("x", 1), ("y", 2), ("w", 0)]), &config)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Target);
    }

    #[test]
    fn child_type_from_declaration_or_option() {
        let converter = ObjectConverter::new(shapes());
        let mut config = MappingConfiguration::new();
        assert_eq!(converter.child_property_type("Line", "points", &config).unwrap(), "array<Point>");
        assert!(converter.child_property_type("Line", "colour", &config).is_err());

        config
            .for_property("colour")
            .set_converter_option(ObjectConverter::ID, TARGET_TYPE, "string");
        assert_eq!(converter.child_property_type("Line", "colour", &config).unwrap(), "string");
    }

    #[test]
    fn type_discriminator_needs_permission_and_subtype() {
        let converter = ObjectConverter::new(shapes());
        let source = Value::from(serde_json::json!({"__type": "Point3", "x": 1}));

        let mut config = MappingConfiguration::new();
        let err = converter.target_type_for_source(&source, "Point", &config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);

        config.set_converter_option(ObjectConverter::ID, OVERRIDE_TARGET_TYPE_ALLOWED, true);
        assert_eq!(converter.target_type_for_source(&source, "Point", &config).unwrap(), "Point3");

        let err = converter.target_type_for_source(&source, "Line", &config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataType);

        let plain = Value::from(serde_json::json!({"x": 1}));
        assert_eq!(converter.target_type_for_source(&plain, "Point", &config).unwrap(), "Point");
        assert!(!converter.child_properties(&source).contains_key(TYPE_KEY));
    }
}
