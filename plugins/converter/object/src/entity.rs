use std::sync::Arc;

use indexmap::IndexMap;

use proteus_api::converter::{ConverterId, Outcome, SoftError, TypeConverter};
use proteus_api::error::ConverterError;
use proteus_api::hierarchy::{ClassKind, TypeSystem};
use proteus_api::mapping::MappingConfiguration;
use proteus_api::types;
use proteus_api::value::{Record, Value};

use crate::object::{build_record, configured_child_type, discriminated_type, set_field};
use crate::repository::EntityRepository;
use crate::{IDENTITY_KEY, TYPE_KEY};

/// Option: build a new entity when the source carries no identity.
pub const CREATION_ALLOWED: &str = "creation_allowed";
/// Option: change properties of an entity found by identity.
pub const MODIFICATION_ALLOWED: &str = "modification_allowed";
/// Option: build an entity with the given identity when none is found.
pub const IDENTITY_CREATION_ALLOWED: &str = "identity_creation_allowed";

/// Soft error codes for an identity with no stored entity.
pub const NOT_FOUND_BY_STRING: u32 = 1412283033;
pub const NOT_FOUND_BY_IDENTITY: u32 = 1412283038;

// ═══════════════════════════════════════════════════════════════
//  EntityConverter
// ═══════════════════════════════════════════════════════════════

/// Entities and value objects.
///
/// A string source is an identity to look up; `""` converts to nothing.
/// A map with `__identity` loads the stored entity and applies the remaining
/// properties to it; a map without one builds a new entity, if allowed.
/// Identities are strings or maps of the class's identity properties.
///
/// Options are read under this converter's name. Setting them on its id also
/// sets them for `object`, since this converter is one.
pub struct EntityConverter {
    types: Arc<TypeSystem>,
    repository: Arc<dyn EntityRepository>,
}

impl EntityConverter {
    pub const ID: ConverterId = ConverterId::with_parents("entity", &["object"]);

    pub fn new(types: Arc<TypeSystem>, repository: Arc<dyn EntityRepository>) -> Self {
        Self { types, repository }
    }

    fn option(config: &MappingConfiguration, key: &str) -> Option<bool> {
        config.converter_options(Self::ID.name).and_then(|o| o.get_bool(key))
    }

    fn fetch(&self, identity: &Value, class: &str) -> Result<Option<Record>, ConverterError> {
        match identity {
            Value::String(id) => self.repository.find_by_identifier(class, id),
            Value::Map(given) => {
                let identifying: IndexMap<String, Value> = self
                    .types
                    .class(class)
                    .map(|c| c.identity_properties.as_slice())
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|p| given.get(p).map(|v| (p.clone(), v.clone())))
                    .collect();
                if identifying.is_empty() {
                    return Err(ConverterError::source(format!(
                        "identity map holds none of the identity properties of '{class}'"
                    )));
                }
                self.repository.find_by_properties(class, &identifying)
            }
            other => Err(ConverterError::source(format!(
                "the identity is neither a string nor a map but of type '{}'",
                other.type_name()
            ))),
        }
    }

    fn from_map(
        &self,
        source: &IndexMap<String, Value>,
        class: &str,
        children: &mut IndexMap<String, Value>,
        config: &MappingConfiguration,
    ) -> Result<Result<Record, SoftError>, ConverterError> {
        let is_value_object = self.types.class(class).is_some_and(|c| c.kind == ClassKind::ValueObject);
        // Value objects are identified by their properties once built.
        let identity = source
            .get(IDENTITY_KEY)
            .filter(|_| !(is_value_object && source.len() > 1));

        let Some(identity) = identity else {
            let creation = Self::option(config, CREATION_ALLOWED);
            let allowed = if is_value_object { creation != Some(false) } else { creation == Some(true) };
            if !allowed {
                return Err(ConverterError::configuration(format!(
                    "creation of objects not allowed; set '{CREATION_ALLOWED}' to true"
                )));
            }
            return Ok(Ok(build_record(&self.types, class, std::mem::take(children))?));
        };

        if Self::option(config, IDENTITY_CREATION_ALLOWED) == Some(true) {
            if let Some(found) = self.fetch(identity, class)? {
                return Ok(Ok(found));
            }
            let Some(id) = identity.as_str() else {
                return Err(ConverterError::source("only string identities can be assigned"));
            };
            let record = build_record(&self.types, class, std::mem::take(children))?.with_identity(id);
            return Ok(Ok(record));
        }

        let Some(found) = self.fetch(identity, class)? else {
            let shown = identity.as_str().map_or_else(|| identity.to_json().to_string(), str::to_string);
            return Ok(Err(SoftError::new(
                NOT_FOUND_BY_IDENTITY,
                format!("Object of type '{class}' with identity \"{shown}\" not found."),
            )
            .with_argument(shown)));
        };
        if !children.is_empty() && Self::option(config, MODIFICATION_ALLOWED) != Some(true) {
            return Err(ConverterError::configuration(format!(
                "modification of persistent objects not allowed; set '{MODIFICATION_ALLOWED}' to true"
            )));
        }
        Ok(Ok(found))
    }
}

impl TypeConverter for EntityConverter {
    fn id(&self) -> ConverterId {
        Self::ID
    }

    fn supported_source_types(&self) -> &[&'static str] {
        &[types::STRING, types::ARRAY]
    }

    fn supported_target_type(&self) -> &str {
        types::OBJECT
    }

    fn priority(&self) -> i32 {
        1
    }

    fn can_convert_from(&self, _source: &Value, target_type: &str) -> bool {
        let class = types::normalize_type(target_type);
        self.types
            .class(&class)
            .is_some_and(|c| matches!(c.kind, ClassKind::Entity | ClassKind::ValueObject))
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
        children.shift_remove(IDENTITY_KEY);
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
                ConverterError::target(format!("property '{property}' was not found in target object of type '{class}'"))
            })
    }

    fn convert_from(
        &self,
        source: &Value,
        target_type: &str,
        mut children: IndexMap<String, Value>,
        config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError> {
        let class = types::normalize_type(target_type);
        let mut record = match source {
            Value::String(s) if s.is_empty() => return Ok(Value::Null.into()),
            Value::String(s) => match self.repository.find_by_identifier(&class, s)? {
                Some(found) => found,
                None => {
                    tracing::debug!(class = %class, identity = %s, "entity not found");
                    return Ok(SoftError::new(
                        NOT_FOUND_BY_STRING,
                        format!("Object of type '{class}' with identity \"{s}\" not found."),
                    )
                    .with_argument(s.as_str())
                    .into());
                }
            },
            Value::Map(map) => match self.from_map(map, &class, &mut children, config)? {
                Ok(record) => record,
                Err(not_found) => {
                    tracing::debug!(class = %class, "entity not found by identity");
                    return Ok(not_found.into());
                }
            },
            other => {
                return Err(ConverterError::source(format!(
                    "only strings and maps are accepted, got {}",
                    other.type_name()
                )));
            }
        };

        for (name, value) in children {
            set_field(&self.types, &mut record, name, value)?;
        }
        Ok(Value::object(record).into())
    }
}
