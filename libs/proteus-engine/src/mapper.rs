use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use proteus_api::converter::Outcome;
use proteus_api::mapping::MappingConfiguration;
use proteus_api::messages::ErrorTree;
use proteus_api::types;
use proteus_api::value::Value;

use crate::config::{self, MapperConfig};
use crate::error::MappingError;
use crate::registry::ConverterRegistry;

/// Result of one top-level conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapped {
    /// `None` when the root conversion produced a soft error.
    pub value: Option<Value>,
    /// Soft errors by property path.
    pub messages: ErrorTree,
}

/// Per-call state, owned by exactly one top-level conversion.
#[derive(Debug, Default)]
struct Context {
    path: Vec<String>,
    messages: ErrorTree,
    /// Path of the deepest node a hard fault was raised at.
    failure_path: Option<String>,
}

impl Context {
    fn joined_path(&self) -> String {
        self.path.join(".")
    }
}

/// Turns loosely-typed values into typed values and other scalars, guided by
/// the converter registry and a mapping configuration tree.
///
/// Holds no per-conversion state: concurrent `map` calls each own their
/// context. `convert` additionally keeps the message tree of the latest
/// call for `messages()`.
pub struct PropertyMapper {
    registry: Arc<ConverterRegistry>,
    config: MapperConfig,
    last_messages: Mutex<ErrorTree>,
}

impl std::fmt::Debug for PropertyMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyMapper")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl PropertyMapper {
    pub fn new(registry: Arc<ConverterRegistry>) -> Self {
        Self::with_config(registry, MapperConfig::default())
    }

    pub fn with_config(registry: Arc<ConverterRegistry>, config: MapperConfig) -> Self {
        Self {
            registry,
            config,
            last_messages: Mutex::new(ErrorTree::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ConverterRegistry> {
        &self.registry
    }

    /// Allow-all configuration seeded with the default converter options.
    ///
    /// Options are stored under the whole lineage of each converter the
    /// provider knows; unknown names are stored as given.
    pub fn build_default_configuration(&self) -> MappingConfiguration {
        let mut configuration = MappingConfiguration::new();
        configuration.allow_all_properties();
        config::apply_options(&mut configuration, &self.config.default_options, self.registry.provider());
        configuration
    }

    /// Convert `source` to `target_type` and return the value together with
    /// its soft-error tree.
    ///
    /// Hard faults abort the call. They come back wrapped in
    /// `MappingError::Mapping` with the property path they occurred at,
    /// except security faults, which are returned as they are.
    pub fn map(
        &self,
        source: &Value,
        target_type: &str,
        config: Option<&MappingConfiguration>,
    ) -> Result<Mapped, MappingError> {
        let (result, messages) = self.run(source, target_type, config);
        result.map(|value| Mapped { value, messages })
    }

    /// Like [`map`](Self::map), keeping the message tree for `messages()`.
    pub fn convert(
        &self,
        source: &Value,
        target_type: &str,
        config: Option<&MappingConfiguration>,
    ) -> Result<Option<Value>, MappingError> {
        let (result, messages) = self.run(source, target_type, config);
        *self.last_messages.lock() = messages;
        result
    }

    /// Soft errors of the latest `convert` call.
    pub fn messages(&self) -> ErrorTree {
        self.last_messages.lock().clone()
    }

    fn run(
        &self,
        source: &Value,
        target_type: &str,
        config: Option<&MappingConfiguration>,
    ) -> (Result<Option<Value>, MappingError>, ErrorTree) {
        let default_config;
        let config = match config {
            Some(config) => config,
            None => {
                default_config = self.build_default_configuration();
                &default_config
            }
        };

        let mut ctx = Context::default();
        let result = match self.do_mapping(source, target_type, config, &mut ctx) {
            Ok(outcome) => Ok(outcome.into_value()),
            Err(e @ MappingError::Security(_)) => Err(e),
            Err(e) => {
                let path = ctx.failure_path.take().unwrap_or_default();
                tracing::debug!(target = %target_type, path = %path, error = %e, "property mapping failed");
                Err(MappingError::Mapping {
                    target_type: target_type.to_string(),
                    path,
                    error: Box::new(e),
                })
            }
        };
        (result, ctx.messages)
    }

    fn do_mapping(
        &self,
        source: &Value,
        target_type: &str,
        config: &MappingConfiguration,
        ctx: &mut Context,
    ) -> Result<Outcome, MappingError> {
        let result = self.map_node(source, target_type, config, ctx);
        if result.is_err() && ctx.failure_path.is_none() {
            ctx.failure_path = Some(ctx.joined_path());
        }
        result
    }

    fn map_node(
        &self,
        source: &Value,
        target_type: &str,
        config: &MappingConfiguration,
        ctx: &mut Context,
    ) -> Result<Outcome, MappingError> {
        types::parse_type(target_type)?;

        if let Value::Object(record) = source {
            let normalized = types::normalize_type(target_type);
            let target_class = types::truncate_element_type(&normalized);
            if self.registry.types().is_a(&record.class, target_class) {
                return Ok(Outcome::Value(source.clone()));
            }
        }

        let coerced;
        let source = if source.is_null() && self.config.null_as_empty_string {
            coerced = Value::String(String::new());
            &coerced
        } else {
            source
        };

        let converter = self.registry.resolve(source, target_type, config)?;
        let target_type = converter.target_type_for_source(source, target_type, config)?;

        let mut children = IndexMap::new();
        for (source_property, raw) in converter.child_properties(source) {
            let property = config.target_property_name(&source_property).to_string();
            if config.should_skip(&property) {
                continue;
            }
            if !config.should_map(&property) {
                if config.should_skip_unknown_properties() {
                    tracing::trace!(property = %property, "skipping unknown property");
                    continue;
                }
                return Err(MappingError::UnconfiguredProperty { property });
            }

            let child_type = converter.child_property_type(&target_type, &property, config)?;
            let child_config = config.configuration_for(&property);

            ctx.path.push(property);
            let child = self.do_mapping(&raw, &child_type, &child_config, ctx);
            let property = ctx.path.pop().unwrap_or_default();

            if let Outcome::Value(value) = child? {
                children.insert(property, value);
            }
        }

        let outcome = converter.convert_from(source, &target_type, children, config)?;
        if let Outcome::Error(error) = &outcome {
            let path = ctx.joined_path();
            tracing::debug!(path = %path, converter = %converter.id(), error = %error, "soft conversion error");
            ctx.messages.for_property(&path).add_error(error.clone());
        }
        Ok(outcome)
    }
}
