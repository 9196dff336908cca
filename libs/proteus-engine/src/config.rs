use std::collections::BTreeMap;

use serde::Deserialize;

use proteus_api::hierarchy::{ClassDef, InterfaceDef, TypeSystem};
use proteus_api::mapping::MappingConfiguration;
use proteus_api::options::{ConverterOptions, OptionValue};

use crate::catalog::ConverterProvider;
use crate::error::MappingError;

/// Converter seeded with creation/modification rights by the default configuration.
pub const DEFAULT_ENTITY_CONVERTER: &str = "entity";
pub const CREATION_ALLOWED: &str = "creation_allowed";
pub const MODIFICATION_ALLOWED: &str = "modification_allowed";

/// Converter name → option key → value.
pub type OptionTable = BTreeMap<String, BTreeMap<String, OptionValue>>;

/// Root configuration — parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// Map a null source as `""` before converter resolution.
    pub null_as_empty_string: bool,

    /// Options seeded into the default mapping configuration.
    pub default_options: OptionTable,

    /// Directory of the converter table cache.
    pub cache_dir: Option<String>,

    pub types: TypesConfig,

    /// Named mapping configuration trees.
    pub mappings: BTreeMap<String, MappingSpec>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            null_as_empty_string: true,
            default_options: default_options(),
            cache_dir: None,
            types: TypesConfig::default(),
            mappings: BTreeMap::new(),
        }
    }
}

fn default_options() -> OptionTable {
    let entity = BTreeMap::from([
        (CREATION_ALLOWED.to_string(), OptionValue::Bool(true)),
        (MODIFICATION_ALLOWED.to_string(), OptionValue::Bool(true)),
    ]);
    BTreeMap::from([(DEFAULT_ENTITY_CONVERTER.to_string(), entity)])
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypesConfig {
    pub interfaces: Vec<InterfaceDef>,
    pub classes: Vec<ClassDef>,
}

/// Declarative form of a [`MappingConfiguration`] node.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MappingSpec {
    pub allow: Vec<String>,
    pub skip: Vec<String>,
    /// Rejected properties; everything else is allowed.
    pub deny: Vec<String>,
    pub allow_all: bool,
    pub skip_unknown: bool,
    /// Source property → target property.
    pub rename: BTreeMap<String, String>,
    /// Converter pinned for this node, by name.
    pub converter: Option<String>,
    pub options: OptionTable,
    /// Child nodes by dotted path, `*` for every unnamed child.
    pub properties: BTreeMap<String, MappingSpec>,
}

impl MappingSpec {
    pub fn build(&self, provider: &dyn ConverterProvider) -> Result<MappingConfiguration, MappingError> {
        let mut config = MappingConfiguration::new();
        self.apply(&mut config, provider)?;
        Ok(config)
    }

    fn apply(&self, node: &mut MappingConfiguration, provider: &dyn ConverterProvider) -> Result<(), MappingError> {
        if !self.deny.is_empty() {
            node.allow_all_properties_except(self.deny.iter().cloned());
        } else if self.allow_all {
            node.allow_all_properties();
        }
        node.allow_properties(self.allow.iter().cloned());
        node.skip_properties(self.skip.iter().cloned());
        if self.skip_unknown {
            node.skip_unknown_properties();
        }
        for (source, target) in &self.rename {
            node.set_mapping(source.as_str(), target.as_str());
        }
        if let Some(name) = &self.converter {
            let converter = provider
                .converter(name)
                .ok_or_else(|| MappingError::ConverterUnavailable(name.clone()))?;
            node.set_converter(converter);
        }
        apply_options(node, &self.options, provider);

        // "*" sorts first, so wildcard templates exist before their siblings are cloned.
        for (path, child) in &self.properties {
            child.apply(node.for_property(path), provider)?;
        }
        Ok(())
    }
}

/// Store each option bag under the lineage of the named converter, or under
/// the bare name when the provider does not know it.
pub fn apply_options(node: &mut MappingConfiguration, options: &OptionTable, provider: &dyn ConverterProvider) {
    for (converter, bag) in options {
        let bag: ConverterOptions = bag.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        match provider.converter(converter) {
            Some(instance) => node.set_converter_options(instance.id(), bag),
            None => node.set_options_for([converter.as_str()], bag),
        };
    }
}

impl MapperConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, MappingError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| MappingError::Config(format!("{path}: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, MappingError> {
        toml::from_str(toml_str).map_err(|e| MappingError::Config(e.to_string()))
    }

    pub fn type_system(&self) -> Result<TypeSystem, MappingError> {
        TypeSystem::from_defs(self.types.interfaces.iter().cloned(), self.types.classes.iter().cloned())
            .map_err(|e| MappingError::Config(e.to_string()))
    }

    /// Build the named mapping tree.
    pub fn mapping(&self, name: &str, provider: &dyn ConverterProvider) -> Result<MappingConfiguration, MappingError> {
        self.mappings
            .get(name)
            .ok_or_else(|| MappingError::Config(format!("unknown mapping '{name}'")))?
            .build(provider)
    }
}
