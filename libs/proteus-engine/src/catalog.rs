use std::sync::Arc;

use indexmap::IndexMap;

use proteus_api::converter::TypeConverter;

use crate::error::MappingError;

/// Enumerates the converters available to a registry build.
pub trait ConverterCatalog: Send + Sync {
    fn converter_names(&self) -> Vec<String>;
}

/// Hands out converter singletons by name.
pub trait ConverterProvider: Send + Sync {
    fn converter(&self, name: &str) -> Option<Arc<dyn TypeConverter>>;
}

/// Catalog and provider over a fixed, ordered set of converter instances.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    converters: IndexMap<String, Arc<dyn TypeConverter>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from instances; converter names must be unique.
    pub fn with_converters(
        converters: impl IntoIterator<Item = Arc<dyn TypeConverter>>,
    ) -> Result<Self, MappingError> {
        let mut catalog = Self::new();
        for converter in converters {
            catalog.add(converter)?;
        }
        Ok(catalog)
    }

    pub fn add(&mut self, converter: Arc<dyn TypeConverter>) -> Result<(), MappingError> {
        let name = converter.id().name;
        if self.converters.contains_key(name) {
            return Err(MappingError::Config(format!(
                "converter '{name}' is already in the catalog"
            )));
        }
        self.converters.insert(name.to_string(), converter);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl ConverterCatalog for StaticCatalog {
    fn converter_names(&self) -> Vec<String> {
        self.converters.keys().cloned().collect()
    }
}

impl ConverterProvider for StaticCatalog {
    fn converter(&self, name: &str) -> Option<Arc<dyn TypeConverter>> {
        self.converters.get(name).cloned()
    }
}
