use std::collections::BTreeMap;
use std::sync::Arc;

use proteus_api::converter::TypeConverter;
use proteus_api::hierarchy::TypeSystem;
use proteus_api::mapping::MappingConfiguration;
use proteus_api::types;
use proteus_api::value::Value;

use crate::cache::MemoStore;
use crate::catalog::{ConverterCatalog, ConverterProvider};
use crate::error::MappingError;

/// Memoization key of the converter table.
pub const CACHE_KEY: &str = "type_converter_map";

/// Priority → converter name.
pub type PriorityBucket = BTreeMap<i32, String>;

/// Source type → target type → priority → converter name.
pub type ConverterTable = BTreeMap<String, BTreeMap<String, PriorityBucket>>;

/// Cached form: the table plus the catalog listing it was built from.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CachedTable {
    catalog: Vec<String>,
    table: ConverterTable,
}

/// Lookup structure of every available converter, built once and read-only
/// afterwards. Safe for unsynchronised concurrent reads.
///
/// The table stores converter names; instances come from the provider when
/// a candidate is consulted.
pub struct ConverterRegistry {
    table: ConverterTable,
    /// Sorted catalog listing the table was built from.
    catalog: Vec<String>,
    provider: Arc<dyn ConverterProvider>,
    types: Arc<TypeSystem>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("table", &self.table)
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl ConverterRegistry {
    /// Build the table from every catalogued converter.
    ///
    /// Fails when two converters claim the same (source, target, priority) slot.
    pub fn build(
        catalog: &dyn ConverterCatalog,
        provider: Arc<dyn ConverterProvider>,
        types: Arc<TypeSystem>,
    ) -> Result<Self, MappingError> {
        let names = catalog.converter_names();
        let table = build_table(&names, provider.as_ref())?;
        tracing::info!(converters = names.len(), sources = table.len(), "built type converter table");
        Ok(Self {
            table,
            catalog: sorted(names),
            provider,
            types,
        })
    }

    /// Reuse the table memoized in `store` when it was built from the same
    /// catalog listing; otherwise build it and write it back.
    pub fn load_or_build(
        catalog: &dyn ConverterCatalog,
        provider: Arc<dyn ConverterProvider>,
        types: Arc<TypeSystem>,
        store: &dyn MemoStore,
    ) -> Result<Self, MappingError> {
        let names = sorted(catalog.converter_names());

        if let Some(raw) = store.get(CACHE_KEY) {
            match serde_json::from_str::<CachedTable>(&raw) {
                Ok(cached) if cached.catalog == names => {
                    tracing::info!(converters = names.len(), "loaded type converter table from cache");
                    return Ok(Self {
                        table: cached.table,
                        catalog: names,
                        provider,
                        types,
                    });
                }
                Ok(_) => tracing::warn!("converter catalog changed, rebuilding cached table"),
                Err(e) => tracing::warn!(error = %e, "discarding unreadable cached converter table"),
            }
        }

        let registry = Self::build(catalog, provider, types)?;
        registry.store(store)?;
        Ok(registry)
    }

    /// Rebuild when the catalog listing differs from the one the table was
    /// built from. Returns whether a rebuild happened.
    pub fn rebuild_if_changed(
        &mut self,
        catalog: &dyn ConverterCatalog,
        store: Option<&dyn MemoStore>,
    ) -> Result<bool, MappingError> {
        let names = catalog.converter_names();
        if sorted(names.clone()) == self.catalog {
            return Ok(false);
        }
        self.table = build_table(&names, self.provider.as_ref())?;
        self.catalog = sorted(names);
        tracing::info!(converters = self.catalog.len(), "rebuilt type converter table");
        if let Some(store) = store {
            self.store(store)?;
        }
        Ok(true)
    }

    fn store(&self, store: &dyn MemoStore) -> Result<(), MappingError> {
        let cached = CachedTable {
            catalog: self.catalog.clone(),
            table: self.table.clone(),
        };
        let raw = serde_json::to_string(&cached).map_err(|e| MappingError::Cache(e.to_string()))?;
        store.set(CACHE_KEY, raw)
    }

    pub fn table(&self) -> &ConverterTable {
        &self.table
    }

    pub fn converter_names(&self) -> &[String] {
        &self.catalog
    }

    pub fn types(&self) -> &TypeSystem {
        &self.types
    }

    pub fn provider(&self) -> &dyn ConverterProvider {
        self.provider.as_ref()
    }

    fn instance(&self, name: &str) -> Result<Arc<dyn TypeConverter>, MappingError> {
        self.provider
            .converter(name)
            .ok_or_else(|| MappingError::ConverterUnavailable(name.to_string()))
    }

    /// Pick the converter for turning `source` into `target_type`.
    ///
    /// A converter pinned in `config` wins outright. Otherwise every source
    /// type of the value is tried in order; for structured targets the
    /// target's ancestors, interfaces and `object` are walked too.
    pub fn resolve(
        &self,
        source: &Value,
        target_type: &str,
        config: &MappingConfiguration,
    ) -> Result<Arc<dyn TypeConverter>, MappingError> {
        types::parse_type(target_type)?;
        if let Some(converter) = config.converter() {
            return Ok(Arc::clone(converter));
        }

        let target_type = types::normalize_type(target_type);
        let truncated = types::truncate_element_type(&target_type);
        let source_types = self.types.source_types(source);

        for source_type in &source_types {
            let found = if types::is_simple_type(truncated) {
                match self.table.get(source_type).and_then(|t| t.get(truncated)) {
                    Some(bucket) => self.highest_priority(bucket.iter(), source, &target_type)?,
                    None => None,
                }
            } else {
                self.find_in_object_hierarchy(source, source_type, &target_type, truncated)?
            };

            if let Some(converter) = found {
                tracing::debug!(
                    converter = %converter.id(),
                    source_type = %source_type,
                    target = %target_type,
                    "resolved type converter"
                );
                return Ok(converter);
            }
        }

        Err(MappingError::NoConverterFound {
            source_types,
            target_type,
        })
    }

    fn find_in_object_hierarchy(
        &self,
        source: &Value,
        source_type: &str,
        target_type: &str,
        target_class: &str,
    ) -> Result<Option<Arc<dyn TypeConverter>>, MappingError> {
        if target_class != types::OBJECT && !self.types.contains(target_class) {
            return Err(MappingError::InvalidTarget(target_class.to_string()));
        }
        let Some(for_source) = self.table.get(source_type) else {
            return Ok(None);
        };

        if target_class != types::OBJECT {
            if let Some(bucket) = for_source.get(target_class) {
                if let Some(found) = self.highest_priority(bucket.iter(), source, target_type)? {
                    return Ok(Some(found));
                }
            }

            for parent in self.types.ancestors(target_class) {
                if let Some(bucket) = for_source.get(parent) {
                    if let Some(found) = self.highest_priority(bucket.iter(), source, target_type)? {
                        return Ok(Some(found));
                    }
                }
            }

            let merged = merge_interface_buckets(for_source, &self.types.interfaces(target_class))?;
            if let Some(found) =
                self.highest_priority(merged.iter().map(|(p, n)| (p, *n)), source, target_type)?
            {
                return Ok(Some(found));
            }
        }

        match for_source.get(types::OBJECT) {
            Some(bucket) => self.highest_priority(bucket.iter(), source, target_type),
            None => Ok(None),
        }
    }

    /// First converter, highest priority first, that has a non-negative
    /// priority and accepts the source. Lower priorities are not consulted
    /// once one is eligible.
    fn highest_priority<'a, I>(
        &self,
        bucket: I,
        source: &Value,
        target_type: &str,
    ) -> Result<Option<Arc<dyn TypeConverter>>, MappingError>
    where
        I: DoubleEndedIterator<Item = (&'a i32, &'a String)>,
    {
        for (priority, name) in bucket.rev() {
            if *priority < 0 {
                continue;
            }
            let converter = self.instance(name)?;
            if converter.can_convert_from(source, target_type) {
                return Ok(Some(converter));
            }
        }
        Ok(None)
    }
}

/// Union of the buckets of every interface, keyed by priority. Two different
/// converters at one priority are ambiguous and rejected.
fn merge_interface_buckets<'a>(
    for_source: &'a BTreeMap<String, PriorityBucket>,
    interfaces: &[&str],
) -> Result<BTreeMap<i32, &'a String>, MappingError> {
    let mut merged: BTreeMap<i32, &'a String> = BTreeMap::new();
    for interface in interfaces {
        let Some(bucket) = for_source.get(*interface) else {
            continue;
        };
        for (priority, name) in bucket {
            match merged.get(priority) {
                Some(existing) if *existing != name => {
                    return Err(MappingError::DuplicateInterfaceConverter {
                        priority: *priority,
                        first: (*existing).clone(),
                        second: name.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    merged.insert(*priority, name);
                }
            }
        }
    }
    Ok(merged)
}

fn build_table(names: &[String], provider: &dyn ConverterProvider) -> Result<ConverterTable, MappingError> {
    let mut table = ConverterTable::new();
    for name in names {
        let converter = provider
            .converter(name)
            .ok_or_else(|| MappingError::ConverterUnavailable(name.clone()))?;
        let target_type = types::normalize_type(converter.supported_target_type());
        let priority = converter.priority();

        for source_type in converter.supported_source_types() {
            let bucket = table
                .entry(source_type.to_string())
                .or_default()
                .entry(target_type.clone())
                .or_default();
            if let Some(existing) = bucket.get(&priority) {
                return Err(MappingError::DuplicateConverter {
                    source_type: source_type.to_string(),
                    target_type,
                    priority,
                    existing: existing.clone(),
                    duplicate: name.clone(),
                });
            }
            bucket.insert(priority, name.clone());
        }
    }
    Ok(table)
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}
