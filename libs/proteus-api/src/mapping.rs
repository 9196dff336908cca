use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::converter::{ConverterId, TypeConverter};
use crate::options::{ConverterOptions, OptionValue};

/// Reserved property name addressing every child without its own node,
/// e.g. all elements of a collection.
pub const PROPERTY_PATH_PLACEHOLDER: &str = "*";

/// One node of the per-property-path mapping configuration tree.
///
/// Controls which child properties of the value at this path may be mapped,
/// renamed or skipped, optionally pins a converter, and carries the option
/// bags converters read.
///
/// Mutators are meant for single-threaded build-up: build the tree, then
/// share it (`&` or `Arc`) with conversions. `Clone` is deep; only a pinned
/// converter is shared, and converters are stateless.
#[derive(Debug, Clone, Default)]
pub struct MappingConfiguration {
    allowed: HashSet<String>,
    skipped: HashSet<String>,
    denied: HashSet<String>,
    map_unknown: bool,
    skip_unknown: bool,
    /// source property name → target property name
    renames: HashMap<String, String>,
    converter: Option<Arc<dyn TypeConverter>>,
    /// converter name → option bag
    options: HashMap<String, ConverterOptions>,
    children: IndexMap<String, MappingConfiguration>,
}

impl MappingConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether `property` may be mapped at all.
    ///
    /// Denied wins over everything; then explicit allowance; a wildcard child
    /// node allows every property; otherwise the "map unknown" flag decides.
    pub fn should_map(&self, property: &str) -> bool {
        if self.denied.contains(property) {
            return false;
        }
        if self.allowed.contains(property) {
            return true;
        }
        if self.children.contains_key(PROPERTY_PATH_PLACEHOLDER) {
            return true;
        }
        self.map_unknown
    }

    /// Whether `property` is silently ignored.
    pub fn should_skip(&self, property: &str) -> bool {
        self.skipped.contains(property)
    }

    /// Whether properties that may not be mapped are ignored instead of
    /// failing the conversion.
    pub fn should_skip_unknown_properties(&self) -> bool {
        self.skip_unknown
    }

    pub fn target_property_name<'a>(&'a self, source_property: &'a str) -> &'a str {
        self.renames
            .get(source_property)
            .map(String::as_str)
            .unwrap_or(source_property)
    }

    /// Configuration of a child: its own node, else the wildcard node, else
    /// an empty node. Never absent.
    pub fn configuration_for(&self, property: &str) -> Cow<'_, MappingConfiguration> {
        match self
            .children
            .get(property)
            .or_else(|| self.children.get(PROPERTY_PATH_PLACEHOLDER))
        {
            Some(child) => Cow::Borrowed(child),
            None => Cow::Owned(MappingConfiguration::default()),
        }
    }

    /// Existing node at a dotted path, without creating anything.
    pub fn traverse_properties(&self, path: &str) -> Option<&MappingConfiguration> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.')
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    pub fn converter_option(&self, converter: &str, key: &str) -> Option<&OptionValue> {
        self.options.get(converter).and_then(|o| o.get(key))
    }

    pub fn converter_options(&self, converter: &str) -> Option<&ConverterOptions> {
        self.options.get(converter)
    }

    /// Converter pinned for this node; bypasses resolution.
    pub fn converter(&self) -> Option<&Arc<dyn TypeConverter>> {
        self.converter.as_ref()
    }

    // -----------------------------------------------------------------------
    // Builder
    // -----------------------------------------------------------------------

    pub fn allow_properties<I, S>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn allow_all_properties(&mut self) -> &mut Self {
        self.map_unknown = true;
        self
    }

    /// Allow everything except the given properties, which are rejected
    /// even though unknown properties are otherwise mapped.
    pub fn allow_all_properties_except<I, S>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map_unknown = true;
        self.denied.extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn skip_properties<I, S>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped.extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn skip_unknown_properties(&mut self) -> &mut Self {
        self.skip_unknown = true;
        self
    }

    pub fn set_map_unknown_properties(&mut self, map_unknown: bool) -> &mut Self {
        self.map_unknown = map_unknown;
        self
    }

    /// Map source property `source` onto target property `target`.
    pub fn set_mapping(&mut self, source: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.renames.insert(source.into(), target.into());
        self
    }

    pub fn set_converter(&mut self, converter: Arc<dyn TypeConverter>) -> &mut Self {
        self.converter = Some(converter);
        self
    }

    /// Replace the option bag of `converter` and of every parent in its lineage.
    pub fn set_converter_options(&mut self, converter: ConverterId, options: ConverterOptions) -> &mut Self {
        self.set_options_for(converter.lineage(), options)
    }

    /// Set one option for `converter` and every parent in its lineage.
    pub fn set_converter_option(
        &mut self,
        converter: ConverterId,
        key: &str,
        value: impl Into<OptionValue>,
    ) -> &mut Self {
        self.set_option_for(converter.lineage(), key, value)
    }

    /// Replace the option bag under each of the given converter names.
    pub fn set_options_for<I, S>(&mut self, lineage: I, options: ConverterOptions) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in lineage {
            self.options.insert(name.into(), options.clone());
        }
        self
    }

    /// Set one option under each of the given converter names.
    pub fn set_option_for<I, S>(&mut self, lineage: I, key: &str, value: impl Into<OptionValue>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let value = value.into();
        for name in lineage {
            self.options.entry(name.into()).or_default().set(key, value.clone());
        }
        self
    }

    /// Node at a dotted path, created on demand.
    ///
    /// A missing node is cloned from its wildcard sibling when one exists,
    /// so it starts with the template's settings; later changes to the clone
    /// do not touch the template.
    pub fn for_property(&mut self, path: &str) -> &mut MappingConfiguration {
        let mut node = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            if !node.children.contains_key(segment) {
                let template = node
                    .children
                    .get(PROPERTY_PATH_PLACEHOLDER)
                    .cloned()
                    .unwrap_or_default();
                node.children.insert(segment.to_string(), template);
            }
            node = node.children.entry(segment.to_string()).or_default();
        }
        node
    }
}
