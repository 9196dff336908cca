use indexmap::IndexMap;

use crate::converter::SoftError;

/// Soft errors of one conversion, organised by property path.
///
/// Each node holds the errors recorded for its own path and one child per
/// property segment. A node whose subtree holds no error means nothing
/// under that path failed.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ErrorTree {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<SoftError>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    properties: IndexMap<String, ErrorTree>,
}

impl ErrorTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node at a dotted path, created on demand. `""` is the root.
    pub fn for_property(&mut self, path: &str) -> &mut ErrorTree {
        let mut node = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node.properties.entry(segment.to_string()).or_default();
        }
        node
    }

    /// Existing node at a dotted path.
    pub fn get(&self, path: &str) -> Option<&ErrorTree> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.properties.get(segment))
    }

    pub fn add_error(&mut self, error: SoftError) {
        self.errors.push(error);
    }

    /// Errors recorded at this exact node.
    pub fn errors(&self) -> &[SoftError] {
        &self.errors
    }

    pub fn first_error(&self) -> Option<&SoftError> {
        self.errors.first()
    }

    /// Any error here or below.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.properties.values().any(ErrorTree::has_errors)
    }

    pub fn sub_results(&self) -> &IndexMap<String, ErrorTree> {
        &self.properties
    }

    /// Every non-empty node as `dotted.path → errors`, in recording order.
    pub fn flattened_errors(&self) -> IndexMap<String, Vec<SoftError>> {
        let mut out = IndexMap::new();
        let mut level = Vec::new();
        self.flatten_into(&mut level, &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, level: &mut Vec<&'a str>, out: &mut IndexMap<String, Vec<SoftError>>) {
        if !self.errors.is_empty() {
            out.insert(level.join("."), self.errors.clone());
        }
        for (segment, child) in &self.properties {
            level.push(segment);
            child.flatten_into(level, out);
            level.pop();
        }
    }

    /// Append every error of `other` at the same relative paths.
    pub fn merge(&mut self, other: ErrorTree) {
        self.errors.extend(other.errors);
        for (segment, child) in other.properties {
            self.properties.entry(segment).or_default().merge(child);
        }
    }
}
