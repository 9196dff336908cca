use indexmap::IndexMap;

use crate::error::ConverterError;
use crate::types;
use crate::value::Value;

/// How records of a class come into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    /// Constructed from its properties.
    #[default]
    Plain,
    /// Has a persistence identity, looked up before it is built.
    Entity,
    /// Immutable, identified by its property values.
    ValueObject,
}

/// Declared property of a class.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PropertyDef {
    /// Target type of the property, e.g. `"integer"` or `"array<Point>"`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Must be present in the converted children when the record is built.
    #[serde(default)]
    pub required: bool,
}

impl PropertyDef {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), required: false }
    }

    pub fn required(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), required: true }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Directly implemented interfaces.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default)]
    pub properties: IndexMap<String, PropertyDef>,
    /// Properties that identify an entity when no identifier is given.
    #[serde(default)]
    pub identity_properties: Vec<String>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            kind: ClassKind::Plain,
            properties: IndexMap::new(),
            identity_properties: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn property(mut self, name: impl Into<String>, def: PropertyDef) -> Self {
        self.properties.insert(name.into(), def);
        self
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    #[serde(default)]
    pub extends: Vec<String>,
}

impl InterfaceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), extends: Vec::new() }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends.push(parent.into());
        self
    }
}

/// Explicit model of the classes and interfaces values can be converted to.
///
/// Stands in for runtime reflection: ancestry and capability lookups used by
/// converter resolution all go through here. Definitions must be registered
/// after everything they reference, so the graph is acyclic by construction.
/// Immutable once shared.
#[derive(Debug, Clone, Default)]
pub struct TypeSystem {
    classes: IndexMap<String, ClassDef>,
    interfaces: IndexMap<String, InterfaceDef>,
}

impl TypeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from definitions, interfaces first.
    pub fn from_defs(
        interfaces: impl IntoIterator<Item = InterfaceDef>,
        classes: impl IntoIterator<Item = ClassDef>,
    ) -> Result<Self, ConverterError> {
        let mut system = Self::new();
        for def in interfaces {
            system.register_interface(def)?;
        }
        for def in classes {
            system.register_class(def)?;
        }
        Ok(system)
    }

    pub fn register_interface(&mut self, def: InterfaceDef) -> Result<(), ConverterError> {
        self.ensure_free(&def.name)?;
        for parent in &def.extends {
            if !self.interfaces.contains_key(parent) {
                return Err(ConverterError::configuration(format!(
                    "interface '{}' extends unknown interface '{parent}'",
                    def.name
                )));
            }
        }
        self.interfaces.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn register_class(&mut self, def: ClassDef) -> Result<(), ConverterError> {
        self.ensure_free(&def.name)?;
        if let Some(parent) = &def.parent {
            if !self.classes.contains_key(parent) {
                return Err(ConverterError::configuration(format!(
                    "class '{}' extends unknown class '{parent}'",
                    def.name
                )));
            }
        }
        for interface in &def.interfaces {
            if !self.interfaces.contains_key(interface) {
                return Err(ConverterError::configuration(format!(
                    "class '{}' implements unknown interface '{interface}'",
                    def.name
                )));
            }
        }
        for property in &def.identity_properties {
            if !def.properties.contains_key(property) {
                return Err(ConverterError::configuration(format!(
                    "identity property '{property}' is not declared on class '{}'",
                    def.name
                )));
            }
        }
        self.classes.insert(def.name.clone(), def);
        Ok(())
    }

    fn ensure_free(&self, name: &str) -> Result<(), ConverterError> {
        if types::is_simple_type(name) || name == types::OBJECT {
            return Err(ConverterError::configuration(format!(
                "'{name}' is a reserved type name"
            )));
        }
        if self.contains(name) {
            return Err(ConverterError::configuration(format!(
                "type '{name}' is already registered"
            )));
        }
        Ok(())
    }

    /// Registered class or interface.
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name) || self.interfaces.contains_key(name)
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Parent chain of a class, nearest first.
    pub fn ancestors(&self, name: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.classes.get(name).and_then(|c| c.parent.as_deref());
        while let Some(parent) = current {
            out.push(parent);
            current = self.classes.get(parent).and_then(|c| c.parent.as_deref());
        }
        out
    }

    /// Every interface a class (or interface) implements, including those
    /// inherited through parents and interface extension. First appearance wins.
    pub fn interfaces(&self, name: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        if let Some(interface) = self.interfaces.get(name) {
            for parent in &interface.extends {
                self.collect_interface(parent, &mut out);
            }
            return out;
        }
        let mut current = self.classes.get(name);
        while let Some(class) = current {
            for interface in &class.interfaces {
                self.collect_interface(interface, &mut out);
            }
            current = class.parent.as_deref().and_then(|p| self.classes.get(p));
        }
        out
    }

    fn collect_interface<'a>(&'a self, name: &'a str, out: &mut Vec<&'a str>) {
        if out.contains(&name) {
            return;
        }
        out.push(name);
        if let Some(interface) = self.interfaces.get(name) {
            for parent in &interface.extends {
                self.collect_interface(parent, out);
            }
        }
    }

    /// `sub` is `sup`, a descendant of it, or implements it.
    /// Every registered type is an `object`.
    pub fn is_a(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        if sup == types::OBJECT {
            return self.contains(sub);
        }
        self.ancestors(sub).contains(&sup) || self.interfaces(sub).contains(&sup)
    }

    /// Property declared on the class or inherited from its nearest ancestor.
    pub fn property(&self, class: &str, property: &str) -> Option<&PropertyDef> {
        let mut current = self.classes.get(class);
        while let Some(def) = current {
            if let Some(prop) = def.properties.get(property) {
                return Some(prop);
            }
            current = def.parent.as_deref().and_then(|p| self.classes.get(p));
        }
        None
    }

    /// All properties of a class, ancestors' first.
    pub fn properties(&self, class: &str) -> IndexMap<&str, &PropertyDef> {
        let mut chain: Vec<&ClassDef> = Vec::new();
        let mut current = self.classes.get(class);
        while let Some(def) = current {
            chain.push(def);
            current = def.parent.as_deref().and_then(|p| self.classes.get(p));
        }
        let mut out = IndexMap::new();
        for def in chain.into_iter().rev() {
            for (name, prop) in &def.properties {
                out.insert(name.as_str(), prop);
            }
        }
        out
    }

    /// Ordered source type set of a value: a single primitive tag, or for a
    /// record its class, ancestors, interfaces and finally `object`.
    pub fn source_types(&self, value: &Value) -> Vec<String> {
        match value {
            Value::Object(record) => {
                let class = record.class.as_str();
                let mut out = vec![class.to_string()];
                out.extend(self.ancestors(class).into_iter().map(String::from));
                out.extend(self.interfaces(class).into_iter().map(String::from));
                out.push(types::OBJECT.to_string());
                out
            }
            other => vec![other.type_name().to_string()],
        }
    }
}
