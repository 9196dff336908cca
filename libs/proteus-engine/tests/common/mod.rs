#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;

use proteus_api::converter::{ConverterId, Outcome, TypeConverter};
use proteus_api::error::ConverterError;
use proteus_api::hierarchy::{ClassDef, ClassKind, InterfaceDef, PropertyDef, TypeSystem};
use proteus_api::mapping::MappingConfiguration;
use proteus_api::value::{Record, Value};
use proteus_converter_object::InMemoryRepository;
use proteus_engine::catalog::StaticCatalog;
use proteus_engine::mapper::PropertyMapper;
use proteus_engine::registry::ConverterRegistry;

/// What a [`Probe`] returns from `convert_from`.
#[derive(Clone)]
pub enum Reply {
    /// Its own name as a string.
    Name,
    /// An empty record of the target type.
    Record,
    Fault(ConverterError),
}

/// Leaf converter with a fixed answer that counts its conversions.
pub struct Probe {
    pub name: &'static str,
    pub sources: &'static [&'static str],
    pub target: &'static str,
    pub priority: i32,
    pub accepts: bool,
    pub reply: Reply,
    pub calls: AtomicUsize,
}

impl Probe {
    pub fn new(name: &'static str, sources: &'static [&'static str], target: &'static str, priority: i32) -> Self {
        Self {
            name,
            sources,
            target,
            priority,
            accepts: true,
            reply: Reply::Name,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn refusing(mut self) -> Self {
        self.accepts = false;
        self
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.reply = reply;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TypeConverter for Probe {
    fn id(&self) -> ConverterId {
        ConverterId::new(self.name)
    }

    fn supported_source_types(&self) -> &[&'static str] {
        self.sources
    }

    fn supported_target_type(&self) -> &str {
        self.target
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_convert_from(&self, _source: &Value, _target_type: &str) -> bool {
        self.accepts
    }

    fn convert_from(
        &self,
        _source: &Value,
        target_type: &str,
        _children: IndexMap<String, Value>,
        _config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Name => Ok(Value::from(self.name).into()),
            Reply::Record => Ok(Value::object(Record::new(target_type)).into()),
            Reply::Fault(e) => Err(e.clone()),
        }
    }
}

/// People, shapes and accounts:
///
/// - `Person: Named { name!, age }`, `Employee: Person { salary }`
/// - `Point { x!, y! }`, `Line { points: array<Point> }`
/// - `Outer { a: Inner }`, `Inner { b, c, d: Missing }`
/// - entity `User { email, name }` identified by `email`
pub fn types() -> Arc<TypeSystem> {
    let user = ClassDef {
        identity_properties: vec!["email".into()],
        ..ClassDef::new("User")
            .kind(ClassKind::Entity)
            .property("email", PropertyDef::new("string"))
            .property("name", PropertyDef::new("string"))
    };
    let system = TypeSystem::from_defs(
        [InterfaceDef::new("Named")],
        [
            ClassDef::new("Person")
                .implements("Named")
                .property("name", PropertyDef::required("string"))
                .property("age", PropertyDef::new("integer")),
            ClassDef::new("Employee").extends("Person").property("salary", PropertyDef::new("float")),
            ClassDef::new("Point")
                .property("x", PropertyDef::required("integer"))
                .property("y", PropertyDef::required("integer")),
            ClassDef::new("Line").property("points", PropertyDef::new("array<Point>")),
            ClassDef::new("Inner")
                .property("b", PropertyDef::new("integer"))
                .property("c", PropertyDef::new("integer"))
                .property("d", PropertyDef::new("Missing")),
            ClassDef::new("Outer").property("a", PropertyDef::new("Inner")),
            user,
        ],
    );
    match system {
        Ok(system) => Arc::new(system),
        Err(e) => panic!("fixture types: {e}"),
    }
}

pub fn mapper_with(converters: Vec<Arc<dyn TypeConverter>>, types: Arc<TypeSystem>) -> PropertyMapper {
    let catalog = Arc::new(StaticCatalog::with_converters(converters).unwrap());
    let registry = ConverterRegistry::build(catalog.as_ref(), catalog.clone(), types).unwrap();
    PropertyMapper::new(Arc::new(registry))
}

/// Mapper over every shipped converter, with `u1` (ada@example.org) stored.
pub fn standard() -> (PropertyMapper, Arc<InMemoryRepository>) {
    let types = types();
    let repository = Arc::new(InMemoryRepository::new(Arc::clone(&types)));
    repository
        .insert(
            Record::new("User")
                .with_identity("u1")
                .with_field("email", "ada@example.org".into())
                .with_field("name", "Ada".into()),
        )
        .unwrap();
    let converters: Vec<Arc<dyn TypeConverter>> = proteus_converter_scalar::converters()
        .into_iter()
        .chain(proteus_converter_object::converters(Arc::clone(&types), repository.clone()))
        .collect();
    (mapper_with(converters, types), repository)
}

/// Allow-all at the root and at every direct child.
pub fn open_two_levels() -> MappingConfiguration {
    let mut config = MappingConfiguration::new();
    config.allow_all_properties();
    config.for_property("*").allow_all_properties();
    config
}

pub fn json(value: serde_json::Value) -> Value {
    Value::from(value)
}
