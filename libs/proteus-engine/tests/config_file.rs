mod common;

use std::sync::Arc;

use proteus_api::converter::TypeConverter;
use proteus_api::value::Value;
use proteus_converter_object::InMemoryRepository;
use proteus_engine::cache::{FileStore, MemoStore};
use proteus_engine::catalog::StaticCatalog;
use proteus_engine::config::MapperConfig;
use proteus_engine::mapper::PropertyMapper;
use proteus_engine::registry::{CACHE_KEY, ConverterRegistry};

use common::json;

const CONFIG: &str = r#"
null_as_empty_string = true

[default_options.entity]
creation_allowed = false

[[types.classes]]
name = "Address"
properties = { street = { type = "string" }, zip = { type = "integer" } }

[[types.classes]]
name = "Customer"
kind = "entity"
properties = { name = { type = "string", required = true }, address = { type = "Address" } }

[[types.classes]]
name = "Contact"
properties = { name = { type = "string" }, tags = { type = "array<string>" } }

[mappings.signup]
allow = ["name", "address"]
rename = { customer_name = "name" }
options = { entity = { creation_allowed = true } }

[mappings.signup.properties.address]
allow_all = true
skip = ["country"]

[mappings.contact]
allow_all = true

[mappings.contact.properties.tags]
allow_all = true
"#;

fn catalog(config: &MapperConfig) -> Arc<StaticCatalog> {
    let types = Arc::new(config.type_system().unwrap());
    let repository = Arc::new(InMemoryRepository::new(Arc::clone(&types)));
    let converters: Vec<Arc<dyn TypeConverter>> = proteus_converter_scalar::converters()
        .into_iter()
        .chain(proteus_converter_object::converters(types, repository))
        .collect();
    Arc::new(StaticCatalog::with_converters(converters).unwrap())
}

fn mapper(config: MapperConfig, store: Option<&dyn MemoStore>) -> PropertyMapper {
    let catalog = catalog(&config);
    let types = Arc::new(config.type_system().unwrap());
    let registry = match store {
        Some(store) => ConverterRegistry::load_or_build(catalog.as_ref(), catalog.clone(), types, store),
        None => ConverterRegistry::build(catalog.as_ref(), catalog.clone(), types),
    }
    .unwrap();
    PropertyMapper::with_config(Arc::new(registry), config)
}

#[test]
fn loads_config_file_and_applies_named_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proteus.toml");
    std::fs::write(&path, CONFIG).unwrap();

    let config = MapperConfig::load(path.to_str().unwrap()).unwrap();
    let signup = config.mapping("signup", catalog(&config).as_ref()).unwrap();
    let mapper = mapper(config, None);

    let source = json(serde_json::json!({
        "customer_name": "Ada",
        "address": {"street": "Main St", "zip": "12345", "country": "UK"},
    }));
    let value = mapper.convert(&source, "Customer", Some(&signup)).unwrap().unwrap();
    assert_eq!(
        value.to_json(),
        serde_json::json!({
            "__type": "Customer",
            "name": "Ada",
            "address": {"__type": "Address", "street": "Main St", "zip": 12345},
        })
    );
}

#[test]
fn default_options_come_from_config() {
    let mapper = mapper(MapperConfig::parse(CONFIG).unwrap(), None);
    // creation_allowed = false replaces the built-in seed.
    let err = mapper.convert(&json(serde_json::json!({"name": "Ada"})), "Customer", None).unwrap_err();
    assert!(!err.is_security());
    let config = mapper.build_default_configuration();
    assert_eq!(config.converter_options("entity").and_then(|o| o.get_bool("creation_allowed")), Some(false));
}

#[test]
fn wildcard_mapping_covers_collection_elements() {
    let config = MapperConfig::parse(CONFIG).unwrap();
    let contact = config.mapping("contact", catalog(&config).as_ref()).unwrap();
    let mapper = mapper(config, None);

    let source = json(serde_json::json!({"name": "Ada", "tags": [1, true, "x"]}));
    let value = mapper.convert(&source, "Contact", Some(&contact)).unwrap().unwrap();
    assert_eq!(
        value.to_json(),
        serde_json::json!({"__type": "Contact", "name": "Ada", "tags": ["1", "1", "x"]})
    );
}

#[test]
fn converter_table_is_cached_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    assert!(!store.has(CACHE_KEY));

    let first = mapper(MapperConfig::parse(CONFIG).unwrap(), Some(&store as &dyn MemoStore));
    assert!(store.has(CACHE_KEY));

    let reopened = FileStore::open(dir.path()).unwrap();
    let second = mapper(MapperConfig::parse(CONFIG).unwrap(), Some(&reopened as &dyn MemoStore));
    assert_eq!(first.registry().table(), second.registry().table());
    assert_eq!(second.convert(&"12".into(), "integer", None).unwrap(), Some(Value::Integer(12)));
}
