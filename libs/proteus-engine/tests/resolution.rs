mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;

use proteus_api::converter::TypeConverter;
use proteus_api::mapping::MappingConfiguration;
use proteus_api::value::Value;
use proteus_engine::catalog::StaticCatalog;
use proteus_engine::error::MappingError;
use proteus_engine::registry::ConverterRegistry;

use common::{Probe, types};

const NAMES: [&str; 8] = ["c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7"];

/// One `string → integer` probe per `(priority, accepts)` entry.
fn registry(entries: &BTreeMap<i32, bool>) -> ConverterRegistry {
    let converters: Vec<Arc<dyn TypeConverter>> = entries
        .iter()
        .zip(NAMES)
        .map(|((priority, accepts), name)| {
            let probe = Probe::new(name, &["string"], "integer", *priority);
            let probe = if *accepts { probe } else { probe.refusing() };
            Arc::new(probe) as Arc<dyn TypeConverter>
        })
        .collect();
    let catalog = Arc::new(StaticCatalog::with_converters(converters).unwrap());
    ConverterRegistry::build(catalog.as_ref(), catalog.clone(), types()).unwrap()
}

fn resolved_name(registry: &ConverterRegistry) -> Result<&'static str, MappingError> {
    registry
        .resolve(&Value::from("7"), "integer", &MappingConfiguration::new())
        .map(|c| c.id().name)
}

proptest! {
    #[test]
    fn highest_accepting_non_negative_priority_wins(
        entries in proptest::collection::btree_map(-5i32..20, any::<bool>(), 1..8)
    ) {
        let registry = registry(&entries);
        let expected = entries
            .iter()
            .zip(NAMES)
            .filter(|((priority, accepts), _)| **priority >= 0 && **accepts)
            .map(|(_, name)| name)
            .last();

        match (resolved_name(&registry), expected) {
            (Ok(name), Some(expected)) => prop_assert_eq!(name, expected),
            (Err(MappingError::NoConverterFound { .. }), None) => {}
            (got, expected) => prop_assert!(false, "got {:?}, expected {:?}", got.map_err(|e| e.to_string()), expected),
        }
    }

    #[test]
    fn resolution_is_deterministic(
        entries in proptest::collection::btree_map(-5i32..20, any::<bool>(), 1..8)
    ) {
        let first = registry(&entries);
        let second = registry(&entries);
        prop_assert_eq!(first.table(), second.table());
        let a = resolved_name(&first).map_err(|e| e.to_string());
        let b = resolved_name(&first).map_err(|e| e.to_string());
        let c = resolved_name(&second).map_err(|e| e.to_string());
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &c);
    }
}

#[test]
fn equal_priorities_are_rejected_at_build() {
    let converters: Vec<Arc<dyn TypeConverter>> = vec![
        Arc::new(Probe::new("first", &["string"], "integer", 3)),
        Arc::new(Probe::new("second", &["string", "float"], "integer", 3)),
    ];
    let catalog = Arc::new(StaticCatalog::with_converters(converters).unwrap());
    let err = ConverterRegistry::build(catalog.as_ref(), catalog.clone(), types()).unwrap_err();
    match err {
        MappingError::DuplicateConverter { source_type, target_type, priority, existing, duplicate } => {
            assert_eq!(source_type, "string");
            assert_eq!(target_type, "integer");
            assert_eq!(priority, 3);
            assert_eq!(existing, "first");
            assert_eq!(duplicate, "second");
        }
        other => panic!("unexpected error: {other}"),
    }
}
