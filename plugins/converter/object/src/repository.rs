use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use proteus_api::error::ConverterError;
use proteus_api::hierarchy::TypeSystem;
use proteus_api::value::{Record, Value};

/// Persistence seam of the entity converter.
///
/// Lookups are blocking calls made while a conversion runs. Instances of
/// subclasses of `class` count as matches.
pub trait EntityRepository: Send + Sync {
    fn find_by_identifier(&self, class: &str, identity: &str) -> Result<Option<Record>, ConverterError>;

    /// The one record whose fields equal all of `properties`. More than one
    /// match is an error.
    fn find_by_properties(
        &self,
        class: &str,
        properties: &IndexMap<String, Value>,
    ) -> Result<Option<Record>, ConverterError>;
}

// ═══════════════════════════════════════════════════════════════
//  InMemoryRepository
// ═══════════════════════════════════════════════════════════════

pub struct InMemoryRepository {
    types: Arc<TypeSystem>,
    records: RwLock<Vec<Record>>,
}

impl InMemoryRepository {
    pub fn new(types: Arc<TypeSystem>) -> Self {
        Self {
            types,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Store a record, replacing one of the same class and identity.
    pub fn insert(&self, record: Record) -> Result<(), ConverterError> {
        if record.identity.is_none() {
            return Err(ConverterError::source(format!(
                "record of type '{}' has no identity",
                record.class
            )));
        }
        let mut records = self.records.write();
        match records
            .iter_mut()
            .find(|r| r.class == record.class && r.identity == record.identity)
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl EntityRepository for InMemoryRepository {
    fn find_by_identifier(&self, class: &str, identity: &str) -> Result<Option<Record>, ConverterError> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| r.identity.as_deref() == Some(identity) && self.types.is_a(&r.class, class))
            .cloned())
    }

    fn find_by_properties(
        &self,
        class: &str,
        properties: &IndexMap<String, Value>,
    ) -> Result<Option<Record>, ConverterError> {
        let records = self.records.read();
        let mut matches = records.iter().filter(|r| {
            self.types.is_a(&r.class, class) && properties.iter().all(|(k, v)| r.get(k) == Some(v))
        });
        let first = matches.next().cloned();
        if matches.next().is_some() {
            return Err(ConverterError::target(format!(
                "more than one object of type '{class}' matches the given identity"
            )));
        }
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use proteus_api::hierarchy::{ClassDef, ClassKind, InterfaceDef};

    use super::*;

    fn repo() -> InMemoryRepository {
        let types = TypeSystem::from_defs(
            Vec::<InterfaceDef>::new(),
            [
                ClassDef::new("User").kind(ClassKind::Entity),
                ClassDef::new("Admin").extends("User").kind(ClassKind::Entity),
            ],
        )
        .unwrap();
        InMemoryRepository::new(Arc::new(types))
    }

    #[test]
    fn finds_subclass_instances_by_identity() {
        let repo = repo();
        repo.insert(Record::new("Admin").with_identity("a1").with_field("name", "root".into()))
            .unwrap();
        assert!(repo.find_by_identifier("User", "a1").unwrap().is_some());
        assert!(repo.find_by_identifier("Admin", "a1").unwrap().is_some());
        assert!(repo.find_by_identifier("User", "zz").unwrap().is_none());
    }

    #[test]
    fn insert_requires_identity_and_replaces() {
        let repo = repo();
        assert!(repo.insert(Record::new("User")).is_err());
        repo.insert(Record::new("User").with_identity("u").with_field("v", 1i64.into())).unwrap();
        repo.insert(Record::new("User").with_identity("u").with_field("v", 2i64.into())).unwrap();
        assert_eq!(repo.len(), 1);
        let found = repo.find_by_identifier("User", "u").unwrap().unwrap();
        assert_eq!(found.get("v"), Some(&Value::Integer(2)));
    }

    #[test]
    fn property_lookup_rejects_ambiguity() {
        let repo = repo();
        repo.insert(Record::new("User").with_identity("1").with_field("email", "a@x".into())).unwrap();
        repo.insert(Record::new("User").with_identity("2").with_field("email", "a@x".into())).unwrap();
        repo.insert(Record::new("User").with_identity("3").with_field("email", "b@x".into())).unwrap();

        let by = |email: &str| IndexMap::from([("email".to_string(), Value::from(email))]);
        assert_eq!(
            repo.find_by_properties("User", &by("b@x")).unwrap().and_then(|r| r.identity),
            Some("3".to_string())
        );
        assert!(repo.find_by_properties("User", &by("none")).unwrap().is_none());
        assert!(repo.find_by_properties("User", &by("a@x")).is_err());
    }
}
