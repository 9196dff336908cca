//! Converters producing structured values: typed collections, records built
//! from their properties, and persisted entities looked up by identity.

use std::sync::Arc;

use proteus_api::converter::TypeConverter;
use proteus_api::hierarchy::TypeSystem;

pub mod array;
pub mod entity;
pub mod object;
pub mod repository;

pub use array::{ArrayConverter, TypedArrayConverter};
pub use entity::EntityConverter;
pub use object::ObjectConverter;
pub use repository::{EntityRepository, InMemoryRepository};

/// Source key naming the concrete class to build.
pub const TYPE_KEY: &str = "__type";
/// Source key carrying the persistence identity.
pub const IDENTITY_KEY: &str = "__identity";

/// Every converter of this crate, sharing one type system and repository.
pub fn converters(types: Arc<TypeSystem>, repository: Arc<dyn EntityRepository>) -> Vec<Arc<dyn TypeConverter>> {
    vec![
        Arc::new(ArrayConverter),
        Arc::new(TypedArrayConverter),
        Arc::new(ObjectConverter::new(Arc::clone(&types))),
        Arc::new(EntityConverter::new(types, repository)),
    ]
}
