pub mod converter;
pub mod error;
pub mod hierarchy;
pub mod mapping;
pub mod messages;
pub mod options;
pub mod types;
pub mod value;
