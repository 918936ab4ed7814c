pub mod catalog;
pub mod generators;
pub mod types;
