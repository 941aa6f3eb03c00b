pub mod cache;
pub mod catalog;
pub mod dashboard;

pub use catalog::ParameterCatalog;
