pub mod batch;
pub mod importer;
pub mod rows;

pub use batch::{BatchBuilder, InsertBatch, Insertion};
pub use importer::{ImportOptions, ImportReport, import_csv};
