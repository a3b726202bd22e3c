//! Demo configuration: schema, loading, and validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{LoadResult, LoadWarning, load_config};
pub use schema::{
    DelayConfig, DemoConfig, LocaleConfig, LookupConfig, RegionEntry, ServiceConfig,
    SnapshotConfig, TimelineConfig,
};
pub use validation::{ValidationResult, Validator};
