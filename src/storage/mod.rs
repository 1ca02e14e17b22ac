pub mod backend;
pub mod models;
pub mod traits;

pub use backend::SeaOrmStorage;
pub use models::{
    CreationDefaults, DimensionKey, LookupKind, NewPerformanceEntry, PrivacySettings, RequestFact,
    VersionParts,
};
pub use traits::{DimensionStore, FactSink, PrivacyStore};
