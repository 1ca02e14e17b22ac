pub mod health;
pub mod ingest;

pub use health::{AppStartTime, HealthService, health_routes};
pub use ingest::{Acknowledgement, IngestService, ingest_routes};
