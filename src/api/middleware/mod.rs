pub mod tracking;

pub use tracking::TrackingMiddleware;
