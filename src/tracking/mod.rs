//! 采集核心：UA 分类、维度解析、请求管线、性能条目写入、隐私

pub mod classifier;
pub mod performance;
pub mod pipeline;
pub mod privacy;
pub mod resolver;

pub use classifier::{CapabilityHints, Classification, DeviceType, UserAgentClassifier};
pub use performance::{IngestResponse, PerformanceEntryPayload, PerformanceIngestor};
pub use pipeline::{AuthenticatedUser, RequestSnapshot, SkipReason, TrackOutcome, TrackingPipeline};
pub use privacy::PrivacyService;
pub use resolver::DimensionResolver;
