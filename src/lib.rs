pub mod alerting;
pub mod api;
pub mod cache;
pub mod config;
pub mod enrichment;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod ratelimit;

// Re-export commonly used types
pub use alerting::{ChannelAlerter, NotificationDispatcher, RetryPolicy};
pub use cache::TtlCache;
pub use enrichment::EnrichmentService;
pub use models::{DispatchResult, HoneypotEvent, NotificationPayload, Severity};
pub use persistence::{AlertStore, SqliteAlertStore};
pub use pipeline::EventIngestionPipeline;
pub use ratelimit::SlidingWindowLimiter;
