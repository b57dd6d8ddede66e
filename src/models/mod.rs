pub mod alert;
pub mod event;

pub use alert::{DispatchResult, NewAlert, NotificationPayload, Severity, StoredAlert};
pub use event::{EnrichmentResult, GeoInfo, HoneypotEvent};
