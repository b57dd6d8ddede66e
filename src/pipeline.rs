//! Background event ingestion pipeline
//!
//! Events flow through a bounded queue into a worker pool. Each worker
//! takes an event through enrich -> persist -> notify. Persistence is
//! the success boundary: enrichment failures degrade to partial data,
//! notification failures are logged but never mark the event failed,
//! and a persistence failure is terminal for the event (with a
//! best-effort secondary error record).

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::alerting::NotificationDispatcher;
use crate::enrichment::EnrichmentService;
use crate::models::{DispatchResult, HoneypotEvent, NewAlert, NotificationPayload, Severity, StoredAlert};
use crate::persistence::{AlertStore, PersistenceError};

/// Errors internal to per-event processing
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Storage task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Notification seam so the pipeline can be tested against a stub.
pub trait Notifier: Send + Sync {
    fn notify<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = DispatchResult> + Send + 'a>>;
}

impl Notifier for NotificationDispatcher {
    fn notify<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = DispatchResult> + Send + 'a>> {
        Box::pin(self.dispatch_throttled(payload))
    }
}

/// Pipeline counters, readable at any time
#[derive(Debug, Default)]
pub struct PipelineCounters {
    processed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    queued: AtomicU64,
}

/// Snapshot of the counters for the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub processed: u64,
    pub failed: u64,
    pub dropped: u64,
    pub queued: u64,
}

impl PipelineCounters {
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
        }
    }
}

struct PipelineInner {
    enrichment: Arc<EnrichmentService>,
    store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    counters: PipelineCounters,
}

/// Bounded ingestion queue with a worker pool draining it
pub struct EventIngestionPipeline {
    tx: Mutex<Option<mpsc::Sender<HoneypotEvent>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    inner: Arc<PipelineInner>,
}

impl EventIngestionPipeline {
    pub fn new(
        enrichment: Arc<EnrichmentService>,
        store: Arc<dyn AlertStore>,
        notifier: Arc<dyn Notifier>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<HoneypotEvent>(queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let inner = Arc::new(PipelineInner {
            enrichment,
            store,
            notifier,
            counters: PipelineCounters::default(),
        });

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            let inner = Arc::clone(&inner);
            handles.push(tokio::spawn(async move {
                loop {
                    let event = { rx.lock().await.recv().await };
                    let Some(event) = event else { break };
                    inner.counters.queued.fetch_sub(1, Ordering::Relaxed);
                    inner.process_event(event).await;
                }
                log::debug!("Pipeline worker {} exiting", worker_id);
            }));
        }
        log::info!("Ingestion pipeline started with {} workers", workers);

        EventIngestionPipeline {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            inner,
        }
    }

    /// Validate and enqueue an event for background processing.
    ///
    /// Returns false when the event carries an unparseable source IP or
    /// the queue is full; neither case reaches enrichment or storage.
    pub fn submit(&self, event: HoneypotEvent) -> bool {
        if event.source_ip.parse::<IpAddr>().is_err() {
            // Malformed input is often spoofed traffic; drop quietly.
            log::warn!("Dropping event with invalid source IP: {}", event.source_ip);
            self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let guard = self.tx.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            log::warn!("Pipeline is shut down, dropping event from {}", event.source_ip);
            self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match tx.try_send(event) {
            Ok(()) => {
                self.inner.counters.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                log::warn!("Ingestion queue full, dropping event from {}", event.source_ip);
                self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                log::warn!("Ingestion queue closed, dropping event from {}", event.source_ip);
                self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.inner.counters.snapshot()
    }

    /// Close the queue and wait for the workers to drain it.
    pub async fn shutdown(&self) {
        // Dropping the sender closes the channel; recv keeps yielding
        // already-queued events until empty.
        self.tx.lock().unwrap().take();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Pipeline worker panicked during shutdown: {}", e);
            }
        }
        log::info!("Ingestion pipeline drained and stopped");
    }
}

impl PipelineInner {
    async fn process_event(&self, event: HoneypotEvent) {
        let source_ip = event.source_ip.clone();
        log::info!("Processing honeypot event from {}", source_ip);

        let enrichment = self.enrichment.enrich(&source_ip).await;
        log::debug!(
            "Enrichment for {}: geo={} score={:?}",
            source_ip,
            enrichment.geo.is_some(),
            enrichment.reputation_score
        );

        let triggered_at = event
            .timestamp
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let payload = serde_json::to_value(&event).unwrap_or_else(|e| {
            log::warn!("Could not serialize raw event from {}: {}", source_ip, e);
            serde_json::Value::Null
        });

        let alert = NewAlert {
            alert_type: "Honeypot Triggered".to_string(),
            source_ip: source_ip.clone(),
            severity: Severity::Medium,
            enrichment,
            payload: payload.clone(),
            triggered_at,
        };

        let stored = match self.persist(alert).await {
            Ok(stored) => stored,
            Err(e) => {
                log::error!("Failed to persist alert for {}: {}", source_ip, e);
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.record_processing_error(&source_ip, &e.to_string(), payload)
                    .await;
                return;
            }
        };
        log::info!("Alert {} stored for {}", stored.id, source_ip);

        let notification = stored.to_notification_payload();
        let results = self.notifier.notify(&notification).await;
        if results.values().any(|ok| !ok) {
            let failed: Vec<&str> = results
                .iter()
                .filter(|(_, ok)| !**ok)
                .map(|(name, _)| name.as_str())
                .collect();
            log::warn!(
                "Alert {} delivery incomplete, failed channels: {}",
                stored.id,
                failed.join(", ")
            );
        }

        self.counters.processed.fetch_add(1, Ordering::Relaxed);
    }

    async fn persist(&self, alert: NewAlert) -> Result<StoredAlert, PipelineError> {
        let store = Arc::clone(&self.store);
        let stored =
            tokio::task::spawn_blocking(move || store.create_alert(&alert)).await??;
        Ok(stored)
    }

    /// Best-effort secondary record so a processing failure is not a
    /// silent loss of the original signal.
    async fn record_processing_error(
        &self,
        source_ip: &str,
        error: &str,
        original_payload: serde_json::Value,
    ) {
        let store = Arc::clone(&self.store);
        let source_ip = source_ip.to_string();
        let error = error.to_string();
        let result = tokio::task::spawn_blocking(move || {
            store.create_processing_error(&source_ip, &error, &original_payload)
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Failed to record processing error: {}", e),
            Err(e) => log::error!("Processing-error task failed: {}", e),
        }
    }
}
