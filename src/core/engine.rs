//! Aggregation engine
//! Fans one transaction out to the selected detectors and merges the verdicts

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::detector::Detector;
use super::registry::{DetectorDescriptor, DetectorRegistry};
use super::risk::combine_results;
use crate::models::config::EngineConfig;
use crate::models::errors::AppError;
use crate::models::types::{
    AggregateVerdict, DetectorFailure, DetectorOutcome, DetectorReport, FailureKind,
    TransactionRecord,
};

/// Main engine struct - owns the registry and runs analyses against it
pub struct AnalysisEngine {
    registry: DetectorRegistry,
    config: EngineConfig,
    stats: EngineStats,
}

/// Thread-safe statistics
#[derive(Default)]
struct EngineStats {
    total_analyses: AtomicU64,
    total_dispatched: AtomicU64,
    total_failures: AtomicU64,
    total_timeouts: AtomicU64,
    total_panics: AtomicU64,
    total_latency_ms: AtomicU64,
}

/// Statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStatsSnapshot {
    pub total_analyses: u64,
    pub total_dispatched: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub total_panics: u64,
    pub avg_latency_ms: f64,
}

impl AnalysisEngine {
    pub fn new(registry: DetectorRegistry, config: EngineConfig) -> Self {
        info!(
            "🚀 Analysis engine ready with {} detectors (timeout: {:?}, merge: {:?})",
            registry.len(),
            config.detector_timeout,
            config.merge_policy
        );
        Self {
            registry,
            config,
            stats: EngineStats::default(),
        }
    }

    pub fn with_registry(registry: DetectorRegistry) -> Self {
        Self::new(registry, EngineConfig::default())
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register (or replace) a detector
    pub fn register(&mut self, id: impl Into<String>, detector: Arc<dyn Detector>) {
        self.registry.register(id, detector);
    }

    pub fn enable_detector(&self, id: &str) -> bool {
        self.registry.enable(id)
    }

    pub fn disable_detector(&self, id: &str) -> bool {
        self.registry.disable(id)
    }

    /// Ids of currently enabled detectors
    pub fn active_detectors(&self) -> Vec<&str> {
        self.registry.active_ids()
    }

    pub fn list_detectors(&self) -> Vec<DetectorDescriptor> {
        self.registry.list_all()
    }

    /// Analyze a transaction with every enabled detector, or with the enabled
    /// members of `detector_ids`. Unknown and disabled ids are skipped.
    ///
    /// Detector failures, panics and timeouts never escape: they become
    /// `Failure` entries in the verdict.
    pub async fn analyze_transaction(
        &self,
        transaction: impl Into<Arc<TransactionRecord>>,
        detector_ids: Option<&[&str]>,
    ) -> AggregateVerdict {
        let start = Instant::now();
        let transaction: Arc<TransactionRecord> = transaction.into();
        let analysis_id = Uuid::new_v4();
        let transaction_id = transaction.hash().to_string();

        let selected = self.select(detector_ids);
        if selected.is_empty() {
            warn!(
                "No detectors dispatched for tx {} (analysis {})",
                transaction_id, analysis_id
            );
        }

        // ============================================
        // FAN-OUT: one task per detector
        // ============================================
        let timeout = self.config.detector_timeout;
        let handles: Vec<_> = selected
            .iter()
            .map(|(id, detector)| {
                let id = id.clone();
                let detector = Arc::clone(detector);
                let transaction = Arc::clone(&transaction);
                tokio::spawn(async move {
                    analyze_with_detector(&id, detector.as_ref(), &transaction, timeout).await
                })
            })
            .collect();

        // Dropping this call (caller timeout, select!) cancels every detector
        let _guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());

        // ============================================
        // FAN-IN: wait for all, keep dispatch order
        // ============================================
        let joined = join_all(handles).await;
        let detector_results: Vec<DetectorReport> = selected
            .into_iter()
            .zip(joined)
            .map(|((detector_id, _), joined)| {
                let outcome = joined.unwrap_or_else(|e| join_failure(&detector_id, e));
                DetectorReport {
                    detector_id,
                    outcome,
                }
            })
            .collect();

        let (overall_risk, details) = combine_results(&detector_results, self.config.merge_policy);
        let latency_ms = start.elapsed().as_millis() as u64;
        self.record_stats(&detector_results, latency_ms);

        info!(
            "{} Analysis {} | TX: {} | Risk: {} | Detectors: {} | Latency: {}ms",
            overall_risk.emoji(),
            analysis_id,
            transaction_id,
            overall_risk,
            detector_results.len(),
            latency_ms
        );

        AggregateVerdict {
            analysis_id,
            transaction_id,
            overall_risk,
            details,
            detector_results,
            analyzed_at: Utc::now(),
            latency_ms,
        }
    }

    /// Resolve the requested ids to enabled detectors, in dispatch order
    fn select(&self, detector_ids: Option<&[&str]>) -> Vec<(String, Arc<dyn Detector>)> {
        let candidates: Vec<(String, Arc<dyn Detector>)> = match detector_ids {
            Some(ids) => {
                let mut seen = HashSet::new();
                ids.iter()
                    .copied()
                    .filter(|id| seen.insert(*id))
                    .filter_map(|id| match self.registry.get(id) {
                        Some(detector) => Some((id.to_string(), detector)),
                        None => {
                            debug!("Ignoring unknown detector id '{}'", id);
                            None
                        }
                    })
                    .collect()
            }
            None => self
                .registry
                .list_all()
                .into_iter()
                .map(|d| (d.id, d.detector))
                .collect(),
        };

        candidates
            .into_iter()
            .filter(|(id, detector)| {
                let enabled = detector.is_enabled();
                if !enabled {
                    debug!("Skipping disabled detector '{}'", id);
                }
                enabled
            })
            .collect()
    }

    fn record_stats(&self, reports: &[DetectorReport], latency_ms: u64) {
        self.stats.total_analyses.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_dispatched
            .fetch_add(reports.len() as u64, Ordering::Relaxed);
        self.stats.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        for failure in reports.iter().filter_map(|r| r.outcome.failure()) {
            self.stats.total_failures.fetch_add(1, Ordering::Relaxed);
            match failure.kind {
                FailureKind::Timeout => {
                    self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                }
                FailureKind::Panic => {
                    self.stats.total_panics.fetch_add(1, Ordering::Relaxed);
                }
                FailureKind::Error => {}
            }
        }
    }

    /// Get current statistics
    pub fn stats(&self) -> EngineStatsSnapshot {
        let analyses = self.stats.total_analyses.load(Ordering::Relaxed);
        let total_latency = self.stats.total_latency_ms.load(Ordering::Relaxed);

        EngineStatsSnapshot {
            total_analyses: analyses,
            total_dispatched: self.stats.total_dispatched.load(Ordering::Relaxed),
            total_failures: self.stats.total_failures.load(Ordering::Relaxed),
            total_timeouts: self.stats.total_timeouts.load(Ordering::Relaxed),
            total_panics: self.stats.total_panics.load(Ordering::Relaxed),
            avg_latency_ms: if analyses > 0 {
                total_latency as f64 / analyses as f64
            } else {
                0.0
            },
        }
    }
}

/// Run a single detector, converting an error or an expired deadline into a
/// contained `Failure`. Never propagates.
pub async fn analyze_with_detector(
    detector_id: &str,
    detector: &dyn Detector,
    transaction: &TransactionRecord,
    timeout: Option<Duration>,
) -> DetectorOutcome {
    let start = Instant::now();
    let analysis = detector.analyze(transaction);

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, analysis).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "⏱️ {} after {}ms",
                    AppError::detector_timeout(detector_id),
                    limit.as_millis()
                );
                return DetectorOutcome::Failure(DetectorFailure::timeout());
            }
        },
        None => analysis.await,
    };

    match result {
        Ok(result) => {
            debug!(
                "Detector {} analysis complete: {} in {}ms",
                detector_id,
                result.risk_level,
                start.elapsed().as_millis()
            );
            DetectorOutcome::Success(result)
        }
        Err(e) => {
            error!("❌ Error in detector {}: {}", detector_id, e);
            DetectorOutcome::Failure(DetectorFailure::from_error(FailureKind::Error, &e))
        }
    }
}

/// Aborts the detector tasks of one analysis when dropped. Finished tasks
/// are unaffected.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// A detector task that did not return: it panicked (or was cancelled)
fn join_failure(detector_id: &str, err: JoinError) -> DetectorOutcome {
    let message = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "detector task was cancelled".to_string()
    };
    error!("💥 Detector {} panicked: {}", detector_id, message);
    let err = AppError::detector_panicked(message);
    DetectorOutcome::Failure(DetectorFailure::from_error(FailureKind::Panic, &err))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "detector panicked".to_string()
    }
}
