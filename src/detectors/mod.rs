//! Built-in detectors

pub mod anomaly;
pub mod approvals;
pub mod multisig;

pub use anomaly::TransactionAnomalyDetector;
pub use approvals::ApprovalsDetector;
pub use multisig::MultisigDetector;

use std::sync::Arc;
use tracing::warn;

use crate::core::detector::Detector;
use crate::core::registry::DetectorRegistry;
use crate::models::config::SentryConfig;
use crate::utils::constants::{DETECTOR_APPROVALS, DETECTOR_MULTISIG, DETECTOR_TRANSACTION_ANOMALY};

/// All built-in detectors with their ids, in registration order
pub fn all_detectors(config: &SentryConfig) -> Vec<(&'static str, Arc<dyn Detector>)> {
    vec![
        (
            DETECTOR_TRANSACTION_ANOMALY,
            Arc::new(TransactionAnomalyDetector::new(config.anomaly.clone())) as Arc<dyn Detector>,
        ),
        (
            DETECTOR_APPROVALS,
            Arc::new(ApprovalsDetector::new(config.approvals.clone())) as Arc<dyn Detector>,
        ),
        (
            DETECTOR_MULTISIG,
            Arc::new(MultisigDetector::new(config.multisig.clone())) as Arc<dyn Detector>,
        ),
    ]
}

/// Registry holding every built-in detector, with `disabled_detectors`
/// switched off
pub fn default_registry(config: &SentryConfig) -> DetectorRegistry {
    let mut registry = DetectorRegistry::new();
    for (id, detector) in all_detectors(config) {
        registry.register(id, detector);
    }

    for id in &config.disabled_detectors {
        if !registry.disable(id) {
            warn!("Configured to disable unknown detector '{}'", id);
        }
    }
    registry
}
