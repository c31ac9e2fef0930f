//! Detector contract
//!
//! Every pluggable analyzer implements [`Detector`]. Shared identity and the
//! enabled flag live in a composed [`DetectorBase`], so implementations only
//! write `analyze` and, optionally, `config`.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::models::errors::AppResult;
use crate::models::types::{DetectorInfo, DetectorResult, TransactionRecord};

/// Name, description and enabled flag shared by all detectors
#[derive(Debug)]
pub struct DetectorBase {
    name: String,
    description: String,
    enabled: AtomicBool,
}

impl DetectorBase {
    /// Detectors start enabled
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns the previous value
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }
}

/// Core trait for all transaction risk detectors.
///
/// `analyze` returns a `safe` result when nothing is found; an `Err` is
/// reserved for unexpected conditions and is contained by the engine.
/// Detectors that keep history must synchronize it themselves, since the
/// same instance can be analyzing several transactions at once.
#[async_trait]
pub trait Detector: Send + Sync {
    fn base(&self) -> &DetectorBase;

    /// Run detection on one transaction
    async fn analyze(&self, transaction: &TransactionRecord) -> AppResult<DetectorResult>;

    /// Detector-specific configuration reported through `info`
    fn config(&self) -> Value {
        Value::Null
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn description(&self) -> &str {
        self.base().description()
    }

    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }

    fn enable(&self) {
        self.base().set_enabled(true);
        info!("🟢 Detector {} enabled", self.name());
    }

    fn disable(&self) {
        self.base().set_enabled(false);
        info!("⚪ Detector {} disabled", self.name());
    }

    fn info(&self) -> DetectorInfo {
        DetectorInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            enabled: self.is_enabled(),
            config: self.config(),
        }
    }
}
