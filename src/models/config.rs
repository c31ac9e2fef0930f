//! Configuration module for Web3 Sentry
//!
//! Defaults live in `utils/constants.rs`; every value can be overridden
//! from the environment through `SentryConfig::from_env`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use super::errors::{AppError, AppResult};
use crate::utils::constants::{
    DEFAULT_DETECTOR_TIMEOUT_MS, DEFAULT_HIGH_AMOUNT_THRESHOLD_PCT, DEFAULT_HIGH_GAS_PRICE_GWEI,
    DEFAULT_LARGE_TX_THRESHOLD_ETH, DEFAULT_QUORUM_BYPASS_THRESHOLD,
    DEFAULT_RAPID_SEQUENCE_WINDOW_SECS, DEFAULT_TIME_ANOMALY_THRESHOLD_SECS,
    DEFAULT_UNUSUAL_HOUR_END, DEFAULT_UNUSUAL_HOUR_START, DEFAULT_UNUSUAL_SIGNER_THRESHOLD,
    ENV_DETECTOR_TIMEOUT_MS, ENV_DISABLED_DETECTORS, ENV_MERGE_POLICY,
    MAX_RECOMMENDED_APPROVAL_AMOUNT,
};

/// Which per-detector entries feed the overall risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Failed detectors count as `error` and can raise the overall risk
    #[default]
    IncludeFailures,
    /// Only successful results are ranked; failures stay visible per detector
    SuccessfulOnly,
}

impl MergePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "include_failures" => Some(Self::IncludeFailures),
            "successful_only" => Some(Self::SuccessfulOnly),
            _ => None,
        }
    }
}

/// Aggregation engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Per-detector deadline; `None` waits forever
    pub detector_timeout: Option<Duration>,
    pub merge_policy: MergePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detector_timeout: Some(Duration::from_millis(DEFAULT_DETECTOR_TIMEOUT_MS)),
            merge_policy: MergePolicy::IncludeFailures,
        }
    }
}

impl EngineConfig {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.detector_timeout = timeout;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }
}

/// Thresholds for the transaction anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Transfers above this many ETH are unusually large
    pub large_tx_threshold_eth: f64,
    /// First hour (UTC, inclusive) of the suspicious window
    pub unusual_hour_start: u32,
    /// Last hour (UTC, inclusive) of the suspicious window
    pub unusual_hour_end: u32,
    pub high_gas_price_gwei: f64,
    /// Two transactions from one sender within this window are a rapid sequence
    pub rapid_sequence_window_secs: i64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            large_tx_threshold_eth: DEFAULT_LARGE_TX_THRESHOLD_ETH,
            unusual_hour_start: DEFAULT_UNUSUAL_HOUR_START,
            unusual_hour_end: DEFAULT_UNUSUAL_HOUR_END,
            high_gas_price_gwei: DEFAULT_HIGH_GAS_PRICE_GWEI,
            rapid_sequence_window_secs: DEFAULT_RAPID_SEQUENCE_WINDOW_SECS,
        }
    }
}

/// Thresholds for the approvals detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalsConfig {
    /// Alert on unlimited token approvals
    pub unlimited_approval_alert: bool,
    /// Alert when the approval exceeds this share of the holder's balance
    pub high_amount_threshold_percentage: u64,
    /// Approvals at or above 90% of this amount are treated as unlimited
    pub max_recommended_approval_amount: String,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            unlimited_approval_alert: true,
            high_amount_threshold_percentage: DEFAULT_HIGH_AMOUNT_THRESHOLD_PCT,
            max_recommended_approval_amount: MAX_RECOMMENDED_APPROVAL_AMOUNT.to_string(),
        }
    }
}

/// Thresholds for the multisig detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultisigConfig {
    pub time_anomaly_threshold_seconds: f64,
    pub unusual_signer_threshold: f64,
    pub quorum_bypass_threshold: f64,
}

impl Default for MultisigConfig {
    fn default() -> Self {
        Self {
            time_anomaly_threshold_seconds: DEFAULT_TIME_ANOMALY_THRESHOLD_SECS,
            unusual_signer_threshold: DEFAULT_UNUSUAL_SIGNER_THRESHOLD,
            quorum_bypass_threshold: DEFAULT_QUORUM_BYPASS_THRESHOLD,
        }
    }
}

/// Configuration for the Web3 Sentry
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub engine: EngineConfig,
    /// Detector ids registered but switched off at startup
    pub disabled_detectors: Vec<String>,
    pub anomaly: AnomalyConfig,
    pub approvals: ApprovalsConfig,
    pub multisig: MultisigConfig,
}

impl SentryConfig {
    /// Defaults overridden by `SENTRY_*` environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_DETECTOR_TIMEOUT_MS) {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| AppError::invalid_config(ENV_DETECTOR_TIMEOUT_MS, &raw))?;
            // 0 disables the deadline
            config.engine.detector_timeout = (ms > 0).then(|| Duration::from_millis(ms));
            info!("⏱️ Detector timeout: {:?}", config.engine.detector_timeout);
        }

        if let Some(raw) = lookup(ENV_MERGE_POLICY) {
            config.engine.merge_policy = MergePolicy::parse(&raw)
                .ok_or_else(|| AppError::invalid_config(ENV_MERGE_POLICY, &raw))?;
        }

        if let Some(raw) = lookup(ENV_DISABLED_DETECTORS) {
            config.disabled_detectors = raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }
}
