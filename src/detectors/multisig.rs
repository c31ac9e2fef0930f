//! Multisig Protection Detector
//!
//! Watches multisig wallet operations for signers outside the wallet's usual
//! set, suspiciously fast signature sequences and under-signed submissions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::debug;

use crate::core::detector::{Detector, DetectorBase};
use crate::models::config::MultisigConfig;
use crate::models::errors::AppResult;
use crate::models::types::{DetectorResult, RiskLevel, TransactionRecord, Trigger};
use crate::utils::constants::MIN_SIGNATURE_GAP_SECS;
use crate::utils::decoder::normalize_address;

/// Signing history of one wallet
#[derive(Debug, Clone)]
pub struct WalletHistory {
    pub transaction_count: u64,
    /// Signers that actually provided signatures
    pub common_signers: HashSet<String>,
    /// Every signer ever listed for the wallet
    pub all_signers: HashSet<String>,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAnomalyKind {
    SignaturesTooClose,
    AcceleratedSignatures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeAnomaly {
    #[serde(rename = "type")]
    pub kind: TimeAnomalyKind,
    pub timestamps: [f64; 2],
    pub difference_seconds: f64,
}

pub struct MultisigDetector {
    base: DetectorBase,
    config: MultisigConfig,
    /// wallet address -> history
    signature_history: DashMap<String, WalletHistory>,
}

impl MultisigDetector {
    pub fn new(config: MultisigConfig) -> Self {
        Self {
            base: DetectorBase::new(
                "Multisig Protection Detector",
                "Detects security threats in multisig wallet operations",
            ),
            config,
            signature_history: DashMap::new(),
        }
    }

    pub fn wallets_monitored(&self) -> usize {
        self.signature_history.len()
    }

    pub fn history(&self, wallet: &str) -> Option<WalletHistory> {
        self.signature_history
            .get(&normalize_address(wallet))
            .map(|h| h.value().clone())
    }

    /// Provided signers that are listed for the wallet but have never signed
    /// before. Empty when the wallet has no history.
    fn unusual_signers(&self, wallet: &str, signers: &[String], provided: &[String]) -> Vec<String> {
        let Some(history) = self.signature_history.get(wallet) else {
            return Vec::new();
        };
        provided
            .iter()
            .filter(|s| !history.common_signers.contains(*s) && signers.contains(*s))
            .cloned()
            .collect()
    }

    fn time_anomalies(&self, timestamps: &[f64]) -> Vec<TimeAnomaly> {
        let mut sorted = timestamps.to_vec();
        sorted.sort_by(f64::total_cmp);

        sorted
            .windows(2)
            .filter_map(|pair| {
                let gap = pair[1] - pair[0];
                let kind = if gap < MIN_SIGNATURE_GAP_SECS {
                    TimeAnomalyKind::SignaturesTooClose
                } else if gap < self.config.time_anomaly_threshold_seconds {
                    TimeAnomalyKind::AcceleratedSignatures
                } else {
                    return None;
                };
                Some(TimeAnomaly {
                    kind,
                    timestamps: [pair[0], pair[1]],
                    difference_seconds: gap,
                })
            })
            .collect()
    }

    fn record_signatures(&self, wallet: &str, signers: &[String], provided: &[String]) {
        let now = Utc::now();
        let mut history = self
            .signature_history
            .entry(wallet.to_string())
            .or_insert_with(|| WalletHistory {
                transaction_count: 0,
                common_signers: HashSet::new(),
                all_signers: HashSet::new(),
                last_update: now,
            });
        history.transaction_count += 1;
        history.common_signers.extend(provided.iter().cloned());
        history.all_signers.extend(signers.iter().cloned());
        history.last_update = now;
    }
}

impl Default for MultisigDetector {
    fn default() -> Self {
        Self::new(MultisigConfig::default())
    }
}

fn normalized_list(tx: &TransactionRecord, field: &str) -> AppResult<Vec<String>> {
    Ok(tx
        .get_str_list(field)?
        .iter()
        .map(|s| normalize_address(s))
        .collect())
}

#[async_trait]
impl Detector for MultisigDetector {
    fn base(&self) -> &DetectorBase {
        &self.base
    }

    async fn analyze(&self, tx: &TransactionRecord) -> AppResult<DetectorResult> {
        let Some(wallet) = tx.get_str("wallet_address")?.map(normalize_address) else {
            return Ok(DetectorResult::safe("Not a multisig transaction"));
        };
        let signers = normalized_list(tx, "signers")?;
        let provided = normalized_list(tx, "provided_signatures")?;
        let required = tx.get_u64("required_signatures")?.unwrap_or(0);
        let timestamps = tx.get_f64_list("signature_timestamps")?;

        let mut result = DetectorResult::new(RiskLevel::Safe);

        let unusual = self.unusual_signers(&wallet, &signers, &provided);
        if !unusual.is_empty() {
            result.add_trigger(
                RiskLevel::High,
                Trigger::new(
                    "unusual_signers",
                    "Detected unusual signers that don't match historical patterns",
                )
                .with_context(json!({ "signers": unusual })),
            );
        }

        let anomalies = self.time_anomalies(&timestamps);
        if !anomalies.is_empty() {
            result.add_trigger(
                RiskLevel::Medium,
                Trigger::new(
                    "time_anomalies",
                    "Detected suspicious timing in signature submissions",
                )
                .with_context(json!({ "details": anomalies })),
            );
        }

        if (provided.len() as u64) < required {
            result.add_trigger(
                RiskLevel::Critical,
                Trigger::new(
                    "quorum_manipulation",
                    "Possible attempt to bypass signature requirements",
                )
                .with_context(json!({ "required": required, "provided": provided.len() })),
            );
        }

        self.record_signatures(&wallet, &signers, &provided);

        if result.triggers.is_empty() {
            result.details.push("No security issues detected".to_string());
        } else {
            result.details = result
                .triggers
                .iter()
                .map(|t| t.description.clone())
                .collect();
        }

        debug!("Multisig check for wallet {}: {}", wallet, result.risk_level);
        Ok(result)
    }

    fn config(&self) -> Value {
        json!({
            "category": "multisig",
            "wallets_monitored": self.wallets_monitored(),
            "configuration": serde_json::to_value(&self.config).unwrap_or(Value::Null),
        })
    }
}
