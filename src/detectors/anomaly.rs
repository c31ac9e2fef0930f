//! Transaction Anomaly Detector
//!
//! Flags transactions that look out of the ordinary for a single sender:
//! - Value above the large-transaction threshold
//! - Submitted during unusual hours (UTC)
//! - Extreme gas price
//! - Rapid sequences from the same sender

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::debug;

use crate::core::detector::{Detector, DetectorBase};
use crate::models::config::AnomalyConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{DetectorResult, RiskLevel, TransactionRecord};
use crate::utils::decoder::{normalize_address, quantity_field, wei_to_eth, wei_to_gwei};

pub struct TransactionAnomalyDetector {
    base: DetectorBase,
    config: AnomalyConfig,
    /// sender -> unix seconds of its last analyzed transaction
    last_seen: DashMap<String, i64>,
}

impl TransactionAnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            base: DetectorBase::new(
                "Transaction Anomaly Detector",
                "Identifies unusual transaction patterns that may indicate security risks",
            ),
            config,
            last_seen: DashMap::new(),
        }
    }

    /// Number of distinct senders seen so far
    pub fn senders_tracked(&self) -> usize {
        self.last_seen.len()
    }

    fn is_unusual_hour(&self, hour: u32) -> bool {
        (self.config.unusual_hour_start..=self.config.unusual_hour_end).contains(&hour)
    }
}

impl Default for TransactionAnomalyDetector {
    fn default() -> Self {
        Self::new(AnomalyConfig::default())
    }
}

/// Transaction time from the optional `timestamp` field, else now
fn transaction_time(tx: &TransactionRecord) -> AppResult<DateTime<Utc>> {
    let Some(secs) = tx.get_u64("timestamp")? else {
        return Ok(Utc::now());
    };
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| AppError::invalid_field("timestamp", "out of range"))
}

#[async_trait]
impl Detector for TransactionAnomalyDetector {
    fn base(&self) -> &DetectorBase {
        &self.base
    }

    async fn analyze(&self, tx: &TransactionRecord) -> AppResult<DetectorResult> {
        let mut result = DetectorResult::new(RiskLevel::Safe);

        let value_wei = quantity_field(tx, "value")?.unwrap_or_default();
        let gas_price_wei = quantity_field(tx, "gasPrice")?.unwrap_or_default();
        let sender = tx.get_str("from")?.map(normalize_address);
        let at = transaction_time(tx)?;

        // 1. Large value
        let value_eth = wei_to_eth(value_wei);
        if value_eth > self.config.large_tx_threshold_eth {
            result.escalate(RiskLevel::Medium);
            result.details.push(format!(
                "Unusually large transaction value: {} ETH (threshold {} ETH)",
                value_eth, self.config.large_tx_threshold_eth
            ));
        }

        // 2. Odd hours compound an earlier finding
        let hour = at.hour();
        if self.is_unusual_hour(hour) {
            let level = if result.risk_level > RiskLevel::Safe {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            };
            result.escalate(level);
            result
                .details
                .push(format!("Transaction at unusual hour ({:02}:00 UTC)", hour));
        }

        // 3. Gas price
        let gas_price_gwei = wei_to_gwei(gas_price_wei);
        if gas_price_gwei > self.config.high_gas_price_gwei {
            result.escalate(RiskLevel::Medium);
            result.details.push(format!(
                "Unusually high gas price: {} Gwei - might be trying to rush something through",
                gas_price_gwei
            ));
        }

        // 4. Rapid sequence from the same sender
        if let Some(sender) = sender.filter(|s| !s.is_empty()) {
            let now = at.timestamp();
            if let Some(previous) = self.last_seen.insert(sender.clone(), now) {
                let gap = now - previous;
                if (0..=self.config.rapid_sequence_window_secs).contains(&gap) {
                    result.escalate(RiskLevel::Low);
                    result.details.push(format!(
                        "Rapid transaction sequence from {} ({}s since previous)",
                        sender, gap
                    ));
                }
            }
        }

        debug!(
            "Anomaly check for {}: {} ({} findings)",
            tx.hash(),
            result.risk_level,
            result.details.len()
        );
        Ok(result)
    }

    fn config(&self) -> Value {
        json!({
            "thresholds": {
                "large_transaction": format!("{} ETH", self.config.large_tx_threshold_eth),
                "unusual_hours": format!(
                    "{}:00 - {}:00",
                    self.config.unusual_hour_start, self.config.unusual_hour_end
                ),
                "high_gas_price": format!("{} Gwei", self.config.high_gas_price_gwei),
                "rapid_sequence_window": format!("{}s", self.config.rapid_sequence_window_secs),
            },
            "senders_tracked": self.senders_tracked(),
        })
    }
}
