//! Approvals Security Detector
//!
//! Inspects ERC20 approval transactions for malicious spenders, unlimited
//! allowances, allowances close to the user's balance and spenders the user
//! has never approved before.

use alloy_primitives::U256;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::core::detector::{Detector, DetectorBase};
use crate::models::config::ApprovalsConfig;
use crate::models::errors::AppResult;
use crate::models::types::{DetectorResult, RiskLevel, TransactionRecord, Trigger};
use crate::utils::constants::UNLIMITED_APPROVAL_RATIO_PCT;
use crate::utils::decoder::{
    decode_approval, decode_hex, is_approval_selector, normalize_address, parse_quantity,
    selector, u256_to_f64,
};

/// Per-user approval history
#[derive(Debug, Clone, Default)]
pub struct ApprovalHistory {
    pub approved_contracts: HashSet<String>,
    pub approved_tokens: HashSet<String>,
    pub approval_count: u64,
}

/// A numeric field as supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Amount {
    Absent,
    Parsed(U256),
    Unparsable,
}

impl Amount {
    fn read(tx: &TransactionRecord, field: &str) -> Self {
        match tx.get(field) {
            None => Amount::Absent,
            Some(Value::String(s)) => parse_quantity(s)
                .map(Amount::Parsed)
                .unwrap_or(Amount::Unparsable),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|v| Amount::Parsed(U256::from(v)))
                .unwrap_or(Amount::Unparsable),
            Some(_) => Amount::Unparsable,
        }
    }
}

/// Outcome of comparing the approved amount with the balance
#[derive(Debug, Clone, Copy, PartialEq)]
enum BalanceRisk {
    Acceptable,
    NoBalance,
    Share { level: RiskLevel, percentage: f64 },
    Incomparable,
}

pub struct ApprovalsDetector {
    base: DetectorBase,
    config: ApprovalsConfig,
    known_malicious_contracts: DashSet<String>,
    known_safe_contracts: DashSet<String>,
    /// user id -> approval history
    approval_history: DashMap<String, ApprovalHistory>,
}

impl ApprovalsDetector {
    pub fn new(config: ApprovalsConfig) -> Self {
        Self {
            base: DetectorBase::new(
                "Approvals Security Detector",
                "Detects malicious or risky approvals in blockchain transactions",
            ),
            config,
            known_malicious_contracts: DashSet::new(),
            known_safe_contracts: DashSet::new(),
            approval_history: DashMap::new(),
        }
    }

    /// Add a contract to the known malicious list
    pub fn add_malicious_contract(&self, address: &str) {
        self.known_malicious_contracts
            .insert(normalize_address(address));
    }

    /// Add a contract to the known safe list
    pub fn add_safe_contract(&self, address: &str) {
        self.known_safe_contracts.insert(normalize_address(address));
    }

    pub fn users_monitored(&self) -> usize {
        self.approval_history.len()
    }

    /// Snapshot of one user's history
    pub fn history(&self, user_id: &str) -> Option<ApprovalHistory> {
        self.approval_history.get(user_id).map(|h| h.value().clone())
    }

    /// Approval if the selector (from `method_id` or calldata) is an allowance
    /// call, or if `type` mentions "approval"
    fn is_approval(tx_type: &str, method_id: &str, input: &str) -> bool {
        let sel = if method_id.is_empty() {
            selector(input)
        } else {
            selector(method_id)
        };
        if sel.as_ref().is_some_and(is_approval_selector) {
            return true;
        }
        tx_type.to_lowercase().contains("approval")
    }

    fn is_unlimited(&self, amount: U256) -> bool {
        if amount.is_zero() {
            return false;
        }
        let max = match parse_quantity(&self.config.max_recommended_approval_amount) {
            Ok(max) => max,
            Err(e) => {
                warn!("Invalid max_recommended_approval_amount: {}", e);
                return false;
            }
        };
        amount >= unlimited_cutoff(max)
    }

    fn balance_risk(&self, amount: Amount, balance: Amount) -> BalanceRisk {
        match (amount, balance) {
            (Amount::Absent, _) | (_, Amount::Absent) => BalanceRisk::Acceptable,
            (Amount::Parsed(amount), Amount::Parsed(balance)) => {
                if balance.is_zero() {
                    return if amount.is_zero() {
                        BalanceRisk::Acceptable
                    } else {
                        BalanceRisk::NoBalance
                    };
                }
                let percentage = u256_to_f64(amount) / u256_to_f64(balance) * 100.0;
                let level = if percentage >= 100.0 {
                    RiskLevel::High
                } else if percentage >= self.config.high_amount_threshold_percentage as f64 {
                    RiskLevel::Medium
                } else {
                    return BalanceRisk::Acceptable;
                };
                BalanceRisk::Share { level, percentage }
            }
            _ => BalanceRisk::Incomparable,
        }
    }

    /// Why this approval is unusual for the user, if it is
    fn unusual_pattern(&self, user_id: &str, spender: &str) -> Option<Value> {
        let Some(history) = self.approval_history.get(user_id) else {
            return Some(json!({ "reason": "first_approval" }));
        };
        if !history.approved_contracts.contains(spender) {
            return Some(json!({
                "reason": "new_approval_target",
                "details": "You haven't interacted with this contract before",
            }));
        }
        None
    }

    fn record_approval(&self, user_id: &str, spender: &str, token: &str) {
        let mut history = self
            .approval_history
            .entry(user_id.to_string())
            .or_default();
        history.approved_contracts.insert(spender.to_string());
        history.approved_tokens.insert(token.to_string());
        history.approval_count += 1;
    }
}

/// `UNLIMITED_APPROVAL_RATIO_PCT` percent of `max`, without overflowing near `U256::MAX`
fn unlimited_cutoff(max: U256) -> U256 {
    let slack = max / U256::from(100u64) * U256::from(100 - UNLIMITED_APPROVAL_RATIO_PCT);
    max - slack
}

impl Default for ApprovalsDetector {
    fn default() -> Self {
        Self::new(ApprovalsConfig::default())
    }
}

#[async_trait]
impl Detector for ApprovalsDetector {
    fn base(&self) -> &DetectorBase {
        &self.base
    }

    async fn analyze(&self, tx: &TransactionRecord) -> AppResult<DetectorResult> {
        let tx_type = tx.get_str_or_empty("type")?;
        let method_id = tx.get_str_or_empty("method_id")?;
        let input = tx.get_str_or_empty("input")?;

        if !Self::is_approval(tx_type, method_id, input) {
            return Ok(DetectorResult::safe("Not an approval transaction"));
        }

        // Calldata fills in whatever the caller did not supply
        let decoded = decode_hex(input).and_then(|data| decode_approval(&data));
        let spender = match tx.get_str("to")? {
            Some(to) => normalize_address(to),
            None => decoded
                .as_ref()
                .map(|p| normalize_address(&p.spender.to_string()))
                .unwrap_or_default(),
        };
        let amount = match (Amount::read(tx, "amount"), &decoded) {
            (Amount::Absent, Some(params)) => Amount::Parsed(params.amount),
            (amount, _) => amount,
        };
        let balance = Amount::read(tx, "token_balance");
        let user_id = tx.get_str_or_empty("user_id")?;
        let token = normalize_address(tx.get_str_or_empty("token_address")?);

        let mut result = DetectorResult::new(RiskLevel::Safe);

        // 1. Known malicious spender
        if self.known_malicious_contracts.contains(&spender) {
            result.add_trigger(
                RiskLevel::Critical,
                Trigger::new(
                    "malicious_contract",
                    "Approval requested by a known malicious contract",
                )
                .with_context(json!({ "contract": spender })),
            );
        }

        // 2. Unlimited allowance
        if let Amount::Parsed(value) = amount {
            if self.config.unlimited_approval_alert && self.is_unlimited(value) {
                result.add_trigger(
                    RiskLevel::High,
                    Trigger::new(
                        "unlimited_approval",
                        "Transaction grants unlimited approval for your tokens",
                    )
                    .with_recommendation("Consider setting a specific approval limit"),
                );
            }
        }

        // 3. Allowance relative to holdings
        let balance_trigger = match self.balance_risk(amount, balance) {
            BalanceRisk::Acceptable => None,
            BalanceRisk::NoBalance => Some((
                RiskLevel::Medium,
                "Approval amount is high relative to your balance (0.00%): no balance held"
                    .to_string(),
            )),
            BalanceRisk::Share { level, percentage } => Some((
                level,
                format!(
                    "Approval amount is high relative to your balance ({:.2}%)",
                    percentage
                ),
            )),
            BalanceRisk::Incomparable => Some((
                RiskLevel::Unknown,
                "Approval amount could not be compared to your balance".to_string(),
            )),
        };
        if let Some((level, description)) = balance_trigger {
            result.add_trigger(
                level,
                Trigger::new("high_approval_amount", description)
                    .with_recommendation("Consider approving a smaller amount"),
            );
        }

        // 4. Pattern vs. this user's history
        if !self.known_safe_contracts.contains(&spender) {
            if let Some(pattern) = self.unusual_pattern(user_id, &spender) {
                result.add_trigger(
                    RiskLevel::Medium,
                    Trigger::new(
                        "unusual_pattern",
                        "This approval doesn't match your usual patterns",
                    )
                    .with_context(pattern),
                );
            }
        }

        self.record_approval(user_id, &spender, &token);

        if result.triggers.is_empty() {
            result.details.push("No issues detected with this approval".to_string());
        } else {
            result.details = result
                .triggers
                .iter()
                .map(|t| t.description.clone())
                .collect();
        }

        debug!(
            "Approval check for {} (spender {}): {}",
            tx.hash(),
            spender,
            result.risk_level
        );
        Ok(result)
    }

    fn config(&self) -> Value {
        json!({
            "category": "approvals",
            "users_monitored": self.users_monitored(),
            "configuration": serde_json::to_value(&self.config).unwrap_or(Value::Null),
            "malicious_contracts_count": self.known_malicious_contracts.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::MAX_RECOMMENDED_APPROVAL_AMOUNT;

    const SPENDER: &str = "0x11111111111111111111111111111111111111aa";

    fn approval() -> TransactionRecord {
        TransactionRecord::new()
            .with("hash", "0xapprove")
            .with("method_id", "0x095ea7b3")
            .with("to", SPENDER)
            .with("user_id", "alice")
            .with("token_address", "0xToken")
            .with("amount", "100")
            .with("token_balance", "1000")
    }

    fn kinds(result: &DetectorResult) -> Vec<&str> {
        result.triggers.iter().map(|t| t.kind.as_str()).collect()
    }

    #[tokio::test]
    async fn test_non_approval_is_safe() {
        let detector = ApprovalsDetector::default();
        let tx = TransactionRecord::new().with("method_id", "0xa9059cbb");
        let result = detector.analyze(&tx).await.unwrap();
        assert_eq!(result.risk_level, RiskLevel::Safe);
        assert_eq!(result.details, vec!["Not an approval transaction"]);
        assert_eq!(detector.users_monitored(), 0);
    }

    #[tokio::test]
    async fn test_type_field_marks_approval() {
        let detector = ApprovalsDetector::default();
        let tx = TransactionRecord::new().with("type", "Token APPROVAL");
        let result = detector.analyze(&tx).await.unwrap();
        assert_eq!(kinds(&result), vec!["unusual_pattern"]);
    }

    #[tokio::test]
    async fn test_first_then_repeat_approval() {
        let detector = ApprovalsDetector::default();

        let first = detector.analyze(&approval()).await.unwrap();
        assert_eq!(first.risk_level, RiskLevel::Medium);
        assert_eq!(first.triggers[0].context.as_ref().unwrap()["reason"], "first_approval");

        let repeat = detector.analyze(&approval()).await.unwrap();
        assert_eq!(repeat.risk_level, RiskLevel::Safe);
        assert_eq!(repeat.details, vec!["No issues detected with this approval"]);

        let history = detector.history("alice").unwrap();
        assert_eq!(history.approval_count, 2);
        assert!(history.approved_tokens.contains("0xtoken"));
    }

    #[tokio::test]
    async fn test_new_spender_for_known_user() {
        let detector = ApprovalsDetector::default();
        detector.analyze(&approval()).await.unwrap();

        let tx = approval().with("to", "0x2222222222222222222222222222222222222222");
        let result = detector.analyze(&tx).await.unwrap();
        assert_eq!(
            result.triggers[0].context.as_ref().unwrap()["reason"],
            "new_approval_target"
        );
    }

    #[tokio::test]
    async fn test_malicious_contract_is_critical() {
        let detector = ApprovalsDetector::default();
        detector.add_malicious_contract(&SPENDER.to_uppercase());

        let result = detector.analyze(&approval()).await.unwrap();
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert_eq!(kinds(&result)[0], "malicious_contract");
        assert_eq!(detector.config()["malicious_contracts_count"], 1);
    }

    #[tokio::test]
    async fn test_unlimited_approval_is_high() {
        let detector = ApprovalsDetector::default();
        detector.add_safe_contract(SPENDER);

        let tx = approval()
            .with("amount", MAX_RECOMMENDED_APPROVAL_AMOUNT)
            .with("token_balance", Value::Null);
        let result = detector.analyze(&tx).await.unwrap();
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(kinds(&result), vec!["unlimited_approval"]);
    }

    #[tokio::test]
    async fn test_amount_relative_to_balance() {
        let detector = ApprovalsDetector::default();
        detector.add_safe_contract(SPENDER);

        let result = detector
            .analyze(&approval().with("amount", "850"))
            .await
            .unwrap();
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!(result.details[0].contains("85.00%"));

        let result = detector
            .analyze(&approval().with("amount", "1500"))
            .await
            .unwrap();
        assert_eq!(result.risk_level, RiskLevel::High);

        let result = detector
            .analyze(&approval().with("token_balance", "0"))
            .await
            .unwrap();
        assert_eq!(result.risk_level, RiskLevel::Medium);

        let result = detector
            .analyze(&approval().with("token_balance", "lots"))
            .await
            .unwrap();
        assert_eq!(result.risk_level, RiskLevel::Unknown);
    }

    #[test]
    fn test_unlimited_cutoff_with_full_uint256_max() {
        let detector = ApprovalsDetector::new(ApprovalsConfig {
            max_recommended_approval_amount: U256::MAX.to_string(),
            ..ApprovalsConfig::default()
        });

        assert!(!detector.is_unlimited(U256::MAX / U256::from(50u64)));
        assert!(!detector.is_unlimited(U256::MAX / U256::from(2u64)));
        assert!(detector.is_unlimited(U256::MAX - U256::MAX / U256::from(20u64)));
        assert!(detector.is_unlimited(U256::MAX));
    }

    #[test]
    fn test_unlimited_cutoff_with_default_reference() {
        let detector = ApprovalsDetector::default();
        let max: U256 = MAX_RECOMMENDED_APPROVAL_AMOUNT.parse().unwrap();

        assert!(!detector.is_unlimited(max / U256::from(100u64) * U256::from(89u64)));
        assert!(detector.is_unlimited(max / U256::from(100u64) * U256::from(91u64)));
        assert!(!detector.is_unlimited(U256::ZERO));
    }

    #[tokio::test]
    async fn test_calldata_supplies_spender_and_amount() {
        let detector = ApprovalsDetector::default();
        detector.add_malicious_contract(SPENDER);

        let input = format!(
            "0x095ea7b3{:0>64}{:0>64}",
            &SPENDER[2..],
            "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
        );
        let tx = TransactionRecord::new()
            .with("input", input)
            .with("user_id", "bob");
        let result = detector.analyze(&tx).await.unwrap();

        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert_eq!(
            kinds(&result),
            vec!["malicious_contract", "unlimited_approval", "unusual_pattern"]
        );
    }
}
