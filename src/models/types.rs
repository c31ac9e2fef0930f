//! Type definitions for Web3 Sentry
//! All core data structures for transaction analysis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::errors::{AppError, AppResult};

/// Risk level classification, ordered from least to most severe.
/// Variant order defines the severity order used by every merge; `Error`
/// ranks above `Critical` so a failed detector is never hidden.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RiskLevel {
    /// Measured and clean
    #[default]
    Safe = 0,
    /// Nothing measured, or measurement was inconclusive
    Unknown = 1,
    /// Minor concerns
    Low = 2,
    /// Proceed with caution
    Medium = 3,
    /// Likely to lose funds
    High = 4,
    /// Almost certain loss
    Critical = 5,
    /// Detector failed to produce an assessment
    Error = 6,
}

impl RiskLevel {
    /// All levels from lowest to highest priority
    pub const ALL: [RiskLevel; 7] = [
        RiskLevel::Safe,
        RiskLevel::Unknown,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
        RiskLevel::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Unknown => "unknown",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
            RiskLevel::Error => "error",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "✅",
            RiskLevel::Unknown => "❓",
            RiskLevel::Low => "🟡",
            RiskLevel::Medium => "🟠",
            RiskLevel::High => "🔴",
            RiskLevel::Critical => "💀",
            RiskLevel::Error => "⚠️",
        }
    }

    /// Lenient parse: unrecognized labels map to `Safe` so they never
    /// inflate severity.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(RiskLevel::Safe)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, so the uppercase `LOW/MEDIUM/HIGH/UNKNOWN` labels
/// land on the same levels.
impl FromStr for RiskLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "safe" => Ok(RiskLevel::Safe),
            "unknown" => Ok(RiskLevel::Unknown),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            "error" => Ok(RiskLevel::Error),
            other => Err(AppError::malformed(format!("Unknown risk level: {}", other))),
        }
    }
}

// ============================================
// Transaction record
// ============================================

/// Opaque transaction payload: field name -> JSON value.
///
/// The engine passes it through untouched; detectors pick the fields they
/// understand through the typed accessors below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRecord(Map<String, Value>);

impl TransactionRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from an arbitrary JSON value; only objects are accepted.
    pub fn from_value(value: Value) -> AppResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AppError::malformed(format!(
                "Transaction must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> AppResult<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Transaction hash, or "unknown" when the record carries none
    pub fn hash(&self) -> &str {
        self.get("hash").and_then(Value::as_str).unwrap_or("unknown")
    }

    /// String field. Missing or null is `None`; any other type is an error.
    pub fn get_str(&self, field: &str) -> AppResult<Option<&str>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(AppError::invalid_field(
                field,
                format!("expected string, got {}", json_type(other)),
            )),
        }
    }

    /// String field with an empty-string default
    pub fn get_str_or_empty(&self, field: &str) -> AppResult<&str> {
        Ok(self.get_str(field)?.unwrap_or(""))
    }

    /// Non-negative integer field, given either as a number or a numeric string
    pub fn get_u64(&self, field: &str) -> AppResult<Option<u64>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| AppError::invalid_field(field, "expected non-negative integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|e| AppError::invalid_field(field, e)),
            Some(other) => Err(AppError::invalid_field(
                field,
                format!("expected integer, got {}", json_type(other)),
            )),
        }
    }

    /// List of strings. Missing is an empty list.
    pub fn get_str_list(&self, field: &str) -> AppResult<Vec<String>> {
        match self.get(field) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(AppError::invalid_field(
                        field,
                        format!("expected list of strings, found {}", json_type(other)),
                    )),
                })
                .collect(),
            Some(other) => Err(AppError::invalid_field(
                field,
                format!("expected list, got {}", json_type(other)),
            )),
        }
    }

    /// List of numbers (numeric strings accepted). Missing is an empty list.
    pub fn get_f64_list(&self, field: &str) -> AppResult<Vec<f64>> {
        match self.get(field) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Number(n) => n
                        .as_f64()
                        .ok_or_else(|| AppError::invalid_field(field, "number out of range")),
                    Value::String(s) => s
                        .trim()
                        .parse::<f64>()
                        .map_err(|e| AppError::invalid_field(field, e)),
                    other => Err(AppError::invalid_field(
                        field,
                        format!("expected list of numbers, found {}", json_type(other)),
                    )),
                })
                .collect(),
            Some(other) => Err(AppError::invalid_field(
                field,
                format!("expected list, got {}", json_type(other)),
            )),
        }
    }
}

impl From<Map<String, Value>> for TransactionRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================
// Detector output
// ============================================

/// Structured reason a detector raised its risk level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl Trigger {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            recommendation: None,
            context: None,
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Result of a single detector run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    pub risk_level: RiskLevel,
    pub details: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Trigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectorResult {
    pub fn new(risk_level: RiskLevel) -> Self {
        Self {
            risk_level,
            details: Vec::new(),
            triggers: Vec::new(),
            error: None,
        }
    }

    /// A clean result with a single explanatory detail
    pub fn safe(detail: impl Into<String>) -> Self {
        Self::new(RiskLevel::Safe).with_detail(detail)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Raise the risk level; never lowers it
    pub fn escalate(&mut self, level: RiskLevel) {
        if level > self.risk_level {
            self.risk_level = level;
        }
    }

    /// Record a trigger, raising the risk level to at least `level`
    pub fn add_trigger(&mut self, level: RiskLevel, trigger: Trigger) {
        self.escalate(level);
        self.triggers.push(trigger);
    }

    pub fn is_clean(&self) -> bool {
        self.risk_level == RiskLevel::Safe && self.triggers.is_empty()
    }
}

/// How a detector failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// `analyze` returned an error
    Error,
    /// `analyze` did not finish in time
    Timeout,
    /// The detector task panicked
    Panic,
}

/// Contained failure record for one detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorFailure {
    pub kind: FailureKind,
    pub error_code: String,
    pub message: String,
}

impl DetectorFailure {
    pub fn from_error(kind: FailureKind, err: &AppError) -> Self {
        Self {
            kind,
            error_code: err.code_str().to_string(),
            message: err.message.clone(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: FailureKind::Timeout,
            error_code: "DETECTOR_TIMEOUT".to_string(),
            message: "timeout".to_string(),
        }
    }
}

/// Per-detector entry of a verdict: either a result or a contained failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectorOutcome {
    Success(DetectorResult),
    Failure(DetectorFailure),
}

impl DetectorOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DetectorOutcome::Success(_))
    }

    /// Failures always rank as `Error`
    pub fn risk_level(&self) -> RiskLevel {
        match self {
            DetectorOutcome::Success(result) => result.risk_level,
            DetectorOutcome::Failure(_) => RiskLevel::Error,
        }
    }

    /// Human-readable lines; a failure contributes its message
    pub fn details(&self) -> &[String] {
        match self {
            DetectorOutcome::Success(result) => &result.details,
            DetectorOutcome::Failure(failure) => std::slice::from_ref(&failure.message),
        }
    }

    pub fn triggers(&self) -> &[Trigger] {
        match self {
            DetectorOutcome::Success(result) => &result.triggers,
            DetectorOutcome::Failure(_) => &[],
        }
    }

    pub fn result(&self) -> Option<&DetectorResult> {
        match self {
            DetectorOutcome::Success(result) => Some(result),
            DetectorOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&DetectorFailure> {
        match self {
            DetectorOutcome::Success(_) => None,
            DetectorOutcome::Failure(failure) => Some(failure),
        }
    }
}

/// Outcome labelled with the detector that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorReport {
    pub detector_id: String,
    #[serde(flatten)]
    pub outcome: DetectorOutcome,
}

/// Combined verdict of one `analyze_transaction` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateVerdict {
    /// Unique id of this analysis run
    pub analysis_id: Uuid,
    /// Transaction hash (or "unknown")
    pub transaction_id: String,
    /// Highest risk among the merged entries
    pub overall_risk: RiskLevel,
    /// Flattened details, each prefixed with `[detector_id]`
    pub details: Vec<String>,
    /// One entry per dispatched detector, in dispatch order
    pub detector_results: Vec<DetectorReport>,
    pub analyzed_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl AggregateVerdict {
    /// Outcome recorded for a detector id
    pub fn result(&self, detector_id: &str) -> Option<&DetectorOutcome> {
        self.detector_results
            .iter()
            .find(|r| r.detector_id == detector_id)
            .map(|r| &r.outcome)
    }

    pub fn dispatched_ids(&self) -> Vec<&str> {
        self.detector_results
            .iter()
            .map(|r| r.detector_id.as_str())
            .collect()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.detector_results
            .iter()
            .filter(|r| !r.outcome.is_success())
            .map(|r| r.detector_id.as_str())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.detector_results.iter().any(|r| !r.outcome.is_success())
    }

    /// Pretty print the verdict
    pub fn summary(&self) -> String {
        let mut output = format!(
            "\n{} Risk: {} | TX: {}\n",
            self.overall_risk.emoji(),
            self.overall_risk.as_str().to_uppercase(),
            self.transaction_id
        );
        output.push_str(&format!("   Analysis: {}\n", self.analysis_id));
        output.push_str(&format!("   Latency: {}ms\n", self.latency_ms));

        if self.details.is_empty() {
            output.push_str("   No issues detected\n");
        } else {
            output.push_str("   Details:\n");
            for detail in &self.details {
                output.push_str(&format!("     - {}\n", detail));
            }
        }

        for report in &self.detector_results {
            let status = if report.outcome.is_success() { "ok" } else { "FAILED" };
            output.push_str(&format!(
                "   [{}] {} {} ({})\n",
                report.detector_id,
                report.outcome.risk_level().emoji(),
                report.outcome.risk_level(),
                status
            ));
        }

        output
    }
}

/// Metadata a detector exposes for introspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorInfo {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}
