//! Web3 Sentry Library
//!
//! Pluggable, heuristic transaction risk analysis. A transaction record is
//! fanned out to independent detectors that run concurrently; their verdicts
//! are merged into one overall risk level. Built-in detectors cover:
//! - Transaction anomalies (large value, odd hours, gas spikes, rapid sequences)
//! - Risky ERC20 approvals
//! - Multisig signing threats
//!
//! A failing, panicking or slow detector never takes the analysis down with it;
//! its entry in the verdict records the failure instead.

pub mod core;
pub mod detectors;
pub mod models;
pub mod utils;

pub use crate::core::{
    analyze_with_detector, AnalysisEngine, Detector, DetectorBase, DetectorDescriptor,
    DetectorRegistry, EngineStatsSnapshot,
};
pub use detectors::{
    default_registry, ApprovalsDetector, MultisigDetector, TransactionAnomalyDetector,
};
pub use models::{
    AggregateVerdict, AppError, AppResult, DetectorFailure, DetectorInfo, DetectorOutcome,
    DetectorReport, DetectorResult, EngineConfig, ErrorCode, FailureKind, MergePolicy, RiskLevel,
    SentryConfig, TransactionRecord, Trigger,
};
