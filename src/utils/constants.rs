//! Constants Module - Single Source of Truth
//!
//! Detector ids, default thresholds, unit conversions and environment
//! variable names used across the crate.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "Web3Sentry";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================
// DETECTOR IDS
// ============================================

pub const DETECTOR_TRANSACTION_ANOMALY: &str = "transaction_anomaly";
pub const DETECTOR_APPROVALS: &str = "approvals";
pub const DETECTOR_MULTISIG: &str = "multisig";

/// Built-in detectors in registration order
pub const BUILTIN_DETECTORS: [&str; 3] = [
    DETECTOR_TRANSACTION_ANOMALY,
    DETECTOR_APPROVALS,
    DETECTOR_MULTISIG,
];

// ============================================
// ENGINE DEFAULTS
// ============================================

/// Default per-detector timeout (milliseconds)
pub const DEFAULT_DETECTOR_TIMEOUT_MS: u64 = 10_000;

/// Environment overrides
pub const ENV_DETECTOR_TIMEOUT_MS: &str = "SENTRY_DETECTOR_TIMEOUT_MS";
pub const ENV_MERGE_POLICY: &str = "SENTRY_MERGE_POLICY";
pub const ENV_DISABLED_DETECTORS: &str = "SENTRY_DISABLED_DETECTORS";

// ============================================
// TRANSACTION ANOMALY DEFAULTS
// ============================================

pub const DEFAULT_LARGE_TX_THRESHOLD_ETH: f64 = 5.0;
pub const DEFAULT_UNUSUAL_HOUR_START: u32 = 1;
pub const DEFAULT_UNUSUAL_HOUR_END: u32 = 4;
pub const DEFAULT_HIGH_GAS_PRICE_GWEI: f64 = 500.0;
pub const DEFAULT_RAPID_SEQUENCE_WINDOW_SECS: i64 = 10;

// ============================================
// APPROVALS DEFAULTS
// ============================================

pub const DEFAULT_HIGH_AMOUNT_THRESHOLD_PCT: u64 = 80;

/// Reference amount for "unlimited" approvals
pub const MAX_RECOMMENDED_APPROVAL_AMOUNT: &str =
    "115792089237316195423570985008687907853269984665640564039457";

/// Share (percent) of the reference amount that counts as unlimited
pub const UNLIMITED_APPROVAL_RATIO_PCT: u64 = 90;

// ============================================
// MULTISIG DEFAULTS
// ============================================

pub const DEFAULT_TIME_ANOMALY_THRESHOLD_SECS: f64 = 300.0;
pub const DEFAULT_UNUSUAL_SIGNER_THRESHOLD: f64 = 0.8;
pub const DEFAULT_QUORUM_BYPASS_THRESHOLD: f64 = 0.9;

/// Signatures closer than this are considered automated
pub const MIN_SIGNATURE_GAP_SECS: f64 = 1.0;

// ============================================
// UNIT CONVERSION
// ============================================

pub const WEI_PER_ETH: f64 = 1e18;
pub const WEI_PER_GWEI: f64 = 1e9;
