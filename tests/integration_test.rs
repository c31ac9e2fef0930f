//! Integration tests for Web3 Sentry

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use web3sentry::{
    default_registry, AnalysisEngine, AppError, AppResult, Detector, DetectorBase,
    DetectorRegistry, DetectorResult, EngineConfig, FailureKind, MergePolicy, RiskLevel,
    SentryConfig, TransactionRecord,
};

// ============================================
// TEST DETECTORS
// ============================================

enum Behavior {
    Level(RiskLevel),
    Fail(&'static str),
    Panic,
    Sleep(Duration, RiskLevel),
    Rendezvous(Arc<Barrier>),
}

struct ScriptedDetector {
    base: DetectorBase,
    behavior: Behavior,
    calls: AtomicUsize,
    completions: AtomicUsize,
}

impl ScriptedDetector {
    fn new(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            base: DetectorBase::new(name, "Scripted detector for tests"),
            behavior,
            calls: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    fn base(&self) -> &DetectorBase {
        &self.base
    }

    async fn analyze(&self, _tx: &TransactionRecord) -> AppResult<DetectorResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = match &self.behavior {
            Behavior::Level(level) => {
                Ok(DetectorResult::new(*level).with_detail(format!("{} finding", self.name())))
            }
            Behavior::Fail(msg) => Err(AppError::detector_failed(*msg)),
            Behavior::Panic => panic!("{} blew up", self.name()),
            Behavior::Sleep(delay, level) => {
                tokio::time::sleep(*delay).await;
                Ok(DetectorResult::new(*level).with_detail(format!("slept {}ms", delay.as_millis())))
            }
            Behavior::Rendezvous(barrier) => {
                barrier.wait().await;
                Ok(DetectorResult::safe("met"))
            }
        };
        self.completions.fetch_add(1, Ordering::SeqCst);
        result
    }
}

fn engine_with(detectors: Vec<(&str, Arc<ScriptedDetector>)>, config: EngineConfig) -> AnalysisEngine {
    let mut registry = DetectorRegistry::new();
    for (id, detector) in detectors {
        registry.register(id, detector);
    }
    AnalysisEngine::new(registry, config)
}

fn tx() -> TransactionRecord {
    TransactionRecord::new().with("hash", "0xfeed")
}

// ============================================
// ENGINE
// ============================================

#[tokio::test]
async fn test_disabled_detector_is_not_dispatched() {
    let a = ScriptedDetector::new("A", Behavior::Level(RiskLevel::Low));
    let b = ScriptedDetector::new("B", Behavior::Level(RiskLevel::Critical));
    b.disable();
    let engine = engine_with(vec![("a", a.clone()), ("b", b.clone())], EngineConfig::default());

    let verdict = engine.analyze_transaction(tx(), None).await;

    assert_eq!(verdict.dispatched_ids(), vec!["a"]);
    assert_eq!(verdict.overall_risk, RiskLevel::Low);
    assert_eq!(verdict.transaction_id, "0xfeed");
    assert_eq!(b.calls(), 0);

    // Toggling takes effect on the next call
    engine.enable_detector("b");
    let verdict = engine.analyze_transaction(tx(), None).await;
    assert_eq!(verdict.dispatched_ids(), vec!["a", "b"]);
    assert_eq!(verdict.overall_risk, RiskLevel::Critical);
}

#[tokio::test]
async fn test_failing_detector_is_contained() {
    let ok = ScriptedDetector::new("Ok", Behavior::Level(RiskLevel::Medium));
    let bad = ScriptedDetector::new("Bad", Behavior::Fail("upstream exploded"));
    let engine = engine_with(vec![("ok", ok), ("bad", bad)], EngineConfig::default());

    let verdict = engine.analyze_transaction(tx(), None).await;

    assert_eq!(verdict.overall_risk, RiskLevel::Error);
    assert_eq!(verdict.failed_ids(), vec!["bad"]);
    assert_eq!(verdict.result("ok").unwrap().risk_level(), RiskLevel::Medium);

    let failure = verdict.result("bad").unwrap().failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Error);
    assert_eq!(failure.message, "upstream exploded");
    assert!(verdict.details.contains(&"[bad] upstream exploded".to_string()));
}

#[tokio::test]
async fn test_lone_failing_detector_requested_by_id() {
    let bad = ScriptedDetector::new("Bad", Behavior::Fail("cannot parse record"));
    let engine = engine_with(vec![("bad", bad)], EngineConfig::default());

    let verdict = engine.analyze_transaction(tx(), Some(&["bad"])).await;

    assert_eq!(verdict.overall_risk, RiskLevel::Error);
    assert_eq!(verdict.dispatched_ids(), vec!["bad"]);
    let outcome = verdict.result("bad").unwrap();
    assert!(!outcome.is_success());
    assert!(!outcome.failure().unwrap().message.is_empty());
    assert_eq!(verdict.details, vec!["[bad] cannot parse record"]);
}

#[tokio::test]
async fn test_empty_registry_yields_unknown() {
    let engine = AnalysisEngine::with_registry(DetectorRegistry::new());

    let verdict = engine.analyze_transaction(tx(), None).await;

    assert_eq!(verdict.overall_risk, RiskLevel::Unknown);
    assert!(verdict.details.is_empty());
    assert!(verdict.detector_results.is_empty());
}

#[tokio::test]
async fn test_dropping_analysis_cancels_detectors() {
    let slow = ScriptedDetector::new(
        "Slow",
        Behavior::Sleep(Duration::from_millis(200), RiskLevel::Low),
    );
    let engine = engine_with(vec![("slow", slow.clone())], EngineConfig::default());

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        engine.analyze_transaction(tx(), None),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(slow.calls(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(slow.completions(), 0);
    assert_eq!(engine.stats().total_analyses, 0);
}

#[tokio::test]
async fn test_successful_only_policy_ignores_failures() {
    let ok = ScriptedDetector::new("Ok", Behavior::Level(RiskLevel::Medium));
    let bad = ScriptedDetector::new("Bad", Behavior::Fail("nope"));
    let config = EngineConfig::default().with_merge_policy(MergePolicy::SuccessfulOnly);
    let engine = engine_with(vec![("ok", ok), ("bad", bad)], config);

    let verdict = engine.analyze_transaction(tx(), None).await;
    assert_eq!(verdict.overall_risk, RiskLevel::Medium);
    assert!(verdict.has_failures());
}

#[tokio::test]
async fn test_highest_level_wins() {
    let low = ScriptedDetector::new("Low", Behavior::Level(RiskLevel::Low));
    let critical = ScriptedDetector::new("Critical", Behavior::Level(RiskLevel::Critical));
    let engine = engine_with(
        vec![("low", low), ("critical", critical)],
        EngineConfig::default(),
    );

    let verdict = engine.analyze_transaction(tx(), None).await;
    assert_eq!(verdict.overall_risk, RiskLevel::Critical);
    assert_eq!(
        verdict.details,
        vec!["[low] Low finding", "[critical] Critical finding"]
    );
}

#[tokio::test]
async fn test_only_unknown_ids_yields_unknown() {
    let a = ScriptedDetector::new("A", Behavior::Level(RiskLevel::High));
    let engine = engine_with(vec![("a", a.clone())], EngineConfig::default());

    let verdict = engine
        .analyze_transaction(tx(), Some(&["nonexistent", "also_missing"]))
        .await;

    assert_eq!(verdict.overall_risk, RiskLevel::Unknown);
    assert!(verdict.details.is_empty());
    assert!(verdict.detector_results.is_empty());
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_results_keep_dispatch_order_under_variable_delays() {
    let delays = [60u64, 5, 40, 0, 20];
    let detectors: Vec<(String, Arc<ScriptedDetector>)> = delays
        .iter()
        .enumerate()
        .map(|(i, ms)| {
            (
                format!("d{}", i),
                ScriptedDetector::new(
                    &format!("D{}", i),
                    Behavior::Sleep(Duration::from_millis(*ms), RiskLevel::Low),
                ),
            )
        })
        .collect();
    let engine = engine_with(
        detectors.iter().map(|(id, d)| (id.as_str(), d.clone())).collect(),
        EngineConfig::default(),
    );

    let verdict = engine.analyze_transaction(tx(), None).await;

    assert_eq!(verdict.dispatched_ids(), vec!["d0", "d1", "d2", "d3", "d4"]);
    assert_eq!(
        verdict.details,
        vec![
            "[d0] slept 60ms",
            "[d1] slept 5ms",
            "[d2] slept 40ms",
            "[d3] slept 0ms",
            "[d4] slept 20ms"
        ]
    );
}

#[tokio::test]
async fn test_detectors_run_concurrently() {
    // Each detector blocks until the other one has started
    let barrier = Arc::new(Barrier::new(2));
    let a = ScriptedDetector::new("A", Behavior::Rendezvous(barrier.clone()));
    let b = ScriptedDetector::new("B", Behavior::Rendezvous(barrier));
    let engine = engine_with(vec![("a", a), ("b", b)], EngineConfig::default());

    let verdict = tokio::time::timeout(
        Duration::from_secs(5),
        engine.analyze_transaction(tx(), None),
    )
    .await
    .expect("detectors were not dispatched concurrently");

    assert_eq!(verdict.overall_risk, RiskLevel::Safe);
}

#[tokio::test]
async fn test_slow_detector_times_out() {
    let slow = ScriptedDetector::new(
        "Slow",
        Behavior::Sleep(Duration::from_secs(10), RiskLevel::Low),
    );
    let fast = ScriptedDetector::new("Fast", Behavior::Level(RiskLevel::Low));
    let config = EngineConfig::default().with_timeout(Some(Duration::from_millis(50)));
    let engine = engine_with(vec![("slow", slow), ("fast", fast)], config);

    let start = Instant::now();
    let verdict = engine.analyze_transaction(tx(), None).await;
    assert!(start.elapsed() < Duration::from_secs(5));

    let failure = verdict.result("slow").unwrap().failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.message, "timeout");
    assert_eq!(verdict.result("fast").unwrap().risk_level(), RiskLevel::Low);
    assert_eq!(verdict.overall_risk, RiskLevel::Error);
    assert_eq!(engine.stats().total_timeouts, 1);
}

#[tokio::test]
async fn test_panicking_detector_is_contained() {
    let boom = ScriptedDetector::new("Boom", Behavior::Panic);
    let ok = ScriptedDetector::new("Ok", Behavior::Level(RiskLevel::Safe));
    let engine = engine_with(vec![("boom", boom), ("ok", ok)], EngineConfig::default());

    let verdict = engine.analyze_transaction(tx(), None).await;

    let failure = verdict.result("boom").unwrap().failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Panic);
    assert_eq!(failure.message, "Boom blew up");
    assert!(verdict.result("ok").unwrap().is_success());
    assert_eq!(verdict.overall_risk, RiskLevel::Error);
    assert_eq!(engine.stats().total_panics, 1);
}

#[tokio::test]
async fn test_verdict_serializes_with_status_tags() {
    let ok = ScriptedDetector::new("Ok", Behavior::Level(RiskLevel::High));
    let bad = ScriptedDetector::new("Bad", Behavior::Fail("nope"));
    let engine = engine_with(vec![("ok", ok), ("bad", bad)], EngineConfig::default());

    let verdict = engine.analyze_transaction(tx(), None).await;
    let value = serde_json::to_value(&verdict).unwrap();

    assert_eq!(value["overall_risk"], "error");
    assert_eq!(value["detector_results"][0]["detector_id"], "ok");
    assert_eq!(value["detector_results"][0]["status"], "success");
    assert_eq!(value["detector_results"][0]["risk_level"], "high");
    assert_eq!(value["detector_results"][1]["status"], "failure");
    assert_eq!(value["detector_results"][1]["error_code"], "DETECTOR_FAILED");
}

// ============================================
// BUILT-IN DETECTORS
// ============================================

#[tokio::test]
async fn test_builtin_engine_on_plain_transfer() {
    let config = SentryConfig::default();
    let engine = AnalysisEngine::new(default_registry(&config), config.engine.clone());

    let transfer = TransactionRecord::from_value(json!({
        "hash": "0xtransfer",
        "from": "0xaaaabbbbccccddddeeeeffff0000111122223333",
        "to": "0x7a250d5630b4cf539739df2c5dacb4c659f2488d",
        "value": "0xde0b6b3a7640000",
        "gasPrice": "0x3b9aca00",
        "timestamp": 1_704_110_400u64,
        "input": "0xa9059cbb"
    }))
    .unwrap();

    let verdict = engine.analyze_transaction(transfer, None).await;

    assert_eq!(
        verdict.dispatched_ids(),
        vec!["transaction_anomaly", "approvals", "multisig"]
    );
    assert_eq!(verdict.overall_risk, RiskLevel::Safe);
    assert_eq!(
        verdict.details,
        vec![
            "[approvals] Not an approval transaction",
            "[multisig] Not a multisig transaction"
        ]
    );
}

#[tokio::test]
async fn test_builtin_malformed_field_becomes_failure() {
    let config = SentryConfig::default();
    let engine = AnalysisEngine::new(default_registry(&config), config.engine.clone());

    let tx = TransactionRecord::new()
        .with("hash", "0xbad")
        .with("value", "lots of ether");
    let verdict = engine
        .analyze_transaction(tx, Some(&["transaction_anomaly", "approvals"]))
        .await;

    let failure = verdict.result("transaction_anomaly").unwrap().failure().unwrap();
    assert_eq!(failure.error_code, "TX_INVALID_FIELD");
    assert!(verdict.result("approvals").unwrap().is_success());
    assert_eq!(verdict.overall_risk, RiskLevel::Error);
}

#[tokio::test]
async fn test_builtin_subset_and_disabled_from_config() {
    let config = SentryConfig::from_lookup(|key| match key {
        "SENTRY_DISABLED_DETECTORS" => Some("transaction_anomaly".to_string()),
        _ => None,
    })
    .unwrap();
    let engine = AnalysisEngine::new(default_registry(&config), config.engine.clone());
    assert_eq!(engine.active_detectors(), vec!["approvals", "multisig"]);

    let multisig = TransactionRecord::from_value(json!({
        "wallet_address": "0xsafe",
        "signers": ["0x01", "0x02", "0x03"],
        "required_signatures": 3,
        "provided_signatures": ["0x01", "0x02"],
    }))
    .unwrap();

    let verdict = engine
        .analyze_transaction(multisig, Some(&["transaction_anomaly", "multisig"]))
        .await;

    assert_eq!(verdict.dispatched_ids(), vec!["multisig"]);
    assert_eq!(verdict.overall_risk, RiskLevel::Critical);
    assert_eq!(verdict.transaction_id, "unknown");
    assert_eq!(
        verdict.result("multisig").unwrap().triggers()[0].kind,
        "quorum_manipulation"
    );
}

#[test]
fn test_list_detectors_reports_info() {
    let engine = AnalysisEngine::with_registry(default_registry(&SentryConfig::default()));
    engine.disable_detector("approvals");

    let listed = engine.list_detectors();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[1].id, "approvals");
    assert!(!listed[1].enabled);

    let info = listed[1].info();
    assert_eq!(info.name, "Approvals Security Detector");
    assert_eq!(info.config["category"], "approvals");
    assert!(!engine.disable_detector("missing"));
}
