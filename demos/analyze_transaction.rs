//! Analyze a sample mainnet-style transaction with every built-in detector,
//! then an approval and a multisig operation through detector subsets.
//!
//! Run with: `cargo run --example analyze_transaction`

use web3sentry::{default_registry, AnalysisEngine, SentryConfig, TransactionRecord};

use eyre::Result;
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn print_breakdown(engine_verdict: &web3sentry::AggregateVerdict) {
    println!("{}", "=".repeat(50));
    println!("Overall Risk Level: {}", engine_verdict.overall_risk);
    println!("{}", "-".repeat(50));
    println!("Details:");
    if engine_verdict.details.is_empty() {
        println!("  No issues detected");
    }
    for detail in &engine_verdict.details {
        println!("  • {}", detail);
    }

    println!("{}", "=".repeat(50));
    println!("\nDetector breakdown:");
    for report in &engine_verdict.detector_results {
        println!("\n{}:", report.detector_id);
        println!("  Risk Level: {}", report.outcome.risk_level());
        for trigger in report.outcome.triggers() {
            println!("  ⚑ {} - {}", trigger.kind, trigger.description);
        }
        for detail in report.outcome.details() {
            println!("  • {}", detail);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    let config = SentryConfig::default();
    let engine = AnalysisEngine::new(default_registry(&config), config.engine.clone());
    info!("Loaded detectors: {}", engine.active_detectors().join(", "));

    // ERC20 transfer through the Uniswap V2 router
    let transfer = TransactionRecord::from_value(json!({
        "hash": "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef",
        "from": "0xaaaabbbbccccddddeeeeffff0000111122223333",
        "to": "0x7a250d5630b4cf539739df2c5dacb4c659f2488d",
        "value": "0xde0b6b3a7640000",
        "gasPrice": "0x3b9aca00",
        "input": "0xa9059cbb000000000000000000000000e592427a0aece92de3edee1f18e0157c05861564000000000000000000000000000000000000000000000000000000000000012c"
    }))?;

    println!("\nTransaction: {}", transfer.hash());
    let verdict = engine.analyze_transaction(transfer, None).await;
    print_breakdown(&verdict);

    // Unlimited approval to an unknown spender
    let approval = TransactionRecord::from_value(json!({
        "hash": "0xapproval",
        "method_id": "0x095ea7b3",
        "to": "0xe592427a0aece92de3edee1f18e0157c05861564",
        "user_id": "demo-user",
        "token_address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
        "amount": "115792089237316195423570985008687907853269984665640564039457584007913129639935",
        "token_balance": "5000000000"
    }))?;

    println!("\nTransaction: {}", approval.hash());
    let verdict = engine
        .analyze_transaction(approval, Some(&["approvals"]))
        .await;
    print_breakdown(&verdict);

    // Under-signed multisig execution
    let multisig = TransactionRecord::from_value(json!({
        "hash": "0xmultisig",
        "wallet_address": "0x5afe000000000000000000000000000000005afe",
        "signers": ["0x01", "0x02", "0x03"],
        "required_signatures": 2,
        "provided_signatures": ["0x01"],
        "signature_timestamps": [1700000000, 1700000000.4]
    }))?;

    println!("\nTransaction: {}", multisig.hash());
    let verdict = engine
        .analyze_transaction(multisig, Some(&["multisig", "transaction_anomaly"]))
        .await;
    print_breakdown(&verdict);

    println!("\n{}", serde_json::to_string_pretty(&engine.stats())?);
    Ok(())
}
