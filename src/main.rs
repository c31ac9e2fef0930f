//! Web3 Sentry - concurrent heuristic transaction risk analyzer
//!
//! Usage: `web3sentry [TX_JSON_FILE] [DETECTOR_IDS]`
//! - `TX_JSON_FILE`: transaction record as a JSON object (built-in sample if omitted)
//! - `DETECTOR_IDS`: comma separated subset of detectors (all enabled if omitted)

use web3sentry::utils::constants::{APP_NAME, APP_VERSION};
use web3sentry::{default_registry, AnalysisEngine, SentryConfig, TransactionRecord};

use eyre::{Result, WrapErr};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    println!(
        r#"
    ╔══════════════════════════════════════════════════╗
    ║                                                  ║
    ║          W E B 3   S E N T R Y   v{:<8}       ║
    ║      Concurrent Transaction Risk Analysis        ║
    ║                                                  ║
    ╚══════════════════════════════════════════════════╝
    "#,
        APP_VERSION
    );

    let mut args = std::env::args().skip(1);
    let tx_path = args.next();
    let subset: Option<Vec<String>> = args.next().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    });

    // Load configuration
    let config = SentryConfig::from_env().wrap_err("invalid SENTRY_* configuration")?;
    let engine = AnalysisEngine::new(default_registry(&config), config.engine.clone());
    info!(
        "{} loaded detectors: {}",
        APP_NAME,
        engine.active_detectors().join(", ")
    );

    let transaction = match &tx_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path))?;
            TransactionRecord::from_json(&raw)?
        }
        None => sample_transaction(),
    };

    let ids: Option<Vec<&str>> = subset
        .as_ref()
        .map(|ids| ids.iter().map(String::as_str).collect());
    let verdict = engine
        .analyze_transaction(transaction, ids.as_deref())
        .await;

    println!("{}", verdict.summary());
    println!("{}", serde_json::to_string_pretty(&verdict)?);

    let stats = engine.stats();
    info!(
        "📊 Analyses: {} | Dispatched: {} | Failures: {}",
        stats.total_analyses, stats.total_dispatched, stats.total_failures
    );

    Ok(())
}

/// ERC20 transfer through a DEX router, 1 ETH at 1 gwei
fn sample_transaction() -> TransactionRecord {
    let value = json!({
        "hash": "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef",
        "from": "0xaaaabbbbccccddddeeeeffff0000111122223333",
        "to": "0x7a250d5630b4cf539739df2c5dacb4c659f2488d",
        "value": "0xde0b6b3a7640000",
        "gasPrice": "0x3b9aca00",
        "input": "0xa9059cbb000000000000000000000000e592427a0aece92de3edee1f18e0157c05861564000000000000000000000000000000000000000000000000000000000000012c"
    });
    TransactionRecord::from_value(value).unwrap_or_default()
}
