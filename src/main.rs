use anyhow::Context;
use config_manager::SystemConfig;
use fee_orchestrator::{FeeReportService, IngestionOrchestrator};
use price_client::CoinGeckoPriceClient;
use tracing::info;

/// One-shot run: ingest, aggregate and print the fee report as JSON.
/// Long-running serving lives in `api_server`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fee_tracker=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SystemConfig::load_from_path(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => SystemConfig::load().context("Failed to load configuration")?,
    };
    config.validate().context("Invalid configuration")?;

    info!(
        "🚀 Building fee report for {} on {}",
        config.tracking.contract_address, config.tracking.network
    );

    let price_client = CoinGeckoPriceClient::new(&config.price).context("Failed to build price client")?;
    let service = FeeReportService::new(IngestionOrchestrator::new(config), price_client);

    let report = service.build_report().await?;

    let mut symbols: Vec<_> = report.aggregation.breakdowns.iter().collect();
    symbols.sort_by(|a, b| a.0.cmp(b.0));
    for (symbol, breakdown) in symbols {
        info!(
            "  {}: {} txs, {:.6} total, ${:.2} (@ ${:.4})",
            symbol, breakdown.count, breakdown.total_amount, breakdown.total_value_usd, breakdown.price_usd
        );
    }
    info!("💰 Total fees: ${:.2}", report.total_usd());

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
