//! Auction watcher binary.

use auction_client::{AuctionSession, Config, RpcLedger, SessionSettings, METRICS};
use auction_types::{format_units_fixed, AuctionStatus, AuctionView};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the current view is summarized in the log.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting auction watcher");

    let config: Config = config::Config::builder()
        .add_source(config::File::with_name("auction-watch").required(false))
        .add_source(config::Environment::with_prefix("AUCTION"))
        .build()
        .and_then(|c| c.try_deserialize())
        .unwrap_or_else(|e| {
            // Fall back only when no config exists; parsing errors fail hard.
            let err_str = format!("{e}");
            if err_str.contains("not found") || err_str.contains("missing field") {
                warn!(error = %e, "No config file found, using defaults");
                Config::default()
            } else {
                error!(error = %e, "FATAL: Config error, fix env vars or auction-watch.toml");
                std::process::exit(1);
            }
        });

    info!(auction = %config.auction_address, rpc = %config.rpc_url, "Configuration loaded");

    let ledger = Arc::new(RpcLedger::from_config(&config)?);
    match ledger.health_check().await {
        Ok(health) => info!(health, rpc = ledger.active_url(), "RPC reachable"),
        Err(e) => warn!(error = %e, "RPC unreachable at startup, reads will retry"),
    }

    let session = AuctionSession::start(Arc::clone(&ledger), SessionSettings::from_config(&config));

    let wallet = config.wallet()?.or(ledger.sender());
    match wallet {
        Some(address) => session.connect_wallet(address),
        None => info!("No wallet configured, watching only"),
    }

    let mut planned_purchase = match config.purchase_tokens.clone() {
        Some(tokens) if ledger.sender().is_some() => Some(tokens),
        Some(_) => {
            warn!("purchase_tokens set but AUCTION_PRIVATE_KEY is missing, not buying");
            None
        }
        None => None,
    };
    let overpay = config.purchase_overpay.clone().unwrap_or_default();

    let mut views = session.subscribe();
    let mut last_status = AuctionStatus::Loading;
    let mut summary = tokio::time::interval(SUMMARY_INTERVAL);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = summary.tick() => log_summary(&session.view()),
            changed = views.changed() => {
                if changed.is_err() {
                    warn!("View channel closed");
                    break;
                }
                let view = views.borrow_and_update().clone();
                if view.status != last_status {
                    info!(from = %last_status, to = %view.status, "Status");
                    last_status = view.status;
                }

                if view.status != AuctionStatus::Active {
                    continue;
                }
                let Some(tokens) = planned_purchase.take() else {
                    continue;
                };
                tokio::select! {
                    _ = &mut shutdown => {
                        warn!("Shutdown requested while a purchase was pending");
                        break;
                    }
                    outcome = session.purchase(&tokens, &overpay) => match outcome {
                        Ok(receipt) => info!(
                            tx = %receipt.tx_hash,
                            quantity = %receipt.quote.quantity,
                            cost = %receipt.quote.cost,
                            overpay = %receipt.overpay,
                            value = %receipt.value,
                            "Configured purchase confirmed"
                        ),
                        Err(e) => error!(error = %e, "Configured purchase failed"),
                    },
                }
            }
        }
    }

    let sequence = session.view().sequence;
    session.shutdown().await;

    info!(failovers = ledger.failover_count(), "Final metrics\n{}", METRICS.render(sequence));
    info!("Auction watcher shut down gracefully");
    Ok(())
}

fn log_summary(view: &AuctionView) {
    let price = view
        .current_price
        .map(|p| format_units_fixed(p, 6))
        .unwrap_or_else(|| "-".into());
    let sold = view
        .sold_percentage
        .map(|p| format!("{p}%"))
        .unwrap_or_else(|| "-".into());
    let max = view
        .max_purchasable
        .map(|m| m.to_string())
        .unwrap_or_else(|| "-".into());
    let quick_buy: Vec<String> = view.quick_buy_amounts().iter().map(|a| a.to_string()).collect();

    info!(
        sequence = view.sequence,
        status = %view.status,
        price = %price,
        sold = %sold,
        time_remaining = %view.time_remaining_display(),
        buyers = ?view.total_buyers,
        max_purchasable = %max,
        quick_buy = ?quick_buy,
        stale = view.stale,
        faults = view.faults.len(),
        "Auction summary"
    );
    match serde_json::to_string(view) {
        Ok(json) => debug!(view = %json, "Auction view"),
        Err(e) => warn!(error = %e, "Failed to serialize view"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
