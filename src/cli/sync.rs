use super::ui;
use crate::core::config::AppConfig;
use crate::providers::fetcher::HttpRateFetcher;
use crate::store::RateStore;
use crate::sync::{RetryPolicy, SyncOrchestrator, SyncOutcome};
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

/// Synchronizes the configured currencies into `store`.
///
/// Skips the fetch while cached rates are fresh unless `force` is set.
/// Ctrl-C aborts the pass in flight, including a pending retry delay.
pub async fn run(config: &AppConfig, store: &RateStore, force: bool) -> Result<()> {
    let codes = config.currency_codes()?;
    let fetcher = HttpRateFetcher::new(&config.provider)
        .context("Failed to create HTTP client for the quote service")?;
    let orchestrator =
        SyncOrchestrator::new(fetcher, store.clone(), RetryPolicy::from(&config.provider))
            .with_staleness(config.staleness());

    if !force && !orchestrator.is_stale(Utc::now()) {
        println!("Rates are up to date. Use --force to refresh anyway.");
        return Ok(());
    }

    let pb = ui::new_spinner("Synchronizing rates");
    let mut states = orchestrator.subscribe();
    let pass = orchestrator.synchronize(&codes);
    tokio::pin!(pass);

    let mut interrupted = false;
    let outcome = loop {
        tokio::select! {
            outcome = &mut pass => break outcome,
            changed = states.changed() => {
                if changed.is_ok() {
                    let state = states.borrow_and_update().clone();
                    pb.set_message(ui::describe_state(&state));
                }
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                debug!("Interrupt received");
                interrupted = true;
                orchestrator.shutdown();
            }
        }
    };
    pb.finish_and_clear();

    match outcome {
        SyncOutcome::Success(report) => {
            println!(
                "{} {} rates stored after {} attempt(s).",
                ui::style_text("Synchronized:", ui::StyleType::TotalLabel),
                ui::style_text(&report.pairs_stored.to_string(), ui::StyleType::TotalValue),
                report.attempts
            );
            Ok(())
        }
        SyncOutcome::AlreadyRunning => {
            println!("A synchronization is already running.");
            Ok(())
        }
        SyncOutcome::Failure(e) => {
            eprintln!(
                "{}",
                ui::style_text(
                    "Synchronization failed; cached rates were kept.",
                    ui::StyleType::Error
                )
            );
            Err(e).context("Failed to synchronize exchange rates")
        }
    }
}
