use super::ui;
use crate::core::book::convert;
use crate::core::config::AppConfig;
use crate::core::currency::CurrencyCode;
use crate::store::RateStore;
use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::Cell;

fn parse_code(code: &str) -> Result<CurrencyCode> {
    CurrencyCode::new(code).with_context(|| format!("Unknown currency '{code}'"))
}

/// Prints every stored rate from `code`, in display order.
pub fn show_rates(store: &RateStore, code: &str) -> Result<()> {
    let source = parse_code(code)?;
    let rows = store
        .query_by_source_ordered(source)
        .with_context(|| format!("Failed to read rates for {source}"))?;

    if rows.is_empty() {
        println!("No rates stored for {source}.");
        return Ok(());
    }

    println!(
        "\n1 {} in:",
        ui::style_text(source.as_str(), ui::StyleType::Title)
    );
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Rate"),
        ui::header_cell("Inverse"),
    ]);
    for (row, _) in &rows {
        let inverse = store
            .query_pair(row.dest_code, row.source_code)?
            .map(|r| r.rate);
        table.add_row(vec![
            Cell::new(row.dest_code.as_str()),
            ui::rate_cell(Some(row.rate)),
            ui::rate_cell(inverse),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Prints `amount` of `from` expressed in `to`.
pub fn show_conversion(store: &RateStore, amount: f64, from: &str, to: &str) -> Result<()> {
    let from = parse_code(from)?;
    let to = parse_code(to)?;
    let converted = convert(store, amount, from, to)
        .with_context(|| format!("Failed to read the {from}/{to} rate"))?
        .with_context(|| format!("No rate known between {from} and {to}. Run `fxsync sync`."))?;

    println!(
        "{amount:.2} {from} = {}",
        ui::style_text(&format!("{converted:.4} {to}"), ui::StyleType::TotalValue)
    );
    Ok(())
}

/// Prints when rates were last synchronized and whether they are stale.
pub fn show_status(config: &AppConfig, store: &RateStore) -> Result<()> {
    let count = store.rate_count()?;
    let last_sync = store.last_sync()?;
    let stale = last_sync.is_none_or(|at| {
        Utc::now()
            .signed_duration_since(at)
            .to_std()
            .is_ok_and(|age| age >= config.staleness())
    });

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Property"), ui::header_cell("Value")]);
    table.add_row(vec![Cell::new("Stored rates"), Cell::new(count)]);
    table.add_row(vec![
        Cell::new("Last synchronized"),
        Cell::new(last_sync.map_or_else(
            || ui::style_text("never (bundled defaults)", ui::StyleType::Subtle),
            |at| at.to_rfc3339(),
        )),
    ]);
    table.add_row(vec![
        Cell::new("Stale"),
        Cell::new(if stale { "yes" } else { "no" }),
    ]);
    table.add_row(vec![
        Cell::new("Store"),
        Cell::new(config.data_path()?.display()),
    ]);
    println!("{table}");
    Ok(())
}
