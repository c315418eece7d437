use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::sync::SyncState;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Right-aligned rate with six decimals. `None` is displayed as "N/A".
pub fn rate_cell(rate: Option<f64>) -> Cell {
    rate.map_or(
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        |r| Cell::new(format!("{r:.6}")).set_alignment(CellAlignment::Right),
    )
}

/// Creates a spinner for work of unknown length.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Short human description of a synchronization state.
pub fn describe_state(state: &SyncState) -> String {
    match state {
        SyncState::Idle => "Waiting".to_string(),
        SyncState::Fetching { attempt: 1 } => "Fetching rates".to_string(),
        SyncState::Fetching { attempt } => format!("Fetching rates (attempt {attempt})"),
        SyncState::Retrying { attempt, delay } => {
            format!("Attempt {attempt} failed, retrying in {delay:?}")
        }
        SyncState::Parsing => "Parsing response".to_string(),
        SyncState::Persisting => "Saving rates".to_string(),
        SyncState::Done { succeeded: true } => "Done".to_string(),
        SyncState::Done { succeeded: false } => "Failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_state() {
        assert_eq!(
            describe_state(&SyncState::Fetching { attempt: 1 }),
            "Fetching rates"
        );
        assert_eq!(
            describe_state(&SyncState::Fetching { attempt: 3 }),
            "Fetching rates (attempt 3)"
        );
        assert_eq!(
            describe_state(&SyncState::Retrying {
                attempt: 2,
                delay: Duration::from_secs(1)
            }),
            "Attempt 2 failed, retrying in 1s"
        );
    }

    #[test]
    fn test_rate_cell_content() {
        assert_eq!(rate_cell(Some(0.814133)).content(), "0.814133");
        assert_eq!(rate_cell(None).content(), "N/A");
    }
}
