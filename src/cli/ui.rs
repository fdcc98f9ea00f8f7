use crate::core::QuoteRow;
use anyhow::Result;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
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

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        |v| Cell::new(format_fn(v)).set_alignment(CellAlignment::Right),
    )
}

fn text_cell(text: &str) -> Cell {
    if text.is_empty() {
        Cell::new("N/A").fg(Color::DarkGrey)
    } else {
        Cell::new(text)
    }
}

/// Six-column quote table: Name, Ticker, Price, Currency, Source, Timestamp.
pub fn quote_table(rows: &[QuoteRow]) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell("Name"),
        header_cell("Ticker"),
        header_cell("Price"),
        header_cell("Currency"),
        header_cell("Source"),
        header_cell("Timestamp"),
    ]);

    for row in rows {
        let [name, ticker, _, currency, source, timestamp] = row.to_columns();
        let source_cell = if row.is_complete() {
            Cell::new(source).fg(Color::Green)
        } else {
            text_cell(&source).fg(Color::Red)
        };
        table.add_row(vec![
            text_cell(&name),
            text_cell(&ticker),
            format_optional_cell(row.price, |p| p.to_string()),
            text_cell(&currency),
            source_cell,
            Cell::new(timestamp).fg(Color::DarkGrey),
        ]);
    }
    table
}

/// Renders rows as a table, or as pretty JSON. A single row is emitted as an object.
pub fn render_rows(rows: &[QuoteRow], json: bool) -> Result<String> {
    if json {
        let rendered = match rows {
            [row] => serde_json::to_string_pretty(row)?,
            _ => serde_json::to_string_pretty(rows)?,
        };
        return Ok(rendered);
    }

    let mut output = quote_table(rows).to_string();
    let missing = rows.iter().filter(|row| !row.has_data()).count();
    if missing > 0 {
        let style_type = if missing == rows.len() {
            StyleType::Error
        } else {
            StyleType::Subtle
        };
        output.push_str(&format!(
            "\n{}",
            style_text(&format!("{missing} quote(s) returned no data"), style_type)
        ));
    }
    Ok(output)
}

/// Creates a new `indicatif::ProgressBar` with standard styling.
pub fn new_progress_bar(len: u64, with_message: bool) -> ProgressBar {
    let template = if with_message {
        "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})"
    } else {
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})"
    };

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(template)
            .expect("valid progress bar template")
            .progress_chars("#>-"),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SourceTag;

    #[test]
    fn test_render_single_row_as_json_object() {
        let row = QuoteRow::new(SourceTag::CoinGecko, "Bitcoin", "BTC", Some(50000.0), "eur");
        let json = render_rows(std::slice::from_ref(&row), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "Bitcoin");
        assert_eq!(value["price"], 50000.0);
        assert_eq!(value["currency"], "EUR");
        assert_eq!(value["source"], "COINGECKO");
    }

    #[test]
    fn test_render_table_lists_every_row() {
        let rows = vec![
            QuoteRow::new(SourceTag::Yahoo, "Apple Inc.", "AAPL", Some(190.5), "USD"),
            QuoteRow::empty(SourceTag::Investing),
        ];
        let output = render_rows(&rows, false).unwrap();
        assert!(output.contains("Apple Inc."));
        assert!(output.contains("190.5"));
        assert!(output.contains("INVESTING"));
        assert!(output.contains("1 quote(s) returned no data"));

        let json = render_rows(&rows, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }
}
