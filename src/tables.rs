use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{api::modbus::Value, poller::RegisterReading, rollup::Summary};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

pub fn build_readings_table(readings: &[RegisterReading]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Source", "Metric", "Value", "Unit"]);
    for reading in readings {
        let value = match &reading.value {
            Some(value @ (Value::Integer(_) | Value::Float(_))) => {
                Cell::new(value).set_alignment(CellAlignment::Right)
            }
            Some(value @ Value::Text(_)) => Cell::new(value),
            None => Cell::new("null").fg(Color::DarkYellow),
        };
        table.add_row(vec![
            Cell::new(reading.source).add_attribute(Attribute::Dim),
            Cell::new(reading.name),
            value,
            Cell::new(reading.unit.unwrap_or_default()).add_attribute(Attribute::Dim),
        ]);
    }
    table
}

pub fn build_summaries_table(summaries: &[Summary]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Rollup", "Computed", "Skipped", "Failed"]);
    for summary in summaries {
        table.add_row(vec![
            Cell::new(summary.rollup_type),
            Cell::new(summary.n_computed).set_alignment(CellAlignment::Right),
            Cell::new(summary.n_skipped)
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            Cell::new(summary.n_failed).set_alignment(CellAlignment::Right).fg(
                if summary.n_failed == 0 { Color::Green } else { Color::Red },
            ),
        ]);
    }
    table
}
