pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use colored::Colorize;
use serde_json::Value;

use crate::OutputFormat;

/// Render a command result on stdout in the requested format.
///
/// JSON and table output carry the envelope warnings themselves. CSV and
/// minimal output have no room for them, so they go to stderr instead and
/// stdout stays machine-readable.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => {
            csv_out::print_csv(value);
            report_warnings(value);
        }
        OutputFormat::Minimal => {
            minimal::print_minimal(value);
            report_warnings(value);
        }
    }
}

fn report_warnings(value: &Value) {
    for warning in envelope_warnings(value) {
        eprintln!("{}: {}", "warning".yellow().bold(), warning);
    }
}

/// Valuation and simulation warnings from a `ComputationOutput` envelope.
fn envelope_warnings(value: &Value) -> Vec<&str> {
    value
        .get("warnings")
        .and_then(Value::as_array)
        .map(|warnings| warnings.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
