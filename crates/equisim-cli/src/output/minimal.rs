use serde_json::Value;

/// Well-known answer fields, in order of priority.
const PRIORITY_KEYS: [&str; 6] = [
    "implied_share_price",
    "wacc",
    "implied_share_price_at_median",
    "breakeven_discount_rate",
    "mean",
    "enterprise_value",
];

/// Print just the key answer value from the output.
///
/// Looks for well-known result fields, then inside a nested `summary`, then
/// falls back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    println!("{}", minimal_answer(value));
}

fn minimal_answer(value: &Value) -> String {
    // Try to extract the "result" envelope
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        let nested = map.get("summary").and_then(Value::as_object);
        for scope in std::iter::once(map).chain(nested) {
            for key in &PRIORITY_KEYS {
                if let Some(val) = scope.get(*key) {
                    if !val.is_null() {
                        return format_minimal(val);
                    }
                }
            }
        }

        // Fall back to first field
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, format_minimal(val));
        }
    }

    format_minimal(result_obj)
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
