use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Looks for well-known result fields in order of priority, first inside the
/// result's `kpis` block and then at its top level, and falls back to the
/// first field of the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "metric_value",
        "npv",
        "installment",
        "total_paid",
        "total_investment",
    ];

    if let Value::Object(map) = result_obj {
        let nested = map.get("kpis").and_then(Value::as_object);
        let scopes = nested.into_iter().chain(std::iter::once(map));

        for scope in scopes {
            for key in &priority_keys {
                if let Some(val) = scope.get(*key) {
                    if !val.is_null() {
                        println!("{}", format_minimal(val));
                        return;
                    }
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
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
