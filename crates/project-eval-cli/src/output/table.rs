use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
///
/// Per-period series share one table with a column per period, arrays of
/// records (schedule entries) get their own table, and the remaining scalar
/// fields are listed as Field / Value pairs with nested objects flattened.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_fields(map);
            }
        }
        Value::Array(arr) => {
            print_array_table(arr);
        }
        _ => {
            println!("{}", value);
        }
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    if let Value::Object(res_map) = result {
        let mut series: Vec<(&str, &Vec<Value>)> = Vec::new();
        let mut records: Vec<(&str, &Vec<Value>)> = Vec::new();
        let mut scalars = Map::new();

        for (key, val) in res_map {
            match val {
                Value::Array(arr) if arr.first().is_some_and(Value::is_object) => {
                    records.push((key.as_str(), arr))
                }
                Value::Array(arr) if !arr.is_empty() => series.push((key.as_str(), arr)),
                _ => {
                    scalars.insert(key.clone(), val.clone());
                }
            }
        }

        if !series.is_empty() {
            print_series_table(&series);
            println!();
        }
        for (key, arr) in records {
            println!("{}:", key);
            print_array_table(arr);
            println!();
        }
        print_fields(&scalars);
    } else {
        print_fields(envelope);
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_series_table(series: &[(&str, &Vec<Value>)]) {
    let periods = series.iter().map(|(_, s)| s.len()).max().unwrap_or(0);

    let mut builder = Builder::default();
    let mut header = vec!["Period".to_string()];
    header.extend((0..periods).map(|p| p.to_string()));
    builder.push_record(header);

    for (name, values) in series {
        let mut row = vec![name.to_string()];
        row.extend(
            (0..periods).map(|p| values.get(p).map(format_value).unwrap_or_default()),
        );
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        push_flattened(&mut builder, key, val);
    }
    println!("{}", Table::from(builder));
}

fn push_flattened(builder: &mut Builder, key: &str, value: &Value) {
    match value {
        Value::Object(inner) if !inner.is_empty() => {
            for (k, v) in inner {
                push_flattened(builder, &format!("{key}.{k}"), v);
            }
        }
        _ => builder.push_record([key.to_string(), format_value(value)]),
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
