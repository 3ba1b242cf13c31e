use serde_json::{Map, Value};
use std::io;

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// Schedules come out one row per period. Results carrying per-period series
/// come out one row per series with a column per period; anything else as
/// two-column field/value rows with nested objects flattened.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => write_result_csv(&mut wtr, result),
            _ => write_fields_csv(&mut wtr, map),
        },
        Value::Array(arr) => {
            write_array_csv(&mut wtr, arr);
        }
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_result_csv(wtr: &mut StdoutWriter<'_>, result: &Map<String, Value>) {
    if let Some(Value::Array(entries)) = result.get("entries") {
        write_array_csv(wtr, entries);
        return;
    }

    let series: Vec<(&String, &Vec<Value>)> = result
        .iter()
        .filter_map(|(k, v)| match v {
            Value::Array(arr) if !arr.is_empty() && !arr[0].is_object() => Some((k, arr)),
            _ => None,
        })
        .collect();

    if series.is_empty() {
        write_fields_csv(wtr, result);
        return;
    }

    let periods = series.iter().map(|(_, s)| s.len()).max().unwrap_or(0);
    let mut header = vec!["series".to_string()];
    header.extend((0..periods).map(|p| p.to_string()));
    let _ = wtr.write_record(&header);

    for (name, values) in series {
        let mut row = vec![name.clone()];
        row.extend((0..periods).map(|p| values.get(p).map(format_csv_value).unwrap_or_default()));
        let _ = wtr.write_record(&row);
    }
}

fn write_fields_csv(wtr: &mut StdoutWriter<'_>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        write_flattened(wtr, key, val);
    }
}

fn write_flattened(wtr: &mut StdoutWriter<'_>, key: &str, value: &Value) {
    match value {
        Value::Object(inner) if !inner.is_empty() => {
            for (k, v) in inner {
                write_flattened(wtr, &format!("{key}.{k}"), v);
            }
        }
        _ => {
            let _ = wtr.write_record([key, format_csv_value(value).as_str()]);
        }
    }
}

fn write_array_csv(wtr: &mut StdoutWriter<'_>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
