//! Filter, sort, limit and projection over in-memory records

use serde_json::{Map, Value};
use std::cmp::Ordering;
use storecrew_core::{Query, Record, SortOrder};

/// JSON equality with numbers compared by value, so `30` matches `30.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Every filter clause must match.
pub fn matches_filter(record: &Record, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(field, want)| record.get(field).is_some_and(|have| values_equal(have, want)))
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order used for sorting: missing < null-like < bool < number < text.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Run a query over records in stored order.
pub fn apply_query<'a, I>(records: I, query: &Query) -> Vec<Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut out: Vec<Record> = records
        .into_iter()
        .filter(|r| matches_filter(r, &query.filter))
        .cloned()
        .collect();

    if !query.sort.is_empty() {
        out.sort_by(|a, b| {
            for key in &query.sort {
                let ord = compare_values(a.get(&key.field), b.get(&key.field));
                let ord = match key.order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    if let Some(limit) = query.limit {
        out.truncate(limit);
    }

    if let Some(fields) = &query.projection {
        for record in &mut out {
            record.retain(|k, _| k == "_id" || fields.iter().any(|f| f == k));
        }
    }

    out
}
