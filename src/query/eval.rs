use crate::document::JsonMap;
use crate::geo::GeoPoint;
use serde_json::Value;
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_IN_SET, MAX_PATH_DEPTH};

/// Evaluates `filter` against a document body.
pub fn eval_filter(doc: &JsonMap, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => {
            get_path(doc, path).is_some_and(|v| values.iter().take(MAX_IN_SET).any(|x| x == v))
        }
        Filter::Cmp { path, op, value } => get_path(doc, path).is_some_and(|v| match op {
            CmpOp::Eq => v == value,
            CmpOp::Gt => compare_json(v, value) == Some(Ordering::Greater),
            CmpOp::Gte => {
                matches!(compare_json(v, value), Some(Ordering::Greater | Ordering::Equal))
            }
            CmpOp::Lt => compare_json(v, value) == Some(Ordering::Less),
            CmpOp::Lte => matches!(compare_json(v, value), Some(Ordering::Less | Ordering::Equal)),
        }),
        Filter::Within { path, center, max_distance } => get_path(doc, path)
            .and_then(GeoPoint::from_json)
            .is_some_and(|p| p.distance_to(center) < *max_distance),
    }
}

/// Orders two JSON scalars of the same kind. Mixed kinds do not compare.
pub fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn get_path<'a>(doc: &'a JsonMap, path: &str) -> Option<&'a Value> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}
