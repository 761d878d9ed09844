//! Field-by-field validation of a predict body. Every offending field is
//! reported, not only the first one; unknown fields are ignored.

use super::error::{FieldError, ServiceError};
use crate::features::CustomerFeatures;
use serde_json::{Map, Value};

/// Customer id used for request-scoped feature rows.
const REQUEST_CUSTOMER: &str = "request";

pub fn parse_features(body: &Value) -> Result<CustomerFeatures, ServiceError> {
    let obj = body
        .as_object()
        .ok_or_else(|| ServiceError::bad_request("body", "must be a JSON object"))?;

    let mut errors = Vec::new();
    let total_transactions = count(obj, "total_transactions", &mut errors);
    let total_value = real(obj, "total_value", &mut errors);
    let avg_value = real(obj, "avg_value", &mut errors);
    let std_value = real(obj, "std_value", &mut errors);
    let unique_products = count(obj, "unique_products", &mut errors);
    let channel = text(obj, "most_frequent_channel", &mut errors);

    match (total_transactions, total_value, avg_value, std_value, unique_products, channel) {
        (Some(tt), Some(tv), Some(av), Some(sv), Some(up), Some(ch)) if errors.is_empty() => {
            Ok(CustomerFeatures {
                customer_id: REQUEST_CUSTOMER.to_string(),
                total_transactions: tt,
                total_value: tv,
                avg_value: av,
                std_value: sv,
                unique_products: up,
                most_frequent_channel: ch,
            })
        }
        _ => Err(ServiceError::BadRequest { fields: errors }),
    }
}

fn present<'a>(obj: &'a Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<&'a Value> {
    match obj.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(field, "is required"));
            None
        }
        Some(v) => Some(v),
    }
}

/// Non-negative integer; integral floats such as `3.0` are accepted.
fn count(obj: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<u64> {
    let v = present(obj, field, errors)?;
    let parsed = match v {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(u)
            } else {
                match n.as_f64() {
                    Some(f) if f < 0.0 => Err("must be non-negative"),
                    Some(f) if f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
                    _ => Err("must be an integer"),
                }
            }
        }
        _ => Err("must be an integer"),
    };
    parsed.map_err(|reason| errors.push(FieldError::new(field, reason))).ok()
}

fn real(obj: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<f64> {
    let v = present(obj, field, errors)?;
    match v.as_f64() {
        Some(f) if f.is_finite() => Some(f),
        _ => {
            errors.push(FieldError::new(field, "must be a number"));
            None
        }
    }
}

fn text(obj: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    let v = present(obj, field, errors)?;
    match v.as_str() {
        Some(s) if !s.trim().is_empty() => Some(s.to_string()),
        Some(_) => {
            errors.push(FieldError::new(field, "must not be empty"));
            None
        }
        None => {
            errors.push(FieldError::new(field, "must be a string"));
            None
        }
    }
}
