//! Response decoding and expected/observed comparison.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::scenario::ExpectedValue;
use crate::error::ProtocolError;
use crate::telemetry::proto::{typed_value, Decimal64, GetResponse};

/// Value decoded from a telemetry response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ObservedValue {
    /// No response body (error status, or not decoded).
    Absent,
    /// A single leaf rendered as text.
    Scalar(String),
    /// A decoded JSON sub-tree.
    Structured(JsonValue),
}

/// Largest precision a gNMI decimal64 can carry.
const MAX_DECIMAL_PRECISION: u32 = 18;

fn decimal_text(d: &Decimal64) -> Result<String, ProtocolError> {
    if d.precision > MAX_DECIMAL_PRECISION {
        return Err(ProtocolError::MalformedPayload {
            reason: format!(
                "decimal64 precision {} exceeds {MAX_DECIMAL_PRECISION}",
                d.precision
            ),
        });
    }
    if d.precision == 0 {
        return Ok(d.digits.to_string());
    }
    let negative = d.digits < 0;
    let digits = d.digits.unsigned_abs().to_string();
    let precision = d.precision as usize;
    let padded = format!("{digits:0>width$}", width = precision + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - precision);
    Ok(format!("{}{int_part}.{frac_part}", if negative { "-" } else { "" }))
}

/// Decode the single value of a `Get` response.
///
/// The response must carry exactly one notification with exactly one update.
/// `json_ietf_val` and `json_val` decode to a structured tree; every other
/// scalar encoding decodes to its textual form.
pub fn decode_response(response: &GetResponse) -> Result<ObservedValue, ProtocolError> {
    let [notification] = response.notification.as_slice() else {
        return Err(ProtocolError::NotificationCount {
            actual: response.notification.len(),
        });
    };
    let [update] = notification.update.as_slice() else {
        return Err(ProtocolError::UpdateCount {
            actual: notification.update.len(),
        });
    };
    let value = update
        .val
        .as_ref()
        .and_then(|v| v.value.as_ref())
        .ok_or(ProtocolError::MissingValue)?;

    use typed_value::Value;
    let scalar = match value {
        Value::JsonIetfVal(bytes) | Value::JsonVal(bytes) => {
            let tree = serde_json::from_slice(bytes).map_err(|e| ProtocolError::MalformedPayload {
                reason: e.to_string(),
            })?;
            return Ok(ObservedValue::Structured(tree));
        }
        Value::StringVal(s) | Value::AsciiVal(s) => s.clone(),
        Value::IntVal(i) => i.to_string(),
        Value::UintVal(u) => u.to_string(),
        Value::BoolVal(b) => b.to_string(),
        Value::FloatVal(f) => f.to_string(),
        Value::DoubleVal(d) => d.to_string(),
        Value::DecimalVal(d) => decimal_text(d)?,
        Value::BytesVal(_) => return Err(ProtocolError::UnsupportedScalar { kind: "bytes_val" }),
        Value::ProtoBytes(_) => return Err(ProtocolError::UnsupportedScalar { kind: "proto_bytes" }),
        Value::LeaflistVal(_) => return Err(ProtocolError::UnsupportedScalar { kind: "leaflist_val" }),
    };
    Ok(ObservedValue::Scalar(scalar))
}

/// Text of a JSON leaf; counters travel as strings, so `6` and `"6"` agree.
fn leaf_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether `observed` satisfies `expected`.
///
/// Structured payloads compare as unordered field sets at every level.
/// Scalars compare textually, including a scalar that arrives wrapped as a
/// JSON leaf.
#[must_use]
pub fn values_match(expected: &ExpectedValue, observed: &ObservedValue) -> bool {
    match (expected, observed) {
        (ExpectedValue::Absent, _) => true,
        (_, ObservedValue::Absent) => false,
        (ExpectedValue::Scalar(want), ObservedValue::Scalar(got)) => want == got,
        (ExpectedValue::Structured(want), ObservedValue::Structured(got)) => want == got,
        (ExpectedValue::Scalar(want), ObservedValue::Structured(got)) => leaf_text(got).as_deref() == Some(want),
        (ExpectedValue::Structured(want), ObservedValue::Scalar(got)) => leaf_text(want).as_deref() == Some(got),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::proto::{Notification, TypedValue, Update};
    use serde_json::json;

    fn response(values: Vec<typed_value::Value>) -> GetResponse {
        GetResponse {
            notification: vec![Notification {
                update: values
                    .into_iter()
                    .map(|v| Update {
                        val: Some(TypedValue { value: Some(v) }),
                        ..Update::default()
                    })
                    .collect(),
                ..Notification::default()
            }],
        }
    }

    #[test]
    fn json_ietf_decodes_to_tree() {
        let resp = response(vec![typed_value::Value::JsonIetfVal(br#"{"a": {"b": "1"}}"#.to_vec())]);
        assert_eq!(decode_response(&resp).unwrap(), ObservedValue::Structured(json!({"a": {"b": "1"}})));
    }

    #[test]
    fn scalars_decode_to_text() {
        let resp = response(vec![typed_value::Value::IntVal(6)]);
        assert_eq!(decode_response(&resp).unwrap(), ObservedValue::Scalar("6".to_string()));

        let resp = response(vec![typed_value::Value::DecimalVal(Decimal64 {
            digits: -1234,
            precision: 3,
        })]);
        assert_eq!(decode_response(&resp).unwrap(), ObservedValue::Scalar("-1.234".to_string()));

        let resp = response(vec![typed_value::Value::DecimalVal(Decimal64 {
            digits: 5,
            precision: 2,
        })]);
        assert_eq!(decode_response(&resp).unwrap(), ObservedValue::Scalar("0.05".to_string()));

        let resp = response(vec![typed_value::Value::DecimalVal(Decimal64 {
            digits: 1,
            precision: 18,
        })]);
        assert_eq!(
            decode_response(&resp).unwrap(),
            ObservedValue::Scalar("0.000000000000000001".to_string())
        );
    }

    #[test]
    fn oversized_decimal_precision_is_malformed() {
        let resp = response(vec![typed_value::Value::DecimalVal(Decimal64 {
            digits: 5,
            precision: u32::MAX,
        })]);
        assert!(matches!(
            decode_response(&resp),
            Err(ProtocolError::MalformedPayload { ref reason }) if reason.contains("precision")
        ));

        let resp = response(vec![typed_value::Value::DecimalVal(Decimal64 {
            digits: 5,
            precision: 19,
        })]);
        assert!(decode_response(&resp).is_err());
    }

    #[test]
    fn shape_errors_are_protocol_errors() {
        let empty = GetResponse::default();
        assert_eq!(
            decode_response(&empty).unwrap_err(),
            ProtocolError::NotificationCount { actual: 0 }
        );

        let two = response(vec![
            typed_value::Value::StringVal("1".to_string()),
            typed_value::Value::StringVal("2".to_string()),
        ]);
        assert_eq!(decode_response(&two).unwrap_err(), ProtocolError::UpdateCount { actual: 2 });

        let bad = response(vec![typed_value::Value::JsonIetfVal(b"{".to_vec())]);
        assert!(matches!(
            decode_response(&bad).unwrap_err(),
            ProtocolError::MalformedPayload { .. }
        ));

        let bytes = response(vec![typed_value::Value::BytesVal(vec![1])]);
        assert!(matches!(
            decode_response(&bytes).unwrap_err(),
            ProtocolError::UnsupportedScalar { .. }
        ));
    }

    #[test]
    fn structured_comparison_ignores_field_order() {
        let want = ExpectedValue::Structured(serde_json::from_str(r#"{"a": "1", "b": {"c": "2", "d": "3"}}"#).unwrap());
        let got = ObservedValue::Structured(serde_json::from_str(r#"{"b": {"d": "3", "c": "2"}, "a": "1"}"#).unwrap());
        assert!(values_match(&want, &got));

        let extra = ObservedValue::Structured(json!({"a": "1", "b": {"c": "2", "d": "3"}, "e": "4"}));
        assert!(!values_match(&want, &extra));
    }

    #[test]
    fn numeric_and_textual_counters_compare_equal() {
        let want = ExpectedValue::Scalar("6".to_string());
        assert!(values_match(&want, &ObservedValue::Scalar("6".to_string())));
        assert!(values_match(&want, &ObservedValue::Structured(json!(6))));
        assert!(values_match(&want, &ObservedValue::Structured(json!("6"))));
        assert!(!values_match(&want, &ObservedValue::Scalar("7".to_string())));
        assert!(!values_match(&want, &ObservedValue::Absent));
    }

    #[test]
    fn absent_expectation_accepts_anything() {
        assert!(values_match(&ExpectedValue::Absent, &ObservedValue::Absent));
        assert!(values_match(&ExpectedValue::Absent, &ObservedValue::Scalar("x".to_string())));
    }
}
