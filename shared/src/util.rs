//! Lenient serde helpers for rows coming out of the hosted database
//!
//! Columns written by older clients are not always well-formed: JSON columns
//! may hold `null`, an object instead of an array, or booleans may be `null`.
//! These helpers degrade such values to `None`/default instead of failing the
//! whole row.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize a JSON column that should hold an array.
///
/// Anything that is not an array of well-formed elements becomes `None`.
pub fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(v @ Value::Array(_)) => match serde_json::from_value::<Vec<T>>(v) {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed array column");
                None
            }
        },
        _ => None,
    })
}

/// Deserialize a value where `null` means "default".
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize a numeric column that PostgREST may serialize as a string.
pub fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        Value::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected number, got {other}"
        ))),
    }
}

/// Optional variant of [`number_or_string`].
pub fn opt_number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "lenient_vec")]
        list: Option<Vec<u32>>,
        #[serde(default, deserialize_with = "null_as_default")]
        flag: bool,
        #[serde(deserialize_with = "number_or_string")]
        amount: f64,
        #[serde(default, deserialize_with = "opt_number_or_string")]
        maybe: Option<f64>,
    }

    #[test]
    fn test_lenient_columns() {
        let row: Row = serde_json::from_value(serde_json::json!({
            "list": {"not": "an array"},
            "flag": null,
            "amount": "1500.50",
            "maybe": ""
        }))
        .unwrap();
        assert!(row.list.is_none());
        assert!(!row.flag);
        assert_eq!(row.amount, 1500.5);
        assert!(row.maybe.is_none());
    }

    #[test]
    fn test_wellformed_columns() {
        let row: Row = serde_json::from_value(serde_json::json!({
            "list": [1, 2],
            "flag": true,
            "amount": 200,
            "maybe": 50
        }))
        .unwrap();
        assert_eq!(row.list, Some(vec![1, 2]));
        assert!(row.flag);
        assert_eq!(row.maybe, Some(50.0));
    }

    #[test]
    fn test_array_with_bad_elements_is_dropped() {
        let row: Row = serde_json::from_value(serde_json::json!({
            "list": [1, "two"],
            "amount": 1
        }))
        .unwrap();
        assert!(row.list.is_none());
    }
}
