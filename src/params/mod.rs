//! Parameter bag for remote method calls.
//!
//! A [`ParameterBag`] holds loosely-typed values keyed by parameter name and
//! flattens them into the string tokens the API accepts on the wire.

use crate::errors::{VkError, VkResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Delimiter used when flattening list values
pub const LIST_DELIMITER: &str = ",";

/// A single parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Plain string
    Str(String),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Boolean, sent as `1` or `0`
    Bool(bool),
    /// List of scalar values, joined with [`LIST_DELIMITER`]
    List(Vec<ParamValue>),
    /// Structured value with no wire form; fails at encode time
    Structured(Value),
}

impl ParamValue {
    /// Convert a dynamic JSON value.
    ///
    /// Scalars and arrays map to their natural variant; objects become
    /// [`ParamValue::Structured`] and are rejected by [`ParameterBag::encode`].
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => ParamValue::Str(s),
            Value::Bool(b) => ParamValue::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => ParamValue::Int(i),
                // Above i64::MAX; keep the exact digits
                (None, Some(_)) => ParamValue::Str(n.to_string()),
                (None, None) => ParamValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::Array(items) => {
                ParamValue::List(items.into_iter().map(ParamValue::from_json).collect())
            }
            other => ParamValue::Structured(other),
        }
    }

    fn encode_scalar(&self, key: &str) -> VkResult<String> {
        match self {
            ParamValue::Str(s) => Ok(s.clone()),
            ParamValue::Int(i) => Ok(i.to_string()),
            ParamValue::Float(f) if f.is_finite() => Ok(f.to_string()),
            ParamValue::Float(f) => Err(VkError::InvalidParameter {
                key: key.to_string(),
                reason: format!("non-finite number {}", f),
            }),
            ParamValue::Bool(true) => Ok("1".to_string()),
            ParamValue::Bool(false) => Ok("0".to_string()),
            ParamValue::List(_) => Err(VkError::InvalidParameter {
                key: key.to_string(),
                reason: "nested lists have no wire form".to_string(),
            }),
            ParamValue::Structured(v) => Err(VkError::InvalidParameter {
                key: key.to_string(),
                reason: format!("structured value {} has no wire form", v),
            }),
        }
    }

    /// Flatten into a single wire token
    pub fn encode(&self, key: &str) -> VkResult<String> {
        match self {
            ParamValue::List(items) => {
                let tokens = items
                    .iter()
                    .map(|item| item.encode_scalar(key))
                    .collect::<VkResult<Vec<_>>>()?;
                Ok(tokens.join(LIST_DELIMITER))
            }
            scalar => scalar.encode_scalar(key),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<&String> for ParamValue {
    fn from(v: &String) -> Self {
        ParamValue::Str(v.clone())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ParamValue {
                fn from(v: $t) -> Self {
                    ParamValue::Int(v as i64)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        i64::try_from(v)
            .map(ParamValue::Int)
            .unwrap_or_else(|_| ParamValue::Str(v.to_string()))
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue> + Clone> From<&[T]> for ParamValue {
    fn from(v: &[T]) -> Self {
        ParamValue::List(v.iter().cloned().map(Into::into).collect())
    }
}

/// Parameters of one remote call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBag {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a JSON-typed parameter (keyboards, templates, `execute` arguments)
    /// serialized to a single string token
    pub fn set_json<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> VkResult<&mut Self> {
        let key = key.into();
        let token = serde_json::to_string(value).map_err(|e| VkError::InvalidParameter {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.values.insert(key, ParamValue::Str(token));
        Ok(self)
    }

    /// Builder-style [`set_json`](Self::set_json)
    pub fn with_json<T: Serialize>(mut self, key: impl Into<String>, value: &T) -> VkResult<Self> {
        self.set_json(key, value)?;
        Ok(self)
    }

    /// Get a parameter
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// Remove a parameter
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.values.remove(key)
    }

    /// Check whether a parameter is set
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge another bag, keeping values already present here
    pub fn merge(&mut self, other: &ParameterBag) -> &mut Self {
        for (key, value) in &other.values {
            self.values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Merge another bag, overwriting values already present here
    pub fn force_merge(&mut self, other: &ParameterBag) -> &mut Self {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
        self
    }

    /// Flatten into wire tokens, sorted by key
    pub fn encode(&self) -> VkResult<Vec<(String, String)>> {
        self.values
            .iter()
            .map(|(key, value)| Ok((key.clone(), value.encode(key)?)))
            .collect()
    }

    /// Build a bag from a JSON object
    pub fn from_json(value: Value) -> VkResult<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                values: map
                    .into_iter()
                    .map(|(k, v)| (k, ParamValue::from_json(v)))
                    .collect(),
            }),
            other => Err(VkError::InvalidParameter {
                key: String::new(),
                reason: format!("expected a JSON object, got {}", other),
            }),
        }
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = ParameterBag::new();
        for (k, v) in iter {
            bag.set(k, v);
        }
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_encode_scalars() {
        let bag = ParameterBag::new()
            .with("user_ids", "1")
            .with("count", 10)
            .with("extended", true)
            .with("online", false)
            .with("lat", 59.5);

        assert_eq!(
            bag.encode().unwrap(),
            vec![
                ("count".to_string(), "10".to_string()),
                ("extended".to_string(), "1".to_string()),
                ("lat".to_string(), "59.5".to_string()),
                ("online".to_string(), "0".to_string()),
                ("user_ids".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_encode_list_joins_with_comma() {
        let bag = ParameterBag::new().with("fields", vec!["photo_50", "city", "verified"]);
        assert_eq!(
            bag.encode().unwrap(),
            vec![("fields".to_string(), "photo_50,city,verified".to_string())]
        );

        let bag = ParameterBag::new().with("user_ids", vec![1, 2, 3]);
        assert_eq!(bag.encode().unwrap()[0].1, "1,2,3");
    }

    #[test]
    fn test_encode_is_insertion_order_independent() {
        let a = ParameterBag::new().with("b", 2).with("a", 1).with("c", "x");
        let b = ParameterBag::new().with("c", "x").with("a", 1).with("b", 2);
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn test_encode_has_no_duplicate_keys() {
        let mut bag = ParameterBag::new();
        bag.set("v", "5.131").set("v", "5.199");
        let encoded = bag.encode().unwrap();
        assert_eq!(encoded, vec![("v".to_string(), "5.199".to_string())]);
    }

    #[test]
    fn test_merge_keeps_existing() {
        let mut bag = ParameterBag::new().with("v", "5.131").with("user_ids", "1");
        let defaults = ParameterBag::new()
            .with("v", "5.199")
            .with("access_token", "token");

        bag.merge(&defaults);

        assert_eq!(bag.get("v"), Some(&ParamValue::from("5.131")));
        assert_eq!(bag.get("access_token"), Some(&ParamValue::from("token")));
        assert_eq!(bag.len(), 3);
    }

    #[test]
    fn test_force_merge_overwrites() {
        let mut bag = ParameterBag::new().with("v", "5.131");
        let overrides = ParameterBag::new().with("v", "5.199");

        bag.force_merge(&overrides);

        assert_eq!(bag.get("v"), Some(&ParamValue::from("5.199")));
    }

    #[test]
    fn test_nested_list_rejected() {
        let bag = ParameterBag::new().with(
            "ids",
            ParamValue::List(vec![ParamValue::List(vec![ParamValue::Int(1)])]),
        );
        assert!(matches!(
            bag.encode(),
            Err(VkError::InvalidParameter { key, .. }) if key == "ids"
        ));
    }

    #[test]
    fn test_from_json_object_value_rejected_at_encode() {
        let bag = ParameterBag::from_json(json!({
            "owner_id": -1,
            "filter": {"type": "owner"}
        }))
        .unwrap();

        assert!(bag.contains_key("owner_id"));
        assert!(matches!(
            bag.encode(),
            Err(VkError::InvalidParameter { key, .. }) if key == "filter"
        ));
    }

    #[test]
    fn test_json_value_token() {
        let keyboard = json!({"one_time": true, "buttons": []});
        let bag = ParameterBag::new().with_json("keyboard", &keyboard).unwrap();
        assert_eq!(
            bag.encode().unwrap()[0].1,
            r#"{"buttons":[],"one_time":true}"#
        );
    }

    #[test]
    fn test_json_serialize_failure_names_the_key() {
        use std::collections::HashMap;

        // Non-string map keys cannot be serialized to JSON
        let mut template = HashMap::new();
        template.insert((1, 2), "cell");

        let err = ParameterBag::new().with_json("template", &template).unwrap_err();
        assert!(matches!(
            err,
            VkError::InvalidParameter { key, .. } if key == "template"
        ));
    }

    #[test]
    fn test_large_unsigned_ids_keep_their_digits() {
        let bag = ParameterBag::from_json(json!({"owner_id": 18446744073709551615u64})).unwrap();
        assert_eq!(
            bag.encode().unwrap(),
            vec![("owner_id".to_string(), "18446744073709551615".to_string())]
        );

        let bag = ParameterBag::new()
            .with("peer_id", u64::MAX)
            .with("user_id", 7u64);
        assert_eq!(bag.get("user_id"), Some(&ParamValue::Int(7)));
        assert_eq!(bag.encode().unwrap()[0].1, "18446744073709551615");
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let bag = ParameterBag::new().with("lat", f64::NAN);
        assert!(bag.encode().is_err());
    }

    #[test]
    fn test_from_iterator() {
        let bag: ParameterBag = vec![("group_id", "1"), ("interval", "day")]
            .into_iter()
            .collect();
        assert_eq!(bag.len(), 2);
    }
}
