//! Parameter sets exchanged with the gateway.
//!
//! Every request and notification is a flat map from field name to scalar value. Keys are
//! kept in a [`BTreeMap`], so iteration is always in byte order of the key regardless of how
//! the set was built; that ordering is what the token canonicalization relies on.
//!
//! ## Stringification
//!
//! Values are hashed and form-encoded through their [`Display`](fmt::Display) form:
//!
//! | value | rendered as |
//! |-------|-------------|
//! | string | itself |
//! | boolean | `true` / `false` |
//! | integer | plain decimal (`100`, `-5`) |
//! | integral float below 1e21 | plain decimal without fraction (`100.0` -> `100`, `-0.0` -> `0`) |
//! | other float | shortest round-trip decimal (`10.5`, `1e+21`) |
//! | nested `DATA` | `key=value` pairs joined by `|`, values percent-encoded as by `encodeURIComponent` |
//!
//! This is the JavaScript `Number#toString` rendering the gateway uses, so `"Amount": 100.0`
//! and `"Amount": 100` hash alike, and `"Success": true` hashes as `true`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Field carrying the merchant terminal identifier.
pub const TERMINAL_KEY: &str = "TerminalKey";
/// Field carrying the request/notification signature.
pub const TOKEN: &str = "Token";
/// Pseudo-field under which the shared secret enters the token computation. Never transmitted.
pub const PASSWORD: &str = "Password";
/// Field holding the `Init` sub-object of free-form merchant data.
pub const DATA: &str = "DATA";

/// Separator between flattened `DATA` pairs.
const DATA_PAIR_SEPARATOR: &str = "|";

/// A flat set of request or notification fields, ordered by key.
pub type ParameterSet = BTreeMap<String, ParamValue>;

/// Build a [`ParameterSet`] from anything that yields key/value pairs.
pub fn parameter_set<K, V, I>(pairs: I) -> ParameterSet
where
    K: Into<String>,
    V: Into<ParamValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Nested(NestedData),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Number(n) => f.write_str(&render_number(n)),
            ParamValue::String(s) => f.write_str(s),
            ParamValue::Nested(data) => f.write_str(&data.flatten()),
        }
    }
}

/// Render a number the way JavaScript's `Number#toString` does for the values the gateway
/// sends: integral floats lose their `.0`, larger magnitudes keep exponent form.
fn render_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(v) if n.is_f64() && v == 0.0 => "0".to_string(),
        Some(v) if n.is_f64() && v.fract() == 0.0 && v.abs() < 1e21 => format!("{}", v),
        _ => {
            let rendered = n.to_string();
            if rendered.contains('e') && !rendered.contains("e-") {
                rendered.replacen('e', "e+", 1)
            } else {
                rendered
            }
        }
    }
}

/// Percent-encode like JavaScript's `encodeURIComponent`, which leaves `!'()*` as is.
fn encode_uri_component(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

macro_rules! integer_param {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Number(serde_json::Number::from(value))
                }
            }
        )*
    };
}

integer_param!(i32, i64, u32, u64);

impl From<f64> for ParamValue {
    /// Non-finite floats have no JSON number form and fall back to their string rendering.
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(ParamValue::Number)
            .unwrap_or_else(|| ParamValue::String(value.to_string()))
    }
}

impl From<NestedData> for ParamValue {
    fn from(value: NestedData) -> Self {
        ParamValue::Nested(value)
    }
}

/// Ordered key/value sub-object sent as the `DATA` field of `Init`.
///
/// Unlike [`ParameterSet`] the pairs keep the order they were given in; the flattened
/// string depends on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedData(Vec<(String, ParamValue)>);

impl NestedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair, replacing the value in place if the key is already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as `k1=v1|k2=v2`, percent-encoding each value.
    pub fn flatten(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{}={}", key, encode_uri_component(&value.to_string())))
            .collect::<Vec<_>>()
            .join(DATA_PAIR_SEPARATOR)
    }
}

impl<K, V> FromIterator<(K, V)> for NestedData
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = NestedData::new();
        for (k, v) in iter {
            data.insert(k, v);
        }
        data
    }
}

impl Serialize for NestedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NestedData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NestedDataVisitor;

        impl<'de> Visitor<'de> for NestedDataVisitor {
            type Value = NestedData;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut data = NestedData::new();
                while let Some((key, value)) = access.next_entry::<String, ParamValue>()? {
                    data.insert(key, value);
                }
                Ok(data)
            }
        }

        deserializer.deserialize_map(NestedDataVisitor)
    }
}

/// Replace a nested `DATA` field with its flattened string form.
pub fn flatten_data(params: &mut ParameterSet) {
    if let Some(ParamValue::Nested(data)) = params.get(DATA) {
        let flattened = data.flatten();
        params.insert(DATA.to_string(), ParamValue::String(flattened));
    }
}

/// Render a parameter set as form fields, in key order.
pub fn to_form(params: &ParameterSet) -> Vec<(String, String)> {
    params.iter().map(|(k, v)| (k.clone(), v.to_string())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_stringification() {
        assert_eq!(ParamValue::from("21090").to_string(), "21090");
        assert_eq!(ParamValue::from(100).to_string(), "100");
        assert_eq!(ParamValue::from(-5i64).to_string(), "-5");
        assert_eq!(ParamValue::from(10.5).to_string(), "10.5");
        assert_eq!(ParamValue::from(100.0).to_string(), "100");
        assert_eq!(ParamValue::from(-0.0).to_string(), "0");
        assert_eq!(ParamValue::from(1e20).to_string(), "100000000000000000000");
        assert_eq!(ParamValue::from(true).to_string(), "true");
        assert_eq!(ParamValue::from(false).to_string(), "false");
    }

    #[test]
    fn test_non_finite_float_falls_back_to_string() {
        assert_eq!(ParamValue::from(f64::NAN), ParamValue::String("NaN".to_string()));
    }

    #[test]
    fn test_flatten_data_example() {
        let data: NestedData = [("a", "1"), ("b", "x y")].into_iter().collect();
        assert_eq!(data.flatten(), "a=1|b=x%20y");
    }

    #[test]
    fn test_flatten_data_keeps_given_order() {
        let data: NestedData = [("z", "last"), ("a", "first")].into_iter().collect();
        assert_eq!(data.flatten(), "z=last|a=first");
    }

    #[test]
    fn test_flatten_data_encodes_reserved_characters() {
        let data: NestedData = [("email", "a+b@example.com"), ("note", "50%|ok")].into_iter().collect();
        assert_eq!(data.flatten(), "email=a%2Bb%40example.com|note=50%25%7Cok");
    }

    #[test]
    fn test_flatten_data_leaves_uri_marks_unescaped() {
        let data: NestedData = [("note", "a!b'(c)*"), ("literal", "%21")].into_iter().collect();
        assert_eq!(data.flatten(), "note=a!b'(c)*|literal=%2521");
    }

    #[test]
    fn test_integral_float_renders_like_integer() {
        let as_float: ParameterSet = serde_json::from_str(r#"{"Amount": 100.0, "Fee": 1e21}"#).unwrap();
        let as_integer: ParameterSet = serde_json::from_str(r#"{"Amount": 100, "Fee": 1e21}"#).unwrap();

        assert_eq!(as_float.get("Amount").map(ToString::to_string).as_deref(), Some("100"));
        assert_eq!(as_float.get("Fee").map(ToString::to_string).as_deref(), Some("1e+21"));
        assert_eq!(
            crate::signing::compute_token(&as_float, "secret"),
            crate::signing::compute_token(&as_integer, "secret")
        );
    }

    #[test]
    fn test_nested_insert_replaces_in_place() {
        let mut data: NestedData = [("a", "1"), ("b", "2")].into_iter().collect();
        data.insert("a", "3");
        assert_eq!(data.flatten(), "a=3|b=2");
    }

    #[test]
    fn test_flatten_data_field_in_set() {
        let data: NestedData = [("a", "1"), ("b", "x y")].into_iter().collect();
        let mut params = parameter_set([("DATA", ParamValue::from(data)), ("OrderId", ParamValue::from("1"))]);

        flatten_data(&mut params);

        assert_eq!(params.get(DATA), Some(&ParamValue::String("a=1|b=x%20y".to_string())));
        assert_eq!(params.get("OrderId"), Some(&ParamValue::from("1")));
    }

    #[test]
    fn test_flatten_data_without_data_is_noop() {
        let mut params = parameter_set([("DATA", "already=flat")]);
        let before = params.clone();
        flatten_data(&mut params);
        assert_eq!(params, before);
    }

    #[test]
    fn test_parameter_set_iterates_in_byte_order() {
        let params = parameter_set([("b", "2"), ("B", "1"), ("a", "3"), ("Amount", "4")]);
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Amount", "B", "a", "b"]);
    }

    #[test]
    fn test_deserialize_notification_json() {
        let body = r#"{
            "TerminalKey": "TestTerminal",
            "OrderId": "21090",
            "Success": true,
            "Status": "CONFIRMED",
            "PaymentId": 13660,
            "Amount": 100000,
            "Token": "abc"
        }"#;

        let params: ParameterSet = serde_json::from_str(body).unwrap();

        assert_eq!(params.get("Success"), Some(&ParamValue::Bool(true)));
        assert_eq!(params.get("Amount").map(ToString::to_string).as_deref(), Some("100000"));
        assert_eq!(params.get("PaymentId").map(ToString::to_string).as_deref(), Some("13660"));
        assert_eq!(params.get(TOKEN).and_then(ParamValue::as_str), Some("abc"));
    }

    #[test]
    fn test_deserialize_nested_keeps_document_order() {
        let params: ParameterSet = serde_json::from_str(r#"{"DATA": {"phone": "+7 900", "email": "a@b.c"}}"#).unwrap();
        let Some(ParamValue::Nested(data)) = params.get(DATA) else {
            panic!("DATA should deserialize as nested data");
        };
        assert_eq!(data.flatten(), "phone=%2B7%20900|email=a%40b.c");
    }

    #[test]
    fn test_to_form_renders_strings() {
        let params = parameter_set([("Amount", ParamValue::from(100)), ("Recurrent", ParamValue::from(false))]);
        assert_eq!(
            to_form(&params),
            vec![
                ("Amount".to_string(), "100".to_string()),
                ("Recurrent".to_string(), "false".to_string())
            ]
        );
    }
}
