//! Evaluated binding values
//!
//! Declarations evaluate to JSON data, `undefined`, or a reference to a view
//! method (`click: view.save`). Conversions follow JavaScript rules so that
//! handlers behave the way authors of declarations expect.

use serde_json::{Map, Value};

/// Value of one binding after evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum BindingValue {
    /// Missing key, absent `state`/`computed`, or literal `undefined`
    Undefined,
    /// Plain data
    Json(Value),
    /// Reference to a view method, invoked by listeners such as `click`
    Method(String),
}

impl BindingValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, BindingValue::Undefined)
    }

    /// JavaScript truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            BindingValue::Undefined => false,
            BindingValue::Method(_) => true,
            BindingValue::Json(value) => json_truthy(value),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            BindingValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.as_json().and_then(Value::as_object)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    pub fn as_method(&self) -> Option<&str> {
        match self {
            BindingValue::Method(name) => Some(name),
            _ => None,
        }
    }

    /// JSON view of the value; `undefined` becomes `null`
    pub fn to_json(&self) -> Value {
        match self {
            BindingValue::Json(value) => value.clone(),
            BindingValue::Undefined | BindingValue::Method(_) => Value::Null,
        }
    }

    /// Content string for text/markup/value properties (`undefined`/`null` → "")
    pub fn to_content_string(&self) -> String {
        match self {
            BindingValue::Undefined | BindingValue::Json(Value::Null) => String::new(),
            other => other.to_js_string(),
        }
    }

    /// JavaScript `String(value)` conversion
    pub fn to_js_string(&self) -> String {
        match self {
            BindingValue::Undefined => "undefined".to_string(),
            BindingValue::Method(name) => format!("function {name}()"),
            BindingValue::Json(value) => json_to_js_string(value),
        }
    }

    /// Short type label for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            BindingValue::Undefined => "undefined",
            BindingValue::Method(_) => "function",
            BindingValue::Json(value) => json_type_name(value),
        }
    }
}

impl From<Value> for BindingValue {
    fn from(value: Value) -> Self {
        BindingValue::Json(value)
    }
}

/// JavaScript truthiness over JSON values
pub fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// JavaScript `String(value)` over JSON values
pub fn json_to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_js_string(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => json_to_js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn number_to_js_string(n: &serde_json::Number) -> String {
    let Some(f) = n.as_f64().filter(|_| n.is_f64()) else {
        return n.to_string();
    };
    if f == 0.0 {
        // covers -0
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&f.abs()) {
        // shortest round-trip digits, never an exponent, `4` for 4.0
        return f.to_string();
    }
    let exponential = format!("{f:e}");
    match exponential.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => exponential,
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_follows_javascript() {
        assert!(!BindingValue::Undefined.is_truthy());
        assert!(!BindingValue::Json(json!(null)).is_truthy());
        assert!(!BindingValue::Json(json!(0)).is_truthy());
        assert!(!BindingValue::Json(json!("")).is_truthy());
        assert!(!BindingValue::Json(json!(false)).is_truthy());
        assert!(BindingValue::Json(json!([])).is_truthy());
        assert!(BindingValue::Json(json!({})).is_truthy());
        assert!(BindingValue::Json(json!("0")).is_truthy());
        assert!(BindingValue::Method("save".into()).is_truthy());
    }

    #[test]
    fn js_string_conversion() {
        assert_eq!(BindingValue::Undefined.to_js_string(), "undefined");
        assert_eq!(BindingValue::Json(json!(null)).to_js_string(), "null");
        assert_eq!(BindingValue::Json(json!(3)).to_js_string(), "3");
        assert_eq!(BindingValue::Json(json!(2.5)).to_js_string(), "2.5");
        assert_eq!(BindingValue::Json(json!(4.0)).to_js_string(), "4");
        assert_eq!(BindingValue::Json(json!(-0.0)).to_js_string(), "0");
        assert_eq!(BindingValue::Json(json!([1, null, "a"])).to_js_string(), "1,,a");
        assert_eq!(BindingValue::Json(json!({"a": 1})).to_js_string(), "[object Object]");
    }

    #[test]
    fn content_string_blanks_missing_values() {
        assert_eq!(BindingValue::Undefined.to_content_string(), "");
        assert_eq!(BindingValue::Json(json!(null)).to_content_string(), "");
        assert_eq!(BindingValue::Json(json!("hi")).to_content_string(), "hi");
    }

    #[test]
    fn large_and_tiny_floats_format_like_javascript() {
        assert_eq!(json_to_js_string(&json!(1e20)), "100000000000000000000");
        assert_eq!(json_to_js_string(&json!(-1e20)), "-100000000000000000000");
        assert_eq!(json_to_js_string(&json!(9.5e18)), "9500000000000000000");
        assert_eq!(json_to_js_string(&json!(1e21)), "1e+21");
        assert_eq!(json_to_js_string(&json!(1.5e-7)), "1.5e-7");
        assert_eq!(json_to_js_string(&json!(0.000001)), "0.000001");
        assert_eq!(json_to_js_string(&json!(u64::MAX)), "18446744073709551615");
    }
}
