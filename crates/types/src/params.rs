//! Typed template parameters.

use indexmap::IndexMap;
use serde_json::Value;

/// A single value substituted into a template slot.
///
/// The variant decides how the value is written into the document: strings
/// are JSON-escaped and stay quoted, numbers and booleans are written bare,
/// and `Raw` fragments are copied verbatim so callers can inject lists or
/// objects.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Raw(String),
}

impl ParamValue {
    /// A pre-serialized JSON fragment, written into the document unquoted.
    pub fn raw(fragment: impl Into<String>) -> Self {
        Self::Raw(fragment.into())
    }

    /// Comma-joined list of quoted strings, for `[$region_list]` style slots.
    pub fn quoted_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = items
            .into_iter()
            .map(|item| Value::String(item.as_ref().to_string()).to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self::Raw(joined)
    }

    /// Convert a JSON value: scalars keep their type, arrays and objects
    /// become raw fragments.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::String(text.clone()),
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => Self::Integer(integer),
                None => Self::Float(number.as_f64().unwrap_or_default()),
            },
            Value::Null | Value::Array(_) | Value::Object(_) => Self::Raw(value.to_string()),
        }
    }

    /// Infer a type from command-line text: booleans, integers and finite
    /// floats are typed, everything else is a string.
    ///
    /// A number is only typed when it prints back as the same text, so
    /// `007`, `2.10`, `1e3` and values beyond `i64` stay strings.
    pub fn parse_auto(text: &str) -> Self {
        match text {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(integer) = text.parse::<i64>() {
            if integer.to_string() == text {
                return Self::Integer(integer);
            }
            return Self::String(text.to_string());
        }
        if let Ok(float) = text.parse::<f64>()
            && float.is_finite()
            && (float.to_string() == text || format!("{float:?}") == text)
        {
            return Self::Float(float);
        }
        Self::String(text.to_string())
    }

    /// True when the value is written without surrounding quotes.
    pub fn is_bare(&self) -> bool {
        !matches!(self, Self::String(_))
    }

    /// Text written into a slot that stands on its own, outside any string.
    pub fn to_bare_text(&self) -> String {
        match self {
            Self::String(text) => Value::String(text.clone()).to_string(),
            Self::Integer(integer) => integer.to_string(),
            Self::Float(float) => float.to_string(),
            Self::Bool(flag) => flag.to_string(),
            Self::Raw(fragment) => fragment.clone(),
        }
    }

    /// Text written into a slot that sits inside a larger JSON string.
    pub fn to_embedded_text(&self) -> String {
        match self {
            Self::String(text) => escape_json_string_content(text),
            Self::Raw(fragment) => fragment.clone(),
            other => other.to_bare_text(),
        }
    }
}

fn escape_json_string_content(text: &str) -> String {
    let quoted = Value::String(text.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered mapping from placeholder identifier to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: IndexMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlay `other` onto `self`; keys in `other` win.
    pub fn merge(&mut self, other: ParameterSet) {
        self.values.extend(other.values);
    }

    /// Build a parameter set from a JSON object, e.g. a `--params-file`.
    pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
        object
            .iter()
            .map(|(key, value)| (key.clone(), ParamValue::from_json(value)))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, ParamValue)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (K, ParamValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(key, value)| (key.into(), value)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_auto_infers_scalar_types() {
        assert_eq!(ParamValue::parse_auto("5"), ParamValue::Integer(5));
        assert_eq!(ParamValue::parse_auto("1.5"), ParamValue::Float(1.5));
        assert_eq!(ParamValue::parse_auto("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse_auto("us-west-2"), ParamValue::String("us-west-2".into()));
        assert_eq!(ParamValue::parse_auto("NaN"), ParamValue::String("NaN".into()));
        assert_eq!(ParamValue::parse_auto("-3"), ParamValue::Integer(-3));
        assert_eq!(ParamValue::parse_auto("4.0"), ParamValue::Float(4.0));
    }

    #[test]
    fn parse_auto_keeps_text_that_would_change_as_a_number() {
        for text in ["007", "+5", "-0", "2.10", "1e3", ".5", "12345678901234567890"] {
            let value = ParamValue::parse_auto(text);
            assert_eq!(value, ParamValue::String(text.into()), "{text}");
            assert_eq!(value.to_bare_text(), format!("\"{text}\""));
        }
    }

    #[test]
    fn quoted_list_builds_raw_fragment() {
        let value = ParamValue::quoted_list(["a-1", "b\"2"]);
        assert_eq!(value, ParamValue::Raw(r#""a-1","b\"2""#.into()));
    }

    #[test]
    fn embedded_text_escapes_strings() {
        let value = ParamValue::from("line\n\"quoted\"");
        assert_eq!(value.to_embedded_text(), r#"line\n\"quoted\""#);
        assert_eq!(value.to_bare_text(), r#""line\n\"quoted\"""#);
    }

    #[test]
    fn from_json_object_keeps_types() {
        let object = json!({ "name": "demo", "nodes": 3, "ratio": 0.5, "tls": false, "zones": ["a", "b"] });
        let params = ParameterSet::from_json_object(object.as_object().expect("object"));
        assert_eq!(params.get("name"), Some(&ParamValue::String("demo".into())));
        assert_eq!(params.get("nodes"), Some(&ParamValue::Integer(3)));
        assert_eq!(params.get("ratio"), Some(&ParamValue::Float(0.5)));
        assert_eq!(params.get("tls"), Some(&ParamValue::Bool(false)));
        assert_eq!(params.get("zones"), Some(&ParamValue::Raw(r#"["a","b"]"#.into())));
    }

    #[test]
    fn merge_prefers_incoming_values() {
        let mut base = ParameterSet::new().with("name", "old").with("size", 5i64);
        base.merge(ParameterSet::new().with("name", "new"));
        assert_eq!(base.get("name"), Some(&ParamValue::String("new".into())));
        assert_eq!(base.get("size"), Some(&ParamValue::Integer(5)));
        assert_eq!(base.keys().collect::<Vec<_>>(), vec!["name", "size"]);
    }
}
