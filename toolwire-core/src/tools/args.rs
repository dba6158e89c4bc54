//! Mapping JSON-RPC arguments onto handler parameters
//!
//! Incoming `arguments` are checked against the tool's `ParamLayout`,
//! coerced leniently into the declared `ParamKind`s and validated against
//! the declared constraints. Structural problems (not an object, missing,
//! unknown or mistyped arguments) and constraint violations are reported
//! separately so they can map onto different protocol error codes.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{BoundParam, INSTRUCTIONS_PROPERTY, ParamKind, ParamLayout, PropertyType};

/// A typed argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(Map<String, Value>),
    Null,
}

impl ArgValue {
    /// Convert back into JSON
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::String(s) => Value::String(s.clone()),
            ArgValue::Integer(i) => Value::from(*i),
            ArgValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ArgValue::Boolean(b) => Value::Bool(*b),
            ArgValue::Array(items) => Value::Array(items.clone()),
            ArgValue::Object(map) => Value::Object(map.clone()),
            ArgValue::Null => Value::Null,
        }
    }

    /// Untyped conversion, used for defaults that did not parse
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => ArgValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ArgValue::Integer(i),
                None => ArgValue::Number(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => ArgValue::String(s.clone()),
            Value::Array(items) => ArgValue::Array(items.clone()),
            Value::Object(map) => ArgValue::Object(map.clone()),
        }
    }
}

/// Arguments handed to a handler, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: Vec<(String, ArgValue)>,
}

impl ToolArguments {
    /// Create an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs
    pub fn from_pairs(values: Vec<(String, ArgValue)>) -> Self {
        Self { values }
    }

    /// Look up a value by parameter name
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Whether a value was supplied (or defaulted) for the parameter
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ArgValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Floating point value; integers are widened
    pub fn f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ArgValue::Number(n) => Some(*n),
            ArgValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ArgValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn array(&self, name: &str) -> Option<&[Value]> {
        match self.get(name)? {
            ArgValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        match self.get(name)? {
            ArgValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// String value that the handler cannot do without
    pub fn require_str(&self, name: &str) -> Result<&str, super::ActionError> {
        self.str(name)
            .ok_or_else(|| super::ActionError::InvalidArgument(format!("'{}' is required", name)))
    }

    /// Deserialize all arguments into a struct
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }

    /// All arguments as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Argument mapping failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("arguments must be a JSON object")]
    NotAnObject,

    #[error("missing required argument '{0}'")]
    Missing(String),

    #[error("argument '{name}' must be {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: PropertyType,
        found: String,
    },

    #[error("unknown argument '{0}'")]
    Unknown(String),

    #[error("argument '{name}' {reason}")]
    Constraint { name: String, reason: String },
}

impl ArgumentError {
    /// Whether the failure is a declared-constraint violation
    pub fn is_constraint(&self) -> bool {
        matches!(self, ArgumentError::Constraint { .. })
    }
}

/// Map raw JSON `arguments` onto the layout.
///
/// An absent or `null` argument value is treated as an empty object.
pub fn map_arguments(layout: &ParamLayout, raw: &Value) -> Result<ToolArguments, ArgumentError> {
    let empty = Map::new();
    let object = match raw {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => return Err(ArgumentError::NotAnObject),
    };

    match layout {
        ParamLayout::Freeform => {
            if let Some(key) = object.keys().find(|key| *key != INSTRUCTIONS_PROPERTY) {
                return Err(ArgumentError::Unknown(key.clone()));
            }
            let mut values = Vec::new();
            if let Some(value) = object.get(INSTRUCTIONS_PROPERTY).filter(|v| !v.is_null()) {
                let value = coerce(INSTRUCTIONS_PROPERTY, &ParamKind::String, value)?;
                values.push((INSTRUCTIONS_PROPERTY.to_string(), value));
            }
            Ok(ToolArguments::from_pairs(values))
        }
        ParamLayout::Instructions(param) => {
            let name = &param.spec.name;
            if let Some(key) = object
                .keys()
                .find(|key| *key != INSTRUCTIONS_PROPERTY && *key != name)
            {
                return Err(ArgumentError::Unknown(key.clone()));
            }
            let value = object
                .get(INSTRUCTIONS_PROPERTY)
                .or_else(|| object.get(name))
                .filter(|v| !v.is_null())
                .ok_or_else(|| ArgumentError::Missing(INSTRUCTIONS_PROPERTY.to_string()))?;
            let value = coerce(INSTRUCTIONS_PROPERTY, &param.spec.kind, value)?;
            validate(param, &value)?;
            Ok(ToolArguments::from_pairs(vec![(name.clone(), value)]))
        }
        ParamLayout::Direct(params) => {
            if let Some(key) = object
                .keys()
                .find(|key| !params.iter().any(|p| &p.spec.name == *key))
            {
                return Err(ArgumentError::Unknown(key.clone()));
            }

            let mut values = Vec::with_capacity(params.len());
            for param in params {
                let name = &param.spec.name;
                match object.get(name).filter(|v| !v.is_null()) {
                    Some(value) => {
                        let value = coerce(name, &param.spec.kind, value)?;
                        validate(param, &value)?;
                        values.push((name.clone(), value));
                    }
                    None => {
                        if let Some(default) = &param.default {
                            let value = coerce(name, &param.spec.kind, default)
                                .unwrap_or_else(|_| ArgValue::from_json(default));
                            values.push((name.clone(), value));
                        } else if param.spec.is_required() {
                            return Err(ArgumentError::Missing(name.clone()));
                        }
                    }
                }
            }
            Ok(ToolArguments::from_pairs(values))
        }
    }
}

fn json_type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

fn coerce(name: &str, kind: &ParamKind, value: &Value) -> Result<ArgValue, ArgumentError> {
    let mismatch = || ArgumentError::TypeMismatch {
        name: name.to_string(),
        expected: kind.property_type(),
        found: json_type_name(value),
    };

    match kind {
        ParamKind::String => match value {
            Value::String(s) => Ok(ArgValue::String(s.clone())),
            Value::Number(n) => Ok(ArgValue::String(n.to_string())),
            Value::Bool(b) => Ok(ArgValue::String(b.to_string())),
            _ => Err(mismatch()),
        },
        ParamKind::Char => match value {
            Value::String(s) if s.chars().count() == 1 => Ok(ArgValue::String(s.clone())),
            Value::String(_) => Err(ArgumentError::Constraint {
                name: name.to_string(),
                reason: "must be a single character".to_string(),
            }),
            _ => Err(mismatch()),
        },
        ParamKind::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    // Only whole floats that fit; u64 values above i64::MAX are rejected
                    n.as_f64()
                        .filter(|_| n.is_f64())
                        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(ArgValue::Integer)
                .ok_or_else(mismatch),
            Value::String(s) => s.trim().parse().map(ArgValue::Integer).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ParamKind::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(ArgValue::Number)
                .ok_or_else(mismatch),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(ArgValue::Number)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ParamKind::Boolean => match value {
            Value::Bool(b) => Ok(ArgValue::Boolean(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(ArgValue::Boolean(true)),
                "false" => Ok(ArgValue::Boolean(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamKind::Array => match value {
            Value::Array(items) => Ok(ArgValue::Array(items.clone())),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) => Ok(ArgValue::Array(items)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamKind::Object => match value {
            Value::Object(map) => Ok(ArgValue::Object(map.clone())),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => Ok(ArgValue::Object(map)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamKind::Opaque(_) => match value {
            Value::String(s) => Ok(ArgValue::String(s.clone())),
            other => Ok(ArgValue::String(other.to_string())),
        },
    }
}

fn validate(param: &BoundParam, value: &ArgValue) -> Result<(), ArgumentError> {
    let name = &param.spec.name;
    let meta = &param.spec.meta;
    let violation = |reason: String| ArgumentError::Constraint {
        name: name.clone(),
        reason,
    };

    if let ArgValue::String(s) = value {
        if let Some(pattern) = &param.pattern
            && !pattern.is_match(s)
        {
            return Err(violation(format!("does not match pattern '{}'", pattern.as_str())));
        }
        let length = s.chars().count();
        if let Some(min_length) = meta.min_length
            && length < min_length
        {
            return Err(violation(format!("must be at least {} characters", min_length)));
        }
        if let Some(max_length) = meta.max_length
            && length > max_length
        {
            return Err(violation(format!("must be at most {} characters", max_length)));
        }
    }

    let numeric = match value {
        ArgValue::Integer(i) => Some(*i as f64),
        ArgValue::Number(n) => Some(*n),
        _ => None,
    };
    if let Some(n) = numeric {
        if let Some(minimum) = meta.minimum
            && n < minimum
        {
            return Err(violation(format!("must be >= {}", minimum)));
        }
        if let Some(maximum) = meta.maximum
            && n > maximum
        {
            return Err(violation(format!("must be <= {}", maximum)));
        }
    }

    if !meta.enum_values.is_empty() {
        let allowed = meta.enum_values.iter().any(|raw| {
            coerce(name, &param.spec.kind, &Value::String(raw.clone()))
                .map(|candidate| &candidate == value)
                .unwrap_or(false)
        });
        if !allowed {
            return Err(violation(format!(
                "must be one of [{}]",
                meta.enum_values.join(", ")
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParamSpec, SchemaGenerator};
    use serde::Deserialize;
    use serde_json::json;

    fn layout(params: Vec<ParamSpec>) -> ParamLayout {
        SchemaGenerator::new().generate(&params).unwrap().layout
    }

    #[test]
    fn test_freeform_passes_instructions() {
        let layout = layout(vec![]);
        let args = map_arguments(&layout, &json!({"instructions": "do it"})).unwrap();
        assert_eq!(args.str("instructions"), Some("do it"));

        let args = map_arguments(&layout, &Value::Null).unwrap();
        assert!(args.is_empty());

        let err = map_arguments(&layout, &json!({"other": 1})).unwrap_err();
        assert_eq!(err, ArgumentError::Unknown("other".to_string()));
    }

    #[test]
    fn test_instructions_alias() {
        let layout = layout(vec![ParamSpec::string("query")]);

        let args = map_arguments(&layout, &json!({"instructions": "rust jobs"})).unwrap();
        assert_eq!(args.str("query"), Some("rust jobs"));

        let args = map_arguments(&layout, &json!({"query": "go jobs"})).unwrap();
        assert_eq!(args.str("query"), Some("go jobs"));

        let err = map_arguments(&layout, &json!({})).unwrap_err();
        assert_eq!(err, ArgumentError::Missing("instructions".to_string()));
    }

    #[test]
    fn test_lenient_coercion() {
        let layout = layout(vec![
            ParamSpec::integer("limit"),
            ParamSpec::number("ratio"),
            ParamSpec::boolean("headless"),
            ParamSpec::typed("tags", "Vec<String>"),
            ParamSpec::typed("filter", "SearchFilter"),
        ]);
        let args = map_arguments(
            &layout,
            &json!({
                "limit": "10",
                "ratio": 2,
                "headless": "TRUE",
                "tags": "[\"a\", \"b\"]",
                "filter": {"city": "Berlin"}
            }),
        )
        .unwrap();

        assert_eq!(args.i64("limit"), Some(10));
        assert_eq!(args.f64("ratio"), Some(2.0));
        assert_eq!(args.bool("headless"), Some(true));
        assert_eq!(args.array("tags").unwrap().len(), 2);
        assert_eq!(args.str("filter"), Some("{\"city\":\"Berlin\"}"));
    }

    #[test]
    fn test_missing_and_mistyped() {
        let layout = layout(vec![ParamSpec::integer("limit"), ParamSpec::string("q")]);

        let err = map_arguments(&layout, &json!({"q": "x"})).unwrap_err();
        assert_eq!(err, ArgumentError::Missing("limit".to_string()));

        let err = map_arguments(&layout, &json!({"q": "x", "limit": "many"})).unwrap_err();
        assert!(matches!(err, ArgumentError::TypeMismatch { .. }));
        assert!(!err.is_constraint());

        let err = map_arguments(&layout, &json!(["x"])).unwrap_err();
        assert_eq!(err, ArgumentError::NotAnObject);
    }

    #[test]
    fn test_out_of_range_integers_rejected() {
        let layout = layout(vec![ParamSpec::integer("count")]);

        for raw in [json!(18446744073709551615u64), json!(1e300), json!(-1e300), json!(2.5)] {
            let err = map_arguments(&layout, &json!({"count": raw})).unwrap_err();
            assert!(matches!(err, ArgumentError::TypeMismatch { .. }), "{} accepted", raw);
        }

        let args = map_arguments(&layout, &json!({"count": 9223372036854775807i64})).unwrap();
        assert_eq!(args.i64("count"), Some(i64::MAX));
        let args = map_arguments(&layout, &json!({"count": 4.0})).unwrap();
        assert_eq!(args.i64("count"), Some(4));
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        let layout = layout(vec![ParamSpec::number("ratio").with_range(0.0, 1.0)]);

        for raw in ["NaN", "inf", "-infinity"] {
            let err = map_arguments(&layout, &json!({"ratio": raw})).unwrap_err();
            assert!(matches!(err, ArgumentError::TypeMismatch { .. }), "{} accepted", raw);
        }

        let args = map_arguments(&layout, &json!({"ratio": "0.5"})).unwrap();
        assert_eq!(args.f64("ratio"), Some(0.5));
    }

    #[test]
    fn test_optional_and_defaults() {
        let layout = layout(vec![
            ParamSpec::string("q"),
            ParamSpec::integer("limit").with_default("25"),
            ParamSpec::typed("page", "Option<u32>"),
        ]);
        let args = map_arguments(&layout, &json!({"q": "x"})).unwrap();
        assert_eq!(args.i64("limit"), Some(25));
        assert!(!args.contains("page"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_constraint_violations() {
        let layout = layout(vec![
            ParamSpec::string("url").with_pattern("^https?://"),
            ParamSpec::integer("depth").with_range(1.0, 5.0),
            ParamSpec::string("mode").with_enum(["fast", "thorough"]).optional(),
            ParamSpec::string("code").with_length(2, 3).optional(),
        ]);

        let ok = map_arguments(&layout, &json!({"url": "https://a.io", "depth": 3}));
        assert!(ok.is_ok());

        let err = map_arguments(&layout, &json!({"url": "ftp://a.io", "depth": 3})).unwrap_err();
        assert!(err.is_constraint());

        let err = map_arguments(&layout, &json!({"url": "http://a", "depth": 9})).unwrap_err();
        assert!(err.to_string().contains("<= 5"));

        let err = map_arguments(&layout, &json!({"url": "http://a", "depth": 1, "mode": "slow"}))
            .unwrap_err();
        assert!(err.is_constraint());

        let err = map_arguments(&layout, &json!({"url": "http://a", "depth": 1, "code": "abcd"}))
            .unwrap_err();
        assert!(err.is_constraint());
    }

    #[test]
    fn test_numeric_enum() {
        let layout = layout(vec![ParamSpec::integer("depth").with_enum(["1", "2"])]);
        assert!(map_arguments(&layout, &json!({"depth": 2})).is_ok());
        assert!(map_arguments(&layout, &json!({"depth": 3})).unwrap_err().is_constraint());
    }

    #[test]
    fn test_deserialize_into_struct() {
        #[derive(Deserialize)]
        struct Search {
            query: String,
            limit: i64,
        }

        let layout = layout(vec![ParamSpec::string("query"), ParamSpec::integer("limit")]);
        let args = map_arguments(&layout, &json!({"query": "rust", "limit": 5})).unwrap();
        let search: Search = args.deserialize().unwrap();
        assert_eq!(search.query, "rust");
        assert_eq!(search.limit, 5);
    }
}
