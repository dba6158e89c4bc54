//! Schema generation from parameter descriptors
//!
//! Three shapes are produced:
//! - no parameters: a single optional free-text `instructions` property
//! - one plain string parameter: a single required `instructions` property,
//!   whatever the parameter is really called
//! - everything else: one property per parameter

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use super::params::{ParamKind, ParamSpec};
use super::types::{PropertyType, ToolInputSchema, ToolPropertySchema};

/// Conventional key used by the free-text and simplified schemas
pub const INSTRUCTIONS_PROPERTY: &str = "instructions";

const FREEFORM_DESCRIPTION: &str = "Optional free-text instructions for the action";
const INSTRUCTIONS_DESCRIPTION: &str = "Natural-language instructions for the action";

/// Errors raised while turning parameter descriptors into a schema
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("parameter name cannot be empty")]
    EmptyParameterName,

    #[error("parameter '{0}' is declared more than once")]
    DuplicateParameter(String),

    #[error("parameter '{name}' has an invalid pattern: {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("parameter '{name}' has minimum {minimum} greater than maximum {maximum}")]
    InvalidRange { name: String, minimum: f64, maximum: f64 },

    #[error("parameter '{name}' has minLength {min_length} greater than maxLength {max_length}")]
    InvalidLength {
        name: String,
        min_length: usize,
        max_length: usize,
    },
}

/// A parameter with its precomputed constraint state
#[derive(Debug, Clone)]
pub struct BoundParam {
    /// The original descriptor
    pub spec: ParamSpec,
    /// Compiled `pattern`, if any
    pub pattern: Option<Regex>,
    /// Parsed default value, if any
    pub default: Option<Value>,
}

/// How incoming arguments map onto handler parameters
#[derive(Debug, Clone)]
pub enum ParamLayout {
    /// Handler takes no parameters; `instructions` may be passed through
    Freeform,
    /// Handler takes one string; it is published as `instructions`
    Instructions(BoundParam),
    /// One property per parameter
    Direct(Vec<BoundParam>),
}

impl ParamLayout {
    /// Parameters in declaration order
    pub fn params(&self) -> Vec<&BoundParam> {
        match self {
            ParamLayout::Freeform => Vec::new(),
            ParamLayout::Instructions(param) => vec![param],
            ParamLayout::Direct(params) => params.iter().collect(),
        }
    }
}

/// Output of [`SchemaGenerator::generate`]
#[derive(Debug, Clone)]
pub struct GeneratedSchema {
    /// The published schema
    pub schema: ToolInputSchema,
    /// Argument layout for the executor
    pub layout: ParamLayout,
}

/// Builds tool input schemas from parameter descriptors
#[derive(Debug, Clone, Default)]
pub struct SchemaGenerator;

impl SchemaGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self
    }

    /// Generate the schema and layout for a parameter list.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when a descriptor is malformed (empty or
    /// duplicate names, a pattern that does not compile, inverted bounds).
    pub fn generate(&self, params: &[ParamSpec]) -> Result<GeneratedSchema, SchemaError> {
        let bound = bind_params(params)?;

        if bound.is_empty() {
            let schema = ToolInputSchema::object()
                .with_property(
                    INSTRUCTIONS_PROPERTY,
                    ToolPropertySchema::new(PropertyType::String)
                        .with_description(FREEFORM_DESCRIPTION),
                    false,
                )
                .with_additional_properties(false);
            return Ok(GeneratedSchema {
                schema,
                layout: ParamLayout::Freeform,
            });
        }

        if let [param] = bound.as_slice()
            && param.spec.is_plain_string()
        {
            let param = param.clone();
            let description = param
                .spec
                .meta
                .description
                .clone()
                .unwrap_or_else(|| INSTRUCTIONS_DESCRIPTION.to_string());
            let schema = ToolInputSchema::object()
                .with_property(
                    INSTRUCTIONS_PROPERTY,
                    ToolPropertySchema::new(PropertyType::String).with_description(description),
                    true,
                )
                .with_additional_properties(false);
            return Ok(GeneratedSchema {
                schema,
                layout: ParamLayout::Instructions(param),
            });
        }

        let mut schema = ToolInputSchema::object().with_additional_properties(false);
        for param in &bound {
            schema = schema.with_property(
                param.spec.name.clone(),
                property_for(param),
                param.spec.is_required(),
            );
        }

        Ok(GeneratedSchema {
            schema,
            layout: ParamLayout::Direct(bound),
        })
    }
}

fn bind_params(params: &[ParamSpec]) -> Result<Vec<BoundParam>, SchemaError> {
    let mut seen = HashSet::new();
    let mut bound = Vec::with_capacity(params.len());

    for spec in params {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(SchemaError::EmptyParameterName);
        }
        if !seen.insert(name.to_string()) {
            return Err(SchemaError::DuplicateParameter(name.to_string()));
        }

        let meta = &spec.meta;
        if let (Some(minimum), Some(maximum)) = (meta.minimum, meta.maximum) {
            if minimum > maximum {
                return Err(SchemaError::InvalidRange {
                    name: name.to_string(),
                    minimum,
                    maximum,
                });
            }
        }
        if let (Some(min_length), Some(max_length)) = (meta.min_length, meta.max_length) {
            if min_length > max_length {
                return Err(SchemaError::InvalidLength {
                    name: name.to_string(),
                    min_length,
                    max_length,
                });
            }
        }

        let pattern = match &meta.pattern {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| SchemaError::InvalidPattern {
                name: name.to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let default = meta
            .default
            .as_deref()
            .map(|raw| parse_literal(&spec.name, &spec.kind, raw, "default"));

        bound.push(BoundParam {
            spec: spec.clone(),
            pattern,
            default,
        });
    }

    Ok(bound)
}

fn property_for(param: &BoundParam) -> ToolPropertySchema {
    let spec = &param.spec;
    let meta = &spec.meta;

    let mut property = ToolPropertySchema::new(spec.kind.property_type());
    property.description = meta.description.clone();
    property.default = param.default.clone();
    property.enum_values = meta
        .enum_values
        .iter()
        .map(|raw| parse_literal(&spec.name, &spec.kind, raw, "enum"))
        .collect();
    property.pattern = meta.pattern.clone();
    property.minimum = meta.minimum;
    property.maximum = meta.maximum;
    property.min_length = meta.min_length;
    property.max_length = meta.max_length;
    property.example = meta
        .example
        .as_deref()
        .map(|raw| parse_literal(&spec.name, &spec.kind, raw, "example"));

    if spec.kind == ParamKind::Char {
        property.min_length.get_or_insert(1);
        property.max_length.get_or_insert(1);
    }

    property
}

/// Parse annotation text into the parameter's JSON type.
///
/// Unparseable text is kept as a raw string and a warning is logged.
fn parse_literal(name: &str, kind: &ParamKind, raw: &str, what: &str) -> Value {
    let trimmed = raw.trim();
    let parsed = match kind {
        ParamKind::String | ParamKind::Char | ParamKind::Opaque(_) => {
            return Value::String(raw.to_string());
        }
        ParamKind::Integer => trimmed.parse::<i64>().ok().map(Value::from),
        ParamKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ParamKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ParamKind::Array => serde_json::from_str::<Value>(trimmed)
            .ok()
            .filter(Value::is_array),
        ParamKind::Object => serde_json::from_str::<Value>(trimmed)
            .ok()
            .filter(Value::is_object),
    };

    parsed.unwrap_or_else(|| {
        tracing::warn!(
            parameter = %name,
            kind = %kind.property_type(),
            value = %raw,
            "Could not parse {} value, keeping raw string",
            what
        );
        Value::String(raw.to_string())
    })
}
