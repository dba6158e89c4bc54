//! JSON-schema shapes published in `tools/list`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON schema primitive type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Array => "array",
            PropertyType::Object => "object",
        };
        f.write_str(name)
    }
}

/// Schema for a single tool argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPropertySchema {
    #[serde(rename = "type")]
    pub property_type: PropertyType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl ToolPropertySchema {
    /// Create a bare property of the given type
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type,
            description: None,
            default: None,
            enum_values: Vec::new(),
            pattern: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            example: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input schema for a tool (always an object)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Properties in declaration order
    #[serde(with = "ordered_properties")]
    pub properties: Vec<(String, ToolPropertySchema)>,

    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default)]
    pub additional_properties: bool,
}

impl ToolInputSchema {
    /// Create an empty object schema
    pub fn object() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Vec::new(),
            required: Vec::new(),
            additional_properties: false,
        }
    }

    /// Append a property, optionally marking it required
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        property: ToolPropertySchema,
        required: bool,
    ) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.push((name, property));
        self
    }

    /// Set `additionalProperties`
    pub fn with_additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = allowed;
        self
    }

    /// Look up a property by name
    pub fn property(&self, name: &str) -> Option<&ToolPropertySchema> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, property)| property)
    }

    /// Property names in declaration order
    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|(key, _)| key.as_str()).collect()
    }

    /// Whether the named property is required
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Render as a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Serialize properties as a JSON object while keeping declaration order
mod ordered_properties {
    use super::ToolPropertySchema;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(
        properties: &[(String, ToolPropertySchema)],
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(properties.iter().map(|(key, value)| (key, value)))
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Vec<(String, ToolPropertySchema)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = BTreeMap::<String, ToolPropertySchema>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}
