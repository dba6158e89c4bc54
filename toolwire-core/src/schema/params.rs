//! Parameter descriptors for registered actions
//!
//! A `ParamSpec` is the tagged-variant description of one handler parameter,
//! built once at registration time and consumed by both the schema generator
//! and the argument mapper.

use serde::{Deserialize, Serialize};

use super::types::PropertyType;

/// The declared type of a handler parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "type_name", rename_all = "snake_case")]
pub enum ParamKind {
    /// Owned or borrowed text
    String,
    /// A single character (published as a string of length one)
    Char,
    /// Any integer width
    Integer,
    /// Any floating point width
    Float,
    /// Boolean flag
    Boolean,
    /// Sequences and sets
    Array,
    /// Maps and structured values
    Object,
    /// A type the runtime does not understand; callers pass JSON text
    Opaque(String),
}

impl ParamKind {
    /// JSON schema type published for this kind
    pub fn property_type(&self) -> PropertyType {
        match self {
            ParamKind::String | ParamKind::Char | ParamKind::Opaque(_) => PropertyType::String,
            ParamKind::Integer => PropertyType::Integer,
            ParamKind::Float => PropertyType::Number,
            ParamKind::Boolean => PropertyType::Boolean,
            ParamKind::Array => PropertyType::Array,
            ParamKind::Object => PropertyType::Object,
        }
    }

    /// Map a Rust type name onto a parameter kind.
    ///
    /// Returns the kind and whether the type was wrapped in `Option<_>`.
    /// Smart pointers are looked through, paths are ignored and anything
    /// unrecognized becomes [`ParamKind::Opaque`].
    pub fn from_type_name(type_name: &str) -> (ParamKind, bool) {
        let ty = strip_reference(type_name.trim());

        if let Some(inner) = generic_argument(ty, "Option") {
            let (kind, _) = ParamKind::from_type_name(inner);
            return (kind, true);
        }

        for wrapper in ["Box", "Arc", "Rc", "Cow"] {
            if let Some(inner) = generic_argument(ty, wrapper) {
                let inner = inner.rsplit(',').next().unwrap_or(inner).trim();
                return ParamKind::from_type_name(inner);
            }
        }

        if ty.starts_with('[') || ty.starts_with('(') {
            return (ParamKind::Array, false);
        }

        let base = ty.split('<').next().unwrap_or(ty).trim();
        let base = base.rsplit("::").next().unwrap_or(base);

        let kind = match base {
            "String" | "str" | "PathBuf" | "Path" | "OsString" => ParamKind::String,
            "char" => ParamKind::Char,
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize" => ParamKind::Integer,
            b if b.starts_with("NonZero") => ParamKind::Integer,
            "f32" | "f64" => ParamKind::Float,
            "bool" => ParamKind::Boolean,
            "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "BinaryHeap" => {
                ParamKind::Array
            }
            "HashMap" | "BTreeMap" | "Map" => ParamKind::Object,
            other => ParamKind::Opaque(other.to_string()),
        };
        (kind, false)
    }
}

fn strip_reference(ty: &str) -> &str {
    let mut ty = ty;
    while let Some(rest) = ty.strip_prefix('&') {
        ty = rest.trim_start();
        if ty.starts_with('\'') {
            ty = ty.split_once(' ').map(|(_, rest)| rest).unwrap_or("").trim_start();
        }
        if let Some(rest) = ty.strip_prefix("mut ") {
            ty = rest.trim_start();
        }
    }
    ty
}

fn generic_argument<'a>(ty: &'a str, wrapper: &str) -> Option<&'a str> {
    let base_end = ty.find('<')?;
    let base = ty[..base_end].trim();
    let base = base.rsplit("::").next().unwrap_or(base);
    if base != wrapper || !ty.ends_with('>') {
        return None;
    }
    Some(ty[base_end + 1..ty.len() - 1].trim())
}

/// Optional per-parameter annotations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamMeta {
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default value as text; parsed into the declared type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Regex the value must match (string kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Inclusive lower bound (numeric kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    /// Inclusive upper bound (numeric kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    /// Minimum length in characters (string kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum length in characters (string kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Allowed values as text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    /// Example value as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,

    /// Explicit required flag; `None` means required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl ParamMeta {
    /// Whether the parameter carries anything beyond a description
    pub fn is_rich(&self) -> bool {
        self.default.is_some()
            || self.pattern.is_some()
            || self.minimum.is_some()
            || self.maximum.is_some()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || !self.enum_values.is_empty()
            || self.example.is_some()
            || self.required == Some(false)
    }
}

/// Descriptor for one handler parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name as published in the schema
    pub name: String,

    /// Declared type
    pub kind: ParamKind,

    /// Optional annotations
    #[serde(default)]
    pub meta: ParamMeta,
}

impl ParamSpec {
    /// Create a required parameter of the given kind
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            meta: ParamMeta::default(),
        }
    }

    /// Create a parameter from a Rust type name such as `u32` or `Option<String>`
    pub fn typed(name: impl Into<String>, type_name: &str) -> Self {
        let (kind, optional) = ParamKind::from_type_name(type_name);
        let mut spec = Self::new(name, kind);
        if optional {
            spec.meta.required = Some(false);
        }
        spec
    }

    /// Shorthand for a required string parameter
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::String)
    }

    /// Shorthand for a required integer parameter
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    /// Shorthand for a required floating point parameter
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Float)
    }

    /// Shorthand for a required boolean parameter
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Boolean)
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    /// Set the default value (as text)
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.meta.default = Some(default.into());
        self
    }

    /// Set a regex pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.meta.pattern = Some(pattern.into());
        self
    }

    /// Set the inclusive numeric range
    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.meta.minimum = Some(minimum);
        self.meta.maximum = Some(maximum);
        self
    }

    /// Set the inclusive lower bound
    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.meta.minimum = Some(minimum);
        self
    }

    /// Set the inclusive upper bound
    pub fn with_maximum(mut self, maximum: f64) -> Self {
        self.meta.maximum = Some(maximum);
        self
    }

    /// Set the allowed length range
    pub fn with_length(mut self, min_length: usize, max_length: usize) -> Self {
        self.meta.min_length = Some(min_length);
        self.meta.max_length = Some(max_length);
        self
    }

    /// Restrict to a fixed set of values
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set an example value (as text)
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.meta.example = Some(example.into());
        self
    }

    /// Mark the parameter optional
    pub fn optional(mut self) -> Self {
        self.meta.required = Some(false);
        self
    }

    /// Whether callers must supply this parameter
    pub fn is_required(&self) -> bool {
        self.meta.required.unwrap_or(true)
    }

    /// A lone string parameter with nothing but (optionally) a description
    pub fn is_plain_string(&self) -> bool {
        self.kind == ParamKind::String && !self.meta.is_rich()
    }
}
