//! Typed parameter descriptors.
//!
//! A [`Signature`] replaces "any callable becomes a tool": it names each
//! parameter with a [`ParamType`], is validated once at registration, renders
//! the JSON input schema, and checks call arguments before a body runs.

use std::collections::BTreeSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// JSON type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// JSON string.
    String,
    /// Integral JSON number.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// Unconstrained.
    Any,
}

impl ParamType {
    /// Schema `type` keyword, `None` for [`ParamType::Any`].
    pub fn schema_name(&self) -> Option<&'static str> {
        match self {
            ParamType::String => Some("string"),
            ParamType::Integer => Some("integer"),
            ParamType::Number => Some("number"),
            ParamType::Boolean => Some("boolean"),
            ParamType::Array => Some("array"),
            ParamType::Object => Some("object"),
            ParamType::Any => None,
        }
    }

    fn from_schema_name(name: &str) -> ParamType {
        match name {
            "string" => ParamType::String,
            "integer" => ParamType::Integer,
            "number" => ParamType::Number,
            "boolean" => ParamType::Boolean,
            "array" => ParamType::Array,
            "object" => ParamType::Object,
            _ => ParamType::Any,
        }
    }

    /// Returns `true` if `value` has this type. `null` never matches.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
            ParamType::Any => !value.is_null(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name().unwrap_or("any"))
    }
}

/// A single named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Argument name.
    pub name: String,
    /// Expected type.
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Whether callers must supply it.
    #[serde(default)]
    pub required: bool,
    /// Optional description for clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Param {
    /// A required parameter.
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: None,
        }
    }

    /// An optional parameter.
    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    /// Adds a description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered parameter list plus return type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    params: Vec<Param>,
    returns: ParamType,
    open: bool,
}

impl Signature {
    /// A closed signature: unknown arguments are rejected.
    pub fn new(params: Vec<Param>) -> Self {
        Self {
            params,
            returns: ParamType::Any,
            open: false,
        }
    }

    /// An open signature that accepts any argument object.
    pub fn any() -> Self {
        Self {
            params: Vec::new(),
            returns: ParamType::Any,
            open: true,
        }
    }

    /// Sets the return type.
    pub fn returning(mut self, returns: ParamType) -> Self {
        self.returns = returns;
        self
    }

    /// Derives a signature from a `schemars` type.
    ///
    /// Object properties become parameters in schema order; `Option<T>`
    /// fields (`["T", "null"]` types) become optional.
    pub fn of<T: JsonSchema>() -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null);
        Self::from_json_schema(&schema)
    }

    /// Builds a closed signature from an object JSON schema.
    pub fn from_json_schema(schema: &Value) -> Self {
        let required: BTreeSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let params = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, property)| Param {
                        name: name.clone(),
                        ty: property_type(property),
                        required: required.contains(name.as_str()),
                        description: property
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self::new(params)
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Return type.
    pub fn returns(&self) -> ParamType {
        self.returns
    }

    /// Returns `true` if unknown arguments are accepted.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Looks up a parameter.
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Returns a copy with one parameter renamed and optionally redescribed.
    pub fn rename_param(&self, from: &str, to: &str, description: Option<&str>) -> Self {
        let mut renamed = self.clone();
        for param in &mut renamed.params {
            if param.name == from {
                param.name = to.to_string();
                if let Some(description) = description {
                    param.description = Some(description.to_string());
                }
            }
        }
        renamed
    }

    /// Checks the descriptor itself. Called once, at registration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = BTreeSet::new();
        for param in &self.params {
            if !is_identifier(&param.name) {
                return Err(format!("parameter '{}' is not a valid identifier", param.name));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(format!("parameter '{}' is declared twice", param.name));
            }
        }
        Ok(())
    }

    /// Checks call arguments against the descriptor.
    ///
    /// `null` arguments are treated as an empty object.
    pub fn check(&self, args: &Value) -> std::result::Result<(), String> {
        let empty = Map::new();
        let object = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => return Err(format!("arguments must be an object, got {other}")),
        };

        for param in &self.params {
            match object.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(format!("missing required argument '{}'", param.name));
                }
                Some(value) if !value.is_null() && !param.ty.matches(value) => {
                    return Err(format!(
                        "argument '{}' must be of type {}",
                        param.name, param.ty
                    ));
                }
                _ => {}
            }
        }

        if !self.open {
            if let Some(unknown) = object.keys().find(|k| self.param(k).is_none()) {
                return Err(format!("unexpected argument '{unknown}'"));
            }
        }
        Ok(())
    }

    /// Renders the JSON input schema advertised to clients.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut property = Map::new();
            if let Some(ty) = param.ty.schema_name() {
                property.insert("type".to_string(), json!(ty));
            }
            if let Some(description) = &param.description {
                property.insert("description".to_string(), json!(description));
            }
            properties.insert(param.name.clone(), Value::Object(property));
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
        if !self.open {
            schema.insert("additionalProperties".to_string(), json!(false));
        }
        Value::Object(schema)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::any()
    }
}

fn property_type(property: &Value) -> ParamType {
    match property.get("type") {
        Some(Value::String(name)) => ParamType::from_schema_name(name),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .find(|name| *name != "null")
            .map(ParamType::from_schema_name)
            .unwrap_or(ParamType::Any),
        _ => ParamType::Any,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
