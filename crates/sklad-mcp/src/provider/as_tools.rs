//! Resources and prompts reachable through tools.
//!
//! Some clients only speak the tool protocol. [`AsTools`] wraps a provider
//! and adds two tools on top of its own:
//!
//! - resources: `list_resources` and `read_resource { uri }`
//! - prompts: `list_prompts` and `get_prompt { name, arguments }`
//!
//! The generated tools look components up in the wrapped provider when they
//! are called and run the component's own callable. Everything else the
//! wrapped provider lists passes through unchanged.

use std::sync::Arc;

use serde_json::{Value, json};
use sklad_core::component::READ_ONLY_HINT;
use sklad_core::{Callable, Component, ComponentKind, Param, ParamType, Result, Signature, ToolError};

use super::Provider;

/// Exposes a provider's resources or prompts as tools.
pub struct AsTools {
    name: String,
    inner: Arc<dyn Provider>,
    kind: ComponentKind,
}

impl AsTools {
    /// Adds `list_resources` and `read_resource` to `inner`.
    pub fn resources(inner: Arc<dyn Provider>) -> Self {
        Self::new(inner, ComponentKind::Resource)
    }

    /// Adds `list_prompts` and `get_prompt` to `inner`.
    pub fn prompts(inner: Arc<dyn Provider>) -> Self {
        Self::new(inner, ComponentKind::Prompt)
    }

    fn new(inner: Arc<dyn Provider>, kind: ComponentKind) -> Self {
        Self {
            name: format!("{}:{kind}s_as_tools", inner.name()),
            inner,
            kind,
        }
    }

    /// The component kind exposed through tools.
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn generated(&self) -> [Component; 2] {
        match self.kind {
            ComponentKind::Prompt => [self.list_prompts(), self.get_prompt()],
            _ => [self.list_resources(), self.read_resource()],
        }
    }

    fn list_resources(&self) -> Component {
        let inner = Arc::clone(&self.inner);
        Component::tool(
            "list_resources",
            Callable::from_blocking(move |_args, _ctx| {
                let resources = inner
                    .list(ComponentKind::Resource)
                    .map_err(|e| ToolError::visible(e.to_string()))?;
                Ok(Value::Array(
                    resources
                        .iter()
                        .filter(|c| c.is_enabled())
                        .map(|c| {
                            json!({
                                "uri": c.name(),
                                "description": c.description(),
                                "mime_type": c.mime_type(),
                            })
                        })
                        .collect(),
                ))
            }),
        )
        .with_description("List the available resources")
        .with_signature(Signature::new(Vec::new()))
        .with_annotation(READ_ONLY_HINT, true)
    }

    fn read_resource(&self) -> Component {
        let inner = Arc::clone(&self.inner);
        Component::tool(
            "read_resource",
            Callable::from_async(move |args: Value, ctx| {
                let inner = Arc::clone(&inner);
                async move {
                    let uri = args["uri"].as_str().unwrap_or_default();
                    let resource = find(inner.as_ref(), ComponentKind::Resource, uri)?;
                    resource.callable().invoke(json!({}), ctx).await
                }
            }),
        )
        .with_description("Read a resource by URI")
        .with_signature(Signature::new(vec![
            Param::required("uri", ParamType::String).describe("Resource URI"),
        ]))
        .with_annotation(READ_ONLY_HINT, true)
    }

    fn list_prompts(&self) -> Component {
        let inner = Arc::clone(&self.inner);
        Component::tool(
            "list_prompts",
            Callable::from_blocking(move |_args, _ctx| {
                let prompts = inner
                    .list(ComponentKind::Prompt)
                    .map_err(|e| ToolError::visible(e.to_string()))?;
                Ok(Value::Array(
                    prompts
                        .iter()
                        .filter(|c| c.is_enabled())
                        .map(|c| {
                            let arguments: Vec<Value> = c
                                .signature()
                                .params()
                                .iter()
                                .map(|p| json!({ "name": p.name, "required": p.required }))
                                .collect();
                            json!({
                                "name": c.name(),
                                "description": c.description(),
                                "arguments": arguments,
                            })
                        })
                        .collect(),
                ))
            }),
        )
        .with_description("List the available prompts")
        .with_signature(Signature::new(Vec::new()))
        .with_annotation(READ_ONLY_HINT, true)
    }

    fn get_prompt(&self) -> Component {
        let inner = Arc::clone(&self.inner);
        Component::tool(
            "get_prompt",
            Callable::from_async(move |args: Value, ctx| {
                let inner = Arc::clone(&inner);
                async move {
                    let name = args["name"].as_str().unwrap_or_default();
                    let prompt = find(inner.as_ref(), ComponentKind::Prompt, name)?;
                    let arguments = match args.get("arguments") {
                        Some(Value::Null) | None => json!({}),
                        Some(arguments) => arguments.clone(),
                    };
                    prompt
                        .signature()
                        .check(&arguments)
                        .map_err(ToolError::InvalidArguments)?;
                    prompt.callable().invoke(arguments, ctx).await
                }
            }),
        )
        .with_description("Render a prompt by name")
        .with_signature(Signature::new(vec![
            Param::required("name", ParamType::String).describe("Prompt name"),
            Param::optional("arguments", ParamType::Object).describe("Prompt arguments"),
        ]))
        .with_annotation(READ_ONLY_HINT, true)
    }
}

fn find(inner: &dyn Provider, kind: ComponentKind, name: &str) -> std::result::Result<Component, ToolError> {
    match inner.get(kind, name) {
        Ok(Some(component)) if component.is_enabled() => Ok(component),
        Ok(_) => Err(ToolError::visible(format!("Unknown {kind}: {name}"))),
        Err(e) => Err(ToolError::visible(e.to_string())),
    }
}

impl Provider for AsTools {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        let mut components = self.inner.list(kind)?;
        if kind == ComponentKind::Tool {
            components.extend(self.generated());
        }
        Ok(components)
    }
}

impl std::fmt::Debug for AsTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsTools")
            .field("inner", &self.inner.name())
            .field("kind", &self.kind)
            .finish()
    }
}
