//! The Sklad server.
//!
//! A [`Server`] owns a local provider, an ordered provider chain, a
//! server-level transform pipeline, middleware and a task manager. Requests
//! flow through them in that order:
//!
//! ```text
//! middleware.on_request (in order)
//!   → provider chain (first match wins)
//!   → server transforms
//!   → enabled check
//!   → task manager (mode, arguments, timeout)
//! middleware.on_response (reverse order)
//! ```
//!
//! Configuration changes (`add_provider`, `mount`, `add_transform`,
//! `add_middleware`) swap in a new copy of the routing state, so requests
//! already in flight keep the state they started with.

use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Instant;

use serde_json::{Value, json};
use sklad_core::{
    Component, ComponentKey, ComponentKind, Error, Invocation, Registration, Result, ServerConfig,
    TaskHandle,
};

use crate::chain::ProviderChain;
use crate::middleware::{CallRequest, Middleware, run_requests, run_responses};
use crate::provider::{
    FilesystemProvider, HandlerCatalog, LocalProvider, MountedProvider, Provider, SkillsProvider,
};
use crate::tasks::{TaskManager, TaskSettings};
use crate::tools::health::{ComponentCounts, health_component};
use crate::transform::{Pipeline, Selector, Transform, Visibility};

// ============================================================================
// Routing state
// ============================================================================

#[derive(Clone, Default)]
struct ServerState {
    chain: ProviderChain,
    transforms: Pipeline,
    middleware: Vec<Arc<dyn Middleware>>,
    mounted: Vec<Arc<Server>>,
}

impl ServerState {
    /// Enabled components of `kind` as exposed to callers.
    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        self.chain.list(kind, &self.transforms)
    }

    fn resolve(&self, kind: ComponentKind, name: &str) -> Result<Component> {
        self.chain.resolve(kind, name, &self.transforms)
    }

    fn counts(&self) -> Result<ComponentCounts> {
        Ok(ComponentCounts {
            tools: self.list(ComponentKind::Tool)?.len(),
            resources: self.list(ComponentKind::Resource)?.len(),
            prompts: self.list(ComponentKind::Prompt)?.len(),
        })
    }
}

type SharedState = Arc<RwLock<Arc<ServerState>>>;

/// Result of [`Server::invoke`].
#[derive(Debug, Clone)]
pub enum Invoked {
    /// A synchronous call finished with this value.
    Completed(Value),
    /// A background task was started.
    Started(TaskHandle),
}

// ============================================================================
// Server
// ============================================================================

/// A component server.
pub struct Server {
    name: String,
    version: String,
    local: Arc<LocalProvider>,
    state: SharedState,
    tasks: TaskManager,
}

impl Server {
    /// Creates a server with an empty local provider and default settings.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let local = Arc::new(LocalProvider::new(format!("local:{name}")));
        Self::with_local(name, local)
    }

    /// Creates a server around an existing local provider.
    ///
    /// The provider may be shared with other servers; all of them see the
    /// same registrations.
    pub fn with_local(name: impl Into<String>, local: Arc<LocalProvider>) -> Self {
        let chain = ProviderChain::new().add(Arc::clone(&local) as Arc<dyn Provider>);
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            local,
            state: Arc::new(RwLock::new(Arc::new(ServerState {
                chain,
                ..ServerState::default()
            }))),
            tasks: TaskManager::default(),
        }
    }

    /// Builds a server from configuration.
    ///
    /// Filesystem sources resolve their `handler` names against `handlers`;
    /// skills sources become skills providers. Sources are added in the
    /// order they appear, after the local provider.
    pub fn from_config(config: &ServerConfig, handlers: HandlerCatalog) -> Result<Self> {
        config.validate()?;

        let local = Arc::new(LocalProvider::with_policy(
            format!("local:{}", config.name),
            config.on_duplicate,
            config.default_task_mode,
        ));
        let server = Self::with_local(config.name.clone(), local)
            .with_version(config.version.clone())
            .with_task_settings(TaskSettings::from_config(config));

        for source in &config.filesystem {
            tracing::info!(root = %source.root.display(), "adding filesystem provider");
            server.add_provider(
                FilesystemProvider::new(&source.root, handlers.clone())
                    .with_default_task_mode(config.default_task_mode),
            );
        }
        for source in &config.skills {
            tracing::info!(root = %source.root.display(), "adding skills provider");
            server.add_provider(SkillsProvider::new(&source.root).with_main_file(&source.main_file));
        }
        Ok(server)
    }

    /// Sets the version reported by the server.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Replaces the execution settings.
    ///
    /// Tasks started before the call stay with the previous manager.
    pub fn with_task_settings(mut self, settings: TaskSettings) -> Self {
        self.tasks = TaskManager::new(settings);
        self
    }

    /// Registers the built-in `health` tool.
    pub fn with_health_tool(self) -> Result<Self> {
        let state: Weak<RwLock<Arc<ServerState>>> = Arc::downgrade(&self.state);
        let tool = health_component(self.name.clone(), self.version.clone(), move || {
            let state = state.upgrade().ok_or_else(|| "server is gone".to_string())?;
            let snapshot = Arc::clone(&state.read().unwrap_or_else(PoisonError::into_inner));
            snapshot.counts().map_err(|e| e.to_string())
        });
        self.register(tool)?;
        Ok(self)
    }

    /// Server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The local provider.
    pub fn local(&self) -> &Arc<LocalProvider> {
        &self.local
    }

    /// The task manager.
    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Whether error details are masked for callers.
    pub fn masks_error_details(&self) -> bool {
        self.tasks.settings().mask_error_details
    }

    fn snapshot(&self) -> Arc<ServerState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update(&self, change: impl FnOnce(&mut ServerState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = ServerState::clone(&guard);
        change(&mut next);
        *guard = Arc::new(next);
    }

    pub(crate) fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        self.snapshot().middleware.clone()
    }

    // ------------------------------------------------------------------------
    // Local registration
    // ------------------------------------------------------------------------

    /// Registers a component with the local provider.
    pub fn register(&self, component: Component) -> Result<Registration> {
        self.local.add(component)
    }

    /// Registers a tool.
    pub fn register_tool(&self, component: Component) -> Result<Registration> {
        self.register_kind(ComponentKind::Tool, component)
    }

    /// Registers a resource.
    pub fn register_resource(&self, component: Component) -> Result<Registration> {
        self.register_kind(ComponentKind::Resource, component)
    }

    /// Registers a prompt.
    pub fn register_prompt(&self, component: Component) -> Result<Registration> {
        self.register_kind(ComponentKind::Prompt, component)
    }

    fn register_kind(&self, kind: ComponentKind, component: Component) -> Result<Registration> {
        if component.kind() != kind {
            return Err(Error::invalid_definition(
                component.name(),
                format!("expected a {kind}, got a {}", component.kind()),
            ));
        }
        self.register(component)
    }

    /// Removes a locally registered component.
    pub fn remove(&self, kind: ComponentKind, name: &str) -> Result<Component> {
        self.local.remove(kind, name)
    }

    /// Removes a locally registered tool.
    pub fn remove_tool(&self, name: &str) -> Result<Component> {
        self.remove(ComponentKind::Tool, name)
    }

    // ------------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------------

    /// Appends a provider after the existing ones.
    pub fn add_provider<P: Provider + 'static>(&self, provider: P) {
        let provider: Arc<dyn Provider> = Arc::new(provider);
        tracing::debug!(server = %self.name, provider = %provider.name(), "adding provider");
        self.update(|state| state.chain.push(provider));
    }

    /// Mounts a child server under an optional namespace.
    ///
    /// A later mount with the same namespace shadows earlier ones for the
    /// names they share. Fails with a configuration error if `child` is this
    /// server or already mounts it, directly or through its own children.
    pub fn mount(&self, child: impl Into<Arc<Server>>, namespace: Option<&str>) -> Result<()> {
        let child = child.into();
        if child.reaches(self) {
            return Err(Error::config(format!(
                "mounting '{}' into '{}' would create a cycle",
                child.name, self.name
            )));
        }
        let provider = MountedProvider::new(Arc::clone(&child), namespace);
        tracing::debug!(server = %self.name, provider = %provider.name(), "mounting server");
        let namespace = namespace.map(str::to_string);
        self.update(|state| {
            state.chain.push_mount(Arc::new(provider), namespace);
            state.mounted.push(child);
        });
        Ok(())
    }

    /// Whether `target` is this server or sits somewhere below it.
    fn reaches(&self, target: &Server) -> bool {
        std::ptr::eq(self, target)
            || self
                .snapshot()
                .mounted
                .iter()
                .any(|child| child.reaches(target))
    }

    /// Appends a server-level transform.
    pub fn add_transform<T: Transform + 'static>(&self, transform: T) {
        tracing::debug!(server = %self.name, transform = %transform.describe(), "adding transform");
        self.update(|state| state.transforms.push(Arc::new(transform)));
    }

    /// Hides every component the selector matches.
    pub fn disable(&self, selector: Selector) {
        self.add_transform(Visibility::disable(selector));
    }

    /// Re-enables components the selector matches.
    pub fn enable(&self, selector: Selector) {
        self.add_transform(Visibility::enable(selector));
    }

    /// Hides every component the selector does not match.
    pub fn enable_only(&self, selector: Selector) {
        self.add_transform(Visibility::only(selector));
    }

    /// Appends a middleware.
    pub fn add_middleware<M: Middleware + 'static>(&self, middleware: M) {
        tracing::debug!(server = %self.name, middleware = middleware.name(), "adding middleware");
        self.update(|state| state.middleware.push(Arc::new(middleware)));
    }

    /// Provider names in resolution order.
    pub fn provider_names(&self) -> Vec<String> {
        self.snapshot().chain.provider_names()
    }

    // ------------------------------------------------------------------------
    // Listing and resolution
    // ------------------------------------------------------------------------

    /// Enabled components of `kind`, as callers see them.
    pub fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        self.snapshot().list(kind)
    }

    /// Exposed tools.
    pub fn list_tools(&self) -> Result<Vec<Component>> {
        self.list(ComponentKind::Tool)
    }

    /// Exposed resources.
    pub fn list_resources(&self) -> Result<Vec<Component>> {
        self.list(ComponentKind::Resource)
    }

    /// Exposed prompts.
    pub fn list_prompts(&self) -> Result<Vec<Component>> {
        self.list(ComponentKind::Prompt)
    }

    /// Exposed component counts.
    pub fn component_counts(&self) -> Result<ComponentCounts> {
        self.snapshot().counts()
    }

    /// Resolves an exposed component by name.
    ///
    /// Resolution agrees with [`Server::list`]: a name resolves exactly when
    /// it is listed, to the component listed under it.
    pub fn resolve(&self, kind: ComponentKind, name: &str) -> Result<Component> {
        self.snapshot().resolve(kind, name)
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Runs a component synchronously and returns its result.
    pub async fn handle(&self, kind: ComponentKind, name: &str, args: Value) -> Result<Value> {
        let state = self.snapshot();
        let request = CallRequest::new(ComponentKey::new(kind, name), args, Invocation::Sync);
        let started = Instant::now();

        let (entered, accepted) = run_requests(&state.middleware, &request);
        let outcome = match accepted {
            Ok(()) => match state.resolve(kind, name) {
                Ok(component) => {
                    self.tasks
                        .execute(&component, request.arguments.clone())
                        .await
                }
                Err(error) => Err(error),
            },
            Err(error) => Err(error),
        };

        run_responses(
            &state.middleware[..entered],
            &request,
            outcome.as_ref(),
            started.elapsed(),
        );
        outcome
    }

    /// Starts a component as a background task.
    pub async fn submit(&self, kind: ComponentKind, name: &str, args: Value) -> Result<TaskHandle> {
        let state = self.snapshot();
        let request = CallRequest::new(ComponentKey::new(kind, name), args, Invocation::Background);
        let started = Instant::now();

        let (entered, accepted) = run_requests(&state.middleware, &request);
        let spawned = accepted
            .and_then(|()| state.resolve(kind, name))
            .and_then(|component| self.tasks.spawn(component, request.arguments.clone()));

        let ack;
        let observed = match &spawned {
            Ok(task) => {
                ack = json!({ "task_id": task.id().to_string() });
                Ok(&ack)
            }
            Err(error) => Err(error),
        };
        run_responses(&state.middleware[..entered], &request, observed, started.elapsed());
        spawned
    }

    /// Runs a component in the requested mode.
    pub async fn invoke(
        &self,
        kind: ComponentKind,
        name: &str,
        args: Value,
        invocation: Invocation,
    ) -> Result<Invoked> {
        match invocation {
            Invocation::Sync => self.handle(kind, name, args).await.map(Invoked::Completed),
            Invocation::Background => self.submit(kind, name, args).await.map(Invoked::Started),
        }
    }

    /// Calls a tool synchronously.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<Value> {
        self.handle(ComponentKind::Tool, name, args).await
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("providers", &self.provider_names())
            .field("tasks", &self.tasks)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
