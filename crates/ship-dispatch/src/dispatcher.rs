use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use wasmtime::{Engine, Module};

use crate::{
    encode_args, CapabilityTable, ConfigError, ConnectionRegistry, Connector, DispatchError,
    ExecutionContext, KvStore, Name, SessionOutcome, StoreView, StreamSession, SubscriptionConfig,
    WsConnector,
};

/// Everything [`Dispatcher::create`] needs to run one handler.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerSpec {
    /// Identity of the handler. Selects the registered connection.
    pub name: Name,
    /// Path of the wasm module (binary or text format).
    pub module_path: PathBuf,
    /// Whether the handler may write to any context.
    #[serde(default)]
    pub privileged: bool,
    /// Invocation arguments, frozen for the whole session.
    #[serde(default)]
    pub args: Vec<String>,
    /// Contexts the handler may write to.
    #[serde(default)]
    pub write_contexts: Vec<Name>,
    /// Sources the handler subscribes to. Informational.
    #[serde(default)]
    pub subscribed_sources: Vec<Name>,
    /// Additional functions the module must export.
    #[serde(default)]
    pub handler_names: Vec<String>,
}

impl HandlerSpec {
    /// Creates a spec with no arguments, no write contexts and no extra exports.
    pub fn new(name: Name, module_path: impl Into<PathBuf>) -> Self {
        Self {
            name,
            module_path: module_path.into(),
            privileged: false,
            args: Vec::new(),
            write_contexts: Vec::new(),
            subscribed_sources: Vec::new(),
            handler_names: Vec::new(),
        }
    }

    /// Sets the invocation arguments.
    pub fn with_args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the write contexts.
    pub fn with_write_contexts(mut self, contexts: impl IntoIterator<Item = Name>) -> Self {
        self.write_contexts = contexts.into_iter().collect();
        self
    }

    /// Sets the privileged flag.
    pub const fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Sets the functions the module must export besides the entry point.
    pub fn with_handler_names<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.handler_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Owns the connection registry, the capability table and the store, and runs handler sessions.
///
/// By default calls to [`create`](Self::create) are serialized: a second call does not load its
/// module until the running session has closed and its call returned. Every session owns its
/// sandbox instance and [`StoreView`], so when the store accepts concurrent writers the
/// serialization can be lifted with [`with_serialized_sessions`](Self::with_serialized_sessions).
/// Registry updates are serialized either way.
#[derive(Debug)]
pub struct Dispatcher<C = WsConnector> {
    registry: ConnectionRegistry,
    capabilities: CapabilityTable,
    store: Arc<dyn KvStore>,
    connector: C,
    subscription: SubscriptionConfig,
    serialized: bool,
    lock: Mutex<()>,
}

impl Dispatcher {
    /// Creates a dispatcher that connects over websockets.
    pub fn new(store: Arc<dyn KvStore>) -> Result<Self, ConfigError> {
        Self::with_connector(store, WsConnector::new())
    }
}

impl<C: Connector> Dispatcher<C> {
    /// Creates a dispatcher that opens sessions through `connector`.
    pub fn with_connector(store: Arc<dyn KvStore>, connector: C) -> Result<Self, ConfigError> {
        Ok(Self {
            registry: ConnectionRegistry::new(),
            capabilities: CapabilityTable::new(&Engine::default())?,
            store,
            connector,
            subscription: SubscriptionConfig::default(),
            serialized: true,
            lock: Mutex::new(()),
        })
    }

    /// Sets the subscription every session issues.
    pub fn with_subscription(mut self, subscription: SubscriptionConfig) -> Self {
        self.subscription = subscription;
        self
    }

    /// Sets whether [`create`](Self::create) calls wait for each other. `true` by default.
    pub const fn with_serialized_sessions(mut self, serialized: bool) -> Self {
        self.serialized = serialized;
        self
    }

    /// The connection registry.
    pub const fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The connector sessions are opened through.
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Registers (or replaces) the endpoint `id`'s sessions connect to.
    pub fn add_connection(&self, id: Name, host: impl Into<String>, port: impl Into<String>) {
        self.registry.add_connection(id, host, port);
    }

    /// Loads the handler's module and runs its session until the endpoint closes it.
    ///
    /// Blocks the calling thread. Configuration problems are reported before any connection is
    /// made.
    pub fn create(&self, spec: &HandlerSpec) -> Result<SessionOutcome, DispatchError> {
        let _guard =
            self.serialized.then(|| self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        let handler = spec.name;
        tracing::info!(%handler, module = %spec.module_path.display(), "Creating handler");

        let module =
            Module::from_file(self.capabilities.engine(), &spec.module_path).map_err(|err| {
                ConfigError::ModuleLoad {
                    path: spec.module_path.clone(),
                    reason: format!("{err:#}"),
                }
            })?;
        self.capabilities.resolve(&module, &spec.handler_names)?;

        let view = StoreView::new(
            self.store.clone(),
            spec.write_contexts.iter().copied(),
            spec.privileged,
        );
        let mut context = ExecutionContext::new(
            &self.capabilities,
            &module,
            handler,
            encode_args(&spec.args).map_err(ConfigError::from)?,
            view,
        )?;

        let endpoint =
            self.registry.endpoint(handler).ok_or(ConfigError::UnknownConnection(handler))?;
        if !spec.subscribed_sources.is_empty() {
            tracing::debug!(%handler, sources = ?spec.subscribed_sources, "Subscribed sources");
        }

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let mut session = StreamSession::new(&mut context, self.subscription.clone());
        runtime.block_on(session.run(&self.connector, &endpoint))
    }
}
