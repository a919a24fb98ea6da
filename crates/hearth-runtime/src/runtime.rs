//! Runtime orchestration.
//!
//! [`PlatformRuntime`] wires the pieces together for a hub process: it owns
//! the bus (an in-process [`LocalBus`] unless one is injected), a fixed set
//! of [`PlatformService`]s routed through a [`ServiceDispatcher`], and the
//! process lifecycle.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hearth_runtime::PlatformRuntime;
//!
//! let runtime = PlatformRuntime::builder()
//!     .service(scheduler_service)
//!     .service(rule_service)
//!     .build()?;
//!
//! runtime.run().await?;
//! ```
//!
//! Lifecycle is `init()` (build and subscribe the service dispatcher) →
//! `start()` → `stop()`; [`run`](PlatformRuntime::run) drives all three and
//! blocks until Ctrl-C or SIGTERM.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::signal;
use tracing::{debug, info, warn};

use hearth_client::PlatformBusClient;
use hearth_core::bus::{BusSubscriber, SharedBus, Subscription};
use hearth_core::{AddressMatcher, LocalBus, NAMESPACE_SERVICE};
use hearth_dispatch::{Executor, PlatformService, ServiceDispatcher};

use crate::config::{ConfigLoader, HearthConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The platform runtime: bus, services, and lifecycle.
pub struct PlatformRuntime {
    config: HearthConfig,
    bus: SharedBus,
    services: Vec<Arc<dyn PlatformService>>,
    dispatcher: Mutex<Option<Arc<ServiceDispatcher>>>,
    subscription: Mutex<Option<Subscription>>,
    running: Mutex<bool>,
}

impl PlatformRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration with an in-process bus and no
    /// services; mostly useful for client-only processes.
    pub fn from_config(config: &HearthConfig) -> Self {
        logging::init_from_config(&config.logging);
        Self {
            config: config.clone(),
            bus: Arc::new(LocalBus::new()),
            services: Vec::new(),
            dispatcher: Mutex::new(None),
            subscription: Mutex::new(None),
            running: Mutex::new(false),
        }
    }

    pub fn config(&self) -> &HearthConfig {
        &self.config
    }

    /// The bus this runtime routes over.
    pub fn bus(&self) -> SharedBus {
        Arc::clone(&self.bus)
    }

    /// Builds a correlated-request client listening on `matchers`, using
    /// the configured default timeout.
    pub fn client(&self, matchers: Vec<AddressMatcher>) -> PlatformBusClient {
        PlatformBusClient::with_timeout(
            self.bus(),
            matchers,
            self.config.client.default_timeout(),
        )
    }

    /// Builds the service dispatcher and subscribes it to the bus.
    ///
    /// The dispatcher listens on each service's group plus broadcast, with
    /// a shared executor sized from configuration.
    pub async fn init(&self) -> RuntimeResult<()> {
        if self.dispatcher.lock().is_some() {
            return Ok(());
        }
        debug!(services = self.services.len(), "initializing runtime");

        let executor = Executor::pool(self.config.dispatch.workers, self.config.dispatch.backlog);
        let mut builder = ServiceDispatcher::builder(self.bus()).executor(executor);
        for service in &self.services {
            builder = builder.service(Arc::clone(service));
        }
        let dispatcher = Arc::new(builder.build()?);

        // The whole platform-service namespace is claimed, not just the
        // registered groups: unknown-address requests must still reach the
        // dispatcher so it can answer them with an error.
        let mut matchers = vec![
            AddressMatcher::Broadcast,
            AddressMatcher::Namespace(NAMESPACE_SERVICE.to_string()),
        ];
        for address in dispatcher.addresses() {
            if address.namespace() != NAMESPACE_SERVICE {
                if let Some(group) = address.group() {
                    matchers.push(AddressMatcher::service(address.namespace(), group));
                }
            }
        }

        let subscription = self
            .bus
            .add_listener(matchers, Arc::clone(&dispatcher) as Arc<dyn BusSubscriber>);

        *self.dispatcher.lock() = Some(dispatcher);
        *self.subscription.lock() = Some(subscription);

        info!("runtime initialized");
        Ok(())
    }

    /// Marks the runtime running.
    pub async fn start(&self) -> RuntimeResult<()> {
        let mut running = self.running.lock();
        if *running {
            warn!("runtime is already running");
            return Ok(());
        }
        *running = true;
        info!("Hearth runtime started");
        Ok(())
    }

    /// Unsubscribes the service dispatcher and marks the runtime stopped.
    pub async fn stop(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.lock();
            if !*running {
                warn!("runtime is not running");
                return Ok(());
            }
            *running = false;
        }
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.remove();
        }
        info!("Hearth runtime stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Runs the runtime until a shutdown signal is received.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.init().await?;
        self.start().await?;

        info!("Hearth runtime is now running. Press Ctrl+C to stop.");
        Self::wait_for_shutdown().await;

        self.stop().await
    }

    /// Runs the runtime until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.init().await?;
        self.start().await?;
        shutdown.await;
        self.stop().await
    }

    async fn wait_for_shutdown() {
        #[cfg(unix)]
        {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(error) => {
                    warn!(error = %error, "failed to register SIGTERM handler");
                    if signal::ctrl_c().await.is_ok() {
                        info!("Received Ctrl+C, shutting down");
                    }
                    return;
                }
            };

            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down");
            }
        }
    }
}

/// Builder for [`PlatformRuntime`].
///
/// # Example
///
/// ```rust,ignore
/// let runtime = PlatformRuntime::builder()
///     .config_file("config/hearth.toml")
///     .service(scheduler_service)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    bus: Option<SharedBus>,
    services: Vec<Arc<dyn PlatformService>>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            bus: None,
            services: Vec::new(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Merges programmatic configuration overrides.
    pub fn merge(mut self, config: HearthConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Injects a bus; defaults to an in-process [`LocalBus`].
    pub fn bus(mut self, bus: SharedBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Registers a service with the runtime.
    pub fn service(mut self, service: Arc<dyn PlatformService>) -> Self {
        self.services.push(service);
        self
    }

    /// Loads configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<PlatformRuntime> {
        let config = self.config_loader.load()?;
        logging::init_from_config(&config.logging);
        Ok(PlatformRuntime {
            config,
            bus: self.bus.unwrap_or_else(|| Arc::new(LocalBus::new())),
            services: self.services,
            dispatcher: Mutex::new(None),
            subscription: Mutex::new(None),
            running: Mutex::new(false),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use hearth_core::{
        Address, DispatchError, ErrorBody, MessageBody, PlatformMessage, errors,
    };
    use hearth_dispatch::{DispatchTable, MessageProcessor, request_fn};

    /// A scheduler service backed by a plain dispatch table.
    struct SchedulerService {
        table: DispatchTable,
        responder: hearth_core::RequestResponder,
    }

    impl SchedulerService {
        fn new(bus: SharedBus, handled: Arc<AtomicUsize>) -> Arc<Self> {
            let table = DispatchTable::builder()
                .request(
                    "scheduler:AddTask",
                    request_fn(move |_| {
                        handled.fetch_add(1, Ordering::SeqCst);
                        Ok(MessageBody::builder("scheduler:AddTaskResponse")
                            .attribute("result", "ok")
                            .build())
                    }),
                )
                .build()
                .unwrap();
            Arc::new(Self {
                table,
                responder: hearth_core::RequestResponder::new(bus),
            })
        }
    }

    #[async_trait]
    impl PlatformService for SchedulerService {
        fn address(&self) -> Address {
            Address::platform_service("scheduler")
        }

        async fn handle_message(
            &self,
            message: &PlatformMessage,
        ) -> Result<(), DispatchError> {
            if message.is_request() {
                self.responder
                    .invoke_and_send_response(message, self.table.handle_request(message))
                    .await;
            } else {
                self.table.handle_event(message).await?;
            }
            Ok(())
        }
    }

    fn quiet_config() -> HearthConfig {
        let mut config = HearthConfig::default();
        // Keep unanswered-request tests bounded.
        config.client.default_timeout_ms = 2_000;
        config
    }

    #[tokio::test]
    async fn add_task_request_round_trips_through_the_runtime() {
        let handled = Arc::new(AtomicUsize::new(0));
        let bus: SharedBus = Arc::new(hearth_core::LocalBus::new());
        let runtime = PlatformRuntime::builder()
            .merge(quiet_config())
            .bus(Arc::clone(&bus))
            .service(SchedulerService::new(Arc::clone(&bus), Arc::clone(&handled)))
            .build()
            .unwrap();
        runtime.init().await.unwrap();
        runtime.start().await.unwrap();

        let client = runtime.client(vec![AddressMatcher::service("CLNT", "ui")]);
        let request = PlatformMessage::builder()
            .from(Address::service("CLNT", "ui"))
            .to(Address::platform_service("scheduler"))
            .request(true)
            .correlation_id("abc")
            .payload(MessageBody::builder("scheduler:AddTask").build())
            .build();

        let response = client.request(request).await.await.unwrap();
        assert_eq!(response.correlation_id(), Some("abc"));
        assert_eq!(response.body().string_attribute("result"), Some("ok"));
        assert_eq!(handled.load(Ordering::SeqCst), 1);

        runtime.stop().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_service_requests_are_answered_with_unsupported_address() {
        let bus: SharedBus = Arc::new(hearth_core::LocalBus::new());
        let handled = Arc::new(AtomicUsize::new(0));
        let runtime = PlatformRuntime::builder()
            .merge(quiet_config())
            .bus(Arc::clone(&bus))
            .service(SchedulerService::new(Arc::clone(&bus), handled))
            .build()
            .unwrap();
        runtime.init().await.unwrap();

        let client = runtime.client(vec![AddressMatcher::service("CLNT", "ui")]);
        let request = PlatformMessage::builder()
            .from(Address::service("CLNT", "ui"))
            .to(Address::platform_service("nonesuch"))
            .request(true)
            .correlation_id("nope")
            .payload(MessageBody::builder("nonesuch:Do").build())
            .build();

        let result = client.request(request).await.await;
        match result {
            Err(hearth_client::RequestError::ErrorResponse { code, .. }) => {
                assert_eq!(code, errors::CODE_UNSUPPORTED_ADDRESS);
            }
            other => panic!("expected unsupported-address error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let runtime = PlatformRuntime::from_config(&quiet_config());
        runtime.init().await.unwrap();
        runtime.start().await.unwrap();
        runtime.start().await.unwrap();
        assert!(runtime.is_running());
        runtime.stop().await.unwrap();
        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
    }

    #[test]
    fn error_body_parsing_is_available_to_runtime_users() {
        // Re-export sanity: ErrorBody round-trips through the facade path.
        let body = ErrorBody::new(errors::CODE_GENERIC, "x").into_body();
        assert!(ErrorBody::from_body(&body).is_some());
    }
}
