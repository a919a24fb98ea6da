//! Top-level service routing.
//!
//! A [`ServiceDispatcher`] owns the map from service addresses to
//! [`PlatformService`]s and routes every inbound message to the service
//! owning its destination group. The table is built once from a fixed set
//! of services; binding two services to one group is rejected at build time
//! rather than resolved by registration order.
//!
//! Routing rules, in order:
//!
//! 1. No destination, or broadcast → every service gets the message,
//!    independently, on the shared executor. No replies are synthesized.
//! 2. Destination normalizes to a registered service → that service runs on
//!    the executor; a failure becomes an error event back to the sender.
//! 3. Unknown destination, message is a request in the platform-service
//!    namespace, and not addressed to the hub → one "unsupported address"
//!    error to the source.
//! 4. Anything else → dropped silently (stray events to retired
//!    destinations are normal traffic).
//!
//! All services share one bounded pool; no ordering is guaranteed between
//! messages dispatched to different services, nor between two messages to
//! the same destination scheduled on different workers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use hearth_core::bus::{BusSubscriber, SharedBus};
use hearth_core::{
    Address, DispatchError, ErrorBody, MessageKind, NAMESPACE_SERVICE, PlatformMessage,
};

use crate::error::RegistryError;
use crate::executor::Executor;

/// A dispatch unit bound to one fixed service address, owning all
/// instance-addressed traffic for that group.
#[async_trait]
pub trait PlatformService: Send + Sync + 'static {
    /// The service address (`namespace:group:`) this service owns.
    fn address(&self) -> Address;

    /// Handles one message routed to this service.
    async fn handle_message(&self, message: &PlatformMessage) -> Result<(), DispatchError>;
}

/// Routes inbound messages to the service owning their destination.
pub struct ServiceDispatcher {
    bus: SharedBus,
    services: HashMap<Address, Arc<dyn PlatformService>>,
    executor: Executor,
}

impl ServiceDispatcher {
    pub fn builder(bus: SharedBus) -> ServiceDispatcherBuilder {
        ServiceDispatcherBuilder {
            bus,
            executor: None,
            services: Vec::new(),
        }
    }

    /// The registered service addresses.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.services.keys()
    }

    /// Routes one message per the rules in the module docs.
    pub async fn route(&self, message: PlatformMessage) {
        let destination = message.destination_or_broadcast();
        if destination.is_broadcast() {
            self.route_broadcast(message).await;
            return;
        }

        let service_address = destination.service_address();
        match self.services.get(&service_address) {
            Some(service) => {
                self.dispatch_to(Arc::clone(service), message, true).await;
            }
            None => self.route_unknown(message, &destination).await,
        }
    }

    async fn route_broadcast(&self, message: PlatformMessage) {
        for service in self.services.values() {
            // Failures are logged inside the task; one service can neither
            // block nor fail delivery to the rest.
            self.dispatch_to(Arc::clone(service), message.clone(), false)
                .await;
        }
    }

    async fn route_unknown(&self, message: PlatformMessage, destination: &Address) {
        let should_answer = message.kind() == MessageKind::Request
            && destination.namespace() == NAMESPACE_SERVICE
            && !destination.is_hub_service();
        if !should_answer {
            debug!(
                to = %destination,
                msg_type = message.message_type(),
                "dropping message to unknown destination"
            );
            return;
        }
        warn!(
            to = %destination,
            msg_type = message.message_type(),
            "request for unsupported address"
        );
        let error = PlatformMessage::error_to(&message, ErrorBody::unsupported_address(destination));
        if let Err(send_error) = self.bus.send(error).await {
            warn!(error = %send_error, "failed to send unsupported-address error");
        }
    }

    /// Submits `message` to `service` on the shared executor. When `answer`
    /// is set, a service failure is converted into an error event addressed
    /// to the original sender.
    async fn dispatch_to(
        &self,
        service: Arc<dyn PlatformService>,
        message: PlatformMessage,
        answer: bool,
    ) {
        let bus = Arc::clone(&self.bus);
        self.executor
            .submit(async move {
                if let Err(error) = service.handle_message(&message).await {
                    warn!(
                        error = %error,
                        service = %service.address(),
                        msg_type = message.message_type(),
                        "service failed to handle message"
                    );
                    if !answer {
                        return;
                    }
                    let notification =
                        PlatformMessage::error_to(&message, error.to_error_body());
                    if let Err(send_error) = bus.send(notification).await {
                        warn!(error = %send_error, "failed to send service error");
                    }
                }
            })
            .await;
    }
}

#[async_trait]
impl BusSubscriber for ServiceDispatcher {
    async fn deliver(&self, message: PlatformMessage) {
        self.route(message).await;
    }
}

/// Builder for [`ServiceDispatcher`]; the service set is fixed at build.
pub struct ServiceDispatcherBuilder {
    bus: SharedBus,
    executor: Option<Executor>,
    services: Vec<Arc<dyn PlatformService>>,
}

impl ServiceDispatcherBuilder {
    /// Registers a service. Its address must be a bare service address and
    /// unique across the set; violations fail at [`build`](Self::build).
    pub fn service(mut self, service: Arc<dyn PlatformService>) -> Self {
        self.services.push(service);
        self
    }

    /// Sets the shared executor; defaults to [`Executor::inline`].
    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> Result<ServiceDispatcher, RegistryError> {
        let mut services = HashMap::new();
        for service in self.services {
            let address = service.address();
            if !address.is_service() {
                return Err(RegistryError::InvalidServiceAddress(address));
            }
            if services.insert(address.clone(), service).is_some() {
                return Err(RegistryError::DuplicateService(address));
            }
        }
        Ok(ServiceDispatcher {
            bus: self.bus,
            services,
            executor: self.executor.unwrap_or_else(Executor::inline),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingBus, request_to};

    use std::sync::atomic::{AtomicUsize, Ordering};

    use hearth_core::errors;
    use hearth_core::{HUB_SERVICE_GROUP, MessageBody};

    struct StubService {
        address: Address,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubService {
        fn new(group: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                address: Address::platform_service(group),
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl PlatformService for StubService {
        fn address(&self) -> Address {
            self.address.clone()
        }

        async fn handle_message(
            &self,
            _message: &PlatformMessage,
        ) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DispatchError::internal("service boom"));
            }
            Ok(())
        }
    }

    fn dispatcher(
        services: Vec<Arc<StubService>>,
    ) -> (Arc<RecordingBus>, ServiceDispatcher) {
        let bus = Arc::new(RecordingBus::default());
        let mut builder = ServiceDispatcher::builder(bus.clone() as SharedBus);
        for service in services {
            builder = builder.service(service);
        }
        (bus, builder.build().unwrap())
    }

    #[tokio::test]
    async fn routes_instance_traffic_to_the_owning_service() {
        let scheduler = StubService::new("scheduler", false);
        let rule = StubService::new("rule", false);
        let (_bus, dispatcher) = dispatcher(vec![scheduler.clone(), rule.clone()]);

        let message = PlatformMessage::request(
            MessageBody::builder("scheduler:AddTask").build(),
            Address::service("CLNT", "ui"),
            Address::instance("SERV", "scheduler", "task-1"),
        );
        dispatcher.route(message).await;

        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rule.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_service_despite_failures() {
        let failing = StubService::new("scheduler", true);
        let healthy = StubService::new("rule", false);
        let (bus, dispatcher) = dispatcher(vec![failing.clone(), healthy.clone()]);

        let broadcast = PlatformMessage::broadcast(
            MessageBody::builder("base:Added").build(),
            Address::platform_service("device"),
        );
        dispatcher.route(broadcast).await;

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
        // Broadcast failures never synthesize replies.
        assert!(bus.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_service_request_gets_an_unsupported_address_error() {
        let (bus, dispatcher) = dispatcher(vec![StubService::new("rule", false)]);

        dispatcher
            .route(request_to("scheduler:AddTask", "SERV", "unknown"))
            .await;

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        let error = ErrorBody::from_body(sent[0].body()).unwrap();
        assert_eq!(error.code(), errors::CODE_UNSUPPORTED_ADDRESS);
        assert_eq!(
            sent[0].destination().map(ToString::to_string).as_deref(),
            Some("CLNT:ui:")
        );
    }

    #[tokio::test]
    async fn unknown_service_event_is_dropped_silently() {
        let (bus, dispatcher) = dispatcher(vec![StubService::new("rule", false)]);

        let event = PlatformMessage::event(
            MessageBody::builder("scheduler:TaskFired").build(),
            Address::platform_service("scheduler"),
            Address::platform_service("unknown"),
        );
        dispatcher.route(event).await;

        assert!(bus.sent().is_empty());
    }

    #[tokio::test]
    async fn hub_addressed_requests_are_not_answered_here() {
        let (bus, dispatcher) = dispatcher(vec![StubService::new("rule", false)]);

        dispatcher
            .route(request_to("hub:Ping", "SERV", HUB_SERVICE_GROUP))
            .await;

        assert!(bus.sent().is_empty());
    }

    #[tokio::test]
    async fn failing_service_answers_the_sender_with_an_error() {
        let failing = StubService::new("scheduler", true);
        let (bus, dispatcher) = dispatcher(vec![failing]);

        dispatcher
            .route(request_to("scheduler:AddTask", "SERV", "scheduler"))
            .await;

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_error());
        let error = ErrorBody::from_body(sent[0].body()).unwrap();
        assert_eq!(error.code(), errors::CODE_GENERIC);
        assert_eq!(sent[0].correlation_id(), Some("corr-1"));
    }

    #[test]
    fn duplicate_service_groups_are_rejected() {
        let bus = Arc::new(RecordingBus::default());
        let result = ServiceDispatcher::builder(bus as SharedBus)
            .service(StubService::new("scheduler", false))
            .service(StubService::new("scheduler", false))
            .build();
        assert_eq!(
            result.err(),
            Some(RegistryError::DuplicateService(Address::platform_service(
                "scheduler"
            )))
        );
    }

    #[test]
    fn instance_bound_services_are_rejected() {
        struct BadService;

        #[async_trait]
        impl PlatformService for BadService {
            fn address(&self) -> Address {
                Address::instance("SERV", "scheduler", "oops")
            }

            async fn handle_message(
                &self,
                _message: &PlatformMessage,
            ) -> Result<(), DispatchError> {
                Ok(())
            }
        }

        let bus = Arc::new(RecordingBus::default());
        let result = ServiceDispatcher::builder(bus as SharedBus)
            .service(Arc::new(BadService))
            .build();
        assert!(matches!(
            result.err(),
            Some(RegistryError::InvalidServiceAddress(_))
        ));
    }
}
