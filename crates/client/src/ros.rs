//! The [`Ros`] facade
//!
//! Owns the registries and exposes the protocol operations. Transports feed
//! it lifecycle events and inbound frames; application code uses it (or the
//! [`Topic`](crate::Topic) and [`Service`](crate::Service) helpers) to talk
//! to any registered session by identifier.

use crate::config::RosConfig;
use crate::dispatch::{DispatchOutcome, ProtocolDispatcher};
use crate::error::{Result, RosError};
use crate::listener::{isolate, RosHandler, ServiceCallHandler, TopicListener};
use crate::registry::{
    Identifier, ServiceCallCorrelator, SessionRegistry, TopicSubscriptionRegistry,
};
use crate::transport::{SessionHandle, TransportError};
use parking_lot::RwLock;
use rosbridge_protocol::{
    call_id, Auth, CallKind, CompressionType, Document, Envelope, FrameDecoder, IdGenerator,
    ServiceResponse, SessionId,
};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Options carried by a `subscribe` op
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscribeOptions {
    pub compression: CompressionType,
    /// Minimum interval between messages in milliseconds; 0 disables throttling
    pub throttle_rate: u32,
}

/// Client-side engine for the rosbridge protocol
///
/// One instance serves any number of sessions, each registered under an
/// application-chosen identifier `I`. Topic listeners and advertised
/// services are shared across sessions; outbound operations name the
/// session they target.
///
/// # Example
///
/// ```
/// use rosbridge_client::transport::memory::MemoryHandle;
/// use rosbridge_client::transport::SessionHandle;
/// use rosbridge_client::Ros;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let ros: Ros<String> = Ros::new();
/// let (handle, mut wire) = MemoryHandle::pair();
/// let handle: Arc<dyn SessionHandle> = handle;
/// ros.on_connected(&handle, "robot-1".to_string());
///
/// ros.publish(&"robot-1".to_string(), "/chatter", json!({"data": "hi"})).unwrap();
/// let frame = wire.try_recv().unwrap();
/// assert!(std::str::from_utf8(&frame).unwrap().contains(r#""op":"publish""#));
/// ```
pub struct Ros<I> {
    config: RosConfig,
    decoder: FrameDecoder,
    ids: IdGenerator,
    sessions: SessionRegistry<I>,
    topics: TopicSubscriptionRegistry,
    services: ServiceCallCorrelator,
    handlers: RwLock<Vec<Arc<dyn RosHandler<I>>>>,
}

impl<I: Identifier> Ros<I> {
    pub fn new() -> Self {
        Self::with_config(RosConfig::default())
    }

    pub fn with_config(config: RosConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(config.max_frame_bytes),
            config,
            ids: IdGenerator::new(),
            sessions: SessionRegistry::new(),
            topics: TopicSubscriptionRegistry::new(),
            services: ServiceCallCorrelator::new(),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RosConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry<I> {
        &self.sessions
    }

    pub fn topics(&self) -> &TopicSubscriptionRegistry {
        &self.topics
    }

    pub fn services(&self) -> &ServiceCallCorrelator {
        &self.services
    }

    /// Returns the next value of the shared id counter
    pub fn next_id(&self) -> u64 {
        self.ids.next_id()
    }

    /// Builds a fresh `<kind>:<name>:<n>` call id
    pub fn next_call_id(&self, kind: CallKind, name: &str) -> String {
        call_id(kind, name, self.ids.next_id())
    }

    /// Adds a lifecycle handler; handlers run in the order they were added
    pub fn add_handler(&self, handler: Arc<dyn RosHandler<I>>) {
        self.handlers.write().push(handler);
    }

    pub fn is_connected(&self, identifier: &I) -> bool {
        self.sessions.resolve(identifier).is_some()
    }

    /// Registers a freshly opened session under `identifier`
    pub fn on_connected(&self, handle: &Arc<dyn SessionHandle>, identifier: I) {
        let session = handle.session_id();
        if let Some(replaced) = self.sessions.register(identifier.clone(), handle) {
            tracing::info!(
                identifier = ?identifier,
                %replaced,
                "Identifier moved to a new session"
            );
        }
        tracing::info!(identifier = ?identifier, %session, "Session connected");

        for handler in self.handlers_snapshot() {
            isolate("handle_connection", || handler.handle_connection(&identifier, session));
        }
    }

    /// Forgets a closed session; returns the identifier it was registered under
    pub fn on_disconnected(&self, session: SessionId) -> Option<I> {
        let identifier = self.sessions.deregister_session(&session);
        tracing::info!(identifier = ?identifier, %session, "Session disconnected");

        for handler in self.handlers_snapshot() {
            isolate("handle_disconnection", || {
                handler.handle_disconnection(identifier.as_ref(), session)
            });
        }
        identifier
    }

    pub fn on_transport_error(&self, session: SessionId, error: &TransportError) {
        tracing::warn!(%session, %error, "Transport error");

        for handler in self.handlers_snapshot() {
            isolate("handle_error", || handler.handle_error(session, error));
        }
    }

    /// Removes the session registered under `identifier` without closing it
    pub fn deregister(&self, identifier: &I) -> Option<SessionId> {
        self.sessions.deregister_identifier(identifier)
    }

    fn handlers_snapshot(&self) -> Vec<Arc<dyn RosHandler<I>>> {
        self.handlers.read().clone()
    }

    /// Decodes and routes one inbound frame
    ///
    /// Undecodable frames are logged and dropped; `None` is returned for them.
    /// Listeners run before this returns, so frames of one session are
    /// delivered in arrival order.
    pub fn on_frame(&self, raw: &[u8], origin: SessionId) -> Option<DispatchOutcome> {
        let envelope = match self.decoder.decode(raw) {
            Ok(envelope) => envelope,
            Err(error) if error.is_unrecognized() => {
                tracing::warn!(
                    session = %origin,
                    %error,
                    "Dropping frame with unrecognized op code"
                );
                return None;
            }
            Err(error) => {
                tracing::warn!(session = %origin, %error, "Dropping undecodable frame");
                return None;
            }
        };

        tracing::trace!(session = %origin, op = envelope.op(), "Received envelope");
        Some(ProtocolDispatcher::new(&self.topics, &self.services).dispatch(envelope))
    }

    /// Encodes `envelope` and queues it on the session registered as `identifier`
    pub fn send(&self, envelope: &Envelope, identifier: &I) -> Result<()> {
        let handle = self
            .sessions
            .resolve(identifier)
            .ok_or_else(|| RosError::NotConnected(format!("{identifier:?}")))?;

        let frame = envelope.to_bytes()?;
        tracing::trace!(
            identifier = ?identifier,
            op = envelope.op(),
            len = frame.len(),
            "Sending envelope"
        );
        handle.send_bytes(frame)?;
        Ok(())
    }

    /// Sends an `auth` op
    pub fn authenticate(&self, identifier: &I, auth: Auth) -> Result<()> {
        self.send(&Envelope::Auth(auth), identifier)
    }

    /// Registers `listener` for `topic` and sends `subscribe`
    ///
    /// Returns the subscribe id, which [`unsubscribe_topic`](Self::unsubscribe_topic)
    /// needs. If the send fails the listener is deregistered again.
    pub fn subscribe_topic(
        &self,
        identifier: &I,
        topic: &str,
        msg_type: &str,
        options: SubscribeOptions,
        listener: &Arc<dyn TopicListener>,
    ) -> Result<String> {
        self.topics.register(topic, listener);

        let id = self.next_call_id(CallKind::Subscribe, topic);
        let envelope = Envelope::Subscribe {
            id: Some(id.clone()),
            msg_type: msg_type.to_owned(),
            topic: topic.to_owned(),
            compression: options.compression,
            throttle_rate: options.throttle_rate,
        };

        if let Err(error) = self.send(&envelope, identifier) {
            self.topics.deregister(topic, listener);
            return Err(error);
        }
        Ok(id)
    }

    /// Deregisters `listener` and sends `unsubscribe` for `subscribe_id`
    pub fn unsubscribe_topic(
        &self,
        identifier: &I,
        topic: &str,
        subscribe_id: &str,
        listener: &Arc<dyn TopicListener>,
    ) -> Result<()> {
        self.topics.deregister(topic, listener);
        self.send(
            &Envelope::Unsubscribe {
                id: Some(subscribe_id.to_owned()),
                topic: topic.to_owned(),
            },
            identifier,
        )
    }

    pub fn advertise_topic(&self, identifier: &I, topic: &str, msg_type: &str) -> Result<String> {
        let id = self.next_call_id(CallKind::Advertise, topic);
        self.send(
            &Envelope::Advertise {
                id: Some(id.clone()),
                msg_type: msg_type.to_owned(),
                topic: topic.to_owned(),
            },
            identifier,
        )?;
        Ok(id)
    }

    pub fn unadvertise_topic(&self, identifier: &I, topic: &str) -> Result<String> {
        let id = self.next_call_id(CallKind::Unadvertise, topic);
        self.send(
            &Envelope::Unadvertise {
                id: Some(id.clone()),
                topic: topic.to_owned(),
            },
            identifier,
        )?;
        Ok(id)
    }

    pub fn publish(&self, identifier: &I, topic: &str, message: Document) -> Result<String> {
        let id = self.next_call_id(CallKind::Publish, topic);
        self.send(
            &Envelope::Publish {
                id: Some(id.clone()),
                topic: topic.to_owned(),
                msg: message,
            },
            identifier,
        )?;
        Ok(id)
    }

    /// Installs `handler` for `service` and sends `advertise_service`
    pub fn advertise_service(
        &self,
        identifier: &I,
        service: &str,
        service_type: &str,
        handler: &Arc<dyn ServiceCallHandler>,
    ) -> Result<()> {
        let previous = self.services.register_advertised(service, handler);
        if previous.is_some() {
            tracing::debug!(service, "Replaced advertised service handler");
        }

        let envelope = Envelope::AdvertiseService {
            service_type: service_type.to_owned(),
            service: service.to_owned(),
        };
        if let Err(error) = self.send(&envelope, identifier) {
            self.services.restore_advertised(service, handler, previous);
            return Err(error);
        }
        Ok(())
    }

    /// Sends `unadvertise_service` and removes the local handler
    ///
    /// The handler stays installed if the send fails.
    pub fn unadvertise_service(&self, identifier: &I, service: &str) -> Result<()> {
        self.send(
            &Envelope::UnadvertiseService {
                service: service.to_owned(),
            },
            identifier,
        )?;
        self.services.deregister_advertised(service);
        Ok(())
    }

    /// Answers an inbound `call_service` identified by `call_id`
    pub fn send_service_response(
        &self,
        identifier: &I,
        service: &str,
        call_id: &str,
        response: &ServiceResponse,
    ) -> Result<()> {
        self.send(
            &Envelope::ServiceResponse {
                id: call_id.to_owned(),
                service: Some(service.to_owned()),
                values: response.values.clone(),
                result: response.result,
            },
            identifier,
        )
    }

    /// Sends `call_service` and registers `listener` for the response
    ///
    /// Returns the call id. The listener runs at most once, on the thread
    /// that delivers the matching `service_response`.
    pub fn call_service<F>(
        &self,
        identifier: &I,
        service: &str,
        service_type: Option<&str>,
        args: Document,
        listener: F,
    ) -> Result<String>
    where
        F: FnOnce(ServiceResponse) + Send + 'static,
    {
        let id = self.next_call_id(CallKind::CallService, service);
        self.services.register_pending(id.clone(), Box::new(listener));

        let envelope = Envelope::CallService {
            id: id.clone(),
            service_type: service_type.map(str::to_owned),
            service: service.to_owned(),
            args,
        };
        if let Err(error) = self.send(&envelope, identifier) {
            self.services.cancel_pending(&id);
            return Err(error);
        }

        tracing::debug!(call_id = %id, service, "Service call sent");
        Ok(id)
    }

    /// Calls a service and awaits the response
    ///
    /// Honors [`RosConfig::call_timeout_ms`]; on timeout the pending entry is
    /// removed so a late response is ignored.
    pub async fn call_service_async(
        &self,
        identifier: &I,
        service: &str,
        service_type: Option<&str>,
        args: Document,
    ) -> Result<ServiceResponse> {
        let (tx, mut rx) = oneshot::channel();
        let call_id = self.call_service(identifier, service, service_type, args, move |response| {
            let _ = tx.send(response);
        })?;

        let received = match self.config.call_timeout() {
            Some(limit) => match tokio::time::timeout(limit, &mut rx).await {
                Ok(received) => received,
                Err(_) => {
                    if self.services.cancel_pending(&call_id) {
                        tracing::warn!(call_id = %call_id, "Service call timed out");
                        return Err(RosError::Timeout { call_id });
                    }
                    // the dispatcher already took the listener, so a send is in flight
                    rx.await
                }
            },
            None => rx.await,
        };

        received.map_err(|_| RosError::NoResponse { call_id })
    }

    /// Calls a service and blocks the current thread until the response
    /// arrives
    ///
    /// The response is delivered by whichever thread feeds frames to
    /// [`on_frame`](Self::on_frame), so that thread must not be the caller.
    /// Inside an async context use [`call_service_async`](Self::call_service_async).
    pub fn call_service_and_wait(
        &self,
        identifier: &I,
        service: &str,
        service_type: Option<&str>,
        args: Document,
    ) -> Result<ServiceResponse> {
        let (tx, rx) = mpsc::sync_channel(1);
        let call_id = self.call_service(identifier, service, service_type, args, move |response| {
            let _ = tx.send(response);
        })?;

        let Some(limit) = self.config.call_timeout() else {
            return rx.recv().map_err(|_| RosError::NoResponse { call_id });
        };

        match rx.recv_timeout(limit) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => {
                if self.services.cancel_pending(&call_id) {
                    tracing::warn!(call_id = %call_id, "Service call timed out");
                    return Err(RosError::Timeout { call_id });
                }
                // the dispatcher already took the listener, so a send is in flight
                rx.recv().map_err(|_| RosError::NoResponse { call_id })
            }
            Err(RecvTimeoutError::Disconnected) => Err(RosError::NoResponse { call_id }),
        }
    }
}

impl<I: Identifier> Default for Ros<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryHandle;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use rosbridge_protocol::ServiceRequest;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    const ROBOT: &str = "robot-1";

    fn connected(ros: &Ros<&'static str>) -> (Arc<MemoryHandle>, UnboundedReceiver<Bytes>) {
        let (handle, wire) = MemoryHandle::pair();
        let dyn_handle: Arc<dyn SessionHandle> = handle.clone();
        ros.on_connected(&dyn_handle, ROBOT);
        (handle, wire)
    }

    fn next_frame(wire: &mut UnboundedReceiver<Bytes>) -> Value {
        serde_json::from_slice(&wire.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn test_send_to_unknown_identifier_fails() {
        let ros: Ros<&'static str> = Ros::new();
        let result = ros.publish(&"ghost", "/t", json!({}));
        assert!(matches!(result, Err(RosError::NotConnected(_))));
    }

    #[test]
    fn test_send_after_handle_dropped_fails() {
        let ros: Ros<&'static str> = Ros::new();
        let (handle, _wire) = connected(&ros);
        drop(handle);

        assert!(!ros.is_connected(&ROBOT));
        assert!(matches!(
            ros.publish(&ROBOT, "/t", json!({})),
            Err(RosError::NotConnected(_))
        ));
    }

    #[test]
    fn test_send_on_closed_session_reports_transport_error() {
        let ros: Ros<&'static str> = Ros::new();
        let (handle, _wire) = connected(&ros);
        handle.close();

        assert!(matches!(
            ros.publish(&ROBOT, "/t", json!({})),
            Err(RosError::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn test_call_ids_increase() {
        let ros: Ros<&'static str> = Ros::new();
        assert_eq!(ros.next_call_id(CallKind::Publish, "/t"), "publish:/t:0");
        assert_eq!(ros.next_call_id(CallKind::Publish, "/t"), "publish:/t:1");
        assert_eq!(ros.next_id(), 2);
    }

    #[test]
    fn test_subscribe_sends_envelope_and_delivers_publish() {
        let ros: Ros<&'static str> = Ros::new();
        let (handle, mut wire) = connected(&ros);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Arc<dyn TopicListener> =
            Arc::new(move |message: &Document| sink.lock().push(message.clone()));

        let options = SubscribeOptions {
            compression: CompressionType::Png,
            throttle_rate: 50,
        };
        let id = ros
            .subscribe_topic(&ROBOT, "/scan", "sensor_msgs/LaserScan", options, &listener)
            .unwrap();

        assert_eq!(id, "subscribe:/scan:0");
        assert_eq!(
            next_frame(&mut wire),
            json!({
                "op": "subscribe",
                "id": "subscribe:/scan:0",
                "type": "sensor_msgs/LaserScan",
                "topic": "/scan",
                "compression": "png",
                "throttle_rate": 50
            })
        );

        let outcome = ros.on_frame(
            br#"{"op":"publish","topic":"/scan","msg":{"ranges":[1.0]}}"#,
            handle.session_id(),
        );
        assert_eq!(
            outcome,
            Some(DispatchOutcome::Delivered {
                topic: "/scan".into(),
                listeners: 1
            })
        );
        assert_eq!(*seen.lock(), vec![json!({"ranges": [1.0]})]);

        ros.unsubscribe_topic(&ROBOT, "/scan", &id, &listener).unwrap();
        assert_eq!(
            next_frame(&mut wire),
            json!({"op": "unsubscribe", "id": id, "topic": "/scan"})
        );
        assert!(!ros.topics().contains("/scan"));
    }

    #[test]
    fn test_failed_subscribe_rolls_back_listener() {
        let ros: Ros<&'static str> = Ros::new();
        let listener: Arc<dyn TopicListener> = Arc::new(|_: &Document| {});

        let result =
            ros.subscribe_topic(&ROBOT, "/t", "x/Y", SubscribeOptions::default(), &listener);

        assert!(result.is_err());
        assert!(!ros.topics().contains("/t"));
    }

    #[test]
    fn test_call_service_callback() {
        let ros: Ros<&'static str> = Ros::new();
        let (handle, mut wire) = connected(&ros);
        let got = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&got);

        let id = ros
            .call_service(&ROBOT, "/add", Some("x/Add"), json!({"a": 1, "b": 2}), move |r| {
                *sink.lock() = Some(r)
            })
            .unwrap();

        assert_eq!(
            next_frame(&mut wire),
            json!({
                "op": "call_service",
                "id": id,
                "type": "x/Add",
                "service": "/add",
                "args": {"a": 1, "b": 2}
            })
        );

        let frame = format!(r#"{{"op":"service_response","id":"{id}","values":{{"sum":3}}}}"#);
        ros.on_frame(frame.as_bytes(), handle.session_id());

        assert_eq!(
            got.lock().take(),
            Some(ServiceResponse::new(json!({"sum": 3}), true))
        );
        assert_eq!(ros.services().pending_count(), 0);
    }

    #[test]
    fn test_failed_call_leaves_nothing_pending() {
        let ros: Ros<&'static str> = Ros::new();
        let result = ros.call_service(&ROBOT, "/add", None, json!({}), |_| {});
        assert!(matches!(result, Err(RosError::NotConnected(_))));
        assert_eq!(ros.services().pending_count(), 0);
    }

    #[test]
    fn test_call_service_and_wait_from_other_thread() {
        let ros = Arc::new(Ros::<&'static str>::new());
        let (handle, mut wire) = connected(&ros);

        let responder = {
            let ros = Arc::clone(&ros);
            let session = handle.session_id();
            std::thread::spawn(move || {
                // wait for the request to hit the wire
                let request = loop {
                    if let Ok(frame) = wire.try_recv() {
                        break serde_json::from_slice::<Value>(&frame).unwrap();
                    }
                    std::thread::sleep(Duration::from_millis(5));
                };
                std::thread::sleep(Duration::from_millis(50));
                let reply = json!({
                    "op": "service_response",
                    "id": request["id"],
                    "values": {"sum": 5},
                    "result": true
                });
                ros.on_frame(reply.to_string().as_bytes(), session);
            })
        };

        let response = ros
            .call_service_and_wait(&ROBOT, "/add", None, json!({"a": 2, "b": 3}))
            .unwrap();
        responder.join().unwrap();

        assert_eq!(response.values, json!({"sum": 5}));
        assert!(response.result);
    }

    #[test]
    fn test_call_service_and_wait_times_out() {
        let config = RosConfig::default().with_call_timeout(Duration::from_millis(30));
        let ros: Ros<&'static str> = Ros::with_config(config);
        let (handle, mut wire) = connected(&ros);

        let result = ros.call_service_and_wait(&ROBOT, "/slow", None, json!({}));

        let call_id = match result {
            Err(RosError::Timeout { call_id }) => call_id,
            other => panic!("expected timeout, got {other:?}"),
        };
        assert_eq!(ros.services().pending_count(), 0);

        let late = json!({"op": "service_response", "id": call_id, "values": {}});
        assert_eq!(
            ros.on_frame(late.to_string().as_bytes(), handle.session_id()),
            Some(DispatchOutcome::ResponseResolved {
                id: call_id,
                resolved: false
            })
        );
        assert!(wire.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_call_service_async() {
        let ros = Arc::new(Ros::<&'static str>::new());
        let (handle, mut wire) = connected(&ros);

        let responder = {
            let ros = Arc::clone(&ros);
            let session = handle.session_id();
            tokio::spawn(async move {
                let frame = wire.recv().await.unwrap();
                let request: Value = serde_json::from_slice(&frame).unwrap();
                let reply = json!({
                    "op": "service_response",
                    "id": request["id"],
                    "values": {"ok": true},
                    "result": "false"
                });
                ros.on_frame(reply.to_string().as_bytes(), session);
            })
        };

        let response = ros
            .call_service_async(&ROBOT, "/check", None, json!({}))
            .await
            .unwrap();
        responder.await.unwrap();

        assert_eq!(response.values, json!({"ok": true}));
        assert!(!response.result);
    }

    #[tokio::test]
    async fn test_call_service_async_times_out() {
        let config = RosConfig::default().with_call_timeout(Duration::from_millis(20));
        let ros: Ros<&'static str> = Ros::with_config(config);
        let (_handle, _wire) = connected(&ros);

        let result = ros.call_service_async(&ROBOT, "/slow", None, json!({})).await;

        assert!(matches!(result, Err(RosError::Timeout { .. })));
        assert_eq!(ros.services().pending_count(), 0);
    }

    #[test]
    fn test_advertised_service_round_trip() {
        let ros = Arc::new(Ros::<&'static str>::new());
        let (handle, mut wire) = connected(&ros);

        let handler: Arc<dyn ServiceCallHandler> = {
            let ros = Arc::clone(&ros);
            Arc::new(move |request: ServiceRequest| {
                let sum = request.args["a"].as_i64().unwrap_or(0)
                    + request.args["b"].as_i64().unwrap_or(0);
                let call_id = request.id.unwrap_or_default();
                let response = ServiceResponse::new(json!({ "sum": sum }), true);
                ros.send_service_response(&ROBOT, "/add", &call_id, &response).unwrap();
            })
        };

        ros.advertise_service(&ROBOT, "/add", "x/Add", &handler).unwrap();
        assert_eq!(
            next_frame(&mut wire),
            json!({"op": "advertise_service", "type": "x/Add", "service": "/add"})
        );

        ros.on_frame(
            br#"{"op":"call_service","id":"remote:7","service":"/add","args":{"a":2,"b":5}}"#,
            handle.session_id(),
        );
        assert_eq!(
            next_frame(&mut wire),
            json!({
                "op": "service_response",
                "id": "remote:7",
                "service": "/add",
                "values": {"sum": 7},
                "result": true
            })
        );

        ros.unadvertise_service(&ROBOT, "/add").unwrap();
        assert_eq!(
            next_frame(&mut wire),
            json!({"op": "unadvertise_service", "service": "/add"})
        );
        assert!(!ros.services().is_advertised("/add"));
    }

    #[test]
    fn test_failed_advertise_keeps_existing_handler() {
        let ros = Ros::<&'static str>::new();
        let (handle, _wire) = connected(&ros);
        let calls = Arc::new(Mutex::new(0));
        let seen = Arc::clone(&calls);
        let working: Arc<dyn ServiceCallHandler> =
            Arc::new(move |_: ServiceRequest| *seen.lock() += 1);
        let unreachable: Arc<dyn ServiceCallHandler> = Arc::new(|_: ServiceRequest| {});

        ros.advertise_service(&ROBOT, "/add", "x/Add", &working).unwrap();
        let result = ros.advertise_service(&"robot-2", "/add", "x/Add", &unreachable);
        assert!(matches!(result, Err(RosError::NotConnected(_))));

        assert!(ros.services().is_advertised("/add"));
        let outcome = ros.on_frame(
            br#"{"op":"call_service","id":"c:1","service":"/add"}"#,
            handle.session_id(),
        );
        assert_eq!(
            outcome,
            Some(DispatchOutcome::CallDispatched {
                service: "/add".into(),
                handled: true
            })
        );
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_failed_advertise_without_previous_leaves_nothing() {
        let ros = Ros::<&'static str>::new();
        let handler: Arc<dyn ServiceCallHandler> = Arc::new(|_: ServiceRequest| {});

        assert!(ros.advertise_service(&ROBOT, "/add", "x/Add", &handler).is_err());
        assert!(!ros.services().is_advertised("/add"));
    }

    #[test]
    fn test_failed_unadvertise_keeps_handler() {
        let ros = Ros::<&'static str>::new();
        let (handle, _wire) = connected(&ros);
        let handler: Arc<dyn ServiceCallHandler> = Arc::new(|_: ServiceRequest| {});
        ros.advertise_service(&ROBOT, "/add", "x/Add", &handler).unwrap();

        ros.on_disconnected(handle.session_id());

        assert!(ros.unadvertise_service(&ROBOT, "/add").is_err());
        assert!(ros.services().is_advertised("/add"));
    }

    /// Holds the pending listener the way the dispatcher does mid-delivery,
    /// then completes it after the caller's timeout has elapsed
    fn deliver_late(
        ros: Arc<Ros<&'static str>>,
        call_id: &'static str,
    ) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let listener = (0..1000)
                .find_map(|_| {
                    let taken = ros.services().take_pending(call_id);
                    if taken.is_none() {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    taken
                })
                .expect("call never became pending");
            std::thread::sleep(Duration::from_millis(80));
            listener(ServiceResponse::new(json!({"late": true}), true));
        })
    }

    #[test]
    fn test_blocking_call_waits_for_listener_already_in_flight() {
        let config = RosConfig::default().with_call_timeout(Duration::from_millis(20));
        let ros = Arc::new(Ros::<&'static str>::with_config(config));
        let (_handle, _wire) = connected(&ros);
        let deliverer = deliver_late(Arc::clone(&ros), "call_service:/slow:0");

        let response = ros.call_service_and_wait(&ROBOT, "/slow", None, json!({})).unwrap();

        assert_eq!(response.values, json!({"late": true}));
        deliverer.join().unwrap();
    }

    #[tokio::test]
    async fn test_async_call_waits_for_listener_already_in_flight() {
        let config = RosConfig::default().with_call_timeout(Duration::from_millis(20));
        let ros = Arc::new(Ros::<&'static str>::with_config(config));
        let (_handle, _wire) = connected(&ros);
        let deliverer = deliver_late(Arc::clone(&ros), "call_service:/slow:0");

        let response = ros
            .call_service_async(&ROBOT, "/slow", None, json!({}))
            .await
            .unwrap();

        assert_eq!(response.values, json!({"late": true}));
        deliverer.join().unwrap();
    }

    #[test]
    fn test_authenticate_sends_auth() {
        let ros: Ros<&'static str> = Ros::new();
        let (_handle, mut wire) = connected(&ros);

        let auth = Auth {
            mac: "mac".into(),
            client: "10.0.0.2".into(),
            dest: "10.0.0.1".into(),
            rand: "r".into(),
            t: 5,
            level: "admin".into(),
            end: 10,
        };
        ros.authenticate(&ROBOT, auth).unwrap();
        assert_eq!(next_frame(&mut wire)["op"], "auth");
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let ros: Ros<&'static str> = Ros::new();
        let session = SessionId::new_v4();

        assert_eq!(ros.on_frame(b"not json", session), None);
        assert_eq!(ros.on_frame(br#"{"topic":"/t"}"#, session), None);
        assert_eq!(ros.on_frame(br#"{"op":"teleport"}"#, session), None);
        assert_eq!(ros.on_frame(br#"{"op":"publish"}"#, session), None);
    }

    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl RosHandler<&'static str> for Recorder {
        fn handle_connection(&self, identifier: &&'static str, _session: SessionId) {
            self.events.lock().push(format!("connected:{identifier}"));
        }

        fn handle_disconnection(&self, identifier: Option<&&'static str>, _session: SessionId) {
            self.events
                .lock()
                .push(format!("disconnected:{}", identifier.copied().unwrap_or("?")));
        }

        fn handle_error(&self, _session: SessionId, error: &TransportError) {
            self.events.lock().push(format!("error:{error}"));
        }
    }

    #[test]
    fn test_lifecycle_hooks() {
        let ros: Ros<&'static str> = Ros::new();
        let recorder = Arc::new(Recorder {
            events: Mutex::new(Vec::new()),
        });
        ros.add_handler(recorder.clone());

        let (handle, _wire) = connected(&ros);
        ros.on_transport_error(handle.session_id(), &TransportError::Io("reset".into()));
        assert_eq!(ros.on_disconnected(handle.session_id()), Some(ROBOT));
        assert_eq!(ros.on_disconnected(SessionId::new_v4()), None);

        assert_eq!(
            *recorder.events.lock(),
            vec![
                "connected:robot-1",
                "error:I/O error: reset",
                "disconnected:robot-1",
                "disconnected:?"
            ]
        );
        assert!(!ros.is_connected(&ROBOT));
    }
}
