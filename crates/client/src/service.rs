//! Per-service convenience handle

use crate::error::Result;
use crate::listener::ServiceCallHandler;
use crate::registry::Identifier;
use crate::ros::Ros;
use parking_lot::Mutex;
use rosbridge_protocol::{ServiceRequest, ServiceResponse};
use std::sync::Arc;

/// One service on one session
///
/// Used either as a client of a remote service (`call_service*`) or to serve
/// a service from this side (`advertise_service` and `send_response`).
pub struct Service<I: Identifier> {
    ros: Arc<Ros<I>>,
    identifier: I,
    name: String,
    service_type: String,
    handler: Mutex<Option<Arc<dyn ServiceCallHandler>>>,
}

impl<I: Identifier> Service<I> {
    pub fn new(
        ros: Arc<Ros<I>>,
        identifier: I,
        name: impl Into<String>,
        service_type: impl Into<String>,
    ) -> Self {
        Self {
            ros,
            identifier,
            name: name.into(),
            service_type: service_type.into(),
            handler: Mutex::new(None),
        }
    }

    pub fn ros(&self) -> &Arc<Ros<I>> {
        &self.ros
    }

    pub fn identifier(&self) -> &I {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn is_advertised(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Calls the service; `listener` receives the response
    ///
    /// Returns the call id.
    pub fn call_service<F>(&self, request: &ServiceRequest, listener: F) -> Result<String>
    where
        F: FnOnce(ServiceResponse) + Send + 'static,
    {
        self.ros.call_service(
            &self.identifier,
            &self.name,
            Some(self.service_type.as_str()),
            request.args.clone(),
            listener,
        )
    }

    /// Calls the service and blocks until it answers
    pub fn call_service_and_wait(&self, request: &ServiceRequest) -> Result<ServiceResponse> {
        self.ros.call_service_and_wait(
            &self.identifier,
            &self.name,
            Some(self.service_type.as_str()),
            request.args.clone(),
        )
    }

    pub async fn call_service_async(&self, request: &ServiceRequest) -> Result<ServiceResponse> {
        self.ros
            .call_service_async(
                &self.identifier,
                &self.name,
                Some(self.service_type.as_str()),
                request.args.clone(),
            )
            .await
    }

    /// Answers the inbound call `call_id`
    pub fn send_response(&self, response: &ServiceResponse, call_id: &str) -> Result<()> {
        self.ros
            .send_service_response(&self.identifier, &self.name, call_id, response)
    }

    /// Serves this service with `handler`
    ///
    /// The handle keeps `handler` alive until it is unadvertised or dropped.
    pub fn advertise_service(&self, handler: Arc<dyn ServiceCallHandler>) -> Result<()> {
        self.ros
            .advertise_service(&self.identifier, &self.name, &self.service_type, &handler)?;
        *self.handler.lock() = Some(handler);
        Ok(())
    }

    pub fn unadvertise_service(&self) -> Result<()> {
        let result = self.ros.unadvertise_service(&self.identifier, &self.name);
        self.handler.lock().take();
        result
    }
}
