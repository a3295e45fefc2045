//! Routing of decoded envelopes to registered listeners
//!
//! The dispatcher holds no state of its own. It borrows the topic and service
//! registries and routes one envelope per call:
//!
//! | op | action |
//! |----|--------|
//! | `publish` | fan out `msg` to the topic's listeners |
//! | `service_response` | resolve the pending call with the same id |
//! | `call_service` | invoke the advertised handler for the service |
//! | `advertise`, `unadvertise`, `unsubscribe`, `advertise_service`, `unadvertise_service` | acknowledged, no routing |
//! | anything else | reported as unrecognized |

use crate::registry::{ServiceCallCorrelator, TopicSubscriptionRegistry};
use rosbridge_protocol::{Envelope, ServiceRequest, ServiceResponse};

/// What happened to one inbound envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A `publish` reached `listeners` listeners
    Delivered { topic: String, listeners: usize },
    /// A `service_response`; `resolved` is false if no call was pending
    ResponseResolved { id: String, resolved: bool },
    /// A `call_service`; `handled` is false if the service is not advertised here
    CallDispatched { service: String, handled: bool },
    /// A bookkeeping op with nothing to route
    Acknowledged { op: &'static str },
    /// An op a client never expects to receive
    Unrecognized { op: &'static str },
}

/// Routes envelopes to the topic and service registries
pub struct ProtocolDispatcher<'a> {
    topics: &'a TopicSubscriptionRegistry,
    services: &'a ServiceCallCorrelator,
}

impl<'a> ProtocolDispatcher<'a> {
    pub fn new(topics: &'a TopicSubscriptionRegistry, services: &'a ServiceCallCorrelator) -> Self {
        Self { topics, services }
    }

    pub fn dispatch(&self, envelope: Envelope) -> DispatchOutcome {
        match envelope {
            Envelope::Publish { topic, msg, .. } => {
                let listeners = self.topics.dispatch(&topic, &msg);
                tracing::trace!(topic = %topic, listeners, "Delivered publish");
                DispatchOutcome::Delivered { topic, listeners }
            }

            Envelope::ServiceResponse {
                id, values, result, ..
            } => {
                let resolved = self
                    .services
                    .resolve_pending(&id, ServiceResponse::new(values, result));
                DispatchOutcome::ResponseResolved { id, resolved }
            }

            Envelope::CallService {
                id, service, args, ..
            } => {
                let request = ServiceRequest { id: Some(id), args };
                let handled = self.services.dispatch_incoming_call(&service, request);
                DispatchOutcome::CallDispatched { service, handled }
            }

            envelope @ (Envelope::Advertise { .. }
            | Envelope::Unadvertise { .. }
            | Envelope::Unsubscribe { .. }
            | Envelope::AdvertiseService { .. }
            | Envelope::UnadvertiseService { .. }) => {
                tracing::debug!(op = envelope.op(), "Acknowledged bookkeeping op");
                DispatchOutcome::Acknowledged { op: envelope.op() }
            }

            envelope => {
                tracing::warn!(op = envelope.op(), "Unrecognized inbound op code");
                DispatchOutcome::Unrecognized { op: envelope.op() }
            }
        }
    }
}
