//! Callback traits invoked by the facade
//!
//! Listeners run synchronously on the thread that delivered the frame. A
//! panicking listener is caught and logged so later listeners still run.

use crate::transport::TransportError;
use rosbridge_protocol::{Document, ServiceRequest, ServiceResponse, SessionId};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Receives messages published on a subscribed topic
pub trait TopicListener: Send + Sync {
    fn handle_message(&self, message: &Document);
}

impl<F> TopicListener for F
where
    F: Fn(&Document) + Send + Sync,
{
    fn handle_message(&self, message: &Document) {
        self(message)
    }
}

/// Serves calls to a service advertised by this side
pub trait ServiceCallHandler: Send + Sync {
    fn handle_service_call(&self, request: ServiceRequest);
}

impl<F> ServiceCallHandler for F
where
    F: Fn(ServiceRequest) + Send + Sync,
{
    fn handle_service_call(&self, request: ServiceRequest) {
        self(request)
    }
}

/// One-shot listener for the response to an outbound service call
pub type ResponseListener = Box<dyn FnOnce(ServiceResponse) + Send>;

/// Session lifecycle hooks
///
/// All methods default to no-ops.
pub trait RosHandler<I>: Send + Sync {
    /// A session was registered under `identifier`
    fn handle_connection(&self, _identifier: &I, _session: SessionId) {}

    /// A session ended; `identifier` is `None` if it was never registered
    fn handle_disconnection(&self, _identifier: Option<&I>, _session: SessionId) {}

    /// The transport reported an error on a session
    fn handle_error(&self, _session: SessionId, _error: &TransportError) {}
}

/// Runs `f`, converting a panic into a logged error
///
/// Returns `true` if `f` completed normally.
pub(crate) fn isolate<F: FnOnce()>(context: &str, f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                context,
                reason = panic_reason(payload.as_ref()),
                "Listener panicked"
            );
            false
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        reason
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason
    } else {
        "unknown"
    }
}
