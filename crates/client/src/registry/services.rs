//! Service call correlation
//!
//! Tracks two things: outbound calls waiting for a `service_response`, keyed
//! by call id, and services this side has advertised, keyed by name.

use crate::listener::{isolate, ResponseListener, ServiceCallHandler};
use parking_lot::{Mutex, RwLock};
use rosbridge_protocol::{ServiceRequest, ServiceResponse};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Pending-call and advertised-service tables
#[derive(Default)]
pub struct ServiceCallCorrelator {
    pending: Mutex<HashMap<String, ResponseListener>>,
    advertised: RwLock<HashMap<String, Weak<dyn ServiceCallHandler>>>,
}

impl ServiceCallCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the listener for `call_id`, replacing any earlier one
    pub fn register_pending(&self, call_id: impl Into<String>, listener: ResponseListener) {
        let call_id = call_id.into();
        if self.pending.lock().insert(call_id.clone(), listener).is_some() {
            tracing::warn!(call_id = %call_id, "Replaced pending listener for reused call id");
        }
    }

    /// Hands `response` to the listener waiting on `call_id`
    ///
    /// The entry is removed before the listener runs, so each pending call is
    /// resolved at most once. Returns `false` if nothing was waiting.
    pub fn resolve_pending(&self, call_id: &str, response: ServiceResponse) -> bool {
        let Some(listener) = self.take_pending(call_id) else {
            tracing::debug!(call_id, "Dropping service response with no pending call");
            return false;
        };

        isolate(call_id, move || listener(response));
        true
    }

    /// Removes and returns the listener for `call_id`
    ///
    /// Whoever takes the listener owns its delivery; a waiter whose
    /// [`cancel_pending`](Self::cancel_pending) returns `false` must expect it.
    pub fn take_pending(&self, call_id: &str) -> Option<ResponseListener> {
        self.pending.lock().remove(call_id)
    }

    /// Drops the listener for `call_id` without invoking it
    pub fn cancel_pending(&self, call_id: &str) -> bool {
        self.take_pending(call_id).is_some()
    }

    pub fn is_pending(&self, call_id: &str) -> bool {
        self.pending.lock().contains_key(call_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Installs `handler` for `service` and returns the entry it replaced
    pub fn register_advertised(
        &self,
        service: &str,
        handler: &Arc<dyn ServiceCallHandler>,
    ) -> Option<Weak<dyn ServiceCallHandler>> {
        self.advertised
            .write()
            .insert(service.to_owned(), Arc::downgrade(handler))
    }

    /// Undoes a [`register_advertised`](Self::register_advertised) of `handler`
    ///
    /// Puts `previous` back, or removes the entry when there was none. Does
    /// nothing if `handler` is no longer the one installed for `service`.
    pub fn restore_advertised(
        &self,
        service: &str,
        handler: &Arc<dyn ServiceCallHandler>,
        previous: Option<Weak<dyn ServiceCallHandler>>,
    ) {
        let mut advertised = self.advertised.write();
        let installed = advertised
            .get(service)
            .is_some_and(|weak| std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(handler)));
        if !installed {
            return;
        }

        match previous {
            Some(previous) => {
                advertised.insert(service.to_owned(), previous);
            }
            None => {
                advertised.remove(service);
            }
        }
    }

    pub fn deregister_advertised(&self, service: &str) -> bool {
        self.advertised.write().remove(service).is_some()
    }

    pub fn is_advertised(&self, service: &str) -> bool {
        self.advertised
            .read()
            .get(service)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Invokes the handler advertised for `service`
    ///
    /// Returns `false` if no live handler is installed.
    pub fn dispatch_incoming_call(&self, service: &str, request: ServiceRequest) -> bool {
        let handler = self.advertised.read().get(service).map(Weak::upgrade);

        match handler {
            Some(Some(handler)) => {
                isolate(service, || handler.handle_service_call(request));
                true
            }
            Some(None) => {
                tracing::debug!(service, "Pruning dropped service handler");
                self.advertised
                    .write()
                    .retain(|_, weak| weak.strong_count() > 0);
                false
            }
            None => {
                tracing::debug!(service, "Dropping call for service not advertised here");
                false
            }
        }
    }
}
