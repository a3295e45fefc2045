//! Per-topic convenience handle

use crate::error::Result;
use crate::listener::TopicListener;
use crate::registry::Identifier;
use crate::ros::{Ros, SubscribeOptions};
use parking_lot::Mutex;
use rosbridge_protocol::{CompressionType, Document, RosMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One topic on one session
///
/// Keeps the listeners it subscribed alive and remembers their subscribe
/// ids, so [`unsubscribe`](Self::unsubscribe) can undo all of them.
/// Publishing advertises the topic first if needed.
pub struct Topic<I: Identifier> {
    ros: Arc<Ros<I>>,
    identifier: I,
    name: String,
    msg_type: String,
    options: SubscribeOptions,
    advertised: AtomicBool,
    subscriptions: Mutex<Vec<(String, Arc<dyn TopicListener>)>>,
}

impl<I: Identifier> Topic<I> {
    /// Creates a topic handle using the facade's default compression and
    /// throttle rate
    pub fn new(
        ros: Arc<Ros<I>>,
        identifier: I,
        name: impl Into<String>,
        msg_type: impl Into<String>,
    ) -> Self {
        let options = SubscribeOptions {
            compression: ros.config().default_compression,
            throttle_rate: ros.config().default_throttle_rate,
        };
        Self::with_options(ros, identifier, name, msg_type, options)
    }

    pub fn with_options(
        ros: Arc<Ros<I>>,
        identifier: I,
        name: impl Into<String>,
        msg_type: impl Into<String>,
        options: SubscribeOptions,
    ) -> Self {
        Self {
            ros,
            identifier,
            name: name.into(),
            msg_type: msg_type.into(),
            options,
            advertised: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
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

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    pub fn compression(&self) -> CompressionType {
        self.options.compression
    }

    pub fn throttle_rate(&self) -> u32 {
        self.options.throttle_rate
    }

    pub fn is_advertised(&self) -> bool {
        self.advertised.load(Ordering::Acquire)
    }

    pub fn is_subscribed(&self) -> bool {
        !self.subscriptions.lock().is_empty()
    }

    /// Subscribes `listener`; returns the subscribe id
    pub fn subscribe(&self, listener: Arc<dyn TopicListener>) -> Result<String> {
        let id = self.ros.subscribe_topic(
            &self.identifier,
            &self.name,
            &self.msg_type,
            self.options,
            &listener,
        )?;
        self.subscriptions.lock().push((id.clone(), listener));
        Ok(id)
    }

    /// Subscribes a closure receiving typed messages
    ///
    /// Messages that do not decode as `M` are logged and skipped.
    pub fn subscribe_typed<M, F>(&self, on_message: F) -> Result<String>
    where
        M: RosMessage + 'static,
        F: Fn(M) + Send + Sync + 'static,
    {
        let topic = self.name.clone();
        let listener: Arc<dyn TopicListener> = Arc::new(move |message: &Document| {
            match M::from_document(message) {
                Ok(typed) => on_message(typed),
                Err(error) => {
                    tracing::warn!(
                        topic = %topic,
                        msg_type = M::TYPE,
                        %error,
                        "Skipping undecodable message"
                    )
                }
            }
        });
        self.subscribe(listener)
    }

    /// Deregisters every listener and sends one `unsubscribe` per subscribe id
    ///
    /// All subscriptions are dropped locally even if a send fails; the first
    /// send error is returned.
    pub fn unsubscribe(&self) -> Result<()> {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());

        let mut first_error = None;
        for (id, listener) in subscriptions {
            if let Err(error) = self
                .ros
                .unsubscribe_topic(&self.identifier, &self.name, &id, &listener)
            {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn advertise(&self) -> Result<()> {
        self.ros
            .advertise_topic(&self.identifier, &self.name, &self.msg_type)?;
        self.advertised.store(true, Ordering::Release);
        Ok(())
    }

    pub fn unadvertise(&self) -> Result<()> {
        self.ros.unadvertise_topic(&self.identifier, &self.name)?;
        self.advertised.store(false, Ordering::Release);
        Ok(())
    }

    /// Publishes `message`, advertising the topic first if it is not yet
    pub fn publish(&self, message: Document) -> Result<()> {
        if !self.is_advertised() {
            self.advertise()?;
        }
        self.ros.publish(&self.identifier, &self.name, message)?;
        Ok(())
    }

    pub fn publish_message<M: RosMessage>(&self, message: &M) -> Result<()> {
        self.publish(message.to_document())
    }
}
