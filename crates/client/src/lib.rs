//! # rosbridge client
//!
//! Client-side engine for the rosbridge protocol.
//!
//! [`Ros`] is the facade: it maps application identifiers to live sessions,
//! decodes inbound frames and routes them to topic listeners, pending service
//! calls and advertised services. Transports plug in through
//! [`SessionHandle`](transport::SessionHandle).
//!
//! ## Example
//!
//! ```no_run
//! use rosbridge_client::transport::websocket::WebSocketClient;
//! use rosbridge_client::{Ros, Topic};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ros = Arc::new(Ros::<String>::new());
//!     let client = WebSocketClient::new("ws://localhost:9090");
//!     let _pump = client.connect(Arc::clone(&ros), "robot-1".into()).await.unwrap();
//!
//!     let chatter = Topic::new(ros, "robot-1".into(), "/chatter", "std_msgs/String");
//!     chatter.publish(json!({"data": "hello"})).unwrap();
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod registry;
pub mod ros;
pub mod service;
pub mod topic;
pub mod transport;

pub use config::RosConfig;
pub use dispatch::{DispatchOutcome, ProtocolDispatcher};
pub use error::{Result, RosError};
pub use listener::{ResponseListener, RosHandler, ServiceCallHandler, TopicListener};
pub use registry::{Identifier, ServiceCallCorrelator, SessionRegistry, TopicSubscriptionRegistry};
pub use ros::{Ros, SubscribeOptions};
pub use service::Service;
pub use topic::Topic;
pub use transport::{SessionHandle, TransportError};
