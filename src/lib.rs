//! # rosbridge
//!
//! Client-side engine for the rosbridge JSON protocol: one process talking
//! to many robots, each reached through its own WebSocket session.
//!
//! ## Components
//!
//! - `rosbridge-protocol`: envelopes, frame decoding, PNG compression, message documents
//! - `rosbridge-client`: session registry, dispatcher, the `Ros` facade and the client transport
//! - `rosbridge-server`: WebSocket endpoint for robots that dial in
//!
//! ## Example
//!
//! See `demos/robot_gateway.rs` for a gateway serving robots over WebSocket.

pub use rosbridge_client as client;
pub use rosbridge_protocol as protocol;
pub use rosbridge_server as server;

pub use rosbridge_client::{
    Ros, RosConfig, RosError, RosHandler, Service, ServiceCallHandler, SessionHandle,
    SubscribeOptions, Topic, TopicListener,
};
pub use rosbridge_protocol::{
    CompressionType, Document, Envelope, RosMessage, ServiceRequest, ServiceResponse, SessionId,
};
