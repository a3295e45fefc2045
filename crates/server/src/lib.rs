//! # rosbridge server
//!
//! WebSocket endpoint for deployments where robots dial in. Every accepted
//! connection becomes a session of a shared [`Ros`](rosbridge_client::Ros)
//! facade, registered under the identifier a [`ConnectionBootstrap`] picks.
//!
//! ## Example
//!
//! ```no_run
//! use rosbridge_client::Ros;
//! use rosbridge_protocol::SessionId;
//! use rosbridge_server::{ServerConfig, WebSocketServer};
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ros = Arc::new(Ros::<SocketAddr>::new());
//!     let server = WebSocketServer::new(ServerConfig::default(), |peer: SocketAddr, _: SessionId| Some(peer));
//!     server.run(ros).await.unwrap();
//! }
//! ```

pub mod config;
pub mod transport;

pub use config::ServerConfig;
pub use transport::{ConnectionBootstrap, WebSocketServer, WebSocketServerError};
