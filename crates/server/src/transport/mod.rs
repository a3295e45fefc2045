pub mod websocket;

pub use websocket::{ConnectionBootstrap, WebSocketServer, WebSocketServerError};
