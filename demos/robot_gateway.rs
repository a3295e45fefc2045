//! Robot gateway
//!
//! Accepts robots over WebSocket, subscribes to each robot's `/odom` and asks
//! for its battery level once it connects.
//!
//! ```text
//! RUST_LOG=info cargo run --example robot_gateway -- '{"port": 9090}'
//! ```

use rosbridge::server::{ServerConfig, WebSocketServer};
use rosbridge::{
    Document, Ros, RosHandler, Service, ServiceRequest, SessionId, Topic, TopicListener,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Forwards newly connected robots to the main loop
struct Arrivals(mpsc::UnboundedSender<String>);

impl RosHandler<String> for Arrivals {
    fn handle_connection(&self, identifier: &String, _session: SessionId) {
        let _ = self.0.send(identifier.clone());
    }

    fn handle_disconnection(&self, identifier: Option<&String>, session: SessionId) {
        tracing::info!(robot = ?identifier, %session, "Robot left");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(text) => ServerConfig::from_json_str(&text)?,
        None => ServerConfig::default(),
    };

    let ros = Arc::new(Ros::<String>::new());
    let (arrivals_tx, mut arrivals) = mpsc::unbounded_channel();
    ros.add_handler(Arc::new(Arrivals(arrivals_tx)));

    let server = WebSocketServer::new(config, |peer: SocketAddr, _: SessionId| {
        Some(format!("robot@{peer}"))
    });
    let server = tokio::spawn(server.run(Arc::clone(&ros)));

    let mut odom_topics = Vec::new();
    while let Some(robot) = arrivals.recv().await {
        let odom = Topic::new(Arc::clone(&ros), robot.clone(), "/odom", "nav_msgs/Odometry");
        let name = robot.clone();
        let listener: Arc<dyn TopicListener> = Arc::new(move |message: &Document| {
            tracing::info!(robot = %name, pose = %message["pose"], "Odometry");
        });
        if let Err(error) = odom.subscribe(listener) {
            tracing::warn!(%robot, %error, "Subscribe failed");
            continue;
        }
        odom_topics.push(odom);

        let battery = Service::new(
            Arc::clone(&ros),
            robot.clone(),
            "/battery",
            "robot_msgs/Battery",
        );
        tokio::spawn(async move {
            match battery.call_service_async(&ServiceRequest::new(json!({}))).await {
                Ok(response) => tracing::info!(%robot, values = %response.values, "Battery level"),
                Err(error) => tracing::warn!(%robot, %error, "Battery call failed"),
            }
        });

        if server.is_finished() {
            break;
        }
    }

    Ok(())
}
