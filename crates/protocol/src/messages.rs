//! Message documents exchanged through the bridge
//!
//! Topic messages, service arguments and service results all travel as plain
//! JSON documents. [`RosMessage`] converts typed messages to and from those
//! documents; missing fields decode as zero values rather than failing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured JSON document (topic message, service args or values)
pub type Document = Value;

/// Typed message that converts to and from a [`Document`]
pub trait RosMessage: Serialize + DeserializeOwned + Default {
    /// ROS type name, e.g. `std_msgs/Int16`
    const TYPE: &'static str;

    fn to_document(&self) -> Document {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Decodes a document; a `null` document yields the zero message
    fn from_document(document: &Document) -> Result<Self, serde_json::Error> {
        if document.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(document)
    }
}

/// Request delivered to an advertised service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    /// Call id to echo back in the `service_response`; `None` for outbound requests
    pub id: Option<String>,
    pub args: Document,
}

impl ServiceRequest {
    pub fn new(args: Document) -> Self {
        Self { id: None, args }
    }
}

/// Response to a service call
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub values: Document,
    /// Whether the service reported success
    pub result: bool,
}

impl ServiceResponse {
    pub fn new(values: Document, result: bool) -> Self {
        Self { values, result }
    }
}

/// `secs`/`nsecs` pair shared by time and duration messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Stamp {
    pub secs: i32,
    pub nsecs: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Time {
    pub data: Stamp,
}

impl RosMessage for Time {
    const TYPE: &'static str = "std_msgs/Time";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Duration {
    pub data: Stamp,
}

impl RosMessage for Duration {
    const TYPE: &'static str = "std_msgs/Duration";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Int16 {
    pub data: i16,
}

impl RosMessage for Int16 {
    const TYPE: &'static str = "std_msgs/Int16";
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiArrayDimension {
    pub label: String,
    pub size: u32,
    pub stride: u32,
}

impl RosMessage for MultiArrayDimension {
    const TYPE: &'static str = "std_msgs/MultiArrayDimension";
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiArrayLayout {
    pub dim: Vec<MultiArrayDimension>,
    pub data_offset: u32,
}

impl RosMessage for MultiArrayLayout {
    const TYPE: &'static str = "std_msgs/MultiArrayLayout";
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Int64MultiArray {
    pub layout: MultiArrayLayout,
    pub data: Vec<i64>,
}

impl RosMessage for Int64MultiArray {
    const TYPE: &'static str = "std_msgs/Int64MultiArray";
}
