use crate::compression::CompressionType;
use crate::error::{ProtocolError, Result};
use crate::messages::Document;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Op codes carried in the `op` field of every envelope
pub mod ops {
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const ADVERTISE: &str = "advertise";
    pub const UNADVERTISE: &str = "unadvertise";
    pub const PUBLISH: &str = "publish";
    pub const CALL_SERVICE: &str = "call_service";
    pub const SERVICE_RESPONSE: &str = "service_response";
    pub const ADVERTISE_SERVICE: &str = "advertise_service";
    pub const UNADVERTISE_SERVICE: &str = "unadvertise_service";
    pub const AUTH: &str = "auth";
    /// Sentinel for a PNG-compressed frame wrapping another envelope
    pub const PNG: &str = "png";

    pub const ALL: [&str; 11] = [
        SUBSCRIBE,
        UNSUBSCRIBE,
        ADVERTISE,
        UNADVERTISE,
        PUBLISH,
        CALL_SERVICE,
        SERVICE_RESPONSE,
        ADVERTISE_SERVICE,
        UNADVERTISE_SERVICE,
        AUTH,
        PNG,
    ];
}

/// One rosbridge protocol message, decoded once at the boundary
///
/// The wire form is a JSON object whose `op` field selects the variant:
///
/// ```text
/// {"op":"publish","topic":"/chatter","msg":{"data":"hi"}}
/// {"op":"service_response","id":"call_service:/add:3","values":{"sum":5},"result":true}
/// ```
///
/// Optional fields carry their protocol defaults: a `service_response` without
/// `result` is a success, and absent `args`/`values` decode as an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Envelope {
    Subscribe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(rename = "type")]
        msg_type: String,
        topic: String,
        #[serde(default)]
        compression: CompressionType,
        #[serde(default)]
        throttle_rate: u32,
    },
    Unsubscribe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        topic: String,
    },
    Advertise {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(rename = "type")]
        msg_type: String,
        topic: String,
    },
    Unadvertise {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        topic: String,
    },
    Publish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        topic: String,
        msg: Document,
    },
    CallService {
        id: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        service_type: Option<String>,
        service: String,
        #[serde(default = "empty_document")]
        args: Document,
    },
    ServiceResponse {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service: Option<String>,
        #[serde(default = "empty_document")]
        values: Document,
        #[serde(default = "success", deserialize_with = "lenient_bool")]
        result: bool,
    },
    AdvertiseService {
        #[serde(rename = "type")]
        service_type: String,
        service: String,
    },
    UnadvertiseService {
        service: String,
    },
    Auth(Auth),
    Png {
        data: String,
    },
}

/// Fields of the `auth` op (MAC-based rosauth handshake)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auth {
    pub mac: String,
    pub client: String,
    pub dest: String,
    pub rand: String,
    pub t: i64,
    pub level: String,
    pub end: i64,
}

fn empty_document() -> Document {
    Value::Object(serde_json::Map::new())
}

fn success() -> bool {
    true
}

/// Accepts `true`/`false` as well as their string spellings; some bridges
/// send `"result":"false"`.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrText {
        Bool(bool),
        Text(String),
    }

    Ok(match BoolOrText::deserialize(deserializer)? {
        BoolOrText::Bool(value) => value,
        BoolOrText::Text(text) => text.eq_ignore_ascii_case("true"),
    })
}

impl Envelope {
    /// Returns the op code of this envelope
    pub fn op(&self) -> &'static str {
        match self {
            Envelope::Subscribe { .. } => ops::SUBSCRIBE,
            Envelope::Unsubscribe { .. } => ops::UNSUBSCRIBE,
            Envelope::Advertise { .. } => ops::ADVERTISE,
            Envelope::Unadvertise { .. } => ops::UNADVERTISE,
            Envelope::Publish { .. } => ops::PUBLISH,
            Envelope::CallService { .. } => ops::CALL_SERVICE,
            Envelope::ServiceResponse { .. } => ops::SERVICE_RESPONSE,
            Envelope::AdvertiseService { .. } => ops::ADVERTISE_SERVICE,
            Envelope::UnadvertiseService { .. } => ops::UNADVERTISE_SERVICE,
            Envelope::Auth(_) => ops::AUTH,
            Envelope::Png { .. } => ops::PNG,
        }
    }

    /// Decodes an envelope from an already-parsed JSON document
    ///
    /// An unknown `op` yields [`ProtocolError::UnrecognizedOp`]; a known op with
    /// missing or mistyped fields yields [`ProtocolError::MalformedEnvelope`].
    pub fn from_value(value: Value) -> Result<Self> {
        let op = match value.get("op").and_then(Value::as_str) {
            Some(op) => op.to_owned(),
            None => return Err(ProtocolError::MissingOp),
        };

        if !ops::ALL.contains(&op.as_str()) {
            return Err(ProtocolError::UnrecognizedOp(op));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::MalformedEnvelope {
            op,
            reason: e.to_string(),
        })
    }

    /// Parses JSON text into an envelope
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(data)?;
        Self::from_value(value)
    }

    /// Serializes the envelope to JSON text
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// The call id carried by this envelope, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Envelope::Subscribe { id, .. }
            | Envelope::Unsubscribe { id, .. }
            | Envelope::Advertise { id, .. }
            | Envelope::Unadvertise { id, .. }
            | Envelope::Publish { id, .. } => id.as_deref(),
            Envelope::CallService { id, .. } | Envelope::ServiceResponse { id, .. } => Some(id),
            _ => None,
        }
    }
}
