//! # rosbridge protocol
//!
//! Wire-level definitions for the rosbridge JSON protocol.
//!
//! This crate provides:
//! - `Envelope`: the typed form of every protocol message, tagged by `op`
//! - `FrameDecoder`: raw frame to envelope, including PNG-compressed frames
//! - `compression`: PNG packing and unpacking of frames
//! - `messages`: service request/response documents and std message shapes
//! - `ids`: call id generation
//!
//! ## Example
//!
//! ```
//! use rosbridge_protocol::{Envelope, FrameDecoder};
//!
//! let decoder = FrameDecoder::default();
//! let envelope = decoder
//!     .decode(br#"{"op":"publish","topic":"/chatter","msg":{"data":"hi"}}"#)
//!     .unwrap();
//!
//! assert_eq!(envelope.op(), "publish");
//! ```

pub mod compression;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod ids;
pub mod messages;

pub use compression::CompressionType;
pub use envelope::{ops, Auth, Envelope};
pub use error::{ProtocolError, Result};
pub use frame::{FrameDecoder, DEFAULT_MAX_FRAME_BYTES};
pub use ids::{call_id, CallKind, IdGenerator};
pub use messages::{Document, RosMessage, ServiceRequest, ServiceResponse};

/// Identifies one live transport session (one WebSocket connection)
///
/// This is assigned by the transport layer and is independent of the
/// application-chosen identifier a session is registered under.
pub type SessionId = uuid::Uuid;
