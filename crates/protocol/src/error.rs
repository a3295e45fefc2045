use thiserror::Error;

/// Errors raised while turning a raw frame into an [`Envelope`](crate::Envelope)
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing or non-string op field")]
    MissingOp,

    #[error("Unrecognized op code: {0}")]
    UnrecognizedOp(String),

    #[error("Malformed {op} envelope: {reason}")]
    MalformedEnvelope { op: String, reason: String },

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Raster of {len} bytes does not fit a {width}x{height} RGB image")]
    InvalidRaster { len: usize, width: u32, height: u32 },

    #[error("Compressed frame wraps another compressed frame")]
    NestedCompression,

    #[error("Frame too large: {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },
}

impl ProtocolError {
    /// Whether the frame parsed fine but carried an op this side does not route
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, ProtocolError::UnrecognizedOp(_))
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
