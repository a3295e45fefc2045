//! Inbound frame decoding
//!
//! Turns the raw bytes of a transport frame into a typed [`Envelope`],
//! transparently unwrapping PNG-compressed frames. Every failure is returned
//! as a [`ProtocolError`]; the caller decides how to report and drop it.

use crate::compression::decompress_png;
use crate::envelope::Envelope;
use crate::error::{ProtocolError, Result};

/// Default upper bound on a single frame, compressed or not (16 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Decodes raw transport frames into envelopes
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    max_frame_bytes: usize,
}

impl FrameDecoder {
    /// Creates a decoder that rejects frames larger than `max_frame_bytes`
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    /// Decodes one frame
    ///
    /// A `png` envelope is unwrapped exactly once; the inner envelope is
    /// returned as if it had arrived uncompressed.
    pub fn decode(&self, raw: &[u8]) -> Result<Envelope> {
        self.check_size(raw.len())?;

        match Envelope::from_slice(raw)? {
            Envelope::Png { data } => self.decode_compressed(&data),
            envelope => Ok(envelope),
        }
    }

    fn decode_compressed(&self, data: &str) -> Result<Envelope> {
        let inner = decompress_png(data)?;
        self.check_size(inner.len())?;

        tracing::trace!(inner_len = inner.len(), "Unwrapped PNG-compressed frame");

        match Envelope::from_slice(&inner)? {
            Envelope::Png { .. } => Err(ProtocolError::NestedCompression),
            envelope => Ok(envelope),
        }
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_frame_bytes {
            return Err(ProtocolError::FrameTooLarge {
                size,
                limit: self.max_frame_bytes,
            });
        }
        Ok(())
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::compress_png;
    use serde_json::json;

    fn png_frame(inner: &[u8]) -> Vec<u8> {
        let data = compress_png(inner).unwrap();
        serde_json::to_vec(&json!({"op": "png", "data": data})).unwrap()
    }

    #[test]
    fn test_plain_frame() {
        let decoder = FrameDecoder::default();
        let envelope = decoder
            .decode(br#"{"op":"publish","topic":"t","msg":{"a":1}}"#)
            .unwrap();
        assert!(matches!(envelope, Envelope::Publish { ref topic, .. } if topic == "t"));
    }

    #[test]
    fn test_compressed_frame_matches_plain() {
        let inner = br#"{"op":"publish","topic":"t","msg":{"a":1}}"#;
        let decoder = FrameDecoder::default();

        let direct = decoder.decode(inner).unwrap();
        let unwrapped = decoder.decode(&png_frame(inner)).unwrap();

        assert_eq!(direct, unwrapped);
    }

    #[test]
    fn test_compressed_frame_with_bad_payload() {
        let decoder = FrameDecoder::default();

        let frame = br#"{"op":"png","data":"%%%"}"#;
        assert!(matches!(decoder.decode(frame), Err(ProtocolError::InvalidBase64(_))));

        let frame = png_frame(b"this is not json");
        assert!(matches!(decoder.decode(&frame), Err(ProtocolError::InvalidJson(_))));
    }

    #[test]
    fn test_compressed_frame_missing_data() {
        let decoder = FrameDecoder::default();
        assert!(matches!(
            decoder.decode(br#"{"op":"png"}"#),
            Err(ProtocolError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn test_nested_compression_rejected() {
        let decoder = FrameDecoder::default();
        let once = png_frame(br#"{"op":"publish","topic":"t","msg":{}}"#);
        let twice = png_frame(&once);
        assert!(matches!(decoder.decode(&twice), Err(ProtocolError::NestedCompression)));
    }

    #[test]
    fn test_frame_too_large() {
        let decoder = FrameDecoder::new(16);
        let result = decoder.decode(br#"{"op":"publish","topic":"t","msg":{}}"#);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { limit: 16, .. })));
    }
}
