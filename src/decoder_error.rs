//! Decoder errors.

/// Errors thrown by the decoder.
#[derive(Debug)]
pub enum DecoderError {
    /// The packet is malformed (bad TOC, size, or frame count byte).
    InvalidPacket,
    /// The supplied sampling rate is not one of the rates Opus defines.
    InvalidSampleRate,
    /// The supplied channel count is neither mono nor stereo.
    InvalidChannels,
    /// The packet's frame count byte described an unsupported frame count.
    InvalidFrameCount,
    /// The output buffer cannot hold a full decoded frame.
    BufferTooSmall,
    /// An argument was out of the range the API documents.
    InvalidArgument(&'static str),
    /// An internal decoder error.
    InternalError(&'static str),
}

impl std::fmt::Display for DecoderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderError::InvalidPacket => write!(f, "malformed Opus packet"),
            DecoderError::InvalidSampleRate => write!(f, "invalid sampling rate"),
            DecoderError::InvalidChannels => write!(f, "invalid channel count"),
            DecoderError::InvalidFrameCount => write!(f, "invalid frame count"),
            DecoderError::BufferTooSmall => write!(f, "output buffer is too small"),
            DecoderError::InvalidArgument(message) => write!(f, "{}", message),
            DecoderError::InternalError(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for DecoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
