//! Encoder errors.

/// Errors thrown by the encoder.
#[derive(Debug)]
pub enum EncoderError {
    /// The output buffer is too small.
    BufferToSmall,
    /// The requested sampling rate is not one of the rates Opus defines.
    InvalidSampleRate,
    /// The requested channel count is neither mono nor stereo.
    InvalidChannels,
    /// The requested bitrate is outside Opus's supported range.
    InvalidBitrate,
    /// The requested frame size does not correspond to a valid Opus frame duration.
    InvalidFrameSize,
    /// The encoded frame would not fit in the caller-supplied packet buffer.
    PacketTooLarge,
    /// An argument was out of the range the API documents.
    InvalidArgument(&'static str),
    /// An internal encoder error.
    InternalError(&'static str),
}

impl std::fmt::Display for EncoderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderError::BufferToSmall => write!(f, "output buffer is too small"),
            EncoderError::InvalidSampleRate => write!(f, "invalid sampling rate"),
            EncoderError::InvalidChannels => write!(f, "invalid channel count"),
            EncoderError::InvalidBitrate => write!(f, "invalid bitrate"),
            EncoderError::InvalidFrameSize => write!(f, "invalid frame size"),
            EncoderError::PacketTooLarge => write!(f, "encoded packet exceeds the supplied buffer"),
            EncoderError::InvalidArgument(message) => write!(f, "{}", message),
            EncoderError::InternalError(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for EncoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
