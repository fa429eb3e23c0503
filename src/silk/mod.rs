//! Implements the SILK codec half of Opus: linear-prediction speech coding
//! with long-term (pitch) prediction, adaptive gain control, and a
//! noise-shaping quantizer.

#[cfg(feature = "decoder")]
pub(crate) use decoder::{LostFlag, SilkDecoder};
#[cfg(feature = "encoder")]
pub(crate) use encoder::SilkEncoder;

#[cfg(feature = "decoder")]
mod decoder;
#[cfg(feature = "encoder")]
mod encoder;
pub(crate) mod gains;
pub(crate) mod lpc;
pub(crate) mod ltp;
pub(crate) mod nlsf;
pub(crate) mod nsq;
pub(crate) mod resampler;
pub(crate) mod stereo;
