//! Implements the CELT (Constrained Energy Lapped Transform) codec half of
//! Opus: MDCT analysis/synthesis, band-energy quantization, PVQ spectral
//! quantization, and the pitch postfilter.

#[cfg(feature = "decoder")]
pub(crate) use decoder::CeltDecoder;
#[cfg(feature = "encoder")]
pub(crate) use encoder::CeltEncoder;

pub(crate) mod bands;
mod comb_filter;
pub(crate) mod cwrs;
#[cfg(feature = "decoder")]
mod decoder;
#[cfg(feature = "encoder")]
mod encoder;
pub(crate) mod mdct;
pub(crate) mod mode;
pub(crate) mod pitch;
pub(crate) mod pvq;
pub(crate) mod quant_bands;
pub(crate) mod rate;
pub(crate) mod tf;
