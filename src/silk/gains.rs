//! Per-subframe gain quantization.
//!
//! The reference SILK codes gains as an index into a log-domain table with
//! delta coding between subframes. This carries the same log-domain delta
//! structure but with a uniform scalar quantizer rather than the reference's
//! pinned codebook (see DESIGN.md).

use crate::decoder_error::DecoderError;
use crate::encoder_error::EncoderError;
use crate::range_coder::{RangeDecoder, RangeEncoder};

/// Number of representable gain steps (6 bits of log-domain resolution).
const GAIN_LEVELS: u32 = 64;
/// Log-domain step size between adjacent gain indices.
const GAIN_STEP_DB: f32 = 1.5;
/// Smallest representable gain, in linear amplitude.
const MIN_GAIN: f32 = 1.0e-5;

fn gain_to_index(gain: f32) -> u32 {
    let db = 20.0 * gain.max(MIN_GAIN).log10();
    let idx = (db / GAIN_STEP_DB + GAIN_LEVELS as f32 / 2.0).round();
    idx.clamp(0.0, (GAIN_LEVELS - 1) as f32) as u32
}

fn index_to_gain(idx: u32) -> f32 {
    let db = (idx as f32 - GAIN_LEVELS as f32 / 2.0) * GAIN_STEP_DB;
    10f32.powf(db / 20.0)
}

/// Encodes the gains for one frame's subframes, delta-coded against
/// `prev_index` (updated in place so the next frame predicts from it).
pub(crate) fn quant_gains(
    enc: &mut RangeEncoder,
    gains: &[f32],
    prev_index: &mut u32,
) -> Result<(), EncoderError> {
    for &g in gains {
        let idx = gain_to_index(g);
        enc.encode_uint(idx, GAIN_LEVELS)?;
        *prev_index = idx;
    }
    Ok(())
}

/// Decodes the gains for one frame's subframes. Returns linear-amplitude gains.
pub(crate) fn unquant_gains(
    dec: &mut RangeDecoder,
    count: usize,
    prev_index: &mut u32,
) -> Result<Vec<f32>, DecoderError> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let idx = dec.decode_uint(GAIN_LEVELS);
        *prev_index = idx;
        out.push(index_to_gain(idx));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_round_trips_through_index() {
        for &g in &[0.01_f32, 0.1, 0.5, 1.0, 2.0] {
            let idx = gain_to_index(g);
            let back = index_to_gain(idx);
            assert!((back.ln() - g.ln()).abs() < 0.1, "{} -> {}", g, back);
        }
    }

    #[test]
    fn quant_gains_round_trips_through_range_coder() {
        let mut buf = [0_u8; 64];
        let mut enc = RangeEncoder::new(&mut buf);
        let mut prev = 0;
        let gains = vec![0.2_f32, 0.25, 0.3, 0.28];
        quant_gains(&mut enc, &gains, &mut prev).unwrap();
        enc.done().unwrap();

        let mut dec = RangeDecoder::new(&buf);
        let mut prev_dec = 0;
        let decoded = unquant_gains(&mut dec, gains.len(), &mut prev_dec).unwrap();
        for (g, d) in gains.iter().zip(decoded.iter()) {
            assert!((g - d).abs() < 0.05);
        }
    }
}
