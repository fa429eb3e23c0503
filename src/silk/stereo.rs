//! Mid/side stereo prediction for SILK's internal stereo coding.
//!
//! **Simplification** (see DESIGN.md): the reference predicts the side
//! channel from the mid channel with two quantized low-order predictor
//! weights, interpolated across the frame. A single fixed-per-frame weight,
//! quantized the same way [`crate::silk::gains`] quantizes gains, is used
//! here instead.

use crate::decoder_error::DecoderError;
use crate::encoder_error::EncoderError;
use crate::range_coder::{RangeDecoder, RangeEncoder};

const WEIGHT_LEVELS: u32 = 64;

/// Splits a stereo frame into mid (`(l+r)/2`) and side (`(l-r)/2`) channels,
/// returning the side-to-mid prediction weight that best whitens the side
/// channel.
pub(crate) fn encode_stereo(left: &[f32], right: &[f32]) -> (Vec<f32>, Vec<f32>, f32) {
    let mid: Vec<f32> = left.iter().zip(right).map(|(&l, &r)| 0.5 * (l + r)).collect();
    let side: Vec<f32> = left.iter().zip(right).map(|(&l, &r)| 0.5 * (l - r)).collect();

    let mut num = 0.0_f32;
    let mut den = 1e-9_f32;
    for (s, m) in side.iter().zip(mid.iter()) {
        num += s * m;
        den += m * m;
    }
    let weight = (num / den).clamp(-1.0, 1.0);

    let predicted_side: Vec<f32> = side
        .iter()
        .zip(mid.iter())
        .map(|(&s, &m)| s - weight * m)
        .collect();

    (mid, predicted_side, weight)
}

/// Reconstructs left/right PCM from a decoded mid channel, predicted-side
/// residual, and prediction weight.
pub(crate) fn decode_stereo(mid: &[f32], predicted_side: &[f32], weight: f32) -> (Vec<f32>, Vec<f32>) {
    let mut left = Vec::with_capacity(mid.len());
    let mut right = Vec::with_capacity(mid.len());
    for (&m, &ps) in mid.iter().zip(predicted_side.iter()) {
        let side = ps + weight * m;
        left.push(m + side);
        right.push(m - side);
    }
    (left, right)
}

fn weight_to_index(w: f32) -> u32 {
    (((w.clamp(-1.0, 1.0) + 1.0) / 2.0) * (WEIGHT_LEVELS - 1) as f32).round() as u32
}

fn index_to_weight(idx: u32) -> f32 {
    (idx as f32 / (WEIGHT_LEVELS - 1) as f32) * 2.0 - 1.0
}

/// Encodes the side-to-mid prediction weight for one frame.
pub(crate) fn quant_weight(enc: &mut RangeEncoder, weight: f32) -> Result<(), EncoderError> {
    enc.encode_uint(weight_to_index(weight), WEIGHT_LEVELS)
}

/// Decodes the side-to-mid prediction weight for one frame.
pub(crate) fn unquant_weight(dec: &mut RangeDecoder) -> Result<f32, DecoderError> {
    Ok(index_to_weight(dec.decode_uint(WEIGHT_LEVELS)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_stereo_round_trips() {
        let left: Vec<f32> = (0..40).map(|i| (i as f32 * 0.1).sin()).collect();
        let right: Vec<f32> = (0..40).map(|i| (i as f32 * 0.1).sin() * 0.8).collect();

        let (mid, side, weight) = encode_stereo(&left, &right);
        let (l2, r2) = decode_stereo(&mid, &side, weight);

        for i in 0..left.len() {
            assert!((left[i] - l2[i]).abs() < 1e-4);
            assert!((right[i] - r2[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn weight_round_trips_through_range_coder() {
        let mut buf = [0_u8; 16];
        let mut enc = RangeEncoder::new(&mut buf);
        quant_weight(&mut enc, 0.33).unwrap();
        enc.done().unwrap();

        let mut dec = RangeDecoder::new(&buf);
        let w = unquant_weight(&mut dec).unwrap();
        assert!((w - 0.33).abs() < 0.05);
    }
}
