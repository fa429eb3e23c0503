//! Pyramid vector quantization (`alg_quant`/`alg_unquant`) of a normalized
//! band, coded through the combinatorial index in [`crate::celt::cwrs`].

use crate::celt::cwrs;
use crate::encoder_error::EncoderError;
use crate::range_coder::{RangeDecoder, RangeEncoder};

/// Greedily places `k` unit pulses (with sign) across `x` to approximate its
/// direction, maximizing `(x . y) / |y|` at each step. This is the standard
/// greedy PVQ search the reference also performs (`spec.md` §4.2 step 11).
pub(crate) fn alg_quant(x: &[f32], k: u32) -> Vec<i32> {
    let n = x.len();
    let mut y = vec![0_i32; n];
    if k == 0 || n == 0 {
        return y;
    }

    let mut xy = 0.0_f32;
    let mut yy = 0.0_f32;

    for _ in 0..k {
        let mut best_i = 0;
        let mut best_score = f32::NEG_INFINITY;
        for i in 0..n {
            let sign: f32 = if x[i] >= 0.0 { 1.0 } else { -1.0 };
            let new_xy = xy + sign * x[i];
            let new_yy = yy + 2.0 * sign * y[i] as f32 + 1.0;
            let score = if new_yy > 0.0 {
                (new_xy * new_xy) / new_yy
            } else {
                0.0
            };
            if score > best_score {
                best_score = score;
                best_i = i;
            }
        }

        let sign: i32 = if x[best_i] >= 0.0 { 1 } else { -1 };
        yy += 2.0 * sign as f32 * y[best_i] as f32 + 1.0;
        xy += sign as f32 * x[best_i];
        y[best_i] += sign;
    }

    y
}

/// Normalizes a pulse vector back to unit energy.
pub(crate) fn alg_unquant(y: &[i32]) -> Vec<f32> {
    let norm: f32 = y
        .iter()
        .map(|&v| (v as f32) * (v as f32))
        .sum::<f32>()
        .sqrt();
    if norm == 0.0 {
        return vec![0.0; y.len()];
    }
    y.iter().map(|&v| v as f32 / norm).collect()
}

/// `count(n, k)` capped so the result fits the range coder's `u32` alphabet
/// size; if it doesn't, `k` is reduced until it does. Real per-band pulse
/// budgets (see `celt::mode::pulse_cap`) are chosen small enough that this
/// essentially never triggers, but it guards against the simplified
/// allocator handing PVQ an unreasonably large `k` for a small `n`.
fn clamp_k_for_index_space(n: usize, mut k: u32) -> u32 {
    while k > 0 && cwrs::count(n, k) > u64::from(u32::MAX) {
        k -= 1;
    }
    k
}

/// Quantizes and entropy-codes one normalized band. Returns the reconstructed
/// (quantized) unit vector, which the caller feeds back into its running
/// synthesis so encoder and decoder stay bit-identical.
pub(crate) fn quant_band(
    enc: &mut RangeEncoder,
    x: &[f32],
    k: u32,
) -> Result<Vec<f32>, EncoderError> {
    let n = x.len();
    let k = clamp_k_for_index_space(n, k);
    let y = alg_quant(x, k);
    let total = cwrs::count(n, k);
    if total > 1 {
        let index = cwrs::encode_pulses(&y);
        enc.encode_uint(index as u32, total as u32)?;
    }
    Ok(alg_unquant(&y))
}

/// Decodes and reconstructs one normalized band of width `n` coded with `k`
/// pulses.
pub(crate) fn unquant_band(dec: &mut RangeDecoder, n: usize, k: u32) -> Vec<f32> {
    let k = clamp_k_for_index_space(n, k);
    let total = cwrs::count(n, k);
    if total <= 1 {
        return vec![0.0; n];
    }
    let index = u64::from(dec.decode_uint(total as u32));
    let y = cwrs::decode_pulses(n, k, index);
    alg_unquant(&y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alg_quant_produces_k_pulses() {
        let x = [0.8, -0.2, 0.5, -0.1];
        let y = alg_quant(&x, 5);
        let total: u32 = y.iter().map(|v| v.unsigned_abs()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn alg_quant_favours_largest_magnitude_dimension() {
        let x = [0.9, 0.01, -0.01, 0.0];
        let y = alg_quant(&x, 1);
        assert_eq!(y, vec![1, 0, 0, 0]);
    }

    #[test]
    fn unquant_is_unit_norm() {
        let y = vec![2, -1, 0, 1];
        let x = alg_unquant(&y);
        let norm: f32 = x.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn encode_decode_round_trip_through_range_coder() {
        let n = 5;
        let k = 4;
        let x = [0.9, -0.3, 0.1, 0.05, -0.6];

        let mut buf = [0_u8; 64];
        let y_expected = alg_quant(&x, k);
        let mut enc = RangeEncoder::new(&mut buf);
        quant_band(&mut enc, &x, k).unwrap();
        enc.done().unwrap();
        let nbytes = enc.range_bytes();

        let mut dec = RangeDecoder::new(&buf[..nbytes]);
        let k_clamped = clamp_k_for_index_space(n, k);
        let total = cwrs::count(n, k_clamped);
        let index = if total > 1 {
            u64::from(dec.decode_uint(total as u32))
        } else {
            0
        };
        let y_decoded = cwrs::decode_pulses(n, k_clamped, index);
        assert_eq!(y_decoded, y_expected);
    }
}
