//! Band-energy quantization: coarse (Laplace-coded prediction residual) and
//! fine (uniform raw-bit refinement) passes.
//!
//! **Simplification** (see DESIGN.md): the reference conditions its Laplace
//! `fs`/`decay` parameters on a 4-D table indexed by `(LM, intra, band)`
//! built from training data (`eProbModel`). Here `decay`/`fs0` are a small
//! per-band curve instead — still a genuine two-sided-geometric model of the
//! prediction residual, just not tuned against the reference corpus.

use crate::encoder_error::EncoderError;
use crate::range_coder::{RangeDecoder, RangeEncoder};

const COARSE_FS0: u32 = 7000;

/// Laplace decay parameter (Q15) for a given band: lower bands carry more of
/// the signal energy and predict better frame-to-frame, so they get a wider
/// (larger-decay) residual model; higher bands get a narrower one.
fn coarse_decay(band: usize) -> u32 {
    let raw = 24000_i32 - (band as i32) * 700;
    raw.clamp(4000, 24000) as u32
}

/// Coarse-quantizes `log_energy` (one log2-domain value per band) against
/// `prev_energy` (the previous frame's quantized energies; all zero for the
/// first frame, i.e. "intra" coding falls out of the same code path since the
/// prediction is simply zero). Updates `prev_energy` in place with the
/// quantized values and returns them.
pub(crate) fn quant_coarse_energy(
    enc: &mut RangeEncoder,
    log_energy: &[f32],
    prev_energy: &mut [f32],
    end: usize,
) -> Result<Vec<f32>, EncoderError> {
    let mut quantized = vec![0.0_f32; end];
    for b in 0..end {
        let predicted = prev_energy[b];
        let residual = log_energy[b] - predicted;
        let mut qi = residual.round() as i32;
        enc.encode_laplace(&mut qi, COARSE_FS0, coarse_decay(b))?;
        let value = predicted + qi as f32;
        quantized[b] = value;
        prev_energy[b] = value;
    }
    Ok(quantized)
}

/// Inverse of [`quant_coarse_energy`].
pub(crate) fn unquant_coarse_energy(
    dec: &mut RangeDecoder,
    prev_energy: &mut [f32],
    end: usize,
) -> Vec<f32> {
    let mut quantized = vec![0.0_f32; end];
    for b in 0..end {
        let predicted = prev_energy[b];
        let qi = dec.decode_laplace(COARSE_FS0, coarse_decay(b));
        let value = predicted + qi as f32;
        quantized[b] = value;
        prev_energy[b] = value;
    }
    quantized
}

/// Refines each band's quantized energy with `bits` extra raw bits of
/// precision (a uniform stand-in for the reference's dynamically-allocated
/// fine-energy pass).
pub(crate) fn quant_fine_energy(
    enc: &mut RangeEncoder,
    log_energy: &[f32],
    coarse: &mut [f32],
    bits: u32,
) -> Result<(), EncoderError> {
    if bits == 0 {
        return Ok(());
    }
    let steps = 1_u32 << bits;
    for (b, coarse_b) in coarse.iter_mut().enumerate() {
        let frac = (log_energy[b] - *coarse_b + 0.5).clamp(0.0, 0.999_999);
        let q = (frac * steps as f32) as u32;
        enc.encode_bits(q, bits)?;
        *coarse_b += (q as f32 + 0.5) / steps as f32 - 0.5;
    }
    Ok(())
}

/// Inverse of [`quant_fine_energy`].
pub(crate) fn unquant_fine_energy(dec: &mut RangeDecoder, coarse: &mut [f32], bits: u32) {
    if bits == 0 {
        return;
    }
    let steps = 1_u32 << bits;
    for coarse_b in coarse.iter_mut() {
        let q = dec.decode_bits(bits);
        *coarse_b += (q as f32 + 0.5) / steps as f32 - 0.5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_energy_round_trips_through_range_coder() {
        let log_energy = vec![3.2_f32, -1.1, 0.4, 5.6, -2.0];
        let mut buf = [0_u8; 128];

        let mut prev_enc = vec![0.0_f32; 5];
        let mut enc = RangeEncoder::new(&mut buf);
        let quantized_enc =
            quant_coarse_energy(&mut enc, &log_energy, &mut prev_enc, 5).unwrap();
        enc.done().unwrap();
        let nbytes = enc.range_bytes();

        let mut prev_dec = vec![0.0_f32; 5];
        let mut dec = RangeDecoder::new(&buf[..nbytes]);
        let quantized_dec = unquant_coarse_energy(&mut dec, &mut prev_dec, 5);

        for (a, b) in quantized_enc.iter().zip(quantized_dec.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
        for (a, b) in prev_enc.iter().zip(prev_dec.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn fine_energy_improves_precision() {
        let log_energy = vec![3.27_f32];
        let mut coarse_before = vec![3.0_f32];
        let mut buf = [0_u8; 32];
        let mut enc = RangeEncoder::new(&mut buf);
        quant_fine_energy(&mut enc, &log_energy, &mut coarse_before, 4).unwrap();
        enc.done().unwrap();
        let nbytes = enc.range_bytes();

        assert!((coarse_before[0] - log_energy[0]).abs() < 0.05);

        let mut coarse_after = vec![3.0_f32];
        let mut dec = RangeDecoder::new(&buf[..nbytes]);
        unquant_fine_energy(&mut dec, &mut coarse_after, 4);
        assert!((coarse_before[0] - coarse_after[0]).abs() < 1e-5);
    }
}
