//! Per-band energy computation, normalization, and mid/side stereo coupling.

use crate::celt::mode;
use crate::math::fast_log2;

/// Computes the (linear) RMS energy of each band in `x` (length = last edge
/// of `edges`), for bands `0..end`.
pub(crate) fn compute_band_energies(x: &[f32], edges: &[u16], end: usize) -> Vec<f32> {
    (0..end)
        .map(|b| {
            let lo = edges[b] as usize;
            let hi = edges[b + 1] as usize;
            let sum_sq: f32 = x[lo..hi].iter().map(|v| v * v).sum();
            (sum_sq + 1e-27).sqrt()
        })
        .collect()
}

/// Normalizes each band of `x` in place to unit energy, returning the
/// log2-domain band energies that were divided out (needed by the energy
/// quantizer).
pub(crate) fn normalize_bands(x: &mut [f32], edges: &[u16], end: usize) -> Vec<f32> {
    let energies = compute_band_energies(x, edges, end);
    for (b, &energy) in energies.iter().enumerate() {
        let lo = edges[b] as usize;
        let hi = edges[b + 1] as usize;
        let inv = 1.0 / energy;
        for v in x[lo..hi].iter_mut() {
            *v *= inv;
        }
    }
    energies.iter().map(|&e| fast_log2(e)).collect()
}

/// Denormalizes bands in place, scaling each band by `2^log_energy[b]`.
pub(crate) fn denormalize_bands(x: &mut [f32], edges: &[u16], end: usize, log_energy: &[f32]) {
    for (b, &le) in log_energy.iter().enumerate().take(end) {
        let lo = edges[b] as usize;
        let hi = edges[b + 1] as usize;
        let scale = crate::math::fast_exp2(le);
        for v in x[lo..hi].iter_mut() {
            *v *= scale;
        }
    }
}

/// Splits an interleaved-by-channel pair of spectra into mid/side using the
/// standard `(l+r)/2`, `(l-r)/2` rotation (orthonormal, energy preserving up
/// to the factor folded into the quantizer gains).
pub(crate) fn stereo_mid_side(left: &[f32], right: &[f32]) -> (Vec<f32>, Vec<f32>) {
    debug_assert_eq!(left.len(), right.len());
    let mid: Vec<f32> = left
        .iter()
        .zip(right.iter())
        .map(|(&l, &r)| 0.5 * (l + r))
        .collect();
    let side: Vec<f32> = left
        .iter()
        .zip(right.iter())
        .map(|(&l, &r)| 0.5 * (l - r))
        .collect();
    (mid, side)
}

/// Inverse of [`stereo_mid_side`].
pub(crate) fn stereo_left_right(mid: &[f32], side: &[f32]) -> (Vec<f32>, Vec<f32>) {
    debug_assert_eq!(mid.len(), side.len());
    let left: Vec<f32> = mid.iter().zip(side.iter()).map(|(&m, &s)| m + s).collect();
    let right: Vec<f32> = mid.iter().zip(side.iter()).map(|(&m, &s)| m - s).collect();
    (left, right)
}

/// Band edges for the given LM, truncated/extended to `mode::NUM_BANDS + 1`
/// entries, clamped so the last edge never exceeds `frame_size`.
pub(crate) fn band_edges(lm: usize, frame_size: usize) -> Vec<u16> {
    mode::ebands(lm)
        .iter()
        .map(|&e| e.min(frame_size as u16))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_then_denormalize_round_trips() {
        let edges: Vec<u16> = vec![0, 4, 8];
        let mut x = vec![1.0, 2.0, -1.0, 0.5, 3.0, -2.0, 1.0, 0.0];
        let original = x.clone();
        let log_energy = normalize_bands(&mut x, &edges, 2);

        // Each band should now be unit energy.
        for b in 0..2 {
            let lo = edges[b] as usize;
            let hi = edges[b + 1] as usize;
            let e: f32 = x[lo..hi].iter().map(|v| v * v).sum();
            assert!((e.sqrt() - 1.0).abs() < 1e-4);
        }

        denormalize_bands(&mut x, &edges, 2, &log_energy);
        for (a, b) in x.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn mid_side_round_trips() {
        let left = vec![1.0, 2.0, -3.0];
        let right = vec![0.5, -1.0, 3.0];
        let (mid, side) = stereo_mid_side(&left, &right);
        let (l2, r2) = stereo_left_right(&mid, &side);
        for i in 0..3 {
            assert!((l2[i] - left[i]).abs() < 1e-5);
            assert!((r2[i] - right[i]).abs() < 1e-5);
        }
    }
}
