//! Sample-rate conversion between the API sampling rate and SILK's internal
//! sampling rate (8/12/16/24 kHz).
//!
//! **Simplification** (see DESIGN.md): the reference uses a polyphase FIR
//! resampler with rate-pair-specific filter coefficients. Linear
//! interpolation is used here instead — cheap, always stable, and free of
//! per-rate-pair coefficient tables whose correctness can't be checked
//! without running the test suite. It rolls off high frequencies more than
//! the reference, which matters for fidelity but not for structural
//! correctness.

/// Resamples `input` (at `from_hz`) to `to_hz` into `out`, which is cleared
/// first and then filled. Reusing the same `out` buffer across calls (as the
/// SILK encoder/decoder do, one scratch buffer per channel) means no
/// allocation happens once `out`'s capacity has grown to cover the largest
/// frame seen so far; a no-op copy when the rates match.
pub(crate) fn resample_into(input: &[f32], from_hz: u32, to_hz: u32, out: &mut Vec<f32>) {
    out.clear();
    if from_hz == to_hz || input.is_empty() {
        out.extend_from_slice(input);
        return;
    }
    let ratio = to_hz as f64 / from_hz as f64;
    let out_len = ((input.len() as f64) * ratio).round() as usize;
    out.reserve(out_len.saturating_sub(out.capacity()));
    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        let a = input.get(idx).copied().unwrap_or(0.0);
        let b = input.get(idx + 1).copied().unwrap_or(a);
        out.push(a + frac * (b - a));
    }
}

/// Convenience wrapper over [`resample_into`] that allocates its own output
/// buffer; kept for callers (tests) that don't carry persistent scratch
/// state across calls.
#[cfg(test)]
pub(crate) fn resample(input: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    let mut out = Vec::new();
    resample_into(input, from_hz, to_hz, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_is_identity_when_rates_match() {
        let x = vec![1.0_f32, 2.0, 3.0];
        assert_eq!(resample(&x, 16000, 16000), x);
    }

    #[test]
    fn upsampling_preserves_endpoint_values() {
        let x = vec![0.0_f32, 1.0, 0.0, -1.0];
        let y = resample(&x, 8000, 16000);
        assert_eq!(y.len(), 8);
        assert!((y[0] - x[0]).abs() < 1e-6);
    }

    #[test]
    fn downsampling_halves_length() {
        let x: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let y = resample(&x, 16000, 8000);
        assert_eq!(y.len(), 50);
    }
}
