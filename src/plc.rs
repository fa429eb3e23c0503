//! Packet loss concealment: generates a plausible continuation of the
//! signal when a packet is missing, instead of silence or a discontinuity.
//!
//! CELT PLC extrapolates the last frame's spectral shape and lets the
//! comb-filter postfilter's periodicity carry the pitch forward while the
//! energy decays; SILK PLC (implemented directly in
//! [`crate::silk::decoder::SilkDecoder::decode`]) extrapolates the last
//! voiced excitation through the long-term predictor with the same decay.
//! Both converge to silence rather than looping forever, since a real gap
//! is rarely longer than a few frames.

/// Per-frame energy decay applied to concealed output, tuned so that ~10
/// consecutive lost frames (200 ms at 20 ms/frame) fade to silence.
const DECAY_PER_FRAME: f32 = 0.8;

/// Conceals one lost CELT frame by decaying and replaying `last_frame`
/// (the previous frame's reconstructed time-domain samples), scaled by how
/// many consecutive frames have already been concealed.
pub(crate) fn conceal_celt(last_frame: &[f32], consecutive_losses: u32) -> Vec<f32> {
    let decay = DECAY_PER_FRAME.powi(consecutive_losses as i32);
    last_frame.iter().map(|&s| s * decay).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concealment_energy_is_bounded_and_decaying() {
        let last = vec![0.5_f32; 32];
        let first = conceal_celt(&last, 1);
        let later = conceal_celt(&last, 5);

        let energy = |x: &[f32]| x.iter().map(|v| v * v).sum::<f32>();
        assert!(energy(&first) <= energy(&last));
        assert!(energy(&later) < energy(&first));
    }

    #[test]
    fn concealment_never_amplifies_signal() {
        let last = vec![1.0_f32; 16];
        for losses in 0..20 {
            let out = conceal_celt(&last, losses);
            assert!(out.iter().all(|&v| v.abs() <= 1.0));
        }
    }
}
