//! Implements the CELT encoder.

use crate::celt::comb_filter::comb_filter_inplace;
use crate::celt::mdct::Mdct;
use crate::celt::pitch::search_pitch;
use crate::celt::{bands, mode, quant_bands, rate, tf};
use crate::encoder_error::EncoderError;
use crate::range_coder::{RangeEncoder, Tell};
use crate::{Channels, SamplingRate};

const PREEMPHASIS: f32 = 0.85_f32;

/// Per-channel persistent encoder state (pre-emphasis and MDCT history).
#[derive(Clone, Debug, Default)]
struct ChannelState {
    preemph_mem: f32,
    history: Vec<f32>,
    prev_energy: Vec<f32>,
    postfilter_period: usize,
}

/// The CELT encoder.
#[derive(Clone, Debug)]
pub(crate) struct CeltEncoder {
    channels: Channels,
    sampling_rate: SamplingRate,
    channel_state: Vec<ChannelState>,
    last_frame_size: usize,
}

impl CeltEncoder {
    /// Creates a new CELT encoder.
    pub(crate) fn new(sampling_rate: SamplingRate, channels: Channels) -> Result<Self, EncoderError> {
        let n = channels as usize;
        Ok(Self {
            channels,
            sampling_rate,
            channel_state: vec![ChannelState::default(); n],
            last_frame_size: 0,
        })
    }

    /// Resets the encoder to its freshly-initialized state.
    pub(crate) fn reset(&mut self) -> Result<(), EncoderError> {
        for ch in self.channel_state.iter_mut() {
            *ch = ChannelState::default();
        }
        self.last_frame_size = 0;
        Ok(())
    }

    /// Pitch period (in samples at 48 kHz) detected during the last encode.
    pub(crate) fn pitch(&self) -> u32 {
        self.channel_state
            .first()
            .map(|c| c.postfilter_period as u32)
            .unwrap_or(0)
    }

    fn ensure_frame_size(&mut self, frame_size: usize) {
        if self.last_frame_size != frame_size {
            for ch in self.channel_state.iter_mut() {
                ch.history = vec![0.0; frame_size];
            }
            self.last_frame_size = frame_size;
        }
    }

    /// Encodes one CELT frame (all channels, interleaved per-channel slices)
    /// of `frame_size` samples each into `enc`, spending at most `total_bits`
    /// bits of PVQ budget (beyond the mandatory energy coding), covering
    /// bands `start_band..end_band`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn encode(
        &mut self,
        enc: &mut RangeEncoder,
        pcm: &[Vec<f32>],
        frame_size: usize,
        start_band: usize,
        end_band: usize,
        total_bits: u32,
    ) -> Result<(), EncoderError> {
        self.ensure_frame_size(frame_size);
        let lm = mode::lm_for_frame_size(frame_size);
        let edges = bands::band_edges(lm, frame_size);
        let end = end_band.min(mode::NUM_BANDS);

        let mut spectra: Vec<Vec<f32>> = Vec::with_capacity(pcm.len());
        let mut is_transient = false;

        for (ch, samples) in pcm.iter().enumerate() {
            let state = &mut self.channel_state[ch];
            if state.prev_energy.len() != mode::NUM_BANDS {
                state.prev_energy = vec![0.0; mode::NUM_BANDS];
            }

            // Pre-emphasis.
            let mut y = vec![0.0_f32; frame_size];
            let mut prev = state.preemph_mem;
            for (i, &x) in samples.iter().enumerate() {
                y[i] = x - PREEMPHASIS * prev;
                prev = x;
            }
            state.preemph_mem = prev;

            if tf::detect_transient(&y) {
                is_transient = true;
            }

            // Windowed 2N block: [history | current].
            let mut block = vec![0.0_f32; 2 * frame_size];
            block[..frame_size].copy_from_slice(&state.history);
            block[frame_size..].copy_from_slice(&y);
            for (i, v) in block.iter_mut().enumerate() {
                *v *= Mdct::window_coeff(i, frame_size);
            }
            state.history = y;

            // Pitch search for the postfilter, grounded on the previous
            // reconstructed history (autocorrelation peak-pick).
            state.postfilter_period = search_pitch(&block[frame_size..]);

            let mdct = Mdct::new(frame_size);
            let mut freq = vec![0.0_f32; frame_size];
            mdct.forward(&block, &mut freq);
            spectra.push(freq);
        }

        enc.encode_bit_logp(u32::from(is_transient), 3)?;

        for (ch, freq) in spectra.iter_mut().enumerate() {
            let log_energy = bands::normalize_bands(freq, &edges, end);
            let state = &mut self.channel_state[ch];
            let coarse =
                quant_bands::quant_coarse_energy(enc, &log_energy, &mut state.prev_energy, end)?;
            let mut coarse = coarse;
            quant_bands::quant_fine_energy(enc, &log_energy, &mut coarse, 2)?;

            let widths: Vec<usize> = (start_band..end)
                .map(|b| (edges[b + 1] - edges[b]) as usize)
                .collect();
            let trim = if is_transient { -1 } else { 0 };
            let pulses = rate::allocate_pulses(&widths, lm, total_bits, trim);

            for (i, &b) in (start_band..end).enumerate() {
                let lo = edges[b] as usize;
                let hi = edges[b + 1] as usize;
                if hi <= lo {
                    continue;
                }
                let spread = tf::spreading_decision(&freq[lo..hi]);
                let _ = spread;
                let reconstructed = crate::celt::pvq::quant_band(enc, &freq[lo..hi], pulses[i])?;
                freq[lo..hi].copy_from_slice(&reconstructed);
            }
        }

        Ok(())
    }

    /// Applies the pitch postfilter to a just-synthesized time-domain block,
    /// in place, using the period detected for channel 0 during [`encode`].
    pub(crate) fn apply_postfilter(&self, pcm: &mut [f32]) {
        let Some(state) = self.channel_state.first() else {
            return;
        };
        let period = state.postfilter_period;
        if period == 0 || pcm.len() <= period + 2 {
            return;
        }
        comb_filter_inplace(pcm, period + 2, period, period, pcm.len() - period - 2, 0.15, 0.15, 0, 0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_runs_without_error_on_silence() {
        let mut enc_state = CeltEncoder::new(SamplingRate::Hz48000, Channels::Mono).unwrap();
        let mut buf = [0_u8; 256];
        let mut rc = RangeEncoder::new(&mut buf);
        let pcm = vec![vec![0.0_f32; 120]];
        enc_state
            .encode(&mut rc, &pcm, 120, 0, 21, 200)
            .unwrap();
        rc.done().unwrap();
        assert!(rc.range_bytes() > 0);
    }
}
