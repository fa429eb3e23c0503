//! Implements the CELT decoder.

use crate::celt::comb_filter::comb_filter_inplace;
use crate::celt::mdct::Mdct;
use crate::celt::pitch::search_pitch;
use crate::celt::{bands, mode, pvq, quant_bands, rate};
use crate::range_coder::{RangeDecoder, Tell};
use crate::{Channels, DecoderError, SamplingRate};

const DEEMPHASIS: f32 = 0.85_f32;

#[derive(Clone, Debug, Default)]
struct ChannelState {
    deemph_mem: f32,
    overlap_tail: Vec<f32>,
    prev_energy: Vec<f32>,
    postfilter_period: usize,
}

/// The CELT decoder.
#[derive(Clone, Debug)]
pub(crate) struct CeltDecoder {
    channels: Channels,
    sampling_rate: SamplingRate,
    channel_state: Vec<ChannelState>,
    last_frame_size: usize,
}

impl CeltDecoder {
    /// Creates a new CELT decoder.
    pub(crate) fn new(
        sampling_rate: SamplingRate,
        channels: Channels,
    ) -> Result<Self, DecoderError> {
        let n = channels as usize;
        Ok(Self {
            channels,
            sampling_rate,
            channel_state: vec![ChannelState::default(); n],
            last_frame_size: 0,
        })
    }

    /// Resets the CELT decoder.
    pub(crate) fn reset(&mut self) -> Result<(), DecoderError> {
        for ch in self.channel_state.iter_mut() {
            *ch = ChannelState::default();
        }
        self.last_frame_size = 0;
        Ok(())
    }

    /// Gets the pitch of the last decoded frame.
    pub(crate) fn pitch(&self) -> u32 {
        self.channel_state
            .first()
            .map(|c| c.postfilter_period as u32)
            .unwrap_or(0)
    }

    fn ensure_frame_size(&mut self, frame_size: usize) {
        if self.last_frame_size != frame_size {
            for ch in self.channel_state.iter_mut() {
                ch.overlap_tail = vec![0.0; frame_size];
            }
            self.last_frame_size = frame_size;
        }
    }

    /// Decodes one CELT frame from `dec` into `pcm` (one `Vec<f32>` of
    /// `frame_size` samples per channel), covering bands
    /// `start_band..end_band` with a PVQ budget of `total_bits`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn decode(
        &mut self,
        dec: &mut RangeDecoder,
        pcm: &mut [Vec<f32>],
        frame_size: usize,
        start_band: usize,
        end_band: usize,
        total_bits: u32,
    ) -> Result<(), DecoderError> {
        self.ensure_frame_size(frame_size);
        let lm = mode::lm_for_frame_size(frame_size);
        let edges = bands::band_edges(lm, frame_size);
        let end = end_band.min(mode::NUM_BANDS);

        let is_transient = dec.decode_bit_logp(3);

        let widths: Vec<usize> = (start_band..end)
            .map(|b| (edges[b + 1] - edges[b]) as usize)
            .collect();
        let trim = if is_transient { -1 } else { 0 };
        let pulses = rate::allocate_pulses(&widths, lm, total_bits, trim);

        for (ch, out) in pcm.iter_mut().enumerate() {
            let state = &mut self.channel_state[ch];
            if state.prev_energy.len() != mode::NUM_BANDS {
                state.prev_energy = vec![0.0; mode::NUM_BANDS];
            }

            let mut coarse = quant_bands::unquant_coarse_energy(dec, &mut state.prev_energy, end);
            quant_bands::unquant_fine_energy(dec, &mut coarse, 2);

            let mut freq = vec![0.0_f32; frame_size];
            for (i, &b) in (start_band..end).enumerate() {
                let lo = edges[b] as usize;
                let hi = edges[b + 1] as usize;
                if hi <= lo {
                    continue;
                }
                let band = pvq::unquant_band(dec, hi - lo, pulses[i]);
                freq[lo..hi].copy_from_slice(&band);
            }

            bands::denormalize_bands(&mut freq, &edges, end, &coarse);

            let mdct = Mdct::new(frame_size);
            let mut block = vec![0.0_f32; 2 * frame_size];
            mdct.inverse(&freq, &mut block);
            for (i, v) in block.iter_mut().enumerate() {
                *v *= Mdct::window_coeff(i, frame_size);
            }

            // Overlap-add with the stored tail of the previous block.
            let mut y = vec![0.0_f32; frame_size];
            for i in 0..frame_size {
                y[i] = block[i] + state.overlap_tail[i];
            }
            state.overlap_tail.copy_from_slice(&block[frame_size..]);

            state.postfilter_period = search_pitch(&y);
            if state.postfilter_period > 0 && y.len() > state.postfilter_period + 2 {
                let period = state.postfilter_period;
                comb_filter_inplace(
                    &mut y,
                    period + 2,
                    period,
                    period,
                    y.len() - period - 2,
                    0.15,
                    0.15,
                    0,
                    0,
                    0,
                );
            }

            // De-emphasis.
            let mut mem = state.deemph_mem;
            for v in y.iter_mut() {
                *v += DEEMPHASIS * mem;
                mem = *v;
            }
            state.deemph_mem = mem;

            out.clear();
            out.extend_from_slice(&y);
        }

        Ok(())
    }
}
