//! Implements the Silk encoder.

use crate::encoder_error::EncoderError;
use crate::range_coder::RangeEncoder;
use crate::silk::{gains, lpc, ltp, nlsf, nsq, resampler, stereo};
use crate::{Channels, SamplingRate};

const LPC_ORDER: usize = 16;
const SUBFRAMES_PER_FRAME: usize = 4;

#[derive(Clone, Debug, Default)]
struct ChannelState {
    lpc_history: Vec<f32>,
    ltp_history: Vec<f32>,
    prev_gain_index: u32,
}

impl ChannelState {
    fn ensure_history(&mut self) {
        if self.lpc_history.len() != LPC_ORDER {
            self.lpc_history = vec![0.0; LPC_ORDER];
        }
        if self.ltp_history.len() < ltp::LAG_MAX {
            self.ltp_history = vec![0.0; ltp::LAG_MAX];
        }
    }
}

/// The Silk encoder.
///
/// `left_scratch`/`right_scratch`/`mono_resampled`/`left_resampled`/
/// `right_resampled` are scratch buffers sized once capacity has grown to
/// cover the largest frame seen; every per-frame call clears and refills
/// them instead of allocating a fresh `Vec`.
#[derive(Clone, Debug)]
pub(crate) struct SilkEncoder {
    sampling_rate: SamplingRate,
    channels: Channels,
    internal_sampling_rate: SamplingRate,
    internal_channels: Channels,
    channel_state: Vec<ChannelState>,
    left_scratch: Vec<f32>,
    right_scratch: Vec<f32>,
    left_resampled: Vec<f32>,
    right_resampled: Vec<f32>,
    mono_resampled: Vec<f32>,
}

impl SilkEncoder {
    /// Creates a new Silk encoder.
    pub(crate) fn new(
        sampling_rate: SamplingRate,
        channels: Channels,
    ) -> Result<Self, EncoderError> {
        Ok(Self {
            sampling_rate,
            channels,
            internal_sampling_rate: SamplingRate::Hz16000,
            internal_channels: channels,
            channel_state: vec![ChannelState::default(); channels as usize],
            left_scratch: Vec::new(),
            right_scratch: Vec::new(),
            left_resampled: Vec::new(),
            right_resampled: Vec::new(),
            mono_resampled: Vec::new(),
        })
    }

    /// Resets the encoder to its freshly-initialized state.
    pub(crate) fn reset(&mut self) -> Result<(), EncoderError> {
        for ch in self.channel_state.iter_mut() {
            *ch = ChannelState::default();
        }
        Ok(())
    }

    /// Sets the internal sampling rate SILK analyzes and codes at.
    pub(crate) fn set_internal_sampling_rate(&mut self, sampling_rate: SamplingRate) {
        self.internal_sampling_rate = sampling_rate;
    }

    fn encode_one_channel(
        &mut self,
        enc: &mut RangeEncoder,
        ch: usize,
        samples: &[f32],
    ) -> Result<(), EncoderError> {
        let state = &mut self.channel_state[ch];
        state.ensure_history();

        let coeffs = lpc::analyze(samples, LPC_ORDER);
        nlsf::quant_coefficients(enc, &coeffs)?;

        let subframe_len = samples.len() / SUBFRAMES_PER_FRAME;
        let mut frame_gains = Vec::with_capacity(SUBFRAMES_PER_FRAME);
        let mut subframe_residuals = Vec::with_capacity(SUBFRAMES_PER_FRAME);
        let mut subframe_ltp = Vec::with_capacity(SUBFRAMES_PER_FRAME);

        for sub in 0..SUBFRAMES_PER_FRAME {
            let x = &samples[sub * subframe_len..(sub + 1) * subframe_len];
            let residual = lpc::analysis_filter(x, &state.lpc_history, &coeffs);
            state.lpc_history.extend_from_slice(x);
            let keep_from = state.lpc_history.len().saturating_sub(LPC_ORDER * 4);
            state.lpc_history.drain(..keep_from);

            let ltp_params = ltp::search(&residual, &state.ltp_history);
            let innovation = ltp::predict(&residual, &state.ltp_history, ltp_params);

            let energy: f32 = innovation.iter().map(|v| v * v).sum::<f32>() / innovation.len().max(1) as f32;
            let gain = energy.sqrt().max(1.0e-4);

            state.ltp_history.extend_from_slice(x);
            let keep_from = state
                .ltp_history
                .len()
                .saturating_sub(ltp::LAG_MAX + subframe_len);
            state.ltp_history.drain(..keep_from);

            frame_gains.push(gain);
            subframe_residuals.push(innovation);
            subframe_ltp.push(ltp_params);
        }

        gains::quant_gains(enc, &frame_gains, &mut state.prev_gain_index)?;
        for ((innovation, ltp_params), &gain) in subframe_residuals
            .iter()
            .zip(subframe_ltp.iter())
            .zip(frame_gains.iter())
        {
            ltp::quant_ltp(enc, *ltp_params)?;
            nsq::quant_excitation(enc, innovation, gain, &coeffs)?;
        }

        Ok(())
    }

    /// Encodes one SILK frame of interleaved (if stereo) PCM `samples` into
    /// `enc`.
    pub(crate) fn encode(
        &mut self,
        enc: &mut RangeEncoder,
        samples: &[f32],
        frame_size: usize,
    ) -> Result<(), EncoderError> {
        let api_rate = self.sampling_rate as u32;
        let internal_rate = self.internal_sampling_rate as u32;

        if self.channels == Channels::Stereo {
            self.left_scratch.clear();
            self.right_scratch.clear();
            for i in 0..frame_size {
                self.left_scratch.push(samples[2 * i]);
                self.right_scratch.push(samples[2 * i + 1]);
            }
            resampler::resample_into(&self.left_scratch, api_rate, internal_rate, &mut self.left_resampled);
            resampler::resample_into(&self.right_scratch, api_rate, internal_rate, &mut self.right_resampled);

            let (mid, side, weight) = stereo::encode_stereo(&self.left_resampled, &self.right_resampled);
            stereo::quant_weight(enc, weight)?;
            self.encode_one_channel(enc, 0, &mid)?;
            self.encode_one_channel(enc, 1, &side)?;
        } else {
            resampler::resample_into(samples, api_rate, internal_rate, &mut self.mono_resampled);
            let mono = std::mem::take(&mut self.mono_resampled);
            self.encode_one_channel(enc, 0, &mono)?;
            self.mono_resampled = mono;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_runs_without_error_on_a_tone() {
        let mut silk = SilkEncoder::new(SamplingRate::Hz16000, Channels::Mono).unwrap();
        silk.set_internal_sampling_rate(SamplingRate::Hz16000);
        let samples: Vec<f32> = (0..320).map(|i| (i as f32 * 0.05).sin() * 0.2).collect();

        let mut buf = [0_u8; 4096];
        let mut enc = RangeEncoder::new(&mut buf);
        silk.encode(&mut enc, &samples, samples.len()).unwrap();
        enc.done().unwrap();
        assert!(enc.range_bytes() > 0);
    }
}
