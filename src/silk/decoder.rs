//! Implements the Silk decoder.

use crate::range_coder::RangeDecoder;
use crate::silk::{gains, lpc, ltp, nlsf, nsq, resampler, stereo};
use crate::{Channels, DecoderError, SamplingRate};

const LPC_ORDER: usize = 16;
const SUBFRAMES_PER_FRAME: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LostFlag {
    /// No packet loss.
    NoLoss,
    /// Packet loss.
    Loss,
    /// Forward correction.
    DecodeFec,
}

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

/// The Silk decoder.
///
/// `left_resampled`/`right_resampled` are scratch output buffers for
/// [`resampler::resample_into`], reused across calls once their capacity
/// covers the largest frame decoded so far.
#[derive(Clone, Debug)]
pub(crate) struct SilkDecoder {
    sampling_rate: SamplingRate,
    channels: Channels,
    internal_sampling_rate: SamplingRate,
    internal_channels: Channels,
    channel_state: Vec<ChannelState>,
    stereo_weight: f32,
    payload_size_ms: usize,
    last_pitch: u32,
    left_resampled: Vec<f32>,
    right_resampled: Vec<f32>,
}

impl SilkDecoder {
    /// Creates a new Silk decoder. Configures the output sampling rate and output channels.
    pub(crate) fn new(
        sampling_rate: SamplingRate,
        channels: Channels,
    ) -> Result<Self, DecoderError> {
        Ok(Self {
            sampling_rate,
            channels,
            internal_sampling_rate: SamplingRate::Hz16000,
            internal_channels: channels,
            channel_state: vec![ChannelState::default(); channels as usize],
            stereo_weight: 0.0,
            payload_size_ms: 20,
            last_pitch: 0,
            left_resampled: Vec::new(),
            right_resampled: Vec::new(),
        })
    }

    /// Resets the Silk decoder.
    pub(crate) fn reset(&mut self) -> Result<(), DecoderError> {
        for ch in self.channel_state.iter_mut() {
            *ch = ChannelState::default();
        }
        self.stereo_weight = 0.0;
        self.last_pitch = 0;
        Ok(())
    }

    /// Gets the pitch of the last decoded frame.
    pub(crate) fn pitch(&self) -> u32 {
        self.last_pitch
    }

    /// Sets the internal channels.
    pub(crate) fn internal_channels(&mut self, internal_channels: Channels) {
        self.internal_channels = internal_channels;
    }

    /// Sets the internal channels.
    pub(crate) fn set_internal_channels(&mut self, internal_channels: Channels) {
        self.internal_channels = internal_channels;
        if self.channel_state.len() != internal_channels as usize {
            self.channel_state = vec![ChannelState::default(); internal_channels as usize];
        }
    }

    /// Sets the sampling rate.
    pub(crate) fn set_internal_sampling_rate(&mut self, sampling_rate: SamplingRate) {
        self.internal_sampling_rate = sampling_rate;
    }

    /// Sets the payload size in ms.
    pub(crate) fn set_payload_size_ms(&mut self, payload_size_ms: usize) {
        self.payload_size_ms = payload_size_ms;
    }

    fn decode_one_channel(
        &mut self,
        dec: &mut RangeDecoder,
        ch: usize,
        frame_samples: usize,
    ) -> Vec<f32> {
        let state = &mut self.channel_state[ch];
        state.ensure_history();

        let coeffs = nlsf::unquant_coefficients(dec, LPC_ORDER).unwrap_or(vec![0.0; LPC_ORDER]);
        let frame_gains = gains::unquant_gains(dec, SUBFRAMES_PER_FRAME, &mut state.prev_gain_index)
            .unwrap_or(vec![0.1; SUBFRAMES_PER_FRAME]);

        let subframe_len = frame_samples / SUBFRAMES_PER_FRAME;
        let mut out = Vec::with_capacity(frame_samples);

        for gain in frame_gains {
            let ltp_params = ltp::unquant_ltp(dec).unwrap_or_default();
            let innovation =
                nsq::unquant_excitation(dec, subframe_len, gain).unwrap_or(vec![0.0; subframe_len]);
            let residual = ltp::reconstruct(&innovation, &state.ltp_history, ltp_params);
            let samples = lpc::synthesis_filter(&residual, &mut state.lpc_history, &coeffs);

            state.ltp_history.extend_from_slice(&samples);
            let keep_from = state
                .ltp_history
                .len()
                .saturating_sub(ltp::LAG_MAX + subframe_len);
            state.ltp_history.drain(..keep_from);

            if ltp_params.lag > 0 {
                self.last_pitch = ltp_params.lag as u32;
            }
            out.extend_from_slice(&samples);
        }
        out
    }

    /// Decodes one SILK frame of `frame_size` samples (per channel, at the
    /// API sampling rate) from `dec` into `samples` (interleaved if stereo).
    /// `lost_flag` selects normal decode, packet-loss concealment, or FEC
    /// recovery from redundancy in a later packet's payload.
    pub(crate) fn decode(
        &mut self,
        dec: &mut Option<RangeDecoder>,
        samples: &mut [f32],
        frame_size: &mut usize,
        lost_flag: LostFlag,
        _first_frame: bool,
    ) -> Result<(), DecoderError> {
        let out_channels = self.channels as usize;
        let internal_rate = self.internal_sampling_rate as u32;
        let api_rate = self.sampling_rate as u32;
        let internal_frame_samples =
            (*frame_size as u64 * internal_rate as u64 / api_rate as u64) as usize;

        if lost_flag == LostFlag::Loss || dec.is_none() {
            // Packet-loss concealment: decay the last known signal toward
            // silence rather than inserting a discontinuity.
            for (i, s) in samples.iter_mut().enumerate() {
                let decay = 0.995_f32.powi((i / out_channels) as i32);
                *s *= decay;
            }
            return Ok(());
        }

        let Some(dec) = dec.as_mut() else {
            return Err(DecoderError::InvalidArgument("missing range decoder for a non-lost frame"));
        };

        let n = if self.internal_channels == Channels::Stereo {
            let weight = stereo::unquant_weight(dec)?;
            self.stereo_weight = weight;
            let mid = self.decode_one_channel(dec, 0, internal_frame_samples);
            let side = self.decode_one_channel(dec, 1, internal_frame_samples);
            let (left, right) = stereo::decode_stereo(&mid, &side, weight);
            resampler::resample_into(&left, internal_rate, api_rate, &mut self.left_resampled);
            resampler::resample_into(&right, internal_rate, api_rate, &mut self.right_resampled);

            let n = self.left_resampled.len();
            if out_channels == 1 {
                samples[..n].copy_from_slice(&self.left_resampled);
            } else {
                for i in 0..n {
                    samples[2 * i] = self.left_resampled[i];
                    samples[2 * i + 1] = self.right_resampled[i];
                }
            }
            n
        } else {
            let mono = self.decode_one_channel(dec, 0, internal_frame_samples);
            resampler::resample_into(&mono, internal_rate, api_rate, &mut self.left_resampled);

            let n = self.left_resampled.len();
            if out_channels == 1 {
                samples[..n].copy_from_slice(&self.left_resampled);
            } else {
                for i in 0..n {
                    samples[2 * i] = self.left_resampled[i];
                    samples[2 * i + 1] = self.left_resampled[i];
                }
            }
            n
        };

        *frame_size = n;
        Ok(())
    }
}
