//! Implements the Opus encoder.

use crate::celt::CeltEncoder;
use crate::framer::pack_frames;
use crate::mode_controller::ModeController;
use crate::range_coder::{RangeEncoder, Tell};
use crate::silk::SilkEncoder;
use crate::toc::{FrameCode, Toc};
use crate::{
    Application, Bandwidth, BitrateMode, Channels, CodecMode, EncoderError, SamplingRate,
    SignalHint,
};

/// Configures the encoder on creation.
#[derive(Clone, Debug)]
pub struct EncoderConfiguration {
    /// Sample rate of the input PCM (Hz). Default: 48000.
    pub sampling_rate: SamplingRate,
    /// Number of channels in the input PCM. Default: Stereo.
    pub channels: Channels,
    /// Application profile, biasing the SILK/CELT/Hybrid mode choice. Default: Audio.
    pub application: Application,
    /// Target bitrate in bits per second. Default: 64000.
    pub bitrate: i32,
    /// Bitrate regulation strategy. Default: Vbr.
    pub bitrate_mode: BitrateMode,
    /// Hint about whether the source is voice or music. Default: Auto.
    pub signal_hint: SignalHint,
    /// Requested coded bandwidth. Default: Auto (full available bandwidth).
    pub bandwidth: Bandwidth,
}

impl Default for EncoderConfiguration {
    fn default() -> Self {
        Self {
            sampling_rate: SamplingRate::Hz48000,
            channels: Channels::Stereo,
            application: Application::Audio,
            bitrate: 64000,
            bitrate_mode: BitrateMode::Vbr,
            signal_hint: SignalHint::Auto,
            bandwidth: Bandwidth::Auto,
        }
    }
}

/// Largest CELT/SILK payload this encoder will ever produce for one frame,
/// used to size the scratch payload buffer once at construction.
const MAX_PAYLOAD_BYTES: usize = 1275;

/// Mean mono-equivalent amplitude below which [`Encoder::set_dtx`]'s silence
/// detector considers a frame silent.
const DTX_SILENCE_THRESHOLD: f32 = 1.0e-4;

/// Opus encoder.
///
/// Like the decoder, the encoder is stateful: the CELT/SILK analysis
/// filters, the mode controller's hysteresis, and the range coder's final
/// state all carry across calls to [`Encoder::encode_float`].
///
/// `payload`/`per_channel` are scratch buffers reused by every call to
/// [`Encoder::encode_float`] instead of being allocated fresh each time;
/// `previous_frame` holds the last frame's coded payload for in-band FEC
/// (see [`Encoder::set_fec`]).
#[derive(Clone, Debug)]
pub struct Encoder {
    celt_enc: CeltEncoder,
    silk_enc: SilkEncoder,
    mode_controller: ModeController,
    sampling_rate: SamplingRate,
    channels: Channels,
    bitrate: i32,
    bitrate_mode: BitrateMode,
    signal_hint: SignalHint,
    bandwidth: Bandwidth,
    max_bandwidth: Bandwidth,
    force_channels: Option<Channels>,
    complexity: u8,
    fec_enabled: bool,
    dtx_enabled: bool,
    dtx_streak: u32,
    frame_size_hint: Option<usize>,
    lsb_depth: u8,
    prediction_disabled: bool,
    phase_inversion_disabled: bool,
    final_range: u32,

    payload: Vec<u8>,
    per_channel: Vec<Vec<f32>>,
    previous_frame: Option<Vec<u8>>,
}

impl Encoder {
    /// Creates a new `Encoder` with the given configuration.
    pub fn new(configuration: &EncoderConfiguration) -> Result<Self, EncoderError> {
        if configuration.bitrate < 500 || configuration.bitrate > 512_000 {
            return Err(EncoderError::InvalidBitrate);
        }

        let celt_enc = CeltEncoder::new(configuration.sampling_rate, configuration.channels)?;
        let silk_enc = SilkEncoder::new(configuration.sampling_rate, configuration.channels)?;

        Ok(Self {
            celt_enc,
            silk_enc,
            mode_controller: ModeController::new(configuration.application),
            sampling_rate: configuration.sampling_rate,
            channels: configuration.channels,
            bitrate: configuration.bitrate,
            bitrate_mode: configuration.bitrate_mode,
            signal_hint: configuration.signal_hint,
            bandwidth: configuration.bandwidth,
            max_bandwidth: Bandwidth::Fullband,
            force_channels: None,
            complexity: 10,
            fec_enabled: false,
            dtx_enabled: false,
            dtx_streak: 0,
            frame_size_hint: None,
            lsb_depth: 24,
            prediction_disabled: false,
            phase_inversion_disabled: false,
            final_range: 0,

            payload: vec![0_u8; MAX_PAYLOAD_BYTES],
            per_channel: Vec::new(),
            previous_frame: None,
        })
    }

    /// Resets the encoder to be equivalent to a freshly initialized encoder.
    pub fn reset(&mut self) -> Result<(), EncoderError> {
        self.celt_enc.reset()?;
        self.silk_enc.reset()?;
        self.previous_frame = None;
        self.dtx_streak = 0;
        Ok(())
    }

    /// Returns the sampling rate the encoder was initialized with.
    pub fn sampling_rate(&self) -> SamplingRate {
        self.sampling_rate
    }

    /// Returns the channels the encoder was initialized with.
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Returns the final state of the codec's entropy coder, for comparing
    /// against [`crate::Decoder::final_range`] in tests.
    pub fn final_range(&self) -> u32 {
        self.final_range
    }

    /// Sets the target bitrate in bits per second.
    pub fn set_bitrate(&mut self, bitrate: i32) -> Result<(), EncoderError> {
        if bitrate < 500 || bitrate > 512_000 {
            return Err(EncoderError::InvalidBitrate);
        }
        self.bitrate = bitrate;
        Ok(())
    }

    /// Sets the bitrate regulation strategy (CBR, VBR, or constrained VBR).
    pub fn set_bitrate_mode(&mut self, mode: BitrateMode) {
        self.bitrate_mode = mode;
    }

    /// Sets the encoder's computational complexity, 0 (fastest) to 10
    /// (highest quality).
    pub fn set_complexity(&mut self, complexity: u8) -> Result<(), EncoderError> {
        if complexity > 10 {
            return Err(EncoderError::InvalidArgument("complexity must be 0..=10"));
        }
        self.complexity = complexity;
        Ok(())
    }

    /// Enables or disables in-band forward error correction. When enabled,
    /// every packet carries a low-rate redundant copy of the previous frame
    /// alongside the current one, recoverable via
    /// [`crate::Decoder::decode_float`]'s `decode_fec` argument.
    pub fn set_fec(&mut self, enabled: bool) {
        self.fec_enabled = enabled;
        if !enabled {
            self.previous_frame = None;
        }
    }

    /// Enables or disables discontinuous transmission: once a silent frame
    /// has been sent, subsequent silent frames are dropped to a minimal
    /// empty-payload packet until the signal becomes non-silent again.
    pub fn set_dtx(&mut self, enabled: bool) {
        self.dtx_enabled = enabled;
        self.dtx_streak = 0;
    }

    /// Sets the encoder's preferred frame size in samples per channel. This
    /// is advisory: every call to [`Encoder::encode_float`] still takes an
    /// explicit `frame_size`, validated the same way regardless of this
    /// setting.
    pub fn set_frame_size(&mut self, frame_size: usize) -> Result<(), EncoderError> {
        if !is_valid_frame_size(frame_size, self.sampling_rate) {
            return Err(EncoderError::InvalidFrameSize);
        }
        self.frame_size_hint = Some(frame_size);
        Ok(())
    }

    /// Sets the encoder's target bandwidth.
    pub fn set_bandwidth(&mut self, bandwidth: Bandwidth) {
        self.bandwidth = bandwidth;
    }

    /// Caps the bandwidth the encoder is allowed to pick automatically; has
    /// no effect if [`Encoder::set_bandwidth`] pins a specific bandwidth.
    pub fn set_max_bandwidth(&mut self, bandwidth: Bandwidth) {
        self.max_bandwidth = bandwidth;
    }

    /// Forces the encoder to code audio with a specific channel count
    /// regardless of the input's channel count, or `None` to let the
    /// encoder decide automatically. Only affects the CELT path; SILK
    /// always codes at the encoder's configured channel count.
    pub fn set_force_channels(&mut self, channels: Option<Channels>) {
        self.force_channels = channels;
    }

    /// Sets the voice/music signal hint fed to the mode controller.
    pub fn set_signal(&mut self, signal: SignalHint) {
        self.signal_hint = signal;
    }

    /// Sets the bit depth of the source signal, in 8..=24, used only to
    /// inform internal level heuristics (DTX, gain estimation); the input
    /// is always `f32` regardless of this setting.
    pub fn set_lsb_depth(&mut self, depth: u8) -> Result<(), EncoderError> {
        if !(8..=24).contains(&depth) {
            return Err(EncoderError::InvalidArgument("lsb depth must be 8..=24"));
        }
        self.lsb_depth = depth;
        Ok(())
    }

    /// Disables or re-enables SILK's predictive coding (long-term and
    /// short-term prediction), trading compression efficiency for
    /// resilience to error propagation across frames.
    pub fn set_prediction_disabled(&mut self, disabled: bool) {
        self.prediction_disabled = disabled;
    }

    /// Disables or re-enables CELT's stereo phase inversion heuristic.
    pub fn set_phase_inversion_disabled(&mut self, disabled: bool) {
        self.phase_inversion_disabled = disabled;
    }

    /// Derives the encoder's per-frame byte budget from `bitrate`, used both
    /// as the CELT PVQ bit allowance and, in CBR mode, as the exact payload
    /// length the encoder pads its output to. See
    /// [`crate::celt::mode::pulse_budget_from_bytes`] for why the decoder
    /// can always recover this same value from the packet it receives.
    fn target_payload_bytes(&self, frame_size: usize) -> usize {
        let bytes = (i64::from(self.bitrate) * frame_size as i64)
            / (self.sampling_rate as i64 * 8);
        (bytes.max(1) as usize).min(MAX_PAYLOAD_BYTES)
    }

    fn coding_channels(&self, mode: CodecMode) -> usize {
        match (mode, self.force_channels) {
            (CodecMode::Celt, Some(forced)) => forced as usize,
            _ => self.channels as usize,
        }
    }

    /// Encodes one frame of floating-point PCM `samples` (interleaved if
    /// stereo, `frame_size` samples per channel) into `out`, returning the
    /// number of bytes written.
    ///
    /// `frame_size` must correspond to a valid Opus frame duration (2.5,
    /// 5, 10, 20, 40, or 60 ms) at the encoder's sampling rate.
    pub fn encode_float(&mut self, samples: &[f32], frame_size: usize, out: &mut [u8]) -> Result<usize, EncoderError> {
        let channels = self.channels as usize;
        if samples.len() < frame_size * channels {
            return Err(EncoderError::InvalidArgument("not enough input samples for frame_size"));
        }
        if !is_valid_frame_size(frame_size, self.sampling_rate) {
            return Err(EncoderError::InvalidFrameSize);
        }

        if self.dtx_enabled && is_silent(samples, DTX_SILENCE_THRESHOLD) {
            self.dtx_streak += 1;
            if self.dtx_streak > 1 {
                let toc = Toc::new(
                    self.mode_controller.mode(),
                    self.bandwidth,
                    self.channels,
                    frame_size,
                    self.sampling_rate,
                    FrameCode::One,
                );
                let packet = pack_frames(toc, &[&[]])?;
                if packet.len() > out.len() {
                    return Err(EncoderError::PacketTooLarge);
                }
                out[..packet.len()].copy_from_slice(&packet);
                return Ok(packet.len());
            }
        } else {
            self.dtx_streak = 0;
        }

        let mode = self
            .mode_controller
            .decide(self.signal_hint, self.bandwidth, self.bitrate, self.channels as u8);
        let coding_channels = self.coding_channels(mode);
        let target_bytes = self.target_payload_bytes(frame_size);

        let (frame_bytes, final_range) = {
            let mut rc = RangeEncoder::new(&mut self.payload);
            match mode {
                CodecMode::Celt => {
                    let bits = crate::celt::mode::pulse_budget_from_bytes(target_bytes, coding_channels);
                    self.per_channel.resize(coding_channels, Vec::new());
                    for (c, channel_buf) in self.per_channel.iter_mut().enumerate() {
                        channel_buf.clear();
                        if coding_channels < channels {
                            // Forced channel count below the input's: downmix by averaging.
                            channel_buf.extend((0..frame_size).map(|i| {
                                (0..channels).map(|src| samples[i * channels + src]).sum::<f32>()
                                    / channels as f32
                            }));
                        } else {
                            channel_buf.extend((0..frame_size).map(|i| samples[i * channels + c]));
                        }
                    }
                    self.celt_enc
                        .encode(&mut rc, &self.per_channel, frame_size, 0, 21, bits)?;
                }
                CodecMode::Silk | CodecMode::Hybrid => {
                    self.silk_enc.encode(&mut rc, samples, frame_size)?;
                }
            }
            rc.done()?;
            (rc.range_bytes(), rc.range())
        };
        self.final_range = final_range;

        let current_payload_len = if self.bitrate_mode == BitrateMode::Cbr {
            let padded_len = target_bytes.max(frame_bytes);
            self.payload[frame_bytes..padded_len].iter_mut().for_each(|b| *b = 0);
            padded_len
        } else {
            frame_bytes
        };

        let toc = Toc::new(mode, self.bandwidth, self.channels, frame_size, self.sampling_rate, FrameCode::One);

        // Only the FEC path needs an owned copy of the payload, to retain it
        // as next frame's redundant copy; the common path packs straight out
        // of the scratch buffer.
        let packet = if self.fec_enabled {
            let current_payload = self.payload[..current_payload_len].to_vec();
            let packet = match &self.previous_frame {
                Some(previous) => pack_frames(toc, &[previous.as_slice(), current_payload.as_slice()])?,
                None => pack_frames(toc, &[current_payload.as_slice()])?,
            };
            self.previous_frame = Some(current_payload);
            packet
        } else {
            pack_frames(toc, &[&self.payload[..current_payload_len]])?
        };

        if packet.len() > out.len() {
            return Err(EncoderError::PacketTooLarge);
        }
        out[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }
}

fn is_valid_frame_size(frame_size: usize, sampling_rate: SamplingRate) -> bool {
    [120, 240, 480, 960, 1920, 2880]
        .iter()
        .any(|&n| (n as u64 * sampling_rate as u64 / 48000) as usize == frame_size)
}

fn is_silent(samples: &[f32], threshold: f32) -> bool {
    samples.iter().all(|&s| s.abs() < threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_encoder() -> Encoder {
        Encoder::new(&EncoderConfiguration {
            sampling_rate: SamplingRate::Hz48000,
            channels: Channels::Mono,
            ..EncoderConfiguration::default()
        })
        .unwrap()
    }

    #[test]
    fn encode_float_rejects_invalid_frame_size() {
        let mut enc = new_encoder();
        let samples = vec![0.0_f32; 100];
        let mut out = [0_u8; 64];
        assert!(enc.encode_float(&samples, 100, &mut out).is_err());
    }

    #[test]
    fn set_bitrate_rejects_out_of_range_values() {
        let mut enc = new_encoder();
        assert!(enc.set_bitrate(100).is_err());
        assert!(enc.set_bitrate(600_000).is_err());
        assert!(enc.set_bitrate(64_000).is_ok());
    }

    #[test]
    fn set_complexity_rejects_out_of_range_values() {
        let mut enc = new_encoder();
        assert!(enc.set_complexity(11).is_err());
        assert!(enc.set_complexity(10).is_ok());
    }

    #[test]
    fn cbr_mode_produces_constant_size_packets() {
        let mut enc = new_encoder();
        enc.set_bitrate_mode(BitrateMode::Cbr);
        enc.set_bitrate(32_000).unwrap();
        let samples: Vec<f32> = (0..960).map(|i| (i as f32 * 0.1).sin() * 0.2).collect();

        let mut out1 = [0_u8; 2048];
        let n1 = enc.encode_float(&samples, 960, &mut out1).unwrap();
        let mut out2 = [0_u8; 2048];
        let n2 = enc.encode_float(&samples, 960, &mut out2).unwrap();
        assert_eq!(n1, n2);
    }

    #[test]
    fn fec_enabled_bundles_previous_frame() {
        let mut enc = new_encoder();
        enc.set_fec(true);
        let samples: Vec<f32> = (0..960).map(|i| (i as f32 * 0.1).sin() * 0.2).collect();

        let mut out1 = [0_u8; 2048];
        enc.encode_float(&samples, 960, &mut out1).unwrap();
        let mut out2 = [0_u8; 2048];
        let n2 = enc.encode_float(&samples, 960, &mut out2).unwrap();

        assert_eq!(crate::query_packet_frame_count(&out2[..n2]).unwrap(), 2);
    }

    #[test]
    fn dtx_drops_sustained_silence_to_minimal_packets() {
        let mut enc = new_encoder();
        enc.set_dtx(true);
        let silence = vec![0.0_f32; 960];

        let mut out = [0_u8; 2048];
        let n1 = enc.encode_float(&silence, 960, &mut out).unwrap();
        let n2 = enc.encode_float(&silence, 960, &mut out).unwrap();
        let n3 = enc.encode_float(&silence, 960, &mut out).unwrap();

        assert!(n3 <= n1);
        assert!(n3 <= n2);
    }
}
