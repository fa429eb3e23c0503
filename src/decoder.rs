//! Implement the Opus decoder.

use crate::celt::CeltDecoder;
use crate::plc::conceal_celt;
use crate::range_coder::{RangeDecoder, Tell};
use crate::silk::{LostFlag, SilkDecoder};
use crate::{
    parse_packet, query_packet_channel_count, query_packet_codec_mode, query_packet_samples_per_frame,
    Bandwidth, Channels, CodecMode, DecoderError, Sample, SamplingRate,
};

/// Configures the decoder on creation.
///
/// Internally Opus stores data at 48000 Hz, so that should be the default
/// value for the sampling rate. However, the decoder can efficiently decode
/// to buffers at 8, 12, 16, and 24 kHz so if for some reason the caller cannot
/// use data at the full sample rate, or knows the compressed data doesn't
/// use the full frequency range, it can request decoding at a reduced
/// rate. Likewise, the decoder is capable of filling in either mono or
/// interleaved stereo pcm buffers, at the caller's request.
#[derive(Clone, Debug)]
pub struct DecoderConfiguration {
    /// Sample rate to decode at (Hz). Default: 48000 kHz.
    pub sampling_rate: SamplingRate,
    /// Number of channels to decode. Default: Stereo.
    pub channels: Channels,
    /// Scales the decoded output by a factor specified in Q8 dB units. Default: 0.
    pub gain: i16,
}

impl Default for DecoderConfiguration {
    fn default() -> Self {
        Self {
            sampling_rate: SamplingRate::Hz48000,
            channels: Channels::Stereo,
            gain: 0,
        }
    }
}

/// Opus decoder.
///
/// Opus is a stateful codec with overlapping blocks and as a result Opus
/// packets are not coded independently of each other. Packets must be
/// passed into the decoder serially and in the correct order for a correct
/// decode. Lost packets can be replaced with loss concealment by calling
/// the decoder with `None` for the missing packet.
#[derive(Clone, Debug)]
pub struct Decoder {
    celt_dec: CeltDecoder,
    silk_dec: SilkDecoder,
    channels: Channels,
    sampling_rate: SamplingRate,
    decode_gain: i16,

    stream_channels: Channels,
    bandwidth: Bandwidth,
    mode: Option<CodecMode>,
    prev_mode: Option<CodecMode>,
    frame_size: usize,
    prev_redundancy: Option<usize>,
    last_packet_duration: Option<u32>,

    final_range: u32,
    last_celt_frame: Vec<Vec<f32>>,
    consecutive_losses: u32,
    softclip_mem: Vec<f32>,

    float_buf: Vec<f32>,
    per_channel: Vec<Vec<f32>>,
    native_samples: Vec<f32>,
    frame_sizes: [usize; 48],
}

impl Decoder {
    /// Creates a new `Decoder` with the given configuration.
    pub fn new(configuration: &DecoderConfiguration) -> Result<Self, DecoderError> {
        let celt_dec = CeltDecoder::new(configuration.sampling_rate, configuration.channels)?;
        let silk_dec = SilkDecoder::new(configuration.sampling_rate, configuration.channels)?;

        Ok(Self {
            celt_dec,
            silk_dec,
            sampling_rate: configuration.sampling_rate,
            channels: configuration.channels,
            decode_gain: configuration.gain,
            stream_channels: configuration.channels,
            bandwidth: Bandwidth::Auto,
            mode: None,
            prev_mode: None,
            frame_size: configuration.sampling_rate as usize / 400,
            prev_redundancy: None,
            last_packet_duration: None,

            final_range: 0,
            last_celt_frame: vec![Vec::new(); configuration.channels as usize],
            consecutive_losses: 0,
            softclip_mem: vec![0.0; configuration.channels as usize],

            float_buf: Vec::new(),
            per_channel: Vec::new(),
            native_samples: Vec::new(),
            frame_sizes: [0; 48],
        })
    }

    /// Resets the Decoder to be equivalent to a freshly initialized decoder.
    ///
    /// This should be called when switching streams in order to prevent
    /// the back to back decoding from giving different results from
    /// one at a time decoding.
    pub fn reset(&mut self) -> Result<(), DecoderError> {
        self.silk_dec.reset()?;
        self.celt_dec.reset()?;

        self.stream_channels = self.channels;
        self.bandwidth = Bandwidth::Auto;
        self.mode = None;
        self.prev_mode = None;
        self.frame_size = self.sampling_rate as usize / 400;
        self.prev_redundancy = None;
        self.last_packet_duration = None;
        self.last_celt_frame = vec![Vec::new(); self.channels as usize];
        self.consecutive_losses = 0;
        self.softclip_mem = vec![0.0; self.channels as usize];

        Ok(())
    }

    /// Returns the sampling rate the decoder was initialized with.
    pub fn sampling_rate(&self) -> SamplingRate {
        self.sampling_rate
    }

    /// Returns the channels the decoder was initialized with.
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Returns the amount to scale PCM signal by in Q8 dB units.
    pub fn gain(&self) -> i16 {
        self.decode_gain
    }

    /// Returns the decoder's last bandpass.
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// Returns the pitch of the last decoded frame, measured in samples at 48 kHz
    pub fn pitch(&self) -> Option<u32> {
        if let Some(prev_mode) = self.prev_mode {
            match prev_mode {
                CodecMode::Celt => Some(self.celt_dec.pitch()),
                CodecMode::Silk | CodecMode::Hybrid => Some(self.silk_dec.pitch()),
            }
        } else {
            None
        }
    }

    /// Returns the duration (in samples) of the last packet successfully decoded or concealed.
    pub fn last_packet_duration(&self) -> Option<u32> {
        self.last_packet_duration
    }

    /// Returns the final state of the codec's entropy coder.
    ///
    /// This is used for testing purposes, the encoder and decoder state
    /// should be identical after coding a payload assuming no data
    /// corruption or software bugs).
    pub fn final_range(&mut self) -> u32 {
        self.final_range
    }

    /// Decode an Opus packet with a generic sample output.
    ///
    /// Returns number of decoded samples.
    ///
    /// Caller needs to make sure that the samples buffer has enough space to fit
    /// all samples inside the packet. Call `query_packet_sample_count()` to query
    /// the number of samples inside a packet and resize the buffer if needed.
    ///
    /// The internal format is `f32`. Use `decode_float()` to access it directly.
    ///
    /// # Arguments
    /// * `packet`     - Input payload. Use a `None` to indicate packet loss.
    /// * `samples`    - Output signal encoded as PCM samples (interleaved if 2 channels).
    ///                  Length must be at least `frame_size` * `channels`.
    /// * `frame_size` - Number of samples per channel of available space in a PCM.
    ///                  `frame_size` must be a multiple of 2.5 ms (400 for 48kHz).
    ///                  In the case of PLC (packet==`None`) or FEC (decode_fec=`true`), then
    ///                  `frame_size` needs to be exactly the duration of audio that is missing,
    ///                  otherwise the decoder will not be in the optimal state to decode
    ///                  the next incoming packet.
    /// * `decode_fec` - Request that any in-band forward error correction data be decoded.
    ///                  If no such data is available, the frame is decoded as if it were lost.
    ///
    pub fn decode<S: Sample>(
        &mut self,
        packet: Option<&[u8]>,
        samples: &mut [S],
        frame_size: usize,
        decode_fec: bool,
    ) -> Result<u32, DecoderError> {
        let channels = self.channels as usize;
        self.float_buf.clear();
        self.float_buf.resize(frame_size * channels, 0.0);
        let mut float_buf = std::mem::take(&mut self.float_buf);
        let (decoded, _offset) = self.decode_native(packet, &mut float_buf, frame_size, decode_fec, 0, true);

        for (dst, &src) in samples.iter_mut().zip(float_buf.iter()) {
            *dst = S::from_f32(src);
        }
        self.float_buf = float_buf;
        Ok(decoded)
    }

    /// Decode an Opus packet with floating point output.
    ///
    /// Returns number of decoded samples.
    ///
    /// Caller needs to make sure that the samples buffer has enough space to fit
    /// all samples inside the packet. Call `query_packet_sample_count()` to query
    /// the number of samples inside a packet and resize the buffer if needed.
    ///
    /// # Arguments
    /// * `packet`     - Input payload. Use a `None` to indicate packet loss.
    /// * `samples`    - Output signal encoded as PCM samples (interleaved if 2 channels).
    ///                  Length is frame_size * channels.
    /// * `frame_size` - Number of samples per channel of available space in a PCM.
    ///                  `frame_size` must be a multiple of 2.5 ms (400 for 48kHz).
    ///                  In the case of PLC (packet==`None`) or FEC (decode_fec=`true`), then
    ///                  `frame_size` needs to be exactly the duration of audio that is missing,
    ///                  otherwise the decoder will not be in the optimal state to decode
    ///                  the next incoming packet.
    /// * `decode_fec` - Request that any in-band forward error correction data be decoded.
    ///                  If no such data is available, the frame is decoded as if it were lost.
    ///
    pub fn decode_float(
        &mut self,
        packet: Option<&[u8]>,
        samples: &mut [f32],
        frame_size: usize,
        decode_fec: bool,
    ) -> Result<u32, DecoderError> {
        let (decoded, _offset) = self.decode_native(packet, samples, frame_size, decode_fec, 0, true);
        Ok(decoded)
    }

    /// Returns the samples decoded and the packet_offset (used for multiple streams).
    fn decode_native(
        &mut self,
        packet: Option<&[u8]>,
        samples: &mut [f32],
        frame_size: usize,
        decode_fec: bool,
        _self_delimited: usize,
        soft_clip: bool,
    ) -> (u32, usize) {
        let channels = self.channels as usize;

        let Some(packet) = packet.filter(|p| !p.is_empty()) else {
            log::debug!("packet lost, concealing");
            let decoded = self.conceal(samples, frame_size);
            return (decoded, 0);
        };

        let mut payload_offset = 0usize;
        let count = match parse_packet(packet, false, None, &mut self.frame_sizes, Some(&mut payload_offset), None) {
            Ok(count) => count,
            Err(err) => {
                log::warn!("malformed packet ({err}), concealing");
                return (self.conceal(samples, frame_size), 0);
            }
        };

        let frame_index = if decode_fec {
            if count < 2 {
                log::debug!("FEC requested but not available, falling back to PLC");
                return (self.conceal(samples, frame_size), 0);
            }
            0
        } else {
            count - 1
        };

        let mut offset = payload_offset;
        for &size in self.frame_sizes.iter().take(frame_index) {
            offset += size;
        }
        let frame = &packet[offset..offset + self.frame_sizes[frame_index]];

        self.consecutive_losses = 0;
        let mode = query_packet_codec_mode(packet);
        let stream_channels = query_packet_channel_count(packet);
        self.stream_channels = stream_channels;
        self.mode = Some(mode);
        self.prev_mode = self.mode;

        let native_frame_size = query_packet_samples_per_frame(packet, self.sampling_rate);
        let decode_frame_size = native_frame_size.min(frame_size);
        let payload_bytes = frame.len();

        let decoded = match mode {
            CodecMode::Celt => {
                let mut rc = RangeDecoder::new(frame);
                self.per_channel.resize(channels, Vec::new());
                for channel_buf in self.per_channel.iter_mut() {
                    channel_buf.clear();
                    channel_buf.resize(decode_frame_size, 0.0);
                }
                let bits = crate::celt::mode::pulse_budget_from_bytes(payload_bytes, channels);
                let result = self
                    .celt_dec
                    .decode(&mut rc, &mut self.per_channel, decode_frame_size, 0, 21, bits);
                self.final_range = rc.range();

                if let Err(ref err) = result {
                    log::warn!("CELT decode failed ({err}), concealing");
                }
                if result.is_err() {
                    self.conceal(samples, frame_size)
                } else {
                    self.last_celt_frame.clone_from(&self.per_channel);
                    for i in 0..decode_frame_size {
                        for c in 0..channels {
                            let v = self.per_channel.get(c).and_then(|ch| ch.get(i)).copied().unwrap_or(0.0);
                            samples[i * channels + c] = v;
                        }
                    }
                    decode_frame_size as u32
                }
            }
            CodecMode::Silk | CodecMode::Hybrid => {
                let mut rc = Some(RangeDecoder::new(frame));
                self.native_samples.clear();
                self.native_samples.resize(decode_frame_size * channels, 0.0);
                let mut native_samples = std::mem::take(&mut self.native_samples);
                let mut actual_frame_size = decode_frame_size;
                let result = self.silk_dec.decode(
                    &mut rc,
                    &mut native_samples,
                    &mut actual_frame_size,
                    LostFlag::NoLoss,
                    true,
                );
                if let Some(rc) = rc {
                    self.final_range = rc.range();
                }

                let outcome = if let Err(ref err) = result {
                    log::warn!("SILK decode failed ({err}), concealing");
                    self.conceal(samples, frame_size)
                } else {
                    let n = actual_frame_size.min(frame_size);
                    samples[..n * channels].copy_from_slice(&native_samples[..n * channels]);
                    n as u32
                };
                self.native_samples = native_samples;
                outcome
            }
        };

        self.frame_size = decoded as usize;
        self.last_packet_duration = Some(decoded);

        if soft_clip {
            crate::pcm_soft_clip(&mut samples[..decoded as usize * channels], channels, &mut self.softclip_mem);
        }

        (decoded, 1)
    }

    /// Conceals a lost or missing frame by extrapolating the last decoded
    /// CELT output (or, if no CELT history exists yet, filling silence).
    fn conceal(&mut self, samples: &mut [f32], frame_size: usize) -> u32 {
        let channels = self.channels as usize;
        self.consecutive_losses += 1;

        if self.last_celt_frame.iter().all(|c| c.is_empty()) {
            for s in samples.iter_mut().take(frame_size * channels) {
                *s = 0.0;
            }
            return frame_size as u32;
        }

        for c in 0..channels.min(self.last_celt_frame.len()) {
            let concealed = conceal_celt(&self.last_celt_frame[c], self.consecutive_losses);
            self.last_celt_frame[c] = concealed.clone();
            for (i, &v) in concealed.iter().take(frame_size).enumerate() {
                samples[i * channels + c] = v;
            }
        }
        frame_size as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Encoder, EncoderConfiguration};

    fn round_trip(frame_size: usize) -> (Decoder, Vec<f32>) {
        let mut enc = Encoder::new(&EncoderConfiguration {
            sampling_rate: SamplingRate::Hz48000,
            channels: Channels::Mono,
            ..EncoderConfiguration::default()
        })
        .unwrap();
        let samples: Vec<f32> = (0..frame_size).map(|i| (i as f32 * 0.05).sin() * 0.3).collect();

        let mut packet = [0_u8; 2048];
        let n = enc.encode_float(&samples, frame_size, &mut packet).unwrap();

        let mut dec = Decoder::new(&DecoderConfiguration {
            sampling_rate: SamplingRate::Hz48000,
            channels: Channels::Mono,
            gain: 0,
        })
        .unwrap();
        let mut out = vec![0.0_f32; frame_size];
        dec.decode_float(Some(&packet[..n]), &mut out, frame_size, false).unwrap();
        (dec, out)
    }

    #[test]
    fn decode_float_produces_requested_sample_count() {
        let (_dec, out) = round_trip(960);
        assert_eq!(out.len(), 960);
    }

    #[test]
    fn missing_packet_falls_back_to_concealment() {
        let mut dec = Decoder::new(&DecoderConfiguration {
            sampling_rate: SamplingRate::Hz48000,
            channels: Channels::Mono,
            gain: 0,
        })
        .unwrap();
        let mut out = vec![1.0_f32; 960];
        let decoded = dec.decode_float(None, &mut out, 960, false).unwrap();
        assert_eq!(decoded, 960);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn fec_decode_without_redundant_frame_falls_back_to_concealment() {
        let (mut dec, _) = round_trip(960);
        let single_frame_packet = {
            let mut enc = Encoder::new(&EncoderConfiguration {
                sampling_rate: SamplingRate::Hz48000,
                channels: Channels::Mono,
                ..EncoderConfiguration::default()
            })
            .unwrap();
            let samples = vec![0.1_f32; 960];
            let mut packet = [0_u8; 2048];
            let n = enc.encode_float(&samples, 960, &mut packet).unwrap();
            packet[..n].to_vec()
        };
        let mut out = vec![0.0_f32; 960];
        let decoded = dec.decode_float(Some(&single_frame_packet), &mut out, 960, true).unwrap();
        assert_eq!(decoded, 960);
    }

    #[test]
    fn fec_decode_recovers_redundant_frame_from_two_frame_packet() {
        let mut enc = Encoder::new(&EncoderConfiguration {
            sampling_rate: SamplingRate::Hz48000,
            channels: Channels::Mono,
            ..EncoderConfiguration::default()
        })
        .unwrap();
        enc.set_fec(true);
        let samples = vec![0.1_f32; 960];

        let mut first = [0_u8; 2048];
        enc.encode_float(&samples, 960, &mut first).unwrap();
        let mut second = [0_u8; 2048];
        let n2 = enc.encode_float(&samples, 960, &mut second).unwrap();

        assert_eq!(crate::query_packet_frame_count(&second[..n2]).unwrap(), 2);

        let mut dec = Decoder::new(&DecoderConfiguration {
            sampling_rate: SamplingRate::Hz48000,
            channels: Channels::Mono,
            gain: 0,
        })
        .unwrap();
        let mut out = vec![0.0_f32; 960];
        let decoded = dec.decode_float(Some(&second[..n2]), &mut out, 960, true).unwrap();
        assert_eq!(decoded, 960);
    }
}
