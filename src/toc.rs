//! Table-of-contents byte: the reverse direction of the `query_packet_*`
//! helpers in the crate root, needed on the encode side to build a packet's
//! leading byte.

use crate::{Bandwidth, Channels, CodecMode, SamplingRate};

/// One possible frame-packing arrangement for an Opus packet's TOC byte, per
/// RFC 6716 §3.1.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FrameCode {
    /// One frame in the packet.
    One,
    /// Two frames of equal, compressed size.
    TwoEqual,
    /// Two frames of different, compressed size.
    TwoDifferent,
    /// An arbitrary number of frames (CBR or VBR).
    Arbitrary,
}

/// A fully-resolved TOC configuration (mirrors what `query_packet_bandwidth`/
/// `query_packet_channel_count`/`query_packet_codec_mode` read back out).
#[derive(Clone, Copy, Debug)]
pub(crate) struct Toc {
    pub(crate) mode: CodecMode,
    pub(crate) bandwidth: Bandwidth,
    pub(crate) frame_duration_index: u8,
    pub(crate) stereo: bool,
    pub(crate) code: FrameCode,
}

impl Toc {
    /// Builds the TOC byte's configuration number (bits 3-7) from a codec
    /// mode, bandwidth, and frame duration, following the table in RFC 6716
    /// §3.1.
    fn config_number(mode: CodecMode, bandwidth: Bandwidth, frame_duration_index: u8) -> u8 {
        match mode {
            CodecMode::Silk => {
                let bw_idx = match bandwidth {
                    Bandwidth::Narrowband | Bandwidth::Auto => 0,
                    Bandwidth::Mediumband => 1,
                    _ => 2,
                };
                bw_idx * 4 + (frame_duration_index & 0x3)
            }
            CodecMode::Hybrid => {
                let bw_idx = if bandwidth == Bandwidth::Fullband { 1 } else { 0 };
                12 + bw_idx * 2 + (frame_duration_index & 0x1)
            }
            CodecMode::Celt => {
                let bw_idx = match bandwidth {
                    Bandwidth::Narrowband | Bandwidth::Auto => 0,
                    Bandwidth::Wideband => 1,
                    Bandwidth::Superwideband => 2,
                    _ => 3,
                };
                16 + bw_idx * 4 + (frame_duration_index & 0x3)
            }
        }
    }

    /// Generates the one-byte TOC for this configuration.
    pub(crate) fn generate(&self) -> u8 {
        let config = Self::config_number(self.mode, self.bandwidth, self.frame_duration_index);
        let s = u8::from(self.stereo);
        let c = match self.code {
            FrameCode::One => 0,
            FrameCode::TwoEqual => 1,
            FrameCode::TwoDifferent => 2,
            FrameCode::Arbitrary => 3,
        };
        (config << 3) | (s << 2) | c
    }

    /// Picks the frame-duration index (bits 3-4 of the SILK/Hybrid config,
    /// or bits 3-4 of the CELT config) for a frame size at `sampling_rate`.
    pub(crate) fn frame_duration_index(mode: CodecMode, frame_size: usize, sampling_rate: SamplingRate) -> u8 {
        let ms_x2 = (frame_size as u64 * 2000 / sampling_rate as u64) as u8;
        match mode {
            CodecMode::Celt => match ms_x2 {
                5 => 0,
                10 => 1,
                20 => 2,
                _ => 3,
            },
            _ => match ms_x2 {
                20 => 0,
                40 => 1,
                60 => 2,
                _ => 3,
            },
        }
    }

    /// Builds a `Toc` for mono/stereo `channels` coding `frame_size` samples
    /// at `sampling_rate`.
    pub(crate) fn new(
        mode: CodecMode,
        bandwidth: Bandwidth,
        channels: Channels,
        frame_size: usize,
        sampling_rate: SamplingRate,
        code: FrameCode,
    ) -> Self {
        Self {
            mode,
            bandwidth,
            frame_duration_index: Self::frame_duration_index(mode, frame_size, sampling_rate),
            stereo: channels == Channels::Stereo,
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{query_packet_bandwidth, query_packet_channel_count, query_packet_codec_mode};

    #[test]
    fn generated_toc_round_trips_through_query_functions() {
        let toc = Toc::new(
            CodecMode::Celt,
            Bandwidth::Fullband,
            Channels::Stereo,
            960,
            SamplingRate::Hz48000,
            FrameCode::One,
        );
        let byte = toc.generate();
        let packet = [byte];
        assert_eq!(query_packet_codec_mode(&packet), CodecMode::Celt);
        assert_eq!(query_packet_bandwidth(&packet), Bandwidth::Fullband);
        assert_eq!(query_packet_channel_count(&packet), Channels::Stereo);
    }

    #[test]
    fn mono_silk_toc_round_trips() {
        let toc = Toc::new(
            CodecMode::Silk,
            Bandwidth::Wideband,
            Channels::Mono,
            320,
            SamplingRate::Hz16000,
            FrameCode::One,
        );
        let packet = [toc.generate()];
        assert_eq!(query_packet_codec_mode(&packet), CodecMode::Silk);
        assert_eq!(query_packet_channel_count(&packet), Channels::Mono);
    }
}
