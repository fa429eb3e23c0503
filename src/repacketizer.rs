//! Merges and splits already-encoded Opus packets without touching the
//! entropy-coded payloads, built on `parse_packet` (read side) and
//! `framer::pack_frames` (write side).

use crate::framer::pack_frames;
use crate::toc::{FrameCode, Toc};
use crate::{parse_packet, query_packet_bandwidth, query_packet_channel_count, DecoderError, EncoderError};

/// Accumulates frames from one or more packets that share a TOC
/// configuration, to be re-emitted as a single packet.
#[derive(Default)]
pub(crate) struct Repacketizer {
    frames: Vec<Vec<u8>>,
    toc: Option<Toc>,
}

impl Repacketizer {
    /// Creates an empty repacketizer.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends every frame in `packet` to the accumulator. All packets
    /// passed to the same repacketizer instance must share the same codec
    /// mode, bandwidth, channel count, and frame duration (RFC 6716's
    /// repacketization constraint); the first packet's TOC is reused when
    /// repacking.
    pub(crate) fn cat(&mut self, packet: &[u8]) -> Result<(), DecoderError> {
        if packet.is_empty() {
            return Err(DecoderError::InvalidPacket);
        }

        let mut sizes = [0usize; 48];
        let mut payload_offset = 0usize;
        let count = parse_packet(packet, false, None, &mut sizes, Some(&mut payload_offset), None)?;

        let mut offset = payload_offset;
        for &size in sizes.iter().take(count) {
            self.frames.push(packet[offset..offset + size].to_vec());
            offset += size;
        }

        if self.toc.is_none() {
            self.toc = Some(Toc {
                mode: crate::query_packet_codec_mode(packet),
                bandwidth: query_packet_bandwidth(packet),
                frame_duration_index: (packet[0] >> 3) & 0x3,
                stereo: query_packet_channel_count(packet) == crate::Channels::Stereo,
                code: FrameCode::One,
            });
        }

        Ok(())
    }

    /// Number of frames accumulated so far.
    pub(crate) fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Emits every accumulated frame as a single packet and clears the
    /// accumulator.
    pub(crate) fn out(&mut self) -> Result<Vec<u8>, EncoderError> {
        let toc = self
            .toc
            .ok_or(EncoderError::InvalidArgument("no packets accumulated"))?;
        let refs: Vec<&[u8]> = self.frames.iter().map(Vec::as_slice).collect();
        let packet = pack_frames(toc, &refs)?;
        self.frames.clear();
        self.toc = None;
        Ok(packet)
    }

    /// Emits frames `[start, end)` as a single packet, leaving the rest
    /// accumulated.
    pub(crate) fn out_range(&mut self, start: usize, end: usize) -> Result<Vec<u8>, EncoderError> {
        let toc = self
            .toc
            .ok_or(EncoderError::InvalidArgument("no packets accumulated"))?;
        if start >= end || end > self.frames.len() {
            return Err(EncoderError::InvalidArgument("frame range out of bounds"));
        }
        let refs: Vec<&[u8]> = self.frames[start..end].iter().map(Vec::as_slice).collect();
        pack_frames(toc, &refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::pack_frames;
    use crate::toc::Toc;
    use crate::{Bandwidth, Channels, CodecMode, SamplingRate};

    fn sample_packet(payload: &[u8]) -> Vec<u8> {
        let toc = Toc::new(
            CodecMode::Celt,
            Bandwidth::Fullband,
            Channels::Mono,
            960,
            SamplingRate::Hz48000,
            crate::toc::FrameCode::One,
        );
        pack_frames(toc, &[payload]).unwrap()
    }

    #[test]
    fn cat_then_out_merges_two_single_frame_packets() {
        let mut rp = Repacketizer::new();
        rp.cat(&sample_packet(&[1, 2, 3])).unwrap();
        rp.cat(&sample_packet(&[4, 5])).unwrap();
        assert_eq!(rp.frame_count(), 2);

        let merged = rp.out().unwrap();
        assert_eq!(crate::query_packet_frame_count(&merged).unwrap(), 2);
        assert_eq!(rp.frame_count(), 0);
    }

    #[test]
    fn out_range_emits_a_subset_without_clearing() {
        let mut rp = Repacketizer::new();
        rp.cat(&sample_packet(&[1])).unwrap();
        rp.cat(&sample_packet(&[2])).unwrap();
        rp.cat(&sample_packet(&[3])).unwrap();

        let subset = rp.out_range(0, 2).unwrap();
        assert_eq!(crate::query_packet_frame_count(&subset).unwrap(), 2);
        assert_eq!(rp.frame_count(), 3);
    }
}
