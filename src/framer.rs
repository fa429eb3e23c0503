//! Encoder-side packet framing: packs one or more coded frames plus a TOC
//! byte into an Opus packet, the reverse of `parse_packet` in the crate
//! root. Also implements the packet- and multistream-padding operations
//! (`packet_pad`/`packet_unpad`/`multistream_packet_pad`/
//! `multistream_packet_unpad`) that rewrite an already-encoded packet's
//! trailing padding without touching its entropy-coded payloads.

use crate::toc::{FrameCode, Toc};
use crate::{parse_packet, DecoderError, EncoderError};

/// Largest frame length the 1/2-byte length encoding can represent (RFC
/// 6716 §3.2.1).
const MAX_FRAME_LEN: usize = 1275;

/// Encodes one frame length using RFC 6716 §3.2.1's 1- or 2-byte form:
/// lengths below 252 are a single byte; otherwise two bytes `(v1, v2)` with
/// `v1 in 252..=255` and `length == 4*v2 + v1`, matching
/// [`crate::parse_size`].
fn write_frame_length(out: &mut Vec<u8>, len: usize) {
    let len = len.min(MAX_FRAME_LEN);
    if len < 252 {
        out.push(len as u8);
    } else {
        let v1 = 252 + (len % 4);
        let v2 = (len - v1) / 4;
        out.push(v1 as u8);
        out.push(v2 as u8);
    }
}

/// Encodes a padding byte count using RFC 6716 Appendix B's continuation
/// scheme: each `255` byte contributes 254 to the total and is followed by
/// another byte; a final byte below 255 contributes its own value and ends
/// the sequence. Inverse of the `pad` accumulation in [`crate::parse_packet`].
fn write_padding_length(out: &mut Vec<u8>, mut padding: usize) {
    while padding >= 255 {
        out.push(255);
        padding -= 254;
    }
    out.push(padding as u8);
}

fn frames_equal_size(frames: &[&[u8]]) -> bool {
    frames.windows(2).all(|w| w[0].len() == w[1].len())
}

/// Packs `frames` (one coded payload per Opus frame) behind a TOC byte
/// describing `mode`/`bandwidth`/`channels`/`frame_size`, choosing the most
/// compact applicable frame-count code: 0 for a single frame, 1 for two
/// equal-size (CBR) frames, 2 for two differently-sized (VBR) frames, and 3
/// (CBR if every frame shares a size, VBR otherwise) for more than two.
pub(crate) fn pack_frames(toc_base: Toc, frames: &[&[u8]]) -> Result<Vec<u8>, EncoderError> {
    pack_frames_with_padding(toc_base, frames, 0)
}

/// Like [`pack_frames`], but appends `padding` ignored bytes at the end of
/// the packet. Any padding always forces code 3 with the padding flag set,
/// since codes 0-2 have no padding field.
pub(crate) fn pack_frames_with_padding(
    toc_base: Toc,
    frames: &[&[u8]],
    padding: usize,
) -> Result<Vec<u8>, EncoderError> {
    if frames.is_empty() {
        return Err(EncoderError::InvalidArgument("at least one frame is required"));
    }
    if frames.len() > 48 {
        return Err(EncoderError::InvalidArgument("too many frames for one packet"));
    }

    let mut out = Vec::new();

    if padding == 0 && frames.len() == 1 {
        let toc = Toc { code: FrameCode::One, ..toc_base };
        out.push(toc.generate());
        out.extend_from_slice(frames[0]);
        return Ok(out);
    }

    if padding == 0 && frames.len() == 2 {
        if frames_equal_size(frames) {
            let toc = Toc { code: FrameCode::TwoEqual, ..toc_base };
            out.push(toc.generate());
            out.extend_from_slice(frames[0]);
            out.extend_from_slice(frames[1]);
        } else {
            let toc = Toc { code: FrameCode::TwoDifferent, ..toc_base };
            out.push(toc.generate());
            write_frame_length(&mut out, frames[0].len());
            out.extend_from_slice(frames[0]);
            out.extend_from_slice(frames[1]);
        }
        return Ok(out);
    }

    let toc = Toc { code: FrameCode::Arbitrary, ..toc_base };
    out.push(toc.generate());

    let cbr = padding == 0 && frames.len() > 2 && frames_equal_size(frames);
    let count_byte = (frames.len() as u8) | (u8::from(padding > 0) << 6) | (u8::from(cbr) << 7);
    out.push(count_byte);

    if padding > 0 {
        write_padding_length(&mut out, padding);
    }

    if !cbr {
        for frame in &frames[..frames.len() - 1] {
            write_frame_length(&mut out, frame.len());
        }
    }
    for frame in frames {
        out.extend_from_slice(frame);
    }
    out.resize(out.len() + padding, 0);
    Ok(out)
}

/// Packs a single frame using RFC 6716 Appendix B's self-delimited framing
/// (TOC byte, then the frame's length, then its payload) so that several
/// packets can be concatenated and split again without an external length
/// table. Used by [`crate::multistream`] for every stream but the last.
pub(crate) fn pack_frame_self_delimited(toc_base: Toc, frame: &[u8]) -> Vec<u8> {
    let toc = Toc { code: FrameCode::One, ..toc_base };
    let mut out = Vec::with_capacity(frame.len() + 3);
    out.push(toc.generate());
    write_frame_length(&mut out, frame.len());
    out.extend_from_slice(frame);
    out
}

/// Re-encodes `packet`'s frames (preserving every entropy-coded payload
/// byte-for-byte) as a code-3 packet with exactly `padding` trailing ignored
/// bytes.
fn repad(packet: &[u8], padding: usize) -> Result<Vec<u8>, EncoderError> {
    if packet.is_empty() {
        return Err(EncoderError::InvalidArgument("packet is empty"));
    }
    let mut sizes = [0usize; 48];
    let mut payload_offset = 0usize;
    let count = parse_packet(packet, false, None, &mut sizes, Some(&mut payload_offset), None)
        .map_err(|_| EncoderError::InvalidArgument("malformed packet"))?;

    let toc = Toc {
        mode: crate::query_packet_codec_mode(packet),
        bandwidth: crate::query_packet_bandwidth(packet),
        frame_duration_index: (packet[0] >> 3) & 0x3,
        stereo: crate::query_packet_channel_count(packet) == crate::Channels::Stereo,
        code: FrameCode::One,
    };

    let mut offset = payload_offset;
    let mut frames = Vec::with_capacity(count);
    for &size in sizes.iter().take(count) {
        frames.push(&packet[offset..offset + size]);
        offset += size;
    }

    pack_frames_with_padding(toc, &frames, padding)
}

/// Grows `packet` (length `len`) to `new_len` bytes of trailing ignored
/// padding, returning the new packet. Mirrors libopus's `opus_packet_pad`.
pub(crate) fn packet_pad(packet: &[u8], len: usize, new_len: usize) -> Result<Vec<u8>, EncoderError> {
    let packet = &packet[..len];
    if new_len < len {
        return Err(EncoderError::InvalidArgument("new_len must not shrink the packet"));
    }
    if new_len == len {
        return Ok(packet.to_vec());
    }
    repad(packet, new_len - len)
}

/// Strips any trailing ignored padding from `packet` (length `len`),
/// returning the shorter, padding-free packet. Mirrors libopus's
/// `opus_packet_unpad`.
pub(crate) fn packet_unpad(packet: &[u8], len: usize) -> Result<Vec<u8>, DecoderError> {
    repad(&packet[..len], 0).map_err(|_| DecoderError::InvalidPacket)
}
