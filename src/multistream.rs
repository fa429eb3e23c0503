//! N-stream wrapping/unwrapping for RFC 7845 channel-mapping families 0-3.
//!
//! Every stream but the last is framed with RFC 6716 Appendix B
//! self-delimited framing (via [`crate::framer::pack_frame_self_delimited`])
//! so `parse_packet` can recover each stream's exact byte length without an
//! external length table; the last stream runs to the end of the packet, as
//! in a normal (non-multistream) Opus packet.

use crate::{parse_packet, DecoderError, EncoderError};

/// Splits a multistream packet into per-stream byte ranges. `stream_count`
/// is known out-of-band from the channel mapping table (RFC 7845 §5.1.1),
/// exactly as real Opus multistream decoders require.
pub(crate) fn split_streams(packet: &[u8], stream_count: usize) -> Result<Vec<&[u8]>, DecoderError> {
    if stream_count == 0 {
        return Err(DecoderError::InvalidPacket);
    }
    if stream_count == 1 {
        return Ok(vec![packet]);
    }

    let mut streams = Vec::with_capacity(stream_count);
    let mut offset = 0usize;

    for i in 0..stream_count {
        let remaining = &packet[offset..];
        if remaining.is_empty() {
            return Err(DecoderError::InvalidPacket);
        }
        let last = i == stream_count - 1;

        if last {
            streams.push(remaining);
            break;
        }

        let mut sizes = [0usize; 48];
        let mut packet_offset = 0usize;
        parse_packet(remaining, true, None, &mut sizes, None, Some(&mut packet_offset))?;

        streams.push(&remaining[..packet_offset]);
        offset += packet_offset;
    }

    Ok(streams)
}

/// Concatenates per-stream packets (each a normal, non-self-delimited Opus
/// packet as produced by [`crate::framer::pack_frames`]) into one
/// self-delimited multistream packet.
pub(crate) fn join_streams(streams: &[(crate::toc::Toc, Vec<u8>)]) -> Result<Vec<u8>, EncoderError> {
    if streams.is_empty() {
        return Err(EncoderError::InvalidArgument("at least one stream is required"));
    }

    let mut out = Vec::new();
    for (i, (toc, frame)) in streams.iter().enumerate() {
        if i + 1 < streams.len() {
            out.extend(crate::framer::pack_frame_self_delimited(*toc, frame));
        } else {
            out.extend(crate::framer::pack_frames(*toc, &[frame.as_slice()])?);
        }
    }
    Ok(out)
}

/// Grows a multistream packet (`len` bytes) to `new_len` bytes, adding the
/// extra bytes as trailing ignored padding on the last of `num_streams`
/// streams. Mirrors libopus's `opus_multistream_packet_pad`.
pub(crate) fn multistream_packet_pad(
    packet: &[u8],
    len: usize,
    new_len: usize,
    num_streams: usize,
) -> Result<Vec<u8>, EncoderError> {
    if new_len < len {
        return Err(EncoderError::InvalidArgument("new_len must not shrink the packet"));
    }
    if new_len == len {
        return Ok(packet[..len].to_vec());
    }

    let streams = split_streams(&packet[..len], num_streams)
        .map_err(|_| EncoderError::InvalidArgument("malformed multistream packet"))?;
    let extra = new_len - len;
    let mut out = Vec::with_capacity(new_len);
    for (i, stream) in streams.iter().enumerate() {
        if i + 1 < streams.len() {
            out.extend_from_slice(stream);
        } else {
            let padded = crate::framer::packet_pad(stream, stream.len(), stream.len() + extra)?;
            out.extend_from_slice(&padded);
        }
    }
    Ok(out)
}

/// Strips trailing ignored padding from the last of `num_streams` streams in
/// a multistream packet (`len` bytes). Mirrors libopus's
/// `opus_multistream_packet_unpad`.
pub(crate) fn multistream_packet_unpad(
    packet: &[u8],
    len: usize,
    num_streams: usize,
) -> Result<Vec<u8>, DecoderError> {
    let streams = split_streams(&packet[..len], num_streams)?;
    let mut out = Vec::new();
    for (i, stream) in streams.iter().enumerate() {
        if i + 1 < streams.len() {
            out.extend_from_slice(stream);
        } else {
            let unpadded = crate::framer::packet_unpad(stream, stream.len())?;
            out.extend_from_slice(&unpadded);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toc::{FrameCode, Toc};
    use crate::{Bandwidth, Channels, SamplingRate};

    fn toc() -> Toc {
        Toc::new(
            crate::CodecMode::Celt,
            Bandwidth::Fullband,
            Channels::Mono,
            960,
            SamplingRate::Hz48000,
            FrameCode::One,
        )
    }

    #[test]
    fn single_stream_is_returned_unsplit() {
        let packet = crate::framer::pack_frames(toc(), &[&[1_u8, 2, 3]]).unwrap();
        let streams = split_streams(&packet, 1).unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0], &packet[..]);
    }

    #[test]
    fn join_then_split_round_trips_two_streams() {
        let a = vec![1_u8, 2, 3, 4];
        let b = vec![5_u8, 6];
        let joined = join_streams(&[(toc(), a.clone()), (toc(), b.clone())]).unwrap();

        let split = split_streams(&joined, 2).unwrap();
        assert_eq!(crate::query_packet_frame_count(split[0]).unwrap(), 1);
        assert_eq!(crate::query_packet_frame_count(split[1]).unwrap(), 1);

        let mut sizes_a = [0usize; 48];
        let mut payload_offset_a = 0usize;
        parse_packet(split[0], false, None, &mut sizes_a, Some(&mut payload_offset_a), None).unwrap();
        assert_eq!(&split[0][payload_offset_a..payload_offset_a + sizes_a[0]], &a[..]);

        let mut sizes_b = [0usize; 48];
        let mut payload_offset_b = 0usize;
        parse_packet(split[1], false, None, &mut sizes_b, Some(&mut payload_offset_b), None).unwrap();
        assert_eq!(&split[1][payload_offset_b..payload_offset_b + sizes_b[0]], &b[..]);
    }

    #[test]
    fn multistream_pad_then_unpad_preserves_stream_payloads() {
        let a = vec![1_u8, 2, 3, 4];
        let b = vec![5_u8, 6];
        let joined = join_streams(&[(toc(), a.clone()), (toc(), b.clone())]).unwrap();
        let original_len = joined.len();

        let padded = multistream_packet_pad(&joined, original_len, original_len + 30, 2).unwrap();
        assert_eq!(padded.len(), original_len + 30);

        let split = split_streams(&padded, 2).unwrap();
        let mut sizes_a = [0usize; 48];
        let mut payload_offset_a = 0usize;
        parse_packet(split[0], false, None, &mut sizes_a, Some(&mut payload_offset_a), None).unwrap();
        assert_eq!(&split[0][payload_offset_a..payload_offset_a + sizes_a[0]], &a[..]);

        let unpadded = multistream_packet_unpad(&padded, padded.len(), 2).unwrap();
        assert_eq!(unpadded.len(), original_len);
    }
}
