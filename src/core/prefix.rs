use crate::core::creator::SegmentCreator;
use crate::core::errors::{Error, Result};
use crate::core::segment::Segment;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  Prefix Calculus
-------------------------------------------------------------------------------------------------*/

/*
    Across an address the per-segment prefixes look like:

    IPv6: (None):...:(None):(1 to 16):(0):...:(0)
    IPv4: (None).(1 to 8).(0)...

    A segment entirely inside the network portion carries no prefix of its own, the boundary
    segment carries the remainder, and every host segment carries 0.
*/

/// Maps a series-level prefix length down to the prefix of the segment at `segment_index`.
/// Returns `None` when the series itself has no prefix.
pub fn segment_prefix_length(
    bits_per_segment: u32,
    prefix_length: Option<u32>,
    segment_index: usize,
) -> Option<u32> {
    prefix_length
        .and_then(|prefix| segment_prefix_length_non_null(bits_per_segment, prefix, segment_index))
}

/// As [`segment_prefix_length`], for a series known to be prefixed.
pub fn segment_prefix_length_non_null(
    bits_per_segment: u32,
    prefix_length: u32,
    segment_index: usize,
) -> Option<u32> {
    let decrement = segment_index as i64 * bits_per_segment as i64;
    segment_prefix(bits_per_segment, prefix_length as i64 - decrement)
}

/// Maps the number of prefixed bits remaining at a segment onto that segment's own prefix:
/// none of the segment's bits matter (`Some(0)`), some do (`Some(prefixed_bits)`), or all of
/// them do (`None`).
pub fn segment_prefix(segment_bits: u32, prefixed_bits: i64) -> Option<u32> {
    if prefixed_bits <= 0 {
        Some(0)
    } else if prefixed_bits <= segment_bits as i64 {
        Some(prefixed_bits as u32)
    } else {
        None
    }
}

/*--------------------------------------------------------------------------------------
  Series Prefix Derivation
--------------------------------------------------------------------------------------*/

/// Recovers a series-level prefix from per-division prefixes, validating the shape above:
/// unprefixed divisions, then at most one boundary division carrying `Some(p)`, then `/0`
/// divisions to the end. `items` yields `(bit_count, prefix)` pairs in order.
pub fn derive_series_prefix<I>(items: I) -> Result<Option<u32>>
where
    I: IntoIterator<Item = (u32, Option<u32>)>,
{
    let mut bits_so_far: u32 = 0;
    let mut derived: Option<u32> = None;
    for (bit_count, prefix) in items {
        match (derived, prefix) {
            (None, None) => {}
            (None, Some(prefix)) => {
                if prefix > bit_count {
                    return Err(Error::InvalidArgument(format!(
                        "division prefix {} exceeds its width {}",
                        prefix, bit_count
                    )));
                }
                derived = Some(bits_so_far + prefix);
            }
            (Some(_), Some(0)) => {}
            (Some(series_prefix), tail) => {
                return Err(Error::InvalidArgument(format!(
                    "division prefix {:?} follows the series prefix boundary at bit {}",
                    tail, series_prefix
                )));
            }
        }
        bits_so_far += bit_count;
    }
    Ok(derived)
}

/*-------------------------------------------------------------------------------------------------
  Segment Assembly
-------------------------------------------------------------------------------------------------*/

/// Source of one segment value per position, given the segment index and the byte width of a
/// segment. Mirrors the byte-oriented callers that feed address construction.
pub type SegmentValueProvider<'a> = &'a dyn Fn(usize, usize) -> u64;

/// Builds the segment array for a value packed into a `u64`, least-significant segment last.
pub fn to_segments_from_value(
    value: u64,
    segment_count: usize,
    creator: SegmentCreator,
    prefix_length: Option<u32>,
) -> Result<Vec<Arc<Segment>>> {
    let bits_per_segment = creator.family().bits_per_segment();
    let segment_mask = creator.family().max_segment_value();
    let mut segments = creator.segment_array(segment_count);
    for segment_index in 0..segment_count {
        let segment_prefix =
            segment_prefix_length(bits_per_segment, prefix_length, segment_index);
        let shift = bits_per_segment as usize * (segment_count - 1 - segment_index);
        let segment_value = if shift >= 64 { 0 } else { (value >> shift) & segment_mask };
        segments.push(creator.segment_prefixed(segment_value, segment_prefix)?);
    }
    Ok(segments)
}

/// Builds the segment array from per-index value providers. With both providers present each
/// segment spans `[lower, upper]`; with one, segments are single-valued. The moment a segment
/// receives prefix 0, the rest of the array is the interned full-range `/0` segment.
pub fn to_segments_from_providers(
    lower_provider: Option<SegmentValueProvider>,
    upper_provider: Option<SegmentValueProvider>,
    segment_count: usize,
    creator: SegmentCreator,
    prefix_length: Option<u32>,
) -> Result<Vec<Arc<Segment>>> {
    let family = creator.family();
    let bits_per_segment = family.bits_per_segment();
    let bytes_per_segment = family.bytes_per_segment();
    let mut segments = creator.segment_array(segment_count);
    let mut segment_index = 0;
    while segment_index < segment_count {
        let segment_prefix =
            segment_prefix_length(bits_per_segment, prefix_length, segment_index);
        if segment_prefix == Some(0) {
            let all = creator.segment_range(0, family.max_segment_value(), Some(0))?;
            while segment_index < segment_count {
                segments.push(Arc::clone(&all));
                segment_index += 1;
            }
            break;
        }
        let segment = match (lower_provider, upper_provider) {
            (Some(lower), Some(upper)) => {
                let low = lower(segment_index, bytes_per_segment);
                let up = upper(segment_index, bytes_per_segment);
                creator.segment_range(low, up, segment_prefix)?
            }
            (Some(single), None) | (None, Some(single)) => {
                creator.segment_prefixed(single(segment_index, bytes_per_segment), segment_prefix)?
            }
            (None, None) => {
                return Err(Error::InvalidArgument(
                    "segment assembly requires at least one value provider".into(),
                ))
            }
        };
        segments.push(segment);
        segment_index += 1;
    }
    Ok(segments)
}

/// Builds the segment array from network-ordered bytes. Byte length must be a whole number of
/// segments. The prefix-0 tail rule applies as in [`to_segments_from_providers`].
pub fn to_segments_from_bytes(
    bytes: &[u8],
    creator: SegmentCreator,
    prefix_length: Option<u32>,
) -> Result<Vec<Arc<Segment>>> {
    let family = creator.family();
    let bytes_per_segment = family.bytes_per_segment();
    if bytes.len() % bytes_per_segment != 0 {
        return Err(Error::InvalidArgument(format!(
            "{} bytes do not form whole {:?} segments",
            bytes.len(),
            family
        )));
    }
    let bits_per_segment = family.bits_per_segment();
    let segment_count = bytes.len() / bytes_per_segment;
    let mut segments = creator.segment_array(segment_count);
    for segment_index in 0..segment_count {
        let segment_prefix =
            segment_prefix_length(bits_per_segment, prefix_length, segment_index);
        if segment_prefix == Some(0) {
            let all = creator.segment_range(0, family.max_segment_value(), Some(0))?;
            segments.resize_with(segment_count, || Arc::clone(&all));
            break;
        }
        let mut value: u64 = 0;
        let start = segment_index * bytes_per_segment;
        for byte in &bytes[start..start + bytes_per_segment] {
            value = (value << 8) | *byte as u64;
        }
        segments.push(creator.segment_prefixed(value, segment_prefix)?);
    }
    Ok(segments)
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
