use crate::core::creator::SegmentCreator;
use crate::core::division::Division;
use crate::core::errors::{Error, Result};
use crate::core::family::IpFamily;
use crate::core::prefix::{derive_series_prefix, segment_prefix_length_non_null};
use crate::core::segment::Segment;
use crate::core::series::{DivisionSeries, SeriesCache};
use std::sync::{Arc, OnceLock};

/*-------------------------------------------------------------------------------------------------
  Section
-------------------------------------------------------------------------------------------------*/

/// An immutable grouping whose divisions are all segments of one family: the family-agnostic
/// address body.
///
/// The section prefix is derived from the per-segment prefixes at construction, so every
/// construction path upholds the same shape: network segments carry no prefix, one boundary
/// segment carries the remainder, host segments are the interned full-range `/0` segment.
#[derive(Clone, Debug)]
pub struct Section {
    family: IpFamily,
    segments: Vec<Arc<Segment>>,
    prefix: Option<u32>,
    cache: SeriesCache,
    extremes: SectionExtremes,
}

/// Lowest/highest derived sections. A slot initializes at most once; once a value is present,
/// reads take no lock.
#[derive(Debug, Default)]
struct SectionExtremes {
    lower: OnceLock<Arc<Section>>,
    upper: OnceLock<Arc<Section>>,
}

impl Clone for SectionExtremes {
    fn clone(&self) -> Self {
        let clone = SectionExtremes::default();
        if let Some(lower) = self.lower.get() {
            let _ = clone.lower.set(Arc::clone(lower));
        }
        if let Some(upper) = self.upper.get() {
            let _ = clone.upper.set(Arc::clone(upper));
        }
        clone
    }
}

impl Section {
    /*-------------------------------------------------------------------------
      Constructors
    -------------------------------------------------------------------------*/

    /// Assembles a section from prepared segments, deriving the section prefix.
    pub fn from_segments(family: IpFamily, segments: Vec<Arc<Segment>>) -> Result<Self> {
        for segment in &segments {
            if segment.family() != family {
                return Err(Error::InvalidArgument(format!(
                    "{:?} segment in a {:?} section",
                    segment.family(),
                    family
                )));
            }
        }
        let prefix = derive_series_prefix(
            segments
                .iter()
                .map(|segment| (segment.bit_count(), segment.prefix())),
        )?;
        Ok(Section {
            family,
            segments,
            prefix,
            cache: SeriesCache::new(),
            extremes: SectionExtremes::default(),
        })
    }

    /// Assembles a section after spreading `prefix` across the segments: the boundary segment
    /// is re-created with its share of the prefix and every later position becomes the
    /// interned full-range `/0` segment.
    pub fn from_segments_with_prefix(
        family: IpFamily,
        segments: Vec<Arc<Segment>>,
        prefix: Option<u32>,
    ) -> Result<Self> {
        let prefix = match prefix {
            None => return Self::from_segments(family, segments),
            Some(prefix) => prefix,
        };
        let bits_per_segment = family.bits_per_segment();
        if prefix > bits_per_segment * segments.len() as u32 {
            return Err(Error::InvalidArgument(format!(
                "prefix {} exceeds the {}-bit section",
                prefix,
                bits_per_segment * segments.len() as u32
            )));
        }
        let creator = SegmentCreator::for_family(family);
        let mut prefixed = creator.segment_array(segments.len());
        let mut index = 0;
        while index < segments.len() {
            let segment_prefix = segment_prefix_length_non_null(bits_per_segment, prefix, index);
            match segment_prefix {
                None => {
                    prefixed.push(Arc::clone(&segments[index]));
                    index += 1;
                }
                Some(segment_prefix) => {
                    let segment = &segments[index];
                    prefixed.push(creator.segment_range(
                        segment.lower(),
                        segment.upper(),
                        Some(segment_prefix),
                    )?);
                    index += 1;
                    while index < segments.len() {
                        prefixed.push(creator.zero_prefix_segment());
                        index += 1;
                    }
                }
            }
        }
        Self::from_segments(family, prefixed)
    }

    /// Assembles a section from network-ordered bytes.
    pub fn from_bytes(family: IpFamily, bytes: &[u8], prefix: Option<u32>) -> Result<Self> {
        if let Some(prefix) = prefix {
            if prefix as usize > bytes.len() * 8 {
                return Err(Error::InvalidArgument(format!(
                    "prefix {} exceeds {} bytes",
                    prefix,
                    bytes.len()
                )));
            }
        }
        let creator = SegmentCreator::for_family(family);
        let segments = crate::core::prefix::to_segments_from_bytes(bytes, creator, prefix)?;
        Self::from_segments(family, segments)
    }

    /*-------------------------------------------------------------------------
      Accessors
    -------------------------------------------------------------------------*/

    pub const fn family(&self) -> IpFamily {
        self.family
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Result<&Arc<Segment>> {
        self.segments.get(index).ok_or_else(|| {
            Error::IndexOutOfBounds(format!("segment {} of {}", index, self.segments.len()))
        })
    }

    /// The segments in `[from, to)`, as a borrowed slice.
    pub fn segments_in(&self, from: usize, to: usize) -> Result<&[Arc<Segment>]> {
        if from > to || to > self.segments.len() {
            return Err(Error::IndexOutOfBounds(format!(
                "segment range [{}, {}) of {}",
                from,
                to,
                self.segments.len()
            )));
        }
        Ok(&self.segments[from..to])
    }

    /// Copies the segments in `[from, to)` into a fresh buffer.
    pub fn get_segments(&self, from: usize, to: usize) -> Result<Vec<Arc<Segment>>> {
        Ok(self.segments_in(from, to)?.to_vec())
    }

    fn creator(&self) -> SegmentCreator {
        SegmentCreator::for_family(self.family)
    }

    /*-------------------------------------------------------------------------
      Sectioning
    -------------------------------------------------------------------------*/

    /// The section over segments `[from, to)`. The whole range returns `self`; an empty range
    /// is an empty section.
    pub fn subsection(&self, from: usize, to: usize) -> Result<Section> {
        if from == 0 && to == self.segment_count() {
            return Ok(self.clone());
        }
        let segments = self.get_segments(from, to)?;
        Section::from_segments(self.family, segments)
    }

    /// Concatenates `other` after this section. With `extend_prefix` set and this section
    /// prefixed, the appended positions extend the network prefix instead of carrying
    /// `other`'s values: each becomes the full-range `/0` segment.
    pub fn append(&self, other: &Section, extend_prefix: bool) -> Result<Section> {
        if other.family != self.family {
            return Err(Error::InvalidArgument(format!(
                "appending a {:?} section to a {:?} section",
                other.family, self.family
            )));
        }
        let segment_count = self.segment_count();
        let other_segment_count = other.segment_count();
        let mut segments = self.creator().segment_array(segment_count + other_segment_count);
        segments.extend_from_slice(&self.segments);
        if extend_prefix && self.is_prefixed() {
            let all_segment = self.creator().zero_prefix_segment();
            segments.resize_with(segment_count + other_segment_count, || {
                Arc::clone(&all_segment)
            });
        } else {
            segments.extend_from_slice(&other.segments);
        }
        Section::from_segments(self.family, segments)
    }

    /// Replaces the segments starting at `index` with `other`'s. With `extend_prefix` set and
    /// `other` prefixed, the tail after the replacement is zeroed into the extended prefix.
    pub fn replace(&self, other: &Section, index: usize, extend_prefix: bool) -> Result<Section> {
        if other.family != self.family {
            return Err(Error::InvalidArgument(format!(
                "replacing in a {:?} section from a {:?} section",
                self.family, other.family
            )));
        }
        let segment_count = self.segment_count();
        let other_segment_count = other.segment_count();
        if index + other_segment_count > segment_count {
            return Err(Error::AddressSizeMismatch(format!(
                "replacement of {} segments at index {} into {}",
                other_segment_count, index, segment_count
            )));
        }
        if other_segment_count == 0 {
            return Ok(self.clone());
        }
        let mut segments = self.creator().segment_array(segment_count);
        segments.extend_from_slice(&self.segments[..index]);
        segments.extend_from_slice(&other.segments);
        if segment_count > index + other_segment_count {
            if extend_prefix && other.is_prefixed() {
                let all_segment = self.creator().zero_prefix_segment();
                segments.resize_with(segment_count, || Arc::clone(&all_segment));
            } else {
                segments.extend_from_slice(&self.segments[index + other_segment_count..]);
            }
        }
        Section::from_segments(self.family, segments)
    }

    /*-------------------------------------------------------------------------
      Lowest and Highest
    -------------------------------------------------------------------------*/

    /// The single lowest section in this section's range. The prefix does not survive: host
    /// positions become their lowest value, not a block. Cached.
    pub fn to_lower(&self) -> Section {
        self.extreme(true)
    }

    /// The single highest section in this section's range. Cached.
    pub fn to_upper(&self) -> Section {
        self.extreme(false)
    }

    fn extreme(&self, lowest: bool) -> Section {
        if !self.is_prefixed() && !self.is_multiple() {
            return self.clone();
        }
        let slot = if lowest {
            &self.extremes.lower
        } else {
            &self.extremes.upper
        };
        let section = slot.get_or_init(|| {
            let creator = self.creator();
            let segments = self
                .segments
                .iter()
                .map(|segment| {
                    creator.segment(if lowest { segment.lower() } else { segment.upper() })
                })
                .collect::<Result<Vec<_>>>()
                .expect("extreme values fit the segment width");
            Arc::new(
                Section::from_segments(self.family, segments)
                    .expect("prefix-less single segments are always consistent"),
            )
        });
        Section::clone(section)
    }

    /*-------------------------------------------------------------------------
      Reversal
    -------------------------------------------------------------------------*/

    /// The section with its segment order reversed. A prefix never survives reversal; with
    /// `remove_prefix` unset an unprefixed section reverses to itself twice over. Returns
    /// `self` when the reversal changes nothing.
    pub fn reverse_segments(&self, remove_prefix: bool) -> Result<Section> {
        let strip = remove_prefix || self.is_prefixed();
        let mut segments = self.creator().segment_array(self.segment_count());
        for segment in self.segments.iter().rev() {
            segments.push(self.reversal_segment(segment, strip)?);
        }
        self.finish_reversal(segments)
    }

    /// The section with the bit order reversed: segment order and each segment's bits
    /// (`per_byte = false`), or only the bits within each byte, in place (`per_byte = true`).
    pub fn reverse_bits(&self, per_byte: bool) -> Result<Section> {
        let mut segments = self.creator().segment_array(self.segment_count());
        if per_byte {
            for segment in self.segments.iter() {
                segments.push(Arc::new(segment.reverse_bits_per_byte()?));
            }
        } else {
            for segment in self.segments.iter().rev() {
                segments.push(Arc::new(segment.reverse_bits()?));
            }
        }
        self.finish_reversal(segments)
    }

    /// The section with byte order reversed: within each segment only (`per_segment = true`),
    /// or across the whole section.
    pub fn reverse_bytes(&self, per_segment: bool) -> Result<Section> {
        let mut segments = self.creator().segment_array(self.segment_count());
        if per_segment {
            for segment in self.segments.iter() {
                segments.push(Arc::new(segment.reverse_bytes()?));
            }
        } else {
            for segment in self.segments.iter().rev() {
                segments.push(Arc::new(segment.reverse_bytes()?));
            }
        }
        self.finish_reversal(segments)
    }

    fn reversal_segment(&self, segment: &Arc<Segment>, strip: bool) -> Result<Arc<Segment>> {
        if !strip || segment.prefix().is_none() {
            return Ok(Arc::clone(segment));
        }
        self.creator()
            .segment_range(segment.lower(), segment.upper(), None)
    }

    fn finish_reversal(&self, segments: Vec<Arc<Segment>>) -> Result<Section> {
        let is_same = self.prefix.is_none()
            && segments
                .iter()
                .zip(self.segments.iter())
                .all(|(reversed, original)| reversed.is_same_values(original));
        if is_same {
            return Ok(self.clone());
        }
        Section::from_segments(self.family, segments)
    }
}

/*--------------------------------------------------------------------------------------
  Division Series Implementation
--------------------------------------------------------------------------------------*/

impl DivisionSeries for Section {
    fn division_count(&self) -> usize {
        self.segments.len()
    }

    fn division(&self, index: usize) -> Division {
        self.segments[index].to_division()
    }

    fn prefix_length(&self) -> Option<u32> {
        self.prefix
    }

    fn series_cache(&self) -> &SeriesCache {
        &self.cache
    }
}

/*--------------------------------------------------------------------------------------
  Equality, Ordering, Hashing
--------------------------------------------------------------------------------------*/

impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_series(other)
    }
}

impl Eq for Section {}

impl PartialOrd for Section {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Section {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let by_segments = self
            .segments
            .iter()
            .zip(other.segments.iter())
            .map(|(left, right)| left.cmp(right))
            .find(|ordering| ordering.is_ne());
        match by_segments {
            Some(ordering) => ordering,
            None => self.segment_count().cmp(&other.segment_count()),
        }
    }
}

impl std::hash::Hash for Section {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_code());
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
