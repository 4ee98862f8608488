use crate::core::address::Address;
use crate::core::errors::{Error, Result};
use crate::core::family::IpFamily;
use crate::core::section::Section;
use crate::core::segment::Segment;
use lazy_static::lazy_static;
use log::trace;
use std::sync::{Arc, OnceLock};

/*-------------------------------------------------------------------------------------------------
  Interning Caches
-------------------------------------------------------------------------------------------------*/

/*
    Three per-family tables, allocated once and filled lazily:

      single[value]                  prefix-less single-value segments, one slot per value
      by_prefix[prefix-1][high bits] single-value segments with prefix in [1, bits], indexed by
                                     the masked value shifted down to the prefix width
      all_prefixed[prefix-1]         the [0, mask]/prefix full-block segment

    Slots hold immutable segments behind `OnceLock`, so reads are lock-free and a losing racer
    simply drops its redundant construction.
*/

struct FamilyCaches {
    single: Box<[OnceLock<Arc<Segment>>]>,
    by_prefix: Box<[Box<[OnceLock<Arc<Segment>>]>]>,
    all_prefixed: Box<[OnceLock<Arc<Segment>>]>,
    all_range: Arc<Segment>,
    zero_prefix: Arc<Segment>,
    zero: Arc<Segment>,
}

impl FamilyCaches {
    fn new(family: IpFamily) -> Self {
        let bits = family.bits_per_segment();
        let value_count = family.max_segment_value() as usize + 1;
        let single = empty_slots(value_count);
        let by_prefix = (1..=bits)
            .map(|prefix| empty_slots(1usize << prefix))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let all_prefixed = empty_slots(bits as usize);
        let max_value = family.max_segment_value();
        FamilyCaches {
            single,
            by_prefix,
            all_prefixed,
            all_range: Arc::new(
                Segment::new(family, 0, max_value, None).expect("full range is always valid"),
            ),
            zero_prefix: Arc::new(
                Segment::new(family, 0, max_value, Some(0)).expect("full range is always valid"),
            ),
            zero: Arc::new(Segment::new(family, 0, 0, None).expect("zero is always valid")),
        }
    }
}

fn empty_slots(len: usize) -> Box<[OnceLock<Arc<Segment>>]> {
    let mut slots = Vec::with_capacity(len);
    slots.resize_with(len, OnceLock::new);
    slots.into_boxed_slice()
}

lazy_static! {
    static ref V4_CACHES: FamilyCaches = FamilyCaches::new(IpFamily::V4);
    static ref V6_CACHES: FamilyCaches = FamilyCaches::new(IpFamily::V6);
}

fn caches(family: IpFamily) -> &'static FamilyCaches {
    match family {
        IpFamily::V4 => &V4_CACHES,
        IpFamily::V6 => &V6_CACHES,
    }
}

/*-------------------------------------------------------------------------------------------------
  Segment Creator
-------------------------------------------------------------------------------------------------*/

/// Family-agnostic factory for segments, sections, and addresses.
///
/// A creator is a small copyable capability value; all its state is the per-family interning
/// tables above. Prefixed constructions mask the value before storage, so only network bits
/// ever reach a stored segment.
#[derive(Clone, Copy, Debug)]
pub struct SegmentCreator {
    family: IpFamily,
}

impl SegmentCreator {
    pub const fn for_family(family: IpFamily) -> Self {
        SegmentCreator { family }
    }

    pub const fn family(&self) -> IpFamily {
        self.family
    }

    /*-------------------------------------------------------------------------
      Segment Factories
    -------------------------------------------------------------------------*/

    /// Single value, no prefix. Interned per value.
    pub fn segment(&self, value: u64) -> Result<Arc<Segment>> {
        let max_value = self.family.max_segment_value();
        if value > max_value {
            return Err(Error::InvalidArgument(format!(
                "segment value {} exceeds the {:?} maximum {}",
                value, self.family, max_value
            )));
        }
        let slot = &caches(self.family).single[value as usize];
        Ok(Arc::clone(slot.get_or_init(|| {
            trace!("interning {:?} segment {}", self.family, value);
            Arc::new(Segment::new(self.family, value, value, None).expect("value checked"))
        })))
    }

    /// Single value with an optional prefix. The value is masked by the prefix's network mask
    /// before storage; prefix 0 is the interned full-range `/0` segment.
    pub fn segment_prefixed(&self, value: u64, prefix: Option<u32>) -> Result<Arc<Segment>> {
        let prefix = match prefix {
            None => return self.segment(value),
            Some(prefix) => prefix.min(self.family.bits_per_segment()),
        };
        if prefix == 0 {
            return Ok(Arc::clone(&caches(self.family).zero_prefix));
        }
        let max_value = self.family.max_segment_value();
        if value > max_value {
            return Err(Error::InvalidArgument(format!(
                "segment value {} exceeds the {:?} maximum {}",
                value, self.family, max_value
            )));
        }
        let bits = self.family.bits_per_segment();
        let mask = self.family.segment_network_mask(prefix);
        let value = value & mask;
        let value_index = (value >> (bits - prefix)) as usize;
        let slot = &caches(self.family).by_prefix[(prefix - 1) as usize][value_index];
        Ok(Arc::clone(slot.get_or_init(|| {
            trace!("interning {:?} segment {}/{}", self.family, value, prefix);
            Arc::new(Segment::new(self.family, value, value, Some(prefix)).expect("value checked"))
        })))
    }

    /// Range with an optional prefix. Collapsing ranges delegate to the single-value paths;
    /// full prefix blocks intern per prefix; everything else constructs fresh.
    pub fn segment_range(
        &self,
        lower: u64,
        upper: u64,
        prefix: Option<u32>,
    ) -> Result<Arc<Segment>> {
        let max_value = self.family.max_segment_value();
        if lower > upper || upper > max_value {
            return Err(Error::InvalidArgument(format!(
                "segment range [{}, {}] invalid for {:?}",
                lower, upper, self.family
            )));
        }
        match prefix {
            None => {
                if lower == upper {
                    return self.segment(lower);
                }
                if lower == 0 && upper == max_value {
                    return Ok(Arc::clone(&caches(self.family).all_range));
                }
                Ok(Arc::new(Segment::new(self.family, lower, upper, None)?))
            }
            Some(0) => Ok(Arc::clone(&caches(self.family).zero_prefix)),
            Some(prefix) => {
                let prefix = prefix.min(self.family.bits_per_segment());
                let mask = self.family.segment_network_mask(prefix);
                let lower = lower & mask;
                if upper & mask == lower {
                    return self.segment_prefixed(lower, Some(prefix));
                }
                if lower == 0 && upper == mask {
                    let slot = &caches(self.family).all_prefixed[(prefix - 1) as usize];
                    return Ok(Arc::clone(slot.get_or_init(|| {
                        trace!("interning {:?} block segment /{}", self.family, prefix);
                        Arc::new(
                            Segment::new(self.family, 0, max_value, Some(prefix))
                                .expect("full range is always valid"),
                        )
                    })));
                }
                Ok(Arc::new(Segment::new(self.family, lower, upper, Some(prefix))?))
            }
        }
    }

    /// The interned `[0, 0]` segment.
    pub fn zero_segment(&self) -> Arc<Segment> {
        Arc::clone(&caches(self.family).zero)
    }

    /// The interned full-range segment without a prefix.
    pub fn all_range_segment(&self) -> Arc<Segment> {
        Arc::clone(&caches(self.family).all_range)
    }

    /// The interned full-range `/0` segment used for every position past a prefix boundary.
    pub fn zero_prefix_segment(&self) -> Arc<Segment> {
        Arc::clone(&caches(self.family).zero_prefix)
    }

    /// An empty segment buffer sized for `len` entries. Zero-length buffers allocate nothing.
    pub fn segment_array(&self, len: usize) -> Vec<Arc<Segment>> {
        if len == 0 {
            Vec::new()
        } else {
            Vec::with_capacity(len)
        }
    }

    /// An empty section buffer sized for `len` entries.
    pub fn section_array(&self, len: usize) -> Vec<Section> {
        if len == 0 {
            Vec::new()
        } else {
            Vec::with_capacity(len)
        }
    }

    /*-------------------------------------------------------------------------
      Section Factories
    -------------------------------------------------------------------------*/

    /// Assembles a section from prepared segments, deriving the section prefix from the
    /// per-segment prefixes.
    pub fn section(&self, segments: Vec<Arc<Segment>>) -> Result<Section> {
        Section::from_segments(self.family, segments)
    }

    /// Assembles a section and applies `prefix` across the segments first.
    pub fn section_with_prefix(
        &self,
        segments: Vec<Arc<Segment>>,
        prefix: Option<u32>,
    ) -> Result<Section> {
        Section::from_segments_with_prefix(self.family, segments, prefix)
    }

    /// Assembles a section from network-ordered bytes.
    pub fn section_from_bytes(&self, bytes: &[u8], prefix: Option<u32>) -> Result<Section> {
        Section::from_bytes(self.family, bytes, prefix)
    }

    /*-------------------------------------------------------------------------
      Address Factories
    -------------------------------------------------------------------------*/

    pub fn address(&self, section: Section) -> Address {
        Address::new(section)
    }

    /// As [`SegmentCreator::address`], with a zone identifier. Families without zones reject a
    /// present zone.
    pub fn address_with_zone(&self, section: Section, zone: Option<String>) -> Result<Address> {
        match zone {
            Some(zone) if !self.family.has_zone() => Err(Error::InvalidArgument(format!(
                "zone \"{}\" on a {:?} address",
                zone, self.family
            ))),
            zone => Ok(Address::with_zone(section, zone)),
        }
    }

    pub fn address_from_segments(&self, segments: Vec<Arc<Segment>>) -> Result<Address> {
        Ok(Address::new(self.section(segments)?))
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
