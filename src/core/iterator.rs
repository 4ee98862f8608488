use crate::core::address::Address;
use crate::core::creator::SegmentCreator;
use crate::core::section::Section;
use crate::core::segment::Segment;
use crate::core::series::DivisionSeries;
use std::iter::FusedIterator;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  Segment Array Iteration
-------------------------------------------------------------------------------------------------*/

/// Lazily enumerates every combination of per-segment values as fresh segment arrays, in
/// lexicographic order: the most significant segment varies slowest.
///
/// A ripple-carry counter over per-segment cursors; nothing is materialized beyond the current
/// combination. Yielded segments are single-valued, prefix-less, and interned.
pub struct SegmentArrays {
    creator: SegmentCreator,
    lowers: Vec<u64>,
    uppers: Vec<u64>,
    current: Vec<u64>,
    done: bool,
}

impl SegmentArrays {
    pub(crate) fn new(section: &Section) -> Self {
        let lowers: Vec<u64> = section.segments().iter().map(|s| s.lower()).collect();
        let uppers: Vec<u64> = section.segments().iter().map(|s| s.upper()).collect();
        let current = lowers.clone();
        SegmentArrays {
            creator: SegmentCreator::for_family(section.family()),
            lowers,
            uppers,
            current,
            done: false,
        }
    }

    fn emit(&self) -> Vec<Arc<Segment>> {
        self.current
            .iter()
            .map(|value| {
                self.creator
                    .segment(*value)
                    .expect("iterated values stay within the segment range")
            })
            .collect()
    }

    /// Advances the rightmost segment that still has values, resetting everything to its
    /// right to its first value. Marks the iterator done when no segment can advance.
    fn increment(&mut self) {
        for index in (0..self.current.len()).rev() {
            if self.current[index] < self.uppers[index] {
                self.current[index] += 1;
                for later in index + 1..self.current.len() {
                    self.current[later] = self.lowers[later];
                }
                return;
            }
        }
        self.done = true;
    }
}

impl Iterator for SegmentArrays {
    type Item = Vec<Arc<Segment>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.emit();
        self.increment();
        Some(item)
    }
}

impl FusedIterator for SegmentArrays {}

/*-------------------------------------------------------------------------------------------------
  Section and Address Iteration
-------------------------------------------------------------------------------------------------*/

/// Iterates the single sections in a section's range.
///
/// A section representing one value yields itself once, prefix included; a multiple section
/// yields prefix-less single-valued sections through the creator.
pub struct SectionIter {
    original: Option<Section>,
    arrays: Option<SegmentArrays>,
}

impl Iterator for SectionIter {
    type Item = Section;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.arrays {
            None => self.original.take(),
            Some(arrays) => {
                let segments = arrays.next()?;
                let family = arrays.creator.family();
                Some(
                    Section::from_segments(family, segments)
                        .expect("prefix-less single segments are always consistent"),
                )
            }
        }
    }
}

impl FusedIterator for SectionIter {}

/// Iterates the single addresses in an address's range, wrapping [SectionIter].
pub struct AddressIter {
    original: Option<Address>,
    arrays: Option<SegmentArrays>,
}

impl Iterator for AddressIter {
    type Item = Address;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.arrays {
            None => self.original.take(),
            Some(arrays) => {
                let segments = arrays.next()?;
                let creator = arrays.creator;
                Some(
                    creator
                        .address_from_segments(segments)
                        .expect("prefix-less single segments are always consistent"),
                )
            }
        }
    }
}

impl FusedIterator for AddressIter {}

impl Section {
    /// Iterates the per-segment value combinations as segment arrays.
    pub fn segment_arrays(&self) -> SegmentArrays {
        SegmentArrays::new(self)
    }

    /// Iterates the single sections in this section's range, lexicographically.
    pub fn iter(&self) -> SectionIter {
        if !self.is_multiple() {
            SectionIter {
                original: Some(self.clone()),
                arrays: None,
            }
        } else {
            SectionIter {
                original: None,
                arrays: Some(SegmentArrays::new(self)),
            }
        }
    }
}

impl Address {
    /// Iterates the single addresses in this address's range, lexicographically.
    pub fn iter(&self) -> AddressIter {
        if !self.section().is_multiple() {
            AddressIter {
                original: Some(self.clone()),
                arrays: None,
            }
        } else {
            AddressIter {
                original: None,
                arrays: Some(SegmentArrays::new(self.section())),
            }
        }
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
