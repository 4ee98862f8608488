use crate::core::division::Division;
use crate::core::errors::{Error, Result};
use log::trace;
use num_bigint::BigUint;
use num_traits::One;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::OnceLock;

/*-------------------------------------------------------------------------------------------------
  Series Cache
-------------------------------------------------------------------------------------------------*/

/// Lazily populated derivations shared by every division series. Caches are monotonic: a slot
/// is computed at most once per instance and never invalidated. Publication is safe
/// (`OnceLock`), so a reader either observes a fully-constructed value or computes its own
/// identical copy.
#[derive(Debug, Default)]
pub struct SeriesCache {
    count: OnceLock<BigUint>,
    lower_bytes: OnceLock<Box<[u8]>>,
    upper_bytes: OnceLock<Box<[u8]>>,
    multiple: OnceLock<bool>,
    // 0 doubles as the unset sentinel, so a series whose hash is genuinely 0 recomputes on
    // every call. Collisions and recomputation are both acceptable.
    hash: AtomicU32,
}

impl SeriesCache {
    pub fn new() -> Self {
        SeriesCache::default()
    }
}

impl Clone for SeriesCache {
    fn clone(&self) -> Self {
        let clone = SeriesCache::new();
        if let Some(count) = self.count.get() {
            let _ = clone.count.set(count.clone());
        }
        if let Some(bytes) = self.lower_bytes.get() {
            let _ = clone.lower_bytes.set(bytes.clone());
        }
        if let Some(bytes) = self.upper_bytes.get() {
            let _ = clone.upper_bytes.set(bytes.clone());
        }
        if let Some(multiple) = self.multiple.get() {
            let _ = clone.multiple.set(*multiple);
        }
        clone
            .hash
            .store(self.hash.load(AtomicOrdering::Relaxed), AtomicOrdering::Relaxed);
        clone
    }
}

/*-------------------------------------------------------------------------------------------------
  Division Series
-------------------------------------------------------------------------------------------------*/

/// The algorithm set shared by every ordered sequence of divisions.
///
/// Implementors supply the division sequence, the series prefix, and a cache record; every
/// derivation — byte materialization, counting, prefix arithmetic, equality, hashing — is
/// provided here, so groupings and sections stay thin records.
pub trait DivisionSeries {
    fn division_count(&self) -> usize;

    /// The division at `index`. Divisions are small copyable values.
    fn division(&self, index: usize) -> Division;

    /// The series-level prefix length, if any.
    fn prefix_length(&self) -> Option<u32>;

    fn series_cache(&self) -> &SeriesCache;

    /*-------------------------------------------------------------------------
      Structure
    -------------------------------------------------------------------------*/

    fn bit_count(&self) -> u32 {
        (0..self.division_count())
            .map(|index| self.division(index).bit_count())
            .sum()
    }

    fn byte_count(&self) -> usize {
        ((self.bit_count() + 7) >> 3) as usize
    }

    fn checked_division(&self, index: usize) -> Result<Division> {
        if index >= self.division_count() {
            return Err(Error::IndexOutOfBounds(format!(
                "division {} of {}",
                index,
                self.division_count()
            )));
        }
        Ok(self.division(index))
    }

    fn is_prefixed(&self) -> bool {
        self.prefix_length().is_some()
    }

    /*-------------------------------------------------------------------------
      Byte Materialization
    -------------------------------------------------------------------------*/

    /// Network-ordered bytes of the lowest value in the series' range. Cached; callers get a
    /// fresh copy each call.
    fn lower_bytes(&self) -> Vec<u8> {
        self.series_cache()
            .lower_bytes
            .get_or_init(|| {
                trace!("materializing lower bytes for {} divisions", self.division_count());
                compute_bytes(self, true)
            })
            .to_vec()
    }

    /// Network-ordered bytes of the highest value in the series' range.
    fn upper_bytes(&self) -> Vec<u8> {
        if !self.is_multiple() {
            return self.lower_bytes();
        }
        self.series_cache()
            .upper_bytes
            .get_or_init(|| compute_bytes(self, false))
            .to_vec()
    }

    /*-------------------------------------------------------------------------
      Counting and Multiplicity
    -------------------------------------------------------------------------*/

    /// Number of single values the series represents, as an exact arbitrary-precision count.
    fn count(&self) -> BigUint {
        self.series_cache()
            .count
            .get_or_init(|| {
                let mut result = BigUint::one();
                if self.division_count() > 0 && self.is_multiple() {
                    for index in 0..self.division_count() {
                        result *= BigUint::from(self.division(index).value_count());
                    }
                }
                result
            })
            .clone()
    }

    /// Whether the series represents more than one value. Scans tail-first, where
    /// range-bearing divisions cluster. Cached.
    fn is_multiple(&self) -> bool {
        *self.series_cache().multiple.get_or_init(|| {
            (0..self.division_count())
                .rev()
                .any(|index| self.division(index).is_multiple())
        })
    }

    /// Whether a prefix is present and spans fewer bits than the series.
    fn is_multiple_by_prefix(&self) -> bool {
        match self.prefix_length() {
            Some(prefix) => prefix < self.bit_count(),
            None => false,
        }
    }

    /// Compares how many values each series represents.
    fn is_more(&self, other: &dyn DivisionSeries) -> Ordering {
        if !self.is_multiple() {
            return if other.is_multiple() {
                Ordering::Less
            } else {
                Ordering::Equal
            };
        }
        if !other.is_multiple() {
            return Ordering::Greater;
        }
        self.count().cmp(&other.count())
    }

    fn is_zero(&self) -> bool {
        (0..self.division_count()).all(|index| self.division(index).is_zero())
    }

    fn is_full_range(&self) -> bool {
        (0..self.division_count()).all(|index| self.division(index).is_full_range())
    }

    /*-------------------------------------------------------------------------
      Prefix Derivations
    -------------------------------------------------------------------------*/

    /// The smallest prefix length such that this series paired with it represents the exact
    /// same range of values.
    fn min_prefix(&self) -> u32 {
        let mut total_prefix = self.bit_count();
        for index in (0..self.division_count()).rev() {
            let division = self.division(index);
            let division_prefix = division.min_prefix();
            if division_prefix == division.bit_count() {
                break;
            }
            total_prefix -= division.bit_count();
            if division_prefix != 0 {
                total_prefix += division_prefix;
                break;
            }
        }
        total_prefix
    }

    /// A prefix length for which the series' range is exactly the lower value plus that
    /// prefix, or `None` when no such prefix exists. A single-valued series yields its bit
    /// count.
    fn equivalent_prefix(&self) -> Option<u32> {
        let count = self.division_count();
        let mut total_prefix = 0;
        for index in 0..count {
            let division = self.division(index);
            let division_prefix = division.block_prefix();
            let mask = !0u64 << (division.bit_count() - division_prefix);
            if !division.matches_with_mask(division.lower(), mask) {
                return None;
            }
            if division_prefix < division.bit_count() {
                // remaining divisions must be full range or no equivalent prefix exists
                for later in (index + 1)..count {
                    if !self.division(later).is_full_range() {
                        return None;
                    }
                }
                return Some(total_prefix + division_prefix);
            }
            total_prefix += division_prefix;
        }
        Some(total_prefix)
    }

    /// Whether the series' `[lower, upper]` range equals the block determined by the lower
    /// value and `prefix`.
    fn is_range_equivalent(&self, prefix: u32) -> bool {
        let mut non_prefix_bits = self.bit_count().saturating_sub(prefix);
        for index in (0..self.division_count()).rev() {
            let division = self.division(index);
            let bit_count = division.bit_count();
            if non_prefix_bits == 0 {
                if division.is_multiple() {
                    return false;
                }
            } else {
                let non_prefix_division_bits = bit_count.min(non_prefix_bits);
                let division_prefix_mask = !0u64 << non_prefix_division_bits;
                let lower = division.lower();
                if (lower | !division_prefix_mask) != division.upper()
                    || (lower & division_prefix_mask) != lower
                {
                    return false;
                }
                non_prefix_bits = non_prefix_bits.saturating_sub(bit_count);
            }
        }
        true
    }

    fn is_range_equivalent_to_prefix(&self) -> bool {
        match self.prefix_length() {
            Some(prefix) => self.is_range_equivalent(prefix),
            None => !self.is_multiple(),
        }
    }

    /// Rounds the current prefix to the next (`next_segment = true`) or previous segment
    /// boundary. An unprefixed series rounds from 0 when its range is the full block,
    /// otherwise from the bit count; `skip_bit_count_prefix` lets the downward direction round
    /// from the bit count instead of stopping at it.
    fn adjusted_prefix_by_segment(
        &self,
        next_segment: bool,
        bits_per_segment: u32,
        skip_bit_count_prefix: bool,
    ) -> u32 {
        let bit_count = self.bit_count();
        if next_segment {
            let prefix = match self.prefix_length() {
                None => {
                    return if self.min_prefix() == 0 { 0 } else { bit_count };
                }
                Some(prefix) => prefix,
            };
            if prefix == bit_count {
                return bit_count;
            }
            let adjustment = prefix % bits_per_segment;
            prefix + bits_per_segment - adjustment
        } else {
            let prefix = match self.prefix_length() {
                None => {
                    if self.min_prefix() == 0 {
                        return 0;
                    }
                    if skip_bit_count_prefix {
                        bit_count
                    } else {
                        return bit_count;
                    }
                }
                Some(0) => return 0,
                Some(prefix) => prefix,
            };
            let adjustment = ((prefix - 1) % bits_per_segment) + 1;
            prefix - adjustment
        }
    }

    /// The current prefix moved by `adjustment`, clamped into `[0, bit_count]` under the
    /// `floor`/`ceiling` flags. Unprefixed series adjust from 0 when the range is the full
    /// block, otherwise from the bit count.
    fn adjusted_prefix(&self, adjustment: i64, floor: bool, ceiling: bool) -> i64 {
        let prefix = self.prefix_length().unwrap_or_else(|| {
            if self.min_prefix() == 0 {
                0
            } else {
                self.bit_count()
            }
        });
        let mut result = prefix as i64 + adjustment;
        if ceiling {
            result = result.min(self.bit_count() as i64);
        }
        if floor {
            result = result.max(0);
        }
        result
    }

    /*-------------------------------------------------------------------------
      Equality and Hashing
    -------------------------------------------------------------------------*/

    /// Structural equality: same division count, pairwise same `(bit_count, lower, upper)`.
    /// Prefixes do not participate.
    fn is_same_series(&self, other: &dyn DivisionSeries) -> bool {
        if self.division_count() != other.division_count() {
            return false;
        }
        (0..self.division_count())
            .all(|index| self.division(index).is_same_values(&other.division(index)))
    }

    /// The series hash, folded from each division's values. Agrees with
    /// [`is_same_series`](DivisionSeries::is_same_series): equal series hash equally.
    fn hash_code(&self) -> u32 {
        let cached = self.series_cache().hash.load(AtomicOrdering::Relaxed);
        if cached != 0 {
            return cached;
        }
        let mut full_result: u32 = 1;
        for index in 0..self.division_count() {
            let division = self.division(index);
            let value = division.lower();
            let shifted = value >> 32;
            let adjusted = if shifted == 0 { value as u32 } else { (value ^ shifted) as u32 };
            full_result = full_result.wrapping_mul(31).wrapping_add(adjusted);
            let upper_value = division.upper();
            if upper_value != value {
                let shifted = upper_value >> 32;
                let adjusted = if shifted == 0 {
                    upper_value as u32
                } else {
                    (upper_value ^ shifted) as u32
                };
                full_result = full_result.wrapping_mul(31).wrapping_add(adjusted);
            }
        }
        self.series_cache()
            .hash
            .store(full_result, AtomicOrdering::Relaxed);
        full_result
    }

    /*-------------------------------------------------------------------------
      Range Expressibility
    -------------------------------------------------------------------------*/

    /// Whether the series needs — and supports — a dual `lower-upper` rendering. `Ok(true)`
    /// when some division is multiple and the sequence can be expressed as a single range;
    /// an error when a non-full-range multiple division precedes another multiple division.
    fn is_dual_range(&self) -> Result<bool> {
        let count = self.division_count();
        for index in 0..count {
            if self.division(index).is_multiple() {
                // the answer is known; what remains is deciding whether the shape is expressible
                let mut is_last_full = true;
                for later in (0..count).rev() {
                    let division = self.division(later);
                    if division.is_multiple() {
                        if !is_last_full {
                            return Err(Error::MismatchedSegmentRanges(format!(
                                "multiple division {} precedes a later multiple division",
                                later
                            )));
                        }
                        is_last_full = division.is_full_range();
                    } else {
                        is_last_full = false;
                    }
                }
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/*--------------------------------------------------------------------------------------
  Byte Packing
--------------------------------------------------------------------------------------*/

/// Packs division values into network-ordered bytes, filling from the last division backward.
/// Divisions that do not align with byte boundaries carry their unaligned head into the next
/// (earlier) byte.
fn compute_bytes<S: DivisionSeries + ?Sized>(series: &S, low: bool) -> Box<[u8]> {
    let byte_count = series.byte_count();
    let mut bytes = vec![0u8; byte_count];
    let mut byte_index = byte_count;
    let mut bit_index: u32 = 8;
    'divisions: for division_index in (0..series.division_count()).rev() {
        let division = series.division(division_index);
        let mut value = if low { division.lower() } else { division.upper() };
        let mut division_bits = division.bit_count();
        if byte_index == 0 {
            break;
        }
        loop {
            bytes[byte_index - 1] |= (value << (8 - bit_index)) as u8;
            value >>= bit_index;
            if division_bits < bit_index {
                bit_index -= division_bits;
                break;
            }
            division_bits -= bit_index;
            bit_index = 8;
            byte_index -= 1;
            if division_bits == 0 {
                break;
            }
            if byte_index == 0 {
                break 'divisions;
            }
        }
    }
    bytes.into_boxed_slice()
}
