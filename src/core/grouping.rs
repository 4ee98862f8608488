use crate::core::division::Division;
use crate::core::errors::{Error, Result};
use crate::core::prefix::{derive_series_prefix, segment_prefix};
use crate::core::series::{DivisionSeries, SeriesCache};
use log::trace;

/*-------------------------------------------------------------------------------------------------
  Division Grouping
-------------------------------------------------------------------------------------------------*/

/// An immutable ordered sequence of divisions with an optional overall prefix length.
///
/// The grouping is the generic substrate under sections and addresses: divisions may have any
/// mix of widths, as produced by [`regroup`]. The series prefix is derived from the
/// per-division prefixes at construction and validated for consistency.
#[derive(Clone, Debug)]
pub struct DivisionGrouping {
    divisions: Vec<Division>,
    prefix: Option<u32>,
    cache: SeriesCache,
}

impl DivisionGrouping {
    pub fn new(divisions: Vec<Division>) -> Result<Self> {
        let prefix = derive_series_prefix(
            divisions
                .iter()
                .map(|division| (division.bit_count(), division.prefix())),
        )?;
        Ok(DivisionGrouping {
            divisions,
            prefix,
            cache: SeriesCache::new(),
        })
    }

    pub fn divisions(&self) -> &[Division] {
        &self.divisions
    }

    /// Regroups at a new digit size, carrying this grouping's prefix through.
    pub fn regrouped(&self, bits_per_digit: u32) -> Result<DivisionGrouping> {
        regroup_with_prefix(self, bits_per_digit, self.prefix)
    }
}

impl DivisionSeries for DivisionGrouping {
    fn division_count(&self) -> usize {
        self.divisions.len()
    }

    fn division(&self, index: usize) -> Division {
        self.divisions[index]
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

impl PartialEq for DivisionGrouping {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_series(other)
    }
}

impl Eq for DivisionGrouping {}

impl PartialOrd for DivisionGrouping {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DivisionGrouping {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.divisions.cmp(&other.divisions)
    }
}

impl std::hash::Hash for DivisionGrouping {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_code());
    }
}

/*-------------------------------------------------------------------------------------------------
  Regrouping
-------------------------------------------------------------------------------------------------*/

/// Recomputes a series' bit layout at `bits_per_digit` bits per digit, dropping any prefix.
pub fn regroup(series: &dyn DivisionSeries, bits_per_digit: u32) -> Result<DivisionGrouping> {
    regroup_with_prefix(series, bits_per_digit, None)
}

/// Recomputes a series' bit layout at `bits_per_digit` bits per digit.
///
/// Division widths are multiples of the digit size except the first produced (most
/// significant), which carries the leftover; no division exceeds the widest digit-aligned
/// width a division value can hold. Values stream most-significant-first from the old
/// divisions into the new, lower and upper in parallel, and each new division derives its
/// prefix from `network_prefix` and carries radix `2^bits_per_digit`.
pub fn regroup_with_prefix(
    series: &dyn DivisionSeries,
    bits_per_digit: u32,
    network_prefix: Option<u32>,
) -> Result<DivisionGrouping> {
    if bits_per_digit == 0 || bits_per_digit >= 32 {
        // past 5 bits per digit (radix 32) the 36 alphanumeric digit characters run out
        // quickly; a digit of machine-word width has no workable character set at all
        return Err(Error::InvalidArgument(format!(
            "bits per digit {} outside [1, 31]",
            bits_per_digit
        )));
    }
    if series.division_count() == 0 {
        return DivisionGrouping::new(Vec::new());
    }

    // carve the total width into digit-aligned division widths, least significant first
    let mut bit_count = series.bit_count();
    let mut bit_divs: Vec<u32> = Vec::new();
    let largest_bit_count = Division::MAX_BIT_COUNT - Division::MAX_BIT_COUNT % bits_per_digit;
    loop {
        if bit_count <= largest_bit_count {
            let modulus = bit_count % bits_per_digit;
            let second_last = bit_count - modulus;
            if second_last > 0 {
                bit_divs.push(second_last);
            }
            if modulus > 0 {
                bit_divs.push(modulus);
            }
            break;
        }
        bit_count -= largest_bit_count;
        bit_divs.push(largest_bit_count);
    }

    trace!(
        "regrouping {} bits into {} divisions of {} bits per digit",
        series.bit_count(),
        bit_divs.len(),
        bits_per_digit
    );

    let radix = 1u32 << bits_per_digit;
    let div_count = bit_divs.len();
    let mut divisions: Vec<Division> = Vec::with_capacity(div_count);

    let mut current_division = 0;
    let mut source = series.division(current_division);
    let mut source_lower = source.lower();
    let mut source_upper = source.upper();
    let mut source_bits = source.bit_count();
    let mut bits_so_far: u32 = 0;

    // fill the new divisions one by one, most significant first
    for index in (0..div_count).rev() {
        let original_div_bit_size = bit_divs[index];
        let mut div_bit_size = original_div_bit_size;
        let mut div_lower: u64 = 0;
        let mut div_upper: u64 = 0;
        loop {
            if source_bits >= div_bit_size {
                let diff = source_bits - div_bit_size;
                div_lower |= source_lower >> diff;
                div_upper |= source_upper >> diff;
                let remainder_mask = !(!0u64 << diff);
                source_lower &= remainder_mask;
                source_upper &= remainder_mask;
                source_bits = diff;
                if div_lower > div_upper {
                    return Err(Error::InvalidArgument(format!(
                        "range does not split at bit {}: [{}, {}] inverted",
                        bits_so_far, div_lower, div_upper
                    )));
                }
                let division_prefix = network_prefix.and_then(|prefix| {
                    segment_prefix(original_div_bit_size, prefix as i64 - bits_so_far as i64)
                });
                divisions.push(Division::new_prefixed(
                    original_div_bit_size,
                    div_lower,
                    div_upper,
                    division_prefix,
                    radix,
                )?);
                if source_bits == 0 && index > 0 {
                    current_division += 1;
                    source = series.division(current_division);
                    source_lower = source.lower();
                    source_upper = source.upper();
                    source_bits = source.bit_count();
                }
                break;
            }
            let diff = div_bit_size - source_bits;
            div_lower |= source_lower << diff;
            div_upper |= source_upper << diff;
            div_bit_size = diff;
            current_division += 1;
            source = series.division(current_division);
            source_lower = source.lower();
            source_upper = source.upper();
            source_bits = source.bit_count();
        }
        bits_so_far += original_div_bit_size;
    }

    DivisionGrouping::new(divisions)
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use num_traits::One;

    fn div(bit_count: u32, lower: u64, upper: u64) -> Division {
        Division::new(bit_count, lower, upper).unwrap()
    }

    fn prefixed(bit_count: u32, lower: u64, upper: u64, prefix: Option<u32>) -> Division {
        Division::new_prefixed(bit_count, lower, upper, prefix, Division::DEFAULT_RADIX).unwrap()
    }

    fn grouping(divisions: Vec<Division>) -> DivisionGrouping {
        DivisionGrouping::new(divisions).unwrap()
    }

    /*----------------------------------------------------------------------------------
      Construction and Prefix Derivation
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_prefix_derivation() {
        let plain = grouping(vec![div(8, 10, 10), div(8, 0, 0)]);
        assert_eq!(plain.prefix_length(), None);

        let block = grouping(vec![
            prefixed(8, 10, 10, Some(8)),
            prefixed(8, 0, 255, Some(0)),
        ]);
        assert_eq!(block.prefix_length(), Some(8));
        assert!(block.is_prefixed());

        assert!(DivisionGrouping::new(vec![
            prefixed(8, 10, 10, Some(4)),
            div(8, 0, 0),
        ])
        .is_err());
    }

    /*----------------------------------------------------------------------------------
      Byte Materialization
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_bytes_aligned() {
        let loopback = grouping(vec![
            div(8, 127, 127),
            div(8, 0, 0),
            div(8, 0, 0),
            div(8, 1, 1),
        ]);
        assert_eq!(loopback.lower_bytes(), vec![0x7F, 0x00, 0x00, 0x01]);
        assert_eq!(loopback.upper_bytes(), vec![0x7F, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_bytes_unaligned_divisions() {
        // 2 + 30 bits: the 30-bit division's top bits carry into the first byte
        let regrouped = grouping(vec![div(2, 0, 0), div(30, 0x1020304, 0x1020304)]);
        assert_eq!(regrouped.lower_bytes(), vec![0x01, 0x02, 0x03, 0x04]);

        // 12 + 12 bits: three bytes, split mid-byte
        let halves = grouping(vec![div(12, 0xABC, 0xABC), div(12, 0xDEF, 0xDEF)]);
        assert_eq!(halves.lower_bytes(), vec![0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_bytes_upper_range() {
        let wild = grouping(vec![div(8, 1, 1), div(8, 0, 255), div(8, 4, 4)]);
        assert_eq!(wild.lower_bytes(), vec![1, 0, 4]);
        assert_eq!(wild.upper_bytes(), vec![1, 255, 4]);
    }

    /*----------------------------------------------------------------------------------
      Count and Multiplicity
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_count_and_multiplicity() {
        let single = grouping(vec![div(8, 1, 1), div(8, 2, 2)]);
        assert!(!single.is_multiple());
        assert_eq!(single.count(), BigUint::one());

        let wild = grouping(vec![div(8, 1, 1), div(8, 0, 255), div(8, 3, 4)]);
        assert!(wild.is_multiple());
        assert_eq!(wild.count(), BigUint::from(512u32));

        let empty = grouping(Vec::new());
        assert_eq!(empty.count(), BigUint::one());
        assert!(!empty.is_multiple());
    }

    #[test]
    fn test_is_more() {
        use std::cmp::Ordering;
        let single = grouping(vec![div(8, 1, 1)]);
        let pair = grouping(vec![div(8, 3, 4)]);
        let wide = grouping(vec![div(8, 0, 255)]);
        assert_eq!(single.is_more(&pair), Ordering::Less);
        assert_eq!(pair.is_more(&single), Ordering::Greater);
        assert_eq!(pair.is_more(&pair), Ordering::Equal);
        assert_eq!(wide.is_more(&pair), Ordering::Greater);
    }

    /*----------------------------------------------------------------------------------
      Prefix Derivations
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_min_prefix() {
        // single value: highest set bit of the lower value
        let loopback = grouping(vec![
            div(8, 127, 127),
            div(8, 0, 0),
            div(8, 0, 0),
            div(8, 1, 1),
        ]);
        assert_eq!(loopback.min_prefix(), 32);

        // 10 ends in a zero bit, so the minimum prefix stops one bit short of the octet
        let net = grouping(vec![div(8, 10, 10), div(8, 0, 0), div(8, 0, 0), div(8, 0, 0)]);
        assert_eq!(net.min_prefix(), 7);

        let net = grouping(vec![div(8, 11, 11), div(8, 0, 0), div(8, 0, 0), div(8, 0, 0)]);
        assert_eq!(net.min_prefix(), 8);

        let block = grouping(vec![div(8, 11, 11), div(8, 0, 255), div(8, 0, 255)]);
        assert_eq!(block.min_prefix(), 8);

        let zero = grouping(vec![div(8, 0, 0), div(8, 0, 0)]);
        assert_eq!(zero.min_prefix(), 0);

        // a non-block range keeps the full width
        let ragged = grouping(vec![div(8, 10, 10), div(8, 3, 4)]);
        assert_eq!(ragged.min_prefix(), 16);
    }

    #[test]
    fn test_equivalent_prefix() {
        let single = grouping(vec![div(8, 127, 127), div(8, 1, 1)]);
        assert_eq!(single.equivalent_prefix(), Some(16));

        let block = grouping(vec![div(8, 10, 10), div(8, 0, 255)]);
        assert_eq!(block.equivalent_prefix(), Some(8));

        // trailing non-full-range division after a multiple one
        let wild = grouping(vec![div(8, 1, 1), div(8, 0, 255), div(8, 4, 4)]);
        assert_eq!(wild.equivalent_prefix(), None);

        // a ranged division that is not a block
        let ragged = grouping(vec![div(8, 3, 4), div(8, 0, 255)]);
        assert_eq!(ragged.equivalent_prefix(), None);

        let all = grouping(vec![div(8, 0, 255), div(8, 0, 255)]);
        assert_eq!(all.equivalent_prefix(), Some(0));
    }

    #[test]
    fn test_range_equivalence() {
        let block = grouping(vec![
            prefixed(8, 10, 10, Some(8)),
            prefixed(8, 0, 255, Some(0)),
            prefixed(8, 0, 255, Some(0)),
        ]);
        assert!(block.is_range_equivalent(8));
        assert!(block.is_range_equivalent_to_prefix());
        assert!(!block.is_range_equivalent(9));
        // prefix 0 demands the full address space
        assert!(!block.is_range_equivalent(0));
        let everything = grouping(vec![div(8, 0, 255), div(8, 0, 255)]);
        assert!(everything.is_range_equivalent(0));

        let single = grouping(vec![div(8, 1, 1), div(8, 2, 2)]);
        assert!(single.is_range_equivalent_to_prefix());
        assert!(single.is_range_equivalent(16));

        let wild = grouping(vec![div(8, 1, 1), div(8, 0, 255), div(8, 4, 4)]);
        assert!(!wild.is_range_equivalent(8));
    }

    #[test]
    fn test_adjusted_prefix_by_segment() {
        let block = grouping(vec![
            div(8, 10, 10),
            prefixed(8, 0, 255, Some(6)),
            prefixed(8, 0, 255, Some(0)),
        ]);
        assert_eq!(block.prefix_length(), Some(14));
        // /14 rounds up to /16 and down to /8
        assert_eq!(block.adjusted_prefix_by_segment(true, 8, false), 16);
        assert_eq!(block.adjusted_prefix_by_segment(false, 8, false), 8);

        let single = grouping(vec![div(8, 1, 1), div(8, 2, 2)]);
        assert_eq!(single.adjusted_prefix_by_segment(true, 8, false), 16);
        assert_eq!(single.adjusted_prefix_by_segment(false, 8, false), 16);
        // the skip flag lets the downward direction round from the bit count
        assert_eq!(single.adjusted_prefix_by_segment(false, 8, true), 8);

        // an unprefixed full-range grouping adjusts from 0 in both directions,
        // before the skip flag is consulted
        let all = grouping(vec![div(8, 0, 255), div(8, 0, 255)]);
        assert_eq!(all.adjusted_prefix_by_segment(true, 8, false), 0);
        assert_eq!(all.adjusted_prefix_by_segment(false, 8, true), 0);
    }

    #[test]
    fn test_adjusted_prefix_clamping() {
        let block = grouping(vec![
            prefixed(8, 10, 10, Some(8)),
            prefixed(8, 0, 255, Some(0)),
        ]);
        assert_eq!(block.adjusted_prefix(4, true, true), 12);
        assert_eq!(block.adjusted_prefix(20, true, true), 16);
        assert_eq!(block.adjusted_prefix(-20, true, true), 0);
        // without flags the result is unclamped
        assert_eq!(block.adjusted_prefix(20, false, false), 28);
        assert_eq!(block.adjusted_prefix(-20, false, false), -12);
    }

    /*----------------------------------------------------------------------------------
      Equality, Hashing, Dual Ranges
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_equality_and_hash_agreement() {
        let first = grouping(vec![div(8, 1, 1), div(8, 0, 255)]);
        let second = grouping(vec![div(8, 1, 1), div(8, 0, 255)]);
        let third = grouping(vec![div(8, 1, 1), div(8, 0, 254)]);
        assert_eq!(first, second);
        assert_eq!(first.hash_code(), second.hash_code());
        assert_ne!(first, third);

        // prefixes do not participate in equality
        let block = grouping(vec![
            prefixed(8, 1, 1, Some(8)),
            prefixed(8, 0, 255, Some(0)),
        ]);
        assert_eq!(first, block);
        assert_eq!(first.hash_code(), block.hash_code());
    }

    #[test]
    fn test_hash_is_cached() {
        let wide = grouping(vec![div(63, 0x0123456789ABCDEF >> 1, 0x0123456789ABCDEF >> 1)]);
        let first = wide.hash_code();
        assert_eq!(first, wide.hash_code());
    }

    #[test]
    fn test_dual_range() {
        let single = grouping(vec![div(8, 1, 1)]);
        assert_eq!(single.is_dual_range().unwrap(), false);

        let tail_range = grouping(vec![div(8, 1, 1), div(8, 3, 4)]);
        assert_eq!(tail_range.is_dual_range().unwrap(), true);

        // a full-range division may precede another multiple division
        let full_then_range = grouping(vec![div(8, 0, 255), div(8, 3, 4)]);
        assert_eq!(full_then_range.is_dual_range().unwrap(), true);

        // a partial range before another multiple division cannot be written lower-upper
        let mismatched = grouping(vec![div(8, 3, 4), div(8, 0, 255), div(8, 1, 1)]);
        assert!(matches!(
            mismatched.is_dual_range(),
            Err(Error::MismatchedSegmentRanges(_))
        ));
    }

    /*----------------------------------------------------------------------------------
      Regrouping
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_regroup_octal_widths() {
        let address = grouping(vec![
            div(8, 0x01, 0x01),
            div(8, 0x02, 0x02),
            div(8, 0x03, 0x03),
            div(8, 0x04, 0x04),
        ]);
        let octal = regroup(&address, 3).unwrap();
        let widths: Vec<u32> = octal.divisions().iter().map(|d| d.bit_count()).collect();
        assert_eq!(widths, vec![2, 30]);
        assert_eq!(octal.division(0).lower(), 0);
        assert_eq!(octal.division(1).lower(), 0x1020304);
        assert!(octal.divisions().iter().all(|d| d.radix() == 8));
        assert_eq!(octal.bit_count(), 32);
    }

    #[test]
    fn test_regroup_spans_sources_both_ways() {
        // one new division spanning multiple sources, and one source feeding
        // multiple new divisions
        let halves = grouping(vec![div(12, 0xABC, 0xABC), div(12, 0xDEF, 0xDEF)]);
        let nibbles = regroup(&halves, 4).unwrap();
        let widths: Vec<u32> = nibbles.divisions().iter().map(|d| d.bit_count()).collect();
        assert_eq!(widths, vec![24]);
        assert_eq!(nibbles.division(0).lower(), 0xABCDEF);
        assert_eq!(nibbles.division(0).radix(), 16);

        let bits = regroup(&grouping(vec![div(4, 0b1010, 0b1010)]), 1).unwrap();
        assert_eq!(bits.division_count(), 1);
        assert_eq!(bits.division(0).lower(), 0b1010);
        assert_eq!(bits.division(0).radix(), 2);
    }

    #[test]
    fn test_regroup_carries_ranges() {
        // the range must split cleanly or be rejected; a full-range tail splits cleanly
        let block = grouping(vec![div(8, 10, 10), div(8, 0, 255), div(8, 0, 255)]);
        let wide = regroup(&block, 12).unwrap();
        let widths: Vec<u32> = wide.divisions().iter().map(|d| d.bit_count()).collect();
        assert_eq!(widths, vec![24]);
        assert_eq!(wide.division(0).lower(), 0x0A0000);
        assert_eq!(wide.division(0).upper(), 0x0AFFFF);

        // a range that does not split at the digit boundary is rejected
        let ragged = grouping(vec![div(8, 0x47, 0x80)]);
        assert!(regroup(&ragged, 3).is_err());
    }

    #[test]
    fn test_regroup_prefix_carry() {
        let block = grouping(vec![
            prefixed(8, 10, 10, Some(8)),
            prefixed(8, 0, 255, Some(0)),
            prefixed(8, 0, 255, Some(0)),
            prefixed(8, 0, 255, Some(0)),
        ]);
        let octal = block.regrouped(3).unwrap();
        assert_eq!(octal.prefix_length(), Some(8));
        // 2-bit head is entirely inside the /8 network: all bits matter
        assert_eq!(octal.division(0).prefix(), None);
        // boundary falls 6 bits into the 30-bit division
        assert_eq!(octal.division(1).prefix(), Some(6));
    }

    #[test]
    fn test_regroup_rejects_wide_digits() {
        let address = grouping(vec![div(8, 1, 1)]);
        assert!(matches!(
            regroup(&address, 32),
            Err(Error::InvalidArgument(_))
        ));
        assert!(regroup(&address, 31).is_ok());
        assert!(regroup(&address, 0).is_err());
    }

    #[test]
    fn test_regroup_long_series_caps_division_width() {
        // 128 bits at 1 bit per digit: capped at 63-bit divisions: 63 + 63 + 2
        let segments: Vec<Division> = (0..8).map(|_| div(16, 0, 0)).collect();
        let v6 = grouping(segments);
        let binary = regroup(&v6, 1).unwrap();
        let widths: Vec<u32> = binary.divisions().iter().map(|d| d.bit_count()).collect();
        assert_eq!(widths.iter().sum::<u32>(), 128);
        assert!(widths.iter().all(|w| *w <= 63));
        assert_eq!(widths, vec![2, 63, 63]);
    }

    #[test]
    fn test_regroup_empty() {
        let empty = grouping(Vec::new());
        let regrouped = regroup(&empty, 3).unwrap();
        assert_eq!(regrouped.division_count(), 0);
    }
}
