use crate::core::address::Address;
use crate::core::division::Division;
use crate::core::errors::{Error, Result};
use crate::core::family::IpFamily;
use crate::core::grouping::DivisionGrouping;
use crate::core::section::Section;
use crate::core::segment::Segment;
use crate::core::series::DivisionSeries;
use std::fmt;
use std::sync::OnceLock;

/*-------------------------------------------------------------------------------------------------
  Wildcards
-------------------------------------------------------------------------------------------------*/

/// The wildcard vocabulary of a rendering: the range separator (always present) and the
/// optional full-range wildcard.
#[derive(Clone, Debug)]
pub struct Wildcards {
    pub range_separator: String,
    pub wildcard: Option<String>,
}

impl Default for Wildcards {
    fn default() -> Self {
        Wildcards {
            range_separator: "-".into(),
            wildcard: Some("*".into()),
        }
    }
}

impl Wildcards {
    pub fn new(range_separator: impl Into<String>, wildcard: Option<String>) -> Self {
        Wildcards {
            range_separator: range_separator.into(),
            wildcard,
        }
    }
}

/*-------------------------------------------------------------------------------------------------
  String Options
-------------------------------------------------------------------------------------------------*/

/// A clear way to ask for a specific kind of string.
///
/// Options are assembled through [StringOptionsBuilder] and carry their derived writer in a
/// lazily filled slot, so repeated renderings reuse it without touching the series being
/// rendered.
#[derive(Debug)]
pub struct StringOptions {
    radix: u32,
    separator: Option<char>,
    uppercase: bool,
    reverse: bool,
    split_digits: bool,
    expand_segments: bool,
    segment_str_prefix: String,
    address_label: String,
    zone_separator: char,
    wildcards: Wildcards,
    cached_params: OnceLock<SeriesWriter>,
}

impl Clone for StringOptions {
    fn clone(&self) -> Self {
        StringOptions {
            radix: self.radix,
            separator: self.separator,
            uppercase: self.uppercase,
            reverse: self.reverse,
            split_digits: self.split_digits,
            expand_segments: self.expand_segments,
            segment_str_prefix: self.segment_str_prefix.clone(),
            address_label: self.address_label.clone(),
            zone_separator: self.zone_separator,
            wildcards: self.wildcards.clone(),
            cached_params: OnceLock::new(),
        }
    }
}

impl StringOptions {
    pub fn builder(radix: u32, separator: char) -> StringOptionsBuilder {
        StringOptionsBuilder::new(radix, separator)
    }

    /// The canonical rendering for a family: dotted decimal for IPv4, lowercase colon-separated
    /// hex for IPv6.
    pub fn canonical(family: IpFamily) -> StringOptions {
        StringOptionsBuilder::new(family.default_radix(), family.separator()).build()
    }

    fn params(&self) -> &SeriesWriter {
        self.cached_params.get_or_init(|| SeriesWriter {
            radix: self.radix,
            separator: self.separator,
            uppercase: self.uppercase,
            reverse: self.reverse,
            split_digits: self.split_digits,
            expand_segments: self.expand_segments,
            segment_str_prefix: self.segment_str_prefix.clone(),
            address_label: self.address_label.clone(),
            zone_separator: self.zone_separator,
            wildcards: self.wildcards.clone(),
        })
    }

    /// Renders a series, wildcard and per-division range forms included.
    pub fn to_string_of(&self, series: &dyn DivisionSeries) -> Result<String> {
        self.params().series_string(series, None)
    }

    /// Renders a series with a zone identifier appended.
    pub fn to_string_with_zone(&self, series: &dyn DivisionSeries, zone: &str) -> Result<String> {
        self.params().series_string(series, Some(zone))
    }

    /// Renders a multiple series as a single `lower<sep>upper` pair, e.g. `1.2.3.5-1.2.4.5`.
    /// Errors when the shape cannot be expressed that way.
    pub fn to_range_string_of(&self, series: &dyn DivisionSeries) -> Result<String> {
        self.params().range_string(series)
    }
}

/*--------------------------------------------------------------------------------------
  String Options Builder
--------------------------------------------------------------------------------------*/

#[derive(Debug)]
pub struct StringOptionsBuilder {
    radix: u32,
    separator: Option<char>,
    uppercase: bool,
    reverse: bool,
    split_digits: bool,
    expand_segments: bool,
    segment_str_prefix: String,
    address_label: String,
    zone_separator: char,
    wildcards: Wildcards,
}

impl StringOptionsBuilder {
    pub fn new(radix: u32, separator: char) -> Self {
        StringOptionsBuilder {
            radix,
            separator: Some(separator),
            uppercase: false,
            reverse: false,
            split_digits: false,
            expand_segments: false,
            segment_str_prefix: String::new(),
            address_label: String::new(),
            zone_separator: '%',
            wildcards: Wildcards::default(),
        }
    }

    /// Digit base of the rendering. A radix of 0 defers to each division's own radix, which is
    /// how regrouped divisions print in the base they were carved for.
    pub fn radix(mut self, radix: u32) -> Self {
        self.radix = radix;
        self
    }

    /// Separates the divisions, typically `:` or `.`; `None` renders them back to back.
    pub fn separator(mut self, separator: Option<char>) -> Self {
        self.separator = separator;
        self
    }

    pub fn uppercase(mut self, uppercase: bool) -> Self {
        self.uppercase = uppercase;
        self
    }

    /// Prints the divisions in reverse, and with split digits the digits in reverse as well.
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Splits the digits of each division with the separator, so `123.1` becomes `1.2.3.1`.
    pub fn split_digits(mut self, split_digits: bool) -> Self {
        self.split_digits = split_digits;
        self
    }

    /// Expands each division to its full digit width, `1` becoming `001` in dotted decimal.
    pub fn expand_segments(mut self, expand_segments: bool) -> Self {
        self.expand_segments = expand_segments;
        self
    }

    /// A prefix ahead of every division string, e.g. `0x` for hex or `0` for octal.
    pub fn segment_str_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.segment_str_prefix = prefix.into();
        self
    }

    /// A label ahead of the whole string.
    pub fn address_label(mut self, label: impl Into<String>) -> Self {
        self.address_label = label.into();
        self
    }

    pub fn zone_separator(mut self, zone_separator: char) -> Self {
        self.zone_separator = zone_separator;
        self
    }

    pub fn wildcards(mut self, wildcards: Wildcards) -> Self {
        self.wildcards = wildcards;
        self
    }

    pub fn build(self) -> StringOptions {
        StringOptions {
            radix: self.radix,
            separator: self.separator,
            uppercase: self.uppercase,
            reverse: self.reverse,
            split_digits: self.split_digits,
            expand_segments: self.expand_segments,
            segment_str_prefix: self.segment_str_prefix,
            address_label: self.address_label,
            zone_separator: self.zone_separator,
            wildcards: self.wildcards,
            cached_params: OnceLock::new(),
        }
    }
}

/*-------------------------------------------------------------------------------------------------
  Series Writer
-------------------------------------------------------------------------------------------------*/

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// The resolved rendering parameters derived from a [StringOptions].
#[derive(Clone, Debug)]
struct SeriesWriter {
    radix: u32,
    separator: Option<char>,
    uppercase: bool,
    reverse: bool,
    split_digits: bool,
    expand_segments: bool,
    segment_str_prefix: String,
    address_label: String,
    zone_separator: char,
    wildcards: Wildcards,
}

impl SeriesWriter {
    fn series_string(&self, series: &dyn DivisionSeries, zone: Option<&str>) -> Result<String> {
        let mut out = String::new();
        out.push_str(&self.address_label);
        let count = series.division_count();
        for position in 0..count {
            let index = if self.reverse { count - position - 1 } else { position };
            if position > 0 {
                if let Some(separator) = self.separator {
                    out.push(separator);
                }
            }
            self.append_division(&mut out, &series.division(index))?;
        }
        if let Some(zone) = zone {
            if !zone.is_empty() {
                out.push(self.zone_separator);
                out.push_str(zone);
            }
        }
        Ok(out)
    }

    fn range_string(&self, series: &dyn DivisionSeries) -> Result<String> {
        if !series.is_dual_range()? {
            return self.series_string(series, None);
        }
        let mut out = String::new();
        out.push_str(&self.address_label);
        self.append_bound(&mut out, series, true)?;
        out.push_str(&self.wildcards.range_separator);
        self.append_bound(&mut out, series, false)?;
        Ok(out)
    }

    fn append_bound(&self, out: &mut String, series: &dyn DivisionSeries, low: bool) -> Result<()> {
        let count = series.division_count();
        for position in 0..count {
            let index = if self.reverse { count - position - 1 } else { position };
            if position > 0 {
                if let Some(separator) = self.separator {
                    out.push(separator);
                }
            }
            let division = series.division(index);
            let value = if low { division.lower() } else { division.upper() };
            out.push_str(&self.segment_str_prefix);
            self.append_digits(out, value, &division)?;
        }
        Ok(())
    }

    fn append_division(&self, out: &mut String, division: &Division) -> Result<()> {
        if division.is_full_range() {
            if let Some(wildcard) = &self.wildcards.wildcard {
                out.push_str(wildcard);
                return Ok(());
            }
        }
        out.push_str(&self.segment_str_prefix);
        if division.is_multiple() {
            if self.split_digits {
                return Err(Error::InvalidArgument(
                    "split digits cannot express a value range".into(),
                ));
            }
            self.append_digits(out, division.lower(), division)?;
            out.push_str(&self.wildcards.range_separator);
            self.append_digits(out, division.upper(), division)?;
        } else {
            self.append_digits(out, division.lower(), division)?;
        }
        Ok(())
    }

    fn append_digits(&self, out: &mut String, value: u64, division: &Division) -> Result<()> {
        let radix = if self.radix != 0 { self.radix } else { division.radix() };
        if !(2..=36).contains(&radix) {
            return Err(Error::InvalidArgument(format!(
                "radix {} has no digit character set",
                radix
            )));
        }
        let mut digits = [0u8; 64];
        let mut len = 0;
        let mut rest = value;
        loop {
            let digit = DIGITS[(rest % radix as u64) as usize];
            digits[len] = if self.uppercase {
                digit.to_ascii_uppercase()
            } else {
                digit
            };
            len += 1;
            rest /= radix as u64;
            if rest == 0 {
                break;
            }
        }
        if self.expand_segments {
            let full = max_digits(division.bit_count(), radix);
            while len < full {
                digits[len] = b'0';
                len += 1;
            }
        }
        // digits accumulate least significant first; reversed split digits keep that order
        let least_significant_first = self.split_digits && self.reverse;
        let mut position = 0;
        while position < len {
            let digit = if least_significant_first {
                digits[position]
            } else {
                digits[len - position - 1]
            };
            if position > 0 && self.split_digits {
                if let Some(separator) = self.separator {
                    out.push(separator);
                }
            }
            out.push(digit as char);
            position += 1;
        }
        Ok(())
    }
}

/// Digit count of the widest value a division of `bit_count` bits can hold.
fn max_digits(bit_count: u32, radix: u32) -> usize {
    let mut value = Division::max_value_for_bits(bit_count);
    let mut digits = 1;
    while value >= radix as u64 {
        value /= radix as u64;
        digits += 1;
    }
    digits
}

/*-------------------------------------------------------------------------------------------------
  Display Implementations
-------------------------------------------------------------------------------------------------*/

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_full_range() {
            return write!(f, "*");
        }
        let radix = self.family().default_radix();
        if self.is_multiple() {
            write_radix(f, self.lower(), radix)?;
            write!(f, "-")?;
            write_radix(f, self.upper(), radix)
        } else {
            write_radix(f, self.lower(), radix)
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_full_range() {
            return write!(f, "*");
        }
        let radix = if self.radix() <= 36 { self.radix() } else { 16 };
        if self.is_multiple() {
            write_radix(f, self.lower(), radix)?;
            write!(f, "-")?;
            write_radix(f, self.upper(), radix)
        } else {
            write_radix(f, self.lower(), radix)
        }
    }
}

impl fmt::Display for DivisionGrouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, division) in self.divisions().iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", division)?;
        }
        write!(f, "]")?;
        if let Some(prefix) = self.prefix_length() {
            write!(f, "/{}", prefix)?;
        }
        Ok(())
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = StringOptions::canonical(self.family())
            .to_string_of(self)
            .map_err(|_| fmt::Error)?;
        f.write_str(&rendered)?;
        if let Some(prefix) = self.prefix_length() {
            write!(f, "/{}", prefix)?;
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = StringOptions::canonical(self.family());
        let rendered = match self.zone() {
            Some(zone) => options
                .to_string_with_zone(self.section(), zone)
                .map_err(|_| fmt::Error)?,
            None => options.to_string_of(self.section()).map_err(|_| fmt::Error)?,
        };
        f.write_str(&rendered)?;
        if let Some(prefix) = self.prefix_length() {
            write!(f, "/{}", prefix)?;
        }
        Ok(())
    }
}

fn write_radix(f: &mut fmt::Formatter<'_>, value: u64, radix: u32) -> fmt::Result {
    let mut digits = [0u8; 64];
    let mut len = 0;
    let mut rest = value;
    loop {
        digits[len] = DIGITS[(rest % radix as u64) as usize];
        len += 1;
        rest /= radix as u64;
        if rest == 0 {
            break;
        }
    }
    for position in (0..len).rev() {
        write!(f, "{}", digits[position] as char)?;
    }
    Ok(())
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
