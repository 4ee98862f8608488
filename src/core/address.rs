use crate::core::division::Division;
use crate::core::family::IpFamily;
use crate::core::section::Section;
use crate::core::series::{DivisionSeries, SeriesCache};

/*-------------------------------------------------------------------------------------------------
  Address
-------------------------------------------------------------------------------------------------*/

/// A thin facade over a full-width [Section], optionally carrying a zone (scope) identifier
/// for families that support one.
///
/// The address owns its section exclusively; every series operation delegates to it.
#[derive(Clone, Debug)]
pub struct Address {
    section: Section,
    zone: Option<String>,
}

impl Address {
    pub fn new(section: Section) -> Self {
        Address {
            section,
            zone: None,
        }
    }

    /// Zone validity against the family is enforced by the creator.
    pub(crate) fn with_zone(section: Section, zone: Option<String>) -> Self {
        Address { section, zone }
    }

    pub const fn family(&self) -> IpFamily {
        self.section.family()
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    /// The single lowest address in this address's range.
    pub fn to_lower(&self) -> Address {
        if !self.section.is_prefixed() && !self.section.is_multiple() {
            return self.clone();
        }
        Address {
            section: self.section.to_lower(),
            zone: self.zone.clone(),
        }
    }

    /// The single highest address in this address's range.
    pub fn to_upper(&self) -> Address {
        if !self.section.is_prefixed() && !self.section.is_multiple() {
            return self.clone();
        }
        Address {
            section: self.section.to_upper(),
            zone: self.zone.clone(),
        }
    }
}

impl DivisionSeries for Address {
    fn division_count(&self) -> usize {
        self.section.division_count()
    }

    fn division(&self, index: usize) -> Division {
        self.section.division(index)
    }

    fn prefix_length(&self) -> Option<u32> {
        self.section.prefix_length()
    }

    fn series_cache(&self) -> &SeriesCache {
        self.section.series_cache()
    }
}

/*--------------------------------------------------------------------------------------
  Equality, Ordering, Hashing
--------------------------------------------------------------------------------------*/

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.section == other.section && self.zone == other.zone
    }
}

impl Eq for Address {}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.section
            .cmp(&other.section)
            .then_with(|| self.zone.cmp(&other.zone))
    }
}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_code());
        self.zone.hash(state);
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
