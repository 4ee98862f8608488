//! Immutable, value-typed IP address groupings.
//!
//! `ipgrouping` models IPv4 and IPv6 addresses — and whole address sets — as sequences of
//! prefix-aware numeric divisions. A single type family covers a lone address, a CIDR prefix
//! block, a wildcard, or arbitrary per-segment ranges, with lazy, thread-safe derivations for
//! counting, byte materialization, prefix arithmetic, and range enumeration.
//!
//! Construction goes through a [SegmentCreator], which interns common segments and derives the
//! section prefix from the per-segment prefixes:
//!
//! ```
//! use ipgrouping::{DivisionSeries, IpFamily, SegmentCreator};
//!
//! # fn main() -> ipgrouping::Result<()> {
//! let creator = SegmentCreator::for_family(IpFamily::V4);
//!
//! // 10.0.0.0/8 as a prefix block
//! let block = creator.section_from_bytes(&[10, 0, 0, 0], Some(8))?;
//! assert!(block.is_multiple());
//! assert_eq!(block.count(), 16_777_216u32.into());
//! assert_eq!(block.to_string(), "10.*.*.*/8");
//!
//! // the block's single lowest section
//! assert_eq!(block.to_lower().to_string(), "10.0.0.0");
//! # Ok(())
//! # }
//! ```
//!
//! Ranged sections enumerate lazily, in lexicographic order, without materializing the
//! cartesian product of their segment ranges:
//!
//! ```
//! use ipgrouping::{IpFamily, SegmentCreator};
//!
//! # fn main() -> ipgrouping::Result<()> {
//! let creator = SegmentCreator::for_family(IpFamily::V4);
//! let segments = vec![
//!     creator.segment(1)?,
//!     creator.segment(2)?,
//!     creator.segment_range(3, 4, None)?,
//!     creator.segment(5)?,
//! ];
//! let section = creator.section(segments)?;
//! let rendered: Vec<String> = section.iter().map(|s| s.to_string()).collect();
//! assert_eq!(rendered, vec!["1.2.3.5", "1.2.4.5"]);
//! # Ok(())
//! # }
//! ```
//!
//! The division substrate is visible directly through [regroup], which recomputes a series'
//! layout at a different digit size — here IPv4 as octal digits:
//!
//! ```
//! use ipgrouping::{regroup, IpFamily, Section};
//!
//! # fn main() -> ipgrouping::Result<()> {
//! let section = Section::from_bytes(IpFamily::V4, &[1, 2, 3, 4], None)?;
//! let octal = regroup(&section, 3)?;
//! let widths: Vec<u32> = octal.divisions().iter().map(|d| d.bit_count()).collect();
//! assert_eq!(widths, vec![2, 30]);
//! # Ok(())
//! # }
//! ```
//!
//! Textual *parsing*, family-specific constants, and network semantics beyond bit-level prefix
//! algebra live outside this crate; everything here is synchronous, immutable after
//! construction, and safe to share across threads.

pub mod core;

pub use crate::core::address::Address;
pub use crate::core::creator::SegmentCreator;
pub use crate::core::division::Division;
pub use crate::core::errors::{Error, Result};
pub use crate::core::family::IpFamily;
pub use crate::core::grouping::{regroup, regroup_with_prefix, DivisionGrouping};
pub use crate::core::iterator::{AddressIter, SectionIter, SegmentArrays};
pub use crate::core::prefix::{segment_prefix, segment_prefix_length};
pub use crate::core::section::Section;
pub use crate::core::segment::Segment;
pub use crate::core::series::{DivisionSeries, SeriesCache};
pub use crate::core::strings::{StringOptions, StringOptionsBuilder, Wildcards};
