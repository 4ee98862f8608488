/*-------------------------------------------------------------------------------------------------
  Errors and Results
-------------------------------------------------------------------------------------------------*/

/// Errors reported by the grouping engine, distinguished by kind.
///
/// Every failure is surfaced synchronously to the caller; the engine never retries and never
/// masks an invariant violation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A constructor or algorithm received an argument outside its domain: a zone for a family
    /// without zones, a digit size at or beyond the machine word, an inconsistent segment prefix
    /// sequence, or an irreversible segment range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A segment or division index fell outside the series, or a subsection range was inverted.
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(String),

    /// A replacement would extend past the end of the receiving section.
    #[error("section size mismatch: {0}")]
    AddressSizeMismatch(String),

    /// The series cannot be expressed as a single `lower-upper` range: a non-full-range multiple
    /// division is followed by another multiple division.
    #[error("mismatched segment ranges: {0}")]
    MismatchedSegmentRanges(String),
}

// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
