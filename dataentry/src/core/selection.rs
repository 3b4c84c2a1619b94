//! Row range slicing and filtering.
//!
//! Selection never renumbers rows: a `SourceRow` keeps its source position so
//! outcome records line up with prior runs no matter which slice is chosen.

use crate::core::filter::RowFilter;
use crate::core::rules::ConfigError;
use crate::core::types::SourceRow;

/// Inclusive, 1-based range of source rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl Default for RowRange {
    fn default() -> Self {
        Self {
            start: 1,
            end: None,
        }
    }
}

impl RowRange {
    pub fn new(start: usize, end: Option<usize>) -> Result<Self, ConfigError> {
        if start == 0 {
            return Err(ConfigError::InvalidRange(
                "start is 1-based and must be >= 1".to_string(),
            ));
        }
        if let Some(end) = end
            && end < start
        {
            return Err(ConfigError::InvalidRange(format!(
                "end ({end}) must be >= start ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, number: usize) -> bool {
        number >= self.start && self.end.is_none_or(|end| number <= end)
    }
}

/// Rows inside `range` that satisfy `filter` (when given), in source order.
pub fn select_rows<'a, I>(
    rows: I,
    range: RowRange,
    filter: Option<&'a RowFilter>,
) -> impl Iterator<Item = SourceRow> + 'a
where
    I: IntoIterator<Item = SourceRow>,
    I::IntoIter: 'a,
{
    rows.into_iter()
        .filter(move |source| range.contains(source.number))
        .filter(move |source| filter.is_none_or(|filter| filter.matches(&source.row)))
}
