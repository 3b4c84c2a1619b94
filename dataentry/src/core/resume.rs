//! Resume state reconstruction from prior outcome records.

use std::collections::BTreeSet;

use crate::core::types::{OutcomeRecord, OutcomeStatus};

/// Row numbers a prior run already completed successfully.
///
/// Failed rows are absent and will be retried. A row that failed in an early
/// run and succeeded later counts as completed.
pub fn completed_rows<'a, I>(records: I) -> BTreeSet<usize>
where
    I: IntoIterator<Item = &'a OutcomeRecord>,
{
    records
        .into_iter()
        .filter(|record| record.status == OutcomeStatus::Success)
        .map(|record| record.row)
        .collect()
}
