//! Row-by-row run coordinator for `dataentry run`.
//!
//! Each selected row moves through validate, fill, submit and verify, and ends
//! with exactly one outcome record. Rows already logged as successful are
//! skipped in resume mode without touching the browser.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::filter::RowFilter;
use crate::core::rules::Mapping;
use crate::core::selection::{RowRange, select_rows};
use crate::core::types::{OutcomeRecord, Row, RunSummary, SourceRow};
use crate::core::validator::validate_row;
use crate::detect::{DEFAULT_POLL_INTERVAL, await_success};
use crate::error::AutomationError;
use crate::fill::fill_row;
use crate::io::outcome_log::OutcomeLog;
use crate::io::surface::AutomationSurface;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Message recorded for rows skipped because a prior run completed them.
pub const RESUME_SKIP_MESSAGE: &str = "skipped (resume)";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub range: RowRange,
    pub filter: Option<RowFilter>,
    /// Fill but never submit or verify.
    pub dry_run: bool,
    /// Skip rows present in the completed set.
    pub resume: bool,
    /// Upper bound for success detection after each submission.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            range: RowRange::default(),
            filter: None,
            dry_run: false,
            resume: false,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Reason why `run_rows` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// Every selected row has an outcome.
    Completed,
    /// The automation session died while processing `row`. Later rows were
    /// not attempted.
    SessionLost { row: usize, message: String },
}

/// Summary of a run invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub summary: RunSummary,
    pub stop: RunStop,
}

/// Process `rows` against `mapping`, appending one record per row to `log`.
///
/// `completed` holds row numbers from a prior log; it is consulted only when
/// `options.resume` is set. `on_row` observes each record after it is durable.
///
/// Per-row failures never abort the run. Session loss stops it after the
/// in-flight row is logged. Log write failures and a missing submit selector
/// outside dry run are returned as errors.
pub fn run_rows<S, F>(
    surface: &S,
    mapping: &Mapping,
    rows: Vec<SourceRow>,
    completed: &BTreeSet<usize>,
    log: &mut OutcomeLog,
    options: &RunOptions,
    mut on_row: F,
) -> Result<RunReport>
where
    S: AutomationSurface + ?Sized,
    F: FnMut(&OutcomeRecord),
{
    let submit_selector = if options.dry_run {
        None
    } else {
        Some(mapping.require_submit_selector()?)
    };

    let mut summary = RunSummary::default();
    let mut record = |summary: &mut RunSummary, outcome: OutcomeRecord| -> Result<()> {
        log.append(&outcome)
            .with_context(|| format!("write {}", log.path().display()))?;
        summary.considered += 1;
        on_row(&outcome);
        Ok(())
    };

    for source in select_rows(rows, options.range, options.filter.as_ref()) {
        let number = source.number;
        if options.resume && completed.contains(&number) {
            debug!(row = number, "already completed; skipping");
            summary.skipped += 1;
            let mut outcome = OutcomeRecord::success(number);
            outcome.message = RESUME_SKIP_MESSAGE.to_string();
            record(&mut summary, outcome)?;
            continue;
        }

        if let Some(reason) = validate_row(&source.row, &mapping.fields) {
            warn!(row = number, %reason, "row rejected");
            summary.failures += 1;
            record(&mut summary, OutcomeRecord::failed(number, reason))?;
            continue;
        }

        match attempt_row(surface, mapping, submit_selector, &source.row, number, options) {
            Ok(()) => {
                info!(row = number, "row succeeded");
                summary.successes += 1;
                record(&mut summary, OutcomeRecord::success(number))?;
            }
            Err(err) => {
                let message = err.outcome_message();
                warn!(row = number, %message, "row failed");
                summary.failures += 1;
                record(&mut summary, OutcomeRecord::failed(number, message.clone()))?;
                if err.is_session_lost() {
                    warn!(row = number, "automation session lost; stopping run");
                    return Ok(RunReport {
                        summary,
                        stop: RunStop::SessionLost {
                            row: number,
                            message,
                        },
                    });
                }
            }
        }
        debug_assert!(summary.is_balanced());
    }

    Ok(RunReport {
        summary,
        stop: RunStop::Completed,
    })
}

/// Navigate, fill, and (unless `submit_selector` is `None`) submit and verify one row.
#[instrument(skip_all, fields(row = number))]
fn attempt_row<S: AutomationSurface + ?Sized>(
    surface: &S,
    mapping: &Mapping,
    submit_selector: Option<&str>,
    row: &Row,
    number: usize,
    options: &RunOptions,
) -> Result<(), AutomationError> {
    surface.navigate(&mapping.url)?;
    fill_row(surface, row, &mapping.fields)?;
    debug!("fields filled");

    let Some(submit_selector) = submit_selector else {
        debug!("dry run; not submitting");
        return Ok(());
    };
    let submit = surface.find(submit_selector)?;
    surface.click(&submit)?;
    debug!("submitted");

    if let Some(check) = &mapping.success_check {
        await_success(surface, check, options.timeout, options.poll_interval)?;
        debug!("success check passed");
    }
    Ok(())
}
