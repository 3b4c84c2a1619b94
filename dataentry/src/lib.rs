//! Mapping-driven web form data entry.
//!
//! Rows from a CSV or spreadsheet are validated against a declarative field
//! mapping, typed into a web form through an automation surface, optionally
//! submitted and verified, and every row's outcome is appended to a durable
//! log that doubles as resume state. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (rule model, row validation,
//!   truthy coercion, row selection, resume reconstruction). No I/O.
//! - **[`io`]**: Side-effecting adapters (mapping and table files, the outcome
//!   log, the WebDriver client). The [`io::surface::AutomationSurface`] trait
//!   is the seam that tests replace with a scripted fake.
//!
//! Orchestration modules ([`fill`], [`detect`], [`run`], [`check`]) combine
//! core logic with the surface to implement the CLI commands.

pub mod check;
pub mod core;
pub mod detect;
pub mod error;
pub mod exit_codes;
pub mod fill;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
