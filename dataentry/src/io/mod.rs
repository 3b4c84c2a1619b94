//! I/O adapters for dataentry commands.

pub mod driver_process;
pub mod mapping;
pub mod outcome_log;
pub mod surface;
pub mod table;
pub mod webdriver;
