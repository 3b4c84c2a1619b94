//! Deterministic, pure logic shared by the dataentry engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod coerce;
pub mod filter;
pub mod resume;
pub mod rules;
pub mod selection;
pub mod types;
pub mod validator;
