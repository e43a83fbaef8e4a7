#![forbid(unsafe_code)]

//! Domain model for timed listening assessments.
//!
//! Everything in this crate is free of I/O: question sets, the answer ledger,
//! scoring and the persisted result record. Storage adapters and the session
//! runtime live in the `storage` and `services` crates.

pub mod duration;
pub mod model;
pub mod scorer;
pub mod time;

pub use time::Clock;
