//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data Model
//! - A [`Fragment`] is a partial, field-keyed update produced by a sensor stream
//! - A [`Record`] is the flat, coalesced mapping handed to an output sink
//! - A [`RateMode`] selects the emission cadence (active / static)
//!
//! ## Time Model
//! - Emitted records carry wall-clock epoch milliseconds in the `ts` field
//! - Throttling decisions use a monotonic clock owned by the engine

mod blueprint;
mod config;
mod error;
mod field;
mod mode;
mod sink;

pub use blueprint::*;
pub use config::*;
pub use error::*;
pub use field::*;
pub use mode::*;
pub use sink::*;
