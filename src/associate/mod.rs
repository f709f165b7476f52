//! Association (C3, C4): assigning identities to a new epoch's batch of
//! measurements against the running reference frame.

mod advanced;
mod basic;
mod conflict;

pub use advanced::associate_advanced;
pub use basic::associate_basic;
