//! Geometry primitives (C1): spherical distance, great-circle search, the de
//! Ruiter radius, and RA-wrap handling.

mod deruiter;
mod radec;
mod search;

pub use deruiter::de_ruiter;
pub use radec::{dec_to_dms, ra_to_hms, RADec};
pub use search::{match_nearest, search_around};
