//! Profile learning: the learning-rate schedule and the pure profile updater.
//!
//! Early feedback moves the profile a lot, later feedback fine-tunes it:
//!
//! | feedback count | rate |
//! |---|---|
//! | 0 | 0.250 |
//! | 10 | 0.2125 |
//! | 30 | ~0.154 |
//! | 100 | ~0.049 → floored at 0.05 |
//!
//! Neither component persists anything; callers read the profile from a
//! [`crate::storage::ProfileStore`], compute the next value, and write it back.

pub mod schedule;
pub mod updater;

pub use schedule::{ImpactLevel, LearningRateSchedule};
pub use updater::ProfileUpdater;
