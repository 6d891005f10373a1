//! Inter-record delay reconstruction.
//!
//! The wait before a record is the recorded gap between the previous record's
//! end and this record's start, put through three stages:
//!
//! 1. clamp the raw gap to `[0, max_delay]` (clock skew, idle periods),
//! 2. divide by `speed_multiplier`,
//! 3. clamp again to `[min_delay, max_delay]`.
//!
//! A missing timestamp on either side (the previous record's end or this
//! record's start) substitutes `default_delay` for the raw gap. The first
//! record of a run is anchored to its own start, so its raw gap is zero.

use crate::config::TimingConfig;
use chrono::NaiveDateTime;
use reprise_common::InteractionRecord;
use std::time::Duration;

/// Compute the effective delay from a raw gap in seconds.
pub fn effective_delay(raw_secs: Option<f64>, timing: &TimingConfig) -> Duration {
    let raw = raw_secs.unwrap_or(timing.default_delay);
    let bounded = raw.clamp(0.0, timing.max_delay);
    let scaled = bounded / timing.speed_multiplier;
    let effective = scaled.clamp(timing.min_delay, timing.max_delay);
    Duration::from_secs_f64(effective)
}

/// Raw gap in seconds between two timestamps, negative when `current` precedes
/// `previous`.
pub fn raw_gap(
    previous_end: Option<NaiveDateTime>,
    current_start: Option<NaiveDateTime>,
) -> Option<f64> {
    let (prev, cur) = (previous_end?, current_start?);
    let delta = cur.signed_duration_since(prev);
    Some(delta.num_milliseconds() as f64 / 1000.0)
}

pub fn reconstruct_delay(
    previous_end: Option<NaiveDateTime>,
    current_start: Option<NaiveDateTime>,
    timing: &TimingConfig,
) -> Duration {
    effective_delay(raw_gap(previous_end, current_start), timing)
}

/// Tracks the previous record across a run.
#[derive(Debug, Clone)]
pub struct TimingReconstructor {
    timing: TimingConfig,
    previous: Option<Option<NaiveDateTime>>,
}

impl TimingReconstructor {
    /// `timing` must already be validated.
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            previous: None,
        }
    }

    /// Delay to wait before `record`. Advances the reference point.
    pub fn next_delay(&mut self, record: &InteractionRecord) -> Duration {
        let raw = match self.previous {
            None if record.start_time.is_some() => Some(0.0),
            None => None,
            Some(previous_end) => raw_gap(previous_end, record.start_time),
        };
        self.previous = Some(record.end_time);
        effective_delay(raw, &self.timing)
    }
}
