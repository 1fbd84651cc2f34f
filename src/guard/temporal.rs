//! Temporal velocity guard for periodic outbound actions.
//!
//! A follow-up may not be re-sent before the configured minimum gap has
//! elapsed. No prior history always passes. The boundary is inclusive:
//! exactly `min_hours` elapsed is not a violation, strictly less is.

use std::fmt;

use serde::Serialize;

use crate::config::SECS_PER_HOUR;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalViolation {
    pub elapsed_hours: f64,
    pub min_hours: f64,
}

/// Inspecting entry point: reports the violation without raising.
pub fn check(last_sent: Option<u64>, candidate: u64, min_hours: f64) -> Option<TemporalViolation> {
    let last = last_sent?;
    let elapsed_hours = candidate.saturating_sub(last) as f64 / SECS_PER_HOUR;
    if elapsed_hours < min_hours {
        Some(TemporalViolation { elapsed_hours, min_hours })
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct TemporalError {
    pub violation: TemporalViolation,
}

impl fmt::Display for TemporalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "temporal guard rejected send: {:.3}h elapsed, minimum {:.0}h",
            self.violation.elapsed_hours, self.violation.min_hours
        )
    }
}

impl std::error::Error for TemporalError {}

/// Enforcing entry point: raises on the first failing condition.
pub fn enforce(last_sent: Option<u64>, candidate: u64, min_hours: f64) -> Result<(), TemporalError> {
    match check(last_sent, candidate, min_hours) {
        Some(violation) => Err(TemporalError { violation }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: u64 = 3600;

    #[test]
    fn test_no_history_passes() {
        assert!(check(None, 0, 24.0).is_none());
        assert!(enforce(None, 12345, 24.0).is_ok());
    }

    #[test]
    fn test_just_under_24h_violates() {
        // 23.999h = 86396.4s; use 86396s = 23.9988...h
        let v = check(Some(0), 24 * H - 4, 24.0).expect("violation");
        assert!(v.elapsed_hours < 24.0);
        assert!(enforce(Some(0), 24 * H - 4, 24.0).is_err());
    }

    #[test]
    fn test_exactly_24h_passes() {
        assert!(check(Some(0), 24 * H, 24.0).is_none());
        assert!(enforce(Some(0), 24 * H, 24.0).is_ok());
    }

    #[test]
    fn test_well_past_24h_passes() {
        assert!(check(Some(0), 48 * H, 24.0).is_none());
    }

    #[test]
    fn test_clock_skew_does_not_underflow() {
        // Candidate earlier than last send: elapsed saturates to zero
        // and the guard holds the line.
        let v = check(Some(10 * H), 9 * H, 24.0).expect("violation");
        assert_eq!(v.elapsed_hours, 0.0);
    }
}
