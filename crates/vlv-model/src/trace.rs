//! Calibration diagnostics.
//!
//! Grid construction and calibration report what they do through a
//! [`CalibrationObserver`]. Events are plain data; text is only produced by
//! observers that want it, so a disabled trace costs one virtual call per
//! event. Every event is also forwarded to `tracing`.

use crate::params::Wing;
use std::fmt;
use vlv_core::{Real, Size};

/// Why the ODE solver stopped walking a wing before its last input point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationReason {
    /// The local vol at the point would be zero or negative.
    NonPositiveVol,
    /// A level, coordinate or vol came out as NaN or infinite.
    NonFinite,
    /// The point does not move away from the previous one.
    NonMonotonic,
    /// The point lies beyond the extrapolation bound.
    BeyondBound,
}

impl fmt::Display for TruncationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TruncationReason::NonPositiveVol => "non-positive local vol",
            TruncationReason::NonFinite => "non-finite value",
            TruncationReason::NonMonotonic => "non-monotonic grid",
            TruncationReason::BeyondBound => "beyond extrapolation bound",
        })
    }
}

/// Something worth recording during construction.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationEvent {
    /// A wing was cut at `index`; that point moved onto the bound.
    WingTruncated {
        /// Affected wing.
        wing: Wing,
        /// Index of the rejected grid point.
        index: Size,
        /// Why it was rejected.
        reason: TruncationReason,
    },
    /// The last segment of a wing could not reach the bound with its slope
    /// and was flattened.
    SegmentFlattened {
        /// Affected wing.
        wing: Wing,
        /// Segment index.
        index: Size,
    },
    /// One calibration round finished.
    Round {
        /// Zero-based round number.
        round: Size,
        /// Whether `sigma0` was held fixed.
        warm_up: bool,
        /// Forward shift after the update.
        mu: Real,
        /// Central vol after the update.
        sigma0: Real,
        /// Forward error measured before the update.
        forward_error: Real,
        /// Straddle error measured before the update.
        straddle_error: Real,
    },
    /// The update in `round` was not finite; calibration stopped.
    UpdateNotFinite {
        /// Zero-based round number.
        round: Size,
    },
    /// Calibration met both tolerances.
    Converged {
        /// Rounds used.
        iterations: Size,
    },
    /// The round cap was hit, or calibration stopped early, without convergence.
    NotConverged {
        /// Rounds used.
        iterations: Size,
        /// Remaining forward error.
        forward_residual: Real,
        /// Remaining straddle error.
        straddle_residual: Real,
    },
    /// Post-calibration adjustment applied.
    AdjustmentApplied {
        /// Scale.
        alpha: Real,
        /// Shift.
        nu: Real,
    },
    /// Post-calibration adjustment skipped.
    AdjustmentRejected {
        /// Human readable cause.
        reason: String,
    },
}

impl fmt::Display for CalibrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationEvent::WingTruncated {
                wing,
                index,
                reason,
            } => write!(f, "{wing} wing truncated at index {index}: {reason}"),
            CalibrationEvent::SegmentFlattened { wing, index } => {
                write!(f, "{wing} wing segment {index} flattened at the bound")
            }
            CalibrationEvent::Round {
                round,
                warm_up,
                mu,
                sigma0,
                forward_error,
                straddle_error,
            } => write!(
                f,
                "round {round}{}: forward error {forward_error:e}, straddle error {straddle_error:e} -> mu {mu}, sigma0 {sigma0}",
                if *warm_up { " (forward only)" } else { "" }
            ),
            CalibrationEvent::UpdateNotFinite { round } => {
                write!(f, "round {round}: update is not finite, calibration stopped")
            }
            CalibrationEvent::Converged { iterations } => {
                write!(f, "calibration converged after {iterations} iterations")
            }
            CalibrationEvent::NotConverged {
                iterations,
                forward_residual,
                straddle_residual,
            } => write!(
                f,
                "calibration did not converge after {iterations} iterations: forward residual {forward_residual:e}, straddle residual {straddle_residual:e}"
            ),
            CalibrationEvent::AdjustmentApplied { alpha, nu } => {
                write!(f, "ATM adjustment applied: alpha {alpha}, nu {nu}")
            }
            CalibrationEvent::AdjustmentRejected { reason } => {
                write!(f, "ATM adjustment rejected: {reason}")
            }
        }
    }
}

/// Receives calibration events.
pub trait CalibrationObserver {
    /// Called once per event, in order.
    fn on_event(&mut self, event: &CalibrationEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl CalibrationObserver for NoTrace {
    fn on_event(&mut self, _event: &CalibrationEvent) {}
}

/// Observer collecting the text of every event.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TraceLog {
    records: Vec<String>,
}

impl TraceLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records so far.
    pub fn records(&self) -> &[String] {
        &self.records
    }

    /// Consume into the records.
    pub fn into_records(self) -> Vec<String> {
        self.records
    }
}

impl CalibrationObserver for TraceLog {
    fn on_event(&mut self, event: &CalibrationEvent) {
        self.records.push(event.to_string());
    }
}

/// Forwards to the model's own log (if enabled) and a caller observer.
pub(crate) struct Fanout<'a> {
    pub(crate) log: Option<TraceLog>,
    pub(crate) external: Option<&'a mut dyn CalibrationObserver>,
}

impl CalibrationObserver for Fanout<'_> {
    fn on_event(&mut self, event: &CalibrationEvent) {
        if let Some(log) = self.log.as_mut() {
            log.on_event(event);
        }
        if let Some(external) = self.external.as_deref_mut() {
            external.on_event(event);
        }
    }
}

/// Emit `event` to `tracing` and to `observer`.
pub(crate) fn notify(observer: &mut dyn CalibrationObserver, event: CalibrationEvent) {
    match &event {
        CalibrationEvent::NotConverged {
            iterations,
            forward_residual,
            straddle_residual,
        } => tracing::warn!(
            iterations,
            forward_residual,
            straddle_residual,
            "calibration did not converge"
        ),
        CalibrationEvent::UpdateNotFinite { round } => {
            tracing::warn!(round, "calibration update is not finite")
        }
        CalibrationEvent::AdjustmentRejected { reason } => {
            tracing::warn!(%reason, "ATM adjustment rejected")
        }
        CalibrationEvent::Round {
            round,
            forward_error,
            straddle_error,
            ..
        } => tracing::debug!(round, forward_error, straddle_error, "calibration round"),
        other => tracing::debug!(event = %other, "local vol model"),
    }
    observer.on_event(&event);
}
