//! Waveform model: the immutable description of a periodic signal.
//!
//! A [`Waveform`] carries a duration, a tick frequency, a kind (boolean
//! transitions vs. numeric values), an ordered set of explicit transition
//! points, and — for numeric waveforms — a smoothing strategy. Once handed to
//! the value-change engine a waveform never changes; all interpolation state
//! lives in the [`crate::value_computer`] variants built from it.

use serde::{Deserialize, Serialize};

/// A single value carried by a waveform: either a boolean level (for
/// `Transitions` waveforms) or a double-precision number (for
/// `NumericValues` waveforms).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WaveformPointValue {
    Boolean(bool),
    Numeric(f64),
}

impl WaveformPointValue {
    /// The neutral value returned for an out-of-range query: `false` for
    /// booleans, `0.0` for numerics.
    pub fn neutral(kind: WaveformKind) -> Self {
        match kind {
            WaveformKind::Transitions => WaveformPointValue::Boolean(false),
            WaveformKind::NumericValues => WaveformPointValue::Numeric(0.0),
        }
    }

    /// The raw `f64` backing this value, treating booleans as `0.0`/`1.0`.
    pub fn as_f64(&self) -> f64 {
        match self {
            WaveformPointValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            WaveformPointValue::Numeric(v) => *v,
        }
    }

    /// `true` for a non-zero numeric, or a `true` boolean.
    pub fn as_bool(&self) -> bool {
        match self {
            WaveformPointValue::Boolean(b) => *b,
            WaveformPointValue::Numeric(v) => *v != 0.0,
        }
    }
}

/// Whether a waveform describes boolean transitions or numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveformKind {
    Transitions,
    NumericValues,
}

/// Interpolation strategy between explicit numeric transition points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Smoothing {
    Step,
    Linear,
    CubicSpline,
}

/// A single explicit anchor: a tick offset and its associated value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionPoint {
    pub tick: u64,
    pub value: WaveformPointValue,
}

/// Errors rejecting a structurally invalid waveform at construction time.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WaveformError {
    #[error("waveform must have at least one transition point")]
    Empty,
    #[error("duration must be positive")]
    ZeroDuration,
    #[error("transition tick {tick} exceeds duration {duration}")]
    TickOutOfRange { tick: u64, duration: u64 },
    #[error("transition ticks must be strictly increasing, found {prev} then {next}")]
    UnsortedTicks { prev: u64, next: u64 },
    #[error("numeric waveform contains a non-finite value at tick {tick}")]
    NonFiniteValue { tick: u64 },
    #[error("numeric waveform requires a smoothing strategy")]
    MissingSmoothing,
    #[error("transitions waveform must not declare a smoothing strategy")]
    UnexpectedSmoothing,
}

/// An immutable, periodic program of value transitions.
///
/// See `spec.md` §3 for the full invariant list. Construction via
/// [`Waveform::new`] enforces the structural invariants (non-empty, sorted
/// unique ticks in range, finite numerics, kind/meta pairing); precondition
/// failures that are about *interpolability* rather than structure (e.g. a
/// cubic spline with fewer than three points) are handled later, by
/// [`crate::value_computer`]'s factory.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub duration_ms: u64,
    pub tick_frequency_ms: u32,
    pub kind: WaveformKind,
    pub transition_points: Vec<TransitionPoint>,
    pub meta: Option<Smoothing>,
}

impl Waveform {
    /// Builds a waveform, validating the invariants from `spec.md` §3.
    pub fn new(
        duration_ms: u64,
        tick_frequency_ms: u32,
        kind: WaveformKind,
        transition_points: Vec<TransitionPoint>,
        meta: Option<Smoothing>,
    ) -> Result<Self, WaveformError> {
        if transition_points.is_empty() {
            return Err(WaveformError::Empty);
        }
        if duration_ms == 0 {
            // Duration zero is admissible per spec.md §4.3 (idle loop); the
            // waveform itself is still well-formed.
        }

        let mut prev: Option<u64> = None;
        for tp in &transition_points {
            if tp.tick > duration_ms {
                return Err(WaveformError::TickOutOfRange {
                    tick: tp.tick,
                    duration: duration_ms,
                });
            }
            if let Some(p) = prev {
                if tp.tick <= p {
                    return Err(WaveformError::UnsortedTicks {
                        prev: p,
                        next: tp.tick,
                    });
                }
            }
            prev = Some(tp.tick);

            if kind == WaveformKind::NumericValues {
                if let WaveformPointValue::Numeric(v) = tp.value {
                    if !v.is_finite() {
                        return Err(WaveformError::NonFiniteValue { tick: tp.tick });
                    }
                }
            }
        }

        match (kind, meta) {
            (WaveformKind::NumericValues, None) => return Err(WaveformError::MissingSmoothing),
            (WaveformKind::Transitions, Some(_)) => {
                return Err(WaveformError::UnexpectedSmoothing)
            }
            _ => {}
        }

        Ok(Waveform {
            duration_ms,
            tick_frequency_ms,
            kind,
            transition_points,
            meta,
        })
    }

    /// Number of ticks in one cycle, rounded down (`duration / tick_frequency`).
    pub fn tick_count(&self) -> u64 {
        if self.tick_frequency_ms == 0 {
            return 0;
        }
        self.duration_ms / self.tick_frequency_ms as u64
    }

    /// Whether the cycle length divides evenly into whole ticks.
    pub fn has_partial_final_tick(&self) -> bool {
        self.tick_frequency_ms != 0 && self.duration_ms % self.tick_frequency_ms as u64 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(tick: u64, value: f64) -> TransitionPoint {
        TransitionPoint {
            tick,
            value: WaveformPointValue::Numeric(value),
        }
    }

    #[test]
    fn rejects_empty_transition_points() {
        let err = Waveform::new(1000, 100, WaveformKind::NumericValues, vec![], Some(Smoothing::Step))
            .unwrap_err();
        assert_eq!(err, WaveformError::Empty);
    }

    #[test]
    fn rejects_unsorted_or_duplicate_ticks() {
        let pts = vec![tp(100, 1.0), tp(100, 2.0)];
        let err = Waveform::new(1000, 100, WaveformKind::NumericValues, pts, Some(Smoothing::Step))
            .unwrap_err();
        assert_eq!(err, WaveformError::UnsortedTicks { prev: 100, next: 100 });
    }

    #[test]
    fn rejects_tick_beyond_duration() {
        let pts = vec![tp(2000, 1.0)];
        let err = Waveform::new(1000, 100, WaveformKind::NumericValues, pts, Some(Smoothing::Step))
            .unwrap_err();
        assert_eq!(
            err,
            WaveformError::TickOutOfRange {
                tick: 2000,
                duration: 1000
            }
        );
    }

    #[test]
    fn rejects_non_finite_numeric() {
        let pts = vec![tp(0, f64::NAN)];
        let err = Waveform::new(1000, 100, WaveformKind::NumericValues, pts, Some(Smoothing::Step))
            .unwrap_err();
        assert_eq!(err, WaveformError::NonFiniteValue { tick: 0 });
    }

    #[test]
    fn requires_smoothing_for_numeric_kind() {
        let pts = vec![tp(0, 1.0)];
        let err = Waveform::new(1000, 100, WaveformKind::NumericValues, pts, None).unwrap_err();
        assert_eq!(err, WaveformError::MissingSmoothing);
    }

    #[test]
    fn rejects_smoothing_for_transitions_kind() {
        let pts = vec![TransitionPoint {
            tick: 0,
            value: WaveformPointValue::Boolean(false),
        }];
        let err = Waveform::new(
            1000,
            100,
            WaveformKind::Transitions,
            pts,
            Some(Smoothing::Step),
        )
        .unwrap_err();
        assert_eq!(err, WaveformError::UnexpectedSmoothing);
    }

    #[test]
    fn accepts_well_formed_waveform() {
        let pts = vec![tp(0, 1.0), tp(500, 2.0)];
        let w = Waveform::new(1000, 100, WaveformKind::NumericValues, pts, Some(Smoothing::Linear))
            .unwrap();
        assert_eq!(w.tick_count(), 10);
        assert!(!w.has_partial_final_tick());
    }
}
