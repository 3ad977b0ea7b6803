//! Value computers: the pure numeric kernel (`spec.md` §4.1).
//!
//! A [`ValueComputer`] is a strategy precomputed once from a [`Waveform`] and
//! queried many times at arbitrary tick offsets. Four variants are dispatched
//! by [`make_value_computer`] on `(kind, meta)`; an unrecognized combination
//! returns `None` and the engine refuses to start that node's loop
//! (`spec.md` §4.1 "Factory rules", §7 "Precondition error").

use std::collections::HashMap;

use crate::waveform::{Smoothing, TransitionPoint, Waveform, WaveformKind, WaveformPointValue};

/// Evaluates a waveform's value at an arbitrary tick offset in
/// `[0, waveform.duration_ms]`. Out-of-range ticks are reported (logged) and
/// yield a neutral value rather than `None` — `None` is reserved for "this
/// computer could not be constructed at all" (see [`make_value_computer`]).
pub trait ValueComputer: Send {
    fn value_at(&self, tick_offset_ms: u64) -> WaveformPointValue;
}

/// Builds the appropriate [`ValueComputer`] for a waveform, or `None` if the
/// `(kind, meta)` combination is not recognized. Callers must log and refuse
/// to start the corresponding engine loop when `None` is returned.
pub fn make_value_computer(waveform: &Waveform) -> Option<Box<dyn ValueComputer>> {
    match (waveform.kind, waveform.meta) {
        (WaveformKind::Transitions, None) => {
            Some(Box::new(TransitionComputer::new(waveform)))
        }
        (WaveformKind::NumericValues, Some(Smoothing::Step)) => {
            Some(Box::new(StepComputer::new(waveform)))
        }
        (WaveformKind::NumericValues, Some(Smoothing::Linear)) => {
            Some(Box::new(LinearComputer::new(waveform)))
        }
        (WaveformKind::NumericValues, Some(Smoothing::CubicSpline)) => {
            Some(Box::new(CubicSplineComputer::new(waveform)))
        }
        (kind, meta) => {
            tracing::warn!(?kind, ?meta, "unrecognized waveform kind/smoothing combination");
            None
        }
    }
}

fn map_value_to_new_range(
    original_start: f64,
    original_end: f64,
    value: f64,
    new_start: f64,
    new_end: f64,
) -> f64 {
    let original_delta = original_end - original_start;
    if original_delta == 0.0 {
        return 0.0;
    }
    let proportion = (value - original_start) / original_delta;
    new_start + proportion * (new_end - new_start)
}

// ============================================================================
// Step
// ============================================================================

/// Precomputes the value at every multiple of `tick_frequency_ms` in
/// `[0, duration]`; ticks without an explicit transition inherit the most
/// recent prior explicit value (or the first explicit value, before it).
pub struct StepComputer {
    values: HashMap<u64, WaveformPointValue>,
    kind: WaveformKind,
}

impl StepComputer {
    pub fn new(waveform: &Waveform) -> Self {
        Self::from_points(&waveform.transition_points, waveform.tick_frequency_ms, waveform.duration_ms, waveform.kind)
    }

    fn from_points(
        points: &[TransitionPoint],
        tick_frequency_ms: u32,
        duration_ms: u64,
        kind: WaveformKind,
    ) -> Self {
        let mut values: HashMap<u64, WaveformPointValue> = HashMap::new();
        for tp in points {
            values.insert(tp.tick, tp.value);
        }

        if tick_frequency_ms != 0 {
            let mut prev = points[0].value;
            let tick_count = duration_ms / tick_frequency_ms as u64;
            for i in 0..=tick_count {
                let t = i * tick_frequency_ms as u64;
                match values.get(&t) {
                    Some(v) => prev = *v,
                    None => {
                        values.insert(t, prev);
                    }
                }
            }
        }

        StepComputer { values, kind }
    }
}

impl ValueComputer for StepComputer {
    fn value_at(&self, tick_offset_ms: u64) -> WaveformPointValue {
        match self.values.get(&tick_offset_ms) {
            Some(v) => *v,
            None => {
                tracing::warn!(tick = tick_offset_ms, "step computer: invalid tick");
                WaveformPointValue::neutral(self.kind)
            }
        }
    }
}

// ============================================================================
// Linear
// ============================================================================

#[derive(Clone, Copy)]
struct Section {
    from_tick: u64,
    from_value: f64,
    to_tick: u64,
    to_value: f64,
}

/// Partitions the cycle into sections between consecutive explicit points
/// (prepending/appending boundary sections as needed) and linearly
/// interpolates the enclosing section at query time.
pub struct LinearComputer {
    sections: Vec<Section>,
}

impl LinearComputer {
    pub fn new(waveform: &Waveform) -> Self {
        let points = &waveform.transition_points;
        let mut sections = Vec::with_capacity(points.len() + 1);

        for w in points.windows(2) {
            sections.push(Section {
                from_tick: w[0].tick,
                from_value: w[0].value.as_f64(),
                to_tick: w[1].tick,
                to_value: w[1].value.as_f64(),
            });
        }

        let first = points[0];
        if first.tick > 0 {
            sections.push(Section {
                from_tick: 0,
                from_value: first.value.as_f64(),
                to_tick: first.tick,
                to_value: first.value.as_f64(),
            });
        }

        let last = *points.last().unwrap();
        if last.tick < waveform.duration_ms {
            sections.push(Section {
                from_tick: last.tick,
                from_value: last.value.as_f64(),
                to_tick: waveform.duration_ms,
                to_value: last.value.as_f64(),
            });
        }

        sections.sort_by_key(|s| s.from_tick);
        LinearComputer { sections }
    }

    fn encompassing_section(&self, t: u64) -> Option<&Section> {
        let mut left = 0i64;
        let mut right = self.sections.len() as i64 - 1;
        while left <= right {
            let mid = ((left + right) / 2) as usize;
            let section = &self.sections[mid];
            if section.from_tick <= t && section.to_tick >= t {
                return Some(section);
            }
            if section.to_tick < t {
                left = mid as i64 + 1;
            } else {
                right = mid as i64 - 1;
            }
        }
        None
    }
}

impl ValueComputer for LinearComputer {
    fn value_at(&self, tick_offset_ms: u64) -> WaveformPointValue {
        match self.encompassing_section(tick_offset_ms) {
            Some(s) => WaveformPointValue::Numeric(map_value_to_new_range(
                s.from_tick as f64,
                s.to_tick as f64,
                tick_offset_ms as f64,
                s.from_value,
                s.to_value,
            )),
            None => {
                tracing::warn!(tick = tick_offset_ms, "linear computer: invalid tick");
                WaveformPointValue::Numeric(0.0)
            }
        }
    }
}

// ============================================================================
// Cubic spline
// ============================================================================

struct SplineCoefficients {
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

/// Natural cubic spline over the (boundary-padded) explicit transition
/// points. Degrades to a constant-zero, 5-knot stub when fewer than three
/// explicit points are available (`spec.md` §4.1).
pub struct CubicSplineComputer {
    x: Vec<f64>,
    coefficients: SplineCoefficients,
}

impl CubicSplineComputer {
    pub fn new(waveform: &Waveform) -> Self {
        let points = &waveform.transition_points;
        if points.len() < 3 {
            tracing::warn!(
                count = points.len(),
                "cannot use cubic spline smoothing for fewer than 3 transition points; degrading to constant zero"
            );
            return CubicSplineComputer {
                x: vec![0.0; 5],
                coefficients: SplineCoefficients {
                    a: vec![0.0; 5],
                    b: vec![0.0; 5],
                    c: vec![0.0; 5],
                    d: vec![0.0; 5],
                },
            };
        }

        let mut x: Vec<f64> = points.iter().map(|p| p.tick as f64).collect();
        let mut y: Vec<f64> = points.iter().map(|p| p.value.as_f64()).collect();

        if x[0] != 0.0 {
            x.insert(0, 0.0);
            y.insert(0, points[0].value.as_f64());
        }
        let last_value = points.last().unwrap().value.as_f64();
        if *x.last().unwrap() != waveform.duration_ms as f64 {
            x.push(waveform.duration_ms as f64);
            y.push(last_value);
        }

        let coefficients = compute_natural_spline_coefficients(&x, &y);
        CubicSplineComputer { x, coefficients }
    }

    fn interpolate(&self, t: u64) -> f64 {
        let x_query = t as f64;
        let n = self.x.len() - 1;
        let mut i = 0;
        while i < n && x_query > self.x[i + 1] {
            i += 1;
        }
        let dx = x_query - self.x[i];
        let SplineCoefficients { a, b, c, d } = &self.coefficients;
        a[i] + b[i] * dx + c[i] * dx * dx + d[i] * dx * dx * dx
    }
}

/// Thomas-algorithm solve of the natural cubic spline tridiagonal system.
/// `x`/`y` are the padded knot coordinates (`n + 1` knots, `n` intervals).
fn compute_natural_spline_coefficients(x: &[f64], y: &[f64]) -> SplineCoefficients {
    let n = x.len() - 1;

    let mut h = vec![0.0; n];
    for i in 0..n {
        h[i] = x[i + 1] - x[i];
    }

    let mut alpha = vec![0.0; n];
    for i in 1..n {
        alpha[i] = (3.0 / h[i]) * (y[i + 1] - y[i]) - (3.0 / h[i - 1]) * (y[i] - y[i - 1]);
    }

    let mut l = vec![0.0; n + 1];
    let mut mu = vec![0.0; n];
    let mut z = vec![0.0; n + 1];

    l[0] = 1.0;
    for i in 1..n {
        l[i] = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
        mu[i] = h[i] / l[i];
        z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
    }
    l[n] = 1.0;
    z[n] = 0.0;

    let mut c = vec![0.0; n + 1];
    for j in (0..n).rev() {
        c[j] = z[j] - mu[j] * c[j + 1];
    }

    let mut b = vec![0.0; n];
    let mut d = vec![0.0; n];
    let a = y.to_vec();
    for i in 0..n {
        b[i] = (y[i + 1] - y[i]) / h[i] - h[i] * (c[i + 1] + 2.0 * c[i]) / 3.0;
        d[i] = (c[i + 1] - c[i]) / (3.0 * h[i]);
    }

    SplineCoefficients { a, b, c, d }
}

impl ValueComputer for CubicSplineComputer {
    fn value_at(&self, tick_offset_ms: u64) -> WaveformPointValue {
        WaveformPointValue::Numeric(self.interpolate(tick_offset_ms))
    }
}

// ============================================================================
// Transition (boolean)
// ============================================================================

/// Synthesizes a derived 0/1 numeric waveform (one entry per explicit
/// transition, alternating starting at 0) and delegates to [`StepComputer`],
/// converting the result to a boolean at query time.
pub struct TransitionComputer {
    step: StepComputer,
}

impl TransitionComputer {
    pub fn new(waveform: &Waveform) -> Self {
        let mut derived = Vec::with_capacity(waveform.transition_points.len() + 1);
        let mut level = 0u8;
        derived.push(TransitionPoint {
            tick: 0,
            value: WaveformPointValue::Numeric(level as f64),
        });
        for p in &waveform.transition_points {
            level ^= 1;
            derived.push(TransitionPoint {
                tick: p.tick,
                value: WaveformPointValue::Numeric(level as f64),
            });
        }

        let step = StepComputer::from_points(
            &derived,
            waveform.tick_frequency_ms,
            waveform.duration_ms,
            WaveformKind::NumericValues,
        );
        TransitionComputer { step }
    }
}

impl ValueComputer for TransitionComputer {
    fn value_at(&self, tick_offset_ms: u64) -> WaveformPointValue {
        WaveformPointValue::Boolean(self.step.value_at(tick_offset_ms).as_f64() != 0.0)
    }
}
