//! Automatable audio parameters.
//!
//! [`AudioParam`] is the seam between the race core and whatever renders
//! sound. [`AutomatedParam`] is the in-crate implementation: a timeline of
//! [`Automation`] events that can be evaluated at any time, with the same
//! curve shapes as a WebAudio `AudioParam`.

use serde::Serialize;

/// A parameter that can be scheduled rather than set.
pub trait AudioParam {
    fn set_value_at_time(&mut self, value: f64, time: f64);
    fn linear_ramp_to_value_at_time(&mut self, value: f64, end_time: f64);
    fn exponential_ramp_to_value_at_time(&mut self, value: f64, end_time: f64);
    /// Approach `target` exponentially from `start_time` on.
    fn set_target_at_time(&mut self, target: f64, start_time: f64, time_constant: f64);

    /// Smoothly retarget from `now`, reaching ~63% of the way after one
    /// `time_constant`.
    fn ramp_to(&mut self, target: f64, now: f64, time_constant: f64) {
        self.set_target_at_time(target, now, time_constant);
    }

    /// Replay a recorded automation event.
    fn apply(&mut self, event: &Automation) {
        match *event {
            Automation::SetValue { value, time } => self.set_value_at_time(value, time),
            Automation::LinearRamp { value, end_time } => {
                self.linear_ramp_to_value_at_time(value, end_time)
            }
            Automation::ExponentialRamp { value, end_time } => {
                self.exponential_ramp_to_value_at_time(value, end_time)
            }
            Automation::SetTarget {
                target,
                start_time,
                time_constant,
            } => self.set_target_at_time(target, start_time, time_constant),
        }
    }
}

/// One scheduled change of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Automation {
    #[serde(rename_all = "camelCase")]
    SetValue { value: f64, time: f64 },
    #[serde(rename_all = "camelCase")]
    LinearRamp { value: f64, end_time: f64 },
    #[serde(rename_all = "camelCase")]
    ExponentialRamp { value: f64, end_time: f64 },
    #[serde(rename_all = "camelCase")]
    SetTarget {
        target: f64,
        start_time: f64,
        time_constant: f64,
    },
}

impl Automation {
    /// The time the event is ordered by: its start for instant and target
    /// events, its end for ramps.
    pub fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { time, .. } => time,
            Automation::LinearRamp { end_time, .. } => end_time,
            Automation::ExponentialRamp { end_time, .. } => end_time,
            Automation::SetTarget { start_time, .. } => start_time,
        }
    }
}

/// The curve in force after the last applied event.
#[derive(Debug, Clone, Copy)]
enum Segment {
    Hold(f64),
    Target {
        from: f64,
        target: f64,
        start: f64,
        time_constant: f64,
    },
}

impl Segment {
    fn value_at(&self, t: f64) -> f64 {
        match *self {
            Segment::Hold(v) => v,
            Segment::Target {
                from,
                target,
                start,
                time_constant,
            } => {
                if t <= start {
                    from
                } else if time_constant <= 0.0 {
                    target
                } else {
                    target + (from - target) * (-(t - start) / time_constant).exp()
                }
            }
        }
    }
}

/// A parameter with a default value and a sorted event timeline.
#[derive(Debug, Clone)]
pub struct AutomatedParam {
    default_value: f64,
    events: Vec<Automation>,
}

/// Where evaluation stopped: either inside an event, or after all of them.
enum Evaluation {
    Value(f64),
    Settled {
        segment: Segment,
        since: f64,
        applied: usize,
    },
}

impl AutomatedParam {
    pub fn new(default_value: f64) -> Self {
        AutomatedParam {
            default_value,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[Automation] {
        &self.events
    }

    /// Parameter value at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        match self.evaluate(t) {
            Evaluation::Value(v) => v,
            Evaluation::Settled { segment, .. } => segment.value_at(t),
        }
    }

    /// Collapse every event that no longer affects values at or after `t`.
    ///
    /// Retargeting once per frame would otherwise grow the timeline for
    /// the whole session.
    pub fn prune(&mut self, t: f64) {
        let Evaluation::Settled {
            segment,
            since,
            applied,
        } = self.evaluate_through(t)
        else {
            return;
        };
        if applied <= 1 {
            return;
        }

        let mut head = Vec::with_capacity(2);
        match segment {
            Segment::Hold(value) => head.push(Automation::SetValue { value, time: since }),
            Segment::Target {
                from,
                target,
                start,
                time_constant,
            } => {
                head.push(Automation::SetValue { value: from, time: start });
                head.push(Automation::SetTarget {
                    target,
                    start_time: start,
                    time_constant,
                });
            }
        }
        if head.len() >= applied {
            return;
        }
        self.events.splice(..applied, head);
    }

    fn insert(&mut self, event: Automation) {
        let at = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(at, event);
    }

    fn evaluate(&self, t: f64) -> Evaluation {
        self.walk(t, false)
    }

    /// Like `evaluate`, but only stops at events that begin after `t`;
    /// a ramp still in progress at `t` ends the walk.
    fn evaluate_through(&self, t: f64) -> Evaluation {
        self.walk(t, true)
    }

    fn walk(&self, t: f64, settle_only: bool) -> Evaluation {
        let mut segment = Segment::Hold(self.default_value);
        let mut since = f64::NEG_INFINITY;

        for (i, event) in self.events.iter().enumerate() {
            let stop = move |value: f64| {
                if settle_only {
                    Evaluation::Settled {
                        segment,
                        since,
                        applied: i,
                    }
                } else {
                    Evaluation::Value(value)
                }
            };

            match *event {
                Automation::SetValue { value, time } => {
                    if t < time {
                        return stop(segment.value_at(t));
                    }
                    segment = Segment::Hold(value);
                    since = time;
                }
                Automation::LinearRamp { value, end_time } => {
                    if t < end_time {
                        let from = segment.value_at(since);
                        return stop(linear(from, value, since, end_time, t));
                    }
                    segment = Segment::Hold(value);
                    since = end_time;
                }
                Automation::ExponentialRamp { value, end_time } => {
                    if t < end_time {
                        let from = segment.value_at(since);
                        return stop(exponential(from, value, since, end_time, t));
                    }
                    segment = Segment::Hold(value);
                    since = end_time;
                }
                Automation::SetTarget {
                    target,
                    start_time,
                    time_constant,
                } => {
                    if t < start_time {
                        return stop(segment.value_at(t));
                    }
                    segment = Segment::Target {
                        from: segment.value_at(start_time),
                        target,
                        start: start_time,
                        time_constant,
                    };
                    since = start_time;
                }
            }
        }

        Evaluation::Settled {
            segment,
            since,
            applied: self.events.len(),
        }
    }
}

impl AudioParam for AutomatedParam {
    fn set_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(Automation::SetValue { value, time });
    }

    fn linear_ramp_to_value_at_time(&mut self, value: f64, end_time: f64) {
        self.insert(Automation::LinearRamp { value, end_time });
    }

    fn exponential_ramp_to_value_at_time(&mut self, value: f64, end_time: f64) {
        self.insert(Automation::ExponentialRamp { value, end_time });
    }

    fn set_target_at_time(&mut self, target: f64, start_time: f64, time_constant: f64) {
        self.insert(Automation::SetTarget {
            target,
            start_time,
            time_constant,
        });
    }
}

fn linear(from: f64, to: f64, start: f64, end: f64, t: f64) -> f64 {
    if !start.is_finite() || t <= start {
        return from;
    }
    let span = end - start;
    if span <= 0.0 {
        return to;
    }
    from + (to - from) * (t - start) / span
}

/// Geometric interpolation. Ramps that would cross or touch zero hold the
/// start value until the end time.
fn exponential(from: f64, to: f64, start: f64, end: f64, t: f64) -> f64 {
    if !start.is_finite() || t <= start {
        return from;
    }
    if from == 0.0 || to == 0.0 || (from < 0.0) != (to < 0.0) {
        return from;
    }
    let span = end - start;
    if span <= 0.0 {
        return to;
    }
    from * (to / from).powf((t - start) / span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn default_value_without_events() {
        let p = AutomatedParam::new(440.0);
        assert_eq!(p.value_at(0.0), 440.0);
        assert_eq!(p.value_at(100.0), 440.0);
    }

    #[test]
    fn set_value_takes_effect_at_its_time() {
        let mut p = AutomatedParam::new(1.0);
        p.set_value_at_time(5.0, 2.0);
        assert_eq!(p.value_at(1.999), 1.0);
        assert_eq!(p.value_at(2.0), 5.0);
        assert_eq!(p.value_at(9.0), 5.0);
    }

    #[test]
    fn linear_ramp_interpolates() {
        let mut p = AutomatedParam::new(0.0);
        p.set_value_at_time(0.0, 1.0);
        p.linear_ramp_to_value_at_time(0.4, 1.5);
        assert!(close(p.value_at(1.0), 0.0));
        assert!(close(p.value_at(1.25), 0.2));
        assert!(close(p.value_at(1.5), 0.4));
        assert!(close(p.value_at(3.0), 0.4));
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut p = AutomatedParam::new(0.0);
        p.set_value_at_time(0.1, 0.0);
        p.exponential_ramp_to_value_at_time(0.001, 0.1);
        // Halfway through a 100:1 ramp is the geometric mean.
        assert!(close(p.value_at(0.05), 0.01));
        assert!(close(p.value_at(0.1), 0.001));
    }

    #[test]
    fn exponential_ramp_from_zero_holds_then_jumps() {
        let mut p = AutomatedParam::new(0.0);
        p.exponential_ramp_to_value_at_time(1.0, 1.0);
        p.set_value_at_time(0.0, -1.0);
        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 1.0);
    }

    #[test]
    fn set_target_approaches_exponentially() {
        let mut p = AutomatedParam::new(0.0);
        p.ramp_to(1.0, 0.0, 0.1);
        assert_eq!(p.value_at(0.0), 0.0);
        assert!(close(p.value_at(0.1), 1.0 - (-1.0f64).exp()));
        assert!(p.value_at(1.0) > 0.9999);
        assert!(p.value_at(1.0) < 1.0);
    }

    #[test]
    fn retarget_continues_from_current_value() {
        let mut p = AutomatedParam::new(60.0);
        p.ramp_to(120.0, 0.0, 0.1);
        let mid = p.value_at(0.05);
        p.ramp_to(60.0, 0.05, 0.1);
        assert!(close(p.value_at(0.05), mid), "no discontinuity on retarget");
        assert!(p.value_at(0.06) < mid);
    }

    #[test]
    fn events_are_kept_in_time_order() {
        let mut p = AutomatedParam::new(0.0);
        p.set_value_at_time(3.0, 3.0);
        p.set_value_at_time(1.0, 1.0);
        p.set_value_at_time(2.0, 2.0);
        let times: Vec<f64> = p.events().iter().map(Automation::time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
        assert_eq!(p.value_at(2.5), 2.0);
    }

    #[test]
    fn roar_envelope_shape() {
        let mut p = AutomatedParam::new(1.0);
        p.set_value_at_time(0.0, 0.0);
        p.linear_ramp_to_value_at_time(0.4, 0.5);
        p.exponential_ramp_to_value_at_time(0.01, 4.0);
        assert!(close(p.value_at(0.5), 0.4));
        let decaying = p.value_at(2.0);
        assert!(decaying < 0.4 && decaying > 0.01);
        assert!(close(p.value_at(4.0), 0.01));
    }

    #[test]
    fn prune_keeps_values_and_bounds_history() {
        let mut p = AutomatedParam::new(60.0);
        let mut reference = AutomatedParam::new(60.0);
        for frame in 0..600 {
            let now = frame as f64 / 60.0;
            let target = 60.0 + (frame % 50) as f64;
            p.ramp_to(target, now, 0.1);
            reference.ramp_to(target, now, 0.1);
            p.prune(now);
            assert!(p.events().len() <= 3, "history grew to {}", p.events().len());
            assert!(close(p.value_at(now + 0.005), reference.value_at(now + 0.005)));
        }
    }

    #[test]
    fn prune_leaves_ramp_in_progress() {
        let mut p = AutomatedParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.set_value_at_time(0.2, 1.0);
        p.linear_ramp_to_value_at_time(1.0, 3.0);
        let before = p.value_at(2.0);
        p.prune(2.0);
        assert!(close(p.value_at(2.0), before));
        assert!(close(p.value_at(3.0), 1.0));
        assert_eq!(p.events().len(), 2);
    }

    #[test]
    fn apply_replays_events() {
        let events = [
            Automation::SetValue { value: 0.0, time: 0.0 },
            Automation::LinearRamp { value: 0.3, end_time: 0.05 },
            Automation::LinearRamp { value: 0.0, end_time: 0.15 },
        ];
        let mut p = AutomatedParam::new(1.0);
        for e in &events {
            p.apply(e);
        }
        assert_eq!(p.events(), &events);
        assert!(close(p.value_at(0.05), 0.3));
        assert!(close(p.value_at(0.1), 0.15));
    }
}
