// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Time-indexed interval functions.
//!
//! A [`Tube`] encloses an unknown trajectory by an ordered sequence of time
//! slices over a shared grid. Each slice carries an *envelope* (the codomain
//! over its time span) and two *gates* (the value at its two boundary times).
//! Adjacent slices physically share their common gate: the tube stores `k+1`
//! gates and `k` envelopes. Narrowing a gate therefore narrows it for both of
//! its neighbors at once, which is the structural counterpart of the
//! inter-slice continuity constraint.

use gcollections::ops::*;
use serde::{Deserialize, Serialize};
use trilean::SKleene;

use crate::interval::Interval;
use crate::interval_vector::IntervalVector;
use crate::ops::{Hull, Whole};

/// One time-step segment of a tube, as a standalone value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
  tdomain: Interval,
  input_gate: Interval,
  output_gate: Interval,
  envelope: Interval,
}

impl Slice {
  pub fn new(
    tdomain: Interval,
    input_gate: Interval,
    output_gate: Interval,
    envelope: Interval,
  ) -> Slice {
    debug_assert!(!tdomain.is_empty());
    Slice { tdomain, input_gate, output_gate, envelope }
  }

  pub fn tdomain(&self) -> Interval {
    self.tdomain
  }

  pub fn input_gate(&self) -> Interval {
    self.input_gate
  }

  pub fn output_gate(&self) -> Interval {
    self.output_gate
  }

  pub fn envelope(&self) -> Interval {
    self.envelope
  }

  pub fn set_input_gate(&mut self, g: Interval) {
    self.input_gate = g;
  }

  pub fn set_output_gate(&mut self, g: Interval) {
    self.output_gate = g;
  }

  pub fn set_envelope(&mut self, e: Interval) {
    self.envelope = e;
  }

  pub fn is_empty(&self) -> bool {
    self.input_gate.is_empty() || self.output_gate.is_empty() || self.envelope.is_empty()
  }

  /// Intersects every set of this slice with the corresponding set of `x`.
  pub fn intersect(&mut self, x: &Slice) {
    self.input_gate = self.input_gate & x.input_gate;
    self.output_gate = self.output_gate & x.output_gate;
    self.envelope = self.envelope & x.envelope;
  }
}

/// Enclosure of a scalar trajectory over a time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tube {
  times: Vec<f64>,
  gates: Vec<Interval>,
  envelopes: Vec<Interval>,
}

impl Tube {
  /// Tube over `tdomain` cut into slices of width `dt` (the last slice is
  /// truncated to the end of the domain), with every envelope and gate set
  /// to `codomain`.
  pub fn new(tdomain: Interval, dt: f64, codomain: Interval) -> Tube {
    assert!(!tdomain.is_empty() && !tdomain.is_unbounded());
    assert!(dt > 0.);

    let mut times = vec![tdomain.lb()];
    let mut t = tdomain.lb() + dt;
    while t < tdomain.ub() {
      times.push(t);
      t += dt;
    }
    times.push(tdomain.ub());

    let nb_slices = times.len() - 1;
    Tube {
      times,
      gates: vec![codomain; nb_slices + 1],
      envelopes: vec![codomain; nb_slices],
    }
  }

  pub fn nb_slices(&self) -> usize {
    self.envelopes.len()
  }

  pub(crate) fn times(&self) -> &[f64] {
    &self.times
  }

  pub fn tdomain(&self) -> Interval {
    Interval::new(self.times[0], *self.times.last().unwrap())
  }

  pub fn slice_tdomain(&self, k: usize) -> Interval {
    Interval::new(self.times[k], self.times[k + 1])
  }

  pub fn input_gate(&self, k: usize) -> Interval {
    self.gates[k]
  }

  pub fn output_gate(&self, k: usize) -> Interval {
    self.gates[k + 1]
  }

  pub fn envelope(&self, k: usize) -> Interval {
    self.envelopes[k]
  }

  /// Snapshot of the `k`-th slice.
  pub fn slice(&self, k: usize) -> Slice {
    Slice::new(
      self.slice_tdomain(k),
      self.gates[k],
      self.gates[k + 1],
      self.envelopes[k],
    )
  }

  /// Intersects the `k`-th slice (gates included) with `x`.
  pub fn intersect_slice(&mut self, k: usize, x: &Slice) {
    self.gates[k] = self.gates[k] & x.input_gate();
    self.gates[k + 1] = self.gates[k + 1] & x.output_gate();
    self.envelopes[k] = self.envelopes[k] & x.envelope();
  }

  pub fn intersect_input_gate(&mut self, k: usize, g: Interval) {
    self.gates[k] = self.gates[k] & g;
  }

  pub fn intersect_output_gate(&mut self, k: usize, g: Interval) {
    self.gates[k + 1] = self.gates[k + 1] & g;
  }

  pub fn intersect_envelope(&mut self, k: usize, e: Interval) {
    self.envelopes[k] = self.envelopes[k] & e;
  }

  pub fn intersect_gate_at(&mut self, t: f64, g: Interval) {
    if let Some(i) = self.times.iter().position(|&b| b == t) {
      self.gates[i] = self.gates[i] & g;
    }
  }

  /// Intersects this tube with `x`, slice by slice.
  pub fn intersect(&mut self, x: &Tube) {
    debug_assert!(Tube::same_slicing(self, x));
    for (g, xg) in self.gates.iter_mut().zip(x.gates.iter()) {
      *g = *g & *xg;
    }
    for (e, xe) in self.envelopes.iter_mut().zip(x.envelopes.iter()) {
      *e = *e & *xe;
    }
  }

  /// Hull of the envelopes.
  pub fn codomain(&self) -> Interval {
    self
      .envelopes
      .iter()
      .fold(Interval::empty(), |acc, e| acc.hull(e))
  }

  /// Evaluation at time `t`: the gate if `t` is a grid boundary, the
  /// envelope of the enclosing slice otherwise.
  pub fn eval(&self, t: f64) -> Interval {
    if let Some(i) = self.times.iter().position(|&b| b == t) {
      return self.gates[i];
    }
    for k in 0..self.nb_slices() {
      if self.slice_tdomain(k).contains(&t) {
        return self.envelopes[k];
      }
    }
    Interval::empty()
  }

  pub fn is_empty(&self) -> bool {
    self.gates.iter().any(|g| g.is_empty()) || self.envelopes.iter().any(|e| e.is_empty())
  }

  pub fn same_slicing(x: &Tube, y: &Tube) -> bool {
    x.times == y.times
  }

  /// Three-valued membership test of a sampled trajectory.
  ///
  /// `True` when the interpolated enclosure of the samples lies inside the
  /// tube over its whole time domain, `False` when some sample escapes the
  /// tube, `Unknown` when the samples do not cover the time domain or the
  /// enclosures overlap without inclusion.
  pub fn contains(&self, traj: &Trajectory) -> SKleene {
    for &(t, y) in traj.samples() {
      if self.tdomain().contains(&t) && y.is_disjoint(&self.eval(t)) {
        return SKleene::False;
      }
    }
    if !self.tdomain().is_subset(&traj.tdomain()) {
      return SKleene::Unknown;
    }
    for k in 0..self.nb_slices() {
      if !traj.range_over(self.slice_tdomain(k)).is_subset(&self.envelopes[k]) {
        return SKleene::Unknown;
      }
    }
    SKleene::True
  }
}

impl std::fmt::Display for Tube {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(
      f,
      "Tube {}↦{} ({} slices)",
      self.tdomain(),
      self.codomain(),
      self.nb_slices()
    )
  }
}

/// Enclosure of a vector trajectory: one tube per component, same slicing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TubeVector {
  tubes: Vec<Tube>,
}

impl TubeVector {
  pub fn new(tdomain: Interval, dt: f64, codomain: IntervalVector) -> TubeVector {
    TubeVector {
      tubes: (0..codomain.size())
        .map(|i| Tube::new(tdomain, dt, codomain[i]))
        .collect(),
    }
  }

  pub fn size(&self) -> usize {
    self.tubes.len()
  }

  pub fn nb_slices(&self) -> usize {
    self.tubes[0].nb_slices()
  }

  pub fn tdomain(&self) -> Interval {
    self.tubes[0].tdomain()
  }

  pub fn tube(&self, i: usize) -> &Tube {
    &self.tubes[i]
  }

  pub fn tube_mut(&mut self, i: usize) -> &mut Tube {
    &mut self.tubes[i]
  }

  pub fn codomain(&self) -> IntervalVector {
    IntervalVector::from(self.tubes.iter().map(Tube::codomain).collect::<Vec<_>>())
  }

  pub fn is_empty(&self) -> bool {
    self.tubes.iter().any(Tube::is_empty)
  }

  pub fn same_slicing(x: &TubeVector, y: &TubeVector) -> bool {
    x.size() == y.size()
      && x
        .tubes
        .iter()
        .zip(y.tubes.iter())
        .all(|(a, b)| Tube::same_slicing(a, b))
  }
}

impl From<Vec<Tube>> for TubeVector {
  fn from(tubes: Vec<Tube>) -> TubeVector {
    assert!(!tubes.is_empty());
    assert!(tubes.iter().all(|t| Tube::same_slicing(t, &tubes[0])));
    TubeVector { tubes }
  }
}

/// Time-increasing interval samples with piecewise-linear interpolation.
///
/// This is the buffer behind `ContractorNetwork::add_data`: measurements
/// arrive in time order and slices fully covered by the sampled span can be
/// contracted to the interpolated enclosure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
  samples: Vec<(f64, Interval)>,
}

impl Trajectory {
  pub fn new() -> Trajectory {
    Trajectory { samples: Vec::new() }
  }

  pub fn samples(&self) -> &[(f64, Interval)] {
    &self.samples
  }

  pub fn last_time(&self) -> Option<f64> {
    self.samples.last().map(|&(t, _)| t)
  }

  /// Appends a sample; `t` must be greater than every previous time.
  pub fn push(&mut self, t: f64, y: Interval) {
    debug_assert!(self.last_time().map_or(true, |last| t > last));
    self.samples.push((t, y));
  }

  pub fn tdomain(&self) -> Interval {
    match (self.samples.first(), self.samples.last()) {
      (Some(&(t0, _)), Some(&(tf, _))) => Interval::new(t0, tf),
      _ => Interval::empty(),
    }
  }

  /// Linear interpolation of the enclosure at time `t`.
  pub fn interpolate(&self, t: f64) -> Interval {
    if !self.tdomain().contains(&t) {
      return Interval::whole();
    }
    for w in self.samples.windows(2) {
      let (t0, y0) = w[0];
      let (t1, y1) = w[1];
      if t >= t0 && t <= t1 {
        if t0 == t1 {
          return y0 & y1;
        }
        let ratio = Interval::singleton((t - t0) / (t1 - t0));
        return y0 + ratio * (y1 - y0);
      }
    }
    // t coincides with the single sample.
    self.samples[0].1
  }

  /// Hull of the interpolated enclosure over `window`.
  pub fn range_over(&self, window: Interval) -> Interval {
    if window.is_empty() || !window.is_subset(&self.tdomain()) {
      return Interval::whole();
    }
    let mut range = self.interpolate(window.lb()).hull(&self.interpolate(window.ub()));
    for &(t, y) in &self.samples {
      if t > window.lb() && t < window.ub() {
        range = range.hull(&y);
      }
    }
    range
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tube_4() -> Tube {
    Tube::new(Interval::new(0., 20.), 5., Interval::new(-10., 10.))
  }

  #[test]
  fn slicing() {
    let x = tube_4();
    assert_eq!(x.nb_slices(), 4);
    assert_eq!(x.tdomain(), Interval::new(0., 20.));
    assert_eq!(x.slice_tdomain(0), Interval::new(0., 5.));
    assert_eq!(x.slice_tdomain(3), Interval::new(15., 20.));
    assert_eq!(x.codomain(), Interval::new(-10., 10.));

    // Truncated last slice.
    let y = Tube::new(Interval::new(0., 11.), 5., Interval::new(0., 1.));
    assert_eq!(y.nb_slices(), 3);
    assert_eq!(y.slice_tdomain(2), Interval::new(10., 11.));

    assert!(Tube::same_slicing(&x, &tube_4()));
    assert!(!Tube::same_slicing(&x, &y));
  }

  #[test]
  fn shared_gates() {
    let mut x = tube_4();
    let mut s = x.slice(1);
    s.set_output_gate(Interval::new(0., 2.));
    s.set_envelope(Interval::new(-5., 5.));
    x.intersect_slice(1, &s);

    // The output gate of slice 1 is the input gate of slice 2.
    assert_eq!(x.output_gate(1), Interval::new(0., 2.));
    assert_eq!(x.input_gate(2), Interval::new(0., 2.));
    assert_eq!(x.envelope(1), Interval::new(-5., 5.));
  }

  #[test]
  fn eval_gates_and_envelopes() {
    let mut x = tube_4();
    x.intersect_gate_at(5., Interval::singleton(2.));
    assert_eq!(x.eval(5.), Interval::singleton(2.));
    assert_eq!(x.eval(7.), Interval::new(-10., 10.));
    assert!(x.eval(25.).is_empty());
  }

  #[test]
  fn emptiness() {
    let mut x = tube_4();
    assert!(!x.is_empty());
    x.intersect_envelope(2, Interval::empty());
    assert!(x.is_empty());
  }

  #[test]
  fn trajectory_interpolation() {
    let mut traj = Trajectory::new();
    traj.push(0., Interval::singleton(0.));
    traj.push(2., Interval::singleton(4.));
    traj.push(3., Interval::new(3., 5.));

    assert_eq!(traj.interpolate(1.), Interval::singleton(2.));
    assert_eq!(traj.interpolate(2.), Interval::singleton(4.));
    assert_eq!(traj.range_over(Interval::new(0., 2.)), Interval::new(0., 4.));
    assert_eq!(traj.range_over(Interval::new(1., 3.)), Interval::new(2., 5.));
    assert_eq!(traj.range_over(Interval::new(0., 5.)), Interval::whole());
  }

  #[test]
  fn contains_three_valued() {
    use trilean::SKleene;

    let x = Tube::new(Interval::new(0., 10.), 1., Interval::new(-1., 1.));

    let mut inside = Trajectory::new();
    inside.push(0., Interval::singleton(0.));
    inside.push(10., Interval::singleton(0.));
    assert_eq!(x.contains(&inside), SKleene::True);

    let mut outside = Trajectory::new();
    outside.push(0., Interval::singleton(0.));
    outside.push(5., Interval::singleton(8.));
    assert_eq!(x.contains(&outside), SKleene::False);

    let mut partial = Trajectory::new();
    partial.push(0., Interval::singleton(0.));
    partial.push(5., Interval::singleton(0.));
    assert_eq!(x.contains(&partial), SKleene::Unknown);
  }

  #[test]
  fn tube_vector() {
    let tv = TubeVector::new(
      Interval::new(0., 10.),
      1.,
      IntervalVector::new(2, Interval::new(0., 1.)),
    );
    assert_eq!(tv.size(), 2);
    assert_eq!(tv.nb_slices(), 10);
    assert!(!tv.is_empty());
    assert_eq!(tv.codomain()[1], Interval::new(0., 1.));
  }
}
