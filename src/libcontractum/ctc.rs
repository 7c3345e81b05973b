// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reference contractors.
//!
//! [`CtcFn`] lifts any closure over a box into a static contractor and
//! [`CtcEq`] is the static binary equality. [`CtcDeriv`] and [`CtcEval`] are
//! the two dynamic reference capabilities: the first propagates a derivative
//! enclosure through a tube slice by slice, the second relates an uncertain
//! time, an uncertain value and a whole tube.

use std::rc::Rc;

use gcollections::ops::*;

use crate::contractor::{Companion, Ctc, DynCtc};
use crate::domain::{Dom, DomainType, DomainValue};
use crate::interval::Interval;
use crate::interval_vector::IntervalVector;
use crate::ops::Hull;
use crate::tube::{Slice, Tube};

/// Static contractor backed by a closure over the bound box.
///
/// The engine intersects the closure's output back into the domains, so the
/// closure only has to be correct, not contracting.
pub struct CtcFn {
  nb_var: usize,
  f: Box<dyn Fn(&mut IntervalVector)>,
}

impl CtcFn {
  pub fn new(nb_var: usize, f: impl Fn(&mut IntervalVector) + 'static) -> CtcFn {
    CtcFn { nb_var, f: Box::new(f) }
  }
}

impl Ctc for CtcFn {
  fn nb_var(&self) -> usize {
    self.nb_var
  }

  fn contract(&self, x: &mut IntervalVector) {
    (self.f)(x)
  }
}

/// Static equality between two scalar sets.
pub struct CtcEq;

impl Ctc for CtcEq {
  fn nb_var(&self) -> usize {
    2
  }

  fn contract(&self, x: &mut IntervalVector) {
    let inter = x[0].intersection(&x[1]);
    x[0] = inter;
    x[1] = inter;
  }
}

/// Differential constraint `dx/dt = v`: narrows a tube `x` from an enclosure
/// `v` of its derivative. Not inter-temporal, so the network breaks it down
/// to one contractor per slice pair.
pub struct CtcDeriv;

impl CtcDeriv {
  /// Narrows one slice of `x` from the derivative envelope of the matching
  /// slice of `v`: each gate from the opposite gate, then the envelope from
  /// both gates.
  fn contract_slice(x: &mut Slice, venv: Interval) {
    let dt = x.tdomain().diam();
    let h = Interval::singleton(dt);

    x.set_output_gate(x.output_gate().intersection(&(x.input_gate() + h * venv)));
    x.set_input_gate(x.input_gate().intersection(&(x.output_gate() - h * venv)));

    let fwd = x.input_gate() + Interval::new(0., dt) * venv;
    let bwd = x.output_gate() + Interval::new(-dt, 0.) * venv;
    x.set_envelope(x.envelope().intersection(&fwd).intersection(&bwd));
  }

  /// Whole-tube fallback for standalone use: a forward pass then a backward
  /// pass of the slice rule.
  fn contract_tube(x: &mut Tube, v: &Tube) {
    for k in 0..x.nb_slices() {
      let mut s = x.slice(k);
      Self::contract_slice(&mut s, v.envelope(k));
      x.intersect_slice(k, &s);
    }
    for k in (0..x.nb_slices()).rev() {
      let mut s = x.slice(k);
      Self::contract_slice(&mut s, v.envelope(k));
      x.intersect_slice(k, &s);
    }
  }
}

impl DynCtc for CtcDeriv {
  fn name(&self) -> &'static str {
    "CtcDeriv"
  }

  fn is_intertemporal(&self) -> bool {
    false
  }

  fn accepted_signatures(&self) -> Vec<&'static str> {
    vec!["Tube, Tube", "Slice, Slice"]
  }

  fn accepts(&self, types: &[DomainType]) -> bool {
    matches!(
      types,
      [DomainType::Tube, DomainType::Tube] | [DomainType::Slice, DomainType::Slice]
    )
  }

  fn contract(&self, v: &mut [DomainValue]) {
    match v {
      [DomainValue::Slice(x), DomainValue::Slice(vs)] => {
        let venv = vs.envelope();
        Self::contract_slice(x, venv);
      }
      [DomainValue::Tube(x), DomainValue::Tube(vt)] => {
        let vt = vt.clone();
        Self::contract_tube(x, &vt);
      }
      _ => debug_assert!(false, "rejected by accepts()"),
    }
  }
}

/// Evaluation constraint `z = y(t)` with both the time `t` and the value `z`
/// uncertain. Inter-temporal: information flows between the evaluation time
/// and every slice of `y`. When bound with a derivative tube `w`, declares a
/// [`CtcDeriv`] companion on `(y, w)` so that a narrowed gate spreads through
/// the rest of the tube.
pub struct CtcEval;

impl CtcEval {
  /// Hull of everything `y` can be worth over the times of `t`.
  fn reach(t: Interval, y: &Tube) -> Interval {
    let mut reach = Interval::empty();
    for k in 0..y.nb_slices() {
      let inter = y.slice_tdomain(k).intersection(&t);
      if inter.is_empty() {
        continue;
      }
      if inter.is_degenerated() {
        reach = reach.hull(&y.eval(inter.lb()));
      } else {
        reach = reach
          .hull(&y.envelope(k))
          .hull(&y.input_gate(k))
          .hull(&y.output_gate(k));
      }
    }
    reach
  }

  fn contract_eval(t: &mut Interval, z: &mut Interval, y: &mut Tube) {
    *t = t.intersection(&y.tdomain());

    // Times whose slice could still be worth z.
    let mut t_feas = Interval::empty();
    for k in 0..y.nb_slices() {
      let td = y.slice_tdomain(k);
      if td.intersection(t).is_empty() {
        continue;
      }
      let value = y
        .envelope(k)
        .hull(&y.input_gate(k))
        .hull(&y.output_gate(k));
      if !value.is_disjoint(z) {
        t_feas = t_feas.hull(&td);
      }
    }
    *t = t.intersection(&t_feas);

    *z = z.intersection(&Self::reach(*t, y));

    // Only a pinpointed time lets the tube itself be narrowed.
    if t.is_degenerated() {
      y.intersect_gate_at(t.lb(), *z);
    }
  }
}

impl DynCtc for CtcEval {
  fn name(&self) -> &'static str {
    "CtcEval"
  }

  fn is_intertemporal(&self) -> bool {
    true
  }

  fn accepted_signatures(&self) -> Vec<&'static str> {
    vec![
      "Interval, Interval, Tube",
      "Interval, Interval, Tube, Tube",
    ]
  }

  fn accepts(&self, types: &[DomainType]) -> bool {
    matches!(
      types,
      [DomainType::Interval, DomainType::Interval, DomainType::Tube]
        | [DomainType::Interval, DomainType::Interval, DomainType::Tube, DomainType::Tube]
    )
  }

  fn companion(&self, doms: &[Dom]) -> Option<Companion> {
    if doms.len() == 4 {
      Some(Companion {
        ctc: Rc::new(CtcDeriv),
        doms: vec![doms[2], doms[3]],
      })
    } else {
      None
    }
  }

  fn contract(&self, v: &mut [DomainValue]) {
    match v {
      [DomainValue::Interval(t), DomainValue::Interval(z), DomainValue::Tube(y), ..] => {
        Self::contract_eval(t, z, y)
      }
      _ => debug_assert!(false, "rejected by accepts()"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ctc_fn_contracts_box() {
    // x + y = 3 over the box.
    let ctc = CtcFn::new(2, |x| {
      x[0] = x[0].intersection(&(Interval::singleton(3.) - x[1]));
      x[1] = x[1].intersection(&(Interval::singleton(3.) - x[0]));
    });
    assert_eq!(ctc.nb_var(), 2);

    let mut x = IntervalVector::from(vec![Interval::new(0., 10.), Interval::new(2., 5.)]);
    ctc.contract(&mut x);
    assert_eq!(x[0], Interval::new(0., 1.));
    assert_eq!(x[1], Interval::new(2., 3.));
  }

  #[test]
  fn ctc_eq_intersects_both_sides() {
    let mut x = IntervalVector::from(vec![Interval::new(0., 2.), Interval::new(1., 5.)]);
    CtcEq.contract(&mut x);
    assert_eq!(x[0], Interval::new(1., 2.));
    assert_eq!(x[1], Interval::new(1., 2.));
  }

  #[test]
  fn deriv_slice_rule() {
    // One slice of width 1, null derivative: everything collapses onto the
    // intersection of the gates.
    let mut x = Slice::new(
      Interval::new(0., 1.),
      Interval::new(1., 3.),
      Interval::new(2., 5.),
      Interval::new(-10., 10.),
    );
    CtcDeriv::contract_slice(&mut x, Interval::singleton(0.));
    assert_eq!(x.input_gate(), Interval::new(2., 3.));
    assert_eq!(x.output_gate(), Interval::new(2., 3.));
    assert_eq!(x.envelope(), Interval::new(2., 3.));
  }

  #[test]
  fn deriv_bounded_slope() {
    // dt = 2, |v| <= 1: the output gate can drift at most 2 from the input.
    let mut x = Slice::new(
      Interval::new(0., 2.),
      Interval::singleton(0.),
      Interval::new(-10., 10.),
      Interval::new(-10., 10.),
    );
    CtcDeriv::contract_slice(&mut x, Interval::new(-1., 1.));
    assert_eq!(x.output_gate(), Interval::new(-2., 2.));
    assert_eq!(x.envelope(), Interval::new(-2., 2.));
  }

  #[test]
  fn deriv_whole_tube() {
    let mut x = Tube::new(Interval::new(0., 4.), 1., Interval::new(-10., 10.));
    x.intersect_gate_at(0., Interval::singleton(0.));
    let v = Tube::new(Interval::new(0., 4.), 1., Interval::new(-1., 1.));

    let mut doms = [DomainValue::Tube(x), DomainValue::Tube(v)];
    CtcDeriv.contract(&mut doms);
    let x = match &doms[0] {
      DomainValue::Tube(x) => x,
      _ => unreachable!(),
    };
    assert_eq!(x.input_gate(0), Interval::singleton(0.));
    assert_eq!(x.output_gate(0), Interval::new(-1., 1.));
    assert_eq!(x.output_gate(3), Interval::new(-4., 4.));
    assert_eq!(x.envelope(0), Interval::new(-1., 1.));
  }

  #[test]
  fn eval_pinpointed_time() {
    let mut t = Interval::singleton(2.);
    let mut z = Interval::new(1., 2.);
    let mut y = Tube::new(Interval::new(0., 4.), 1., Interval::new(-10., 10.));
    CtcEval::contract_eval(&mut t, &mut z, &mut y);

    assert_eq!(t, Interval::singleton(2.));
    assert_eq!(z, Interval::new(1., 2.));
    // The time is a grid boundary: the gate takes the observation.
    assert_eq!(y.eval(2.), Interval::new(1., 2.));
  }

  #[test]
  fn eval_contracts_time() {
    // y is forced low on [0, 2] and high on [2, 4]; an observation z = 8
    // can only happen in the second half.
    let mut y = Tube::new(Interval::new(0., 4.), 2., Interval::new(-10., 10.));
    y.intersect_envelope(0, Interval::new(-1., 1.));
    y.intersect_gate_at(0., Interval::new(-1., 1.));
    y.intersect_gate_at(2., Interval::new(-1., 1.));

    let mut t = Interval::new(0., 4.);
    let mut z = Interval::singleton(8.);
    CtcEval::contract_eval(&mut t, &mut z, &mut y);
    assert_eq!(t, Interval::new(2., 4.));
    assert_eq!(z, Interval::singleton(8.));
  }

  #[test]
  fn eval_contracts_value() {
    let mut y = Tube::new(Interval::new(0., 4.), 2., Interval::new(0., 5.));
    let mut t = Interval::new(0.5, 1.5);
    let mut z = Interval::new(-10., 10.);
    CtcEval::contract_eval(&mut t, &mut z, &mut y);
    assert_eq!(z, Interval::new(0., 5.));
    assert_eq!(t, Interval::new(0.5, 1.5));
  }

  #[test]
  fn eval_infeasible_time_empties() {
    let mut y = Tube::new(Interval::new(0., 4.), 2., Interval::new(0., 1.));
    let mut t = Interval::new(10., 12.);
    let mut z = Interval::new(0., 1.);
    CtcEval::contract_eval(&mut t, &mut z, &mut y);
    assert!(t.is_empty());
    assert!(z.is_empty());
  }

  #[test]
  fn eval_declares_deriv_companion() {
    use crate::domain::{DomainLoc, VarId};
    let doms: Vec<Dom> = (0..4)
      .map(|i| Dom { loc: DomainLoc::root(VarId(i)) })
      .collect();
    let comp = CtcEval.companion(&doms).unwrap();
    assert_eq!(comp.ctc.name(), "CtcDeriv");
    assert_eq!(comp.doms, vec![doms[2], doms[3]]);
    assert!(CtcEval.companion(&doms[..3]).is_none());
  }
}
