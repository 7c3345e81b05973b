// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Set-valued variables of a contractor network.
//!
//! Every quantity tracked by a network is a *domain*: a scalar interval, an
//! interval vector, one slice of a tube, a whole tube, or a vector of tubes.
//! Domains are identified structurally by a [`DomainLoc`]: the arena handle of
//! their root variable plus an optional component index and slice index. Two
//! registrations resolving to the same location are the same graph node, which
//! is what makes registration idempotent.

use gcollections::ops::*;

use crate::interval::Interval;
use crate::interval_vector::IntervalVector;
use crate::tube::{Slice, Tube, TubeVector};

/// The five kinds of domains a network can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainType {
  Interval,
  IntervalVector,
  Slice,
  Tube,
  TubeVector,
}

impl std::fmt::Display for DomainType {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      DomainType::Interval => write!(f, "Interval"),
      DomainType::IntervalVector => write!(f, "IntervalVector"),
      DomainType::Slice => write!(f, "Slice"),
      DomainType::Tube => write!(f, "Tube"),
      DomainType::TubeVector => write!(f, "TubeVector"),
    }
  }
}

/// Arena handle of a root variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct VarId(pub(crate) u32);

/// Structural identity of a domain: a root variable and a projection path.
///
/// `component` selects a scalar of an interval vector or one tube of a tube
/// vector; `slice` selects a time slice of a (possibly selected) tube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct DomainLoc {
  pub(crate) var: VarId,
  pub(crate) component: Option<u32>,
  pub(crate) slice: Option<u32>,
}

impl DomainLoc {
  pub(crate) fn root(var: VarId) -> DomainLoc {
    DomainLoc { var, component: None, slice: None }
  }
}

/// Caller-facing description of a domain, built from the typed variable
/// handles and the [`Dom::component`]/[`Dom::slice`] projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dom {
  pub(crate) loc: DomainLoc,
}

impl Dom {
  /// Selects the `i`-th scalar of an interval vector, or the `i`-th tube of
  /// a tube vector. Validity is checked when the descriptor reaches the
  /// network.
  pub fn component(mut self, i: usize) -> Dom {
    debug_assert!(self.loc.component.is_none());
    self.loc.component = Some(i as u32);
    self
  }

  /// Selects the `k`-th time slice of a tube.
  pub fn slice(mut self, k: usize) -> Dom {
    debug_assert!(self.loc.slice.is_none());
    self.loc.slice = Some(k as u32);
    self
  }
}

macro_rules! var_handle {
  ( $( #[$doc:meta] $name:ident ),+ $(,)? ) => {$(
    #[$doc]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct $name(pub(crate) VarId);

    impl From<$name> for Dom {
      fn from(v: $name) -> Dom {
        Dom { loc: DomainLoc::root(v.0) }
      }
    }

    impl $name {
      pub fn component(self, i: usize) -> Dom {
        Dom::from(self).component(i)
      }

      pub fn slice(self, k: usize) -> Dom {
        Dom::from(self).slice(k)
      }
    }
  )+}
}

var_handle![
  /// Handle of a scalar interval variable.
  IntervalVar,
  /// Handle of an interval vector variable.
  IntervalVectorVar,
  /// Handle of a scalar tube variable.
  TubeVar,
  /// Handle of a tube vector variable.
  TubeVectorVar,
];

/// Owned snapshot of a domain's current set, handed to dynamic contractors.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainValue {
  Interval(Interval),
  IntervalVector(IntervalVector),
  Slice(Slice),
  Tube(Tube),
  TubeVector(TubeVector),
}

impl DomainValue {
  pub fn dom_type(&self) -> DomainType {
    match self {
      DomainValue::Interval(_) => DomainType::Interval,
      DomainValue::IntervalVector(_) => DomainType::IntervalVector,
      DomainValue::Slice(_) => DomainType::Slice,
      DomainValue::Tube(_) => DomainType::Tube,
      DomainValue::TubeVector(_) => DomainType::TubeVector,
    }
  }

  pub fn is_empty(&self) -> bool {
    match self {
      DomainValue::Interval(x) => x.is_empty(),
      DomainValue::IntervalVector(x) => x.is_empty(),
      DomainValue::Slice(x) => x.is_empty(),
      DomainValue::Tube(x) => x.is_empty(),
      DomainValue::TubeVector(x) => x.is_empty(),
    }
  }

  /// Scalar width: how many scalar sets this domain stands for in a static
  /// contractor signature.
  pub fn size(&self) -> usize {
    match self {
      DomainValue::Interval(_) | DomainValue::Slice(_) | DomainValue::Tube(_) => 1,
      DomainValue::IntervalVector(x) => x.size(),
      DomainValue::TubeVector(x) => x.size(),
    }
  }

}

/// Resolved metadata of a domain under registration: everything the binding
/// logic of the network needs without touching the arena again.
#[derive(Debug, Clone)]
pub(crate) struct DomMeta {
  pub(crate) dom: Dom,
  pub(crate) dtype: DomainType,
  pub(crate) size: usize,
  /// Time grid of a tube or tube vector; `None` for static domains and bare
  /// slices.
  pub(crate) slicing: Option<Vec<f64>>,
  pub(crate) nb_slices: usize,
}

/// Sum of the scalar widths of a domain list; heterogeneous signatures (three
/// scalars vs. one vector of width three) compare equal through this measure.
pub(crate) fn total_size(metas: &[DomMeta]) -> usize {
  metas.iter().map(|m| m.size).sum()
}

/// True iff every domain of the list is time-indexed.
pub(crate) fn all_dyn(metas: &[DomMeta]) -> bool {
  metas.iter().all(|m| {
    matches!(
      m.dtype,
      DomainType::Slice | DomainType::Tube | DomainType::TubeVector
    )
  })
}

/// True iff every domain of the list is a bare slice.
pub(crate) fn all_slices(metas: &[DomMeta]) -> bool {
  metas.iter().all(|m| m.dtype == DomainType::Slice)
}

/// True iff every tube-like domain of the list shares the same time grid;
/// the precondition for breaking a constraint down to the slice level.
pub(crate) fn dyn_same_slicing(metas: &[DomMeta]) -> bool {
  let mut slicing: Option<&Vec<f64>> = None;
  for m in metas {
    if let Some(s) = &m.slicing {
      match slicing {
        None => slicing = Some(s),
        Some(s0) => {
          if s0 != s {
            return false;
          }
        }
      }
    }
  }
  true
}

/// Diameter clamped for the fixed-point bookkeeping: empty sets weigh zero,
/// unbounded sets weigh a large finite constant so that the transition from
/// unbounded to bounded registers as a contraction.
pub(crate) const UNBOUNDED_DIAM: f64 = 999999.;

pub fn clamped_diam(i: &Interval) -> f64 {
  if i.is_empty() {
    0.
  } else if i.is_unbounded() {
    UNBOUNDED_DIAM
  } else {
    i.diam()
  }
}

/// Change-detection measure of a domain value: the sum of the clamped
/// diameters of every scalar set it is made of (gates included).
pub(crate) fn volume(v: &DomainValue) -> f64 {
  match v {
    DomainValue::Interval(x) => clamped_diam(x),
    DomainValue::IntervalVector(x) => x.volume(),
    DomainValue::Slice(x) => {
      clamped_diam(&x.envelope()) + clamped_diam(&x.input_gate()) + clamped_diam(&x.output_gate())
    }
    DomainValue::Tube(x) => tube_volume(x),
    DomainValue::TubeVector(x) => (0..x.size()).map(|i| tube_volume(x.tube(i))).sum(),
  }
}

pub(crate) fn tube_volume(x: &Tube) -> f64 {
  let mut vol = clamped_diam(&x.input_gate(0));
  for k in 0..x.nb_slices() {
    vol += clamped_diam(&x.envelope(k));
    vol += clamped_diam(&x.output_gate(k));
  }
  vol
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::interval::Interval;
  use crate::ops::Whole;

  fn meta(dom: Dom, dtype: DomainType, size: usize, slicing: Option<Vec<f64>>) -> DomMeta {
    let nb_slices = slicing.as_ref().map_or(0, |s| s.len() - 1);
    DomMeta { dom, dtype, size, slicing, nb_slices }
  }

  fn dom(n: u32) -> Dom {
    Dom { loc: DomainLoc::root(VarId(n)) }
  }

  #[test]
  fn heterogeneous_total_size() {
    let metas = vec![
      meta(dom(0), DomainType::Interval, 1, None),
      meta(dom(1), DomainType::IntervalVector, 3, None),
      meta(dom(2), DomainType::Tube, 1, Some(vec![0., 1., 2.])),
    ];
    assert_eq!(total_size(&metas), 5);
  }

  #[test]
  fn classification() {
    let grid = Some(vec![0., 1., 2.]);
    let dyn_doms = vec![
      meta(dom(0), DomainType::Tube, 1, grid.clone()),
      meta(dom(1), DomainType::TubeVector, 2, grid.clone()),
    ];
    assert!(all_dyn(&dyn_doms));
    assert!(!all_slices(&dyn_doms));
    assert!(dyn_same_slicing(&dyn_doms));

    let mixed = vec![
      meta(dom(0), DomainType::Tube, 1, grid),
      meta(dom(1), DomainType::Interval, 1, None),
    ];
    assert!(!all_dyn(&mixed));
    // Static domains are ignored by the slicing agreement test.
    assert!(dyn_same_slicing(&mixed));

    let disagreeing = vec![
      meta(dom(0), DomainType::Tube, 1, Some(vec![0., 1., 2.])),
      meta(dom(1), DomainType::Tube, 1, Some(vec![0., 2.])),
    ];
    assert!(!dyn_same_slicing(&disagreeing));
  }

  #[test]
  fn identity_is_structural() {
    let a = dom(0);
    let b = dom(0);
    assert_eq!(a, b);
    assert_eq!(a.component(1), b.component(1));
    assert_ne!(a.component(1), dom(0).component(2));
    assert_ne!(dom(0), dom(1));
  }

  #[test]
  fn clamped_diameters() {
    assert_eq!(clamped_diam(&Interval::new(0., 4.)), 4.);
    assert_eq!(clamped_diam(&Interval::empty()), 0.);
    assert_eq!(clamped_diam(&Interval::whole()), UNBOUNDED_DIAM);
  }
}
