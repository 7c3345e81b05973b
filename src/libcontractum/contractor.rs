// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Contractor capabilities and the network's contractor nodes.
//!
//! A *static* contractor ([`Ctc`]) narrows a box of scalar intervals with no
//! notion of time; the network lifts it over slices when bound to dynamic
//! domains. A *dynamic* contractor ([`DynCtc`]) narrows time-indexed domains
//! directly and tells the network whether it may be broken down slice by
//! slice.

use std::rc::Rc;

use crate::domain::{Dom, DomainLoc, DomainType, DomainValue};
use crate::interval_vector::IntervalVector;

/// Static narrowing capability over a box of scalar intervals.
///
/// Implementations only need to be contracting and correct on the box they
/// are handed; the engine itself intersects the result back into the bound
/// domains, so narrowing is guaranteed even for a sloppy implementation.
pub trait Ctc {
  /// Number of scalar sets the contractor consumes.
  fn nb_var(&self) -> usize;

  /// Narrows `x` in place.
  fn contract(&self, x: &mut IntervalVector);
}

/// Dynamic narrowing capability over time-indexed domains.
pub trait DynCtc {
  /// Name used in type-error diagnostics.
  fn name(&self) -> &'static str;

  /// Whether the contractor relates values across distinct times. An
  /// inter-temporal contractor is bound whole; the others are decomposed to
  /// one contractor per slice.
  fn is_intertemporal(&self) -> bool;

  /// Human-readable signatures, for type-error diagnostics.
  fn accepted_signatures(&self) -> Vec<&'static str>;

  /// Whether a domain list of these kinds can be bound.
  fn accepts(&self, types: &[DomainType]) -> bool;

  /// Secondary capability registered along with this one, over a subset of
  /// the same domains. The network injects it at most once per domain set.
  fn companion(&self, _doms: &[Dom]) -> Option<Companion> {
    None
  }

  /// Narrows the given snapshot in place. The engine intersects the result
  /// back into the bound domains.
  fn contract(&self, v: &mut [DomainValue]);
}

/// A contractor/domain pairing declared by [`DynCtc::companion`].
pub struct Companion {
  pub ctc: Rc<dyn DynCtc>,
  pub doms: Vec<Dom>,
}

/// What a contractor node actually runs.
pub(crate) enum CtcKind {
  Static(Rc<dyn Ctc>),
  Dyn(Rc<dyn DynCtc>),
  /// Symbolic edge between an aggregate and its parts (or two adjacent
  /// slices). Contracts nothing itself; the shared storage already keeps the
  /// sets equal, the node only exists so that change detection crosses it.
  Component,
  /// Built-in equality between two scalar domains backed by distinct
  /// storage, as created by `subvector`.
  Equality,
  /// An embedded network run to its own fixed point.
  Network(Box<crate::cn::SubNetwork>),
}

/// Structural identity of a contractor node, the key of the dedup map.
/// Capability-backed nodes are identified by the capability instance
/// (`Rc` pointer) plus the ordered domain list; embedded networks never
/// dedup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum CtcKey {
  Static { ptr: usize, doms: Vec<DomainLoc> },
  Dyn { ptr: usize, doms: Vec<DomainLoc> },
  Component { doms: Vec<DomainLoc> },
  Equality { doms: Vec<DomainLoc> },
  Network { id: usize },
}

pub(crate) fn ctc_ptr(c: &Rc<dyn Ctc>) -> usize {
  Rc::as_ptr(c) as *const () as usize
}

pub(crate) fn dyn_ctc_ptr(c: &Rc<dyn DynCtc>) -> usize {
  Rc::as_ptr(c) as *const () as usize
}

/// One node of the contractor graph.
pub(crate) struct Contractor {
  pub(crate) kind: CtcKind,
  pub(crate) doms: Vec<DomainLoc>,
  /// Set while the node sits in the propagation queue.
  pub(crate) active: bool,
}

impl Contractor {
  /// Component nodes go to the back of the queue, every other kind to the
  /// front.
  pub(crate) fn is_component(&self) -> bool {
    matches!(self.kind, CtcKind::Component)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::VarId;
  use gcollections::ops::*;

  struct Halve;

  impl Ctc for Halve {
    fn nb_var(&self) -> usize {
      1
    }

    fn contract(&self, x: &mut IntervalVector) {
      let half = crate::interval::Interval::new(x[0].lb(), x[0].mid());
      x[0] = x[0].intersection(&half);
    }
  }

  #[test]
  fn capability_identity_is_per_instance() {
    let a: Rc<dyn Ctc> = Rc::new(Halve);
    let b: Rc<dyn Ctc> = Rc::new(Halve);
    assert_ne!(ctc_ptr(&a), ctc_ptr(&b));
    assert_eq!(ctc_ptr(&a), ctc_ptr(&Rc::clone(&a)));
  }

  #[test]
  fn key_equality_is_structural() {
    let a: Rc<dyn Ctc> = Rc::new(Halve);
    let doms = vec![DomainLoc::root(VarId(0))];
    let k1 = CtcKey::Static { ptr: ctc_ptr(&a), doms: doms.clone() };
    let k2 = CtcKey::Static { ptr: ctc_ptr(&a), doms: doms.clone() };
    assert_eq!(k1, k2);
    let k3 = CtcKey::Static {
      ptr: ctc_ptr(&a),
      doms: vec![DomainLoc::root(VarId(1))],
    };
    assert_ne!(k1, k3);
    assert_ne!(k1, CtcKey::Component { doms });
  }
}
