// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Closed interval with floating-point bounds.
//!
//! `Interval<B>` encloses every real between its two bounds. The empty set is
//! represented by any pair with `lb > ub`. Arithmetic is closed f64 arithmetic
//! on the bounds; intersection, hull and the set predicates follow the
//! [gcollections](https://crates.io/crates/gcollections) operation traits.

use gcollections::kind::*;
use gcollections::ops::*;
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::ops::{Add, BitAnd, BitOr, Div, Mul, Neg, Sub};

use crate::ops::{Hull, Range, Whole};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval<B = f64> {
  lb: B,
  ub: B,
}

impl<B: Float> Interval<B> {
  pub fn new(lb: B, ub: B) -> Interval<B> {
    Interval { lb, ub }
  }

  pub fn lb(&self) -> B {
    self.lb
  }

  pub fn ub(&self) -> B {
    self.ub
  }

  /// Diameter of the interval; zero if empty, infinite if unbounded.
  pub fn diam(&self) -> B {
    if self.is_empty() {
      B::zero()
    } else {
      self.ub - self.lb
    }
  }

  pub fn mid(&self) -> B {
    debug_assert!(!self.is_empty());
    (self.lb + self.ub) / (B::one() + B::one())
  }

  pub fn magnitude(&self) -> B {
    self.lb.abs().max(self.ub.abs())
  }

  pub fn is_unbounded(&self) -> bool {
    !self.is_empty() && (self.lb.is_infinite() || self.ub.is_infinite())
  }

  pub fn is_degenerated(&self) -> bool {
    !self.is_empty() && self.lb == self.ub
  }

  /// Extends the interval so that it also encloses `x`.
  pub fn inflate_with(&self, x: B) -> Interval<B> {
    if self.is_empty() {
      Interval::new(x, x)
    } else {
      Interval::new(self.lb.min(x), self.ub.max(x))
    }
  }
}

impl<B: Float> Collection for Interval<B> {
  type Item = B;
}

impl<B: Float> Empty for Interval<B> {
  fn empty() -> Interval<B> {
    Interval::new(B::one(), B::zero())
  }
}

impl<B: Float> Whole for Interval<B> {
  fn whole() -> Interval<B> {
    Interval::new(B::neg_infinity(), B::infinity())
  }
}

impl<B: Float> Singleton for Interval<B> {
  fn singleton(x: B) -> Interval<B> {
    Interval::new(x, x)
  }
}

impl<B: Float> Range for Interval<B> {
  fn new(lb: B, ub: B) -> Interval<B> {
    Interval::new(lb, ub)
  }
}

impl<B: Float> IsEmpty for Interval<B> {
  fn is_empty(&self) -> bool {
    self.lb > self.ub || self.lb.is_nan() || self.ub.is_nan()
  }
}

impl<B: Float> IsSingleton for Interval<B> {
  fn is_singleton(&self) -> bool {
    self.is_degenerated()
  }
}

impl<B: Float> Bounded for Interval<B> {
  fn lower(&self) -> B {
    debug_assert!(!self.is_empty());
    self.lb
  }

  fn upper(&self) -> B {
    debug_assert!(!self.is_empty());
    self.ub
  }
}

impl<B: Float> Contains for Interval<B> {
  fn contains(&self, x: &B) -> bool {
    *x >= self.lb && *x <= self.ub
  }
}

impl<B: Float> Intersection for Interval<B> {
  type Output = Interval<B>;

  fn intersection(&self, i: &Interval<B>) -> Interval<B> {
    Interval::new(self.lb.max(i.lb), self.ub.min(i.ub))
  }
}

/// Set union approximated by the convex hull, as closed intervals are not
/// closed under union.
impl<B: Float> Union for Interval<B> {
  type Output = Interval<B>;

  fn union(&self, i: &Interval<B>) -> Interval<B> {
    self.hull(i)
  }
}

impl<B: Float> Hull for Interval<B> {
  type Output = Interval<B>;

  fn hull(&self, i: &Interval<B>) -> Interval<B> {
    if self.is_empty() {
      *i
    } else if i.is_empty() {
      *self
    } else {
      Interval::new(self.lb.min(i.lb), self.ub.max(i.ub))
    }
  }
}

impl<B: Float> Subset for Interval<B> {
  fn is_subset(&self, i: &Interval<B>) -> bool {
    if self.is_empty() {
      true
    } else {
      self.lb >= i.lb && self.ub <= i.ub
    }
  }
}

impl<B: Float> ProperSubset for Interval<B> {
  fn is_proper_subset(&self, i: &Interval<B>) -> bool {
    self.is_subset(i) && self != i
  }
}

impl<B: Float> Disjoint for Interval<B> {
  fn is_disjoint(&self, i: &Interval<B>) -> bool {
    self.is_empty() || i.is_empty() || self.lb > i.ub || i.lb > self.ub
  }
}

impl<B: Float> Overlap for Interval<B> {
  fn overlap(&self, i: &Interval<B>) -> bool {
    !self.is_disjoint(i)
  }
}

impl<B: Float> Add for Interval<B> {
  type Output = Interval<B>;

  fn add(self, i: Interval<B>) -> Interval<B> {
    if self.is_empty() || i.is_empty() {
      Interval::empty()
    } else {
      Interval::new(self.lb + i.lb, self.ub + i.ub)
    }
  }
}

impl<B: Float> Sub for Interval<B> {
  type Output = Interval<B>;

  fn sub(self, i: Interval<B>) -> Interval<B> {
    if self.is_empty() || i.is_empty() {
      Interval::empty()
    } else {
      Interval::new(self.lb - i.ub, self.ub - i.lb)
    }
  }
}

impl<B: Float> Neg for Interval<B> {
  type Output = Interval<B>;

  fn neg(self) -> Interval<B> {
    if self.is_empty() {
      self
    } else {
      Interval::new(-self.ub, -self.lb)
    }
  }
}

impl<B: Float> Mul for Interval<B> {
  type Output = Interval<B>;

  fn mul(self, i: Interval<B>) -> Interval<B> {
    if self.is_empty() || i.is_empty() {
      return Interval::empty();
    }
    let p1 = mul_bound(self.lb, i.lb);
    let p2 = mul_bound(self.lb, i.ub);
    let p3 = mul_bound(self.ub, i.lb);
    let p4 = mul_bound(self.ub, i.ub);
    Interval::new(p1.min(p2).min(p3).min(p4), p1.max(p2).max(p3).max(p4))
  }
}

impl<B: Float> Div for Interval<B> {
  type Output = Interval<B>;

  fn div(self, i: Interval<B>) -> Interval<B> {
    if self.is_empty() || i.is_empty() {
      return Interval::empty();
    }
    if i.contains(&B::zero()) {
      // Division by an interval crossing zero; the quotient is unbounded
      // unless the numerator is exactly {0}.
      if self.lb == B::zero() && self.ub == B::zero() {
        return self;
      }
      return Interval::whole();
    }
    let p1 = self.lb / i.lb;
    let p2 = self.lb / i.ub;
    let p3 = self.ub / i.lb;
    let p4 = self.ub / i.ub;
    Interval::new(p1.min(p2).min(p3).min(p4), p1.max(p2).max(p3).max(p4))
  }
}

// 0 * inf is NaN in IEEE arithmetic but must be 0 for interval products.
fn mul_bound<B: Float>(a: B, b: B) -> B {
  if a == B::zero() || b == B::zero() {
    B::zero()
  } else {
    a * b
  }
}

impl<B: Float> BitAnd for Interval<B> {
  type Output = Interval<B>;

  fn bitand(self, i: Interval<B>) -> Interval<B> {
    self.intersection(&i)
  }
}

impl<B: Float> BitOr for Interval<B> {
  type Output = Interval<B>;

  fn bitor(self, i: Interval<B>) -> Interval<B> {
    self.hull(&i)
  }
}

pub trait ToInterval<B> {
  fn to_interval(self) -> Interval<B>;
}

impl<B: Float> ToInterval<B> for Interval<B> {
  fn to_interval(self) -> Interval<B> {
    self
  }
}

impl<B: Float> ToInterval<B> for (B, B) {
  fn to_interval(self) -> Interval<B> {
    let (a, b) = self;
    Interval::new(a, b)
  }
}

impl<B: Float> ToInterval<B> for B {
  fn to_interval(self) -> Interval<B> {
    Interval::singleton(self)
  }
}

impl<B: Float + std::fmt::Display> std::fmt::Display for Interval<B> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    if self.is_empty() {
      write!(f, "[empty]")
    } else {
      write!(f, "[{}, {}]", self.lb, self.ub)
    }
  }
}

#[allow(non_upper_case_globals)]
#[cfg(test)]
mod tests {
  use super::*;
  use serde_test::{assert_tokens, Token};

  const zero: Interval = Interval { lb: 0., ub: 0. };
  const i0_10: Interval = Interval { lb: 0., ub: 10. };
  const i5_10: Interval = Interval { lb: 5., ub: 10. };
  const i0_5: Interval = Interval { lb: 0., ub: 5. };
  const i20_30: Interval = Interval { lb: 20., ub: 30. };
  const im2_3: Interval = Interval { lb: -2., ub: 3. };

  #[test]
  fn to_interval_id() {
    let id = im2_3.to_interval();
    assert_eq!(im2_3, id);
    assert_eq!(im2_3, Interval::new(-2., 3.));
    assert_eq!(Interval::singleton(1.), (1.0f64).to_interval());
    assert_eq!(im2_3, (-2., 3.).to_interval());
  }

  #[test]
  fn emptiness() {
    assert!(Interval::<f64>::empty().is_empty());
    assert!(!zero.is_empty());
    assert!(!Interval::<f64>::whole().is_empty());
    assert!(Interval::new(1., -1.).is_empty());
  }

  #[test]
  fn diam_and_bounds() {
    assert_eq!(i0_10.diam(), 10.);
    assert_eq!(Interval::<f64>::empty().diam(), 0.);
    assert_eq!(i5_10.lower(), 5.);
    assert_eq!(i5_10.upper(), 10.);
    assert!(Interval::<f64>::whole().is_unbounded());
    assert!(!i0_10.is_unbounded());
  }

  #[test]
  fn intersection_hull() {
    assert_eq!(i0_10.intersection(&i5_10), i5_10);
    assert!(i0_5.intersection(&i20_30).is_empty());
    assert_eq!(i0_5.hull(&i5_10), i0_10);
    assert_eq!(i0_5.hull(&Interval::empty()), i0_5);
    assert_eq!(i0_10 & i0_5, i0_5);
    assert_eq!(i0_5 | i5_10, i0_10);
  }

  #[test]
  fn subset_disjoint() {
    assert!(i5_10.is_subset(&i0_10));
    assert!(!i0_10.is_subset(&i5_10));
    assert!(Interval::<f64>::empty().is_subset(&i0_5));
    assert!(i0_5.is_disjoint(&i20_30));
    assert!(!i0_5.is_disjoint(&i5_10));
    assert!(i0_5.overlap(&i5_10));
  }

  #[test]
  fn arithmetic() {
    assert_eq!(i0_5 + i5_10, Interval::new(5., 15.));
    assert_eq!(i0_5 - i5_10, Interval::new(-10., 0.));
    assert_eq!(-i0_5, Interval::new(-5., 0.));
    assert_eq!(im2_3 * i0_5, Interval::new(-10., 15.));
    assert_eq!(i5_10 / Interval::singleton(5.), Interval::new(1., 2.));
    assert_eq!(i0_5 / im2_3, Interval::whole());
    assert!((Interval::empty() + i0_5).is_empty());
  }

  #[test]
  fn whole_times_zero() {
    assert_eq!(Interval::whole() * zero, zero);
  }

  #[test]
  fn inflate() {
    assert_eq!(i0_5.inflate_with(10.), i0_10);
    assert_eq!(Interval::empty().inflate_with(0.), zero);
  }

  #[test]
  fn serde_round_trip() {
    assert_tokens(
      &i0_5,
      &[
        Token::Struct { name: "Interval", len: 2 },
        Token::Str("lb"),
        Token::F64(0.),
        Token::Str("ub"),
        Token::F64(5.),
        Token::StructEnd,
      ],
    );
  }
}
