// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Fixed-width vector of intervals (a box).

use gcollections::kind::*;
use gcollections::ops::*;
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, Index, IndexMut};

use crate::interval::Interval;
use crate::ops::Hull;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalVector {
  components: Vec<Interval>,
}

impl IntervalVector {
  /// Box of width `n` where every component equals `i`.
  pub fn new(n: usize, i: Interval) -> IntervalVector {
    assert!(n > 0, "an interval vector must have at least one component");
    IntervalVector { components: vec![i; n] }
  }

  pub fn size(&self) -> usize {
    self.components.len()
  }

  pub fn subvector(&self, start: usize, end: usize) -> IntervalVector {
    assert!(start <= end && end < self.size());
    IntervalVector { components: self.components[start..=end].to_vec() }
  }

  /// Sum of the component diameters, with unbounded components clamped.
  ///
  /// A perimeter-style measure rather than a product: a degenerate component
  /// must not mask the narrowing of the others.
  pub fn volume(&self) -> f64 {
    self.components.iter().map(crate::domain::clamped_diam).sum()
  }

  pub fn iter(&self) -> std::slice::Iter<Interval> {
    self.components.iter()
  }
}

impl From<Vec<Interval>> for IntervalVector {
  fn from(components: Vec<Interval>) -> IntervalVector {
    assert!(!components.is_empty());
    IntervalVector { components }
  }
}

impl Index<usize> for IntervalVector {
  type Output = Interval;

  fn index(&self, i: usize) -> &Interval {
    &self.components[i]
  }
}

impl IndexMut<usize> for IntervalVector {
  fn index_mut(&mut self, i: usize) -> &mut Interval {
    &mut self.components[i]
  }
}

impl Collection for IntervalVector {
  type Item = Interval;
}

impl IsEmpty for IntervalVector {
  /// A box is empty as soon as one of its components is empty.
  fn is_empty(&self) -> bool {
    self.components.iter().any(|i| i.is_empty())
  }
}

impl Intersection for IntervalVector {
  type Output = IntervalVector;

  fn intersection(&self, x: &IntervalVector) -> IntervalVector {
    assert_eq!(self.size(), x.size());
    IntervalVector {
      components: self
        .components
        .iter()
        .zip(x.components.iter())
        .map(|(a, b)| a.intersection(b))
        .collect(),
    }
  }
}

impl Hull for IntervalVector {
  type Output = IntervalVector;

  fn hull(&self, x: &IntervalVector) -> IntervalVector {
    assert_eq!(self.size(), x.size());
    IntervalVector {
      components: self
        .components
        .iter()
        .zip(x.components.iter())
        .map(|(a, b)| a.hull(b))
        .collect(),
    }
  }
}

impl Subset for IntervalVector {
  fn is_subset(&self, x: &IntervalVector) -> bool {
    assert_eq!(self.size(), x.size());
    self
      .components
      .iter()
      .zip(x.components.iter())
      .all(|(a, b)| a.is_subset(b))
  }
}

impl BitAnd for IntervalVector {
  type Output = IntervalVector;

  fn bitand(self, x: IntervalVector) -> IntervalVector {
    self.intersection(&x)
  }
}

impl BitOr for IntervalVector {
  type Output = IntervalVector;

  fn bitor(self, x: IntervalVector) -> IntervalVector {
    self.hull(&x)
  }
}

impl std::fmt::Display for IntervalVector {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "(")?;
    for (k, i) in self.components.iter().enumerate() {
      if k > 0 {
        write!(f, "; ")?;
      }
      write!(f, "{}", i)?;
    }
    write!(f, ")")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn box_0_10(n: usize) -> IntervalVector {
    IntervalVector::new(n, Interval::new(0., 10.))
  }

  #[test]
  fn construction() {
    let x = box_0_10(3);
    assert_eq!(x.size(), 3);
    assert_eq!(x[1], Interval::new(0., 10.));

    let y = IntervalVector::from(vec![Interval::new(0., 1.), Interval::new(2., 3.)]);
    assert_eq!(y.size(), 2);
    assert_eq!(y[1], Interval::new(2., 3.));
  }

  #[test]
  fn emptiness() {
    let mut x = box_0_10(2);
    assert!(!x.is_empty());
    x[0] = Interval::empty();
    assert!(x.is_empty());
  }

  #[test]
  fn intersection_subset() {
    let x = box_0_10(2);
    let y = IntervalVector::new(2, Interval::new(5., 20.));
    let inter = x.intersection(&y);
    assert_eq!(inter[0], Interval::new(5., 10.));
    assert!(inter.is_subset(&x));
    assert!(inter.is_subset(&y));
    assert!(!x.is_subset(&inter));
  }

  #[test]
  fn subvector() {
    let y = IntervalVector::from(vec![
      Interval::new(0., 1.),
      Interval::new(2., 3.),
      Interval::new(4., 5.),
    ]);
    let sub = y.subvector(1, 2);
    assert_eq!(sub.size(), 2);
    assert_eq!(sub[0], Interval::new(2., 3.));
    assert_eq!(sub[1], Interval::new(4., 5.));
  }

  #[test]
  fn volume_is_perimeter_style() {
    let mut x = box_0_10(3);
    x[1] = Interval::singleton(3.);
    // A degenerate component must not zero out the whole measure.
    assert_eq!(x.volume(), 20.);
  }
}
