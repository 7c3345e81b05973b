// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Interval-specific operations complementing the `gcollections` traits.

use gcollections::kind::*;

/// Smallest enclosing set of two sets.
pub trait Hull<RHS = Self> {
  type Output;
  fn hull(&self, rhs: &RHS) -> Self::Output;
}

/// Construction from an ordered pair of bounds.
pub trait Range: Collection {
  fn new(lb: Self::Item, ub: Self::Item) -> Self;
}

/// The set enclosing every value of the item type.
pub trait Whole {
  fn whole() -> Self;
}
