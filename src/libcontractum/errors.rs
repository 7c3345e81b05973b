// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors raised while building a contractor network.
//!
//! All of them are reported at registration time: a failed `add` leaves the
//! network exactly as it was. Contraction itself never fails; an inconsistent
//! system shows up as empty domains, not as an error.

use crate::domain::DomainType;

pub type CnResult<T> = Result<T, CnError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CnError {
  /// A domain handed to the network is already empty.
  #[error("cannot register an empty set as a domain")]
  EmptyDomain,

  /// A contractor was registered over an empty domain list.
  #[error("a contractor needs at least one domain")]
  EmptyDomainList,

  /// A component or slice projection points outside its aggregate.
  #[error("{what} index {index} out of range (size {size})")]
  IndexOutOfRange {
    what: &'static str,
    index: usize,
    size: usize,
  },

  /// The fixed-point ratio must stay within `[0, 1)`.
  #[error("fixed-point ratio {0} is not in [0, 1)")]
  InvalidRatio(f64),

  /// The scalar width of the domain list does not divide evenly by the
  /// contractor's arity.
  #[error("domain list of total size {total} cannot feed a contractor of arity {arity}")]
  Dimension { total: usize, arity: usize },

  /// A vector value does not have the width the target variable expects.
  #[error("vector of size {provided} where size {expected} was expected")]
  VectorSize { expected: usize, provided: usize },

  /// Tube-like domains bound together disagree on their time grid.
  #[error("domains do not share the same slicing")]
  SameSlicing,

  /// Timestamped samples must arrive in strictly increasing time order.
  #[error("sample at t={t} does not come after t={last}")]
  NonIncreasingTime { t: f64, last: f64 },

  /// A dynamic contractor rejected the kinds of domains it was given.
  #[error("{ctc} does not accept ({}); accepted signatures: {}",
          display_types(.provided), .accepted.join(" / "))]
  DomainsType {
    ctc: &'static str,
    provided: Vec<DomainType>,
    accepted: Vec<&'static str>,
  },
}

fn display_types(types: &[DomainType]) -> String {
  types
    .iter()
    .map(|t| t.to_string())
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn domains_type_message() {
    let err = CnError::DomainsType {
      ctc: "CtcDeriv",
      provided: vec![DomainType::Tube, DomainType::Interval],
      accepted: vec!["Tube, Tube", "Slice, Slice"],
    };
    let msg = err.to_string();
    assert!(msg.contains("CtcDeriv"));
    assert!(msg.contains("Tube, Interval"));
    assert!(msg.contains("Tube, Tube / Slice, Slice"));
  }

  #[test]
  fn dimension_message() {
    let err = CnError::Dimension { total: 5, arity: 3 };
    assert_eq!(
      err.to_string(),
      "domain list of total size 5 cannot feed a contractor of arity 3"
    );
  }
}
