// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Constraint propagation over sets, for guaranteed set-membership
//! computation.
//!
//! This library provides interval-based domains (scalar intervals, interval
//! vectors, and tubes, i.e. interval-valued functions of time) together with
//! a [`ContractorNetwork`] that narrows them: constraints are expressed as
//! *contractors*, operators that remove inconsistent values without ever
//! removing a feasible one, and the network propagates their effects to a
//! fixed point, decomposing vectors into components and tubes into time
//! slices along the way. Whatever the order of propagation, the result is a
//! guaranteed enclosure of every solution of the constraint system.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use contractum::{ContractorNetwork, CtcFn, Interval};
//! use gcollections::ops::*;
//!
//! let mut cn = ContractorNetwork::new();
//! let a = cn.create_interval(Interval::new(0., 1.)).unwrap();
//! let b = cn.create_interval(Interval::new(-1., 1.)).unwrap();
//! let c = cn.create_interval(Interval::new(1.5, 2.)).unwrap();
//!
//! // a + b = c
//! let plus = Rc::new(CtcFn::new(3, |x| {
//!   x[2] = x[2].intersection(&(x[0] + x[1]));
//!   x[0] = x[0].intersection(&(x[2] - x[1]));
//!   x[1] = x[1].intersection(&(x[2] - x[0]));
//! }));
//! cn.add(plus, &[a.into(), b.into(), c.into()]).unwrap();
//!
//! cn.contract();
//! assert_eq!(cn.interval(a), Interval::new(0.5, 1.));
//! ```

pub mod cn;
pub mod contractor;
pub mod ctc;
pub mod domain;
pub mod errors;
pub mod interval;
pub mod interval_vector;
pub mod ops;
pub mod tube;

pub use cn::{ContractorNetwork, NetworkMap};
pub use contractor::{Companion, Ctc, DynCtc};
pub use ctc::{CtcDeriv, CtcEq, CtcEval, CtcFn};
pub use domain::{
  Dom, DomainType, DomainValue, IntervalVar, IntervalVectorVar, TubeVar, TubeVectorVar,
};
pub use errors::{CnError, CnResult};
pub use interval::{Interval, ToInterval};
pub use interval_vector::IntervalVector;
pub use tube::{Slice, Trajectory, Tube, TubeVector};
