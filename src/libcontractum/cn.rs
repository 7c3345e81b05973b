// Copyright 2026 The contractum developers

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The contractor network.
//!
//! A [`ContractorNetwork`] owns a set of domains (in an arena of root
//! variables) and a graph of contractors over them. Registering a contractor
//! wires it to its domains, decomposing aggregates down to scalar components
//! and time slices on the way; [`ContractorNetwork::contract`] then runs a
//! FIFO propagation of the contractors until no domain narrows by more than
//! the fixed-point ratio.
//!
//! Registration is where everything can fail: a failed `add` leaves the
//! network unchanged. Propagation never fails; an inconsistent system shows
//! up as empty domains and stops the loop early.

use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use gcollections::ops::*;

use crate::contractor::{ctc_ptr, dyn_ctc_ptr, Contractor, Ctc, CtcKey, CtcKind, DynCtc};
use crate::domain::{
  all_dyn, all_slices, clamped_diam, dyn_same_slicing, total_size, tube_volume, volume, Dom,
  DomMeta, DomainLoc, DomainType, DomainValue, IntervalVar, IntervalVectorVar, TubeVar,
  TubeVectorVar, VarId,
};
use crate::errors::{CnError, CnResult};
use crate::interval::Interval;
use crate::interval_vector::IntervalVector;
use crate::tube::{Trajectory, Tube, TubeVector};

const DEFAULT_FIXEDPOINT_RATIO: f64 = 0.0001;

/// One registered domain of the graph.
struct DomainNode {
  loc: DomainLoc,
  dtype: DomainType,
  /// Contractors involving this domain.
  ctcs: Vec<usize>,
  /// Volume saved at the last change detection.
  volume: f64,
}

/// Timestamped samples fed to a tube variable through `add_data`.
struct DataBuffer {
  /// One trajectory per component (a single one for a scalar tube).
  trajs: Vec<Trajectory>,
  /// Slices whose envelope has already been contracted from the samples.
  applied: Vec<bool>,
}

/// An embedded network and the variable links synchronizing it with its
/// parent.
pub(crate) struct SubNetwork {
  pub(crate) cn: ContractorNetwork,
  /// `(parent var, sub var)` pairs.
  pub(crate) links: Vec<(VarId, VarId)>,
}

/// Remapping of an embedded network's handles into its parent, returned by
/// [`ContractorNetwork::add_network`].
pub struct NetworkMap {
  vars: Vec<VarId>,
}

impl NetworkMap {
  pub fn interval(&self, v: IntervalVar) -> IntervalVar {
    IntervalVar(self.vars[(v.0).0 as usize])
  }

  pub fn interval_vector(&self, v: IntervalVectorVar) -> IntervalVectorVar {
    IntervalVectorVar(self.vars[(v.0).0 as usize])
  }

  pub fn tube(&self, v: TubeVar) -> TubeVar {
    TubeVar(self.vars[(v.0).0 as usize])
  }

  pub fn tube_vector(&self, v: TubeVectorVar) -> TubeVectorVar {
    TubeVectorVar(self.vars[(v.0).0 as usize])
  }
}

/// What a popped contractor node has to run; materialized first so that the
/// arena can be borrowed mutably afterwards.
enum Step {
  Nothing,
  Equality(DomainLoc, DomainLoc),
  Static(Rc<dyn Ctc>, Vec<DomainLoc>),
  Dyn(Rc<dyn DynCtc>, Vec<DomainLoc>),
  Network,
}

pub struct ContractorNetwork {
  /// Arena of root variable values; every domain is a projection into it.
  vars: Vec<DomainValue>,
  domains: Vec<DomainNode>,
  map_domains: HashMap<DomainLoc, usize>,
  ctcs: Vec<Contractor>,
  map_ctcs: HashMap<CtcKey, usize>,
  queue: VecDeque<usize>,
  fixedpoint_ratio: f64,
  /// `(contractor name, root domains)` pairs already covered by a dynamic
  /// contractor; re-adds and redundant companions are skipped through it.
  dyn_registry: HashSet<(&'static str, Vec<DomainLoc>)>,
  data: HashMap<VarId, DataBuffer>,
  next_subnetwork: usize,
}

impl ContractorNetwork {
  pub fn new() -> ContractorNetwork {
    ContractorNetwork {
      vars: Vec::new(),
      domains: Vec::new(),
      map_domains: HashMap::new(),
      ctcs: Vec::new(),
      map_ctcs: HashMap::new(),
      queue: VecDeque::new(),
      fixedpoint_ratio: DEFAULT_FIXEDPOINT_RATIO,
      dyn_registry: HashSet::new(),
      data: HashMap::new(),
      next_subnetwork: 0,
    }
  }

  // Variables

  pub fn create_interval(&mut self, x: Interval) -> CnResult<IntervalVar> {
    if x.is_empty() {
      return Err(CnError::EmptyDomain);
    }
    let handle = IntervalVar(self.push_var(DomainValue::Interval(x)));
    self.register_dom(handle.into())?;
    Ok(handle)
  }

  pub fn create_interval_vector(&mut self, x: IntervalVector) -> CnResult<IntervalVectorVar> {
    if x.is_empty() {
      return Err(CnError::EmptyDomain);
    }
    let handle = IntervalVectorVar(self.push_var(DomainValue::IntervalVector(x)));
    self.register_dom(handle.into())?;
    Ok(handle)
  }

  pub fn create_tube(&mut self, x: Tube) -> CnResult<TubeVar> {
    if x.is_empty() {
      return Err(CnError::EmptyDomain);
    }
    let handle = TubeVar(self.push_var(DomainValue::Tube(x)));
    self.register_dom(handle.into())?;
    Ok(handle)
  }

  pub fn create_tube_vector(&mut self, x: TubeVector) -> CnResult<TubeVectorVar> {
    if x.is_empty() {
      return Err(CnError::EmptyDomain);
    }
    let handle = TubeVectorVar(self.push_var(DomainValue::TubeVector(x)));
    self.register_dom(handle.into())?;
    Ok(handle)
  }

  fn push_var(&mut self, v: DomainValue) -> VarId {
    let id = VarId(self.vars.len() as u32);
    self.vars.push(v);
    id
  }

  // Value access. Handles must come from this network (or its `NetworkMap`).

  pub fn interval(&self, v: IntervalVar) -> Interval {
    match &self.vars[((v.0).0) as usize] {
      DomainValue::Interval(x) => *x,
      _ => unreachable!("handle minted for an interval variable"),
    }
  }

  pub fn interval_vector(&self, v: IntervalVectorVar) -> &IntervalVector {
    match &self.vars[((v.0).0) as usize] {
      DomainValue::IntervalVector(x) => x,
      _ => unreachable!("handle minted for an interval vector variable"),
    }
  }

  pub fn tube(&self, v: TubeVar) -> &Tube {
    match &self.vars[((v.0).0) as usize] {
      DomainValue::Tube(x) => x,
      _ => unreachable!("handle minted for a tube variable"),
    }
  }

  pub fn tube_vector(&self, v: TubeVectorVar) -> &TubeVector {
    match &self.vars[((v.0).0) as usize] {
      DomainValue::TubeVector(x) => x,
      _ => unreachable!("handle minted for a tube vector variable"),
    }
  }

  /// Replaces the value of a variable updated outside of the network; pair
  /// with [`ContractorNetwork::trigger_all_contractors`] to re-propagate.
  pub fn set_interval(&mut self, v: IntervalVar, x: Interval) -> CnResult<()> {
    if x.is_empty() {
      return Err(CnError::EmptyDomain);
    }
    self.vars[((v.0).0) as usize] = DomainValue::Interval(x);
    Ok(())
  }

  pub fn set_interval_vector(&mut self, v: IntervalVectorVar, x: IntervalVector) -> CnResult<()> {
    if x.is_empty() {
      return Err(CnError::EmptyDomain);
    }
    let expected = self.interval_vector(v).size();
    if x.size() != expected {
      return Err(CnError::VectorSize { expected, provided: x.size() });
    }
    self.vars[((v.0).0) as usize] = DomainValue::IntervalVector(x);
    Ok(())
  }

  pub fn set_tube(&mut self, v: TubeVar, x: Tube) -> CnResult<()> {
    if x.is_empty() {
      return Err(CnError::EmptyDomain);
    }
    if !Tube::same_slicing(self.tube(v), &x) {
      return Err(CnError::SameSlicing);
    }
    self.vars[((v.0).0) as usize] = DomainValue::Tube(x);
    Ok(())
  }

  pub fn set_tube_vector(&mut self, v: TubeVectorVar, x: TubeVector) -> CnResult<()> {
    if x.is_empty() {
      return Err(CnError::EmptyDomain);
    }
    if !TubeVector::same_slicing(self.tube_vector(v), &x) {
      return Err(CnError::SameSlicing);
    }
    self.vars[((v.0).0) as usize] = DomainValue::TubeVector(x);
    Ok(())
  }

  // Building the graph

  /// Binds a static contractor to domains.
  ///
  /// The total scalar width of the domain list must be a multiple of the
  /// contractor's arity: equal to it in the heterogeneous case (vectors are
  /// exploded into their components), an exact multiple in the array case
  /// (the contractor is repeated component-wise). Time-indexed domains are
  /// handled slice by slice, so they must share their slicing.
  pub fn add(&mut self, ctc: Rc<dyn Ctc>, doms: &[Dom]) -> CnResult<()> {
    if doms.is_empty() {
      return Err(CnError::EmptyDomainList);
    }
    let metas = self.resolve_all(doms)?;
    for m in &metas {
      if loc_is_empty(&self.vars, m.dom.loc) {
        return Err(CnError::EmptyDomain);
      }
    }
    if !dyn_same_slicing(&metas) {
      return Err(CnError::SameSlicing);
    }

    let n = total_size(&metas);
    let arity = ctc.nb_var();
    if arity == 0 || n % arity != 0 {
      return Err(CnError::Dimension { total: n, arity });
    }
    let multiple = n / arity;
    if multiple > 1 {
      // Array mode: only vectors of matching width can be repeated.
      for m in &metas {
        let vector_ok = matches!(
          m.dtype,
          DomainType::IntervalVector | DomainType::TubeVector
        ) && m.size == multiple;
        if !vector_ok {
          return Err(CnError::Dimension { total: n, arity });
        }
      }
    }

    for m in &metas {
      self.register_dom(m.dom)?;
    }

    let k_max = metas.iter().map(|m| m.nb_slices).max().unwrap_or(0).max(1);
    for i in 0..multiple {
      for k in 0..k_max {
        let mut row = Vec::with_capacity(arity);
        for m in &metas {
          match m.dtype {
            DomainType::Interval | DomainType::Slice => row.push(m.dom),
            DomainType::IntervalVector => {
              if multiple == 1 {
                for j in 0..m.size {
                  row.push(m.dom.component(j));
                }
              } else {
                row.push(m.dom.component(i));
              }
            }
            DomainType::Tube => row.push(m.dom.slice(k)),
            DomainType::TubeVector => {
              if multiple == 1 {
                for j in 0..m.size {
                  row.push(m.dom.component(j).slice(k));
                }
              } else {
                row.push(m.dom.component(i).slice(k));
              }
            }
          }
        }
        debug_assert_eq!(row.len(), arity);
        self.add_static_node(&ctc, &row)?;
      }
    }
    Ok(())
  }

  /// Binds a dynamic contractor to domains.
  ///
  /// A non-inter-temporal contractor over tubes is broken down to one
  /// contractor per row of slices; an inter-temporal one (or one already
  /// given bare slices) is bound whole.
  pub fn add_dyn(&mut self, ctc: Rc<dyn DynCtc>, doms: &[Dom]) -> CnResult<()> {
    if doms.is_empty() {
      return Err(CnError::EmptyDomainList);
    }
    let metas = self.resolve_all(doms)?;
    for m in &metas {
      if loc_is_empty(&self.vars, m.dom.loc) {
        return Err(CnError::EmptyDomain);
      }
    }
    let types: Vec<DomainType> = metas.iter().map(|m| m.dtype).collect();
    if !ctc.accepts(&types) {
      return Err(CnError::DomainsType {
        ctc: ctc.name(),
        provided: types,
        accepted: ctc.accepted_signatures(),
      });
    }

    let decompose = !ctc.is_intertemporal() && !all_slices(&metas);
    if decompose {
      if !all_dyn(&metas) || metas.iter().any(|m| m.dtype == DomainType::Slice) {
        return Err(CnError::DomainsType {
          ctc: ctc.name(),
          provided: types,
          accepted: ctc.accepted_signatures(),
        });
      }
      if !dyn_same_slicing(&metas) {
        return Err(CnError::SameSlicing);
      }
      // The slice-level rows must be acceptable too, before anything is
      // registered.
      let mut slice_types = Vec::new();
      for m in &metas {
        for _ in 0..m.size {
          slice_types.push(DomainType::Slice);
        }
      }
      if !ctc.accepts(&slice_types) {
        return Err(CnError::DomainsType {
          ctc: ctc.name(),
          provided: slice_types,
          accepted: ctc.accepted_signatures(),
        });
      }
    }

    // One dynamic contractor of a given name per domain set: re-adds and
    // redundant companion injections stop here. The key is only latched at
    // the end, once the companion and the binding have both succeeded.
    let registry_key = if all_slices(&metas) {
      None
    } else {
      let key = (ctc.name(), doms.iter().map(|d| d.loc).collect::<Vec<_>>());
      if self.dyn_registry.contains(&key) {
        return Ok(());
      }
      Some(key)
    };

    if let Some(comp) = ctc.companion(doms) {
      self.add_dyn(comp.ctc, &comp.doms)?;
    }

    if decompose {
      for m in &metas {
        self.register_dom(m.dom)?;
      }
      let nb_slices = metas
        .iter()
        .map(|m| m.nb_slices)
        .max()
        .unwrap_or(0)
        .max(1);
      for k in 0..nb_slices {
        let mut row = Vec::new();
        for m in &metas {
          match m.dtype {
            DomainType::Tube => row.push(m.dom.slice(k)),
            DomainType::TubeVector => {
              for j in 0..m.size {
                row.push(m.dom.component(j).slice(k));
              }
            }
            _ => unreachable!("validated above"),
          }
        }
        self.add_dyn(Rc::clone(&ctc), &row)?;
      }
    } else {
      let mut ids = Vec::with_capacity(doms.len());
      let mut locs = Vec::with_capacity(doms.len());
      for d in doms {
        ids.push(self.register_dom(*d)?);
        locs.push(d.loc);
      }
      let key = CtcKey::Dyn { ptr: dyn_ctc_ptr(&ctc), doms: locs.clone() };
      self.insert_ctc(key, CtcKind::Dyn(ctc), locs, ids);
    }
    if let Some(key) = registry_key {
      self.dyn_registry.insert(key);
    }
    Ok(())
  }

  /// Creates a new vector variable equal to the `[start, end]` components of
  /// `v`, linked to it through built-in equality contractors.
  pub fn subvector(
    &mut self,
    v: IntervalVectorVar,
    start: usize,
    end: usize,
  ) -> CnResult<IntervalVectorVar> {
    let size = self.interval_vector(v).size();
    if start > end || end >= size {
      return Err(CnError::IndexOutOfRange {
        what: "component",
        index: end.max(start),
        size,
      });
    }
    let sub = self.create_interval_vector(self.interval_vector(v).subvector(start, end))?;
    for i in 0..=(end - start) {
      let a = sub.component(i);
      let b = v.component(start + i);
      let ida = self.register_dom(a)?;
      let idb = self.register_dom(b)?;
      let locs = vec![a.loc, b.loc];
      let key = CtcKey::Equality { doms: locs.clone() };
      self.insert_ctc(key, CtcKind::Equality, locs, vec![ida, idb]);
    }
    Ok(sub)
  }

  /// Embeds `sub` as a single contractor of this network. Its variables are
  /// re-registered here with their current values; the returned map converts
  /// the sub-network's handles into handles of this network.
  pub fn add_network(&mut self, sub: ContractorNetwork) -> CnResult<NetworkMap> {
    for v in &sub.vars {
      if v.is_empty() {
        return Err(CnError::EmptyDomain);
      }
    }
    let base = self.vars.len();
    let mut links = Vec::with_capacity(sub.vars.len());
    let mut mapped = Vec::with_capacity(sub.vars.len());
    for i in 0..sub.vars.len() {
      let pvar = VarId((base + i) as u32);
      links.push((pvar, VarId(i as u32)));
      mapped.push(pvar);
    }
    self.vars.extend(sub.vars.iter().cloned());

    let mut ids = Vec::with_capacity(links.len());
    let mut locs = Vec::with_capacity(links.len());
    for &(pvar, _) in &links {
      let d = Dom { loc: DomainLoc::root(pvar) };
      ids.push(self.register_dom(d)?);
      locs.push(d.loc);
    }

    let id = self.next_subnetwork;
    self.next_subnetwork += 1;
    let key = CtcKey::Network { id };
    self.insert_ctc(
      key,
      CtcKind::Network(Box::new(SubNetwork { cn: sub, links })),
      locs,
      ids,
    );
    Ok(NetworkMap { vars: mapped })
  }

  /// Feeds one timestamped measurement to a tube variable. Sample times must
  /// be strictly increasing; every slice whose time span becomes fully
  /// covered by the samples has its envelope narrowed to the interpolated
  /// enclosure and its contractors re-triggered.
  pub fn add_data(&mut self, v: TubeVar, t: f64, y: Interval) -> CnResult<()> {
    self.add_data_components(v.0, None, t, vec![y])
  }

  pub fn add_vector_data(&mut self, v: TubeVectorVar, t: f64, y: IntervalVector) -> CnResult<()> {
    let expected = self.tube_vector(v).size();
    if y.size() != expected {
      return Err(CnError::VectorSize { expected, provided: y.size() });
    }
    let ys = y.iter().copied().collect();
    self.add_data_components(v.0, Some(expected), t, ys)
  }

  fn add_data_components(
    &mut self,
    var: VarId,
    vector_size: Option<usize>,
    t: f64,
    ys: Vec<Interval>,
  ) -> CnResult<()> {
    if ys.iter().any(|y| y.is_empty()) {
      return Err(CnError::EmptyDomain);
    }
    let first_tube_loc = match vector_size {
      Some(_) => DomainLoc { var, component: Some(0), slice: None },
      None => DomainLoc::root(var),
    };
    let windows: Vec<Interval> = {
      let tube = tube_ref(&self.vars, first_tube_loc);
      (0..tube.nb_slices()).map(|k| tube.slice_tdomain(k)).collect()
    };

    let n = ys.len();
    let buf = self.data.entry(var).or_insert_with(|| DataBuffer {
      trajs: vec![Trajectory::new(); n],
      applied: vec![false; windows.len()],
    });
    if let Some(last) = buf.trajs[0].last_time() {
      if t <= last {
        return Err(CnError::NonIncreasingTime { t, last });
      }
    }
    for (traj, y) in buf.trajs.iter_mut().zip(ys.iter()) {
      traj.push(t, *y);
    }

    // Slices now fully covered by the sampled span, wherever in the time
    // domain the stream started, with the enclosure of each component over
    // them.
    let mut covered: Vec<(usize, Vec<Interval>)> = Vec::new();
    let span = buf.trajs[0].tdomain();
    for k in 0..windows.len() {
      if buf.applied[k] || !windows[k].is_subset(&span) {
        continue;
      }
      buf.applied[k] = true;
      let enclosures = buf.trajs.iter().map(|tr| tr.range_over(windows[k])).collect();
      covered.push((k, enclosures));
    }

    for (k, enclosures) in covered {
      for (i, e) in enclosures.into_iter().enumerate() {
        let loc = DomainLoc {
          var,
          component: vector_size.map(|_| i as u32),
          slice: Some(k as u32),
        };
        intersect_slice_part(&mut self.vars, loc, SlicePart::Envelope, e);
        self.trigger_ctc_related_to_dom(loc, None);
      }
    }
    Ok(())
  }

  // Propagation

  /// Runs the propagation loop to its fixed point; returns the elapsed time.
  pub fn contract(&mut self) -> Duration {
    self.contract_during(Duration::MAX)
  }

  /// Runs the propagation loop for at most `budget`; contractors still in
  /// the queue when the budget runs out stay there for a later call.
  pub fn contract_during(&mut self, budget: Duration) -> Duration {
    let start = Instant::now();
    for node in &mut self.domains {
      node.volume = loc_volume(&self.vars, node.loc);
    }
    tracing::debug!(
      nb_ctc = self.ctcs.len(),
      nb_dom = self.domains.len(),
      in_stack = self.queue.len(),
      "contracting network"
    );

    while !self.queue.is_empty() && start.elapsed() < budget {
      let idx = match self.queue.pop_front() {
        Some(idx) => idx,
        None => break,
      };
      self.run_ctc(idx);
      self.ctcs[idx].active = false;

      let related = self.ctcs[idx].doms.clone();
      let mut emptied = false;
      for loc in related {
        self.trigger_ctc_related_to_dom(loc, Some(idx));
        emptied = emptied || loc_is_empty(&self.vars, loc);
      }
      if emptied {
        tracing::debug!("empty domain, stopping propagation");
        break;
      }
    }

    let elapsed = start.elapsed();
    tracing::debug!(?elapsed, in_stack = self.queue.len(), "propagation done");
    elapsed
  }

  /// Fraction of its volume a domain must lose for its contractors to be
  /// re-triggered. Must lie in `[0, 1)`; `0` propagates down to the last
  /// floating-point unit.
  pub fn set_fixedpoint_ratio(&mut self, r: f64) -> CnResult<()> {
    if !(0. ..1.).contains(&r) {
      return Err(CnError::InvalidRatio(r));
    }
    self.fixedpoint_ratio = r;
    Ok(())
  }

  /// Re-queues every contracting contractor, e.g. after a domain has been
  /// updated through a setter.
  pub fn trigger_all_contractors(&mut self) {
    self.queue.clear();
    for (idx, ctc) in self.ctcs.iter_mut().enumerate() {
      if ctc.is_component() {
        ctc.active = false;
      } else {
        ctc.active = true;
        self.queue.push_front(idx);
      }
    }
  }

  pub fn nb_ctc(&self) -> usize {
    self.ctcs.len()
  }

  pub fn nb_dom(&self) -> usize {
    self.domains.len()
  }

  pub fn nb_ctc_in_stack(&self) -> usize {
    self.queue.len()
  }

  /// Whether some registered domain has been contracted to the empty set.
  pub fn emptiness(&self) -> bool {
    self
      .domains
      .iter()
      .any(|d| loc_is_empty(&self.vars, d.loc))
  }

  // Internals

  fn resolve_all(&self, doms: &[Dom]) -> CnResult<Vec<DomMeta>> {
    doms.iter().map(|d| self.resolve(*d)).collect()
  }

  /// Checks a domain descriptor against the arena and classifies it.
  fn resolve(&self, dom: Dom) -> CnResult<DomMeta> {
    let loc = dom.loc;
    let idx = loc.var.0 as usize;
    let root = match self.vars.get(idx) {
      Some(root) => root,
      None => {
        return Err(CnError::IndexOutOfRange {
          what: "variable",
          index: idx,
          size: self.vars.len(),
        })
      }
    };

    let comp_err = |index: u32, size: usize| CnError::IndexOutOfRange {
      what: "component",
      index: index as usize,
      size,
    };
    let slice_err = |index: u32, size: usize| CnError::IndexOutOfRange {
      what: "slice",
      index: index as usize,
      size,
    };

    let meta = match root {
      DomainValue::Interval(_) => {
        if let Some(i) = loc.component {
          return Err(comp_err(i, 0));
        }
        if let Some(k) = loc.slice {
          return Err(slice_err(k, 0));
        }
        DomMeta { dom, dtype: DomainType::Interval, size: 1, slicing: None, nb_slices: 0 }
      }
      DomainValue::IntervalVector(x) => {
        if let Some(k) = loc.slice {
          return Err(slice_err(k, 0));
        }
        match loc.component {
          Some(i) if (i as usize) < x.size() => {
            DomMeta { dom, dtype: DomainType::Interval, size: 1, slicing: None, nb_slices: 0 }
          }
          Some(i) => return Err(comp_err(i, x.size())),
          None => DomMeta {
            dom,
            dtype: DomainType::IntervalVector,
            size: x.size(),
            slicing: None,
            nb_slices: 0,
          },
        }
      }
      DomainValue::Tube(x) => {
        if let Some(i) = loc.component {
          return Err(comp_err(i, 0));
        }
        match loc.slice {
          Some(k) if (k as usize) < x.nb_slices() => {
            DomMeta { dom, dtype: DomainType::Slice, size: 1, slicing: None, nb_slices: 0 }
          }
          Some(k) => return Err(slice_err(k, x.nb_slices())),
          None => DomMeta {
            dom,
            dtype: DomainType::Tube,
            size: 1,
            slicing: Some(x.times().to_vec()),
            nb_slices: x.nb_slices(),
          },
        }
      }
      DomainValue::TubeVector(x) => match loc.component {
        Some(i) if (i as usize) < x.size() => {
          let tube = x.tube(i as usize);
          match loc.slice {
            Some(k) if (k as usize) < tube.nb_slices() => {
              DomMeta { dom, dtype: DomainType::Slice, size: 1, slicing: None, nb_slices: 0 }
            }
            Some(k) => return Err(slice_err(k, tube.nb_slices())),
            None => DomMeta {
              dom,
              dtype: DomainType::Tube,
              size: 1,
              slicing: Some(tube.times().to_vec()),
              nb_slices: tube.nb_slices(),
            },
          }
        }
        Some(i) => return Err(comp_err(i, x.size())),
        None => {
          if let Some(k) = loc.slice {
            return Err(slice_err(k, 0));
          }
          DomMeta {
            dom,
            dtype: DomainType::TubeVector,
            size: x.size(),
            slicing: Some(x.tube(0).times().to_vec()),
            nb_slices: x.nb_slices(),
          }
        }
      },
      DomainValue::Slice(_) => unreachable!("root variables are never bare slices"),
    };
    Ok(meta)
  }

  /// Registers a domain node, decomposing aggregates into their parts wired
  /// through component contractors. Idempotent.
  fn register_dom(&mut self, dom: Dom) -> CnResult<usize> {
    if let Some(&id) = self.map_domains.get(&dom.loc) {
      return Ok(id);
    }
    let meta = self.resolve(dom)?;
    let id = self.domains.len();
    self.domains.push(DomainNode {
      loc: dom.loc,
      dtype: meta.dtype,
      ctcs: Vec::new(),
      volume: 0.,
    });
    self.map_domains.insert(dom.loc, id);

    match meta.dtype {
      DomainType::Interval | DomainType::Slice => {}
      DomainType::IntervalVector | DomainType::TubeVector => {
        let mut linked = vec![id];
        for i in 0..meta.size {
          linked.push(self.register_dom(dom.component(i))?);
        }
        self.add_component_ctc(linked);
      }
      DomainType::Tube => {
        let mut linked = vec![id];
        for k in 0..meta.nb_slices {
          linked.push(self.register_dom(dom.slice(k))?);
        }
        self.add_component_ctc(linked);
        // Adjacent slices share a gate: narrowing one must wake the other.
        for k in 0..meta.nb_slices - 1 {
          let a = self.register_dom(dom.slice(k))?;
          let b = self.register_dom(dom.slice(k + 1))?;
          self.add_component_ctc(vec![a, b]);
        }
      }
    }
    Ok(id)
  }

  fn add_static_node(&mut self, ctc: &Rc<dyn Ctc>, doms: &[Dom]) -> CnResult<()> {
    let mut ids = Vec::with_capacity(doms.len());
    let mut locs = Vec::with_capacity(doms.len());
    for d in doms {
      ids.push(self.register_dom(*d)?);
      locs.push(d.loc);
    }
    let key = CtcKey::Static { ptr: ctc_ptr(ctc), doms: locs.clone() };
    self.insert_ctc(key, CtcKind::Static(Rc::clone(ctc)), locs, ids);
    Ok(())
  }

  fn add_component_ctc(&mut self, dom_ids: Vec<usize>) {
    let locs: Vec<DomainLoc> = dom_ids.iter().map(|&d| self.domains[d].loc).collect();
    let key = CtcKey::Component { doms: locs.clone() };
    self.insert_ctc(key, CtcKind::Component, locs, dom_ids);
  }

  /// Adds a contractor node unless an identical one is already in the graph;
  /// new nodes are queued right away.
  fn insert_ctc(
    &mut self,
    key: CtcKey,
    kind: CtcKind,
    locs: Vec<DomainLoc>,
    dom_ids: Vec<usize>,
  ) -> usize {
    if let Some(&id) = self.map_ctcs.get(&key) {
      return id;
    }
    let id = self.ctcs.len();
    self.ctcs.push(Contractor { kind, doms: locs, active: true });
    self.map_ctcs.insert(key, id);
    for d in dom_ids {
      if !self.domains[d].ctcs.contains(&id) {
        self.domains[d].ctcs.push(id);
      }
    }
    if self.ctcs[id].is_component() {
      self.queue.push_back(id);
    } else {
      self.queue.push_front(id);
    }
    id
  }

  fn run_ctc(&mut self, idx: usize) {
    let step = match &self.ctcs[idx].kind {
      CtcKind::Component => Step::Nothing,
      CtcKind::Equality => Step::Equality(self.ctcs[idx].doms[0], self.ctcs[idx].doms[1]),
      CtcKind::Static(c) => Step::Static(Rc::clone(c), self.ctcs[idx].doms.clone()),
      CtcKind::Dyn(c) => Step::Dyn(Rc::clone(c), self.ctcs[idx].doms.clone()),
      CtcKind::Network(_) => Step::Network,
    };

    match step {
      Step::Nothing => {}
      Step::Equality(a, b) => {
        let va = read_value(&self.vars, a);
        intersect_value(&mut self.vars, b, &va);
        let vb = read_value(&self.vars, b);
        intersect_value(&mut self.vars, a, &vb);
      }
      Step::Static(c, locs) => self.run_static(&c, &locs),
      Step::Dyn(c, locs) => {
        let mut vals: Vec<DomainValue> =
          locs.iter().map(|&l| read_value(&self.vars, l)).collect();
        c.contract(&mut vals);
        for (l, v) in locs.iter().zip(vals.iter()) {
          intersect_value(&mut self.vars, *l, v);
        }
      }
      Step::Network => self.run_subnetwork(idx),
    }
  }

  /// Copy-in, contract, intersect-out: monotone narrowing holds whatever the
  /// contractor does to the box. Slice-bound contractors are applied to the
  /// input gates, output gates and envelopes of their slices in turn.
  fn run_static(&mut self, c: &Rc<dyn Ctc>, locs: &[DomainLoc]) {
    if locs.iter().all(|l| l.slice.is_none()) {
      let mut bx = IntervalVector::from(
        locs.iter().map(|&l| interval_at(&self.vars, l)).collect::<Vec<_>>(),
      );
      c.contract(&mut bx);
      for (i, &l) in locs.iter().enumerate() {
        intersect_interval_at(&mut self.vars, l, bx[i]);
      }
    } else {
      for part in &[SlicePart::InputGate, SlicePart::OutputGate, SlicePart::Envelope] {
        let mut bx = IntervalVector::from(
          locs
            .iter()
            .map(|&l| {
              if l.slice.is_some() {
                slice_part(&self.vars, l, *part)
              } else {
                interval_at(&self.vars, l)
              }
            })
            .collect::<Vec<_>>(),
        );
        c.contract(&mut bx);
        for (i, &l) in locs.iter().enumerate() {
          if l.slice.is_some() {
            intersect_slice_part(&mut self.vars, l, *part, bx[i]);
          } else {
            intersect_interval_at(&mut self.vars, l, bx[i]);
          }
        }
      }
    }
  }

  /// Synchronizes the linked variables into the embedded network, runs it to
  /// its own fixed point, and folds the narrowed values back.
  fn run_subnetwork(&mut self, idx: usize) {
    let ContractorNetwork { vars, ctcs, .. } = self;
    if let CtcKind::Network(sub) = &mut ctcs[idx].kind {
      for &(pvar, svar) in &sub.links {
        let pv = vars[pvar.0 as usize].clone();
        intersect_value(&mut sub.cn.vars, DomainLoc::root(svar), &pv);
      }
      sub.cn.trigger_all_contractors();
      sub.cn.contract();
      for &(pvar, svar) in &sub.links {
        let sv = sub.cn.vars[svar.0 as usize].clone();
        intersect_value(vars, DomainLoc::root(pvar), &sv);
      }
    }
  }

  /// Wakes the inactive contractors of a domain when it lost enough volume
  /// since the last check; contracting contractors go in front of the queue,
  /// component contractors behind them.
  fn trigger_ctc_related_to_dom(&mut self, loc: DomainLoc, avoid: Option<usize>) {
    let dom_id = match self.map_domains.get(&loc) {
      Some(&d) => d,
      None => return,
    };
    let current = loc_volume(&self.vars, loc);
    let saved = self.domains[dom_id].volume;

    if current / saved < 1. - self.fixedpoint_ratio {
      let mut local: VecDeque<usize> = VecDeque::new();
      let ctc_ids = self.domains[dom_id].ctcs.clone();
      for c in ctc_ids {
        if Some(c) == avoid || self.ctcs[c].active {
          continue;
        }
        self.ctcs[c].active = true;
        if self.ctcs[c].is_component() {
          local.push_back(c);
        } else {
          local.push_front(c);
        }
      }
      for c in local {
        self.queue.push_front(c);
      }
    }

    self.domains[dom_id].volume = current;
  }
}

impl Default for ContractorNetwork {
  fn default() -> ContractorNetwork {
    ContractorNetwork::new()
  }
}

// Arena access helpers, free-standing for split borrows.

#[derive(Clone, Copy)]
enum SlicePart {
  InputGate,
  OutputGate,
  Envelope,
}

fn interval_at(vars: &[DomainValue], loc: DomainLoc) -> Interval {
  match (&vars[loc.var.0 as usize], loc.component) {
    (DomainValue::Interval(x), None) => *x,
    (DomainValue::IntervalVector(v), Some(i)) => v[i as usize],
    _ => unreachable!("scalar location"),
  }
}

fn intersect_interval_at(vars: &mut [DomainValue], loc: DomainLoc, x: Interval) {
  match (&mut vars[loc.var.0 as usize], loc.component) {
    (DomainValue::Interval(v), None) => *v = v.intersection(&x),
    (DomainValue::IntervalVector(v), Some(i)) => {
      let i = i as usize;
      v[i] = v[i].intersection(&x);
    }
    _ => unreachable!("scalar location"),
  }
}

fn tube_ref(vars: &[DomainValue], loc: DomainLoc) -> &Tube {
  match (&vars[loc.var.0 as usize], loc.component) {
    (DomainValue::Tube(t), None) => t,
    (DomainValue::TubeVector(tv), Some(i)) => tv.tube(i as usize),
    _ => unreachable!("tube location"),
  }
}

fn tube_mut(vars: &mut [DomainValue], loc: DomainLoc) -> &mut Tube {
  match (&mut vars[loc.var.0 as usize], loc.component) {
    (DomainValue::Tube(t), None) => t,
    (DomainValue::TubeVector(tv), Some(i)) => tv.tube_mut(i as usize),
    _ => unreachable!("tube location"),
  }
}

fn slice_part(vars: &[DomainValue], loc: DomainLoc, part: SlicePart) -> Interval {
  let k = match loc.slice {
    Some(k) => k as usize,
    None => unreachable!("slice location"),
  };
  let t = tube_ref(vars, loc);
  match part {
    SlicePart::InputGate => t.input_gate(k),
    SlicePart::OutputGate => t.output_gate(k),
    SlicePart::Envelope => t.envelope(k),
  }
}

fn intersect_slice_part(vars: &mut [DomainValue], loc: DomainLoc, part: SlicePart, x: Interval) {
  let k = match loc.slice {
    Some(k) => k as usize,
    None => unreachable!("slice location"),
  };
  let t = tube_mut(vars, loc);
  match part {
    SlicePart::InputGate => t.intersect_input_gate(k, x),
    SlicePart::OutputGate => t.intersect_output_gate(k, x),
    SlicePart::Envelope => t.intersect_envelope(k, x),
  }
}

/// Owned snapshot of the set at a location.
fn read_value(vars: &[DomainValue], loc: DomainLoc) -> DomainValue {
  match (&vars[loc.var.0 as usize], loc.component, loc.slice) {
    (DomainValue::Interval(x), None, None) => DomainValue::Interval(*x),
    (DomainValue::IntervalVector(x), Some(i), None) => DomainValue::Interval(x[i as usize]),
    (DomainValue::IntervalVector(x), None, None) => DomainValue::IntervalVector(x.clone()),
    (DomainValue::Tube(x), None, Some(k)) => DomainValue::Slice(x.slice(k as usize)),
    (DomainValue::Tube(x), None, None) => DomainValue::Tube(x.clone()),
    (DomainValue::TubeVector(x), Some(i), Some(k)) => {
      DomainValue::Slice(x.tube(i as usize).slice(k as usize))
    }
    (DomainValue::TubeVector(x), Some(i), None) => DomainValue::Tube(x.tube(i as usize).clone()),
    (DomainValue::TubeVector(x), None, None) => DomainValue::TubeVector(x.clone()),
    _ => unreachable!("validated at registration"),
  }
}

/// Intersects the set at a location with `v`.
fn intersect_value(vars: &mut [DomainValue], loc: DomainLoc, v: &DomainValue) {
  match (&mut vars[loc.var.0 as usize], loc.component, loc.slice, v) {
    (DomainValue::Interval(x), None, None, DomainValue::Interval(y)) => *x = x.intersection(y),
    (DomainValue::IntervalVector(x), Some(i), None, DomainValue::Interval(y)) => {
      let i = i as usize;
      x[i] = x[i].intersection(y);
    }
    (DomainValue::IntervalVector(x), None, None, DomainValue::IntervalVector(y)) => {
      *x = x.intersection(y);
    }
    (DomainValue::Tube(x), None, Some(k), DomainValue::Slice(y)) => {
      x.intersect_slice(k as usize, y);
    }
    (DomainValue::Tube(x), None, None, DomainValue::Tube(y)) => x.intersect(y),
    (DomainValue::TubeVector(x), Some(i), Some(k), DomainValue::Slice(y)) => {
      x.tube_mut(i as usize).intersect_slice(k as usize, y);
    }
    (DomainValue::TubeVector(x), Some(i), None, DomainValue::Tube(y)) => {
      x.tube_mut(i as usize).intersect(y);
    }
    (DomainValue::TubeVector(x), None, None, DomainValue::TubeVector(y)) => {
      for i in 0..x.size() {
        x.tube_mut(i).intersect(y.tube(i));
      }
    }
    _ => unreachable!("validated at registration"),
  }
}

fn loc_is_empty(vars: &[DomainValue], loc: DomainLoc) -> bool {
  match (&vars[loc.var.0 as usize], loc.component, loc.slice) {
    (DomainValue::Interval(x), None, None) => x.is_empty(),
    (DomainValue::IntervalVector(x), Some(i), None) => x[i as usize].is_empty(),
    (DomainValue::IntervalVector(x), None, None) => x.is_empty(),
    (DomainValue::Tube(x), None, None) => x.is_empty(),
    (DomainValue::TubeVector(x), None, None) => x.is_empty(),
    (_, _, Some(k)) => {
      let k = k as usize;
      let t = tube_ref(vars, loc);
      t.input_gate(k).is_empty() || t.output_gate(k).is_empty() || t.envelope(k).is_empty()
    }
    (DomainValue::TubeVector(x), Some(i), None) => x.tube(i as usize).is_empty(),
    _ => unreachable!("validated at registration"),
  }
}

fn loc_volume(vars: &[DomainValue], loc: DomainLoc) -> f64 {
  match (loc.component, loc.slice) {
    (None, None) => volume(&vars[loc.var.0 as usize]),
    (Some(i), None) => match &vars[loc.var.0 as usize] {
      DomainValue::IntervalVector(x) => clamped_diam(&x[i as usize]),
      DomainValue::TubeVector(x) => tube_volume(x.tube(i as usize)),
      _ => unreachable!("validated at registration"),
    },
    (_, Some(k)) => {
      let k = k as usize;
      let t = tube_ref(vars, loc);
      clamped_diam(&t.input_gate(k)) + clamped_diam(&t.output_gate(k)) + clamped_diam(&t.envelope(k))
    }
  }
}
