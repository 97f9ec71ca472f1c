//! Collaborator interface to the external power-flow / optimization engine.
//!
//! The assembly pipeline never solves anything itself. Once a network is
//! built it is pushed into an engine through [`PowerNetworkEngine`]; the
//! engine runs its own consistency check and, later, power flow and optimal
//! dispatch. Results come back as per-snapshot tables keyed by component
//! class and attribute.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::components::{Attributes, Carrier, ComponentClass};
use crate::error::NetworkResult;
use crate::time::Snapshots;

/// Outcome of a power-flow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PowerFlowOutcome {
    pub converged: bool,
    pub iterations: usize,
}

/// Per-snapshot values for one `(class, attribute)` pair, keyed by component name
pub type ResultTable = BTreeMap<String, Vec<f64>>;

/// Solved quantities reported by an engine (the `*_t` output tables).
///
/// Tables follow the usual sign conventions: `Line.p0` is the flow entering
/// at `bus0`, `Line.p1` the flow entering at `bus1`, so a branch's loss is
/// `p0 + p1` per snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTables {
    tables: BTreeMap<ComponentClass, BTreeMap<String, ResultTable>>,
}

impl ResultTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        class: ComponentClass,
        attribute: &str,
        component: impl Into<String>,
        values: Vec<f64>,
    ) {
        self.tables
            .entry(class)
            .or_default()
            .entry(attribute.to_string())
            .or_default()
            .insert(component.into(), values);
    }

    pub fn get(&self, class: ComponentClass, attribute: &str) -> Option<&ResultTable> {
        self.tables.get(&class).and_then(|attrs| attrs.get(attribute))
    }

    pub fn series(
        &self,
        class: ComponentClass,
        attribute: &str,
        component: &str,
    ) -> Option<&[f64]> {
        self.get(class, attribute)
            .and_then(|table| table.get(component))
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

/// The engine a built network is handed to.
///
/// Engines receive the network piecewise: snapshots first, then carriers,
/// then components in assembly order (buses before anything that refers to
/// them). `create_network` resets the engine to an empty network and is
/// also what the builder calls when it tears down after a failure.
pub trait PowerNetworkEngine {
    fn create_network(&mut self);

    fn set_snapshots(&mut self, snapshots: &Snapshots) -> NetworkResult<()>;

    fn add_carrier(&mut self, carrier: &Carrier) -> NetworkResult<()>;

    fn add(&mut self, class: ComponentClass, name: &str, attrs: Attributes) -> NetworkResult<()>;

    /// Engine-side structural check. Failures are reported as `EngineRejected`.
    fn consistency_check(&mut self) -> NetworkResult<()>;

    fn pf(&mut self) -> NetworkResult<PowerFlowOutcome>;

    fn optimize(&mut self) -> NetworkResult<()>;

    fn results(&self) -> &ResultTables;
}
