//! Reference engine backed by a petgraph topology.
//!
//! `GraphEngine` implements the structural half of [`PowerNetworkEngine`]:
//! it accepts the hand-off, builds an undirected bus graph (lines,
//! transformers and links as edges) and checks it for duplicate identities,
//! dangling bus references, series that do not span the snapshots and
//! isolated buses. Several islands are legal and only logged.
//!
//! It carries no numerical backend, so `pf` and `optimize` report that
//! instead of pretending to solve.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::graph::{Graph, NodeIndex};
use petgraph::Undirected;
use tracing::{debug, warn};

use crate::components::{AttrValue, Attributes, Carrier, ComponentClass};
use crate::engine::{PowerFlowOutcome, PowerNetworkEngine, ResultTables};
use crate::error::{NetworkError, NetworkResult};
use crate::time::Snapshots;

#[derive(Debug, Clone)]
struct Entry {
    class: ComponentClass,
    name: String,
    attrs: Attributes,
}

impl Entry {
    fn text(&self, key: &str) -> Option<&str> {
        match self.attrs.get(key) {
            Some(AttrValue::Text(value)) => Some(value),
            _ => None,
        }
    }
}

/// Bus topology built from the registered entries
#[derive(Debug, Default)]
pub struct Topology {
    pub graph: Graph<String, String, Undirected>,
    index: HashMap<String, NodeIndex>,
}

impl Topology {
    pub fn node(&self, bus: &str) -> Option<NodeIndex> {
        self.index.get(bus).copied()
    }

    /// Connected bus groups, in order of first appearance
    pub fn islands(&self) -> Vec<Vec<String>> {
        let mut visited = HashSet::new();
        let mut islands = Vec::new();
        for start in self.graph.node_indices() {
            if visited.contains(&start) {
                continue;
            }
            let mut queue = VecDeque::new();
            queue.push_back(start);
            let mut members = Vec::new();
            while let Some(node) = queue.pop_front() {
                if !visited.insert(node) {
                    continue;
                }
                members.push(self.graph[node].clone());
                for neighbor in self.graph.neighbors(node) {
                    if !visited.contains(&neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
            islands.push(members);
        }
        islands
    }
}

#[derive(Debug, Default)]
pub struct GraphEngine {
    snapshot_count: usize,
    carriers: BTreeSet<String>,
    entries: Vec<Entry>,
    results: ResultTables,
}

impl GraphEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component_count(&self) -> usize {
        self.entries.len()
    }

    pub fn carriers(&self) -> impl Iterator<Item = &str> {
        self.carriers.iter().map(String::as_str)
    }

    pub fn contains(&self, class: ComponentClass, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.class == class && entry.name == name)
    }

    /// Bus graph of everything registered so far. Unknown branch ends are skipped.
    pub fn topology(&self) -> Topology {
        let mut topology = Topology::default();
        for entry in self.entries.iter().filter(|e| e.class == ComponentClass::Bus) {
            if !topology.index.contains_key(&entry.name) {
                let node = topology.graph.add_node(entry.name.clone());
                topology.index.insert(entry.name.clone(), node);
            }
        }
        for entry in self.entries.iter().filter(|e| is_branch(e.class)) {
            let ends = (
                entry.text("bus0").and_then(|b| topology.node(b)),
                entry.text("bus1").and_then(|b| topology.node(b)),
            );
            if let (Some(a), Some(b)) = ends {
                topology.graph.add_edge(a, b, entry.name.clone());
            }
        }
        topology
    }

    fn check_identities(&self) -> NetworkResult<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert((entry.class, entry.name.as_str())) {
                return Err(NetworkError::EngineRejected(format!(
                    "{} '{}' is defined more than once",
                    entry.class, entry.name
                )));
            }
        }
        Ok(())
    }

    fn check_references(&self) -> NetworkResult<()> {
        let buses: HashSet<&str> = self
            .entries
            .iter()
            .filter(|e| e.class == ComponentClass::Bus)
            .map(|e| e.name.as_str())
            .collect();
        for entry in &self.entries {
            let columns: &[&str] = match entry.class {
                ComponentClass::Bus => &[],
                class if is_branch(class) => &["bus0", "bus1"],
                _ => &["bus"],
            };
            for column in columns {
                match entry.text(column) {
                    Some(bus) if buses.contains(bus) => {}
                    Some(bus) => {
                        return Err(NetworkError::EngineRejected(format!(
                            "{} '{}' attached to unknown bus '{}' via {}",
                            entry.class, entry.name, bus, column
                        )))
                    }
                    None => {
                        return Err(NetworkError::EngineRejected(format!(
                            "{} '{}' has no {}",
                            entry.class, entry.name, column
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    fn check_series(&self) -> NetworkResult<()> {
        for entry in &self.entries {
            for (attr, value) in &entry.attrs {
                if let AttrValue::Series(values) = value {
                    if values.len() != self.snapshot_count {
                        return Err(NetworkError::EngineRejected(format!(
                            "{} '{}' series '{}' has {} values for {} snapshots",
                            entry.class,
                            entry.name,
                            attr,
                            values.len(),
                            self.snapshot_count
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_connectivity(&self) -> NetworkResult<()> {
        let topology = self.topology();
        if topology.graph.node_count() > 1 {
            if let Some(node) = topology
                .graph
                .node_indices()
                .find(|n| topology.graph.neighbors(*n).next().is_none())
            {
                return Err(NetworkError::EngineRejected(format!(
                    "bus '{}' is not connected to any branch",
                    topology.graph[node]
                )));
            }
        }
        let islands = topology.islands();
        if islands.len() > 1 {
            warn!(islands = islands.len(), "network consists of several islands");
        }
        Ok(())
    }
}

fn is_branch(class: ComponentClass) -> bool {
    matches!(
        class,
        ComponentClass::Line | ComponentClass::Transformer | ComponentClass::Link
    )
}

impl PowerNetworkEngine for GraphEngine {
    fn create_network(&mut self) {
        self.snapshot_count = 0;
        self.carriers.clear();
        self.entries.clear();
        self.results.clear();
    }

    fn set_snapshots(&mut self, snapshots: &Snapshots) -> NetworkResult<()> {
        self.snapshot_count = snapshots.len();
        Ok(())
    }

    fn add_carrier(&mut self, carrier: &Carrier) -> NetworkResult<()> {
        self.carriers.insert(carrier.name.clone());
        Ok(())
    }

    fn add(&mut self, class: ComponentClass, name: &str, attrs: Attributes) -> NetworkResult<()> {
        self.entries.push(Entry {
            class,
            name: name.to_string(),
            attrs,
        });
        Ok(())
    }

    fn consistency_check(&mut self) -> NetworkResult<()> {
        self.check_identities()?;
        self.check_references()?;
        self.check_series()?;
        self.check_connectivity()?;
        debug!(components = self.entries.len(), "graph consistency check passed");
        Ok(())
    }

    fn pf(&mut self) -> NetworkResult<PowerFlowOutcome> {
        Err(NetworkError::EngineRejected(
            "no power flow backend is attached to the graph engine".to_string(),
        ))
    }

    fn optimize(&mut self) -> NetworkResult<()> {
        Err(NetworkError::EngineRejected(
            "no optimization backend is attached to the graph engine".to_string(),
        ))
    }

    fn results(&self) -> &ResultTables {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttrValue::Text(v.to_string())))
            .collect()
    }

    fn two_bus_engine() -> GraphEngine {
        let mut engine = GraphEngine::new();
        engine.add(ComponentClass::Bus, "b1", Attributes::new()).unwrap();
        engine.add(ComponentClass::Bus, "b2", Attributes::new()).unwrap();
        engine
            .add(ComponentClass::Line, "L1", text(&[("bus0", "b1"), ("bus1", "b2")]))
            .unwrap();
        engine
    }

    #[test]
    fn test_connected_network_passes() {
        let mut engine = two_bus_engine();
        engine
            .add(ComponentClass::Generator, "G1", text(&[("bus", "b1")]))
            .unwrap();
        assert!(engine.consistency_check().is_ok());
        assert_eq!(engine.topology().islands().len(), 1);
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut engine = two_bus_engine();
        engine
            .add(ComponentClass::Load, "D1", text(&[("bus", "b9")]))
            .unwrap();
        let err = engine.consistency_check().unwrap_err();
        assert!(err.to_string().contains("b9"));
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let mut engine = two_bus_engine();
        engine.add(ComponentClass::Bus, "b1", Attributes::new()).unwrap();
        assert!(engine.consistency_check().is_err());
    }

    #[test]
    fn test_isolated_bus_rejected() {
        let mut engine = two_bus_engine();
        engine.add(ComponentClass::Bus, "b3", Attributes::new()).unwrap();
        let err = engine.consistency_check().unwrap_err();
        assert!(err.to_string().contains("b3"));
    }

    #[test]
    fn test_islands_only_warn() {
        let mut engine = two_bus_engine();
        engine.add(ComponentClass::Bus, "b3", Attributes::new()).unwrap();
        engine.add(ComponentClass::Bus, "b4", Attributes::new()).unwrap();
        engine
            .add(ComponentClass::Link, "K1", text(&[("bus0", "b3"), ("bus1", "b4")]))
            .unwrap();
        assert!(engine.consistency_check().is_ok());
        assert_eq!(engine.topology().islands().len(), 2);
    }

    #[test]
    fn test_series_must_span_snapshots() {
        let mut engine = two_bus_engine();
        let start = chrono::NaiveDate::from_ymd_opt(2024, 10, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        engine.set_snapshots(&Snapshots::hourly(start, 3).unwrap()).unwrap();
        let mut attrs = text(&[("bus", "b1")]);
        attrs.insert("p_set".into(), AttrValue::Series(vec![1.0, 2.0]));
        engine.add(ComponentClass::Load, "D1", attrs).unwrap();
        assert!(engine.consistency_check().is_err());
    }

    #[test]
    fn test_reset_and_no_solver() {
        let mut engine = two_bus_engine();
        engine.create_network();
        assert_eq!(engine.component_count(), 0);
        assert!(engine.pf().is_err());
        assert!(engine.optimize().is_err());
        assert!(engine.results().is_empty());
    }
}
