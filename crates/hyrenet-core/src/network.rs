//! The network aggregate.
//!
//! A [`Network`] owns the snapshot index, the carriers and one name-keyed
//! collection per component class. Collections are `BTreeMap`s so iteration
//! order (and therefore engine hand-off and serialization) is deterministic,
//! which is what makes two builds of the same configuration compare equal.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::components::{
    Bus, Carrier, Component, ComponentClass, Generator, Line, Link, Load, StorageUnit, Transformer,
};
use crate::engine::PowerNetworkEngine;
use crate::error::{NetworkError, NetworkResult};
use crate::time::Snapshots;
use crate::units::{MegawattHours, Megawatts};

/// Name-keyed components of one class
pub type Collection<T> = BTreeMap<String, T>;

/// A component type that has a collection in [`Network`].
pub trait NetworkMember: Component {
    fn collection(network: &Network) -> &Collection<Self>;
    fn collection_mut(network: &mut Network) -> &mut Collection<Self>;
}

macro_rules! impl_network_member {
    ($type:ty, $field:ident) => {
        impl NetworkMember for $type {
            fn collection(network: &Network) -> &Collection<Self> {
                &network.$field
            }

            fn collection_mut(network: &mut Network) -> &mut Collection<Self> {
                &mut network.$field
            }
        }
    };
}

/// One bus reference held by a non-bus component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusReference<'a> {
    pub class: ComponentClass,
    pub component: &'a str,
    /// `bus`, `bus0` or `bus1`
    pub column: &'static str,
    pub bus: &'a str,
}

/// Summary statistics about a network
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_transformers: usize,
    pub num_lines: usize,
    pub num_generators: usize,
    pub num_storage_units: usize,
    pub num_links: usize,
    pub num_loads: usize,
    pub num_snapshots: usize,
    pub total_generation_capacity: Megawatts,
    pub total_storage_energy: MegawattHours,
    /// Sum over loads of each load's highest scaled demand
    pub peak_load: Megawatts,
}

impl NetworkStats {
    pub fn num_components(&self) -> usize {
        self.num_buses
            + self.num_transformers
            + self.num_lines
            + self.num_generators
            + self.num_storage_units
            + self.num_links
            + self.num_loads
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Network {
    pub snapshots: Snapshots,
    pub carriers: BTreeMap<String, Carrier>,
    pub buses: Collection<Bus>,
    pub transformers: Collection<Transformer>,
    pub lines: Collection<Line>,
    pub generators: Collection<Generator>,
    pub storage_units: Collection<StorageUnit>,
    pub links: Collection<Link>,
    pub loads: Collection<Load>,
}

impl_network_member!(Bus, buses);
impl_network_member!(Transformer, transformers);
impl_network_member!(Line, lines);
impl_network_member!(Generator, generators);
impl_network_member!(StorageUnit, storage_units);
impl_network_member!(Link, links);
impl_network_member!(Load, loads);

impl Network {
    pub fn new(snapshots: Snapshots) -> Self {
        Self {
            snapshots,
            ..Self::default()
        }
    }

    /// Insert or replace a carrier
    pub fn add_carrier(&mut self, carrier: Carrier) {
        self.carriers.insert(carrier.name.clone(), carrier);
    }

    /// Insert a component, refusing a second one with the same name in its class.
    pub fn register<C: NetworkMember>(&mut self, component: C) -> NetworkResult<()> {
        let collection = C::collection_mut(self);
        if collection.contains_key(component.name()) {
            return Err(NetworkError::DuplicateComponent {
                class: C::CLASS,
                name: component.name().to_string(),
            });
        }
        collection.insert(component.name().to_string(), component);
        Ok(())
    }

    pub fn get<C: NetworkMember>(&self, name: &str) -> Option<&C> {
        C::collection(self).get(name)
    }

    pub fn get_mut<C: NetworkMember>(&mut self, name: &str) -> Option<&mut C> {
        C::collection_mut(self).get_mut(name)
    }

    pub fn bus(&self, name: &str) -> Option<&Bus> {
        self.buses.get(name)
    }

    pub fn contains(&self, class: ComponentClass, name: &str) -> bool {
        match class {
            ComponentClass::Bus => self.buses.contains_key(name),
            ComponentClass::Transformer => self.transformers.contains_key(name),
            ComponentClass::Line => self.lines.contains_key(name),
            ComponentClass::Generator => self.generators.contains_key(name),
            ComponentClass::StorageUnit => self.storage_units.contains_key(name),
            ComponentClass::Link => self.links.contains_key(name),
            ComponentClass::Load => self.loads.contains_key(name),
        }
    }

    pub fn count(&self, class: ComponentClass) -> usize {
        match class {
            ComponentClass::Bus => self.buses.len(),
            ComponentClass::Transformer => self.transformers.len(),
            ComponentClass::Line => self.lines.len(),
            ComponentClass::Generator => self.generators.len(),
            ComponentClass::StorageUnit => self.storage_units.len(),
            ComponentClass::Link => self.links.len(),
            ComponentClass::Load => self.loads.len(),
        }
    }

    /// True when no component of any class has been registered
    pub fn is_empty(&self) -> bool {
        ComponentClass::ASSEMBLY_ORDER
            .iter()
            .all(|class| self.count(*class) == 0)
    }

    /// Every bus reference held by transformers, lines, generators, storage, links and loads.
    pub fn bus_references(&self) -> Vec<BusReference<'_>> {
        let mut refs = Vec::new();
        collect_refs(&self.transformers, &mut refs);
        collect_refs(&self.lines, &mut refs);
        collect_refs(&self.generators, &mut refs);
        collect_refs(&self.storage_units, &mut refs);
        collect_refs(&self.links, &mut refs);
        collect_refs(&self.loads, &mut refs);
        refs
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            num_buses: self.buses.len(),
            num_transformers: self.transformers.len(),
            num_lines: self.lines.len(),
            num_generators: self.generators.len(),
            num_storage_units: self.storage_units.len(),
            num_links: self.links.len(),
            num_loads: self.loads.len(),
            num_snapshots: self.snapshots.len(),
            total_generation_capacity: self.generators.values().map(|g| g.p_nom).sum(),
            total_storage_energy: self
                .storage_units
                .values()
                .map(StorageUnit::energy_capacity)
                .sum(),
            peak_load: self.loads.values().map(Load::peak_demand).sum(),
        }
    }

    /// Push the whole network into an engine, replacing whatever it held.
    pub fn hand_off(&self, engine: &mut dyn PowerNetworkEngine) -> NetworkResult<()> {
        engine.create_network();
        engine.set_snapshots(&self.snapshots)?;
        for carrier in self.carriers.values() {
            engine.add_carrier(carrier)?;
        }
        push_all(engine, &self.buses)?;
        push_all(engine, &self.transformers)?;
        push_all(engine, &self.lines)?;
        push_all(engine, &self.generators)?;
        push_all(engine, &self.storage_units)?;
        push_all(engine, &self.links)?;
        push_all(engine, &self.loads)?;
        debug!(
            components = self.stats().num_components(),
            snapshots = self.snapshots.len(),
            "network handed to engine"
        );
        Ok(())
    }
}

fn collect_refs<'a, C: Component>(collection: &'a Collection<C>, refs: &mut Vec<BusReference<'a>>) {
    for component in collection.values() {
        for (column, bus) in component.bus_refs() {
            refs.push(BusReference {
                class: C::CLASS,
                component: component.name(),
                column,
                bus,
            });
        }
    }
}

fn push_all<C: Component>(
    engine: &mut dyn PowerNetworkEngine,
    collection: &Collection<C>,
) -> NetworkResult<()> {
    for (name, component) in collection {
        engine.add(C::CLASS, name, component.to_attributes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Kilovolts;

    fn bus(name: &str) -> Bus {
        Bus {
            name: name.into(),
            v_nom: Kilovolts(20.0),
            ..Bus::default()
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut net = Network::default();
        net.register(bus("b1")).unwrap();
        let err = net.register(bus("b1")).unwrap_err();
        assert_eq!(
            err,
            NetworkError::DuplicateComponent {
                class: ComponentClass::Bus,
                name: "b1".into()
            }
        );
        assert_eq!(net.buses.len(), 1);
    }

    #[test]
    fn test_bus_references_cover_branch_ends() {
        let mut net = Network::default();
        net.register(bus("b1")).unwrap();
        net.register(bus("b2")).unwrap();
        net.register(Line {
            name: "L1".into(),
            bus0: "b1".into(),
            bus1: "b2".into(),
            ..Line::default()
        })
        .unwrap();
        net.register(Generator {
            name: "G1".into(),
            bus: "b1".into(),
            ..Generator::default()
        })
        .unwrap();

        let refs = net.bus_references();
        assert_eq!(refs.len(), 3);
        assert!(refs
            .iter()
            .any(|r| r.class == ComponentClass::Line && r.column == "bus1" && r.bus == "b2"));
        assert!(net.contains(ComponentClass::Generator, "G1"));
        assert!(!net.contains(ComponentClass::Load, "G1"));
    }

    #[test]
    fn test_stats() {
        let mut net = Network::default();
        assert!(net.is_empty());
        net.register(bus("b1")).unwrap();
        net.register(Generator {
            name: "G1".into(),
            bus: "b1".into(),
            p_nom: Megawatts(50.0),
            ..Generator::default()
        })
        .unwrap();
        net.register(StorageUnit {
            name: "S1".into(),
            bus: "b1".into(),
            p_nom: Megawatts(10.0),
            max_hours: 4.0,
            ..StorageUnit::default()
        })
        .unwrap();
        let mut load = Load {
            name: "D1".into(),
            bus: "b1".into(),
            scaling_factor: 2.0,
            ..Load::default()
        };
        load.series.insert("p_set".into(), vec![3.0, 7.0, 5.0]);
        net.register(load).unwrap();

        let stats = net.stats();
        assert!(!net.is_empty());
        assert_eq!(stats.num_components(), 4);
        assert_eq!(stats.total_generation_capacity, Megawatts(50.0));
        assert_eq!(stats.total_storage_energy, MegawattHours(40.0));
        assert_eq!(stats.peak_load, Megawatts(14.0));
    }
}
