//! Fail-fast topology validation.

use hyrenet_core::units::Kilovolts;
use hyrenet_core::{
    Component, ComponentClass, Network, NetworkError, NetworkResult, PowerNetworkEngine,
};
use tracing::{debug, info};

use crate::config::DEFAULT_VOLTAGE_TOLERANCE_KV;

/// Checks a built network before it is accepted.
///
/// Runs referential integrity, then voltage consistency of every branch,
/// then the engine's own consistency check. The first failure is returned.
#[derive(Debug, Clone, Copy)]
pub struct TopologyValidator {
    tolerance_kv: f64,
}

impl Default for TopologyValidator {
    fn default() -> Self {
        Self::new(DEFAULT_VOLTAGE_TOLERANCE_KV)
    }
}

impl TopologyValidator {
    pub fn new(tolerance_kv: f64) -> Self {
        Self { tolerance_kv }
    }

    pub fn tolerance_kv(&self) -> f64 {
        self.tolerance_kv
    }

    pub fn validate(
        &self,
        network: &Network,
        engine: &mut dyn PowerNetworkEngine,
    ) -> NetworkResult<()> {
        self.check_references(network)?;
        self.check_voltages(network)?;
        network.hand_off(engine)?;
        engine.consistency_check()?;
        info!(
            buses = network.buses.len(),
            branches = network.lines.len() + network.transformers.len(),
            "topology validated"
        );
        Ok(())
    }

    /// Every bus reference must resolve to a registered bus.
    pub fn check_references(&self, network: &Network) -> NetworkResult<()> {
        for reference in network.bus_references() {
            if network.bus(reference.bus).is_none() {
                return Err(NetworkError::MissingBusReference {
                    class: reference.class,
                    component: reference.component.to_string(),
                    bus: reference.bus.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Both ends of a line or transformer must share a nominal voltage, and a
    /// transformer's rated voltages must match the buses it connects.
    pub fn check_voltages(&self, network: &Network) -> NetworkResult<()> {
        for line in network.lines.values() {
            let (v0, v1) = self.endpoint_voltages(network, line)?;
            self.compare(ComponentClass::Line, &line.name, "bus0", v0, "bus1", v1)?;
        }
        for transformer in network.transformers.values() {
            let (v0, v1) = self.endpoint_voltages(network, transformer)?;
            self.compare(
                ComponentClass::Transformer,
                &transformer.name,
                "bus0",
                v0,
                "bus1",
                v1,
            )?;
            if let Some(rated) = transformer.v_nom_0 {
                self.compare(ComponentClass::Transformer, &transformer.name, "bus0", v0, "v_nom_0", rated)?;
            }
            if let Some(rated) = transformer.v_nom_1 {
                self.compare(ComponentClass::Transformer, &transformer.name, "bus1", v1, "v_nom_1", rated)?;
            }
        }
        debug!(tolerance_kv = self.tolerance_kv, "voltage levels consistent");
        Ok(())
    }

    fn endpoint_voltages<C: Component>(
        &self,
        network: &Network,
        branch: &C,
    ) -> NetworkResult<(Kilovolts, Kilovolts)> {
        let mut voltages = branch.bus_refs().into_iter().map(|(_, bus)| {
            network
                .bus(bus)
                .map(|b| b.v_nom)
                .ok_or_else(|| NetworkError::MissingBusReference {
                    class: C::CLASS,
                    component: branch.name().to_string(),
                    bus: bus.to_string(),
                })
        });
        match (voltages.next(), voltages.next()) {
            (Some(v0), Some(v1)) => Ok((v0?, v1?)),
            _ => Err(NetworkError::InvalidComponentData {
                class: C::CLASS,
                entity: branch.name().to_string(),
                detail: "branch without two bus ends".to_string(),
            }),
        }
    }

    fn compare(
        &self,
        class: ComponentClass,
        component: &str,
        left: &str,
        v_left: Kilovolts,
        right: &str,
        v_right: Kilovolts,
    ) -> NetworkResult<()> {
        if v_left.within(v_right, self.tolerance_kv) {
            return Ok(());
        }
        Err(NetworkError::VoltageMismatch {
            class,
            component: component.to_string(),
            detail: format!("{} at {} but {} at {}", left, v_left, right, v_right),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyrenet_core::{Bus, ErrorKind, GraphEngine, Line, Load, Transformer};

    fn bus(name: &str, kv: f64) -> Bus {
        Bus {
            name: name.into(),
            v_nom: Kilovolts(kv),
            ..Bus::default()
        }
    }

    fn network() -> Network {
        let mut net = Network::default();
        net.register(bus("hv", 110.0)).unwrap();
        net.register(bus("mv", 20.0)).unwrap();
        net.register(bus("mv2", 20.0)).unwrap();
        net.register(Transformer {
            name: "T1".into(),
            bus0: "hv".into(),
            bus1: "mv".into(),
            v_nom_0: Some(Kilovolts(110.0)),
            v_nom_1: Some(Kilovolts(20.0)),
            ..Transformer::default()
        })
        .unwrap();
        net.register(Line {
            name: "L1".into(),
            bus0: "mv".into(),
            bus1: "mv2".into(),
            ..Line::default()
        })
        .unwrap();
        net
    }

    #[test]
    fn test_consistent_network_passes() {
        let net = network();
        let mut engine = GraphEngine::new();
        TopologyValidator::default().validate(&net, &mut engine).unwrap();
        assert_eq!(engine.component_count(), 5);
    }

    #[test]
    fn test_line_across_voltage_levels() {
        let mut net = network();
        net.register(Line {
            name: "L2".into(),
            bus0: "hv".into(),
            bus1: "mv2".into(),
            ..Line::default()
        })
        .unwrap();
        let err = TopologyValidator::default().check_voltages(&net).unwrap_err();
        assert_eq!(
            err,
            NetworkError::VoltageMismatch {
                class: ComponentClass::Line,
                component: "L2".into(),
                detail: "bus0 at 110.0000 kV but bus1 at 20.0000 kV".into(),
            }
        );
    }

    #[test]
    fn test_transformer_rating_checked() {
        let mut net = network();
        if let Some(tx) = net.transformers.get_mut("T1") {
            tx.bus1 = "hv".into();
        }
        let err = TopologyValidator::default().check_voltages(&net).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VoltageMismatch);

        let mut net = network();
        if let Some(tx) = net.transformers.get_mut("T1") {
            tx.v_nom_1 = Some(Kilovolts(20.5));
        }
        assert!(TopologyValidator::default().check_voltages(&net).is_err());
        assert!(TopologyValidator::new(1.0).check_voltages(&net).is_ok());
    }

    #[test]
    fn test_dangling_reference() {
        let mut net = network();
        net.loads.insert(
            "D1".into(),
            Load {
                name: "D1".into(),
                bus: "lv".into(),
                ..Load::default()
            },
        );
        let err = TopologyValidator::default().check_references(&net).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingBusReference);
    }

    #[test]
    fn test_engine_rejection_surfaces() {
        let mut net = network();
        net.register(bus("island", 20.0)).unwrap();
        let mut engine = GraphEngine::new();
        let err = TopologyValidator::default().validate(&net, &mut engine).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineRejected);
    }
}
