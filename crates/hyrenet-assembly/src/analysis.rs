//! Post-build analysis on top of an engine.
//!
//! [`NetworkAnalysis::analyze`] drives an engine through consistency check,
//! power flow and optimization, then summarizes the engine's result tables.
//! Tables an engine does not report are treated as zero and logged.

use hyrenet_core::{
    BuildError, BuildStage, ComponentClass, Network, NetworkResult, PowerFlowOutcome,
    PowerNetworkEngine, ResultTable, ResultTables,
};
use serde::Serialize;
use tracing::{info, warn};

/// Energy lost on branches, summed over components and snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Losses {
    pub lines: f64,
    pub transformers: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub power_flow: Option<PowerFlowOutcome>,
    pub bus_voltages: ResultTable,
    pub line_flows: ResultTable,
    pub generator_dispatch: ResultTable,
    pub storage_dispatch: ResultTable,
    pub state_of_charge: ResultTable,
    pub marginal_prices: ResultTable,
    /// `Σ (p_set − p)` over loads and snapshots
    pub unmet_demand: f64,
    /// `Σ_load (max p_set − min p_set)`
    pub load_shift_potential: f64,
    pub losses: Losses,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Default)]
pub struct NetworkAnalysis;

impl NetworkAnalysis {
    /// Run the engine over `network` and summarize the results.
    pub fn analyze(
        network: &Network,
        engine: &mut dyn PowerNetworkEngine,
    ) -> Result<AnalysisReport, BuildError> {
        Self::run(network, engine).map_err(|error| {
            warn!(%error, "network analysis failed");
            BuildError::new(BuildStage::Analysis, error)
        })
    }

    fn run(network: &Network, engine: &mut dyn PowerNetworkEngine) -> NetworkResult<AnalysisReport> {
        info!("starting network analysis");
        network.hand_off(engine)?;
        engine.consistency_check()?;

        let outcome = engine.pf()?;
        if !outcome.converged {
            warn!(iterations = outcome.iterations, "power flow did not converge");
        }
        engine.optimize()?;

        let results = engine.results();
        let report = AnalysisReport {
            power_flow: Some(outcome),
            bus_voltages: table(results, ComponentClass::Bus, "v_mag_pu"),
            line_flows: table(results, ComponentClass::Line, "p0"),
            generator_dispatch: table(results, ComponentClass::Generator, "p"),
            storage_dispatch: table(results, ComponentClass::StorageUnit, "p"),
            state_of_charge: table(results, ComponentClass::StorageUnit, "state_of_charge"),
            marginal_prices: table(results, ComponentClass::Bus, "marginal_price"),
            unmet_demand: unmet_demand(network, results),
            load_shift_potential: load_shift_potential(network),
            losses: losses(results),
        };
        info!(
            unmet_demand = report.unmet_demand,
            load_shift_potential = report.load_shift_potential,
            total_losses = report.losses.total,
            "network analysis completed"
        );
        Ok(report)
    }
}

fn table(results: &ResultTables, class: ComponentClass, attribute: &str) -> ResultTable {
    match results.get(class, attribute) {
        Some(table) => table.clone(),
        None => {
            warn!(%class, attribute, "engine reported no results");
            ResultTable::new()
        }
    }
}

fn unmet_demand(network: &Network, results: &ResultTables) -> f64 {
    let served = results.get(ComponentClass::Load, "p");
    if served.is_none() && !network.loads.is_empty() {
        warn!("engine reported no load dispatch, counting it as zero");
    }
    network
        .loads
        .values()
        .map(|load| {
            let p = served.and_then(|t| t.get(&load.name));
            load.p_set()
                .iter()
                .enumerate()
                .map(|(t, p_set)| p_set - p.and_then(|p| p.get(t)).copied().unwrap_or(0.0))
                .sum::<f64>()
        })
        .sum()
}

fn load_shift_potential(network: &Network) -> f64 {
    network
        .loads
        .values()
        .filter(|load| !load.p_set().is_empty())
        .map(|load| {
            let p_set = load.p_set();
            let max = p_set.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = p_set.iter().copied().fold(f64::INFINITY, f64::min);
            max - min
        })
        .sum()
}

/// `p0 + p1` per branch and snapshot; `p1` is reported entering at `bus1`.
fn branch_losses(results: &ResultTables, class: ComponentClass) -> f64 {
    let (Some(p0), Some(p1)) = (results.get(class, "p0"), results.get(class, "p1")) else {
        warn!(%class, "engine reported no branch flows, counting losses as zero");
        return 0.0;
    };
    p0.iter()
        .filter_map(|(name, sending)| p1.get(name).map(|receiving| (sending, receiving)))
        .flat_map(|(sending, receiving)| sending.iter().zip(receiving).map(|(a, b)| a + b))
        .sum()
}

fn losses(results: &ResultTables) -> Losses {
    let lines = branch_losses(results, ComponentClass::Line);
    let transformers = branch_losses(results, ComponentClass::Transformer);
    Losses {
        lines,
        transformers,
        total: lines + transformers,
    }
}
