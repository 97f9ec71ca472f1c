//! Build orchestration.
//!
//! [`NetworkBuilder::setup_network`] runs the stages in a fixed order and
//! stops at the first failure:
//!
//! 1. `Initialize`: snapshots and carriers
//! 2. `TechnologyLibraries`: load and validate every library
//! 3. `Assembly`: components in assembly order, then profile binding
//! 4. `Constraints`: static, then dynamic
//! 5. `Validation`: references, voltages, engine consistency check
//!
//! A failed build tears down everything it cached and resets the engine, so
//! no partially populated network survives it.

use std::path::Path;

use hyrenet_core::time::parse_timestamp;
use hyrenet_core::{
    BuildError, BuildStage, Bus, Carrier, ComponentClass, Diagnostics, Generator, Line, Link,
    Load, Network, NetworkError, NetworkResult, PowerNetworkEngine, Snapshots, StorageUnit,
    Transformer,
};
use hyrenet_io::{ConfigRepository, TechnologyLibraryResolver};
use tracing::{debug, error, info, warn};

use crate::assembler::{Assemble, ComponentAssembler};
use crate::config::BuildConfig;
use crate::constraints::ConstraintApplier;
use crate::profiles::ProfileBinder;
use crate::validator::TopologyValidator;

const SNAPSHOTS_FILE: &str = "snapshots.csv";
const CARRIERS_FILE: &str = "carriers.csv";

/// Owns every cache a build needs; one builder per data root.
#[derive(Debug)]
pub struct NetworkBuilder {
    config: BuildConfig,
    repo: ConfigRepository,
    libraries: TechnologyLibraryResolver,
    profiles: ProfileBinder,
    constraints: ConstraintApplier,
    diagnostics: Diagnostics,
}

fn at(stage: BuildStage) -> impl FnOnce(NetworkError) -> BuildError {
    move |error| BuildError::new(stage, error)
}

impl NetworkBuilder {
    pub fn new(config: BuildConfig) -> Self {
        let repo = ConfigRepository::new(config.data_root.clone());
        Self {
            config,
            repo,
            libraries: TechnologyLibraryResolver::new(),
            profiles: ProfileBinder::new(),
            constraints: ConstraintApplier::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Builder for a YAML or JSON build configuration file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(BuildConfig::from_path(path)?))
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Soft failures and warnings recorded by the last build
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Free-form notes shipped with the data root
    pub fn documentation(&mut self, name: &str) -> NetworkResult<String> {
        self.repo.load_documentation(name)
    }

    /// Build the network and validate it against `engine`.
    ///
    /// On success the engine holds the validated network and the caller owns
    /// the returned [`Network`]. On failure the engine is reset.
    pub fn setup_network(
        &mut self,
        engine: &mut dyn PowerNetworkEngine,
    ) -> Result<Network, BuildError> {
        self.diagnostics.clear();
        self.repo.clear_diagnostics();
        self.reset_caches();

        let result = self.build(engine);
        self.diagnostics.merge(self.repo.take_diagnostics());

        match result {
            Ok(network) => {
                if network.is_empty() {
                    warn!("network has no components");
                    self.diagnostics.stage_warning(
                        BuildStage::Assembly,
                        "network",
                        "network has no components",
                    );
                }
                info!(
                    components = network.stats().num_components(),
                    snapshots = network.snapshots.len(),
                    diagnostics = %self.diagnostics.summary(),
                    "Network was setup successfully"
                );
                Ok(network)
            }
            Err(err) => {
                error!(stage = %err.stage, error = %err.error, "network setup failed");
                self.teardown(engine);
                Err(err)
            }
        }
    }

    fn build(&mut self, engine: &mut dyn PowerNetworkEngine) -> Result<Network, BuildError> {
        let mut network = self.initialize().map_err(at(BuildStage::Initialize))?;
        self.libraries
            .resolve_all(&mut self.repo)
            .map_err(at(BuildStage::TechnologyLibraries))?;
        self.assemble(&mut network).map_err(at(BuildStage::Assembly))?;
        self.apply_constraints(&mut network)
            .map_err(at(BuildStage::Constraints))?;
        TopologyValidator::new(self.config.voltage_tolerance_kv)
            .validate(&network, engine)
            .map_err(at(BuildStage::Validation))?;
        Ok(network)
    }

    fn initialize(&mut self) -> NetworkResult<Network> {
        let snapshots = self.snapshots()?;
        let mut network = Network::new(snapshots);
        for carrier in self.carriers()? {
            network.add_carrier(carrier);
        }
        debug!(
            snapshots = network.snapshots.len(),
            carriers = network.carriers.len(),
            "network initialized"
        );
        Ok(network)
    }

    /// The configured horizon, unless `metadata/snapshots.csv` lists one.
    fn snapshots(&mut self) -> NetworkResult<Snapshots> {
        let configured = self.config.snapshots.build()?;
        let table = self.repo.load_metadata(SNAPSHOTS_FILE)?;
        if table.is_empty() {
            return Ok(configured);
        }
        if !table.has_column("snapshot") {
            return Err(NetworkError::InvalidConfig(format!(
                "{} has no 'snapshot' column",
                table.source()
            )));
        }

        let mut stamps = Vec::with_capacity(table.len());
        let mut weights = Vec::with_capacity(table.len());
        for row in table.rows() {
            let stamp = row
                .get_str("snapshot")
                .and_then(parse_timestamp)
                .ok_or_else(|| {
                    NetworkError::InvalidConfig(format!(
                        "{} line {}: unreadable snapshot",
                        table.source(),
                        row.line()
                    ))
                })?;
            let weight = row
                .get_f64("weight")
                .map_err(|cell| NetworkError::InvalidConfig(cell.to_string()))?
                .unwrap_or(1.0);
            stamps.push(stamp);
            weights.push(weight);
        }
        info!(count = stamps.len(), "snapshots taken from metadata");
        Snapshots::new(configured.name(), stamps)?.with_weights(weights)
    }

    /// Configured carriers, overridden or extended by `metadata/carriers.csv`.
    fn carriers(&mut self) -> NetworkResult<Vec<Carrier>> {
        let mut carriers = self.config.base_carriers();
        let table = self.repo.load_metadata(CARRIERS_FILE)?;
        for row in table.rows() {
            let name = row.get_str("name").ok_or_else(|| {
                NetworkError::InvalidConfig(format!("{} line {}: empty name", table.source(), row.line()))
            })?;
            let carrier = Carrier {
                name: name.to_string(),
                co2_emissions: row
                    .get_f64("co2_emissions")
                    .map_err(|cell| NetworkError::InvalidConfig(cell.to_string()))?
                    .unwrap_or(0.0),
                nice_name: row.get_str("nice_name").map(str::to_string),
                color: row.get_str("color").map(str::to_string),
            };
            carriers.retain(|existing| existing.name != carrier.name);
            carriers.push(carrier);
        }
        Ok(carriers)
    }

    fn assemble(&mut self, network: &mut Network) -> NetworkResult<()> {
        for class in ComponentClass::ASSEMBLY_ORDER {
            let added = match class {
                ComponentClass::Bus => self.assemble_class::<Bus>(network)?,
                ComponentClass::Transformer => self.assemble_class::<Transformer>(network)?,
                ComponentClass::Line => self.assemble_class::<Line>(network)?,
                ComponentClass::Generator => self.assemble_class::<Generator>(network)?,
                ComponentClass::StorageUnit => self.assemble_class::<StorageUnit>(network)?,
                ComponentClass::Link => self.assemble_class::<Link>(network)?,
                ComponentClass::Load => self.assemble_class::<Load>(network)?,
            };
            if added == 0 {
                self.diagnostics.stage_warning(
                    BuildStage::Assembly,
                    class.list_name(),
                    &format!("No {} were added to the network", class.list_name()),
                );
            }
        }
        self.profiles
            .bind_network(&mut self.repo, network, &self.config.profiles)?;
        Ok(())
    }

    fn assemble_class<C: Assemble>(&mut self, network: &mut Network) -> NetworkResult<usize> {
        let table = self.repo.load_component(C::SCHEMA.file)?;
        let library = C::SCHEMA
            .tech_class
            .and_then(|class| self.libraries.cached(class));
        ComponentAssembler::add_all::<C>(network, &table, library)
    }

    fn apply_constraints(&mut self, network: &mut Network) -> NetworkResult<()> {
        let set = self.constraints.load(&mut self.repo)?;
        let applied_static = self
            .constraints
            .apply_static(network, &set.static_constraints)?;
        let applied_dynamic = self
            .constraints
            .apply_dynamic(network, &set.dynamic_constraints)?;
        debug!(applied_static, applied_dynamic, "constraints applied");
        Ok(())
    }

    fn reset_caches(&mut self) {
        self.libraries.clear();
        self.profiles.clear();
        self.constraints.clear();
    }

    fn teardown(&mut self, engine: &mut dyn PowerNetworkEngine) {
        self.reset_caches();
        engine.create_network();
        debug!("build state torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyrenet_core::{ErrorKind, GraphEngine, Origin};
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, body: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_empty_root_builds_empty_network() {
        let dir = tempdir().unwrap();
        let mut builder = NetworkBuilder::new(BuildConfig::new(dir.path()));
        let mut engine = GraphEngine::new();

        let network = builder.setup_network(&mut engine).unwrap();
        assert!(network.is_empty());
        assert_eq!(network.snapshots.len(), 24);
        assert_eq!(network.carriers.len(), 8);
        assert!(builder.diagnostics().has_errors());
        let assembly = Origin::Stage(BuildStage::Assembly);
        assert_eq!(builder.diagnostics().issues_from(assembly).count(), 8);
    }

    #[test]
    fn test_metadata_overrides() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "metadata/snapshots.csv",
            "snapshot,weight\n2024-01-01 00:00:00,2\n2024-01-01 03:00:00,\n",
        );
        write(
            dir.path(),
            "metadata/carriers.csv",
            "name,co2_emissions,nice_name\nsolar,0,Solar PV\ngas,0.2,\n",
        );
        let mut builder = NetworkBuilder::new(BuildConfig::new(dir.path()));
        let network = builder.setup_network(&mut GraphEngine::new()).unwrap();

        assert_eq!(network.snapshots.len(), 2);
        assert_eq!(network.snapshots.weights(), &[2.0, 1.0]);
        assert_eq!(network.carriers.len(), 9);
        assert_eq!(network.carriers["gas"].co2_emissions, 0.2);
        assert_eq!(network.carriers["solar"].nice_name.as_deref(), Some("Solar PV"));
    }

    #[test]
    fn test_unordered_metadata_snapshots_fail_initialize() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "metadata/snapshots.csv",
            "snapshot\n2024-01-02 00:00:00\n2024-01-01 00:00:00\n",
        );
        let mut builder = NetworkBuilder::new(BuildConfig::new(dir.path()));
        let err = builder.setup_network(&mut GraphEngine::new()).unwrap_err();
        assert_eq!(err.stage, BuildStage::Initialize);
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_documentation_is_optional() {
        let dir = tempdir().unwrap();
        write(dir.path(), "documentation/README.md", "Hybrid grid, 20 kV\n");
        let mut builder = NetworkBuilder::new(BuildConfig::new(dir.path()));
        assert!(builder.documentation("README.md").unwrap().contains("20 kV"));
        assert!(builder.documentation("missing.md").unwrap().is_empty());
        assert!(builder.documentation("../secrets.md").is_err());
    }
}
