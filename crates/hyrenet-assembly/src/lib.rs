//! # hyrenet-assembly: network build pipeline
//!
//! Turns a configuration tree into a validated [`Network`](hyrenet_core::Network):
//!
//! - [`config`]: the YAML/JSON build configuration
//! - [`schema`] / [`assembler`]: per-class schemas and the single generic
//!   assembly procedure with row-over-spec overlay
//! - [`profiles`]: snapshot-aligned profile binding
//! - [`constraints`]: static and time-windowed constraint application
//! - [`validator`]: references, voltage levels and the engine check
//! - [`builder`]: stage orchestration with teardown on failure
//! - [`analysis`]: power flow and dispatch summaries from an engine
//!
//! ```no_run
//! use std::path::Path;
//! use hyrenet_assembly::NetworkBuilder;
//! use hyrenet_core::GraphEngine;
//!
//! let mut builder = NetworkBuilder::from_path(Path::new("build.yaml"))?;
//! let mut engine = GraphEngine::new();
//! let network = builder.setup_network(&mut engine)?;
//! println!("{} buses", network.buses.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod analysis;
pub mod assembler;
pub mod builder;
pub mod config;
pub mod constraints;
pub mod profiles;
pub mod schema;
pub mod validator;

pub use analysis::{AnalysisReport, Losses, NetworkAnalysis};
pub use assembler::{Assemble, AssemblyContext, ComponentAssembler};
pub use builder::NetworkBuilder;
pub use config::{BuildConfig, ProfileConfig, SnapshotConfig, DEFAULT_VOLTAGE_TOLERANCE_KV};
pub use constraints::{Constraint, ConstraintApplier, ConstraintSet, ConstraintTarget};
pub use profiles::ProfileBinder;
pub use schema::{ComponentSchema, Overlay};
pub use validator::TopologyValidator;
