//! # hyrenet-core: network data model
//!
//! The types every other hyrenet crate shares:
//!
//! - [`Network`]: the aggregate a build produces (snapshots, carriers and one
//!   name-keyed collection per component class)
//! - [`components`]: typed records for buses, lines, transformers,
//!   generators, storage units, links and loads
//! - [`Snapshots`] / [`TimeSeries`]: the analysis horizon and the profiles
//!   aligned to it
//! - [`NetworkError`] / [`BuildError`]: the error taxonomy
//! - [`Diagnostics`]: soft failures that did not stop a build
//! - [`PowerNetworkEngine`]: the collaborator a finished network is handed
//!   to, with [`GraphEngine`] as a structural reference implementation
//!
//! ## Quick Start
//!
//! ```
//! use hyrenet_core::*;
//!
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 10, 1)
//!     .and_then(|d| d.and_hms_opt(0, 0, 0))
//!     .unwrap();
//! let mut network = Network::new(Snapshots::hourly(start, 24).unwrap());
//!
//! for name in ["north", "south"] {
//!     network
//!         .register(Bus {
//!             name: name.to_string(),
//!             v_nom: Kilovolts(110.0),
//!             ..Bus::default()
//!         })
//!         .unwrap();
//! }
//! network
//!     .register(Line {
//!         name: "north-south".to_string(),
//!         bus0: "north".to_string(),
//!         bus1: "south".to_string(),
//!         ..Line::default()
//!     })
//!     .unwrap();
//!
//! let mut engine = GraphEngine::new();
//! network.hand_off(&mut engine).unwrap();
//! assert!(engine.consistency_check().is_ok());
//! ```

pub mod components;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod graph_engine;
pub mod network;
pub mod time;
pub mod units;

pub use components::{
    AttrValue, Attributes, Bus, Carrier, Component, ComponentClass, Generator, Line, Link, Load,
    SeriesMap, StorageUnit, Transformer,
};
pub use diagnostics::{Diagnostics, Issue, Origin, Severity};
pub use engine::{PowerFlowOutcome, PowerNetworkEngine, ResultTable, ResultTables};
pub use error::{BuildError, BuildStage, ErrorKind, IndexMismatch, NetworkError, NetworkResult};
pub use graph_engine::GraphEngine;
pub use network::{BusReference, Collection, Network, NetworkMember, NetworkStats};
pub use time::{Snapshots, TimeSeries};
pub use units::{Kilovolts, MegavoltAmperes, MegawattHours, Megawatts, Ohms};
