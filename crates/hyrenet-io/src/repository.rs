//! Allow-listed access to the configuration tree.
//!
//! ```text
//! <data root>/
//!   components/      buses.csv lines.csv ... component_constraints.csv
//!   tech_libraries/  storage_tech_library.csv ... line_types.csv
//!   constraints/     global_constraints.csv ... constraint_profiles.csv
//!   profiles/<profile_type>/<profile_id>.csv
//!   metadata/        carriers.csv snapshots.csv
//!   documentation/   free-form notes
//! ```
//!
//! Two failure tiers: a name outside the allow-list is a hard
//! [`NetworkError::DisallowedSource`]; a listed file that is missing, empty,
//! unreadable or malformed yields an empty result, an `error!` log line and
//! a `source` diagnostic.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use hyrenet_core::time::{parse_timestamp, DEFAULT_INDEX_NAME};
use hyrenet_core::{Diagnostics, NetworkError, NetworkResult, TimeSeries};
use serde::Deserialize;
use tracing::{debug, error};

use crate::path_security::{PathGuard, PathSecurityError};
use crate::profile::ProfileTable;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Components,
    TechLibraries,
    Constraints,
    Profiles,
    Metadata,
}

impl Category {
    pub fn dir(&self) -> &'static str {
        match self {
            Category::Components => "components",
            Category::TechLibraries => "tech_libraries",
            Category::Constraints => "constraints",
            Category::Profiles => "profiles",
            Category::Metadata => "metadata",
        }
    }

    /// File names `load` accepts for this category
    pub fn allowed(&self) -> &'static [&'static str] {
        match self {
            Category::Components => &[
                "buses.csv",
                "lines.csv",
                "transformers.csv",
                "generators.csv",
                "storage_units.csv",
                "links.csv",
                "loads.csv",
                "component_constraints.csv",
            ],
            Category::TechLibraries => &[
                "storage_tech_library.csv",
                "transformer_tech_library.csv",
                "generator_tech_library.csv",
                "line_types.csv",
            ],
            Category::Constraints => &[
                "global_constraints.csv",
                "node_constraints.csv",
                "branch_constraints.csv",
                "dynamic_constraints.csv",
                "constraint_profiles.csv",
            ],
            // profiles are only reachable through `load_profile`
            Category::Profiles => &[],
            Category::Metadata => &["carriers.csv", "snapshots.csv"],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir())
    }
}

/// Sub-directories of `profiles/`
pub const PROFILE_TYPES: &[&str] = &[
    "load_profiles",
    "generator_profiles",
    "storage_profiles",
    "grid_profiles",
];

const DOCUMENTATION_DIR: &str = "documentation";

#[derive(Debug, Deserialize)]
struct ConstraintProfileRecord {
    constraint_id: String,
    time: String,
    value: f64,
}

/// Reads configuration files below one data root.
#[derive(Debug)]
pub struct ConfigRepository {
    root: PathBuf,
    guard: PathGuard,
    diagnostics: Diagnostics,
}

impl ConfigRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            guard: PathGuard::new(root.clone()),
            root,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Use a custom guard (size limits, extensions) for the same root
    pub fn with_guard(mut self, guard: PathGuard) -> Self {
        self.root = guard.root().to_path_buf();
        self.guard = guard;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Soft failures recorded so far
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        self.diagnostics.take()
    }

    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }

    /// Load one allow-listed table.
    pub fn load(&mut self, category: Category, name: &str) -> NetworkResult<Table> {
        if !category.allowed().contains(&name) {
            return Err(NetworkError::DisallowedSource {
                category: category.to_string(),
                name: name.to_string(),
            });
        }
        let relative = Path::new(category.dir()).join(name);
        self.read_table(&relative)
    }

    pub fn load_component(&mut self, name: &str) -> NetworkResult<Table> {
        self.load(Category::Components, name)
    }

    pub fn load_tech_library(&mut self, name: &str) -> NetworkResult<Table> {
        self.load(Category::TechLibraries, name)
    }

    pub fn load_constraint(&mut self, name: &str) -> NetworkResult<Table> {
        self.load(Category::Constraints, name)
    }

    pub fn load_metadata(&mut self, name: &str) -> NetworkResult<Table> {
        self.load(Category::Metadata, name)
    }

    /// Load `profiles/<profile_type>/<profile_id>.csv`.
    pub fn load_profile(&mut self, profile_type: &str, profile_id: &str) -> NetworkResult<ProfileTable> {
        if !PROFILE_TYPES.contains(&profile_type) {
            return Err(NetworkError::DisallowedSource {
                category: Category::Profiles.to_string(),
                name: profile_type.to_string(),
            });
        }
        let file_name = format!("{}.csv", profile_id);
        self.guard
            .check_name(&file_name)
            .map_err(|_| NetworkError::DisallowedSource {
                category: format!("{}/{}", Category::Profiles, profile_type),
                name: profile_id.to_string(),
            })?;

        let relative = Path::new(Category::Profiles.dir())
            .join(profile_type)
            .join(file_name);
        let table = self.read_table(&relative)?;
        if table.headers().is_empty() {
            return Ok(ProfileTable::empty());
        }
        match ProfileTable::from_table(&table) {
            Ok(profile) => Ok(profile),
            Err(reason) => {
                self.soft_failure(&relative, &reason);
                Ok(ProfileTable::empty())
            }
        }
    }

    /// `constraints/constraint_profiles.csv` grouped per `constraint_id`, rows in file order.
    pub fn load_constraint_profiles(&mut self) -> NetworkResult<BTreeMap<String, TimeSeries>> {
        let relative = Path::new(Category::Constraints.dir()).join("constraint_profiles.csv");
        let Some(file) = self.open_source(&relative)? else {
            return Ok(BTreeMap::new());
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let mut grouped: BTreeMap<String, TimeSeries> = BTreeMap::new();
        for (i, result) in rdr.deserialize::<ConstraintProfileRecord>().enumerate() {
            let parsed = result.map_err(|e| e.to_string()).and_then(|record| {
                parse_timestamp(&record.time)
                    .map(|stamp| (record, stamp))
                    .ok_or_else(|| format!("line {}: unreadable timestamp", i + 2))
            });
            let (record, stamp) = match parsed {
                Ok(parsed) => parsed,
                Err(reason) => {
                    self.soft_failure(&relative, &reason);
                    return Ok(BTreeMap::new());
                }
            };
            let series = grouped
                .entry(record.constraint_id)
                .or_insert_with(|| TimeSeries::new(DEFAULT_INDEX_NAME, Vec::new(), Vec::new()));
            series.index.push(stamp);
            series.values.push(record.value);
        }
        debug!(profiles = grouped.len(), "loaded constraint profiles");
        Ok(grouped)
    }

    /// Plain-text notes under `documentation/`; empty when unavailable.
    pub fn load_documentation(&mut self, name: &str) -> NetworkResult<String> {
        self.guard
            .check_name(name)
            .map_err(|_| NetworkError::DisallowedSource {
                category: DOCUMENTATION_DIR.to_string(),
                name: name.to_string(),
            })?;
        let relative = Path::new(DOCUMENTATION_DIR).join(name);
        let secure = match self.guard.resolve(&relative) {
            Ok(secure) => secure,
            Err(err) => return self.guard_failure::<()>(&relative, err).map(|_| String::new()),
        };
        match secure.read_to_string() {
            Ok(text) => Ok(text),
            Err(err) => {
                self.soft_failure(&relative, &err.to_string());
                Ok(String::new())
            }
        }
    }

    fn read_table(&mut self, relative: &Path) -> NetworkResult<Table> {
        let Some(file) = self.open_source(relative)? else {
            return Ok(Table::empty());
        };
        match Table::from_reader(relative.display().to_string(), file) {
            Ok(table) if table.headers().is_empty() => {
                self.soft_failure(relative, "file is empty");
                Ok(Table::empty())
            }
            Ok(table) => {
                debug!(path = %relative.display(), rows = table.len(), "loaded table");
                Ok(table)
            }
            Err(err) => {
                self.soft_failure(relative, &err.to_string());
                Ok(Table::empty())
            }
        }
    }

    /// `Ok(None)` when the source is unavailable (already recorded).
    fn open_source(&mut self, relative: &Path) -> NetworkResult<Option<std::fs::File>> {
        let secure = match self.guard.resolve(relative) {
            Ok(secure) => secure,
            Err(err) => return self.guard_failure(relative, err),
        };
        if secure.size() == 0 {
            self.soft_failure(relative, "file is empty");
            return Ok(None);
        }
        match secure.open() {
            Ok(file) => Ok(Some(file)),
            Err(err) => {
                self.soft_failure(relative, &err.to_string());
                Ok(None)
            }
        }
    }

    fn guard_failure<T>(&mut self, relative: &Path, err: PathSecurityError) -> NetworkResult<Option<T>> {
        match err {
            PathSecurityError::EscapedDataRoot { .. } | PathSecurityError::InvalidName(_) => {
                Err(NetworkError::DisallowedSource {
                    category: relative
                        .parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    name: relative
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                })
            }
            other => {
                self.soft_failure(relative, &other.to_string());
                Ok(None)
            }
        }
    }

    fn soft_failure(&mut self, relative: &Path, reason: &str) {
        let err = NetworkError::SourceUnavailable {
            path: relative.display().to_string(),
            reason: reason.to_string(),
        };
        error!("{}", err);
        self.diagnostics
            .source_error(&relative.display().to_string(), reason);
    }
}
