//! Technology libraries: shared parameter sets keyed by `type`.
//!
//! A library is validated once when it is loaded (required columns present
//! and numeric, `type` keys unique) and then cached per class until the
//! resolver is cleared. An absent library is a soft failure and resolves to
//! an empty one, so the first component that names a type fails instead.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use hyrenet_core::{ComponentClass, NetworkError, NetworkResult};
use tracing::{debug, warn};

use crate::repository::ConfigRepository;
use crate::table::{Row, Table};

/// One library row; cells are read through the overlay.
pub type TechnologySpec = Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TechClass {
    Storage,
    Transformer,
    Generator,
    LineType,
}

impl TechClass {
    pub const ALL: [TechClass; 4] = [
        TechClass::Storage,
        TechClass::Transformer,
        TechClass::Generator,
        TechClass::LineType,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            TechClass::Storage => "storage_tech_library.csv",
            TechClass::Transformer => "transformer_tech_library.csv",
            TechClass::Generator => "generator_tech_library.csv",
            TechClass::LineType => "line_types.csv",
        }
    }

    /// Numeric columns every row must carry, besides `type`
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            TechClass::Storage => &["round_trip_efficiency", "cycle_life"],
            TechClass::Transformer => &["s_nom", "x"],
            TechClass::Generator => &["efficiency"],
            TechClass::LineType => &["r_per_length", "x_per_length"],
        }
    }

    /// Library a component class draws its `type` from, if any
    pub fn for_component(class: ComponentClass) -> Option<TechClass> {
        match class {
            ComponentClass::StorageUnit => Some(TechClass::Storage),
            ComponentClass::Transformer => Some(TechClass::Transformer),
            ComponentClass::Generator => Some(TechClass::Generator),
            ComponentClass::Line => Some(TechClass::LineType),
            _ => None,
        }
    }
}

impl fmt::Display for TechClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TechClass::Storage => "storage",
            TechClass::Transformer => "transformer",
            TechClass::Generator => "generator",
            TechClass::LineType => "line type",
        };
        f.write_str(label)
    }
}

/// Read-only `type -> spec` map for one class.
#[derive(Debug, Clone, PartialEq)]
pub struct TechLibrary {
    class: TechClass,
    specs: BTreeMap<String, TechnologySpec>,
}

impl TechLibrary {
    pub fn empty(class: TechClass) -> Self {
        Self {
            class,
            specs: BTreeMap::new(),
        }
    }

    pub fn from_table(class: TechClass, table: &Table) -> NetworkResult<Self> {
        let mut library = Self::empty(class);
        if table.headers().is_empty() {
            return Ok(library);
        }

        let invalid = |detail: String| NetworkError::InvalidTechnologyLibrary {
            library: class.file_name().to_string(),
            detail,
        };

        let mut required = vec!["type"];
        required.extend_from_slice(class.required_columns());
        let missing = table.missing_columns(&required);
        if !missing.is_empty() {
            return Err(invalid(format!("missing columns: {}", missing.join(", "))));
        }

        for row in table.rows() {
            let tech_type = row
                .get_str("type")
                .ok_or_else(|| invalid(format!("line {}: empty type", row.line())))?
                .to_string();
            for column in class.required_columns() {
                match row.get_f64(column) {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        return Err(invalid(format!(
                            "type '{}' has no value for '{}'",
                            tech_type, column
                        )))
                    }
                    Err(cell) => return Err(invalid(cell.to_string())),
                }
            }
            match library.specs.entry(tech_type) {
                Entry::Occupied(entry) => {
                    return Err(invalid(format!("type '{}' defined twice", entry.key())))
                }
                Entry::Vacant(entry) => {
                    entry.insert(row.clone());
                }
            }
        }
        Ok(library)
    }

    pub fn class(&self) -> TechClass {
        self.class
    }

    pub fn get(&self, tech_type: &str) -> Option<&TechnologySpec> {
        self.specs.get(tech_type)
    }

    /// Look up the spec a component names; absence is fatal.
    pub fn lookup(
        &self,
        class: ComponentClass,
        component: &str,
        tech_type: &str,
    ) -> NetworkResult<&TechnologySpec> {
        self.specs
            .get(tech_type)
            .ok_or_else(|| NetworkError::UnknownTechnologyType {
                class,
                component: component.to_string(),
                tech_type: tech_type.to_string(),
            })
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Loads and caches one [`TechLibrary`] per class.
#[derive(Debug, Default)]
pub struct TechnologyLibraryResolver {
    cache: BTreeMap<TechClass, TechLibrary>,
}

impl TechnologyLibraryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &mut self,
        repo: &mut ConfigRepository,
        class: TechClass,
    ) -> NetworkResult<&TechLibrary> {
        let library = match self.cache.entry(class) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let table = repo.load_tech_library(class.file_name())?;
                let library = TechLibrary::from_table(class, &table)?;
                if library.is_empty() {
                    warn!(library = %class, "technology library is empty");
                } else {
                    debug!(library = %class, types = library.len(), "technology library loaded");
                }
                entry.insert(library)
            }
        };
        Ok(library)
    }

    /// Resolve every class up front
    pub fn resolve_all(&mut self, repo: &mut ConfigRepository) -> NetworkResult<()> {
        for class in TechClass::ALL {
            self.resolve(repo, class)?;
        }
        Ok(())
    }

    pub fn cached(&self, class: TechClass) -> Option<&TechLibrary> {
        self.cache.get(&class)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyrenet_core::ErrorKind;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_library_from_table() {
        let table = Table::from_rows(
            "tech_libraries/generator_tech_library.csv",
            &["type", "efficiency", "marginal_cost"],
            &[&["ccgt", "0.58", "45"], &["ocgt", "0.38", "70"]],
        );
        let library = TechLibrary::from_table(TechClass::Generator, &table).unwrap();
        assert_eq!(library.len(), 2);
        let spec = library.get("ccgt").unwrap();
        assert_eq!(spec.get_f64("efficiency").unwrap(), Some(0.58));
        assert_eq!(library.types().collect::<Vec<_>>(), vec!["ccgt", "ocgt"]);
    }

    #[test]
    fn test_missing_required_column() {
        let table = Table::from_rows("t", &["type", "round_trip_efficiency"], &[&["li-ion", "0.9"]]);
        let err = TechLibrary::from_table(TechClass::Storage, &table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTechnologyLibrary);
        assert!(err.to_string().contains("cycle_life"));
    }

    #[test]
    fn test_duplicate_and_non_numeric_rows() {
        let duplicated = Table::from_rows("t", &["type", "efficiency"], &[&["a", "1"], &["a", "0.9"]]);
        assert!(TechLibrary::from_table(TechClass::Generator, &duplicated).is_err());

        let text = Table::from_rows("t", &["type", "s_nom", "x"], &[&["t1", "high", "0.1"]]);
        assert!(TechLibrary::from_table(TechClass::Transformer, &text).is_err());
    }

    #[test]
    fn test_lookup_unknown_type() {
        let library = TechLibrary::empty(TechClass::Generator);
        let err = library
            .lookup(ComponentClass::Generator, "G9", "UnknownGenType")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTechnologyType);
    }

    #[test]
    fn test_resolver_caches_and_clears() {
        let dir = tempdir().unwrap();
        let libs = dir.path().join("tech_libraries");
        fs::create_dir_all(&libs).unwrap();
        fs::write(
            libs.join("line_types.csv"),
            "type,r_per_length,x_per_length\nACSR-240,0.12,0.39\n",
        )
        .unwrap();

        let mut repo = ConfigRepository::new(dir.path());
        let mut resolver = TechnologyLibraryResolver::new();
        assert_eq!(resolver.resolve(&mut repo, TechClass::LineType).unwrap().len(), 1);

        fs::remove_file(libs.join("line_types.csv")).unwrap();
        assert_eq!(resolver.resolve(&mut repo, TechClass::LineType).unwrap().len(), 1);

        resolver.clear();
        assert!(resolver.cached(TechClass::LineType).is_none());
        assert!(resolver.resolve(&mut repo, TechClass::LineType).unwrap().is_empty());
        assert!(repo.diagnostics().has_errors());
    }
}
