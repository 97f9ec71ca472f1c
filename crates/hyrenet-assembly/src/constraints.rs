//! Static and time-windowed constraint application.
//!
//! Constraint rows come from `constraints/{global,node,branch}_constraints.csv`,
//! `components/component_constraints.csv` and
//! `constraints/dynamic_constraints.csv`. A row without a window is static
//! and overwrites a scalar attribute; a row with a window (or any row of the
//! dynamic file) overwrites a slice of a per-snapshot series.
//!
//! Both kinds are planned in full before anything is written, so a batch
//! that fails leaves every component untouched.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::NaiveDateTime;
use hyrenet_core::time::{format_timestamp, parse_timestamp};
use hyrenet_core::{
    Bus, ComponentClass, Generator, IndexMismatch, Line, Link, Load, Network, NetworkError,
    NetworkMember, NetworkResult, StorageUnit, TimeSeries, Transformer,
};
use hyrenet_io::{ConfigRepository, Row, Table};
use tracing::{debug, info};

/// Files holding static rows (rows with a window are treated as dynamic)
pub const CONSTRAINT_SOURCES: &[&str] = &[
    "global_constraints.csv",
    "node_constraints.csv",
    "branch_constraints.csv",
];
pub const COMPONENT_CONSTRAINTS: &str = "component_constraints.csv";
pub const DYNAMIC_CONSTRAINTS: &str = "dynamic_constraints.csv";

const REQUIRED_COLUMNS: &[&str] = &["component_type", "component_id", "constraint_type"];

/// Attributes a `constraint_type` addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintTarget {
    /// A `(lower, upper)` pair such as `p_min_pu`/`p_max_pu`
    Bounds {
        min: Option<&'static str>,
        max: &'static str,
    },
    /// An attribute named directly
    Attribute(String),
}

impl ConstraintTarget {
    pub fn parse(constraint_type: &str) -> Self {
        match constraint_type.trim().to_ascii_lowercase().as_str() {
            "" | "p" | "p_pu" | "power" => ConstraintTarget::Bounds {
                min: Some("p_min_pu"),
                max: "p_max_pu",
            },
            "s" | "s_pu" => ConstraintTarget::Bounds {
                min: None,
                max: "s_max_pu",
            },
            "v_mag_pu" | "voltage" => ConstraintTarget::Bounds {
                min: Some("v_mag_pu_min"),
                max: "v_mag_pu_max",
            },
            "soc" | "state_of_charge" => ConstraintTarget::Bounds {
                min: Some("state_of_charge_min"),
                max: "state_of_charge_max",
            },
            _ => ConstraintTarget::Attribute(constraint_type.trim().to_string()),
        }
    }
}

/// One parsed constraint row
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub constraint_id: Option<String>,
    pub component_type: String,
    pub component_id: String,
    pub constraint_type: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub value: Option<f64>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

impl Constraint {
    /// Name used in errors: the `constraint_id`, or `type:id:constraint_type`
    pub fn label(&self) -> String {
        match &self.constraint_id {
            Some(id) => id.clone(),
            None => format!(
                "{}:{}:{}",
                self.component_type, self.component_id, self.constraint_type
            ),
        }
    }

    pub fn is_windowed(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }

    fn from_row(source: &str, row: &Row) -> NetworkResult<Self> {
        let invalid = |detail: String| NetworkError::InvalidConstraintTarget {
            constraint: format!("{} line {}", source, row.line()),
            detail,
        };
        let number = |column: &str| row.get_f64(column).map_err(|cell| invalid(cell.to_string()));
        let stamp = |column: &str| match row.get_str(column) {
            None => Ok(None),
            Some(text) => parse_timestamp(text)
                .map(Some)
                .ok_or_else(|| invalid(format!("unreadable {} '{}'", column, text))),
        };

        Ok(Constraint {
            constraint_id: row.get_str("constraint_id").map(str::to_string),
            component_type: row
                .get_str("component_type")
                .ok_or_else(|| invalid("empty component_type".to_string()))?
                .to_string(),
            component_id: row
                .get_str("component_id")
                .ok_or_else(|| invalid("empty component_id".to_string()))?
                .to_string(),
            constraint_type: row.get_str("constraint_type").unwrap_or_default().to_string(),
            min_value: number("min_value")?,
            max_value: number("max_value")?,
            value: number("value")?,
            start_time: stamp("start_time")?,
            end_time: stamp("end_time")?,
        })
    }

    fn invalid(&self, detail: String) -> NetworkError {
        NetworkError::InvalidConstraintTarget {
            constraint: self.label(),
            detail,
        }
    }

    fn class(&self) -> NetworkResult<ComponentClass> {
        ComponentClass::parse(&self.component_type)
            .ok_or_else(|| self.invalid(format!("unknown component type '{}'", self.component_type)))
    }

    /// Scalar writes for a static constraint
    fn static_writes(&self) -> NetworkResult<Vec<(String, f64)>> {
        let writes: Vec<(String, f64)> = match ConstraintTarget::parse(&self.constraint_type) {
            ConstraintTarget::Bounds { min, max } => {
                let mut writes = Vec::new();
                if let (Some(attr), Some(value)) = (min, self.min_value) {
                    writes.push((attr.to_string(), value));
                }
                if let Some(value) = self.max_value.or(self.value) {
                    writes.push((max.to_string(), value));
                }
                writes
            }
            ConstraintTarget::Attribute(attr) => self
                .value
                .or(self.max_value)
                .or(self.min_value)
                .map(|value| vec![(attr, value)])
                .unwrap_or_default(),
        };
        if writes.is_empty() {
            return Err(self.invalid("no value, max_value or min_value to apply".to_string()));
        }
        Ok(writes)
    }

    /// Series attribute a windowed constraint overwrites
    fn dynamic_attribute(&self) -> String {
        match ConstraintTarget::parse(&self.constraint_type) {
            ConstraintTarget::Bounds {
                min: Some(min),
                max: _,
            } if self.max_value.is_none() && self.value.is_none() && self.min_value.is_some() => {
                min.to_string()
            }
            ConstraintTarget::Bounds { max, .. } => max.to_string(),
            ConstraintTarget::Attribute(attr) => attr,
        }
    }

    fn literal(&self) -> Option<f64> {
        self.value.or(self.max_value).or(self.min_value)
    }
}

/// Constraints read for one build, split by kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    pub static_constraints: Vec<Constraint>,
    pub dynamic_constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn len(&self) -> usize {
        self.static_constraints.len() + self.dynamic_constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse a constraint table; `always_dynamic` for the dynamic file
    pub fn extend_from_table(&mut self, table: &Table, always_dynamic: bool) -> NetworkResult<()> {
        if table.is_empty() {
            return Ok(());
        }
        let missing = table.missing_columns(REQUIRED_COLUMNS);
        if !missing.is_empty() {
            return Err(NetworkError::InvalidConstraintTarget {
                constraint: table.source().to_string(),
                detail: format!("missing columns: {}", missing.join(", ")),
            });
        }
        for row in table.rows() {
            let constraint = Constraint::from_row(table.source(), row)?;
            if always_dynamic || constraint.is_windowed() {
                self.dynamic_constraints.push(constraint);
            } else {
                self.static_constraints.push(constraint);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct StaticWrite {
    class: ComponentClass,
    component: String,
    attribute: String,
    value: f64,
}

#[derive(Debug)]
struct SeriesWrite {
    class: ComponentClass,
    component: String,
    attribute: String,
    values: Vec<f64>,
}

macro_rules! for_class {
    ($class:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        match $class {
            ComponentClass::Bus => $func::<Bus>($($arg),*),
            ComponentClass::Transformer => $func::<Transformer>($($arg),*),
            ComponentClass::Line => $func::<Line>($($arg),*),
            ComponentClass::Generator => $func::<Generator>($($arg),*),
            ComponentClass::StorageUnit => $func::<StorageUnit>($($arg),*),
            ComponentClass::Link => $func::<Link>($($arg),*),
            ComponentClass::Load => $func::<Load>($($arg),*),
        }
    };
}

/// Applies constraint rows onto registered components.
#[derive(Debug, Default)]
pub struct ConstraintApplier {
    profiles: BTreeMap<String, TimeSeries>,
}

impl ConstraintApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these series for dynamic constraints, keyed by `constraint_id`
    pub fn with_profiles(mut self, profiles: BTreeMap<String, TimeSeries>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn profiles(&self) -> &BTreeMap<String, TimeSeries> {
        &self.profiles
    }

    /// Read every constraint source and cache `constraint_profiles.csv`.
    pub fn load(&mut self, repo: &mut ConfigRepository) -> NetworkResult<ConstraintSet> {
        let mut set = ConstraintSet::default();
        for name in CONSTRAINT_SOURCES {
            set.extend_from_table(&repo.load_constraint(name)?, false)?;
        }
        set.extend_from_table(&repo.load_component(COMPONENT_CONSTRAINTS)?, false)?;
        set.extend_from_table(&repo.load_constraint(DYNAMIC_CONSTRAINTS)?, true)?;
        self.profiles = repo.load_constraint_profiles()?;
        debug!(
            static_constraints = set.static_constraints.len(),
            dynamic_constraints = set.dynamic_constraints.len(),
            profiles = self.profiles.len(),
            "constraints loaded"
        );
        Ok(set)
    }

    /// Overwrite scalar attributes; returns the number of constraints applied.
    pub fn apply_static(&self, network: &mut Network, constraints: &[Constraint]) -> NetworkResult<usize> {
        let mut plan = Vec::new();
        for constraint in constraints {
            let class = constraint.class()?;
            for (attribute, value) in constraint.static_writes()? {
                for_class!(class, check_scalar(network, constraint, &attribute))?;
                plan.push(StaticWrite {
                    class,
                    component: constraint.component_id.clone(),
                    attribute,
                    value,
                });
            }
        }

        for write in &plan {
            for_class!(write.class, write_scalar(network, write));
        }
        if !constraints.is_empty() {
            info!(count = constraints.len(), writes = plan.len(), "static constraints applied");
        }
        Ok(constraints.len())
    }

    /// Overwrite windows of per-snapshot series; returns the number of constraints applied.
    pub fn apply_dynamic(&self, network: &mut Network, constraints: &[Constraint]) -> NetworkResult<usize> {
        let mut plan: Vec<SeriesWrite> = Vec::new();
        for constraint in constraints {
            let class = constraint.class()?;
            let attribute = constraint.dynamic_attribute();
            let window = network
                .snapshots
                .window(constraint.start_time, constraint.end_time);
            let overlay = self.window_values(network, constraint, window.clone())?;

            // earlier writes in this batch to the same series must be kept
            let pending = plan.iter().position(|w| {
                w.class == class && w.component == constraint.component_id && w.attribute == attribute
            });
            match pending {
                Some(i) => plan[i].values[window].copy_from_slice(&overlay),
                None => {
                    let mut values = for_class!(class, current_series(network, constraint, &attribute))?;
                    values[window].copy_from_slice(&overlay);
                    plan.push(SeriesWrite {
                        class,
                        component: constraint.component_id.clone(),
                        attribute,
                        values,
                    });
                }
            }
        }

        for write in plan {
            for_class!(write.class, write_series(network, write));
        }
        if !constraints.is_empty() {
            info!(count = constraints.len(), "dynamic constraints applied");
        }
        Ok(constraints.len())
    }

    pub fn clear(&mut self) {
        self.profiles.clear();
    }

    /// Values for the window: the bound profile when one exists, else the literal.
    fn window_values(
        &self,
        network: &Network,
        constraint: &Constraint,
        window: Range<usize>,
    ) -> NetworkResult<Vec<f64>> {
        let stamps = &network.snapshots.stamps()[window.clone()];
        let profile = constraint
            .constraint_id
            .as_ref()
            .and_then(|id| self.profiles.get(id));

        match (profile, constraint.literal()) {
            (Some(profile), _) => stamps
                .iter()
                .map(|stamp| {
                    profile
                        .value_at(stamp)
                        .ok_or_else(|| NetworkError::ProfileIndexMismatch {
                            entity: constraint.label(),
                            mismatch: IndexMismatch::MissingTimestamp {
                                timestamp: format_timestamp(stamp),
                            },
                        })
                })
                .collect(),
            (None, Some(value)) => Ok(vec![value; window.len()]),
            (None, None) => Err(constraint.invalid(
                "no constraint profile and no literal value".to_string(),
            )),
        }
    }
}

fn check_scalar<C: NetworkMember>(network: &Network, constraint: &Constraint, attribute: &str) -> NetworkResult<()> {
    let component = C::collection(network)
        .get(&constraint.component_id)
        .ok_or_else(|| constraint.invalid(format!("no {} named '{}'", C::CLASS, constraint.component_id)))?;
    if !component.has_attribute(attribute) {
        return Err(constraint.invalid(format!("{} has no attribute '{}'", C::CLASS, attribute)));
    }
    Ok(())
}

fn write_scalar<C: NetworkMember>(network: &mut Network, write: &StaticWrite) {
    if let Some(component) = C::collection_mut(network).get_mut(&write.component) {
        component.set_attribute(&write.attribute, write.value);
    }
}

fn current_series<C: NetworkMember>(
    network: &Network,
    constraint: &Constraint,
    attribute: &str,
) -> NetworkResult<Vec<f64>> {
    let component = C::collection(network)
        .get(&constraint.component_id)
        .ok_or_else(|| constraint.invalid(format!("no {} named '{}'", C::CLASS, constraint.component_id)))?;
    if !C::series_attributes().contains(&attribute) {
        return Err(constraint.invalid(format!(
            "{} has no time-varying attribute '{}'",
            C::CLASS,
            attribute
        )));
    }
    Ok(component.series_or_static(attribute, network.snapshots.len()))
}

fn write_series<C: NetworkMember>(network: &mut Network, write: SeriesWrite) {
    if let Some(component) = C::collection_mut(network).get_mut(&write.component) {
        component.series_mut().insert(write.attribute, write.values);
    }
}
