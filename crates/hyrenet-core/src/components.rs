//! Typed component records.
//!
//! Each component class is an explicit struct; optional technical
//! parameters are `Option` and everything else carries the default declared
//! by the assembly schema. Attributes a constraint or an engine may address
//! by name are listed once per struct through `scalar_attributes!`, which
//! generates the name-based accessors of the [`Component`] trait.
//!
//! Time-varying attributes live in each component's `series` map, one value
//! per network snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::units::{Kilovolts, MegavoltAmperes, MegawattHours, Megawatts, Ohms};

/// Component classes, in assembly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentClass {
    Bus,
    Transformer,
    Line,
    Generator,
    StorageUnit,
    Link,
    Load,
}

impl ComponentClass {
    /// Buses first; every later class references buses that already exist.
    pub const ASSEMBLY_ORDER: [ComponentClass; 7] = [
        ComponentClass::Bus,
        ComponentClass::Transformer,
        ComponentClass::Line,
        ComponentClass::Generator,
        ComponentClass::StorageUnit,
        ComponentClass::Link,
        ComponentClass::Load,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentClass::Bus => "Bus",
            ComponentClass::Transformer => "Transformer",
            ComponentClass::Line => "Line",
            ComponentClass::Generator => "Generator",
            ComponentClass::StorageUnit => "StorageUnit",
            ComponentClass::Link => "Link",
            ComponentClass::Load => "Load",
        }
    }

    /// Plural, snake_case collection name (`storage_units`)
    pub fn list_name(&self) -> &'static str {
        match self {
            ComponentClass::Bus => "buses",
            ComponentClass::Transformer => "transformers",
            ComponentClass::Line => "lines",
            ComponentClass::Generator => "generators",
            ComponentClass::StorageUnit => "storage_units",
            ComponentClass::Link => "links",
            ComponentClass::Load => "loads",
        }
    }

    /// Lenient parse: `StorageUnit`, `storage_unit`, `storage_units`, `Storage Units`, ...
    pub fn parse(input: &str) -> Option<Self> {
        let normalized: String = input
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "bus" | "buses" => Some(ComponentClass::Bus),
            "transformer" | "transformers" => Some(ComponentClass::Transformer),
            "line" | "lines" => Some(ComponentClass::Line),
            "generator" | "generators" | "gen" => Some(ComponentClass::Generator),
            "storageunit" | "storageunits" | "storage" => Some(ComponentClass::StorageUnit),
            "link" | "links" => Some(ComponentClass::Link),
            "load" | "loads" => Some(ComponentClass::Load),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentClass::parse(s).ok_or_else(|| format!("unknown component type '{}'", s))
    }
}

/// Attribute value handed to an engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Float(f64),
    Text(String),
    Series(Vec<f64>),
}

pub type Attributes = BTreeMap<String, AttrValue>;

/// Per-snapshot values keyed by attribute name (the `*_t` tables)
pub type SeriesMap = BTreeMap<String, Vec<f64>>;

/// Common behaviour of all component records.
pub trait Component: Clone + fmt::Debug {
    const CLASS: ComponentClass;

    fn name(&self) -> &str;

    /// `(column, bus name)` pairs this component attaches to
    fn bus_refs(&self) -> Vec<(&'static str, &str)>;

    /// Static numeric attribute by name (`None` when unknown or unset)
    fn attribute(&self, attr: &str) -> Option<f64>;

    /// Overwrite a static numeric attribute; `false` when the name is unknown
    fn set_attribute(&mut self, attr: &str, value: f64) -> bool;

    fn has_attribute(&self, attr: &str) -> bool;

    fn scalar_attribute_names() -> &'static [&'static str];

    /// Attributes that may vary per snapshot
    fn series_attributes() -> &'static [&'static str];

    fn series(&self) -> &SeriesMap;

    fn series_mut(&mut self) -> &mut SeriesMap;

    fn text_attributes(&self) -> Vec<(&'static str, String)>;

    /// Everything an engine needs to register this component
    fn to_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        for (key, value) in self.text_attributes() {
            attrs.insert(key.to_string(), AttrValue::Text(value));
        }
        for (key, bus) in self.bus_refs() {
            attrs.insert(key.to_string(), AttrValue::Text(bus.to_string()));
        }
        for name in Self::scalar_attribute_names() {
            if let Some(value) = self.attribute(name) {
                attrs.insert(name.to_string(), AttrValue::Float(value));
            }
        }
        for (key, values) in self.series() {
            attrs.insert(key.clone(), AttrValue::Series(values.clone()));
        }
        attrs
    }

    /// Series for `attr`, broadcasting the static value when none is stored yet.
    fn series_or_static(&self, attr: &str, len: usize) -> Vec<f64> {
        match self.series().get(attr) {
            Some(values) => values.clone(),
            None => vec![self.attribute(attr).unwrap_or(0.0); len],
        }
    }
}

macro_rules! scalar_attributes {
    ($($name:literal => $field:ident : $kind:ident),* $(,)?) => {
        fn attribute(&self, attr: &str) -> Option<f64> {
            match attr {
                $($name => scalar_attributes!(@get self.$field, $kind),)*
                _ => None,
            }
        }

        fn set_attribute(&mut self, attr: &str, value: f64) -> bool {
            match attr {
                $($name => {
                    scalar_attributes!(@set self.$field, $kind, value);
                    true
                })*
                _ => false,
            }
        }

        fn has_attribute(&self, attr: &str) -> bool {
            matches!(attr, $($name)|*)
        }

        fn scalar_attribute_names() -> &'static [&'static str] {
            &[$($name),*]
        }
    };
    (@get $place:expr, plain) => { Some($place) };
    (@get $place:expr, unit) => { Some($place.0) };
    (@get $place:expr, opt) => { $place };
    (@get $place:expr, opt_kv) => { $place.map(|v| v.0) };
    (@get $place:expr, flag) => { Some(if $place { 1.0 } else { 0.0 }) };
    (@set $place:expr, plain, $value:expr) => { $place = $value };
    (@set $place:expr, unit, $value:expr) => { $place.0 = $value };
    (@set $place:expr, opt, $value:expr) => { $place = Some($value) };
    (@set $place:expr, opt_kv, $value:expr) => { $place = Some(Kilovolts($value)) };
    (@set $place:expr, flag, $value:expr) => { $place = $value != 0.0 };
}

fn optional_text(key: &'static str, value: &Option<String>) -> Option<(&'static str, String)> {
    value.as_ref().map(|v| (key, v.clone()))
}

/// Energy carrier (AC, DC, gas, ...) with its emission factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    pub name: String,
    #[serde(default)]
    pub co2_emissions: f64,
    #[serde(default)]
    pub nice_name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl Carrier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            co2_emissions: 0.0,
            nice_name: None,
            color: None,
        }
    }

    pub fn with_emissions(mut self, co2_emissions: f64) -> Self {
        self.co2_emissions = co2_emissions;
        self
    }

    pub fn with_display(mut self, nice_name: &str, color: Option<&str>) -> Self {
        self.nice_name = Some(nice_name.to_string());
        self.color = color.map(str::to_string);
        self
    }

    /// Carriers registered when no configuration overrides them.
    pub fn defaults() -> Vec<Carrier> {
        [
            ("coal", 1.0, "Coal", Some("grey")),
            ("gas", 2.0, "Gas", Some("indianred")),
            ("oil", 3.0, "Oil", Some("black")),
            ("hydro", 4.0, "Hydro", Some("aquamarine")),
            ("wind", 5.0, "Onshore Wind", Some("dodgerblue")),
            ("electricity", 6.0, "Electricity", Some("yellow")),
            ("AC", 7.0, "AC", None),
            ("DC", 8.0, "DC", None),
        ]
        .into_iter()
        .map(|(name, co2, nice, color)| {
            Carrier::new(name)
                .with_emissions(co2)
                .with_display(nice, color)
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bus {
    pub name: String,
    /// Nominal voltage
    pub v_nom: Kilovolts,
    pub x: f64,
    pub y: f64,
    pub carrier: String,
    pub v_mag_pu_set: f64,
    pub v_mag_pu_min: f64,
    pub v_mag_pu_max: f64,
    /// PQ, PV or Slack
    pub control: String,
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "SeriesMap::is_empty")]
    pub series: SeriesMap,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            name: String::new(),
            v_nom: Kilovolts(1.0),
            x: 0.0,
            y: 0.0,
            carrier: "AC".to_string(),
            v_mag_pu_set: 1.0,
            v_mag_pu_min: 0.0,
            v_mag_pu_max: f64::INFINITY,
            control: "PQ".to_string(),
            zone: None,
            series: SeriesMap::new(),
        }
    }
}

impl Component for Bus {
    const CLASS: ComponentClass = ComponentClass::Bus;

    fn name(&self) -> &str {
        &self.name
    }

    fn bus_refs(&self) -> Vec<(&'static str, &str)> {
        Vec::new()
    }

    scalar_attributes! {
        "v_nom" => v_nom: unit,
        "x" => x: plain,
        "y" => y: plain,
        "v_mag_pu_set" => v_mag_pu_set: plain,
        "v_mag_pu_min" => v_mag_pu_min: plain,
        "v_mag_pu_max" => v_mag_pu_max: plain,
    }

    fn series_attributes() -> &'static [&'static str] {
        &["v_mag_pu_set", "v_mag_pu_min", "v_mag_pu_max"]
    }

    fn series(&self) -> &SeriesMap {
        &self.series
    }

    fn series_mut(&mut self) -> &mut SeriesMap {
        &mut self.series
    }

    fn text_attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("carrier", self.carrier.clone()),
            ("control", self.control.clone()),
        ];
        attrs.extend(optional_text("zone", &self.zone));
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    pub line_type: Option<String>,
    /// Length in km
    pub length: f64,
    pub r_per_length: Option<f64>,
    pub x_per_length: Option<f64>,
    pub c_per_length: Option<f64>,
    pub r: Ohms,
    pub x: Ohms,
    pub s_nom: MegavoltAmperes,
    pub s_max_pu: f64,
    pub capital_cost: f64,
    pub carrier: String,
    #[serde(skip_serializing_if = "SeriesMap::is_empty")]
    pub series: SeriesMap,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus0: String::new(),
            bus1: String::new(),
            line_type: None,
            length: 1.0,
            r_per_length: None,
            x_per_length: None,
            c_per_length: None,
            r: Ohms(0.0),
            x: Ohms(0.0),
            s_nom: MegavoltAmperes(0.0),
            s_max_pu: 1.0,
            capital_cost: 0.0,
            carrier: "AC".to_string(),
            series: SeriesMap::new(),
        }
    }
}

impl Component for Line {
    const CLASS: ComponentClass = ComponentClass::Line;

    fn name(&self) -> &str {
        &self.name
    }

    fn bus_refs(&self) -> Vec<(&'static str, &str)> {
        vec![("bus0", &self.bus0), ("bus1", &self.bus1)]
    }

    scalar_attributes! {
        "length" => length: plain,
        "r_per_length" => r_per_length: opt,
        "x_per_length" => x_per_length: opt,
        "c_per_length" => c_per_length: opt,
        "r" => r: unit,
        "x" => x: unit,
        "s_nom" => s_nom: unit,
        "s_max_pu" => s_max_pu: plain,
        "capital_cost" => capital_cost: plain,
    }

    fn series_attributes() -> &'static [&'static str] {
        &["s_max_pu"]
    }

    fn series(&self) -> &SeriesMap {
        &self.series
    }

    fn series_mut(&mut self) -> &mut SeriesMap {
        &mut self.series
    }

    fn text_attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![("carrier", self.carrier.clone())];
        attrs.extend(optional_text("type", &self.line_type));
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transformer {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    pub transformer_type: Option<String>,
    pub s_nom: MegavoltAmperes,
    pub r: Ohms,
    pub x: Ohms,
    /// Rated voltage on the bus0 side
    pub v_nom_0: Option<Kilovolts>,
    /// Rated voltage on the bus1 side
    pub v_nom_1: Option<Kilovolts>,
    pub tap_ratio: f64,
    pub tap_position: f64,
    pub tap_min: f64,
    pub tap_max: f64,
    pub tap_step: f64,
    pub s_max_pu: f64,
    pub capital_cost: f64,
    #[serde(skip_serializing_if = "SeriesMap::is_empty")]
    pub series: SeriesMap,
}

impl Default for Transformer {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus0: String::new(),
            bus1: String::new(),
            transformer_type: None,
            s_nom: MegavoltAmperes(0.0),
            r: Ohms(0.0),
            x: Ohms(0.0),
            v_nom_0: None,
            v_nom_1: None,
            tap_ratio: 1.0,
            tap_position: 0.0,
            tap_min: 0.0,
            tap_max: 0.0,
            tap_step: 0.0,
            s_max_pu: 1.0,
            capital_cost: 0.0,
            series: SeriesMap::new(),
        }
    }
}

impl Component for Transformer {
    const CLASS: ComponentClass = ComponentClass::Transformer;

    fn name(&self) -> &str {
        &self.name
    }

    fn bus_refs(&self) -> Vec<(&'static str, &str)> {
        vec![("bus0", &self.bus0), ("bus1", &self.bus1)]
    }

    scalar_attributes! {
        "s_nom" => s_nom: unit,
        "r" => r: unit,
        "x" => x: unit,
        "v_nom_0" => v_nom_0: opt_kv,
        "v_nom_1" => v_nom_1: opt_kv,
        "tap_ratio" => tap_ratio: plain,
        "tap_position" => tap_position: plain,
        "tap_min" => tap_min: plain,
        "tap_max" => tap_max: plain,
        "tap_step" => tap_step: plain,
        "s_max_pu" => s_max_pu: plain,
        "capital_cost" => capital_cost: plain,
    }

    fn series_attributes() -> &'static [&'static str] {
        &["s_max_pu"]
    }

    fn series(&self) -> &SeriesMap {
        &self.series
    }

    fn series_mut(&mut self) -> &mut SeriesMap {
        &mut self.series
    }

    fn text_attributes(&self) -> Vec<(&'static str, String)> {
        optional_text("type", &self.transformer_type)
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generator {
    pub name: String,
    pub bus: String,
    pub generator_type: Option<String>,
    pub carrier: String,
    pub control: String,
    pub p_nom: Megawatts,
    pub p_set: f64,
    pub q_set: f64,
    pub efficiency: f64,
    pub capital_cost: f64,
    pub marginal_cost: f64,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    pub ramp_limit_up: Option<f64>,
    pub ramp_limit_down: Option<f64>,
    pub min_up_time: f64,
    pub min_down_time: f64,
    pub start_up_cost: f64,
    pub shut_down_cost: f64,
    /// Availability profile bound to `p_max_pu`
    pub profile_id: Option<String>,
    #[serde(skip_serializing_if = "SeriesMap::is_empty")]
    pub series: SeriesMap,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: String::new(),
            generator_type: None,
            carrier: String::new(),
            control: "PQ".to_string(),
            p_nom: Megawatts(0.0),
            p_set: 0.0,
            q_set: 0.0,
            efficiency: 1.0,
            capital_cost: 0.0,
            marginal_cost: 0.0,
            p_min_pu: 0.0,
            p_max_pu: 1.0,
            ramp_limit_up: None,
            ramp_limit_down: None,
            min_up_time: 0.0,
            min_down_time: 0.0,
            start_up_cost: 0.0,
            shut_down_cost: 0.0,
            profile_id: None,
            series: SeriesMap::new(),
        }
    }
}

impl Component for Generator {
    const CLASS: ComponentClass = ComponentClass::Generator;

    fn name(&self) -> &str {
        &self.name
    }

    fn bus_refs(&self) -> Vec<(&'static str, &str)> {
        vec![("bus", &self.bus)]
    }

    scalar_attributes! {
        "p_nom" => p_nom: unit,
        "p_set" => p_set: plain,
        "q_set" => q_set: plain,
        "efficiency" => efficiency: plain,
        "capital_cost" => capital_cost: plain,
        "marginal_cost" => marginal_cost: plain,
        "p_min_pu" => p_min_pu: plain,
        "p_max_pu" => p_max_pu: plain,
        "ramp_limit_up" => ramp_limit_up: opt,
        "ramp_limit_down" => ramp_limit_down: opt,
        "min_up_time" => min_up_time: plain,
        "min_down_time" => min_down_time: plain,
        "start_up_cost" => start_up_cost: plain,
        "shut_down_cost" => shut_down_cost: plain,
    }

    fn series_attributes() -> &'static [&'static str] {
        &[
            "p_max_pu",
            "p_min_pu",
            "p_set",
            "q_set",
            "marginal_cost",
            "efficiency",
        ]
    }

    fn series(&self) -> &SeriesMap {
        &self.series
    }

    fn series_mut(&mut self) -> &mut SeriesMap {
        &mut self.series
    }

    fn text_attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("carrier", self.carrier.clone()),
            ("control", self.control.clone()),
        ];
        attrs.extend(optional_text("type", &self.generator_type));
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageUnit {
    pub name: String,
    pub bus: String,
    pub storage_type: Option<String>,
    pub carrier: String,
    pub p_nom: Megawatts,
    /// Hours at full power the reservoir can sustain
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    pub standing_loss: f64,
    pub cycle_life: Option<f64>,
    pub capital_cost: f64,
    pub marginal_cost: f64,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    pub p_set: f64,
    pub inflow: f64,
    pub state_of_charge_initial: f64,
    pub state_of_charge_min: f64,
    pub state_of_charge_max: f64,
    pub cyclic_state_of_charge: bool,
    #[serde(skip_serializing_if = "SeriesMap::is_empty")]
    pub series: SeriesMap,
}

impl Default for StorageUnit {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: String::new(),
            storage_type: None,
            carrier: String::new(),
            p_nom: Megawatts(0.0),
            max_hours: 1.0,
            efficiency_store: 1.0,
            efficiency_dispatch: 1.0,
            standing_loss: 0.0,
            cycle_life: None,
            capital_cost: 0.0,
            marginal_cost: 0.0,
            p_min_pu: -1.0,
            p_max_pu: 1.0,
            p_set: 0.0,
            inflow: 0.0,
            state_of_charge_initial: 0.0,
            state_of_charge_min: 0.0,
            state_of_charge_max: 1.0,
            cyclic_state_of_charge: false,
            series: SeriesMap::new(),
        }
    }
}

impl StorageUnit {
    /// Energy the unit can hold: `p_nom × max_hours`
    pub fn energy_capacity(&self) -> MegawattHours {
        self.p_nom.over_hours(self.max_hours)
    }
}

impl Component for StorageUnit {
    const CLASS: ComponentClass = ComponentClass::StorageUnit;

    fn name(&self) -> &str {
        &self.name
    }

    fn bus_refs(&self) -> Vec<(&'static str, &str)> {
        vec![("bus", &self.bus)]
    }

    scalar_attributes! {
        "p_nom" => p_nom: unit,
        "max_hours" => max_hours: plain,
        "efficiency_store" => efficiency_store: plain,
        "efficiency_dispatch" => efficiency_dispatch: plain,
        "standing_loss" => standing_loss: plain,
        "cycle_life" => cycle_life: opt,
        "capital_cost" => capital_cost: plain,
        "marginal_cost" => marginal_cost: plain,
        "p_min_pu" => p_min_pu: plain,
        "p_max_pu" => p_max_pu: plain,
        "p_set" => p_set: plain,
        "inflow" => inflow: plain,
        "state_of_charge_initial" => state_of_charge_initial: plain,
        "state_of_charge_min" => state_of_charge_min: plain,
        "state_of_charge_max" => state_of_charge_max: plain,
        "cyclic_state_of_charge" => cyclic_state_of_charge: flag,
    }

    fn series_attributes() -> &'static [&'static str] {
        &[
            "p_max_pu",
            "p_min_pu",
            "p_set",
            "inflow",
            "marginal_cost",
            "efficiency_store",
            "efficiency_dispatch",
            "standing_loss",
        ]
    }

    fn series(&self) -> &SeriesMap {
        &self.series
    }

    fn series_mut(&mut self) -> &mut SeriesMap {
        &mut self.series
    }

    fn text_attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![("carrier", self.carrier.clone())];
        attrs.extend(optional_text("type", &self.storage_type));
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    pub carrier: String,
    pub p_nom: Megawatts,
    pub efficiency: f64,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    pub capital_cost: f64,
    pub marginal_cost: f64,
    pub ramp_limit_up: Option<f64>,
    pub ramp_limit_down: Option<f64>,
    pub start_up_cost: f64,
    pub shut_down_cost: f64,
    pub active: bool,
    #[serde(skip_serializing_if = "SeriesMap::is_empty")]
    pub series: SeriesMap,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus0: String::new(),
            bus1: String::new(),
            carrier: "electricity".to_string(),
            p_nom: Megawatts(0.0),
            efficiency: 1.0,
            p_min_pu: 0.0,
            p_max_pu: 1.0,
            capital_cost: 0.0,
            marginal_cost: 0.0,
            ramp_limit_up: None,
            ramp_limit_down: None,
            start_up_cost: 0.0,
            shut_down_cost: 0.0,
            active: true,
            series: SeriesMap::new(),
        }
    }
}

impl Component for Link {
    const CLASS: ComponentClass = ComponentClass::Link;

    fn name(&self) -> &str {
        &self.name
    }

    fn bus_refs(&self) -> Vec<(&'static str, &str)> {
        vec![("bus0", &self.bus0), ("bus1", &self.bus1)]
    }

    scalar_attributes! {
        "p_nom" => p_nom: unit,
        "efficiency" => efficiency: plain,
        "p_min_pu" => p_min_pu: plain,
        "p_max_pu" => p_max_pu: plain,
        "capital_cost" => capital_cost: plain,
        "marginal_cost" => marginal_cost: plain,
        "ramp_limit_up" => ramp_limit_up: opt,
        "ramp_limit_down" => ramp_limit_down: opt,
        "start_up_cost" => start_up_cost: plain,
        "shut_down_cost" => shut_down_cost: plain,
        "active" => active: flag,
    }

    fn series_attributes() -> &'static [&'static str] {
        &["p_max_pu", "p_min_pu", "p_set", "efficiency", "marginal_cost"]
    }

    fn series(&self) -> &SeriesMap {
        &self.series
    }

    fn series_mut(&mut self) -> &mut SeriesMap {
        &mut self.series
    }

    fn text_attributes(&self) -> Vec<(&'static str, String)> {
        vec![("carrier", self.carrier.clone())]
    }
}

/// A demand. `p_set`/`q_set` are always per-snapshot series once assembled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Load {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    pub p_min: f64,
    pub p_max: f64,
    pub scaling_factor: f64,
    pub active: bool,
    pub profile_id: Option<String>,
    pub series: SeriesMap,
}

impl Default for Load {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: String::new(),
            carrier: String::new(),
            p_min: 0.0,
            p_max: 0.0,
            scaling_factor: 1.0,
            active: true,
            profile_id: None,
            series: SeriesMap::new(),
        }
    }
}

impl Load {
    pub fn p_set(&self) -> &[f64] {
        self.series.get("p_set").map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn q_set(&self) -> &[f64] {
        self.series.get("q_set").map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest scaled active demand over the horizon
    pub fn peak_demand(&self) -> Megawatts {
        Megawatts(
            self.p_set()
                .iter()
                .map(|p| p * self.scaling_factor)
                .fold(0.0, f64::max),
        )
    }
}

impl Component for Load {
    const CLASS: ComponentClass = ComponentClass::Load;

    fn name(&self) -> &str {
        &self.name
    }

    fn bus_refs(&self) -> Vec<(&'static str, &str)> {
        vec![("bus", &self.bus)]
    }

    scalar_attributes! {
        "p_min" => p_min: plain,
        "p_max" => p_max: plain,
        "scaling_factor" => scaling_factor: plain,
        "active" => active: flag,
    }

    fn series_attributes() -> &'static [&'static str] {
        &["p_set", "q_set"]
    }

    fn series(&self) -> &SeriesMap {
        &self.series
    }

    fn series_mut(&mut self) -> &mut SeriesMap {
        &mut self.series
    }

    fn text_attributes(&self) -> Vec<(&'static str, String)> {
        vec![("carrier", self.carrier.clone())]
    }
}
