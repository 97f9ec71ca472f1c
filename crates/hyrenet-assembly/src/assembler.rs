//! Typed component assembly.
//!
//! [`ComponentAssembler::add_all`] is the single procedure every class goes
//! through: check the header against the class schema, look up the row's
//! technology `type`, overlay row and spec into a typed record, check its
//! bus references against the buses already registered, register it.
//! Per-class knowledge lives only in the [`Assemble`] impls below.

use hyrenet_core::units::{Kilovolts, MegavoltAmperes, Megawatts, Ohms};
use hyrenet_core::{
    Bus, ComponentClass, Generator, Line, Link, Load, Network, NetworkError, NetworkMember,
    NetworkResult, Snapshots, StorageUnit, Transformer,
};
use hyrenet_io::{Table, TechLibrary};
use tracing::{info, warn};

use crate::schema::{
    ComponentSchema, Overlay, BUS_SCHEMA, GENERATOR_SCHEMA, LINE_SCHEMA, LINK_SCHEMA, LOAD_SCHEMA,
    STORAGE_UNIT_SCHEMA, TRANSFORMER_SCHEMA,
};

/// What a component may need beyond its own row
#[derive(Debug, Clone, Copy)]
pub struct AssemblyContext<'a> {
    pub snapshots: &'a Snapshots,
}

/// A component class that can be built from an overlay.
pub trait Assemble: NetworkMember + Sized {
    const SCHEMA: &'static ComponentSchema;

    fn from_overlay(overlay: &Overlay<'_>, ctx: &AssemblyContext<'_>) -> NetworkResult<Self>;
}

#[derive(Debug, Default)]
pub struct ComponentAssembler;

impl ComponentAssembler {
    /// Assemble and register every row of `table`; returns how many were added.
    pub fn add_all<C: Assemble>(
        network: &mut Network,
        table: &Table,
        library: Option<&TechLibrary>,
    ) -> NetworkResult<usize> {
        let schema = C::SCHEMA;
        if table.is_empty() {
            warn!("No {} were added to the network", schema.class.list_name());
            return Ok(0);
        }

        let missing = table.missing_columns(schema.required);
        if !missing.is_empty() {
            return Err(NetworkError::InvalidComponentData {
                class: schema.class,
                entity: table.source().to_string(),
                detail: format!("missing required columns: {}", missing.join(", ")),
            });
        }

        let snapshots = network.snapshots.clone();
        let ctx = AssemblyContext {
            snapshots: &snapshots,
        };

        for row in table.rows() {
            let name = row.get_str("name").ok_or_else(|| NetworkError::InvalidComponentData {
                class: schema.class,
                entity: format!("{} line {}", table.source(), row.line()),
                detail: "empty name".to_string(),
            })?;

            let spec = match (schema.tech_class, row.get_str("type")) {
                (Some(_), Some(tech_type)) => match library {
                    Some(library) => Some(library.lookup(schema.class, name, tech_type)?),
                    None => {
                        return Err(NetworkError::UnknownTechnologyType {
                            class: schema.class,
                            component: name.to_string(),
                            tech_type: tech_type.to_string(),
                        })
                    }
                },
                _ => None,
            };

            let overlay = Overlay::new(schema.class, name, row, spec);
            let component = C::from_overlay(&overlay, &ctx)?;

            for (_, bus) in component.bus_refs() {
                if network.bus(bus).is_none() {
                    return Err(NetworkError::MissingBusReference {
                        class: schema.class,
                        component: name.to_string(),
                        bus: bus.to_string(),
                    });
                }
            }
            network.register(component)?;
        }

        info!(
            count = table.len(),
            "{} added successfully",
            schema.class.list_name()
        );
        Ok(table.len())
    }
}

fn required_text(overlay: &Overlay<'_>, column: &str) -> NetworkResult<String> {
    overlay
        .text(column)
        .ok_or_else(|| overlay.invalid(format!("no value for '{}'", column)))
}

impl Assemble for Bus {
    const SCHEMA: &'static ComponentSchema = &BUS_SCHEMA;

    fn from_overlay(overlay: &Overlay<'_>, _ctx: &AssemblyContext<'_>) -> NetworkResult<Self> {
        let defaults = Bus::default();
        let v_nom = overlay
            .number("v_nom")?
            .ok_or_else(|| overlay.invalid("no value for 'v_nom'".to_string()))?;
        if v_nom <= 0.0 {
            return Err(overlay.invalid(format!("v_nom must be positive, got {}", v_nom)));
        }
        Ok(Bus {
            name: overlay.name().to_string(),
            v_nom: Kilovolts(v_nom),
            x: overlay.number_or("x", defaults.x)?,
            y: overlay.number_or("y", defaults.y)?,
            carrier: overlay.text_or("carrier", &defaults.carrier),
            v_mag_pu_set: overlay.number_or("v_mag_pu_set", defaults.v_mag_pu_set)?,
            v_mag_pu_min: overlay.number_or("v_mag_pu_min", defaults.v_mag_pu_min)?,
            v_mag_pu_max: overlay.number_or("v_mag_pu_max", defaults.v_mag_pu_max)?,
            control: overlay.text_or("control", &defaults.control),
            zone: overlay.text("zone"),
            series: defaults.series,
        })
    }
}

impl Assemble for Transformer {
    const SCHEMA: &'static ComponentSchema = &TRANSFORMER_SCHEMA;

    fn from_overlay(overlay: &Overlay<'_>, _ctx: &AssemblyContext<'_>) -> NetworkResult<Self> {
        let defaults = Transformer::default();
        Ok(Transformer {
            name: overlay.name().to_string(),
            bus0: required_text(overlay, "bus0")?,
            bus1: required_text(overlay, "bus1")?,
            transformer_type: overlay.row_text("type").map(str::to_string),
            s_nom: MegavoltAmperes(overlay.number_or("s_nom", defaults.s_nom.value())?),
            r: Ohms(overlay.number_or("r", defaults.r.value())?),
            x: Ohms(overlay.number_or("x", defaults.x.value())?),
            v_nom_0: overlay.number("v_nom_0")?.map(Kilovolts),
            v_nom_1: overlay.number("v_nom_1")?.map(Kilovolts),
            tap_ratio: overlay.number_or("tap_ratio", defaults.tap_ratio)?,
            tap_position: overlay.number_or("tap_position", defaults.tap_position)?,
            tap_min: overlay.number_or("tap_min", defaults.tap_min)?,
            tap_max: overlay.number_or("tap_max", defaults.tap_max)?,
            tap_step: overlay.number_or("tap_step", defaults.tap_step)?,
            s_max_pu: overlay.number_or("s_max_pu", defaults.s_max_pu)?,
            capital_cost: overlay.number_or("capital_cost", defaults.capital_cost)?,
            series: defaults.series,
        })
    }
}

impl Assemble for Line {
    const SCHEMA: &'static ComponentSchema = &LINE_SCHEMA;

    fn from_overlay(overlay: &Overlay<'_>, _ctx: &AssemblyContext<'_>) -> NetworkResult<Self> {
        let defaults = Line::default();
        let length = overlay.number_or("length", defaults.length)?;
        if length < 0.0 {
            return Err(overlay.invalid(format!("length must not be negative, got {}", length)));
        }
        let r_per_length = overlay.number("r_per_length")?;
        let x_per_length = overlay.number("x_per_length")?;

        // explicit impedances win over per-length values
        let r = match overlay.number("r")? {
            Some(r) => Ohms(r),
            None => Ohms::per_length(r_per_length.unwrap_or(0.0), length),
        };
        let x = match overlay.number("x")? {
            Some(x) => Ohms(x),
            None => Ohms::per_length(x_per_length.unwrap_or(0.0), length),
        };

        Ok(Line {
            name: overlay.name().to_string(),
            bus0: required_text(overlay, "bus0")?,
            bus1: required_text(overlay, "bus1")?,
            line_type: overlay.row_text("type").map(str::to_string),
            length,
            r_per_length,
            x_per_length,
            c_per_length: overlay.number("c_per_length")?,
            r,
            x,
            s_nom: MegavoltAmperes(overlay.number_or("s_nom", defaults.s_nom.value())?),
            s_max_pu: overlay.number_or("s_max_pu", defaults.s_max_pu)?,
            capital_cost: overlay.number_or("capital_cost", defaults.capital_cost)?,
            carrier: overlay.text_or("carrier", &defaults.carrier),
            series: defaults.series,
        })
    }
}

impl Assemble for Generator {
    const SCHEMA: &'static ComponentSchema = &GENERATOR_SCHEMA;

    fn from_overlay(overlay: &Overlay<'_>, _ctx: &AssemblyContext<'_>) -> NetworkResult<Self> {
        let defaults = Generator::default();
        Ok(Generator {
            name: overlay.name().to_string(),
            bus: required_text(overlay, "bus")?,
            generator_type: overlay.row_text("type").map(str::to_string),
            carrier: overlay.text_or("carrier", &defaults.carrier),
            control: overlay.text_or("control", &defaults.control),
            p_nom: Megawatts(overlay.number_or("p_nom", defaults.p_nom.value())?),
            p_set: overlay.number_or("p_set", defaults.p_set)?,
            q_set: overlay.number_or("q_set", defaults.q_set)?,
            efficiency: overlay.number_or("efficiency", defaults.efficiency)?,
            capital_cost: overlay.number_or("capital_cost", defaults.capital_cost)?,
            marginal_cost: overlay.number_or("marginal_cost", defaults.marginal_cost)?,
            p_min_pu: overlay.number_or("p_min_pu", defaults.p_min_pu)?,
            p_max_pu: overlay.number_or("p_max_pu", defaults.p_max_pu)?,
            ramp_limit_up: overlay.number("ramp_limit_up")?,
            ramp_limit_down: overlay.number("ramp_limit_down")?,
            min_up_time: overlay.number_or("min_up_time", defaults.min_up_time)?,
            min_down_time: overlay.number_or("min_down_time", defaults.min_down_time)?,
            start_up_cost: overlay.number_or("start_up_cost", defaults.start_up_cost)?,
            shut_down_cost: overlay.number_or("shut_down_cost", defaults.shut_down_cost)?,
            profile_id: overlay.row_text("profile_id").map(str::to_string),
            series: defaults.series,
        })
    }
}

impl Assemble for StorageUnit {
    const SCHEMA: &'static ComponentSchema = &STORAGE_UNIT_SCHEMA;

    fn from_overlay(overlay: &Overlay<'_>, _ctx: &AssemblyContext<'_>) -> NetworkResult<Self> {
        let defaults = StorageUnit::default();
        let round_trip = overlay.number("round_trip_efficiency")?;
        if let Some(eta) = round_trip {
            if !(0.0..=1.0).contains(&eta) {
                return Err(overlay.invalid(format!(
                    "round_trip_efficiency must lie in [0, 1], got {}",
                    eta
                )));
            }
        }
        // one-way losses split evenly between charging and discharging
        let one_way = round_trip.map(f64::sqrt).unwrap_or(1.0);

        Ok(StorageUnit {
            name: overlay.name().to_string(),
            bus: required_text(overlay, "bus")?,
            storage_type: overlay.row_text("type").map(str::to_string),
            carrier: overlay.text_or("carrier", &defaults.carrier),
            p_nom: Megawatts(overlay.number_or("p_nom", defaults.p_nom.value())?),
            max_hours: overlay.number_or("max_hours", defaults.max_hours)?,
            efficiency_store: overlay.number_or("efficiency_store", one_way)?,
            efficiency_dispatch: overlay.number_or("efficiency_dispatch", one_way)?,
            standing_loss: overlay.number_or("standing_loss", defaults.standing_loss)?,
            cycle_life: overlay.number("cycle_life")?,
            capital_cost: overlay.number_or("capital_cost", defaults.capital_cost)?,
            marginal_cost: overlay.number_or("marginal_cost", defaults.marginal_cost)?,
            p_min_pu: overlay.number_or("p_min_pu", defaults.p_min_pu)?,
            p_max_pu: overlay.number_or("p_max_pu", defaults.p_max_pu)?,
            p_set: overlay.number_or("p_set", defaults.p_set)?,
            inflow: overlay.number_or("inflow", defaults.inflow)?,
            state_of_charge_initial: overlay
                .number_or("state_of_charge_initial", defaults.state_of_charge_initial)?,
            state_of_charge_min: overlay
                .number_or("state_of_charge_min", defaults.state_of_charge_min)?,
            state_of_charge_max: overlay
                .number_or("state_of_charge_max", defaults.state_of_charge_max)?,
            cyclic_state_of_charge: overlay
                .flag_or("cyclic_state_of_charge", defaults.cyclic_state_of_charge)?,
            series: defaults.series,
        })
    }
}

impl Assemble for Link {
    const SCHEMA: &'static ComponentSchema = &LINK_SCHEMA;

    fn from_overlay(overlay: &Overlay<'_>, _ctx: &AssemblyContext<'_>) -> NetworkResult<Self> {
        let defaults = Link::default();
        Ok(Link {
            name: overlay.name().to_string(),
            bus0: required_text(overlay, "bus0")?,
            bus1: required_text(overlay, "bus1")?,
            carrier: overlay.text_or("carrier", &defaults.carrier),
            p_nom: Megawatts(overlay.number_or("p_nom", defaults.p_nom.value())?),
            efficiency: overlay.number_or("efficiency", defaults.efficiency)?,
            p_min_pu: overlay.number_or("p_min_pu", defaults.p_min_pu)?,
            p_max_pu: overlay.number_or("p_max_pu", defaults.p_max_pu)?,
            capital_cost: overlay.number_or("capital_cost", defaults.capital_cost)?,
            marginal_cost: overlay.number_or("marginal_cost", defaults.marginal_cost)?,
            ramp_limit_up: overlay.number("ramp_limit_up")?,
            ramp_limit_down: overlay.number("ramp_limit_down")?,
            start_up_cost: overlay.number_or("start_up_cost", defaults.start_up_cost)?,
            shut_down_cost: overlay.number_or("shut_down_cost", defaults.shut_down_cost)?,
            active: overlay.flag_or("active", defaults.active)?,
            series: defaults.series,
        })
    }
}

impl Assemble for Load {
    const SCHEMA: &'static ComponentSchema = &LOAD_SCHEMA;

    fn from_overlay(overlay: &Overlay<'_>, ctx: &AssemblyContext<'_>) -> NetworkResult<Self> {
        let defaults = Load::default();
        let mut load = Load {
            name: overlay.name().to_string(),
            bus: required_text(overlay, "bus")?,
            carrier: overlay.text_or("carrier", &defaults.carrier),
            p_min: overlay.number_or("p_min", defaults.p_min)?,
            p_max: overlay.number_or("p_max", defaults.p_max)?,
            scaling_factor: overlay.number_or("scaling_factor", defaults.scaling_factor)?,
            active: overlay.flag_or("active", defaults.active)?,
            profile_id: overlay.row_text("profile_id").map(str::to_string),
            series: defaults.series,
        };
        let len = ctx.snapshots.len();
        for attr in ["p_set", "q_set"] {
            let series = inline_series(overlay, attr, len)?;
            load.series.insert(attr.to_string(), series);
        }
        Ok(load)
    }
}

/// Demand written in the row itself: a comma-separated list with one value
/// per snapshot, or a single value broadcast over the horizon.
fn inline_series(overlay: &Overlay<'_>, column: &str, len: usize) -> NetworkResult<Vec<f64>> {
    let Some(text) = overlay.row_text(column) else {
        return Ok(vec![0.0; len]);
    };
    let values = text
        .split(',')
        .map(|part| {
            part.trim().parse::<f64>().map_err(|_| {
                overlay.invalid(format!("'{}' holds a non-numeric entry '{}'", column, part.trim()))
            })
        })
        .collect::<NetworkResult<Vec<f64>>>()?;
    match values.as_slice() {
        [single] => Ok(vec![*single; len]),
        _ if values.len() == len => Ok(values),
        _ => Err(overlay.invalid(format!(
            "{} {} values do not match {} snapshots",
            values.len(),
            column,
            len
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hyrenet_core::ErrorKind;
    use hyrenet_io::TechClass;

    fn network(periods: usize) -> Network {
        let start = NaiveDate::from_ymd_opt(2024, 10, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        Network::new(Snapshots::hourly(start, periods).unwrap())
    }

    fn with_buses(periods: usize) -> Network {
        let mut net = network(periods);
        let buses = Table::from_rows(
            "components/buses.csv",
            &["name", "v_nom", "carrier"],
            &[&["b1", "20", "AC"], &["b2", "20", ""]],
        );
        assert_eq!(ComponentAssembler::add_all::<Bus>(&mut net, &buses, None).unwrap(), 2);
        net
    }

    #[test]
    fn test_buses_take_defaults() {
        let net = with_buses(4);
        let b2 = net.bus("b2").unwrap();
        assert_eq!(b2.v_nom, Kilovolts(20.0));
        assert_eq!(b2.carrier, "AC");
        assert_eq!(b2.control, "PQ");
    }

    #[test]
    fn test_empty_table_adds_nothing() {
        let mut net = with_buses(4);
        let added = ComponentAssembler::add_all::<Link>(&mut net, &Table::empty(), None).unwrap();
        assert_eq!(added, 0);
        assert!(net.links.is_empty());
    }

    #[test]
    fn test_missing_required_column() {
        let mut net = with_buses(4);
        let lines = Table::from_rows("components/lines.csv", &["name", "bus0"], &[&["L1", "b1"]]);
        let err = ComponentAssembler::add_all::<Line>(&mut net, &lines, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidComponentData);
        assert!(err.to_string().contains("bus1"));
    }

    #[test]
    fn test_missing_bus_reference() {
        let mut net = with_buses(4);
        let gens = Table::from_rows("g", &["name", "bus"], &[&["G1", "b7"]]);
        let err = ComponentAssembler::add_all::<Generator>(&mut net, &gens, None).unwrap_err();
        assert_eq!(
            err,
            NetworkError::MissingBusReference {
                class: ComponentClass::Generator,
                component: "G1".into(),
                bus: "b7".into()
            }
        );
        assert!(net.generators.is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut net = with_buses(4);
        let gens = Table::from_rows("g", &["name", "bus"], &[&["G1", "b1"], &["G1", "b2"]]);
        let err = ComponentAssembler::add_all::<Generator>(&mut net, &gens, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateComponent);
        assert_eq!(net.generators["G1"].bus, "b1");
    }

    #[test]
    fn test_unknown_type() {
        let mut net = with_buses(4);
        let library = TechLibrary::from_table(
            TechClass::Generator,
            &Table::from_rows("lib", &["type", "efficiency"], &[&["ccgt", "0.58"]]),
        )
        .unwrap();
        let gens = Table::from_rows("g", &["name", "bus", "type"], &[&["G1", "b1", "UnknownGenType"]]);
        let err = ComponentAssembler::add_all::<Generator>(&mut net, &gens, Some(&library)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTechnologyType);

        let err = ComponentAssembler::add_all::<Generator>(&mut net, &gens, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTechnologyType);
    }

    #[test]
    fn test_type_on_class_without_library_is_ignored() {
        let mut net = with_buses(4);
        let links = Table::from_rows("k", &["name", "bus0", "bus1", "type"], &[&["K1", "b1", "b2", "hvdc"]]);
        assert_eq!(ComponentAssembler::add_all::<Link>(&mut net, &links, None).unwrap(), 1);
    }

    #[test]
    fn test_line_impedance_from_line_type() {
        let mut net = with_buses(4);
        let library = TechLibrary::from_table(
            TechClass::LineType,
            &Table::from_rows(
                "lib",
                &["type", "r_per_length", "x_per_length"],
                &[&["ACSR-240", "0.12", "0.39"]],
            ),
        )
        .unwrap();
        let lines = Table::from_rows(
            "l",
            &["name", "bus0", "bus1", "type", "length", "x"],
            &[&["L1", "b1", "b2", "ACSR-240", "10", ""], &["L2", "b1", "b2", "ACSR-240", "10", "2.5"]],
        );
        ComponentAssembler::add_all::<Line>(&mut net, &lines, Some(&library)).unwrap();

        let l1 = &net.lines["L1"];
        assert!((l1.r.value() - 1.2).abs() < 1e-9);
        assert!((l1.x.value() - 3.9).abs() < 1e-9);
        assert_eq!(net.lines["L2"].x, Ohms(2.5));
    }

    #[test]
    fn test_storage_efficiency_from_round_trip() {
        let mut net = with_buses(4);
        let library = TechLibrary::from_table(
            TechClass::Storage,
            &Table::from_rows(
                "lib",
                &["type", "round_trip_efficiency", "cycle_life", "max_hours"],
                &[&["li-ion", "0.81", "5000", "4"]],
            ),
        )
        .unwrap();
        let storage = Table::from_rows(
            "s",
            &["name", "bus", "type", "p_nom"],
            &[&["S1", "b1", "li-ion", "10"]],
        );
        ComponentAssembler::add_all::<StorageUnit>(&mut net, &storage, Some(&library)).unwrap();

        let s1 = &net.storage_units["S1"];
        assert!((s1.efficiency_store - 0.9).abs() < 1e-12);
        assert!((s1.efficiency_dispatch - 0.9).abs() < 1e-12);
        assert_eq!(s1.max_hours, 4.0);
        assert_eq!(s1.cycle_life, Some(5000.0));
        assert_eq!(s1.p_max_pu, 1.0);
    }

    #[test]
    fn test_load_series_sources() {
        let mut net = with_buses(3);
        let loads = Table::from_rows(
            "d",
            &["name", "bus", "p_set", "q_set"],
            &[
                &["D1", "b1", "1,2,3", ""],
                &["D2", "b2", "4.5", "0.5"],
                &["D3", "b2", "", ""],
            ],
        );
        ComponentAssembler::add_all::<Load>(&mut net, &loads, None).unwrap();

        assert_eq!(net.loads["D1"].p_set(), &[1.0, 2.0, 3.0]);
        assert_eq!(net.loads["D1"].q_set(), &[0.0, 0.0, 0.0]);
        assert_eq!(net.loads["D2"].p_set(), &[4.5, 4.5, 4.5]);
        assert_eq!(net.loads["D2"].q_set(), &[0.5, 0.5, 0.5]);
        assert_eq!(net.loads["D3"].p_set(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_load_series_length_mismatch() {
        let mut net = with_buses(3);
        let loads = Table::from_rows("d", &["name", "bus", "p_set"], &[&["D1", "b1", "1,2"]]);
        let err = ComponentAssembler::add_all::<Load>(&mut net, &loads, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidComponentData);
        assert!(err.to_string().contains("2 p_set values do not match 3 snapshots"));
    }
}
