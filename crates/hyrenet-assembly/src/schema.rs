//! Per-class schema descriptors and the row/spec overlay.
//!
//! Every component class is assembled by the same procedure; what differs
//! per class is captured by a [`ComponentSchema`]: which file it comes
//! from, which columns must exist, which technology library its `type`
//! refers to and which columns name buses.
//!
//! An [`Overlay`] resolves one field at a time as the first present value
//! of the row, then the technology spec, then the caller's default.

use hyrenet_core::{ComponentClass, NetworkError, NetworkResult};
use hyrenet_io::{Row, TechClass, TechnologySpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSchema {
    pub class: ComponentClass,
    pub file: &'static str,
    pub required: &'static [&'static str],
    pub tech_class: Option<TechClass>,
    pub bus_columns: &'static [&'static str],
}

impl ComponentSchema {
    /// Number of buses a component of this class attaches to (0, 1 or 2)
    pub fn bus_arity(&self) -> usize {
        self.bus_columns.len()
    }

    pub fn for_class(class: ComponentClass) -> &'static ComponentSchema {
        match class {
            ComponentClass::Bus => &BUS_SCHEMA,
            ComponentClass::Transformer => &TRANSFORMER_SCHEMA,
            ComponentClass::Line => &LINE_SCHEMA,
            ComponentClass::Generator => &GENERATOR_SCHEMA,
            ComponentClass::StorageUnit => &STORAGE_UNIT_SCHEMA,
            ComponentClass::Link => &LINK_SCHEMA,
            ComponentClass::Load => &LOAD_SCHEMA,
        }
    }
}

pub const BUS_SCHEMA: ComponentSchema = ComponentSchema {
    class: ComponentClass::Bus,
    file: "buses.csv",
    required: &["name", "v_nom"],
    tech_class: None,
    bus_columns: &[],
};

pub const TRANSFORMER_SCHEMA: ComponentSchema = ComponentSchema {
    class: ComponentClass::Transformer,
    file: "transformers.csv",
    required: &["name", "bus0", "bus1"],
    tech_class: Some(TechClass::Transformer),
    bus_columns: &["bus0", "bus1"],
};

pub const LINE_SCHEMA: ComponentSchema = ComponentSchema {
    class: ComponentClass::Line,
    file: "lines.csv",
    required: &["name", "bus0", "bus1"],
    tech_class: Some(TechClass::LineType),
    bus_columns: &["bus0", "bus1"],
};

pub const GENERATOR_SCHEMA: ComponentSchema = ComponentSchema {
    class: ComponentClass::Generator,
    file: "generators.csv",
    required: &["name", "bus"],
    tech_class: Some(TechClass::Generator),
    bus_columns: &["bus"],
};

pub const STORAGE_UNIT_SCHEMA: ComponentSchema = ComponentSchema {
    class: ComponentClass::StorageUnit,
    file: "storage_units.csv",
    required: &["name", "bus"],
    tech_class: Some(TechClass::Storage),
    bus_columns: &["bus"],
};

pub const LINK_SCHEMA: ComponentSchema = ComponentSchema {
    class: ComponentClass::Link,
    file: "links.csv",
    required: &["name", "bus0", "bus1"],
    tech_class: None,
    bus_columns: &["bus0", "bus1"],
};

pub const LOAD_SCHEMA: ComponentSchema = ComponentSchema {
    class: ComponentClass::Load,
    file: "loads.csv",
    required: &["name", "bus"],
    tech_class: None,
    bus_columns: &["bus"],
};

/// Field resolution for one component: row, then spec, then default.
#[derive(Debug, Clone, Copy)]
pub struct Overlay<'a> {
    class: ComponentClass,
    name: &'a str,
    row: &'a Row,
    spec: Option<&'a TechnologySpec>,
}

impl<'a> Overlay<'a> {
    pub fn new(
        class: ComponentClass,
        name: &'a str,
        row: &'a Row,
        spec: Option<&'a TechnologySpec>,
    ) -> Self {
        Self {
            class,
            name,
            row,
            spec,
        }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn class(&self) -> ComponentClass {
        self.class
    }

    pub fn has_spec(&self) -> bool {
        self.spec.is_some()
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.row
            .get_str(column)
            .or_else(|| self.spec.and_then(|spec| spec.get_str(column)))
            .map(str::to_string)
    }

    pub fn text_or(&self, column: &str, default: &str) -> String {
        self.text(column).unwrap_or_else(|| default.to_string())
    }

    /// Text taken from the row only (never from the spec)
    pub fn row_text(&self, column: &str) -> Option<&'a str> {
        self.row.get_str(column)
    }

    pub fn number(&self, column: &str) -> NetworkResult<Option<f64>> {
        if let Some(value) = self.row_number(column)? {
            return Ok(Some(value));
        }
        match self.spec {
            Some(spec) => spec.get_f64(column).map_err(|cell| self.invalid(cell.to_string())),
            None => Ok(None),
        }
    }

    /// Number taken from the row only
    pub fn row_number(&self, column: &str) -> NetworkResult<Option<f64>> {
        self.row
            .get_f64(column)
            .map_err(|cell| self.invalid(cell.to_string()))
    }

    pub fn number_or(&self, column: &str, default: f64) -> NetworkResult<f64> {
        Ok(self.number(column)?.unwrap_or(default))
    }

    pub fn flag_or(&self, column: &str, default: bool) -> NetworkResult<bool> {
        match self.text(column) {
            None => Ok(default),
            Some(text) => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "1.0" => Ok(true),
                "false" | "no" | "0" | "0.0" => Ok(false),
                _ => Err(self.invalid(format!("column '{}' is not a boolean: '{}'", column, text))),
            },
        }
    }

    pub fn invalid(&self, detail: String) -> NetworkError {
        NetworkError::InvalidComponentData {
            class: self.class,
            entity: self.name.to_string(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyrenet_core::ErrorKind;
    use hyrenet_io::Table;

    #[test]
    fn test_schemas_follow_assembly_order() {
        for class in ComponentClass::ASSEMBLY_ORDER {
            let schema = ComponentSchema::for_class(class);
            assert_eq!(schema.class, class);
            assert!(schema.required.contains(&"name"));
            for column in schema.bus_columns {
                assert!(schema.required.contains(column));
            }
        }
        assert_eq!(BUS_SCHEMA.bus_arity(), 0);
        assert_eq!(GENERATOR_SCHEMA.bus_arity(), 1);
        assert_eq!(LINE_SCHEMA.bus_arity(), 2);
    }

    #[test]
    fn test_row_overrides_spec() {
        let rows = Table::from_rows("g", &["name", "bus", "efficiency", "carrier"], &[&["G1", "b1", "0.4", ""]]);
        let specs = Table::from_rows(
            "lib",
            &["type", "efficiency", "marginal_cost", "carrier"],
            &[&["ccgt", "0.58", "45", "gas"]],
        );
        let overlay = Overlay::new(
            ComponentClass::Generator,
            "G1",
            &rows.rows()[0],
            Some(&specs.rows()[0]),
        );

        assert_eq!(overlay.number("efficiency").unwrap(), Some(0.4));
        assert_eq!(overlay.number("marginal_cost").unwrap(), Some(45.0));
        assert_eq!(overlay.number_or("capital_cost", 12.0).unwrap(), 12.0);
        assert_eq!(overlay.text("carrier").as_deref(), Some("gas"));
        assert_eq!(overlay.row_number("marginal_cost").unwrap(), None);
    }

    #[test]
    fn test_invalid_cells() {
        let rows = Table::from_rows("g", &["name", "p_nom", "active"], &[&["G1", "big", "maybe"]]);
        let overlay = Overlay::new(ComponentClass::Generator, "G1", &rows.rows()[0], None);

        let err = overlay.number("p_nom").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidComponentData);
        assert!(overlay.flag_or("active", true).is_err());
        assert!(overlay.flag_or("committable", false).is_ok());
    }
}
