//! Timestamp-indexed profile tables.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use hyrenet_core::time::{parse_timestamp, DEFAULT_INDEX_NAME};
use hyrenet_core::TimeSeries;

use crate::table::Table;

/// A profile file: first column is the time index, every other column numeric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileTable {
    pub source: String,
    pub index_name: String,
    pub index: Vec<NaiveDateTime>,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl ProfileTable {
    pub fn empty() -> Self {
        Self {
            index_name: DEFAULT_INDEX_NAME.to_string(),
            ..Self::default()
        }
    }

    /// Interpret a parsed table as a profile. An unnamed first column is the snapshot index.
    pub fn from_table(table: &Table) -> Result<Self, String> {
        let Some((index_column, value_columns)) = table.headers().split_first() else {
            return Err("profile has no columns".to_string());
        };
        let index_name = if index_column.is_empty() {
            DEFAULT_INDEX_NAME.to_string()
        } else {
            index_column.clone()
        };

        let mut index = Vec::with_capacity(table.len());
        let mut columns: BTreeMap<String, Vec<f64>> = value_columns
            .iter()
            .map(|c| (c.clone(), Vec::with_capacity(table.len())))
            .collect();

        for row in table.rows() {
            let stamp = row
                .get_str(index_column)
                .and_then(parse_timestamp)
                .ok_or_else(|| format!("line {}: unreadable timestamp", row.line()))?;
            index.push(stamp);
            for column in value_columns {
                let value = row
                    .get_f64(column)
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| format!("line {}: no value for '{}'", row.line(), column))?;
                if let Some(values) = columns.get_mut(column) {
                    values.push(value);
                }
            }
        }

        Ok(Self {
            source: table.source().to_string(),
            index_name,
            index,
            columns,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// One column as a time series carrying this table's index
    pub fn series(&self, column: &str) -> Option<TimeSeries> {
        self.columns.get(column).map(|values| {
            TimeSeries::new(self.index_name.clone(), self.index.clone(), values.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_index() {
        let table = Table::from_rows(
            "profiles/load_profiles/L1.csv",
            &["snapshot", "p_set", "q_set"],
            &[
                &["2024-10-01 00:00:00", "1.5", "0.2"],
                &["2024-10-01 01:00:00", "2.5", "0.3"],
            ],
        );
        let profile = ProfileTable::from_table(&table).unwrap();
        assert_eq!(profile.index_name, "snapshot");
        assert_eq!(profile.index.len(), 2);
        let p_set = profile.series("p_set").unwrap();
        assert_eq!(p_set.values, vec![1.5, 2.5]);
        assert!(profile.has_column("q_set"));
        assert!(profile.series("p_max_pu").is_none());
    }

    #[test]
    fn test_unnamed_index_defaults_to_snapshot() {
        let table = Table::from_rows("p", &["", "p_max_pu"], &[&["2024-10-01", "0.4"]]);
        let profile = ProfileTable::from_table(&table).unwrap();
        assert_eq!(profile.index_name, DEFAULT_INDEX_NAME);
    }

    #[test]
    fn test_other_index_name_is_kept() {
        let table = Table::from_rows("p", &["time", "p_set"], &[&["2024-10-01 00:00", "1"]]);
        let profile = ProfileTable::from_table(&table).unwrap();
        assert_eq!(profile.index_name, "time");
    }

    #[test]
    fn test_bad_cells_are_reported() {
        let bad_time = Table::from_rows("p", &["snapshot", "p_set"], &[&["soon", "1"]]);
        assert!(ProfileTable::from_table(&bad_time).is_err());

        let bad_value = Table::from_rows("p", &["snapshot", "p_set"], &[&["2024-10-01", "x"]]);
        assert!(ProfileTable::from_table(&bad_value).is_err());
    }
}
