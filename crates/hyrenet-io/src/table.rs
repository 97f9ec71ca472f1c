//! Header-keyed CSV tables.
//!
//! Component, library and constraint files have open-ended column sets, so
//! they are read into a [`Table`] of string cells rather than deserialized
//! into fixed records. Typed interpretation happens at the consumer through
//! [`Row::get_str`] and [`Row::get_f64`]. Blank cells and `nan` are treated
//! as absent.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use csv::{ReaderBuilder, Trim};

/// A cell that is present but not a number
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidCell {
    pub column: String,
    pub value: String,
    pub line: usize,
}

impl fmt::Display for InvalidCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column '{}' on line {} is not a number: '{}'",
            self.column, self.line, self.value
        )
    }
}

/// One data row keyed by header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    line: usize,
    cells: BTreeMap<String, String>,
}

impl Row {
    pub fn new(line: usize, cells: BTreeMap<String, String>) -> Self {
        Self { line, cells }
    }

    /// 1-based line in the source file (header is line 1)
    pub fn line(&self) -> usize {
        self.line
    }

    /// Non-blank cell text
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !is_missing(v))
    }

    pub fn get_f64(&self, column: &str) -> Result<Option<f64>, InvalidCell> {
        match self.get_str(column) {
            None => Ok(None),
            Some(text) => text.parse::<f64>().map(Some).map_err(|_| InvalidCell {
                column: column.to_string(),
                value: text.to_string(),
                line: self.line,
            }),
        }
    }

    /// Columns with a value in this row
    pub fn present_columns(&self) -> impl Iterator<Item = &str> {
        self.cells
            .iter()
            .filter(|(_, v)| !is_missing(v.trim()))
            .map(|(k, _)| k.as_str())
    }
}

fn is_missing(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("nan")
}

/// Rows of one delimited file plus its header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    source: String,
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// The result of a source that could not be read
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse CSV text. Ragged rows are an error; cells are trimmed.
    pub fn from_reader<R: Read>(source: impl Into<String>, reader: R) -> Result<Self, csv::Error> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let cells = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            rows.push(Row::new(i + 2, cells));
        }
        Ok(Self {
            source: source.into(),
            headers,
            rows,
        })
    }

    /// Build a table in memory (tests, generated inputs)
    pub fn from_rows(source: impl Into<String>, headers: &[&str], rows: &[&[&str]]) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, values)| {
                let cells = headers
                    .iter()
                    .cloned()
                    .zip(values.iter().map(|v| v.to_string()))
                    .collect();
                Row::new(i + 2, cells)
            })
            .collect();
        Self {
            source: source.into(),
            headers,
            rows,
        }
    }

    /// Root-relative path this table was read from (empty for in-memory tables)
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Required columns absent from the header
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|column| !self.has_column(column))
            .collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_keys_by_header() {
        let csv = "name, v_nom ,x\nb1, 110 ,\nb2,20,nan\n";
        let table = Table::from_reader("components/buses.csv", csv.as_bytes()).unwrap();

        assert_eq!(table.headers(), &["name", "v_nom", "x"]);
        assert_eq!(table.len(), 2);
        let row = &table.rows()[0];
        assert_eq!(row.get_str("name"), Some("b1"));
        assert_eq!(row.get_f64("v_nom").unwrap(), Some(110.0));
        assert_eq!(row.get_f64("x").unwrap(), None);
        assert_eq!(table.rows()[1].get_f64("x").unwrap(), None);
        assert_eq!(row.line(), 2);
    }

    #[test]
    fn test_non_numeric_cell() {
        let table = Table::from_rows("t", &["name", "p_nom"], &[&["G1", "lots"]]);
        let err = table.rows()[0].get_f64("p_nom").unwrap_err();
        assert_eq!(err.column, "p_nom");
        assert!(err.to_string().contains("'lots'"));
    }

    #[test]
    fn test_missing_columns() {
        let table = Table::from_rows("t", &["name", "bus"], &[]);
        assert!(table.is_empty());
        assert_eq!(table.missing_columns(&["name", "bus0", "bus1"]), vec!["bus0", "bus1"]);
    }

    #[test]
    fn test_ragged_rows_fail() {
        let csv = "name,v_nom\nb1,110,extra\n";
        assert!(Table::from_reader("t", csv.as_bytes()).is_err());
    }

    #[test]
    fn test_present_columns() {
        let table = Table::from_rows("t", &["name", "p_nom", "type"], &[&["G1", "", "ccgt"]]);
        let present: Vec<&str> = table.rows()[0].present_columns().collect();
        assert_eq!(present, vec!["name", "type"]);
    }
}
