//! Pivot table computation over enriched records.
//!
//! Records are grouped by the joined values of the row attributes and of the
//! column attributes. Each group feeds an accumulator; row, column and grand
//! totals get their own accumulators since unique counts and averages do not
//! add up from the cells.

use crate::core::{Record, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use strum::{Display, EnumIter, IntoEnumIterator};

/// Key part used when a record lacks an attribute or holds null
pub const NULL_KEY: &str = "null";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Aggregator {
    #[default]
    Count,
    #[strum(serialize = "Count Unique Values")]
    CountUniqueValues,
    Sum,
    #[strum(serialize = "Integer Sum")]
    IntegerSum,
    Average,
    Minimum,
    Maximum,
}

impl Aggregator {
    /// Whether the aggregator reads the value field
    pub fn needs_value(self) -> bool {
        !matches!(self, Aggregator::Count)
    }

    pub fn next(self) -> Self {
        let all: Vec<Self> = Self::iter().collect();
        let pos = all.iter().position(|a| *a == self).unwrap_or(0);
        all[(pos + 1) % all.len()]
    }

    pub fn format(self, value: f64) -> String {
        match self {
            Aggregator::Count | Aggregator::CountUniqueValues | Aggregator::IntegerSum => {
                format!("{:.0}", value)
            }
            _ => format!("{:.2}", value),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Renderer {
    #[default]
    Table,
    #[strum(serialize = "Table Heatmap")]
    Heatmap,
    #[strum(serialize = "Bar Chart")]
    BarChart,
}

impl Renderer {
    pub fn next(self) -> Self {
        let all: Vec<Self> = Self::iter().collect();
        let pos = all.iter().position(|r| *r == self).unwrap_or(0);
        all[(pos + 1) % all.len()]
    }
}

/// Row/column/aggregation choices for the pivot view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotConfig {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    pub aggregator: Aggregator,
    pub value_field: Option<String>,
    pub renderer: Renderer,
}

/// Running state for one cell or total
#[derive(Debug, Clone, Default)]
struct Accumulator {
    count: u64,
    numbers: u64,
    sum: f64,
    int_sum: i64,
    min: Option<f64>,
    max: Option<f64>,
    unique: HashSet<String>,
}

impl Accumulator {
    fn push(&mut self, record: &Record, config: &PivotConfig) {
        self.count += 1;
        let Some(field) = config.value_field.as_deref() else {
            return;
        };
        let Some(value) = record.get(field) else {
            return;
        };
        if config.aggregator == Aggregator::CountUniqueValues {
            self.unique.insert(value.to_string());
            return;
        }
        if let Some(n) = value.as_f64() {
            self.numbers += 1;
            self.sum += n;
            self.int_sum = self.int_sum.saturating_add(n.trunc() as i64);
            self.min = Some(self.min.map_or(n, |m| m.min(n)));
            self.max = Some(self.max.map_or(n, |m| m.max(n)));
        }
    }

    fn value(&self, aggregator: Aggregator) -> Option<f64> {
        match aggregator {
            Aggregator::Count => Some(self.count as f64),
            Aggregator::CountUniqueValues => Some(self.unique.len() as f64),
            Aggregator::Sum => Some(self.sum),
            Aggregator::IntegerSum => Some(self.int_sum as f64),
            Aggregator::Average => {
                (self.numbers > 0).then(|| self.sum / self.numbers as f64)
            }
            Aggregator::Minimum => self.min,
            Aggregator::Maximum => self.max,
        }
    }
}

/// Computed pivot table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotTable {
    pub aggregator: Aggregator,
    pub row_keys: Vec<Vec<String>>,
    pub col_keys: Vec<Vec<String>>,
    /// `cells[row][col]`; `None` where no record fell in the group
    pub cells: Vec<Vec<Option<f64>>>,
    pub row_totals: Vec<Option<f64>>,
    pub col_totals: Vec<Option<f64>>,
    pub grand_total: Option<f64>,
}

impl PivotTable {
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Largest cell value, for heatmap scaling
    pub fn max_cell(&self) -> Option<f64> {
        self.cells
            .iter()
            .flatten()
            .flatten()
            .copied()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
    }

    pub fn is_empty(&self) -> bool {
        self.row_keys.is_empty()
    }
}

/// Display form of a key made of several attribute values
pub fn key_label(key: &[String]) -> String {
    if key.is_empty() {
        "Totals".to_string()
    } else {
        key.join(" / ")
    }
}

fn key_part(record: &Record, attribute: &str) -> String {
    match record.get(attribute) {
        None | Some(Value::Null) => NULL_KEY.to_string(),
        Some(value) => value.to_string(),
    }
}

fn key_for(record: &Record, attributes: &[String]) -> Vec<String> {
    attributes.iter().map(|a| key_part(record, a)).collect()
}

fn finite_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numbers first in numeric order, then text in lexicographic order
///
/// `inf`, `NaN` and friends count as text.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (finite_number(a), finite_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn key_cmp(a: &[String], b: &[String]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| natural_cmp(x, y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// Attributes offered for pivoting, in header order
pub fn attributes(headers: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    headers
        .iter()
        .filter(|h| !h.is_empty() && seen.insert(h.as_str()))
        .cloned()
        .collect()
}

/// Group and aggregate `records` according to `config`
pub fn pivot(records: &[Record], config: &PivotConfig) -> PivotTable {
    let mut cells: HashMap<(Vec<String>, Vec<String>), Accumulator> = HashMap::new();
    let mut row_acc: HashMap<Vec<String>, Accumulator> = HashMap::new();
    let mut col_acc: HashMap<Vec<String>, Accumulator> = HashMap::new();
    let mut grand = Accumulator::default();

    for record in records {
        let row_key = key_for(record, &config.rows);
        let col_key = key_for(record, &config.cols);
        cells
            .entry((row_key.clone(), col_key.clone()))
            .or_default()
            .push(record, config);
        row_acc.entry(row_key).or_default().push(record, config);
        col_acc.entry(col_key).or_default().push(record, config);
        grand.push(record, config);
    }

    let mut row_keys: Vec<Vec<String>> = row_acc.keys().cloned().collect();
    let mut col_keys: Vec<Vec<String>> = col_acc.keys().cloned().collect();
    row_keys.sort_by(|a, b| key_cmp(a, b));
    col_keys.sort_by(|a, b| key_cmp(a, b));

    let aggregator = config.aggregator;
    let table_cells = row_keys
        .iter()
        .map(|r| {
            col_keys
                .iter()
                .map(|c| {
                    cells
                        .get(&(r.clone(), c.clone()))
                        .and_then(|acc| acc.value(aggregator))
                })
                .collect()
        })
        .collect();
    let row_totals = row_keys
        .iter()
        .map(|k| row_acc.get(k).and_then(|acc| acc.value(aggregator)))
        .collect();
    let col_totals = col_keys
        .iter()
        .map(|k| col_acc.get(k).and_then(|acc| acc.value(aggregator)))
        .collect();
    let grand_total = if records.is_empty() {
        None
    } else {
        grand.value(aggregator)
    };

    PivotTable {
        aggregator,
        row_keys,
        col_keys,
        cells: table_cells,
        row_totals,
        col_totals,
        grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::enrich::enrich_records;
    use pretty_assertions::assert_eq;

    fn carriers() -> Vec<Record> {
        vec![
            Record::new()
                .with("entity_type", "CARRIER")
                .with("state", "TX")
                .with("power_units", 10_i64)
                .with("date", "2024-01-10"),
            Record::new()
                .with("entity_type", "BROKER")
                .with("state", "TX")
                .with("power_units", 0_i64)
                .with("date", "2024-01-22"),
            Record::new()
                .with("entity_type", "CARRIER")
                .with("state", "CA")
                .with("power_units", 4_i64)
                .with("date", "2024-02-03"),
            Record::new()
                .with("entity_type", "CARRIER")
                .with("state", "TX")
                .with("power_units", "n/a")
                .with("date", "2024-02-14"),
        ]
    }

    fn keys(table: &PivotTable) -> Vec<String> {
        table.row_keys.iter().map(|k| key_label(k)).collect()
    }

    #[test]
    fn test_count_by_row_attribute() {
        let config = PivotConfig {
            rows: vec!["state".to_string()],
            ..PivotConfig::default()
        };
        let table = pivot(&carriers(), &config);

        assert_eq!(keys(&table), vec!["CA", "TX"]);
        assert_eq!(table.col_keys, vec![Vec::<String>::new()]);
        assert_eq!(table.row_totals, vec![Some(1.0), Some(3.0)]);
        assert_eq!(table.grand_total, Some(4.0));
    }

    #[test]
    fn test_rows_by_cols_sum() {
        let config = PivotConfig {
            rows: vec!["state".to_string()],
            cols: vec!["entity_type".to_string()],
            aggregator: Aggregator::Sum,
            value_field: Some("power_units".to_string()),
            ..PivotConfig::default()
        };
        let table = pivot(&carriers(), &config);

        assert_eq!(
            table.col_keys,
            vec![vec!["BROKER".to_string()], vec!["CARRIER".to_string()]]
        );
        // CA has no brokers
        assert_eq!(table.value(0, 0), None);
        assert_eq!(table.value(0, 1), Some(4.0));
        assert_eq!(table.value(1, 0), Some(0.0));
        // Non-numeric "n/a" is ignored
        assert_eq!(table.value(1, 1), Some(10.0));
        assert_eq!(table.col_totals, vec![Some(0.0), Some(14.0)]);
        assert_eq!(table.grand_total, Some(14.0));
        assert_eq!(table.max_cell(), Some(10.0));
    }

    #[test]
    fn test_average_min_max_unique() {
        let records = carriers();
        let mut config = PivotConfig {
            value_field: Some("power_units".to_string()),
            aggregator: Aggregator::Average,
            ..PivotConfig::default()
        };
        assert_eq!(pivot(&records, &config).grand_total, Some(14.0 / 3.0));

        config.aggregator = Aggregator::Minimum;
        assert_eq!(pivot(&records, &config).grand_total, Some(0.0));

        config.aggregator = Aggregator::Maximum;
        assert_eq!(pivot(&records, &config).grand_total, Some(10.0));

        config.aggregator = Aggregator::CountUniqueValues;
        config.value_field = Some("state".to_string());
        assert_eq!(pivot(&records, &config).grand_total, Some(2.0));
    }

    #[test]
    fn test_pivot_on_derived_month() {
        let records = enrich_records(&carriers());
        let config = PivotConfig {
            rows: vec!["Month".to_string()],
            ..PivotConfig::default()
        };
        let table = pivot(&records, &config);

        assert_eq!(keys(&table), vec!["2024-01", "2024-02"]);
        assert_eq!(table.row_totals, vec![Some(2.0), Some(2.0)]);
    }

    #[test]
    fn test_missing_attribute_groups_as_null() {
        let records = vec![
            Record::new().with("state", "TX"),
            Record::new().with("state", Value::Null),
            Record::new(),
        ];
        let config = PivotConfig {
            rows: vec!["state".to_string()],
            ..PivotConfig::default()
        };
        let table = pivot(&records, &config);
        assert_eq!(keys(&table), vec!["TX", "null"]);
        assert_eq!(table.row_totals, vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_empty_input() {
        let table = pivot(&[], &PivotConfig::default());
        assert!(table.is_empty());
        assert_eq!(table.grand_total, None);
    }

    #[test]
    fn test_natural_key_order() {
        let mut parts = vec!["10", "9", "abc", "100", "Abc"];
        parts.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(parts, vec!["9", "10", "100", "Abc", "abc"]);
    }

    #[test]
    fn test_non_finite_words_sort_as_text() {
        let mut parts = vec!["nan", "inf", "2", "Infinity", "-1"];
        parts.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(parts, vec!["-1", "2", "Infinity", "inf", "nan"]);
    }

    #[test]
    fn test_cycling() {
        assert_eq!(Aggregator::Count.next(), Aggregator::CountUniqueValues);
        assert_eq!(Aggregator::Maximum.next(), Aggregator::Count);
        assert_eq!(Renderer::BarChart.next(), Renderer::Table);
        assert_eq!(Aggregator::CountUniqueValues.to_string(), "Count Unique Values");
    }

    #[test]
    fn test_attributes_deduplicate() {
        let headers = vec!["id".to_string(), "date".to_string(), "id".to_string()];
        assert_eq!(attributes(&headers), vec!["id", "date"]);
    }
}
