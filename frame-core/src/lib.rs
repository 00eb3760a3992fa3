use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

mod labels;

pub use labels::display_label;

/// Calendar year of a statistics row.
pub type Year = i32;

/// District keys are 6-character zero-padded strings.
pub const KEY_LEN: usize = 6;

/// The leading metric columns of every metric frame are the offence groups
/// of the Kriminalitätsatlas, in file order.
pub const CRIME_COLUMN_COUNT: usize = 16;

/// Prediction frames carry 9 historical years followed by 5 forecast years
/// per district. The split is positional and is not derived from any date
/// field; do not "fix" this without confirming intent with the data owners.
pub const ACTUAL_YEARS: usize = 9;
pub const FORECAST_YEARS: usize = 5;

/// Restore the zero-padded key format that spreadsheet storage strips.
///
/// Pads with a single `"0"` when the string form is shorter than
/// [`KEY_LEN`]; longer-or-equal inputs pass through unchanged. Only one pad
/// is applied, so inputs shorter than 5 characters stay under 6 — real keys
/// are always 5 or 6 characters.
pub fn pad_key<T: fmt::Display>(raw: T) -> String {
    let s = raw.to_string();
    if s.len() < KEY_LEN {
        format!("0{s}")
    } else {
        s
    }
}

/// One sub-district → district mapping row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRow {
    pub key_2: String,
    pub key_1: String,
}

/// Lookup table mapping fine-grained `key_2` units to district `key_1`s.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyTable {
    rows: Vec<KeyRow>,
}

impl KeyTable {
    pub fn new(rows: Vec<KeyRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[KeyRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// District key for a sub-district, if mapped.
    pub fn district_for(&self, key_2: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.key_2 == key_2)
            .map(|r| r.key_1.as_str())
    }

    /// Distinct district keys, ordered.
    pub fn district_keys(&self) -> BTreeSet<String> {
        self.rows.iter().map(|r| r.key_1.clone()).collect()
    }
}

/// Which of the three structurally identical metric variants to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricScale {
    Total,
    PerCapita,
    PerArea,
}

impl MetricScale {
    pub const ALL: [MetricScale; 3] =
        [MetricScale::Total, MetricScale::PerCapita, MetricScale::PerArea];

    /// Display name as shown in the scale dropdown.
    pub fn label(&self) -> &'static str {
        match self {
            MetricScale::Total => "Total",
            MetricScale::PerCapita => "Per capita",
            MetricScale::PerArea => "Per square kilometer",
        }
    }
}

impl FromStr for MetricScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Total" | "total" => Ok(MetricScale::Total),
            "Per capita" | "per-capita" | "per_capita" => Ok(MetricScale::PerCapita),
            "Per square kilometer" | "per-area" | "per_area" => Ok(MetricScale::PerArea),
            other => Err(format!("unknown metric scale: {other}")),
        }
    }
}

impl fmt::Display for MetricScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One (district, year) observation with values aligned to the frame's
/// column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    /// District key (`key_1`), zero-padded.
    pub key: String,
    /// District display name (Bezirksregion).
    pub district: String,
    pub year: Year,
    pub values: Vec<f64>,
}

/// A metric table: rows keyed by (district, year), columns are named
/// statistics. The first [`CRIME_COLUMN_COUNT`] columns are offence groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricFrame {
    columns: Vec<String>,
    rows: Vec<MetricRow>,
}

impl MetricFrame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: MetricRow) {
        assert_eq!(
            row.values.len(),
            self.columns.len(),
            "row width must match column count"
        );
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The offence-group columns (leading window of the column list).
    pub fn crime_columns(&self) -> &[String] {
        let n = CRIME_COLUMN_COUNT.min(self.columns.len());
        &self.columns[..n]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Row for a district display name in a given year.
    pub fn find_row(&self, district: &str, year: Year) -> Option<&MetricRow> {
        self.rows
            .iter()
            .find(|r| r.district == district && r.year == year)
    }

    /// All rows of one year, in frame order.
    pub fn year_rows(&self, year: Year) -> Vec<&MetricRow> {
        self.rows.iter().filter(|r| r.year == year).collect()
    }

    /// Distinct years, ascending.
    pub fn years(&self) -> Vec<Year> {
        let set: BTreeSet<Year> = self.rows.iter().map(|r| r.year).collect();
        set.into_iter().collect()
    }

    /// Distinct district keys, ordered.
    pub fn district_keys(&self) -> BTreeSet<String> {
        self.rows.iter().map(|r| r.key.clone()).collect()
    }

    /// Drop all rows whose key is not in `keep`. Returns the distinct keys
    /// that were dropped, for the caller to report.
    pub fn retain_keys(&mut self, keep: &BTreeSet<String>) -> Vec<String> {
        let dropped: BTreeSet<String> = self
            .rows
            .iter()
            .filter(|r| !keep.contains(&r.key))
            .map(|r| r.key.clone())
            .collect();
        self.rows.retain(|r| keep.contains(&r.key));
        dropped.into_iter().collect()
    }
}

/// One (district, year) row of the forecast table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub district: String,
    pub year: Year,
    pub values: Vec<f64>,
}

/// Historical + forecast crime values per district and year. The first
/// [`ACTUAL_YEARS`] rows of a district are historical, the rest forecast.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionFrame {
    columns: Vec<String>,
    rows: Vec<PredictionRow>,
}

impl PredictionFrame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: PredictionRow) {
        assert_eq!(
            row.values.len(),
            self.columns.len(),
            "row width must match column count"
        );
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[PredictionRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// District names in first-seen file order (dropdown order).
    pub fn districts(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for row in &self.rows {
            if !out.iter().any(|d| d == &row.district) {
                out.push(row.district.clone());
            }
        }
        out
    }

    /// (year, value) series for one district and column, in row order.
    pub fn district_series(&self, district: &str, column: &str) -> Vec<(Year, f64)> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter(|r| r.district == district)
            .map(|r| (r.year, r.values[idx]))
            .collect()
    }
}

/// Model feature importances: rows are feature names, columns are
/// crime-type labels, cells are importance scores in [0, 1] per column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportanceFrame {
    crime_columns: Vec<String>,
    features: Vec<String>,
    /// `scores[feature][crime]`, aligned with `features` × `crime_columns`.
    scores: Vec<Vec<f64>>,
}

impl ImportanceFrame {
    pub fn new(crime_columns: Vec<String>) -> Self {
        Self {
            crime_columns,
            features: Vec::new(),
            scores: Vec::new(),
        }
    }

    pub fn push_feature(&mut self, name: String, scores: Vec<f64>) {
        assert_eq!(
            scores.len(),
            self.crime_columns.len(),
            "score row width must match crime column count"
        );
        self.features.push(name);
        self.scores.push(scores);
    }

    pub fn crime_columns(&self) -> &[String] {
        &self.crime_columns
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Top `n` (feature, score) pairs for a crime column, descending, with
    /// stable first-occurrence tie-break. `None` if the column is unknown.
    pub fn top_features(&self, crime: &str, n: usize) -> Option<Vec<(String, f64)>> {
        let col = self.crime_columns.iter().position(|c| c == crime)?;
        let values: Vec<f64> = self.scores.iter().map(|row| row[col]).collect();
        let top = top_n(&values, n);
        Some(
            top.into_iter()
                .map(|i| (self.features[i].clone(), values[i]))
                .collect(),
        )
    }
}

/// Indices of `values` ordered descending by value. The sort is stable, so
/// equal values keep their original order (first occurrence wins).
pub fn rank_desc(values: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    idx
}

/// Indices of the `n` largest values, descending.
pub fn top_n(values: &[f64], n: usize) -> Vec<usize> {
    let mut idx = rank_desc(values);
    idx.truncate(n);
    idx
}
