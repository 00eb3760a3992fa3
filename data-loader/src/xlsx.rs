//! Spreadsheet reading. The calamine-facing part is a thin shim; all actual
//! parsing operates on plain cell grids so it stays testable without
//! fixture files.

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};

use frame_core::{
    display_label, pad_key, ImportanceFrame, KeyRow, KeyTable, MetricFrame, MetricRow,
    PredictionFrame, PredictionRow, Year,
};

use crate::LoadError;

/// Read the first worksheet of an xlsx file as a grid of cells.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<Data>>, LoadError> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: calamine::XlsxError| LoadError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::EmptySheet {
            path: path.to_path_buf(),
        })?
        .map_err(|e| LoadError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(range.rows().map(|r| r.to_vec()).collect())
}

/// String form of a cell; numeric cells lose any trailing `.0`, which is how
/// spreadsheet storage mangles the zero-padded keys in the first place.
pub fn cell_str(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

pub fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        Data::Empty => Some(0.0),
        _ => None,
    }
}

pub fn cell_year(cell: &Data) -> Option<Year> {
    match cell {
        Data::Float(f) => Some(*f as Year),
        Data::Int(i) => Some(*i as Year),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn header_row(file: &str, rows: &[Vec<Data>]) -> Result<Vec<String>, LoadError> {
    let first = rows.first().ok_or_else(|| LoadError::MissingColumn {
        file: file.to_string(),
        column: "header row".to_string(),
    })?;
    Ok(first
        .iter()
        .map(|c| cell_str(c).unwrap_or_default())
        .collect())
}

fn require_column(file: &str, headers: &[String], name: &str) -> Result<usize, LoadError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| LoadError::MissingColumn {
            file: file.to_string(),
            column: name.to_string(),
        })
}

fn bad_cell(file: &str, row: usize, column: &str) -> LoadError {
    LoadError::BadCell {
        file: file.to_string(),
        row,
        column: column.to_string(),
    }
}

/// Parse a metric spreadsheet: `key_1`, `Bezirksregion`, `year`, then metric
/// columns in file order. Keys are re-padded, metric headers run through the
/// display-label map.
pub fn parse_metric_frame(file: &str, rows: &[Vec<Data>]) -> Result<MetricFrame, LoadError> {
    let headers = header_row(file, rows)?;
    let key_col = require_column(file, &headers, "key_1")?;
    let district_col = require_column(file, &headers, "Bezirksregion")?;
    let year_col = require_column(file, &headers, "year")?;

    let value_cols: Vec<usize> = (0..headers.len())
        .filter(|&i| i != key_col && i != district_col && i != year_col && !headers[i].is_empty())
        .collect();
    let columns: Vec<String> = value_cols
        .iter()
        .map(|&i| display_label(&headers[i]).to_string())
        .collect();

    let mut frame = MetricFrame::new(columns);
    for (row_idx, row) in rows.iter().enumerate().skip(1) {
        let key = cell_str(&row[key_col])
            .map(pad_key)
            .ok_or_else(|| bad_cell(file, row_idx, "key_1"))?;
        let district =
            cell_str(&row[district_col]).ok_or_else(|| bad_cell(file, row_idx, "Bezirksregion"))?;
        let year = cell_year(&row[year_col]).ok_or_else(|| bad_cell(file, row_idx, "year"))?;
        let values = value_cols
            .iter()
            .map(|&i| cell_f64(&row[i]).ok_or_else(|| bad_cell(file, row_idx, &headers[i])))
            .collect::<Result<Vec<f64>, LoadError>>()?;
        frame.push_row(MetricRow {
            key,
            district,
            year,
            values,
        });
    }
    Ok(frame)
}

/// Parse the sub-district → district key lookup. Both key columns are
/// re-padded after the spreadsheet stripped their leading zeros.
pub fn parse_key_table(file: &str, rows: &[Vec<Data>]) -> Result<KeyTable, LoadError> {
    let headers = header_row(file, rows)?;
    let key_1_col = require_column(file, &headers, "key_1")?;
    let key_2_col = require_column(file, &headers, "key_2")?;

    let mut out = Vec::new();
    for (row_idx, row) in rows.iter().enumerate().skip(1) {
        let key_1 = cell_str(&row[key_1_col])
            .map(pad_key)
            .ok_or_else(|| bad_cell(file, row_idx, "key_1"))?;
        let key_2 = cell_str(&row[key_2_col])
            .map(pad_key)
            .ok_or_else(|| bad_cell(file, row_idx, "key_2"))?;
        out.push(KeyRow { key_2, key_1 });
    }
    Ok(KeyTable::new(out))
}

/// Parse the forecast spreadsheet: `Bezirksregion`, `year`, then crime-type
/// columns. Row order per district is preserved; the actual/forecast split
/// downstream is positional.
pub fn parse_prediction_frame(
    file: &str,
    rows: &[Vec<Data>],
) -> Result<PredictionFrame, LoadError> {
    let headers = header_row(file, rows)?;
    let district_col = require_column(file, &headers, "Bezirksregion")?;
    let year_col = require_column(file, &headers, "year")?;

    let value_cols: Vec<usize> = (0..headers.len())
        .filter(|&i| i != district_col && i != year_col && !headers[i].is_empty())
        .collect();
    let columns: Vec<String> = value_cols
        .iter()
        .map(|&i| display_label(&headers[i]).to_string())
        .collect();

    let mut frame = PredictionFrame::new(columns);
    for (row_idx, row) in rows.iter().enumerate().skip(1) {
        let district =
            cell_str(&row[district_col]).ok_or_else(|| bad_cell(file, row_idx, "Bezirksregion"))?;
        let year = cell_year(&row[year_col]).ok_or_else(|| bad_cell(file, row_idx, "year"))?;
        let values = value_cols
            .iter()
            .map(|&i| cell_f64(&row[i]).ok_or_else(|| bad_cell(file, row_idx, &headers[i])))
            .collect::<Result<Vec<f64>, LoadError>>()?;
        frame.push_row(PredictionRow {
            district,
            year,
            values,
        });
    }
    Ok(frame)
}

/// Parse the feature-importance spreadsheet. The file stores one row per
/// crime type with one column per model feature; this transposes it into
/// the feature-major [`ImportanceFrame`] orientation.
pub fn parse_importance_frame(
    file: &str,
    rows: &[Vec<Data>],
) -> Result<ImportanceFrame, LoadError> {
    let headers = header_row(file, rows)?;
    if headers.len() < 2 {
        return Err(LoadError::MissingColumn {
            file: file.to_string(),
            column: "feature columns".to_string(),
        });
    }
    let features: Vec<String> = headers[1..].to_vec();

    let mut crime_labels = Vec::new();
    let mut by_crime: Vec<Vec<f64>> = Vec::new();
    for (row_idx, row) in rows.iter().enumerate().skip(1) {
        let crime = cell_str(&row[0]).ok_or_else(|| bad_cell(file, row_idx, "crime type"))?;
        let scores = (1..headers.len())
            .map(|i| cell_f64(&row[i]).ok_or_else(|| bad_cell(file, row_idx, &headers[i])))
            .collect::<Result<Vec<f64>, LoadError>>()?;
        crime_labels.push(display_label(&crime).to_string());
        by_crime.push(scores);
    }

    let mut frame = ImportanceFrame::new(crime_labels);
    for (feature_idx, feature) in features.into_iter().enumerate() {
        let scores: Vec<f64> = by_crime.iter().map(|row| row[feature_idx]).collect();
        frame.push_feature(feature, scores);
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn f(v: f64) -> Data {
        Data::Float(v)
    }

    #[test]
    fn cell_str_strips_trailing_zero_from_floats() {
        assert_eq!(cell_str(&f(12304.0)), Some("12304".to_string()));
        assert_eq!(cell_str(&s("  Mitte ")), Some("Mitte".to_string()));
        assert_eq!(cell_str(&Data::Empty), None);
    }

    #[test]
    fn parse_metric_frame_pads_keys_and_keeps_column_order() {
        let rows = vec![
            vec![s("key_1"), s("Bezirksregion"), s("year"), s("raub"), s("kieztaten")],
            vec![f(12304.0), s("Mitte"), f(2020.0), f(10.0), f(3.0)],
            vec![s("123045"), s("Pankow"), f(2020.0), f(5.0), Data::Empty],
        ];
        let frame = parse_metric_frame("df_merged.xlsx", &rows).unwrap();
        assert_eq!(frame.columns(), ["Raub", "Kieztaten"]);
        assert_eq!(frame.rows()[0].key, "012304");
        assert_eq!(frame.rows()[1].key, "123045");
        // Empty numeric cells read as zero.
        assert_eq!(frame.rows()[1].values, vec![5.0, 0.0]);
    }

    #[test]
    fn parse_metric_frame_requires_key_column() {
        let rows = vec![vec![s("Bezirksregion"), s("year")]];
        let err = parse_metric_frame("df_merged.xlsx", &rows).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { .. }));
    }

    #[test]
    fn parse_key_table_pads_both_keys() {
        let rows = vec![
            vec![s("key_1"), s("key_2")],
            vec![f(10000.0), f(10101.0)],
        ];
        let table = parse_key_table("df_keys.xlsx", &rows).unwrap();
        assert_eq!(table.rows()[0].key_1, "010000");
        assert_eq!(table.rows()[0].key_2, "010101");
    }

    #[test]
    fn parse_prediction_frame_keeps_row_order() {
        let rows = vec![
            vec![s("Bezirksregion"), s("year"), s("Raub")],
            vec![s("Alexanderplatz"), f(2012.0), f(100.0)],
            vec![s("Alexanderplatz"), f(2013.0), f(90.0)],
        ];
        let frame = parse_prediction_frame("df_prophet_predictions.xlsx", &rows).unwrap();
        let series = frame.district_series("Alexanderplatz", "Raub");
        assert_eq!(series, vec![(2012, 100.0), (2013, 90.0)]);
    }

    #[test]
    fn parse_importance_frame_transposes() {
        let rows = vec![
            vec![Data::Empty, s("population"), s("bars")],
            vec![s("Raub"), f(0.6), f(0.4)],
            vec![s("Kieztaten"), f(0.2), f(0.8)],
        ];
        let frame = parse_importance_frame("importances.xlsx", &rows).unwrap();
        assert_eq!(frame.crime_columns(), ["Raub", "Kieztaten"]);
        let top = frame.top_features("Kieztaten", 1).unwrap();
        assert_eq!(top[0], ("bars".to_string(), 0.8));
    }

    #[test]
    fn parse_importance_frame_rejects_bad_cell() {
        let rows = vec![
            vec![Data::Empty, s("population")],
            vec![s("Raub"), s("not a number")],
        ];
        let err = parse_importance_frame("importances.xlsx", &rows).unwrap_err();
        assert!(matches!(err, LoadError::BadCell { .. }));
    }
}
