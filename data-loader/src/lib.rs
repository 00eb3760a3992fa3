use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use frame_core::{ImportanceFrame, MetricFrame, MetricScale, PredictionFrame};
use geo_prep::{dissolve, district_feature_collection, load_subdistricts, simplify_districts,
    DistrictShape, GeoError};

mod xlsx;

pub use xlsx::{
    cell_f64, cell_str, cell_year, parse_importance_frame, parse_key_table, parse_metric_frame,
    parse_prediction_frame, read_rows,
};

/// Canonical input file names inside the data directory.
pub const METRICS_TOTAL: &str = "df_merged.xlsx";
pub const METRICS_PER_CAPITA: &str = "df_by_population.xlsx";
pub const METRICS_PER_AREA: &str = "df_by_area.xlsx";
pub const KEYS_FILE: &str = "df_keys.xlsx";
pub const PREDICTIONS_FILE: &str = "df_prophet_predictions.xlsx";
pub const IMPORTANCES_FILE: &str = "H20AutoML_treemodels_importances.xlsx";
pub const SHAPEFILE: &str = "LOR/lor_shp_2019/Bezirksregion_EPSG_25833.shp";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },
    #[error("workbook {path} has no worksheets")]
    EmptySheet { path: PathBuf },
    #[error("{file}: missing required column {column}")]
    MissingColumn { file: String, column: String },
    #[error("{file}: row {row} has an unreadable {column} cell")]
    BadCell {
        file: String,
        row: usize,
        column: String,
    },
    #[error("failed to encode district boundaries: {0}")]
    Boundaries(#[from] serde_json::Error),
    #[error(transparent)]
    Geo(#[from] GeoError),
}

/// Restrict a metric frame to districts that have geometry, logging the join
/// mismatches in both directions. Afterwards every (district, year) pair in
/// the frame has a polygon and vice versa, so the merged row count is
/// exactly `districts × years`.
pub fn merge_with_districts(
    frame: &mut MetricFrame,
    district_keys: &BTreeSet<String>,
    label: &str,
) {
    let dropped = frame.retain_keys(district_keys);
    if !dropped.is_empty() {
        warn!(
            frame = label,
            keys = ?dropped,
            "metric rows dropped: no matching district geometry"
        );
    }
    let metric_keys = frame.district_keys();
    let unmatched: Vec<&String> = district_keys.difference(&metric_keys).collect();
    if !unmatched.is_empty() {
        warn!(
            frame = label,
            keys = ?unmatched,
            "districts have geometry but no metric rows"
        );
    }
}

/// Everything the dashboard reads, loaded once at startup and immutable
/// afterwards. Request handlers share it behind an `Arc` and never mutate.
#[derive(Debug)]
pub struct DataContext {
    pub total: MetricFrame,
    pub per_capita: MetricFrame,
    pub per_area: MetricFrame,
    pub predictions: PredictionFrame,
    pub importances: ImportanceFrame,
    pub districts: Vec<DistrictShape>,
    /// Dissolved boundaries as a GeoJSON feature collection, keyed by
    /// `key_1`, ready to embed in choropleth traces.
    pub boundaries: serde_json::Value,
}

impl DataContext {
    /// One-time ETL: read the spreadsheets and the shapefile, dissolve
    /// sub-districts into district polygons, and align metric frames with
    /// the available geometry.
    pub fn load(data_dir: &Path, simplify_tolerance: f64) -> Result<Self, LoadError> {
        let keys = parse_key_table(KEYS_FILE, &read_rows(&data_dir.join(KEYS_FILE))?)?;
        info!(mappings = keys.len(), "loaded key join table");

        let subdistricts = load_subdistricts(&data_dir.join(SHAPEFILE))?;
        info!(subdistricts = subdistricts.len(), "loaded sub-district polygons");

        let mut districts = dissolve(subdistricts, &keys);
        simplify_districts(&mut districts, simplify_tolerance);
        info!(districts = districts.len(), "dissolved and simplified districts");

        let mut total =
            parse_metric_frame(METRICS_TOTAL, &read_rows(&data_dir.join(METRICS_TOTAL))?)?;
        let mut per_capita = parse_metric_frame(
            METRICS_PER_CAPITA,
            &read_rows(&data_dir.join(METRICS_PER_CAPITA))?,
        )?;
        let mut per_area = parse_metric_frame(
            METRICS_PER_AREA,
            &read_rows(&data_dir.join(METRICS_PER_AREA))?,
        )?;

        // Keep only districts present in both the geometry and the totals,
        // so every frame slices to the same district set.
        let spatial_keys: BTreeSet<String> =
            districts.iter().map(|d| d.key_1.clone()).collect();
        merge_with_districts(&mut total, &spatial_keys, METRICS_TOTAL);
        merge_with_districts(&mut per_capita, &spatial_keys, METRICS_PER_CAPITA);
        merge_with_districts(&mut per_area, &spatial_keys, METRICS_PER_AREA);

        let metric_keys = total.district_keys();
        let orphaned: Vec<String> = spatial_keys
            .difference(&metric_keys)
            .cloned()
            .collect();
        if !orphaned.is_empty() {
            warn!(keys = ?orphaned, "dropping districts with geometry but no metrics");
            districts.retain(|d| metric_keys.contains(&d.key_1));
        }

        let boundaries = serde_json::to_value(district_feature_collection(&districts))?;

        let predictions = parse_prediction_frame(
            PREDICTIONS_FILE,
            &read_rows(&data_dir.join(PREDICTIONS_FILE))?,
        )?;
        let importances = parse_importance_frame(
            IMPORTANCES_FILE,
            &read_rows(&data_dir.join(IMPORTANCES_FILE))?,
        )?;

        info!(
            rows = total.len(),
            years = total.years().len(),
            districts = districts.len(),
            "data context ready"
        );

        Ok(Self {
            total,
            per_capita,
            per_area,
            predictions,
            importances,
            districts,
            boundaries,
        })
    }

    /// The metric frame for a scale selection.
    pub fn frame(&self, scale: MetricScale) -> &MetricFrame {
        match scale {
            MetricScale::Total => &self.total,
            MetricScale::PerCapita => &self.per_capita,
            MetricScale::PerArea => &self.per_area,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_core::MetricRow;

    fn mk_frame(entries: &[(&str, &str, i32)]) -> MetricFrame {
        let mut frame = MetricFrame::new(vec!["Raub".into()]);
        for (i, (key, district, year)) in entries.iter().enumerate() {
            frame.push_row(MetricRow {
                key: key.to_string(),
                district: district.to_string(),
                year: *year,
                values: vec![i as f64],
            });
        }
        frame
    }

    #[test]
    fn merge_keeps_exactly_districts_times_years() {
        let mut frame = mk_frame(&[
            ("010000", "Mitte", 2019),
            ("010000", "Mitte", 2020),
            ("020000", "Pankow", 2019),
            ("020000", "Pankow", 2020),
            ("990000", "Atlantis", 2019),
            ("990000", "Atlantis", 2020),
        ]);
        let spatial: BTreeSet<String> =
            ["010000".to_string(), "020000".to_string()].into_iter().collect();

        merge_with_districts(&mut frame, &spatial, "test");

        let districts = frame.district_keys();
        let years = frame.years();
        assert_eq!(frame.len(), districts.len() * years.len());
        assert!(!districts.contains("990000"));
    }

    #[test]
    fn merge_round_trip_membership() {
        let mut frame = mk_frame(&[
            ("010000", "Mitte", 2019),
            ("020000", "Pankow", 2019),
            ("990000", "Atlantis", 2019),
        ]);
        let spatial: BTreeSet<String> = ["010000".to_string(), "020000".to_string(), "030000".to_string()]
            .into_iter()
            .collect();

        merge_with_districts(&mut frame, &spatial, "test");

        // Every surviving (district, year) pair exists in both inputs; no
        // pair absent from either appears.
        for row in frame.rows() {
            assert!(spatial.contains(&row.key));
        }
        assert!(frame.district_keys().iter().all(|k| spatial.contains(k)));
        assert!(!frame.district_keys().contains("030000"));
    }
}
