use serde::{Deserialize, Serialize};
use thiserror::Error;

use frame_core::{
    top_n, ImportanceFrame, MetricFrame, MetricScale, PredictionFrame, Year, ACTUAL_YEARS,
};

mod figure;

pub use figure::{
    Figure, Font, GeoLayout, Layout, Marker, Trace, BAR_COLOR, FORECAST_COLOR, MAP_COLORSCALE,
    PIE_COLORS, TRANSPARENT,
};

/// How many slices the contributor pie shows before aggregating.
pub const PIE_TOP_SLICES: usize = 5;
/// How many districts the ranking bar shows.
pub const BAR_TOP_DISTRICTS: usize = 10;

#[derive(Debug, Error)]
pub enum ChartError {
    /// The current selection matches zero rows. Surfaced to the UI as an
    /// explicit state instead of rendering an empty chart.
    #[error("no data for selection: {0}")]
    NoData(String),
    #[error("unknown metric column: {0}")]
    UnknownColumn(String),
}

/// The ten widget values a figures request carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub top_region: String,
    pub top_region_year: Year,
    pub top_type: String,
    pub top_type_year: Year,
    pub prediction_region: String,
    pub prediction_type: String,
    pub importance_type: String,
    pub map_scale: MetricScale,
    pub map_type: String,
    pub map_year: Year,
}

fn pie_pull(slices: usize) -> Vec<f64> {
    // Pull only the trailing aggregate slice out of the pie.
    let mut pull = vec![0.0; slices];
    if let Some(last) = pull.last_mut() {
        *last = 0.1;
    }
    pull
}

fn pie_colors(slices: usize) -> Vec<String> {
    PIE_COLORS
        .iter()
        .cycle()
        .take(slices)
        .map(|c| c.to_string())
        .collect()
}

/// Top-5 offence groups for one (district, year), with the remaining 11
/// groups summed into a `Remaining` slice. The five top values plus
/// `Remaining` always equal the sum of all crime columns of the row.
pub fn top_crimes_pie(
    frame: &MetricFrame,
    district: &str,
    year: Year,
) -> Result<Figure, ChartError> {
    let row = frame.find_row(district, year).ok_or_else(|| {
        ChartError::NoData(format!("district {district} has no data for {year}"))
    })?;

    let crime_columns = frame.crime_columns();
    let values = &row.values[..crime_columns.len().min(row.values.len())];
    let top = top_n(values, PIE_TOP_SLICES);

    let total: f64 = values.iter().sum();
    let top_sum: f64 = top.iter().map(|&i| values[i]).sum();
    let remaining = total - top_sum;

    let mut labels: Vec<String> = top.iter().map(|&i| crime_columns[i].clone()).collect();
    let mut slice_values: Vec<f64> = top.iter().map(|&i| values[i]).collect();
    labels.push("Remaining".to_string());
    slice_values.push(remaining);

    let slices = slice_values.len();
    Ok(Figure {
        data: vec![Trace::Pie {
            labels,
            values: slice_values,
            textposition: "inside",
            textinfo: "percent",
            pull: pie_pull(slices),
            marker: Marker {
                colors: Some(pie_colors(slices)),
                ..Marker::default()
            },
        }],
        layout: Layout::default(),
    })
}

/// Top-10 districts for one (year, crime type), descending.
pub fn top_districts_bar(
    frame: &MetricFrame,
    column: &str,
    year: Year,
) -> Result<Figure, ChartError> {
    let col = frame
        .column_index(column)
        .ok_or_else(|| ChartError::UnknownColumn(column.to_string()))?;

    let rows = frame.year_rows(year);
    if rows.is_empty() {
        return Err(ChartError::NoData(format!("no districts have data for {year}")));
    }

    let values: Vec<f64> = rows.iter().map(|r| r.values[col]).collect();
    let top = top_n(&values, BAR_TOP_DISTRICTS);

    Ok(Figure {
        data: vec![Trace::Bar {
            x: top.iter().map(|&i| rows[i].district.clone()).collect(),
            y: top.iter().map(|&i| values[i]).collect(),
            name: None,
            marker: Marker {
                color: Some(BAR_COLOR.to_string()),
                ..Marker::default()
            },
            hovertemplate: Some("District: %{x} <br>Value: %{y}".to_string()),
        }],
        layout: Layout::default(),
    })
}

/// All years of one crime type for one district, the first [`ACTUAL_YEARS`]
/// points as `actual` and the rest as `forecast`. The split is positional,
/// not derived from dates.
pub fn prediction_bar(
    predictions: &PredictionFrame,
    district: &str,
    column: &str,
) -> Result<Figure, ChartError> {
    if predictions.column_index(column).is_none() {
        return Err(ChartError::UnknownColumn(column.to_string()));
    }
    let series = predictions.district_series(district, column);
    if series.is_empty() {
        return Err(ChartError::NoData(format!(
            "district {district} has no prediction data"
        )));
    }

    let split = ACTUAL_YEARS.min(series.len());
    let (actual, forecast) = series.split_at(split);

    let mut data = vec![Trace::Bar {
        x: actual.iter().map(|(y, _)| y.to_string()).collect(),
        y: actual.iter().map(|(_, v)| *v).collect(),
        name: Some("actual".to_string()),
        marker: Marker {
            color: Some(BAR_COLOR.to_string()),
            ..Marker::default()
        },
        hovertemplate: Some("Year: %{x} <br>Value: %{y}".to_string()),
    }];
    if !forecast.is_empty() {
        data.push(Trace::Bar {
            x: forecast.iter().map(|(y, _)| y.to_string()).collect(),
            y: forecast.iter().map(|(_, v)| *v).collect(),
            name: Some("forecast".to_string()),
            marker: Marker {
                color: Some(FORECAST_COLOR.to_string()),
                ..Marker::default()
            },
            hovertemplate: Some("Year: %{x} <br>Value: %{y}".to_string()),
        });
    }

    Ok(Figure {
        data,
        layout: Layout {
            showlegend: Some(true),
            ..Layout::default()
        },
    })
}

/// Top-5 feature importances for one crime type plus a `remaining` slice of
/// `1 − sum(top5)`. Assumes upstream scores are normalized per column; if
/// they are not, the remaining slice can go negative and is rendered as-is.
pub fn importance_pie(
    importances: &ImportanceFrame,
    column: &str,
) -> Result<Figure, ChartError> {
    let top = importances
        .top_features(column, PIE_TOP_SLICES)
        .ok_or_else(|| ChartError::UnknownColumn(column.to_string()))?;
    if top.is_empty() {
        return Err(ChartError::NoData(format!(
            "no feature importances for {column}"
        )));
    }

    let top_sum: f64 = top.iter().map(|(_, v)| v).sum();
    let mut labels: Vec<String> = top.iter().map(|(name, _)| name.clone()).collect();
    let mut values: Vec<f64> = top.iter().map(|(_, v)| *v).collect();
    labels.push("remaining".to_string());
    values.push(1.0 - top_sum);

    let slices = values.len();
    Ok(Figure {
        data: vec![Trace::Pie {
            labels,
            values,
            textposition: "inside",
            textinfo: "percent",
            pull: pie_pull(slices),
            marker: Marker {
                colors: Some(pie_colors(slices)),
                ..Marker::default()
            },
        }],
        layout: Layout::default(),
    })
}

/// Choropleth of one metric column over the dissolved district polygons for
/// one year. The caller picks the frame matching the selected scale.
pub fn choropleth_map(
    frame: &MetricFrame,
    column: &str,
    year: Year,
    boundaries: &serde_json::Value,
) -> Result<Figure, ChartError> {
    let col = frame
        .column_index(column)
        .ok_or_else(|| ChartError::UnknownColumn(column.to_string()))?;

    let rows = frame.year_rows(year);
    if rows.is_empty() {
        return Err(ChartError::NoData(format!("no map data for {year}")));
    }

    Ok(Figure {
        data: vec![Trace::Choropleth {
            geojson: boundaries.clone(),
            locations: rows.iter().map(|r| r.key.clone()).collect(),
            z: rows.iter().map(|r| r.values[col]).collect(),
            colorscale: MAP_COLORSCALE,
            text: rows.iter().map(|r| r.district.clone()).collect(),
            hovertemplate: Some("%{text}<br>Value: %{z}<extra></extra>".to_string()),
        }],
        layout: Layout {
            height: Some(500),
            geo: Some(GeoLayout::default()),
            ..Layout::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_core::{MetricRow, CRIME_COLUMN_COUNT};

    fn crime_frame() -> MetricFrame {
        let columns: Vec<String> = (0..CRIME_COLUMN_COUNT)
            .map(|i| format!("crime_{i}"))
            .collect();
        let mut frame = MetricFrame::new(columns);
        frame.push_row(MetricRow {
            key: "010000".into(),
            district: "Mitte".into(),
            year: 2020,
            values: (1..=CRIME_COLUMN_COUNT).map(|v| v as f64).collect(),
        });
        frame.push_row(MetricRow {
            key: "020000".into(),
            district: "Pankow".into(),
            year: 2020,
            values: (0..CRIME_COLUMN_COUNT).map(|v| (v * 2) as f64).collect(),
        });
        frame
    }

    fn trace_values(figure: &Figure) -> Vec<f64> {
        match &figure.data[0] {
            Trace::Pie { values, .. } => values.clone(),
            Trace::Bar { y, .. } => y.clone(),
            Trace::Choropleth { z, .. } => z.clone(),
        }
    }

    #[test]
    fn top_crimes_pie_preserves_total() {
        let frame = crime_frame();
        let figure = top_crimes_pie(&frame, "Mitte", 2020).unwrap();
        let values = trace_values(&figure);
        assert_eq!(values.len(), PIE_TOP_SLICES + 1);

        let expected_total: f64 = (1..=CRIME_COLUMN_COUNT).map(|v| v as f64).sum();
        let pie_total: f64 = values.iter().sum();
        assert!((pie_total - expected_total).abs() < 1e-9);
        // Slices ranked descending: 16, 15, 14, 13, 12, then the rest.
        assert_eq!(values[0], CRIME_COLUMN_COUNT as f64);
        assert_eq!(*values.last().unwrap(), (1..=11).map(|v| v as f64).sum::<f64>());
    }

    #[test]
    fn top_crimes_pie_reports_missing_selection() {
        let frame = crime_frame();
        let err = top_crimes_pie(&frame, "Mitte", 1999).unwrap_err();
        assert!(matches!(err, ChartError::NoData(_)));
    }

    #[test]
    fn top_districts_bar_ranks_descending() {
        let frame = crime_frame();
        let figure = top_districts_bar(&frame, "crime_3", 2020).unwrap();
        let Trace::Bar { x, y, .. } = &figure.data[0] else {
            panic!("expected bar trace");
        };
        // Pankow has 2*3=6, Mitte has 4 in crime_3.
        assert_eq!(x[0], "Pankow");
        assert_eq!(y[0], 6.0);
        assert_eq!(x[1], "Mitte");
        assert!(y.len() <= BAR_TOP_DISTRICTS);
    }

    #[test]
    fn top_districts_bar_rejects_unknown_column() {
        let frame = crime_frame();
        let err = top_districts_bar(&frame, "nonexistent", 2020).unwrap_err();
        assert!(matches!(err, ChartError::UnknownColumn(_)));
    }

    fn prediction_frame() -> PredictionFrame {
        let mut pred = PredictionFrame::new(vec!["Raub".into()]);
        for (i, year) in (2012..2026).enumerate() {
            pred.push_row(frame_core::PredictionRow {
                district: "Alexanderplatz".into(),
                year,
                values: vec![100.0 + i as f64],
            });
        }
        pred
    }

    #[test]
    fn prediction_bar_splits_actual_and_forecast() {
        let pred = prediction_frame();
        let figure = prediction_bar(&pred, "Alexanderplatz", "Raub").unwrap();
        assert_eq!(figure.data.len(), 2);

        let Trace::Bar { x, y, name, .. } = &figure.data[0] else {
            panic!("expected bar trace");
        };
        assert_eq!(name.as_deref(), Some("actual"));
        assert_eq!(x.len(), ACTUAL_YEARS);
        assert_eq!(x[0], "2012");
        assert_eq!(y[0], 100.0);

        let Trace::Bar { x, y, name, .. } = &figure.data[1] else {
            panic!("expected bar trace");
        };
        assert_eq!(name.as_deref(), Some("forecast"));
        assert_eq!(x.len(), 5);
        assert_eq!(x[4], "2025");
        assert_eq!(y[4], 113.0);
    }

    #[test]
    fn prediction_bar_short_series_is_all_actual() {
        let mut pred = PredictionFrame::new(vec!["Raub".into()]);
        for year in 2018..2022 {
            pred.push_row(frame_core::PredictionRow {
                district: "Parkviertel".into(),
                year,
                values: vec![1.0],
            });
        }
        let figure = prediction_bar(&pred, "Parkviertel", "Raub").unwrap();
        assert_eq!(figure.data.len(), 1);
    }

    #[test]
    fn prediction_bar_missing_district_is_no_data() {
        let pred = prediction_frame();
        let err = prediction_bar(&pred, "Atlantis", "Raub").unwrap_err();
        assert!(matches!(err, ChartError::NoData(_)));
    }

    #[test]
    fn importance_pie_appends_remaining() {
        let mut imp = ImportanceFrame::new(vec!["Raub".into()]);
        imp.push_feature("population".into(), vec![0.4]);
        imp.push_feature("bars".into(), vec![0.2]);
        imp.push_feature("parks".into(), vec![0.1]);
        imp.push_feature("schools".into(), vec![0.1]);
        imp.push_feature("stations".into(), vec![0.1]);
        imp.push_feature("area".into(), vec![0.05]);

        let figure = importance_pie(&imp, "Raub").unwrap();
        let Trace::Pie { labels, values, .. } = &figure.data[0] else {
            panic!("expected pie trace");
        };
        assert_eq!(labels.last().unwrap(), "remaining");
        // remaining = 1 - (0.4+0.2+0.1+0.1+0.1) = 0.1
        assert!((values.last().unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn importance_pie_remaining_can_go_negative() {
        // Unnormalized upstream scores are rendered as-is, not guarded.
        let mut imp = ImportanceFrame::new(vec!["Raub".into()]);
        imp.push_feature("a".into(), vec![0.9]);
        imp.push_feature("b".into(), vec![0.8]);

        let figure = importance_pie(&imp, "Raub").unwrap();
        let values = trace_values(&figure);
        assert!((values.last().unwrap() - (1.0 - 1.7)).abs() < 1e-9);
    }

    #[test]
    fn choropleth_joins_on_district_keys() {
        let frame = crime_frame();
        let boundaries = serde_json::json!({"type": "FeatureCollection", "features": []});
        let figure = choropleth_map(&frame, "crime_0", 2020, &boundaries).unwrap();
        let Trace::Choropleth {
            locations, z, text, ..
        } = &figure.data[0]
        else {
            panic!("expected choropleth trace");
        };
        assert_eq!(locations, &vec!["010000".to_string(), "020000".to_string()]);
        assert_eq!(z, &vec![1.0, 0.0]);
        assert_eq!(text[1], "Pankow");
    }

    #[test]
    fn choropleth_empty_year_is_no_data() {
        let frame = crime_frame();
        let boundaries = serde_json::json!({"type": "FeatureCollection", "features": []});
        let err = choropleth_map(&frame, "crime_0", 1999, &boundaries).unwrap_err();
        assert!(matches!(err, ChartError::NoData(_)));
    }
}
