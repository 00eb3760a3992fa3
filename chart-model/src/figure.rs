//! Minimal plotly-shaped figure model. Only the trace and layout fields the
//! dashboard actually sets are modeled; the page renders these with
//! plotly.js unchanged.

use serde::Serialize;

/// Transparent backgrounds so the dark page shows through.
pub const TRANSPARENT: &str = "rgba(0, 0, 0, 0)";

/// Leading colors of the RdBu sequential scale, used by both pie charts.
pub const PIE_COLORS: [&str; 6] = [
    "rgb(103,0,31)",
    "rgb(178,24,43)",
    "rgb(214,96,77)",
    "rgb(244,165,130)",
    "rgb(253,219,199)",
    "rgb(247,247,247)",
];

pub const BAR_COLOR: &str = "darkgreen";
pub const FORECAST_COLOR: &str = "darkred";
pub const MAP_COLORSCALE: &str = "Hot";

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Pie {
        labels: Vec<String>,
        values: Vec<f64>,
        textposition: &'static str,
        textinfo: &'static str,
        /// Per-slice pull-out offsets; the aggregate slice is pulled.
        pull: Vec<f64>,
        marker: Marker,
    },
    Bar {
        x: Vec<String>,
        y: Vec<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        marker: Marker,
        #[serde(skip_serializing_if = "Option::is_none")]
        hovertemplate: Option<String>,
    },
    Choropleth {
        geojson: serde_json::Value,
        locations: Vec<String>,
        z: Vec<f64>,
        colorscale: &'static str,
        text: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        hovertemplate: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub paper_bgcolor: &'static str,
    pub plot_bgcolor: &'static str,
    pub font: Font,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showlegend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoLayout>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            title: None,
            paper_bgcolor: TRANSPARENT,
            plot_bgcolor: TRANSPARENT,
            font: Font::default(),
            width: None,
            height: None,
            showlegend: None,
            geo: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Font {
    pub color: &'static str,
}

impl Default for Font {
    fn default() -> Self {
        Self { color: "#f0f0f0" }
    }
}

/// Map-pane settings for the choropleth.
#[derive(Debug, Clone, Serialize)]
pub struct GeoLayout {
    pub fitbounds: &'static str,
    pub visible: bool,
    pub bgcolor: &'static str,
}

impl Default for GeoLayout {
    fn default() -> Self {
        Self {
            fitbounds: "locations",
            visible: true,
            bgcolor: TRANSPARENT,
        }
    }
}
