use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chart_model::{
    choropleth_map, importance_pie, prediction_bar, top_crimes_pie, top_districts_bar,
    ChartError, Figure, Selection,
};
use data_loader::DataContext;
use frame_core::{MetricScale, Year};

/// Metric columns that never appear in the map dropdown: context values,
/// not statistics worth mapping on their own.
const EXCLUDED_MAP_COLUMNS: [&str; 2] = ["Total Population", "Area in square kilometers"];

#[derive(Debug, Parser)]
#[command(name = "berlin-crime-dashboard")]
#[command(about = "Interactive dashboard for Berlin crime statistics")]
struct Config {
    /// Directory holding the spreadsheets and the shapefile.
    #[arg(long, env = "DASHBOARD_DATA_DIR", default_value = "Data")]
    data_dir: PathBuf,
    #[arg(long, env = "DASHBOARD_HOST", default_value = "127.0.0.1")]
    host: String,
    #[arg(long, env = "DASHBOARD_PORT", default_value_t = 8043)]
    port: u16,
    /// Polygon simplification tolerance, in the coordinate units of the
    /// dissolved geometry.
    #[arg(long, env = "DASHBOARD_SIMPLIFY_TOLERANCE", default_value_t = 1.0)]
    simplify_tolerance: f64,
    /// Extra static files served alongside the dashboard page.
    #[arg(long, env = "DASHBOARD_ASSETS_DIR", default_value = "backend/assets")]
    assets_dir: PathBuf,
}

#[derive(Clone)]
struct ServerState {
    ctx: Arc<DataContext>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let ctx = DataContext::load(&config.data_dir, config.simplify_tolerance)
        .with_context(|| format!("loading dashboard data from {}", config.data_dir.display()))?;
    let state = ServerState { ctx: Arc::new(ctx) };

    let app = Router::new()
        .route("/", get(index))
        .route("/api/options", get(options_handler))
        .route("/api/figures", get(figures_handler))
        .fallback_service(ServeDir::new(&config.assets_dir))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "dashboard listening");
    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

/// Prefer a canonical default if the options contain it, else the first
/// option. Keeps the page usable when a spreadsheet revision renames things.
fn pick(options: &[String], preferred: &str) -> String {
    options
        .iter()
        .find(|o| o.as_str() == preferred)
        .cloned()
        .or_else(|| options.first().cloned())
        .unwrap_or_default()
}

fn default_selection(ctx: &DataContext) -> Selection {
    let districts = ctx.predictions.districts();
    let crime_types: Vec<String> = ctx.total.crime_columns().to_vec();
    let map_types = map_columns(ctx);
    let latest_year = ctx.total.years().last().copied().unwrap_or(0);

    Selection {
        top_region: pick(&districts, "Parkviertel"),
        top_region_year: latest_year,
        top_type: pick(&crime_types, "Straftaten insgesamt"),
        top_type_year: latest_year,
        prediction_region: pick(&districts, "Alexanderplatz"),
        prediction_type: pick(&crime_types, "Raub"),
        importance_type: pick(&crime_types, "Sachbeschädigung insgesamt"),
        map_scale: MetricScale::PerArea,
        map_type: pick(&map_types, "Sachbeschädigung durch Graffiti"),
        map_year: latest_year,
    }
}

fn map_columns(ctx: &DataContext) -> Vec<String> {
    ctx.total
        .columns()
        .iter()
        .filter(|c| !EXCLUDED_MAP_COLUMNS.contains(&c.as_str()))
        .cloned()
        .collect()
}

#[derive(Debug, Serialize)]
struct OptionsResponse {
    districts: Vec<String>,
    crime_types: Vec<String>,
    map_types: Vec<String>,
    years: Vec<Year>,
    scales: Vec<&'static str>,
    defaults: Selection,
}

async fn options_handler(State(state): State<ServerState>) -> Json<OptionsResponse> {
    let ctx = &state.ctx;
    Json(OptionsResponse {
        districts: ctx.predictions.districts(),
        crime_types: ctx.total.crime_columns().to_vec(),
        map_types: map_columns(ctx),
        years: ctx.total.years(),
        scales: MetricScale::ALL.iter().map(|s| s.label()).collect(),
        defaults: default_selection(ctx),
    })
}

/// The ten widget values, all optional; anything omitted falls back to the
/// default selection.
#[derive(Debug, Default, Deserialize)]
struct FigureParams {
    region_top: Option<String>,
    year_top: Option<Year>,
    type_top: Option<String>,
    year_type: Option<Year>,
    region_pred: Option<String>,
    type_pred: Option<String>,
    type_importance: Option<String>,
    scale: Option<String>,
    type_map: Option<String>,
    year_map: Option<Year>,
}

impl FigureParams {
    fn resolve(self, ctx: &DataContext) -> Selection {
        let defaults = default_selection(ctx);
        Selection {
            top_region: self.region_top.unwrap_or(defaults.top_region),
            top_region_year: self.year_top.unwrap_or(defaults.top_region_year),
            top_type: self.type_top.unwrap_or(defaults.top_type),
            top_type_year: self.year_type.unwrap_or(defaults.top_type_year),
            prediction_region: self.region_pred.unwrap_or(defaults.prediction_region),
            prediction_type: self.type_pred.unwrap_or(defaults.prediction_type),
            importance_type: self.type_importance.unwrap_or(defaults.importance_type),
            map_scale: self
                .scale
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.map_scale),
            map_type: self.type_map.unwrap_or(defaults.map_type),
            map_year: self.year_map.unwrap_or(defaults.map_year),
        }
    }
}

/// Either a renderable figure or an explicit no-data state. An empty chart
/// never leaves the server.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum FigurePayload {
    Ready { figure: Figure },
    NoData { no_data: String },
}

impl From<Result<Figure, ChartError>> for FigurePayload {
    fn from(result: Result<Figure, ChartError>) -> Self {
        match result {
            Ok(figure) => FigurePayload::Ready { figure },
            Err(err) => FigurePayload::NoData {
                no_data: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct FiguresResponse {
    selection: Selection,
    top_crimes: FigurePayload,
    top_districts: FigurePayload,
    prediction: FigurePayload,
    importance: FigurePayload,
    map: FigurePayload,
}

async fn figures_handler(
    State(state): State<ServerState>,
    Query(params): Query<FigureParams>,
) -> Json<FiguresResponse> {
    let ctx = &state.ctx;
    let selection = params.resolve(ctx);
    tracing::debug!(?selection, "building figures");

    let top_crimes =
        top_crimes_pie(&ctx.total, &selection.top_region, selection.top_region_year).into();
    let top_districts =
        top_districts_bar(&ctx.total, &selection.top_type, selection.top_type_year).into();
    let prediction = prediction_bar(
        &ctx.predictions,
        &selection.prediction_region,
        &selection.prediction_type,
    )
    .into();
    let importance = importance_pie(&ctx.importances, &selection.importance_type).into();
    let map = choropleth_map(
        ctx.frame(selection.map_scale),
        &selection.map_type,
        selection.map_year,
        &ctx.boundaries,
    )
    .into();

    Json(FiguresResponse {
        selection,
        top_crimes,
        top_districts,
        prediction,
        importance,
        map,
    })
}
