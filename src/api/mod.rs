use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    CSV_FILE_NAME, DEFAULT_HISTOGRAM_BINS, HistogramBin, SimulationParameters, SimulationReport,
    csv_string, histogram, run_parallel, run_unseeded,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const MAX_HISTOGRAM_BINS: usize = 200;
const MIN_SIMULATIONS: u32 = 100;

#[derive(Args, Debug, Clone)]
pub struct Cli {
    #[arg(long, default_value_t = 1_000_000.0, help = "Starting portfolio value")]
    pub starting_portfolio: f64,
    #[arg(
        long,
        default_value_t = 8.0,
        help = "Expected annual return in percent (0-20)"
    )]
    pub annual_return: f64,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Annual return volatility in percent (0-30)"
    )]
    pub volatility: f64,
    #[arg(long, default_value_t = 40_000.0, help = "Withdrawal taken in the first year")]
    pub initial_withdrawal: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        help = "Annual inflation applied to the withdrawal, in percent"
    )]
    pub inflation_rate: f64,
    #[arg(long, default_value_t = 45, help = "Number of years to withdraw")]
    pub years: u32,
    #[arg(long, default_value_t = 10_000, help = "Number of simulated trials (>= 100)")]
    pub simulations: u32,
    #[arg(long, help = "Seed for reproducible runs; omitted means fresh entropy")]
    pub seed: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
    pub bins: usize,
    #[arg(long, help = "Write every trial's ending balance to this CSV file")]
    pub csv: Option<PathBuf>,
    #[arg(long, help = "Print every trial's ending balance after the summary")]
    pub show_trials: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    starting_portfolio: Option<f64>,
    annual_return: Option<f64>,
    volatility: Option<f64>,
    initial_withdrawal: Option<f64>,
    inflation_rate: Option<f64>,
    years: Option<u32>,
    simulations: Option<u32>,
    seed: Option<u64>,
    bins: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub params: SimulationParameters,
    pub seed: Option<u64>,
    pub bins: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    parameters: SimulationParameters,
    seed: Option<u64>,
    trial_count: usize,
    depleted_trials: u32,
    depletion_percentage: f64,
    mean_balance: f64,
    min_balance: f64,
    max_balance: f64,
    histogram: Vec<HistogramBin>,
    ending_balances: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Validates percent-based user input and converts it to engine parameters.
pub fn build_request(cli: &Cli) -> Result<SimulationRequest, String> {
    if !cli.starting_portfolio.is_finite() || cli.starting_portfolio < 0.0 {
        return Err("--starting-portfolio must be >= 0".to_string());
    }

    if !(0.0..=20.0).contains(&cli.annual_return) {
        return Err("--annual-return must be between 0 and 20".to_string());
    }

    if !(0.0..=30.0).contains(&cli.volatility) {
        return Err("--volatility must be between 0 and 30".to_string());
    }

    if !cli.initial_withdrawal.is_finite() || cli.initial_withdrawal < 0.0 {
        return Err("--initial-withdrawal must be >= 0".to_string());
    }

    if !cli.inflation_rate.is_finite() || cli.inflation_rate < 0.0 {
        return Err("--inflation-rate must be >= 0".to_string());
    }

    if cli.years == 0 {
        return Err("--years must be >= 1".to_string());
    }

    if cli.simulations < MIN_SIMULATIONS {
        return Err(format!("--simulations must be >= {MIN_SIMULATIONS}"));
    }

    if !(1..=MAX_HISTOGRAM_BINS).contains(&cli.bins) {
        return Err(format!("--bins must be between 1 and {MAX_HISTOGRAM_BINS}"));
    }

    let params = SimulationParameters {
        initial_portfolio: cli.starting_portfolio,
        expected_return: cli.annual_return / 100.0,
        volatility: cli.volatility / 100.0,
        initial_withdrawal: cli.initial_withdrawal,
        inflation_rate: cli.inflation_rate / 100.0,
        horizon_years: cli.years,
        trial_count: cli.simulations,
    };
    params.validate().map_err(|e| e.to_string())?;

    Ok(SimulationRequest {
        params,
        seed: cli.seed,
        bins: cli.bins,
    })
}

/// Seeded requests fan out across threads with per-trial streams; unseeded ones
/// draw from the thread-local generator.
pub fn run_request(request: &SimulationRequest) -> Result<SimulationReport, String> {
    let report = match request.seed {
        Some(seed) => run_parallel(&request.params, seed),
        None => run_unseeded(&request.params),
    };
    report.map_err(|e| e.to_string())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/simulate.csv",
            get(csv_get_handler).post(csv_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "safe withdrawal API listening");
    info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    query: Result<Query<SimulatePayload>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(payload)) => simulate_handler_impl(payload).await,
        Err(rejection) => rejected_payload(rejection.status(), &rejection.body_text()),
    }
}

async fn simulate_post_handler(json: Result<Json<SimulatePayload>, JsonRejection>) -> Response {
    match json {
        Ok(Json(payload)) => simulate_handler_impl(payload).await,
        Err(rejection) => rejected_payload(rejection.status(), &rejection.body_text()),
    }
}

async fn csv_get_handler(query: Result<Query<SimulatePayload>, QueryRejection>) -> Response {
    match query {
        Ok(Query(payload)) => csv_handler_impl(payload).await,
        Err(rejection) => rejected_payload(rejection.status(), &rejection.body_text()),
    }
}

async fn csv_post_handler(json: Result<Json<SimulatePayload>, JsonRejection>) -> Response {
    match json {
        Ok(Json(payload)) => csv_handler_impl(payload).await,
        Err(rejection) => rejected_payload(rejection.status(), &rejection.body_text()),
    }
}

/// Extractor failures get the same JSON error body as validation failures.
fn rejected_payload(status: StatusCode, msg: &str) -> Response {
    warn!(%status, error = %msg, "rejected simulation payload");
    error_response(status, msg)
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let (request, report) = match simulate_payload(payload).await {
        Ok(done) => done,
        Err((status, msg)) => return error_response(status, &msg),
    };

    json_response(StatusCode::OK, build_simulate_response(&request, report))
}

async fn csv_handler_impl(payload: SimulatePayload) -> Response {
    let (_, report) = match simulate_payload(payload).await {
        Ok(done) => done,
        Err((status, msg)) => return error_response(status, &msg),
    };

    match csv_string(&report) {
        Ok(body) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{CSV_FILE_NAME}\""),
                ),
            ],
            body,
        )),
        Err(msg) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &msg),
    }
}

async fn simulate_payload(
    payload: SimulatePayload,
) -> Result<(SimulationRequest, SimulationReport), (StatusCode, String)> {
    let request = api_request_from_payload(payload).map_err(|msg| {
        warn!(error = %msg, "rejected simulation request");
        (StatusCode::BAD_REQUEST, msg)
    })?;

    let task_request = request.clone();
    let report = tokio::task::spawn_blocking(move || run_request(&task_request))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Simulation task failed: {e}"),
            )
        })?
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    info!(
        trials = report.trial_count(),
        years = request.params.horizon_years,
        seed = ?request.seed,
        depletion_percentage = report.depletion_percentage(),
        "simulation complete"
    );
    Ok((request, report))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<SimulationRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<SimulationRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.starting_portfolio {
        cli.starting_portfolio = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.volatility {
        cli.volatility = v;
    }
    if let Some(v) = payload.initial_withdrawal {
        cli.initial_withdrawal = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.years {
        cli.years = v;
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.bins {
        cli.bins = v;
    }
    cli.seed = payload.seed;

    build_request(&cli).map_err(|msg| msg.replace("--", ""))
}

fn default_cli_for_api() -> Cli {
    Cli {
        starting_portfolio: 1_000_000.0,
        annual_return: 8.0,
        volatility: 15.0,
        initial_withdrawal: 40_000.0,
        inflation_rate: 2.5,
        years: 45,
        simulations: 10_000,
        seed: None,
        bins: DEFAULT_HISTOGRAM_BINS,
        csv: None,
        show_trials: false,
    }
}

fn build_simulate_response(
    request: &SimulationRequest,
    report: SimulationReport,
) -> SimulateResponse {
    SimulateResponse {
        parameters: request.params,
        seed: request.seed,
        trial_count: report.trial_count(),
        depleted_trials: report.depleted_trials,
        depletion_percentage: report.depletion_percentage(),
        mean_balance: report.mean_balance,
        min_balance: report.min_balance,
        max_balance: report.max_balance,
        histogram: histogram(&report.ending_balances, request.bins),
        ending_balances: report.ending_balances,
    }
}
