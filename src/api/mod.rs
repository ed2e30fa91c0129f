use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt::Write as _;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    CalculationMode, GOAL, MAX_SIMULATION_MONTHS, PeriodUnit, ProjectionInputs, ProjectionResult,
    RatePeriod, SolveStatus, YearlyCheckpoint, project, round2,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliMode {
    Contribution,
    Time,
}

impl From<CliMode> for CalculationMode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Contribution => CalculationMode::Contribution,
            CliMode::Time => CalculationMode::Time,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRatePeriod {
    Annual,
    Monthly,
}

impl From<CliRatePeriod> for RatePeriod {
    fn from(value: CliRatePeriod) -> Self {
        match value {
            CliRatePeriod::Annual => RatePeriod::Annual,
            CliRatePeriod::Monthly => RatePeriod::Monthly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPeriodUnit {
    Years,
    Months,
}

impl From<CliPeriodUnit> for PeriodUnit {
    fn from(value: CliPeriodUnit) -> Self {
        match value {
            CliPeriodUnit::Years => PeriodUnit::Years,
            CliPeriodUnit::Months => PeriodUnit::Months,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiMode {
    #[serde(alias = "aporte", alias = "CONTRIBUTION")]
    Contribution,
    #[serde(alias = "tempo", alias = "prazo", alias = "TIME")]
    Time,
}

impl From<ApiMode> for CliMode {
    fn from(value: ApiMode) -> Self {
        match value {
            ApiMode::Contribution => CliMode::Contribution,
            ApiMode::Time => CliMode::Time,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiRatePeriod {
    #[serde(alias = "anual", alias = "ANNUAL")]
    Annual,
    #[serde(alias = "mensal", alias = "MONTHLY")]
    Monthly,
}

impl From<ApiRatePeriod> for CliRatePeriod {
    fn from(value: ApiRatePeriod) -> Self {
        match value {
            ApiRatePeriod::Annual => CliRatePeriod::Annual,
            ApiRatePeriod::Monthly => CliRatePeriod::Monthly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiPeriodUnit {
    #[serde(alias = "anos", alias = "YEARS")]
    Years,
    #[serde(alias = "meses", alias = "MONTHS")]
    Months,
}

impl From<ApiPeriodUnit> for CliPeriodUnit {
    fn from(value: ApiPeriodUnit) -> Self {
        match value {
            ApiPeriodUnit::Years => CliPeriodUnit::Years,
            ApiPeriodUnit::Months => CliPeriodUnit::Months,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    mode: Option<ApiMode>,
    initial_balance: Option<f64>,
    rate: Option<f64>,
    rate_period: Option<ApiRatePeriod>,
    duration: Option<f64>,
    duration_unit: Option<ApiPeriodUnit>,
    monthly_contribution: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "million",
    about = "Plan the road to 1,000,000: solve for the monthly contribution or the time needed"
)]
struct Cli {
    #[arg(
        long,
        value_enum,
        default_value_t = CliMode::Contribution,
        help = "Unknown to solve for: the monthly contribution or the time to the goal"
    )]
    mode: CliMode,
    #[arg(long, default_value_t = 0.0, help = "Starting balance")]
    initial_balance: f64,
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Nominal interest rate in percent, e.g. 8"
    )]
    rate: f64,
    #[arg(long, value_enum, default_value_t = CliRatePeriod::Annual)]
    rate_period: CliRatePeriod,
    #[arg(long, help = "Horizon to reach the goal; required when --mode=contribution")]
    duration: Option<f64>,
    #[arg(long, value_enum, default_value_t = CliPeriodUnit::Years)]
    duration_unit: CliPeriodUnit,
    #[arg(long, help = "Fixed monthly contribution; required when --mode=time")]
    monthly_contribution: Option<f64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("--{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("--initial-balance must be >= 0")]
    NegativeBalance,
    #[error("--rate must be > -100")]
    RateTooLow,
    #[error("--duration is required when --mode=contribution")]
    MissingDuration,
    #[error("--duration must be > 0")]
    NonPositiveDuration,
    #[error("--duration covers {months} months; at most {max} months can be simulated")]
    HorizonTooLong { months: f64, max: u32 },
    #[error("--monthly-contribution is required when --mode=time")]
    MissingContribution,
    #[error("--monthly-contribution must be >= 0")]
    NegativeContribution,
}

impl IntoResponse for InputError {
    fn into_response(self) -> Response {
        error_response(StatusCode::BAD_REQUEST, &self.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to render table: {0}")]
    Render(#[from] std::fmt::Error),
    #[error("failed to serialize projection: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    #[serde(flatten)]
    projection: ProjectionResult,
    duration_label: Option<String>,
    years_analyzed: u32,
    goal_reached: bool,
    /// Share of the final balance paid in, seed balance included.
    invested_share: Option<f64>,
    /// Share of the final balance earned as interest.
    interest_share: Option<f64>,
    interest_to_invested_ratio: Option<f64>,
    yearly_flows: Vec<YearlyFlow>,
}

impl From<ProjectionResult> for ProjectResponse {
    fn from(projection: ProjectionResult) -> Self {
        let degenerate = projection.is_degenerate();
        Self {
            duration_label: (!degenerate).then(|| format_duration(projection.months)),
            years_analyzed: years_analyzed(projection.months),
            goal_reached: projection.goal_reached(),
            invested_share: share(projection.total_contributed, projection.total_balance),
            interest_share: share(projection.total_interest, projection.total_balance),
            interest_to_invested_ratio: share(
                projection.total_interest,
                projection.total_contributed,
            ),
            yearly_flows: yearly_flows(&projection.yearly_checkpoints),
            projection,
        }
    }
}

/// Amounts added during a single checkpoint period, recovered from the
/// cumulative checkpoint series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct YearlyFlow {
    year: u32,
    contributed: f64,
    interest: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn ensure_finite(value: f64, field: &'static str) -> Result<(), InputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InputError::NonFinite { field })
    }
}

fn build_inputs(cli: &Cli) -> Result<ProjectionInputs, InputError> {
    ensure_finite(cli.initial_balance, "initial-balance")?;
    ensure_finite(cli.rate, "rate")?;

    if cli.initial_balance < 0.0 {
        return Err(InputError::NegativeBalance);
    }

    if cli.rate <= -100.0 {
        return Err(InputError::RateTooLow);
    }

    let third_param = match cli.mode {
        CliMode::Contribution => {
            let duration = cli.duration.ok_or(InputError::MissingDuration)?;
            ensure_finite(duration, "duration")?;
            if duration <= 0.0 {
                return Err(InputError::NonPositiveDuration);
            }
            let months = PeriodUnit::from(cli.duration_unit).to_months(duration);
            if months > MAX_SIMULATION_MONTHS as f64 {
                return Err(InputError::HorizonTooLong {
                    months,
                    max: MAX_SIMULATION_MONTHS,
                });
            }
            duration
        }
        CliMode::Time => {
            let contribution = cli
                .monthly_contribution
                .ok_or(InputError::MissingContribution)?;
            ensure_finite(contribution, "monthly-contribution")?;
            if contribution < 0.0 {
                return Err(InputError::NegativeContribution);
            }
            contribution
        }
    };

    Ok(ProjectionInputs::from_parts(
        cli.mode.into(),
        cli.initial_balance,
        cli.rate,
        cli.rate_period.into(),
        third_param,
        cli.duration_unit.into(),
    ))
}

/// Parses command-line arguments, runs one projection and renders it in the
/// requested format.
pub fn run_cli<I, T>(args: I) -> Result<String, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let inputs = build_inputs(&cli)?;
    let result = project(&inputs);
    if result.is_degenerate() {
        tracing::warn!("goal cannot be reached with these inputs");
    }

    let output = match cli.format {
        OutputFormat::Json => serde_json::to_string_pretty(&ProjectResponse::from(result))?,
        OutputFormat::Table => render_table(&result)?,
    };
    Ok(output)
}

/// Formats a fractional month count as whole years and months, rounding up
/// to the month in which the goal is crossed.
pub fn format_duration(months: f64) -> String {
    let total = months.max(0.0).ceil() as u64;
    let years = total / 12;
    let rest = total % 12;

    let plural = |n: u64, unit: &str| {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };

    match (years, rest) {
        (0, m) => plural(m, "month"),
        (y, 0) => plural(y, "year"),
        (y, m) => format!("{} and {}", plural(y, "year"), plural(m, "month")),
    }
}

fn years_analyzed(months: f64) -> u32 {
    (months.max(0.0) / 12.0).ceil() as u32
}

/// `part / whole`, or `None` when the whole is not positive.
fn share(part: f64, whole: f64) -> Option<f64> {
    (whole > 0.0).then(|| part / whole)
}

fn yearly_flows(checkpoints: &[YearlyCheckpoint]) -> Vec<YearlyFlow> {
    let mut previous_invested = 0.0;
    let mut previous_interest = 0.0;
    checkpoints
        .iter()
        .map(|row| {
            let flow = YearlyFlow {
                year: row.year,
                contributed: round2(row.invested_amount - previous_invested),
                interest: round2(row.interest_cumulative - previous_interest),
            };
            previous_invested = row.invested_amount;
            previous_interest = row.interest_cumulative;
            flow
        })
        .collect()
}

fn render_table(result: &ProjectionResult) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Effective monthly rate: {:.6}%", result.monthly_rate * 100.0)?;
    match result.mode {
        CalculationMode::Contribution => {
            writeln!(
                out,
                "Required monthly contribution: {:.2}",
                result.monthly_contribution
            )?;
        }
        CalculationMode::Time => match result.status {
            SolveStatus::Solved => {
                writeln!(
                    out,
                    "Time to reach {GOAL:.0}: {} ({:.2} months)",
                    format_duration(result.months),
                    result.months
                )?;
            }
            SolveStatus::NoForwardSolution => {
                writeln!(out, "Goal of {GOAL:.0} is unreachable with these inputs")?;
                return Ok(out);
            }
        },
    }
    if result.horizon_capped {
        writeln!(
            out,
            "Simulation truncated at {} months",
            result.simulated_months
        )?;
    }

    writeln!(
        out,
        "{:>4}  {:>15}  {:>15}  {:>16}  {:>16}  {:>16}",
        "Year", "Paid in (year)", "Interest (year)", "Paid in (cum.)", "Interest (cum.)", "Balance"
    )?;
    let flows = yearly_flows(&result.yearly_checkpoints);
    for (row, flow) in result.yearly_checkpoints.iter().zip(&flows) {
        writeln!(
            out,
            "{:>4}  {:>15.2}  {:>15.2}  {:>16.2}  {:>16.2}  {:>16.2}",
            row.year,
            flow.contributed,
            flow.interest,
            row.invested_amount,
            row.interest_cumulative,
            row.total_accumulated
        )?;
    }
    writeln!(
        out,
        "Totals: invested {:.2}, interest {:.2}, balance {:.2}",
        result.total_contributed, result.total_interest, result.total_balance
    )?;
    if let (Some(invested), Some(interest)) = (
        share(result.total_contributed, result.total_balance),
        share(result.total_interest, result.total_balance),
    ) {
        writeln!(
            out,
            "Share of balance: invested {:.1}%, interest {:.1}%",
            invested * 100.0,
            interest * 100.0
        )?;
    }
    if let Some(ratio) = share(result.total_interest, result.total_contributed) {
        writeln!(out, "Interest earned per unit invested: {:.0}%", ratio * 100.0)?;
    }
    Ok(out)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "million HTTP API listening");
    tracing::info!("local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_handler_impl(payload: ProjectPayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(err) => {
            tracing::debug!(%err, "rejected projection request");
            return err.into_response();
        }
    };

    let result = project(&inputs);
    json_response(StatusCode::OK, ProjectResponse::from(result))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn inputs_from_payload(payload: ProjectPayload) -> Result<ProjectionInputs, InputError> {
    let mut cli = default_cli_for_api();
    if let Some(mode) = payload.mode {
        cli.mode = mode.into();
    }
    if let Some(initial_balance) = payload.initial_balance {
        cli.initial_balance = initial_balance;
    }
    if let Some(rate) = payload.rate {
        cli.rate = rate;
    }
    if let Some(rate_period) = payload.rate_period {
        cli.rate_period = rate_period.into();
    }
    if let Some(duration) = payload.duration {
        cli.duration = Some(duration);
    }
    if let Some(unit) = payload.duration_unit {
        cli.duration_unit = unit.into();
    }
    cli.monthly_contribution = payload.monthly_contribution;

    build_inputs(&cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        mode: CliMode::Contribution,
        initial_balance: 0.0,
        rate: 8.0,
        rate_period: CliRatePeriod::Annual,
        duration: Some(10.0),
        duration_unit: CliPeriodUnit::Years,
        monthly_contribution: None,
        format: OutputFormat::Json,
    }
}
